//! Mapping between file line numbers and diff positions.
//!
//! The GitHub review-comment API does not accept file line numbers. A
//! comment is anchored by its *position*: the 1-based ordinal of a line
//! within the file's entire patch text, counting hunk headers. This module
//! builds that mapping from a raw patch and resolves the (frequently
//! slightly off) line numbers cited by the LLM to the nearest mapped line.

use std::collections::BTreeMap;

use tracing::debug;

/// Mapping from new-file line number to patch position.
///
/// Deletion lines never receive an entry: a comment can only attach to a
/// line that exists in the new version of the file.
pub type LinePositionMap = BTreeMap<u32, u32>;

/// How far a cited line may drift from a mapped line and still be anchored.
pub const MAX_LINE_DISTANCE: u32 = 3;

/// Compute the position of every commentable line in a patch.
///
/// Single forward pass. A hunk header (`@@ -old[,len] +new[,len] @@`)
/// resets the line counter to the hunk's new-file start and occupies one
/// position itself; every subsequent line in the patch occupies the next
/// position. The position counter is never reset — it counts lines of the
/// whole patch text, not lines per hunk. Anything before the first hunk
/// header is not counted.
///
/// # Examples
///
/// ```
/// use magpie_review::position::compute_positions;
///
/// let patch = "@@ -1,3 +1,4 @@\n line1\n+line2\n line3\n line4";
/// let positions = compute_positions(patch);
/// assert_eq!(positions[&1], 2);
/// assert_eq!(positions[&2], 3);
/// assert_eq!(positions[&4], 5);
/// ```
pub fn compute_positions(patch: &str) -> LinePositionMap {
    let mut positions = LinePositionMap::new();
    let mut position: u32 = 0;
    let mut current_line: u32 = 0;
    let mut in_hunk = false;

    for line in patch.lines() {
        if line.starts_with("@@") {
            if let Some(new_start) = parse_hunk_new_start(line) {
                in_hunk = true;
                current_line = new_start;
                position += 1;
                continue;
            }
        }

        if !in_hunk {
            continue;
        }

        position += 1;

        // Deletions exist only in the old file version; they occupy a
        // position but no new-file line.
        if line.starts_with('-') {
            continue;
        }

        positions.insert(current_line, position);
        current_line += 1;
    }

    debug!(entries = positions.len(), "computed line position map");
    positions
}

/// Resolve a cited line number to the closest mapped line.
///
/// Exact keys resolve to themselves. Otherwise the key with the minimum
/// absolute distance wins, the smaller line number winning ties, and the
/// result is discarded if that distance exceeds `max_distance`. LLM
/// reviewers routinely cite lines off by one or two; this recovers those
/// comments instead of dropping them.
///
/// # Examples
///
/// ```
/// use magpie_review::position::find_closest_line;
///
/// let positions = [(10, 2), (20, 5)].into_iter().collect();
/// assert_eq!(find_closest_line(10, &positions, 3), Some(10));
/// assert_eq!(find_closest_line(12, &positions, 3), Some(10));
/// assert_eq!(find_closest_line(15, &positions, 3), None);
/// ```
pub fn find_closest_line(
    target_line: u32,
    positions: &LinePositionMap,
    max_distance: u32,
) -> Option<u32> {
    if positions.contains_key(&target_line) {
        return Some(target_line);
    }

    let mut closest: Option<(u32, u32)> = None;
    for &line in positions.keys() {
        let distance = line.abs_diff(target_line);
        match closest {
            Some((_, best)) if distance >= best => {}
            _ => closest = Some((line, distance)),
        }
    }

    match closest {
        Some((line, distance)) if distance <= max_distance => Some(line),
        _ => None,
    }
}

fn parse_hunk_new_start(line: &str) -> Option<u32> {
    let inner = line.strip_prefix("@@ ")?;
    let end = inner.find(" @@")?;
    let inner = &inner[..end];

    let (old, new) = inner.split_once(' ')?;
    old.strip_prefix('-')?;
    let new = new.strip_prefix('+')?;

    let start = match new.split_once(',') {
        Some((start, count)) => {
            count.parse::<u32>().ok()?;
            start
        }
        None => new,
    };
    start.parse().ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn single_hunk_maps_context_and_additions() {
        // Header is position 1; every body line follows.
        let patch = "@@ -1,3 +1,4 @@\n line1\n+line2\n line3\n line4";
        let positions = compute_positions(patch);
        assert_eq!(positions.len(), 4);
        assert_eq!(positions[&1], 2);
        assert_eq!(positions[&2], 3);
        assert_eq!(positions[&3], 4);
        assert_eq!(positions[&4], 5);
    }

    #[test]
    fn deletions_occupy_positions_but_get_no_entry() {
        let patch = "@@ -1,3 +1,2 @@\n keep\n-gone\n tail";
        let positions = compute_positions(patch);
        assert_eq!(positions[&1], 2);
        // "-gone" consumed position 3 without mapping a line.
        assert_eq!(positions[&2], 4);
        assert_eq!(positions.len(), 2);
    }

    #[test]
    fn patch_without_hunk_headers_yields_empty_map() {
        assert!(compute_positions("just some text\nno markers here").is_empty());
        assert!(compute_positions("").is_empty());
    }

    #[test]
    fn lines_before_first_hunk_are_not_counted() {
        let patch = "index abc..def 100644\n--- a/f.rs\n+++ b/f.rs\n@@ -1,1 +1,1 @@\n line";
        let positions = compute_positions(patch);
        // Header is position 1 despite three preceding lines.
        assert_eq!(positions[&1], 2);
    }

    #[test]
    fn position_accumulates_across_hunks() {
        let patch = "@@ -1,2 +1,2 @@\n a\n+b\n@@ -10,2 +10,2 @@\n c\n+d";
        let positions = compute_positions(patch);
        // First hunk: header 1, lines 2-3. Second: header 4, lines 5-6.
        assert_eq!(positions[&1], 2);
        assert_eq!(positions[&2], 3);
        assert_eq!(positions[&10], 5);
        assert_eq!(positions[&11], 6);
    }

    #[test]
    fn hunk_header_resets_line_counter_only() {
        let patch = "@@ -100,1 +200,1 @@\n far";
        let positions = compute_positions(patch);
        assert_eq!(positions[&200], 2);
    }

    #[test]
    fn hunk_header_without_counts_parses() {
        let patch = "@@ -5 +7 @@\n line";
        let positions = compute_positions(patch);
        assert_eq!(positions[&7], 2);
    }

    #[test]
    fn malformed_header_before_any_hunk_is_ignored() {
        let patch = "@@ not a header\n line";
        assert!(compute_positions(patch).is_empty());
    }

    #[test]
    fn header_with_trailing_context_parses() {
        let patch = "@@ -1,2 +1,2 @@ fn main() {\n body\n+more";
        let positions = compute_positions(patch);
        assert_eq!(positions[&1], 2);
        assert_eq!(positions[&2], 3);
    }

    #[test]
    fn closest_line_exact_match_wins() {
        let positions: LinePositionMap = [(5, 1), (6, 2)].into_iter().collect();
        assert_eq!(find_closest_line(5, &positions, 3), Some(5));
    }

    #[test]
    fn closest_line_within_distance() {
        let positions: LinePositionMap = [(10, 4)].into_iter().collect();
        assert_eq!(find_closest_line(12, &positions, 3), Some(10));
        assert_eq!(find_closest_line(8, &positions, 3), Some(10));
    }

    #[test]
    fn closest_line_beyond_distance_is_none() {
        let positions: LinePositionMap = [(10, 4)].into_iter().collect();
        assert_eq!(find_closest_line(14, &positions, 3), None);
        assert_eq!(find_closest_line(50, &positions, 3), None);
    }

    #[test]
    fn closest_line_tie_breaks_to_smaller_line() {
        // 7 is equidistant from 5 and 9.
        let positions: LinePositionMap = [(5, 1), (9, 3)].into_iter().collect();
        assert_eq!(find_closest_line(7, &positions, 3), Some(5));
    }

    #[test]
    fn closest_line_empty_map_is_none() {
        assert_eq!(find_closest_line(1, &LinePositionMap::new(), 3), None);
    }

    #[test]
    fn parse_hunk_new_start_variants() {
        assert_eq!(parse_hunk_new_start("@@ -1,3 +1,4 @@"), Some(1));
        assert_eq!(parse_hunk_new_start("@@ -0,0 +1,13 @@"), Some(1));
        assert_eq!(parse_hunk_new_start("@@ -7 +9 @@"), Some(9));
        assert_eq!(parse_hunk_new_start("@@ -1,2 +3,4 @@ impl Foo {"), Some(3));
        assert_eq!(parse_hunk_new_start("@@ garbage"), None);
        assert_eq!(parse_hunk_new_start("@@ -1,2 3,4 @@"), None);
    }
}
