use std::fmt;

use magpie_core::{FileStatus, MagpieError, PlacedComment, ReviewFinding};
use serde::Serialize;
use tracing::{debug, error, info, warn};

use crate::filter::FileFilter;
use crate::github::{CommentIndex, GithubClient};
use crate::llm::ReviewerClient;
use crate::position::{compute_positions, find_closest_line, LinePositionMap, MAX_LINE_DISTANCE};

/// Outcome of one review run.
///
/// # Examples
///
/// ```
/// use magpie_review::pipeline::RunReport;
///
/// let report = RunReport {
///     reviewed_files: vec!["src/lib.rs".into()],
///     skipped_files: vec![],
///     inline_comments: 2,
///     general_comments: 0,
///     submitted: true,
/// };
/// assert!(report.submitted);
/// ```
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RunReport {
    /// Files that were sent to the reviewer.
    pub reviewed_files: Vec<String>,
    /// Files rejected by the filter configuration.
    pub skipped_files: Vec<String>,
    /// Inline comments included in the submitted review.
    pub inline_comments: usize,
    /// General (unanchored) comments appended to the review body.
    pub general_comments: usize,
    /// Whether a review was actually submitted.
    pub submitted: bool,
}

impl fmt::Display for RunReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "reviewed {} files, skipped {}, {} inline + {} general comments ({})",
            self.reviewed_files.len(),
            self.skipped_files.len(),
            self.inline_comments,
            self.general_comments,
            if self.submitted {
                "review submitted"
            } else {
                "nothing to submit"
            },
        )
    }
}

/// Drives one review run end to end.
///
/// Iterates the PR's changed files strictly in API order, one at a time:
/// filter, fetch content, map patch positions, ask the reviewer, anchor the
/// findings. A single aggregated review is submitted at the end — at most
/// one per run, always as a non-blocking comment.
pub struct ReviewPipeline {
    github: GithubClient,
    reviewer: ReviewerClient,
    filter: FileFilter,
}

impl ReviewPipeline {
    /// Assemble a pipeline from its collaborators.
    pub fn new(github: GithubClient, reviewer: ReviewerClient, filter: FileFilter) -> Self {
        Self {
            github,
            reviewer,
            filter,
        }
    }

    /// Run the review for one pull request.
    ///
    /// Per-file failures (content fetch, missing patch, reviewer errors)
    /// are logged and skipped; the run continues with the next file. A
    /// failure to submit the final review is fatal and propagates.
    ///
    /// # Errors
    ///
    /// Returns [`MagpieError::Github`] if PR metadata cannot be fetched or
    /// the review submission is rejected.
    pub async fn run(
        &self,
        owner: &str,
        repo: &str,
        pr_number: u64,
    ) -> Result<RunReport, MagpieError> {
        let head_sha = self.github.head_sha(owner, repo, pr_number).await?;
        let existing = self.github.existing_comments(owner, repo, pr_number).await?;
        let files = self.github.list_changed_files(owner, repo, pr_number).await?;

        info!(
            pr_number,
            files = files.len(),
            existing = existing.len(),
            "starting review run"
        );

        let mut inline_comments: Vec<PlacedComment> = Vec::new();
        let mut general_comments: Vec<String> = Vec::new();
        let mut reviewed_files: Vec<String> = Vec::new();
        let mut skipped_files: Vec<String> = Vec::new();

        for file in &files {
            if file.status == FileStatus::Removed {
                debug!(file = %file.filename, "skipping removed file");
                continue;
            }

            if !self.filter.should_review(&file.filename) {
                info!(file = %file.filename, "skipping file based on filter configuration");
                skipped_files.push(file.filename.clone());
                continue;
            }

            reviewed_files.push(file.filename.clone());
            info!(file = %file.filename, "reviewing");

            let content = match self
                .github
                .file_content(owner, repo, &file.filename, &head_sha)
                .await
            {
                Ok(content) => content,
                Err(e) => {
                    error!(file = %file.filename, "failed to fetch file content: {e}");
                    continue;
                }
            };

            let Some(patch) = file.patch.as_deref() else {
                warn!(file = %file.filename, "no patch for file, skipping");
                continue;
            };

            let positions = compute_positions(patch);

            let findings = match self.reviewer.review_file(&file.filename, &content).await {
                Ok(findings) => findings,
                Err(e) => {
                    error!(file = %file.filename, "review request failed: {e}");
                    Vec::new()
                }
            };

            place_findings(
                &file.filename,
                findings,
                &positions,
                &existing,
                &mut inline_comments,
                &mut general_comments,
            );
        }

        let submitted = !inline_comments.is_empty()
            || !general_comments.is_empty()
            || !skipped_files.is_empty();

        if submitted {
            let summary = compose_summary(
                &reviewed_files,
                &skipped_files,
                inline_comments.len(),
                &general_comments,
            );
            info!(
                inline = inline_comments.len(),
                general = general_comments.len(),
                "submitting review"
            );
            self.github
                .submit_review(owner, repo, pr_number, &head_sha, &summary, &inline_comments)
                .await?;
        } else {
            info!("no files were reviewed and no comments to make");
        }

        Ok(RunReport {
            reviewed_files,
            skipped_files,
            inline_comments: inline_comments.len(),
            general_comments: general_comments.len(),
            submitted,
        })
    }
}

/// Anchor one file's findings, splitting them into inline and general
/// comments.
///
/// A finding whose line resolves to a patch position becomes an inline
/// comment, unless an identical `{path}:{position}` comment already exists
/// on the PR. A finding that cannot be anchored within the distance budget
/// becomes a general comment carrying the file and line in its header;
/// general comments have no position key and are never deduplicated.
fn place_findings(
    filename: &str,
    findings: Vec<ReviewFinding>,
    positions: &LinePositionMap,
    existing: &CommentIndex,
    inline_comments: &mut Vec<PlacedComment>,
    general_comments: &mut Vec<String>,
) {
    for finding in findings {
        match find_closest_line(finding.line, positions, MAX_LINE_DISTANCE) {
            Some(mapped_line) => {
                let position = positions[&mapped_line];
                debug!(
                    line = finding.line,
                    mapped_line, position, "anchored finding to patch position"
                );

                if existing.contains(filename, position) {
                    debug!(filename, position, "suppressing duplicate comment");
                    continue;
                }

                inline_comments.push(PlacedComment {
                    path: filename.to_string(),
                    position,
                    body: build_inline_body(&finding),
                });
            }
            None => {
                warn!(
                    line = finding.line,
                    filename, "line not found in patch context"
                );
                general_comments.push(build_general_body(filename, &finding));
            }
        }
    }
}

fn build_inline_body(finding: &ReviewFinding) -> String {
    format!(
        "{}\n\n```suggestion\n{}\n```",
        finding.comment,
        finding.suggestion.as_deref().unwrap_or_default()
    )
}

fn build_general_body(filename: &str, finding: &ReviewFinding) -> String {
    format!(
        "**In file {filename}, line {}:**\n\n{}\n\n```suggestion\n{}\n```",
        finding.line,
        finding.comment,
        finding.suggestion.as_deref().unwrap_or_default()
    )
}

/// Compose the aggregate review body.
///
/// Lists reviewed and skipped files, reports the suggestion count (or a
/// congratulatory line when there is none), and appends the general
/// comments verbatim.
fn compose_summary(
    reviewed_files: &[String],
    skipped_files: &[String],
    inline_count: usize,
    general_comments: &[String],
) -> String {
    let mut body = String::from("\u{1f916} Code Review Summary:\n\n");

    if !reviewed_files.is_empty() {
        body.push_str(&format!("Reviewed {} files:\n", reviewed_files.len()));
        for filename in reviewed_files {
            body.push_str(&format!("- {filename}\n"));
        }
    }

    if !skipped_files.is_empty() {
        body.push_str(&format!(
            "\nSkipped {} files based on filter configuration:\n",
            skipped_files.len()
        ));
        for filename in skipped_files {
            body.push_str(&format!("- {filename}\n"));
        }
    }

    if inline_count > 0 {
        body.push_str(&format!(
            "\nFound {inline_count} suggestions for improvement."
        ));
    } else {
        body.push_str("\n\u{2728} Great job! The code looks clean and well-written.");
    }

    if !general_comments.is_empty() {
        body.push_str("\n\n### Additional Comments:\n\n");
        body.push_str(&general_comments.join("\n\n"));
    }

    body
}

#[cfg(test)]
mod tests {
    use super::*;

    fn finding(line: u32, comment: &str, suggestion: Option<&str>) -> ReviewFinding {
        ReviewFinding {
            line,
            comment: comment.into(),
            suggestion: suggestion.map(String::from),
        }
    }

    fn positions(pairs: &[(u32, u32)]) -> LinePositionMap {
        pairs.iter().copied().collect()
    }

    #[test]
    fn resolved_finding_becomes_inline_comment() {
        let mut inline = Vec::new();
        let mut general = Vec::new();
        place_findings(
            "src/lib.rs",
            vec![finding(5, "off-by-one", Some("i <= n"))],
            &positions(&[(5, 3)]),
            &CommentIndex::default(),
            &mut inline,
            &mut general,
        );
        assert_eq!(inline.len(), 1);
        assert!(general.is_empty());
        assert_eq!(inline[0].path, "src/lib.rs");
        assert_eq!(inline[0].position, 3);
        assert!(inline[0].body.contains("off-by-one"));
        assert!(inline[0].body.contains("```suggestion\ni <= n\n```"));
    }

    #[test]
    fn nearby_finding_is_recovered() {
        let mut inline = Vec::new();
        let mut general = Vec::new();
        place_findings(
            "a.rs",
            vec![finding(7, "drifted line citation", None)],
            &positions(&[(5, 2)]),
            &CommentIndex::default(),
            &mut inline,
            &mut general,
        );
        assert_eq!(inline.len(), 1);
        assert_eq!(inline[0].position, 2);
    }

    #[test]
    fn unanchorable_finding_becomes_general_comment() {
        // No mapped line within distance 3 of line 50.
        let mut inline = Vec::new();
        let mut general = Vec::new();
        place_findings(
            "a.rs",
            vec![finding(50, "far away", None)],
            &positions(&[(5, 2)]),
            &CommentIndex::default(),
            &mut inline,
            &mut general,
        );
        assert!(inline.is_empty());
        assert_eq!(general.len(), 1);
        assert!(general[0].starts_with("**In file a.rs, line 50:**"));
        assert!(general[0].contains("far away"));
    }

    #[test]
    fn existing_comment_suppresses_duplicate() {
        let mut existing = CommentIndex::default();
        existing.insert("a.rs", 2, "posted last run".into());

        let mut inline = Vec::new();
        let mut general = Vec::new();
        place_findings(
            "a.rs",
            vec![finding(5, "same spot", None)],
            &positions(&[(5, 2)]),
            &existing,
            &mut inline,
            &mut general,
        );
        assert!(inline.is_empty());
        assert!(general.is_empty());
    }

    #[test]
    fn dedup_key_is_per_path() {
        let mut existing = CommentIndex::default();
        existing.insert("other.rs", 2, "different file".into());

        let mut inline = Vec::new();
        let mut general = Vec::new();
        place_findings(
            "a.rs",
            vec![finding(5, "not a duplicate", None)],
            &positions(&[(5, 2)]),
            &existing,
            &mut inline,
            &mut general,
        );
        assert_eq!(inline.len(), 1);
    }

    #[test]
    fn general_comments_are_never_deduplicated() {
        // Two runs' worth of the same unanchorable finding both land.
        let mut inline = Vec::new();
        let mut general = Vec::new();
        for _ in 0..2 {
            place_findings(
                "a.rs",
                vec![finding(99, "repeat offender", None)],
                &positions(&[(5, 2)]),
                &CommentIndex::default(),
                &mut inline,
                &mut general,
            );
        }
        assert_eq!(general.len(), 2);
    }

    #[test]
    fn inline_body_with_empty_suggestion() {
        let body = build_inline_body(&finding(1, "note", None));
        assert_eq!(body, "note\n\n```suggestion\n\n```");
    }

    #[test]
    fn summary_lists_reviewed_and_skipped() {
        let summary = compose_summary(
            &["src/a.rs".into(), "src/b.rs".into()],
            &["package.lock".into()],
            3,
            &[],
        );
        assert!(summary.contains("Reviewed 2 files:"));
        assert!(summary.contains("- src/a.rs"));
        assert!(summary.contains("Skipped 1 files based on filter configuration:"));
        assert!(summary.contains("- package.lock"));
        assert!(summary.contains("Found 3 suggestions for improvement."));
    }

    #[test]
    fn summary_congratulates_on_clean_review() {
        let summary = compose_summary(&["src/a.rs".into()], &[], 0, &[]);
        assert!(summary.contains("Great job!"));
        assert!(!summary.contains("suggestions for improvement"));
    }

    #[test]
    fn summary_appends_general_comments_verbatim() {
        let general = vec!["**In file a.rs, line 9:**\n\nsomething".to_string()];
        let summary = compose_summary(&["a.rs".into()], &[], 1, &general);
        assert!(summary.contains("### Additional Comments:"));
        assert!(summary.contains("**In file a.rs, line 9:**\n\nsomething"));
    }

    #[test]
    fn run_report_display() {
        let report = RunReport {
            reviewed_files: vec!["a.rs".into()],
            skipped_files: vec![],
            inline_comments: 1,
            general_comments: 0,
            submitted: true,
        };
        let text = report.to_string();
        assert!(text.contains("reviewed 1 files"));
        assert!(text.contains("review submitted"));
    }

    #[test]
    fn run_report_serializes_camel_case() {
        let report = RunReport {
            reviewed_files: vec![],
            skipped_files: vec![],
            inline_comments: 0,
            general_comments: 0,
            submitted: false,
        };
        let json = serde_json::to_value(&report).unwrap();
        assert!(json.get("reviewedFiles").is_some());
        assert!(json.get("reviewed_files").is_none());
    }
}
