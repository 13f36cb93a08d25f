use std::fmt;

use serde::{Deserialize, Serialize};

/// Change status of a file in a pull request, as reported by the GitHub
/// "list pull request files" API.
///
/// # Examples
///
/// ```
/// use magpie_core::FileStatus;
///
/// let status: FileStatus = serde_json::from_str("\"removed\"").unwrap();
/// assert_eq!(status, FileStatus::Removed);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FileStatus {
    /// New file introduced by the PR.
    Added,
    /// File deleted by the PR.
    Removed,
    /// Existing file changed in place.
    Modified,
    /// File renamed (possibly with content changes).
    Renamed,
    /// File copied from another path.
    Copied,
    /// Changed in a way GitHub does not classify further.
    Changed,
    /// Listed but content-identical.
    Unchanged,
}

impl fmt::Display for FileStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FileStatus::Added => write!(f, "added"),
            FileStatus::Removed => write!(f, "removed"),
            FileStatus::Modified => write!(f, "modified"),
            FileStatus::Renamed => write!(f, "renamed"),
            FileStatus::Copied => write!(f, "copied"),
            FileStatus::Changed => write!(f, "changed"),
            FileStatus::Unchanged => write!(f, "unchanged"),
        }
    }
}

/// One changed file in a pull request.
///
/// Deserialized straight from the GitHub API response. `patch` is absent for
/// binary files and pure renames.
///
/// # Examples
///
/// ```
/// use magpie_core::{ChangedFile, FileStatus};
///
/// let json = r#"{"filename":"src/lib.rs","status":"modified","patch":"@@ -1 +1 @@\n-a\n+b"}"#;
/// let file: ChangedFile = serde_json::from_str(json).unwrap();
/// assert_eq!(file.status, FileStatus::Modified);
/// assert!(file.patch.is_some());
/// ```
#[derive(Debug, Clone, Deserialize)]
pub struct ChangedFile {
    /// Path of the file relative to the repository root.
    pub filename: String,
    /// Change status reported by GitHub.
    pub status: FileStatus,
    /// Unified-diff patch for this file, when one exists.
    #[serde(default)]
    pub patch: Option<String>,
}

/// One issue reported by the LLM reviewer for a single file.
///
/// The reviewer is instructed to emit a strict JSON array of these; anything
/// that does not deserialize against this schema is treated as an empty
/// finding set.
///
/// # Examples
///
/// ```
/// use magpie_core::ReviewFinding;
///
/// let json = r#"{"line": 12, "comment": "off-by-one in loop bound"}"#;
/// let finding: ReviewFinding = serde_json::from_str(json).unwrap();
/// assert_eq!(finding.line, 12);
/// assert!(finding.suggestion.is_none());
/// ```
#[derive(Debug, Clone, Deserialize)]
pub struct ReviewFinding {
    /// Line number in the new version of the file.
    pub line: u32,
    /// Explanation of the issue.
    pub comment: String,
    /// Optional replacement code for the flagged line.
    #[serde(default)]
    pub suggestion: Option<String>,
}

/// An inline review comment resolved to a diff position, ready to submit.
///
/// Serialized verbatim into the GitHub review-creation request.
///
/// # Examples
///
/// ```
/// use magpie_core::PlacedComment;
///
/// let comment = PlacedComment {
///     path: "src/auth.rs".into(),
///     position: 7,
///     body: "possible null dereference".into(),
/// };
/// let json = serde_json::to_value(&comment).unwrap();
/// assert_eq!(json["position"], 7);
/// ```
#[derive(Debug, Clone, Serialize)]
pub struct PlacedComment {
    /// Path of the file being commented on.
    pub path: String,
    /// Position within the file's patch (1-based, hunk headers included).
    pub position: u32,
    /// Markdown body of the comment.
    pub body: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn file_status_deserializes_all_github_values() {
        for (raw, expected) in [
            ("\"added\"", FileStatus::Added),
            ("\"removed\"", FileStatus::Removed),
            ("\"modified\"", FileStatus::Modified),
            ("\"renamed\"", FileStatus::Renamed),
            ("\"copied\"", FileStatus::Copied),
            ("\"changed\"", FileStatus::Changed),
            ("\"unchanged\"", FileStatus::Unchanged),
        ] {
            let status: FileStatus = serde_json::from_str(raw).unwrap();
            assert_eq!(status, expected);
        }
    }

    #[test]
    fn file_status_display_roundtrips_serde_name() {
        let json = serde_json::to_string(&FileStatus::Renamed).unwrap();
        assert_eq!(json, format!("\"{}\"", FileStatus::Renamed));
    }

    #[test]
    fn changed_file_without_patch() {
        let json = r#"{"filename":"logo.png","status":"added"}"#;
        let file: ChangedFile = serde_json::from_str(json).unwrap();
        assert_eq!(file.filename, "logo.png");
        assert!(file.patch.is_none());
    }

    #[test]
    fn changed_file_ignores_extra_api_fields() {
        let json = r#"{
            "filename": "src/lib.rs",
            "status": "modified",
            "additions": 3,
            "deletions": 1,
            "blob_url": "https://example.invalid/blob"
        }"#;
        let file: ChangedFile = serde_json::from_str(json).unwrap();
        assert_eq!(file.filename, "src/lib.rs");
    }

    #[test]
    fn review_finding_with_suggestion() {
        let json = r#"{"line": 3, "comment": "use checked_add", "suggestion": "a.checked_add(b)"}"#;
        let finding: ReviewFinding = serde_json::from_str(json).unwrap();
        assert_eq!(finding.suggestion.as_deref(), Some("a.checked_add(b)"));
    }

    #[test]
    fn review_finding_rejects_missing_comment() {
        let json = r#"{"line": 3}"#;
        assert!(serde_json::from_str::<ReviewFinding>(json).is_err());
    }

    #[test]
    fn placed_comment_serializes_expected_fields() {
        let comment = PlacedComment {
            path: "a.rs".into(),
            position: 2,
            body: "text".into(),
        };
        let json = serde_json::to_value(&comment).unwrap();
        assert_eq!(json["path"], "a.rs");
        assert_eq!(json["position"], 2);
        assert_eq!(json["body"], "text");
    }
}
