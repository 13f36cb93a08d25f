use std::collections::HashMap;
use std::path::Path;

use magpie_core::{ChangedFile, MagpieError, PlacedComment};
use serde::Deserialize;
use tracing::debug;

const API_BASE: &str = "https://api.github.com";
const PER_PAGE: usize = 100;

/// GitHub Pull Request client for reading PR state and posting the review.
///
/// Raw REST calls go through `reqwest` (media-type control, pagination);
/// the review submission goes through `octocrab`.
pub struct GithubClient {
    octocrab: octocrab::Octocrab,
    http: reqwest::Client,
    token: String,
}

impl GithubClient {
    /// Create a client from an access token.
    ///
    /// # Errors
    ///
    /// Returns [`MagpieError::Github`] if the client cannot be built.
    ///
    /// # Examples
    ///
    /// ```no_run
    /// use magpie_review::github::GithubClient;
    ///
    /// let client = GithubClient::new("ghp_xxxx").unwrap();
    /// ```
    pub fn new(token: &str) -> Result<Self, MagpieError> {
        let octocrab = octocrab::Octocrab::builder()
            .personal_token(token.to_string())
            .build()
            .map_err(|e| MagpieError::Github(format!("failed to create GitHub client: {e}")))?;

        let http = reqwest::Client::new();

        Ok(Self {
            octocrab,
            http,
            token: token.to_string(),
        })
    }

    /// Fetch the head commit sha of a pull request.
    ///
    /// # Errors
    ///
    /// Returns [`MagpieError::Github`] on network or API errors.
    pub async fn head_sha(
        &self,
        owner: &str,
        repo: &str,
        pr_number: u64,
    ) -> Result<String, MagpieError> {
        #[derive(Deserialize)]
        struct Pull {
            head: Head,
        }
        #[derive(Deserialize)]
        struct Head {
            sha: String,
        }

        let url = format!("{API_BASE}/repos/{owner}/{repo}/pulls/{pr_number}");
        let pull: Pull = self.get_json(&url).await?;
        Ok(pull.head.sha)
    }

    /// List the changed files of a pull request, following pagination.
    ///
    /// # Errors
    ///
    /// Returns [`MagpieError::Github`] on network or API errors.
    pub async fn list_changed_files(
        &self,
        owner: &str,
        repo: &str,
        pr_number: u64,
    ) -> Result<Vec<ChangedFile>, MagpieError> {
        let url = format!("{API_BASE}/repos/{owner}/{repo}/pulls/{pr_number}/files");
        let files: Vec<ChangedFile> = self.get_paginated(&url).await?;
        debug!(count = files.len(), "fetched changed files");
        Ok(files)
    }

    /// Fetch the raw content of a file at a given revision.
    ///
    /// Uses the `raw` media type so no base64 round-trip is needed.
    ///
    /// # Errors
    ///
    /// Returns [`MagpieError::Github`] on network or API errors, including
    /// files that do not exist at the revision.
    pub async fn file_content(
        &self,
        owner: &str,
        repo: &str,
        path: &str,
        git_ref: &str,
    ) -> Result<String, MagpieError> {
        let url = format!("{API_BASE}/repos/{owner}/{repo}/contents/{path}?ref={git_ref}");

        let response = self
            .http
            .get(&url)
            .header("Accept", "application/vnd.github.v3.raw")
            .header("Authorization", format!("Bearer {}", self.token))
            .header("User-Agent", "magpie")
            .send()
            .await
            .map_err(|e| MagpieError::Github(format!("failed to fetch file content: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(MagpieError::Github(format!(
                "GitHub API error {status}: {body}"
            )));
        }

        response
            .text()
            .await
            .map_err(|e| MagpieError::Github(format!("failed to read content response: {e}")))
    }

    /// Build the index of review comments already posted on the PR.
    ///
    /// Used to deduplicate outgoing inline comments across re-triggered
    /// runs. Comments whose position is null (outdated anchors) are not
    /// indexed; they can never collide with a freshly computed position.
    ///
    /// # Errors
    ///
    /// Returns [`MagpieError::Github`] on network or API errors.
    pub async fn existing_comments(
        &self,
        owner: &str,
        repo: &str,
        pr_number: u64,
    ) -> Result<CommentIndex, MagpieError> {
        #[derive(Deserialize)]
        struct ReviewCommentEntry {
            path: String,
            position: Option<u32>,
            body: String,
        }

        let url = format!("{API_BASE}/repos/{owner}/{repo}/pulls/{pr_number}/comments");
        let entries: Vec<ReviewCommentEntry> = self.get_paginated(&url).await?;

        let mut index = CommentIndex::default();
        for entry in entries {
            if let Some(position) = entry.position {
                index.insert(&entry.path, position, entry.body);
            }
        }
        debug!(count = index.len(), "indexed existing review comments");
        Ok(index)
    }

    /// Submit one aggregated review to the pull request.
    ///
    /// The review is posted as a non-blocking `COMMENT` event — the bot
    /// never approves or requests changes.
    ///
    /// # Errors
    ///
    /// Returns [`MagpieError::Github`] on API errors. The caller treats
    /// this as fatal.
    pub async fn submit_review(
        &self,
        owner: &str,
        repo: &str,
        pr_number: u64,
        commit_id: &str,
        summary: &str,
        comments: &[PlacedComment],
    ) -> Result<(), MagpieError> {
        let route = format!("/repos/{owner}/{repo}/pulls/{pr_number}/reviews");
        let body = serde_json::json!({
            "commit_id": commit_id,
            "event": "COMMENT",
            "body": summary,
            "comments": comments,
        });

        let _response: serde_json::Value = self
            .octocrab
            .post(route, Some(&body))
            .await
            .map_err(|e| MagpieError::Github(format!("failed to submit review: {e}")))?;

        Ok(())
    }

    async fn get_json<T: serde::de::DeserializeOwned>(&self, url: &str) -> Result<T, MagpieError> {
        let response = self
            .http
            .get(url)
            .header("Accept", "application/vnd.github+json")
            .header("Authorization", format!("Bearer {}", self.token))
            .header("User-Agent", "magpie")
            .send()
            .await
            .map_err(|e| MagpieError::Github(format!("request failed: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(MagpieError::Github(format!(
                "GitHub API error {status}: {body}"
            )));
        }

        response
            .json()
            .await
            .map_err(|e| MagpieError::Github(format!("failed to parse response: {e}")))
    }

    async fn get_paginated<T: serde::de::DeserializeOwned>(
        &self,
        url: &str,
    ) -> Result<Vec<T>, MagpieError> {
        let mut all = Vec::new();
        let mut page = 1;
        loop {
            let page_url = format!("{url}?per_page={PER_PAGE}&page={page}");
            let batch: Vec<T> = self.get_json(&page_url).await?;
            let len = batch.len();
            all.extend(batch);
            if len < PER_PAGE {
                break;
            }
            page += 1;
        }
        Ok(all)
    }
}

/// Index of already-posted review comments, keyed by `"{path}:{position}"`.
///
/// Built once at the start of a run; read-only afterwards. Re-triggered CI
/// runs check outgoing inline comments against it so identical comments are
/// not posted twice.
///
/// # Examples
///
/// ```
/// use magpie_review::github::CommentIndex;
///
/// let mut index = CommentIndex::default();
/// index.insert("src/lib.rs", 7, "old comment".into());
/// assert!(index.contains("src/lib.rs", 7));
/// assert!(!index.contains("src/lib.rs", 8));
/// ```
#[derive(Debug, Default)]
pub struct CommentIndex {
    entries: HashMap<String, String>,
}

impl CommentIndex {
    /// The dedup key for a path/position pair.
    pub fn key(path: &str, position: u32) -> String {
        format!("{path}:{position}")
    }

    /// Record an existing comment.
    pub fn insert(&mut self, path: &str, position: u32, body: String) {
        self.entries.insert(Self::key(path, position), body);
    }

    /// Whether a comment already exists at this path/position.
    pub fn contains(&self, path: &str, position: u32) -> bool {
        self.entries.contains_key(&Self::key(path, position))
    }

    /// Number of indexed comments.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the index is empty.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// The slice of a GitHub Actions event payload the bot needs.
#[derive(Debug, Clone)]
pub struct PullRequestEvent {
    /// Pull request number.
    pub number: u64,
}

/// Load the Actions event payload and extract the pull request number.
///
/// # Errors
///
/// Returns [`MagpieError::FileNotFound`] if the payload file is missing,
/// [`MagpieError::Serialization`] if it is not valid JSON, or
/// [`MagpieError::Config`] if it carries no `number` field (i.e. the
/// workflow was not triggered by a pull request event).
///
/// # Examples
///
/// ```no_run
/// use std::path::Path;
/// use magpie_review::github::load_event;
///
/// let event = load_event(Path::new("/github/workflow/event.json")).unwrap();
/// println!("reviewing PR #{}", event.number);
/// ```
pub fn load_event(path: &Path) -> Result<PullRequestEvent, MagpieError> {
    #[derive(Deserialize)]
    struct RawEvent {
        number: Option<u64>,
    }

    if !path.exists() {
        return Err(MagpieError::FileNotFound(path.to_path_buf()));
    }

    let content = std::fs::read_to_string(path)?;
    let raw: RawEvent = serde_json::from_str(&content)?;
    let number = raw.number.ok_or_else(|| {
        MagpieError::Config(
            "event payload has no pull request number; was the workflow triggered by a pull_request event?".into(),
        )
    })?;

    Ok(PullRequestEvent { number })
}

/// Parse a repository identifier (`owner/repo`) into its components.
///
/// # Errors
///
/// Returns [`MagpieError::Config`] if the format is invalid.
///
/// # Examples
///
/// ```
/// use magpie_review::github::parse_repository;
///
/// let (owner, repo) = parse_repository("octocat/hello-world").unwrap();
/// assert_eq!(owner, "octocat");
/// assert_eq!(repo, "hello-world");
/// ```
pub fn parse_repository(repository: &str) -> Result<(String, String), MagpieError> {
    let Some((owner, repo)) = repository.split_once('/') else {
        return Err(MagpieError::Config(format!(
            "invalid repository '{repository}', expected owner/repo"
        )));
    };
    if owner.is_empty() || repo.is_empty() || repo.contains('/') {
        return Err(MagpieError::Config(format!(
            "invalid repository '{repository}', expected owner/repo"
        )));
    }
    Ok((owner.to_string(), repo.to_string()))
}
