//! Whitelist/blacklist file filtering ahead of the LLM.
//!
//! Decides which changed files are worth a review call at all, from two
//! comma-separated glob pattern lists supplied by configuration. Blacklist
//! wins over whitelist; an absent whitelist means "review everything".

use magpie_core::FilterConfig;
use tracing::{debug, warn};

/// Compiled include/exclude patterns for changed-file paths.
///
/// # Examples
///
/// ```
/// use magpie_core::FilterConfig;
/// use magpie_review::filter::FileFilter;
///
/// let config = FilterConfig::from_lists("*", "*.lock");
/// let filter = FileFilter::from_config(&config);
/// assert!(filter.should_review("src/main.rs"));
/// assert!(!filter.should_review("package.lock"));
/// ```
pub struct FileFilter {
    whitelist: Vec<glob::Pattern>,
    blacklist: Vec<glob::Pattern>,
}

impl FileFilter {
    /// Compile the configured pattern lists.
    ///
    /// Unparsable patterns are logged and dropped rather than failing the
    /// run.
    pub fn from_config(config: &FilterConfig) -> Self {
        Self {
            whitelist: compile(&config.whitelist),
            blacklist: compile(&config.blacklist),
        }
    }

    /// Decide whether a changed file should be sent for review.
    ///
    /// Any blacklist match rejects immediately; otherwise the file must
    /// match at least one whitelist pattern. Matching is case-sensitive.
    ///
    /// # Examples
    ///
    /// ```
    /// use magpie_core::FilterConfig;
    /// use magpie_review::filter::FileFilter;
    ///
    /// let filter = FileFilter::from_config(&FilterConfig::from_lists("*.rs", ""));
    /// assert!(filter.should_review("src/lib.rs"));
    /// assert!(!filter.should_review("README.md"));
    /// ```
    pub fn should_review(&self, filename: &str) -> bool {
        for pattern in &self.blacklist {
            if pattern.matches(filename) {
                debug!(filename, pattern = %pattern, "file matched blacklist pattern");
                return false;
            }
        }

        for pattern in &self.whitelist {
            if pattern.matches(filename) {
                debug!(filename, pattern = %pattern, "file matched whitelist pattern");
                return true;
            }
        }

        debug!(filename, "file did not match any whitelist pattern");
        false
    }
}

fn compile(patterns: &[String]) -> Vec<glob::Pattern> {
    let mut compiled = Vec::with_capacity(patterns.len());
    for raw in patterns {
        match glob::Pattern::new(raw) {
            Ok(p) => compiled.push(p),
            Err(e) => warn!(pattern = raw.as_str(), "skipping invalid glob pattern: {e}"),
        }
    }
    compiled
}
