use std::path::PathBuf;

use crate::error::MagpieError;

const DEFAULT_MODEL: &str = "claude-3-7-sonnet-20250219";
const DEFAULT_BASE_URL: &str = "https://api.anthropic.com";
const DEFAULT_MAX_TOKENS: u32 = 2000;

/// Top-level configuration, assembled once at process start.
///
/// The entire configuration surface is environment variables — the bot is
/// designed to run inside a GitHub Actions job where that is the only
/// practical channel. Constructed once and passed into the pipeline and
/// clients by parameter; there are no ambient singletons.
///
/// # Examples
///
/// ```no_run
/// use magpie_core::BotConfig;
///
/// let config = BotConfig::from_env().unwrap();
/// assert!(!config.github.repository.is_empty());
/// ```
#[derive(Debug, Clone)]
pub struct BotConfig {
    /// GitHub access and event context.
    pub github: GithubConfig,
    /// LLM reviewer settings.
    pub llm: LlmConfig,
    /// File include/exclude patterns.
    pub filter: FilterConfig,
}

impl BotConfig {
    /// Load the full configuration from the environment.
    ///
    /// Required: `GITHUB_TOKEN`, `ANTHROPIC_API_KEY`, `GITHUB_EVENT_PATH`,
    /// `GITHUB_REPOSITORY`. Optional: `PR_REVIEW_WHITELIST`,
    /// `PR_REVIEW_BLACKLIST`, `PR_REVIEW_MODEL`, `PR_REVIEW_MAX_TOKENS`,
    /// `ANTHROPIC_BASE_URL`.
    ///
    /// # Errors
    ///
    /// Returns [`MagpieError::Config`] if a required variable is missing, so
    /// the process aborts before any API call is made.
    pub fn from_env() -> Result<Self, MagpieError> {
        let github = GithubConfig {
            token: required_env("GITHUB_TOKEN")?,
            repository: required_env("GITHUB_REPOSITORY")?,
            event_path: PathBuf::from(required_env("GITHUB_EVENT_PATH")?),
        };

        let llm = LlmConfig {
            api_key: required_env("ANTHROPIC_API_KEY")?,
            model: optional_env("PR_REVIEW_MODEL").unwrap_or_else(|| DEFAULT_MODEL.into()),
            base_url: optional_env("ANTHROPIC_BASE_URL").unwrap_or_else(|| DEFAULT_BASE_URL.into()),
            max_tokens: parse_max_tokens(optional_env("PR_REVIEW_MAX_TOKENS").as_deref()),
        };

        let filter = FilterConfig::from_lists(
            &optional_env("PR_REVIEW_WHITELIST").unwrap_or_default(),
            &optional_env("PR_REVIEW_BLACKLIST").unwrap_or_default(),
        );

        Ok(Self {
            github,
            llm,
            filter,
        })
    }
}

/// GitHub access token, repository identifier, and event payload location.
#[derive(Debug, Clone)]
pub struct GithubConfig {
    /// Personal access token or Actions-provided token.
    pub token: String,
    /// Repository in `owner/repo` form.
    pub repository: String,
    /// Path to the Actions event payload JSON.
    pub event_path: PathBuf,
}

/// LLM reviewer provider configuration.
///
/// # Examples
///
/// ```
/// use magpie_core::LlmConfig;
///
/// let config = LlmConfig::with_api_key("sk-test");
/// assert_eq!(config.model, "claude-3-7-sonnet-20250219");
/// assert_eq!(config.max_tokens, 2000);
/// ```
#[derive(Debug, Clone)]
pub struct LlmConfig {
    /// API key for the reviewer provider.
    pub api_key: String,
    /// Model identifier.
    pub model: String,
    /// Base URL for API requests.
    pub base_url: String,
    /// Maximum tokens the reviewer may generate per file.
    pub max_tokens: u32,
}

impl LlmConfig {
    /// Build a config with the given API key and all defaults.
    pub fn with_api_key(api_key: &str) -> Self {
        Self {
            api_key: api_key.to_string(),
            model: DEFAULT_MODEL.into(),
            base_url: DEFAULT_BASE_URL.into(),
            max_tokens: DEFAULT_MAX_TOKENS,
        }
    }
}

/// Glob pattern lists controlling which changed files get reviewed.
///
/// Blacklist always takes precedence over whitelist. An empty whitelist is
/// replaced with a single match-all pattern at construction, so absent
/// configuration reviews everything and excludes nothing.
///
/// # Examples
///
/// ```
/// use magpie_core::FilterConfig;
///
/// let config = FilterConfig::from_lists("", "*.lock, vendor/**");
/// assert_eq!(config.whitelist, vec!["*"]);
/// assert_eq!(config.blacklist, vec!["*.lock", "vendor/**"]);
/// ```
#[derive(Debug, Clone)]
pub struct FilterConfig {
    /// Patterns a file must match to be reviewed.
    pub whitelist: Vec<String>,
    /// Patterns that exclude a file regardless of the whitelist.
    pub blacklist: Vec<String>,
}

impl FilterConfig {
    /// Build a filter config from two comma-separated pattern lists.
    ///
    /// Entries are trimmed and blanks dropped. If the whitelist ends up
    /// empty it defaults to `["*"]`.
    pub fn from_lists(whitelist: &str, blacklist: &str) -> Self {
        let mut whitelist = split_patterns(whitelist);
        let blacklist = split_patterns(blacklist);

        if whitelist.is_empty() {
            whitelist.push("*".into());
        }

        Self {
            whitelist,
            blacklist,
        }
    }
}

impl Default for FilterConfig {
    fn default() -> Self {
        Self::from_lists("", "")
    }
}

fn split_patterns(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|p| !p.is_empty())
        .map(String::from)
        .collect()
}

fn parse_max_tokens(raw: Option<&str>) -> u32 {
    match raw {
        Some(s) => match s.trim().parse() {
            Ok(n) => n,
            Err(_) => {
                tracing::warn!("ignoring unparsable PR_REVIEW_MAX_TOKENS value: {s}");
                DEFAULT_MAX_TOKENS
            }
        },
        None => DEFAULT_MAX_TOKENS,
    }
}

fn required_env(name: &str) -> Result<String, MagpieError> {
    std::env::var(name).map_err(|_| MagpieError::Config(format!("{name} not set")))
}

fn optional_env(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|v| !v.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn split_patterns_trims_and_drops_blanks() {
        let patterns = split_patterns(" *.rs , , src/**,  ");
        assert_eq!(patterns, vec!["*.rs", "src/**"]);
    }

    #[test]
    fn split_patterns_empty_input() {
        assert!(split_patterns("").is_empty());
        assert!(split_patterns(" , , ").is_empty());
    }

    #[test]
    fn empty_whitelist_defaults_to_match_all() {
        let config = FilterConfig::from_lists("", "");
        assert_eq!(config.whitelist, vec!["*"]);
        assert!(config.blacklist.is_empty());
    }

    #[test]
    fn whitelist_of_blanks_defaults_to_match_all() {
        let config = FilterConfig::from_lists("  ,  ,", "*.lock");
        assert_eq!(config.whitelist, vec!["*"]);
        assert_eq!(config.blacklist, vec!["*.lock"]);
    }

    #[test]
    fn explicit_whitelist_is_kept() {
        let config = FilterConfig::from_lists("*.rs,*.toml", "");
        assert_eq!(config.whitelist, vec!["*.rs", "*.toml"]);
    }

    #[test]
    fn default_config_is_permissive() {
        let config = FilterConfig::default();
        assert_eq!(config.whitelist, vec!["*"]);
        assert!(config.blacklist.is_empty());
    }

    #[test]
    fn max_tokens_falls_back_on_garbage() {
        assert_eq!(parse_max_tokens(Some("not-a-number")), 2000);
        assert_eq!(parse_max_tokens(None), 2000);
        assert_eq!(parse_max_tokens(Some("4096")), 4096);
    }

    #[test]
    fn llm_config_defaults() {
        let config = LlmConfig::with_api_key("k");
        assert_eq!(config.api_key, "k");
        assert_eq!(config.base_url, "https://api.anthropic.com");
    }
}
