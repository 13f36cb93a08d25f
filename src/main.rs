use clap::Parser;
use miette::{IntoDiagnostic, Result, WrapErr};
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use magpie_core::BotConfig;
use magpie_review::filter::FileFilter;
use magpie_review::github::{load_event, parse_repository, GithubClient};
use magpie_review::llm::ReviewerClient;
use magpie_review::pipeline::ReviewPipeline;

/// AI pull-request reviewer.
///
/// The command surface is intentionally just help and version: everything
/// else is configured through environment variables, which is the only
/// practical channel inside a GitHub Actions job.
#[derive(Parser)]
#[command(
    name = "magpie",
    version,
    about = "AI pull-request reviewer",
    long_about = "Magpie reviews the pull request that triggered the current GitHub Actions run:\n\
                   it sends each changed file to an LLM reviewer and posts the findings back\n\
                   as one aggregated review with inline comments anchored to the diff.\n\n\
                   Configuration (environment variables):\n  \
                     GITHUB_TOKEN           GitHub access token (required)\n  \
                     ANTHROPIC_API_KEY      Reviewer API key (required)\n  \
                     GITHUB_EVENT_PATH      Path to the Actions event payload (required)\n  \
                     GITHUB_REPOSITORY      Repository as owner/repo (required)\n  \
                     PR_REVIEW_WHITELIST    Comma-separated globs to review (default: everything)\n  \
                     PR_REVIEW_BLACKLIST    Comma-separated globs to exclude (default: none)\n  \
                     PR_REVIEW_MODEL        Reviewer model override\n  \
                     PR_REVIEW_MAX_TOKENS   Reviewer output token budget\n  \
                     ANTHROPIC_BASE_URL     Reviewer API base URL override"
)]
struct Cli {}

#[tokio::main]
async fn main() -> Result<()> {
    miette::set_hook(Box::new(|_| {
        Box::new(
            miette::MietteHandlerOpts::new()
                .terminal_links(true)
                .build(),
        )
    }))
    .expect("miette handler");
    human_panic::setup_panic!();

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let _cli = Cli::parse();

    let config = BotConfig::from_env().into_diagnostic()?;

    let event = load_event(&config.github.event_path)
        .into_diagnostic()
        .wrap_err("failed to load pull request event payload")?;
    let (owner, repo) = parse_repository(&config.github.repository).into_diagnostic()?;

    info!(
        repository = %config.github.repository,
        pr_number = event.number,
        model = %config.llm.model,
        "starting PR review"
    );

    let github = GithubClient::new(&config.github.token).into_diagnostic()?;
    let reviewer = ReviewerClient::new(&config.llm).into_diagnostic()?;
    let filter = FileFilter::from_config(&config.filter);

    let pipeline = ReviewPipeline::new(github, reviewer, filter);
    let report = match pipeline.run(&owner, &repo, event.number).await {
        Ok(report) => report,
        Err(e) => {
            error!("review run failed: {e}");
            return Err(e).into_diagnostic();
        }
    };

    info!("PR review completed: {report}");
    Ok(())
}
