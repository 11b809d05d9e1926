use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result, bail};
use clap::{Parser, Subcommand};
use tokio::sync::broadcast::error::RecvError;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::EnvFilter;
use url::Url;

use gleaner_client::{HttpPageSource, ReqwestFetcher};
use gleaner_core::export;
use gleaner_core::extract::FieldExtractor;
use gleaner_core::models::{Locator, RunState, RunStatus};
use gleaner_core::traits::Fetcher;
use gleaner_core::{RunCoordinator, ScrapeConfig, ScrapeWorker, SelectorConfig, TracingScrapeReporter};

#[derive(Parser)]
#[command(name = "gleaner", version, about = "Listing page scraper")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

/// Options shared by every command that fetches pages.
#[derive(clap::Args)]
struct FetchArgs {
    /// JSON file overriding the default CSS selectors
    #[arg(long, env = "GLEANER_SELECTORS")]
    selectors: Option<PathBuf>,

    /// Per-page fetch timeout in seconds (0 waits indefinitely)
    #[arg(long, env = "GLEANER_FETCH_TIMEOUT_SECS", default_value_t = 30)]
    timeout: u64,

    /// User-Agent header sent with every request
    #[arg(long, env = "GLEANER_USER_AGENT")]
    user_agent: Option<String>,
}

impl FetchArgs {
    fn into_config(self) -> Result<ScrapeConfig> {
        let mut config = ScrapeConfig::default()
            .with_fetch_timeout((self.timeout > 0).then(|| Duration::from_secs(self.timeout)));
        if let Some(path) = &self.selectors {
            let selectors = SelectorConfig::from_file(path)
                .with_context(|| format!("Failed to load selectors from {}", path.display()))?;
            config = config.with_selectors(selectors);
        }
        if let Some(user_agent) = self.user_agent {
            config.user_agent = user_agent;
        }
        Ok(config)
    }
}

#[derive(Subcommand)]
enum Commands {
    /// Scrape every listing linked from a listing page into a CSV file
    Scrape {
        /// Listing page URL
        #[arg(short, long)]
        url: Url,

        /// Output CSV path (defaults to a name derived from the URL and today's date)
        #[arg(short, long)]
        output: Option<PathBuf>,

        #[command(flatten)]
        fetch: FetchArgs,
    },

    /// Extract a single detail page and print the record as JSON
    Extract {
        /// Detail page URL
        #[arg(short, long)]
        url: Url,

        #[command(flatten)]
        fetch: FetchArgs,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env if present
    let _ = dotenvy::dotenv();

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive("gleaner=info".parse()?))
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Scrape { url, output, fetch } => {
            cmd_scrape(url, output, fetch.into_config()?).await?;
        }
        Commands::Extract { url, fetch } => {
            cmd_extract(url, fetch.into_config()?).await?;
        }
    }

    Ok(())
}

async fn cmd_scrape(url: Url, output: Option<PathBuf>, config: ScrapeConfig) -> Result<()> {
    let fetcher = ReqwestFetcher::from_config(&config)
        .context("Failed to create HTTP client")?
        .allow_private_urls();
    let worker =
        ScrapeWorker::new(fetcher.clone(), &config).context("Invalid selector configuration")?;

    let shutdown = CancellationToken::new();
    let (coordinator, task) = RunCoordinator::spawn(
        HttpPageSource::new(fetcher),
        worker,
        TracingScrapeReporter,
        shutdown.clone(),
    );

    let mut updates = coordinator.subscribe();
    coordinator.start(url.clone()).await?;

    let outcome = wait_for_outcome(&mut updates, &coordinator).await;
    shutdown.cancel();
    task.await.context("Run coordinator panicked")?;
    let state = outcome?;

    match state.status {
        RunStatus::Complete => {
            let path = output.unwrap_or_else(|| {
                PathBuf::from(export::default_filename(
                    Some(url.as_str()),
                    chrono::Local::now().date_naive(),
                ))
            });
            export::write_csv_file(&path, &state.records)?;
            tracing::info!(
                records = state.records.len(),
                path = %path.display(),
                "Wrote CSV"
            );
            Ok(())
        }
        RunStatus::Error => bail!("Scrape failed: {}", state.error_message),
        RunStatus::Idle | RunStatus::Running => bail!("Scrape cancelled"),
    }
}

/// Follow broadcast updates until the run settles or the user hits Ctrl-C.
async fn wait_for_outcome(
    updates: &mut tokio::sync::broadcast::Receiver<RunState>,
    coordinator: &gleaner_core::CoordinatorHandle,
) -> Result<RunState> {
    let mut last_progress = 0;
    loop {
        tokio::select! {
            signal = tokio::signal::ctrl_c() => {
                signal.context("Failed to listen for Ctrl-C")?;
                tracing::info!("Interrupted, cancelling scrape");
                return Ok(coordinator.cancel().await?);
            }
            update = updates.recv() => match update {
                Ok(state) if state.status == RunStatus::Running => {
                    if state.progress != last_progress {
                        last_progress = state.progress;
                        tracing::info!("Scraping... {}%", state.progress);
                    }
                }
                Ok(state) => return Ok(state),
                Err(RecvError::Lagged(skipped)) => {
                    tracing::debug!(%skipped, "Progress updates skipped");
                }
                Err(RecvError::Closed) => bail!("Run coordinator stopped unexpectedly"),
            }
        }
    }
}

async fn cmd_extract(url: Url, config: ScrapeConfig) -> Result<()> {
    let fetcher = ReqwestFetcher::from_config(&config)
        .context("Failed to create HTTP client")?
        .allow_private_urls();
    let extractor =
        FieldExtractor::new(&config.selectors).context("Invalid selector configuration")?;

    tracing::info!("Fetching {}", url);
    let html = fetcher.fetch(url.as_str()).await?;
    tracing::info!("Fetched {} bytes of HTML", html.len());

    let record = extractor.extract(&html, &Locator::new(url));
    println!("{}", serde_json::to_string_pretty(&record)?);
    Ok(())
}
