use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use scour_common::ScourError;
use scour_common::observability::{LogConfig, LogFormat, init_logging};
use scour_config::{ScourConfig, ScourConfigLoader};
use scour_web::SafeSearch;
use wiring::Scour;

mod wiring;

#[derive(Parser, Debug)]
#[command(name = "scour", version, about = "Fetch, normalize and search web content")]
struct Cli {
    /// YAML configuration file; environment variables override it.
    #[arg(long, env = "SCOUR_CONFIG", default_value = "scour.yaml")]
    config: PathBuf,

    /// Mirror log events to stderr.
    #[arg(long, short)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Fetch a page and print it as a normalized document.
    Fetch {
        url: String,
        /// Per-request timeout; capped by `fetch.max_timeout_ms`.
        #[arg(long)]
        timeout_ms: Option<u64>,
    },
    /// Run one web search.
    Search {
        query: String,
        #[command(flatten)]
        opts: SearchOpts,
    },
    /// Run several web searches as one rate-limited batch.
    Batch {
        #[arg(required = true)]
        queries: Vec<String>,
        #[command(flatten)]
        opts: SearchOpts,
    },
    /// Remove expired and corrupt cache entries.
    Sweep {
        /// Keep sweeping every `cache.sweep_interval_secs` until Ctrl-C.
        #[arg(long)]
        watch: bool,
    },
}

#[derive(clap::Args, Debug)]
struct SearchOpts {
    #[arg(long)]
    count: Option<usize>,
    #[arg(long, default_value = "moderate")]
    safe: SafeSearch,
    /// Region code (`ru-by`) or alias (`belarus`, `usa`, ...).
    #[arg(long)]
    region: Option<String>,
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    if let Err(e) = init_logging(LogConfig {
        app_name: "scour",
        emit_stderr: cli.verbose,
        format: LogFormat::from_env(),
        ..LogConfig::default()
    }) {
        eprintln!("logging disabled: {e:#}");
    }

    let cfg: ScourConfig = match ScourConfigLoader::new()
        .with_optional_file(&cli.config)
        .load()
    {
        Ok(cfg) => cfg,
        Err(e) => {
            eprintln!("{}", ScourError::Config(e.to_string()).to_message());
            return ExitCode::FAILURE;
        }
    };

    match run(cli.command, &cfg).await {
        Ok(out) => {
            println!("{out}");
            ExitCode::SUCCESS
        }
        Err(e) => {
            let err = e
                .downcast::<ScourError>()
                .unwrap_or_else(ScourError::Other);
            tracing::error!(error = %err, kind = %err.kind(), "scour.command_failed");
            eprintln!("{}", err.to_message());
            ExitCode::FAILURE
        }
    }
}

async fn run(command: Command, cfg: &ScourConfig) -> Result<String> {
    let mut scour = Scour::build(cfg)?;
    let outcome = match command {
        Command::Fetch { url, timeout_ms } => scour
            .fetcher
            .fetch(&url, timeout_ms)
            .await
            .map_err(ScourError::from),
        Command::Search { query, opts } => scour
            .search
            .web_search(&query, opts.count, opts.safe, opts.region.as_deref())
            .await
            .map_err(ScourError::from),
        Command::Batch { queries, opts } => scour
            .search
            .batch_search(&queries, opts.count, opts.safe, opts.region.as_deref())
            .await
            .map_err(ScourError::from),
        Command::Sweep { watch: false } => {
            let removed = scour.caches.sweep_all().await;
            Ok(format!("removed {removed} cache entries"))
        }
        Command::Sweep { watch: true } => {
            scour.start_sweeper(cfg);
            tracing::info!(interval_ms = cfg.cache.sweep_interval().as_millis() as u64, "scour.sweeper_watching");
            tokio::signal::ctrl_c()
                .await
                .context("waiting for Ctrl-C")
                .map(|()| "sweeper stopped".to_string())
                .map_err(ScourError::Other)
        }
    };
    scour.shutdown().await;
    Ok(outcome?)
}
