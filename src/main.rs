mod config;
mod error;
mod extract;
mod fetch;
mod model;
mod notifier;
mod pipeline;
mod retry;
mod selftest;
mod threshold;

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use derive_more::{Display, Error};
use error_stack::{Report, ResultExt};
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

use config::AppConfig;
use error::PipelineError;
use fetch::Fetcher;
use notifier::Notifier;
use notifier::discord::DiscordNotifier;
use notifier::terminal::TerminalNotifier;
use pipeline::RunReport;

#[derive(Debug, Display, Error)]
pub enum AppError {
    #[display("configuration error")]
    Config,
    #[display("rate check failed")]
    Pipeline,
    #[display("notification delivery failed")]
    Notification,
    #[display("self-test failed")]
    SelfTest,
}

#[derive(Parser)]
#[command(name = "fx-notifier", about = "EUR/ARS exchange rate threshold notifier")]
struct Cli {
    /// Optional TOML configuration file; environment variables take precedence
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Log notifications instead of posting them to Discord
    #[arg(long)]
    dry_run: bool,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand)]
enum Command {
    /// Check the rate once and alert if it is at or above the threshold (default)
    Run,
    /// Verify configuration, scraping and notification delivery
    Check,
    /// Send a test notification
    TestNotify {
        /// Send one message of every kind instead of a single test message
        #[arg(long)]
        all: bool,
    },
}

#[tokio::main(flavor = "current_thread")]
async fn main() {
    if let Err(report) = run().await {
        eprintln!("{report:?}");
        std::process::exit(1);
    }
}

async fn run() -> Result<(), Report<AppError>> {
    let cli = Cli::parse();

    let dotenv_error = match dotenvy::dotenv() {
        Ok(_) => None,
        Err(e) if e.not_found() => None,
        Err(e) => Some(e),
    };

    let config = config::load(cli.config.as_deref(), |key| std::env::var(key).ok())
        .change_context(AppError::Config)?;

    init_tracing(&config);

    if let Some(e) = dotenv_error {
        warn!(error = %e, "ignoring unreadable .env file");
    }

    let notifier: Box<dyn Notifier> = if cli.dry_run {
        Box::new(TerminalNotifier)
    } else {
        Box::new(DiscordNotifier::new(&config.discord).change_context(AppError::Notification)?)
    };

    match cli.command.unwrap_or(Command::Run) {
        Command::Run => check_rate(&config, notifier.as_ref()).await,
        Command::Check => self_test(&config, notifier.as_ref()).await,
        Command::TestNotify { all } => test_notify(&config, notifier.as_ref(), all).await,
    }
}

fn init_tracing(config: &AppConfig) {
    let filter = EnvFilter::new(&config.general.log_level);
    match config.general.log_format.as_str() {
        "json" => {
            tracing_subscriber::fmt()
                .json()
                .with_env_filter(filter)
                .init();
        }
        _ => {
            tracing_subscriber::fmt().with_env_filter(filter).init();
        }
    }
}

async fn check_rate(config: &AppConfig, notifier: &dyn Notifier) -> Result<(), Report<AppError>> {
    let fetcher = Fetcher::new(&config.source).change_context(AppError::Pipeline)?;
    let result = pipeline::run_once(config, &fetcher, notifier).await;
    conclude_run(config, notifier, result).await
}

/// Map a pipeline result to the process outcome.
///
/// A completed run is `Ok` even when alert delivery failed; a fatal stage is
/// reported to the sink only when `notify_on_error` is set.
async fn conclude_run(
    config: &AppConfig,
    notifier: &dyn Notifier,
    result: Result<RunReport, Report<PipelineError>>,
) -> Result<(), Report<AppError>> {
    match result {
        Ok(report) => {
            let delivery = report
                .notification
                .as_ref()
                .map_or_else(|| "no alert due".to_owned(), ToString::to_string);
            info!(
                rate = report.decision.rate.value(),
                threshold = report.decision.threshold,
                alert = report.decision.should_alert,
                fetch_attempts = report.fetch_attempts,
                delivery = %delivery,
                "run complete"
            );
            Ok(())
        }
        Err(report) => {
            error!(error = %format!("{report:#}"), "run failed");
            if config.discord.notify_on_error {
                pipeline::report_failure(notifier, &report).await;
            }
            Err(report.change_context(AppError::Pipeline))
        }
    }
}

async fn self_test(config: &AppConfig, notifier: &dyn Notifier) -> Result<(), Report<AppError>> {
    let fetcher = Fetcher::new(&config.source).change_context(AppError::SelfTest)?;
    let results = selftest::run_checks(config, &fetcher, notifier).await;
    selftest::print_summary(&results);

    let failed: Vec<_> = results.iter().filter(|r| !r.passed).map(|r| r.name).collect();
    if failed.is_empty() {
        Ok(())
    } else {
        Err(Report::new(AppError::SelfTest).attach(format!("failed checks: {failed:?}")))
    }
}

async fn test_notify(
    config: &AppConfig,
    notifier: &dyn Notifier,
    all: bool,
) -> Result<(), Report<AppError>> {
    let outcomes = if all {
        selftest::send_samples(config, notifier).await
    } else {
        vec![notifier::send_test(notifier).await]
    };

    for outcome in &outcomes {
        println!("{outcome}");
    }

    match outcomes.iter().find(|o| !o.delivered) {
        None => Ok(()),
        Some(outcome) => Err(Report::new(AppError::Notification).attach(outcome.to_string())),
    }
}
