use tracing::info;

use crate::config::AppConfig;
use crate::extract::Extractor;
use crate::fetch::Fetcher;
use crate::model::{ExchangeRate, NotificationOutcome};
use crate::notifier::message::Message;
use crate::notifier::{Notifier, notify, send_test};
use crate::threshold::evaluate;

/// Rate used for the sample alert sent by `test-notify --all`.
const SAMPLE_RATE: f64 = 1750.50;

#[derive(Debug, Clone)]
pub struct CheckResult {
    pub name: &'static str,
    pub passed: bool,
    pub detail: String,
}

impl CheckResult {
    fn new(name: &'static str, passed: bool, detail: impl Into<String>) -> Self {
        Self {
            name,
            passed,
            detail: detail.into(),
        }
    }
}

/// Exercise every component once: config, scraping and notification delivery.
///
/// The scraper check never sends an alert; the notifier check sends one test
/// message.
pub async fn run_checks(
    config: &AppConfig,
    fetcher: &Fetcher,
    notifier: &dyn Notifier,
) -> Vec<CheckResult> {
    let mut results = vec![CheckResult::new(
        "config",
        true,
        format!(
            "source {}, webhook {}, threshold {:.2}",
            config.source.url,
            config.discord.redacted_webhook(),
            config.rate.threshold
        ),
    )];

    results.push(check_scraper(config, fetcher).await);

    let outcome = send_test(notifier).await;
    results.push(CheckResult::new(
        "notifier",
        outcome.delivered,
        outcome.to_string(),
    ));

    results
}

async fn check_scraper(config: &AppConfig, fetcher: &Fetcher) -> CheckResult {
    let fetched = match fetcher.fetch(&config.source.url).await {
        Ok(fetched) => fetched,
        Err(report) => return CheckResult::new("scraper", false, format!("{report:#}")),
    };

    match Extractor::new(&config.rate).extract(&fetched.raw_html) {
        Ok(rate) => {
            let decision = evaluate(rate, config.rate.threshold);
            let side = if decision.should_alert { "ABOVE" } else { "BELOW" };
            CheckResult::new(
                "scraper",
                true,
                format!(
                    "rate {rate} is {side} threshold ({:.2})",
                    config.rate.threshold
                ),
            )
        }
        Err(report) => CheckResult::new("scraper", false, format!("{report:#}")),
    }
}

/// Send one message of every kind for visual inspection.
pub async fn send_samples(
    config: &AppConfig,
    notifier: &dyn Notifier,
) -> Vec<NotificationOutcome> {
    let mut messages = vec![Message::test()];
    if let Some(rate) = ExchangeRate::new(SAMPLE_RATE) {
        let decision = evaluate(rate, config.rate.threshold);
        messages.push(Message::rate_alert(&decision, Some(&config.source.url)));
    }
    messages.push(Message::error("Test error - Western Union unavailable"));

    let mut outcomes = Vec::with_capacity(messages.len());
    for message in &messages {
        info!(kind = ?message.kind, "sending sample notification");
        outcomes.push(notify(notifier, message).await);
    }
    outcomes
}

/// Print a PASSED/FAILED line per check.
pub fn print_summary(results: &[CheckResult]) {
    println!("{}", "=".repeat(60));
    println!("Self-test results");
    println!("{}", "=".repeat(60));
    for result in results {
        let status = if result.passed { "PASSED" } else { "FAILED" };
        println!("{:<10} {status}  {}", result.name, result.detail);
    }
    println!("{}", "=".repeat(60));
    if results.iter().all(|r| r.passed) {
        println!("All checks passed. Monitor is ready to use.");
    } else {
        println!("Some checks failed. Check configuration and try again.");
    }
}
