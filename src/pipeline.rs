use error_stack::{Report, ResultExt};
use tracing::{info, warn};

use crate::config::AppConfig;
use crate::error::PipelineError;
use crate::extract::Extractor;
use crate::fetch::Fetcher;
use crate::model::{AlertDecision, NotificationOutcome};
use crate::notifier::message::Message;
use crate::notifier::{Notifier, notify};
use crate::threshold::evaluate;

/// What one pass of the pipeline observed and did.
#[derive(Debug, Clone)]
pub struct RunReport {
    pub fetch_attempts: u32,
    pub decision: AlertDecision,
    /// `None` when no alert was due.
    pub notification: Option<NotificationOutcome>,
}

/// Fetch → extract → evaluate → maybe notify, once.
///
/// A failed notification is recorded in the report but does not fail the run.
pub async fn run_once(
    config: &AppConfig,
    fetcher: &Fetcher,
    notifier: &dyn Notifier,
) -> Result<RunReport, Report<PipelineError>> {
    let threshold = config.rate.threshold;
    info!(threshold, "checking EUR/ARS rate");

    let fetched = fetcher
        .fetch(&config.source.url)
        .await
        .change_context(PipelineError::Fetch)?;

    let extractor = Extractor::new(&config.rate);
    let rate = extractor.extract(&fetched.raw_html).map_err(|report| {
        let stage = if report.current_context().is_parse_failure() {
            PipelineError::Parse
        } else {
            PipelineError::Extraction
        };
        report.change_context(stage)
    })?;

    info!(
        rate = rate.value(),
        attempts = fetched.attempts_used,
        "current rate: {rate}"
    );

    let decision = evaluate(rate, threshold);
    let notification = if decision.should_alert {
        warn!(rate = rate.value(), threshold, "rate is at or above threshold, sending alert");
        let message = Message::rate_alert(&decision, Some(&config.source.url));
        Some(notify(notifier, &message).await)
    } else {
        info!(
            rate = rate.value(),
            threshold, "rate is below threshold, no alert sent"
        );
        None
    };

    Ok(RunReport {
        fetch_attempts: fetched.attempts_used,
        decision,
        notification,
    })
}

/// Best-effort error message to the sink for a failed run.
pub async fn report_failure(
    notifier: &dyn Notifier,
    report: &Report<PipelineError>,
) -> NotificationOutcome {
    notify(notifier, &Message::error(format!("{report:#}"))).await
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use reqwest::Url;
    use wiremock::matchers::method;
    use wiremock::{Mock, MockServer, ResponseTemplate};

    use super::*;
    use crate::notifier::message::MessageKind;
    use crate::notifier::testing::RecordingNotifier;
    use crate::retry::RetryPolicy;

    fn page(rate_text: &str) -> String {
        format!(
            r#"<html><body><div class="converter"><span class="fx-from">1,00 EUR</span>
            <span class="fx-to">{rate_text} ARS</span></div></body></html>"#
        )
    }

    fn app_config(server: &MockServer, max_retries: u32) -> AppConfig {
        let url = Url::parse(&format!("{}/eur-ars", server.uri())).unwrap();
        let mut config = AppConfig::for_tests(url);
        config.source.retry = RetryPolicy::new(max_retries, Duration::ZERO);
        config
    }

    async fn serve(status: u16, body: &str) -> MockServer {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(status).set_body_string(body))
            .mount(&server)
            .await;
        server
    }

    async fn run(
        server: &MockServer,
        max_retries: u32,
        sink: &RecordingNotifier,
    ) -> Result<RunReport, Report<PipelineError>> {
        let config = app_config(server, max_retries);
        let fetcher = Fetcher::new(&config.source).unwrap();
        run_once(&config, &fetcher, sink).await
    }

    #[tokio::test]
    async fn rate_above_threshold_alerts_once() {
        let server = serve(200, &page("1.823,45")).await;
        let sink = RecordingNotifier::default();

        let report = run(&server, 2, &sink).await.unwrap();

        assert_eq!(report.decision.rate.value(), 1823.45);
        assert!(report.decision.should_alert);
        assert_eq!(report.fetch_attempts, 1);
        assert_eq!(report.notification, Some(NotificationOutcome::delivered(204)));

        let sent = sink.sent();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].kind, MessageKind::RateAlert);
        assert!(sent[0].body.contains("1823.45"));
    }

    #[tokio::test]
    async fn rate_below_threshold_does_not_notify() {
        let server = serve(200, &page("1.650,00")).await;
        let sink = RecordingNotifier::default();

        let report = run(&server, 2, &sink).await.unwrap();

        assert_eq!(report.decision.rate.value(), 1650.0);
        assert!(!report.decision.should_alert);
        assert_eq!(report.notification, None);
        assert!(sink.sent().is_empty());
    }

    #[tokio::test]
    async fn rate_at_threshold_alerts() {
        let server = serve(200, &page("1.700,00")).await;
        let sink = RecordingNotifier::default();

        let report = run(&server, 0, &sink).await.unwrap();

        assert!(report.decision.should_alert);
        assert_eq!(sink.sent().len(), 1);
    }

    #[tokio::test]
    async fn exhausted_fetch_aborts_without_notifying() {
        let server = serve(500, "").await;
        let sink = RecordingNotifier::default();

        let report = run(&server, 2, &sink).await.unwrap_err();

        assert!(matches!(report.current_context(), PipelineError::Fetch));
        assert_eq!(server.received_requests().await.unwrap().len(), 3);
        assert!(sink.sent().is_empty());
    }

    #[tokio::test]
    async fn missing_rate_is_an_extraction_failure() {
        let server = serve(200, "<html><body><h1>Mantenimiento</h1></body></html>").await;
        let sink = RecordingNotifier::default();

        let report = run(&server, 0, &sink).await.unwrap_err();

        assert!(matches!(report.current_context(), PipelineError::Extraction));
        assert!(sink.sent().is_empty());
    }

    #[tokio::test]
    async fn malformed_rate_is_a_parse_failure() {
        let server = serve(200, r#"<span class="fx-to">ARS</span>"#).await;
        let sink = RecordingNotifier::default();

        let report = run(&server, 0, &sink).await.unwrap_err();

        assert!(matches!(report.current_context(), PipelineError::Parse));
        assert!(format!("{report:#}").contains("not a valid decimal"));
    }

    #[tokio::test]
    async fn failed_alert_delivery_keeps_the_run_successful() {
        let server = serve(200, &page("1.823,45")).await;
        let sink = RecordingNotifier::failing();

        let report = run(&server, 0, &sink).await.unwrap();

        assert_eq!(report.decision.rate.value(), 1823.45);
        let outcome = report.notification.unwrap();
        assert!(!outcome.delivered);
    }

    #[tokio::test]
    async fn failure_report_sends_error_message() {
        let server = serve(503, "").await;
        let quiet = RecordingNotifier::default();
        let report = run(&server, 0, &quiet).await.unwrap_err();

        let sink = RecordingNotifier::default();
        let outcome = report_failure(&sink, &report).await;

        assert!(outcome.delivered);
        let sent = sink.sent();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].kind, MessageKind::Error);
        assert!(sent[0].body.contains("fetch stage failed"));
    }
}
