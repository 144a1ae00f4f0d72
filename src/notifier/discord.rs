use chrono::Utc;
use error_stack::{Report, ResultExt};
use futures::future::BoxFuture;
use reqwest::Url;
use serde::{Deserialize, Serialize};

use crate::config::DiscordConfig;
use crate::error::NotificationError;
use crate::notifier::Notifier;
use crate::notifier::message::Message;
use crate::retry::{RetryPolicy, retry};

const FOOTER: &str = "Exchange Rate Monitor";
const MAX_REASON_LEN: usize = 200;

/// Posts messages to a Discord webhook as a single embed.
pub struct DiscordNotifier {
    client: reqwest::Client,
    webhook_url: Url,
    username: String,
    retry: RetryPolicy,
}

impl DiscordNotifier {
    pub fn new(config: &DiscordConfig) -> Result<Self, Report<NotificationError>> {
        let client = reqwest::Client::builder()
            .timeout(config.timeout)
            .build()
            .change_context(NotificationError::Client)?;

        Ok(Self {
            client,
            webhook_url: config.webhook_url.clone(),
            username: config.username.clone(),
            retry: config.retry,
        })
    }

    fn payload<'a>(&'a self, message: &'a Message) -> WebhookPayload<'a> {
        WebhookPayload {
            username: &self.username,
            embeds: vec![Embed {
                title: &message.title,
                description: &message.body,
                color: message.color,
                url: message.link.as_ref().map(Url::as_str),
                timestamp: Utc::now().to_rfc3339(),
                footer: Footer { text: FOOTER },
            }],
        }
    }

    async fn post(&self, payload: &WebhookPayload<'_>) -> Result<u16, Report<NotificationError>> {
        let response = self
            .client
            .post(self.webhook_url.clone())
            .json(payload)
            .send()
            .await
            .change_context(NotificationError::Request)?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(Report::new(NotificationError::Status {
                status: status.as_u16(),
                reason: failure_reason(&body, status.canonical_reason()),
            }));
        }

        Ok(status.as_u16())
    }
}

impl Notifier for DiscordNotifier {
    fn name(&self) -> &'static str {
        "discord"
    }

    fn send<'a>(
        &'a self,
        message: &'a Message,
    ) -> BoxFuture<'a, Result<u16, Report<NotificationError>>> {
        Box::pin(async move {
            let payload = self.payload(message);
            let payload = &payload;
            let delivered = retry(self.retry, "discord webhook", move |_| self.post(payload)).await?;
            Ok(delivered.value)
        })
    }
}

/// Discord's error body, e.g. `{"message": "Invalid Webhook Token", "code": 50027}`.
#[derive(Debug, Deserialize)]
struct DiscordErrorBody {
    message: String,
    code: Option<u64>,
}

fn failure_reason(body: &str, canonical: Option<&str>) -> String {
    if let Ok(err) = serde_json::from_str::<DiscordErrorBody>(body) {
        return match err.code {
            Some(code) => format!("{} (code {code})", err.message),
            None => err.message,
        };
    }
    let body = body.trim();
    if body.is_empty() {
        return canonical.unwrap_or("no response body").to_owned();
    }
    body.chars().take(MAX_REASON_LEN).collect()
}

// ── Wire types ────────────────────────────────────────────────────────────────

#[derive(Debug, Serialize)]
struct WebhookPayload<'a> {
    username: &'a str,
    embeds: Vec<Embed<'a>>,
}

#[derive(Debug, Serialize)]
struct Embed<'a> {
    title: &'a str,
    description: &'a str,
    color: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    url: Option<&'a str>,
    timestamp: String,
    footer: Footer<'a>,
}

#[derive(Debug, Serialize)]
struct Footer<'a> {
    text: &'a str,
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use serde_json::Value;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    use super::*;
    use crate::model::{DeliveryDetail, ExchangeRate};
    use crate::notifier::{notify, send_test};
    use crate::threshold::evaluate;

    const HOOK_PATH: &str = "/api/webhooks/42/token";

    fn discord_config(server: &MockServer, max_retries: u32) -> DiscordConfig {
        DiscordConfig {
            webhook_url: Url::parse(&format!("{}{HOOK_PATH}", server.uri())).unwrap(),
            username: "EUR/ARS Monitor".into(),
            timeout: Duration::from_secs(5),
            retry: RetryPolicy::new(max_retries, Duration::ZERO),
            notify_on_error: false,
        }
    }

    async fn bodies(server: &MockServer) -> Vec<Value> {
        server
            .received_requests()
            .await
            .unwrap()
            .iter()
            .map(|req| serde_json::from_slice(&req.body).unwrap())
            .collect()
    }

    #[tokio::test]
    async fn posts_single_embed_payload() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path(HOOK_PATH))
            .respond_with(ResponseTemplate::new(204))
            .expect(1)
            .mount(&server)
            .await;

        let notifier = DiscordNotifier::new(&discord_config(&server, 0)).unwrap();
        let decision = evaluate(ExchangeRate::new(1823.45).unwrap(), 1700.0);
        let link = Url::parse("https://example.com/eur-ars").unwrap();
        let outcome = notify(&notifier, &Message::rate_alert(&decision, Some(&link))).await;

        assert_eq!(outcome.detail, DeliveryDetail::Status(204));

        let body = &bodies(&server).await[0];
        assert_eq!(body["username"], "EUR/ARS Monitor");
        let embed = &body["embeds"][0];
        assert_eq!(embed["title"], "EUR/ARS Rate Alert - Above Threshold");
        assert_eq!(embed["color"], 0x00FF00);
        assert_eq!(embed["url"], "https://example.com/eur-ars");
        assert_eq!(embed["footer"]["text"], FOOTER);
        assert!(embed["description"].as_str().unwrap().contains("1823.45"));
        assert!(embed["timestamp"].as_str().is_some());
    }

    #[tokio::test]
    async fn test_mode_sends_exactly_one_message() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path(HOOK_PATH))
            .respond_with(ResponseTemplate::new(204))
            .expect(1)
            .mount(&server)
            .await;

        let notifier = DiscordNotifier::new(&discord_config(&server, 3)).unwrap();
        let outcome = send_test(&notifier).await;

        assert!(outcome.delivered);
        let body = &bodies(&server).await[0];
        assert_eq!(body["embeds"][0]["title"], "Test Notification");
        assert!(body["embeds"][0].get("url").is_none());
    }

    #[tokio::test]
    async fn non_2xx_is_failure_with_discord_reason() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(
                ResponseTemplate::new(401)
                    .set_body_string(r#"{"message": "Invalid Webhook Token", "code": 50027}"#),
            )
            .expect(1)
            .mount(&server)
            .await;

        let notifier = DiscordNotifier::new(&discord_config(&server, 0)).unwrap();
        let report = notifier.send(&Message::test()).await.unwrap_err();

        match report.current_context() {
            NotificationError::Status { status, reason } => {
                assert_eq!(*status, 401);
                assert_eq!(reason, "Invalid Webhook Token (code 50027)");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[tokio::test]
    async fn no_retry_by_default() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(500))
            .expect(1)
            .mount(&server)
            .await;

        let notifier = DiscordNotifier::new(&discord_config(&server, 0)).unwrap();
        let outcome = send_test(&notifier).await;
        assert!(!outcome.delivered);
    }

    #[tokio::test]
    async fn configured_retries_use_shared_policy() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(502))
            .up_to_n_times(1)
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200))
            .mount(&server)
            .await;

        let notifier = DiscordNotifier::new(&discord_config(&server, 1)).unwrap();
        let outcome = send_test(&notifier).await;

        assert_eq!(outcome, crate::model::NotificationOutcome::delivered(200));
        assert_eq!(server.received_requests().await.unwrap().len(), 2);
    }

    #[test]
    fn failure_reason_falls_back_to_body_or_status_text() {
        assert_eq!(failure_reason("", Some("Bad Gateway")), "Bad Gateway");
        assert_eq!(failure_reason("  upstream down ", None), "upstream down");
        assert_eq!(
            failure_reason(r#"{"message": "You are being rate limited."}"#, None),
            "You are being rate limited."
        );
        assert_eq!(failure_reason(&"x".repeat(500), None).len(), MAX_REASON_LEN);
    }
}
