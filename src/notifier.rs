pub mod discord;
pub mod message;
pub mod terminal;

use error_stack::Report;
use futures::future::BoxFuture;
use tracing::{error, info};

use crate::error::NotificationError;
use crate::model::NotificationOutcome;
use message::Message;

/// Sink for notifications.
pub trait Notifier: Send + Sync {
    fn name(&self) -> &'static str;

    /// Deliver `message`, returning the sink's HTTP status on success.
    fn send<'a>(
        &'a self,
        message: &'a Message,
    ) -> BoxFuture<'a, Result<u16, Report<NotificationError>>>;
}

/// Send `message` and fold the result into an outcome, logging either way.
pub async fn notify(notifier: &dyn Notifier, message: &Message) -> NotificationOutcome {
    match notifier.send(message).await {
        Ok(status) => {
            info!(sink = notifier.name(), title = %message.title, status, "notification sent");
            NotificationOutcome::delivered(status)
        }
        Err(report) => {
            error!(sink = notifier.name(), title = %message.title, error = ?report, "notification failed");
            NotificationOutcome::failed(format!("{report:#}"))
        }
    }
}

/// Send one synthetic test message, independent of any rate check.
pub async fn send_test(notifier: &dyn Notifier) -> NotificationOutcome {
    notify(notifier, &Message::test()).await
}

#[cfg(test)]
pub(crate) mod testing {
    use std::sync::Mutex;

    use super::*;

    /// Records every message instead of delivering it.
    #[derive(Default)]
    pub struct RecordingNotifier {
        sent: Mutex<Vec<Message>>,
        fail: bool,
    }

    impl RecordingNotifier {
        pub fn failing() -> Self {
            Self {
                sent: Mutex::default(),
                fail: true,
            }
        }

        pub fn sent(&self) -> Vec<Message> {
            self.sent.lock().unwrap().clone()
        }
    }

    impl Notifier for RecordingNotifier {
        fn name(&self) -> &'static str {
            "recording"
        }

        fn send<'a>(
            &'a self,
            message: &'a Message,
        ) -> BoxFuture<'a, Result<u16, Report<NotificationError>>> {
            self.sent.lock().unwrap().push(message.clone());
            let fail = self.fail;
            Box::pin(async move {
                if fail {
                    Err(Report::new(NotificationError::Status {
                        status: 500,
                        reason: "sink unavailable".into(),
                    }))
                } else {
                    Ok(204)
                }
            })
        }
    }
}
