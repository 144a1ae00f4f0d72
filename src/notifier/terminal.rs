use error_stack::Report;
use futures::future::BoxFuture;

use crate::error::NotificationError;
use crate::notifier::Notifier;
use crate::notifier::message::Message;

/// Writes notifications to the log instead of a webhook (`--dry-run`).
pub struct TerminalNotifier;

impl Notifier for TerminalNotifier {
    fn name(&self) -> &'static str {
        "terminal"
    }

    fn send<'a>(
        &'a self,
        message: &'a Message,
    ) -> BoxFuture<'a, Result<u16, Report<NotificationError>>> {
        tracing::warn!(
            kind = ?message.kind,
            link = message.link.as_ref().map(|u| u.as_str()),
            "NOTIFY: {}\n{}",
            message.title,
            message.body,
        );
        Box::pin(async { Ok(0) })
    }
}
