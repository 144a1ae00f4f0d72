use std::fmt;

use reqwest::Url;

use crate::model::AlertDecision;

const COLOR_ABOVE: u32 = 0x00FF00;
const COLOR_BELOW: u32 = 0xFF6B6B;
const COLOR_ERROR: u32 = 0xFF0000;
const COLOR_TEST: u32 = 0x3498DB;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MessageKind {
    RateAlert,
    Error,
    Test,
}

/// A sink-agnostic notification.
#[derive(Debug, Clone, PartialEq)]
pub struct Message {
    pub kind: MessageKind,
    pub title: String,
    /// Markdown body.
    pub body: String,
    /// `0xRRGGBB` accent color.
    pub color: u32,
    pub link: Option<Url>,
}

impl Message {
    pub fn rate_alert(decision: &AlertDecision, source: Option<&Url>) -> Self {
        let above = decision.should_alert;
        let (direction, emoji, color) = if above {
            ("above", "📈", COLOR_ABOVE)
        } else {
            ("below", "📉", COLOR_BELOW)
        };
        let pair = decision.rate.pair();

        let mut body = format!(
            "{emoji} **Exchange rate is {direction} threshold!**\n\n\
             **Current Rate:** {rate}\n\
             **Threshold:** {threshold:.2} {quote} per {base}",
            rate = decision.rate,
            threshold = decision.threshold,
            quote = pair.quote(),
            base = pair.base(),
        );
        if let Some(url) = source {
            body.push_str(&format!("\n\n[View on Western Union]({url})"));
        }

        let title_direction = if above { "Above" } else { "Below" };
        Self {
            kind: MessageKind::RateAlert,
            title: format!("{pair} Rate Alert - {title_direction} Threshold"),
            body,
            color,
            link: source.cloned(),
        }
    }

    pub fn error(detail: impl fmt::Display) -> Self {
        Self {
            kind: MessageKind::Error,
            title: "Exchange Rate Monitor Error".into(),
            body: format!("❌ **Error occurred:**\n\n{detail}"),
            color: COLOR_ERROR,
            link: None,
        }
    }

    pub fn test() -> Self {
        Self {
            kind: MessageKind::Test,
            title: "Test Notification".into(),
            body: "🧪 Test notification from Exchange Rate Monitor\n\n\
                   If you see this, notifications are working! ✅"
                .into(),
            color: COLOR_TEST,
            link: None,
        }
    }
}
