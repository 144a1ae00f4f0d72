use derive_more::{Display, Error};

#[derive(Debug, Clone, Display, Error)]
pub enum ConfigError {
    #[display("failed to read config file")]
    ReadFile,
    #[display("failed to parse config: {reason}")]
    Parse { reason: String },
    #[display("missing required setting: {key}")]
    Missing { key: String },
    #[display("invalid setting {key}: {reason}")]
    Invalid { key: String, reason: String },
}

#[derive(Debug, Display, Error)]
pub enum FetchError {
    #[display("failed to build HTTP client")]
    Client,
    #[display("request failed")]
    Request,
    #[display("unexpected HTTP status {status}")]
    Status { status: u16 },
    #[display("failed to read response body")]
    Body,
    #[display("giving up after {attempts} attempt(s)")]
    Exhausted { attempts: u32 },
}

#[derive(Debug, Clone, Display, Error)]
pub enum ExtractError {
    #[display("no rate candidate found in document (page layout may have changed)")]
    NotFound,
    #[display("rate candidate {candidate:?} is not a valid decimal number")]
    Malformed { candidate: String },
    #[display("rate {value} is outside the plausible range")]
    Implausible { value: f64 },
}

impl ExtractError {
    /// `true` when a candidate was found but could not be turned into a rate.
    pub fn is_parse_failure(&self) -> bool {
        !matches!(self, Self::NotFound)
    }
}

#[derive(Debug, Display, Error)]
pub enum NotificationError {
    #[display("failed to build HTTP client")]
    Client,
    #[display("webhook request failed")]
    Request,
    #[display("webhook returned HTTP {status}: {reason}")]
    Status { status: u16, reason: String },
}

/// Stage label for a failed pipeline pass.
#[derive(Debug, Display, Error)]
pub enum PipelineError {
    #[display("fetch stage failed")]
    Fetch,
    #[display("extraction stage failed")]
    Extraction,
    #[display("parse stage failed")]
    Parse,
}
