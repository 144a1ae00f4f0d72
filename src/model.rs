use std::fmt;

/// The only pair this tool tracks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CurrencyPair {
    EurArs,
}

impl CurrencyPair {
    pub fn base(self) -> &'static str {
        match self {
            Self::EurArs => "EUR",
        }
    }

    pub fn quote(self) -> &'static str {
        match self {
            Self::EurArs => "ARS",
        }
    }
}

impl fmt::Display for CurrencyPair {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.base(), self.quote())
    }
}

/// Raw page body and the attempt that fetched it.
#[derive(Debug, Clone)]
pub struct FetchResult {
    pub raw_html: String,
    pub attempts_used: u32,
}

/// A validated exchange rate: always finite and strictly positive.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ExchangeRate {
    value: f64,
    pair: CurrencyPair,
}

impl ExchangeRate {
    pub fn new(value: f64) -> Option<Self> {
        (value.is_finite() && value > 0.0).then_some(Self {
            value,
            pair: CurrencyPair::EurArs,
        })
    }

    pub fn value(&self) -> f64 {
        self.value
    }

    pub fn pair(&self) -> CurrencyPair {
        self.pair
    }
}

impl fmt::Display for ExchangeRate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{:.2} {} per {}",
            self.value,
            self.pair.quote(),
            self.pair.base()
        )
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AlertDecision {
    pub should_alert: bool,
    pub rate: ExchangeRate,
    pub threshold: f64,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeliveryDetail {
    /// HTTP status returned by the sink (0 for sinks without one).
    Status(u16),
    Failed(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NotificationOutcome {
    pub delivered: bool,
    pub detail: DeliveryDetail,
}

impl NotificationOutcome {
    pub fn delivered(status: u16) -> Self {
        Self {
            delivered: true,
            detail: DeliveryDetail::Status(status),
        }
    }

    pub fn failed(reason: impl Into<String>) -> Self {
        Self {
            delivered: false,
            detail: DeliveryDetail::Failed(reason.into()),
        }
    }
}

impl fmt::Display for NotificationOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.detail {
            DeliveryDetail::Status(status) => write!(f, "delivered (HTTP {status})"),
            DeliveryDetail::Failed(reason) => write!(f, "not delivered: {reason}"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rate_rejects_non_positive_and_non_finite() {
        assert!(ExchangeRate::new(0.0).is_none());
        assert!(ExchangeRate::new(-1.5).is_none());
        assert!(ExchangeRate::new(f64::NAN).is_none());
        assert!(ExchangeRate::new(f64::INFINITY).is_none());
        assert!(ExchangeRate::new(1688.559).is_some());
    }

    #[test]
    fn rate_display_uses_two_decimals() {
        let rate = ExchangeRate::new(1688.559).unwrap();
        assert_eq!(rate.to_string(), "1688.56 ARS per EUR");
        assert_eq!(rate.pair(), CurrencyPair::EurArs);
    }

    #[test]
    fn currency_pair_display() {
        assert_eq!(CurrencyPair::EurArs.to_string(), "EUR/ARS");
    }

    #[test]
    fn outcome_display() {
        assert_eq!(
            NotificationOutcome::delivered(204).to_string(),
            "delivered (HTTP 204)"
        );
        assert_eq!(
            NotificationOutcome::failed("timeout").to_string(),
            "not delivered: timeout"
        );
    }
}
