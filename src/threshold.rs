use crate::model::{AlertDecision, ExchangeRate};

/// Decide whether `rate` warrants an alert.
///
/// The boundary is inclusive: a rate exactly at `threshold` alerts.
pub fn evaluate(rate: ExchangeRate, threshold: f64) -> AlertDecision {
    AlertDecision {
        should_alert: rate.value() >= threshold,
        rate,
        threshold,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rate(value: f64) -> ExchangeRate {
        ExchangeRate::new(value).unwrap()
    }

    #[test]
    fn alerts_above_threshold() {
        let decision = evaluate(rate(1823.45), 1700.0);
        assert!(decision.should_alert);
        assert_eq!(decision.threshold, 1700.0);
        assert_eq!(decision.rate.value(), 1823.45);
    }

    #[test]
    fn silent_below_threshold() {
        assert!(!evaluate(rate(1650.0), 1700.0).should_alert);
    }

    #[test]
    fn alerts_exactly_at_threshold() {
        assert!(evaluate(rate(1700.0), 1700.0).should_alert);
    }

    #[test]
    fn silent_just_below_threshold() {
        let just_below = 1700.0 - 1e-9;
        assert!(!evaluate(rate(just_below), 1700.0).should_alert);
    }

    #[test]
    fn monotonic_in_rate() {
        for threshold in [150.0, 1000.0, 1700.0, 1700.5, 9999.0] {
            let mut alerted = false;
            let mut value = 100.0;
            while value <= 10_000.0 {
                let now = evaluate(rate(value), threshold).should_alert;
                assert!(
                    !(alerted && !now),
                    "alert flipped off at {value} for threshold {threshold}"
                );
                alerted = now;
                value += 12.5;
            }
            assert!(alerted, "never alerted for threshold {threshold}");
        }
    }
}
