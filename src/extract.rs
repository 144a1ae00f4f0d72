pub mod number;
pub mod strategy;

use error_stack::Report;
use tracing::{debug, warn};

use crate::config::RateConfig;
use crate::error::ExtractError;
use crate::model::ExchangeRate;
use number::DecimalConvention;
use strategy::{Document, Strategy, default_strategies};

/// Pulls the EUR→ARS rate out of a fetched page.
#[derive(Debug, Clone)]
pub struct Extractor {
    strategies: Vec<Strategy>,
    convention: DecimalConvention,
    min_plausible: f64,
    max_plausible: f64,
}

impl Extractor {
    pub fn new(config: &RateConfig) -> Self {
        Self {
            strategies: default_strategies(),
            convention: config.decimal_convention,
            min_plausible: config.min_plausible,
            max_plausible: config.max_plausible,
        }
    }

    /// Replace the strategy list; order is preserved.
    #[cfg(test)]
    fn with_strategies(mut self, strategies: Vec<Strategy>) -> Self {
        self.strategies = strategies;
        self
    }

    /// Try each strategy in order and return the first candidate that parses.
    ///
    /// With no candidate at all the result is [`ExtractError::NotFound`];
    /// when candidates exist but none parse, the first candidate's failure
    /// is returned.
    pub fn extract(&self, html: &str) -> Result<ExchangeRate, Report<ExtractError>> {
        let doc = Document::parse(html);
        let mut first_failure: Option<Report<ExtractError>> = None;

        for strategy in &self.strategies {
            let Some(candidate) = (strategy.find)(&doc) else {
                debug!(strategy = strategy.name, "no candidate");
                continue;
            };

            match self.parse_candidate(&candidate) {
                Ok(rate) => {
                    debug!(
                        strategy = strategy.name,
                        candidate = %candidate,
                        rate = rate.value(),
                        "rate extracted"
                    );
                    return Ok(rate);
                }
                Err(report) => {
                    warn!(
                        strategy = strategy.name,
                        candidate = %candidate,
                        error = %report.current_context(),
                        "candidate rejected"
                    );
                    if first_failure.is_none() {
                        first_failure = Some(report.attach(format!("strategy: {}", strategy.name)));
                    }
                }
            }
        }

        Err(first_failure.unwrap_or_else(|| {
            let tried: Vec<_> = self.strategies.iter().map(|s| s.name).collect();
            Report::new(ExtractError::NotFound).attach(format!("strategies tried: {tried:?}"))
        }))
    }

    fn parse_candidate(&self, candidate: &str) -> Result<ExchangeRate, Report<ExtractError>> {
        let malformed = || {
            Report::new(ExtractError::Malformed {
                candidate: candidate.to_owned(),
            })
        };

        let value = number::parse_decimal(candidate, self.convention).ok_or_else(malformed)?;

        if !(self.min_plausible..=self.max_plausible).contains(&value) {
            return Err(Report::new(ExtractError::Implausible { value }).attach(format!(
                "plausible range: [{}, {}]",
                self.min_plausible, self.max_plausible
            )));
        }

        ExchangeRate::new(value).ok_or_else(malformed)
    }
}
