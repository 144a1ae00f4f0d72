use std::fmt::Display;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

use error_stack::{Report, ResultExt};
use reqwest::Url;
use serde::Deserialize;

use crate::error::ConfigError;
use crate::extract::number::DecimalConvention;
use crate::retry::RetryPolicy;

const DEFAULT_LOG_LEVEL: &str = "info";
const DEFAULT_LOG_FORMAT: &str = "text";
const DEFAULT_MAX_RETRIES: u32 = 2;
const DEFAULT_DELAY_SECS: f64 = 1.0;
const DEFAULT_FETCH_TIMEOUT_SECS: u64 = 30;
pub(crate) const DEFAULT_USER_AGENT: &str = "Mozilla/5.0 (X11; Linux x86_64) AppleWebKit/537.36 \
     (KHTML, like Gecko) Chrome/126.0 Safari/537.36";
const DEFAULT_DEBUG_DIR: &str = "./debug_output";
const DEFAULT_MIN_PLAUSIBLE: f64 = 100.0;
const DEFAULT_MAX_PLAUSIBLE: f64 = 10_000.0;
const DEFAULT_USERNAME: &str = "EUR/ARS Monitor";
const DEFAULT_WEBHOOK_TIMEOUT_SECS: u64 = 10;
const WEBHOOK_RETRY_DELAY: Duration = Duration::from_secs(1);

const LOG_FORMATS: &[&str] = &["text", "json"];

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub general: GeneralConfig,
    pub source: SourceConfig,
    pub rate: RateConfig,
    pub discord: DiscordConfig,
}

#[derive(Debug, Clone)]
pub struct GeneralConfig {
    pub log_level: String,
    /// Accepted values: `"text"` | `"json"`
    pub log_format: String,
}

#[derive(Debug, Clone)]
pub struct SourceConfig {
    pub url: Url,
    pub retry: RetryPolicy,
    pub timeout: Duration,
    pub user_agent: String,
    pub debug_html: bool,
    pub debug_dir: PathBuf,
}

#[derive(Debug, Clone)]
pub struct RateConfig {
    pub threshold: f64,
    pub decimal_convention: DecimalConvention,
    pub min_plausible: f64,
    pub max_plausible: f64,
}

#[derive(Debug, Clone)]
pub struct DiscordConfig {
    pub webhook_url: Url,
    pub username: String,
    pub timeout: Duration,
    pub retry: RetryPolicy,
    pub notify_on_error: bool,
}

impl DiscordConfig {
    /// Webhook URL with its token path cut off, safe to print.
    pub fn redacted_webhook(&self) -> String {
        let host = self.webhook_url.host_str().unwrap_or_default();
        format!("{}://{}/…", self.webhook_url.scheme(), host)
    }
}

#[cfg(test)]
impl AppConfig {
    /// Resolved config fetching `source_url` once, with no delays.
    pub(crate) fn for_tests(source_url: Url) -> Self {
        Self {
            general: GeneralConfig {
                log_level: DEFAULT_LOG_LEVEL.into(),
                log_format: DEFAULT_LOG_FORMAT.into(),
            },
            source: SourceConfig {
                url: source_url,
                retry: RetryPolicy::once(),
                timeout: Duration::from_secs(5),
                user_agent: "fx-notifier-test".into(),
                debug_html: false,
                debug_dir: PathBuf::new(),
            },
            rate: RateConfig {
                threshold: 1700.0,
                decimal_convention: DecimalConvention::Auto,
                min_plausible: DEFAULT_MIN_PLAUSIBLE,
                max_plausible: DEFAULT_MAX_PLAUSIBLE,
            },
            discord: DiscordConfig {
                webhook_url: Url::parse("https://discord.com/api/webhooks/1/secret")
                    .expect("test webhook url is valid"),
                username: DEFAULT_USERNAME.into(),
                timeout: Duration::from_secs(5),
                retry: RetryPolicy::once(),
                notify_on_error: false,
            },
        }
    }
}

// ── File layer ────────────────────────────────────────────────────────────────
// Every field is optional so the environment can fill in what the file omits.

#[derive(Debug, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
struct RawConfig {
    general: RawGeneral,
    source: RawSource,
    rate: RawRate,
    discord: RawDiscord,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
struct RawGeneral {
    log_level: Option<String>,
    log_format: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
struct RawSource {
    url: Option<String>,
    max_retries: Option<u32>,
    delay_secs: Option<f64>,
    timeout_secs: Option<u64>,
    user_agent: Option<String>,
    debug_html: Option<bool>,
    debug_dir: Option<PathBuf>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
struct RawRate {
    threshold: Option<f64>,
    decimal_convention: Option<DecimalConvention>,
    min_plausible: Option<f64>,
    max_plausible: Option<f64>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
struct RawDiscord {
    webhook_url: Option<String>,
    username: Option<String>,
    timeout_secs: Option<u64>,
    max_retries: Option<u32>,
    notify_on_error: Option<bool>,
}

/// Load an `AppConfig` from an optional TOML file overlaid with `env`.
///
/// `env` is the variable lookup, normally `|k| std::env::var(k).ok()`.
pub fn load(
    path: Option<&Path>,
    env: impl Fn(&str) -> Option<String>,
) -> Result<AppConfig, Report<ConfigError>> {
    let content = match path {
        Some(path) => std::fs::read_to_string(path)
            .change_context(ConfigError::ReadFile)
            .attach_with(|| format!("path: {}", path.display()))?,
        None => String::new(),
    };
    from_layers(&content, env)
}

fn from_layers(
    toml_content: &str,
    env: impl Fn(&str) -> Option<String>,
) -> Result<AppConfig, Report<ConfigError>> {
    let mut raw: RawConfig = toml::from_str(toml_content).change_context(ConfigError::Parse {
        reason: "invalid TOML syntax or schema mismatch".into(),
    })?;
    apply_env(&mut raw, &env)?;
    resolve(raw)
}

fn apply_env(
    raw: &mut RawConfig,
    env: &impl Fn(&str) -> Option<String>,
) -> Result<(), Report<ConfigError>> {
    // Empty values count as unset.
    let var = |key: &str| env(key).map(|v| v.trim().to_owned()).filter(|v| !v.is_empty());

    if let Some(v) = var("DISCORD_WEBHOOK_URL") {
        raw.discord.webhook_url = Some(v);
    }
    if let Some(v) = var("WESTERN_UNION_URL") {
        raw.source.url = Some(v);
    }
    if let Some(v) = var("RATE_THRESHOLD") {
        raw.rate.threshold = Some(parse_value("RATE_THRESHOLD", &v)?);
    }
    if let Some(v) = var("MAX_RETRIES") {
        raw.source.max_retries = Some(parse_value("MAX_RETRIES", &v)?);
    }
    if let Some(v) = var("DELAY_BETWEEN_REQUESTS") {
        raw.source.delay_secs = Some(parse_value("DELAY_BETWEEN_REQUESTS", &v)?);
    }
    if let Some(v) = env("DEBUG_HTML") {
        raw.source.debug_html = Some(parse_flag(&v));
    }
    if let Some(v) = var("DEBUG_OUTPUT_DIR") {
        raw.source.debug_dir = Some(PathBuf::from(v));
    }
    if let Some(v) = var("LOG_LEVEL") {
        raw.general.log_level = Some(v);
    }
    if let Some(v) = var("LOG_FORMAT") {
        raw.general.log_format = Some(v);
    }
    Ok(())
}

fn parse_value<T>(key: &str, value: &str) -> Result<T, Report<ConfigError>>
where
    T: FromStr,
    T::Err: Display,
{
    value.parse().map_err(|e: T::Err| {
        Report::new(ConfigError::Invalid {
            key: key.into(),
            reason: format!("{value:?}: {e}"),
        })
    })
}

fn parse_flag(value: &str) -> bool {
    !matches!(
        value.trim().to_ascii_lowercase().as_str(),
        "" | "0" | "false" | "no" | "off"
    )
}

fn resolve(raw: RawConfig) -> Result<AppConfig, Report<ConfigError>> {
    let log_format = raw
        .general
        .log_format
        .unwrap_or_else(|| DEFAULT_LOG_FORMAT.into());
    if !LOG_FORMATS.contains(&log_format.as_str()) {
        return Err(Report::new(ConfigError::Invalid {
            key: "log_format".into(),
            reason: format!("\"{log_format}\" is not one of {LOG_FORMATS:?}"),
        }));
    }
    let general = GeneralConfig {
        log_level: raw
            .general
            .log_level
            .unwrap_or_else(|| DEFAULT_LOG_LEVEL.into()),
        log_format,
    };

    let source = resolve_source(raw.source)?;
    let rate = resolve_rate(raw.rate)?;
    let discord = resolve_discord(raw.discord)?;

    Ok(AppConfig {
        general,
        source,
        rate,
        discord,
    })
}

fn resolve_source(raw: RawSource) -> Result<SourceConfig, Report<ConfigError>> {
    let url = require_url("WESTERN_UNION_URL", raw.url)?;

    let delay_secs = raw.delay_secs.unwrap_or(DEFAULT_DELAY_SECS);
    let delay = Duration::try_from_secs_f64(delay_secs).map_err(|e| {
        Report::new(ConfigError::Invalid {
            key: "DELAY_BETWEEN_REQUESTS".into(),
            reason: format!("{delay_secs} is not a usable number of seconds: {e}"),
        })
    })?;

    Ok(SourceConfig {
        url,
        retry: RetryPolicy::new(
            raw.max_retries.unwrap_or(DEFAULT_MAX_RETRIES),
            delay,
        ),
        timeout: Duration::from_secs(raw.timeout_secs.unwrap_or(DEFAULT_FETCH_TIMEOUT_SECS)),
        user_agent: raw.user_agent.unwrap_or_else(|| DEFAULT_USER_AGENT.into()),
        debug_html: raw.debug_html.unwrap_or(false),
        debug_dir: raw
            .debug_dir
            .unwrap_or_else(|| PathBuf::from(DEFAULT_DEBUG_DIR)),
    })
}

fn resolve_rate(raw: RawRate) -> Result<RateConfig, Report<ConfigError>> {
    let threshold = raw.threshold.ok_or_else(|| {
        Report::new(ConfigError::Missing {
            key: "RATE_THRESHOLD".into(),
        })
    })?;
    if !threshold.is_finite() || threshold <= 0.0 {
        return Err(Report::new(ConfigError::Invalid {
            key: "RATE_THRESHOLD".into(),
            reason: format!("{threshold} must be a finite positive number"),
        }));
    }

    let min_plausible = raw.min_plausible.unwrap_or(DEFAULT_MIN_PLAUSIBLE);
    let max_plausible = raw.max_plausible.unwrap_or(DEFAULT_MAX_PLAUSIBLE);
    if !(min_plausible >= 0.0 && min_plausible < max_plausible) {
        return Err(Report::new(ConfigError::Invalid {
            key: "rate.min_plausible/rate.max_plausible".into(),
            reason: format!("[{min_plausible}, {max_plausible}] is not a valid range"),
        }));
    }

    Ok(RateConfig {
        threshold,
        decimal_convention: raw.decimal_convention.unwrap_or_default(),
        min_plausible,
        max_plausible,
    })
}

fn resolve_discord(raw: RawDiscord) -> Result<DiscordConfig, Report<ConfigError>> {
    Ok(DiscordConfig {
        webhook_url: require_url("DISCORD_WEBHOOK_URL", raw.webhook_url)?,
        username: raw.username.unwrap_or_else(|| DEFAULT_USERNAME.into()),
        timeout: Duration::from_secs(
            raw.timeout_secs.unwrap_or(DEFAULT_WEBHOOK_TIMEOUT_SECS),
        ),
        retry: raw
            .max_retries
            .map_or_else(RetryPolicy::once, |n| RetryPolicy::new(n, WEBHOOK_RETRY_DELAY)),
        notify_on_error: raw.notify_on_error.unwrap_or(false),
    })
}

fn require_url(key: &str, value: Option<String>) -> Result<Url, Report<ConfigError>> {
    let value = value.ok_or_else(|| Report::new(ConfigError::Missing { key: key.into() }))?;
    let url = Url::parse(&value).change_context(ConfigError::Invalid {
        key: key.into(),
        reason: "not a valid URL".into(),
    })?;
    if !matches!(url.scheme(), "http" | "https") {
        return Err(Report::new(ConfigError::Invalid {
            key: key.into(),
            reason: format!("unsupported scheme \"{}\"", url.scheme()),
        }));
    }
    Ok(url)
}
