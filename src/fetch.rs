use std::path::{Path, PathBuf};

use error_stack::{Report, ResultExt};
use reqwest::Url;
use tracing::{debug, info, warn};

use crate::config::SourceConfig;
use crate::error::FetchError;
use crate::model::FetchResult;
use crate::retry::{RetryPolicy, retry};

/// Downloads the rate page with bounded retries.
pub struct Fetcher {
    client: reqwest::Client,
    retry: RetryPolicy,
    /// Where to dump fetched pages; `None` unless debug HTML is enabled.
    debug_dir: Option<PathBuf>,
}

impl Fetcher {
    pub fn new(config: &SourceConfig) -> Result<Self, Report<FetchError>> {
        let client = reqwest::Client::builder()
            .timeout(config.timeout)
            .user_agent(config.user_agent.as_str())
            .build()
            .change_context(FetchError::Client)?;

        Ok(Self {
            client,
            retry: config.retry,
            debug_dir: config.debug_html.then(|| config.debug_dir.clone()),
        })
    }

    /// GET `url`, retrying transport errors and non-2xx responses.
    pub async fn fetch(&self, url: &Url) -> Result<FetchResult, Report<FetchError>> {
        let max_attempts = self.retry.max_attempts();
        info!(url = %url, max_attempts, "fetching rate page");

        let attempted = retry(self.retry, "fetch rate page", move |attempt| {
            self.fetch_once(url, attempt)
        })
        .await
        .change_context(FetchError::Exhausted {
            attempts: max_attempts,
        })
        .attach_with(|| format!("url: {url}"))?;

        Ok(FetchResult {
            raw_html: attempted.value,
            attempts_used: attempted.attempts,
        })
    }

    async fn fetch_once(&self, url: &Url, attempt: u32) -> Result<String, Report<FetchError>> {
        let response = self
            .client
            .get(url.clone())
            .send()
            .await
            .change_context(FetchError::Request)
            .attach_with(|| format!("attempt: {attempt}"))?;

        let status = response.status();
        if !status.is_success() {
            return Err(Report::new(FetchError::Status {
                status: status.as_u16(),
            })
            .attach(format!("attempt: {attempt}")));
        }

        let body = response
            .text()
            .await
            .change_context(FetchError::Body)
            .attach_with(|| format!("attempt: {attempt}"))?;

        debug!(attempt, bytes = body.len(), "page fetched");

        if let Some(dir) = &self.debug_dir {
            save_debug_html(dir, attempt, &body);
        }

        Ok(body)
    }
}

/// Write `html` to `<dir>/debug_attempt_<n>.html`. Failures are logged only.
fn save_debug_html(dir: &Path, attempt: u32, html: &str) -> Option<PathBuf> {
    let path = dir.join(format!("debug_attempt_{attempt}.html"));
    match std::fs::create_dir_all(dir).and_then(|()| std::fs::write(&path, html)) {
        Ok(()) => {
            info!(path = %path.display(), "saved debug HTML");
            Some(path)
        }
        Err(e) => {
            warn!(error = %e, path = %path.display(), "failed to save debug HTML");
            None
        }
    }
}
