//! Fetches the occupancy widget page from the gym portal.
//!
//! Plain HTTP GET. Retries on 5xx and transport errors, backs off on 429.

use std::time::Duration;

use anyhow::Result;
use async_trait::async_trait;

use crate::config::Settings;
use crate::error::{BotError, BotResult};

const USER_AGENT: &str =
    "Mozilla/5.0 (Macintosh; Intel Mac OS X 10.15; rv:127.0) Gecko/20100101 Firefox/127.0";
const MAX_RETRIES: u32 = 2;

/// Anything that can hand back the raw HTML of the occupancy page.
#[async_trait]
pub trait PageSource: Send + Sync {
    async fn fetch_page(&self) -> Result<String>;
}

/// HTTP client bound to one facility's occupancy URL.
#[derive(Clone)]
pub struct PortalClient {
    client: reqwest::Client,
    url: String,
}

impl PortalClient {
    pub fn new(url: impl Into<String>, timeout_ms: u64) -> BotResult<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_millis(timeout_ms))
            .redirect(reqwest::redirect::Policy::limited(5))
            .user_agent(USER_AGENT)
            .build()?;

        Ok(Self {
            client,
            url: url.into(),
        })
    }

    pub fn from_settings(settings: &Settings) -> BotResult<Self> {
        Self::new(settings.portal_url()?, settings.timeout_ms)
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    /// GET the page body.
    pub async fn fetch(&self) -> BotResult<String> {
        let mut retries = 0u32;

        loop {
            let resp = self
                .client
                .get(&self.url)
                .header(reqwest::header::ACCEPT, "text/html")
                .send()
                .await;

            let r = match resp {
                Ok(r) => r,
                Err(e) if retries < MAX_RETRIES => {
                    retries += 1;
                    tracing::debug!("fetch of {} failed ({e}), retry {retries}", self.url);
                    tokio::time::sleep(backoff(retries)).await;
                    continue;
                }
                Err(e) => return Err(e.into()),
            };

            let status = r.status().as_u16();

            if status >= 500 && retries < MAX_RETRIES {
                retries += 1;
                tracing::debug!("{} answered {status}, retry {retries}", self.url);
                tokio::time::sleep(backoff(retries)).await;
                continue;
            }

            if status == 429 && retries < MAX_RETRIES {
                retries += 1;
                let retry_after = r
                    .headers()
                    .get(reqwest::header::RETRY_AFTER)
                    .and_then(|v| v.to_str().ok())
                    .and_then(|s| s.parse::<u64>().ok())
                    .unwrap_or(2);
                tokio::time::sleep(Duration::from_secs(retry_after.min(10))).await;
                continue;
            }

            if status != 200 {
                return Err(BotError::Status {
                    url: self.url.clone(),
                    status,
                });
            }

            return Ok(r.text().await?);
        }
    }
}

#[async_trait]
impl PageSource for PortalClient {
    async fn fetch_page(&self) -> Result<String> {
        Ok(self.fetch().await?)
    }
}

fn backoff(attempt: u32) -> Duration {
    Duration::from_millis(500 * 2u64.pow(attempt - 1))
}
