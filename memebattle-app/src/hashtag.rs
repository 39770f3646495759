//! Hashtag popularity from the RapidAPI Instagram scraper.
//!
//! `GET {base_url}/searchtag/{hashtag}` with the RapidAPI key/host headers.
//! The count is `data[0].media_count`; a missing entry counts as zero.

use std::time::Duration;

use async_trait::async_trait;
use memebattle_core::config::HashtagConfig;
use reqwest::{Client, Url};
use serde::Deserialize;
use tracing::debug;

use crate::bridge::HashtagMetrics;
use crate::error::AdapterError;

#[derive(Debug, Deserialize)]
struct SearchTagResponse {
    #[serde(default)]
    data: Vec<TagEntry>,
}

#[derive(Debug, Deserialize)]
struct TagEntry {
    #[serde(default)]
    media_count: Option<u64>,
}

/// Extract the media count from a `searchtag` response body.
///
/// # Errors
/// Returns [`AdapterError::Decode`] if the body is not the expected JSON.
pub fn parse_media_count(body: &str) -> Result<u64, AdapterError> {
    let parsed: SearchTagResponse =
        serde_json::from_str(body).map_err(|e| AdapterError::Decode(format!("searchtag body: {e}")))?;
    Ok(parsed.data.first().and_then(|e| e.media_count).unwrap_or(0))
}

/// [`HashtagMetrics`] backed by RapidAPI.
#[derive(Debug, Clone)]
pub struct RapidApiHashtagMetrics {
    http: Client,
    base_url: Url,
    api_host: String,
    api_key: String,
    timeout: Duration,
}

impl RapidApiHashtagMetrics {
    /// Build from the `[hashtag]` config section.
    ///
    /// # Errors
    /// Returns [`AdapterError::NotConfigured`] for an unusable base URL.
    pub fn from_config(config: &HashtagConfig) -> Result<Self, AdapterError> {
        let base_url = Url::parse(&config.base_url).map_err(|_| AdapterError::NotConfigured("hashtag.base_url"))?;
        if base_url.cannot_be_a_base() {
            return Err(AdapterError::NotConfigured("hashtag.base_url"));
        }
        Ok(Self {
            http: Client::new(),
            base_url,
            api_host: config.api_host.clone(),
            api_key: config.api_key.clone(),
            timeout: Duration::from_millis(config.request_timeout_ms),
        })
    }

    /// URL queried for `hashtag`; the tag is percent-encoded as one segment.
    #[must_use]
    pub fn search_url(&self, hashtag: &str) -> Url {
        let mut url = self.base_url.clone();
        if let Ok(mut segments) = url.path_segments_mut() {
            segments.pop_if_empty().push("searchtag").push(hashtag);
        }
        url
    }
}

#[async_trait]
impl HashtagMetrics for RapidApiHashtagMetrics {
    async fn media_count(&self, hashtag: &str) -> Result<u64, AdapterError> {
        let url = self.search_url(hashtag);
        let resp = self
            .http
            .get(url)
            .header("x-rapidapi-key", &self.api_key)
            .header("x-rapidapi-host", &self.api_host)
            .timeout(self.timeout)
            .send()
            .await?;

        let status = resp.status();
        let body = resp.text().await?;
        if !status.is_success() {
            return Err(AdapterError::Http(format!("searchtag returned HTTP {status}")));
        }
        let count = parse_media_count(&body)?;
        debug!(hashtag, count, "Fetched hashtag media count");
        Ok(count)
    }
}
