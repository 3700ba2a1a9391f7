//! Streaming destination lookup against the Twitch ingest directory.

use std::time::Duration;

use crate::foundation::error::{ColorRunError, ColorRunResult};

pub const TWITCH_INGESTS_URL: &str = "https://ingest.twitch.tv/ingests";

#[derive(Clone, Debug, PartialEq, serde::Deserialize)]
pub struct Ingest {
    #[serde(rename = "_id")]
    pub id: i64,
    #[serde(default)]
    pub availability: f64,
    #[serde(default)]
    pub default: bool,
    pub name: String,
    pub url_template: String,
    #[serde(default)]
    pub priority: i64,
}

#[derive(Debug, serde::Deserialize)]
struct IngestsResponse {
    ingests: Vec<Ingest>,
}

/// Resolves an RTMP push URL for a stream key.
#[derive(Clone, Debug)]
pub struct IngestDirectory {
    url: String,
    agent: ureq::Agent,
}

impl Default for IngestDirectory {
    fn default() -> Self {
        Self::new(TWITCH_INGESTS_URL)
    }
}

impl IngestDirectory {
    pub fn new(url: impl Into<String>) -> Self {
        let agent: ureq::Agent = ureq::Agent::config_builder()
            .timeout_global(Some(Duration::from_secs(5)))
            .http_status_as_error(false)
            .build()
            .into();
        Self {
            url: url.into(),
            agent,
        }
    }

    pub fn ingest_url(&self, stream_key: &str) -> ColorRunResult<String> {
        let mut resp = self
            .agent
            .get(&self.url)
            .call()
            .map_err(|e| anyhow::anyhow!("getting ingests: {e}"))?;
        let status = resp.status();
        let body = resp
            .body_mut()
            .read_to_string()
            .map_err(|e| anyhow::anyhow!("reading ingest response body: {e}"))?;
        if !status.is_success() {
            return Err(anyhow::anyhow!(
                "getting ingest ({}): {}",
                status.canonical_reason().unwrap_or("unknown status"),
                body.trim()
            )
            .into());
        }
        let url = default_ingest_url(&body, stream_key)?;
        tracing::info!(ingest = %redact_key(&url, stream_key), "resolved ingest server");
        Ok(url)
    }
}

/// Pick the ingest flagged as default and substitute the stream key into its template.
pub fn default_ingest_url(body: &str, stream_key: &str) -> ColorRunResult<String> {
    let resp: IngestsResponse = serde_json::from_str(body)
        .map_err(|e| anyhow::anyhow!("decoding ingest response: {e}"))?;
    let ingest = resp
        .ingests
        .iter()
        .rfind(|i| i.default)
        .ok_or_else(|| ColorRunError::validation("no default ingest server found"))?;
    Ok(ingest.url_template.replace("{stream_key}", stream_key))
}

/// Replace the stream key in `url` for logging.
pub fn redact_key(url: &str, stream_key: &str) -> String {
    if stream_key.is_empty() {
        return url.to_string();
    }
    url.replace(stream_key, "<stream_key>")
}
