use std::time::Duration;

use serde::ser::SerializeSeq as _;

use crate::foundation::core::Rgba8;
use crate::foundation::error::PaletteError;
use crate::palette::{PALETTE_LEN, Palette, PaletteApi, Seed};

pub const DEFAULT_BASE_URL: &str = "http://colormind.io";
pub const REQUEST_TIMEOUT: Duration = Duration::from_secs(5);

// The service answers some malformed requests with 200 and this literal text.
const EMPTY_BODY_TEXT: &str = "empty body";

/// Blocking HTTP client for the Colormind palette API.
#[derive(Clone, Debug)]
pub struct ColormindClient {
    base_url: String,
    agent: ureq::Agent,
}

impl ColormindClient {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self::with_timeout(base_url, REQUEST_TIMEOUT)
    }

    pub fn with_timeout(base_url: impl Into<String>, timeout: Duration) -> Self {
        let agent: ureq::Agent = ureq::Agent::config_builder()
            .timeout_global(Some(timeout))
            .http_status_as_error(false)
            .build()
            .into();
        Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            agent,
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }
}

impl Default for ColormindClient {
    fn default() -> Self {
        Self::new(DEFAULT_BASE_URL)
    }
}

impl PaletteApi for ColormindClient {
    #[tracing::instrument(level = "debug", skip(self, seed), fields(seeded = seed.is_some()))]
    fn fetch_palette(&self, model: &str, seed: Option<&Seed>) -> Result<Palette, PaletteError> {
        if let Some(seed) = seed {
            seed.validate()?;
        }
        let body = PaletteRequest { model, input: seed };
        let mut resp = self
            .agent
            .post(format!("{}/api/", self.base_url))
            .send_json(&body)
            .map_err(|e| PaletteError::transport(e.to_string()))?;

        let status = resp.status().as_u16();
        let text = resp
            .body_mut()
            .read_to_string()
            .map_err(|e| PaletteError::transport(format!("reading response body: {e}")))?;
        check_status(status, &text)?;
        parse_palette_response(&text)
    }

    #[tracing::instrument(level = "debug", skip(self))]
    fn list_models(&self) -> Result<Vec<String>, PaletteError> {
        let mut resp = self
            .agent
            .get(format!("{}/list", self.base_url))
            .call()
            .map_err(|e| PaletteError::transport(e.to_string()))?;

        let status = resp.status().as_u16();
        let text = resp
            .body_mut()
            .read_to_string()
            .map_err(|e| PaletteError::transport(format!("reading response body: {e}")))?;
        check_status(status, &text)?;
        parse_models_response(&text)
    }
}

fn check_status(status: u16, body: &str) -> Result<(), PaletteError> {
    if status != 200 {
        return Err(PaletteError::Status {
            status,
            body: body.trim().to_string(),
        });
    }
    Ok(())
}

/// Request body for `POST /api/`.
///
/// `input` is omitted for a fresh palette; a continuation sends all five slots with the seed in
/// front and `"N"` marking the slots the model should fill.
#[derive(serde::Serialize)]
struct PaletteRequest<'a> {
    model: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    input: Option<&'a Seed>,
}

impl serde::Serialize for Seed {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut seq = serializer.serialize_seq(Some(PALETTE_LEN))?;
        for slot in self.0.iter() {
            match slot {
                Some(c) => seq.serialize_element(&c.rgb())?,
                None => seq.serialize_element("N")?,
            }
        }
        for _ in self.0.len()..PALETTE_LEN {
            seq.serialize_element("N")?;
        }
        seq.end()
    }
}

#[derive(serde::Deserialize)]
struct PaletteResponse {
    result: [[u8; 3]; PALETTE_LEN],
}

#[derive(serde::Deserialize)]
struct ModelsResponse {
    result: Vec<String>,
}

fn is_empty_body(text: &str) -> bool {
    let t = text.trim();
    t.is_empty() || t == EMPTY_BODY_TEXT
}

pub(crate) fn parse_palette_response(text: &str) -> Result<Palette, PaletteError> {
    if is_empty_body(text) {
        return Err(PaletteError::EmptyBody);
    }
    let resp: PaletteResponse =
        serde_json::from_str(text).map_err(|e| PaletteError::parse(e.to_string()))?;
    Ok(Palette(resp.result.map(Rgba8::opaque)))
}

pub(crate) fn parse_models_response(text: &str) -> Result<Vec<String>, PaletteError> {
    if is_empty_body(text) {
        return Err(PaletteError::EmptyBody);
    }
    let resp: ModelsResponse =
        serde_json::from_str(text).map_err(|e| PaletteError::parse(e.to_string()))?;
    Ok(resp.result)
}
