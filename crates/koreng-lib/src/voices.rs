//! Voice catalog — which voices the synthesis backend offers.

use async_trait::async_trait;
use tracing::debug;

use koreng_core::error::CatalogError;
use koreng_core::types::VoiceInfo;

/// Public voice list used by the Edge read-aloud service (and edge-tts).
pub const EDGE_VOICE_LIST_URL: &str = "https://speech.platform.bing.com/consumer/speech/synthesize/readaloud/voices/list?trustedclienttoken=6A5AA1D4EAFF4E9FB37E23D68491D6F4";

#[async_trait]
pub trait VoiceCatalog: Send + Sync {
    async fn list_voices(&self) -> Result<Vec<VoiceInfo>, CatalogError>;
}

/// Fetches the Edge voice list over HTTP.
pub struct EdgeVoiceCatalog {
    client: reqwest::Client,
    url: String,
}

impl EdgeVoiceCatalog {
    pub fn new() -> Self {
        Self::with_url(EDGE_VOICE_LIST_URL)
    }

    pub fn with_url(url: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            url: url.into(),
        }
    }
}

impl Default for EdgeVoiceCatalog {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl VoiceCatalog for EdgeVoiceCatalog {
    async fn list_voices(&self) -> Result<Vec<VoiceInfo>, CatalogError> {
        let resp = self
            .client
            .get(&self.url)
            .timeout(std::time::Duration::from_secs(10))
            .send()
            .await
            .map_err(|e| CatalogError::Request(e.to_string()))?;

        if !resp.status().is_success() {
            return Err(CatalogError::Request(format!("status {}", resp.status())));
        }

        let voices: Vec<VoiceInfo> = resp
            .json()
            .await
            .map_err(|e| CatalogError::Parse(e.to_string()))?;
        debug!("voices: {} listed", voices.len());
        Ok(voices)
    }
}

/// A fixed voice list.
#[derive(Debug, Clone, Default)]
pub struct StaticVoiceCatalog {
    voices: Vec<VoiceInfo>,
}

impl StaticVoiceCatalog {
    /// Build entries from bare short names like `ko-KR-SunHiNeural`; the
    /// locale is the first two dash-separated segments.
    pub fn from_short_names<'a>(names: impl IntoIterator<Item = &'a str>) -> Self {
        let voices = names
            .into_iter()
            .map(|name| VoiceInfo {
                short_name: name.to_string(),
                locale: locale_of(name),
                friendly_name: name.to_string(),
            })
            .collect();
        Self { voices }
    }
}

#[async_trait]
impl VoiceCatalog for StaticVoiceCatalog {
    async fn list_voices(&self) -> Result<Vec<VoiceInfo>, CatalogError> {
        Ok(self.voices.clone())
    }
}

fn locale_of(short_name: &str) -> String {
    short_name.splitn(3, '-').take(2).collect::<Vec<_>>().join("-")
}
