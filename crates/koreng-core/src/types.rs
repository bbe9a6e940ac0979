//! Shared types for the koreng drill.
//!
//! Used by koreng-lib and the CLI. Keeping them here means consumers can
//! depend on the data model without pulling in tokio, rodio or reqwest.

use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

// ─── Content types ─────────────────────────────────────────────────────────

/// One source/target pair narrated in sequence.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SentencePair {
    pub source_text: String,
    pub target_text: String,
}

impl SentencePair {
    pub fn new(source: impl Into<String>, target: impl Into<String>) -> Self {
        Self {
            source_text: source.into(),
            target_text: target.into(),
        }
    }
}

/// A named, ordered drill set. Read-only once loaded.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Subject {
    pub name: String,
    pub sentences: Vec<SentencePair>,
}

impl Subject {
    pub fn new(name: impl Into<String>, sentences: Vec<SentencePair>) -> Self {
        Self {
            name: name.into(),
            sentences,
        }
    }

    pub fn len(&self) -> usize {
        self.sentences.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sentences.is_empty()
    }
}

// ─── Rate ──────────────────────────────────────────────────────────────────

/// Playback speed multiplier. Affects both synthesis rate and pacing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum RateFactor {
    #[default]
    #[serde(rename = "1x")]
    X1,
    #[serde(rename = "2x")]
    X2,
}

impl RateFactor {
    /// Divisor applied to estimated narration time.
    pub fn divisor(self) -> f64 {
        match self {
            Self::X1 => 1.0,
            Self::X2 => 2.0,
        }
    }

    /// Relative rate string understood by edge-tts (`--rate`).
    pub fn rate_percent(self) -> &'static str {
        match self {
            Self::X1 => "+0%",
            Self::X2 => "+100%",
        }
    }

    /// Speed multiplier for OpenAI-compatible speech endpoints.
    pub fn speed(self) -> f32 {
        match self {
            Self::X1 => 1.0,
            Self::X2 => 2.0,
        }
    }
}

impl fmt::Display for RateFactor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::X1 => f.write_str("1x"),
            Self::X2 => f.write_str("2x"),
        }
    }
}

impl FromStr for RateFactor {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "1x" | "1" => Ok(Self::X1),
            "2x" | "2" => Ok(Self::X2),
            other => Err(format!("unsupported rate '{other}' (expected 1x or 2x)")),
        }
    }
}

// ─── Voices ────────────────────────────────────────────────────────────────

/// One entry of the voice catalog.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct VoiceInfo {
    pub short_name: String,
    pub locale: String,
    #[serde(default)]
    pub friendly_name: String,
}

/// Keep only voices for `locale` (exact, case-insensitive match).
pub fn voices_for_locale<'a>(voices: &'a [VoiceInfo], locale: &str) -> Vec<&'a VoiceInfo> {
    voices
        .iter()
        .filter(|v| v.locale.eq_ignore_ascii_case(locale))
        .collect()
}

// ─── Config ────────────────────────────────────────────────────────────────

/// Which speech backend produces audio.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SynthBackend {
    #[default]
    Edge,
    Kokoro,
}

impl FromStr for SynthBackend {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "edge" => Ok(Self::Edge),
            "kokoro" => Ok(Self::Kokoro),
            other => Err(format!("unknown backend '{other}'")),
        }
    }
}

/// Drill configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DrillConfig {
    pub content_dir: PathBuf,
    pub source_locale: String,
    pub target_locale: String,
    pub source_voice: String,
    pub target_voice: String,
    pub rate: RateFactor,
    pub repeat: bool,
    pub debounce_ms: u64,
    pub backend: SynthBackend,
    pub edge_tts_bin: String,
    pub kokoro_url: String,
    /// Explicit subject ordering; subjects not listed follow in name order.
    pub subject_order: Vec<String>,
}

impl Default for DrillConfig {
    fn default() -> Self {
        Self {
            content_dir: PathBuf::from("content"),
            source_locale: "ko-KR".into(),
            target_locale: "en-US".into(),
            source_voice: "ko-KR-SunHiNeural".into(),
            target_voice: "en-US-AriaNeural".into(),
            rate: RateFactor::X1,
            repeat: false,
            debounce_ms: 5,
            backend: SynthBackend::Edge,
            edge_tts_bin: "edge-tts".into(),
            kokoro_url: "http://localhost:3001".into(),
            subject_order: Vec::new(),
        }
    }
}

// ─── Status ────────────────────────────────────────────────────────────────

/// Observable controller state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum PlaybackState {
    /// No subject selected.
    Idle,
    /// Subject selected, not playing.
    Ready,
    Playing,
    /// Ready, after the last sentence completed without repeat.
    Finished,
}

/// Status snapshot published after every transition.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionStatus {
    pub state: PlaybackState,
    pub subject: Option<String>,
    pub index: usize,
    pub total: usize,
    pub progress: f32,
    pub position_label: String,
    pub repeat: bool,
    pub rate: RateFactor,
    pub source_voice: String,
    pub target_voice: String,
    /// Revealed source text of the current cycle.
    pub source_text: Option<String>,
    /// Revealed target text of the current cycle.
    pub target_text: Option<String>,
    pub last_error: Option<String>,
}
