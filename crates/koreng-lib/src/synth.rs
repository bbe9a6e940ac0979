//! Speech synthesis adapters — text + voice + rate → encoded audio bytes.
//!
//! Every call is independent. Scratch files live only for the duration of the
//! call that created them.

use std::process::Stdio;
use std::sync::Arc;

use async_trait::async_trait;
use tracing::{debug, error};

use koreng_core::error::SynthesisError;
use koreng_core::types::{DrillConfig, RateFactor, SynthBackend};

#[async_trait]
pub trait Synthesizer: Send + Sync {
    /// Produce one encoded clip (mp3 or wav) for `text`.
    async fn synthesize(
        &self,
        text: &str,
        voice: &str,
        rate: RateFactor,
    ) -> Result<Vec<u8>, SynthesisError>;
}

/// Build the synthesizer selected by `config.backend`.
pub fn from_config(config: &DrillConfig) -> Arc<dyn Synthesizer> {
    match config.backend {
        SynthBackend::Edge => Arc::new(EdgeTtsSynthesizer::new(&config.edge_tts_bin)),
        SynthBackend::Kokoro => Arc::new(KokoroSynthesizer::new(&config.kokoro_url)),
    }
}

// ─── edge-tts CLI ─────────────────────────────────────────────────────────

/// Runs the `edge-tts` command and reads back the media file it writes.
pub struct EdgeTtsSynthesizer {
    binary: String,
}

impl EdgeTtsSynthesizer {
    pub fn new(binary: impl Into<String>) -> Self {
        Self {
            binary: binary.into(),
        }
    }
}

#[async_trait]
impl Synthesizer for EdgeTtsSynthesizer {
    async fn synthesize(
        &self,
        text: &str,
        voice: &str,
        rate: RateFactor,
    ) -> Result<Vec<u8>, SynthesisError> {
        let media = tempfile::Builder::new()
            .prefix("koreng-")
            .suffix(".mp3")
            .tempfile()?;

        debug!("edge-tts: {} chars, voice={voice}, rate={rate}", text.chars().count());

        let output = tokio::process::Command::new(&self.binary)
            .arg("--voice")
            .arg(voice)
            .arg(format!("--rate={}", rate.rate_percent()))
            .arg(format!("--text={text}"))
            .arg("--write-media")
            .arg(media.path())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            // A cancelled cycle drops this future; the child must not outlive it.
            .kill_on_drop(true)
            .output()
            .await
            .map_err(|e| SynthesisError::Backend(format!("failed to spawn {}: {e}", self.binary)))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            error!("edge-tts: exited with {}: {}", output.status, stderr.trim());
            if stderr.contains("Invalid voice") {
                return Err(SynthesisError::UnknownVoice(voice.to_string()));
            }
            let reason = stderr
                .lines()
                .rev()
                .find(|l| !l.trim().is_empty())
                .unwrap_or("no output")
                .trim()
                .to_string();
            return Err(SynthesisError::Backend(format!("edge-tts {}: {reason}", output.status)));
        }

        let audio = tokio::fs::read(media.path()).await?;
        if audio.is_empty() {
            return Err(SynthesisError::Backend("edge-tts produced no audio".into()));
        }
        Ok(audio)
    }
}

// ─── Kokoro (OpenAI-compatible HTTP) ──────────────────────────────────────

/// POSTs to a Kokoro server's `/v1/audio/speech` endpoint and returns WAV.
pub struct KokoroSynthesizer {
    client: reqwest::Client,
    url: String,
}

impl KokoroSynthesizer {
    pub fn new(base_url: &str) -> Self {
        Self {
            client: reqwest::Client::new(),
            url: format!("{}/v1/audio/speech", base_url.trim_end_matches('/')),
        }
    }
}

#[async_trait]
impl Synthesizer for KokoroSynthesizer {
    async fn synthesize(
        &self,
        text: &str,
        voice: &str,
        rate: RateFactor,
    ) -> Result<Vec<u8>, SynthesisError> {
        let body = serde_json::json!({
            "input": text,
            "voice": voice,
            "model": "kokoro",
            "response_format": "wav",
            "speed": rate.speed(),
        });

        debug!("kokoro: POST {} chars, voice={voice}", text.chars().count());

        let resp = self
            .client
            .post(&self.url)
            .json(&body)
            .send()
            .await
            .map_err(|e| SynthesisError::Backend(format!("request failed: {e}")))?;

        let status = resp.status();
        if !status.is_success() {
            let text = resp.text().await.unwrap_or_default();
            error!("kokoro: error {status}: {text}");
            if status == reqwest::StatusCode::BAD_REQUEST && text.to_lowercase().contains("voice") {
                return Err(SynthesisError::UnknownVoice(voice.to_string()));
            }
            return Err(SynthesisError::Backend(format!("Kokoro error {status}: {text}")));
        }

        let audio = resp
            .bytes()
            .await
            .map_err(|e| SynthesisError::Backend(format!("body read failed: {e}")))?;
        Ok(audio.to_vec())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn kokoro_url_is_normalized() {
        let s = KokoroSynthesizer::new("http://localhost:3001/");
        assert_eq!(s.url, "http://localhost:3001/v1/audio/speech");
    }

    #[tokio::test]
    async fn missing_edge_binary_is_backend_error() {
        let s = EdgeTtsSynthesizer::new("/nonexistent/edge-tts-koreng-test");
        let err = s.synthesize("안녕", "ko-KR-SunHiNeural", RateFactor::X1).await.unwrap_err();
        assert!(matches!(err, SynthesisError::Backend(_)), "got {err:?}");
    }

    #[cfg(unix)]
    fn fake_edge_tts(dir: &std::path::Path, body: &str) -> String {
        use std::os::unix::fs::PermissionsExt;

        let path = dir.join("edge-tts");
        std::fs::write(&path, format!("#!/bin/sh\n{body}\n")).unwrap();
        std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755)).unwrap();
        path.to_string_lossy().into_owned()
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn text_starting_with_dash_stays_one_argument() {
        let dir = tempfile::tempdir().unwrap();
        let args = dir.path().join("args");
        let script = format!(
            r#"printf '%s\n' "$@" > '{}'
prev=
for a in "$@"; do
  if [ "$prev" = "--write-media" ]; then printf 'ID3' > "$a"; fi
  prev="$a"
done"#,
            args.display()
        );
        let s = EdgeTtsSynthesizer::new(fake_edge_tts(dir.path(), &script));

        let audio = s.synthesize("-5 degrees today", "en-US-AriaNeural", RateFactor::X2).await.unwrap();
        assert_eq!(audio, b"ID3");

        let args = std::fs::read_to_string(args).unwrap();
        let args: Vec<&str> = args.lines().collect();
        assert!(args.contains(&"--text=-5 degrees today"), "args: {args:?}");
        assert!(args.contains(&"--rate=+100%"), "args: {args:?}");
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn dropped_synthesis_kills_the_child() {
        let dir = tempfile::tempdir().unwrap();
        let marker = dir.path().join("marker");
        let script = format!("sleep 1\necho ran >> '{}'", marker.display());
        let s = EdgeTtsSynthesizer::new(fake_edge_tts(dir.path(), &script));

        let result = tokio::time::timeout(
            Duration::from_millis(200),
            s.synthesize("안녕", "ko-KR-SunHiNeural", RateFactor::X1),
        )
        .await;
        assert!(result.is_err(), "synthesis should still be pending");

        tokio::time::sleep(Duration::from_secs(2)).await;
        assert!(!marker.exists(), "edge-tts kept running after the call was dropped");
    }

    #[test]
    fn backend_selection() {
        let config = DrillConfig {
            backend: SynthBackend::Kokoro,
            ..Default::default()
        };
        // Only checks construction does not panic for either backend.
        let _ = from_config(&config);
        let _ = from_config(&DrillConfig::default());
    }
}
