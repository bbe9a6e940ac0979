//! Drill engine — walks a subject's sentence pairs and narrates each half.
//!
//! ```text
//! select/start/stop/... → [cmd_tx] → driver task (owns PlaybackSession)
//!     while playing:
//!         cycle: reveal source → synthesize → play → wait(estimate)
//!                reveal target → synthesize → play → wait(estimate)
//!         advance index → debounce → next cycle
//! ```
//!
//! The driver is the only owner of the session. Handles request transitions
//! over a channel and observe it through a `watch` status snapshot.
//!
//! Every suspension inside a cycle races the cycle's [`CancellationToken`].
//! `stop()`, `reset()` and `select_subject()` cancel it, so they take effect
//! within the current utterance instead of after the whole cycle. A cancelled
//! cycle never advances the index.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{mpsc, oneshot, watch};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use koreng_core::error::{SessionError, SynthesisError};
use koreng_core::pacing::estimate_duration;
use koreng_core::session::{Advance, PlaybackSession};
use koreng_core::types::{
    voices_for_locale, DrillConfig, RateFactor, SentencePair, SessionStatus, VoiceInfo,
};

use crate::audio::AudioSink;
use crate::content::ContentStore;
use crate::synth::Synthesizer;
use crate::voices::VoiceCatalog;

/// Collaborators the engine drives.
#[derive(Clone)]
pub struct DrillDeps {
    pub content: Arc<ContentStore>,
    pub synth: Arc<dyn Synthesizer>,
    pub sink: Arc<dyn AudioSink>,
    /// Used to list and validate voices. Without one, any voice id is accepted.
    pub catalog: Option<Arc<dyn VoiceCatalog>>,
}

/// Voices available for each side of the drill.
#[derive(Debug, Clone, serde::Serialize)]
#[serde(rename_all = "camelCase")]
pub struct VoiceLists {
    pub source_locale: String,
    pub target_locale: String,
    pub source: Vec<VoiceInfo>,
    pub target: Vec<VoiceInfo>,
}

/// Cloneable handle to a running drill session.
#[derive(Clone)]
pub struct DrillEngine {
    cmd_tx: mpsc::UnboundedSender<Cmd>,
    status_rx: watch::Receiver<SessionStatus>,
    content: Arc<ContentStore>,
    catalog: Option<Arc<dyn VoiceCatalog>>,
    source_locale: String,
    target_locale: String,
}

// ─── Internal types ────────────────────────────────────────────────────────

type Reply = oneshot::Sender<Result<(), SessionError>>;

enum Cmd {
    Select(String, Reply),
    Start(Reply),
    Stop,
    Reset,
    SetRepeat(bool),
    SetRate(RateFactor),
    SetVoices {
        source: Option<String>,
        target: Option<String>,
    },
}

/// Everything one cycle needs, captured when it begins.
struct CyclePlan {
    pair: SentencePair,
    source_voice: String,
    target_voice: String,
    rate: RateFactor,
}

#[derive(Clone)]
struct CycleIo {
    synth: Arc<dyn Synthesizer>,
    sink: Arc<dyn AudioSink>,
    status_tx: watch::Sender<SessionStatus>,
}

/// Why a cycle stopped before completing.
enum Interrupt {
    Cancelled,
    Failed(SynthesisError),
}

// ─── Engine construction ───────────────────────────────────────────────────

impl DrillEngine {
    /// Spawn the driver task. Must be called inside a tokio runtime.
    pub fn new(config: &DrillConfig, deps: DrillDeps) -> Self {
        let mut session = PlaybackSession::new(&config.source_voice, &config.target_voice);
        session.set_repeat(config.repeat);
        session.set_rate(config.rate);

        let (cmd_tx, cmd_rx) = mpsc::unbounded_channel();
        let (status_tx, status_rx) = watch::channel(session.status());

        let driver = Driver {
            session,
            last_error: None,
            cancel: CancellationToken::new(),
            debounce: Duration::from_millis(config.debounce_ms),
            debounce_due: false,
            content: deps.content.clone(),
            io: CycleIo {
                synth: deps.synth,
                sink: deps.sink,
                status_tx,
            },
        };
        tokio::spawn(driver.run(cmd_rx));

        Self {
            cmd_tx,
            status_rx,
            content: deps.content,
            catalog: deps.catalog,
            source_locale: config.source_locale.clone(),
            target_locale: config.target_locale.clone(),
        }
    }

    pub fn list_subjects(&self) -> Vec<String> {
        self.content.list_subjects().into_iter().map(str::to_string).collect()
    }

    /// Select a subject; rewinds to its first sentence and stops playback.
    pub async fn select_subject(&self, name: &str) -> Result<(), SessionError> {
        self.request(|reply| Cmd::Select(name.to_string(), reply)).await
    }

    /// Begin playing from the current index.
    pub async fn start(&self) -> Result<(), SessionError> {
        self.request(Cmd::Start).await
    }

    /// Stop playback; the current utterance's wait is cut short.
    pub fn stop(&self) {
        let _ = self.cmd_tx.send(Cmd::Stop);
    }

    /// Rewind to the first sentence and stop.
    pub fn reset(&self) {
        let _ = self.cmd_tx.send(Cmd::Reset);
    }

    pub fn set_repeat(&self, repeat: bool) {
        let _ = self.cmd_tx.send(Cmd::SetRepeat(repeat));
    }

    pub fn set_rate(&self, rate: RateFactor) {
        let _ = self.cmd_tx.send(Cmd::SetRate(rate));
    }

    /// Choose narration voices. Each is checked against its locale's catalog
    /// entries when a catalog is available.
    pub async fn set_voices(
        &self,
        source: Option<String>,
        target: Option<String>,
    ) -> Result<(), SessionError> {
        if let Some(catalog) = &self.catalog {
            match catalog.list_voices().await {
                Ok(voices) => {
                    for (voice, locale) in [
                        (&source, &self.source_locale),
                        (&target, &self.target_locale),
                    ] {
                        if let Some(voice) = voice {
                            let known = voices_for_locale(&voices, locale)
                                .iter()
                                .any(|v| &v.short_name == voice);
                            if !known {
                                return Err(SessionError::UnknownVoice {
                                    voice: voice.clone(),
                                    locale: locale.clone(),
                                });
                            }
                        }
                    }
                }
                Err(e) => warn!("drill: voice catalog unavailable, accepting unchecked: {e}"),
            }
        }
        self.cmd_tx
            .send(Cmd::SetVoices { source, target })
            .map_err(|_| SessionError::EngineGone)
    }

    /// Voices for the configured source and target locales.
    pub async fn voices(&self) -> Result<VoiceLists, koreng_core::error::CatalogError> {
        let voices = match &self.catalog {
            Some(catalog) => catalog.list_voices().await?,
            None => Vec::new(),
        };
        let pick = |locale: &str| {
            voices_for_locale(&voices, locale)
                .into_iter()
                .cloned()
                .collect::<Vec<_>>()
        };
        Ok(VoiceLists {
            source: pick(&self.source_locale),
            target: pick(&self.target_locale),
            source_locale: self.source_locale.clone(),
            target_locale: self.target_locale.clone(),
        })
    }

    /// Get current status.
    pub fn status(&self) -> SessionStatus {
        self.status_rx.borrow().clone()
    }

    /// Subscribe to status changes.
    pub fn subscribe_status(&self) -> watch::Receiver<SessionStatus> {
        self.status_rx.clone()
    }

    async fn request(&self, make: impl FnOnce(Reply) -> Cmd) -> Result<(), SessionError> {
        let (tx, rx) = oneshot::channel();
        self.cmd_tx.send(make(tx)).map_err(|_| SessionError::EngineGone)?;
        rx.await.map_err(|_| SessionError::EngineGone)?
    }
}

// ─── Driver task ───────────────────────────────────────────────────────────

struct Driver {
    session: PlaybackSession,
    last_error: Option<String>,
    /// Token of the cycle in flight (or the last one).
    cancel: CancellationToken,
    debounce: Duration,
    debounce_due: bool,
    content: Arc<ContentStore>,
    io: CycleIo,
}

impl Driver {
    async fn run(mut self, mut cmd_rx: mpsc::UnboundedReceiver<Cmd>) {
        loop {
            if !self.session.is_playing() {
                match cmd_rx.recv().await {
                    Some(cmd) => self.handle(cmd),
                    None => break,
                }
                continue;
            }

            if self.debounce_due {
                self.debounce_due = false;
                tokio::select! {
                    _ = tokio::time::sleep(self.debounce) => {}
                    cmd = cmd_rx.recv() => match cmd {
                        Some(cmd) => self.handle(cmd),
                        None => break,
                    },
                }
                continue;
            }

            let Some(plan) = self.plan_cycle() else {
                // start() refuses empty subjects, so this only guards the invariant.
                warn!("drill: playing without a sentence, stopping");
                self.session.stop();
                self.publish();
                continue;
            };

            let token = CancellationToken::new();
            self.cancel = token.clone();
            let index = self.session.index();
            debug!("drill: cycle {index} begins");

            let cycle = play_cycle(plan, self.io.clone(), token.clone());
            tokio::pin!(cycle);

            let outcome = loop {
                tokio::select! {
                    outcome = &mut cycle => break Some(outcome),
                    cmd = cmd_rx.recv() => match cmd {
                        Some(cmd) => self.handle(cmd),
                        None => {
                            token.cancel();
                            break None;
                        }
                    },
                }
            };

            match outcome {
                Some(Ok(())) => self.finish_cycle(index),
                Some(Err(Interrupt::Cancelled)) => debug!("drill: cycle {index} cancelled"),
                Some(Err(Interrupt::Failed(e))) => {
                    error!("drill: cycle {index} aborted: {e}");
                    self.session.stop();
                    self.last_error = Some(e.to_string());
                    self.publish();
                }
                None => break,
            }
        }

        self.cancel.cancel();
        self.io.sink.stop();
        debug!("drill: driver exiting");
    }

    fn plan_cycle(&self) -> Option<CyclePlan> {
        let pair = self.session.current_pair()?.clone();
        Some(CyclePlan {
            pair,
            source_voice: self.session.source_voice().to_string(),
            target_voice: self.session.target_voice().to_string(),
            rate: self.session.rate(),
        })
    }

    fn finish_cycle(&mut self, index: usize) {
        match self.session.advance() {
            Advance::Next => debug!("drill: {index} → {}", self.session.index()),
            Advance::Wrapped => info!("drill: end of subject, repeating"),
            Advance::Finished => info!("drill: subject finished"),
            Advance::Ignored => return,
        }
        self.debounce_due = self.session.is_playing();
        self.publish();
    }

    fn handle(&mut self, cmd: Cmd) {
        match cmd {
            Cmd::Select(name, reply) => {
                let result = match self.content.get_subject(&name) {
                    Ok(subject) => {
                        self.interrupt();
                        info!("drill: subject '{name}' selected ({} sentences)", subject.len());
                        self.session.select_subject(subject);
                        self.last_error = None;
                        self.clear_reveal();
                        self.publish();
                        Ok(())
                    }
                    Err(_) => Err(SessionError::UnknownSubject(name)),
                };
                let _ = reply.send(result);
            }
            Cmd::Start(reply) => {
                let was_playing = self.session.is_playing();
                let result = self.session.start();
                match &result {
                    Ok(()) if !was_playing => {
                        info!("drill: playing from {}", self.session.index());
                        self.last_error = None;
                        self.publish();
                    }
                    Ok(()) => {}
                    Err(e) => debug!("drill: start ignored: {e}"),
                }
                let _ = reply.send(result);
            }
            Cmd::Stop => {
                self.interrupt();
                self.session.stop();
                self.clear_reveal();
                self.publish();
            }
            Cmd::Reset => {
                self.interrupt();
                self.session.reset();
                self.clear_reveal();
                self.publish();
            }
            Cmd::SetRepeat(repeat) => {
                self.session.set_repeat(repeat);
                self.publish();
            }
            Cmd::SetRate(rate) => {
                self.session.set_rate(rate);
                self.publish();
            }
            Cmd::SetVoices { source, target } => {
                if let Some(v) = source {
                    self.session.set_source_voice(v);
                }
                if let Some(v) = target {
                    self.session.set_target_voice(v);
                }
                self.publish();
            }
        }
    }

    /// Cancel the cycle in flight and silence the output.
    fn interrupt(&mut self) {
        self.debounce_due = false;
        if self.session.is_playing() {
            self.cancel.cancel();
            self.io.sink.stop();
        }
    }

    fn clear_reveal(&self) {
        update_status(&self.io.status_tx, |s| {
            s.source_text = None;
            s.target_text = None;
        });
    }

    /// Publish session fields, keeping the reveal slots set by the cycle.
    fn publish(&self) {
        let base = self.session.status();
        let last_error = self.last_error.clone();
        update_status(&self.io.status_tx, |s| {
            let source_text = s.source_text.take();
            let target_text = s.target_text.take();
            *s = SessionStatus {
                source_text,
                target_text,
                last_error,
                ..base
            };
        });
    }
}

// ─── One cycle ─────────────────────────────────────────────────────────────

async fn play_cycle(plan: CyclePlan, io: CycleIo, token: CancellationToken) -> Result<(), Interrupt> {
    update_status(&io.status_tx, |s| {
        s.source_text = Some(plan.pair.source_text.clone());
        s.target_text = None;
    });
    speak(&io, &plan.pair.source_text, &plan.source_voice, plan.rate, &token).await?;

    update_status(&io.status_tx, |s| {
        s.target_text = Some(plan.pair.target_text.clone());
    });
    speak(&io, &plan.pair.target_text, &plan.target_voice, plan.rate, &token).await?;

    Ok(())
}

/// Synthesize, hand the clip to the sink, then wait out its estimated length.
async fn speak(
    io: &CycleIo,
    text: &str,
    voice: &str,
    rate: RateFactor,
    token: &CancellationToken,
) -> Result<(), Interrupt> {
    if token.is_cancelled() {
        return Err(Interrupt::Cancelled);
    }

    let clip = tokio::select! {
        biased;
        _ = token.cancelled() => return Err(Interrupt::Cancelled),
        result = io.synth.synthesize(text, voice, rate) => result.map_err(Interrupt::Failed)?,
    };

    if token.is_cancelled() {
        return Err(Interrupt::Cancelled);
    }
    if let Err(e) = io.sink.play(clip) {
        warn!("drill: {e}");
    }

    let wait = estimate_duration(text, rate);
    debug!("drill: waiting {wait:?} for {} chars", text.chars().count());
    tokio::select! {
        biased;
        _ = token.cancelled() => Err(Interrupt::Cancelled),
        _ = tokio::time::sleep(wait) => Ok(()),
    }
}

fn update_status(tx: &watch::Sender<SessionStatus>, f: impl FnOnce(&mut SessionStatus)) {
    tx.send_modify(f);
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    use async_trait::async_trait;
    use koreng_core::error::AudioError;
    use koreng_core::types::{PlaybackState, Subject};

    use crate::voices::StaticVoiceCatalog;

    #[derive(Debug, Clone, PartialEq)]
    struct Call {
        text: String,
        voice: String,
        rate: RateFactor,
    }

    #[derive(Default)]
    struct RecordingSynth {
        calls: Mutex<Vec<Call>>,
        fail_on: Option<&'static str>,
        latency: Duration,
    }

    impl RecordingSynth {
        fn slow(latency: Duration) -> Self {
            Self {
                latency,
                ..Default::default()
            }
        }

        fn failing_on(text: &'static str) -> Self {
            Self {
                fail_on: Some(text),
                ..Default::default()
            }
        }

        fn calls(&self) -> Vec<Call> {
            self.calls.lock().unwrap().clone()
        }

        fn texts(&self) -> Vec<String> {
            self.calls().into_iter().map(|c| c.text).collect()
        }
    }

    #[async_trait]
    impl Synthesizer for RecordingSynth {
        async fn synthesize(
            &self,
            text: &str,
            voice: &str,
            rate: RateFactor,
        ) -> Result<Vec<u8>, SynthesisError> {
            self.calls.lock().unwrap().push(Call {
                text: text.to_string(),
                voice: voice.to_string(),
                rate,
            });
            tokio::time::sleep(self.latency).await;
            if self.fail_on == Some(text) {
                return Err(SynthesisError::Backend("network down".into()));
            }
            Ok(text.as_bytes().to_vec())
        }
    }

    #[derive(Default)]
    struct RecordingSink {
        played: Mutex<usize>,
        stops: Mutex<usize>,
    }

    impl AudioSink for RecordingSink {
        fn play(&self, _clip: Vec<u8>) -> Result<(), AudioError> {
            *self.played.lock().unwrap() += 1;
            Ok(())
        }

        fn stop(&self) {
            *self.stops.lock().unwrap() += 1;
        }
    }

    fn store() -> Arc<ContentStore> {
        Arc::new(ContentStore::from_subjects(vec![
            Subject::new(
                "Sleep",
                vec![
                    SentencePair::new("저는 잡니다", "I sleep"),
                    SentencePair::new("안녕", "Bye"),
                ],
            ),
            Subject::new("One", vec![SentencePair::new("하나", "One")]),
            Subject::new("Empty", vec![]),
        ]))
    }

    fn engine_with(
        config: DrillConfig,
        synth: Arc<RecordingSynth>,
        sink: Arc<RecordingSink>,
    ) -> DrillEngine {
        DrillEngine::new(
            &config,
            DrillDeps {
                content: store(),
                synth,
                sink,
                catalog: Some(Arc::new(StaticVoiceCatalog::from_short_names([
                    "ko-KR-SunHiNeural",
                    "ko-KR-InJoonNeural",
                    "en-US-AriaNeural",
                    "en-US-GuyNeural",
                ]))),
            },
        )
    }

    fn engine(synth: Arc<RecordingSynth>) -> DrillEngine {
        engine_with(DrillConfig::default(), synth, Arc::new(RecordingSink::default()))
    }

    async fn wait_for_state(engine: &DrillEngine, state: PlaybackState) -> SessionStatus {
        let mut rx = engine.subscribe_status();
        let status = rx.wait_for(|s| s.state == state).await.unwrap().clone();
        status
    }

    #[tokio::test(start_paused = true)]
    async fn plays_subject_once_then_finishes() {
        let synth = Arc::new(RecordingSynth::default());
        let engine = engine(synth.clone());

        engine.select_subject("Sleep").await.unwrap();
        engine.start().await.unwrap();
        let status = wait_for_state(&engine, PlaybackState::Finished).await;

        assert_eq!(status.index, 1);
        assert_eq!(synth.texts(), vec!["저는 잡니다", "I sleep", "안녕", "Bye"]);

        // No third cycle.
        tokio::time::sleep(Duration::from_secs(60)).await;
        assert_eq!(synth.calls().len(), 4);
        assert_eq!(engine.status().state, PlaybackState::Finished);
    }

    #[tokio::test(start_paused = true)]
    async fn narrates_with_selected_voices() {
        let synth = Arc::new(RecordingSynth::default());
        let engine = engine(synth.clone());

        engine.select_subject("One").await.unwrap();
        engine.start().await.unwrap();
        wait_for_state(&engine, PlaybackState::Finished).await;

        let calls = synth.calls();
        assert_eq!(calls[0].voice, "ko-KR-SunHiNeural");
        assert_eq!(calls[1].voice, "en-US-AriaNeural");
    }

    #[tokio::test(start_paused = true)]
    async fn repeat_wraps_until_stopped() {
        let synth = Arc::new(RecordingSynth::default());
        let engine = engine(synth.clone());

        engine.select_subject("Sleep").await.unwrap();
        engine.set_repeat(true);
        engine.start().await.unwrap();

        while synth.calls().len() < 10 {
            tokio::time::sleep(Duration::from_millis(100)).await;
        }
        assert_eq!(engine.status().state, PlaybackState::Playing);
        engine.stop();
        wait_for_state(&engine, PlaybackState::Ready).await;

        let texts = synth.texts();
        let expected = ["저는 잡니다", "I sleep", "안녕", "Bye"];
        for (i, text) in texts.iter().enumerate() {
            assert_eq!(text, expected[i % 4]);
        }
        let after_stop = texts.len();
        tokio::time::sleep(Duration::from_secs(60)).await;
        assert_eq!(synth.calls().len(), after_stop);
    }

    #[tokio::test(start_paused = true)]
    async fn stop_cuts_the_current_utterance() {
        let synth = Arc::new(RecordingSynth::default());
        let sink = Arc::new(RecordingSink::default());
        let engine = engine_with(DrillConfig::default(), synth.clone(), sink.clone());

        engine.select_subject("Sleep").await.unwrap();
        engine.start().await.unwrap();

        let mut rx = engine.subscribe_status();
        rx.wait_for(|s| s.source_text.is_some()).await.unwrap();
        // Let the source clip get synthesized and start its wait.
        tokio::time::sleep(Duration::from_millis(100)).await;
        engine.stop();

        let status = wait_for_state(&engine, PlaybackState::Ready).await;
        assert_eq!(status.index, 0);
        assert_eq!(status.source_text, None);

        tokio::time::sleep(Duration::from_secs(60)).await;
        assert_eq!(synth.texts(), vec!["저는 잡니다"]);
        assert!(*sink.stops.lock().unwrap() >= 1);
        assert_eq!(engine.status().index, 0);
    }

    #[tokio::test(start_paused = true)]
    async fn stop_abandons_pending_synthesis() {
        let synth = Arc::new(RecordingSynth::slow(Duration::from_secs(30)));
        let sink = Arc::new(RecordingSink::default());
        let engine = engine_with(DrillConfig::default(), synth.clone(), sink.clone());

        engine.select_subject("Sleep").await.unwrap();
        engine.start().await.unwrap();
        tokio::time::sleep(Duration::from_secs(1)).await;
        assert_eq!(synth.texts(), vec!["저는 잡니다"]);
        engine.stop();

        let status = wait_for_state(&engine, PlaybackState::Ready).await;
        assert_eq!(status.index, 0);

        tokio::time::sleep(Duration::from_secs(120)).await;
        assert_eq!(synth.texts(), vec!["저는 잡니다"]);
        assert_eq!(*sink.played.lock().unwrap(), 0);
        assert_eq!(engine.status().state, PlaybackState::Ready);
        assert_eq!(engine.status().index, 0);
    }

    #[tokio::test(start_paused = true)]
    async fn stop_between_cycles_skips_the_next_one() {
        let synth = Arc::new(RecordingSynth::default());
        let config = DrillConfig {
            debounce_ms: 10_000,
            ..Default::default()
        };
        let engine = engine_with(config, synth.clone(), Arc::new(RecordingSink::default()));

        engine.select_subject("Sleep").await.unwrap();
        engine.start().await.unwrap();
        let mut rx = engine.subscribe_status();
        rx.wait_for(|s| s.index == 1).await.unwrap();
        assert_eq!(synth.calls().len(), 2);
        engine.stop();

        let status = wait_for_state(&engine, PlaybackState::Ready).await;
        assert_eq!(status.index, 1);

        tokio::time::sleep(Duration::from_secs(60)).await;
        assert_eq!(synth.texts(), vec!["저는 잡니다", "I sleep"]);
        assert_eq!(engine.status().state, PlaybackState::Ready);
    }

    #[tokio::test(start_paused = true)]
    async fn synthesis_failure_stops_playback() {
        let synth = Arc::new(RecordingSynth::failing_on("Bye"));
        let engine = engine(synth.clone());

        engine.select_subject("Sleep").await.unwrap();
        engine.start().await.unwrap();

        let mut rx = engine.subscribe_status();
        let status = rx.wait_for(|s| s.last_error.is_some()).await.unwrap().clone();
        assert_eq!(status.state, PlaybackState::Ready);
        assert_eq!(status.index, 1);
        assert!(status.last_error.unwrap().contains("network down"));

        tokio::time::sleep(Duration::from_secs(60)).await;
        assert_eq!(synth.calls().len(), 4);

        // Session survives; a restart clears the error.
        engine.start().await.unwrap();
        assert_eq!(engine.status().last_error, None);
    }

    #[tokio::test(start_paused = true)]
    async fn reselect_mid_cycle_rewinds() {
        let synth = Arc::new(RecordingSynth::default());
        let engine = engine(synth.clone());

        engine.select_subject("Sleep").await.unwrap();
        engine.start().await.unwrap();
        let mut rx = engine.subscribe_status();
        rx.wait_for(|s| s.index == 1).await.unwrap();

        engine.select_subject("Sleep").await.unwrap();
        let status = engine.status();
        assert_eq!(status.index, 0);
        assert_eq!(status.state, PlaybackState::Ready);
    }

    #[tokio::test(start_paused = true)]
    async fn reset_rewinds_and_stops() {
        let synth = Arc::new(RecordingSynth::default());
        let engine = engine(synth.clone());

        engine.select_subject("Sleep").await.unwrap();
        engine.set_repeat(true);
        engine.start().await.unwrap();
        let mut rx = engine.subscribe_status();
        rx.wait_for(|s| s.index == 1).await.unwrap();

        engine.reset();
        let status = wait_for_state(&engine, PlaybackState::Ready).await;
        assert_eq!(status.index, 0);
    }

    #[tokio::test]
    async fn start_rejects_missing_or_empty_subject() {
        let engine = engine(Arc::new(RecordingSynth::default()));
        assert_eq!(engine.start().await, Err(SessionError::NoSubject));

        engine.select_subject("Empty").await.unwrap();
        assert_eq!(
            engine.start().await,
            Err(SessionError::EmptySubject("Empty".into()))
        );
        assert_eq!(engine.status().state, PlaybackState::Ready);
    }

    #[tokio::test]
    async fn unknown_subject_is_rejected() {
        let engine = engine(Arc::new(RecordingSynth::default()));
        assert_eq!(
            engine.select_subject("Ghost").await,
            Err(SessionError::UnknownSubject("Ghost".into()))
        );
        assert_eq!(engine.status().state, PlaybackState::Idle);
    }

    #[tokio::test(start_paused = true)]
    async fn rate_change_applies_to_next_cycle() {
        let synth = Arc::new(RecordingSynth::default());
        let engine = engine(synth.clone());

        engine.select_subject("Sleep").await.unwrap();
        engine.start().await.unwrap();
        engine.set_rate(RateFactor::X2);
        wait_for_state(&engine, PlaybackState::Finished).await;

        let calls = synth.calls();
        assert_eq!(calls[0].rate, RateFactor::X1);
        assert_eq!(calls[3].rate, RateFactor::X2);
        assert_eq!(engine.status().rate, RateFactor::X2);
    }

    #[tokio::test]
    async fn voices_are_validated_against_locale() {
        let engine = engine(Arc::new(RecordingSynth::default()));

        let err = engine
            .set_voices(Some("en-US-GuyNeural".into()), None)
            .await
            .unwrap_err();
        assert!(matches!(err, SessionError::UnknownVoice { .. }));

        engine
            .set_voices(Some("ko-KR-InJoonNeural".into()), Some("en-US-GuyNeural".into()))
            .await
            .unwrap();
        let mut rx = engine.subscribe_status();
        let status = rx
            .wait_for(|s| s.source_voice == "ko-KR-InJoonNeural")
            .await
            .unwrap()
            .clone();
        assert_eq!(status.target_voice, "en-US-GuyNeural");
    }

    #[tokio::test]
    async fn voice_lists_filter_by_locale() {
        let engine = engine(Arc::new(RecordingSynth::default()));
        let lists = engine.voices().await.unwrap();
        assert_eq!(lists.source.len(), 2);
        assert_eq!(lists.target.len(), 2);
        assert!(lists.source.iter().all(|v| v.locale == "ko-KR"));
    }

    #[tokio::test]
    async fn single_sentence_progress_is_finite() {
        let engine = engine(Arc::new(RecordingSynth::default()));
        engine.select_subject("One").await.unwrap();
        let status = engine.status();
        assert!(status.progress.is_finite());
        assert_eq!(status.total, 1);
        assert_eq!(status.position_label, "1 / 1");
    }
}
