//! Audio output — fire-and-forget playback of encoded clips.
//!
//! `play()` hands the clip to the output and returns immediately; nothing
//! reports when the clip ends. The drill paces itself with estimated durations
//! instead.

use std::io::Cursor;
use std::sync::mpsc;

use rodio::{Decoder, OutputStream, Sink};
use tracing::{debug, error, warn};

use koreng_core::error::AudioError;

pub trait AudioSink: Send + Sync {
    /// Start playing an encoded clip (mp3 or wav).
    fn play(&self, clip: Vec<u8>) -> Result<(), AudioError>;

    /// Silence anything currently playing.
    fn stop(&self);
}

// ─── rodio ────────────────────────────────────────────────────────────────

enum PlayCmd {
    Play(Vec<u8>),
    Stop,
}

/// Plays clips on the default output device from a dedicated OS thread
/// (rodio's `OutputStream` is `!Send`).
pub struct RodioSink {
    cmd_tx: mpsc::Sender<PlayCmd>,
}

impl RodioSink {
    /// Spawn the playback thread and open the default output device.
    pub fn new() -> Result<Self, AudioError> {
        let (cmd_tx, cmd_rx) = mpsc::channel::<PlayCmd>();
        let (ready_tx, ready_rx) = mpsc::channel::<Result<(), AudioError>>();

        std::thread::Builder::new()
            .name("koreng-playback".into())
            .spawn(move || playback_thread(cmd_rx, ready_tx))
            .map_err(|e| AudioError::Unavailable(format!("failed to spawn playback thread: {e}")))?;

        ready_rx
            .recv()
            .map_err(|_| AudioError::Unavailable("playback thread exited".into()))??;

        Ok(Self { cmd_tx })
    }
}

impl AudioSink for RodioSink {
    fn play(&self, clip: Vec<u8>) -> Result<(), AudioError> {
        self.cmd_tx
            .send(PlayCmd::Play(clip))
            .map_err(|_| AudioError::Unavailable("playback thread gone".into()))
    }

    fn stop(&self) {
        let _ = self.cmd_tx.send(PlayCmd::Stop);
    }
}

fn playback_thread(cmd_rx: mpsc::Receiver<PlayCmd>, ready_tx: mpsc::Sender<Result<(), AudioError>>) {
    let (_stream, stream_handle) = match OutputStream::try_default() {
        Ok(pair) => pair,
        Err(e) => {
            error!("playback: failed to open audio output: {e}");
            let _ = ready_tx.send(Err(AudioError::Unavailable(e.to_string())));
            return;
        }
    };

    let new_sink = || Sink::try_new(&stream_handle).map_err(|e| AudioError::Unavailable(e.to_string()));

    let mut sink = match new_sink() {
        Ok(sink) => sink,
        Err(e) => {
            let _ = ready_tx.send(Err(e));
            return;
        }
    };
    let _ = ready_tx.send(Ok(()));

    while let Ok(cmd) = cmd_rx.recv() {
        match cmd {
            PlayCmd::Play(clip) => match Decoder::new(Cursor::new(clip)) {
                Ok(source) => {
                    debug!("playback: clip appended to sink");
                    sink.append(source);
                }
                Err(e) => warn!("playback: {}", AudioError::Decode(e.to_string())),
            },
            PlayCmd::Stop => {
                sink.stop();
                match new_sink() {
                    Ok(fresh) => sink = fresh,
                    Err(e) => {
                        error!("playback: {e}");
                        break;
                    }
                }
            }
        }
    }
    sink.stop();
}

// ─── null ─────────────────────────────────────────────────────────────────

/// Discards every clip. For headless runs.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullSink;

impl AudioSink for NullSink {
    fn play(&self, clip: Vec<u8>) -> Result<(), AudioError> {
        debug!("null sink: dropped {} bytes", clip.len());
        Ok(())
    }

    fn stop(&self) {}
}
