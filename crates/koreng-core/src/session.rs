//! Playback session state — the position and flags of one drill session.
//!
//! Pure state machine, no timers. The drill driver in koreng-lib owns exactly
//! one [`PlaybackSession`] and is the only thing that mutates it.
//!
//! Invariants held by every transition:
//! - with no subject selected, `index == 0` and `playing == false`;
//! - with a subject selected, `index < subject.len()` (or 0 for an empty subject);
//! - `playing` implies a selected, non-empty subject.

use std::sync::Arc;

use crate::error::SessionError;
use crate::progress::{position_label, progress_fraction};
use crate::types::{PlaybackState, RateFactor, SentencePair, SessionStatus, Subject};

/// What happened to the position after a completed cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Advance {
    /// Moved to the next sentence.
    Next,
    /// Wrapped from the last sentence back to the first (repeat on).
    Wrapped,
    /// Last sentence done without repeat; playback stopped, index unchanged.
    Finished,
    /// Session was not playing; nothing changed.
    Ignored,
}

#[derive(Debug, Clone)]
pub struct PlaybackSession {
    subject: Option<Arc<Subject>>,
    index: usize,
    playing: bool,
    finished: bool,
    repeat: bool,
    rate: RateFactor,
    source_voice: String,
    target_voice: String,
}

impl PlaybackSession {
    pub fn new(source_voice: impl Into<String>, target_voice: impl Into<String>) -> Self {
        Self {
            subject: None,
            index: 0,
            playing: false,
            finished: false,
            repeat: false,
            rate: RateFactor::X1,
            source_voice: source_voice.into(),
            target_voice: target_voice.into(),
        }
    }

    // ─── Transitions ───────────────────────────────────────────────────────

    /// Select a subject. Always rewinds and stops, even when reselecting.
    pub fn select_subject(&mut self, subject: Arc<Subject>) {
        self.subject = Some(subject);
        self.index = 0;
        self.playing = false;
        self.finished = false;
    }

    /// Enter `Playing`. Already playing is a no-op.
    pub fn start(&mut self) -> Result<(), SessionError> {
        let subject = self.subject.as_ref().ok_or(SessionError::NoSubject)?;
        if subject.is_empty() {
            return Err(SessionError::EmptySubject(subject.name.clone()));
        }
        self.playing = true;
        self.finished = false;
        Ok(())
    }

    pub fn stop(&mut self) {
        self.playing = false;
    }

    pub fn reset(&mut self) {
        self.index = 0;
        self.playing = false;
        self.finished = false;
    }

    /// Apply the index-advance rule after a completed cycle.
    pub fn advance(&mut self) -> Advance {
        if !self.playing {
            return Advance::Ignored;
        }
        let len = self.total();
        if self.index + 1 < len {
            self.index += 1;
            Advance::Next
        } else if self.repeat {
            self.index = 0;
            Advance::Wrapped
        } else {
            self.playing = false;
            self.finished = true;
            Advance::Finished
        }
    }

    pub fn set_repeat(&mut self, repeat: bool) {
        self.repeat = repeat;
    }

    pub fn set_rate(&mut self, rate: RateFactor) {
        self.rate = rate;
    }

    pub fn set_source_voice(&mut self, voice: impl Into<String>) {
        self.source_voice = voice.into();
    }

    pub fn set_target_voice(&mut self, voice: impl Into<String>) {
        self.target_voice = voice.into();
    }

    // ─── Queries ───────────────────────────────────────────────────────────

    pub fn subject(&self) -> Option<&Arc<Subject>> {
        self.subject.as_ref()
    }

    pub fn index(&self) -> usize {
        self.index
    }

    pub fn is_playing(&self) -> bool {
        self.playing
    }

    pub fn repeat(&self) -> bool {
        self.repeat
    }

    pub fn rate(&self) -> RateFactor {
        self.rate
    }

    pub fn source_voice(&self) -> &str {
        &self.source_voice
    }

    pub fn target_voice(&self) -> &str {
        &self.target_voice
    }

    pub fn total(&self) -> usize {
        self.subject.as_ref().map_or(0, |s| s.len())
    }

    /// The pair at the current index, if any.
    pub fn current_pair(&self) -> Option<&SentencePair> {
        self.subject.as_ref()?.sentences.get(self.index)
    }

    pub fn state(&self) -> PlaybackState {
        match (&self.subject, self.playing, self.finished) {
            (None, _, _) => PlaybackState::Idle,
            (Some(_), true, _) => PlaybackState::Playing,
            (Some(_), false, true) => PlaybackState::Finished,
            (Some(_), false, false) => PlaybackState::Ready,
        }
    }

    /// Snapshot without reveal slots or error.
    pub fn status(&self) -> SessionStatus {
        let total = self.total();
        SessionStatus {
            state: self.state(),
            subject: self.subject.as_ref().map(|s| s.name.clone()),
            index: self.index,
            total,
            progress: progress_fraction(self.index, total),
            position_label: position_label(self.index, total),
            repeat: self.repeat,
            rate: self.rate,
            source_voice: self.source_voice.clone(),
            target_voice: self.target_voice.clone(),
            source_text: None,
            target_text: None,
            last_error: None,
        }
    }
}
