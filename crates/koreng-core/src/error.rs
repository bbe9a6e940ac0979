//! Error taxonomy shared by the drill engine and its adapters.

use std::path::PathBuf;

use thiserror::Error;

/// Failures loading the tabular content source. Fatal at startup.
#[derive(Error, Debug)]
pub enum ContentError {
    #[error("content unavailable at {path}: {reason}")]
    Unavailable { path: PathBuf, reason: String },

    #[error("malformed table '{subject}': {reason}")]
    Malformed { subject: String, reason: String },

    #[error("unknown subject '{0}'")]
    UnknownSubject(String),
}

/// Failures producing audio for one utterance. Fatal to the cycle only.
#[derive(Error, Debug)]
pub enum SynthesisError {
    #[error("synthesis backend failed: {0}")]
    Backend(String),

    #[error("unknown voice '{0}'")]
    UnknownVoice(String),

    #[error("synthesis I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Failures listing voices.
#[derive(Error, Debug)]
pub enum CatalogError {
    #[error("voice catalog request failed: {0}")]
    Request(String),

    #[error("voice catalog response malformed: {0}")]
    Parse(String),
}

/// Rejected session transitions.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SessionError {
    #[error("no subject selected")]
    NoSubject,

    #[error("subject '{0}' has no sentences")]
    EmptySubject(String),

    #[error("unknown subject '{0}'")]
    UnknownSubject(String),

    #[error("voice '{voice}' is not available for locale {locale}")]
    UnknownVoice { voice: String, locale: String },

    #[error("drill engine is not running")]
    EngineGone,
}

/// Audio output device failures.
#[derive(Error, Debug)]
pub enum AudioError {
    #[error("audio output unavailable: {0}")]
    Unavailable(String),

    #[error("audio decode failed: {0}")]
    Decode(String),
}
