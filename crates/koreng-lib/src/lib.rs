//! koreng-lib — Drill engine.
//!
//! Content loading, voice catalog, speech synthesis, audio output, playback
//! scheduling and the HTTP control API. Depends on koreng-core for pure types,
//! pacing and session state.

pub mod audio;
pub mod content;
pub mod drill;
pub mod server;
pub mod synth;
pub mod voices;

// Re-export koreng-core for convenience
pub use koreng_core;
