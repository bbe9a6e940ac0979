//! koreng-core — Pure types, pacing and session state.
//!
//! No async runtime, no I/O, no platform dependencies.

pub mod error;
pub mod pacing;
pub mod progress;
pub mod session;
pub mod types;
