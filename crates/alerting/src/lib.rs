//! Alerting System
//!
//! Plays the audible drowsiness alert. Dispatch is serialized (alerts never
//! overlap) and bounded by a maximum duration; failures are counted and
//! logged, never propagated to the stream that raised the trigger.

mod dispatcher;
mod player;

pub use dispatcher::{AlertConfig, AlertDispatcher, AlertStats, DispatchOutcome};
pub use player::{AlertPlayer, CommandPlayer, PlayFuture, SilentPlayer};

use thiserror::Error;

/// Errors during alert playback
#[derive(Debug, Error)]
pub enum AlertError {
    #[error("Alert player failed: {0}")]
    Player(String),
    #[error("Alert playback exceeded {0}ms")]
    Timeout(u64),
}
