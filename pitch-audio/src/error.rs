//! Errors reported by the session control surface

use thiserror::Error;

/// Rejected control request. State is never modified when one is returned.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum SessionError {
    #[error("Pitch ratio {ratio} outside [{min}, {max}]")]
    RatioOutOfRange { ratio: f32, min: f32, max: f32 },
    #[error("Position {seconds}s outside track of {duration}s")]
    PositionOutOfRange { seconds: f64, duration: f64 },
    #[error("Non-finite {0}")]
    NonFinite(&'static str),
    #[error("Command queue full")]
    QueueFull,
    #[error("Audio thread disconnected")]
    Disconnected,
}
