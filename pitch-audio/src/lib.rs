//! Audio core for Pitch - real-time pitch shifting of streamed mono audio
//!
//! This crate provides the processing pipeline and its control surface:
//! - Shifter: Grain assembly, bin rescaling, phase vocoder, overlap-add
//! - Session: Track transport driven by the audio callback
//! - SessionHandle: Thread-safe control of pitch, position and transport

mod engine;
mod error;
mod pending;
mod session;
mod source;
pub mod shifter;

pub use engine::{
    create_session, ratio_to_semitones, semitones_to_ratio, AudioCommand, AudioEvent,
    SessionConfig, SessionHandle,
};
pub use error::SessionError;
pub use pending::{AtomicF64, PendingValue};
pub use session::{PlaybackState, Session};
pub use shifter::{
    PhaseLockMode, PhaseLockParams, PitchShifter, GRAIN_LEN, LATENCY_BLOCKS, N_BINS, OVERLAP, STRIDE,
};
pub use source::{BlockSource, MemorySource};
