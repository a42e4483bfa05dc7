//! Command definitions for Pitch

use std::path::PathBuf;

/// Blocks skipped by a single seek key press (about one second at 44.1 kHz)
pub const SEEK_BLOCKS: i32 = 45;

/// Semitones moved by a coarse pitch key press
pub const PITCH_STEP: f32 = 1.0;

/// Semitones moved by a fine pitch key press
pub const PITCH_FINE_STEP: f32 = 0.1;

/// Commands that can be dispatched from input
#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    // Playback
    Play,
    Pause,
    Stop,
    Toggle,

    // Seeking
    Seek(f64),       // Absolute position in seconds
    SeekBlocks(i32), // Relative jump in audio blocks (negative = backward)

    // Pitch
    SetSemitones(f32),
    AdjustSemitones(f32),
    SetRatio(f32),
    ResetPitch,

    // Track loading and queue
    LoadTrack(PathBuf),
    AddTrack(PathBuf),
    NextTrack,
    PrevTrack,

    // Mode changes
    EnterCommandMode,
    EnterNormalMode,

    // Application
    ShowHelp,
    Quit,
    Cancel,

    // Command mode input that could not be parsed
    Invalid(String),
}
