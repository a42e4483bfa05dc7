//! Modal keyboard input handling for Pitch

mod commands;
mod modal;

pub use commands::{Command, PITCH_FINE_STEP, PITCH_STEP, SEEK_BLOCKS};
pub use modal::{parse_command, InputHandler, Mode};
