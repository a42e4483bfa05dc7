//! Modal state machine for keyboard input handling

use crate::commands::{Command, PITCH_FINE_STEP, PITCH_STEP, SEEK_BLOCKS};
use crossterm::event::{KeyCode, KeyEvent, KeyModifiers};

/// Input modes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Mode {
    #[default]
    Normal,
    Command,
}

impl Mode {
    /// Get display name for the mode
    pub fn display_name(&self) -> &'static str {
        match self {
            Mode::Normal => "NORMAL",
            Mode::Command => "COMMAND",
        }
    }
}

/// Handles keyboard input and converts to commands
#[derive(Debug)]
pub struct InputHandler {
    mode: Mode,
    command_buffer: String,
}

impl InputHandler {
    pub fn new() -> Self {
        Self {
            mode: Mode::Normal,
            command_buffer: String::new(),
        }
    }

    /// Get current mode
    pub fn mode(&self) -> Mode {
        self.mode
    }

    /// Get current command buffer (for display)
    pub fn command_buffer(&self) -> &str {
        &self.command_buffer
    }

    /// Handle a key event and return a command if applicable
    pub fn handle_key(&mut self, key: KeyEvent) -> Option<Command> {
        match self.mode {
            Mode::Normal => self.handle_normal_mode(key),
            Mode::Command => self.handle_command_mode(key),
        }
    }

    fn handle_normal_mode(&mut self, key: KeyEvent) -> Option<Command> {
        match key.code {
            KeyCode::Char(':') => {
                self.mode = Mode::Command;
                self.command_buffer.clear();
                Some(Command::EnterCommandMode)
            }
            KeyCode::Char('?') => Some(Command::ShowHelp),

            // Transport
            KeyCode::Char(' ') => Some(Command::Toggle),
            KeyCode::Char('p') => Some(Command::Play),
            KeyCode::Char('s') => Some(Command::Pause),
            KeyCode::Char('z') => Some(Command::Stop),

            // Play queue
            KeyCode::Char('n') => Some(Command::NextTrack),
            KeyCode::Char('b') => Some(Command::PrevTrack),

            // Pitch (arrows: semitone, brackets: fine)
            KeyCode::Right => Some(Command::AdjustSemitones(PITCH_STEP)),
            KeyCode::Left => Some(Command::AdjustSemitones(-PITCH_STEP)),
            KeyCode::Char(']') => Some(Command::AdjustSemitones(PITCH_FINE_STEP)),
            KeyCode::Char('[') => Some(Command::AdjustSemitones(-PITCH_FINE_STEP)),
            KeyCode::Char('0') => Some(Command::ResetPitch),

            // Seeking
            KeyCode::Up => Some(Command::SeekBlocks(SEEK_BLOCKS)),
            KeyCode::Down => Some(Command::SeekBlocks(-SEEK_BLOCKS)),

            KeyCode::Char('q') => Some(Command::Quit),
            KeyCode::Char('c') if key.modifiers.contains(KeyModifiers::CONTROL) => {
                Some(Command::Quit)
            }

            KeyCode::Esc => Some(Command::Cancel),

            _ => None,
        }
    }

    fn handle_command_mode(&mut self, key: KeyEvent) -> Option<Command> {
        match key.code {
            KeyCode::Enter => {
                self.mode = Mode::Normal;
                let buffer = std::mem::take(&mut self.command_buffer);
                Some(parse_command(&buffer))
            }
            KeyCode::Esc => {
                self.mode = Mode::Normal;
                self.command_buffer.clear();
                Some(Command::EnterNormalMode)
            }
            KeyCode::Backspace => {
                self.command_buffer.pop();
                if self.command_buffer.is_empty() {
                    self.mode = Mode::Normal;
                    Some(Command::EnterNormalMode)
                } else {
                    None
                }
            }
            KeyCode::Char(c) => {
                self.command_buffer.push(c);
                None
            }
            _ => None,
        }
    }
}

impl Default for InputHandler {
    fn default() -> Self {
        Self::new()
    }
}

/// Parse a command-mode line (without the leading `:`)
pub fn parse_command(line: &str) -> Command {
    let input = line.trim();
    let (name, arg) = match input.split_once(char::is_whitespace) {
        Some((name, arg)) => (name, arg.trim()),
        None => (input, ""),
    };

    let parsed = match (name, arg) {
        ("q" | "quit", "") => Some(Command::Quit),
        ("play", "") => Some(Command::Play),
        ("pause", "") => Some(Command::Pause),
        ("stop", "") => Some(Command::Stop),
        ("help", "") => Some(Command::ShowHelp),
        ("reset", "") => Some(Command::ResetPitch),
        ("next", "") => Some(Command::NextTrack),
        ("prev" | "previous", "") => Some(Command::PrevTrack),
        ("st" | "semitones" | "pitch", arg) => arg.parse().ok().map(Command::SetSemitones),
        ("ratio", arg) => arg.parse().ok().map(Command::SetRatio),
        ("seek", arg) => parse_timestamp(arg).map(Command::Seek),
        ("load" | "e", arg) => {
            let path = strip_quotes(arg);
            (!path.is_empty()).then(|| Command::LoadTrack(path.into()))
        }
        ("add", arg) => {
            let path = strip_quotes(arg);
            (!path.is_empty()).then(|| Command::AddTrack(path.into()))
        }
        _ => None,
    };

    parsed.unwrap_or_else(|| Command::Invalid(input.to_string()))
}

/// Seconds, or `m:ss(.frac)`
fn parse_timestamp(value: &str) -> Option<f64> {
    let seconds = match value.split_once(':') {
        Some((minutes, seconds)) => {
            let minutes: u32 = minutes.parse().ok()?;
            let seconds: f64 = seconds.parse().ok()?;
            if !(0.0..60.0).contains(&seconds) {
                return None;
            }
            minutes as f64 * 60.0 + seconds
        }
        None => value.parse().ok()?,
    };
    seconds.is_finite().then_some(seconds)
}

fn strip_quotes(path: &str) -> &str {
    let path = path.trim();
    if path.len() >= 2
        && ((path.starts_with('\'') && path.ends_with('\''))
            || (path.starts_with('"') && path.ends_with('"')))
    {
        &path[1..path.len() - 1]
    } else {
        path
    }
}
