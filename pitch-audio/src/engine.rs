//! Session control surface - commands, events and the control-thread handle

use crate::error::SessionError;
use crate::pending::{AtomicF64, PendingValue};
use crate::session::{PlaybackState, Session};
use crate::shifter::{PhaseLockParams, STRIDE};
use crate::source::BlockSource;
use crossbeam_channel::{bounded, Receiver, Sender, TrySendError};
use parking_lot::Mutex;
use pitch_analysis::SpectrumAnalyzer;
use std::fmt;
use std::sync::atomic::{AtomicU32, AtomicU8, Ordering};
use std::sync::Arc;
use tracing::debug;

/// Transport commands sent to the audio thread
pub enum AudioCommand {
    Play,
    Pause,
    Stop,
    Toggle,
    Load(Box<dyn BlockSource>),
}

impl fmt::Debug for AudioCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AudioCommand::Play => write!(f, "Play"),
            AudioCommand::Pause => write!(f, "Pause"),
            AudioCommand::Stop => write!(f, "Stop"),
            AudioCommand::Toggle => write!(f, "Toggle"),
            AudioCommand::Load(source) => write!(f, "Load({} samples)", source.len()),
        }
    }
}

/// Events sent from the audio thread
#[derive(Debug, Clone, PartialEq)]
pub enum AudioEvent {
    /// Track loaded and ready to play
    TrackLoaded {
        name: Option<String>,
        duration: f64,
        sample_rate: u32,
    },
    /// Source ran out of samples
    Finished,
}

/// Session construction parameters
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SessionConfig {
    /// Largest accepted shift in either direction
    pub max_semitones: f32,
    /// Pitch ratio at start-up (clamped into range)
    pub initial_ratio: f32,
    /// Phase vocoder tuning
    pub phase_lock: PhaseLockParams,
    /// Capacity of the command and event queues
    pub queue_capacity: usize,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            max_semitones: 24.0,
            initial_ratio: 1.0,
            phase_lock: PhaseLockParams::default(),
            queue_capacity: 64,
        }
    }
}

impl SessionConfig {
    /// Accepted pitch ratios, inclusive
    pub fn ratio_range(&self) -> (f32, f32) {
        (
            semitones_to_ratio(-self.max_semitones),
            semitones_to_ratio(self.max_semitones),
        )
    }
}

/// Pitch ratio of a shift by `semitones` (equal temperament)
#[inline]
pub fn semitones_to_ratio(semitones: f32) -> f32 {
    2.0f32.powf(semitones / 12.0)
}

/// Inverse of [`semitones_to_ratio`]
#[inline]
pub fn ratio_to_semitones(ratio: f32) -> f32 {
    12.0 * ratio.log2()
}

/// State shared between the session and its handles
pub(crate) struct Shared {
    pub(crate) pending_ratio: PendingValue,
    pub(crate) pending_seek: PendingValue,
    /// Last ratio accepted from the control side
    pub(crate) requested_ratio: AtomicF64,
    /// Ratio the pipeline is running at
    pub(crate) applied_ratio: AtomicF64,
    pub(crate) position: AtomicF64,
    pub(crate) duration: AtomicF64,
    pub(crate) sample_rate: AtomicU32,
    pub(crate) state: AtomicU8,
    /// Last emitted output block
    pub(crate) last_block: Mutex<Vec<f32>>,
    /// Control-side analyzer for the output spectrum
    analyzer: Mutex<SpectrumAnalyzer>,
}

/// Create a session (for the audio thread) and its control handle
pub fn create_session(config: SessionConfig) -> (Session, SessionHandle) {
    let (min, max) = config.ratio_range();
    let ratio = if config.initial_ratio.is_finite() {
        config.initial_ratio.clamp(min, max)
    } else {
        1.0
    };

    let shared = Arc::new(Shared {
        pending_ratio: PendingValue::new(),
        pending_seek: PendingValue::new(),
        requested_ratio: AtomicF64::new(ratio as f64),
        applied_ratio: AtomicF64::new(ratio as f64),
        position: AtomicF64::new(0.0),
        duration: AtomicF64::new(0.0),
        sample_rate: AtomicU32::new(0),
        state: AtomicU8::new(PlaybackState::Stopped.as_u8()),
        last_block: Mutex::new(vec![0.0; STRIDE]),
        analyzer: Mutex::new(SpectrumAnalyzer::new(STRIDE)),
    });

    let capacity = config.queue_capacity.max(1);
    let (command_tx, command_rx) = bounded(capacity);
    let (event_tx, event_rx) = bounded(capacity);

    let session = Session::new(&config, ratio, Arc::clone(&shared), command_rx, event_tx);
    let handle = SessionHandle {
        shared,
        command_tx,
        event_rx,
        config,
    };
    (session, handle)
}

/// Control-thread handle to a running session. Cheap to clone.
///
/// Parameter setters validate synchronously and never block the audio
/// thread; accepted values take effect at the start of the next block.
#[derive(Clone)]
pub struct SessionHandle {
    shared: Arc<Shared>,
    command_tx: Sender<AudioCommand>,
    event_rx: Receiver<AudioEvent>,
    config: SessionConfig,
}

impl SessionHandle {
    fn send(&self, cmd: AudioCommand) -> Result<(), SessionError> {
        self.command_tx.try_send(cmd).map_err(|err| match err {
            TrySendError::Full(cmd) => {
                debug!(?cmd, "command dropped, queue full");
                SessionError::QueueFull
            }
            TrySendError::Disconnected(_) => SessionError::Disconnected,
        })
    }

    pub fn play(&self) -> Result<(), SessionError> {
        self.send(AudioCommand::Play)
    }

    pub fn pause(&self) -> Result<(), SessionError> {
        self.send(AudioCommand::Pause)
    }

    pub fn stop(&self) -> Result<(), SessionError> {
        self.send(AudioCommand::Stop)
    }

    pub fn toggle(&self) -> Result<(), SessionError> {
        self.send(AudioCommand::Toggle)
    }

    /// Queue a new track. Duration is updated right away so positions can
    /// be validated against the new track before the audio thread picks it
    /// up; the position keeps reporting the old cursor until then.
    pub fn load(&self, source: Box<dyn BlockSource>) -> Result<(), SessionError> {
        let duration = source.duration();
        let sample_rate = source.sample_rate();
        self.send(AudioCommand::Load(source))?;
        self.shared.duration.store(duration);
        self.shared.sample_rate.store(sample_rate, Ordering::Relaxed);
        Ok(())
    }

    /// Request a new pitch ratio
    pub fn set_pitch_ratio(&self, ratio: f32) -> Result<(), SessionError> {
        if !ratio.is_finite() {
            debug!(ratio, "rejected pitch ratio");
            return Err(SessionError::NonFinite("pitch ratio"));
        }
        let (min, max) = self.config.ratio_range();
        if !(min..=max).contains(&ratio) {
            debug!(ratio, min, max, "rejected pitch ratio");
            return Err(SessionError::RatioOutOfRange { ratio, min, max });
        }

        self.shared.requested_ratio.store(ratio as f64);
        self.shared.pending_ratio.store(ratio as f64);
        Ok(())
    }

    /// Most recently requested pitch ratio
    pub fn pitch_ratio(&self) -> f32 {
        self.shared.requested_ratio.load() as f32
    }

    /// Pitch ratio the audio thread is running at
    pub fn applied_pitch_ratio(&self) -> f32 {
        self.shared.applied_ratio.load() as f32
    }

    /// Request a shift in semitones
    pub fn set_semitones(&self, semitones: f32) -> Result<(), SessionError> {
        if !semitones.is_finite() {
            return Err(SessionError::NonFinite("semitones"));
        }
        self.set_pitch_ratio(semitones_to_ratio(semitones))
    }

    /// Current shift in semitones
    pub fn semitones(&self) -> f32 {
        ratio_to_semitones(self.pitch_ratio())
    }

    /// Shift by `delta` semitones from the current setting, clamped to range
    pub fn nudge_semitones(&self, delta: f32) -> Result<(), SessionError> {
        if !delta.is_finite() {
            return Err(SessionError::NonFinite("semitones"));
        }
        let max = self.config.max_semitones;
        let target = (self.semitones() + delta).clamp(-max, max);
        // Snap to the grid so repeated nudges don't drift
        let snapped = (target * 1000.0).round() / 1000.0;
        self.set_semitones(snapped.clamp(-max, max))
    }

    /// Request a jump to `seconds` within the loaded track
    pub fn set_position(&self, seconds: f64) -> Result<(), SessionError> {
        if !seconds.is_finite() {
            debug!(seconds, "rejected position");
            return Err(SessionError::NonFinite("position"));
        }
        let duration = self.duration();
        if seconds < 0.0 || seconds >= duration {
            debug!(seconds, duration, "rejected position");
            return Err(SessionError::PositionOutOfRange { seconds, duration });
        }

        self.shared.pending_seek.store(seconds);
        Ok(())
    }

    /// Move by `delta_secs` from the current position, clamped to the track
    pub fn nudge(&self, delta_secs: f64) -> Result<(), SessionError> {
        if !delta_secs.is_finite() {
            return Err(SessionError::NonFinite("position"));
        }
        let duration = self.duration();
        let sample_rate = self.shared.sample_rate.load(Ordering::Relaxed);
        let last = if sample_rate > 0 {
            duration - 1.0 / sample_rate as f64
        } else {
            0.0
        };
        let target = (self.position() + delta_secs).clamp(0.0, last.max(0.0));
        self.set_position(target)
    }

    /// Read position in seconds
    pub fn position(&self) -> f64 {
        self.shared.position.load()
    }

    /// Duration of the loaded track in seconds (0 when nothing is loaded)
    pub fn duration(&self) -> f64 {
        self.shared.duration.load()
    }

    pub fn sample_rate(&self) -> u32 {
        self.shared.sample_rate.load(Ordering::Relaxed)
    }

    pub fn playback_state(&self) -> PlaybackState {
        PlaybackState::from_u8(self.shared.state.load(Ordering::Relaxed))
    }

    /// Accepted pitch ratios, inclusive
    pub fn ratio_range(&self) -> (f32, f32) {
        self.config.ratio_range()
    }

    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    /// Copy of the last emitted output block
    pub fn current_block(&self) -> Vec<f32> {
        self.shared.last_block.lock().clone()
    }

    /// `|FFT(last output block)|`, `STRIDE / 2 + 1` values
    pub fn amplitude_spectrum(&self) -> Vec<f32> {
        let block = self.current_block();
        self.shared.analyzer.lock().magnitudes(&block)
    }

    /// Next pending audio-thread event, if any
    pub fn try_event(&self) -> Option<AudioEvent> {
        self.event_rx.try_recv().ok()
    }

    /// Event receiver, for blocking or `select!` use
    pub fn events(&self) -> &Receiver<AudioEvent> {
        &self.event_rx
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_range_is_two_octaves() {
        let (min, max) = SessionConfig::default().ratio_range();
        assert!((min - 0.25).abs() < 1e-6);
        assert!((max - 4.0).abs() < 1e-5);
    }

    #[test]
    fn test_semitone_conversion() {
        assert!((semitones_to_ratio(12.0) - 2.0).abs() < 1e-6);
        assert!((semitones_to_ratio(7.0) - 1.498_307).abs() < 1e-5);
        assert!((ratio_to_semitones(0.5) + 12.0).abs() < 1e-5);
    }

    #[test]
    fn test_initial_ratio_is_clamped() {
        let config = SessionConfig {
            initial_ratio: 10.0,
            ..SessionConfig::default()
        };
        let (session, handle) = create_session(config);
        assert!((handle.pitch_ratio() - 4.0).abs() < 1e-5);
        assert!((session.pitch_ratio() - 4.0).abs() < 1e-5);
    }

    #[test]
    fn test_queue_full_is_reported() {
        let config = SessionConfig {
            queue_capacity: 1,
            ..SessionConfig::default()
        };
        let (_session, handle) = create_session(config);
        handle.play().unwrap();
        assert_eq!(handle.pause(), Err(SessionError::QueueFull));
    }

    #[test]
    fn test_disconnected_after_session_drop() {
        let (session, handle) = create_session(SessionConfig::default());
        drop(session);
        assert_eq!(handle.play(), Err(SessionError::Disconnected));
    }

    #[test]
    fn test_nudge_semitones_clamps() {
        let (_session, handle) = create_session(SessionConfig::default());
        handle.set_semitones(23.0).unwrap();
        handle.nudge_semitones(5.0).unwrap();
        assert!((handle.semitones() - 24.0).abs() < 1e-3);

        handle.nudge_semitones(-1.0).unwrap();
        assert!((handle.semitones() - 23.0).abs() < 1e-3);
    }
}
