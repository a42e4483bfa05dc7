//! Session - track playback through the pitch shifter (audio thread side)

use crate::engine::{AudioCommand, AudioEvent, SessionConfig, Shared};
use crate::shifter::{PitchShifter, LATENCY_BLOCKS, STRIDE};
use crate::source::BlockSource;
use crossbeam_channel::{Receiver, Sender};
use std::sync::atomic::Ordering;
use std::sync::Arc;
use tracing::{debug, info};

/// Transport state of a session
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PlaybackState {
    #[default]
    Stopped,
    Playing,
    Paused,
    /// Source ran out and the pipeline tail was emitted; `play` starts
    /// over from the beginning
    Finished,
}

impl PlaybackState {
    pub(crate) fn as_u8(self) -> u8 {
        match self {
            PlaybackState::Stopped => 0,
            PlaybackState::Playing => 1,
            PlaybackState::Paused => 2,
            PlaybackState::Finished => 3,
        }
    }

    pub(crate) fn from_u8(value: u8) -> Self {
        match value {
            1 => PlaybackState::Playing,
            2 => PlaybackState::Paused,
            3 => PlaybackState::Finished,
            _ => PlaybackState::Stopped,
        }
    }
}

/// Audio-thread owner of the pipeline and the current track.
///
/// Drive it with [`Session::process`] once per `STRIDE`-sample block.
pub struct Session {
    shifter: PitchShifter,
    source: Option<Box<dyn BlockSource>>,
    state: PlaybackState,
    /// Pre-allocated input block
    input: Vec<f32>,
    /// Silent blocks still to feed after the source ran out
    drain_blocks: usize,
    shared: Arc<Shared>,
    command_rx: Receiver<AudioCommand>,
    event_tx: Sender<AudioEvent>,
}

impl Session {
    pub(crate) fn new(
        config: &SessionConfig,
        ratio: f32,
        shared: Arc<Shared>,
        command_rx: Receiver<AudioCommand>,
        event_tx: Sender<AudioEvent>,
    ) -> Self {
        Self {
            shifter: PitchShifter::new(ratio, config.phase_lock),
            source: None,
            state: PlaybackState::Stopped,
            input: vec![0.0; STRIDE],
            drain_blocks: 0,
            shared,
            command_rx,
            event_tx,
        }
    }

    /// Produce the next output block. `output` must be `STRIDE` long.
    ///
    /// The pending pitch ratio, queued transport commands and then the
    /// pending seek are applied first, so a parameter never changes in the
    /// middle of a block. A seek accepted alongside a `Load` or `Stop`
    /// therefore lands on the rewound track instead of being undone.
    ///
    /// Once the source runs out, `LATENCY_BLOCKS` silent blocks are pushed
    /// through the pipeline so the end of the track is heard before the
    /// session turns `Finished`.
    pub fn process(&mut self, output: &mut [f32]) {
        debug_assert_eq!(output.len(), STRIDE);

        self.apply_pending_ratio();
        while let Ok(cmd) = self.command_rx.try_recv() {
            self.handle_command(cmd);
        }
        self.apply_pending_seek();

        match (self.state, self.source.as_mut()) {
            (PlaybackState::Playing, Some(_)) if self.drain_blocks > 0 => {
                self.input.fill(0.0);
                self.shifter.process_block(&self.input, output);
                self.drain_blocks -= 1;

                if self.drain_blocks == 0 {
                    self.state = PlaybackState::Finished;
                    info!("playback finished");
                    let _ = self.event_tx.try_send(AudioEvent::Finished);
                }
            }
            (PlaybackState::Playing, Some(source)) => {
                let read = source.read_block(&mut self.input);
                self.input[read..].fill(0.0);
                self.shifter.process_block(&self.input, output);

                if read < STRIDE {
                    self.drain_blocks = LATENCY_BLOCKS;
                    debug!(read, "end of source, draining pipeline");
                }
            }
            _ => output.fill(0.0),
        }

        self.publish(output);
    }

    /// Apply a queued transport command
    pub fn handle_command(&mut self, cmd: AudioCommand) {
        match cmd {
            AudioCommand::Play => self.play(),
            AudioCommand::Pause => self.pause(),
            AudioCommand::Stop => self.stop(),
            AudioCommand::Toggle => self.toggle(),
            AudioCommand::Load(source) => self.load(source),
        }
    }

    fn apply_pending_ratio(&mut self) {
        if let Some(ratio) = self.shared.pending_ratio.take() {
            let ratio = ratio as f32;
            self.shifter.set_pitch_ratio(ratio);
            self.shared.applied_ratio.store(ratio as f64);
            debug!(ratio, "pitch ratio applied");
        }
    }

    fn apply_pending_seek(&mut self) {
        if let Some(seconds) = self.shared.pending_seek.take() {
            self.seek(seconds);
        }
    }

    /// Replace the current track. Stops playback and clears all signal
    /// history; the pitch ratio is kept.
    pub fn load(&mut self, mut source: Box<dyn BlockSource>) {
        source.seek(0);
        let duration = source.duration();
        let sample_rate = source.sample_rate();
        let name = source.name().map(str::to_owned);

        self.source = Some(source);
        self.state = PlaybackState::Stopped;
        self.drain_blocks = 0;
        self.shifter.reset();

        self.shared.duration.store(duration);
        self.shared.sample_rate.store(sample_rate, Ordering::Relaxed);
        info!(?name, duration, sample_rate, "track loaded");
        let _ = self.event_tx.try_send(AudioEvent::TrackLoaded {
            name,
            duration,
            sample_rate,
        });
    }

    /// Check if a track is loaded
    pub fn is_loaded(&self) -> bool {
        self.source.is_some()
    }

    /// Start playback (restarts a finished track)
    pub fn play(&mut self) {
        match (self.state, self.source.as_mut()) {
            (_, None) => debug!("play ignored, no track loaded"),
            (PlaybackState::Finished, Some(source)) => {
                source.seek(0);
                self.drain_blocks = 0;
                self.state = PlaybackState::Playing;
            }
            (_, Some(_)) => self.state = PlaybackState::Playing,
        }
    }

    pub fn pause(&mut self) {
        if self.state == PlaybackState::Playing {
            self.state = PlaybackState::Paused;
        }
    }

    /// Stop playback and rewind
    pub fn stop(&mut self) {
        self.state = PlaybackState::Stopped;
        self.drain_blocks = 0;
        if let Some(source) = self.source.as_mut() {
            source.seek(0);
        }
    }

    /// Toggle play/pause
    pub fn toggle(&mut self) {
        match self.state {
            PlaybackState::Playing => self.pause(),
            PlaybackState::Paused | PlaybackState::Stopped | PlaybackState::Finished => self.play(),
        }
    }

    /// Move the read cursor to `seconds`. A finished track becomes paused
    /// at the new position.
    fn seek(&mut self, seconds: f64) {
        let Some(source) = self.source.as_mut() else {
            return;
        };
        let sample = (seconds * source.sample_rate() as f64).round().max(0.0) as usize;
        source.seek(sample);
        self.drain_blocks = 0;
        if self.state == PlaybackState::Finished {
            self.state = PlaybackState::Paused;
        }
        debug!(seconds, sample, "seek applied");
    }

    fn publish(&self, output: &[f32]) {
        let position = self.position_secs();
        self.shared.position.store(position);
        self.shared.state.store(self.state.as_u8(), Ordering::Relaxed);

        // Skip rather than wait if the control side is reading
        if let Some(mut block) = self.shared.last_block.try_lock() {
            block.copy_from_slice(output);
        }
    }

    /// Current playback state
    #[inline]
    pub fn state(&self) -> PlaybackState {
        self.state
    }

    /// Read cursor in seconds
    pub fn position_secs(&self) -> f64 {
        match &self.source {
            Some(source) if source.sample_rate() > 0 => {
                source.position() as f64 / source.sample_rate() as f64
            }
            _ => 0.0,
        }
    }

    /// Track duration in seconds
    pub fn duration(&self) -> f64 {
        self.source.as_ref().map_or(0.0, |s| s.duration())
    }

    /// Applied pitch ratio
    #[inline]
    pub fn pitch_ratio(&self) -> f32 {
        self.shifter.pitch_ratio()
    }

    #[inline]
    pub fn shifter(&self) -> &PitchShifter {
        &self.shifter
    }
}
