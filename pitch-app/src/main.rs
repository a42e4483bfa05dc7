//! Pitch - terminal pitch-shifting player
//!
//! Plays a queue of WAV files through the default output device while the
//! pitch is changed live from the keyboard. The pitch carries over from one
//! track to the next.

use std::io::{self, stdout, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};

use anyhow::Context;
use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::{SampleRate, Stream, StreamConfig};
use crossterm::{
    cursor::MoveToColumn,
    event::{self, Event, KeyEventKind},
    execute,
    style::Print,
    terminal::{disable_raw_mode, enable_raw_mode, Clear, ClearType},
};
use parking_lot::Mutex;
use ringbuf::traits::{Consumer, Observer, Producer, Split};
use ringbuf::HeapRb;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

use pitch_analysis::dominant_frequency;
use pitch_audio::{
    create_session, semitones_to_ratio, AudioEvent, MemorySource, PhaseLockMode,
    PhaseLockParams, PlaybackState, Session, SessionConfig, SessionError, SessionHandle, STRIDE,
};
use pitch_input::{Command, InputHandler, Mode};
use pitch_library::{Config, PhaseLockSetting, Playlist, TrackLoader};

/// Status line refresh interval
const STATUS_INTERVAL: Duration = Duration::from_millis(100);

/// Key event poll timeout
const POLL_TIMEOUT: Duration = Duration::from_millis(20);

const HELP: &str = "space play/pause | p play | s pause | z stop | \u{2190}\u{2192} \u{00b1}1 st | \
                    [ ] \u{00b1}0.1 st | 0 reset | \u{2191}\u{2193} seek | n/b next/prev | \
                    :load :add :st :ratio :seek | q quit";

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(io::stderr)
        .init();

    let mut config = Config::load();
    let mut tracks: Vec<PathBuf> = std::env::args().skip(1).map(PathBuf::from).collect();
    if tracks.is_empty() {
        tracks.extend(config.last_track.clone());
    }

    let (session, handle) = create_session(session_config(&config));
    let session = Arc::new(Mutex::new(session));
    let mut app = App::new(handle, session, Playlist::new(tracks))?;

    if let Some(path) = app.playlist.current().map(Path::to_path_buf) {
        app.load_path(&path);
    }

    enable_raw_mode()?;
    let result = app.run();
    disable_raw_mode()?;
    println!();

    config.semitones = app.handle.semitones();
    config.last_track = app.playlist.current().map(Path::to_path_buf);
    if let Err(e) = config.save() {
        warn!(error = %e, "failed to save config");
    }

    result
}

/// Map the persisted configuration onto session parameters
fn session_config(config: &Config) -> SessionConfig {
    let mode = match config.phase_lock {
        PhaseLockSetting::Gradient => PhaseLockMode::GradientHeap,
        PhaseLockSetting::Peak => PhaseLockMode::PeakLocked,
    };

    SessionConfig {
        max_semitones: config.max_semitones,
        initial_ratio: semitones_to_ratio(config.semitones),
        phase_lock: PhaseLockParams {
            mode,
            magnitude_threshold: config.magnitude_threshold,
            onset_seeding: config.onset_seeding,
        },
        ..SessionConfig::default()
    }
}

/// Output stream running the session at a fixed sample rate
struct AudioOutput {
    _stream: Stream,
    sample_rate: u32,
}

impl AudioOutput {
    /// Open the default device at `sample_rate` (device default when `None`)
    fn open(session: Arc<Mutex<Session>>, sample_rate: Option<u32>) -> anyhow::Result<Self> {
        let host = cpal::default_host();
        let device = host
            .default_output_device()
            .context("No audio output device found")?;

        let default_config = device
            .default_output_config()
            .context("Failed to get default output config")?;

        let sample_rate = sample_rate.unwrap_or(default_config.sample_rate().0);
        let channels = default_config.channels().max(1) as usize;
        let config = StreamConfig {
            channels: channels as u16,
            sample_rate: SampleRate(sample_rate),
            buffer_size: cpal::BufferSize::Default,
        };

        // Mono FIFO adapting device callback sizes to whole session blocks
        let (mut producer, mut consumer) = HeapRb::<f32>::new(STRIDE).split();
        let mut block = vec![0.0f32; STRIDE];

        let stream = device
            .build_output_stream(
                &config,
                move |data: &mut [f32], _: &cpal::OutputCallbackInfo| {
                    // Never block the audio thread; output silence on contention
                    let Some(mut guard) = session.try_lock() else {
                        data.fill(0.0);
                        return;
                    };

                    for frame in data.chunks_mut(channels) {
                        if consumer.is_empty() {
                            guard.process(&mut block);
                            producer.push_slice(&block);
                        }
                        let sample = consumer.try_pop().unwrap_or(0.0);
                        frame.fill(sample);
                    }
                },
                |err| {
                    error!(error = %err, "audio stream error");
                },
                None,
            )
            .context("Failed to build output stream")?;

        stream.play().context("Failed to start audio stream")?;
        info!(sample_rate, channels, "audio output started");

        Ok(Self {
            _stream: stream,
            sample_rate,
        })
    }
}

/// Control-side application state
struct App {
    handle: SessionHandle,
    session: Arc<Mutex<Session>>,
    output: AudioOutput,
    loader: TrackLoader,
    input: InputHandler,
    playlist: Playlist,
    message: String,
    should_quit: bool,
}

impl App {
    fn new(
        handle: SessionHandle,
        session: Arc<Mutex<Session>>,
        playlist: Playlist,
    ) -> anyhow::Result<Self> {
        let output = AudioOutput::open(session.clone(), None)?;
        Ok(Self {
            handle,
            session,
            output,
            loader: TrackLoader::new(),
            input: InputHandler::new(),
            playlist,
            message: "Press ? for help, :load <file> to open a track".to_string(),
            should_quit: false,
        })
    }

    fn run(&mut self) -> anyhow::Result<()> {
        let mut stdout = stdout();
        let mut last_status: Option<Instant> = None;

        while !self.should_quit {
            while let Some(event) = self.handle.try_event() {
                self.handle_audio_event(event);
            }

            if last_status.map_or(true, |t| t.elapsed() >= STATUS_INTERVAL) {
                execute!(
                    stdout,
                    MoveToColumn(0),
                    Clear(ClearType::CurrentLine),
                    Print(self.status_line())
                )?;
                stdout.flush()?;
                last_status = Some(Instant::now());
            }

            if event::poll(POLL_TIMEOUT)? {
                if let Event::Key(key) = event::read()? {
                    if key.kind != KeyEventKind::Press {
                        continue;
                    }
                    if let Some(cmd) = self.input.handle_key(key) {
                        self.handle_command(cmd);
                    }
                }
            }
        }

        Ok(())
    }

    fn handle_audio_event(&mut self, event: AudioEvent) {
        match event {
            AudioEvent::TrackLoaded { name, duration, .. } => {
                self.message = format!(
                    "Loaded {} ({})",
                    name.as_deref().unwrap_or("track"),
                    format_time(duration)
                );
            }
            AudioEvent::Finished => match advance_after_finish(&mut self.playlist) {
                Some(path) => {
                    if self.load_path(&path) {
                        if let Err(e) = self.handle.play() {
                            self.message = e.to_string();
                        }
                    }
                }
                None => self.message = "End of track".to_string(),
            },
        }
    }

    fn handle_command(&mut self, cmd: Command) {
        let result = match cmd {
            // Transport
            Command::Play => self.handle.play(),
            Command::Pause => self.handle.pause(),
            Command::Stop => self.handle.stop(),
            Command::Toggle => self.handle.toggle(),

            // Seeking
            Command::Seek(seconds) => self.handle.set_position(seconds),
            Command::SeekBlocks(blocks) => {
                let sample_rate = self.handle.sample_rate().max(1);
                self.handle
                    .nudge(blocks as f64 * STRIDE as f64 / sample_rate as f64)
            }

            // Pitch
            Command::SetSemitones(st) => self.handle.set_semitones(st),
            Command::AdjustSemitones(delta) => self.handle.nudge_semitones(delta),
            Command::SetRatio(ratio) => self.handle.set_pitch_ratio(ratio),
            Command::ResetPitch => self.handle.set_semitones(0.0),

            Command::LoadTrack(path) => {
                let path = self.playlist.add_and_select(path).to_path_buf();
                self.load_path(&path);
                Ok(())
            }
            Command::AddTrack(path) => {
                self.message = format!("Queued {}", path.display());
                let first = self.playlist.is_empty();
                self.playlist.push(path.clone());
                if first {
                    self.load_path(&path);
                }
                Ok(())
            }
            Command::NextTrack => self.change_track(Playlist::next_track),
            Command::PrevTrack => self.change_track(Playlist::previous_track),

            Command::ShowHelp => {
                self.message = HELP.to_string();
                Ok(())
            }
            Command::Invalid(input) => {
                self.message = format!("Unknown command: {}", input);
                Ok(())
            }
            Command::Quit => {
                self.should_quit = true;
                Ok(())
            }
            Command::EnterCommandMode | Command::EnterNormalMode | Command::Cancel => Ok(()),
        };

        if let Err(e) = result {
            self.message = e.to_string();
        }
    }

    /// Move through the queue; playback continues if it was running
    fn change_track(
        &mut self,
        step: fn(&mut Playlist) -> Option<&Path>,
    ) -> Result<(), SessionError> {
        let Some(path) = step(&mut self.playlist).map(Path::to_path_buf) else {
            self.message = "Play queue is empty".to_string();
            return Ok(());
        };

        let resume = self.handle.playback_state() == PlaybackState::Playing;
        if self.load_path(&path) && resume {
            self.handle.play()?;
        }
        Ok(())
    }

    /// Decode `path` and hand it to the session. Returns whether the track
    /// was queued.
    fn load_path(&mut self, path: &Path) -> bool {
        let track = match self.loader.load(path) {
            Ok(track) => track,
            Err(e) => {
                warn!(path = %path.display(), error = %e, "failed to load track");
                self.message = format!("Failed to load {}: {}", path.display(), e);
                return false;
            }
        };

        // No resampling: the device runs at the track's rate
        if track.sample_rate != self.output.sample_rate {
            match AudioOutput::open(self.session.clone(), Some(track.sample_rate)) {
                Ok(output) => self.output = output,
                Err(e) => {
                    warn!(error = %e, "failed to reopen output; playing at device rate");
                }
            }
        }

        let source = MemorySource::new(track.samples, track.sample_rate)
            .with_name(track.metadata.title.clone());
        match self.handle.load(Box::new(source)) {
            Ok(()) => {
                self.message = format!("Loading {}", track.metadata.title);
                true
            }
            Err(e) => {
                self.message = format!("Failed to queue track: {}", e);
                false
            }
        }
    }

    fn status_line(&self) -> String {
        let state = match self.handle.playback_state() {
            PlaybackState::Stopped => "STOPPED",
            PlaybackState::Playing => "PLAYING",
            PlaybackState::Paused => "PAUSED",
            PlaybackState::Finished => "FINISHED",
        };

        let peak = if self.handle.playback_state() == PlaybackState::Playing {
            dominant_frequency(&self.handle.current_block(), self.handle.sample_rate())
                .map(|f| format!(" ~{:.0} Hz", f))
                .unwrap_or_default()
        } else {
            String::new()
        };

        let prompt = match self.input.mode() {
            Mode::Command => format!(":{}", self.input.command_buffer()),
            Mode::Normal => self.message.clone(),
        };

        let queue = match self.playlist.current_index() {
            Some(index) if self.playlist.len() > 1 => {
                format!(" {}/{}", index + 1, self.playlist.len())
            }
            _ => String::new(),
        };

        format!(
            "[{}{}] {} / {}  {:+.2} st (x{:.3}){}  {}",
            state,
            queue,
            format_time(self.handle.position()),
            format_time(self.handle.duration()),
            self.handle.semitones(),
            self.handle.pitch_ratio(),
            peak,
            prompt
        )
    }
}

/// Track to continue with once the current one finished. The queue wraps
/// around; a single track is not repeated.
fn advance_after_finish(playlist: &mut Playlist) -> Option<PathBuf> {
    if playlist.len() < 2 {
        return None;
    }
    playlist.next_track().map(Path::to_path_buf)
}

fn format_time(seconds: f64) -> String {
    let total = seconds.max(0.0);
    let minutes = (total / 60.0).floor() as u64;
    format!("{}:{:04.1}", minutes, total - minutes as f64 * 60.0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_session_config_mapping() {
        let config = Config {
            max_semitones: 12.0,
            magnitude_threshold: 0.01,
            onset_seeding: false,
            phase_lock: PhaseLockSetting::Peak,
            semitones: 12.0,
            last_track: None,
        };
        let session = session_config(&config);

        assert_eq!(session.max_semitones, 12.0);
        assert!((session.initial_ratio - 2.0).abs() < 1e-6);
        assert_eq!(session.phase_lock.mode, PhaseLockMode::PeakLocked);
        assert_eq!(session.phase_lock.magnitude_threshold, 0.01);
        assert!(!session.phase_lock.onset_seeding);
        assert_eq!(session.queue_capacity, SessionConfig::default().queue_capacity);
    }

    #[test]
    fn test_default_config_maps_to_default_session() {
        assert_eq!(session_config(&Config::default()), SessionConfig::default());
    }

    #[test]
    fn test_finished_track_advances_through_queue() {
        let mut playlist = Playlist::new(vec![PathBuf::from("a.wav"), PathBuf::from("b.wav")]);
        assert_eq!(advance_after_finish(&mut playlist), Some(PathBuf::from("b.wav")));
        assert_eq!(advance_after_finish(&mut playlist), Some(PathBuf::from("a.wav")));
    }

    #[test]
    fn test_single_track_is_not_repeated() {
        let mut playlist = Playlist::new(vec![PathBuf::from("a.wav")]);
        assert_eq!(advance_after_finish(&mut playlist), None);
        assert_eq!(playlist.current(), Some(Path::new("a.wav")));
        assert_eq!(advance_after_finish(&mut Playlist::default()), None);
    }

    #[test]
    fn test_format_time() {
        assert_eq!(format_time(0.0), "0:00.0");
        assert_eq!(format_time(75.5), "1:15.5");
        assert_eq!(format_time(-3.0), "0:00.0");
    }
}
