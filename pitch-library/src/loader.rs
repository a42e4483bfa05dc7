//! Audio file loading and decoding

use std::io::Cursor;
use std::path::Path;
use symphonia::core::audio::SampleBuffer;
use symphonia::core::codecs::{DecoderOptions, CODEC_TYPE_NULL};
use symphonia::core::errors::Error as SymphoniaError;
use symphonia::core::formats::{FormatOptions, FormatReader};
use symphonia::core::io::{MediaSource, MediaSourceStream};
use symphonia::core::meta::{MetadataOptions, StandardTagKey};
use symphonia::core::probe::Hint;
use thiserror::Error;
use tracing::{debug, info};

/// Errors that can occur during track loading
#[derive(Error, Debug)]
pub enum LoadError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("No audio track found in file")]
    NoAudioTrack,
    #[error("Unsupported format")]
    UnsupportedFormat,
    #[error("Decode error: {0}")]
    Decode(String),
    #[error("File contains no samples")]
    Empty,
}

/// Track metadata
#[derive(Debug, Clone, Default)]
pub struct TrackMetadata {
    pub title: String,
    pub artist: String,
    pub album: String,
    pub duration_secs: f64,
    pub sample_rate: u32,
    pub channels: u16,
}

/// A loaded and decoded audio track
#[derive(Debug, Clone)]
pub struct LoadedTrack {
    /// Mono samples (all channels averaged), normalized to -1.0 to 1.0
    pub samples: Vec<f32>,
    /// Sample rate in Hz
    pub sample_rate: u32,
    /// Channel count of the source file
    pub channels: u16,
    /// Track metadata
    pub metadata: TrackMetadata,
}

/// Audio file loader using Symphonia (uncompressed WAV/PCM)
#[derive(Debug, Default)]
pub struct TrackLoader;

impl TrackLoader {
    pub fn new() -> Self {
        Self
    }

    /// Load and decode an audio file
    pub fn load(&self, path: &Path) -> Result<LoadedTrack, LoadError> {
        let file = std::fs::File::open(path)?;

        let mut hint = Hint::new();
        if let Some(ext) = path.extension().and_then(|e| e.to_str()) {
            hint.with_extension(ext);
        }

        let title = path
            .file_stem()
            .and_then(|s| s.to_str())
            .unwrap_or("Unknown")
            .to_string();

        let track = self.decode(Box::new(file), hint, title)?;
        info!(
            path = %path.display(),
            duration = track.metadata.duration_secs,
            sample_rate = track.sample_rate,
            channels = track.channels,
            "track decoded"
        );
        Ok(track)
    }

    /// Decode an in-memory file
    pub fn load_bytes(&self, bytes: Vec<u8>, title: &str) -> Result<LoadedTrack, LoadError> {
        self.decode(Box::new(Cursor::new(bytes)), Hint::new(), title.to_string())
    }

    fn decode(
        &self,
        source: Box<dyn MediaSource>,
        hint: Hint,
        title: String,
    ) -> Result<LoadedTrack, LoadError> {
        let mss = MediaSourceStream::new(source, Default::default());

        let probed = symphonia::default::get_probe()
            .format(
                &hint,
                mss,
                &FormatOptions::default(),
                &MetadataOptions::default(),
            )
            .map_err(|e| match e {
                SymphoniaError::Unsupported(_) => LoadError::UnsupportedFormat,
                SymphoniaError::IoError(e) => LoadError::Io(e),
                e => LoadError::Decode(e.to_string()),
            })?;

        let mut format = probed.format;

        // Find first audio track
        let track = format
            .tracks()
            .iter()
            .find(|t| t.codec_params.codec != CODEC_TYPE_NULL)
            .ok_or(LoadError::NoAudioTrack)?;

        let track_id = track.id;
        let codec_params = track.codec_params.clone();

        let sample_rate = codec_params.sample_rate.unwrap_or(44100);
        let channels = codec_params
            .channels
            .map(|c| c.count() as u16)
            .unwrap_or(1)
            .max(1);

        let mut decoder = symphonia::default::get_codecs()
            .make(&codec_params, &DecoderOptions::default())
            .map_err(|e| match e {
                SymphoniaError::Unsupported(_) => LoadError::UnsupportedFormat,
                e => LoadError::Decode(e.to_string()),
            })?;

        let mut metadata = Self::extract_metadata(&mut format, title);
        metadata.sample_rate = sample_rate;
        metadata.channels = channels;

        // Decode all packets, mixing each frame down to mono
        let mut samples: Vec<f32> = Vec::new();
        let mut skipped = 0usize;

        loop {
            let packet = match format.next_packet() {
                Ok(p) => p,
                Err(SymphoniaError::IoError(ref e))
                    if e.kind() == std::io::ErrorKind::UnexpectedEof =>
                {
                    break;
                }
                Err(e) => {
                    debug!(error = %e, "stopping at unreadable packet");
                    break;
                }
            };

            if packet.track_id() != track_id {
                continue;
            }

            let decoded = match decoder.decode(&packet) {
                Ok(d) => d,
                Err(SymphoniaError::DecodeError(_)) => {
                    skipped += 1;
                    continue;
                }
                Err(e) => return Err(LoadError::Decode(e.to_string())),
            };

            let spec = *decoded.spec();
            let mut sample_buf = SampleBuffer::<f32>::new(decoded.capacity() as u64, spec);
            sample_buf.copy_interleaved_ref(decoded);
            mix_to_mono(sample_buf.samples(), spec.channels.count().max(1), &mut samples);
        }

        if skipped > 0 {
            debug!(skipped, "skipped corrupt packets");
        }
        if samples.is_empty() {
            return Err(LoadError::Empty);
        }

        metadata.duration_secs = samples.len() as f64 / sample_rate as f64;

        Ok(LoadedTrack {
            samples,
            sample_rate,
            channels,
            metadata,
        })
    }

    /// Extract metadata from format reader
    fn extract_metadata(format: &mut Box<dyn FormatReader>, title: String) -> TrackMetadata {
        let mut metadata = TrackMetadata {
            title,
            artist: "Unknown".to_string(),
            album: "Unknown".to_string(),
            ..Default::default()
        };

        if let Some(meta) = format.metadata().current() {
            for tag in meta.tags() {
                match tag.std_key {
                    Some(StandardTagKey::TrackTitle) => metadata.title = tag.value.to_string(),
                    Some(StandardTagKey::Artist) => metadata.artist = tag.value.to_string(),
                    Some(StandardTagKey::Album) => metadata.album = tag.value.to_string(),
                    _ => {}
                }
            }
        }

        metadata
    }
}

/// Average interleaved frames of `channels` samples into `out`
pub fn mix_to_mono(interleaved: &[f32], channels: usize, out: &mut Vec<f32>) {
    if channels <= 1 {
        out.extend_from_slice(interleaved);
        return;
    }
    let scale = 1.0 / channels as f32;
    out.extend(
        interleaved
            .chunks_exact(channels)
            .map(|frame| frame.iter().sum::<f32>() * scale),
    );
}
