//! Block sources feeding the session

use std::sync::Arc;

/// Pull-based mono sample stream.
///
/// `read_block` fills the front of `out` and returns how many samples were
/// written; a count below `out.len()` means the stream has ended.
pub trait BlockSource: Send {
    /// Sample rate in Hz
    fn sample_rate(&self) -> u32;

    /// Total length in samples
    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Read cursor in samples
    fn position(&self) -> usize;

    /// Move the read cursor (clamped to the stream length)
    fn seek(&mut self, sample: usize);

    /// Read the next samples into `out`
    fn read_block(&mut self, out: &mut [f32]) -> usize;

    /// Display name, if known
    fn name(&self) -> Option<&str> {
        None
    }

    /// Length in seconds
    fn duration(&self) -> f64 {
        if self.sample_rate() == 0 {
            return 0.0;
        }
        self.len() as f64 / self.sample_rate() as f64
    }
}

/// In-memory track. Samples are shared, so cloning is cheap.
#[derive(Debug, Clone)]
pub struct MemorySource {
    samples: Arc<[f32]>,
    sample_rate: u32,
    cursor: usize,
    name: Option<String>,
}

impl MemorySource {
    pub fn new(samples: impl Into<Arc<[f32]>>, sample_rate: u32) -> Self {
        Self {
            samples: samples.into(),
            sample_rate,
            cursor: 0,
            name: None,
        }
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    /// Shared sample buffer
    pub fn samples(&self) -> &Arc<[f32]> {
        &self.samples
    }
}

impl BlockSource for MemorySource {
    fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    fn len(&self) -> usize {
        self.samples.len()
    }

    fn position(&self) -> usize {
        self.cursor
    }

    fn seek(&mut self, sample: usize) {
        self.cursor = sample.min(self.samples.len());
    }

    fn read_block(&mut self, out: &mut [f32]) -> usize {
        let remaining = &self.samples[self.cursor..];
        let count = remaining.len().min(out.len());
        out[..count].copy_from_slice(&remaining[..count]);
        self.cursor += count;
        count
    }

    fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_read_until_end() {
        let mut source = MemorySource::new(vec![1.0, 2.0, 3.0, 4.0, 5.0], 10);
        let mut out = [0.0; 2];

        assert_eq!(source.read_block(&mut out), 2);
        assert_eq!(out, [1.0, 2.0]);
        assert_eq!(source.read_block(&mut out), 2);
        assert_eq!(source.read_block(&mut out), 1);
        assert_eq!(out[0], 5.0);
        assert_eq!(source.read_block(&mut out), 0);
        assert_eq!(source.position(), 5);
    }

    #[test]
    fn test_seek_is_clamped() {
        let mut source = MemorySource::new(vec![0.0; 8], 4);
        source.seek(3);
        assert_eq!(source.position(), 3);
        source.seek(100);
        assert_eq!(source.position(), 8);
    }

    #[test]
    fn test_duration_and_name() {
        let source = MemorySource::new(vec![0.0; 22050], 44100).with_name("tone");
        assert!((source.duration() - 0.5).abs() < 1e-9);
        assert_eq!(source.name(), Some("tone"));
        assert!(!source.is_empty());
        assert_eq!(MemorySource::new(Vec::new(), 0).duration(), 0.0);
    }
}
