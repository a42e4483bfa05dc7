//! FFT-based amplitude spectrum of output blocks

use rustfft::{num_complex::Complex, Fft, FftPlanner};
use std::f32::consts::PI;
use std::sync::Arc;

/// Amplitude spectrum analyzer for fixed-size blocks.
///
/// Produces `|FFT(block)|` for the positive-frequency half, `size / 2 + 1`
/// values. No window is applied: the result is the plain magnitude of the
/// forward transform of the block.
pub struct SpectrumAnalyzer {
    size: usize,
    fft: Arc<dyn Fft<f32>>,
    /// Pre-allocated FFT buffer
    buffer: Vec<Complex<f32>>,
    scratch: Vec<Complex<f32>>,
}

impl SpectrumAnalyzer {
    /// Create an analyzer for blocks of `size` samples
    pub fn new(size: usize) -> Self {
        let mut planner = FftPlanner::new();
        let fft = planner.plan_fft_forward(size);
        let scratch_len = fft.get_inplace_scratch_len();

        Self {
            size,
            fft,
            buffer: vec![Complex::new(0.0, 0.0); size],
            scratch: vec![Complex::new(0.0, 0.0); scratch_len],
        }
    }

    /// Block size this analyzer was planned for
    pub fn size(&self) -> usize {
        self.size
    }

    /// Number of magnitude values produced per block
    pub fn num_bins(&self) -> usize {
        self.size / 2 + 1
    }

    /// Write `|FFT(samples)|` into `magnitudes`.
    ///
    /// Short input is zero padded, long input truncated to the planned size.
    pub fn magnitudes_into(&mut self, samples: &[f32], magnitudes: &mut [f32]) {
        let count = samples.len().min(self.size);
        for (slot, &s) in self.buffer.iter_mut().zip(samples.iter().take(count)) {
            *slot = Complex::new(s, 0.0);
        }
        for slot in self.buffer.iter_mut().skip(count) {
            *slot = Complex::new(0.0, 0.0);
        }

        self.fft
            .process_with_scratch(&mut self.buffer, &mut self.scratch);

        for (mag, bin) in magnitudes.iter_mut().zip(self.buffer.iter()) {
            *mag = bin.norm();
        }
    }

    /// Allocating convenience wrapper around [`Self::magnitudes_into`]
    pub fn magnitudes(&mut self, samples: &[f32]) -> Vec<f32> {
        let mut out = vec![0.0; self.num_bins()];
        self.magnitudes_into(samples, &mut out);
        out
    }
}

/// Periodic Hann window of length `size`
pub fn hann_window(size: usize) -> Vec<f32> {
    (0..size)
        .map(|i| 0.5 * (1.0 - (2.0 * PI * i as f32 / size as f32).cos()))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_magnitudes_of_bin_centred_sine() {
        let size = 1024;
        let bin = 32;
        let samples: Vec<f32> = (0..size)
            .map(|i| (2.0 * PI * bin as f32 * i as f32 / size as f32).sin())
            .collect();

        let mut analyzer = SpectrumAnalyzer::new(size);
        let mags = analyzer.magnitudes(&samples);

        assert_eq!(mags.len(), size / 2 + 1);
        assert!((mags[bin] - size as f32 / 2.0).abs() < 0.5, "got {}", mags[bin]);
        assert!(mags[bin + 3] < 0.01);
    }

    #[test]
    fn test_silence_has_empty_spectrum() {
        let mut analyzer = SpectrumAnalyzer::new(1024);
        let mags = analyzer.magnitudes(&vec![0.0; 1024]);
        assert!(mags.iter().all(|&m| m == 0.0));
    }

    #[test]
    fn test_short_block_is_zero_padded() {
        let mut analyzer = SpectrumAnalyzer::new(256);
        let mags = analyzer.magnitudes(&[1.0; 8]);
        // DC of eight ones
        assert!((mags[0] - 8.0).abs() < 1e-4);
    }
}
