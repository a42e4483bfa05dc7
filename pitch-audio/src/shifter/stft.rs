//! Real-input spectral transform and analysis/synthesis windows.
//!
//! Features:
//! - Pre-planned forward and inverse FFTs (rustfft)
//! - Hermitian reconstruction for the inverse of a half spectrum
//! - Zero-allocation processing (work and scratch buffers pre-allocated)
//! - Periodic Hann windows normalised for unity-gain overlap-add

use rustfft::{Fft, FftPlanner};
use std::f32::consts::PI;
use std::sync::Arc;

pub use rustfft::num_complex::Complex;

/// Zero-valued complex number, used for buffer initialization.
pub const COMPLEX_ZERO: Complex<f32> = Complex::new(0.0, 0.0);

/// Forward/inverse real transform pair for one grain size
pub struct Stft {
    /// Transform size
    size: usize,
    /// Hop the windows are normalised for
    hop_size: usize,
    forward: Arc<dyn Fft<f32>>,
    inverse: Arc<dyn Fft<f32>>,
    /// Periodic Hann window applied before the forward transform
    analysis_window: Vec<f32>,
    /// Hann window scaled so that analysis * synthesis overlap-adds to 1
    synthesis_window: Vec<f32>,
    /// Working buffer for FFT (avoid allocation)
    work: Vec<Complex<f32>>,
    scratch: Vec<Complex<f32>>,
    /// Normalization factor for IFFT
    norm_factor: f32,
}

impl Stft {
    /// Create a transform of `size` samples whose windows overlap-add at `hop_size`
    pub fn new(size: usize, hop_size: usize) -> Self {
        debug_assert!(size % 2 == 0, "transform size must be even");
        debug_assert!(hop_size > 0 && hop_size <= size);

        let mut planner = FftPlanner::new();
        let forward = planner.plan_fft_forward(size);
        let inverse = planner.plan_fft_inverse(size);
        let scratch_len = forward
            .get_inplace_scratch_len()
            .max(inverse.get_inplace_scratch_len());

        let analysis_window = hann(size);

        // Sum of squared windows is constant for hops of size/4, size/2 ...
        let gain = cola_sum(&analysis_window, &analysis_window, hop_size)[0];
        let synthesis_window = analysis_window.iter().map(|w| w / gain).collect();

        Self {
            size,
            hop_size,
            forward,
            inverse,
            analysis_window,
            synthesis_window,
            work: vec![COMPLEX_ZERO; size],
            scratch: vec![COMPLEX_ZERO; scratch_len],
            norm_factor: 1.0 / size as f32,
        }
    }

    /// Get transform size
    #[inline]
    pub fn size(&self) -> usize {
        self.size
    }

    /// Get hop size
    #[inline]
    pub fn hop_size(&self) -> usize {
        self.hop_size
    }

    /// Get number of positive frequency bins (size/2 + 1)
    #[inline]
    pub fn num_bins(&self) -> usize {
        self.size / 2 + 1
    }

    #[inline]
    pub fn analysis_window(&self) -> &[f32] {
        &self.analysis_window
    }

    #[inline]
    pub fn synthesis_window(&self) -> &[f32] {
        &self.synthesis_window
    }

    /// Forward transform of `input` (already windowed) into `size/2 + 1` bins
    pub fn forward(&mut self, input: &[f32], output: &mut [Complex<f32>]) {
        debug_assert_eq!(input.len(), self.size);
        debug_assert!(output.len() >= self.num_bins());

        for (slot, &x) in self.work.iter_mut().zip(input.iter()) {
            *slot = Complex::new(x, 0.0);
        }

        self.forward
            .process_with_scratch(&mut self.work, &mut self.scratch);

        let bins = self.num_bins();
        output[..bins].copy_from_slice(&self.work[..bins]);
    }

    /// Inverse transform of a half spectrum into `size` real samples
    pub fn inverse(&mut self, input: &[Complex<f32>], output: &mut [f32]) {
        debug_assert!(input.len() >= self.num_bins());
        debug_assert_eq!(output.len(), self.size);

        // Reconstruct full spectrum from positive frequencies (Hermitian symmetry)
        let bins = self.num_bins();
        self.work[..bins].copy_from_slice(&input[..bins]);
        for i in 1..self.size / 2 {
            self.work[self.size - i] = input[i].conj();
        }

        self.inverse
            .process_with_scratch(&mut self.work, &mut self.scratch);

        for (out, bin) in output.iter_mut().zip(self.work.iter()) {
            *out = bin.re * self.norm_factor;
        }
    }
}

/// Periodic Hann window (raised cosine, exact COLA at size/4 hops)
fn hann(size: usize) -> Vec<f32> {
    (0..size)
        .map(|i| {
            let x = 2.0 * PI * i as f32 / size as f32;
            0.5 * (1.0 - x.cos())
        })
        .collect()
}

/// Overlap-add sum of `analysis[n] * synthesis[n]` over all hops.
///
/// Entry `i` is the total window weight received by an output sample at
/// offset `i` within a hop; a COLA pair yields the same value everywhere.
pub fn cola_sum(analysis: &[f32], synthesis: &[f32], hop_size: usize) -> Vec<f32> {
    let mut sums = vec![0.0f32; hop_size];
    for (i, sum) in sums.iter_mut().enumerate() {
        let mut n = i;
        while n < analysis.len() {
            *sum += analysis[n] * synthesis[n];
            n += hop_size;
        }
    }
    sums
}
