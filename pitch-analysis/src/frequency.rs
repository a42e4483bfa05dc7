//! Dominant frequency estimation

use crate::spectrum::hann_window;
use rustfft::{num_complex::Complex, FftPlanner};
use tracing::debug;

/// Estimate the strongest spectral component of a signal in Hz.
///
/// Uses one Hann-windowed FFT over the whole signal and refines the peak bin
/// with parabolic interpolation on log magnitudes. Returns `None` for
/// signals shorter than 4 samples or without energy.
pub fn dominant_frequency(samples: &[f32], sample_rate: u32) -> Option<f32> {
    let n = samples.len();
    if n < 4 {
        return None;
    }

    let window = hann_window(n);
    let mut buffer: Vec<Complex<f32>> = samples
        .iter()
        .zip(window.iter())
        .map(|(&s, &w)| Complex::new(s * w, 0.0))
        .collect();

    let mut planner = FftPlanner::new();
    planner.plan_fft_forward(n).process(&mut buffer);

    let half = n / 2 + 1;
    let magnitudes: Vec<f32> = buffer[..half].iter().map(|c| c.norm()).collect();

    // Skip DC
    let (peak_bin, &peak_mag) = magnitudes
        .iter()
        .enumerate()
        .skip(1)
        .max_by(|a, b| a.1.total_cmp(b.1))?;

    if peak_mag <= f32::EPSILON {
        return None;
    }

    let offset = if peak_bin + 1 < half {
        let alpha = magnitudes[peak_bin - 1].max(1e-12).ln();
        let beta = peak_mag.ln();
        let gamma = magnitudes[peak_bin + 1].max(1e-12).ln();
        let denom = alpha - 2.0 * beta + gamma;
        if denom.abs() > f32::EPSILON {
            (0.5 * (alpha - gamma) / denom).clamp(-0.5, 0.5)
        } else {
            0.0
        }
    } else {
        0.0
    };

    let freq = (peak_bin as f32 + offset) * sample_rate as f32 / n as f32;
    debug!(peak_bin, freq, "dominant frequency");
    Some(freq)
}

/// Interval between two frequencies in cents (positive when `b` is higher)
pub fn cents_between(a: f32, b: f32) -> f32 {
    1200.0 * (b / a).log2()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::f32::consts::PI;

    fn sine(freq: f32, sample_rate: u32, len: usize) -> Vec<f32> {
        (0..len)
            .map(|i| (2.0 * PI * freq * i as f32 / sample_rate as f32).sin())
            .collect()
    }

    #[test]
    fn test_dominant_frequency_of_a440() {
        let freq = dominant_frequency(&sine(440.0, 44100, 44100), 44100).unwrap();
        assert!(cents_between(440.0, freq).abs() < 1.0, "got {freq}");
    }

    #[test]
    fn test_dominant_frequency_off_bin() {
        let freq = dominant_frequency(&sine(1234.5, 48000, 8192), 48000).unwrap();
        assert!(cents_between(1234.5, freq).abs() < 5.0, "got {freq}");
    }

    #[test]
    fn test_silence_has_no_dominant_frequency() {
        assert!(dominant_frequency(&vec![0.0; 4096], 44100).is_none());
        assert!(dominant_frequency(&[0.5, 0.5], 44100).is_none());
    }

    #[test]
    fn test_cents_between_octave() {
        assert!((cents_between(220.0, 440.0) - 1200.0).abs() < 1e-3);
        assert!((cents_between(440.0, 220.0) + 1200.0).abs() < 1e-3);
    }
}
