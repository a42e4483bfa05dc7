//! Phase vocoder for pitch shifting.
//!
//! Reconstructs output phases for a rescaled spectrum so that partials stay
//! coherent from frame to frame:
//! - Gradient-heap propagation: strongest components are anchored first and
//!   their phase is carried across time and frequency in magnitude order
//! - Onset seeding: components with no coherent history restart from their
//!   analysis phase (first frame, attacks)
//! - Peak-locked mode: every bin follows the rotation of its nearest peak

use super::stft::Complex;
use std::cmp::Ordering;
use std::collections::BinaryHeap;
use std::f32::consts::PI;

const TWO_PI: f32 = 2.0 * PI;

/// Phase reconstruction strategy
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PhaseLockMode {
    /// Magnitude-ordered flood fill across time and frequency (best quality)
    #[default]
    GradientHeap,
    /// Region-of-influence locking to spectral peaks (cheaper)
    PeakLocked,
}

/// Phase vocoder tuning
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PhaseLockParams {
    /// Phase reconstruction strategy
    pub mode: PhaseLockMode,
    /// Bins at or below this magnitude are not propagated
    pub magnitude_threshold: f32,
    /// Restart components without history from their analysis phase
    pub onset_seeding: bool,
}

impl Default for PhaseLockParams {
    fn default() -> Self {
        Self {
            mode: PhaseLockMode::GradientHeap,
            magnitude_threshold: 1e-4,
            onset_seeding: true,
        }
    }
}

/// Which frame a heap anchor belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
enum Frame {
    Previous,
    Current,
}

/// Pending propagation source, ordered by magnitude
#[derive(Debug, Clone, Copy)]
struct Anchor {
    magnitude: f32,
    bin: usize,
    frame: Frame,
}

impl Ord for Anchor {
    fn cmp(&self, other: &Self) -> Ordering {
        self.magnitude
            .total_cmp(&other.magnitude)
            .then_with(|| other.bin.cmp(&self.bin))
            .then_with(|| self.frame.cmp(&other.frame))
    }
}

impl PartialOrd for Anchor {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl PartialEq for Anchor {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for Anchor {}

/// Phase vocoder state for one mono stream
pub struct PhaseVocoder {
    /// Transform size
    window_size: usize,
    /// Number of frequency bins
    num_bins: usize,
    /// Output hop (fixed)
    synthesis_hop: usize,
    /// Input hop implied by the pitch ratio
    analysis_hop: usize,
    /// synthesis_hop / analysis_hop
    alpha: f32,
    /// Expected phase advance per bin over one analysis hop (mod 2π)
    expected_phase: Vec<f32>,
    /// Phase advance per bin over one synthesis hop (mod 2π)
    synthesis_advance: Vec<f32>,
    /// Phases observed in the previous frame
    last_phase: Vec<f32>,
    /// Output phases (wrapped)
    accum_phase: Vec<f32>,
    /// Output phases of the previous frame
    last_accum_phase: Vec<f32>,
    /// Magnitudes of the previous frame
    last_magnitude: Vec<f32>,
    /// Scratch: phases of the current frame
    current_phase: Vec<f32>,
    /// Scratch: magnitudes of the current frame
    current_magn: Vec<f32>,
    /// Phase advance per bin over one synthesis hop (time direction)
    phase_derivative: Vec<f32>,
    /// Phase step from bin k-1 to bin k (frequency direction)
    frequency_derivative: Vec<f32>,
    /// Bins still waiting for a phase this frame
    candidate: Vec<bool>,
    heap: BinaryHeap<Anchor>,
    /// Candidate bins sorted by decreasing magnitude, for onset seeding
    order: Vec<usize>,
    /// Peak bins for peak-locked mode
    peaks: Vec<usize>,
    params: PhaseLockParams,
}

impl PhaseVocoder {
    /// Create a vocoder for `window_size`-point frames emitted every
    /// `synthesis_hop` samples, shifting by `ratio`
    pub fn new(window_size: usize, synthesis_hop: usize, ratio: f32, params: PhaseLockParams) -> Self {
        let num_bins = window_size / 2 + 1;
        let mut vocoder = Self {
            window_size,
            num_bins,
            synthesis_hop,
            analysis_hop: synthesis_hop,
            alpha: 1.0,
            expected_phase: vec![0.0; num_bins],
            synthesis_advance: vec![0.0; num_bins],
            last_phase: vec![0.0; num_bins],
            accum_phase: vec![0.0; num_bins],
            last_accum_phase: vec![0.0; num_bins],
            last_magnitude: vec![0.0; num_bins],
            current_phase: vec![0.0; num_bins],
            current_magn: vec![0.0; num_bins],
            phase_derivative: vec![0.0; num_bins],
            frequency_derivative: vec![0.0; num_bins],
            candidate: vec![false; num_bins],
            heap: BinaryHeap::with_capacity(2 * num_bins),
            order: Vec::with_capacity(num_bins),
            peaks: Vec::with_capacity(num_bins / 2),
            params,
        };
        for (k, advance) in vocoder.synthesis_advance.iter_mut().enumerate() {
            *advance = bin_advance(k, synthesis_hop, window_size);
        }
        vocoder.update_pitch(ratio);
        vocoder
    }

    /// Recompute hop sizes for a new pitch ratio. Phase state is kept.
    pub fn update_pitch(&mut self, ratio: f32) {
        let hop = (self.synthesis_hop as f32 / ratio).floor();
        self.analysis_hop = if hop.is_finite() && hop >= 1.0 {
            hop as usize
        } else {
            1
        };
        self.alpha = self.synthesis_hop as f32 / self.analysis_hop as f32;

        for (k, expected) in self.expected_phase.iter_mut().enumerate() {
            *expected = bin_advance(k, self.analysis_hop, self.window_size);
        }
    }

    #[inline]
    pub fn analysis_hop(&self) -> usize {
        self.analysis_hop
    }

    #[inline]
    pub fn synthesis_hop(&self) -> usize {
        self.synthesis_hop
    }

    #[inline]
    pub fn alpha(&self) -> f32 {
        self.alpha
    }

    #[inline]
    pub fn num_bins(&self) -> usize {
        self.num_bins
    }

    #[inline]
    pub fn params(&self) -> PhaseLockParams {
        self.params
    }

    #[inline]
    pub fn set_params(&mut self, params: PhaseLockParams) {
        self.params = params;
    }

    /// Output phases of the last processed frame
    #[inline]
    pub fn accum_phase(&self) -> &[f32] {
        &self.accum_phase
    }

    /// Analysis phases of the last processed frame
    #[inline]
    pub fn last_phase(&self) -> &[f32] {
        &self.last_phase
    }

    /// Replace the phases of `spectrum` in place, keeping its magnitudes
    pub fn process(&mut self, spectrum: &mut [Complex<f32>]) {
        debug_assert_eq!(spectrum.len(), self.num_bins);

        for (k, bin) in spectrum.iter().enumerate() {
            self.current_phase[k] = bin.arg();
            self.current_magn[k] = bin.norm();
        }

        self.compute_derivatives();

        match self.params.mode {
            PhaseLockMode::GradientHeap => self.propagate_gradient_heap(),
            PhaseLockMode::PeakLocked => self.propagate_peak_locked(),
        }

        self.last_phase.copy_from_slice(&self.current_phase);
        self.last_accum_phase.copy_from_slice(&self.accum_phase);
        self.last_magnitude.copy_from_slice(&self.current_magn);

        for (k, bin) in spectrum.iter_mut().enumerate() {
            *bin = Complex::from_polar(self.current_magn[k], self.accum_phase[k]);
        }
    }

    /// Time derivative scaled by alpha: (expected + delta) * alpha, where
    /// expected * alpha is exactly the synthesis advance
    fn compute_derivatives(&mut self) {
        for k in 0..self.num_bins {
            let delta = wrap_phase(
                self.current_phase[k] - self.last_phase[k] - self.expected_phase[k],
            );
            self.phase_derivative[k] = self.synthesis_advance[k] + delta * self.alpha;
        }

        self.frequency_derivative[0] = 0.0;
        for k in 1..self.num_bins {
            self.frequency_derivative[k] =
                wrap_phase(self.current_phase[k] - self.current_phase[k - 1]);
        }
    }

    /// Magnitude-ordered flood fill over (bin, frame) anchors
    fn propagate_gradient_heap(&mut self) {
        let n = self.num_bins;
        let alpha = self.alpha;
        let threshold = self.params.magnitude_threshold;

        let mut remaining = 0usize;
        for (flag, &magn) in self.candidate.iter_mut().zip(self.current_magn.iter()) {
            *flag = magn > threshold;
            remaining += usize::from(*flag);
        }
        if remaining == 0 {
            return;
        }

        self.heap.clear();
        for (k, &magn) in self.last_magnitude.iter().enumerate() {
            if magn > threshold {
                self.heap.push(Anchor {
                    magnitude: magn,
                    bin: k,
                    frame: Frame::Previous,
                });
            }
        }

        if self.params.onset_seeding {
            self.order.clear();
            self.order.extend((0..n).filter(|&k| self.candidate[k]));
            let magn = &self.current_magn;
            self.order
                .sort_unstable_by(|&a, &b| magn[b].total_cmp(&magn[a]).then(a.cmp(&b)));
        }
        let mut cursor = 0;

        while remaining > 0 {
            let anchor = match self.heap.pop() {
                Some(anchor) => anchor,
                None if self.params.onset_seeding => {
                    while cursor < self.order.len() && !self.candidate[self.order[cursor]] {
                        cursor += 1;
                    }
                    let Some(&k) = self.order.get(cursor) else {
                        break;
                    };
                    // No coherent history: restart from the analysis phase
                    self.accum_phase[k] = self.current_phase[k];
                    self.candidate[k] = false;
                    remaining -= 1;
                    Anchor {
                        magnitude: self.current_magn[k],
                        bin: k,
                        frame: Frame::Current,
                    }
                }
                None => break,
            };

            let k = anchor.bin;
            match anchor.frame {
                Frame::Previous => {
                    if self.candidate[k] {
                        self.accum_phase[k] =
                            wrap_phase(self.last_accum_phase[k] + self.phase_derivative[k]);
                        self.candidate[k] = false;
                        remaining -= 1;
                        self.heap.push(Anchor {
                            magnitude: self.current_magn[k],
                            bin: k,
                            frame: Frame::Current,
                        });
                    }
                }
                Frame::Current => {
                    if k + 1 < n && self.candidate[k + 1] {
                        self.accum_phase[k + 1] = wrap_phase(
                            self.accum_phase[k] + self.frequency_derivative[k + 1] * alpha,
                        );
                        self.candidate[k + 1] = false;
                        remaining -= 1;
                        self.heap.push(Anchor {
                            magnitude: self.current_magn[k + 1],
                            bin: k + 1,
                            frame: Frame::Current,
                        });
                    }
                    if k > 0 && self.candidate[k - 1] {
                        // The edge between k - 1 and k carries frequency_derivative[k];
                        // walking it downward subtracts it.
                        self.accum_phase[k - 1] = wrap_phase(
                            self.accum_phase[k] - self.frequency_derivative[k] * alpha,
                        );
                        self.candidate[k - 1] = false;
                        remaining -= 1;
                        self.heap.push(Anchor {
                            magnitude: self.current_magn[k - 1],
                            bin: k - 1,
                            frame: Frame::Current,
                        });
                    }
                }
            }
        }
    }

    /// Advance peaks in time, rotate every other bin with its nearest peak
    fn propagate_peak_locked(&mut self) {
        let n = self.num_bins;
        let threshold = self.params.magnitude_threshold;

        self.peaks.clear();
        for k in 0..n {
            let magn = self.current_magn[k];
            if magn <= threshold {
                continue;
            }
            let left = if k > 0 { self.current_magn[k - 1] } else { 0.0 };
            let right = if k + 1 < n { self.current_magn[k + 1] } else { 0.0 };
            if magn > left && magn >= right {
                self.peaks.push(k);
            }
        }

        let mut start = 0;
        for (i, &peak) in self.peaks.iter().enumerate() {
            let end = match self.peaks.get(i + 1) {
                Some(&next) => (peak + next) / 2,
                None => n,
            };

            let peak_phase = wrap_phase(self.last_accum_phase[peak] + self.phase_derivative[peak]);
            let rotation = peak_phase - self.current_phase[peak];

            for k in start..end {
                self.accum_phase[k] = if k == peak {
                    peak_phase
                } else {
                    wrap_phase(self.current_phase[k] + rotation)
                };
            }
            start = end;
        }
    }

    /// Zero all phase history
    pub fn reset(&mut self) {
        self.last_phase.fill(0.0);
        self.accum_phase.fill(0.0);
        self.last_accum_phase.fill(0.0);
        self.last_magnitude.fill(0.0);
        self.candidate.fill(false);
        self.heap.clear();
        self.order.clear();
        self.peaks.clear();
    }
}

/// Phase advance of bin `k` over `hop` samples, reduced mod 2π exactly
#[inline]
fn bin_advance(k: usize, hop: usize, window_size: usize) -> f32 {
    wrap_phase(TWO_PI * ((k * hop) % window_size) as f32 / window_size as f32)
}

/// Wrap phase to (-π, π]
#[inline(always)]
pub fn wrap_phase(phase: f32) -> f32 {
    let wrapped = (phase + PI).rem_euclid(TWO_PI) - PI;
    if wrapped <= -PI {
        wrapped + TWO_PI
    } else {
        wrapped
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const WINDOW: usize = 4096;
    const HOP: usize = 1024;

    fn same_angle(a: f32, b: f32) -> bool {
        (Complex::from_polar(1.0, a) - Complex::from_polar(1.0, b)).norm() < 1e-3
    }

    fn single_bin_frame(num_bins: usize, bin: usize, phase: f32) -> Vec<Complex<f32>> {
        let mut frame = vec![Complex::new(0.0, 0.0); num_bins];
        frame[bin] = Complex::from_polar(1.0, phase);
        frame
    }

    #[test]
    fn test_phase_wrap() {
        assert!(wrap_phase(0.0).abs() < 0.001);
        assert!((wrap_phase(PI + 0.1) - (-PI + 0.1)).abs() < 0.001);
        assert!((wrap_phase(-PI - 0.1) - (PI - 0.1)).abs() < 0.001);
        assert!((wrap_phase(7.0 * TWO_PI + 0.5) - 0.5).abs() < 0.001);
        assert!((wrap_phase(-PI) - PI).abs() < 1e-6);
    }

    #[test]
    fn test_hop_sizes_follow_ratio() {
        let mut pv = PhaseVocoder::new(WINDOW, HOP, 1.0, PhaseLockParams::default());
        assert_eq!(pv.analysis_hop(), 1024);
        assert_eq!(pv.alpha(), 1.0);

        pv.update_pitch(1.5);
        assert_eq!(pv.analysis_hop(), 682);
        assert!((pv.alpha() - 1024.0 / 682.0).abs() < 1e-6);

        pv.update_pitch(0.5);
        assert_eq!(pv.analysis_hop(), 2048);
        assert_eq!(pv.alpha(), 0.5);

        // Absurd ratios never produce a zero hop
        pv.update_pitch(5000.0);
        assert_eq!(pv.analysis_hop(), 1);
    }

    #[test]
    fn test_stationary_tone_advances_at_synthesis_rate() {
        let bin = 7;
        for ratio in [1.0f32, 1.5, 0.75, 2.0f32.powf(7.0 / 12.0)] {
            let mut pv = PhaseVocoder::new(WINDOW, HOP, ratio, PhaseLockParams::default());
            let analysis_step = TWO_PI * bin as f32 * pv.analysis_hop() as f32 / WINDOW as f32;
            let synthesis_step = TWO_PI * bin as f32 * HOP as f32 / WINDOW as f32;

            let mut previous = None;
            for frame_idx in 0..8 {
                let mut frame =
                    single_bin_frame(pv.num_bins(), bin, wrap_phase(0.3 + analysis_step * frame_idx as f32));
                pv.process(&mut frame);
                let out = frame[bin].arg();
                if let Some(prev) = previous {
                    assert!(
                        same_angle(out - prev, synthesis_step),
                        "ratio {}: advance {} expected {}",
                        ratio,
                        wrap_phase(out - prev),
                        wrap_phase(synthesis_step)
                    );
                }
                previous = Some(out);
            }
        }
    }

    #[test]
    fn test_identity_ratio_reproduces_phases() {
        let mut pv = PhaseVocoder::new(WINDOW, HOP, 1.0, PhaseLockParams::default());
        let num_bins = pv.num_bins();

        let mut state = 0x0bad_cafeu32;
        let mut next = || {
            state = state.wrapping_mul(1_664_525).wrapping_add(1_013_904_223);
            (state >> 8) as f32 / (1u32 << 24) as f32
        };

        for _ in 0..4 {
            let input: Vec<Complex<f32>> = (0..num_bins)
                .map(|_| Complex::from_polar(0.1 + next(), (next() * 2.0 - 1.0) * PI))
                .collect();
            let mut frame = input.clone();
            pv.process(&mut frame);
            for (k, (a, b)) in input.iter().zip(frame.iter()).enumerate() {
                assert!((a - b).norm() < 1e-3, "bin {}: {} vs {}", k, a, b);
            }
        }
    }

    #[test]
    fn test_unreached_bins_keep_previous_phase() {
        let params = PhaseLockParams {
            onset_seeding: false,
            ..PhaseLockParams::default()
        };
        let mut pv = PhaseVocoder::new(WINDOW, HOP, 1.0, params);
        let num_bins = pv.num_bins();

        // No history: nothing is anchored, phases stay at zero
        let mut frame = single_bin_frame(num_bins, 5, 1.0);
        pv.process(&mut frame);
        assert!(same_angle(frame[5].arg(), 0.0));
        assert!((frame[5].norm() - 1.0).abs() < 1e-6);

        // Bin 5 now has history and is anchored in time
        let step = TWO_PI * 5.0 * HOP as f32 / WINDOW as f32;
        let mut frame = single_bin_frame(num_bins, 5, wrap_phase(1.0 + step));
        pv.process(&mut frame);
        let anchored = pv.accum_phase()[5];
        assert!(same_angle(anchored, step));

        // Bin 5 drops out: its accumulated phase is carried forward
        let mut frame = single_bin_frame(num_bins, 9, 0.4);
        pv.process(&mut frame);
        assert_eq!(pv.accum_phase()[5], anchored);
        assert!(frame[5].norm() < 1e-6);
    }

    #[test]
    fn test_onset_seeding_uses_analysis_phase() {
        let mut pv = PhaseVocoder::new(WINDOW, HOP, 1.5, PhaseLockParams::default());
        let mut frame = single_bin_frame(pv.num_bins(), 40, 0.8);
        pv.process(&mut frame);
        assert!(same_angle(frame[40].arg(), 0.8));
    }

    #[test]
    fn test_frequency_propagation_from_strongest_bin() {
        let mut pv = PhaseVocoder::new(WINDOW, HOP, 1.0, PhaseLockParams::default());
        let mut frame = vec![Complex::new(0.0, 0.0); pv.num_bins()];
        frame[10] = Complex::from_polar(0.5, 2.0);
        frame[11] = Complex::from_polar(1.0, -1.0);
        frame[12] = Complex::from_polar(0.5, 0.5);
        pv.process(&mut frame);

        assert!(same_angle(frame[10].arg(), 2.0));
        assert!(same_angle(frame[11].arg(), -1.0));
        assert!(same_angle(frame[12].arg(), 0.5));
    }

    #[test]
    fn test_ratio_update_keeps_phase_state() {
        let mut pv = PhaseVocoder::new(WINDOW, HOP, 1.0, PhaseLockParams::default());
        let mut frame = single_bin_frame(pv.num_bins(), 20, 1.25);
        pv.process(&mut frame);
        let accum = pv.accum_phase().to_vec();
        let last = pv.last_phase().to_vec();

        pv.update_pitch(1.5);
        assert_eq!(pv.accum_phase(), &accum[..]);
        assert_eq!(pv.last_phase(), &last[..]);

        pv.reset();
        assert!(pv.accum_phase().iter().all(|&p| p == 0.0));
    }

    #[test]
    fn test_peak_locked_rotates_region_with_peak() {
        let params = PhaseLockParams {
            mode: PhaseLockMode::PeakLocked,
            ..PhaseLockParams::default()
        };
        let mut pv = PhaseVocoder::new(WINDOW, HOP, 1.0, params);
        let num_bins = pv.num_bins();

        let build = |peak_phase: f32| {
            let mut frame = vec![Complex::new(0.0, 0.0); num_bins];
            frame[29] = Complex::from_polar(0.4, peak_phase + 0.3);
            frame[30] = Complex::from_polar(1.0, peak_phase);
            frame[31] = Complex::from_polar(0.4, peak_phase - 0.3);
            frame
        };

        let mut frame = build(0.0);
        pv.process(&mut frame);

        let step = TWO_PI * 30.0 * HOP as f32 / WINDOW as f32;
        let mut frame = build(wrap_phase(step + 0.2));
        pv.process(&mut frame);

        let peak = frame[30].arg();
        assert!(same_angle(frame[29].arg() - peak, 0.3));
        assert!(same_angle(frame[31].arg() - peak, -0.3));
        assert!((frame[29].norm() - 0.4).abs() < 1e-5);
    }

    #[test]
    fn test_silence_stays_silent() {
        let mut pv = PhaseVocoder::new(WINDOW, HOP, 0.8, PhaseLockParams::default());
        for _ in 0..5 {
            let mut frame = vec![Complex::new(0.0, 0.0); pv.num_bins()];
            pv.process(&mut frame);
            assert!(frame.iter().all(|c| c.norm() == 0.0));
        }
    }
}
