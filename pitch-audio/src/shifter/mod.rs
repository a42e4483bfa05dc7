//! Real-time spectral pitch shifter for streamed mono audio.
//!
//! Shifts pitch without changing duration: one `STRIDE`-sample block in,
//! one block out, with a fixed latency of `OVERLAP / STRIDE` blocks.
//!
//! # Features
//!
//! - **Sliding-window STFT**: 4096-point grains with 75% overlap
//! - **Bin rescaling**: Precomputed lookup moves energy to `round(k * ratio)`
//! - **Gradient-heap phase vocoder**: Keeps partials coherent across frames
//! - **Zero-allocation**: All buffers pre-allocated, rebuilt in place
//!
//! # Usage
//!
//! ```rust,ignore
//! use pitch_audio::shifter::{PitchShifter, PhaseLockParams, STRIDE};
//!
//! let mut shifter = PitchShifter::new(1.0, PhaseLockParams::default());
//! shifter.set_pitch_ratio(2.0f32.powf(7.0 / 12.0)); // up a fifth
//!
//! // In audio callback
//! let mut out = [0.0f32; STRIDE];
//! shifter.process_block(&block, &mut out);
//! ```
//!
//! # Pipeline
//!
//! 1. Grain assembly: retained input tail + newest block, analysis window
//! 2. Forward transform to `N_BINS` complex bins
//! 3. Rescale table: bin `k` moves to `round(k * ratio)`
//! 4. Phase vocoder: output phases rebuilt from time/frequency derivatives
//! 5. Inverse transform, synthesis window, overlap-add with the output tail

mod grain;
mod overlap;
mod phase;
mod rescale;
mod stft;

pub use grain::GrainAssembler;
pub use overlap::OverlapAdd;
pub use phase::{wrap_phase, PhaseLockMode, PhaseLockParams, PhaseVocoder};
pub use rescale::RescaleTable;
pub use stft::{cola_sum, Complex, Stft, COMPLEX_ZERO};

/// Samples per block (and synthesis hop)
pub const STRIDE: usize = 1024;
/// Samples per analysis grain
pub const GRAIN_LEN: usize = 4096;
/// Retained history between grains
pub const OVERLAP: usize = GRAIN_LEN - STRIDE;
/// Positive-frequency bins of one grain
pub const N_BINS: usize = GRAIN_LEN / 2 + 1;
/// Output block `t` carries input block `t - LATENCY_BLOCKS`
pub const LATENCY_BLOCKS: usize = OVERLAP / STRIDE;

/// The complete per-block pipeline
pub struct PitchShifter {
    stft: Stft,
    grains: GrainAssembler,
    table: RescaleTable,
    vocoder: PhaseVocoder,
    ola: OverlapAdd,
    /// Forward transform of the current grain
    spectrum: Vec<Complex<f32>>,
    /// Rescaled spectrum, phases rebuilt in place
    rescaled: Vec<Complex<f32>>,
    /// Inverse transform output
    grain: Vec<f32>,
    /// Current pitch ratio
    ratio: f32,
}

impl PitchShifter {
    /// Create a shifter at `ratio` (1.0 = unchanged pitch)
    pub fn new(ratio: f32, params: PhaseLockParams) -> Self {
        Self {
            stft: Stft::new(GRAIN_LEN, STRIDE),
            grains: GrainAssembler::new(STRIDE, OVERLAP),
            table: RescaleTable::build(N_BINS, ratio),
            vocoder: PhaseVocoder::new(GRAIN_LEN, STRIDE, ratio, params),
            ola: OverlapAdd::new(STRIDE, OVERLAP),
            spectrum: vec![COMPLEX_ZERO; N_BINS],
            rescaled: vec![COMPLEX_ZERO; N_BINS],
            grain: vec![0.0; GRAIN_LEN],
            ratio,
        }
    }

    /// Process one block. `input` and `output` must both be `STRIDE` long.
    pub fn process_block(&mut self, input: &[f32], output: &mut [f32]) {
        debug_assert_eq!(input.len(), STRIDE);
        debug_assert_eq!(output.len(), STRIDE);

        let grain = self.grains.assemble(input, self.stft.analysis_window());
        self.stft.forward(grain, &mut self.spectrum);

        self.table.apply(&self.spectrum, &mut self.rescaled);
        self.vocoder.process(&mut self.rescaled);

        self.stft.inverse(&self.rescaled, &mut self.grain);
        self.ola
            .synthesize(&mut self.grain, self.stft.synthesis_window(), output);
    }

    /// Change the pitch ratio. Takes effect from the next block; phase
    /// history is kept.
    pub fn set_pitch_ratio(&mut self, ratio: f32) {
        self.ratio = ratio;
        self.table.rebuild(ratio);
        self.vocoder.update_pitch(ratio);
    }

    #[inline]
    pub fn pitch_ratio(&self) -> f32 {
        self.ratio
    }

    #[inline]
    pub fn phase_lock_params(&self) -> PhaseLockParams {
        self.vocoder.params()
    }

    #[inline]
    pub fn set_phase_lock_params(&mut self, params: PhaseLockParams) {
        self.vocoder.set_params(params);
    }

    #[inline]
    pub fn rescale_table(&self) -> &RescaleTable {
        &self.table
    }

    #[inline]
    pub fn vocoder(&self) -> &PhaseVocoder {
        &self.vocoder
    }

    /// Drop all signal history (new track). The pitch ratio is kept.
    pub fn reset(&mut self) {
        self.grains.reset();
        self.ola.reset();
        self.vocoder.reset();
        self.vocoder.update_pitch(self.ratio);
        self.table.rebuild(self.ratio);
    }
}
