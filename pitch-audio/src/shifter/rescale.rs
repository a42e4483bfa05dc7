//! Frequency-domain pitch shift by remapping spectral bins

use super::stft::{Complex, COMPLEX_ZERO};

/// Lookup table from source bin to rescaled destination bin.
///
/// Valid for source bins `[0, max_bin)`; everything from `max_bin` upward
/// would land past the last bin and is dropped.
#[derive(Debug, Clone)]
pub struct RescaleTable {
    map: Vec<usize>,
    max_bin: usize,
    ratio: f32,
}

impl RescaleTable {
    /// Build the table for `n_bins` bins and pitch `ratio`
    pub fn build(n_bins: usize, ratio: f32) -> Self {
        let mut table = Self {
            map: vec![0; n_bins],
            max_bin: n_bins,
            ratio,
        };
        table.rebuild(ratio);
        table
    }

    /// Recompute the mapping in place for a new ratio (no allocation)
    pub fn rebuild(&mut self, ratio: f32) {
        let n_bins = self.map.len();
        self.ratio = ratio;
        self.max_bin = n_bins;
        self.map.fill(0);

        for k in 0..n_bins {
            let ix = (k as f32 * ratio).round() as usize;
            if ix >= n_bins {
                self.max_bin = k;
                break;
            }
            self.map[k] = ix;
        }
    }

    /// First source bin that is dropped (`n_bins` when none is)
    #[inline]
    pub fn max_bin(&self) -> usize {
        self.max_bin
    }

    #[inline]
    pub fn ratio(&self) -> f32 {
        self.ratio
    }

    #[inline]
    pub fn n_bins(&self) -> usize {
        self.map.len()
    }

    /// Destination of source bin `k`, `None` when `k` is dropped
    #[inline]
    pub fn destination(&self, k: usize) -> Option<usize> {
        (k < self.max_bin).then(|| self.map[k])
    }

    /// Mapping for the valid source range
    #[inline]
    pub fn mapping(&self) -> &[usize] {
        &self.map[..self.max_bin]
    }

    /// Move the energy of `spectrum` to the rescaled bins of `output`.
    ///
    /// Source bins that collide on one destination are summed.
    pub fn apply(&self, spectrum: &[Complex<f32>], output: &mut [Complex<f32>]) {
        debug_assert!(spectrum.len() >= self.max_bin);
        debug_assert_eq!(output.len(), self.map.len());

        output.fill(COMPLEX_ZERO);
        for (&dest, &bin) in self.map[..self.max_bin].iter().zip(spectrum.iter()) {
            output[dest] += bin;
        }
    }
}
