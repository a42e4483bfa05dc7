//! Grain assembly: rolling input tail plus newest block, windowed

/// Builds one overlapping analysis grain per input block
pub struct GrainAssembler {
    /// New samples per block
    stride: usize,
    /// Retained input overlap tail (oldest sample first)
    tail: Vec<f32>,
    /// Grain of the current tick
    grain: Vec<f32>,
}

impl GrainAssembler {
    pub fn new(stride: usize, overlap: usize) -> Self {
        debug_assert!(stride <= overlap, "stride must not exceed overlap");
        Self {
            stride,
            tail: vec![0.0; overlap],
            grain: vec![0.0; stride + overlap],
        }
    }

    /// Grain length (`stride + overlap`)
    #[inline]
    pub fn len(&self) -> usize {
        self.grain.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.grain.is_empty()
    }

    /// Form `tail ++ block`, taper it by `window` and roll the tail forward.
    ///
    /// `block` must hold exactly `stride` samples and `window` one value
    /// per grain sample.
    pub fn assemble(&mut self, block: &[f32], window: &[f32]) -> &[f32] {
        debug_assert_eq!(block.len(), self.stride);
        debug_assert_eq!(window.len(), self.grain.len());

        let overlap = self.tail.len();
        self.grain[..overlap].copy_from_slice(&self.tail);
        self.grain[overlap..].copy_from_slice(block);
        for (g, w) in self.grain.iter_mut().zip(window.iter()) {
            *g *= w;
        }

        self.tail.copy_within(self.stride.., 0);
        self.tail[overlap - self.stride..].copy_from_slice(block);

        &self.grain
    }

    /// Clear retained input history
    pub fn reset(&mut self) {
        self.tail.fill(0.0);
        self.grain.fill(0.0);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_grain_concatenates_tail_and_block() {
        let mut assembler = GrainAssembler::new(2, 4);
        let window = [1.0; 6];

        assert_eq!(assembler.assemble(&[1.0, 2.0], &window), &[0.0, 0.0, 0.0, 0.0, 1.0, 2.0]);
        assert_eq!(assembler.assemble(&[3.0, 4.0], &window), &[0.0, 0.0, 1.0, 2.0, 3.0, 4.0]);
        assert_eq!(assembler.assemble(&[5.0, 6.0], &window), &[1.0, 2.0, 3.0, 4.0, 5.0, 6.0]);
        assert_eq!(assembler.assemble(&[7.0, 8.0], &window), &[3.0, 4.0, 5.0, 6.0, 7.0, 8.0]);
    }

    #[test]
    fn test_window_is_applied_but_tail_keeps_raw_samples() {
        let mut assembler = GrainAssembler::new(2, 2);
        let window = [0.5, 0.5, 0.5, 0.5];

        assembler.assemble(&[2.0, 4.0], &window);
        let grain = assembler.assemble(&[6.0, 8.0], &window);
        assert_eq!(grain, &[1.0, 2.0, 3.0, 4.0]);
    }

    #[test]
    fn test_reset_clears_history() {
        let mut assembler = GrainAssembler::new(2, 2);
        let window = [1.0; 4];
        assembler.assemble(&[1.0, 1.0], &window);
        assembler.reset();
        assert_eq!(assembler.assemble(&[2.0, 2.0], &window), &[0.0, 0.0, 2.0, 2.0]);
    }
}
