//! Overlap-add synthesis of reconstructed grains

/// Cross-fades each synthesized grain with the retained output tail
pub struct OverlapAdd {
    stride: usize,
    /// Pending contributions of previous grains (oldest sample first)
    tail: Vec<f32>,
}

impl OverlapAdd {
    pub fn new(stride: usize, overlap: usize) -> Self {
        debug_assert!(stride <= overlap, "stride must not exceed overlap");
        Self {
            stride,
            tail: vec![0.0; overlap],
        }
    }

    /// Window `grain` in place, emit the next `stride` samples into `output`
    /// and fold the rest of the grain into the tail.
    pub fn synthesize(&mut self, grain: &mut [f32], window: &[f32], output: &mut [f32]) {
        let stride = self.stride;
        let overlap = self.tail.len();
        debug_assert_eq!(grain.len(), stride + overlap);
        debug_assert_eq!(window.len(), grain.len());
        debug_assert_eq!(output.len(), stride);

        for (g, w) in grain.iter_mut().zip(window.iter()) {
            *g *= w;
        }

        for ((out, t), g) in output.iter_mut().zip(&self.tail[..stride]).zip(&grain[..stride]) {
            *out = t + g;
        }

        self.tail.copy_within(stride.., 0);
        for (t, g) in self.tail[..overlap - stride]
            .iter_mut()
            .zip(&grain[stride..overlap])
        {
            *t += g;
        }
        self.tail[overlap - stride..].copy_from_slice(&grain[overlap..]);
    }

    pub fn reset(&mut self) {
        self.tail.fill(0.0);
    }
}
