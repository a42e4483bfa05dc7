//! Audio analysis module for Pitch
//!
//! Provides the amplitude spectrum of output blocks and dominant-frequency
//! estimation.

mod frequency;
mod spectrum;

pub use frequency::{cents_between, dominant_frequency};
pub use spectrum::{hann_window, SpectrumAnalyzer};
