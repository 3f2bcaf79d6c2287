//! Boundary with the audio layer.
//!
//! The engine never decodes audio itself; an external renderer hands it
//! per-frame frequency spectra (0-255 magnitude bins, one frame per
//! analysis step) or, equivalently, pre-reduced scalar energy samples.

use serde::{Deserialize, Serialize};

/// Number of low-frequency bins averaged into the scalar energy value.
/// Beats in this family of charts live almost entirely in the bass bands.
pub const LOW_BAND_BINS: usize = 5;

/// A single scalar energy reading at a point in the track.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct EnergySample {
    pub time_ms: f64,
    pub energy: f32,
}

/// One frame of frequency-bin magnitudes as delivered by the analyser.
#[derive(Clone, Debug)]
pub struct SpectrumFrame {
    pub time_ms: f64,
    pub bins: Vec<u8>,
}

impl SpectrumFrame {
    /// Average magnitude of the first [`LOW_BAND_BINS`] bins, on the same
    /// 0-255 scale the analyser uses. Frames with fewer bins average what
    /// they have; an empty frame reads as silence.
    pub fn low_band_energy(&self) -> f32 {
        let band = &self.bins[..self.bins.len().min(LOW_BAND_BINS)];
        if band.is_empty() {
            return 0.0;
        }
        let sum: u32 = band.iter().map(|&b| u32::from(b)).sum();
        sum as f32 / band.len() as f32
    }
}

/// Reduces a bulk spectrum capture to the scalar samples the chart
/// builder consumes.
pub fn samples_from_spectra(frames: &[SpectrumFrame]) -> Vec<EnergySample> {
    frames
        .iter()
        .map(|frame| EnergySample {
            time_ms: frame.time_ms,
            energy: frame.low_band_energy(),
        })
        .collect()
}
