use crate::config::ENERGY_SMOOTHING;

/// Energy-rise beat detector.
///
/// Keeps an exponential moving average of the incoming low-band energy and
/// declares a beat whenever a sample rises above that baseline by the
/// configured ratio while also clearing an absolute floor, so near-silent
/// passages can't fire on ratio alone. Rate limiting between accepted
/// beats is the chart builder's job, not this detector's; consecutive
/// samples may both report a beat.
pub struct BeatDetector {
    avg_energy: Option<f32>,
    sensitivity: f32,
    energy_floor: f32,
}

impl BeatDetector {
    pub fn new(sensitivity: f32, energy_floor: f32) -> Self {
        Self {
            avg_energy: None,
            sensitivity,
            energy_floor,
        }
    }

    /// Feeds one energy sample. The first sample seeds the baseline and
    /// never counts as a beat.
    pub fn detect(&mut self, energy: f32) -> bool {
        let Some(avg) = self.avg_energy else {
            self.avg_energy = Some(energy);
            return false;
        };

        let avg = avg * (1.0 - ENERGY_SMOOTHING) + energy * ENERGY_SMOOTHING;
        self.avg_energy = Some(avg);

        energy > avg * self.sensitivity && energy > self.energy_floor
    }

    /// Current baseline; 0 until the first sample has been seen.
    pub fn avg_energy(&self) -> f32 {
        self.avg_energy.unwrap_or(0.0)
    }
}
