use crate::audio::EnergySample;
use crate::config::{
    self, HOLD_INTENSITY_CUTOFF, HOLD_MIN_DURATION_MS, SIMUL_BASE_CHANCE, SIMUL_INTENSE_CHANCE,
    SIMUL_INTENSITY_CUTOFF, Settings, TRACK_END_GUARD_MS,
};
use crate::game::beat::BeatDetector;
use log::{debug, info, warn};
use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt;
use std::sync::Mutex;
use twox_hash::XxHash64;

/// One scheduled note-spawn event. Immutable once built.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ChartEntry {
    pub time_ms: f64,
    /// Energy over the running baseline at the instant of detection.
    pub intensity: f32,
    pub is_simultaneous: bool,
    #[serde(default)]
    pub hold_ms: Option<f64>,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct AnalysisResult {
    pub total_notes: u32,
    /// Maximum achievable score: every note Perfect with an unbroken combo.
    pub perfect_score: u64,
    pub chart: Vec<ChartEntry>,
    pub track_duration_ms: f64,
}

#[derive(Debug)]
pub enum AnalysisError {
    UnorderedSamples { index: usize },
    Io(std::io::Error),
    Format(serde_json::Error),
}

impl fmt::Display for AnalysisError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::UnorderedSamples { index } => {
                write!(f, "energy samples are not time-ordered at index {}", index)
            }
            Self::Io(e) => write!(f, "failed to read sample data: {}", e),
            Self::Format(e) => write!(f, "failed to parse sample data: {}", e),
        }
    }
}

impl std::error::Error for AnalysisError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Io(e) => Some(e),
            Self::Format(e) => Some(e),
            Self::UnorderedSamples { .. } => None,
        }
    }
}

#[derive(Clone, Debug)]
pub struct ChartParams {
    pub track_duration_ms: f64,
    pub min_beat_interval_ms: f64,
    pub note_travel_ms: f64,
    pub beat_sensitivity: f32,
    pub beat_energy_floor: f32,
    pub support_long_notes: bool,
}

impl ChartParams {
    pub fn from_settings(settings: &Settings, track_duration_ms: f64) -> Self {
        Self {
            track_duration_ms,
            min_beat_interval_ms: settings.min_beat_interval_ms,
            note_travel_ms: settings.note_travel_ms,
            beat_sensitivity: settings.beat_sensitivity,
            beat_energy_floor: settings.beat_energy_floor,
            support_long_notes: settings.support_long_notes,
        }
    }
}

// Fixed seed for the simultaneity roll. Hashing the timestamp instead of
// drawing from an RNG keeps rebuilds of the same track byte-identical.
const SIMUL_ROLL_SEED: u64 = 0x_BEA7_5EED;

/// Maps an entry timestamp to a stable [0, 1) roll.
fn simultaneity_roll(time_ms: f64) -> f64 {
    let hash = XxHash64::oneshot(SIMUL_ROLL_SEED, &time_ms.to_bits().to_le_bytes());
    (hash % 10_000) as f64 / 10_000.0
}

/// Scans a decoded track's energy samples into a note chart.
///
/// Samples must be time-ordered. A silent or too-short track produces an
/// empty chart, which is a valid result, not an error.
pub fn build_chart(
    samples: &[EnergySample],
    params: &ChartParams,
) -> Result<AnalysisResult, AnalysisError> {
    let mut track_duration_ms = params.track_duration_ms;
    if !track_duration_ms.is_finite() || track_duration_ms <= 0.0 {
        // Best effort: trust the sample clock instead of refusing the track.
        let fallback = samples.last().map_or(0.0, |s| s.time_ms + config::ANALYSIS_STEP_MS);
        warn!(
            "Track duration {} is unusable, falling back to {:.0}ms from the sample clock.",
            track_duration_ms, fallback
        );
        track_duration_ms = fallback;
    }

    let cutoff_ms = track_duration_ms - (params.note_travel_ms + TRACK_END_GUARD_MS);

    let mut detector = BeatDetector::new(params.beat_sensitivity, params.beat_energy_floor);
    let mut chart: Vec<ChartEntry> = Vec::new();
    let mut last_accepted_ms = f64::NEG_INFINITY;
    let mut last_time_ms = f64::NEG_INFINITY;

    for (index, sample) in samples.iter().enumerate() {
        if sample.time_ms < last_time_ms {
            return Err(AnalysisError::UnorderedSamples { index });
        }
        last_time_ms = sample.time_ms;

        let is_beat = detector.detect(sample.energy);
        if !is_beat {
            continue;
        }
        if sample.time_ms - last_accepted_ms <= params.min_beat_interval_ms {
            continue;
        }
        // Every spawned note needs time to travel and resolve before the
        // track runs out.
        if sample.time_ms >= cutoff_ms {
            continue;
        }

        last_accepted_ms = sample.time_ms;
        let avg = detector.avg_energy();
        let intensity = if avg > 0.0 { sample.energy / avg } else { 1.0 };

        let simul_chance = if intensity > SIMUL_INTENSITY_CUTOFF {
            SIMUL_INTENSE_CHANCE
        } else {
            SIMUL_BASE_CHANCE
        };
        let is_simultaneous = simultaneity_roll(sample.time_ms) < simul_chance;

        let hold_ms = if params.support_long_notes
            && !is_simultaneous
            && intensity > HOLD_INTENSITY_CUTOFF
        {
            // The tail must also resolve before the cutoff.
            let available = cutoff_ms - sample.time_ms;
            let duration = (params.min_beat_interval_ms * 2.0).min(available);
            if duration >= HOLD_MIN_DURATION_MS {
                Some(duration)
            } else {
                None
            }
        } else {
            None
        };

        debug!(
            "Beat at {:.0}ms (intensity {:.2}, simultaneous: {}, hold: {:?})",
            sample.time_ms, intensity, is_simultaneous, hold_ms
        );
        chart.push(ChartEntry {
            time_ms: sample.time_ms,
            intensity,
            is_simultaneous,
            hold_ms,
        });
    }

    let total_notes: u32 = chart
        .iter()
        .map(|entry| if entry.is_simultaneous { 2 } else { 1 })
        .sum();
    let perfect_score = perfect_score_for(total_notes);

    info!(
        "Chart built: {} entries, {} notes, perfect score {}.",
        chart.len(),
        total_notes,
        perfect_score
    );

    Ok(AnalysisResult {
        total_notes,
        perfect_score,
        chart,
        track_duration_ms,
    })
}

/// Closed form of every note landing Perfect on a monotonically growing
/// combo: `n * 1000` base plus combo bonuses `10 * (1 + 2 + ... + n)`.
pub fn perfect_score_for(total_notes: u32) -> u64 {
    let n = u64::from(total_notes);
    n * 1000 + 10 * n * (n + 1) / 2
}

// --- Single-flight analysis guard ---
//
// Chart building is the one long-running step; callers run it on a worker
// and must not start a second build for the same track while one is
// outstanding.

static ANALYSES_IN_FLIGHT: Lazy<Mutex<HashSet<u64>>> = Lazy::new(|| Mutex::new(HashSet::new()));

/// Claims the analysis slot for a track. Returns false when a build for
/// this track is already running, in which case the caller must no-op.
pub fn begin_analysis(track_id: u64) -> bool {
    let claimed = ANALYSES_IN_FLIGHT.lock().unwrap().insert(track_id);
    if !claimed {
        info!("Analysis for track {:#x} already in flight, ignoring request.", track_id);
    }
    claimed
}

pub fn finish_analysis(track_id: u64) {
    ANALYSES_IN_FLIGHT.lock().unwrap().remove(&track_id);
}

pub fn analysis_in_flight(track_id: u64) -> bool {
    ANALYSES_IN_FLIGHT.lock().unwrap().contains(&track_id)
}
