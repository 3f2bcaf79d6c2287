use configparser::ini::Ini;
use log::{info, warn};
use once_cell::sync::Lazy;
use std::path::Path;
use std::sync::Mutex;

const SETTINGS_INI_PATH: &str = "beatsync.ini";

// Analysis Constants
pub const ENERGY_SMOOTHING: f32 = 0.05;
pub const ANALYSIS_STEP_MS: f64 = 1000.0 / 60.0;
pub const TRACK_END_GUARD_MS: f64 = 500.0;

// Simultaneous-pair roll
pub const SIMUL_BASE_CHANCE: f64 = 0.10;
pub const SIMUL_INTENSE_CHANCE: f64 = 0.40;
pub const SIMUL_INTENSITY_CUTOFF: f32 = 1.6;

// Long notes (only used when SupportLongNotes is enabled)
pub const HOLD_INTENSITY_CUTOFF: f32 = 2.2;
pub const HOLD_MIN_DURATION_MS: f64 = 200.0;
pub const HOLD_DRIP_INTERVAL_MS: f64 = 100.0;

// Note retirement
pub const RETIRE_GRACE_MS: f64 = 1000.0;

// --- Engine Settings ---

#[derive(Debug, Clone)]
pub struct Settings {
    pub num_targets: usize,
    pub note_travel_ms: f64,
    pub min_beat_interval_ms: f64,
    pub perfect_window_ms: f64,
    pub great_window_ms: f64,
    pub hit_window_ms: f64,
    pub beat_sensitivity: f32,
    pub beat_energy_floor: f32,
    pub support_long_notes: bool,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            num_targets: 4,
            note_travel_ms: 2000.0,
            min_beat_interval_ms: 250.0,
            perfect_window_ms: 60.0,
            great_window_ms: 120.0,
            hit_window_ms: 180.0,
            beat_sensitivity: 1.02,
            beat_energy_floor: 20.0,
            support_long_notes: false,
        }
    }
}

static SETTINGS: Lazy<Mutex<Settings>> = Lazy::new(|| Mutex::new(Settings::default()));

/// Creates a default beatsync.ini if one doesn't exist yet.
fn create_default_file() -> Result<(), std::io::Error> {
    info!("Settings file not found, creating defaults at '{}'.", SETTINGS_INI_PATH);
    let defaults = Settings::default();

    let mut conf = Ini::new();
    conf.set("game", "NumTargets", Some(defaults.num_targets.to_string()));
    conf.set("game", "NoteTravelMs", Some(defaults.note_travel_ms.to_string()));
    conf.set("game", "MinBeatIntervalMs", Some(defaults.min_beat_interval_ms.to_string()));
    conf.set("game", "SupportLongNotes", Some("0".to_string()));
    conf.set("timing", "PerfectWindowMs", Some(defaults.perfect_window_ms.to_string()));
    conf.set("timing", "GreatWindowMs", Some(defaults.great_window_ms.to_string()));
    conf.set("timing", "HitWindowMs", Some(defaults.hit_window_ms.to_string()));
    conf.set("analysis", "BeatSensitivity", Some(defaults.beat_sensitivity.to_string()));
    conf.set("analysis", "BeatEnergyFloor", Some(defaults.beat_energy_floor.to_string()));
    conf.write(SETTINGS_INI_PATH)?;

    Ok(())
}

pub fn load() {
    if !Path::new(SETTINGS_INI_PATH).exists() {
        if let Err(e) = create_default_file() {
            warn!("Failed to create default settings file: {}", e);
            // Proceed with default struct values.
            return;
        }
    }

    let mut settings = SETTINGS.lock().unwrap();
    let defaults = Settings::default();

    let mut conf = Ini::new();
    if conf.load(SETTINGS_INI_PATH).is_err() {
        warn!("Failed to load '{}', using default settings.", SETTINGS_INI_PATH);
        return;
    }

    settings.num_targets = conf
        .get("game", "NumTargets")
        .and_then(|v| v.parse::<usize>().ok())
        .unwrap_or(defaults.num_targets);
    settings.note_travel_ms = conf
        .get("game", "NoteTravelMs")
        .and_then(|v| v.parse::<f64>().ok())
        .unwrap_or(defaults.note_travel_ms);
    settings.min_beat_interval_ms = conf
        .get("game", "MinBeatIntervalMs")
        .and_then(|v| v.parse::<f64>().ok())
        .unwrap_or(defaults.min_beat_interval_ms);
    settings.support_long_notes = conf
        .get("game", "SupportLongNotes")
        .and_then(|v| v.parse::<u8>().ok())
        .map_or(defaults.support_long_notes, |v| v != 0);
    settings.perfect_window_ms = conf
        .get("timing", "PerfectWindowMs")
        .and_then(|v| v.parse::<f64>().ok())
        .unwrap_or(defaults.perfect_window_ms);
    settings.great_window_ms = conf
        .get("timing", "GreatWindowMs")
        .and_then(|v| v.parse::<f64>().ok())
        .unwrap_or(defaults.great_window_ms);
    settings.hit_window_ms = conf
        .get("timing", "HitWindowMs")
        .and_then(|v| v.parse::<f64>().ok())
        .unwrap_or(defaults.hit_window_ms);
    settings.beat_sensitivity = conf
        .get("analysis", "BeatSensitivity")
        .and_then(|v| v.parse::<f32>().ok())
        .unwrap_or(defaults.beat_sensitivity);
    settings.beat_energy_floor = conf
        .get("analysis", "BeatEnergyFloor")
        .and_then(|v| v.parse::<f32>().ok())
        .unwrap_or(defaults.beat_energy_floor);

    // The window triple must be strictly increasing; a misconfigured ini
    // would otherwise make tier classification unreachable.
    if !(settings.perfect_window_ms > 0.0
        && settings.perfect_window_ms < settings.great_window_ms
        && settings.great_window_ms < settings.hit_window_ms)
    {
        warn!(
            "Timing windows {:.0}/{:.0}/{:.0} are not strictly increasing, reverting to defaults.",
            settings.perfect_window_ms, settings.great_window_ms, settings.hit_window_ms
        );
        settings.perfect_window_ms = defaults.perfect_window_ms;
        settings.great_window_ms = defaults.great_window_ms;
        settings.hit_window_ms = defaults.hit_window_ms;
    }

    if settings.num_targets < 2 {
        warn!(
            "NumTargets = {} is too small for simultaneous pairs, reverting to {}.",
            settings.num_targets, defaults.num_targets
        );
        settings.num_targets = defaults.num_targets;
    }
}

/// Returns a copy of the currently loaded settings.
pub fn get() -> Settings {
    SETTINGS.lock().unwrap().clone()
}
