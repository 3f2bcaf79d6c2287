use crate::game::judgment::Judgment;

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum NoteKind {
    Tap,
    Hold,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum HoldResult {
    Held,
    LetGo,
}

#[derive(Clone, Debug)]
pub struct HoldData {
    /// How long past arrival the hold tail extends.
    pub duration_ms: f64,
    pub result: Option<HoldResult>,
}

#[derive(Clone, Debug)]
pub struct Note {
    pub id: u64,
    pub target: usize,
    /// Playback time at which the note began travelling toward its target.
    pub spawn_ms: f64,
    pub travel_ms: f64,
    pub kind: NoteKind,
    pub is_simultaneous: bool,
    /// Set exactly once, by the tap judge or the timeout sweep.
    pub result: Option<Judgment>,
    pub hold: Option<HoldData>,
    /// Playback time the note was judged, for grace-period retirement.
    pub retired_at_ms: Option<f64>,
}

impl Note {
    /// The moment the note reaches its target and should be hit.
    pub fn arrival_ms(&self) -> f64 {
        self.spawn_ms + self.travel_ms
    }

    pub fn is_processed(&self) -> bool {
        self.result.is_some()
    }

    /// Playback time at which the hold tail ends; arrival for taps.
    pub fn hold_end_ms(&self) -> f64 {
        self.arrival_ms() + self.hold.as_ref().map_or(0.0, |h| h.duration_ms)
    }
}
