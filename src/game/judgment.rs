use crate::config::Settings;
use crate::game::note::Note;

#[derive(Copy, Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum JudgeGrade {
    Perfect,
    Great,
    Good,
    Miss,
}

#[derive(Copy, Clone, Debug, PartialEq)]
pub struct Judgment {
    /// Signed offset from arrival: negative = early, positive = late.
    pub time_error_ms: f64,
    pub grade: JudgeGrade,
    pub target: usize,
    pub note_id: u64,
}

pub const PERFECT_BASE_SCORE: u64 = 1000;
pub const GREAT_BASE_SCORE: u64 = 750;
pub const GOOD_BASE_SCORE: u64 = 500;
pub const COMBO_BONUS_STEP: u64 = 10;

pub fn base_score_for(grade: JudgeGrade) -> u64 {
    match grade {
        JudgeGrade::Perfect => PERFECT_BASE_SCORE,
        JudgeGrade::Great => GREAT_BASE_SCORE,
        JudgeGrade::Good => GOOD_BASE_SCORE,
        JudgeGrade::Miss => 0,
    }
}

/// The tap timing window triple. Boundaries are exclusive upper bounds:
/// an error exactly on a boundary falls into the wider tier, and an error
/// at the full hit window matches nothing at all.
#[derive(Copy, Clone, Debug)]
pub struct TimingWindows {
    pub perfect_ms: f64,
    pub great_ms: f64,
    pub hit_window_ms: f64,
}

impl TimingWindows {
    pub fn from_settings(settings: &Settings) -> Self {
        Self {
            perfect_ms: settings.perfect_window_ms,
            great_ms: settings.great_window_ms,
            hit_window_ms: settings.hit_window_ms,
        }
    }

    pub fn classify(&self, abs_error_ms: f64) -> Option<JudgeGrade> {
        if abs_error_ms < self.perfect_ms {
            Some(JudgeGrade::Perfect)
        } else if abs_error_ms < self.great_ms {
            Some(JudgeGrade::Great)
        } else if abs_error_ms < self.hit_window_ms {
            Some(JudgeGrade::Good)
        } else {
            None
        }
    }
}

/// Finds the pending note a tap on `target` should consume: the unjudged
/// note on that target with the smallest absolute error inside the hit
/// window. Exact ties go to the earlier arrival so stacked notes resolve
/// in chart order. Returns an index into `notes`, or None when the tap
/// matches nothing (which is not an error - stray taps are ignored).
pub fn best_match(
    notes: &[Note],
    target: usize,
    input_ms: f64,
    windows: &TimingWindows,
) -> Option<usize> {
    let mut best: Option<(usize, f64, f64)> = None;

    for (idx, note) in notes.iter().enumerate() {
        if note.target != target || note.is_processed() {
            continue;
        }
        let arrival = note.arrival_ms();
        let diff = (input_ms - arrival).abs();
        if diff >= windows.hit_window_ms {
            continue;
        }

        let closer = match best {
            None => true,
            Some((_, best_diff, best_arrival)) => {
                diff < best_diff || (diff == best_diff && arrival < best_arrival)
            }
        };
        if closer {
            best = Some((idx, diff, arrival));
        }
    }

    best.map(|(idx, _, _)| idx)
}

#[cfg(test)]
mod tests {
    use super::{JudgeGrade, TimingWindows, best_match};
    use crate::game::note::{Note, NoteKind};

    fn windows() -> TimingWindows {
        TimingWindows { perfect_ms: 60.0, great_ms: 120.0, hit_window_ms: 180.0 }
    }

    fn note(id: u64, target: usize, arrival_ms: f64) -> Note {
        Note {
            id,
            target,
            spawn_ms: arrival_ms - 2000.0,
            travel_ms: 2000.0,
            kind: NoteKind::Tap,
            is_simultaneous: false,
            result: None,
            hold: None,
            retired_at_ms: None,
        }
    }

    #[test]
    fn classify_follows_window_triple() {
        let w = windows();
        assert_eq!(w.classify(40.0), Some(JudgeGrade::Perfect));
        assert_eq!(w.classify(90.0), Some(JudgeGrade::Great));
        assert_eq!(w.classify(150.0), Some(JudgeGrade::Good));
        assert_eq!(w.classify(200.0), None);
    }

    #[test]
    fn boundary_errors_fall_into_the_wider_tier() {
        let w = windows();
        assert_eq!(w.classify(60.0), Some(JudgeGrade::Great));
        assert_eq!(w.classify(120.0), Some(JudgeGrade::Good));
        assert_eq!(w.classify(180.0), None, "the full hit window is exclusive");
    }

    #[test]
    fn best_match_picks_nearest_arrival() {
        let notes = vec![note(1, 0, 1000.0), note(2, 0, 1400.0)];
        assert_eq!(best_match(&notes, 0, 1350.0, &windows()), Some(1));
    }

    #[test]
    fn best_match_ignores_other_targets() {
        let notes = vec![note(1, 1, 1000.0)];
        assert_eq!(best_match(&notes, 0, 1000.0, &windows()), None);
    }

    #[test]
    fn best_match_ignores_out_of_window_taps() {
        let notes = vec![note(1, 0, 1000.0)];
        assert_eq!(best_match(&notes, 0, 1200.0, &windows()), None);
    }

    #[test]
    fn exact_tie_resolves_to_earlier_arrival() {
        // Input equidistant from both notes; the earlier one wins.
        let notes = vec![note(2, 0, 1100.0), note(1, 0, 900.0)];
        assert_eq!(best_match(&notes, 0, 1000.0, &windows()), Some(1));
    }

    #[test]
    fn processed_notes_are_skipped() {
        let mut notes = vec![note(1, 0, 1000.0), note(2, 0, 1400.0)];
        notes[0].result = Some(super::Judgment {
            time_error_ms: 0.0,
            grade: JudgeGrade::Perfect,
            target: 0,
            note_id: 1,
        });
        assert_eq!(
            best_match(&notes, 0, 1010.0, &windows()),
            None,
            "an already-judged note must not be matched again"
        );
    }
}
