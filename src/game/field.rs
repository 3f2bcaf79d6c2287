use crate::config::RETIRE_GRACE_MS;
use crate::game::chart::ChartEntry;
use crate::game::judgment::{self, JudgeGrade, Judgment, TimingWindows};
use crate::game::note::{HoldData, Note, NoteKind};
use log::debug;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

/// The live set of pending notes for one play session.
///
/// Notes enter when playback reaches their chart entry, get judged exactly
/// once (by a tap or by the timeout sweep), and linger for a short grace
/// period after judgment so trailing visual effects can still read them.
pub struct NoteField {
    pending: Vec<Note>,
    chart_cursor: usize,
    next_note_id: u64,
    num_targets: usize,
    travel_ms: f64,
    rng: StdRng,
}

impl NoteField {
    pub fn new(num_targets: usize, travel_ms: f64, rng_seed: u64) -> Self {
        Self {
            pending: Vec::new(),
            chart_cursor: 0,
            next_note_id: 0,
            num_targets,
            travel_ms,
            rng: StdRng::seed_from_u64(rng_seed),
        }
    }

    pub fn pending(&self) -> &[Note] {
        &self.pending
    }

    pub fn note_by_id(&self, id: u64) -> Option<&Note> {
        self.pending.iter().find(|n| n.id == id)
    }

    /// True once every chart entry has spawned and every note is judged.
    pub fn is_drained(&self, chart: &[ChartEntry]) -> bool {
        self.chart_cursor >= chart.len() && self.pending.iter().all(Note::is_processed)
    }

    fn pick_target(&mut self) -> usize {
        self.rng.random_range(0..self.num_targets)
    }

    /// Two distinct targets, uniform over ordered pairs.
    fn pick_distinct_pair(&mut self) -> (usize, usize) {
        let first = self.rng.random_range(0..self.num_targets);
        let offset = self.rng.random_range(1..self.num_targets);
        (first, (first + offset) % self.num_targets)
    }

    fn push_note(&mut self, entry: &ChartEntry, target: usize, is_simultaneous: bool) {
        let (kind, hold) = match entry.hold_ms {
            Some(duration_ms) => (NoteKind::Hold, Some(HoldData { duration_ms, result: None })),
            None => (NoteKind::Tap, None),
        };
        self.pending.push(Note {
            id: self.next_note_id,
            target,
            spawn_ms: entry.time_ms,
            travel_ms: self.travel_ms,
            kind,
            is_simultaneous,
            result: None,
            hold,
            retired_at_ms: None,
        });
        self.next_note_id += 1;
    }

    /// Materializes every chart entry due at `playback_ms`. The chart is
    /// time-ordered, so this is a prefix pop. Returns how many notes
    /// spawned this call.
    pub fn spawn_due(&mut self, chart: &[ChartEntry], playback_ms: f64) -> usize {
        let mut spawned = 0;
        while let Some(entry) = chart.get(self.chart_cursor) {
            if entry.time_ms > playback_ms {
                break;
            }
            let entry = entry.clone();
            self.chart_cursor += 1;

            if entry.is_simultaneous {
                let (a, b) = self.pick_distinct_pair();
                self.push_note(&entry, a, true);
                self.push_note(&entry, b, true);
                spawned += 2;
            } else {
                let target = self.pick_target();
                self.push_note(&entry, target, false);
                spawned += 1;
            }
        }
        if spawned > 0 {
            debug!("Spawned {} note(s) at {:.0}ms.", spawned, playback_ms);
        }
        spawned
    }

    /// Judges a tap on `target` at `input_ms`, consuming the best-matching
    /// pending note. Returns None when no note qualifies (a stray tap).
    pub fn judge_tap(
        &mut self,
        target: usize,
        input_ms: f64,
        windows: &TimingWindows,
    ) -> Option<Judgment> {
        let idx = judgment::best_match(&self.pending, target, input_ms, windows)?;
        let note = &mut self.pending[idx];
        let error_ms = input_ms - note.arrival_ms();
        // best_match only returns notes inside the hit window.
        let grade = windows.classify(error_ms.abs())?;
        let judgment = Judgment {
            time_error_ms: error_ms,
            grade,
            target,
            note_id: note.id,
        };
        note.result = Some(judgment);
        note.retired_at_ms = Some(input_ms);
        Some(judgment)
    }

    /// Synthesizes a MISS for every unjudged note whose hit window has
    /// fully elapsed.
    pub fn sweep_timeouts(&mut self, playback_ms: f64, windows: &TimingWindows) -> Vec<Judgment> {
        let mut missed = Vec::new();
        for note in &mut self.pending {
            if note.is_processed() {
                continue;
            }
            let arrival = note.arrival_ms();
            if playback_ms > arrival + windows.hit_window_ms {
                let judgment = Judgment {
                    time_error_ms: playback_ms - arrival,
                    grade: JudgeGrade::Miss,
                    target: note.target,
                    note_id: note.id,
                };
                note.result = Some(judgment);
                note.retired_at_ms = Some(playback_ms);
                missed.push(judgment);
            }
        }
        missed
    }

    /// Drops judged notes once their grace period has passed. Purely a
    /// memory bound; judgments already emitted are unaffected.
    pub fn retire(&mut self, playback_ms: f64) {
        self.pending.retain(|note| match note.retired_at_ms {
            Some(retired_at) => playback_ms - retired_at <= RETIRE_GRACE_MS,
            None => true,
        });
    }

    /// Records the outcome of a finished or broken hold on its note, if it
    /// is still resident.
    pub fn set_hold_result(&mut self, note_id: u64, result: crate::game::note::HoldResult) {
        if let Some(note) = self.pending.iter_mut().find(|n| n.id == note_id) {
            if let Some(hold) = note.hold.as_mut() {
                if hold.result.is_none() {
                    hold.result = Some(result);
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::NoteField;
    use crate::game::chart::ChartEntry;
    use crate::game::judgment::{JudgeGrade, TimingWindows};

    fn windows() -> TimingWindows {
        TimingWindows { perfect_ms: 60.0, great_ms: 120.0, hit_window_ms: 180.0 }
    }

    fn entry(time_ms: f64, is_simultaneous: bool) -> ChartEntry {
        ChartEntry { time_ms, intensity: 1.2, is_simultaneous, hold_ms: None }
    }

    fn field() -> NoteField {
        NoteField::new(4, 2000.0, 7)
    }

    #[test]
    fn spawn_pops_the_due_prefix_only() {
        let chart = vec![entry(100.0, false), entry(600.0, false), entry(1200.0, false)];
        let mut f = field();
        assert_eq!(f.spawn_due(&chart, 700.0), 2);
        assert_eq!(f.pending().len(), 2);
        // The remaining entry spawns once playback reaches it.
        assert_eq!(f.spawn_due(&chart, 700.0), 0);
        assert_eq!(f.spawn_due(&chart, 1200.0), 1);
    }

    #[test]
    fn simultaneous_entries_spawn_distinct_pairs() {
        let chart: Vec<ChartEntry> =
            (0..50).map(|i| entry(i as f64 * 400.0, true)).collect();
        let mut f = field();
        f.spawn_due(&chart, 1e9);
        assert_eq!(f.pending().len(), 100);
        for pair in f.pending().chunks(2) {
            assert_eq!(pair[0].spawn_ms, pair[1].spawn_ms);
            assert!(pair[0].is_simultaneous && pair[1].is_simultaneous);
            assert_ne!(
                pair[0].target, pair[1].target,
                "a simultaneous pair must occupy two distinct targets"
            );
        }
    }

    #[test]
    fn targets_stay_in_range() {
        let chart: Vec<ChartEntry> =
            (0..200).map(|i| entry(i as f64 * 300.0, i % 3 == 0)).collect();
        let mut f = field();
        f.spawn_due(&chart, 1e9);
        assert!(f.pending().iter().all(|n| n.target < 4));
    }

    #[test]
    fn same_seed_reproduces_target_assignment() {
        let chart: Vec<ChartEntry> =
            (0..20).map(|i| entry(i as f64 * 400.0, i % 2 == 0)).collect();
        let mut a = NoteField::new(4, 2000.0, 99);
        let mut b = NoteField::new(4, 2000.0, 99);
        a.spawn_due(&chart, 1e9);
        b.spawn_due(&chart, 1e9);
        let targets_a: Vec<usize> = a.pending().iter().map(|n| n.target).collect();
        let targets_b: Vec<usize> = b.pending().iter().map(|n| n.target).collect();
        assert_eq!(targets_a, targets_b);
    }

    #[test]
    fn tap_judges_a_note_exactly_once() {
        let chart = vec![entry(0.0, false)];
        let mut f = field();
        f.spawn_due(&chart, 0.0);
        let target = f.pending()[0].target;

        // Arrival is 2000; a tap at 2040 is inside the perfect window.
        let first = f.judge_tap(target, 2040.0, &windows());
        assert_eq!(first.map(|j| j.grade), Some(JudgeGrade::Perfect));

        let second = f.judge_tap(target, 2050.0, &windows());
        assert!(second.is_none(), "a judged note must not match a second tap");
    }

    #[test]
    fn sweep_misses_only_expired_notes() {
        let chart = vec![entry(0.0, false), entry(1000.0, false)];
        let mut f = field();
        f.spawn_due(&chart, 1000.0);

        // First note arrives at 2000; its window closes at 2180.
        let missed = f.sweep_timeouts(2181.0, &windows());
        assert_eq!(missed.len(), 1);
        assert_eq!(missed[0].grade, JudgeGrade::Miss);

        // The second (arrival 3000) is still live; sweeping again emits
        // nothing new for the first.
        let again = f.sweep_timeouts(2200.0, &windows());
        assert!(again.is_empty(), "a missed note must not be missed twice");
    }

    #[test]
    fn swept_note_cannot_be_hit_afterwards() {
        let chart = vec![entry(0.0, false)];
        let mut f = field();
        f.spawn_due(&chart, 0.0);
        let target = f.pending()[0].target;
        f.sweep_timeouts(2181.0, &windows());
        assert!(f.judge_tap(target, 2179.0, &windows()).is_none());
    }

    #[test]
    fn retire_honors_the_grace_period() {
        let chart = vec![entry(0.0, false)];
        let mut f = field();
        f.spawn_due(&chart, 0.0);
        let target = f.pending()[0].target;
        f.judge_tap(target, 2000.0, &windows());

        f.retire(2500.0);
        assert_eq!(f.pending().len(), 1, "judged notes linger through the grace period");
        f.retire(3001.0);
        assert!(f.pending().is_empty(), "grace expired, the note should be dropped");
    }

    #[test]
    fn drained_after_all_entries_judged() {
        let chart = vec![entry(0.0, false)];
        let mut f = field();
        assert!(!f.is_drained(&chart));
        f.spawn_due(&chart, 0.0);
        assert!(!f.is_drained(&chart));
        f.sweep_timeouts(5000.0, &windows());
        assert!(f.is_drained(&chart));
    }
}
