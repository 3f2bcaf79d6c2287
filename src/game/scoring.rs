use crate::game::judgment::{self, JudgeGrade};
use crate::game::life::{LifeChange, MAX_HEALTH};
use serde::Serialize;

/// Rank ratio fallback when a chart reports no achievable score (an empty
/// chart, or a session started without analysis).
pub const FALLBACK_REFERENCE_SCORE: u64 = 100_000;

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize)]
pub struct TierCounts {
    pub perfect: u32,
    pub great: u32,
    pub good: u32,
    pub miss: u32,
}

impl TierCounts {
    fn bump(&mut self, grade: JudgeGrade) {
        match grade {
            JudgeGrade::Perfect => self.perfect += 1,
            JudgeGrade::Great => self.great += 1,
            JudgeGrade::Good => self.good += 1,
            JudgeGrade::Miss => self.miss += 1,
        }
    }
}

/// Aggregate score/combo/health state for one play session. Mutated only
/// by applying judgments and hold outcomes.
#[derive(Clone, Debug)]
pub struct SessionState {
    pub score: u64,
    pub combo: u32,
    pub max_combo: u32,
    pub counts: TierCounts,
    pub health: i32,
}

impl Default for SessionState {
    fn default() -> Self {
        Self {
            score: 0,
            combo: 0,
            max_combo: 0,
            counts: TierCounts::default(),
            health: MAX_HEALTH,
        }
    }
}

impl SessionState {
    pub fn new() -> Self {
        Self::default()
    }

    fn change_health(&mut self, delta: i32) {
        self.health = (self.health + delta).clamp(0, MAX_HEALTH);
    }

    /// Applies one judgment tier. The combo increments before the bonus
    /// term, so the first Perfect of a session scores 1000 + 1*10.
    pub fn apply(&mut self, grade: JudgeGrade) {
        self.counts.bump(grade);

        match grade {
            JudgeGrade::Miss => {
                self.combo = 0;
                self.change_health(LifeChange::MISS);
            }
            _ => {
                self.combo += 1;
                self.max_combo = self.max_combo.max(self.combo);
                self.score += judgment::base_score_for(grade)
                    + judgment::COMBO_BONUS_STEP * u64::from(self.combo);
                self.change_health(match grade {
                    JudgeGrade::Perfect => LifeChange::PERFECT,
                    JudgeGrade::Great => LifeChange::GREAT,
                    _ => LifeChange::GOOD,
                });
            }
        }
    }

    /// A hold sustained to its tail: flat bonus, small health refund, no
    /// combo change (the head tap already counted).
    pub fn apply_hold_held(&mut self, bonus: u64) {
        self.score += bonus;
        self.change_health(LifeChange::HOLD_HELD);
    }

    /// A hold released early: breaks the combo and costs health like a
    /// miss, but the head's tier count stands.
    pub fn apply_hold_let_go(&mut self) {
        self.combo = 0;
        self.change_health(LifeChange::HOLD_LET_GO);
    }

    /// Score drip for an engaged hold.
    pub fn add_drip(&mut self, points: u64) {
        self.score += points;
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub enum Rank {
    SS,
    S,
    A,
    B,
    C,
}

impl Rank {
    pub fn from_ratio(ratio: f64) -> Self {
        if ratio >= 0.90 {
            Self::SS
        } else if ratio >= 0.80 {
            Self::S
        } else if ratio >= 0.70 {
            Self::A
        } else if ratio >= 0.60 {
            Self::B
        } else {
            Self::C
        }
    }
}

/// End-of-session record handed to the summary/persistence layer.
#[derive(Clone, Debug, Serialize)]
pub struct SessionSummary {
    pub final_score: u64,
    pub max_combo: u32,
    pub counts: TierCounts,
    pub rank: Rank,
    pub ended_at: String,
}

pub fn summarize(state: &SessionState, reference_score: u64) -> SessionSummary {
    let reference = if reference_score > 0 {
        reference_score
    } else {
        FALLBACK_REFERENCE_SCORE
    };
    let ratio = state.score as f64 / reference as f64;
    SessionSummary {
        final_score: state.score,
        max_combo: state.max_combo,
        counts: state.counts,
        rank: Rank::from_ratio(ratio),
        ended_at: chrono::Utc::now().to_rfc3339(),
    }
}

#[cfg(test)]
mod tests {
    use super::{Rank, SessionState, summarize};
    use crate::game::judgment::JudgeGrade;
    use crate::game::life::MAX_HEALTH;

    #[test]
    fn worked_sequence_matches_scoring_rules() {
        let mut s = SessionState::new();

        s.apply(JudgeGrade::Perfect);
        assert_eq!((s.score, s.combo), (1010, 1));

        s.apply(JudgeGrade::Perfect);
        assert_eq!((s.score, s.combo, s.max_combo), (2030, 2, 2));

        s.apply(JudgeGrade::Miss);
        assert_eq!((s.score, s.combo, s.max_combo), (2030, 0, 2));

        s.apply(JudgeGrade::Great);
        assert_eq!((s.score, s.combo), (2790, 1));
    }

    #[test]
    fn good_scores_500_plus_combo_bonus() {
        let mut s = SessionState::new();
        s.apply(JudgeGrade::Good);
        assert_eq!(s.score, 510);
    }

    #[test]
    fn health_stays_clamped() {
        let mut s = SessionState::new();
        // Full health: perfects cannot push past the cap.
        for _ in 0..10 {
            s.apply(JudgeGrade::Perfect);
        }
        assert_eq!(s.health, MAX_HEALTH);

        for _ in 0..50 {
            s.apply(JudgeGrade::Miss);
        }
        assert_eq!(s.health, 0, "health floors at zero, never negative");

        s.apply(JudgeGrade::Perfect);
        assert_eq!(s.health, 1, "recovery from the floor is still possible");
    }

    #[test]
    fn miss_keeps_score_but_resets_combo() {
        let mut s = SessionState::new();
        s.apply(JudgeGrade::Great);
        let before = s.score;
        s.apply(JudgeGrade::Miss);
        assert_eq!(s.score, before);
        assert_eq!(s.combo, 0);
        assert_eq!(s.counts.miss, 1);
    }

    #[test]
    fn hold_let_go_breaks_combo_without_a_tier_count() {
        let mut s = SessionState::new();
        s.apply(JudgeGrade::Perfect);
        s.apply_hold_let_go();
        assert_eq!(s.combo, 0);
        assert_eq!(s.counts.miss, 0, "the head tap already counted; LetGo adds no tier");
        assert_eq!(s.health, MAX_HEALTH - 10);
    }

    #[test]
    fn rank_ladder_boundaries() {
        assert_eq!(Rank::from_ratio(0.95), Rank::SS);
        assert_eq!(Rank::from_ratio(0.90), Rank::SS);
        assert_eq!(Rank::from_ratio(0.85), Rank::S);
        assert_eq!(Rank::from_ratio(0.75), Rank::A);
        assert_eq!(Rank::from_ratio(0.65), Rank::B);
        assert_eq!(Rank::from_ratio(0.10), Rank::C);
    }

    #[test]
    fn summary_uses_fallback_reference_for_empty_charts() {
        let s = SessionState::new();
        let summary = summarize(&s, 0);
        assert_eq!(summary.final_score, 0);
        assert_eq!(summary.rank, Rank::C);
    }

    #[test]
    fn summary_ranks_against_the_perfect_score() {
        let mut s = SessionState::new();
        for _ in 0..3 {
            s.apply(JudgeGrade::Perfect);
        }
        // 3 perfects = 3060, exactly the 3-note perfect score.
        let summary = summarize(&s, 3060);
        assert_eq!(summary.rank, Rank::SS);
    }
}
