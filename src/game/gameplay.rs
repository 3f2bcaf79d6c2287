use crate::config::{HOLD_DRIP_INTERVAL_MS, Settings};
use crate::game::chart::AnalysisResult;
use crate::game::clock::GameClock;
use crate::game::field::NoteField;
use crate::game::judgment::{Judgment, TimingWindows};
use crate::game::note::{HoldResult, NoteKind};
use crate::game::scoring::{self, SessionState, SessionSummary};
use log::{debug, info};
use std::collections::VecDeque;
use std::fmt;

pub const HOLD_HELD_BONUS: u64 = 500;
pub const HOLD_DRIP_POINTS: u64 = 10;

#[derive(Clone, Copy, Debug)]
struct InputEdge {
    target: usize,
    pressed: bool,
    /// Already converted to the playback basis at submission time, so a
    /// pause between submission and processing cannot skew it.
    playback_ms: f64,
}

#[derive(Debug)]
pub enum InputError {
    TargetOutOfRange { target: usize, num_targets: usize },
}

impl fmt::Display for InputError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::TargetOutOfRange { target, num_targets } => {
                write!(f, "target index {} outside [0, {})", target, num_targets)
            }
        }
    }
}

impl std::error::Error for InputError {}

/// Discrete outcomes surfaced to the presentation layer each frame.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum GameEvent {
    Judged(Judgment),
    HoldHeld { target: usize },
    HoldLetGo { target: usize },
}

#[derive(Clone, Copy, Debug)]
struct ActiveHold {
    note_id: u64,
    end_ms: f64,
    /// Playback time the drip has been paid out through.
    dripped_ms: f64,
}

pub struct State {
    pub analysis: AnalysisResult,
    pub field: NoteField,
    pub session: SessionState,
    pub playback_ms: f64,
    clock: GameClock,
    windows: TimingWindows,
    num_targets: usize,
    support_long_notes: bool,
    pending_edges: VecDeque<InputEdge>,
    active_holds: Vec<Option<ActiveHold>>,
    events: Vec<GameEvent>,
}

pub fn init(analysis: AnalysisResult, settings: &Settings, now_ms: f64, rng_seed: u64) -> State {
    info!(
        "Starting session: {} notes, perfect score {}.",
        analysis.total_notes, analysis.perfect_score
    );

    let field = NoteField::new(settings.num_targets, settings.note_travel_ms, rng_seed);
    State {
        field,
        session: SessionState::new(),
        playback_ms: 0.0,
        clock: GameClock::start_at(now_ms),
        windows: TimingWindows::from_settings(settings),
        num_targets: settings.num_targets,
        support_long_notes: settings.support_long_notes,
        pending_edges: VecDeque::new(),
        active_holds: vec![None; settings.num_targets],
        events: Vec::new(),
        analysis,
    }
}

/// Queues one press/release edge for the next frame. Out-of-range targets
/// are rejected without touching any session state; edges submitted while
/// paused are dropped.
pub fn submit_input(
    state: &mut State,
    target: usize,
    pressed: bool,
    now_ms: f64,
) -> Result<(), InputError> {
    if target >= state.num_targets {
        return Err(InputError::TargetOutOfRange { target, num_targets: state.num_targets });
    }
    if state.clock.is_paused() {
        debug!("Dropping input on target {} while paused.", target);
        return Ok(());
    }
    state.pending_edges.push_back(InputEdge {
        target,
        pressed,
        playback_ms: state.clock.playback_ms(now_ms),
    });
    Ok(())
}

pub fn pause(state: &mut State, now_ms: f64) {
    state.clock.pause(now_ms);
}

pub fn resume(state: &mut State, now_ms: f64) {
    state.clock.resume(now_ms);
}

pub fn is_paused(state: &State) -> bool {
    state.clock.is_paused()
}

/// One frame tick: advance playback, spawn due notes, judge queued input,
/// tick holds, sweep expired notes, retire judged ones.
pub fn update(state: &mut State, now_ms: f64) {
    let playback_ms = state.clock.playback_ms(now_ms);
    state.playback_ms = playback_ms;

    state.field.spawn_due(&state.analysis.chart, playback_ms);
    process_input_edges(state);
    update_active_holds(state, playback_ms);

    for miss in state.field.sweep_timeouts(playback_ms, &state.windows) {
        state.session.apply(miss.grade);
        state.events.push(GameEvent::Judged(miss));
    }

    state.field.retire(playback_ms);
}

fn process_input_edges(state: &mut State) {
    while let Some(edge) = state.pending_edges.pop_front() {
        if edge.pressed {
            handle_press(state, edge);
        } else if state.support_long_notes {
            handle_release(state, edge);
        }
    }
}

fn handle_press(state: &mut State, edge: InputEdge) {
    let Some(judgment) = state.field.judge_tap(edge.target, edge.playback_ms, &state.windows)
    else {
        // A tap with no qualifying note is simply dropped.
        debug!("Stray tap on target {} at {:.0}ms.", edge.target, edge.playback_ms);
        return;
    };

    debug!(
        "JUDGED: target {}, error {:+.1}ms, {:?}",
        edge.target, judgment.time_error_ms, judgment.grade
    );
    state.session.apply(judgment.grade);
    state.events.push(GameEvent::Judged(judgment));

    if state.support_long_notes {
        if let Some(note) = state.field.note_by_id(judgment.note_id) {
            if note.kind == NoteKind::Hold {
                state.active_holds[edge.target] = Some(ActiveHold {
                    note_id: note.id,
                    end_ms: note.hold_end_ms(),
                    dripped_ms: edge.playback_ms,
                });
            }
        }
    }
}

fn handle_release(state: &mut State, edge: InputEdge) {
    let Some(hold) = state.active_holds[edge.target].take() else {
        return;
    };

    if edge.playback_ms < hold.end_ms {
        debug!("Hold on target {} let go {:.0}ms early.", edge.target, hold.end_ms - edge.playback_ms);
        state.field.set_hold_result(hold.note_id, HoldResult::LetGo);
        state.session.apply_hold_let_go();
        state.events.push(GameEvent::HoldLetGo { target: edge.target });
    } else {
        complete_hold(state, edge.target, hold);
    }
}

fn update_active_holds(state: &mut State, playback_ms: f64) {
    for target in 0..state.active_holds.len() {
        let Some(mut hold) = state.active_holds[target] else {
            continue;
        };

        // Drip score for the engaged span, never past the tail.
        let drip_until = playback_ms.min(hold.end_ms);
        while drip_until - hold.dripped_ms >= HOLD_DRIP_INTERVAL_MS {
            hold.dripped_ms += HOLD_DRIP_INTERVAL_MS;
            state.session.add_drip(HOLD_DRIP_POINTS);
        }

        if playback_ms >= hold.end_ms {
            state.active_holds[target] = None;
            complete_hold(state, target, hold);
        } else {
            state.active_holds[target] = Some(hold);
        }
    }
}

fn complete_hold(state: &mut State, target: usize, hold: ActiveHold) {
    debug!("Hold on target {} survived to its tail.", target);
    state.field.set_hold_result(hold.note_id, HoldResult::Held);
    state.session.apply_hold_held(HOLD_HELD_BONUS);
    state.events.push(GameEvent::HoldHeld { target });
}

/// Hands the frame's discrete outcomes to the presentation layer.
pub fn drain_events(state: &mut State) -> Vec<GameEvent> {
    std::mem::take(&mut state.events)
}

/// True once the chart is exhausted, every note judged, and no hold is
/// still engaged.
pub fn is_complete(state: &State) -> bool {
    state.field.is_drained(&state.analysis.chart)
        && state.active_holds.iter().all(Option::is_none)
}

pub fn finish(state: &State) -> SessionSummary {
    let summary = scoring::summarize(&state.session, state.analysis.perfect_score);
    info!(
        "Session over: score {}, max combo {}, rank {:?}.",
        summary.final_score, summary.max_combo, summary.rank
    );
    summary
}
