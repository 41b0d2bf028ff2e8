//! The Transition Engine: drives one (layer, fixture) state machine through
//! idle -> waitingFor -> transitioning -> waitingUntil -> completion.
use std::sync::Arc;

use ordermap::OrderMap;

use crate::clock::ClockTime;
use crate::color::{PanTilt, Rgbio};
use crate::config::FixtureId;
use crate::interpolator::interpolate;
use crate::state_store::LightStateStore;
use crate::transition::{EventKind, TransitionStep, WaitFor};

/// Running totals of how many events of each kind have ever been observed.
/// Event-gated waits record the total at the moment they start waiting and
/// are satisfied once the running total has advanced by the required count,
/// so concurrent slots gating on the same kind don't steal each other's
/// events.
#[derive(Default)]
pub struct EventCounters {
    totals: OrderMap<EventKind, u64>,
}

impl EventCounters {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&mut self, kind: EventKind) {
        *self.totals.entry(kind).or_insert(0) += 1;
    }

    pub fn total(&self, kind: EventKind) -> u64 {
        self.totals.get(&kind).copied().unwrap_or(0)
    }
}

/// The phase of a single (layer, fixture) slot's current transition step.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum StepState {
    Idle,
    WaitingFor,
    Transitioning,
    WaitingUntil,
}

/// Per-(layer, fixture) effect state: which step it's on, its phase within
/// that step, and the color continuity the next step will start from.
#[derive(Clone)]
pub struct LightEffectState {
    pub effect_name: String,
    pub transitions: Arc<Vec<TransitionStep>>,
    pub current_transition_index: usize,
    pub state: StepState,
    pub transition_start_time: ClockTime,
    pub wait_end_time: ClockTime,
    /// The running event total at the moment the current wait started.
    pub event_baseline: u64,
    pub last_end_state: Option<Rgbio>,
    pub is_persistent: bool,
    /// The color captured when the current transition started. Interpolation
    /// is always measured from this fixed point, never from the store's
    /// current value, since the store holds the in-progress interpolated
    /// color which would otherwise be re-interpolated from itself each tick.
    current_start_color: Option<Rgbio>,
}

impl LightEffectState {
    pub fn new(effect_name: impl Into<String>, transitions: Arc<Vec<TransitionStep>>, is_persistent: bool) -> Self {
        Self {
            effect_name: effect_name.into(),
            transitions,
            current_transition_index: 0,
            state: StepState::Idle,
            transition_start_time: 0,
            wait_end_time: 0,
            event_baseline: 0,
            last_end_state: None,
            is_persistent,
            current_start_color: None,
        }
    }

    fn current_step(&self) -> Option<&TransitionStep> {
        self.transitions.get(self.current_transition_index)
    }
}

/// The result of advancing one slot by one tick.
pub enum AdvanceResult {
    /// The slot has more steps to run.
    Continuing,
    /// `current_transition_index` reached the end of the transition list;
    /// the final color reached is attached for the Layer Manager's
    /// completion protocol.
    Completed { last_end_state: Rgbio },
}

fn wait_satisfied(wait: WaitFor, now: ClockTime, wait_end_time: ClockTime, event_baseline: u64, events: &EventCounters) -> bool {
    match wait {
        WaitFor::None => true,
        WaitFor::Delay(_) => now >= wait_end_time,
        WaitFor::Event { kind, count } => events.total(kind).saturating_sub(event_baseline) >= count as u64,
    }
}

/// Advance one (layer, fixture) slot's state machine by one tick.
///
/// `now` must be the single value captured once per tick by the caller
/// (the Sequencer), so that two slots whose waits resolve in the same tick
/// observe an identical timestamp.
#[allow(clippy::too_many_arguments)]
pub fn advance(
    now: ClockTime,
    state: &mut LightEffectState,
    store: &mut LightStateStore,
    fixture: &FixtureId,
    layer: u32,
    home: PanTilt,
    events: &EventCounters,
) -> AdvanceResult {
    if state.current_transition_index >= state.transitions.len() {
        // Defensive: an out-of-range index is this crate's analogue of the
        // "unknown state tag" anomaly the design calls out. Treat as complete.
        let last = state.last_end_state.unwrap_or(Rgbio::BLACK);
        return AdvanceResult::Completed { last_end_state: last };
    }

    loop {
        let Some(mut step) = state.current_step().cloned() else {
            let last = state.last_end_state.unwrap_or(Rgbio::BLACK);
            return AdvanceResult::Completed { last_end_state: last };
        };
        step.target.fill_pan_tilt_default(home);

        match state.state {
            StepState::Idle => {
                if step.wait_for == WaitFor::None {
                    start_transition(now, state, store, fixture, layer, home, &step);
                    // Loop again: a duration-0 transition should be allowed
                    // to resolve within the same tick it starts.
                    continue;
                }
                state.transition_start_time = now;
                state.wait_end_time = match step.wait_for {
                    WaitFor::Delay(ms) => now + ms,
                    _ => now,
                };
                state.event_baseline = match step.wait_for {
                    WaitFor::Event { kind, .. } => events.total(kind),
                    _ => 0,
                };
                state.state = StepState::WaitingFor;
                return AdvanceResult::Continuing;
            }
            StepState::WaitingFor => {
                if wait_satisfied(step.wait_for, now, state.wait_end_time, state.event_baseline, events) {
                    start_transition(now, state, store, fixture, layer, home, &step);
                    continue;
                }
                return AdvanceResult::Continuing;
            }
            StepState::Transitioning => {
                let elapsed = now.saturating_sub(state.transition_start_time);
                let start_color = state.current_start_color.unwrap_or(Rgbio::BLACK);
                let color = interpolate(start_color, step.target, elapsed, step.duration_ms, step.easing);
                store.set(fixture, layer, color);

                if now >= state.wait_end_time {
                    state.last_end_state = Some(step.target);
                    store.set(fixture, layer, step.target);
                    if step.wait_until == WaitFor::None {
                        state.current_transition_index += 1;
                        state.state = StepState::Idle;
                        continue;
                    }
                    state.transition_start_time = now;
                    state.wait_end_time = match step.wait_until {
                        WaitFor::Delay(ms) => now + ms,
                        _ => now,
                    };
                    state.event_baseline = match step.wait_until {
                        WaitFor::Event { kind, .. } => events.total(kind),
                        _ => 0,
                    };
                    state.state = StepState::WaitingUntil;
                }
                return AdvanceResult::Continuing;
            }
            StepState::WaitingUntil => {
                if wait_satisfied(step.wait_until, now, state.wait_end_time, state.event_baseline, events) {
                    state.current_transition_index += 1;
                    state.state = StepState::Idle;
                    continue;
                }
                return AdvanceResult::Continuing;
            }
        }
    }
}

fn resolve_start_color(
    state: &LightEffectState,
    store: &LightStateStore,
    fixture: &FixtureId,
    layer: u32,
    home: PanTilt,
) -> Rgbio {
    let mut start = state
        .last_end_state
        .or_else(|| store.get(fixture, layer))
        .unwrap_or(Rgbio::BLACK);
    start.fill_pan_tilt_default(home);
    start
}

fn start_transition(
    now: ClockTime,
    state: &mut LightEffectState,
    store: &mut LightStateStore,
    fixture: &FixtureId,
    layer: u32,
    home: PanTilt,
    step: &TransitionStep,
) {
    let start_color = resolve_start_color(state, store, fixture, layer, home);
    store.set(fixture, layer, start_color);
    state.current_start_color = Some(start_color);
    state.transition_start_time = now;
    state.wait_end_time = now + step.duration_ms;
    state.state = StepState::Transitioning;
}
