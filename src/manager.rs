//! The Effect Manager: the public façade external cue code drives, and the
//! owner of the Layer Manager and Light State Store "arena" the Transition
//! Engine advances each tick.
//!
//! Per the re-architecture guidance in the design notes, this crate has no
//! late-binding setter between the manager and the engine: the Effect
//! Manager owns both tables directly and drives `engine::advance` itself in
//! [`EffectManager::advance_tick`], handling the completion protocol inline
//! rather than through a callback.
use std::sync::Arc;

use log::warn;

use crate::clock::ClockTime;
use crate::color::{PanTilt, Rgbio};
use crate::config::FixtureId;
use crate::engine::{self, AdvanceResult, EventCounters, LightEffectState};
use crate::fixture::FixtureRegistry;
use crate::layer::{LayerManager, QueuedEffect};
use crate::state_store::LightStateStore;
use crate::transformer;
use crate::transition::Effect;

/// Reserved layer the blackout transition is installed on, above any
/// ordinary effect layer.
pub const BLACKOUT_LAYER: u32 = 255;

/// Reserved effect name used for `setState`/`blackout` installs, so they
/// don't collide with author-named effects under the naming invariant.
const SET_STATE_EFFECT_NAME: &str = "__set_state__";
const BLACKOUT_EFFECT_NAME: &str = "__blackout__";

/// Owns the active/queued effect tables (via [`LayerManager`]) and the
/// composed per-(fixture, layer) color (via [`LightStateStore`]), and
/// exposes the eight named operations of the public façade.
#[derive(Default)]
pub struct EffectManager {
    pub(crate) layers: LayerManager,
    pub(crate) store: LightStateStore,
    blackout_listeners: Vec<Box<dyn Fn() + Send>>,
}

impl EffectManager {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn store(&self) -> &LightStateStore {
        &self.store
    }

    pub fn layers(&self) -> &LayerManager {
        &self.layers
    }

    /// Register a callback fired once per blackout completion (reaching its
    /// target color, whether by running to completion or being cancelled
    /// is reported separately — see [`EffectManager::cancel_blackout`]).
    pub fn on_blackout_complete(&mut self, listener: impl Fn() + Send + 'static) {
        self.blackout_listeners.push(Box::new(listener));
    }

    /// Drive every active (layer, fixture) state machine forward by one
    /// tick, resolving completions via [`EffectManager::on_slot_completed`]
    /// as they occur.
    pub fn advance_tick(&mut self, now: ClockTime, events: &EventCounters, registry: &FixtureRegistry) {
        for (layer, fixture) in self.layers.active_slot_keys() {
            let home = registry.lookup(&fixture).map(|f| f.home).unwrap_or_default();
            let Some(state) = self.layers.active_mut(layer, &fixture) else {
                continue;
            };
            match engine::advance(now, state, &mut self.store, &fixture, layer, home, events) {
                AdvanceResult::Continuing => {}
                AdvanceResult::Completed { last_end_state } => {
                    if let Some(finished) = self.layers.remove_active(layer, &fixture, now) {
                        self.on_slot_completed(layer, &fixture, finished, last_end_state, now);
                    }
                }
            }
        }
    }

    pub fn cleanup_unused_layers(&mut self, now: ClockTime, idle_threshold_ms: u64) {
        self.layers.cleanup_unused_layers(now, idle_threshold_ms, &mut self.store);
    }

    /// Completion protocol (ᵃ4.F): requeue a persistent effect, hand off to
    /// any queued successor, or tear down the slot's store entry.
    ///
    /// Resolution of an edge case the specification leaves implicit: if an
    /// external caller has already queued a distinct successor for this
    /// slot, that successor wins over the just-finished effect's own
    /// self-requeue, so `set`/`add` onto a persistent effect's slot is never
    /// starved by the effect perpetually requeuing itself.
    fn on_slot_completed(
        &mut self,
        layer: u32,
        fixture: &FixtureId,
        finished: LightEffectState,
        last_end_state: Rgbio,
        now: ClockTime,
    ) {
        if !self.layers.has_queued(layer, fixture) && finished.is_persistent {
            let requeue = QueuedEffect {
                effect_name: finished.effect_name.clone(),
                transitions: finished.transitions.clone(),
                is_persistent: true,
            };
            self.layers.add_queued(layer, fixture.clone(), requeue, now);
        }
        let started_next = self.start_next_effect_in_queue(layer, fixture, Some(last_end_state), now);
        if !started_next && layer > 0 {
            self.store.remove_layer(fixture, layer);
        }
        if layer == BLACKOUT_LAYER && finished.effect_name == BLACKOUT_EFFECT_NAME {
            for listener in &self.blackout_listeners {
                listener();
            }
        }
    }

    /// Pop the queued successor for (layer, fixture), if any, and start it,
    /// seeding its continuity from `prev_last_end_state` (the just-finished
    /// effect's last color, per the queue-handoff rule).
    pub fn start_next_effect_in_queue(
        &mut self,
        layer: u32,
        fixture: &FixtureId,
        prev_last_end_state: Option<Rgbio>,
        now: ClockTime,
    ) -> bool {
        let Some(queued) = self.layers.take_queued(layer, fixture, now) else {
            return false;
        };
        let mut state = LightEffectState::new(queued.effect_name, queued.transitions, queued.is_persistent);
        state.last_end_state = prev_last_end_state;
        self.layers.add_active(layer, fixture.clone(), state, now);
        true
    }

    /// For every (layer, fixture) slot the expanded effect touches, replace
    /// any existing active effect there, carrying over its `lastEndState`
    /// for visual continuity. `clear_existing` additionally evicts every
    /// active and queued slot on each touched layer first, implementing the
    /// broader `set` semantics.
    fn install(&mut self, name: &str, effect: &Effect, persistent: bool, now: ClockTime, clear_existing: bool) {
        let grouped = transformer::group_by_layer_and_light(&effect.steps);
        if clear_existing {
            for &layer in grouped.keys() {
                self.clear_layer(layer, now);
            }
        }
        for (layer, by_fixture) in grouped {
            for (fixture, transitions) in by_fixture {
                let carried_over = self.layers.active(layer, &fixture).and_then(|s| s.last_end_state);
                let mut state = LightEffectState::new(name, Arc::new(transitions), persistent);
                state.last_end_state = carried_over;
                self.layers.add_active(layer, fixture, state, now);
            }
        }
    }

    fn touches_are_all_free(&self, effect: &Effect) -> bool {
        transformer::group_by_layer_and_light(&effect.steps)
            .iter()
            .all(|(&layer, by_fixture)| by_fixture.keys().all(|f| self.layers.is_layer_free_for_light(layer, f)))
    }

    pub fn add(&mut self, name: &str, effect: &Effect, persistent: bool, now: ClockTime) {
        self.install(name, effect, persistent, now, false);
    }

    pub fn set(&mut self, name: &str, effect: &Effect, persistent: bool, now: ClockTime) {
        self.install(name, effect, persistent, now, true);
    }

    /// Install `effect` only on slots that are currently entirely free.
    /// Returns whether the install happened.
    pub fn add_if_free(&mut self, name: &str, effect: &Effect, persistent: bool, now: ClockTime) -> bool {
        if !self.touches_are_all_free(effect) {
            return false;
        }
        self.install(name, effect, persistent, now, false);
        true
    }

    pub fn set_if_free(&mut self, name: &str, effect: &Effect, persistent: bool, now: ClockTime) -> bool {
        if !self.touches_are_all_free(effect) {
            return false;
        }
        self.install(name, effect, persistent, now, true);
        true
    }

    fn clear_layer(&mut self, layer: u32, now: ClockTime) {
        for fixture in self.layers.fixtures_on_layer(layer) {
            self.layers.remove_active(layer, &fixture, now);
            self.layers.take_queued(layer, &fixture, now);
        }
    }

    /// Evict every slot on `layer`. When `also_remove_transitions` is set,
    /// also clear the Light State Store entries for that layer, so
    /// composition stops seeing it on the very next frame.
    pub fn remove_by_layer(&mut self, layer: u32, also_remove_transitions: bool, now: ClockTime) {
        self.clear_layer(layer, now);
        if also_remove_transitions {
            for fixture in self.store.fixtures().cloned().collect::<Vec<_>>() {
                self.store.remove_layer(&fixture, layer);
            }
        }
    }

    /// Evict only the slots on `layer` whose active effect's source name
    /// matches `name`.
    pub fn remove_by_name(&mut self, name: &str, layer: u32, now: ClockTime) {
        for fixture in self.layers.fixtures_with_active_name(layer, name) {
            self.layers.remove_active(layer, &fixture, now);
            self.store.remove_layer(&fixture, layer);
        }
    }

    /// Shortcut for an immediate single-step transition on layer 0.
    pub fn set_state(&mut self, fixtures: Vec<FixtureId>, color: Rgbio, duration_ms: u64, now: ClockTime) {
        use crate::easing::Easing;
        use crate::transition::{EffectStep, WaitFor};

        let effect = Effect::new(
            "set-state",
            vec![EffectStep {
                fixtures,
                layer: 0,
                wait_for: WaitFor::None,
                target: color,
                duration_ms,
                easing: Easing::Linear,
                wait_until: WaitFor::None,
            }],
        );
        self.set(SET_STATE_EFFECT_NAME, &effect, false, now);
    }

    /// Drive every patched fixture's color to black over `duration_ms` on
    /// the reserved top layer. Cancellable with [`EffectManager::cancel_blackout`].
    pub fn blackout(&mut self, registry: &FixtureRegistry, duration_ms: u64, now: ClockTime) {
        use crate::easing::Easing;
        use crate::transition::{EffectStep, WaitFor};

        let fixtures: Vec<FixtureId> = registry.all().into_iter().map(|f| f.id).collect();
        if fixtures.is_empty() {
            warn!("blackout requested with an empty fixture registry");
        }
        let effect = Effect::new(
            "blackout",
            vec![EffectStep {
                fixtures,
                layer: BLACKOUT_LAYER,
                wait_for: WaitFor::None,
                target: Rgbio::BLACK,
                duration_ms,
                easing: Easing::Linear,
                wait_until: WaitFor::None,
            }],
        );
        self.set(BLACKOUT_EFFECT_NAME, &effect, false, now);
    }

    /// Cancel an in-flight blackout: the reserved layer is removed
    /// entirely, so composition immediately reverts to the layers beneath.
    pub fn cancel_blackout(&mut self, now: ClockTime) {
        self.remove_by_layer(BLACKOUT_LAYER, true, now);
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::color::BlendMode;
    use crate::config::{ChannelMap, FixtureId as FId, GroupConfig, RootConfig};
    use crate::easing::Easing;
    use crate::fixture::Group;
    use crate::transition::{EffectStep, WaitFor};

    fn fid(s: &str) -> FId {
        FId(s.to_string())
    }

    fn single_fixture_registry() -> FixtureRegistry {
        let config = RootConfig {
            groups: vec![GroupConfig {
                group: Group::Front,
                fixtures: vec![crate::config::FixtureConfig {
                    id: fid("f1"),
                    position: 1,
                    universe: 0,
                    channels: ChannelMap::default(),
                    home: None,
                }],
            }],
        };
        FixtureRegistry::load(&config).unwrap()
    }

    fn effect(name: &str, fixtures: Vec<FId>, layer: u32, duration_ms: u64, color: Rgbio) -> Effect {
        Effect::new(
            name,
            vec![EffectStep {
                fixtures,
                layer,
                wait_for: WaitFor::None,
                target: color,
                duration_ms,
                easing: Easing::Linear,
                wait_until: WaitFor::None,
            }],
        )
    }

    #[test]
    fn test_add_then_advance_reaches_target() {
        let mut mgr = EffectManager::new();
        let events = EventCounters::new();
        let registry = single_fixture_registry();
        let red = Rgbio::new(255, 0, 0, 255, 1.0, BlendMode::Replace);
        mgr.add("e1", &effect("e1", vec![fid("f1")], 0, 1000, red), false, 0);

        mgr.advance_tick(0, &events, &registry);
        mgr.advance_tick(1000, &events, &registry);
        let composed = mgr.store().compose(&fid("f1"), PanTilt::default());
        assert_eq!(255, composed.red);
    }

    #[test]
    fn test_add_if_free_returns_false_when_occupied() {
        let mut mgr = EffectManager::new();
        let red = Rgbio::new(255, 0, 0, 255, 1.0, BlendMode::Replace);
        assert!(mgr.add_if_free("e1", &effect("e1", vec![fid("f1")], 0, 1000, red), false, 0));
        assert!(!mgr.add_if_free("e2", &effect("e2", vec![fid("f1")], 0, 1000, red), false, 0));
    }

    #[test]
    fn test_replacing_active_effect_carries_forward_last_end_state() {
        let mut mgr = EffectManager::new();
        let events = EventCounters::new();
        let registry = single_fixture_registry();
        let red = Rgbio::new(255, 0, 0, 255, 1.0, BlendMode::Replace);
        let blue = Rgbio::new(0, 0, 255, 255, 1.0, BlendMode::Replace);
        let green = Rgbio::new(0, 255, 0, 255, 1.0, BlendMode::Replace);

        let e3 = Effect::new(
            "e3",
            vec![
                EffectStep {
                    fixtures: vec![fid("f1")],
                    layer: 2,
                    wait_for: WaitFor::None,
                    target: red,
                    duration_ms: 100,
                    easing: Easing::Linear,
                    wait_until: WaitFor::None,
                },
                EffectStep {
                    fixtures: vec![fid("f1")],
                    layer: 2,
                    wait_for: WaitFor::None,
                    target: blue,
                    duration_ms: 200,
                    easing: Easing::Linear,
                    wait_until: WaitFor::None,
                },
            ],
        );
        mgr.add("e3", &e3, false, 0);
        mgr.advance_tick(0, &events, &registry);
        // e3's first step completes at t=100; it's now mid-way into its
        // second step (still active, not yet complete).
        mgr.advance_tick(100, &events, &registry);

        mgr.add("e4", &effect("e4", vec![fid("f1")], 2, 50, green), false, 100);
        mgr.advance_tick(100, &events, &registry);

        // e4 must start from e3's lastEndState (red), not black.
        let composed = mgr.store().compose(&fid("f1"), PanTilt::default());
        assert_eq!(255, composed.red);
        assert_eq!(0, composed.green);
    }

    #[test]
    fn test_blackout_then_cancel_reverts_to_lower_layers() {
        let mut mgr = EffectManager::new();
        let events = EventCounters::new();
        let registry = single_fixture_registry();
        let red = Rgbio::new(255, 0, 0, 255, 1.0, BlendMode::Replace);

        mgr.set_state(vec![fid("f1")], red, 0, 0);
        mgr.advance_tick(0, &events, &registry);

        mgr.blackout(&registry, 1000, 0);
        mgr.advance_tick(0, &events, &registry);
        mgr.advance_tick(500, &events, &registry);

        mgr.cancel_blackout(500);
        let composed = mgr.store().compose(&fid("f1"), PanTilt::default());
        assert_eq!(255, composed.red);
        assert!(mgr.layers().is_layer_free(BLACKOUT_LAYER));
    }

    #[test]
    fn test_remove_by_name_only_evicts_matching_slots() {
        let mut mgr = EffectManager::new();
        let red = Rgbio::new(255, 0, 0, 255, 1.0, BlendMode::Replace);
        mgr.add("flare", &effect("flare", vec![fid("f1")], 1, 0, red), false, 0);
        mgr.remove_by_name("other", 1, 0);
        assert!(!mgr.layers().is_layer_free_for_light(1, &fid("f1")));
        mgr.remove_by_name("flare", 1, 0);
        assert!(mgr.layers().is_layer_free_for_light(1, &fid("f1")));
    }
}
