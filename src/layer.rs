//! The Layer Manager: owns every active and queued effect slot, keyed by
//! (layer, fixture), plus the per-layer idle bookkeeping that drives
//! teardown of overlay layers.
//!
//! Grounded in `fixture/patch.rs`'s `ordermap`-backed fixture table: slots
//! are kept in insertion order per layer so iteration order (and therefore
//! log output and test assertions) is reproducible across runs.
use std::sync::Arc;

use ordermap::OrderMap;

use crate::clock::ClockTime;
use crate::config::FixtureId;
use crate::engine::LightEffectState;
use crate::state_store::LightStateStore;
use crate::transition::TransitionStep;

/// A pending successor effect for a (layer, fixture) slot, installed when
/// the currently active effect on that slot finishes.
#[derive(Clone)]
pub struct QueuedEffect {
    pub effect_name: String,
    pub transitions: Arc<Vec<TransitionStep>>,
    pub is_persistent: bool,
}

/// Default idle duration, in milliseconds, an overlay layer (layer > 0)
/// must sit with no active or queued slots before [`LayerManager::cleanup_unused_layers`]
/// tears it down.
pub const DEFAULT_IDLE_LAYER_THRESHOLD_MS: u64 = 2_000;

type SlotMap<V> = OrderMap<u32, OrderMap<FixtureId, V>>;

/// Owns the active/queued effect tables. Layer 0 is the base layer and is
/// never torn down by [`LayerManager::cleanup_unused_layers`]; only the
/// explicit [`LayerManager::reset_layer_tracking`] removes it, and callers
/// are expected never to do that for layer 0 while a fixture exists.
#[derive(Default)]
pub struct LayerManager {
    active: SlotMap<LightEffectState>,
    queued: SlotMap<QueuedEffect>,
    last_used: OrderMap<u32, ClockTime>,
}

impl LayerManager {
    pub fn new() -> Self {
        Self::default()
    }

    /// The state currently occupying a slot, if any.
    pub fn active(&self, layer: u32, fixture: &FixtureId) -> Option<&LightEffectState> {
        self.active.get(&layer)?.get(fixture)
    }

    pub fn active_mut(&mut self, layer: u32, fixture: &FixtureId) -> Option<&mut LightEffectState> {
        self.active.get_mut(&layer)?.get_mut(fixture)
    }

    /// Every (layer, fixture) key currently holding an active state, as an
    /// owned snapshot so callers can iterate while mutating slots by key
    /// without fighting the borrow checker.
    pub fn active_slot_keys(&self) -> Vec<(u32, FixtureId)> {
        self.active
            .iter()
            .flat_map(|(layer, slots)| slots.keys().map(move |f| (*layer, f.clone())))
            .collect()
    }

    /// Insert or replace the active slot at (layer, fixture), returning the
    /// displaced state if one was present. Callers (the Effect Manager) are
    /// responsible for any "stop" semantics owed to a displaced effect
    /// before calling this.
    pub fn add_active(
        &mut self,
        layer: u32,
        fixture: FixtureId,
        state: LightEffectState,
        now: ClockTime,
    ) -> Option<LightEffectState> {
        self.touch(layer, now);
        self.active.entry(layer).or_default().insert(fixture, state)
    }

    /// Remove and return the active slot at (layer, fixture), if any.
    pub fn remove_active(&mut self, layer: u32, fixture: &FixtureId, now: ClockTime) -> Option<LightEffectState> {
        let removed = {
            let slot = self.active.get_mut(&layer)?;
            let removed = slot.shift_remove(fixture);
            if slot.is_empty() {
                self.active.shift_remove(&layer);
            }
            removed
        };
        if removed.is_some() {
            self.touch(layer, now);
        }
        removed
    }

    /// Record a pending successor for (layer, fixture). Only one queued
    /// entry per slot is kept; a newer write replaces an older one.
    pub fn add_queued(
        &mut self,
        layer: u32,
        fixture: FixtureId,
        queued: QueuedEffect,
        now: ClockTime,
    ) -> Option<QueuedEffect> {
        self.touch(layer, now);
        self.queued.entry(layer).or_default().insert(fixture, queued)
    }

    pub fn has_queued(&self, layer: u32, fixture: &FixtureId) -> bool {
        self.queued.get(&layer).is_some_and(|m| m.contains_key(fixture))
    }

    /// Pop the queued successor for (layer, fixture), if any.
    pub fn take_queued(&mut self, layer: u32, fixture: &FixtureId, now: ClockTime) -> Option<QueuedEffect> {
        let taken = {
            let slot = self.queued.get_mut(&layer)?;
            let taken = slot.shift_remove(fixture);
            if slot.is_empty() {
                self.queued.shift_remove(&layer);
            }
            taken
        };
        if taken.is_some() {
            self.touch(layer, now);
        }
        taken
    }

    /// True iff `layer` has no active or queued entries at all.
    pub fn is_layer_free(&self, layer: u32) -> bool {
        self.active.get(&layer).is_none_or(|m| m.is_empty())
            && self.queued.get(&layer).is_none_or(|m| m.is_empty())
    }

    /// True iff the (layer, fixture) slot has neither an active nor a
    /// queued entry.
    pub fn is_layer_free_for_light(&self, layer: u32, fixture: &FixtureId) -> bool {
        !self.active.get(&layer).is_some_and(|m| m.contains_key(fixture))
            && !self.queued.get(&layer).is_some_and(|m| m.contains_key(fixture))
    }

    /// Every distinct fixture with an active or queued entry on `layer`.
    pub fn fixtures_on_layer(&self, layer: u32) -> Vec<FixtureId> {
        let mut seen = std::collections::HashSet::new();
        let active = self.active.get(&layer).into_iter().flat_map(|m| m.keys());
        let queued = self.queued.get(&layer).into_iter().flat_map(|m| m.keys());
        active
            .chain(queued)
            .filter(|f| seen.insert((*f).clone()))
            .cloned()
            .collect()
    }

    /// Every fixture with an active slot on `layer` whose source effect
    /// name matches `name`.
    pub fn fixtures_with_active_name(&self, layer: u32, name: &str) -> Vec<FixtureId> {
        self.active
            .get(&layer)
            .into_iter()
            .flat_map(|m| m.iter())
            .filter(|(_, state)| state.effect_name == name)
            .map(|(f, _)| f.clone())
            .collect()
    }

    /// Tear down every layer > 0 that has been free for at least
    /// `idle_threshold_ms`, removing its entries from `store` so
    /// composition no longer sees them.
    pub fn cleanup_unused_layers(&mut self, now: ClockTime, idle_threshold_ms: u64, store: &mut LightStateStore) {
        let stale: Vec<u32> = self
            .last_used
            .iter()
            .filter(|(&layer, &last)| {
                layer > 0 && self.is_layer_free(layer) && now.saturating_sub(last) >= idle_threshold_ms
            })
            .map(|(&layer, _)| layer)
            .collect();
        for layer in stale {
            let fixtures: Vec<FixtureId> = store.fixtures().cloned().collect();
            for fixture in fixtures {
                store.remove_layer(&fixture, layer);
            }
            self.reset_layer_tracking(layer);
        }
    }

    /// Immediately drop every entry for `layer`, bypassing the idle
    /// threshold. Does not touch the Light State Store; callers that also
    /// want transitions cleared do so explicitly.
    pub fn reset_layer_tracking(&mut self, layer: u32) {
        self.active.shift_remove(&layer);
        self.queued.shift_remove(&layer);
        self.last_used.shift_remove(&layer);
    }

    fn touch(&mut self, layer: u32, now: ClockTime) {
        self.last_used.insert(layer, now);
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::easing::Easing;
    use crate::transition::WaitFor;

    fn fid(s: &str) -> FixtureId {
        FixtureId(s.to_string())
    }

    fn state(name: &str) -> LightEffectState {
        let transitions = Arc::new(vec![TransitionStep {
            layer: 0,
            wait_for: WaitFor::None,
            target: crate::color::Rgbio::BLACK,
            duration_ms: 0,
            easing: Easing::Linear,
            wait_until: WaitFor::None,
        }]);
        LightEffectState::new(name, transitions, false)
    }

    #[test]
    fn test_add_active_then_remove_round_trips_to_empty() {
        let mut layers = LayerManager::new();
        layers.add_active(2, fid("f1"), state("e1"), 0);
        assert!(!layers.is_layer_free(2));
        layers.remove_active(2, &fid("f1"), 1);
        assert!(layers.is_layer_free(2));
    }

    #[test]
    fn test_remove_by_layer_then_add_active_matches_single_add() {
        let mut fresh = LayerManager::new();
        fresh.add_active(1, fid("f1"), state("e1"), 0);

        let mut roundtrip = LayerManager::new();
        roundtrip.add_active(1, fid("f1"), state("stale"), 0);
        roundtrip.reset_layer_tracking(1);
        roundtrip.add_active(1, fid("f1"), state("e1"), 0);

        assert_eq!(
            fresh.active(1, &fid("f1")).unwrap().effect_name,
            roundtrip.active(1, &fid("f1")).unwrap().effect_name
        );
        assert_eq!(fresh.is_layer_free(1), roundtrip.is_layer_free(1));
    }

    #[test]
    fn test_queued_replaces_older_entry() {
        let mut layers = LayerManager::new();
        let q1 = QueuedEffect {
            effect_name: "a".into(),
            transitions: Arc::new(vec![]),
            is_persistent: false,
        };
        let q2 = QueuedEffect {
            effect_name: "b".into(),
            transitions: Arc::new(vec![]),
            is_persistent: false,
        };
        layers.add_queued(0, fid("f1"), q1, 0);
        layers.add_queued(0, fid("f1"), q2, 1);
        let taken = layers.take_queued(0, &fid("f1"), 2).unwrap();
        assert_eq!("b", taken.effect_name);
        assert!(layers.take_queued(0, &fid("f1"), 3).is_none());
    }

    #[test]
    fn test_cleanup_unused_layers_respects_idle_threshold() {
        let mut layers = LayerManager::new();
        let mut store = LightStateStore::new();
        layers.add_active(3, fid("f1"), state("e1"), 0);
        store.set(&fid("f1"), 3, crate::color::Rgbio::BLACK);
        layers.remove_active(3, &fid("f1"), 100);

        layers.cleanup_unused_layers(1_500, 2_000, &mut store);
        assert!(store.get(&fid("f1"), 3).is_some(), "should not clean up before threshold");

        layers.cleanup_unused_layers(2_200, 2_000, &mut store);
        assert!(store.get(&fid("f1"), 3).is_none(), "should clean up once idle past threshold");
    }

    #[test]
    fn test_cleanup_never_tears_down_layer_zero() {
        let mut layers = LayerManager::new();
        let mut store = LightStateStore::new();
        layers.add_active(0, fid("f1"), state("e1"), 0);
        layers.remove_active(0, &fid("f1"), 0);
        layers.cleanup_unused_layers(100_000, 1, &mut store);
        // Layer 0 tracking may be pruned from last_used bookkeeping, but
        // cleanup must never attempt to clear its store entries; assert
        // indirectly by confirming no panic and the store is untouched
        // (empty to begin with, so this just documents the guard exists).
        assert!(store.fixtures().next().is_none());
    }

    #[test]
    fn test_fixtures_with_active_name() {
        let mut layers = LayerManager::new();
        layers.add_active(0, fid("f1"), state("flare"), 0);
        layers.add_active(0, fid("f2"), state("chorus"), 0);
        assert_eq!(vec![fid("f1")], layers.fixtures_with_active_name(0, "flare"));
    }
}
