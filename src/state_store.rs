//! Per-(fixture, layer) current color and layer composition.
use ordermap::OrderMap;

use crate::color::{PanTilt, Rgbio};
use crate::config::FixtureId;

/// Holds the current color of every (fixture, layer) slot that has one.
/// Composition walks layers ascending per fixture, combining each into the
/// running value with [`Rgbio::compose_over`].
#[derive(Default)]
pub struct LightStateStore {
    by_fixture: OrderMap<FixtureId, OrderMap<u32, Rgbio>>,
}

impl LightStateStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(&mut self, fixture: &FixtureId, layer: u32, color: Rgbio) {
        self.by_fixture
            .entry(fixture.clone())
            .or_default()
            .insert(layer, color);
    }

    pub fn get(&self, fixture: &FixtureId, layer: u32) -> Option<Rgbio> {
        self.by_fixture.get(fixture)?.get(&layer).copied()
    }

    /// Remove the entry for one layer of one fixture. A fixture with no
    /// remaining layers is dropped entirely so `all_layers_of` returns an
    /// empty vec rather than a stale, empty inner map.
    pub fn remove_layer(&mut self, fixture: &FixtureId, layer: u32) {
        if let Some(layers) = self.by_fixture.get_mut(fixture) {
            layers.remove(&layer);
            if layers.is_empty() {
                self.by_fixture.shift_remove(fixture);
            }
        }
    }

    /// Every (layer, color) pair currently held for `fixture`, sorted
    /// ascending by layer.
    pub fn all_layers_of(&self, fixture: &FixtureId) -> Vec<(u32, Rgbio)> {
        let Some(layers) = self.by_fixture.get(fixture) else {
            return Vec::new();
        };
        let mut entries: Vec<(u32, Rgbio)> = layers.iter().map(|(l, c)| (*l, *c)).collect();
        entries.sort_by_key(|(l, _)| *l);
        entries
    }

    /// Compose every layer of `fixture` into a single color. A fixture with
    /// no layers at all composes to pure black with `home`'s pan/tilt.
    pub fn compose(&self, fixture: &FixtureId, home: PanTilt) -> Rgbio {
        let mut composed = Rgbio::BLACK;
        for (_, layer_color) in self.all_layers_of(fixture) {
            composed = composed.compose_over(&layer_color);
        }
        composed.fill_pan_tilt_default(home);
        composed
    }

    /// Drop every entry for fixtures not present in `known`, called after a
    /// configuration hot-reload per the registry-replacement contract.
    pub fn purge_unknown(&mut self, known: &std::collections::HashSet<FixtureId>) {
        self.by_fixture.retain(|id, _| known.contains(id));
    }

    /// All fixtures with at least one layer entry.
    pub fn fixtures(&self) -> impl Iterator<Item = &FixtureId> {
        self.by_fixture.keys()
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::color::BlendMode;

    fn fid(s: &str) -> FixtureId {
        FixtureId(s.to_string())
    }

    #[test]
    fn test_compose_empty_is_black_with_home() {
        let store = LightStateStore::new();
        let composed = store.compose(&fid("f1"), PanTilt { pan: 10, tilt: 20 });
        assert_eq!(0, composed.red);
        assert_eq!(Some(10), composed.pan);
        assert_eq!(Some(20), composed.tilt);
    }

    #[test]
    fn test_compose_replace_then_add() {
        let mut store = LightStateStore::new();
        store.set(
            &fid("f1"),
            0,
            Rgbio::new(255, 0, 0, 255, 1.0, BlendMode::Replace),
        );
        store.set(&fid("f1"), 3, Rgbio::new(0, 0, 128, 0, 0.5, BlendMode::Add));
        let composed = store.compose(&fid("f1"), PanTilt { pan: 0, tilt: 0 });
        assert_eq!(255, composed.red);
        assert_eq!(128, composed.blue);
        assert_eq!(0.5, composed.opacity);
    }

    #[test]
    fn test_remove_layer_drops_empty_fixture_entry() {
        let mut store = LightStateStore::new();
        store.set(&fid("f1"), 2, Rgbio::BLACK);
        store.remove_layer(&fid("f1"), 2);
        assert!(store.all_layers_of(&fid("f1")).is_empty());
        assert_eq!(0, store.fixtures().count());
    }

    #[test]
    fn test_purge_unknown() {
        let mut store = LightStateStore::new();
        store.set(&fid("f1"), 0, Rgbio::BLACK);
        store.set(&fid("f2"), 0, Rgbio::BLACK);
        let known: std::collections::HashSet<FixtureId> = [fid("f1")].into_iter().collect();
        store.purge_unknown(&known);
        assert!(store.get(&fid("f1"), 0).is_some());
        assert!(store.get(&fid("f2"), 0).is_none());
    }
}
