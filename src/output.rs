//! The Output Assembler: composes every patched fixture's current layer
//! stack into per-universe DMX buffers.
use log::warn;
use ordermap::OrderMap;

use crate::color::Rgbio;
use crate::config::ChannelMap;
use crate::dmx::{DmxAddr, DmxBuffer, UniverseIdx};
use crate::fixture::FixtureRegistry;
use crate::state_store::LightStateStore;

/// Stateless: every call recomputes every universe from scratch out of the
/// Light State Store and the current patch. Cadence (every tick vs a
/// decoupled frame rate) is a caller decision; this assembler makes none.
pub struct OutputAssembler;

impl OutputAssembler {
    /// Compose every patched fixture and write its channels into the buffer
    /// for its configured universe. Universes with no patched fixtures are
    /// omitted; within a universe, unpatched channel slots stay at zero.
    pub fn assemble(store: &LightStateStore, registry: &FixtureRegistry) -> OrderMap<UniverseIdx, DmxBuffer> {
        let mut universes: OrderMap<UniverseIdx, DmxBuffer> = OrderMap::new();
        let mut fixtures = registry.all();
        fixtures.sort_by_key(|f| f.position);

        for fixture in &fixtures {
            let composed = store.compose(&fixture.id, fixture.home);
            let buffer = universes.entry(fixture.universe).or_insert([0u8; crate::dmx::UNIVERSE_SIZE]);
            write_fixture(buffer, &fixture.channels, &composed, &fixture.id);
        }
        universes
    }
}

fn write_fixture(buffer: &mut DmxBuffer, channels: &ChannelMap, color: &Rgbio, fixture_id: &crate::config::FixtureId) {
    write_channel(buffer, channels.red, color.red, fixture_id, "red");
    write_channel(buffer, channels.green, color.green, fixture_id, "green");
    write_channel(buffer, channels.blue, color.blue, fixture_id, "blue");
    write_channel(buffer, channels.intensity, color.intensity, fixture_id, "intensity");
    write_channel(buffer, channels.pan, color.pan.unwrap_or(0), fixture_id, "pan");
    write_channel(buffer, channels.tilt, color.tilt.unwrap_or(0), fixture_id, "tilt");
}

fn write_channel(
    buffer: &mut DmxBuffer,
    slot: Option<usize>,
    value: u8,
    fixture_id: &crate::config::FixtureId,
    name: &str,
) {
    let Some(addr) = slot else { return };
    let addr = DmxAddr::new(addr);
    match addr.validate() {
        Ok(()) => buffer[addr.dmx_index()] = value,
        Err(err) => warn!("fixture {fixture_id} {name} channel {addr}: {err}"),
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::color::BlendMode;
    use crate::config::{FixtureId, RootConfig};

    const SAMPLE: &str = "
groups:
  - group: front
    fixtures:
      - id: par-1
        position: 1
        universe: 0
        channels: { red: 1, green: 2, blue: 3, intensity: 4 }
      - id: mover-1
        position: 2
        universe: 1
        channels: { red: 1, pan: 2, tilt: 3 }
        home: { pan: 128, tilt: 64 }
";

    fn registry() -> FixtureRegistry {
        let config = RootConfig::parse(SAMPLE).unwrap();
        FixtureRegistry::load(&config).unwrap()
    }

    #[test]
    fn test_assemble_writes_channels_per_universe() {
        let reg = registry();
        let mut store = LightStateStore::default();
        store.set(
            &FixtureId("par-1".into()),
            0,
            Rgbio::new(255, 10, 20, 30, 1.0, BlendMode::Replace),
        );

        let universes = OutputAssembler::assemble(&store, &reg);
        assert_eq!(2, universes.len());
        let u0 = &universes[&0];
        assert_eq!(255, u0[0]);
        assert_eq!(10, u0[1]);
        assert_eq!(20, u0[2]);
        assert_eq!(30, u0[3]);
    }

    #[test]
    fn test_assemble_fills_pan_tilt_from_home_when_unset() {
        let reg = registry();
        let store = LightStateStore::default();
        let universes = OutputAssembler::assemble(&store, &reg);
        let u1 = &universes[&1];
        assert_eq!(128, u1[1]);
        assert_eq!(64, u1[2]);
    }

    #[test]
    fn test_assemble_writes_composed_color_regardless_of_opacity() {
        // Opacity governs how a layer blends into the composed value (see
        // `Rgbio::compose_over`); once composed, the resulting color is
        // written to the universe verbatim, not scaled a second time.
        let reg = registry();
        let mut store = LightStateStore::default();
        store.set(
            &FixtureId("par-1".into()),
            0,
            Rgbio::new(200, 0, 0, 0, 0.5, BlendMode::Replace),
        );
        let universes = OutputAssembler::assemble(&store, &reg);
        assert_eq!(200, universes[&0][0]);
    }

    #[test]
    fn test_unpatched_channels_default_to_zero() {
        let reg = registry();
        let store = LightStateStore::default();
        let universes = OutputAssembler::assemble(&store, &reg);
        // par-1 has no pan/tilt channels configured at all.
        assert_eq!(0, universes[&0][10]);
    }
}
