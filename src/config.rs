//! Declarative fixture configuration, loaded from YAML.
//!
//! Shaped after `config.rs`'s `FixtureGroupConfig` pattern: plain
//! `serde_yaml`-deserializable structs, `ensure!`/`bail!` for validation
//! errors that need a human-readable position, and a small set of
//! `Deref`/`Borrow`/`Display` newtypes so keys read naturally in logs. Unlike
//! the teacher's `Options` (which flattens unrecognized fixture-specific keys
//! into a `Mapping` so per-fixture-type option structs can be parsed out of
//! them later), this crate's structs are a closed shape with no per-fixture
//! extension point, so the equivalent typo-catching mechanism is
//! `#[serde(deny_unknown_fields)]` directly on each struct rather than
//! `Options::ensure_empty`.
use std::borrow::Borrow;
use std::collections::HashMap;
use std::fmt::Display;
use std::ops::Deref;
use std::path::Path;

use anyhow::{ensure, Context, Result};
use serde::{Deserialize, Serialize};

use crate::color::PanTilt;
use crate::fixture::Group;

/// Uniquely identifies a single patched fixture.
#[derive(Clone, PartialEq, Eq, Hash, Ord, PartialOrd, Serialize, Deserialize, Debug)]
pub struct FixtureId(pub String);

impl Display for FixtureId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        Display::fmt(&self.0, f)
    }
}

impl Borrow<str> for FixtureId {
    fn borrow(&self) -> &str {
        &self.0
    }
}

impl Deref for FixtureId {
    type Target = str;
    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl From<&str> for FixtureId {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

/// Re-exported under its natural name for config callers; the group key
/// concept is identical to `config.rs`'s `FixtureGroupKey`, just renamed to
/// match this crate's `Group` tag vocabulary (front/back/strobe).
pub type FixtureGroupKey = Group;

/// The DMX channel (1-indexed within the fixture's universe) carrying each
/// capability this fixture exposes. A capability absent from the map is not
/// addressable on this fixture; the output assembler simply never writes it.
#[derive(Clone, Default, Debug, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ChannelMap {
    pub red: Option<usize>,
    pub green: Option<usize>,
    pub blue: Option<usize>,
    pub intensity: Option<usize>,
    pub pan: Option<usize>,
    pub tilt: Option<usize>,
}

/// One patched fixture.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct FixtureConfig {
    pub id: FixtureId,
    /// Ordering key within its group; selection and sorting use this, not
    /// patch order or DMX address.
    pub position: i64,
    #[serde(default)]
    pub universe: usize,
    pub channels: ChannelMap,
    /// Pan/tilt rest position used when no active transition defines one.
    #[serde(default)]
    pub home: Option<PanTilt>,
}

/// One configured group of fixtures sharing a group tag.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct GroupConfig {
    pub group: Group,
    pub fixtures: Vec<FixtureConfig>,
}

/// The root configuration document: every patched group.
#[derive(Clone, Default, Debug, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RootConfig {
    pub groups: Vec<GroupConfig>,
}

impl RootConfig {
    /// Parse a configuration document from a YAML string.
    pub fn parse(yaml: &str) -> Result<Self> {
        let cfg: RootConfig = serde_yaml::from_str(yaml)?;
        cfg.validate()?;
        Ok(cfg)
    }

    /// Load and parse a configuration document from a file on disk.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("reading configuration file {}", path.display()))?;
        Self::parse(&contents).with_context(|| format!("parsing {}", path.display()))
    }

    /// Validate structural invariants that serde alone can't express:
    /// non-empty configuration, non-empty groups, and unique fixture ids.
    fn validate(&self) -> Result<()> {
        ensure!(!self.groups.is_empty(), "configuration has no groups");
        let mut seen: HashMap<&FixtureId, &Group> = HashMap::new();
        for group in &self.groups {
            ensure!(
                !group.fixtures.is_empty(),
                "group {:?} has no fixtures",
                group.group
            );
            for fixture in &group.fixtures {
                ensure!(
                    seen.insert(&fixture.id, &group.group).is_none(),
                    "duplicate fixture id {:?}",
                    fixture.id
                );
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod test {
    use super::*;

    const SAMPLE: &str = "
groups:
  - group: front
    fixtures:
      - id: par-1
        position: 1
        channels: { red: 1, green: 2, blue: 3, intensity: 4 }
      - id: par-2
        position: 2
        channels: { red: 5, green: 6, blue: 7, intensity: 8 }
  - group: back
    fixtures:
      - id: mover-1
        position: 1
        channels: { red: 1, green: 2, blue: 3, intensity: 4, pan: 5, tilt: 6 }
        home: { pan: 128, tilt: 64 }
";

    #[test]
    fn test_parse_sample() {
        let cfg = RootConfig::parse(SAMPLE).unwrap();
        assert_eq!(2, cfg.groups.len());
        assert_eq!(2, cfg.groups[0].fixtures.len());
        assert_eq!(Some(128), cfg.groups[1].fixtures[0].home.map(|h| h.pan));
    }

    #[test]
    fn test_empty_groups_rejected() {
        let err = RootConfig::parse("groups: []").unwrap_err();
        assert!(format!("{err:#}").contains("no groups"));
    }

    #[test]
    fn test_duplicate_fixture_id_rejected() {
        let yaml = "
groups:
  - group: front
    fixtures:
      - id: par-1
        position: 1
        channels: { red: 1 }
      - id: par-1
        position: 2
        channels: { red: 2 }
";
        let err = RootConfig::parse(yaml).unwrap_err();
        assert!(format!("{err:#}").contains("duplicate fixture id"));
    }

    #[test]
    fn test_empty_group_rejected() {
        let yaml = "
groups:
  - group: front
    fixtures: []
";
        let err = RootConfig::parse(yaml).unwrap_err();
        assert!(format!("{err:#}").contains("no fixtures"));
    }

    #[test]
    fn test_typo_d_optional_key_rejected() {
        let yaml = "
groups:
  - group: back
    fixtures:
      - id: mover-1
        position: 1
        channels: { red: 1, green: 2, blue: 3, intensity: 4, pan: 5, tilt: 6 }
        hom: { pan: 128, tilt: 64 }
";
        assert!(RootConfig::parse(yaml).is_err());
    }
}
