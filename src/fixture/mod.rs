//! The Fixture Registry: a hot-reloadable, queryable view over the patched
//! fixture configuration.
//!
//! Grounded in `fixture/patch.rs`'s split between a static profile and a
//! runtime-patched instance; here the "profile" collapses to a
//! [`config::ChannelMap`](crate::config::ChannelMap) since this crate has no
//! per-fixture-type control logic, only channel addressing.
pub mod registry;
pub mod select;

use serde::{Deserialize, Serialize};
use strum_macros::{Display, EnumString};

use crate::color::PanTilt;
use crate::config::{ChannelMap, FixtureId};

pub use registry::FixtureRegistry;
pub use select::Target;

/// The closed set of group tags a fixture can be patched under.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, Display, EnumString)]
#[strum(serialize_all = "kebab-case")]
#[serde(rename_all = "kebab-case")]
pub enum Group {
    Front,
    Back,
    Strobe,
}

/// A patched fixture as seen by selection and the output assembler: its
/// identity, its ordering key, the group it belongs to, and where its
/// capabilities land in its universe.
#[derive(Clone, Debug, PartialEq)]
pub struct Fixture {
    pub id: FixtureId,
    pub position: i64,
    pub group: Group,
    pub universe: usize,
    pub channels: ChannelMap,
    pub home: PanTilt,
}
