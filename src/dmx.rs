//! DMX addressing primitives shared by the fixture registry and output assembler.
use std::{fmt::Display, ops::Add};

use anyhow::{ensure, Result};
use serde::{Deserialize, Serialize};

/// The number of channels in a single DMX512 universe.
pub const UNIVERSE_SIZE: usize = 512;

/// A DMX address, indexed from 1.
///
/// We don't check that the value is valid at parse time, as this makes
/// deserializing into an untagged config enum fail with an obscure message.
/// Validate downstream with [`DmxAddr::validate`].
#[derive(Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord, Hash, Copy, Clone, Debug)]
pub struct DmxAddr(usize);

impl DmxAddr {
    pub fn new(addr: usize) -> Self {
        Self(addr)
    }

    /// Get the DMX buffer index of this address (indexed from 0).
    pub fn dmx_index(&self) -> usize {
        self.0 - 1
    }

    /// Ensure this address is in range.
    pub fn validate(&self) -> Result<()> {
        ensure!(
            (1..=UNIVERSE_SIZE).contains(&self.0),
            "invalid DMX address {}",
            self.0
        );
        Ok(())
    }
}

impl Display for DmxAddr {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl Add<usize> for DmxAddr {
    type Output = DmxAddr;
    fn add(self, rhs: usize) -> Self::Output {
        Self(self.0 + rhs)
    }
}

/// A data buffer for one DMX universe. Channels are indexed from 0 here;
/// the physical DMX address of buffer index `i` is `i + 1`.
pub type DmxBuffer = [u8; UNIVERSE_SIZE];

/// Index into the DMX universes a show is patched across.
pub type UniverseIdx = usize;
