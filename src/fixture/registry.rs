//! Hot-reloadable, memoized fixture lookup and target selection.
//!
//! Grounded in `zero_configure`-style hot patch replacement in the teacher
//! (swapping a running show's patch without tearing down the controller):
//! here an [`arc_swap::ArcSwap`] holds the current configuration snapshot so
//! [`FixtureRegistry::replace`] can publish a new one while ticks in flight
//! keep reading the old one to completion.
use std::collections::HashMap;
use std::sync::Mutex;

use arc_swap::ArcSwap;
use ordermap::OrderMap;
use rand::Rng;

use crate::config::{FixtureId, RootConfig};
use crate::error::SequencerError;

use super::select::{apply, Target};
use super::{Fixture, Group};

struct Inner {
    by_id: OrderMap<FixtureId, Fixture>,
    /// Fixtures in each configured group, pre-sorted ascending by position.
    by_group: OrderMap<Group, Vec<Fixture>>,
}

/// A key memoized selections are cached under. Deliberately excludes any
/// query containing [`Target::RandomK`]: those are never memoized since
/// their result is different every call by design.
type CacheKey = (Vec<Group>, Vec<Target>);

/// Queryable view over the patched fixture configuration. Cheap to clone
/// (an `Arc` underneath); callers share one instance across threads.
pub struct FixtureRegistry {
    inner: ArcSwap<Inner>,
    cache: Mutex<HashMap<CacheKey, Vec<FixtureId>>>,
}

impl FixtureRegistry {
    /// Build a registry from an already-validated configuration document.
    pub fn load(config: &RootConfig) -> Result<Self, SequencerError> {
        Ok(Self {
            inner: ArcSwap::from_pointee(build_inner(config)?),
            cache: Mutex::new(HashMap::new()),
        })
    }

    /// Atomically replace the patched configuration. In-flight reads of the
    /// previous configuration (e.g. a selection mid-tick) are unaffected;
    /// the memoization cache is cleared since position keys may have moved.
    pub fn replace(&self, config: &RootConfig) -> Result<(), SequencerError> {
        let inner = build_inner(config)?;
        self.inner.store(std::sync::Arc::new(inner));
        self.cache.lock().unwrap().clear();
        Ok(())
    }

    /// Look up a single fixture by id.
    pub fn lookup(&self, id: &str) -> Option<Fixture> {
        self.inner.load().by_id.get(id).cloned()
    }

    /// Every patched fixture, in no particular order. Used by the Output
    /// Assembler, which composes every fixture regardless of selection, and
    /// by `blackout`, which targets the entire patch.
    pub fn all(&self) -> Vec<Fixture> {
        self.inner.load().by_id.values().cloned().collect()
    }

    /// Resolve a query (a set of groups and a set of targets) to the
    /// deduplicated, position-sorted set of matching fixtures.
    ///
    /// A single target's natural ordering (e.g. `inverse-linear` reversed,
    /// `random-k` draw order) is preserved only when exactly one target is
    /// requested; composing multiple targets always re-sorts the union by
    /// position, per the selection composability rule.
    pub fn select(&self, groups: &[Group], targets: &[Target]) -> Result<Vec<Fixture>, SequencerError> {
        let inner = self.inner.load();
        if !groups.iter().any(|g| inner.by_group.contains_key(g)) {
            return Err(SequencerError::NoMatchingGroups);
        }

        let cacheable = targets.iter().all(|t| !matches!(t, Target::RandomK(_)));
        let key = cacheable.then(|| canonical_key(groups, targets));
        if let Some(key) = &key {
            if let Some(ids) = self.cache.lock().unwrap().get(key) {
                return Ok(ids
                    .iter()
                    .filter_map(|id| inner.by_id.get(id).cloned())
                    .collect());
            }
        }

        let base: Vec<Fixture> = {
            let mut fixtures: Vec<Fixture> = groups
                .iter()
                .filter_map(|g| inner.by_group.get(g))
                .flatten()
                .cloned()
                .collect();
            fixtures.sort_by_key(|f| f.position);
            fixtures
        };

        let mut rng = rand::rng();
        let result = if targets.len() == 1 {
            apply(targets[0], &base, &mut rng)
        } else {
            let mut seen = std::collections::HashSet::new();
            let mut union: Vec<Fixture> = targets
                .iter()
                .flat_map(|t| apply(*t, &base, &mut rng))
                .filter(|f| seen.insert(f.id.clone()))
                .collect();
            union.sort_by_key(|f| f.position);
            union
        };

        if let Some(key) = key {
            let ids = result.iter().map(|f| f.id.clone()).collect();
            self.cache.lock().unwrap().insert(key, ids);
        }
        Ok(result)
    }
}

fn canonical_key(groups: &[Group], targets: &[Target]) -> CacheKey {
    let mut groups = groups.to_vec();
    groups.sort();
    groups.dedup();
    let mut targets = targets.to_vec();
    targets.sort();
    targets.dedup();
    (groups, targets)
}

fn build_inner(config: &RootConfig) -> Result<Inner, SequencerError> {
    if config.groups.is_empty() {
        return Err(SequencerError::EmptyConfiguration);
    }
    let mut by_id = OrderMap::new();
    let mut by_group = OrderMap::new();
    for group_config in &config.groups {
        if group_config.fixtures.is_empty() {
            return Err(SequencerError::EmptyGroup(group_config.group));
        }
        let mut fixtures: Vec<Fixture> = Vec::with_capacity(group_config.fixtures.len());
        for fc in &group_config.fixtures {
            if by_id.contains_key(&fc.id) {
                return Err(SequencerError::DuplicateFixture(fc.id.clone()));
            }
            let fixture = Fixture {
                id: fc.id.clone(),
                position: fc.position,
                group: group_config.group,
                universe: fc.universe,
                channels: fc.channels.clone(),
                home: fc.home.unwrap_or(crate::color::PanTilt { pan: 0, tilt: 0 }),
            };
            by_id.insert(fixture.id.clone(), fixture.clone());
            fixtures.push(fixture);
        }
        fixtures.sort_by_key(|f| f.position);
        by_group.insert(group_config.group, fixtures);
    }
    Ok(Inner { by_id, by_group })
}
