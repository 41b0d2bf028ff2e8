//! Target selection: the closed set of ways a cue can carve up a group of
//! fixtures, and the slicing rules each one implements.
use rand::Rng;
use serde::{Deserialize, Serialize};
use strum_macros::{Display, EnumString};

use super::Fixture;

/// One of the closed set of ways to select a subset of an ordered fixture
/// sequence. `third-N`/`quarter-N` use 1-indexed parts; `random-k` draws `k`
/// fixtures independently and uniformly, with replacement.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, Display, EnumString)]
#[strum(serialize_all = "kebab-case")]
#[serde(rename_all = "kebab-case")]
pub enum Target {
    All,
    Even,
    Odd,
    Half1,
    Half2,
    OuterHalfMajor,
    OuterHalfMinor,
    InnerHalfMajor,
    InnerHalfMinor,
    Third1,
    Third2,
    Third3,
    Quarter1,
    Quarter2,
    Quarter3,
    Quarter4,
    Linear,
    InverseLinear,
    /// Draw `k` fixtures (1..=4) independently and uniformly, with replacement.
    RandomK(u8),
}

/// Apply a single target to an already position-sorted fixture sequence.
///
/// `fixtures` must be sorted ascending by position; the result preserves
/// that order except for [`Target::InverseLinear`] (reversed) and
/// [`Target::RandomK`] (draw order) per the specification's single-target
/// ordering exception.
pub fn apply(target: Target, fixtures: &[Fixture], rng: &mut impl Rng) -> Vec<Fixture> {
    let n = fixtures.len();
    match target {
        Target::All | Target::Linear => fixtures.to_vec(),
        Target::InverseLinear => fixtures.iter().rev().cloned().collect(),
        Target::Even => indexed_subset(fixtures, |i| (i + 1) % 2 == 0),
        Target::Odd => indexed_subset(fixtures, |i| (i + 1) % 2 == 1),
        Target::Half1 => fixtures[..n.div_ceil(2)].to_vec(),
        Target::Half2 => fixtures[n.div_ceil(2)..].to_vec(),
        Target::OuterHalfMajor => outer_half(fixtures, major_k(n)),
        Target::OuterHalfMinor => outer_half(fixtures, minor_k(n)),
        Target::InnerHalfMajor => inner_half(fixtures, minor_k(n)),
        Target::InnerHalfMinor => inner_half(fixtures, major_k(n)),
        Target::Third1 => third(fixtures, 0),
        Target::Third2 => third(fixtures, 1),
        Target::Third3 => third(fixtures, 2),
        Target::Quarter1 => quarter(fixtures, 0),
        Target::Quarter2 => quarter(fixtures, 1),
        Target::Quarter3 => quarter(fixtures, 2),
        Target::Quarter4 => quarter(fixtures, 3),
        Target::RandomK(k) => random_k(fixtures, k as usize, rng),
    }
}

fn indexed_subset(fixtures: &[Fixture], keep: impl Fn(usize) -> bool) -> Vec<Fixture> {
    fixtures
        .iter()
        .enumerate()
        .filter(|(i, _)| keep(*i))
        .map(|(_, f)| f.clone())
        .collect()
}

/// `ceil(n/4)`: the per-side count for the "major" outer/inner half variant.
fn major_k(n: usize) -> usize {
    n.div_ceil(4)
}

/// `floor(n/4)`: the per-side count for the "minor" outer/inner half variant.
fn minor_k(n: usize) -> usize {
    n / 4
}

fn outer_half(fixtures: &[Fixture], k: usize) -> Vec<Fixture> {
    let n = fixtures.len();
    let k = k.min(n);
    let mut out: Vec<Fixture> = fixtures[..k].to_vec();
    out.extend(fixtures[n - k..].iter().cloned());
    // A fixture can appear in both slices only when k*2 > n (degenerate, tiny
    // groups); de-duplicate by id while preserving first occurrence.
    dedup_by_id(out)
}

fn inner_half(fixtures: &[Fixture], outer_k: usize) -> Vec<Fixture> {
    let n = fixtures.len();
    let outer_k = outer_k.min(n);
    fixtures[outer_k..n - outer_k].to_vec()
}

fn dedup_by_id(fixtures: Vec<Fixture>) -> Vec<Fixture> {
    let mut seen = std::collections::HashSet::new();
    fixtures
        .into_iter()
        .filter(|f| seen.insert(f.id.clone()))
        .collect()
}

/// Split `fixtures` into three contiguous parts and return part `which`
/// (0-indexed). `third-2` (which == 1) on an odd-length sequence short
/// circuits to exactly the median element, per the specification. Otherwise
/// the base part size is `n/3` with the remainder distributed to the
/// earlier parts, and any resulting part shorter than two elements steals
/// one element from a neighbor that can spare it.
fn third(fixtures: &[Fixture], which: usize) -> Vec<Fixture> {
    let n = fixtures.len();
    if which == 1 && n % 2 == 1 {
        return vec![fixtures[n / 2].clone()];
    }
    let (start, end) = third_parts(n)[which];
    fixtures[start..end].to_vec()
}

fn third_parts(n: usize) -> [(usize, usize); 3] {
    let base = n / 3;
    let rem = n % 3;
    let mut sizes = [base, base, base];
    for size in sizes.iter_mut().take(rem) {
        *size += 1;
    }
    let mut starts = [0usize, sizes[0], sizes[0] + sizes[1]];
    let mut ends = [starts[1], starts[2], n];

    for i in 0..3 {
        let len = ends[i] - starts[i];
        if len >= 2 {
            continue;
        }
        if i > 0 && (ends[i - 1] - starts[i - 1]) > 2 && starts[i] > 0 {
            starts[i] -= 1;
            ends[i - 1] -= 1;
        } else if i < 2 && (ends[i + 1] - starts[i + 1]) > 2 {
            ends[i] += 1;
            starts[i + 1] += 1;
        }
    }
    [(starts[0], ends[0]), (starts[1], ends[1]), (starts[2], ends[2])]
}

fn quarter(fixtures: &[Fixture], which: usize) -> Vec<Fixture> {
    let n = fixtures.len();
    let base = n / 4;
    let rem = n % 4;
    let mut sizes = [base; 4];
    for size in sizes.iter_mut().take(rem) {
        *size += 1;
    }
    let start: usize = sizes[..which].iter().sum();
    let end = start + sizes[which];
    fixtures[start..end].to_vec()
}

fn random_k(fixtures: &[Fixture], k: usize, rng: &mut impl Rng) -> Vec<Fixture> {
    if fixtures.is_empty() {
        return Vec::new();
    }
    (0..k)
        .map(|_| fixtures[rng.random_range(0..fixtures.len())].clone())
        .collect()
}
