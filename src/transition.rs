//! The effect data model: author-level effects and the per-fixture
//! transition steps they expand into.
use serde::{Deserialize, Serialize};
use strum_macros::{Display, EnumString};

use crate::color::Rgbio;
use crate::config::FixtureId;
use crate::easing::Easing;

/// The closed set of external event kinds a wait can gate on.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize, Display, EnumString)]
#[strum(serialize_all = "kebab-case")]
#[serde(rename_all = "kebab-case")]
pub enum EventKind {
    Beat,
    Measure,
    Keyframe,
    DrumRed,
    DrumYellow,
    DrumBlue,
    DrumGreen,
    DrumKick,
    GuitarNote,
    BassNote,
    KeysNote,
}

/// A pre- or post-transition gate. `Event` with `count == 0` collapses to
/// `None` at construction time (the open question in the design notes:
/// this crate picks "count = 0 means no gate" over "fire on next event").
#[derive(Copy, Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum WaitFor {
    None,
    Delay(u64),
    Event { kind: EventKind, count: u32 },
}

impl WaitFor {
    /// Normalize `Event { count: 0, .. }` down to `None`.
    pub fn normalized(self) -> Self {
        match self {
            WaitFor::Event { count: 0, .. } => WaitFor::None,
            other => other,
        }
    }
}

/// One author-level step: targets a set of fixtures, which the Effect
/// Transformer expands to one [`TransitionStep`] per fixture.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct EffectStep {
    pub fixtures: Vec<FixtureId>,
    pub layer: u32,
    pub wait_for: WaitFor,
    pub target: Rgbio,
    pub duration_ms: u64,
    pub easing: Easing,
    pub wait_until: WaitFor,
}

/// One expanded, single-fixture transition step: everything an
/// [`EffectStep`] carries, minus the fixture list it was expanded from.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct TransitionStep {
    pub layer: u32,
    pub wait_for: WaitFor,
    pub target: Rgbio,
    pub duration_ms: u64,
    pub easing: Easing,
    pub wait_until: WaitFor,
}

impl From<&EffectStep> for TransitionStep {
    fn from(step: &EffectStep) -> Self {
        TransitionStep {
            layer: step.layer,
            wait_for: step.wait_for.normalized(),
            target: step.target,
            duration_ms: step.duration_ms,
            easing: step.easing,
            wait_until: step.wait_until.normalized(),
        }
    }
}

/// An authored effect: an ordered sequence of steps, targeting whichever
/// fixtures each step names.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Effect {
    pub description: String,
    pub steps: Vec<EffectStep>,
}

impl Effect {
    pub fn new(description: impl Into<String>, steps: Vec<EffectStep>) -> Self {
        Self {
            description: description.into(),
            steps,
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_event_wait_count_zero_normalizes_to_none() {
        let wait = WaitFor::Event {
            kind: EventKind::Beat,
            count: 0,
        }
        .normalized();
        assert_eq!(WaitFor::None, wait);
    }

    #[test]
    fn test_event_wait_count_nonzero_preserved() {
        let wait = WaitFor::Event {
            kind: EventKind::Beat,
            count: 2,
        }
        .normalized();
        assert_eq!(
            WaitFor::Event {
                kind: EventKind::Beat,
                count: 2
            },
            wait
        );
    }
}
