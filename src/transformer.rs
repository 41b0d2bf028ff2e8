//! The Effect Transformer: pure, stateless expansion of author-level
//! [`EffectStep`]s into per-fixture transition streams.
use ordermap::OrderMap;

use crate::config::FixtureId;
use crate::transition::{Effect, EffectStep, TransitionStep};

/// Expand every step targeting N fixtures into N identical per-fixture
/// transitions, preserving the original step order. Idempotent: re-running
/// this over an already-expanded stream (one fixture per step) returns the
/// same pairs in the same order.
pub fn expand_by_light(steps: &[EffectStep]) -> Vec<(FixtureId, TransitionStep)> {
    steps
        .iter()
        .flat_map(|step| {
            let transition = TransitionStep::from(step);
            step.fixtures
                .iter()
                .cloned()
                .map(move |fixture| (fixture, transition.clone()))
        })
        .collect()
}

/// Group an expanded transition stream by layer, then by fixture, keeping
/// each fixture's steps in their original authored order.
pub fn group_by_layer_and_light(steps: &[EffectStep]) -> OrderMap<u32, OrderMap<FixtureId, Vec<TransitionStep>>> {
    let mut grouped: OrderMap<u32, OrderMap<FixtureId, Vec<TransitionStep>>> = OrderMap::new();
    for (fixture, transition) in expand_by_light(steps) {
        grouped
            .entry(transition.layer)
            .or_default()
            .entry(fixture)
            .or_default()
            .push(transition);
    }
    grouped
}

/// Re-expand an already-expanded effect's steps (one fixture per step) back
/// through [`expand_by_light`], for the idempotence property in the
/// testable-properties list.
pub fn reexpand(effect: &Effect) -> Vec<(FixtureId, TransitionStep)> {
    expand_by_light(&effect.steps)
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::color::{BlendMode, Rgbio};
    use crate::easing::Easing;
    use crate::transition::WaitFor;

    fn fid(s: &str) -> FixtureId {
        FixtureId(s.to_string())
    }

    fn step(fixtures: Vec<FixtureId>, layer: u32) -> EffectStep {
        EffectStep {
            fixtures,
            layer,
            wait_for: WaitFor::None,
            target: Rgbio::new(255, 0, 0, 255, 1.0, BlendMode::Replace),
            duration_ms: 500,
            easing: Easing::Linear,
            wait_until: WaitFor::None,
        }
    }

    #[test]
    fn test_expand_by_light_one_copy_per_fixture() {
        let steps = vec![step(vec![fid("f1"), fid("f2")], 0)];
        let expanded = expand_by_light(&steps);
        assert_eq!(2, expanded.len());
        assert_eq!(fid("f1"), expanded[0].0);
        assert_eq!(fid("f2"), expanded[1].0);
    }

    #[test]
    fn test_group_by_layer_and_light_preserves_order() {
        let steps = vec![
            step(vec![fid("f1")], 0),
            step(vec![fid("f1"), fid("f2")], 1),
        ];
        let grouped = group_by_layer_and_light(&steps);
        assert_eq!(1, grouped[&0][&fid("f1")].len());
        assert_eq!(1, grouped[&0].len());
        assert_eq!(2, grouped[&1].len());
    }

    #[test]
    fn test_expansion_is_idempotent() {
        let steps = vec![step(vec![fid("f1"), fid("f2")], 0)];
        let once = expand_by_light(&steps);

        // Build a new effect whose steps already target one fixture each,
        // as `once` does, and expand it again.
        let already_expanded: Vec<EffectStep> = once
            .iter()
            .map(|(fixture, transition)| EffectStep {
                fixtures: vec![fixture.clone()],
                layer: transition.layer,
                wait_for: transition.wait_for,
                target: transition.target,
                duration_ms: transition.duration_ms,
                easing: transition.easing,
                wait_until: transition.wait_until,
            })
            .collect();
        let effect = Effect::new("e", already_expanded);
        let twice = reexpand(&effect);

        assert_eq!(once.len(), twice.len());
        for ((f1, t1), (f2, t2)) in once.iter().zip(twice.iter()) {
            assert_eq!(f1, f2);
            assert_eq!(t1, t2);
        }
    }
}
