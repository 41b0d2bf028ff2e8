//! The closed set of easing curves usable by a transition step.
use std::f64::consts::PI;

use log::warn;
use serde::{Deserialize, Serialize};
use strum_macros::{Display, EnumIter, EnumString};

/// A named pure function tau in [0,1] -> eased in [0,1].
///
/// Every variant is monotonic non-decreasing with `f(0) == 0` and
/// `f(1) == 1`; see the `monotonic` property test below.
#[derive(
    Copy, Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize, Display, EnumIter, EnumString,
)]
#[strum(serialize_all = "kebab-case")]
#[serde(rename_all = "kebab-case")]
pub enum Easing {
    #[default]
    Linear,
    SinIn,
    SinOut,
    SinInOut,
    QuadIn,
    QuadOut,
    QuadInOut,
}

impl Easing {
    /// Apply this easing curve to `tau`, which must already be clamped to [0,1].
    pub fn apply(&self, tau: f64) -> f64 {
        match self {
            Easing::Linear => tau,
            Easing::SinIn => 1.0 - (tau * PI / 2.0).cos(),
            Easing::SinOut => (tau * PI / 2.0).sin(),
            Easing::SinInOut => -(PI * tau).cos() / 2.0 + 0.5,
            Easing::QuadIn => tau * tau,
            Easing::QuadOut => 1.0 - (1.0 - tau) * (1.0 - tau),
            Easing::QuadInOut => {
                if tau < 0.5 {
                    2.0 * tau * tau
                } else {
                    1.0 - (-2.0 * tau + 2.0).powi(2) / 2.0
                }
            }
        }
    }

    /// Parse an easing name, falling back to `Linear` and logging a warning
    /// for any name outside the closed set (the "programmer error" path of
    /// the error-handling design: never fatal).
    pub fn parse_or_default(name: &str) -> Self {
        name.parse().unwrap_or_else(|_| {
            warn!("unknown easing curve {name:?}; falling back to linear");
            Easing::Linear
        })
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use strum::IntoEnumIterator;

    #[test]
    fn test_boundary_values() {
        for easing in Easing::iter() {
            assert!(
                (easing.apply(0.0)).abs() < 1e-9,
                "{easing} f(0) should be 0"
            );
            assert!(
                (easing.apply(1.0) - 1.0).abs() < 1e-9,
                "{easing} f(1) should be 1"
            );
        }
    }

    #[test]
    fn test_monotonic() {
        const STEPS: usize = 200;
        for easing in Easing::iter() {
            let mut prev = easing.apply(0.0);
            for i in 1..=STEPS {
                let tau = i as f64 / STEPS as f64;
                let val = easing.apply(tau);
                assert!(
                    val + 1e-9 >= prev,
                    "{easing} is not monotonic at tau={tau}: {val} < {prev}"
                );
                prev = val;
            }
        }
    }

    #[test]
    fn test_unknown_name_falls_back_to_linear() {
        assert_eq!(Easing::Linear, Easing::parse_or_default("bogus"));
    }

    proptest::proptest! {
        #[test]
        fn prop_output_always_in_unit_interval(tau in 0.0f64..=1.0) {
            for easing in Easing::iter() {
                let val = easing.apply(tau);
                proptest::prop_assert!((-1e-9..=1.0 + 1e-9).contains(&val));
            }
        }
    }
}
