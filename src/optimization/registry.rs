use ndarray::{ArrayD, ArrayViewD};

use super::{OptimConfig, adam, rmsprop, sgd, sgd_momentum};
use crate::Result;

/// A pure per-parameter update: `(value, gradient, config) -> (new value, new config)`.
///
/// The config is taken by value, so a rule can never alias the caller's state.
pub type UpdateRule = for<'a, 'b> fn(
    ArrayViewD<'a, f32>,
    ArrayViewD<'b, f32>,
    OptimConfig,
) -> Result<(ArrayD<f32>, OptimConfig)>;

const RULES: &[(&str, UpdateRule)] = &[
    ("sgd", sgd as UpdateRule),
    ("sgd_momentum", sgd_momentum as UpdateRule),
    ("rmsprop", rmsprop as UpdateRule),
    ("adam", adam as UpdateRule),
];

/// Looks up an update rule by name.
pub fn resolve(name: &str) -> Option<UpdateRule> {
    RULES
        .iter()
        .find(|(rule_name, _)| *rule_name == name)
        .map(|(_, rule)| *rule)
}

/// The names of every registered update rule.
pub fn rule_names() -> impl Iterator<Item = &'static str> {
    RULES.iter().map(|(name, _)| *name)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn resolves_every_registered_rule() {
        for name in rule_names() {
            assert!(resolve(name).is_some(), "{name} should resolve");
        }
    }

    #[test]
    fn unknown_rule_is_none() {
        assert!(resolve("newton").is_none());
        assert!(resolve("").is_none());
    }
}
