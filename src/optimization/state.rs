use std::collections::BTreeMap;

use log::debug;

use super::{OptimConfig, UpdateRule, resolve};
use crate::{ParamStore, Result, SolverErr};

/// Owns one `OptimConfig` per model parameter and applies the update rule to all of
/// them on every step.
///
/// The set of parameter names is fixed when the state is created; configs evolve
/// independently of one another.
#[derive(Debug, Clone)]
pub struct OptimizerState {
    rule_name: String,
    rule: UpdateRule,
    configs: BTreeMap<String, OptimConfig>,
}

impl OptimizerState {
    /// Creates a new `OptimizerState`.
    ///
    /// # Arguments
    /// * `rule_name` - The registered name of the update rule.
    /// * `template` - The config every parameter starts from, copied per parameter.
    /// * `params` - The parameters to keep state for.
    ///
    /// # Returns
    /// An error if `rule_name` isn't a registered update rule.
    pub fn new(rule_name: &str, template: &OptimConfig, params: &ParamStore) -> Result<Self> {
        let rule =
            resolve(rule_name).ok_or_else(|| SolverErr::UnknownUpdateRule(rule_name.to_string()))?;

        let mut state = Self {
            rule_name: rule_name.to_string(),
            rule,
            configs: BTreeMap::new(),
        };

        state.reset(template, params);
        Ok(state)
    }

    /// Discards all per-parameter state, starting every parameter from `template` again.
    pub fn reset(&mut self, template: &OptimConfig, params: &ParamStore) {
        self.configs = params
            .keys()
            .map(|name| (name.clone(), template.clone()))
            .collect();
    }

    pub fn rule_name(&self) -> &str {
        &self.rule_name
    }

    pub fn configs(&self) -> &BTreeMap<String, OptimConfig> {
        &self.configs
    }

    /// Returns the config of a single parameter.
    pub fn config(&self, name: &str) -> Option<&OptimConfig> {
        self.configs.get(name)
    }

    /// Replaces every config with previously saved ones.
    ///
    /// # Returns
    /// An error if `configs` doesn't hold exactly the same parameter names.
    pub fn restore(&mut self, configs: BTreeMap<String, OptimConfig>) -> Result<()> {
        if configs.len() != self.configs.len() {
            return Err(SolverErr::LengthMismatch {
                what: "optimizer configs",
                got: configs.len(),
                expected: self.configs.len(),
            });
        }

        if let Some(name) = configs.keys().find(|name| !self.configs.contains_key(*name)) {
            return Err(SolverErr::UnknownParam(name.clone()));
        }

        self.configs = configs;
        Ok(())
    }

    /// Applies one update to every parameter.
    ///
    /// All gradients are checked against their parameters before anything is
    /// modified, so a malformed gradient map leaves both the parameters and the
    /// configs untouched.
    ///
    /// # Arguments
    /// * `params` - The model's parameters, updated in place.
    /// * `grads` - One gradient per parameter.
    pub fn step(&mut self, params: &mut ParamStore, grads: &ParamStore) -> Result<()> {
        if params.len() != self.configs.len() {
            return Err(SolverErr::LengthMismatch {
                what: "parameters",
                got: params.len(),
                expected: self.configs.len(),
            });
        }

        for (name, value) in params.iter() {
            if !self.configs.contains_key(name) {
                return Err(SolverErr::UnknownParam(name.clone()));
            }

            let grad = grads
                .get(name)
                .ok_or_else(|| SolverErr::MissingGradient(name.clone()))?;

            if grad.shape() != value.shape() {
                return Err(SolverErr::ShapeMismatch {
                    param: name.clone(),
                    got: grad.shape().to_vec(),
                    expected: value.shape().to_vec(),
                });
            }
        }

        for (name, value) in params.iter_mut() {
            let (Some(slot), Some(grad)) = (self.configs.get_mut(name), grads.get(name)) else {
                return Err(SolverErr::UnknownParam(name.clone()));
            };

            let config = std::mem::take(slot);
            let (next_value, next_config) = (self.rule)(value.view(), grad.view(), config)
                .map_err(|e| match e {
                    SolverErr::ShapeMismatch { got, expected, .. } => SolverErr::ShapeMismatch {
                        param: name.clone(),
                        got,
                        expected,
                    },
                    other => other,
                })?;

            *value = next_value;
            *slot = next_config;
        }

        Ok(())
    }

    /// Multiplies every parameter's learning rate by `factor`.
    pub fn decay_learning_rate(&mut self, factor: f32) {
        for config in self.configs.values_mut() {
            config.learning_rate *= factor;
        }

        debug!(factor = factor; "decayed learning rates");
    }
}
