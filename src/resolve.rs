use serde_yaml::Value;

use crate::key::{ResolvedKey, ResolvedMap};

pub const WILDCARD: &str = "*";

/// Selects values from a subtree for one environment/configuration pair.
#[derive(Debug, Clone, Copy)]
pub struct Resolver<'a> {
    pub environment: &'a str,
    pub configuration: &'a str,
}

impl<'a> Resolver<'a> {
    pub fn new(environment: &'a str, configuration: &'a str) -> Self {
        Self {
            environment,
            configuration,
        }
    }

    /// Resolve a mapping node into a flat [`ResolvedMap`].
    ///
    /// Depth decides the key kind: plain leaves are `Global`, leaves under an
    /// environment selector are `Environment`, and leaves one level further
    /// under a configuration selector are `Configuration`. With `flat` set the
    /// configuration level is never entered and the environment value is kept
    /// as-is, mapping or not.
    pub fn resolve(&self, node: &Value, flat: bool) -> ResolvedMap {
        let mut out = ResolvedMap::new();
        let Some(root) = node.as_mapping() else {
            return out;
        };

        for (key, value) in root {
            let Some(name) = key.as_str() else {
                continue;
            };

            let Some(by_environment) = value.as_mapping() else {
                out.insert(ResolvedKey::global(name), value.clone());
                continue;
            };

            for (env_key, env_value) in by_environment {
                let Some(env_selector) = env_key.as_str() else {
                    continue;
                };
                if !self.matches_environment(env_selector) {
                    continue;
                }

                let by_configuration = match env_value.as_mapping() {
                    Some(m) if !flat => m,
                    _ => {
                        out.insert(
                            ResolvedKey::environment(env_selector, name),
                            env_value.clone(),
                        );
                        continue;
                    }
                };

                for (config_key, config_value) in by_configuration {
                    let Some(config_selector) = config_key.as_str() else {
                        continue;
                    };
                    if selector_contains(config_selector, self.configuration) {
                        out.insert(
                            ResolvedKey::configuration(config_selector, name),
                            config_value.clone(),
                        );
                    }
                }
            }
        }

        out
    }

    pub fn matches_environment(&self, selector: &str) -> bool {
        selector == WILDCARD || selector_contains(selector, self.environment)
    }
}

/// True when the comma list `selector` names `wanted`.
pub fn selector_contains(selector: &str, wanted: &str) -> bool {
    selector.split(',').any(|part| part.trim() == wanted)
}
