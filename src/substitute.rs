use regex::{Captures, Regex};
use serde_yaml::Value;
use std::{collections::BTreeMap, sync::LazyLock};
use tracing::warn;

use crate::key::{value_to_string, ResolvedMap};

static TOKEN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"#\{([^{}]*)\}").expect("token pattern is valid"));

/// Global `natrium_variables`, name to string.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Variables {
    vars: BTreeMap<String, String>,
}

impl Variables {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build from a resolved `natrium_variables` mapping.
    ///
    /// Only string values become variables. If a name was resolved more than
    /// once, the effective entry wins.
    pub fn from_resolved(map: &ResolvedMap) -> Self {
        let vars = map
            .effective_entries()
            .into_iter()
            .filter_map(|(name, v)| v.as_str().map(|s| (name.to_string(), s.to_string())))
            .collect();
        Self { vars }
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.vars.get(name).map(String::as_str)
    }

    pub fn insert(&mut self, name: impl Into<String>, value: impl Into<String>) {
        self.vars.insert(name.into(), value.into());
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &String)> {
        self.vars.iter()
    }

    pub fn is_empty(&self) -> bool {
        self.vars.is_empty()
    }

    /// Replace every `#{name}` in one scan. Inserted text is not re-scanned,
    /// unknown names stay as written.
    pub fn expand(&self, input: &str) -> String {
        if !input.contains("#{") {
            return input.to_string();
        }
        TOKEN
            .replace_all(input, |caps: &Captures| match self.get(&caps[1]) {
                Some(value) => value.to_string(),
                None => caps[0].to_string(),
            })
            .into_owned()
    }
}

/// Per-section overrides for the active target.
pub type TargetOverlay = BTreeMap<String, ResolvedMap>;

#[derive(Debug, Clone, Copy)]
pub struct Substitution<'a> {
    pub variables: &'a Variables,
    pub overlay: &'a TargetOverlay,
}

impl<'a> Substitution<'a> {
    pub fn new(variables: &'a Variables, overlay: &'a TargetOverlay) -> Self {
        Self { variables, overlay }
    }

    /// Rewrite string entries of `map` in place.
    ///
    /// Tokens are expanded first. With `apply_overlay`, a scalar target
    /// overlay entry with the same name then replaces the whole string.
    /// Mappings and sequences in the overlay are skipped.
    pub fn apply(&self, map: &mut ResolvedMap, section: &str, apply_overlay: bool) {
        let overlay = if apply_overlay {
            self.overlay.get(section)
        } else {
            None
        };

        for (key, value) in map.iter_mut() {
            let Some(current) = value.as_str() else {
                continue;
            };

            let mut replaced = self.variables.expand(current);

            if let Some(overlay) = overlay {
                for (o_key, o_value) in overlay.iter() {
                    if o_key.name() != key.name() {
                        continue;
                    }
                    match scalar_text(o_value) {
                        Some(text) => replaced = text,
                        None => warn!(
                            "{section}.{}: target override must be a scalar, skipped",
                            key.name()
                        ),
                    }
                }
            }

            *value = Value::String(replaced);
        }
    }
}

fn scalar_text(value: &Value) -> Option<String> {
    match value {
        Value::String(_) | Value::Bool(_) | Value::Number(_) => Some(value_to_string(value)),
        Value::Tagged(tagged) => scalar_text(&tagged.value),
        Value::Null | Value::Sequence(_) | Value::Mapping(_) => None,
    }
}
