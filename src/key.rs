use indexmap::IndexMap;
use serde_yaml::Value;
use std::fmt;

/// How a resolved value was selected.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ResolvedKey {
    Global(String),
    Environment { selector: String, name: String },
    Configuration { selector: String, name: String },
}

impl ResolvedKey {
    pub fn global(name: impl Into<String>) -> Self {
        Self::Global(name.into())
    }

    pub fn environment(selector: impl Into<String>, name: impl Into<String>) -> Self {
        Self::Environment {
            selector: selector.into(),
            name: name.into(),
        }
    }

    pub fn configuration(selector: impl Into<String>, name: impl Into<String>) -> Self {
        Self::Configuration {
            selector: selector.into(),
            name: name.into(),
        }
    }

    /// The semantic name, independent of how it was selected.
    pub fn name(&self) -> &str {
        match self {
            Self::Global(name) => name,
            Self::Environment { name, .. } => name,
            Self::Configuration { name, .. } => name,
        }
    }

    fn rank(&self) -> u8 {
        match self {
            Self::Global(_) => 0,
            Self::Environment { .. } => 1,
            Self::Configuration { .. } => 2,
        }
    }
}

impl fmt::Display for ResolvedKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Global(name) => write!(f, "{name}"),
            Self::Environment { selector, name } => write!(f, "{name} [{selector}]"),
            Self::Configuration { selector, name } => write!(f, "{name} [config={selector}]"),
        }
    }
}

/// Flat output of resolving one subtree.
///
/// Insertion-ordered; inserting an existing key overwrites the value in place.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ResolvedMap {
    entries: IndexMap<ResolvedKey, Value>,
}

impl ResolvedMap {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, key: ResolvedKey, value: Value) {
        self.entries.insert(key, value);
    }

    pub fn get(&self, key: &ResolvedKey) -> Option<&Value> {
        self.entries.get(key)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&ResolvedKey, &Value)> {
        self.entries.iter()
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = (&ResolvedKey, &mut Value)> {
        self.entries.iter_mut()
    }

    /// Value a consumer should use for `name`.
    ///
    /// Configuration entries beat environment entries, which beat global ones.
    /// Within one kind the entry inserted last wins.
    pub fn effective(&self, name: &str) -> Option<&Value> {
        let mut best: Option<(u8, &Value)> = None;
        for (key, value) in self.entries.iter().filter(|(k, _)| k.name() == name) {
            let rank = key.rank();
            if best.map_or(true, |(r, _)| rank >= r) {
                best = Some((rank, value));
            }
        }
        best.map(|(_, v)| v)
    }

    /// One `(name, value)` per semantic name, in order of first appearance.
    pub fn effective_entries(&self) -> Vec<(&str, &Value)> {
        let mut names: Vec<&str> = Vec::new();
        for key in self.entries.keys() {
            if !names.contains(&key.name()) {
                names.push(key.name());
            }
        }
        names
            .into_iter()
            .filter_map(|name| self.effective(name).map(|v| (name, v)))
            .collect()
    }
}

impl FromIterator<(ResolvedKey, Value)> for ResolvedMap {
    fn from_iter<I: IntoIterator<Item = (ResolvedKey, Value)>>(iter: I) -> Self {
        let mut map = Self::new();
        for (k, v) in iter {
            map.insert(k, v);
        }
        map
    }
}

/// String form of a scalar leaf; empty for null, YAML for collections.
pub fn value_to_string(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::Bool(b) => b.to_string(),
        Value::Number(n) => n.to_string(),
        Value::String(s) => s.clone(),
        Value::Tagged(tagged) => value_to_string(&tagged.value),
        Value::Sequence(_) | Value::Mapping(_) => serde_yaml::to_string(value)
            .map(|s| s.trim_end().to_string())
            .unwrap_or_default(),
    }
}
