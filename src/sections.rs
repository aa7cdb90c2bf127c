use std::{collections::BTreeMap, fmt};

/// Top-level keys consumed by the pre-pass, never dispatched as sections.
pub const RESERVED_KEYS: [&str; 4] = [
    "environments",
    "natrium_variables",
    "settings",
    "target_specific",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum SectionId {
    Variables,
    Xcconfig,
    Plists,
    AppIcon,
    LaunchScreenVersioning,
    Files,
}

impl SectionId {
    pub const ALL: [SectionId; 6] = [
        SectionId::Variables,
        SectionId::Xcconfig,
        SectionId::AppIcon,
        SectionId::LaunchScreenVersioning,
        SectionId::Plists,
        SectionId::Files,
    ];

    pub fn key(self) -> &'static str {
        match self {
            SectionId::Variables => "variables",
            SectionId::Xcconfig => "xcconfig",
            SectionId::Plists => "plists",
            SectionId::AppIcon => "app_icon",
            SectionId::LaunchScreenVersioning => "launch_screen_versioning",
            SectionId::Files => "files",
        }
    }

    pub fn spec(self) -> SectionSpec {
        let (files, required, flat) = match self {
            SectionId::Variables => (Files::Single, true, false),
            SectionId::Xcconfig => (Files::Single, true, true),
            SectionId::Plists => (Files::Multiple, false, false),
            SectionId::AppIcon => (Files::Single, false, false),
            SectionId::LaunchScreenVersioning => (Files::Single, false, false),
            SectionId::Files => (Files::Single, false, false),
        };
        SectionSpec {
            id: self,
            files,
            required,
            flat,
        }
    }
}

impl fmt::Display for SectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.key())
    }
}

/// Whether a section's value is one subtree or `filePath -> subtree`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Files {
    Single,
    Multiple,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SectionSpec {
    pub id: SectionId,
    pub files: Files,
    /// Dispatched with an empty mapping when absent from the document.
    pub required: bool,
    /// Resolve without configuration-level selection.
    pub flat: bool,
}

/// Section key to capabilities, in registration order.
#[derive(Debug, Clone)]
pub struct SectionTable {
    by_key: BTreeMap<&'static str, SectionSpec>,
    order: Vec<SectionId>,
}

impl SectionTable {
    pub fn new(ids: &[SectionId]) -> Self {
        let mut by_key = BTreeMap::new();
        let mut order = Vec::with_capacity(ids.len());
        for id in ids {
            if by_key.insert(id.key(), id.spec()).is_none() {
                order.push(*id);
            }
        }
        Self { by_key, order }
    }

    pub fn lookup(&self, key: &str) -> Option<&SectionSpec> {
        self.by_key.get(key)
    }

    /// Required sections in registration order.
    pub fn required(&self) -> impl Iterator<Item = &SectionSpec> {
        self.order
            .iter()
            .filter_map(|id| self.by_key.get(id.key()))
            .filter(|spec| spec.required)
    }
}

impl Default for SectionTable {
    fn default() -> Self {
        Self::new(&SectionId::ALL)
    }
}

/// Rewrites a legacy top-level key to its current section key.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Deprecation {
    /// `misc` -> `launch_screen_versioning`, keeping only `launchScreenStoryboard`.
    Misc,
    /// `infoplist` -> `plists`, wrapped under the default plist path.
    InfoPlist,
}

impl Deprecation {
    pub fn for_key(key: &str) -> Option<Self> {
        match key {
            "misc" => Some(Self::Misc),
            "infoplist" => Some(Self::InfoPlist),
            _ => None,
        }
    }

    pub fn replacement(self) -> SectionId {
        match self {
            Self::Misc => SectionId::LaunchScreenVersioning,
            Self::InfoPlist => SectionId::Plists,
        }
    }
}
