//! Xcode project lookups: where the project is, which Info.plist the selected
//! target builds with, and the marketing version.

use anyhow::{bail, Context as _, Result};
use indexmap::IndexMap;
use std::{
    fs,
    path::{Path, PathBuf},
};
use tracing::debug;

use crate::{
    context::DEFAULT_APP_VERSION,
    emit::plist,
    pbxproj::{self, Node},
};

/// First `*.xcodeproj` directly inside `dir`.
pub fn locate_xcodeproj(dir: &Path) -> Result<PathBuf> {
    let pattern = dir.join("*.xcodeproj");
    let pattern = pattern.to_string_lossy();
    let mut found: Vec<PathBuf> = glob::glob(&pattern)
        .with_context(|| format!("invalid project glob: {pattern}"))?
        .filter_map(|entry| entry.ok())
        .collect();
    found.sort();
    match found.into_iter().next() {
        Some(path) => Ok(path),
        None => bail!("Cannot find xcodeproj in folder '{}'", dir.display()),
    }
}

/// Parsed `project.pbxproj`.
#[derive(Debug, Clone)]
pub struct XcodeProject {
    path: PathBuf,
    objects: IndexMap<String, Node>,
}

impl XcodeProject {
    pub fn open(xcodeproj: &Path) -> Result<Self> {
        let path = xcodeproj.join("project.pbxproj");
        let text = fs::read_to_string(&path)
            .with_context(|| format!("failed to read {}", path.display()))?;
        Self::parse(&text, path)
    }

    fn parse(text: &str, path: PathBuf) -> Result<Self> {
        let root = pbxproj::parse(text).with_context(|| format!("failed to parse {}", path.display()))?;
        let Some(objects) = root.get("objects").and_then(Node::as_dict) else {
            bail!("{} has no objects", path.display());
        };
        Ok(Self {
            objects: objects.clone(),
            path,
        })
    }

    /// Build settings of `target` for `configuration`.
    pub fn build_settings(&self, target: &str, configuration: &str) -> Result<BuildSettings> {
        let Some(native) = self.objects.values().find(|object| {
            object.get("isa").and_then(Node::as_str) == Some("PBXNativeTarget")
                && object.get("name").and_then(Node::as_str) == Some(target)
        }) else {
            bail!("Cannot find target '{target}' in '{}'", self.path.display());
        };

        let configurations = native
            .get("buildConfigurationList")
            .and_then(Node::as_str)
            .and_then(|id| self.objects.get(id))
            .and_then(|list| list.get("buildConfigurations"))
            .and_then(Node::as_array)
            .unwrap_or_default();

        let settings = configurations
            .iter()
            .filter_map(|id| id.as_str().and_then(|id| self.objects.get(id)))
            .find(|config| config.get("name").and_then(Node::as_str) == Some(configuration))
            .and_then(|config| config.get("buildSettings"))
            .and_then(Node::as_dict);

        match settings {
            Some(settings) => Ok(BuildSettings {
                settings: settings.clone(),
                origin: format!("{target}/{configuration}"),
            }),
            None => bail!(
                "Cannot find configuration '{configuration}' of target '{target}' in '{}'",
                self.path.display()
            ),
        }
    }
}

/// One `XCBuildConfiguration`'s `buildSettings`.
#[derive(Debug, Clone)]
pub struct BuildSettings {
    settings: IndexMap<String, Node>,
    origin: String,
}

impl BuildSettings {
    pub fn get(&self, name: &str) -> Option<&str> {
        self.settings.get(name).and_then(Node::as_str)
    }

    /// `INFOPLIST_FILE`, relative to the project directory.
    pub fn info_plist(&self) -> Result<String> {
        let Some(path) = self.get("INFOPLIST_FILE") else {
            bail!("Cannot find INFOPLIST_FILE in build settings of {}", self.origin);
        };
        let path = ["$(SRCROOT)/", "$(PROJECT_DIR)/", "${SRCROOT}/", "${PROJECT_DIR}/"]
            .iter()
            .find_map(|prefix| path.strip_prefix(prefix))
            .unwrap_or(path);
        Ok(path.to_string())
    }

    pub fn marketing_version(&self) -> Option<&str> {
        self.get("MARKETING_VERSION")
    }
}

/// `CFBundleShortVersionString` from the Info.plist, following
/// `$(MARKETING_VERSION)` into the build settings. Falls back to `1.0`.
pub fn app_version(info_plist: &Path, marketing_version: Option<&str>) -> String {
    let Ok(text) = fs::read_to_string(info_plist) else {
        debug!(path = %info_plist.display(), "Info.plist not readable, using default version");
        return DEFAULT_APP_VERSION.to_string();
    };

    let version = match plist::string_value(&text, "CFBundleShortVersionString") {
        Ok(version) => version,
        Err(err) => {
            debug!(path = %info_plist.display(), error = %err, "Info.plist not parsable");
            None
        }
    };
    let version = match version.as_deref() {
        Some("$(MARKETING_VERSION)") | Some("${MARKETING_VERSION}") => {
            marketing_version.map(str::to_string)
        }
        _ => version,
    };

    version.unwrap_or_else(|| DEFAULT_APP_VERSION.to_string())
}
