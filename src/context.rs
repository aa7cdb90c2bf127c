use std::path::{Path, PathBuf};

use crate::dispatch::Selection;

pub const DEFAULT_APP_VERSION: &str = "1.0";

/// What emitters need to know about the project being configured.
#[derive(Debug, Clone)]
pub struct ProjectContext {
    pub project_dir: PathBuf,
    pub selection: Selection,
    /// Info.plist path relative to `project_dir`.
    pub info_plist: String,
    pub app_version: String,
}

impl ProjectContext {
    pub fn new(project_dir: impl Into<PathBuf>, selection: Selection, info_plist: impl Into<String>) -> Self {
        Self {
            project_dir: project_dir.into(),
            selection,
            info_plist: info_plist.into(),
            app_version: DEFAULT_APP_VERSION.to_string(),
        }
    }

    pub fn with_app_version(mut self, version: impl Into<String>) -> Self {
        self.app_version = version.into();
        self
    }

    /// Resolve a document path against the project directory.
    pub fn path(&self, relative: impl AsRef<Path>) -> PathBuf {
        self.project_dir.join(relative)
    }
}
