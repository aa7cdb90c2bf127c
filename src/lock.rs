//! `Natrium.lock`: remembers the last applied run so an unchanged build can
//! skip regeneration.

use anyhow::{Context as _, Result};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::{
    fs,
    path::{Path, PathBuf},
};
use tracing::debug;

use crate::dispatch::Selection;

pub const LOCK_FILE: &str = "Natrium.lock";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Lock {
    pub version: String,
    pub project_dir: PathBuf,
    pub environment: String,
    pub configuration: String,
    pub target: String,
    pub checksum: String,
}

impl Lock {
    pub fn new(project_dir: &Path, selection: &Selection, document: &str) -> Self {
        Self {
            version: env!("CARGO_PKG_VERSION").to_string(),
            project_dir: project_dir.to_path_buf(),
            environment: selection.environment.clone(),
            configuration: selection.configuration.clone(),
            target: selection.target.clone(),
            checksum: checksum(document),
        }
    }

    pub fn path(project_dir: &Path) -> PathBuf {
        project_dir.join(LOCK_FILE)
    }

    pub fn selection(&self) -> Selection {
        Selection::new(&self.environment, &self.configuration, &self.target)
    }

    /// `None` when the file is missing or unreadable.
    pub fn load(path: &Path) -> Option<Self> {
        let text = fs::read_to_string(path).ok()?;
        match toml::from_str(&text) {
            Ok(lock) => Some(lock),
            Err(e) => {
                debug!(path = %path.display(), "ignoring unreadable lock: {e}");
                None
            }
        }
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        let text = toml::to_string_pretty(self)?;
        fs::write(path, text).with_context(|| format!("failed to write {}", path.display()))
    }

    pub fn remove(path: &Path) -> Result<()> {
        if path.exists() {
            fs::remove_file(path)
                .with_context(|| format!("failed to remove {}", path.display()))?;
        }
        Ok(())
    }

    pub fn needs_update(&self, existing: Option<&Lock>) -> bool {
        existing != Some(self)
    }
}

pub fn checksum(text: &str) -> String {
    format!("{:x}", Sha256::digest(text.as_bytes()))
}
