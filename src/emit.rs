//! Emitters: turn resolved sections into artifacts.
//!
//! Rendering happens in memory while the engine dispatches; nothing touches
//! the disk until [`Artifact::write`] is called by the runtime.

use anyhow::{Context as _, Result};
use std::{
    fs,
    path::{Path, PathBuf},
};
use tracing::{debug, info};

use crate::{
    context::ProjectContext, dispatch::Sink, key::ResolvedMap, sections::SectionId,
};

pub mod app_icon;
pub mod files;
pub mod launch_screen;
pub mod plist;
pub mod swift;
pub mod xcconfig;

pub const SWIFT_FILE: &str = "Natrium.swift";
pub const XCCONFIG_FILE: &str = "Natrium.xcconfig";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Contents {
    Text(String),
    Bytes(Vec<u8>),
    CopyFrom(PathBuf),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Artifact {
    pub path: PathBuf,
    pub contents: Contents,
}

impl Artifact {
    pub fn text(path: impl Into<PathBuf>, text: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            contents: Contents::Text(text.into()),
        }
    }

    pub fn bytes(path: impl Into<PathBuf>, bytes: Vec<u8>) -> Self {
        Self {
            path: path.into(),
            contents: Contents::Bytes(bytes),
        }
    }

    pub fn copy(from: impl Into<PathBuf>, to: impl Into<PathBuf>) -> Self {
        Self {
            path: to.into(),
            contents: Contents::CopyFrom(from.into()),
        }
    }

    /// Write to disk. Text or bytes identical to what is already there are
    /// left alone so Xcode does not see a fresh modification time.
    pub fn write(&self) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)
                .with_context(|| format!("failed to create {}", parent.display()))?;
        }

        match &self.contents {
            Contents::Text(text) => {
                if fs::read_to_string(&self.path).ok().as_deref() == Some(text.as_str()) {
                    debug!(path = %self.path.display(), "unchanged");
                    return Ok(());
                }
                fs::write(&self.path, text)
                    .with_context(|| format!("failed to write {}", self.path.display()))?;
            }
            Contents::Bytes(bytes) => {
                if fs::read(&self.path).ok().as_deref() == Some(bytes.as_slice()) {
                    debug!(path = %self.path.display(), "unchanged");
                    return Ok(());
                }
                fs::write(&self.path, bytes)
                    .with_context(|| format!("failed to write {}", self.path.display()))?;
            }
            Contents::CopyFrom(source) => {
                fs::copy(source, &self.path).with_context(|| {
                    format!(
                        "failed to copy {} to {}",
                        source.display(),
                        self.path.display()
                    )
                })?;
            }
        }

        info!(path = %self.path.display(), "written");
        Ok(())
    }
}

/// Collects artifacts for every section the engine dispatches.
#[derive(Debug)]
pub struct Emitter<'a> {
    ctx: &'a ProjectContext,
    environments: &'a [String],
    artifacts: Vec<Artifact>,
}

impl<'a> Emitter<'a> {
    pub fn new(ctx: &'a ProjectContext, environments: &'a [String]) -> Self {
        Self {
            ctx,
            environments,
            artifacts: Vec::new(),
        }
    }

    pub fn artifacts(&self) -> &[Artifact] {
        &self.artifacts
    }

    pub fn finish(self) -> Vec<Artifact> {
        self.artifacts
    }

    /// Current text for `path`: a pending artifact if one exists, else the
    /// file on disk.
    fn current_text(&self, path: &Path) -> Result<String> {
        let pending = self.artifacts.iter().rev().find_map(|a| match &a.contents {
            Contents::Text(text) if a.path == path => Some(text.clone()),
            _ => None,
        });
        match pending {
            Some(text) => Ok(text),
            None => fs::read_to_string(path)
                .with_context(|| format!("Cannot find {}", path.display())),
        }
    }

    fn push(&mut self, artifact: Artifact) {
        self.artifacts.retain(|a| a.path != artifact.path);
        self.artifacts.push(artifact);
    }
}

impl Sink for Emitter<'_> {
    fn emit(&mut self, section: SectionId, mapping: &ResolvedMap, file: Option<&str>) -> Result<()> {
        match section {
            SectionId::Variables => {
                let text = swift::render(self.ctx, self.environments, mapping)?;
                self.push(Artifact::text(self.ctx.path(SWIFT_FILE), text));
            }
            SectionId::Xcconfig => {
                let text = xcconfig::render(mapping);
                self.push(Artifact::text(self.ctx.path(XCCONFIG_FILE), text));
            }
            SectionId::Plists => {
                let file = file.unwrap_or(self.ctx.info_plist.as_str());
                let path = self.ctx.path(file);
                let text = self.current_text(&path)?;
                let patched = plist::patch(&text, mapping)
                    .with_context(|| format!("failed to update {}", path.display()))?;
                self.push(Artifact::text(path, patched));
            }
            SectionId::AppIcon => {
                for artifact in app_icon::render(self.ctx, mapping)? {
                    self.push(artifact);
                }
            }
            SectionId::LaunchScreenVersioning => {
                let Some(settings) = launch_screen::Settings::from_mapping(mapping)? else {
                    return Ok(());
                };
                let path = self.ctx.path(&settings.path);
                let text = self.current_text(&path)?;
                let patched = launch_screen::set_version(&text, &settings.label_name, &self.ctx.app_version)
                    .with_context(|| format!("failed to update {}", path.display()))?;
                self.push(Artifact::text(path, patched));
            }
            SectionId::Files => {
                for artifact in files::render(self.ctx, mapping) {
                    self.push(artifact);
                }
            }
        }
        Ok(())
    }
}
