use anyhow::{bail, Result};
use std::path::PathBuf;
use tracing::{info, warn};

use crate::{
    config,
    context::ProjectContext,
    dispatch::{Engine, Report, Selection},
    emit::Emitter,
    lock::Lock,
    project,
};

#[derive(Debug, Clone)]
pub struct RunOptions {
    pub project_dir: PathBuf,
    pub selection: Selection,
    /// Overrides the `INFOPLIST_FILE` found in the Xcode project.
    pub info_plist: Option<String>,
    /// Ignore `Natrium.lock` and regenerate everything.
    pub force: bool,
}

#[derive(Debug)]
pub enum Outcome {
    UpToDate,
    Applied(Report),
}

pub fn run(opts: &RunOptions) -> Result<Outcome> {
    let project_dir = opts.project_dir.as_path();
    let document_path = config::document_path(project_dir);
    let text = config::read_document(&document_path)?;

    let lock_path = Lock::path(project_dir);
    if opts.force {
        Lock::remove(&lock_path)?;
    }

    let xcodeproj = project::locate_xcodeproj(project_dir)?;
    let build_settings = project::XcodeProject::open(&xcodeproj)?
        .build_settings(&opts.selection.target, &opts.selection.configuration)?;
    let info_plist = match &opts.info_plist {
        Some(path) => path.clone(),
        None => build_settings.info_plist()?,
    };

    let lock = Lock::new(project_dir, &opts.selection, &text);
    if !lock.needs_update(Lock::load(&lock_path).as_ref()) {
        info!("Natrium is up to date");
        return Ok(Outcome::UpToDate);
    }

    info!("Running Natrium (v{})", env!("CARGO_PKG_VERSION"));
    info!("Parsing {}", document_path.display());
    let document = config::parse_document(&text, &document_path)?;

    let app_version = project::app_version(
        &project_dir.join(&info_plist),
        build_settings.marketing_version(),
    );
    let ctx = ProjectContext::new(project_dir, opts.selection.clone(), info_plist.clone())
        .with_app_version(app_version);

    let engine = Engine::new(opts.selection.clone(), info_plist);
    let prepared = engine.prepare(&document)?;

    let mut emitter = Emitter::new(&ctx, &prepared.environments);
    let mut report = engine.dispatch(&document, &prepared, &mut emitter)?;

    for artifact in emitter.finish() {
        artifact.write()?;
    }

    if prepared.settings.update_podfile() {
        warn!("settings.update_podfile is set; run `pod install` to pick up the new configuration");
    }

    lock.save(&lock_path)?;

    report.prepend_warnings(prepared.warnings);

    info!("Natrium ▸ Success!");
    Ok(Outcome::Applied(report))
}

/// Options recorded by the last successful run, for `natrium install`.
pub fn options_from_lock(project_dir: &std::path::Path) -> Result<RunOptions> {
    let path = Lock::path(project_dir);
    let Some(lock) = Lock::load(&path) else {
        bail!(
            "{} not created yet, run natrium with the correct arguments",
            path.display()
        );
    };
    Ok(RunOptions {
        project_dir: lock.project_dir.clone(),
        selection: lock.selection(),
        info_plist: None,
        force: true,
    })
}
