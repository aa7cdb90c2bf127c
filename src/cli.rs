use clap::{Parser, Subcommand};
use std::path::PathBuf;

use crate::{dispatch::Selection, runtime::RunOptions};

#[derive(Parser, Debug)]
#[command(name = "natrium", version, about)]
pub struct Args {
    /// Log every resolved value
    #[arg(short, long, global = true, default_value_t = false)]
    pub verbose: bool,

    /// Hide timestamps in logs
    #[arg(short = 'n', long = "no_timestamp", global = true, default_value_t = false)]
    pub no_timestamp: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Resolve .natrium.yml and write every artifact
    Run {
        /// Project directory (contains .natrium.yml and the .xcodeproj)
        #[arg(short = 'p', long = "project_dir")]
        project_dir: PathBuf,

        /// Build configuration name
        #[arg(short, long)]
        configuration: String,

        /// Environment name, must be listed under `environments`
        #[arg(short, long)]
        environment: String,

        /// Target name, selects the `target_specific` block
        #[arg(short, long)]
        target: String,

        /// Info.plist path relative to the project (defaults to INFOPLIST_FILE)
        #[arg(long)]
        info_plist: Option<String>,

        /// Regenerate even when Natrium.lock says nothing changed
        #[arg(long, default_value_t = false)]
        force: bool,
    },

    /// Re-run with the arguments stored in Natrium.lock
    Install {
        /// Directory holding Natrium.lock
        #[arg(short = 'p', long = "project_dir", default_value = ".")]
        project_dir: PathBuf,

        /// Exit quietly when no lock exists yet
        #[arg(long = "silent-fail", default_value_t = false)]
        silent_fail: bool,
    },

    /// Run from an Xcode build phase, reading the build environment
    BuildPhase {
        /// Environment name
        environment: String,

        #[arg(long, env = "PROJECT_DIR")]
        project_dir: PathBuf,

        #[arg(long, env = "TARGET_NAME")]
        target: String,

        #[arg(long, env = "CONFIGURATION")]
        configuration: String,
    },
}

impl Command {
    /// Options for commands that carry their own arguments; `None` for `install`.
    pub fn run_options(&self) -> Option<RunOptions> {
        match self {
            Command::Run {
                project_dir,
                configuration,
                environment,
                target,
                info_plist,
                force,
            } => Some(RunOptions {
                project_dir: project_dir.clone(),
                selection: Selection::new(environment, configuration, target),
                info_plist: info_plist.clone(),
                force: *force,
            }),
            Command::BuildPhase {
                environment,
                project_dir,
                target,
                configuration,
            } => Some(RunOptions {
                project_dir: project_dir.clone(),
                selection: Selection::new(environment, configuration, target),
                info_plist: None,
                force: false,
            }),
            Command::Install { .. } => None,
        }
    }
}
