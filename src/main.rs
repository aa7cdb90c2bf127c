use anyhow::{Context as _, Result};
use clap::Parser;
use tracing::error;

use natrium::{
    cli::{Args, Command},
    runtime::{self, Outcome},
};

/// sysexits.h EX_USAGE
const EX_USAGE: i32 = 64;

fn main() -> Result<()> {
    let args = Args::parse();
    natrium::logging::init(args.verbose, !args.no_timestamp)?;

    let opts = match &args.command {
        Command::Install {
            project_dir,
            silent_fail,
        } => match runtime::options_from_lock(project_dir) {
            Ok(opts) => opts,
            Err(e) => {
                if !silent_fail {
                    error!("{e:#}");
                }
                std::process::exit(EX_USAGE);
            }
        },
        command => command
            .run_options()
            .context("command carries no run options")?,
    };

    match runtime::run(&opts) {
        Ok(Outcome::UpToDate) | Ok(Outcome::Applied(_)) => Ok(()),
        Err(e) => {
            error!("{e:#}");
            std::process::exit(1);
        }
    }
}
