//! `ferp init` command - create a project

use console::style;
use miette::{miette, IntoDiagnostic, Result};
use std::path::PathBuf;

use crate::core::project::{Project, ProjectError, PROJECT_DIR};

#[derive(clap::Args, Debug)]
pub struct InitArgs {
    /// Directory to initialize (default: current directory)
    pub path: Option<PathBuf>,
}

pub fn run(args: InitArgs) -> Result<()> {
    let root = match args.path {
        Some(path) => path,
        None => std::env::current_dir().into_diagnostic()?,
    };

    match Project::init(&root) {
        Ok(project) => {
            println!(
                "{} Initialized Frostline project in {}",
                style("✓").green(),
                style(project.root().display()).cyan()
            );
            println!(
                "   {}",
                style(format!("Edit {}/config.yaml to set currency and author", PROJECT_DIR)).dim()
            );
            Ok(())
        }
        Err(e @ ProjectError::AlreadyExists(_)) => Err(miette!("{}", e)),
        Err(e) => Err(miette!("Failed to initialize project: {}", e)),
    }
}
