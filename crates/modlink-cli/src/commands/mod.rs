//! CLI command implementations

pub mod find;
pub mod resolve;

use anyhow::Context;
use clap::Args;
use modlink::ModuleConfig;
use std::path::{Path, PathBuf};

/// Name of the configuration file picked up from the working directory
const CONFIG_FILE: &str = "modlink.toml";

/// Options controlling where modules are looked up
#[derive(Args, Debug, Default)]
pub struct SearchArgs {
    /// Add a package search root (repeatable, tried in order)
    #[arg(short = 'I', long = "package-path", value_name = "DIR")]
    pub package_paths: Vec<PathBuf>,

    /// Working directory used for absolute imports
    #[arg(short = 'C', long = "working-dir", value_name = "DIR")]
    pub working_dir: Option<PathBuf>,

    /// Configuration file (defaults to modlink.toml in the working directory)
    #[arg(long, value_name = "FILE")]
    pub config: Option<PathBuf>,
}

impl SearchArgs {
    /// Build the module configuration from the file and flags
    ///
    /// Flags override the working directory of the file and append to its
    /// package roots.
    pub fn to_config(&self) -> anyhow::Result<ModuleConfig> {
        let working_dir = match &self.working_dir {
            Some(dir) => absolute(dir)?,
            None => std::env::current_dir().context("cannot determine current directory")?,
        };

        let config_file = match &self.config {
            Some(path) => Some(path.clone()),
            None => Some(working_dir.join(CONFIG_FILE)).filter(|p| p.is_file()),
        };

        let mut config = match config_file {
            Some(path) => {
                tracing::debug!(path = %path.display(), "loading configuration");
                ModuleConfig::load(&path).with_context(|| format!("invalid configuration {}", path.display()))?
            }
            None => ModuleConfig::new(&working_dir),
        };

        if self.working_dir.is_some() {
            config.working_directory = working_dir;
        }
        config.package_paths.extend(self.package_paths.iter().cloned());
        Ok(config)
    }
}

/// Canonical form of a user-supplied path
pub fn absolute(path: &Path) -> anyhow::Result<PathBuf> {
    path.canonicalize()
        .with_context(|| format!("cannot access {}", path.display()))
}
