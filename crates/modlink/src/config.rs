//! Search configuration (modlink.toml)
//!
//! ```toml
//! working_directory = "."
//! package_paths = ["packages", "/usr/local/share/ol/packages"]
//! source_extension = "ol"
//!
//! [archive]
//! directory = "lib"
//! extension = "jap"
//! main_program_attribute = "Main-Program"
//! ```

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Errors that can occur while loading a configuration file
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Failed to read the configuration file
    #[error("Failed to read configuration file: {0}")]
    IoError(#[from] std::io::Error),

    /// Failed to parse TOML
    #[error("Failed to parse configuration: {0}")]
    ParseError(#[from] toml::de::Error),
}

/// Where and how modules are looked up
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct ModuleConfig {
    /// Base for absolute imports; relative entries below are anchored here
    pub working_directory: PathBuf,

    /// Package search roots, tried in order after the working directory
    pub package_paths: Vec<PathBuf>,

    /// Extension appended to module base names
    pub source_extension: String,

    /// Module looked up inside a directory named by an import
    pub default_module: String,

    /// Library archive conventions
    pub archive: ArchiveConventions,
}

/// Library archive lookup conventions
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct ArchiveConventions {
    /// Directory under the working directory holding archives
    pub directory: String,

    /// Archive file extension
    pub extension: String,

    /// Manifest attribute naming the archive's main program
    pub main_program_attribute: String,
}

impl Default for ArchiveConventions {
    fn default() -> Self {
        Self {
            directory: "lib".to_string(),
            extension: "jap".to_string(),
            main_program_attribute: "Main-Program".to_string(),
        }
    }
}

impl Default for ModuleConfig {
    fn default() -> Self {
        Self {
            working_directory: std::env::current_dir().unwrap_or_else(|_| PathBuf::from("/")),
            package_paths: Vec::new(),
            source_extension: "ol".to_string(),
            default_module: "main".to_string(),
            archive: ArchiveConventions::default(),
        }
    }
}

impl ModuleConfig {
    /// Configuration rooted at the given working directory
    pub fn new(working_directory: impl Into<PathBuf>) -> Self {
        Self {
            working_directory: working_directory.into(),
            ..Self::default()
        }
    }

    /// Append a package search root
    pub fn with_package_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.package_paths.push(path.into());
        self
    }

    /// Load configuration from a TOML file
    ///
    /// A relative `working_directory` is anchored at the file's directory.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        let mut config = Self::from_toml_str(&content)?;
        if config.working_directory.is_relative() {
            let base = path.parent().unwrap_or(Path::new("."));
            config.working_directory = base.join(&config.working_directory);
        }
        Ok(config)
    }

    /// Parse configuration from a TOML string
    pub fn from_toml_str(content: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(content)?)
    }

    /// Package roots with relative entries anchored at the working directory
    pub fn resolved_package_paths(&self) -> Vec<PathBuf> {
        self.package_paths
            .iter()
            .map(|p| {
                if p.is_relative() {
                    self.working_directory.join(p)
                } else {
                    p.clone()
                }
            })
            .collect()
    }

    /// Source file name for a module base name (`name.ol`)
    pub fn source_file_name(&self, module: &str) -> String {
        format!("{}.{}", module, self.source_extension)
    }

    /// Archive file name for a library name (`name.jap`)
    pub fn archive_file_name(&self, library: &str) -> String {
        format!("{}.{}", library, self.archive.extension)
    }
}
