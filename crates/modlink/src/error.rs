//! Module resolution errors

use std::path::PathBuf;

use thiserror::Error;

use crate::ast::{LinkKind, SourceContext};
use crate::import_path::ImportPath;
use crate::uri::ModuleUri;

/// Errors raised while locating, parsing or linking modules
#[derive(Debug, Error)]
pub enum ModuleError {
    /// No candidate source exists at any searched location
    #[error("module \"{path}\" not found, looked in: {}", .tried.join(", "))]
    ModuleNotFound {
        /// Import path being looked up
        path: ImportPath,
        /// Every candidate location, in search order
        tried: Vec<String>,
    },

    /// A filesystem source was requested for a missing file
    #[error("file not found: {}", .0.display())]
    FileNotFound(PathBuf),

    /// The archive exists but has no usable entry
    #[error("entry {entry} not found in archive {}", .archive.display())]
    ArchiveEntryNotFound {
        /// Archive file
        archive: PathBuf,
        /// Member path looked up inside the archive
        entry: String,
    },

    /// The parser rejected a module
    #[error("unable to parse {uri}: {source}")]
    ParseFailure {
        /// Module that failed to parse
        uri: ModuleUri,
        /// Parser error
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    /// An imported or linked name has no reachable declaration
    #[error("{context}: symbol not found: {name}{}", imported_from(.path))]
    SymbolNotFound {
        /// Name that was looked up
        name: String,
        /// Import path, when the name was imported
        path: Option<ImportPath>,
        /// Location of the reference
        context: SourceContext,
    },

    /// The imported declaration exists but is private
    #[error("{context}: illegal access to private symbol {name} of module {path}")]
    IllegalAccess {
        /// Private symbol name
        name: String,
        /// Import path of the declaring module
        path: ImportPath,
        /// Location of the import
        context: SourceContext,
    },

    /// Two entries of one symbol table share a name
    #[error("{context}: duplicate symbol {name}")]
    DuplicateSymbol {
        /// Name declared twice
        name: String,
        /// Location of the second entry
        context: SourceContext,
    },

    /// A link points at a declaration of the wrong shape
    #[error("{context}: symbol {name} is used as {expected}, but it is a {actual}")]
    TypeMismatch {
        /// Linked name
        name: String,
        /// Shape the link requires
        expected: LinkKind,
        /// Shape of the declaration found
        actual: &'static str,
        /// Location of the link
        context: SourceContext,
    },

    /// A type definition links to itself
    #[error("{context}: type definition link loop detected: {name}")]
    LinkLoop {
        /// Type whose alias chain loops
        name: String,
        /// Location of the closing link
        context: SourceContext,
    },

    /// A service embedded into a port serves no `local` input port
    #[error("{context}: service {service} embedded in port {port} has no inputPort with location \"local\"")]
    MissingLocalInputPort {
        /// Embedded service
        service: String,
        /// Output port the service is embedded in
        port: String,
        /// Location of the embedding
        context: SourceContext,
    },

    /// Operation not supported by this kind of source
    #[error("illegal operation: {0}")]
    IllegalOperation(String),

    /// Reading a source failed
    #[error("I/O error reading {location}: {source}")]
    Io {
        /// Path or URI being read
        location: String,
        /// Underlying error
        #[source]
        source: std::io::Error,
    },

    /// Opening or reading an archive failed
    #[error("unable to read archive {}: {source}", .path.display())]
    Archive {
        /// Archive file
        path: PathBuf,
        /// Underlying error
        #[source]
        source: zip::result::ZipError,
    },

    /// Every resolution error found in one pass over the module graph
    #[error("{} resolution error(s):\n{}", .0.len(), join_lines(.0))]
    Multiple(Vec<ModuleError>),
}

/// Result type for module operations
pub type ModuleResult<T> = Result<T, ModuleError>;

impl ModuleError {
    /// Flatten aggregated errors into a list of individual diagnostics
    pub fn diagnostics(&self) -> Vec<&ModuleError> {
        match self {
            ModuleError::Multiple(errors) => errors.iter().flat_map(|e| e.diagnostics()).collect(),
            other => vec![other],
        }
    }

    /// Collapse a list of accumulated errors, `Ok` when empty
    pub fn from_accumulated(mut errors: Vec<ModuleError>) -> ModuleResult<()> {
        match errors.len() {
            0 => Ok(()),
            1 => Err(errors.remove(0)),
            _ => Err(ModuleError::Multiple(errors)),
        }
    }
}

fn imported_from(path: &Option<ImportPath>) -> String {
    match path {
        Some(path) => format!(" (imported from {path})"),
        None => String::new(),
    }
}

fn join_lines(errors: &[ModuleError]) -> String {
    errors
        .iter()
        .map(|e| format!("  {e}"))
        .collect::<Vec<_>>()
        .join("\n")
}
