//! Module sources
//!
//! A [`ModuleSource`] is a location-transparent handle on one module: its URI
//! identity, a way to read its bytes, and the directory that relative imports
//! inside it resolve against.

mod archive;

pub use archive::{ArchiveEntry, ArchiveSource};

pub(crate) use archive::archive_contains;

use std::fmt;
use std::io::{Cursor, Read};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::ast::Program;
use crate::config::ModuleConfig;
use crate::error::{ModuleError, ModuleResult};
use crate::uri::ModuleUri;

/// Where a module comes from
#[derive(Clone)]
pub enum ModuleSource {
    /// A file on disk
    File(FileSource),
    /// A member of a library archive
    Archive(ArchiveSource),
    /// Bytes supplied by the caller
    Stream(StreamSource),
    /// An already-built program
    Program(ProgramSource),
}

/// A module file on disk
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileSource {
    path: PathBuf,
    uri: ModuleUri,
}

impl FileSource {
    /// Canonical path of the file
    pub fn path(&self) -> &Path {
        &self.path
    }
}

/// Caller-supplied module bytes
#[derive(Clone)]
pub struct StreamSource {
    uri: ModuleUri,
    bytes: Arc<[u8]>,
}

/// A program supplied without source text
#[derive(Clone)]
pub struct ProgramSource {
    program: Arc<Program>,
}

impl ProgramSource {
    /// The wrapped program
    pub fn program(&self) -> &Arc<Program> {
        &self.program
    }
}

impl ModuleSource {
    /// Source for an existing file
    pub fn file(path: &Path) -> ModuleResult<Self> {
        if !path.is_file() {
            return Err(ModuleError::FileNotFound(path.to_path_buf()));
        }
        let path = path.canonicalize().map_err(|source| ModuleError::Io {
            location: path.display().to_string(),
            source,
        })?;
        let uri = ModuleUri::from_file_path(&path).ok_or_else(|| ModuleError::FileNotFound(path.clone()))?;
        Ok(ModuleSource::File(FileSource { path, uri }))
    }

    /// Source for a member of a library archive
    pub fn archive(archive: &Path, entry: ArchiveEntry<'_>, config: &ModuleConfig) -> ModuleResult<Self> {
        ArchiveSource::open(archive, entry, config).map(ModuleSource::Archive)
    }

    /// Source named by a `file:` or `jap:` URI
    pub fn from_uri(uri: &ModuleUri, config: &ModuleConfig) -> ModuleResult<Self> {
        if uri.is_archive() {
            return ArchiveSource::from_uri(uri, config).map(ModuleSource::Archive);
        }
        match uri.to_file_path() {
            Some(path) => Self::file(&path),
            None => Err(ModuleError::IllegalOperation(format!(
                "cannot open {uri}: unsupported scheme {}",
                uri.scheme()
            ))),
        }
    }

    /// Source reading the whole of `reader` under a caller-chosen URI
    pub fn from_reader(uri: ModuleUri, mut reader: impl Read) -> ModuleResult<Self> {
        let mut bytes = Vec::new();
        reader.read_to_end(&mut bytes).map_err(|source| ModuleError::Io {
            location: uri.to_string(),
            source,
        })?;
        Ok(Self::from_bytes(uri, bytes))
    }

    /// Source over in-memory bytes
    pub fn from_bytes(uri: ModuleUri, bytes: impl Into<Arc<[u8]>>) -> Self {
        ModuleSource::Stream(StreamSource { uri, bytes: bytes.into() })
    }

    /// Source for a program built without parsing
    pub fn from_program(program: impl Into<Arc<Program>>) -> Self {
        ModuleSource::Program(ProgramSource { program: program.into() })
    }

    /// Identity of the module
    pub fn uri(&self) -> &ModuleUri {
        match self {
            ModuleSource::File(file) => &file.uri,
            ModuleSource::Archive(archive) => archive.uri(),
            ModuleSource::Stream(stream) => &stream.uri,
            ModuleSource::Program(program) => &program.program.uri,
        }
    }

    /// Directory that relative imports inside this module resolve against
    pub fn include_path(&self) -> Option<ModuleUri> {
        match self {
            ModuleSource::File(file) => file.path.parent().and_then(ModuleUri::from_directory_path),
            ModuleSource::Archive(archive) => archive.include_path(),
            ModuleSource::Stream(_) | ModuleSource::Program(_) => None,
        }
    }

    /// Open the module's bytes
    ///
    /// Fails with [`ModuleError::IllegalOperation`] for in-memory programs,
    /// which have no source text.
    pub fn open(&self) -> ModuleResult<Box<dyn Read + Send>> {
        match self {
            ModuleSource::File(file) => {
                let handle = std::fs::File::open(&file.path).map_err(|source| ModuleError::Io {
                    location: file.path.display().to_string(),
                    source,
                })?;
                Ok(Box::new(handle))
            }
            ModuleSource::Archive(archive) => Ok(Box::new(Cursor::new(archive.read()?))),
            ModuleSource::Stream(stream) => Ok(Box::new(Cursor::new(stream.bytes.clone()))),
            ModuleSource::Program(program) => Err(ModuleError::IllegalOperation(format!(
                "module {} is an in-memory program and has no source stream",
                program.program.uri
            ))),
        }
    }

    /// Read the whole source as UTF-8 text
    pub fn read_to_string(&self) -> ModuleResult<String> {
        let mut text = String::new();
        self.open()?.read_to_string(&mut text).map_err(|source| ModuleError::Io {
            location: self.uri().to_string(),
            source,
        })?;
        Ok(text)
    }

    /// Human-readable name: file name, archive member, or URI
    pub fn name(&self) -> String {
        match self {
            ModuleSource::File(file) => file
                .path
                .file_name()
                .map(|n| n.to_string_lossy().to_string())
                .unwrap_or_else(|| file.path.display().to_string()),
            ModuleSource::Archive(archive) => archive.member().to_string(),
            ModuleSource::Stream(_) | ModuleSource::Program(_) => self.uri().to_string(),
        }
    }
}

impl fmt::Debug for ModuleSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let kind = match self {
            ModuleSource::File(_) => "File",
            ModuleSource::Archive(_) => "Archive",
            ModuleSource::Stream(_) => "Stream",
            ModuleSource::Program(_) => "Program",
        };
        f.debug_struct("ModuleSource")
            .field("kind", &kind)
            .field("uri", &self.uri().as_str())
            .finish()
    }
}
