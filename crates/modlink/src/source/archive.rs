//! Library archive members
//!
//! A library archive (`.jap`) is a zip file. The module inside it is chosen by
//! an explicit member path, by the `Main-Program` attribute of
//! `META-INF/MANIFEST.MF`, or by the convention `<archive stem>.ol`, in that
//! order.

use std::fs::File;
use std::io::Read;
use std::path::{Path, PathBuf};

use zip::ZipArchive;

use crate::config::ModuleConfig;
use crate::error::{ModuleError, ModuleResult};
use crate::uri::ModuleUri;

const MANIFEST_PATH: &str = "META-INF/MANIFEST.MF";

/// Which member of an archive to open
#[derive(Debug, Clone, Copy)]
pub enum ArchiveEntry<'a> {
    /// Explicit member path, with or without the source extension
    Member(&'a str),
    /// The archive's main program
    Main,
}

/// A module stored inside a library archive
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArchiveSource {
    archive: PathBuf,
    member: String,
    uri: ModuleUri,
}

impl ArchiveSource {
    /// Locate a member of an archive
    pub fn open(archive: &Path, entry: ArchiveEntry<'_>, config: &ModuleConfig) -> ModuleResult<Self> {
        if !archive.is_file() {
            return Err(ModuleError::FileNotFound(archive.to_path_buf()));
        }
        let archive = archive
            .canonicalize()
            .map_err(|source| ModuleError::Io { location: archive.display().to_string(), source })?;
        let mut zip = open_zip(&archive)?;

        let member = match entry {
            ArchiveEntry::Member(member) => {
                let member = with_extension(member.trim_start_matches('/'), &config.source_extension);
                if !has_entry(&zip, &member) {
                    return Err(ModuleError::ArchiveEntryNotFound { archive, entry: member });
                }
                member
            }
            ArchiveEntry::Main => main_entry(&archive, &mut zip, config)?,
        };

        let uri = ModuleUri::archive_member(&archive, &member)
            .ok_or_else(|| ModuleError::FileNotFound(archive.clone()))?;
        tracing::trace!(archive = %archive.display(), %member, "opened archive member");
        Ok(Self { archive, member, uri })
    }

    /// Open the archive member named by a `jap:` URI
    pub fn from_uri(uri: &ModuleUri, config: &ModuleConfig) -> ModuleResult<Self> {
        let (archive, member) = uri
            .archive_parts()
            .ok_or_else(|| ModuleError::IllegalOperation(format!("{uri} is not an archive URI")))?;
        match member.as_deref() {
            Some(member) if !member.is_empty() => Self::open(&archive, ArchiveEntry::Member(member), config),
            _ => Self::open(&archive, ArchiveEntry::Main, config),
        }
    }

    /// Path of the archive file
    pub fn archive_path(&self) -> &Path {
        &self.archive
    }

    /// Member path inside the archive, without leading slash
    pub fn member(&self) -> &str {
        &self.member
    }

    /// `jap:<archive>!/<member>`
    pub fn uri(&self) -> &ModuleUri {
        &self.uri
    }

    /// Directory of the member inside the archive
    pub fn member_directory(&self) -> &str {
        self.member.rsplit_once('/').map(|(dir, _)| dir).unwrap_or("")
    }

    /// `jap:<archive>!/<member directory>`
    pub fn include_path(&self) -> Option<ModuleUri> {
        ModuleUri::archive_member(&self.archive, self.member_directory())
    }

    /// Read the member's bytes
    pub fn read(&self) -> ModuleResult<Vec<u8>> {
        let mut zip = open_zip(&self.archive)?;
        let mut file = zip.by_name(&self.member).map_err(|source| ModuleError::Archive {
            path: self.archive.clone(),
            source,
        })?;
        let mut bytes = Vec::new();
        file.read_to_end(&mut bytes).map_err(|source| ModuleError::Io {
            location: self.uri.to_string(),
            source,
        })?;
        Ok(bytes)
    }
}

/// Whether `archive` contains `member`
pub(crate) fn archive_contains(archive: &Path, member: &str) -> bool {
    match open_zip(archive) {
        Ok(zip) => has_entry(&zip, member),
        Err(_) => false,
    }
}

fn open_zip(path: &Path) -> ModuleResult<ZipArchive<File>> {
    let file = File::open(path).map_err(|source| ModuleError::Io {
        location: path.display().to_string(),
        source,
    })?;
    ZipArchive::new(file).map_err(|source| ModuleError::Archive {
        path: path.to_path_buf(),
        source,
    })
}

fn has_entry(zip: &ZipArchive<File>, member: &str) -> bool {
    zip.file_names().any(|name| name == member)
}

fn with_extension(member: &str, extension: &str) -> String {
    let suffix = format!(".{extension}");
    if member.ends_with(&suffix) {
        member.to_string()
    } else {
        format!("{member}{suffix}")
    }
}

/// Manifest attribute first, then the archive-name convention
fn main_entry(archive: &Path, zip: &mut ZipArchive<File>, config: &ModuleConfig) -> ModuleResult<String> {
    if let Some(main) = manifest_attribute(zip, &config.archive.main_program_attribute) {
        let main = main.trim_start_matches('/').to_string();
        if has_entry(zip, &main) {
            return Ok(main);
        }
        tracing::debug!(
            archive = %archive.display(),
            %main,
            "manifest names a missing main program, falling back to archive name"
        );
    }

    let stem = archive
        .file_stem()
        .map(|s| s.to_string_lossy().to_string())
        .unwrap_or_default();
    let conventional = config.source_file_name(&stem);
    if has_entry(zip, &conventional) {
        Ok(conventional)
    } else {
        Err(ModuleError::ArchiveEntryNotFound {
            archive: archive.to_path_buf(),
            entry: conventional,
        })
    }
}

fn manifest_attribute(zip: &mut ZipArchive<File>, attribute: &str) -> Option<String> {
    let mut manifest = zip.by_name(MANIFEST_PATH).ok()?;
    let mut content = String::new();
    manifest.read_to_string(&mut content).ok()?;
    parse_manifest(&content)
        .into_iter()
        .find(|(key, _)| key.eq_ignore_ascii_case(attribute))
        .map(|(_, value)| value)
}

/// Main section of a jar-style manifest
///
/// Lines starting with a single space continue the previous value.
fn parse_manifest(content: &str) -> Vec<(String, String)> {
    let mut attributes: Vec<(String, String)> = Vec::new();
    for line in content.lines() {
        if line.trim().is_empty() {
            break;
        }
        if let Some(continuation) = line.strip_prefix(' ') {
            if let Some((_, value)) = attributes.last_mut() {
                value.push_str(continuation);
            }
            continue;
        }
        if let Some((key, value)) = line.split_once(':') {
            attributes.push((key.trim().to_string(), value.trim().to_string()));
        }
    }
    attributes
}
