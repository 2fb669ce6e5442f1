//! Module identity
//!
//! Every module is identified by a URI. Plain files use `file:` URIs, members of
//! library archives use `jap:<archive file URI>!/<member path>`, and callers may
//! supply any other absolute URI for streams or in-memory programs.

use std::fmt;
use std::path::{Path, PathBuf};

use url::Url;

/// Scheme used for archive member URIs
pub const ARCHIVE_SCHEME: &str = "jap";

/// Separator between the archive file URI and the member path
const ARCHIVE_SEPARATOR: char = '!';

/// URI identifying a module source
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ModuleUri(Url);

impl ModuleUri {
    /// Parse a URI string
    pub fn parse(input: &str) -> Result<Self, url::ParseError> {
        Url::parse(input).map(Self)
    }

    /// Build a `file:` URI from an absolute path
    ///
    /// Returns `None` for relative paths.
    pub fn from_file_path(path: &Path) -> Option<Self> {
        Url::from_file_path(path).ok().map(Self)
    }

    /// Build a `file:` URI for a directory
    ///
    /// Directory URIs carry a trailing slash so they can be told apart from
    /// files without touching the filesystem.
    pub fn from_directory_path(path: &Path) -> Option<Self> {
        Url::from_directory_path(path).ok().map(Self)
    }

    /// Build the URI of an archive member, `jap:<archive>!/<member>`
    pub fn archive_member(archive: &Path, member: &str) -> Option<Self> {
        let archive_url = Url::from_file_path(archive).ok()?;
        let member = member.trim_start_matches('/');
        Self::parse(&format!(
            "{ARCHIVE_SCHEME}:{archive_url}{ARCHIVE_SEPARATOR}/{member}"
        ))
        .ok()
    }

    /// URI scheme (`file`, `jap`, ...)
    pub fn scheme(&self) -> &str {
        self.0.scheme()
    }

    /// Whether this URI names a member (or directory) inside an archive
    pub fn is_archive(&self) -> bool {
        self.scheme() == ARCHIVE_SCHEME
    }

    /// Filesystem path for `file:` URIs
    pub fn to_file_path(&self) -> Option<PathBuf> {
        if self.scheme() != "file" {
            return None;
        }
        self.0.to_file_path().ok()
    }

    /// Split an archive URI into the archive file path and the member path
    ///
    /// The member path has no leading slash. A URI without `!` names the
    /// archive itself and yields `None` as member.
    pub fn archive_parts(&self) -> Option<(PathBuf, Option<String>)> {
        if !self.is_archive() {
            return None;
        }
        let inner = &self.0.as_str()[ARCHIVE_SCHEME.len() + 1..];
        let (archive, member) = match inner.split_once(ARCHIVE_SEPARATOR) {
            Some((archive, member)) => (archive, Some(member.trim_start_matches('/').to_string())),
            None => (inner, None),
        };
        let path = Url::parse(archive).ok()?.to_file_path().ok()?;
        Some((path, member))
    }

    /// The URI as a string
    pub fn as_str(&self) -> &str {
        self.0.as_str()
    }
}

impl fmt::Display for ModuleUri {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.0.as_str())
    }
}

impl From<Url> for ModuleUri {
    fn from(url: Url) -> Self {
        Self(url)
    }
}
