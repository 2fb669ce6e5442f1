//! Import path resolution
//!
//! Maps an import statement's target to a concrete [`ModuleSource`].
//!
//! # Resolution Order
//! For a relative import `.a.b` inside `/proj/pkg/main.ol`:
//! 1. Step up one directory per extra leading dot
//! 2. Try `/proj/pkg/a/b.ol`
//! 3. Try `/proj/pkg/a/b/main.ol`
//!
//! For an absolute import `p.q`:
//! 1. Join under the working directory
//! 2. Member `q.ol` of `<working dir>/lib/p.jap`
//! 3. Join under each package root, in order

use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::config::ModuleConfig;
use crate::error::{ModuleError, ModuleResult};
use crate::import_path::ImportPath;
use crate::source::{archive_contains, ArchiveEntry, ModuleSource};
use crate::uri::ModuleUri;

/// Module finder for import paths
#[derive(Debug, Clone)]
pub struct ModuleFinder {
    config: Arc<ModuleConfig>,
    package_paths: Vec<PathBuf>,
}

impl ModuleFinder {
    /// Create a finder for the given configuration
    pub fn new(config: ModuleConfig) -> Self {
        let package_paths = config.resolved_package_paths();
        Self {
            config: Arc::new(config),
            package_paths,
        }
    }

    /// Search configuration
    pub fn config(&self) -> &ModuleConfig {
        &self.config
    }

    /// Resolve `path` as imported from the module at `origin`
    pub fn find(&self, origin: &ModuleUri, path: &ImportPath) -> ModuleResult<ModuleSource> {
        let mut tried = Vec::new();

        let found = if path.is_relative() {
            if origin.is_archive() {
                self.find_relative_in_archive(origin, path, &mut tried)
            } else if let Some(origin_path) = origin.to_file_path() {
                self.find_relative(&origin_path, path, &mut tried)
            } else {
                tried.push(origin.to_string());
                None
            }
        } else {
            self.find_absolute(path, &mut tried)
        };

        match found {
            Some(source) => {
                tracing::debug!(%origin, import = %path, found = %source.uri(), "resolved import");
                Ok(source)
            }
            None => {
                tracing::debug!(%origin, import = %path, ?tried, "import not found");
                Err(ModuleError::ModuleNotFound {
                    path: path.clone(),
                    tried,
                })
            }
        }
    }

    fn find_relative(&self, origin: &Path, path: &ImportPath, tried: &mut Vec<String>) -> Option<ModuleSource> {
        let mut base = if origin.is_dir() {
            origin.to_path_buf()
        } else {
            origin.parent()?.to_path_buf()
        };
        for _ in 0..path.directory_levels() {
            if let Some(parent) = base.parent() {
                base = parent.to_path_buf();
            }
        }
        self.lookup(&base, path.segments(), tried)
    }

    /// Relative imports inside an archive stay inside that archive
    fn find_relative_in_archive(
        &self,
        origin: &ModuleUri,
        path: &ImportPath,
        tried: &mut Vec<String>,
    ) -> Option<ModuleSource> {
        let (archive, member) = origin.archive_parts()?;
        let member = member.unwrap_or_default();
        let suffix = format!(".{}", self.config.source_extension);

        let mut dir: Vec<&str> = member.split('/').filter(|p| !p.is_empty()).collect();
        if member.ends_with(&suffix) {
            dir.pop();
        }
        for _ in 0..path.directory_levels() {
            dir.pop();
        }

        let segments = path.segments();
        let mut parts: Vec<String> = dir.iter().map(|p| p.to_string()).collect();
        parts.extend(segments.iter().cloned());
        let target = format!("{}{}", parts.join("/"), suffix);

        tried.push(
            ModuleUri::archive_member(&archive, &target)
                .map(|u| u.to_string())
                .unwrap_or_else(|| target.clone()),
        );
        if !archive_contains(&archive, &target) {
            return None;
        }
        ModuleSource::archive(&archive, ArchiveEntry::Member(&target), &self.config).ok()
    }

    fn find_absolute(&self, path: &ImportPath, tried: &mut Vec<String>) -> Option<ModuleSource> {
        // 1. Working directory
        if let Some(source) = self.lookup(&self.config.working_directory, path.segments(), tried) {
            return Some(source);
        }

        // 2. <working dir>/lib/FIRST.jap with member REST
        if let Some(source) = self.lookup_library(path, tried) {
            return Some(source);
        }

        // 3. Package roots
        for root in &self.package_paths {
            if let Some(source) = self.lookup(root, path.segments(), tried) {
                return Some(source);
            }
        }

        None
    }

    fn lookup_library(&self, path: &ImportPath, tried: &mut Vec<String>) -> Option<ModuleSource> {
        let segments = path.segments();
        let (library, rest) = segments.split_first()?;
        let archive = self
            .config
            .working_directory
            .join(&self.config.archive.directory)
            .join(self.config.archive_file_name(library));

        let member = rest.join("/");
        tried.push(if member.is_empty() {
            archive.display().to_string()
        } else {
            format!("{}!/{}", archive.display(), self.config.source_file_name(&member))
        });
        if !archive.is_file() {
            return None;
        }

        let entry = if member.is_empty() {
            ArchiveEntry::Main
        } else {
            ArchiveEntry::Member(&member)
        };
        match ModuleSource::archive(&archive, entry, &self.config) {
            Ok(source) => Some(source),
            Err(err) => {
                tracing::trace!(archive = %archive.display(), error = %err, "library lookup failed");
                None
            }
        }
    }

    /// Join packages under `base`, then look up the module file
    fn lookup(&self, base: &Path, segments: &[String], tried: &mut Vec<String>) -> Option<ModuleSource> {
        let (name, packages) = segments.split_last()?;
        let mut dir = base.to_path_buf();
        for package in packages {
            dir.push(package);
        }

        let candidate = dir.join(self.config.source_file_name(name));
        tried.push(candidate.display().to_string());
        if candidate.is_file() {
            return ModuleSource::file(&candidate).ok();
        }

        // Directory module: <name>/main.ol
        let module_dir = dir.join(name);
        if module_dir.is_dir() {
            let candidate = module_dir.join(self.config.source_file_name(&self.config.default_module));
            tried.push(candidate.display().to_string());
            if candidate.is_file() {
                return ModuleSource::file(&candidate).ok();
            }
        }

        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    fn touch(path: &Path) {
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, "").unwrap();
    }

    fn uri(path: &Path) -> ModuleUri {
        ModuleUri::from_file_path(&path.canonicalize().unwrap()).unwrap()
    }

    fn found_path(source: &ModuleSource) -> PathBuf {
        source.uri().to_file_path().unwrap()
    }

    #[test]
    fn test_relative_same_directory() {
        let dir = TempDir::new().unwrap();
        let root = dir.path().canonicalize().unwrap();
        touch(&root.join("proj/pkg/main.ol"));
        touch(&root.join("proj/pkg/a/b.ol"));

        let finder = ModuleFinder::new(ModuleConfig::new(&root));
        let source = finder
            .find(&uri(&root.join("proj/pkg/main.ol")), &ImportPath::parse(".a.b"))
            .unwrap();
        assert_eq!(found_path(&source), root.join("proj/pkg/a/b.ol"));
    }

    #[test]
    fn test_relative_parent_directory() {
        let dir = TempDir::new().unwrap();
        let root = dir.path().canonicalize().unwrap();
        touch(&root.join("proj/pkg/main.ol"));
        touch(&root.join("proj/c.ol"));

        let finder = ModuleFinder::new(ModuleConfig::new(&root));
        let source = finder
            .find(&uri(&root.join("proj/pkg/main.ol")), &ImportPath::parse("..c"))
            .unwrap();
        assert_eq!(found_path(&source), root.join("proj/c.ol"));
    }

    #[test]
    fn test_relative_from_directory_origin() {
        let dir = TempDir::new().unwrap();
        let root = dir.path().canonicalize().unwrap();
        touch(&root.join("pkg/x.ol"));

        let finder = ModuleFinder::new(ModuleConfig::new(&root));
        let origin = ModuleUri::from_file_path(&root.join("pkg")).unwrap();
        let source = finder.find(&origin, &ImportPath::parse(".x")).unwrap();
        assert_eq!(found_path(&source), root.join("pkg/x.ol"));
    }

    #[test]
    fn test_directory_module() {
        let dir = TempDir::new().unwrap();
        let root = dir.path().canonicalize().unwrap();
        touch(&root.join("main.ol"));
        touch(&root.join("net/main.ol"));

        let finder = ModuleFinder::new(ModuleConfig::new(&root));
        let source = finder.find(&uri(&root.join("main.ol")), &ImportPath::parse(".net")).unwrap();
        assert_eq!(found_path(&source), root.join("net/main.ol"));
    }

    #[test]
    fn test_working_directory_beats_package_root() {
        let dir = TempDir::new().unwrap();
        let root = dir.path().canonicalize().unwrap();
        touch(&root.join("work/p/q.ol"));
        touch(&root.join("packages/p/q.ol"));

        let config = ModuleConfig::new(root.join("work")).with_package_path(root.join("packages"));
        let finder = ModuleFinder::new(config);
        let origin = uri(&root.join("work/p/q.ol"));

        let source = finder.find(&origin, &ImportPath::parse("p.q")).unwrap();
        assert_eq!(found_path(&source), root.join("work/p/q.ol"));
    }

    #[test]
    fn test_package_roots_in_order() {
        let dir = TempDir::new().unwrap();
        let root = dir.path().canonicalize().unwrap();
        fs::create_dir_all(root.join("work")).unwrap();
        touch(&root.join("first/p/q.ol"));
        touch(&root.join("second/p/q.ol"));

        let config = ModuleConfig::new(root.join("work"))
            .with_package_path(root.join("missing"))
            .with_package_path(root.join("first"))
            .with_package_path(root.join("second"));
        let finder = ModuleFinder::new(config);
        let origin = ModuleUri::from_file_path(&root.join("work")).unwrap();

        let source = finder.find(&origin, &ImportPath::parse("p.q")).unwrap();
        assert_eq!(found_path(&source), root.join("first/p/q.ol"));
    }

    #[test]
    fn test_not_found_accumulates_locations() {
        let dir = TempDir::new().unwrap();
        let root = dir.path().canonicalize().unwrap();
        fs::create_dir_all(root.join("work")).unwrap();

        let config = ModuleConfig::new(root.join("work")).with_package_path(root.join("packages"));
        let finder = ModuleFinder::new(config);
        let origin = ModuleUri::from_file_path(&root.join("work")).unwrap();

        match finder.find(&origin, &ImportPath::parse("p.q")) {
            Err(ModuleError::ModuleNotFound { path, tried }) => {
                assert_eq!(path.to_string(), "p.q");
                assert_eq!(tried.len(), 3);
                assert!(tried[0].ends_with("work/p/q.ol"));
                assert!(tried[1].contains("p.jap"));
                assert!(tried[2].ends_with("packages/p/q.ol"));
            }
            other => panic!("expected ModuleNotFound, got {other:?}"),
        }
    }

    #[test]
    fn test_relative_from_opaque_uri_fails() {
        let finder = ModuleFinder::new(ModuleConfig::new("/"));
        let origin = ModuleUri::parse("memory:/main").unwrap();
        let result = finder.find(&origin, &ImportPath::parse(".x"));
        assert!(matches!(result, Err(ModuleError::ModuleNotFound { .. })));
    }
}
