//! Resolution sessions
//!
//! A session ties a finder, a parser and a record cache together: it crawls
//! the graph below a root, resolves it, and publishes the resolved records to
//! the cache.

use std::path::Path;
use std::sync::Arc;

use rustc_hash::FxHashMap;

use crate::config::ModuleConfig;
use crate::error::{ModuleError, ModuleResult};
use crate::source::ModuleSource;
use crate::uri::ModuleUri;

use super::cache::ModuleRecordCache;
use super::crawler::ModuleCrawler;
use super::finder::ModuleFinder;
use super::record::{ModuleParser, ModuleRecord};
use super::resolver::{ResolutionReport, SymbolReferenceResolver};
use super::symbols::SymbolTable;

/// A fully linked program
#[derive(Debug)]
pub struct LoadedProgram {
    root: Arc<ModuleRecord>,
    modules: FxHashMap<ModuleUri, Arc<ModuleRecord>>,
    order: Vec<ModuleUri>,
    dependencies: FxHashMap<ModuleUri, Vec<ModuleUri>>,
    report: ResolutionReport,
}

impl LoadedProgram {
    /// Root module
    pub fn root(&self) -> &Arc<ModuleRecord> {
        &self.root
    }

    /// A module of the program
    pub fn module(&self, uri: &ModuleUri) -> Option<&Arc<ModuleRecord>> {
        self.modules.get(uri)
    }

    /// Modules in discovery order, root first
    pub fn modules(&self) -> impl Iterator<Item = &Arc<ModuleRecord>> {
        self.order.iter().filter_map(|uri| self.modules.get(uri))
    }

    /// Snapshot of a module's symbol table
    pub fn symbol_table(&self, uri: &ModuleUri) -> Option<SymbolTable> {
        self.modules.get(uri).map(|record| record.symbols().clone())
    }

    /// Modules `uri` imports
    pub fn dependencies(&self, uri: &ModuleUri) -> &[ModuleUri] {
        self.dependencies.get(uri).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Bindings made while loading
    pub fn report(&self) -> ResolutionReport {
        self.report
    }

    /// Number of modules
    pub fn len(&self) -> usize {
        self.modules.len()
    }

    /// Whether the program has no modules
    pub fn is_empty(&self) -> bool {
        self.modules.is_empty()
    }
}

/// Loads and links programs
pub struct ModuleSession<'c, P> {
    finder: ModuleFinder,
    parser: P,
    cache: &'c ModuleRecordCache,
}

impl<P: ModuleParser> ModuleSession<'static, P> {
    /// Create a session backed by the process-wide cache
    pub fn new(config: ModuleConfig, parser: P) -> Self {
        Self::with_cache(config, parser, ModuleRecordCache::global())
    }
}

impl<'c, P: ModuleParser> ModuleSession<'c, P> {
    /// Create a session backed by the given cache
    pub fn with_cache(config: ModuleConfig, parser: P, cache: &'c ModuleRecordCache) -> Self {
        Self {
            finder: ModuleFinder::new(config),
            parser,
            cache,
        }
    }

    /// Module finder
    pub fn finder(&self) -> &ModuleFinder {
        &self.finder
    }

    /// Front end
    pub fn parser(&self) -> &P {
        &self.parser
    }

    /// Record cache
    pub fn cache(&self) -> &'c ModuleRecordCache {
        self.cache
    }

    /// Load, resolve and cache the program rooted at `root`
    ///
    /// Nothing is cached unless the whole graph resolves.
    pub fn load(&self, root: ModuleSource) -> ModuleResult<LoadedProgram> {
        let graph = ModuleCrawler::new(&self.finder, &self.parser)
            .with_cache(self.cache)
            .crawl(root)?;
        let report = SymbolReferenceResolver::new(&graph).resolve()?;

        for uri in &graph.order {
            if let Some(record) = graph.modules.get(uri) {
                let dependencies = graph.dependencies.get(uri).cloned().unwrap_or_default();
                self.cache.insert(Arc::clone(record), dependencies);
            }
        }

        let root = graph
            .root_record()
            .cloned()
            .ok_or_else(|| ModuleError::IllegalOperation(format!("root module {} was not loaded", graph.root)))?;
        tracing::debug!(root = %root.uri(), modules = graph.order.len(), "loaded program");
        Ok(LoadedProgram {
            root,
            modules: graph.modules,
            order: graph.order,
            dependencies: graph.dependencies,
            report,
        })
    }

    /// Load the program rooted at a file
    pub fn load_path(&self, path: &Path) -> ModuleResult<LoadedProgram> {
        self.load(ModuleSource::file(path)?)
    }
}
