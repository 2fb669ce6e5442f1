//! Module graph discovery
//!
//! Starting from a root module, the crawler finds the source of every import,
//! parses each distinct URI once (or reuses a cached record) and records the
//! dependency edges. Import cycles are safe: a URI already queued or loaded is
//! never enqueued again.

use std::collections::VecDeque;
use std::sync::Arc;

use rustc_hash::{FxHashMap, FxHashSet};

use crate::ast::Binding;
use crate::error::ModuleResult;
use crate::import_path::ImportPath;
use crate::source::ModuleSource;
use crate::uri::ModuleUri;

use super::cache::ModuleRecordCache;
use super::finder::ModuleFinder;
use super::record::{ModuleParser, ModuleRecord};

/// Crawl state of a module; absent means unseen
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum CrawlState {
    Queued,
    Loaded,
}

/// The reachable module graph
#[derive(Debug)]
pub struct CrawlResult {
    /// Root module
    pub root: ModuleUri,
    /// Every reachable module
    pub modules: FxHashMap<ModuleUri, Arc<ModuleRecord>>,
    /// Modules in discovery order, root first
    pub order: Vec<ModuleUri>,
    /// Modules each module imports, in import order
    pub dependencies: FxHashMap<ModuleUri, Vec<ModuleUri>>,
}

impl CrawlResult {
    /// Root record
    pub fn root_record(&self) -> Option<&Arc<ModuleRecord>> {
        self.modules.get(&self.root)
    }

    /// Records in discovery order
    pub fn records(&self) -> impl Iterator<Item = &Arc<ModuleRecord>> {
        self.order.iter().filter_map(|uri| self.modules.get(uri))
    }
}

/// Import paths of a record with the sources they were found at
type FoundImports = Vec<(ImportPath, ModuleSource)>;

/// Work state of a single crawl
struct Walk {
    states: FxHashMap<ModuleUri, CrawlState>,
    queue: VecDeque<ModuleSource>,
    sources: FxHashMap<ModuleUri, ModuleSource>,
    /// Modules taken from the cache as they were
    reused: FxHashSet<ModuleUri>,
    result: CrawlResult,
}

impl Walk {
    fn new(root: ModuleSource) -> Self {
        let root_uri = root.uri().clone();
        let mut states = FxHashMap::default();
        states.insert(root_uri.clone(), CrawlState::Queued);
        Self {
            states,
            queue: VecDeque::from([root]),
            sources: FxHashMap::default(),
            reused: FxHashSet::default(),
            result: CrawlResult {
                root: root_uri,
                modules: FxHashMap::default(),
                order: Vec::new(),
                dependencies: FxHashMap::default(),
            },
        }
    }

    /// Record a loaded module and queue the imports not seen yet
    fn visit(&mut self, source: ModuleSource, record: Arc<ModuleRecord>, imports: FoundImports, reused: bool) {
        let uri = record.uri().clone();
        let dependencies = bind_imports(&record, imports);
        for (dependency, dependency_source) in &dependencies {
            if !self.states.contains_key(dependency) {
                self.states.insert(dependency.clone(), CrawlState::Queued);
                self.queue.push_back(dependency_source.clone());
            }
        }

        self.states.insert(uri.clone(), CrawlState::Loaded);
        if reused {
            self.reused.insert(uri.clone());
        } else {
            self.reused.remove(&uri);
        }
        self.sources.insert(uri.clone(), source);
        self.result
            .dependencies
            .insert(uri.clone(), dependencies.into_iter().map(|(uri, _)| uri).collect());
        if !self.result.modules.contains_key(&uri) {
            self.result.order.push(uri.clone());
        }
        self.result.modules.insert(uri, record);
    }

    /// Reused records whose imports point at declarations this crawl no
    /// longer has
    fn stale_records(&self) -> Vec<ModuleUri> {
        self.result
            .order
            .iter()
            .filter(|uri| self.reused.contains(*uri))
            .filter(|uri| {
                self.result
                    .modules
                    .get(*uri)
                    .is_some_and(|record| !imports_current(record, &self.result.modules))
            })
            .cloned()
            .collect()
    }
}

/// Whether every bound import of `record` targets a declaration of the
/// matching record in `modules`
fn imports_current(record: &ModuleRecord, modules: &FxHashMap<ModuleUri, Arc<ModuleRecord>>) -> bool {
    record.symbols().imports().all(|imported| match &imported.target {
        Binding::Resolved(target) => modules
            .get(&target.module)
            .and_then(|module| module.program().declaration(&target.declaration.name))
            .is_some_and(|declaration| Arc::ptr_eq(declaration, &target.declaration)),
        Binding::Unresolved => true,
    })
}

/// Bind the record's import entries to the modules found for them
///
/// Returns the distinct dependencies in import order.
fn bind_imports(record: &ModuleRecord, imports: FoundImports) -> Vec<(ModuleUri, ModuleSource)> {
    let mut symbols = record.symbols_mut();
    let mut dependencies: Vec<(ModuleUri, ModuleSource)> = Vec::new();
    for (path, source) in imports {
        symbols.bind_import_module(&path, source.uri());
        if !dependencies.iter().any(|(uri, _)| uri == source.uri()) {
            dependencies.push((source.uri().clone(), source));
        }
    }
    dependencies
}

/// Materializes the module graph reachable from a root
pub struct ModuleCrawler<'a, P> {
    finder: &'a ModuleFinder,
    parser: &'a P,
    cache: Option<&'a ModuleRecordCache>,
}

impl<'a, P: ModuleParser> ModuleCrawler<'a, P> {
    /// Create a crawler that always parses
    pub fn new(finder: &'a ModuleFinder, parser: &'a P) -> Self {
        Self {
            finder,
            parser,
            cache: None,
        }
    }

    /// Reuse records from `cache` instead of parsing them again
    ///
    /// A cached record is only reused while its cached dependencies match the
    /// modules its imports resolve to now, and while the records it was
    /// linked against are the ones this crawl uses.
    pub fn with_cache(mut self, cache: &'a ModuleRecordCache) -> Self {
        self.cache = Some(cache);
        self
    }

    /// Crawl everything reachable from `root`
    ///
    /// Finder and parser errors abort the crawl.
    pub fn crawl(&self, root: ModuleSource) -> ModuleResult<CrawlResult> {
        let mut walk = Walk::new(root);

        loop {
            while let Some(source) = walk.queue.pop_front() {
                let (record, imports, reused) = self.load(&source)?;
                walk.visit(source, record, imports, reused);
            }

            let stale = walk.stale_records();
            if stale.is_empty() {
                break;
            }
            for uri in stale {
                let Some(source) = walk.sources.get(&uri).cloned() else {
                    continue;
                };
                tracing::debug!(%uri, "cached record links to replaced modules, reparsing");
                let record = Arc::new(self.parser.parse_module(&source)?);
                let imports = self.find_imports(&record)?;
                walk.visit(source, record, imports, false);
            }
        }

        debug_assert!(walk.states.values().all(|s| *s == CrawlState::Loaded));
        let result = walk.result;
        tracing::debug!(root = %result.root, modules = result.order.len(), "crawled module graph");
        Ok(result)
    }

    fn load(&self, source: &ModuleSource) -> ModuleResult<(Arc<ModuleRecord>, FoundImports, bool)> {
        if let Some(cache) = self.cache {
            if let Some(record) = cache.get(source.uri()) {
                let imports = self.find_imports(&record)?;
                if matches_cached_edges(cache, &record, &imports) {
                    return Ok((record, imports, true));
                }
                tracing::debug!(uri = %source.uri(), "cached record has different dependencies, reparsing");
            }
        }
        tracing::debug!(uri = %source.uri(), "loading module");
        let record = Arc::new(self.parser.parse_module(source)?);
        let imports = self.find_imports(&record)?;
        Ok((record, imports, false))
    }

    /// Find the source of every distinct import path of a record
    fn find_imports(&self, record: &ModuleRecord) -> ModuleResult<FoundImports> {
        let mut found: FoundImports = Vec::new();
        for import in record.program().imports() {
            if found.iter().any(|(path, _)| path == &import.path) {
                continue;
            }
            let source = self.finder.find(record.uri(), &import.path)?;
            found.push((import.path.clone(), source));
        }
        Ok(found)
    }
}

/// Whether the cache still holds every dependency a cached record was stored
/// with, and those are exactly the modules its imports resolve to now
fn matches_cached_edges(cache: &ModuleRecordCache, record: &ModuleRecord, imports: &FoundImports) -> bool {
    let cached = cache.dependencies(record.uri());
    if !cached.iter().all(|dependency| cache.contains(dependency)) {
        return false;
    }
    let mut found: Vec<ModuleUri> = imports.iter().map(|(_, source)| source.uri().clone()).collect();
    found.sort();
    found.dedup();
    found == cached
}
