//! Process-wide cache of module records
//!
//! Records are keyed by URI. Alongside each record the cache tracks which
//! modules it imports (`loaded_from`) and which modules import it
//! (`needed_by`); the two maps mirror each other:
//! `D ∈ loaded_from(M) ⇔ M ∈ needed_by(D)`.
//!
//! Removing a module also evicts every dependency no other cached module
//! still needs.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use dashmap::DashMap;
use once_cell::sync::Lazy;
use parking_lot::Mutex;
use rustc_hash::{FxHashMap, FxHashSet};

use crate::uri::ModuleUri;

use super::record::ModuleRecord;

static GLOBAL: Lazy<ModuleRecordCache> = Lazy::new(ModuleRecordCache::new);

/// Dependency edges between cached modules
#[derive(Debug, Default)]
struct DependencyEdges {
    loaded_from: FxHashMap<ModuleUri, FxHashSet<ModuleUri>>,
    needed_by: FxHashMap<ModuleUri, FxHashSet<ModuleUri>>,
}

impl DependencyEdges {
    fn unlink(&mut self, dependent: &ModuleUri, dependency: &ModuleUri) -> bool {
        let Some(dependents) = self.needed_by.get_mut(dependency) else {
            return false;
        };
        dependents.remove(dependent);
        if dependents.is_empty() {
            self.needed_by.remove(dependency);
            return true;
        }
        false
    }

    /// Every `loaded_from` edge has its `needed_by` mirror and vice versa
    fn is_mirrored(&self) -> bool {
        let forward = self
            .loaded_from
            .iter()
            .all(|(m, deps)| deps.iter().all(|d| self.needed_by.get(d).is_some_and(|n| n.contains(m))));
        let backward = self
            .needed_by
            .iter()
            .all(|(d, users)| users.iter().all(|m| self.loaded_from.get(m).is_some_and(|l| l.contains(d))));
        forward && backward
    }
}

/// Cache statistics
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CacheStats {
    /// Number of cached records
    pub entries: usize,
    /// Number of cache hits
    pub hits: usize,
    /// Number of cache misses
    pub misses: usize,
}

impl CacheStats {
    /// Get the hit rate (0.0 - 1.0)
    pub fn hit_rate(&self) -> f64 {
        let total = self.hits + self.misses;
        if total == 0 {
            0.0
        } else {
            self.hits as f64 / total as f64
        }
    }
}

/// URI-keyed record cache with dependency bookkeeping
#[derive(Debug, Default)]
pub struct ModuleRecordCache {
    records: DashMap<ModuleUri, Arc<ModuleRecord>>,
    /// Held for the whole of every insert and removal
    edges: Mutex<DependencyEdges>,
    hits: AtomicUsize,
    misses: AtomicUsize,
}

impl ModuleRecordCache {
    /// Create an empty cache
    pub fn new() -> Self {
        Self::default()
    }

    /// The process-wide cache
    pub fn global() -> &'static ModuleRecordCache {
        &GLOBAL
    }

    /// Add or replace a record with the modules it imports
    ///
    /// Replacing a record swaps its outgoing edges; modules it no longer
    /// imports stay cached.
    pub fn insert(&self, record: Arc<ModuleRecord>, dependencies: impl IntoIterator<Item = ModuleUri>) {
        let uri = record.uri().clone();
        let dependencies: FxHashSet<ModuleUri> = dependencies.into_iter().collect();

        let mut edges = self.edges.lock();
        if let Some(previous) = edges.loaded_from.remove(&uri) {
            for dependency in &previous {
                edges.unlink(&uri, dependency);
            }
        }
        for dependency in &dependencies {
            edges.needed_by.entry(dependency.clone()).or_default().insert(uri.clone());
        }
        tracing::trace!(%uri, dependencies = dependencies.len(), "cached module record");
        edges.loaded_from.insert(uri.clone(), dependencies);
        self.records.insert(uri, record);
    }

    /// Get a record, counting the lookup as a hit or miss
    pub fn get(&self, uri: &ModuleUri) -> Option<Arc<ModuleRecord>> {
        match self.records.get(uri) {
            Some(record) => {
                self.hits.fetch_add(1, Ordering::Relaxed);
                tracing::trace!(%uri, "module cache hit");
                Some(Arc::clone(record.value()))
            }
            None => {
                self.misses.fetch_add(1, Ordering::Relaxed);
                tracing::trace!(%uri, "module cache miss");
                None
            }
        }
    }

    /// Check if a module is cached
    pub fn contains(&self, uri: &ModuleUri) -> bool {
        self.records.contains_key(uri)
    }

    /// Remove a module and every dependency left without dependents
    ///
    /// Returns the URIs evicted, starting with `uri`; empty when `uri` was not
    /// cached.
    pub fn remove(&self, uri: &ModuleUri) -> Vec<ModuleUri> {
        let mut edges = self.edges.lock();
        self.remove_locked(&mut edges, uri)
    }

    /// Remove a module and every module that transitively imports it
    ///
    /// Each removal cascades like [`remove`](Self::remove). Returns every
    /// URI evicted.
    pub fn invalidate(&self, uri: &ModuleUri) -> Vec<ModuleUri> {
        let mut edges = self.edges.lock();

        let mut affected = vec![uri.clone()];
        let mut seen: FxHashSet<ModuleUri> = FxHashSet::default();
        seen.insert(uri.clone());
        let mut cursor = 0;
        while cursor < affected.len() {
            if let Some(dependents) = edges.needed_by.get(&affected[cursor]) {
                for dependent in dependents {
                    if seen.insert(dependent.clone()) {
                        affected.push(dependent.clone());
                    }
                }
            }
            cursor += 1;
        }

        let mut evicted = Vec::new();
        for module in affected.iter().rev() {
            evicted.extend(self.remove_locked(&mut edges, module));
        }
        tracing::debug!(%uri, evicted = evicted.len(), "invalidated module");
        evicted
    }

    fn remove_locked(&self, edges: &mut DependencyEdges, uri: &ModuleUri) -> Vec<ModuleUri> {
        let mut evicted = Vec::new();
        let mut pending = vec![uri.clone()];

        while let Some(current) = pending.pop() {
            if self.records.remove(&current).is_none() {
                continue;
            }
            evicted.push(current.clone());

            // Modules that imported this one lose the edge
            if let Some(dependents) = edges.needed_by.remove(&current) {
                for dependent in dependents {
                    if let Some(deps) = edges.loaded_from.get_mut(&dependent) {
                        deps.remove(&current);
                    }
                }
            }

            if let Some(dependencies) = edges.loaded_from.remove(&current) {
                for dependency in dependencies {
                    if dependency != current && edges.unlink(&current, &dependency) {
                        pending.push(dependency);
                    }
                }
            }
        }

        debug_assert!(edges.is_mirrored(), "dependency edges diverged after evicting {uri}");
        if !evicted.is_empty() {
            tracing::debug!(%uri, cascaded = evicted.len() - 1, "evicted module record");
        }
        evicted
    }

    /// Modules a cached module imports
    pub fn dependencies(&self, uri: &ModuleUri) -> Vec<ModuleUri> {
        let edges = self.edges.lock();
        let mut deps: Vec<_> = edges.loaded_from.get(uri).into_iter().flatten().cloned().collect();
        deps.sort();
        deps
    }

    /// Cached modules that import `uri`
    pub fn dependents(&self, uri: &ModuleUri) -> Vec<ModuleUri> {
        let edges = self.edges.lock();
        let mut deps: Vec<_> = edges.needed_by.get(uri).into_iter().flatten().cloned().collect();
        deps.sort();
        deps
    }

    /// Verify that `loaded_from` and `needed_by` mirror each other
    pub fn check_consistency(&self) -> bool {
        self.edges.lock().is_mirrored()
    }

    /// Clear the cache and its statistics
    pub fn clear(&self) {
        let mut edges = self.edges.lock();
        self.records.clear();
        *edges = DependencyEdges::default();
        self.hits.store(0, Ordering::Relaxed);
        self.misses.store(0, Ordering::Relaxed);
    }

    /// Get cache statistics
    pub fn stats(&self) -> CacheStats {
        CacheStats {
            entries: self.records.len(),
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
        }
    }

    /// Get the number of cached modules
    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// Check if the cache is empty
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}
