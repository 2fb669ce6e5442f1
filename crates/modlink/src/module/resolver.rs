//! Symbol reference resolution
//!
//! Runs over a crawled module graph in two passes:
//!
//! 1. **Imports.** Every imported symbol is followed through the module it is
//!    imported from until a local declaration is reached. Wildcard imports are
//!    then expanded into one imported entry per public symbol of their target.
//! 2. **Links.** Every link node (type names, port interfaces, embedded
//!    services) is bound to the declaration its name denotes in the module
//!    that contains it. Once every link is bound, services embedded in an
//!    output port (`embed S in P`) lend the interfaces of their `local` input
//!    ports to `P`.
//!
//! Errors from the whole graph are collected and reported together. Bindings
//! are set once, so resolving an already resolved graph is a no-op.

use std::sync::Arc;

use rustc_hash::{FxHashMap, FxHashSet};

use crate::ast::{
    for_each_link, AccessModifier, Binding, Declaration, DeclarationKind, ServiceItem, SymbolLink, TypeDefinition,
};
use crate::error::{ModuleError, ModuleResult};
use crate::uri::ModuleUri;

use super::crawler::CrawlResult;
use super::record::ModuleRecord;
use super::symbols::{ImportedSymbol, ResolvedSymbol, SymbolInfo};

/// What one resolution run changed
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ResolutionReport {
    /// Imported symbols bound to their declaration
    pub imports: usize,
    /// Entries added by expanding wildcard imports
    pub wildcard_symbols: usize,
    /// Link nodes bound
    pub links: usize,
    /// Embeddings whose output port received the embedded service's
    /// interfaces
    pub port_bindings: usize,
}

impl ResolutionReport {
    /// Total number of bindings made
    pub fn changes(&self) -> usize {
        self.imports + self.wildcard_symbols + self.links + self.port_bindings
    }

    /// Whether the run changed nothing
    pub fn is_empty(&self) -> bool {
        self.changes() == 0
    }
}

/// Why an exported-symbol lookup failed
enum LookupFailure {
    NotFound,
    Private,
}

/// Outcome of looking a link name up in one table
enum TableLookup {
    Found(ResolvedSymbol),
    /// Names an import that did not resolve; already reported in pass 1
    Unresolved,
    Missing,
}

/// Resolves every cross-module reference of a module graph
pub struct SymbolReferenceResolver<'a> {
    modules: &'a FxHashMap<ModuleUri, Arc<ModuleRecord>>,
    order: &'a [ModuleUri],
    errors: Vec<ModuleError>,
    report: ResolutionReport,
}

impl<'a> SymbolReferenceResolver<'a> {
    /// Create a resolver over a crawled graph
    pub fn new(graph: &'a CrawlResult) -> Self {
        Self::with_modules(&graph.modules, &graph.order)
    }

    /// Create a resolver over explicit modules, visited in `order`
    pub fn with_modules(modules: &'a FxHashMap<ModuleUri, Arc<ModuleRecord>>, order: &'a [ModuleUri]) -> Self {
        Self {
            modules,
            order,
            errors: Vec::new(),
            report: ResolutionReport::default(),
        }
    }

    /// Resolve the graph
    ///
    /// Returns every error found, aggregated into [`ModuleError::Multiple`]
    /// when there is more than one.
    pub fn resolve(mut self) -> ModuleResult<ResolutionReport> {
        self.resolve_imports();
        self.expand_wildcards();
        self.resolve_links();
        self.bind_embedded_ports();

        for error in &self.errors {
            tracing::warn!(%error, "resolution error");
        }
        tracing::debug!(
            imports = self.report.imports,
            wildcard_symbols = self.report.wildcard_symbols,
            links = self.report.links,
            port_bindings = self.report.port_bindings,
            errors = self.errors.len(),
            "resolved module graph"
        );
        ModuleError::from_accumulated(self.errors)?;
        Ok(self.report)
    }

    fn resolve_imports(&mut self) {
        let modules = self.modules;
        for uri in self.order {
            let Some(record) = modules.get(uri) else {
                continue;
            };
            let pending: Vec<ImportedSymbol> = record
                .symbols()
                .imports()
                .filter(|imported| !imported.target.is_resolved())
                .cloned()
                .collect();

            for imported in pending {
                match self.resolve_import(&imported) {
                    Ok(target) => {
                        let mut symbols = record.symbols_mut();
                        if let Some(SymbolInfo::Imported(entry)) = symbols.get_mut(&imported.name) {
                            if !entry.target.is_resolved() {
                                tracing::trace!(module = %uri, name = %imported.name, "resolved import");
                                entry.target = Binding::Resolved(target);
                                self.report.imports += 1;
                            }
                        }
                    }
                    Err(error) => self.errors.push(error),
                }
            }
        }
    }

    fn resolve_import(&self, imported: &ImportedSymbol) -> ModuleResult<ResolvedSymbol> {
        let not_found = || ModuleError::SymbolNotFound {
            name: imported.original_name.clone(),
            path: Some(imported.import_path.clone()),
            context: imported.context.clone(),
        };
        let Some(module) = imported.module.resolved() else {
            return Err(not_found());
        };

        let mut visited = FxHashSet::default();
        match self.lookup_export(module, &imported.original_name, &mut visited) {
            Ok(target) => Ok(target),
            Err(LookupFailure::NotFound) => Err(not_found()),
            Err(LookupFailure::Private) => Err(ModuleError::IllegalAccess {
                name: imported.original_name.clone(),
                path: imported.import_path.clone(),
                context: imported.context.clone(),
            }),
        }
    }

    /// Follow `name` from `module` to the declaration it denotes
    ///
    /// Reaching a module twice means the imports form a cycle.
    fn lookup_export(
        &self,
        module: &ModuleUri,
        name: &str,
        visited: &mut FxHashSet<ModuleUri>,
    ) -> Result<ResolvedSymbol, LookupFailure> {
        if !visited.insert(module.clone()) {
            return Err(LookupFailure::NotFound);
        }
        let record = self.modules.get(module).ok_or(LookupFailure::NotFound)?;

        let (next, wildcards) = {
            let symbols = record.symbols();
            match symbols.get(name) {
                Some(SymbolInfo::Local(local)) => {
                    if local.access() == AccessModifier::Private {
                        return Err(LookupFailure::Private);
                    }
                    return Ok(ResolvedSymbol {
                        module: module.clone(),
                        declaration: Arc::clone(&local.declaration),
                    });
                }
                Some(SymbolInfo::Imported(imported)) => {
                    if let Binding::Resolved(target) = &imported.target {
                        return Ok(target.clone());
                    }
                    match &imported.module {
                        Binding::Resolved(origin) => (Some((origin.clone(), imported.original_name.clone())), Vec::new()),
                        Binding::Unresolved => return Err(LookupFailure::NotFound),
                    }
                }
                None => (
                    None,
                    symbols
                        .wildcards()
                        .iter()
                        .filter_map(|w| w.module.resolved().cloned())
                        .collect::<Vec<_>>(),
                ),
            }
        };

        if let Some((origin, original)) = next {
            return self.lookup_export(&origin, &original, visited);
        }

        // Not declared here: try the public symbols of unexpanded wildcards
        for wildcard in wildcards {
            let mut branch = visited.clone();
            if let Ok(found) = self.lookup_export(&wildcard, name, &mut branch) {
                return Ok(found);
            }
        }
        Err(LookupFailure::NotFound)
    }

    fn expand_wildcards(&mut self) {
        let modules = self.modules;
        for uri in self.order {
            let Some(record) = modules.get(uri) else {
                continue;
            };
            let pending: Vec<_> = record
                .symbols()
                .wildcards()
                .iter()
                .enumerate()
                .filter(|(_, wildcard)| !wildcard.expanded)
                .map(|(index, wildcard)| (index, wildcard.clone()))
                .collect();

            for (index, wildcard) in pending {
                let Some(target) = wildcard.module.resolved() else {
                    self.errors.push(ModuleError::SymbolNotFound {
                        name: "*".to_string(),
                        path: Some(wildcard.import_path.clone()),
                        context: wildcard.context.clone(),
                    });
                    continue;
                };

                let mut visited = FxHashSet::default();
                let exported = self.exported_symbols(target, &mut visited);

                let mut symbols = record.symbols_mut();
                for (name, resolved) in exported {
                    if let Some(existing) = symbols.get(&name) {
                        let same = existing
                            .declaration()
                            .is_some_and(|d| Arc::ptr_eq(d, &resolved.declaration));
                        if !same {
                            self.errors.push(ModuleError::DuplicateSymbol {
                                name,
                                context: wildcard.context.clone(),
                            });
                        }
                        continue;
                    }

                    let entry = SymbolInfo::Imported(ImportedSymbol {
                        name: name.clone(),
                        original_name: name,
                        import_path: wildcard.import_path.clone(),
                        context: wildcard.context.clone(),
                        module: Binding::Resolved(resolved.module.clone()),
                        target: Binding::Resolved(resolved),
                    });
                    match symbols.insert(entry) {
                        Ok(()) => self.report.wildcard_symbols += 1,
                        Err(error) => self.errors.push(error),
                    }
                }
                if let Some(wildcard) = symbols.wildcards_mut().get_mut(index) {
                    wildcard.expanded = true;
                }
                tracing::trace!(module = %uri, import = %wildcard.import_path, "expanded wildcard import");
            }
        }
    }

    /// Public locals and resolved imports of `module`, including what its own
    /// wildcard imports bring in
    fn exported_symbols(
        &self,
        module: &ModuleUri,
        visited: &mut FxHashSet<ModuleUri>,
    ) -> Vec<(String, ResolvedSymbol)> {
        if !visited.insert(module.clone()) {
            return Vec::new();
        }
        let Some(record) = self.modules.get(module) else {
            return Vec::new();
        };

        let (mut exported, wildcards) = {
            let symbols = record.symbols();
            let exported: Vec<(String, ResolvedSymbol)> = symbols
                .iter()
                .filter_map(|info| match info {
                    SymbolInfo::Local(local) if local.access() == AccessModifier::Public => Some((
                        local.declaration.name.clone(),
                        ResolvedSymbol {
                            module: module.clone(),
                            declaration: Arc::clone(&local.declaration),
                        },
                    )),
                    SymbolInfo::Local(_) => None,
                    SymbolInfo::Imported(imported) => {
                        imported.target.resolved().map(|target| (imported.name.clone(), target.clone()))
                    }
                })
                .collect();
            let wildcards: Vec<ModuleUri> = symbols
                .wildcards()
                .iter()
                .filter(|w| !w.expanded)
                .filter_map(|w| w.module.resolved().cloned())
                .collect();
            (exported, wildcards)
        };

        let mut names: FxHashSet<String> = exported.iter().map(|(name, _)| name.clone()).collect();
        for wildcard in wildcards {
            for (name, symbol) in self.exported_symbols(&wildcard, visited) {
                if names.insert(name.clone()) {
                    exported.push((name, symbol));
                }
            }
        }
        exported
    }

    fn resolve_links(&mut self) {
        let modules = self.modules;
        for uri in self.order {
            let Some(record) = modules.get(uri) else {
                continue;
            };
            let program = Arc::clone(record.program());
            for declaration in program.declarations() {
                let mut links: Vec<&SymbolLink> = Vec::new();
                for_each_link(declaration, &mut |link| links.push(link));

                for link in links {
                    if link.is_resolved() {
                        continue;
                    }
                    if let Err(error) = self.resolve_link(record, declaration, link) {
                        self.errors.push(error);
                    }
                }
            }
        }
    }

    fn resolve_link(&mut self, record: &ModuleRecord, owner: &Declaration, link: &SymbolLink) -> ModuleResult<()> {
        let mut found = Self::lookup_link(record, &link.name);
        if matches!(found, TableLookup::Missing) && &link.context.uri != record.uri() {
            if let Some(declaring) = self.modules.get(&link.context.uri) {
                found = Self::lookup_link(declaring, &link.name);
            }
        }

        let target = match found {
            TableLookup::Found(target) => target,
            TableLookup::Unresolved => return Ok(()),
            TableLookup::Missing => {
                return Err(ModuleError::SymbolNotFound {
                    name: link.name.clone(),
                    path: None,
                    context: link.context.clone(),
                })
            }
        };

        if !target.declaration.satisfies(link.kind) {
            return Err(ModuleError::TypeMismatch {
                name: link.name.clone(),
                expected: link.kind,
                actual: target.declaration.kind_name(),
                context: link.context.clone(),
            });
        }
        if forms_link_loop(owner, link, &target.declaration) {
            return Err(ModuleError::LinkLoop {
                name: owner.name.clone(),
                context: link.context.clone(),
            });
        }

        if link.bind(target.module, &target.declaration) {
            self.report.links += 1;
        }
        Ok(())
    }

    fn bind_embedded_ports(&mut self) {
        let modules = self.modules;
        for uri in self.order {
            let Some(record) = modules.get(uri) else {
                continue;
            };
            let program = Arc::clone(record.program());
            for declaration in program.declarations() {
                let DeclarationKind::Service(service) = &declaration.kind else {
                    continue;
                };
                for item in &service.items {
                    let ServiceItem::Embed(embed) = item else {
                        continue;
                    };
                    let Some(port) = &embed.port else {
                        continue;
                    };
                    // Unbound service links were reported by the links pass
                    let Some(embedded) = embed.service.target() else {
                        continue;
                    };
                    let DeclarationKind::Service(embedded_service) = &embedded.kind else {
                        continue;
                    };

                    let mut local_ports = embedded_service.local_input_ports().peekable();
                    if local_ports.peek().is_none() {
                        self.errors.push(ModuleError::MissingLocalInputPort {
                            service: embedded.name.clone(),
                            port: port.clone(),
                            context: embed.service.context.clone(),
                        });
                        continue;
                    }
                    let interfaces: Vec<_> = local_ports
                        .flat_map(|local| local.interfaces.iter().filter_map(SymbolLink::live_binding))
                        .collect();
                    if embed.bind_port_interfaces(interfaces) {
                        tracing::trace!(module = %uri, service = %embedded.name, %port, "bound embedded service to port");
                        self.report.port_bindings += 1;
                    }
                }
            }
        }
    }

    fn lookup_link(record: &ModuleRecord, name: &str) -> TableLookup {
        match record.symbols().get(name) {
            Some(SymbolInfo::Local(local)) => TableLookup::Found(ResolvedSymbol {
                module: record.uri().clone(),
                declaration: Arc::clone(&local.declaration),
            }),
            Some(SymbolInfo::Imported(imported)) => match &imported.target {
                Binding::Resolved(target) => TableLookup::Found(target.clone()),
                Binding::Unresolved => TableLookup::Unresolved,
            },
            None => TableLookup::Missing,
        }
    }
}

/// Whether binding `link` would make `owner` an alias of itself
///
/// Only links forming a type's whole definition (`type A: B`) can loop; the
/// chain of such aliases is followed from `target`.
fn forms_link_loop(owner: &Declaration, link: &SymbolLink, target: &Arc<Declaration>) -> bool {
    let DeclarationKind::Type(TypeDefinition::Link(whole)) = &owner.kind else {
        return false;
    };
    if !std::ptr::eq(whole, link) {
        return false;
    }

    let mut seen: FxHashSet<*const Declaration> = FxHashSet::default();
    let mut current = Arc::clone(target);
    loop {
        if std::ptr::eq(Arc::as_ptr(&current), owner) {
            return true;
        }
        if !seen.insert(Arc::as_ptr(&current)) {
            return false;
        }
        let DeclarationKind::Type(TypeDefinition::Link(next)) = &current.kind else {
            return false;
        };
        match next.target() {
            Some(next) => current = next,
            None => return false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ModuleConfig;
    use crate::module::crawler::ModuleCrawler;
    use crate::module::finder::ModuleFinder;
    use crate::outline::OutlineParser;
    use crate::source::ModuleSource;
    use std::fs;
    use std::path::Path;
    use tempfile::TempDir;

    fn crawl(root: &Path, files: &[(&str, &str)]) -> CrawlResult {
        for (name, content) in files {
            let path = root.join(name);
            fs::create_dir_all(path.parent().unwrap()).unwrap();
            fs::write(path, content).unwrap();
        }
        let finder = ModuleFinder::new(ModuleConfig::new(root));
        let parser = OutlineParser::new();
        ModuleCrawler::new(&finder, &parser)
            .crawl(ModuleSource::file(&root.join(files[0].0)).unwrap())
            .unwrap()
    }

    fn resolve(graph: &CrawlResult) -> ModuleResult<ResolutionReport> {
        SymbolReferenceResolver::new(graph).resolve()
    }

    #[test]
    fn test_import_chain_reaches_local() {
        let dir = TempDir::new().unwrap();
        let graph = crawl(
            dir.path(),
            &[
                ("main.ol", "from .a import T as U\ntype V: U\n"),
                ("a.ol", "from .b import T\n"),
                ("b.ol", "type T: string\n"),
            ],
        );

        let report = resolve(&graph).unwrap();
        assert_eq!(report.imports, 2);
        assert_eq!(report.links, 1);

        let root = graph.root_record().unwrap();
        let symbols = root.symbols();
        let u = symbols.get("U").unwrap().declaration().unwrap();
        assert_eq!(u.name, "T");
        assert!(u.context.uri.as_str().ends_with("b.ol"));

        let v = root.program().declaration("V").unwrap();
        let DeclarationKind::Type(TypeDefinition::Link(link)) = &v.kind else {
            panic!("expected a type link");
        };
        assert!(Arc::ptr_eq(&link.target().unwrap(), u));
    }

    #[test]
    fn test_import_cycle_is_reported() {
        let dir = TempDir::new().unwrap();
        let graph = crawl(dir.path(), &[("a.ol", "from .b import x\n"), ("b.ol", "from .a import x\n")]);

        let err = resolve(&graph).unwrap_err();
        let diagnostics = err.diagnostics();
        assert_eq!(diagnostics.len(), 2);
        assert!(diagnostics
            .iter()
            .all(|e| matches!(e, ModuleError::SymbolNotFound { name, path: Some(_), .. } if name == "x")));
    }

    #[test]
    fn test_private_import_is_illegal() {
        let dir = TempDir::new().unwrap();
        let graph = crawl(dir.path(), &[("main.ol", "from .b import Secret\n"), ("b.ol", "private type Secret: int\n")]);

        match resolve(&graph) {
            Err(ModuleError::IllegalAccess { name, path, .. }) => {
                assert_eq!(name, "Secret");
                assert_eq!(path.to_string(), ".b");
            }
            other => panic!("expected IllegalAccess, got {other:?}"),
        }
    }

    #[test]
    fn test_link_kind_mismatch() {
        let dir = TempDir::new().unwrap();
        let graph = crawl(
            dir.path(),
            &[("main.ol", "type T: int\nservice S { outputPort P { interfaces: T } }\n")],
        );

        match resolve(&graph) {
            Err(ModuleError::TypeMismatch { name, expected, actual, .. }) => {
                assert_eq!(name, "T");
                assert_eq!(expected, crate::ast::LinkKind::Interface);
                assert_eq!(actual, "type");
            }
            other => panic!("expected TypeMismatch, got {other:?}"),
        }
    }

    #[test]
    fn test_self_alias_is_link_loop() {
        let dir = TempDir::new().unwrap();
        let graph = crawl(dir.path(), &[("main.ol", "type T: T\n")]);
        assert!(matches!(resolve(&graph), Err(ModuleError::LinkLoop { name, .. }) if name == "T"));
    }

    #[test]
    fn test_alias_cycle_is_link_loop() {
        let dir = TempDir::new().unwrap();
        let graph = crawl(dir.path(), &[("main.ol", "type A: B\ntype B: A\n")]);
        assert!(matches!(resolve(&graph), Err(ModuleError::LinkLoop { .. })));
    }

    #[test]
    fn test_recursive_type_is_allowed() {
        let dir = TempDir::new().unwrap();
        let graph = crawl(dir.path(), &[("main.ol", "type Tree { value: int, children: Tree }\n")]);
        assert_eq!(resolve(&graph).unwrap().links, 1);
    }

    #[test]
    fn test_errors_are_accumulated() {
        let dir = TempDir::new().unwrap();
        let graph = crawl(
            dir.path(),
            &[("main.ol", "from .b import missing\ntype A: Nope\ntype B: AlsoNope\n"), ("b.ol", "type T: int\n")],
        );

        let err = resolve(&graph).unwrap_err();
        assert_eq!(err.diagnostics().len(), 3);
    }

    #[test]
    fn test_second_run_changes_nothing() {
        let dir = TempDir::new().unwrap();
        let graph = crawl(
            dir.path(),
            &[
                ("main.ol", "from .b import *\ntype V { t: T }\n"),
                ("b.ol", "type T: int\ninterface I { op(T)(T) }\n"),
            ],
        );

        let first = resolve(&graph).unwrap();
        assert_eq!(first.wildcard_symbols, 2);
        assert!(!first.is_empty());
        assert!(resolve(&graph).unwrap().is_empty());
    }

    #[test]
    fn test_embedded_service_lends_local_interfaces_to_port() {
        let dir = TempDir::new().unwrap();
        let graph = crawl(
            dir.path(),
            &[
                ("main.ol", "from .calc import Calculator\nservice Main { embed Calculator in Calc }\n"),
                (
                    "calc.ol",
                    "interface CalcApi { sum(int)(int) }\ninterface Admin { stop(void)(void) }\n\
                     service Calculator {\n  inputPort Local { location: \"local\" interfaces: CalcApi }\n  \
                     inputPort Remote { location: \"socket://localhost:9000\" interfaces: Admin }\n}\n",
                ),
            ],
        );

        let first = resolve(&graph).unwrap();
        assert_eq!(first.port_bindings, 1);

        let main = Arc::clone(graph.root_record().unwrap().program().declaration("Main").unwrap());
        let DeclarationKind::Service(service) = &main.kind else {
            panic!("expected a service");
        };
        let interfaces = service.output_port_interfaces("Calc");
        assert_eq!(interfaces.len(), 1);
        assert_eq!(interfaces[0].name, "CalcApi");
        assert!(interfaces[0].context.uri.as_str().ends_with("calc.ol"));
        assert!(service.output_port_interfaces("Other").is_empty());

        assert_eq!(resolve(&graph).unwrap().port_bindings, 0);
    }

    #[test]
    fn test_embedded_service_without_local_port() {
        let dir = TempDir::new().unwrap();
        let graph = crawl(
            dir.path(),
            &[(
                "main.ol",
                "service Worker { main { nullProcess } }\nservice Main {\n  embed Worker in Jobs\n  embed Worker\n}\n",
            )],
        );

        match resolve(&graph) {
            Err(ModuleError::MissingLocalInputPort { service, port, context }) => {
                assert_eq!(service, "Worker");
                assert_eq!(port, "Jobs");
                assert_eq!(context.line, 3);
            }
            other => panic!("expected MissingLocalInputPort, got {other:?}"),
        }
    }
}
