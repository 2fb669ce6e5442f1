//! Per-module symbol tables
//!
//! One entry per name a module declares or imports. Imported entries start
//! unbound: the crawler binds the module they come from, the resolver binds
//! the declaration they denote.

use std::sync::Arc;

use rustc_hash::FxHashMap;

use crate::ast::{AccessModifier, Binding, Declaration, ImportStatement, ImportTargets, Program, SourceContext};
use crate::error::{ModuleError, ModuleResult};
use crate::import_path::ImportPath;
use crate::uri::ModuleUri;

/// A symbol declared in this module
#[derive(Debug, Clone)]
pub struct LocalSymbol {
    /// The declaration node
    pub declaration: Arc<Declaration>,
}

impl LocalSymbol {
    /// Visibility of the declaration
    pub fn access(&self) -> AccessModifier {
        self.declaration.access
    }
}

/// Declaration an imported symbol resolved to
#[derive(Debug, Clone)]
pub struct ResolvedSymbol {
    /// Module declaring the target
    pub module: ModuleUri,
    /// The target declaration
    pub declaration: Arc<Declaration>,
}

/// A symbol brought in by `from <path> import <name>`
#[derive(Debug, Clone)]
pub struct ImportedSymbol {
    /// Name bound in this module
    pub name: String,
    /// Name in the module it is imported from
    pub original_name: String,
    /// Import target as written
    pub import_path: ImportPath,
    /// Location of the import statement
    pub context: SourceContext,
    /// Module the import path resolved to
    pub module: Binding<ModuleUri>,
    /// Declaration the symbol denotes
    pub target: Binding<ResolvedSymbol>,
}

/// A `from <path> import *` placeholder
#[derive(Debug, Clone)]
pub struct WildcardImport {
    /// Import target as written
    pub import_path: ImportPath,
    /// Location of the import statement
    pub context: SourceContext,
    /// Module the import path resolved to
    pub module: Binding<ModuleUri>,
    /// Whether the public symbols of the target were merged in
    pub expanded: bool,
}

/// Symbol table entry
#[derive(Debug, Clone)]
pub enum SymbolInfo {
    /// Declared here
    Local(LocalSymbol),
    /// Imported by name, or merged in from a wildcard
    Imported(ImportedSymbol),
}

impl SymbolInfo {
    /// Name the entry is bound to in its table
    pub fn name(&self) -> &str {
        match self {
            SymbolInfo::Local(local) => &local.declaration.name,
            SymbolInfo::Imported(imported) => &imported.name,
        }
    }

    /// Location of the declaration or import
    pub fn context(&self) -> &SourceContext {
        match self {
            SymbolInfo::Local(local) => &local.declaration.context,
            SymbolInfo::Imported(imported) => &imported.context,
        }
    }

    /// The declaration the entry denotes, if known
    pub fn declaration(&self) -> Option<&Arc<Declaration>> {
        match self {
            SymbolInfo::Local(local) => Some(&local.declaration),
            SymbolInfo::Imported(imported) => imported.target.resolved().map(|t| &t.declaration),
        }
    }

    /// Whether the entry points at its declaration
    pub fn is_resolved(&self) -> bool {
        self.declaration().is_some()
    }
}

/// Symbols of one module, in insertion order
#[derive(Debug, Clone)]
pub struct SymbolTable {
    uri: ModuleUri,
    entries: Vec<SymbolInfo>,
    index: FxHashMap<String, usize>,
    wildcards: Vec<WildcardImport>,
}

impl SymbolTable {
    /// Create an empty table
    pub fn new(uri: ModuleUri) -> Self {
        Self {
            uri,
            entries: Vec::new(),
            index: FxHashMap::default(),
            wildcards: Vec::new(),
        }
    }

    /// Build the table for a parsed program
    ///
    /// One top-level pass: a local entry per declaration, an imported entry
    /// per imported name and a placeholder per wildcard import. Nothing is
    /// resolved yet.
    pub fn generate(program: &Program) -> ModuleResult<Self> {
        let mut table = Self::new(program.uri.clone());
        for import in program.imports() {
            table.add_import(import)?;
        }
        for declaration in program.declarations() {
            table.add_local(Arc::clone(declaration))?;
        }
        Ok(table)
    }

    /// Module the table belongs to
    pub fn uri(&self) -> &ModuleUri {
        &self.uri
    }

    /// Add a declaration
    pub fn add_local(&mut self, declaration: Arc<Declaration>) -> ModuleResult<()> {
        self.insert(SymbolInfo::Local(LocalSymbol { declaration }))
    }

    /// Add every name of an import statement
    pub fn add_import(&mut self, import: &ImportStatement) -> ModuleResult<()> {
        match &import.targets {
            ImportTargets::Wildcard => {
                self.wildcards.push(WildcardImport {
                    import_path: import.path.clone(),
                    context: import.context.clone(),
                    module: Binding::Unresolved,
                    expanded: false,
                });
                Ok(())
            }
            ImportTargets::Symbols(names) => {
                for name in names {
                    self.insert(SymbolInfo::Imported(ImportedSymbol {
                        name: name.local.clone(),
                        original_name: name.original.clone(),
                        import_path: import.path.clone(),
                        context: import.context.clone(),
                        module: Binding::Unresolved,
                        target: Binding::Unresolved,
                    }))?;
                }
                Ok(())
            }
        }
    }

    /// Insert an entry, rejecting a second entry with the same name
    pub fn insert(&mut self, info: SymbolInfo) -> ModuleResult<()> {
        if self.index.contains_key(info.name()) {
            return Err(ModuleError::DuplicateSymbol {
                name: info.name().to_string(),
                context: info.context().clone(),
            });
        }
        self.index.insert(info.name().to_string(), self.entries.len());
        self.entries.push(info);
        Ok(())
    }

    /// Look up a name
    pub fn get(&self, name: &str) -> Option<&SymbolInfo> {
        self.index.get(name).map(|&i| &self.entries[i])
    }

    /// Look up a name for mutation
    pub fn get_mut(&mut self, name: &str) -> Option<&mut SymbolInfo> {
        match self.index.get(name) {
            Some(&i) => self.entries.get_mut(i),
            None => None,
        }
    }

    /// Whether a name is bound
    pub fn contains(&self, name: &str) -> bool {
        self.index.contains_key(name)
    }

    /// Entries in insertion order
    pub fn iter(&self) -> impl Iterator<Item = &SymbolInfo> {
        self.entries.iter()
    }

    /// Imported entries
    pub fn imports(&self) -> impl Iterator<Item = &ImportedSymbol> {
        self.entries.iter().filter_map(|entry| match entry {
            SymbolInfo::Imported(imported) => Some(imported),
            SymbolInfo::Local(_) => None,
        })
    }

    /// Imported entries, mutably
    pub fn imports_mut(&mut self) -> impl Iterator<Item = &mut ImportedSymbol> {
        self.entries.iter_mut().filter_map(|entry| match entry {
            SymbolInfo::Imported(imported) => Some(imported),
            SymbolInfo::Local(_) => None,
        })
    }

    /// Wildcard imports
    pub fn wildcards(&self) -> &[WildcardImport] {
        &self.wildcards
    }

    /// Wildcard imports, mutably
    pub fn wildcards_mut(&mut self) -> &mut [WildcardImport] {
        &mut self.wildcards
    }

    /// Bind the source module of every import written with `path`
    pub(crate) fn bind_import_module(&mut self, path: &ImportPath, module: &ModuleUri) {
        for imported in self.imports_mut().filter(|i| &i.import_path == path) {
            imported.module = Binding::Resolved(module.clone());
        }
        for wildcard in self.wildcards.iter_mut().filter(|w| &w.import_path == path) {
            wildcard.module = Binding::Resolved(module.clone());
        }
    }

    /// Number of named entries
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the table has no named entries
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::{DeclarationKind, ImportedName, NativeType, ProgramItem, TypeDefinition};

    fn uri() -> ModuleUri {
        ModuleUri::parse("file:///p/main.ol").unwrap()
    }

    fn ctx(line: u32) -> SourceContext {
        SourceContext::new(uri(), line)
    }

    fn type_decl(name: &str, line: u32) -> ProgramItem {
        ProgramItem::Declaration(Arc::new(Declaration {
            name: name.to_string(),
            access: AccessModifier::Public,
            context: ctx(line),
            kind: DeclarationKind::Type(TypeDefinition::Native(NativeType::Int)),
        }))
    }

    fn import(path: &str, targets: ImportTargets, line: u32) -> ProgramItem {
        ProgramItem::Import(ImportStatement {
            context: ctx(line),
            path: ImportPath::parse(path),
            targets,
        })
    }

    #[test]
    fn test_generate_collects_all_kinds() {
        let program = Program::new(
            uri(),
            vec![
                import(".b", ImportTargets::Symbols(vec![ImportedName::aliased("x", "y")]), 1),
                import(".c", ImportTargets::Wildcard, 2),
                type_decl("T", 3),
            ],
        );

        let table = SymbolTable::generate(&program).unwrap();
        assert_eq!(table.len(), 2);
        assert_eq!(table.wildcards().len(), 1);
        assert!(matches!(table.get("T"), Some(SymbolInfo::Local(_))));

        match table.get("y") {
            Some(SymbolInfo::Imported(imported)) => {
                assert_eq!(imported.original_name, "x");
                assert!(!imported.module.is_resolved());
                assert!(!imported.target.is_resolved());
            }
            other => panic!("expected imported symbol, got {other:?}"),
        }
        assert!(!table.get("y").unwrap().is_resolved());
        assert!(table.get("T").unwrap().is_resolved());
    }

    #[test]
    fn test_duplicate_declaration() {
        let program = Program::new(uri(), vec![type_decl("T", 1), type_decl("T", 4)]);
        match SymbolTable::generate(&program) {
            Err(ModuleError::DuplicateSymbol { name, context }) => {
                assert_eq!(name, "T");
                assert_eq!(context.line, 4);
            }
            other => panic!("expected DuplicateSymbol, got {other:?}"),
        }
    }

    #[test]
    fn test_import_clashes_with_local() {
        let program = Program::new(
            uri(),
            vec![
                import(".b", ImportTargets::Symbols(vec![ImportedName::new("T")]), 1),
                type_decl("T", 2),
            ],
        );
        assert!(matches!(
            SymbolTable::generate(&program),
            Err(ModuleError::DuplicateSymbol { .. })
        ));
    }

    #[test]
    fn test_bind_import_module() {
        let program = Program::new(
            uri(),
            vec![
                import(".b", ImportTargets::Symbols(vec![ImportedName::new("x"), ImportedName::new("z")]), 1),
                import(".b", ImportTargets::Wildcard, 2),
                import(".c", ImportTargets::Symbols(vec![ImportedName::new("w")]), 3),
            ],
        );
        let mut table = SymbolTable::generate(&program).unwrap();
        let b = ModuleUri::parse("file:///p/b.ol").unwrap();
        table.bind_import_module(&ImportPath::parse(".b"), &b);

        let bound: Vec<_> = table.imports().filter(|i| i.module.is_resolved()).map(|i| i.name.as_str()).collect();
        assert_eq!(bound, vec!["x", "z"]);
        assert_eq!(table.wildcards()[0].module.resolved(), Some(&b));
    }
}
