//! Declaration-level AST consumed by the resolver
//!
//! The front end produces a [`Program`] per module. Only the parts that matter
//! for linking are modelled: imports, declarations with their access modifier,
//! and link nodes that name another declaration by identifier. Everything else
//! a procedure body may contain is collapsed into [`Statement::Opaque`].

use std::fmt;
use std::sync::{Arc, Weak};

use parking_lot::RwLock;

use crate::import_path::ImportPath;
use crate::uri::ModuleUri;

/// Location of a node: declaring module and line
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SourceContext {
    /// Module the node was parsed from
    pub uri: ModuleUri,
    /// 1-based line
    pub line: u32,
}

impl SourceContext {
    /// Create a new context
    pub fn new(uri: ModuleUri, line: u32) -> Self {
        Self { uri, line }
    }
}

impl fmt::Display for SourceContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.uri, self.line)
    }
}

/// Visibility of a declaration outside its module
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum AccessModifier {
    /// Importable by other modules
    #[default]
    Public,
    /// Only visible inside the declaring module
    Private,
}

/// Resolution state of a reference that is bound once
#[derive(Debug, Clone, Default)]
pub enum Binding<T> {
    /// Not yet bound
    #[default]
    Unresolved,
    /// Bound to its target
    Resolved(T),
}

impl<T> Binding<T> {
    /// The bound target, if any
    pub fn resolved(&self) -> Option<&T> {
        match self {
            Binding::Resolved(target) => Some(target),
            Binding::Unresolved => None,
        }
    }

    /// Whether the binding has been set
    pub fn is_resolved(&self) -> bool {
        matches!(self, Binding::Resolved(_))
    }
}

/// Root of one parsed module
#[derive(Debug)]
pub struct Program {
    /// Module URI
    pub uri: ModuleUri,
    /// Top-level items in source order
    pub items: Vec<ProgramItem>,
}

impl Program {
    /// Create a program
    pub fn new(uri: ModuleUri, items: Vec<ProgramItem>) -> Self {
        Self { uri, items }
    }

    /// Import statements
    pub fn imports(&self) -> impl Iterator<Item = &ImportStatement> {
        self.items.iter().filter_map(|item| match item {
            ProgramItem::Import(import) => Some(import),
            ProgramItem::Declaration(_) => None,
        })
    }

    /// Top-level declarations
    pub fn declarations(&self) -> impl Iterator<Item = &Arc<Declaration>> {
        self.items.iter().filter_map(|item| match item {
            ProgramItem::Declaration(decl) => Some(decl),
            ProgramItem::Import(_) => None,
        })
    }

    /// Find a top-level declaration by name
    pub fn declaration(&self, name: &str) -> Option<&Arc<Declaration>> {
        self.declarations().find(|decl| decl.name == name)
    }
}

/// Top-level program item
#[derive(Debug)]
pub enum ProgramItem {
    /// `from <path> import ...`
    Import(ImportStatement),
    /// A named declaration
    Declaration(Arc<Declaration>),
}

/// `from <path> import <targets>`
#[derive(Debug, Clone)]
pub struct ImportStatement {
    /// Location of the statement
    pub context: SourceContext,
    /// Target module
    pub path: ImportPath,
    /// Imported names
    pub targets: ImportTargets,
}

/// What an import statement brings into scope
#[derive(Debug, Clone)]
pub enum ImportTargets {
    /// `import *`
    Wildcard,
    /// `import a, b as c`
    Symbols(Vec<ImportedName>),
}

/// One imported name, possibly aliased
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImportedName {
    /// Name in the target module
    pub original: String,
    /// Name bound in the importing module
    pub local: String,
}

impl ImportedName {
    /// Import a name without alias
    pub fn new(name: impl Into<String>) -> Self {
        let name = name.into();
        Self { original: name.clone(), local: name }
    }

    /// Import a name under an alias
    pub fn aliased(original: impl Into<String>, local: impl Into<String>) -> Self {
        Self { original: original.into(), local: local.into() }
    }
}

/// Named top-level declaration
#[derive(Debug)]
pub struct Declaration {
    /// Declared name
    pub name: String,
    /// Visibility outside the module
    pub access: AccessModifier,
    /// Location
    pub context: SourceContext,
    /// Declaration payload
    pub kind: DeclarationKind,
}

impl Declaration {
    /// Short description of the declaration shape, used in diagnostics
    pub fn kind_name(&self) -> &'static str {
        match self.kind {
            DeclarationKind::Type(_) => "type",
            DeclarationKind::Interface(_) => "interface",
            DeclarationKind::Procedure(_) => "procedure",
            DeclarationKind::Service(_) => "service",
        }
    }

    /// Whether a link of the given kind may point at this declaration
    pub fn satisfies(&self, kind: LinkKind) -> bool {
        matches!(
            (kind, &self.kind),
            (LinkKind::Type, DeclarationKind::Type(_))
                | (LinkKind::Interface, DeclarationKind::Interface(_))
                | (LinkKind::Service, DeclarationKind::Service(_))
        )
    }
}

/// Declaration payloads
#[derive(Debug)]
pub enum DeclarationKind {
    /// `type Name: ...`
    Type(TypeDefinition),
    /// `interface Name { ... }`
    Interface(InterfaceDefinition),
    /// `define name { ... }`
    Procedure(ProcedureDefinition),
    /// `service Name { ... }`
    Service(ServiceDefinition),
}

/// Built-in type keywords
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NativeType {
    /// `void`
    Void,
    /// `bool`
    Bool,
    /// `int`
    Int,
    /// `long`
    Long,
    /// `double`
    Double,
    /// `string`
    String,
    /// `raw`
    Raw,
    /// `any`
    Any,
    /// `undefined`, the open type
    Undefined,
}

impl NativeType {
    /// Look up a native type keyword
    pub fn from_keyword(name: &str) -> Option<Self> {
        Some(match name {
            "void" => NativeType::Void,
            "bool" => NativeType::Bool,
            "int" => NativeType::Int,
            "long" => NativeType::Long,
            "double" => NativeType::Double,
            "string" => NativeType::String,
            "raw" => NativeType::Raw,
            "any" => NativeType::Any,
            "undefined" => NativeType::Undefined,
            _ => return None,
        })
    }
}

/// Type expression
#[derive(Debug)]
pub enum TypeDefinition {
    /// Built-in type
    Native(NativeType),
    /// Native root with nested fields, `{ a: int, b: T }`
    Inline {
        /// Root value type
        base: NativeType,
        /// Sub-fields
        fields: Vec<FieldDefinition>,
    },
    /// Reference to another type by name
    Link(SymbolLink),
    /// `A | B | ...`
    Choice(Vec<TypeDefinition>),
}

/// Field of an inline type
#[derive(Debug)]
pub struct FieldDefinition {
    /// Field name
    pub name: String,
    /// Field type
    pub ty: TypeDefinition,
}

/// Kind of declaration a link expects
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LinkKind {
    /// A type name inside a type expression
    Type,
    /// An interface named by a port
    Interface,
    /// A service named by `embed`
    Service,
}

impl fmt::Display for LinkKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            LinkKind::Type => "type",
            LinkKind::Interface => "interface",
            LinkKind::Service => "service",
        })
    }
}

/// Where a resolved link points
#[derive(Debug, Clone)]
pub struct LinkTarget {
    /// Module that declares the target
    pub module: ModuleUri,
    /// The target declaration
    ///
    /// Held weakly: type links may form cycles through the declarations that
    /// contain them.
    pub declaration: Weak<Declaration>,
}

/// Reference to another declaration by identifier
#[derive(Debug)]
pub struct SymbolLink {
    /// Referenced name
    pub name: String,
    /// Expected declaration shape
    pub kind: LinkKind,
    /// Location of the reference
    pub context: SourceContext,
    binding: RwLock<Binding<LinkTarget>>,
}

impl SymbolLink {
    /// Create an unresolved link
    pub fn new(name: impl Into<String>, kind: LinkKind, context: SourceContext) -> Self {
        Self {
            name: name.into(),
            kind,
            context,
            binding: RwLock::new(Binding::Unresolved),
        }
    }

    /// Current binding state
    pub fn binding(&self) -> Binding<LinkTarget> {
        self.binding.read().clone()
    }

    /// Whether the link is bound to a declaration that is still alive
    pub fn is_resolved(&self) -> bool {
        self.target().is_some()
    }

    /// The linked declaration, if bound and still alive
    pub fn target(&self) -> Option<Arc<Declaration>> {
        self.binding.read().resolved().and_then(|t| t.declaration.upgrade())
    }

    /// Module and declaration the link is bound to, if still alive
    pub fn live_binding(&self) -> Option<LinkTarget> {
        match &*self.binding.read() {
            Binding::Resolved(target) if target.declaration.strong_count() > 0 => Some(target.clone()),
            _ => None,
        }
    }

    /// Bind the link
    ///
    /// Returns `false` when the link already pointed at the same live
    /// declaration.
    pub(crate) fn bind(&self, module: ModuleUri, declaration: &Arc<Declaration>) -> bool {
        let mut binding = self.binding.write();
        if let Binding::Resolved(current) = &*binding {
            if current
                .declaration
                .upgrade()
                .is_some_and(|current| Arc::ptr_eq(&current, declaration))
            {
                return false;
            }
        }
        *binding = Binding::Resolved(LinkTarget {
            module,
            declaration: Arc::downgrade(declaration),
        });
        true
    }
}

/// Operations grouped under a name
#[derive(Debug, Default)]
pub struct InterfaceDefinition {
    /// Declared operations
    pub operations: Vec<OperationDeclaration>,
}

/// One operation of an interface
#[derive(Debug)]
pub struct OperationDeclaration {
    /// Operation name
    pub name: String,
    /// Request message type
    pub request: TypeDefinition,
    /// Response type; `None` for one-way operations
    pub response: Option<TypeDefinition>,
    /// Fault names with their payload types
    pub faults: Vec<(String, TypeDefinition)>,
}

/// Body of a procedure or `main`
#[derive(Debug, Default)]
pub struct ProcedureDefinition {
    /// Statements
    pub body: Vec<Statement>,
}

/// Statements relevant to linking
#[derive(Debug)]
pub enum Statement {
    /// `{ ... }`
    Block(Vec<Statement>),
    /// `x instanceof T`
    InstanceOf {
        /// Tested variable
        variable: String,
        /// Type tested against
        ty: TypeDefinition,
    },
    /// Procedure call by name
    Call(String),
    /// Anything without references to other declarations
    Opaque,
}

/// `service Name(param: T) { ... }`
#[derive(Debug, Default)]
pub struct ServiceDefinition {
    /// Optional configuration parameter type
    pub parameter: Option<TypeDefinition>,
    /// Ports, embeddings and behaviour
    pub items: Vec<ServiceItem>,
}

/// Location keyword of ports served in-process
pub const LOCAL_LOCATION: &str = "local";

impl ServiceDefinition {
    /// Input ports listening on the `local` location
    pub fn local_input_ports(&self) -> impl Iterator<Item = &PortDefinition> {
        self.items.iter().filter_map(|item| match item {
            ServiceItem::InputPort(port) if port.location.as_deref() == Some(LOCAL_LOCATION) => Some(port),
            _ => None,
        })
    }

    /// Interfaces reachable through the output port `name`
    ///
    /// Declared interfaces of an `outputPort name` come first, then those
    /// bound from services embedded in or as that port.
    pub fn output_port_interfaces(&self, name: &str) -> Vec<Arc<Declaration>> {
        let mut interfaces: Vec<Arc<Declaration>> = Vec::new();
        for item in &self.items {
            let found = match item {
                ServiceItem::OutputPort(port) if port.name == name => port.resolved_interfaces(),
                ServiceItem::Embed(embed) if embed.port.as_deref() == Some(name) => embed.port_interfaces(),
                _ => continue,
            };
            for interface in found {
                if !interfaces.iter().any(|known| Arc::ptr_eq(known, &interface)) {
                    interfaces.push(interface);
                }
            }
        }
        interfaces
    }
}

/// Service body members
#[derive(Debug)]
pub enum ServiceItem {
    /// Port receiving messages
    InputPort(PortDefinition),
    /// Port sending messages
    OutputPort(PortDefinition),
    /// `embed Service in port`
    Embed(EmbedDefinition),
    /// `main { ... }`
    Main(ProcedureDefinition),
}

/// Input or output port
#[derive(Debug)]
pub struct PortDefinition {
    /// Port name
    pub name: String,
    /// Location string, if given
    pub location: Option<String>,
    /// Interfaces exposed or required by the port
    pub interfaces: Vec<SymbolLink>,
}

impl PortDefinition {
    /// Interfaces the port links to, in declaration order
    ///
    /// Unresolved links are skipped.
    pub fn resolved_interfaces(&self) -> Vec<Arc<Declaration>> {
        self.interfaces.iter().filter_map(SymbolLink::target).collect()
    }
}

/// Embedded service
#[derive(Debug)]
pub struct EmbedDefinition {
    /// The embedded service
    pub service: SymbolLink,
    /// Output port bound to the embedded service
    pub port: Option<String>,
    /// Interfaces of the embedded service's local input ports, bound onto
    /// `port`
    port_interfaces: RwLock<Vec<LinkTarget>>,
}

impl EmbedDefinition {
    /// Create an embedding with nothing bound yet
    pub fn new(service: SymbolLink, port: Option<String>) -> Self {
        Self {
            service,
            port,
            port_interfaces: RwLock::new(Vec::new()),
        }
    }

    /// Interfaces bound onto the port, skipping any no longer alive
    pub fn port_interfaces(&self) -> Vec<Arc<Declaration>> {
        self.port_interfaces
            .read()
            .iter()
            .filter_map(|target| target.declaration.upgrade())
            .collect()
    }

    /// Replace the interfaces bound onto the port
    ///
    /// Returns `false` when the same live declarations were already bound.
    pub(crate) fn bind_port_interfaces(&self, targets: Vec<LinkTarget>) -> bool {
        let mut bound = self.port_interfaces.write();
        let unchanged = bound.len() == targets.len()
            && bound.iter().zip(&targets).all(|(current, next)| {
                current
                    .declaration
                    .upgrade()
                    .is_some_and(|current| Arc::as_ptr(&current) == next.declaration.as_ptr())
            });
        if unchanged {
            return false;
        }
        *bound = targets;
        true
    }
}

/// Call `f` on every link reachable from a declaration
///
/// Recurses through composite nodes only; leaves without references are
/// skipped.
pub fn for_each_link<'a>(decl: &'a Declaration, f: &mut dyn FnMut(&'a SymbolLink)) {
    match &decl.kind {
        DeclarationKind::Type(ty) => type_links(ty, f),
        DeclarationKind::Interface(iface) => interface_links(iface, f),
        DeclarationKind::Procedure(proc) => statement_links(&proc.body, f),
        DeclarationKind::Service(service) => {
            if let Some(parameter) = &service.parameter {
                type_links(parameter, f);
            }
            for item in &service.items {
                match item {
                    ServiceItem::InputPort(port) | ServiceItem::OutputPort(port) => {
                        port.interfaces.iter().for_each(&mut *f);
                    }
                    ServiceItem::Embed(embed) => f(&embed.service),
                    ServiceItem::Main(body) => statement_links(&body.body, f),
                }
            }
        }
    }
}

fn type_links<'a>(ty: &'a TypeDefinition, f: &mut dyn FnMut(&'a SymbolLink)) {
    match ty {
        TypeDefinition::Native(_) => {}
        TypeDefinition::Link(link) => f(link),
        TypeDefinition::Inline { fields, .. } => {
            for field in fields {
                type_links(&field.ty, f);
            }
        }
        TypeDefinition::Choice(options) => {
            for option in options {
                type_links(option, f);
            }
        }
    }
}

fn interface_links<'a>(iface: &'a InterfaceDefinition, f: &mut dyn FnMut(&'a SymbolLink)) {
    for op in &iface.operations {
        type_links(&op.request, f);
        if let Some(response) = &op.response {
            type_links(response, f);
        }
        for (_, fault) in &op.faults {
            type_links(fault, f);
        }
    }
}

fn statement_links<'a>(body: &'a [Statement], f: &mut dyn FnMut(&'a SymbolLink)) {
    for statement in body {
        match statement {
            Statement::Block(inner) => statement_links(inner, f),
            Statement::InstanceOf { ty, .. } => type_links(ty, f),
            Statement::Call(_) | Statement::Opaque => {}
        }
    }
}
