//! Module resolution and symbol linking
//!
//! Given the root module of a program, this crate:
//! - **Finds** every transitively imported module (`module::finder`)
//! - **Parses** each one once through an injected front end (`ModuleParser`)
//! - **Builds** a symbol table per module (`module::symbols`)
//! - **Resolves** imported symbols, wildcard imports and linked names to the
//!   declarations they denote (`module::resolver`)
//! - **Caches** resolved records process-wide (`module::cache`)
//!
//! # Example
//!
//! ```rust,ignore
//! use modlink::{ModuleConfig, ModuleSession, OutlineParser};
//!
//! let config = ModuleConfig::new("/project").with_package_path("/usr/lib/packages");
//! let session = ModuleSession::new(config, OutlineParser::new());
//! let program = session.load_path("/project/main.ol".as_ref())?;
//!
//! for module in program.modules() {
//!     println!("{}: {} symbols", module.uri(), module.symbols().len());
//! }
//! ```

#![warn(missing_docs)]
#![warn(rust_2018_idioms)]

pub mod ast;
pub mod config;
pub mod error;
pub mod import_path;
pub mod module;
pub mod outline;
pub mod source;
pub mod uri;

pub use config::{ArchiveConventions, ConfigError, ModuleConfig};
pub use error::{ModuleError, ModuleResult};
pub use import_path::ImportPath;
pub use module::{
    CacheStats, CrawlResult, LoadedProgram, ModuleCrawler, ModuleFinder, ModuleParser, ModuleRecord,
    ModuleRecordCache, ModuleSession, ResolutionReport, SymbolInfo, SymbolReferenceResolver, SymbolTable,
};
pub use outline::{OutlineError, OutlineParser};
pub use source::{ArchiveEntry, ModuleSource};
pub use uri::ModuleUri;
