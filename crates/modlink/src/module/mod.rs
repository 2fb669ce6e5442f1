//! Module system
//!
//! Locating imported modules, crawling the module graph, building symbol
//! tables, resolving references across modules and caching the results.

pub mod cache;
pub mod crawler;
pub mod finder;
pub mod record;
pub mod resolver;
pub mod session;
pub mod symbols;

pub use cache::{CacheStats, ModuleRecordCache};
pub use crawler::{CrawlResult, ModuleCrawler};
pub use finder::ModuleFinder;
pub use record::{ModuleParser, ModuleRecord};
pub use resolver::{ResolutionReport, SymbolReferenceResolver};
pub use session::{LoadedProgram, ModuleSession};
pub use symbols::{ImportedSymbol, LocalSymbol, ResolvedSymbol, SymbolInfo, SymbolTable, WildcardImport};
