//! Module records and the parser boundary

use std::sync::Arc;

use parking_lot::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use crate::ast::Program;
use crate::error::{ModuleError, ModuleResult};
use crate::source::ModuleSource;
use crate::uri::ModuleUri;

use super::symbols::SymbolTable;

/// A parsed module with its symbol table
///
/// Shared between the crawl graph and the record cache. The program is
/// immutable; the symbol table is only written by the resolver, which binds
/// imported entries once.
#[derive(Debug)]
pub struct ModuleRecord {
    uri: ModuleUri,
    program: Arc<Program>,
    symbols: RwLock<SymbolTable>,
}

impl ModuleRecord {
    /// Create a record from its parts
    pub fn new(uri: ModuleUri, program: Arc<Program>, symbols: SymbolTable) -> Self {
        Self {
            uri,
            program,
            symbols: RwLock::new(symbols),
        }
    }

    /// Create a record, generating the symbol table from the program
    pub fn from_program(uri: ModuleUri, program: Arc<Program>) -> ModuleResult<Self> {
        let symbols = SymbolTable::generate(&program)?;
        Ok(Self::new(uri, program, symbols))
    }

    /// Module identity
    pub fn uri(&self) -> &ModuleUri {
        &self.uri
    }

    /// Parsed program
    pub fn program(&self) -> &Arc<Program> {
        &self.program
    }

    /// Read access to the symbol table
    pub fn symbols(&self) -> RwLockReadGuard<'_, SymbolTable> {
        self.symbols.read()
    }

    pub(crate) fn symbols_mut(&self) -> RwLockWriteGuard<'_, SymbolTable> {
        self.symbols.write()
    }
}

/// Front end that turns a module source into a program
pub trait ModuleParser {
    /// Parser-specific failure
    type Error: std::error::Error + Send + Sync + 'static;

    /// Parse the module's source text
    fn parse(&self, source: &ModuleSource) -> Result<Program, Self::Error>;

    /// Parse a source into a record with a fresh symbol table
    ///
    /// In-memory program sources are used as they are, without parsing.
    fn parse_module(&self, source: &ModuleSource) -> ModuleResult<ModuleRecord> {
        let program = match source {
            ModuleSource::Program(program) => Arc::clone(program.program()),
            _ => {
                let program = self.parse(source).map_err(|err| ModuleError::ParseFailure {
                    uri: source.uri().clone(),
                    source: Box::new(err),
                })?;
                Arc::new(program)
            }
        };
        tracing::trace!(uri = %source.uri(), "parsed module");
        ModuleRecord::from_program(source.uri().clone(), program)
    }
}

impl<P: ModuleParser + ?Sized> ModuleParser for &P {
    type Error = P::Error;

    fn parse(&self, source: &ModuleSource) -> Result<Program, Self::Error> {
        (**self).parse(source)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fmt;

    #[derive(Debug)]
    struct Rejected;

    impl fmt::Display for Rejected {
        fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
            f.write_str("rejected")
        }
    }

    impl std::error::Error for Rejected {}

    struct RejectingParser;

    impl ModuleParser for RejectingParser {
        type Error = Rejected;

        fn parse(&self, _source: &ModuleSource) -> Result<Program, Rejected> {
            Err(Rejected)
        }
    }

    #[test]
    fn test_parse_failure_is_wrapped() {
        let uri = ModuleUri::parse("memory:/bad").unwrap();
        let source = ModuleSource::from_bytes(uri.clone(), b"???".to_vec());
        match RejectingParser.parse_module(&source) {
            Err(ModuleError::ParseFailure { uri: failed, source }) => {
                assert_eq!(failed, uri);
                assert_eq!(source.to_string(), "rejected");
            }
            other => panic!("expected ParseFailure, got {other:?}"),
        }
    }

    #[test]
    fn test_program_source_bypasses_parser() {
        let uri = ModuleUri::parse("memory:/embedded").unwrap();
        let program = Arc::new(Program::new(uri.clone(), Vec::new()));
        let source = ModuleSource::from_program(Arc::clone(&program));

        let record = RejectingParser.parse_module(&source).unwrap();
        assert_eq!(record.uri(), &uri);
        assert!(Arc::ptr_eq(record.program(), &program));
        assert!(record.symbols().is_empty());
    }
}
