//! Declaration outline front end
//!
//! A small parser for the declaration-level surface of the language:
//! imports, `type`, `interface`, `define` and `service` declarations with
//! their access modifiers. Behaviour code is skipped except for the parts that
//! reference other declarations.
//!
//! ```text
//! from .types import Order, Item as Line
//! from lib.util import *
//!
//! private type Id: string
//! type Order { id: Id, lines[0, *]: Line }
//!
//! interface Orders { RequestResponse: place(Order)(Id) throws Rejected(string) }
//!
//! service Shop {
//!     inputPort Api { location: "socket://localhost:8000" interfaces: Orders }
//!     main { [ place(order)(id) { order instanceof Order } ] }
//! }
//! ```

mod lexer;
mod parser;

pub use lexer::{tokenize, InvalidToken, Lexeme, Token};
pub use parser::parse_program;

use thiserror::Error;

use crate::ast::Program;
use crate::error::ModuleError;
use crate::module::ModuleParser;
use crate::source::ModuleSource;
use crate::uri::ModuleUri;

/// Outline syntax errors
#[derive(Debug, Error)]
pub enum OutlineError {
    /// Text that is not a token
    #[error("{uri}:{line}: unexpected character {text:?}")]
    InvalidToken {
        /// Module being parsed
        uri: ModuleUri,
        /// Line of the text
        line: u32,
        /// The rejected text
        text: String,
    },

    /// A token other than the expected one
    #[error("{uri}:{line}: expected {expected}, found '{found}'")]
    Unexpected {
        /// Module being parsed
        uri: ModuleUri,
        /// Line of the token
        line: u32,
        /// What the grammar allows here
        expected: String,
        /// Text of the token found
        found: String,
    },

    /// Input ended early
    #[error("{uri}: unexpected end of input, expected {expected}")]
    UnexpectedEof {
        /// Module being parsed
        uri: ModuleUri,
        /// What the grammar allows here
        expected: String,
    },

    /// The source could not be read
    #[error("unable to read {uri}: {source}")]
    Read {
        /// Module being read
        uri: ModuleUri,
        /// Underlying source error
        #[source]
        source: Box<ModuleError>,
    },
}

/// [`ModuleParser`] for the outline syntax
#[derive(Debug, Clone, Copy, Default)]
pub struct OutlineParser;

impl OutlineParser {
    /// Create a parser
    pub fn new() -> Self {
        Self
    }
}

impl ModuleParser for OutlineParser {
    type Error = OutlineError;

    fn parse(&self, source: &ModuleSource) -> Result<Program, OutlineError> {
        let text = source.read_to_string().map_err(|err| OutlineError::Read {
            uri: source.uri().clone(),
            source: Box::new(err),
        })?;
        parse_program(source.uri(), &text)
    }
}
