//! Evaluator for the TypeScript subset used by validation test files.
//!
//! Sources are lexed, parsed into a small AST and walked directly. Type
//! syntax is accepted and discarded. Every import goes through a
//! [`ModuleTable`], so the host decides what each specifier means.

pub mod ast;
pub mod interp;
pub mod lexer;
pub mod parser;
pub mod value;

pub use interp::{Interpreter, Scope};
pub use value::{NativeFunction, ObjectMap, Value};

use crate::error::Result;
use crate::modules::ModuleTable;

/// Parses and runs one source file to completion.
pub fn evaluate(source: &str, file: &str, modules: &ModuleTable) -> Result<()> {
    let tokens = lexer::tokenize(source, file)?;
    let program = parser::parse_program(tokens, file)?;
    tracing::trace!(file, statements = program.body.len(), "parsed test source");
    Interpreter::new(file, modules).run(&program)
}
