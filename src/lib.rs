//! Crate root: wires together the transpilation pipeline.
//!
//! A typed, tab-indented Python subset goes in, C++ comes out:
//! - `tokenizer` scans the source lazily, turning leading tabs into
//!   `INDENT`/`NEWLINE`/`DEDENT` tokens.
//! - `parser` runs the recursive-descent grammar and returns the syntax tree
//!   together with the declared variables of every scope.
//! - `codegen` walks the tree and prints the C++ program.
//! - `ty` holds the declared type names and the variable table.
//! - `error` is the single error type shared by all stages.

pub mod codegen;
pub mod error;
pub mod parser;
pub mod tokenizer;
pub mod ty;

pub use error::{CompileError, CompileResult};

/// Transpile a source string into C++.
pub fn transpile(source: &str) -> CompileResult<String> {
  let program = parser::parse(tokenizer::Tokenizer::new(source))?;
  Ok(codegen::generate(&program.variables, &program.tree))
}
