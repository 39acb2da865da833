//! Shared error type used across the transpilation pipeline.
//!
//! Every failure is fatal to the current compilation: the first lexical or
//! syntax error stops the pipeline and is handed back to the caller as-is.

use snafu::Snafu;

use crate::tokenizer::Token;

pub type CompileResult<T> = Result<T, CompileError>;

#[derive(Debug, Clone, PartialEq, Snafu)]
#[snafu(visibility(pub(crate)))]
pub enum CompileError {
  /// No lexical rule matched at the current scan position.
  #[snafu(display("lexical error: line {line}"))]
  Lexical { line: usize },

  /// The token sequence violates the grammar at `token`.
  #[snafu(display("syntax error: token {token}, line {}", token.line))]
  Syntax { token: Token },

  /// The token stream ran dry inside a construct that still needed input.
  /// `line` is the line of the last token consumed.
  #[snafu(display("syntax error: unexpected end of input, line {line}"))]
  UnexpectedEof { line: usize },
}

impl CompileError {
  pub fn syntax(token: Token) -> Self {
    Self::Syntax { token }
  }
}
