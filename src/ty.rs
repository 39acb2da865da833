//! Declared types and the per-scope variable table built by the parser.

use std::collections::BTreeMap;
use std::fmt;

use crate::error::{CompileError, CompileResult};
use crate::tokenizer::{Token, TokenKind};

/// Types that can appear in a declaration, a parameter list or a return
/// annotation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TypeName {
  Int,
  Float,
  Bool,
  None,
}

impl TypeName {
  /// Value types only; `None` is accepted solely as a return type.
  pub fn from_value_kind(kind: TokenKind) -> Option<Self> {
    match kind {
      TokenKind::Int => Some(Self::Int),
      TokenKind::Float => Some(Self::Float),
      TokenKind::Bool => Some(Self::Bool),
      _ => None,
    }
  }

  pub fn from_return_kind(kind: TokenKind) -> Option<Self> {
    match kind {
      TokenKind::NoneType => Some(Self::None),
      other => Self::from_value_kind(other),
    }
  }

  /// Spelling of the type in generated C++.
  pub fn cpp_name(self) -> &'static str {
    match self {
      Self::Int => "int",
      Self::Float => "float",
      Self::Bool => "bool",
      Self::None => "void",
    }
  }
}

impl fmt::Display for TypeName {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(match self {
      Self::Int => "INT",
      Self::Float => "FLOAT",
      Self::Bool => "BOOL",
      Self::None => "NONE",
    })
  }
}

/// One `name: type` declaration site.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Declaration {
  pub name: String,
  pub ty: TypeName,
}

impl Declaration {
  pub fn new(name: impl Into<String>, ty: TypeName) -> Self {
    Self {
      name: name.into(),
      ty,
    }
  }
}

/// Declarations grouped by scope. The global scope is the empty string,
/// every other scope is named after its function.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct VariableTable {
  scopes: BTreeMap<String, Vec<Declaration>>,
}

impl VariableTable {
  pub const GLOBAL: &'static str = "";

  pub fn new() -> Self {
    Self::default()
  }

  /// Record `ident: ty` in `scope`.
  ///
  /// Redeclaring a name with the type it already has appends a second entry;
  /// redeclaring it with any other type is a syntax error on `ident`.
  pub fn declare(&mut self, scope: &str, ident: &Token, ty: TypeName) -> CompileResult<()> {
    let Some(name) = ident.name() else {
      return Err(CompileError::syntax(ident.clone()));
    };
    let declarations = self.scopes.entry(scope.to_string()).or_default();
    if declarations
      .iter()
      .any(|existing| existing.name == name && existing.ty != ty)
    {
      return Err(CompileError::syntax(ident.clone()));
    }
    declarations.push(Declaration::new(name, ty));
    Ok(())
  }

  /// Declarations of `scope` in source order; empty if it declared nothing.
  pub fn scope(&self, scope: &str) -> &[Declaration] {
    self.scopes.get(scope).map(Vec::as_slice).unwrap_or_default()
  }

  pub fn contains_scope(&self, scope: &str) -> bool {
    self.scopes.contains_key(scope)
  }

  pub fn is_empty(&self) -> bool {
    self.scopes.is_empty()
  }

  /// Scopes in name order.
  pub fn iter(&self) -> impl Iterator<Item = (&str, &[Declaration])> {
    self
      .scopes
      .iter()
      .map(|(scope, declarations)| (scope.as_str(), declarations.as_slice()))
  }
}

impl fmt::Display for VariableTable {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    for (scope, declarations) in self.iter() {
      let label = if scope.is_empty() { "<global>" } else { scope };
      let entries: Vec<_> = declarations
        .iter()
        .map(|decl| format!("{}: {}", decl.name, decl.ty))
        .collect();
      writeln!(f, "{label}: [{}]", entries.join(", "))?;
    }
    Ok(())
  }
}
