//! Recursive-descent parser producing a labelled syntax tree and the table of
//! declared variables.
//!
//! Each grammar rule is one method on [`Parser`]. Expressions are not
//! precedence-climbed: an operation is kept as a flat, source-ordered list of
//! operands and operators under one node, and the generated code leaves the
//! grouping to the target language.
//!
//! ```text
//! program      = statement*
//! statement    = assignment | declaration | function_def | return_stmt
//!              | while_stmt | if_stmt | print_stmt | func_call | NEWLINE
//! block        = INDENT statement* DEDENT
//! declaration  = IDENTIFIER COLON type [EQUALS expr]
//! assignment   = IDENTIFIER EQUALS expr
//! function_def = DEF IDENTIFIER LP [param {COMMA param}] RP ARROW (type|NONE) COLON block
//! param        = IDENTIFIER COLON type
//! return_stmt  = RETURN expr
//! while_stmt   = WHILE expr COLON block
//! if_stmt      = IF expr COLON block [ELSE COLON block | ELIF expr COLON block ...]
//! print_stmt   = PRINT LP [expr {COMMA expr}] RP
//! func_call    = IDENTIFIER LP [atom {COMMA atom}] RP
//! expr         = func_call | operation
//! operation    = [NOT] atom {(binop|logicop|cmpop) atom}
//! ```

use std::fmt;

use crate::error::{CompileError, CompileResult, UnexpectedEofSnafu};
use crate::tokenizer::{Token, TokenKind};
use crate::ty::{TypeName, VariableTable};

/// What a syntax node stands for.
#[derive(Debug, Clone, PartialEq)]
pub enum Label {
  /// Root of every tree.
  Program,
  /// A node labelled by a source token (statement keyword, operand, block
  /// colon, type name, ...).
  Token(Token),
  /// A flat operation; children are its atoms and operators in order.
  Operation,
  /// A function call; the first child is the callee, the rest its arguments.
  Call,
}

impl Label {
  /// Kind of the labelling token, if this node carries one.
  pub fn kind(&self) -> Option<TokenKind> {
    match self {
      Self::Token(token) => Some(token.kind),
      _ => None,
    }
  }

  pub fn token(&self) -> Option<&Token> {
    match self {
      Self::Token(token) => Some(token),
      _ => None,
    }
  }
}

impl fmt::Display for Label {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self {
      Self::Program => f.write_str("Program"),
      Self::Token(token) => write!(f, "{token}"),
      Self::Operation => f.write_str("OPERATION"),
      Self::Call => f.write_str("CALL"),
    }
  }
}

/// Syntax tree node. Children are owned and kept in source order.
#[derive(Debug, Clone, PartialEq)]
pub struct Node {
  label: Label,
  children: Vec<Node>,
}

impl Node {
  fn new(label: Label) -> Self {
    Self {
      label,
      children: Vec::new(),
    }
  }

  fn leaf(token: Token) -> Self {
    Self::new(Label::Token(token))
  }

  fn push(&mut self, child: Node) -> &mut Node {
    self.children.push(child);
    let last = self.children.len() - 1;
    &mut self.children[last]
  }

  pub fn label(&self) -> &Label {
    &self.label
  }

  pub fn children(&self) -> &[Node] {
    &self.children
  }

  /// Pre-order walk over the tree.
  pub fn iter(&self) -> PreOrder<'_> {
    PreOrder { stack: vec![self] }
  }

  /// Labels in pre-order, rendered as text.
  pub fn labels(&self) -> Vec<String> {
    self.iter().map(|node| node.label.to_string()).collect()
  }

  /// Indented, one-label-per-line dump of the tree.
  pub fn render(&self) -> String {
    let mut out = format!("{}\n", self.label);
    render_children(self, "", &mut out);
    out
  }
}

fn render_children(node: &Node, prefix: &str, out: &mut String) {
  let count = node.children.len();
  for (index, child) in node.children.iter().enumerate() {
    let last = index + 1 == count;
    let (branch, extend) = if last {
      ("└── ", "    ")
    } else {
      ("├── ", "│   ")
    };
    out.push_str(&format!("{prefix}{branch}{}\n", child.label));
    render_children(child, &format!("{prefix}{extend}"), out);
  }
}

pub struct PreOrder<'a> {
  stack: Vec<&'a Node>,
}

impl<'a> Iterator for PreOrder<'a> {
  type Item = &'a Node;

  fn next(&mut self) -> Option<Self::Item> {
    let node = self.stack.pop()?;
    self.stack.extend(node.children.iter().rev());
    Some(node)
  }
}

/// Output of a successful parse.
#[derive(Debug, Clone, PartialEq)]
pub struct ParsedProgram {
  pub variables: VariableTable,
  pub tree: Node,
}

/// Parse a token stream into the variable table and the syntax tree.
///
/// Running out of tokens between top-level statements ends the program;
/// running out anywhere else is an [`CompileError::UnexpectedEof`].
pub fn parse<I>(tokens: I) -> CompileResult<ParsedProgram>
where
  I: IntoIterator<Item = CompileResult<Token>>,
{
  let mut parser = Parser {
    stream: TokenStream::new(tokens.into_iter()),
    variables: VariableTable::new(),
  };
  let mut root = Node::new(Label::Program);

  loop {
    parser.stream.skip_newlines()?;
    match parser.stream.peek()?.cloned() {
      None => break,
      Some(token) if token.kind == TokenKind::Dedent => {
        return Err(CompileError::syntax(token));
      }
      Some(_) => parser.statement(&mut root, VariableTable::GLOBAL)?,
    }
  }

  Ok(ParsedProgram {
    variables: parser.variables,
    tree: root,
  })
}

struct Parser<I: Iterator<Item = CompileResult<Token>>> {
  stream: TokenStream<I>,
  variables: VariableTable,
}

impl<I: Iterator<Item = CompileResult<Token>>> Parser<I> {
  fn statement(&mut self, parent: &mut Node, scope: &str) -> CompileResult<()> {
    let token = self.stream.next()?;
    match token.kind {
      TokenKind::Identifier => self.identifier_statement(token, parent, scope),
      TokenKind::Def => self.function_def(token, parent),
      TokenKind::While => {
        let node = parent.push(Node::leaf(token));
        self.expression(node)?;
        self.block_after_colon(node, scope)
      }
      TokenKind::If => {
        let node = parent.push(Node::leaf(token));
        self.if_stmt(node, scope)
      }
      TokenKind::Print => {
        let node = parent.push(Node::leaf(token));
        self.print_stmt(node)
      }
      TokenKind::Return => {
        let node = parent.push(Node::leaf(token));
        self.expression(node)
      }
      _ => Err(CompileError::syntax(token)),
    }
  }

  /// Declaration, assignment or call, decided by the token after the name.
  fn identifier_statement(
    &mut self,
    ident: Token,
    parent: &mut Node,
    scope: &str,
  ) -> CompileResult<()> {
    let next = self.stream.next()?;
    match next.kind {
      TokenKind::Colon => {
        let ty_token = self.stream.next()?;
        let Some(ty) = TypeName::from_value_kind(ty_token.kind) else {
          return Err(CompileError::syntax(ty_token));
        };
        self.variables.declare(scope, &ident, ty)?;
        match self.stream.next_if(TokenKind::Equals)? {
          Some(equals) => self.assignment(equals, ident, parent),
          None => Ok(()),
        }
      }
      TokenKind::Equals => self.assignment(next, ident, parent),
      TokenKind::LParen => self.call(ident, parent),
      _ => Err(CompileError::syntax(next)),
    }
  }

  fn assignment(&mut self, equals: Token, target: Token, parent: &mut Node) -> CompileResult<()> {
    let node = parent.push(Node::leaf(equals));
    node.push(Node::leaf(target));
    self.expression(node)
  }

  fn function_def(&mut self, def: Token, parent: &mut Node) -> CompileResult<()> {
    let node = parent.push(Node::leaf(def));
    let name = self.stream.expect(TokenKind::Identifier)?;
    let scope = name.name().unwrap_or_default().to_string();
    let signature = node.push(Node::leaf(name));

    self.stream.expect(TokenKind::LParen)?;
    if self.stream.next_if(TokenKind::RParen)?.is_none() {
      loop {
        let param = self.stream.expect(TokenKind::Identifier)?;
        self.stream.expect(TokenKind::Colon)?;
        let ty = self.stream.next()?;
        if !ty.kind.is_type() {
          return Err(CompileError::syntax(ty));
        }
        signature.push(Node::leaf(param)).push(Node::leaf(ty));

        if self.stream.next_if(TokenKind::Comma)?.is_none() {
          self.stream.expect(TokenKind::RParen)?;
          break;
        }
      }
    }

    self.stream.expect(TokenKind::Arrow)?;
    let ret = self.stream.next()?;
    if TypeName::from_return_kind(ret.kind).is_none() {
      return Err(CompileError::syntax(ret));
    }
    node.push(Node::leaf(ret));
    self.block_after_colon(node, &scope)
  }

  /// `COLON block`; the colon labels the block node appended to `parent`.
  fn block_after_colon(&mut self, parent: &mut Node, scope: &str) -> CompileResult<()> {
    let colon = self.stream.expect(TokenKind::Colon)?;
    let block = parent.push(Node::leaf(colon));
    self.block(block, scope)
  }

  fn block(&mut self, block: &mut Node, scope: &str) -> CompileResult<()> {
    self.stream.expect(TokenKind::Indent)?;
    loop {
      self.stream.skip_newlines()?;
      if self.stream.next_if(TokenKind::Dedent)?.is_some() {
        return Ok(());
      }
      self.statement(block, scope)?;
    }
  }

  /// Condition and body of an `if`/`elif`, then an optional trailing clause
  /// as third child: a nested `IF` for `elif`, the bare block for `else`.
  fn if_stmt(&mut self, node: &mut Node, scope: &str) -> CompileResult<()> {
    self.expression(node)?;
    self.block_after_colon(node, scope)?;

    if self.stream.next_if(TokenKind::Else)?.is_some() {
      return self.block_after_colon(node, scope);
    }
    if let Some(elif) = self.stream.next_if(TokenKind::Elif)? {
      let nested = node.push(Node::leaf(Token::new(elif.line, TokenKind::If)));
      return self.if_stmt(nested, scope);
    }
    Ok(())
  }

  fn print_stmt(&mut self, node: &mut Node) -> CompileResult<()> {
    self.stream.expect(TokenKind::LParen)?;
    if self.stream.next_if(TokenKind::RParen)?.is_some() {
      return Ok(());
    }
    loop {
      self.expression(node)?;
      if self.stream.next_if(TokenKind::Comma)?.is_none() {
        self.stream.expect(TokenKind::RParen)?;
        return Ok(());
      }
    }
  }

  /// `func_call | operation`, appended to `parent`.
  fn expression(&mut self, parent: &mut Node) -> CompileResult<()> {
    let first = self.stream.next()?;

    if first.kind == TokenKind::Identifier && self.stream.next_if(TokenKind::LParen)?.is_some() {
      return self.call(first, parent);
    }

    let operation = parent.push(Node::new(Label::Operation));
    match first.kind {
      TokenKind::Not => {
        operation.push(Node::leaf(first));
        let operand = self.atom()?;
        operation.push(Node::leaf(operand));
      }
      kind if kind.is_atom() => {
        operation.push(Node::leaf(first));
      }
      _ => return Err(CompileError::syntax(first)),
    }

    while let Some(operator) = self.stream.next_if_with(|kind| kind.is_binary_operator())? {
      operation.push(Node::leaf(operator));
      let operand = self.atom()?;
      operation.push(Node::leaf(operand));
    }
    Ok(())
  }

  /// Arguments of a call whose name and `(` were already consumed.
  fn call(&mut self, name: Token, parent: &mut Node) -> CompileResult<()> {
    let node = parent.push(Node::new(Label::Call));
    node.push(Node::leaf(name));

    if self.stream.next_if(TokenKind::RParen)?.is_some() {
      return Ok(());
    }
    loop {
      let arg = self.atom()?;
      node.push(Node::leaf(arg));
      if self.stream.next_if(TokenKind::Comma)?.is_none() {
        self.stream.expect(TokenKind::RParen)?;
        return Ok(());
      }
    }
  }

  fn atom(&mut self) -> CompileResult<Token> {
    let token = self.stream.next()?;
    if token.kind.is_atom() {
      Ok(token)
    } else {
      Err(CompileError::syntax(token))
    }
  }
}

/// Lazy cursor over the token iterator with one token of lookahead.
struct TokenStream<I> {
  tokens: I,
  peeked: Option<Token>,
  last_line: usize,
}

impl<I: Iterator<Item = CompileResult<Token>>> TokenStream<I> {
  fn new(tokens: I) -> Self {
    Self {
      tokens,
      peeked: None,
      last_line: 1,
    }
  }

  /// Look at the next token without consuming it. Lexical errors from the
  /// underlying iterator surface here.
  fn peek(&mut self) -> CompileResult<Option<&Token>> {
    if self.peeked.is_none() {
      self.peeked = self.tokens.next().transpose()?;
    }
    Ok(self.peeked.as_ref())
  }

  /// Consume the next token; the stream must not be exhausted.
  fn next(&mut self) -> CompileResult<Token> {
    self.peek()?;
    match self.peeked.take() {
      Some(token) => {
        self.last_line = token.line;
        Ok(token)
      }
      None => UnexpectedEofSnafu {
        line: self.last_line,
      }
      .fail(),
    }
  }

  /// Consume the next token if its kind satisfies `accept`.
  fn next_if_with(&mut self, accept: impl Fn(TokenKind) -> bool) -> CompileResult<Option<Token>> {
    let accepted = self.peek()?.is_some_and(|token| accept(token.kind));
    if accepted {
      self.next().map(Some)
    } else {
      Ok(None)
    }
  }

  fn next_if(&mut self, kind: TokenKind) -> CompileResult<Option<Token>> {
    self.next_if_with(|next| next == kind)
  }

  /// Consume a token of `kind` or fail with a syntax error on whatever is there.
  fn expect(&mut self, kind: TokenKind) -> CompileResult<Token> {
    let token = self.next()?;
    if token.kind == kind {
      Ok(token)
    } else {
      Err(CompileError::syntax(token))
    }
  }

  fn skip_newlines(&mut self) -> CompileResult<()> {
    while self.next_if(TokenKind::Newline)?.is_some() {}
    Ok(())
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::tokenizer::{TokenValue, tokenize};
  use crate::ty::Declaration;

  fn tok(kind: TokenKind) -> Token {
    Token::new(1, kind)
  }

  fn ident(name: &str) -> Token {
    Token::with_value(1, TokenKind::Identifier, TokenValue::Name(name.into()))
  }

  fn int(value: i64) -> Token {
    Token::with_value(1, TokenKind::ValueInt, TokenValue::Int(value))
  }

  fn parse_tokens(tokens: Vec<Token>) -> CompileResult<ParsedProgram> {
    parse(tokens.into_iter().map(Ok))
  }

  fn parse_source(source: &str) -> CompileResult<ParsedProgram> {
    parse(crate::tokenizer::Tokenizer::new(source))
  }

  #[test]
  fn empty_program_is_just_the_root() {
    let program = parse_tokens(Vec::new()).unwrap();
    assert_eq!(program.tree.labels(), ["Program"]);
    assert!(program.variables.is_empty());
  }

  #[test]
  fn if_with_empty_block() {
    let program = parse_tokens(vec![
      tok(TokenKind::If),
      Token::with_value(1, TokenKind::ValueBool, TokenValue::Bool(true)),
      tok(TokenKind::Colon),
      tok(TokenKind::Indent),
      tok(TokenKind::Dedent),
    ])
    .unwrap();
    assert_eq!(
      program.tree.labels(),
      ["Program", "IF", "OPERATION", "VALUE_BOOL(True)", "COLON"]
    );
  }

  #[test]
  fn typed_assignment_records_declaration() {
    let program = parse_tokens(vec![
      ident("x"),
      tok(TokenKind::Colon),
      tok(TokenKind::Int),
      tok(TokenKind::Equals),
      int(5),
      tok(TokenKind::Newline),
    ])
    .unwrap();
    assert_eq!(
      program.tree.labels(),
      ["Program", "EQUALS", "IDENTIFIER(x)", "OPERATION", "VALUE_INT(5)"]
    );
    assert_eq!(program.variables.scope(""), [Declaration::new("x", TypeName::Int)]);
  }

  #[test]
  fn plain_assignment_declares_nothing() {
    let tokens = vec![ident("x"), tok(TokenKind::Equals), int(5), tok(TokenKind::Newline)];
    let program = parse_tokens(tokens).unwrap();
    assert_eq!(
      program.tree.labels(),
      ["Program", "EQUALS", "IDENTIFIER(x)", "OPERATION", "VALUE_INT(5)"]
    );
    assert!(program.variables.is_empty());
  }

  #[test]
  fn declaration_then_assignment() {
    let program = parse_source("x: int\nx = 5\n").unwrap();
    assert_eq!(
      program.tree.labels(),
      ["Program", "EQUALS", "IDENTIFIER(x)", "OPERATION", "VALUE_INT(5)"]
    );
    assert_eq!(program.variables.scope(""), [Declaration::new("x", TypeName::Int)]);
  }

  #[test]
  fn redeclaring_with_another_type_fails() {
    let err = parse_source("x: int\ny = 1\nx: float\n").unwrap_err();
    match err {
      CompileError::Syntax { token } => {
        assert_eq!(token.name(), Some("x"));
        assert_eq!(token.line, 3);
      }
      other => panic!("unexpected error: {other:?}"),
    }
  }

  #[test]
  fn redeclaring_with_same_type_duplicates_entry() {
    let program = parse_source("x: int\nx: int\n").unwrap();
    assert_eq!(program.variables.scope("").len(), 2);
    assert_eq!(program.tree.labels(), ["Program"]);
  }

  #[test]
  fn function_locals_get_their_own_scope() {
    let program = parse_tokens(vec![
      tok(TokenKind::Def),
      ident("f"),
      tok(TokenKind::LParen),
      ident("y"),
      tok(TokenKind::Colon),
      tok(TokenKind::Bool),
      tok(TokenKind::RParen),
      tok(TokenKind::Arrow),
      tok(TokenKind::NoneType),
      tok(TokenKind::Colon),
      tok(TokenKind::Indent),
      ident("z"),
      tok(TokenKind::Colon),
      tok(TokenKind::Int),
      tok(TokenKind::Dedent),
    ])
    .unwrap();
    assert_eq!(
      program.tree.labels(),
      ["Program", "DEF", "IDENTIFIER(f)", "IDENTIFIER(y)", "BOOL", "NONE", "COLON"]
    );
    assert_eq!(program.variables.scope("f"), [Declaration::new("z", TypeName::Int)]);
    assert!(!program.variables.contains_scope(""));
  }

  #[test]
  fn return_keeps_operation_flat() {
    let program = parse_tokens(vec![
      tok(TokenKind::Return),
      ident("x"),
      tok(TokenKind::Plus),
      int(2),
      tok(TokenKind::Multiply),
      ident("y"),
    ])
    .unwrap();
    assert_eq!(
      program.tree.labels(),
      [
        "Program",
        "RETURN",
        "OPERATION",
        "IDENTIFIER(x)",
        "PLUS",
        "VALUE_INT(2)",
        "MULTIPLY",
        "IDENTIFIER(y)"
      ]
    );
  }

  #[test]
  fn print_arguments_are_separate_expressions() {
    let program = parse_source("print(x, 2)\n").unwrap();
    assert_eq!(
      program.tree.labels(),
      ["Program", "PRINT", "OPERATION", "IDENTIFIER(x)", "OPERATION", "VALUE_INT(2)"]
    );
  }

  #[test]
  fn call_statement_collects_atoms() {
    let program = parse_source("f(y, 2)\nz = g()\n").unwrap();
    assert_eq!(
      program.tree.labels(),
      [
        "Program",
        "CALL",
        "IDENTIFIER(f)",
        "IDENTIFIER(y)",
        "VALUE_INT(2)",
        "EQUALS",
        "IDENTIFIER(z)",
        "CALL",
        "IDENTIFIER(g)"
      ]
    );
  }

  #[test]
  fn call_rejects_operations_as_arguments() {
    let err = parse_tokens(vec![
      ident("x"),
      tok(TokenKind::LParen),
      ident("y"),
      tok(TokenKind::Plus),
      tok(TokenKind::RParen),
    ])
    .unwrap_err();
    assert_eq!(err, CompileError::syntax(tok(TokenKind::Plus)));
  }

  #[test]
  fn elif_nests_and_else_attaches_block() {
    let source = "if a:\n\tx = 1\nelif b:\n\tx = 2\nelse:\n\tx = 3\n";
    let program = parse_source(source).unwrap();
    let outer = &program.tree.children()[0];
    assert_eq!(outer.children().len(), 3);
    let elif = &outer.children()[2];
    assert_eq!(elif.label().kind(), Some(TokenKind::If));
    assert_eq!(elif.label().token().map(|token| token.line), Some(3));
    assert_eq!(elif.children().len(), 3);
    assert_eq!(elif.children()[2].label().kind(), Some(TokenKind::Colon));
  }

  #[test]
  fn not_must_be_followed_by_an_atom() {
    let err = parse_source("x = not not y\n").unwrap_err();
    assert!(matches!(err, CompileError::Syntax { token } if token.kind == TokenKind::Not));
  }

  #[test]
  fn stray_dedent_at_top_level_is_rejected() {
    let tokens = vec![ident("x"), tok(TokenKind::Equals), int(1), tok(TokenKind::Dedent)];
    let err = parse_tokens(tokens).unwrap_err();
    assert_eq!(err, CompileError::syntax(tok(TokenKind::Dedent)));
  }

  #[test]
  fn unexpected_end_inside_block() {
    let err = parse_source("while x:\n\ty = 1").unwrap_err();
    assert_eq!(err, CompileError::UnexpectedEof { line: 2 });
  }

  #[test]
  fn unexpected_end_inside_expression() {
    let err = parse_source("x = 1 +").unwrap_err();
    assert_eq!(err, CompileError::UnexpectedEof { line: 1 });
  }

  #[test]
  fn lexical_error_surfaces_through_parse() {
    let err = parse_source("x = 1\ny = 2 & 3\n").unwrap_err();
    assert_eq!(err, CompileError::Lexical { line: 2 });
  }

  #[test]
  fn trailing_comma_in_parameters_is_rejected() {
    let err = parse_source("def f(a: int,) -> int:\n\treturn a\n").unwrap_err();
    assert!(matches!(err, CompileError::Syntax { token } if token.kind == TokenKind::RParen));
  }

  #[test]
  fn missing_condition_is_rejected() {
    let err = parse_source("while :\n\tx = 1\n").unwrap_err();
    assert!(matches!(err, CompileError::Syntax { token } if token.kind == TokenKind::Colon));
  }

  #[test]
  fn render_draws_branches() {
    let program = parse_source("x = 1\n").unwrap();
    assert_eq!(
      program.tree.render(),
      concat!(
        "Program\n",
        "└── EQUALS\n",
        "    ├── IDENTIFIER(x)\n",
        "    └── OPERATION\n",
        "        └── VALUE_INT(1)\n",
      )
    );
  }

  #[test]
  fn tokenize_then_parse_matches_lazy_parse() {
    let source = "def f(a: int) -> int:\n\treturn a * 2\nprint(f(3))\n";
    let eager = parse(tokenize(source).unwrap().into_iter().map(Ok)).unwrap();
    let lazy = parse_source(source).unwrap();
    assert_eq!(eager, lazy);
  }

  #[test]
  fn synthetic_labels_carry_no_position() {
    let program = parse_source("print(1 + 2)\nf(3)\n").unwrap();
    let [print, call] = program.tree.children() else {
      panic!("expected two statements");
    };
    assert_eq!(print.children()[0].label(), &Label::Operation);
    assert_eq!(call.label(), &Label::Call);
    assert_eq!(Label::Operation.to_string(), "OPERATION");
    assert_eq!(Label::Call.to_string(), "CALL");
  }
}
