//! Lexical analysis: turns raw source text into a lazy stream of tokens.
//!
//! Indentation is significant. A newline followed by tabs becomes a single
//! structural token (`INDENT`, `DEDENT` or `NEWLINE`) by comparing the tab
//! count against the depth of the previous line. Only that one depth is
//! remembered, so a line that drops several levels at once still yields a
//! single `DEDENT`.
//!
//! Lexical rules are tried in a fixed priority order and the first one that
//! matches wins. There is no word-boundary check: keywords are matched before
//! identifiers, multi-character operators before their one-character prefixes.

use std::fmt;

use crate::error::{CompileResult, LexicalSnafu};

/// Kinds of tokens recognised by the front-end.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TokenKind {
  Def,
  If,
  Elif,
  Else,
  While,
  Return,
  Print,
  NoneType,
  Int,
  Float,
  Bool,
  ValueInt,
  ValueFloat,
  ValueBool,
  Colon,
  Comma,
  Arrow,
  LParen,
  RParen,
  Plus,
  Minus,
  Multiply,
  Divide,
  Modulo,
  IsEqual,
  IsNotEqual,
  IsLess,
  IsEqualLess,
  IsMore,
  IsEqualMore,
  Equals,
  And,
  Or,
  Not,
  Identifier,
  Newline,
  Indent,
  Dedent,
}

impl TokenKind {
  pub fn name(self) -> &'static str {
    match self {
      Self::Def => "DEF",
      Self::If => "IF",
      Self::Elif => "ELIF",
      Self::Else => "ELSE",
      Self::While => "WHILE",
      Self::Return => "RETURN",
      Self::Print => "PRINT",
      Self::NoneType => "NONE",
      Self::Int => "INT",
      Self::Float => "FLOAT",
      Self::Bool => "BOOL",
      Self::ValueInt => "VALUE_INT",
      Self::ValueFloat => "VALUE_FLOAT",
      Self::ValueBool => "VALUE_BOOL",
      Self::Colon => "COLON",
      Self::Comma => "COMMA",
      Self::Arrow => "ARROW",
      Self::LParen => "LP",
      Self::RParen => "RP",
      Self::Plus => "PLUS",
      Self::Minus => "MINUS",
      Self::Multiply => "MULTIPLY",
      Self::Divide => "DIVIDE",
      Self::Modulo => "MODULO",
      Self::IsEqual => "ISEQUAL",
      Self::IsNotEqual => "ISNOTEQUAL",
      Self::IsLess => "ISLESS",
      Self::IsEqualLess => "ISEQUALLESS",
      Self::IsMore => "ISMORE",
      Self::IsEqualMore => "ISEQUALMORE",
      Self::Equals => "EQUALS",
      Self::And => "AND",
      Self::Or => "OR",
      Self::Not => "NOT",
      Self::Identifier => "IDENTIFIER",
      Self::Newline => "NEWLINE",
      Self::Indent => "INDENT",
      Self::Dedent => "DEDENT",
    }
  }

  /// Literal or identifier: anything that can stand as an operand.
  pub fn is_atom(self) -> bool {
    matches!(
      self,
      Self::ValueInt | Self::ValueFloat | Self::ValueBool | Self::Identifier
    )
  }

  /// Type names usable in declarations and parameter lists.
  pub fn is_type(self) -> bool {
    matches!(self, Self::Int | Self::Float | Self::Bool)
  }

  /// Arithmetic, logical and comparison operators that may appear between
  /// two atoms of a flat operation.
  pub fn is_binary_operator(self) -> bool {
    matches!(
      self,
      Self::Plus
        | Self::Minus
        | Self::Multiply
        | Self::Divide
        | Self::Modulo
        | Self::And
        | Self::Or
        | Self::IsEqual
        | Self::IsNotEqual
        | Self::IsLess
        | Self::IsEqualLess
        | Self::IsMore
        | Self::IsEqualMore
    )
  }
}

impl fmt::Display for TokenKind {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(self.name())
  }
}

/// Payload carried by literal and identifier tokens.
#[derive(Debug, Clone, PartialEq)]
pub enum TokenValue {
  Int(i64),
  Float(f64),
  Bool(bool),
  Name(String),
}

impl fmt::Display for TokenValue {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self {
      Self::Int(value) => write!(f, "{value}"),
      Self::Float(value) => write!(f, "{value:?}"),
      Self::Bool(true) => f.write_str("True"),
      Self::Bool(false) => f.write_str("False"),
      Self::Name(name) => f.write_str(name),
    }
  }
}

/// A lexical token. Two tokens are equal when line, kind and value all match.
#[derive(Debug, Clone, PartialEq)]
pub struct Token {
  pub line: usize,
  pub kind: TokenKind,
  pub value: Option<TokenValue>,
}

impl Token {
  pub fn new(line: usize, kind: TokenKind) -> Self {
    Self {
      line,
      kind,
      value: None,
    }
  }

  pub fn with_value(line: usize, kind: TokenKind, value: TokenValue) -> Self {
    Self {
      line,
      kind,
      value: Some(value),
    }
  }

  /// Identifier text, if this token carries a name.
  pub fn name(&self) -> Option<&str> {
    match &self.value {
      Some(TokenValue::Name(name)) => Some(name),
      _ => None,
    }
  }
}

impl fmt::Display for Token {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match &self.value {
      Some(value) => write!(f, "{}({value})", self.kind),
      None => write!(f, "{}", self.kind),
    }
  }
}

/// One entry of the priority-ordered rule table.
#[derive(Debug, Clone, Copy)]
enum Rule {
  Exact(&'static str, TokenKind),
  FloatLiteral,
  IntLiteral,
  BoolLiteral,
  Identifier,
}

const RULES: &[Rule] = &[
  Rule::Exact("def", TokenKind::Def),
  Rule::Exact("if", TokenKind::If),
  Rule::Exact("elif", TokenKind::Elif),
  Rule::Exact("else", TokenKind::Else),
  Rule::Exact("while", TokenKind::While),
  Rule::Exact("None", TokenKind::NoneType),
  Rule::Exact("int", TokenKind::Int),
  Rule::Exact("float", TokenKind::Float),
  Rule::Exact("bool", TokenKind::Bool),
  Rule::Exact("return", TokenKind::Return),
  Rule::Exact("print", TokenKind::Print),
  Rule::FloatLiteral,
  Rule::IntLiteral,
  Rule::BoolLiteral,
  Rule::Exact(":", TokenKind::Colon),
  Rule::Exact(",", TokenKind::Comma),
  Rule::Exact("->", TokenKind::Arrow),
  Rule::Exact("+", TokenKind::Plus),
  Rule::Exact("-", TokenKind::Minus),
  Rule::Exact("*", TokenKind::Multiply),
  Rule::Exact("/", TokenKind::Divide),
  Rule::Exact("(", TokenKind::LParen),
  Rule::Exact(")", TokenKind::RParen),
  Rule::Exact("%", TokenKind::Modulo),
  Rule::Exact("==", TokenKind::IsEqual),
  Rule::Exact("!=", TokenKind::IsNotEqual),
  Rule::Exact("<=", TokenKind::IsEqualLess),
  Rule::Exact("<", TokenKind::IsLess),
  Rule::Exact(">=", TokenKind::IsEqualMore),
  Rule::Exact(">", TokenKind::IsMore),
  Rule::Exact("=", TokenKind::Equals),
  Rule::Exact("and", TokenKind::And),
  Rule::Exact("or", TokenKind::Or),
  Rule::Exact("not", TokenKind::Not),
  Rule::Identifier,
];

/// Pull-based scanner over one source text.
///
/// `Tokenizer` is also an iterator of `CompileResult<Token>`; it yields
/// nothing more once the input is exhausted or a lexical error was reported,
/// until [`Tokenizer::reset`] installs a new input.
#[derive(Debug, Clone)]
pub struct Tokenizer<'a> {
  input: &'a str,
  pos: usize,
  line: usize,
  depth: usize,
  failed: bool,
}

impl<'a> Tokenizer<'a> {
  pub fn new(input: &'a str) -> Self {
    Self {
      input,
      pos: 0,
      line: 1,
      depth: 0,
      failed: false,
    }
  }

  /// Start scanning `input` from the beginning with fresh line and depth state.
  pub fn reset(&mut self, input: &'a str) {
    *self = Self::new(input);
  }

  /// Return the next token, `Ok(None)` at end of input, or a lexical error
  /// carrying the current line.
  pub fn next_token(&mut self) -> CompileResult<Option<Token>> {
    loop {
      if self.pos >= self.input.len() {
        return Ok(None);
      }

      if let Some(token) = self.structural_token() {
        return Ok(Some(token));
      }

      let skipped = self.skip_blanks();
      if skipped > 0 {
        // blanks may end right before a newline
        continue;
      }

      return match self.match_rule() {
        Some(token) => Ok(Some(token)),
        None => LexicalSnafu { line: self.line }.fail(),
      };
    }
  }

  /// `\n` followed by a run of tabs: compare the tab count with the previous
  /// line's depth.
  fn structural_token(&mut self) -> Option<Token> {
    let rest = self.input.get(self.pos..)?.as_bytes();
    if rest.first() != Some(&b'\n') {
      return None;
    }
    let tabs = rest[1..].iter().take_while(|&&byte| byte == b'\t').count();
    self.pos += 1 + tabs;
    self.line += 1;

    let previous = self.depth;
    self.depth = tabs;
    let kind = if tabs < previous {
      TokenKind::Dedent
    } else if tabs > previous {
      TokenKind::Indent
    } else {
      TokenKind::Newline
    };
    Some(Token::new(self.line, kind))
  }

  fn skip_blanks(&mut self) -> usize {
    let rest = &self.input.as_bytes()[self.pos..];
    let count = rest
      .iter()
      .take_while(|&&byte| byte != b'\n' && byte.is_ascii_whitespace())
      .count();
    self.pos += count;
    count
  }

  fn match_rule(&mut self) -> Option<Token> {
    let rest = &self.input[self.pos..];
    let (len, kind) = RULES
      .iter()
      .find_map(|rule| match_len(*rule, rest).map(|len| (len, rule_kind(*rule))))?;

    let text = &rest[..len];
    let value = match kind {
      TokenKind::ValueInt => match text.parse::<i64>() {
        Ok(value) => Some(TokenValue::Int(value)),
        // out of range for i64
        Err(_) => return None,
      },
      TokenKind::ValueFloat => text.parse::<f64>().ok().map(TokenValue::Float),
      TokenKind::ValueBool => Some(TokenValue::Bool(text == "True")),
      TokenKind::Identifier => Some(TokenValue::Name(text.to_string())),
      _ => None,
    };

    self.pos += len;
    Some(Token {
      line: self.line,
      kind,
      value,
    })
  }
}

impl Iterator for Tokenizer<'_> {
  type Item = CompileResult<Token>;

  fn next(&mut self) -> Option<Self::Item> {
    if self.failed {
      return None;
    }
    match self.next_token() {
      Ok(token) => token.map(Ok),
      Err(err) => {
        self.failed = true;
        Some(Err(err))
      }
    }
  }
}

/// Lex the whole input into a vector of tokens.
pub fn tokenize(input: &str) -> CompileResult<Vec<Token>> {
  Tokenizer::new(input).collect()
}

fn rule_kind(rule: Rule) -> TokenKind {
  match rule {
    Rule::Exact(_, kind) => kind,
    Rule::FloatLiteral => TokenKind::ValueFloat,
    Rule::IntLiteral => TokenKind::ValueInt,
    Rule::BoolLiteral => TokenKind::ValueBool,
    Rule::Identifier => TokenKind::Identifier,
  }
}

/// Length of the match of `rule` at the start of `rest`, if any.
fn match_len(rule: Rule, rest: &str) -> Option<usize> {
  let bytes = rest.as_bytes();
  match rule {
    Rule::Exact(text, _) => rest.starts_with(text).then_some(text.len()),
    Rule::FloatLiteral => {
      let int_part = signed_digits(bytes)?;
      if bytes.get(int_part) != Some(&b'.') {
        return None;
      }
      let fraction = digits(&bytes[int_part + 1..]);
      (fraction > 0).then_some(int_part + 1 + fraction)
    }
    Rule::IntLiteral => signed_digits(bytes),
    Rule::BoolLiteral => ["True", "False"]
      .into_iter()
      .find(|word| rest.starts_with(word))
      .map(str::len),
    Rule::Identifier => {
      let first = bytes.first()?;
      if !(first.is_ascii_alphabetic() || *first == b'_') {
        return None;
      }
      let tail = bytes[1..]
        .iter()
        .take_while(|byte| byte.is_ascii_alphanumeric() || **byte == b'_')
        .count();
      Some(1 + tail)
    }
  }
}

/// `-?\d+`
fn signed_digits(bytes: &[u8]) -> Option<usize> {
  let sign = usize::from(bytes.first() == Some(&b'-'));
  let count = digits(&bytes[sign..]);
  (count > 0).then_some(sign + count)
}

fn digits(bytes: &[u8]) -> usize {
  bytes.iter().take_while(|byte| byte.is_ascii_digit()).count()
}
