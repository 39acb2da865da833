//! Code generation: walk the syntax tree and emit C++ source text.
//!
//! The output shape is fixed: a prelude, one C++ function per top-level
//! `def`, then `main` wrapping the top-level statements. Each scope's declared
//! variables are hoisted to the top of the generated block. Flat operations
//! are emitted token by token in source order, so grouping follows C++
//! precedence.

use crate::parser::{Label, Node};
use crate::tokenizer::{Token, TokenKind, TokenValue};
use crate::ty::{TypeName, VariableTable};

const PRELUDE: &str = "#include <iostream>\n\n";
const MAIN_OPEN: &str = "\nint main()\n{\n";
const MAIN_CLOSE: &str = "    return 0;\n}\n";
const INDENT_WIDTH: usize = 4;

/// Emit the C++ translation of a parsed program.
pub fn generate(variables: &VariableTable, tree: &Node) -> String {
  let mut out = String::new();
  out.push_str(PRELUDE);

  for node in tree.children() {
    if node.label().kind() == Some(TokenKind::Def) {
      emit_function(node, variables, &mut out);
    }
  }

  out.push_str(MAIN_OPEN);
  emit_declarations(variables, VariableTable::GLOBAL, 1, &mut out);
  emit_block(tree, 1, &mut out);
  out.push_str(MAIN_CLOSE);
  out
}

/// `DEF[name[params...], return type, body]`
fn emit_function(def: &Node, variables: &VariableTable, out: &mut String) {
  let [signature, ret, body] = def.children() else {
    return;
  };
  let name = signature.label().token().and_then(Token::name).unwrap_or_default();
  let ret = ret
    .label()
    .kind()
    .and_then(TypeName::from_return_kind)
    .unwrap_or(TypeName::None);

  let params: Vec<String> = signature
    .children()
    .iter()
    .filter_map(|param| {
      let name = param.label().token().and_then(Token::name)?;
      let ty = param.children().first()?.label().kind().and_then(TypeName::from_value_kind)?;
      Some(format!("{} {name}", ty.cpp_name()))
    })
    .collect();

  out.push_str(&format!("{} {name}({})\n{{\n", ret.cpp_name(), params.join(", ")));
  emit_declarations(variables, name, 1, out);
  emit_block(body, 1, out);
  out.push_str("}\n");
}

fn emit_declarations(variables: &VariableTable, scope: &str, level: usize, out: &mut String) {
  for decl in variables.scope(scope) {
    push_line(out, level, &format!("{} {};", decl.ty.cpp_name(), decl.name));
  }
}

/// Translate every statement child of `block`. Nodes that are not statements
/// here (function definitions, in particular) produce no code.
fn emit_block(block: &Node, level: usize, out: &mut String) {
  for node in block.children() {
    emit_statement(node, level, out);
  }
}

fn emit_statement(node: &Node, level: usize, out: &mut String) {
  match node.label() {
    Label::Call => {
      let call = call_code(node);
      push_line(out, level, &format!("{call};"));
    }
    Label::Token(token) => match token.kind {
      TokenKind::Equals => {
        if let [target, value] = node.children() {
          let target = target.label().token().and_then(Token::name).unwrap_or_default();
          push_line(out, level, &format!("{target} = {};", expression_code(value)));
        }
      }
      TokenKind::Return => {
        if let [value] = node.children() {
          push_line(out, level, &format!("return {};", expression_code(value)));
        }
      }
      TokenKind::Print => {
        let mut line = String::from("std::cout << ");
        for arg in node.children() {
          line.push_str(&expression_code(arg));
          line.push_str(" << ");
        }
        line.push_str("std::endl;");
        push_line(out, level, &line);
      }
      TokenKind::While => {
        if let [condition, body] = node.children() {
          push_line(out, level, &format!("while({})", expression_code(condition)));
          emit_braced(body, level, out);
        }
      }
      TokenKind::If => emit_if(node, level, out),
      _ => {}
    },
    Label::Program | Label::Operation => {}
  }
}

/// `IF[condition, body, (IF | else body)?]`. An `elif` clause is emitted as
/// a plain `if` right after the closing brace.
fn emit_if(node: &Node, level: usize, out: &mut String) {
  let (condition, body, rest) = match node.children() {
    [condition, body] => (condition, body, None),
    [condition, body, rest] => (condition, body, Some(rest)),
    _ => return,
  };
  push_line(out, level, &format!("if({})", expression_code(condition)));
  emit_braced(body, level, out);

  let Some(rest) = rest else {
    return;
  };
  if rest.label().kind() == Some(TokenKind::If) {
    emit_if(rest, level, out);
  } else {
    push_line(out, level, "else");
    emit_braced(rest, level, out);
  }
}

fn emit_braced(body: &Node, level: usize, out: &mut String) {
  push_line(out, level, "{");
  emit_block(body, level + 1, out);
  push_line(out, level, "}");
}

fn expression_code(node: &Node) -> String {
  match node.label() {
    Label::Call => call_code(node),
    _ => node
      .children()
      .iter()
      .filter_map(|element| element.label().token().map(element_code))
      .collect::<Vec<_>>()
      .join(" "),
  }
}

/// `CALL[name, args...]` as `name(a, b)`.
fn call_code(node: &Node) -> String {
  let Some((callee, args)) = node.children().split_first() else {
    return String::new();
  };
  let name = callee.label().token().and_then(Token::name).unwrap_or_default();
  let args: Vec<String> = args
    .iter()
    .filter_map(|arg| arg.label().token().map(element_code))
    .collect();
  format!("{name}({})", args.join(", "))
}

/// C++ spelling of an operand or operator token.
fn element_code(token: &Token) -> String {
  if let Some(value) = &token.value {
    return match value {
      TokenValue::Int(value) => value.to_string(),
      TokenValue::Float(value) => format!("{value:?}"),
      TokenValue::Bool(value) => value.to_string(),
      TokenValue::Name(name) => name.clone(),
    };
  }
  operator_symbol(token.kind).to_string()
}

fn operator_symbol(kind: TokenKind) -> &'static str {
  match kind {
    TokenKind::Not => "!",
    TokenKind::Plus => "+",
    TokenKind::Minus => "-",
    TokenKind::Multiply => "*",
    TokenKind::Divide => "/",
    TokenKind::Modulo => "%",
    TokenKind::And => "&&",
    TokenKind::Or => "||",
    TokenKind::IsEqual => "==",
    TokenKind::IsNotEqual => "!=",
    TokenKind::IsLess => "<",
    TokenKind::IsEqualLess => "<=",
    TokenKind::IsMore => ">",
    TokenKind::IsEqualMore => ">=",
    TokenKind::Def
    | TokenKind::If
    | TokenKind::Elif
    | TokenKind::Else
    | TokenKind::While
    | TokenKind::Return
    | TokenKind::Print
    | TokenKind::NoneType
    | TokenKind::Int
    | TokenKind::Float
    | TokenKind::Bool
    | TokenKind::ValueInt
    | TokenKind::ValueFloat
    | TokenKind::ValueBool
    | TokenKind::Colon
    | TokenKind::Comma
    | TokenKind::Arrow
    | TokenKind::LParen
    | TokenKind::RParen
    | TokenKind::Equals
    | TokenKind::Identifier
    | TokenKind::Newline
    | TokenKind::Indent
    | TokenKind::Dedent => "",
  }
}

fn push_indent(out: &mut String, level: usize) {
  out.push_str(&" ".repeat(level * INDENT_WIDTH));
}

fn push_line(out: &mut String, level: usize, line: &str) {
  push_indent(out, level);
  out.push_str(line);
  out.push('\n');
}
