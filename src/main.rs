use std::fs;
use std::path::PathBuf;
use std::process;

use clap::Parser;
use snafu::{ResultExt, Snafu};

use pycpp::{CompileError, codegen, parser, tokenizer};

#[derive(Parser)]
#[command(name = "pycpp", version)]
#[command(about = "Transpile a typed, tab-indented Python subset into C++", long_about = None)]
struct Cli {
  /// Source file to transpile
  #[arg(value_name = "INPUT")]
  input: PathBuf,

  /// Where to write the generated C++
  #[arg(value_name = "OUTPUT")]
  output: PathBuf,

  /// Print the token stream before transpiling
  #[arg(long)]
  emit_tokens: bool,

  /// Print the variable table and syntax tree before generating code
  #[arg(long)]
  emit_ast: bool,

  /// Also print the generated code to stdout
  #[arg(long)]
  print: bool,
}

#[derive(Debug, Snafu)]
enum CliError {
  #[snafu(display("failed to read '{}': {source}", path.display()))]
  ReadInput {
    path: PathBuf,
    source: std::io::Error,
  },

  #[snafu(display("failed to write '{}': {source}", path.display()))]
  WriteOutput {
    path: PathBuf,
    source: std::io::Error,
  },

  #[snafu(display("{source}"))]
  Compile { source: CompileError },
}

fn run(cli: &Cli) -> Result<(), CliError> {
  let source = fs::read_to_string(&cli.input).context(ReadInputSnafu { path: &cli.input })?;

  if cli.emit_tokens {
    for token in tokenizer::Tokenizer::new(&source) {
      let token = token.context(CompileSnafu)?;
      println!("{:>4}  {token}", token.line);
    }
  }

  let program = parser::parse(tokenizer::Tokenizer::new(&source)).context(CompileSnafu)?;
  if cli.emit_ast {
    print!("{}", program.variables);
    print!("{}", program.tree.render());
  }

  let code = codegen::generate(&program.variables, &program.tree);
  if cli.print {
    print!("{code}");
  }
  fs::write(&cli.output, &code).context(WriteOutputSnafu { path: &cli.output })
}

fn main() {
  let cli = Cli::parse();
  match run(&cli) {
    Ok(()) => {}
    Err(CliError::Compile { source }) => {
      eprintln!("{source}");
      process::exit(1);
    }
    Err(err) => {
      eprintln!("error: {err}");
      process::exit(1);
    }
  }
}
