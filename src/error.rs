//! Error types shared across the toolchain.
//!
//! Every stage owns one error kind and fails fast with it. `CompileError` is
//! the only wrapper: it converts from the stage errors so `?` carries the first
//! failure out of [`crate::compile`] without losing its message.

use snafu::Snafu;

use crate::tokenizer::{Token, TokenKind};

pub type LexResult<T> = Result<T, LexicalError>;
pub type ParseResult<T> = Result<T, SyntaxError>;
pub type CodegenResult<T> = Result<T, CodegenError>;
pub type AsmResult<T> = Result<T, AsmError>;
pub type CompileResult<T> = Result<T, CompileError>;

/// Failures raised while scanning source text.
#[derive(Debug, Clone, PartialEq, Eq, Snafu)]
#[snafu(visibility(pub(crate)))]
pub enum LexicalError {
  #[snafu(display("{line}:{column}: unterminated string"))]
  UnterminatedString { line: usize, column: usize },
  #[snafu(display("{line}:{column}: unexpected character '{character}'"))]
  UnexpectedCharacter {
    line: usize,
    column: usize,
    character: char,
  },
  #[snafu(display("{line}:{column}: expected digits after '0{prefix}'"))]
  MissingDigits {
    line: usize,
    column: usize,
    prefix: char,
  },
  #[snafu(display("{line}:{column}: numeric literal '{text}' is too large"))]
  NumberOverflow {
    line: usize,
    column: usize,
    text: String,
  },
}

/// A grammar violation, anchored at the token that triggered it.
#[derive(Debug, Clone, PartialEq, Eq, Snafu)]
#[snafu(display("{line}:{column}: {message}"))]
pub struct SyntaxError {
  pub line: usize,
  pub column: usize,
  pub message: String,
}

impl SyntaxError {
  /// Construct an error pointing at `token`.
  pub fn at(token: &Token, message: impl Into<String>) -> Self {
    let message = message.into();
    let message = match token.kind {
      TokenKind::Eof => format!("{message} (at end of input)"),
      _ => format!("{message} (got '{}')", token.lexeme),
    };
    Self {
      line: token.line,
      column: token.column,
      message,
    }
  }
}

/// Constructs the target cannot express, or names that do not resolve.
#[derive(Debug, Clone, PartialEq, Eq, Snafu)]
#[snafu(visibility(pub(crate)))]
pub enum CodegenError {
  #[snafu(display("{construct} are not supported on this target"))]
  Unsupported { construct: &'static str },
  #[snafu(display("undefined variable: {name}"))]
  UndefinedVariable { name: String },
  #[snafu(display("number out of range (0-255): {value}"))]
  NumberOutOfRange { value: String },
  #[snafu(display("out of RAM: no address left for '{name}'"))]
  RamExhausted { name: String },
}

/// Failures of either assembler pass.
#[derive(Debug, Clone, PartialEq, Eq, Snafu)]
#[snafu(visibility(pub(crate)))]
pub enum AsmError {
  #[snafu(display("line {line}: unrecognized instruction: {text}"))]
  UnknownInstruction { line: usize, text: String },
  #[snafu(display("line {line}: invalid operands: {text}"))]
  InvalidOperand { line: usize, text: String },
  #[snafu(display("line {line}: duplicate label detected: {label}"))]
  DuplicateLabel { line: usize, label: String },
  #[snafu(display("undefined label: {label}"))]
  UndefinedLabel { label: String },
  #[snafu(display("label {label} at offset {offset:#X} is beyond 16-bit address space"))]
  LabelOutOfRange { label: String, offset: usize },
  #[snafu(display("line {line}: number larger than can fit in register: {value}"))]
  NumberRange { line: usize, value: String },
}

/// Failures of the expectation-fixture harness.
#[derive(Debug, Clone, PartialEq, Eq, Snafu)]
#[snafu(visibility(pub(crate)))]
pub enum FixtureError {
  #[snafu(display("line {line}: malformed expectation: {text}"))]
  Malformed { line: usize, text: String },
  #[snafu(display("{source}"))]
  Assembly { source: AsmError },
}

/// The single error surfaced by [`crate::compile`].
#[derive(Debug, Clone, PartialEq, Eq, Snafu)]
#[snafu(visibility(pub(crate)))]
pub enum CompileError {
  #[snafu(context(false), display("{source}"))]
  Lexical { source: LexicalError },
  #[snafu(context(false), display("{source}"))]
  Syntax { source: SyntaxError },
  #[snafu(context(false), display("{source}"))]
  Codegen { source: CodegenError },
  #[snafu(context(false), display("{source}"))]
  Assembly { source: AsmError },
  #[snafu(display("failed to resolve all labels in the bytecode"))]
  EmptyOutput,
}
