//! Crate root: wires together the jrb8 toolchain.
//!
//! - `tokenizer` turns source text into a flat token stream.
//! - `parser` builds the statement/expression AST by recursive descent.
//! - `codegen` lowers the AST into mnemonic lines (`ir::AsmLine`).
//! - `assembler` resolves labels and encodes mnemonics against the `isa` table.
//! - `vm` executes the resulting bytes one instruction per step.
//! - `disasm` and `fixture` are tooling on top of the same table and VM.

pub mod log;

pub mod assembler;
pub mod ast;
pub mod codegen;
pub mod disasm;
pub mod error;
pub mod fixture;
pub mod ir;
pub mod isa;
pub mod parser;
pub mod tokenizer;
pub mod vm;

use snafu::ensure;

pub use assembler::{Assembler, assemble_source};
pub use codegen::Generator;
pub use error::{CompileError, CompileResult};
use error::EmptyOutputSnafu;
pub use ir::AsmLine;
pub use vm::{RunOutcome, Vm};

/// Output of a successful [`compile`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Compiled {
  pub machine_code: Vec<u8>,
  pub assembly: Vec<AsmLine>,
}

/// Compile source text all the way to machine code.
pub fn compile(source: &str) -> CompileResult<Compiled> {
  let tokens = tokenizer::tokenize(source)?;
  let program = parser::parse(tokens)?;
  let assembly = Generator::new().generate(&program)?;

  let lines = ir::to_text(&assembly);
  debug!("generated assembly:\n{}", lines.join("\n"));

  let mut assembler = Assembler::new();
  let encoded = assembler.assemble(&lines)?;
  let machine_code = assembler.hex_output(&encoded)?;
  ensure!(!machine_code.is_empty(), EmptyOutputSnafu);

  Ok(Compiled {
    machine_code,
    assembly,
  })
}

/// Compile only as far as the mnemonic lines.
pub fn generate_assembly(source: &str) -> CompileResult<Vec<AsmLine>> {
  let tokens = tokenizer::tokenize(source)?;
  let program = parser::parse(tokens)?;
  Ok(Generator::new().generate(&program)?)
}
