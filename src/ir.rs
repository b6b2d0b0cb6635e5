//! Mnemonic lines emitted by code generation and consumed by the assembler.

use std::fmt;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AsmLine {
  Instruction { mnemonic: String, operands: String },
  Label { name: String },
}

impl AsmLine {
  /// Build an instruction from its assembly text, e.g. `"opp a+b"`.
  pub fn instruction(text: &str) -> Self {
    let (mnemonic, operands) = text.split_once(' ').unwrap_or((text, ""));
    Self::Instruction {
      mnemonic: mnemonic.to_string(),
      operands: operands.to_string(),
    }
  }

  pub fn label(name: impl Into<String>) -> Self {
    Self::Label { name: name.into() }
  }
}

impl fmt::Display for AsmLine {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self {
      Self::Instruction { mnemonic, operands } if operands.is_empty() => f.write_str(mnemonic),
      Self::Instruction { mnemonic, operands } => write!(f, "{mnemonic} {operands}"),
      Self::Label { name } => write!(f, ":{name}"),
    }
  }
}

/// Render lines in the textual form the assembler reads.
pub fn to_text(lines: &[AsmLine]) -> Vec<String> {
  lines.iter().map(ToString::to_string).collect()
}
