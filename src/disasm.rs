//! Byte stream back to mnemonic text, for listings and debug output.

use std::fmt;

use crate::isa::{self, LABEL_PLACEHOLDER, NUMBER_PLACEHOLDER, OperandKind};

/// One decoded instruction (or stray byte) of a listing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Disassembled {
  pub offset: usize,
  pub bytes: Vec<u8>,
  pub text: String,
}

impl fmt::Display for Disassembled {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    let hex: Vec<String> = self.bytes.iter().map(|b| format!("{b:02X}")).collect();
    write!(f, "{:04X}: {:<9} {}", self.offset, hex.join(" "), self.text)
  }
}

/// Walk `bytes` from the start. Unassigned opcodes, and instructions whose
/// operand runs past the end, render as `.byte` entries.
pub fn disassemble(bytes: &[u8]) -> Vec<Disassembled> {
  let mut listing = Vec::new();
  let mut offset = 0;

  while offset < bytes.len() {
    let opcode = bytes[offset];
    let entry = isa::decode(opcode)
      .filter(|instruction| offset + instruction.len() <= bytes.len())
      .map(|instruction| {
        let operand = &bytes[offset + 1..offset + instruction.len()];
        let text = match instruction.operand {
          OperandKind::None => instruction.pattern.to_string(),
          OperandKind::Number => instruction
            .pattern
            .replace(NUMBER_PLACEHOLDER, &operand[0].to_string()),
          OperandKind::Label => instruction.pattern.replace(
            LABEL_PLACEHOLDER,
            &format!("0x{:04X}", u16::from_be_bytes([operand[0], operand[1]])),
          ),
        };
        Disassembled {
          offset,
          bytes: bytes[offset..offset + instruction.len()].to_vec(),
          text,
        }
      })
      .unwrap_or_else(|| Disassembled {
        offset,
        bytes: vec![opcode],
        text: format!(".byte 0x{opcode:02X}"),
      });

    offset += entry.bytes.len();
    listing.push(entry);
  }

  listing
}

/// Render a full listing, one instruction per line.
pub fn listing(bytes: &[u8]) -> String {
  disassemble(bytes)
    .iter()
    .map(|entry| format!("{entry}\n"))
    .collect()
}

#[cfg(test)]
mod tests {
  use super::*;

  fn texts(bytes: &[u8]) -> Vec<String> {
    disassemble(bytes).into_iter().map(|entry| entry.text).collect()
  }

  #[test]
  fn operands_are_substituted() {
    assert_eq!(
      texts(&[0xD0, 0x05, 0x6C, 0x31, 0x01, 0x02, 0xFF]),
      ["load rom a 5", "opp a+b", "jmp = 0x0102", "halt"]
    );
  }

  #[test]
  fn unassigned_and_truncated_bytes_render_as_data() {
    assert_eq!(texts(&[0xFE, 0x30, 0x00]), [".byte 0xFE", ".byte 0x30", "nop"]);
  }

  #[test]
  fn offsets_follow_instruction_lengths() {
    let offsets: Vec<usize> = disassemble(&[0x30, 0x00, 0x00, 0xD4, 0x07, 0xF4])
      .into_iter()
      .map(|entry| entry.offset)
      .collect();
    assert_eq!(offsets, [0, 3, 5]);
  }

  #[test]
  fn listing_line_format() {
    assert_eq!(listing(&[0xD0, 0x2A]), "0000: D0 2A     load rom a 42\n");
  }
}
