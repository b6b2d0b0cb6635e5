//! Instruction set of the jrb8 CPU.
//!
//! [`OPCODES`] is the one table of mnemonic patterns and their opcode bytes.
//! The assembler matches source lines against it, while the VM and the
//! disassembler decode bytes through [`decode`], which parses each pattern
//! once into a structured [`Op`].
//!
//! Patterns may end in one placeholder: `{number}` stands for a single
//! immediate byte and `{label}` for a two-byte big-endian absolute address.
//! Bytes with no table entry execute as no-ops.

use std::fmt;
use std::sync::OnceLock;

/// Mnemonic pattern to opcode byte.
pub const OPCODES: &[(&str, u8)] = &[
  ("nop", 0x00),
  // mov x y: y := x
  ("mov a b", 0x01),
  ("mov a c", 0x02),
  ("mov a d", 0x03),
  ("mov b a", 0x04),
  ("mov b c", 0x05),
  ("mov b d", 0x06),
  ("mov c a", 0x07),
  ("mov c b", 0x08),
  ("mov c d", 0x09),
  ("mov d a", 0x0A),
  ("mov d b", 0x0B),
  ("mov d c", 0x0C),
  // cmp against constants: low two bits pick the register
  ("cmp a 0", 0x10),
  ("cmp b 0", 0x11),
  ("cmp c 0", 0x12),
  ("cmp d 0", 0x13),
  ("cmp a 1", 0x14),
  ("cmp b 1", 0x15),
  ("cmp c 1", 0x16),
  ("cmp d 1", 0x17),
  ("cmp a -1", 0x18),
  ("cmp b -1", 0x19),
  ("cmp c -1", 0x1A),
  ("cmp d -1", 0x1B),
  ("cmp a 255", 0x1C),
  ("cmp b 255", 0x1D),
  ("cmp c 255", 0x1E),
  ("cmp d 255", 0x1F),
  ("cmp a a", 0x20),
  ("cmp a b", 0x21),
  ("cmp a c", 0x22),
  ("cmp a d", 0x23),
  ("cmp b a", 0x24),
  ("cmp b b", 0x25),
  ("cmp b c", 0x26),
  ("cmp b d", 0x27),
  ("cmp c a", 0x28),
  ("cmp c b", 0x29),
  ("cmp c c", 0x2A),
  ("cmp c d", 0x2B),
  ("cmp d a", 0x2C),
  ("cmp d b", 0x2D),
  ("cmp d c", 0x2E),
  ("cmp d d", 0x2F),
  ("jmp {label}", 0x30),
  ("jmp = {label}", 0x31),
  ("jmp != {label}", 0x32),
  ("jmp < {label}", 0x33),
  ("jmp <= {label}", 0x34),
  ("jmp > {label}", 0x35),
  ("jmp >= {label}", 0x36),
  ("jmp .< {label}", 0x37),
  ("jmp .<= {label}", 0x38),
  ("jmp .> {label}", 0x39),
  ("jmp .>= {label}", 0x3A),
  ("jmp z {label}", 0x3B),
  ("jmp o {label}", 0x3C),
  ("jmp c {label}", 0x3D),
  ("jmp s {label}", 0x3E),
  ("jmpr {number}", 0x40),
  ("jmpr = {number}", 0x41),
  ("jmpr != {number}", 0x42),
  ("jmpr < {number}", 0x43),
  ("jmpr <= {number}", 0x44),
  ("jmpr > {number}", 0x45),
  ("jmpr >= {number}", 0x46),
  ("jmpr .< {number}", 0x47),
  ("jmpr .<= {number}", 0x48),
  ("jmpr .> {number}", 0x49),
  ("jmpr .>= {number}", 0x4A),
  ("jmpr z {number}", 0x4B),
  ("jmpr o {number}", 0x4C),
  ("jmpr c {number}", 0x4D),
  ("jmpr s {number}", 0x4E),
  ("opp clr", 0x50),
  ("opp carry off", 0x51),
  ("opp carry on", 0x52),
  ("opp sign off", 0x53),
  ("opp sign on", 0x54),
  ("opp 0", 0x55),
  ("opp 1", 0x56),
  ("opp -1", 0x57),
  ("opp a", 0x58),
  ("opp b", 0x59),
  ("opp c", 0x5A),
  ("opp d", 0x5B),
  ("opp ~a", 0x5C),
  ("opp ~b", 0x5D),
  ("opp ~c", 0x5E),
  ("opp ~d", 0x5F),
  ("opp -a", 0x60),
  ("opp -b", 0x61),
  ("opp -c", 0x62),
  ("opp -d", 0x63),
  ("opp a+1", 0x64),
  ("opp b+1", 0x65),
  ("opp c+1", 0x66),
  ("opp d+1", 0x67),
  ("opp a-1", 0x68),
  ("opp b-1", 0x69),
  ("opp c-1", 0x6A),
  ("opp d-1", 0x6B),
  ("opp a+b", 0x6C),
  ("opp a+c", 0x6D),
  ("opp a+d", 0x6E),
  ("opp b+a", 0x6F),
  ("opp b+c", 0x70),
  ("opp b+d", 0x71),
  ("opp c+a", 0x72),
  ("opp c+b", 0x73),
  ("opp c+d", 0x74),
  ("opp d+a", 0x75),
  ("opp d+b", 0x76),
  ("opp d+c", 0x77),
  ("opp a-b", 0x78),
  ("opp a-c", 0x79),
  ("opp a-d", 0x7A),
  ("opp b-a", 0x7B),
  ("opp b-c", 0x7C),
  ("opp b-d", 0x7D),
  ("opp c-a", 0x7E),
  ("opp c-b", 0x7F),
  ("opp c-d", 0x80),
  ("opp d-a", 0x81),
  ("opp d-b", 0x82),
  ("opp d-c", 0x83),
  ("opp a*a", 0x84),
  ("opp a*b", 0x85),
  ("opp a*c", 0x86),
  ("opp a*d", 0x87),
  ("opp b*a", 0x88),
  ("opp b*b", 0x89),
  ("opp b*c", 0x8A),
  ("opp b*d", 0x8B),
  ("opp c*a", 0x8C),
  ("opp c*b", 0x8D),
  ("opp c*c", 0x8E),
  ("opp c*d", 0x8F),
  ("opp d*a", 0x90),
  ("opp d*b", 0x91),
  ("opp d*c", 0x92),
  ("opp d*d", 0x93),
  ("opp a.*a", 0x94),
  ("opp a.*b", 0x95),
  ("opp a.*c", 0x96),
  ("opp a.*d", 0x97),
  ("opp b.*a", 0x98),
  ("opp b.*b", 0x99),
  ("opp b.*c", 0x9A),
  ("opp b.*d", 0x9B),
  ("opp c.*a", 0x9C),
  ("opp c.*b", 0x9D),
  ("opp c.*c", 0x9E),
  ("opp c.*d", 0x9F),
  ("opp d.*a", 0xA0),
  ("opp d.*b", 0xA1),
  ("opp d.*c", 0xA2),
  ("opp d.*d", 0xA3),
  ("opp a/b", 0xA4),
  ("opp a/c", 0xA5),
  ("opp a/d", 0xA6),
  ("opp b/a", 0xA7),
  ("opp b/c", 0xA8),
  ("opp b/d", 0xA9),
  ("opp c/a", 0xAA),
  ("opp c/b", 0xAB),
  ("opp c/d", 0xAC),
  ("opp d/a", 0xAD),
  ("opp d/b", 0xAE),
  ("opp d/c", 0xAF),
  ("opp a&b", 0xB0),
  ("opp a&c", 0xB1),
  ("opp a&d", 0xB2),
  ("opp b&c", 0xB3),
  ("opp b&d", 0xB4),
  ("opp c&d", 0xB5),
  ("opp a|b", 0xB6),
  ("opp a|c", 0xB7),
  ("opp a|d", 0xB8),
  ("opp b|c", 0xB9),
  ("opp b|d", 0xBA),
  ("opp c|d", 0xBB),
  // load ram[addr] target: addr register is the outer index
  ("load ram[a] a", 0xC0),
  ("load ram[a] b", 0xC1),
  ("load ram[a] c", 0xC2),
  ("load ram[a] d", 0xC3),
  ("load ram[b] a", 0xC4),
  ("load ram[b] b", 0xC5),
  ("load ram[b] c", 0xC6),
  ("load ram[b] d", 0xC7),
  ("load ram[c] a", 0xC8),
  ("load ram[c] b", 0xC9),
  ("load ram[c] c", 0xCA),
  ("load ram[c] d", 0xCB),
  ("load ram[d] a", 0xCC),
  ("load ram[d] b", 0xCD),
  ("load ram[d] c", 0xCE),
  ("load ram[d] d", 0xCF),
  ("load rom a {number}", 0xD0),
  ("load rom b {number}", 0xD1),
  ("load rom c {number}", 0xD2),
  ("load rom d {number}", 0xD3),
  ("load ram[{number}] a", 0xD4),
  ("load ram[{number}] b", 0xD5),
  ("load ram[{number}] c", 0xD6),
  ("load ram[{number}] d", 0xD7),
  ("set a rampage", 0xD8),
  ("set b rampage", 0xD9),
  ("set c rampage", 0xDA),
  ("set d rampage", 0xDB),
  ("save a mar", 0xE0),
  ("save b mar", 0xE1),
  ("save c mar", 0xE2),
  ("save d mar", 0xE3),
  ("save a ram[current]", 0xE4),
  ("save b ram[current]", 0xE5),
  ("save c ram[current]", 0xE6),
  ("save d ram[current]", 0xE7),
  // only four source/address pairings are wired in hardware; the bracketed
  // register supplies the address, never the source register
  ("save a ram[a]", 0xE8),
  ("save b ram[c]", 0xE9),
  ("save c ram[d]", 0xEA),
  ("save d ram[d]", 0xEB),
  ("save a ram[{number}]", 0xEC),
  ("save b ram[{number}]", 0xED),
  ("save c ram[{number}]", 0xEE),
  ("save d ram[{number}]", 0xEF),
  ("in a", 0xF0),
  ("in b", 0xF1),
  ("in c", 0xF2),
  ("in d", 0xF3),
  ("out a", 0xF4),
  ("out b", 0xF5),
  ("out c", 0xF6),
  ("out d", 0xF7),
  ("out {number}", 0xF8),
  ("out ram[{number}]", 0xF9),
  ("out ram[a]", 0xFA),
  ("out ram[b]", 0xFB),
  ("out ram[c]", 0xFC),
  ("out ram[d]", 0xFD),
  ("halt", 0xFF),
];

pub const NUMBER_PLACEHOLDER: &str = "{number}";
pub const LABEL_PLACEHOLDER: &str = "{label}";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Register {
  A,
  B,
  C,
  D,
}

impl Register {
  pub const ALL: [Register; 4] = [Self::A, Self::B, Self::C, Self::D];

  pub fn from_name(name: &str) -> Option<Self> {
    match name {
      "a" => Some(Self::A),
      "b" => Some(Self::B),
      "c" => Some(Self::C),
      "d" => Some(Self::D),
      _ => None,
    }
  }

  pub fn index(self) -> usize {
    self as usize
  }

  pub fn name(self) -> &'static str {
    match self {
      Self::A => "a",
      Self::B => "b",
      Self::C => "c",
      Self::D => "d",
    }
  }
}

impl fmt::Display for Register {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(self.name())
  }
}

/// Branch conditions shared by `jmp` and `jmpr`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Condition {
  Always,
  Equal,
  NotEqual,
  Less,
  LessEqual,
  Greater,
  GreaterEqual,
  SignedLess,
  SignedLessEqual,
  SignedGreater,
  SignedGreaterEqual,
  Zero,
  Overflow,
  Carry,
  Sign,
}

impl Condition {
  /// Parse the condition word of a jump (`=`, `.<`, `z`, ...).
  pub fn from_symbol(symbol: &str) -> Option<Self> {
    let condition = match symbol {
      "=" => Self::Equal,
      "!=" => Self::NotEqual,
      "<" => Self::Less,
      "<=" => Self::LessEqual,
      ">" => Self::Greater,
      ">=" => Self::GreaterEqual,
      ".<" => Self::SignedLess,
      ".<=" => Self::SignedLessEqual,
      ".>" => Self::SignedGreater,
      ".>=" => Self::SignedGreaterEqual,
      "z" => Self::Zero,
      "o" => Self::Overflow,
      "c" => Self::Carry,
      "s" => Self::Sign,
      _ => return None,
    };
    Some(condition)
  }
}

/// Right-hand side of a `cmp`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CmpOperand {
  Constant(i32),
  Register(Register),
}

/// Two-register ALU operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinaryAlu {
  Add,
  Sub,
  Mul,
  MulHigh,
  Div,
  And,
  Or,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AluOp {
  Clear,
  CarryOff,
  CarryOn,
  SignOff,
  SignOn,
  Constant(i32),
  Copy(Register),
  Not(Register),
  Negate(Register),
  Increment(Register),
  Decrement(Register),
  Binary(BinaryAlu, Register, Register),
}

impl AluOp {
  /// Register that receives the result: the register written first in the
  /// mnemonic, or A when the operand text starts with a symbol or constant.
  pub fn destination(self) -> Register {
    match self {
      Self::Copy(r) | Self::Increment(r) | Self::Decrement(r) => r,
      Self::Binary(_, x, _) => x,
      _ => Register::A,
    }
  }

  fn parse(text: &str) -> Option<Self> {
    let op = match text {
      "clr" => Self::Clear,
      "carry off" => Self::CarryOff,
      "carry on" => Self::CarryOn,
      "sign off" => Self::SignOff,
      "sign on" => Self::SignOn,
      "0" => Self::Constant(0),
      "1" => Self::Constant(1),
      "-1" => Self::Constant(-1),
      _ => {
        if let Some(r) = Register::from_name(text) {
          return Some(Self::Copy(r));
        }
        if let Some(r) = text.strip_prefix('~').and_then(Register::from_name) {
          return Some(Self::Not(r));
        }
        if let Some(r) = text.strip_prefix('-').and_then(Register::from_name) {
          return Some(Self::Negate(r));
        }
        let x = Register::from_name(text.get(..1)?)?;
        let rest = &text[1..];
        return match rest {
          "+1" => Some(Self::Increment(x)),
          "-1" => Some(Self::Decrement(x)),
          _ => {
            let (op, y) = [
              (".*", BinaryAlu::MulHigh),
              ("+", BinaryAlu::Add),
              ("-", BinaryAlu::Sub),
              ("*", BinaryAlu::Mul),
              ("/", BinaryAlu::Div),
              ("&", BinaryAlu::And),
              ("|", BinaryAlu::Or),
            ]
            .into_iter()
            .find_map(|(symbol, op)| Some((op, rest.strip_prefix(symbol)?)))?;
            Some(Self::Binary(op, x, Register::from_name(y)?))
          }
        };
      }
    };
    Some(op)
  }
}

/// Decoded meaning of one opcode byte.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Op {
  Nop,
  Halt,
  Move { from: Register, to: Register },
  Compare { reg: Register, operand: CmpOperand },
  Jump(Condition),
  JumpRelative(Condition),
  Alu(AluOp),
  LoadIndirect { address: Register, target: Register },
  LoadImmediate(Register),
  LoadDirect(Register),
  SetPage(Register),
  SaveMar(Register),
  SaveCurrent(Register),
  SaveIndirect { source: Register, address: Register },
  SaveDirect(Register),
  Input(Register),
  Output(Register),
  OutputImmediate,
  OutputDirect,
  OutputIndirect(Register),
}

impl Op {
  /// Interpret a mnemonic pattern from [`OPCODES`].
  pub fn from_pattern(pattern: &str) -> Option<Self> {
    let words: Vec<&str> = pattern.split_whitespace().collect();
    let reg = Register::from_name;

    let op = match words.as_slice() {
      ["nop"] => Self::Nop,
      ["halt"] => Self::Halt,
      ["mov", x, y] => Self::Move {
        from: reg(x)?,
        to: reg(y)?,
      },
      ["cmp", r, k] => {
        let operand = match reg(k) {
          Some(other) => CmpOperand::Register(other),
          None => CmpOperand::Constant(k.parse().ok()?),
        };
        Self::Compare {
          reg: reg(r)?,
          operand,
        }
      }
      ["jmp", LABEL_PLACEHOLDER] => Self::Jump(Condition::Always),
      ["jmp", cond, LABEL_PLACEHOLDER] => Self::Jump(Condition::from_symbol(cond)?),
      ["jmpr", NUMBER_PLACEHOLDER] => Self::JumpRelative(Condition::Always),
      ["jmpr", cond, NUMBER_PLACEHOLDER] => Self::JumpRelative(Condition::from_symbol(cond)?),
      ["opp", rest @ ..] => Self::Alu(AluOp::parse(&rest.join(" "))?),
      ["load", "rom", t, NUMBER_PLACEHOLDER] => Self::LoadImmediate(reg(t)?),
      ["load", source, t] => match bracketed(source)? {
        NUMBER_PLACEHOLDER => Self::LoadDirect(reg(t)?),
        address => Self::LoadIndirect {
          address: reg(address)?,
          target: reg(t)?,
        },
      },
      ["set", r, "rampage"] => Self::SetPage(reg(r)?),
      ["save", r, "mar"] => Self::SaveMar(reg(r)?),
      ["save", r, target] => match bracketed(target)? {
        "current" => Self::SaveCurrent(reg(r)?),
        NUMBER_PLACEHOLDER => Self::SaveDirect(reg(r)?),
        address => Self::SaveIndirect {
          source: reg(r)?,
          address: reg(address)?,
        },
      },
      ["in", r] => Self::Input(reg(r)?),
      ["out", NUMBER_PLACEHOLDER] => Self::OutputImmediate,
      ["out", target] => match bracketed(target) {
        Some(NUMBER_PLACEHOLDER) => Self::OutputDirect,
        Some(address) => Self::OutputIndirect(reg(address)?),
        None => Self::Output(reg(target)?),
      },
      _ => return None,
    };
    Some(op)
  }
}

/// Inner text of a `ram[...]` operand.
fn bracketed(word: &str) -> Option<&str> {
  word.strip_prefix("ram[")?.strip_suffix(']')
}

/// Kind of the operand that follows an opcode byte.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OperandKind {
  None,
  Number,
  Label,
}

impl OperandKind {
  pub fn of(pattern: &str) -> Self {
    if pattern.contains(LABEL_PLACEHOLDER) {
      Self::Label
    } else if pattern.contains(NUMBER_PLACEHOLDER) {
      Self::Number
    } else {
      Self::None
    }
  }

  /// Bytes occupied after the opcode.
  pub fn size(self) -> usize {
    match self {
      Self::None => 0,
      Self::Number => 1,
      Self::Label => 2,
    }
  }
}

/// One decoded table entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Instruction {
  pub opcode: u8,
  pub pattern: &'static str,
  pub op: Op,
  pub operand: OperandKind,
}

impl Instruction {
  /// Total encoded length including the opcode byte.
  pub fn len(&self) -> usize {
    1 + self.operand.size()
  }
}

fn decode_table() -> &'static [Option<Instruction>; 256] {
  static TABLE: OnceLock<[Option<Instruction>; 256]> = OnceLock::new();
  TABLE.get_or_init(|| {
    let mut table = [None; 256];
    for &(pattern, opcode) in OPCODES {
      if let Some(op) = Op::from_pattern(pattern) {
        table[opcode as usize] = Some(Instruction {
          opcode,
          pattern,
          op,
          operand: OperandKind::of(pattern),
        });
      }
    }
    table
  })
}

/// Look up the instruction assigned to `byte`, if any.
pub fn decode(byte: u8) -> Option<&'static Instruction> {
  decode_table()[byte as usize].as_ref()
}

/// Opcode for an exact pattern.
pub fn opcode_of(pattern: &str) -> Option<u8> {
  OPCODES
    .iter()
    .find(|(candidate, _)| *candidate == pattern)
    .map(|&(_, opcode)| opcode)
}

#[cfg(test)]
mod tests {
  use super::*;
  use std::collections::HashSet;

  #[test]
  fn every_pattern_decodes() {
    for &(pattern, opcode) in OPCODES {
      let instruction = decode(opcode).unwrap_or_else(|| panic!("{pattern} did not parse"));
      assert_eq!(instruction.pattern, pattern);
    }
  }

  #[test]
  fn opcodes_and_patterns_are_unique() {
    let bytes: HashSet<u8> = OPCODES.iter().map(|&(_, b)| b).collect();
    let patterns: HashSet<&str> = OPCODES.iter().map(|&(p, _)| p).collect();
    assert_eq!(bytes.len(), OPCODES.len());
    assert_eq!(patterns.len(), OPCODES.len());
  }

  #[test]
  fn family_ranges_match_the_hardware_map() {
    for &(pattern, opcode) in OPCODES {
      let family = pattern.split_whitespace().next().unwrap_or_default();
      let range = match family {
        "nop" => 0x00..=0x00,
        "mov" => 0x01..=0x0C,
        "cmp" => 0x10..=0x2F,
        "jmp" => 0x30..=0x3E,
        "jmpr" => 0x40..=0x4E,
        "opp" => 0x50..=0xBB,
        "load" | "set" => 0xC0..=0xDB,
        "save" => 0xE0..=0xEF,
        "in" | "out" => 0xF0..=0xFD,
        "halt" => 0xFF..=0xFF,
        other => panic!("unexpected family {other}"),
      };
      assert!(range.contains(&opcode), "{pattern} = {opcode:#04x}");
    }
  }

  #[test]
  fn unassigned_bytes_do_not_decode() {
    for byte in [0x0D, 0x0F, 0x3F, 0x4F, 0xBC, 0xBF, 0xDC, 0xDF, 0xFE] {
      assert!(decode(byte).is_none(), "{byte:#04x}");
    }
  }

  #[test]
  fn alu_destination_follows_the_first_operand() {
    let dest = |pattern: &str| match Op::from_pattern(pattern) {
      Some(Op::Alu(op)) => op.destination(),
      other => panic!("{pattern}: {other:?}"),
    };
    assert_eq!(dest("opp b-c"), Register::B);
    assert_eq!(dest("opp d.*a"), Register::D);
    assert_eq!(dest("opp c+1"), Register::C);
    assert_eq!(dest("opp ~b"), Register::A);
    assert_eq!(dest("opp -d"), Register::A);
    assert_eq!(dest("opp -1"), Register::A);
  }

  #[test]
  fn odd_save_pairings_keep_their_address_register() {
    assert_eq!(
      decode(0xE9).map(|i| i.op),
      Some(Op::SaveIndirect {
        source: Register::B,
        address: Register::C,
      })
    );
  }

  #[test]
  fn operand_sizes() {
    assert_eq!(decode(0x30).map(Instruction::len), Some(3));
    assert_eq!(decode(0x40).map(Instruction::len), Some(2));
    assert_eq!(decode(0xD0).map(Instruction::len), Some(2));
    assert_eq!(decode(0x6C).map(Instruction::len), Some(1));
  }

  #[test]
  fn opcode_lookup_by_exact_pattern() {
    assert_eq!(opcode_of("opp a+b"), Some(0x6C));
    assert_eq!(opcode_of("load rom a {number}"), Some(0xD0));
    assert_eq!(opcode_of("opp a + b"), None);
  }
}
