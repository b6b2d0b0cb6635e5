//! Two-pass assembler from mnemonic lines to jrb8 machine code.
//!
//! Pass one ([`Assembler::assemble`]) validates each line against the operand
//! grammar of its instruction family, matches it against the opcode table and
//! records label offsets. Label references stay symbolic until pass two
//! ([`Assembler::hex_output`]) replaces them with big-endian addresses.

use std::collections::HashMap;

use snafu::OptionExt;

use crate::error::{
  AsmResult, DuplicateLabelSnafu, InvalidOperandSnafu, LabelOutOfRangeSnafu, NumberRangeSnafu,
  UndefinedLabelSnafu, UnknownInstructionSnafu,
};
use crate::isa::{self, Condition, LABEL_PLACEHOLDER, NUMBER_PLACEHOLDER, OPCODES, Register};

/// One unit of pass-one output.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Encoded {
  Hex(u8),
  /// Placeholder for a two-byte address, filled in by pass two.
  Label(String),
}

#[derive(Debug, Default)]
pub struct Assembler {
  labels: HashMap<String, usize>,
  offset: usize,
}

impl Assembler {
  pub fn new() -> Self {
    Self::default()
  }

  /// Labels declared by the last call to [`Assembler::assemble`].
  pub fn labels(&self) -> &HashMap<String, usize> {
    &self.labels
  }

  /// Pass one. Label table and byte offset are reset on every call.
  pub fn assemble<S: AsRef<str>>(&mut self, lines: &[S]) -> AsmResult<Vec<Encoded>> {
    self.labels.clear();
    self.offset = 0;
    let mut out = Vec::new();

    for (index, raw) in lines.iter().enumerate() {
      let line_no = index + 1;
      let line = strip_comment(raw.as_ref());
      if line.is_empty() {
        continue;
      }

      if let Some(name) = line.strip_prefix(':') {
        self.define_label(line_no, name.trim())?;
        continue;
      }

      let encoded = translate(line_no, line)?;
      self.offset += encoded_len(&encoded);
      out.extend(encoded);
    }

    Ok(out)
  }

  /// Pass two: resolve every label reference to its big-endian offset.
  pub fn hex_output(&self, encoded: &[Encoded]) -> AsmResult<Vec<u8>> {
    let mut bytes = Vec::with_capacity(encoded.len() + encoded.len() / 2);
    for item in encoded {
      match item {
        Encoded::Hex(byte) => bytes.push(*byte),
        Encoded::Label(name) => {
          let target = self.resolve_label(name)?;
          bytes.extend(target.to_be_bytes());
        }
      }
    }
    Ok(bytes)
  }

  fn define_label(&mut self, line: usize, name: &str) -> AsmResult<()> {
    if name.is_empty() {
      return InvalidOperandSnafu {
        line,
        text: ":".to_string(),
      }
      .fail();
    }
    if self.labels.contains_key(name) {
      return DuplicateLabelSnafu { line, label: name }.fail();
    }
    self.labels.insert(name.to_string(), self.offset);
    Ok(())
  }

  fn resolve_label(&self, name: &str) -> AsmResult<u16> {
    let offset = self
      .labels
      .get(name)
      .copied()
      .context(UndefinedLabelSnafu { label: name })?;
    u16::try_from(offset)
      .ok()
      .context(LabelOutOfRangeSnafu { label: name, offset })
  }
}

/// Assemble newline-separated source text in one call.
pub fn assemble_source(text: &str) -> AsmResult<Vec<u8>> {
  let lines: Vec<&str> = text.lines().collect();
  let mut assembler = Assembler::new();
  let encoded = assembler.assemble(&lines)?;
  assembler.hex_output(&encoded)
}

fn strip_comment(line: &str) -> &str {
  match line.find("//") {
    Some(pos) => line[..pos].trim(),
    None => line.trim(),
  }
}

fn encoded_len(encoded: &[Encoded]) -> usize {
  encoded
    .iter()
    .map(|item| match item {
      Encoded::Hex(_) => 1,
      Encoded::Label(_) => 2,
    })
    .sum()
}

/// Validate one instruction line and encode it through the opcode table.
fn translate(line_no: usize, line: &str) -> AsmResult<Vec<Encoded>> {
  let words: Vec<&str> = line.split_whitespace().collect();
  let (family, operands) = words.split_first().map_or(("", &[][..]), |(f, rest)| (*f, rest));

  let accepted = match family {
    "nop" | "halt" => operands.is_empty(),
    "mov" => check_mov(operands),
    "cmp" => check_cmp(operands),
    "jmp" => check_jump(operands, |target| !target.is_empty()),
    "jmpr" => check_jump(operands, |target| number_literal(target).is_some()),
    "opp" => !operands.is_empty(),
    "load" => check_load(operands),
    "set" => matches!(operands, [r, "rampage"] if is_register(r)),
    "save" => check_save(operands),
    "in" => matches!(operands, [r] if is_register(r)),
    "out" => check_out(operands),
    _ => {
      return UnknownInstructionSnafu { line: line_no, text: line }.fail();
    }
  };
  if !accepted {
    return InvalidOperandSnafu { line: line_no, text: line }.fail();
  }

  let normalized = words.join(" ");
  if let Some(opcode) = isa::opcode_of(&normalized) {
    return Ok(vec![Encoded::Hex(opcode)]);
  }

  for &(pattern, opcode) in OPCODES {
    if let Some(label) = match_placeholder(&normalized, pattern, LABEL_PLACEHOLDER) {
      return Ok(vec![Encoded::Hex(opcode), Encoded::Label(label.to_string())]);
    }
    if let Some(text) = match_placeholder(&normalized, pattern, NUMBER_PLACEHOLDER)
      && let Some((digits, radix)) = number_literal(text)
    {
      let value = u8::from_str_radix(digits, radix)
        .ok()
        .context(NumberRangeSnafu {
          line: line_no,
          value: text,
        })?;
      return Ok(vec![Encoded::Hex(opcode), Encoded::Hex(value)]);
    }
  }

  InvalidOperandSnafu { line: line_no, text: line }.fail()
}

/// If `pattern` contains `placeholder` and `line` matches the text around it,
/// return the single word standing in for the placeholder.
fn match_placeholder<'a>(line: &'a str, pattern: &str, placeholder: &str) -> Option<&'a str> {
  let (prefix, suffix) = pattern.split_once(placeholder)?;
  let middle = line.strip_prefix(prefix)?.strip_suffix(suffix)?;
  (!middle.is_empty() && !middle.contains(char::is_whitespace)).then_some(middle)
}

/// Split a numeric literal into its digits and radix. Syntax only; the value
/// may still be too large for a byte.
fn number_literal(text: &str) -> Option<(&str, u32)> {
  let lower = |prefix: &str| {
    text
      .get(..2)
      .filter(|head| head.eq_ignore_ascii_case(prefix))
      .map(|_| &text[2..])
  };
  let (digits, radix) = if let Some(digits) = lower("0x") {
    (digits, 16)
  } else if let Some(digits) = lower("0b") {
    (digits, 2)
  } else if let Some(digits) = lower("0o") {
    (digits, 8)
  } else {
    (text, 10)
  };
  let valid = !digits.is_empty() && digits.chars().all(|c| c.is_digit(radix));
  valid.then_some((digits, radix))
}

fn is_register(word: &str) -> bool {
  Register::from_name(word).is_some()
}

fn ram_operand(word: &str) -> Option<&str> {
  word.strip_prefix("ram[")?.strip_suffix(']')
}

fn is_ram_register(word: &str) -> bool {
  ram_operand(word).is_some_and(is_register)
}

fn is_ram_number(word: &str) -> bool {
  ram_operand(word).is_some_and(|inner| number_literal(inner).is_some())
}

fn check_mov(operands: &[&str]) -> bool {
  matches!(operands, [x, y] if is_register(x) && is_register(y) && x != y)
}

fn check_cmp(operands: &[&str]) -> bool {
  matches!(
    operands,
    [r, k] if is_register(r) && (is_register(k) || matches!(*k, "0" | "1" | "-1" | "255"))
  )
}

fn check_jump(operands: &[&str], target_ok: impl Fn(&str) -> bool) -> bool {
  match operands {
    [target] => target_ok(*target),
    [condition, target] => Condition::from_symbol(condition).is_some() && target_ok(*target),
    _ => false,
  }
}

fn check_load(operands: &[&str]) -> bool {
  match operands {
    ["rom", r, n] => is_register(r) && number_literal(n).is_some(),
    [source, r] => is_register(r) && (is_ram_register(source) || is_ram_number(source)),
    _ => false,
  }
}

fn check_save(operands: &[&str]) -> bool {
  match operands {
    [r, target] => {
      is_register(r)
        && (*target == "mar"
          || *target == "ram[current]"
          || is_ram_register(target)
          || is_ram_number(target))
    }
    _ => false,
  }
}

fn check_out(operands: &[&str]) -> bool {
  matches!(
    operands,
    [x] if is_register(x) || number_literal(x).is_some() || is_ram_register(x) || is_ram_number(x)
  )
}
