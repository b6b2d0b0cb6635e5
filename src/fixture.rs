//! Expectation fixtures: run a program and compare what it did against a
//! small `key: value` description.
//!
//! ```text
//! s: 200
//! i: 3,4
//! o: 7
//! r: 0:7,1:4
//! ```
//!
//! `s` bounds the run; a negative value marks a program that never halts, in
//! which case the outputs only have to start with the expected sequence.

use std::cell::RefCell;
use std::rc::Rc;
use std::str::FromStr;

use snafu::{OptionExt, ResultExt};

use crate::assembler::assemble_source;
use crate::error::{AssemblySnafu, FixtureError, MalformedSnafu};
use crate::vm::Vm;

const DEFAULT_MAX_STEPS: i64 = 500;

/// Step bound for open-ended (negative `s`) fixtures.
const OPEN_ENDED_STEP_LIMIT: u64 = 5000;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Expectation {
  pub max_steps: i64,
  pub inputs: Vec<u8>,
  pub outputs: Vec<i16>,
  pub ram: Vec<(u8, u8)>,
}

impl Default for Expectation {
  fn default() -> Self {
    Self {
      max_steps: DEFAULT_MAX_STEPS,
      inputs: Vec::new(),
      outputs: Vec::new(),
      ram: Vec::new(),
    }
  }
}

impl Expectation {
  pub fn parse(text: &str) -> Result<Self, FixtureError> {
    let mut expectation = Self::default();

    for (index, raw) in text.lines().enumerate() {
      let line = index + 1;
      let Some((key, value)) = raw.split_once(':') else {
        continue;
      };
      let value = value.trim();

      match key.trim() {
        "s" => expectation.max_steps = number(value, line, raw)?,
        "i" => expectation.inputs = list(value, line, raw)?,
        "o" => expectation.outputs = list(value, line, raw)?,
        "r" => {
          expectation.ram = value
            .split(',')
            .filter(|pair| !pair.trim().is_empty())
            .map(|pair| -> Result<(u8, u8), FixtureError> {
              let (address, byte) = pair.split_once(':').context(MalformedSnafu {
                line,
                text: raw.trim(),
              })?;
              Ok((number(address, line, raw)?, number(byte, line, raw)?))
            })
            .collect::<Result<_, _>>()?;
        }
        _ => {}
      }
    }

    Ok(expectation)
  }

  fn is_open_ended(&self) -> bool {
    self.max_steps < 0
  }
}

fn number<T: FromStr>(text: &str, line: usize, raw: &str) -> Result<T, FixtureError> {
  text.trim().parse().ok().context(MalformedSnafu {
    line,
    text: raw.trim(),
  })
}

fn list<T: FromStr>(value: &str, line: usize, raw: &str) -> Result<Vec<T>, FixtureError> {
  value
    .split(',')
    .filter(|item| !item.trim().is_empty())
    .map(|item| number(item, line, raw))
    .collect()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RamMismatch {
  pub address: u8,
  pub expected: u8,
  pub actual: u8,
}

/// What a fixture run observed, and how it differs from the expectation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FixtureReport {
  pub steps: u64,
  pub halted: bool,
  pub expected_outputs: Vec<i16>,
  pub outputs: Vec<i16>,
  pub ram_mismatches: Vec<RamMismatch>,
  open_ended: bool,
}

impl FixtureReport {
  pub fn outputs_match(&self) -> bool {
    if self.open_ended {
      self.outputs.starts_with(&self.expected_outputs)
    } else {
      self.outputs == self.expected_outputs
    }
  }

  /// A bounded fixture must halt within its step budget; an open-ended one
  /// only needs the right output prefix.
  pub fn passed(&self) -> bool {
    (self.open_ended || self.halted) && self.outputs_match() && self.ram_mismatches.is_empty()
  }

  /// Human readable reasons for failure, empty when the fixture passed.
  pub fn failures(&self) -> Vec<String> {
    let mut reasons = Vec::new();
    if !self.open_ended && !self.halted {
      reasons.push(format!("did not halt within {} steps", self.steps));
    }
    if !self.outputs_match() {
      reasons.push(format!(
        "outputs {:?}, expected {:?}",
        self.outputs, self.expected_outputs
      ));
    }
    for mismatch in &self.ram_mismatches {
      reasons.push(format!(
        "ram[{}] = {}, expected {}",
        mismatch.address, mismatch.actual, mismatch.expected
      ));
    }
    reasons
  }
}

/// Run `program` on a fresh VM against `expectation`.
///
/// Inputs are served in order; once exhausted the input port reads 0.
pub fn check(program: &[u8], expectation: &Expectation) -> Result<FixtureReport, FixtureError> {
  let outputs = Rc::new(RefCell::new(Vec::new()));
  let mut vm = Vm::new();
  vm.load_program(program);

  let sink = Rc::clone(&outputs);
  vm.set_output_callback(move |value| sink.borrow_mut().push(value));
  let mut inputs = expectation.inputs.clone().into_iter();
  vm.set_input_callback(move || inputs.next().unwrap_or(0));

  let open_ended = expectation.is_open_ended();
  let limit = if open_ended {
    OPEN_ENDED_STEP_LIMIT
  } else {
    // `s` is inclusive of the final HALT.
    u64::try_from(expectation.max_steps).unwrap_or(0)
  };

  let mut steps = 0;
  let mut halted = false;
  while steps < limit {
    steps += 1;
    if !vm.step() {
      halted = true;
      break;
    }
    if open_ended && outputs.borrow().len() >= expectation.outputs.len() {
      break;
    }
  }

  let ram_mismatches = expectation
    .ram
    .iter()
    .filter_map(|&(address, expected)| {
      let actual = vm.ram()[usize::from(address)];
      (actual != expected).then_some(RamMismatch {
        address,
        expected,
        actual,
      })
    })
    .collect();

  let outputs = outputs.borrow().clone();
  Ok(FixtureReport {
    steps,
    halted,
    expected_outputs: expectation.outputs.clone(),
    outputs,
    ram_mismatches,
    open_ended,
  })
}

/// Assemble mnemonic text and check it.
pub fn check_source(source: &str, expectation: &Expectation) -> Result<FixtureReport, FixtureError> {
  let program = assemble_source(source).context(AssemblySnafu)?;
  check(&program, expectation)
}
