//! Cycle-stepped emulator for the jrb8 CPU.
//!
//! The machine has four 8-bit registers, a 256-byte RAM bank, a 64 KiB ROM
//! holding the program, and a 16-bit program counter. Every `step` fetches one
//! opcode, decodes it through the shared opcode table and executes it. The
//! emulator never fails: bytes with no table entry are no-ops and division by
//! zero produces a fixed result.

use std::fmt;

use crate::isa::{self, AluOp, BinaryAlu, CmpOperand, Condition, Op, Register};

pub const RAM_SIZE: usize = 256;
pub const ROM_SIZE: usize = 0x1_0000;

/// Result fed to the flags when dividing by zero: not zero, carry set.
const DIV_BY_ZERO_RESULT: i32 = 0x100;

pub type OutputCallback = Box<dyn FnMut(i16)>;
pub type InputCallback = Box<dyn FnMut() -> u8>;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Flags {
  pub zero: bool,
  pub carry: bool,
  pub sign: bool,
  pub overflow: bool,
}

/// ALU mode toggles set by `opp carry on/off` and `opp sign on/off`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Modes {
  pub carry_chain: bool,
  pub signed: bool,
}

/// How a bounded [`Vm::run`] ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunOutcome {
  Halted { steps: u64 },
  StepLimit { steps: u64 },
}

pub struct Vm {
  registers: [u8; 4],
  ram: [u8; RAM_SIZE],
  rom: Box<[u8]>,
  page: u8,
  mar: u8,
  pc: u16,
  flags: Flags,
  modes: Modes,
  output: Option<OutputCallback>,
  input: Option<InputCallback>,
}

impl Default for Vm {
  fn default() -> Self {
    Self::new()
  }
}

impl fmt::Debug for Vm {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_struct("Vm")
      .field("registers", &self.registers)
      .field("pc", &self.pc)
      .field("page", &self.page)
      .field("mar", &self.mar)
      .field("flags", &self.flags)
      .field("modes", &self.modes)
      .finish_non_exhaustive()
  }
}

impl Vm {
  pub fn new() -> Self {
    Self {
      registers: [0; 4],
      ram: [0; RAM_SIZE],
      rom: vec![0; ROM_SIZE].into_boxed_slice(),
      page: 0,
      mar: 0,
      pc: 0,
      flags: Flags::default(),
      modes: Modes::default(),
      output: None,
      input: None,
    }
  }

  /// Zero registers, RAM, MAR, page, flags, modes and PC. ROM and callbacks
  /// are kept.
  pub fn reset(&mut self) {
    self.registers = [0; 4];
    self.ram = [0; RAM_SIZE];
    self.page = 0;
    self.mar = 0;
    self.pc = 0;
    self.flags = Flags::default();
    self.modes = Modes::default();
  }

  /// Copy `program` into ROM from address 0, clear the rest and rewind PC.
  /// Bytes past the end of ROM are ignored.
  pub fn load_program(&mut self, program: &[u8]) {
    let len = program.len().min(ROM_SIZE);
    self.rom.fill(0);
    self.rom[..len].copy_from_slice(&program[..len]);
    self.pc = 0;
  }

  pub fn set_output_callback(&mut self, callback: impl FnMut(i16) + 'static) {
    self.output = Some(Box::new(callback));
  }

  pub fn set_input_callback(&mut self, callback: impl FnMut() -> u8 + 'static) {
    self.input = Some(Box::new(callback));
  }

  pub fn a(&self) -> u8 {
    self.registers[0]
  }

  pub fn b(&self) -> u8 {
    self.registers[1]
  }

  pub fn c(&self) -> u8 {
    self.registers[2]
  }

  pub fn d(&self) -> u8 {
    self.registers[3]
  }

  pub fn register(&self, reg: Register) -> u8 {
    self.registers[reg.index()]
  }

  pub fn pc(&self) -> u16 {
    self.pc
  }

  pub fn flags(&self) -> Flags {
    self.flags
  }

  pub fn modes(&self) -> Modes {
    self.modes
  }

  pub fn ram(&self) -> &[u8; RAM_SIZE] {
    &self.ram
  }

  pub fn page(&self) -> u8 {
    self.page
  }

  pub fn mar(&self) -> u8 {
    self.mar
  }

  /// Execute one instruction. Returns `false` once HALT executes; PC has
  /// already moved past it.
  pub fn step(&mut self) -> bool {
    let opcode = self.fetch();
    let Some(instruction) = isa::decode(opcode) else {
      return true;
    };

    match instruction.op {
      Op::Nop => {}
      Op::Halt => return false,
      Op::Move { from, to } => self.set(to, self.register(from)),
      Op::Compare { reg, operand } => {
        let rhs = match operand {
          CmpOperand::Constant(k) => k,
          CmpOperand::Register(other) => i32::from(self.register(other)),
        };
        self.update_flags(i32::from(self.register(reg)) - rhs);
      }
      Op::Jump(condition) => {
        let high = self.fetch();
        let low = self.fetch();
        if self.condition_holds(condition) {
          self.pc = u16::from_be_bytes([high, low]);
        }
      }
      Op::JumpRelative(condition) => {
        let offset = self.fetch() as i8;
        if self.condition_holds(condition) {
          self.pc = ((i32::from(self.pc) + i32::from(offset)) & 0xFF) as u16;
        }
      }
      Op::Alu(op) => self.execute_alu(op),
      Op::LoadIndirect { address, target } => {
        let paged = usize::from(self.register(address)) + (usize::from(self.page) << 8);
        self.set(target, self.ram[paged & 0xFF]);
      }
      Op::LoadImmediate(target) => {
        let value = self.fetch();
        self.set(target, value);
      }
      Op::LoadDirect(target) => {
        let address = self.fetch();
        self.set(target, self.ram[usize::from(address)]);
      }
      Op::SetPage(reg) => self.page = self.register(reg),
      Op::SaveMar(reg) => self.mar = self.register(reg),
      Op::SaveCurrent(reg) => self.ram[usize::from(self.mar)] = self.register(reg),
      Op::SaveIndirect { source, address } => {
        self.ram[usize::from(self.register(address))] = self.register(source);
      }
      Op::SaveDirect(reg) => {
        let address = self.fetch();
        self.ram[usize::from(address)] = self.register(reg);
      }
      Op::Input(target) => {
        let value = self.input.as_mut().map_or(0, |read| read());
        self.set(target, value);
      }
      Op::Output(reg) => self.emit(self.signed_register(reg)),
      Op::OutputImmediate => {
        let value = self.fetch();
        self.emit(i16::from(value));
      }
      Op::OutputDirect => {
        let address = self.fetch();
        self.emit(i16::from(self.ram[usize::from(address)]));
      }
      Op::OutputIndirect(reg) => self.emit(i16::from(self.ram[usize::from(self.register(reg))])),
    }

    true
  }

  /// Step until HALT or until `max_steps` instructions have executed.
  pub fn run(&mut self, max_steps: u64) -> RunOutcome {
    for executed in 0..max_steps {
      if !self.step() {
        return RunOutcome::Halted {
          steps: executed + 1,
        };
      }
    }
    RunOutcome::StepLimit { steps: max_steps }
  }

  fn fetch(&mut self) -> u8 {
    let byte = self.rom[usize::from(self.pc)];
    self.pc = self.pc.wrapping_add(1);
    byte
  }

  fn value(&self, reg: Register) -> i32 {
    i32::from(self.register(reg))
  }

  fn set(&mut self, reg: Register, value: u8) {
    self.registers[reg.index()] = value;
  }

  /// Register contents as reported by `out r`: two's complement in signed mode.
  fn signed_register(&self, reg: Register) -> i16 {
    let value = self.register(reg);
    if self.modes.signed && value & 0x80 != 0 {
      i16::from(value) - 256
    } else {
      i16::from(value)
    }
  }

  fn emit(&mut self, value: i16) {
    if let Some(write) = self.output.as_mut() {
      write(value);
    }
  }

  fn update_flags(&mut self, result: i32) {
    self.flags = Flags {
      zero: result == 0,
      carry: !(0..=255).contains(&result),
      sign: result & 0x80 != 0,
      overflow: self.modes.signed && !(-128..=127).contains(&result),
    };
  }

  fn condition_holds(&self, condition: Condition) -> bool {
    let Flags {
      zero,
      carry,
      sign,
      overflow,
    } = self.flags;
    match condition {
      Condition::Always => true,
      Condition::Equal | Condition::Zero => zero,
      Condition::NotEqual => !zero,
      Condition::Less | Condition::Carry => carry,
      Condition::LessEqual => carry || zero,
      Condition::Greater => !carry && !zero,
      Condition::GreaterEqual => !carry,
      Condition::SignedLess => sign != overflow,
      Condition::SignedLessEqual => sign != overflow || zero,
      Condition::SignedGreater => sign == overflow && !zero,
      Condition::SignedGreaterEqual => sign == overflow,
      Condition::Overflow => overflow,
      Condition::Sign => sign,
    }
  }

  fn execute_alu(&mut self, op: AluOp) {
    let result = match op {
      AluOp::Clear => {
        self.flags = Flags::default();
        self.modes = Modes::default();
        return;
      }
      AluOp::CarryOff => {
        self.modes.carry_chain = false;
        return;
      }
      AluOp::CarryOn => {
        self.modes.carry_chain = true;
        return;
      }
      AluOp::SignOff => {
        self.modes.signed = false;
        return;
      }
      AluOp::SignOn => {
        self.modes.signed = true;
        return;
      }
      AluOp::Constant(k) => k,
      AluOp::Copy(r) => self.value(r),
      AluOp::Not(r) => !self.value(r),
      AluOp::Negate(r) => -self.value(r),
      AluOp::Increment(r) => self.value(r) + 1,
      AluOp::Decrement(r) => self.value(r) - 1,
      AluOp::Binary(kind, x, y) => {
        let (x, y) = (self.value(x), self.value(y));
        match kind {
          BinaryAlu::Add => {
            let carry_in = i32::from(self.modes.carry_chain && self.flags.carry);
            x + y + carry_in
          }
          BinaryAlu::Sub => x - y,
          BinaryAlu::Mul => x * y,
          BinaryAlu::MulHigh => (x * y) >> 8,
          BinaryAlu::Div if x == 0 && y == 0 => {
            self.flags = Flags::default();
            self.set(op.destination(), 0);
            return;
          }
          BinaryAlu::Div if y == 0 => DIV_BY_ZERO_RESULT,
          BinaryAlu::Div => x / y,
          BinaryAlu::And => x & y,
          BinaryAlu::Or => x | y,
        }
      }
    };

    self.update_flags(result);
    self.set(op.destination(), (result & 0xFF) as u8);
  }
}
