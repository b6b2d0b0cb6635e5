//! Code generation: lower the parsed AST into jrb8 mnemonic lines.
//!
//! Every expression leaves its value in register A. Binary operators park the
//! first-evaluated operand in B and then evaluate the second into A. When the
//! second operand is itself compound it could overwrite B, so the first value
//! is spilled to a scratch RAM byte and reloaded into B afterwards.
//!
//! Variables live at fixed RAM addresses handed out upward from 0 in
//! declaration order, so the k-th `var` always sits at address k. Spill slots
//! are handed out downward from the top of RAM. There is no scoping and no
//! reuse; redeclaring a name rebinds it.

use std::collections::HashMap;

use snafu::OptionExt;

use crate::ast::{BinaryOp, Expr, LogicalOp, Stmt, UnaryOp};
use crate::error::{
  CodegenResult, NumberOutOfRangeSnafu, RamExhaustedSnafu, UndefinedVariableSnafu,
  UnsupportedSnafu,
};
use crate::ir::AsmLine;
use crate::tokenizer::Token;

/// Number of addressable RAM bytes available to variables and spills.
const RAM_BYTES: usize = 256;

#[derive(Debug)]
pub struct Generator {
  out: Vec<AsmLine>,
  label_counter: usize,
  next_address: usize,
  /// Lowest scratch address handed out so far; `RAM_BYTES` when none.
  scratch_floor: usize,
  variables: HashMap<String, u8>,
}

impl Default for Generator {
  fn default() -> Self {
    Self {
      out: Vec::new(),
      label_counter: 0,
      next_address: 0,
      scratch_floor: RAM_BYTES,
      variables: HashMap::new(),
    }
  }
}

impl Generator {
  pub fn new() -> Self {
    Self::default()
  }

  /// Lower a whole program. All counters restart on each call, and a
  /// trailing `halt` is always appended.
  pub fn generate(&mut self, program: &[Stmt]) -> CodegenResult<Vec<AsmLine>> {
    self.out.clear();
    self.label_counter = 0;
    self.next_address = 0;
    self.scratch_floor = RAM_BYTES;
    self.variables.clear();

    for stmt in program {
      self.emit_stmt(stmt)?;
    }
    self.emit("halt");

    Ok(std::mem::take(&mut self.out))
  }

  fn emit(&mut self, text: &str) {
    self.out.push(AsmLine::instruction(text));
  }

  fn emit_label(&mut self, name: &str) {
    self.out.push(AsmLine::label(name));
  }

  fn new_label(&mut self) -> String {
    let label = format!("L{}", self.label_counter);
    self.label_counter += 1;
    label
  }

  /// Claim the next variable slot, growing up from address 0.
  fn allocate(&mut self, owner: &str) -> CodegenResult<u8> {
    if self.next_address >= self.scratch_floor {
      return RamExhaustedSnafu { name: owner }.fail();
    }
    let address = self.next_address as u8;
    self.next_address += 1;
    Ok(address)
  }

  /// Claim a spill slot, growing down from the top of RAM.
  fn allocate_scratch(&mut self) -> CodegenResult<u8> {
    if self.scratch_floor <= self.next_address {
      return RamExhaustedSnafu { name: "temporary" }.fail();
    }
    self.scratch_floor -= 1;
    Ok(self.scratch_floor as u8)
  }

  fn address_of(&self, name: &Token) -> CodegenResult<u8> {
    self
      .variables
      .get(&name.lexeme)
      .copied()
      .context(UndefinedVariableSnafu {
        name: name.lexeme.as_str(),
      })
  }

  fn emit_stmt(&mut self, stmt: &Stmt) -> CodegenResult<()> {
    match stmt {
      Stmt::Expression(expr) => self.emit_expr(expr),
      Stmt::Output(expr) => {
        self.emit_expr(expr)?;
        self.emit("out a");
        Ok(())
      }
      Stmt::Var { name, initializer } => {
        // Bound before the initializer runs, so `var x = x` reads the new slot.
        let address = self.allocate(&name.lexeme)?;
        self.variables.insert(name.lexeme.clone(), address);
        if let Some(init) = initializer {
          self.emit_expr(init)?;
          self.emit(&format!("save a ram[{address}]"));
        }
        Ok(())
      }
      Stmt::Block(stmts) => {
        for stmt in stmts {
          self.emit_stmt(stmt)?;
        }
        Ok(())
      }
      Stmt::If {
        condition,
        then_branch,
        else_branch,
      } => {
        let else_label = self.new_label();
        let end_label = self.new_label();
        self.emit_expr(condition)?;
        self.emit("cmp a 0");
        self.emit(&format!("jmp = {else_label}"));
        self.emit_stmt(then_branch)?;
        self.emit(&format!("jmp {end_label}"));
        self.emit_label(&else_label);
        if let Some(else_branch) = else_branch {
          self.emit_stmt(else_branch)?;
        }
        self.emit_label(&end_label);
        Ok(())
      }
      Stmt::While { condition, body } => self.emit_loop(Some(condition), None, body),
      Stmt::For {
        initializer,
        condition,
        increment,
        body,
      } => {
        if let Some(init) = initializer {
          self.emit_stmt(init)?;
        }
        self.emit_loop(condition.as_ref(), increment.as_ref(), body)
      }
      Stmt::Function { .. } => UnsupportedSnafu {
        construct: "functions",
      }
      .fail(),
      Stmt::Return { .. } => UnsupportedSnafu {
        construct: "return statements",
      }
      .fail(),
    }
  }

  /// Shared shape of `while` and `for`. A missing condition loops forever.
  fn emit_loop(
    &mut self,
    condition: Option<&Expr>,
    increment: Option<&Expr>,
    body: &Stmt,
  ) -> CodegenResult<()> {
    let start_label = self.new_label();
    let end_label = self.new_label();

    self.emit_label(&start_label);
    if let Some(condition) = condition {
      self.emit_expr(condition)?;
      self.emit("cmp a 0");
      self.emit(&format!("jmp = {end_label}"));
    }
    self.emit_stmt(body)?;
    if let Some(increment) = increment {
      self.emit_expr(increment)?;
    }
    self.emit(&format!("jmp {start_label}"));
    self.emit_label(&end_label);
    Ok(())
  }

  fn emit_expr(&mut self, expr: &Expr) -> CodegenResult<()> {
    match expr {
      Expr::LiteralNumber(text) => {
        let value = byte_literal(text)?;
        self.emit(&format!("load rom a {value}"));
      }
      Expr::LiteralBool(value) => self.emit(&format!("load rom a {}", u8::from(*value))),
      Expr::LiteralString(_) => {
        return UnsupportedSnafu {
          construct: "string literals",
        }
        .fail();
      }
      Expr::Call { .. } => {
        return UnsupportedSnafu {
          construct: "function calls",
        }
        .fail();
      }
      Expr::Input => self.emit("in a"),
      Expr::Grouping(inner) => self.emit_expr(inner)?,
      Expr::Variable(name) => {
        let address = self.address_of(name)?;
        self.emit(&format!("load ram[{address}] a"));
      }
      Expr::Assign { name, value } => {
        let address = self.address_of(name)?;
        self.emit_expr(value)?;
        self.emit(&format!("save a ram[{address}]"));
      }
      Expr::Unary { op, operand } => {
        self.emit_expr(operand)?;
        match op {
          UnaryOp::Neg => self.emit("opp -a"),
          UnaryOp::BitNot => self.emit("opp ~a"),
          UnaryOp::Not => {
            let skip = self.new_label();
            self.emit("cmp a 0");
            self.emit("load rom a 0");
            self.emit(&format!("jmp != {skip}"));
            self.emit("load rom a 1");
            self.emit_label(&skip);
          }
        }
      }
      Expr::Logical { op, left, right } => {
        let end_label = self.new_label();
        self.emit_expr(left)?;
        self.emit("cmp a 0");
        match op {
          LogicalOp::And => self.emit(&format!("jmp = {end_label}")),
          LogicalOp::Or => self.emit(&format!("jmp != {end_label}")),
        }
        self.emit_expr(right)?;
        self.emit_label(&end_label);
      }
      Expr::Binary { op, left, right } => self.emit_binary(*op, left, right)?,
    }
    Ok(())
  }

  fn emit_binary(&mut self, op: BinaryOp, left: &Expr, right: &Expr) -> CodegenResult<()> {
    // Afterwards A holds the left operand and B the right one for ordered
    // operators. Commutative ones end up swapped, which is harmless.
    if op.is_ordered() {
      self.emit_operands(right, left)?;
    } else {
      self.emit_operands(left, right)?;
    }

    match op {
      BinaryOp::Add => self.emit("opp a+b"),
      BinaryOp::Sub => self.emit("opp a-b"),
      BinaryOp::Mul => self.emit("opp a*b"),
      BinaryOp::Div => self.emit("opp a/b"),
      BinaryOp::BitAnd => self.emit("opp a&b"),
      BinaryOp::BitOr => self.emit("opp a|b"),
      BinaryOp::Gt => self.emit_compare("<="),
      BinaryOp::Ge => self.emit_compare("<"),
      BinaryOp::Lt => self.emit_compare(">="),
      BinaryOp::Le => self.emit_compare(">"),
      BinaryOp::Eq => self.emit_compare("!="),
      BinaryOp::Ne => self.emit_compare("="),
    }
    Ok(())
  }

  /// Materialize `A <cmp> B` as 0 or 1 by skipping the `1` load on the
  /// complementary condition.
  fn emit_compare(&mut self, skip_on: &str) {
    let skip = self.new_label();
    self.emit("cmp a b");
    self.emit("load rom a 0");
    self.emit(&format!("jmp {skip_on} {skip}"));
    self.emit("load rom a 1");
    self.emit_label(&skip);
  }

  /// Evaluate `first` then `second`, leaving `second` in A and `first` in B.
  fn emit_operands(&mut self, first: &Expr, second: &Expr) -> CodegenResult<()> {
    self.emit_expr(first)?;
    if second.is_leaf() {
      self.emit("mov a b");
      return self.emit_expr(second);
    }

    let scratch = self.allocate_scratch()?;
    self.emit(&format!("save a ram[{scratch}]"));
    self.emit_expr(second)?;
    self.emit(&format!("load ram[{scratch}] b"));
    Ok(())
  }
}

/// Check that a numeric literal is a whole number that fits in a byte.
fn byte_literal(text: &str) -> CodegenResult<u8> {
  let (whole, fraction) = text.split_once('.').unwrap_or((text, ""));
  let value = whole
    .parse::<u8>()
    .ok()
    .filter(|_| fraction.chars().all(|c| c == '0'));
  value.context(NumberOutOfRangeSnafu { value: text })
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::error::CodegenError;
  use crate::ir::to_text;
  use crate::parser::parse;
  use crate::tokenizer::tokenize;

  fn lower(source: &str) -> CodegenResult<Vec<String>> {
    let program = parse(tokenize(source).unwrap()).unwrap();
    Generator::new().generate(&program).map(|lines| to_text(&lines))
  }

  #[test]
  fn declaration_and_output() {
    assert_eq!(
      lower("var x = 5; out x;").unwrap(),
      [
        "load rom a 5",
        "save a ram[0]",
        "load ram[0] a",
        "out a",
        "halt"
      ]
    );
  }

  #[test]
  fn declaration_without_initializer_emits_nothing() {
    assert_eq!(lower("var x").unwrap(), ["halt"]);
  }

  #[test]
  fn commutative_operator_evaluates_left_first() {
    assert_eq!(
      lower("out 2 + 3").unwrap(),
      [
        "load rom a 2",
        "mov a b",
        "load rom a 3",
        "opp a+b",
        "out a",
        "halt"
      ]
    );
  }

  #[test]
  fn subtraction_evaluates_right_first() {
    assert_eq!(
      lower("out 9 - 4").unwrap(),
      [
        "load rom a 4",
        "mov a b",
        "load rom a 9",
        "opp a-b",
        "out a",
        "halt"
      ]
    );
  }

  #[test]
  fn compound_second_operand_spills_to_ram() {
    assert_eq!(
      lower("out 1 + (2 * 3)").unwrap(),
      [
        "load rom a 1",
        "save a ram[255]",
        "load rom a 2",
        "mov a b",
        "load rom a 3",
        "opp a*b",
        "load ram[255] b",
        "opp a+b",
        "out a",
        "halt"
      ]
    );
  }

  #[test]
  fn comparison_uses_complementary_jump() {
    assert_eq!(
      lower("out 3 > 2").unwrap(),
      [
        "load rom a 2",
        "mov a b",
        "load rom a 3",
        "cmp a b",
        "load rom a 0",
        "jmp <= L0",
        "load rom a 1",
        ":L0",
        "out a",
        "halt"
      ]
    );
  }

  #[test]
  fn while_loop_shape() {
    assert_eq!(
      lower("var i = 0 while (i) i = 0").unwrap(),
      [
        "load rom a 0",
        "save a ram[0]",
        ":L0",
        "load ram[0] a",
        "cmp a 0",
        "jmp = L1",
        "load rom a 0",
        "save a ram[0]",
        "jmp L0",
        ":L1",
        "halt"
      ]
    );
  }

  #[test]
  fn if_else_shape() {
    assert_eq!(
      lower("if (true) out 1 else out 2").unwrap(),
      [
        "load rom a 1",
        "cmp a 0",
        "jmp = L0",
        "load rom a 1",
        "out a",
        "jmp L1",
        ":L0",
        "load rom a 2",
        "out a",
        ":L1",
        "halt"
      ]
    );
  }

  #[test]
  fn for_without_condition_loops_unconditionally() {
    let lines = lower("for (;;) out in").unwrap();
    assert_eq!(lines, [":L0", "in a", "out a", "jmp L0", ":L1", "halt"]);
  }

  #[test]
  fn logical_and_short_circuits() {
    assert_eq!(
      lower("out true && false").unwrap(),
      [
        "load rom a 1",
        "cmp a 0",
        "jmp = L0",
        "load rom a 0",
        ":L0",
        "out a",
        "halt"
      ]
    );
  }

  #[test]
  fn unary_forms() {
    let lines = lower("out -1 out ~1 out !1").unwrap();
    assert!(lines.contains(&"opp -a".to_string()));
    assert!(lines.contains(&"opp ~a".to_string()));
    assert!(lines.contains(&"jmp != L0".to_string()));
  }

  #[test]
  fn labels_restart_per_generate_call() {
    let program = parse(tokenize("while (1) out 1").unwrap()).unwrap();
    let mut generator = Generator::new();
    let first = generator.generate(&program).unwrap();
    let second = generator.generate(&program).unwrap();
    assert_eq!(first, second);
  }

  #[test]
  fn literal_range_is_enforced() {
    assert_eq!(
      lower("out 256").unwrap_err(),
      CodegenError::NumberOutOfRange {
        value: "256".to_string(),
      }
    );
    assert!(matches!(
      lower("out 1.5").unwrap_err(),
      CodegenError::NumberOutOfRange { .. }
    ));
    assert_eq!(lower("out 0xFF").unwrap()[0], "load rom a 255");
  }

  #[test]
  fn undefined_variable_is_reported() {
    assert_eq!(
      lower("y = 1").unwrap_err(),
      CodegenError::UndefinedVariable {
        name: "y".to_string(),
      }
    );
  }

  #[test]
  fn unsupported_constructs_are_rejected() {
    for source in ["fun f() {}", "out \"hi\"", "f()", "fun g() { return 1 }"] {
      assert!(
        matches!(lower(source), Err(CodegenError::Unsupported { .. })),
        "{source}"
      );
    }
  }

  #[test]
  fn ram_runs_out_after_256_variables() {
    let source: String = (0..257).map(|i| format!("var v{i} ")).collect();
    assert_eq!(
      lower(&source).unwrap_err(),
      CodegenError::RamExhausted {
        name: "v256".to_string(),
      }
    );
  }

  #[test]
  fn spills_do_not_shift_variable_addresses() {
    let lines = lower("var a = (1 + 2) - (3 + 4); var b = 9; out b;").unwrap();
    assert!(lines.contains(&"save a ram[255]".to_string()));
    assert!(lines.contains(&"save a ram[0]".to_string()));
    assert!(lines.ends_with(&[
      "load rom a 9".to_string(),
      "save a ram[1]".to_string(),
      "load ram[1] a".to_string(),
      "out a".to_string(),
      "halt".to_string(),
    ]));
  }

  #[test]
  fn scratch_and_variables_share_the_ram_budget() {
    let mut source: String = (0..255).map(|i| format!("var v{i} ")).collect();
    source.push_str("out 1 + (2 + 3)");
    assert!(lower(&source).is_ok());

    source.insert_str(0, "var extra ");
    assert_eq!(
      lower(&source).unwrap_err(),
      CodegenError::RamExhausted {
        name: "temporary".to_string(),
      }
    );
  }

  #[test]
  fn redeclaration_rebinds_to_a_fresh_address() {
    let lines = lower("var x = 1 var x = 2 out x").unwrap();
    assert!(lines.contains(&"save a ram[1]".to_string()));
    assert!(lines.contains(&"load ram[1] a".to_string()));
  }
}
