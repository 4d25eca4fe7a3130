//! Emission: serialize the legalized instruction tree into AT&T-syntax
//! x86-64 assembly text.
//!
//! Purely mechanical string building. The only way this can fail is a
//! pseudo operand surviving the stack pass, which is a pipeline bug and
//! reported as such rather than silently printed.

use crate::asm::{BinaryOp, CondCode, Function, Instruction, Operand, Program, Reg, UnaryOp};
use crate::error::{CompileError, CompileResult};

/// Render a whole program.
pub fn emit(program: &Program) -> CompileResult<String> {
  let mut text = String::new();
  for function in &program.functions {
    emit_function(function, &mut text)?;
  }
  Ok(text)
}

fn emit_function(function: &Function, text: &mut String) -> CompileResult<()> {
  text.push_str(&format!(".globl {}\n", function.name));
  text.push_str(&format!("{}:\n", function.name));
  text.push_str("    pushq %rbp\n");
  text.push_str("    movq %rsp, %rbp\n");

  for instruction in &function.instructions {
    emit_instruction(instruction, text)?;
  }
  Ok(())
}

fn emit_instruction(instruction: &Instruction, text: &mut String) -> CompileResult<()> {
  match instruction {
    Instruction::Mov { src, dst } => {
      text.push_str(&format!("    movl {}, {}\n", operand(src)?, operand(dst)?));
    }
    Instruction::Unary { op, operand: o } => {
      let mnemonic = match op {
        UnaryOp::Neg => "negl",
        UnaryOp::Not => "notl",
      };
      text.push_str(&format!("    {mnemonic} {}\n", operand(o)?));
    }
    Instruction::Binary { op, src, dst } => {
      let mnemonic = match op {
        BinaryOp::Add => "addl",
        BinaryOp::Sub => "subl",
        BinaryOp::Mult => "imull",
      };
      text.push_str(&format!(
        "    {mnemonic} {}, {}\n",
        operand(src)?,
        operand(dst)?
      ));
    }
    Instruction::Cmp { src, dst } => {
      text.push_str(&format!("    cmpl {}, {}\n", operand(src)?, operand(dst)?));
    }
    Instruction::Idiv(o) => {
      text.push_str(&format!("    idivl {}\n", operand(o)?));
    }
    Instruction::Cdq => text.push_str("    cdq\n"),
    Instruction::Jmp(target) => {
      text.push_str(&format!("    jmp .L{target}\n"));
    }
    Instruction::JmpCc { cond, target } => {
      text.push_str(&format!("    j{} .L{target}\n", cond_suffix(*cond)));
    }
    Instruction::SetCc { cond, operand: o } => {
      text.push_str(&format!(
        "    set{} {}\n",
        cond_suffix(*cond),
        byte_operand(o)?
      ));
    }
    Instruction::Label(name) => {
      text.push_str(&format!(".L{name}:\n"));
    }
    Instruction::AllocateStack(bytes) => {
      text.push_str(&format!("    subq ${bytes}, %rsp\n"));
    }
    Instruction::Ret => {
      text.push_str("    movq %rbp, %rsp\n");
      text.push_str("    popq %rbp\n");
      text.push_str("    ret\n");
    }
  }
  Ok(())
}

fn operand(operand: &Operand) -> CompileResult<String> {
  match operand {
    Operand::Imm(value) => Ok(format!("${value}")),
    Operand::Reg(Reg::Ax) => Ok("%eax".to_string()),
    Operand::Reg(Reg::Dx) => Ok("%edx".to_string()),
    Operand::Reg(Reg::R10) => Ok("%r10d".to_string()),
    Operand::Reg(Reg::R11) => Ok("%r11d".to_string()),
    Operand::Stack(offset) => Ok(format!("{offset}(%rbp)")),
    Operand::Pseudo(name) => Err(CompileError::emission(format!(
      "pseudoregister '{name}' survived stack assignment"
    ))),
  }
}

/// `set<cc>` writes a single byte, so registers print in their byte form.
fn byte_operand(operand: &Operand) -> CompileResult<String> {
  match operand {
    Operand::Reg(Reg::Ax) => Ok("%al".to_string()),
    Operand::Reg(Reg::Dx) => Ok("%dl".to_string()),
    Operand::Reg(Reg::R10) => Ok("%r10b".to_string()),
    Operand::Reg(Reg::R11) => Ok("%r11b".to_string()),
    Operand::Stack(offset) => Ok(format!("{offset}(%rbp)")),
    Operand::Imm(value) => Err(CompileError::emission(format!(
      "immediate {value} as a set destination"
    ))),
    Operand::Pseudo(name) => Err(CompileError::emission(format!(
      "pseudoregister '{name}' survived stack assignment"
    ))),
  }
}

fn cond_suffix(cond: CondCode) -> &'static str {
  match cond {
    CondCode::E => "e",
    CondCode::Ne => "ne",
    CondCode::L => "l",
    CondCode::Le => "le",
    CondCode::G => "g",
    CondCode::Ge => "ge",
  }
}
