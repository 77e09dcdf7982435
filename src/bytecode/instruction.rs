use std::fmt::{Display, Formatter};

use strum_macros::{Display as StrumDisplay, IntoStaticStr};
use num_enum::{TryFromPrimitive, IntoPrimitive};

use crate::address::NaturalIndex;
use crate::memory::Width;

/**
  Opcodes of the virtual machine, with their raw 6-bit encodings as discriminants.

  Raw values with no variant here are reserved and decode as `Nop`; see
  `binary::OPCODE_TABLE`. The `Mov*` variants are named `Mov<source><index>`: the first
  letter is the width of the value moved, the second the width of each trailing index.
*/
#[derive(
  StrumDisplay, IntoStaticStr, IntoPrimitive,
  Clone,        Copy,          Eq, PartialEq,  Debug,  Hash
)]
#[repr(u8)]
pub enum Opcode {
  #[strum(serialize = "NOP")]   Nop   = 0x00,
  #[strum(serialize = "RET")]   Ret   = 0x04,

  // Unary
  #[strum(serialize = "NOT")]   Not   = 0x0a,
  #[strum(serialize = "NEG")]   Neg   = 0x0b,

  // Binary arithmetic
  #[strum(serialize = "ADD")]   Add   = 0x0c,
  #[strum(serialize = "SUB")]   Sub   = 0x0d,
  #[strum(serialize = "MUL")]   Mul   = 0x0e,
  #[strum(serialize = "MULU")]  MulU  = 0x0f,
  #[strum(serialize = "DIV")]   Div   = 0x10,
  #[strum(serialize = "DIVU")]  DivU  = 0x11,
  #[strum(serialize = "MOD")]   Mod   = 0x12,
  #[strum(serialize = "MODU")]  ModU  = 0x13,
  #[strum(serialize = "AND")]   And   = 0x14,
  #[strum(serialize = "OR")]    Or    = 0x15,
  #[strum(serialize = "XOR")]   Xor   = 0x16,
  #[strum(serialize = "SHL")]   Shl   = 0x17,
  #[strum(serialize = "SHR")]   Shr   = 0x18,

  // Moves
  #[strum(serialize = "MOVbw")] MovBW = 0x1d,
  #[strum(serialize = "MOVww")] MovWW = 0x1e,
  #[strum(serialize = "MOVdw")] MovDW = 0x1f,
  #[strum(serialize = "MOVqw")] MovQW = 0x20,
  #[strum(serialize = "MOVbd")] MovBD = 0x21,
  #[strum(serialize = "MOVwd")] MovWD = 0x22,
  #[strum(serialize = "MOVdd")] MovDD = 0x23,
  #[strum(serialize = "MOVqd")] MovQD = 0x24,
  #[strum(serialize = "MOVqq")] MovQQ = 0x28,

  // Stack
  #[strum(serialize = "PUSH")]  Push  = 0x2b,
  #[strum(serialize = "POP")]   Pop   = 0x2c,
}

impl Opcode {
  pub fn code(&self) -> u8 {
    Into::<u8>::into(*self)
  }

  /// For MOV variants, the width of the value moved and the width of each trailing index.
  /// `None` for every other opcode, which use the generic header layout.
  pub fn move_widths(&self) -> Option<(Width, Width)> {
    match self {
      Opcode::MovBW => Some((Width::Byte,   Width::Word  )),
      Opcode::MovWW => Some((Width::Word,   Width::Word  )),
      Opcode::MovDW => Some((Width::Double, Width::Word  )),
      Opcode::MovQW => Some((Width::Quad,   Width::Word  )),
      Opcode::MovBD => Some((Width::Byte,   Width::Double)),
      Opcode::MovWD => Some((Width::Word,   Width::Double)),
      Opcode::MovDD => Some((Width::Double, Width::Double)),
      Opcode::MovQD => Some((Width::Quad,   Width::Double)),
      Opcode::MovQQ => Some((Width::Quad,   Width::Quad  )),
      _             => None
    }
  }

  pub fn is_move(&self) -> bool {
    self.move_widths().is_some()
  }
}

/// The eight general registers. R0 doubles as the stack pointer for PUSH and POP, but
/// nothing here treats it specially.
#[derive(
  StrumDisplay, TryFromPrimitive, IntoPrimitive,
  Clone,        Copy,             Eq, PartialEq, Debug, Hash
)]
#[repr(u8)]
pub enum Register {
  R0, R1, R2, R3, R4, R5, R6, R7
}

impl Register {
  pub const ALL: [Register; 8] = [
    Register::R0, Register::R1, Register::R2, Register::R3,
    Register::R4, Register::R5, Register::R6, Register::R7,
  ];

  /// Converts the register to an index into the register file.
  pub fn idx(&self) -> usize {
    Into::<u8>::into(*self) as usize
  }
}

/// The header fields whose meaning depends on the opcode class.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash)]
pub enum Arguments {
  /// Header bit 7 marks a trailing 16-bit immediate, bit 6 a 64-bit operation.
  Generic {
    is_64op : bool,
    imm     : Option<u32>,
  },
  /// The same two bits mark a trailing index for operand 1 and operand 2 respectively.
  Move {
    op_len  : Width,
    idx_len : Width,
    op1_idx : Option<u64>,
    op2_idx : Option<u64>,
  },
}

/// A fully resolved instruction. Produced by `decode_instruction`, consumed by `execute`.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash)]
pub struct Instruction {
  pub opcode       : Opcode,
  pub operand1     : Register,
  pub op1_indirect : bool,
  pub operand2     : Register,
  pub op2_indirect : bool,
  pub arguments    : Arguments,
}

impl Instruction {
  pub fn is_imm(&self) -> bool {
    match self.arguments {
      Arguments::Generic { imm, .. } => imm.is_some(),
      Arguments::Move { .. }         => false
    }
  }

  pub fn imm(&self) -> Option<u32> {
    match self.arguments {
      Arguments::Generic { imm, .. } => imm,
      Arguments::Move { .. }         => None
    }
  }

  pub fn is_64op(&self) -> bool {
    match self.arguments {
      Arguments::Generic { is_64op, .. } => is_64op,
      Arguments::Move { .. }             => false
    }
  }
}

// Writes `R1` or `@R1`, followed by an index if one is present.
fn write_operand(
  f        : &mut Formatter<'_>,
  register : Register,
  indirect : bool,
  index    : Option<NaturalIndex>
) -> std::fmt::Result {
  if indirect {
    write!(f, "@")?;
  }
  write!(f, "{}", register)?;
  if let Some(index) = index {
    write!(f, "{}", index)?;
  }
  Ok(())
}

impl Display for Instruction {
  fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
    match self.arguments {

      Arguments::Generic { .. } if self.opcode == Opcode::Nop || self.opcode == Opcode::Ret => {
        write!(f, "{}", self.opcode)
      }

      Arguments::Generic { is_64op, imm } => {
        let width = match is_64op {
          true  => 64,
          false => 32
        };
        write!(f, "{}{} ", self.opcode, width)?;
        match self.opcode {

          Opcode::Push | Opcode::Pop => {
            let index = imm.filter(|_| self.op1_indirect)
                           .map(|i| NaturalIndex::decode(i as u64, Width::Word));
            write_operand(f, self.operand1, self.op1_indirect, index)?;
          }

          _ => {
            let index = imm.filter(|_| self.op2_indirect)
                           .map(|i| NaturalIndex::decode(i as u64, Width::Word));
            write_operand(f, self.operand1, self.op1_indirect, None)?;
            write!(f, ", ")?;
            write_operand(f, self.operand2, self.op2_indirect, index)?;
          }

        }
        // A direct operand takes its immediate as a plain value.
        let direct = match self.opcode {
          Opcode::Push | Opcode::Pop => !self.op1_indirect,
          _                          => !self.op2_indirect
        };
        match imm {
          Some(value) if direct => write!(f, " {:#x}", value),
          _                     => Ok(())
        }
      }

      Arguments::Move { idx_len, op1_idx, op2_idx, .. } => {
        write!(f, "{} ", self.opcode)?;
        write_operand(
          f, self.operand1, self.op1_indirect,
          op1_idx.map(|i| NaturalIndex::decode(i, idx_len))
        )?;
        write!(f, ", ")?;
        write_operand(
          f, self.operand2, self.op2_indirect,
          op2_idx.map(|i| NaturalIndex::decode(i, idx_len))
        )
      }

    }
  }
}
