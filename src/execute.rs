/*!
  The execute stage: applies one decoded `Instruction` to a `Machine`.

  Operands resolve the same way for every generic instruction. The operand that can carry the
  immediate (operand 2, or operand 1 for PUSH and POP) reads

    `R + imm`         when direct, truncated to the operation width, or
    `[R + index]`     when indirect, the immediate read as a 16-bit natural index.

  Destinations are operand 1's register, or memory at the address it holds when indirect.
  32-bit results written to a register clear its upper half.

  An instruction either completes or fails without modifying the machine; every check that
  can fail runs before the first write.
*/

use crate::address::NaturalIndex;
use crate::bytecode::{Arguments, Instruction, Opcode, Register};
use crate::error::{ExecutionError, MemoryError};
use crate::machine::Machine;
use crate::memory::Width;

/// What the driving loop should do after an instruction.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum Outcome {
  Continue,
  /// RET: stop fetching.
  Halt,
}

/// Where an instruction's result goes.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
enum Location {
  Register(Register),
  Memory(u64),
}

impl Location {
  fn of(machine: &Machine, register: Register, indirect: bool, index: Option<NaturalIndex>) -> Location {
    match indirect {
      true  => {
        let base = machine.register(register);
        Location::Memory(index.map_or(base, |index| index.apply(base)))
      }
      false => Location::Register(register)
    }
  }

  fn load(&self, machine: &Machine, width: Width) -> Result<u64, MemoryError> {
    match self {
      Location::Register(register) => Ok(width.truncate(machine.register(*register))),
      Location::Memory(address)    => machine.memory().read(*address, width)
    }
  }

  fn store(&self, machine: &mut Machine, width: Width, value: u64) -> Result<(), MemoryError> {
    match self {
      Location::Register(register) => {
        machine.set_register(*register, width.truncate(value));
        Ok(())
      }
      Location::Memory(address) => machine.memory_mut().write(*address, width, value)
    }
  }
}

fn immediate_index(imm: Option<u32>) -> Option<NaturalIndex> {
  imm.map(|imm| NaturalIndex::decode(imm as u64, Width::Word))
}

/// Resolves the operand that may carry the immediate.
fn operand_value(
  machine  : &Machine,
  register : Register,
  indirect : bool,
  imm      : Option<u32>,
  width    : Width
) -> Result<u64, MemoryError> {
  match indirect {

    true  => Location::of(machine, register, true, immediate_index(imm)).load(machine, width),

    false => {
      let value = machine.register(register).wrapping_add(imm.unwrap_or(0) as u64);
      Ok(width.truncate(value))
    }

  }
}

/// Computes `left <op> right` at `width`. Both inputs are already truncated to `width`.
fn alu(opcode: Opcode, left: u64, right: u64, width: Width) -> Result<u64, ExecutionError> {
  let signed_left  = width.sign_extend(left);
  let signed_right = width.sign_extend(right);
  let shift        = (right % width.bits() as u64) as u32;

  let result =
    match opcode {
      Opcode::Not  => !right,
      Opcode::Neg  => right.wrapping_neg(),
      Opcode::Add  => left.wrapping_add(right),
      Opcode::Sub  => left.wrapping_sub(right),
      Opcode::Mul  => signed_left.wrapping_mul(signed_right) as u64,
      Opcode::MulU => left.wrapping_mul(right),
      Opcode::Div  => {
        divide_by(right)?;
        signed_left.wrapping_div(signed_right) as u64
      }
      Opcode::DivU => left / divide_by(right)?,
      Opcode::Mod  => {
        divide_by(right)?;
        signed_left.wrapping_rem(signed_right) as u64
      }
      Opcode::ModU => left % divide_by(right)?,
      Opcode::And  => left & right,
      Opcode::Or   => left | right,
      Opcode::Xor  => left ^ right,
      Opcode::Shl  => left << shift,
      Opcode::Shr  => left >> shift,
      _            => unreachable!("{} is not an arithmetic opcode", opcode)
    };

  Ok(width.truncate(result))
}

/// Passes a nonzero divisor through.
fn divide_by(divisor: u64) -> Result<u64, ExecutionError> {
  match divisor {
    0 => Err(ExecutionError::DivisionByZero),
    d => Ok(d)
  }
}

/**
  Applies `instruction` to `machine`. Errors abort the instruction before it writes anything.

  PUSH and POP with operand 1 = R0 leave R0 unspecified; no particular outcome is promised.
*/
pub fn execute(instruction: &Instruction, machine: &mut Machine) -> Result<Outcome, ExecutionError> {
  let width = Width::natural(instruction.is_64op());
  let imm   = instruction.imm();

  match instruction.opcode {

    Opcode::Nop => {}

    Opcode::Ret => return Ok(Outcome::Halt),

    Opcode::Not | Opcode::Neg => {
      let destination = Location::of(machine, instruction.operand1, instruction.op1_indirect, None);
      let source      = operand_value(
        machine, instruction.operand2, instruction.op2_indirect, imm, width
      )?;
      let result      = alu(instruction.opcode, 0, source, width)?;
      destination.store(machine, width, result)?;
    }

    Opcode::Push => {
      let value = operand_value(machine, instruction.operand1, instruction.op1_indirect, imm, width)?;
      let sp    = machine.register(Register::R0).wrapping_sub(width.bytes() as u64);
      machine.memory_mut().write(sp, width, value)?;
      machine.set_register(Register::R0, sp);
    }

    Opcode::Pop => {
      let sp          = machine.register(Register::R0);
      let value       = machine.memory().read(sp, width)?;
      let destination = Location::of(
        machine, instruction.operand1, instruction.op1_indirect, immediate_index(imm)
      );
      destination.store(machine, width, value)?;
      machine.set_register(Register::R0, sp.wrapping_add(width.bytes() as u64));
    }

    opcode if opcode.is_move() => move_value(instruction, machine)?,

    opcode => {
      let destination = Location::of(machine, instruction.operand1, instruction.op1_indirect, None);
      let left        = destination.load(machine, width)?;
      let right       = operand_value(
        machine, instruction.operand2, instruction.op2_indirect, imm, width
      )?;
      let result      = alu(opcode, left, right, width)?;
      destination.store(machine, width, result)?;
    }

  }

  Ok(Outcome::Continue)
}

/**
  MOV: copies `op_len` bytes from operand 2 to operand 1. Indexes displace indirect operands;
  on a direct source the index is added to the register value, on a direct destination it
  has no effect. A register destination receives the value zero-extended.
*/
fn move_value(instruction: &Instruction, machine: &mut Machine) -> Result<(), ExecutionError> {
  let (op_len, idx_len) = match instruction.opcode.move_widths() {
    Some(widths) => widths,
    None         => return Ok(())
  };
  let (op1_idx, op2_idx) = match instruction.arguments {
    Arguments::Move { op1_idx, op2_idx, .. } => (op1_idx, op2_idx),
    Arguments::Generic { .. }                => (None, None)
  };
  let op1_idx = op1_idx.map(|index| NaturalIndex::decode(index, idx_len));
  let op2_idx = op2_idx.map(|index| NaturalIndex::decode(index, idx_len));

  let value = match instruction.op2_indirect {
    true  => Location::of(machine, instruction.operand2, true, op2_idx).load(machine, op_len)?,
    false => {
      let base = machine.register(instruction.operand2);
      op_len.truncate(op2_idx.map_or(base, |index| index.apply(base)))
    }
  };

  let destination = Location::of(machine, instruction.operand1, instruction.op1_indirect, op1_idx);
  destination.store(machine, op_len, value)?;
  Ok(())
}
