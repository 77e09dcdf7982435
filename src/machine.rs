//! The machine state, register file plus memory, and the fetch-decode-execute loop that
//! drives it.

use std::fmt::{Display, Formatter};

use lazy_static::lazy_static;
use log::{debug, trace};
use prettytable::{format as TableFormat, row, table, Table};

use crate::bytecode::{decode_instruction, Register};
use crate::error::VmError;
use crate::execute::{execute, Outcome};
use crate::memory::{Memory, Width};

/// How many stack slots above R0 the display shows.
const STACK_WINDOW: usize = 4;

pub struct Machine {

  // Registers //
  registers : [u64; 8], // General registers; R0 is the stack pointer by convention
  ip        : u64,      // Instruction pointer, a cursor into `memory`

  // Memory Store
  memory    : Memory,

}

impl Machine {

  // region Display methods

  fn make_register_table<T> (
      name      : &str,
      cells     : &[T],
      highlight : Option<usize>,
      start     : usize
    ) -> Table
    where T: Display
  {

    let mut table = Table::new();

    table.set_format(*TABLE_DISPLAY_FORMAT);
    table.set_titles(row![ubr->"Address", ubl->"Contents"]);

    for (i, cell) in cells.iter().enumerate() {
      match Some(i) == highlight {

        true  => {
          table.add_row(
            row![r->format!("* --> {}{} =", name, i+start), format!("{}", cell)]
          );
        }

        false => {
          table.add_row(
            row![r->format!("{}{} =", name, i+start), format!("{}", cell)]
          );
        }

      } // end match on highlight
    } // end for
    table
  }

  /// The quad words at and above the stack pointer that lie inside memory.
  fn stack_window(&self) -> Vec<String> {
    let sp = self.register(Register::R0);
    (0..STACK_WINDOW as u64)
      .map(|slot| sp.wrapping_add(slot * Width::Quad.bytes() as u64))
      .filter_map(|address| {
        self.memory.read64(address)
            .ok()
            .map(|value| format!("[{:#x}] {:#018x}", address, value))
      })
      .collect()
  }

  // endregion

  // region Low-level utility methods

  /// A machine with `memory_size` bytes of zeroed memory and every register cleared.
  pub fn new(memory_size: usize) -> Machine {
    Machine::with_memory(Memory::new(memory_size))
  }

  /// A machine whose memory is the given image, as produced by a loader.
  pub fn with_image(image: Vec<u8>) -> Machine {
    Machine::with_memory(Memory::from_image(image))
  }

  pub fn with_memory(memory: Memory) -> Machine {
    Machine {
      registers : [0; 8],
      ip        : 0,
      memory,
    }
  }

  pub fn register(&self, register: Register) -> u64 {
    self.registers[register.idx()]
  }

  pub fn set_register(&mut self, register: Register, value: u64) {
    self.registers[register.idx()] = value;
  }

  pub fn ip(&self) -> u64 {
    self.ip
  }

  pub fn set_ip(&mut self, ip: u64) {
    self.ip = ip;
  }

  pub fn memory(&self) -> &Memory {
    &self.memory
  }

  pub fn memory_mut(&mut self) -> &mut Memory {
    &mut self.memory
  }

  /// Copies a program or data image into memory at `address`.
  pub fn load(&mut self, address: u64, bytes: &[u8]) -> Result<(), VmError> {
    Ok(self.memory.load(address, bytes)?)
  }

  // endregion

  // region Interpretation

  /**
    Runs one fetch-decode-execute cycle: decodes the instruction at the instruction pointer,
    executes it, and advances the instruction pointer past it. A faulting instruction leaves
    the instruction pointer on itself.
  */
  pub fn step(&mut self) -> Result<Outcome, VmError> {
    let (instruction, size) = decode_instruction(self.memory.slice_from(self.ip)?)?;
    trace!("{:#010x}: {}", self.ip, instruction);

    let outcome = execute(&instruction, self)?;
    self.ip     = self.ip.wrapping_add(size as u64);

    #[cfg(feature = "trace_computation")] println!("{}", self);

    Ok(outcome)
  }

  /**
    Steps until RET, a fault, or `max_steps` instructions have executed (`None` for no
    limit). Returns the number of instructions executed, the RET included.
  */
  pub fn run(&mut self, max_steps: Option<usize>) -> Result<usize, VmError> {
    let mut executed = 0;

    while max_steps.map_or(true, |limit| executed < limit) {
      let ip = self.ip;
      match self.step() {

        Ok(Outcome::Continue) => {
          executed += 1;
        }

        Ok(Outcome::Halt) => {
          executed += 1;
          debug!("halted at {:#x} after {} instructions", ip, executed);
          return Ok(executed);
        }

        Err(error) => {
          debug!("fault at {:#x}: {}", ip, error);
          return Err(error);
        }

      }
    }

    debug!("stopped at {:#x} after the step limit of {}", self.ip, executed);
    Ok(executed)
  }

  // endregion

}


lazy_static! {
  static ref TABLE_DISPLAY_FORMAT: TableFormat::TableFormat =
    TableFormat::FormatBuilder::new()
      .column_separator('│')
      .borders(' ')
      .separator(
        TableFormat::LinePosition::Title,
        TableFormat::LineSeparator::new('─', '┼', ' ', ' ')
      )
      .separator(
        TableFormat::LinePosition::Bottom,
        TableFormat::LineSeparator::new('─', '┴', ' ', ' ')
      )
      .padding(1, 1)
      .build();
}

impl Display for Machine {
  fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
    let registers: Vec<String> =
      self.registers.iter().map(|value| format!("{:#018x}", value)).collect();

    // R0 is highlighted as the stack pointer.
    let r_table     = Machine::make_register_table("R", &registers, Some(0), 0);
    let stack_table = Machine::make_register_table("SP+", &self.stack_window(), None, 0);

    let mut combined_table = table!([r_table, stack_table]);

    combined_table.set_titles(row![ub->"Registers", ub->"Stack"]);
    combined_table.set_format(*TABLE_DISPLAY_FORMAT);

    write!(f, "IP: {:#x}\tMemory: {} bytes\n{}", self.ip, self.memory.len(), combined_table)
  }
}


#[cfg(test)]
mod tests {
  use super::*;
  use crate::bytecode::{encode_instruction, Arguments, Instruction, Opcode};
  use crate::error::{DecodeError, ExecutionError, MemoryError};

  fn generic(opcode: Opcode, operand1: Register, operand2: Register, imm: Option<u32>) -> Instruction {
    Instruction {
      opcode,
      operand1,
      op1_indirect : false,
      operand2,
      op2_indirect : false,
      arguments    : Arguments::Generic { is_64op: true, imm }
    }
  }

  fn assemble(program: &[Instruction]) -> Vec<u8> {
    program.iter().flat_map(encode_instruction).collect()
  }

  #[test]
  fn registers_start_cleared(){
    let mut machine = Machine::new(0x10);
    for register in Register::ALL.iter() {
      assert_eq!(machine.register(*register), 0);
    }
    machine.set_register(Register::R5, u64::MAX);
    assert_eq!(machine.register(Register::R5), u64::MAX);
    assert_eq!(machine.memory().len(), 0x10);
  }

  #[test]
  fn step_advances_past_trailing_bytes(){
    let program = assemble(&[
      generic(Opcode::Add, Register::R1, Register::R2, Some(0x10)),
      generic(Opcode::Ret, Register::R0, Register::R0, None),
    ]);
    let mut machine = Machine::new(0x40);
    machine.load(0, &program).unwrap();

    assert_eq!(machine.step(), Ok(Outcome::Continue));
    assert_eq!(machine.ip(), 4);
    assert_eq!(machine.register(Register::R1), 0x10);
    assert_eq!(machine.step(), Ok(Outcome::Halt));
    assert_eq!(machine.ip(), 6);
  }

  #[test]
  fn run_until_ret(){
    let program = assemble(&[
      generic(Opcode::Add, Register::R1, Register::R2, Some(0x3)),
      generic(Opcode::Mul, Register::R1, Register::R2, Some(0x5)),
      generic(Opcode::Push, Register::R1, Register::R0, None),
      generic(Opcode::Ret, Register::R0, Register::R0, None),
    ]);
    let mut machine = Machine::new(0x100);
    machine.load(0, &program).unwrap();
    machine.set_register(Register::R0, 0x100);

    assert_eq!(machine.run(None), Ok(4));
    assert_eq!(machine.register(Register::R1), 15);
    assert_eq!(machine.register(Register::R0), 0xf8);
    assert_eq!(machine.memory().read64(0xf8), Ok(15));
  }

  #[test]
  fn run_respects_step_limit(){
    // Zeroed memory decodes as an endless run of NOPs.
    let mut machine = Machine::new(0x20);
    assert_eq!(machine.run(Some(5)), Ok(5));
    assert_eq!(machine.ip(), 10);
  }

  #[test]
  fn faults_stop_the_loop(){
    let program = assemble(&[
      generic(Opcode::Div, Register::R1, Register::R2, None),
    ]);
    let mut machine = Machine::new(0x10);
    machine.load(0, &program).unwrap();
    machine.set_register(Register::R1, 7);

    assert_eq!(
      machine.run(None),
      Err(VmError::Execution(ExecutionError::DivisionByZero))
    );
    assert_eq!(machine.ip(), 0);
    assert_eq!(machine.register(Register::R1), 7);
  }

  #[test]
  fn fetch_faults(){
    // An ADD announcing an immediate, cut off by the end of memory.
    let mut machine = Machine::with_image(vec![0x8c, 0x21, 0x00]);
    assert_eq!(
      machine.step(),
      Err(VmError::Decode(DecodeError::Truncated { needed: 4, available: 3 }))
    );

    let mut machine = Machine::new(4);
    machine.set_ip(5);
    assert_eq!(
      machine.step(),
      Err(VmError::Execution(ExecutionError::Memory(MemoryError::OutOfBounds { address: 5, width: 0 })))
    );
  }

  #[test]
  fn display_lists_registers(){
    let mut machine = Machine::new(0x20);
    machine.set_register(Register::R0, 0x10);
    machine.set_register(Register::R3, 0xabcd);
    let text = machine.to_string();
    assert!(text.contains("IP: 0x0"));
    assert!(text.contains("* --> R0 ="));
    assert!(text.contains("0x000000000000abcd"));
    assert!(text.contains("[0x18]"));
  }
}
