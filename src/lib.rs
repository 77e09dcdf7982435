/*!
  An interpreter for a RISC-like byte-code instruction set: eight 64-bit general registers, a
  flat little-endian memory, and variable-length instructions built from a 16-bit header plus
  optional trailing immediates or indexes.

  The pipeline is

    bytes -> [`decode_instruction`] -> `Instruction` -> [`execute`] -> mutated `Machine`

  and `Machine::step`/`Machine::run` drive it from the instruction pointer.
*/

pub mod address;
pub mod bytecode;
pub mod error;
pub mod execute;
pub mod machine;
pub mod memory;

pub use bytecode::{decode_instruction, encode_instruction, Arguments, Instruction, Opcode, Register};
pub use error::{DecodeError, ExecutionError, MemoryError, VmError};
pub use execute::{execute, Outcome};
pub use machine::Machine;
pub use memory::{Memory, Width};
