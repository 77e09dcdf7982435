/*!

  The VM executes a stream of variable-length instructions, little-endian throughout. Every
  instruction begins with a 16-bit header word holding a 6-bit opcode, two flag bits, and two
  register operands, each with an indirection bit. Depending on the opcode and the flag bits,
  the header is followed by

    nothing,
    a 16-bit immediate (generic instructions), or
    one or two indexes of 16, 32, or 64 bits (the MOV family).

  The sizes of instruction components are as follows:

    Header:     16 bits
    Opcode:      6 bits
    Register:    3 bits
    Immediate:  16 bits
    Index:      16, 32, or 64 bits, fixed by the MOV opcode

  Decoding produces an `Instruction`, a value owned outright by the caller. The fields whose
  meaning depends on the opcode class live in the `Arguments` enum rather than as overloaded
  flags on a single flat struct, so a generic instruction can never be read as if it carried
  indexes, nor a MOV as if it carried an immediate.

*/

mod binary;
mod instruction;

pub use binary::{
  decode_instruction, encode_instruction, instruction_size, resolve_opcode, resolve_register,
  HEADER_SIZE, OPCODE_TABLE
};
pub use instruction::{Arguments, Instruction, Opcode, Register};
