/*!
  This module is responsible for the encoding and decoding of binary instructions.

  Every instruction starts with a little-endian 16-bit header:
  ```text
    [op2 indirect:1][op2:3][op1 indirect:1][op1:3][flag a:1][flag b:1][opcode:6]
     15              14-12  11              10-8   7         6         5-0
  ```
  The two flag bits change meaning with the opcode class. For generic instructions flag a
  announces a trailing 16-bit immediate and flag b selects 64-bit operation. For the MOV
  family flag a announces a trailing index for operand 1 and flag b one for operand 2;
  operand 1's index, when present, comes first. The opcode must therefore be resolved before
  the rest of the header can be read.
*/
use std::convert::TryFrom;

use nom::{
  combinator::cond,
  number::complete::{le_u16, le_u32, le_u64},
  IResult
};

use super::{Arguments, Instruction, Opcode, Register};
use crate::error::DecodeError;
use crate::memory::Width;

pub const HEADER_SIZE: usize = 2;
pub const IMMEDIATE_SIZE: usize = 2;

const OPCODE_MASK       : u16 = 0x003f;
const FLAG_A            : u16 = 0x0080;
const FLAG_B            : u16 = 0x0040;
const OPERAND1_SHIFT    : u16 = 8;
const OP1_INDIRECT      : u16 = 0x0800;
const OPERAND2_SHIFT    : u16 = 12;
const OP2_INDIRECT      : u16 = 0x8000;
const OPERAND_MASK      : u16 = 0x7;

use Opcode::*;

/// Raw 6-bit opcode to opcode. Reserved encodings are `Nop`.
pub const OPCODE_TABLE: [Opcode; 64] = [
  Nop,   Nop,   Nop,   Nop,   Ret,   Nop,   Nop,   Nop,    // 0x00
  Nop,   Nop,   Not,   Neg,   Add,   Sub,   Mul,   MulU,   // 0x08
  Div,   DivU,  Mod,   ModU,  And,   Or,    Xor,   Shl,    // 0x10
  Shr,   Nop,   Nop,   Nop,   Nop,   MovBW, MovWW, MovDW,  // 0x18
  MovQW, MovBD, MovWD, MovDD, MovQD, Nop,   Nop,   Nop,    // 0x20
  MovQQ, Nop,   Nop,   Push,  Pop,   Nop,   Nop,   Nop,    // 0x28
  Nop,   Nop,   Nop,   Nop,   Nop,   Nop,   Nop,   Nop,    // 0x30
  Nop,   Nop,   Nop,   Nop,   Nop,   Nop,   Nop,   Nop,    // 0x38
];

/// Only the low six bits of `raw` are significant.
pub fn resolve_opcode(raw: u8) -> Opcode {
  OPCODE_TABLE[(raw & OPCODE_MASK as u8) as usize]
}

pub fn resolve_register(raw: u8) -> Result<Register, DecodeError> {
  Register::try_from(raw).map_err(|_| DecodeError::InvalidOperand(raw))
}

/**
  Given the header of an instruction, determines how many bytes the whole instruction
  occupies. This is how to determine how much of the stream needs to be provided for
  decoding, and how far to advance the instruction pointer afterward.
*/
pub fn instruction_size(header: u16) -> usize {
  let flag_a = header & FLAG_A != 0;
  let flag_b = header & FLAG_B != 0;

  match resolve_opcode(header as u8).move_widths() {

    Some((_, idx_len)) => {
      HEADER_SIZE + (flag_a as usize + flag_b as usize) * idx_len.bytes()
    }

    None => {
      HEADER_SIZE + flag_a as usize * IMMEDIATE_SIZE
    }

  }
}

fn header_field(input: &[u8]) -> IResult<&[u8], u16> {
  le_u16(input)
}

fn immediate_field(input: &[u8]) -> IResult<&[u8], u32> {
  le_u16(input).map(|(rest, value)| (rest, value as u32))
}

fn index_field(idx_len: Width, input: &[u8]) -> IResult<&[u8], u64> {
  match idx_len {
    Width::Byte   => unreachable!("MOV indexes are at least two bytes wide"),
    Width::Word   => le_u16(input).map(|(rest, value)| (rest, value as u64)),
    Width::Double => le_u32(input).map(|(rest, value)| (rest, value as u64)),
    Width::Quad   => le_u64(input),
  }
}

/**
  Decodes the instruction at the start of `bytes`, returning it together with the number
  of bytes it occupies. Trailing bytes beyond the instruction are ignored.
*/
pub fn decode_instruction(bytes: &[u8]) -> Result<(Instruction, usize), DecodeError> {
  let truncated = |needed: usize| DecodeError::Truncated { needed, available: bytes.len() };

  let (rest, header) = header_field(bytes).map_err(|_| truncated(HEADER_SIZE))?;

  let opcode       = resolve_opcode(header as u8);
  let operand1     = resolve_register(((header >> OPERAND1_SHIFT) & OPERAND_MASK) as u8)?;
  let operand2     = resolve_register(((header >> OPERAND2_SHIFT) & OPERAND_MASK) as u8)?;
  let op1_indirect = header & OP1_INDIRECT != 0;
  let op2_indirect = header & OP2_INDIRECT != 0;
  let flag_a       = header & FLAG_A != 0;
  let flag_b       = header & FLAG_B != 0;

  let size = instruction_size(header);
  if bytes.len() < size {
    return Err(truncated(size));
  }

  let arguments =
    match opcode.move_widths() {

      Some((op_len, idx_len)) => {
        let (rest, op1_idx) =
          cond(flag_a, |i| index_field(idx_len, i))(rest).map_err(|_| truncated(size))?;
        let (_, op2_idx) =
          cond(flag_b, |i| index_field(idx_len, i))(rest).map_err(|_| truncated(size))?;
        Arguments::Move { op_len, idx_len, op1_idx, op2_idx }
      }

      None => {
        let (_, imm) = cond(flag_a, immediate_field)(rest).map_err(|_| truncated(size))?;
        Arguments::Generic { is_64op: flag_b, imm }
      }

    };

  let instruction = Instruction {
    opcode,
    operand1,
    op1_indirect,
    operand2,
    op2_indirect,
    arguments
  };

  Ok((instruction, size))
}

/**
  Encodes the instruction into bytecode, the inverse of `decode_instruction`. It is the
  caller's responsibility to use the `Arguments` variant that matches the opcode's class;
  immediates keep their low 16 bits and indexes their low `idx_len` bytes.
*/
pub fn encode_instruction(instruction: &Instruction) -> Vec<u8> {
  let mut header: u16 =
      instruction.opcode.code() as u16
    | (instruction.operand1.idx() as u16) << OPERAND1_SHIFT
    | (instruction.operand2.idx() as u16) << OPERAND2_SHIFT;

  if instruction.op1_indirect {
    header |= OP1_INDIRECT;
  }
  if instruction.op2_indirect {
    header |= OP2_INDIRECT;
  }

  let mut trailing: Vec<u8> = Vec::new();

  match instruction.arguments {

    Arguments::Generic { is_64op, imm } => {
      if let Some(imm) = imm {
        header |= FLAG_A;
        trailing.extend_from_slice(&(imm as u16).to_le_bytes());
      }
      if is_64op {
        header |= FLAG_B;
      }
    }

    Arguments::Move { idx_len, op1_idx, op2_idx, .. } => {
      if let Some(index) = op1_idx {
        header |= FLAG_A;
        trailing.extend_from_slice(&index.to_le_bytes()[..idx_len.bytes()]);
      }
      if let Some(index) = op2_idx {
        header |= FLAG_B;
        trailing.extend_from_slice(&index.to_le_bytes()[..idx_len.bytes()]);
      }
    }

  }

  let mut bytes = header.to_le_bytes().to_vec();
  bytes.append(&mut trailing);
  bytes
}


#[cfg(test)]
mod tests {
  use super::*;
  use proptest::prelude::*;

  const MOVES: [(u8, Opcode); 9] = [
    (0x1d, MovBW), (0x1e, MovWW), (0x1f, MovDW), (0x20, MovQW), (0x21, MovBD),
    (0x22, MovWD), (0x23, MovDD), (0x24, MovQD), (0x28, MovQQ),
  ];

  // A MOV header followed by two copies of the index pattern.
  fn mov_stream(opcode: u8) -> Vec<u8> {
    let mut stream = vec![opcode, 0x00];
    for _ in 0..2 {
      stream.extend_from_slice(&[0xef, 0xcd, 0xab, 0x89, 0x67, 0x45, 0x23, 0x01]);
    }
    stream
  }

  fn decode(bytes: &[u8]) -> Instruction {
    decode_instruction(bytes).unwrap().0
  }

  fn move_arguments(instruction: &Instruction) -> (Width, Width, Option<u64>, Option<u64>) {
    match instruction.arguments {
      Arguments::Move { op_len, idx_len, op1_idx, op2_idx } => (op_len, idx_len, op1_idx, op2_idx),
      _ => panic!("not a move: {}", instruction)
    }
  }

  #[test]
  fn table_matches_discriminants(){
    for raw in 0u8..64 {
      let opcode = resolve_opcode(raw);
      assert!(opcode == Nop || opcode.code() == raw, "{:#x} resolved to {}", raw, opcode);
    }
    assert_eq!(resolve_opcode(0x04), Ret);
    assert_eq!(resolve_opcode(0x2b), Push);
    // Reserved encodings are tolerated.
    assert_eq!(resolve_opcode(0x19), Nop);
    assert_eq!(resolve_opcode(0x3f), Nop);
    // Flag bits never leak into the opcode.
    assert_eq!(resolve_opcode(0xcc), Add);
  }

  #[test]
  fn registers(){
    for raw in 0u8..8 {
      assert_eq!(resolve_register(raw).unwrap(), Register::ALL[raw as usize]);
    }
    assert_eq!(resolve_register(8), Err(DecodeError::InvalidOperand(8)));
    assert_eq!(resolve_register(0xff), Err(DecodeError::InvalidOperand(0xff)));
  }

  #[test]
  fn generic_header(){
    // ADD64 @R1, @R2 with immediate 0x2002.
    let (instruction, size) = decode_instruction(&[0xcc, 0xa9, 0x02, 0x20]).unwrap();
    assert_eq!(size, 4);
    assert_eq!(instruction.opcode, Add);
    assert_eq!(instruction.operand1, Register::R1);
    assert!(instruction.op1_indirect);
    assert_eq!(instruction.operand2, Register::R2);
    assert!(instruction.op2_indirect);
    assert_eq!(instruction.arguments, Arguments::Generic { is_64op: true, imm: Some(0x2002) });

    // Without the immediate flag nothing trails the header.
    let (instruction, size) = decode_instruction(&[0x0c, 0x21, 0xff, 0xff]).unwrap();
    assert_eq!(size, 2);
    assert_eq!(instruction.arguments, Arguments::Generic { is_64op: false, imm: None });
  }

  #[test]
  fn mov_opcode_and_lengths(){
    for (raw, opcode) in MOVES.iter() {
      let instruction = decode(&mov_stream(*raw));
      assert_eq!(instruction.opcode, *opcode);
      let (op_len, idx_len, _, _) = move_arguments(&instruction);
      let expected_op_len = match opcode {
        MovBW | MovBD         => 1,
        MovWW | MovWD         => 2,
        MovDW | MovDD         => 4,
        MovQW | MovQD | MovQQ => 8,
        _                     => unreachable!()
      };
      let expected_idx_len = match opcode {
        MovBW | MovWW | MovDW | MovQW => 2,
        MovBD | MovWD | MovDD | MovQD => 4,
        _                             => 8
      };
      assert_eq!(op_len.bytes(), expected_op_len);
      assert_eq!(idx_len.bytes(), expected_idx_len);
    }
  }

  #[test]
  fn mov_operands(){
    for (raw, _) in MOVES.iter() {
      let mut stream = mov_stream(*raw);
      for op in 0u8..8 {
        stream[1] = op << 4;
        assert_eq!(decode(&stream).operand2, Register::ALL[op as usize]);
        stream[1] = op;
        assert_eq!(decode(&stream).operand1, Register::ALL[op as usize]);
      }
      stream[1] = 0x80;
      assert!(decode(&stream).op2_indirect);
      assert!(!decode(&stream).op1_indirect);
      stream[1] = 0x08;
      assert!(decode(&stream).op1_indirect);
      assert!(!decode(&stream).op2_indirect);
    }
  }

  #[test]
  fn mov_indexes(){
    for (raw, _) in MOVES.iter() {
      let mut stream = mov_stream(*raw);

      stream[0] = raw & !0xc0;
      let (_, _, op1_idx, op2_idx) = move_arguments(&decode(&stream));
      assert_eq!((op1_idx, op2_idx), (None, None));

      stream[0] = raw | 0x80;
      let (_, idx_len, op1_idx, op2_idx) = move_arguments(&decode(&stream));
      let pattern = match idx_len {
        Width::Word   => 0xcdef,
        Width::Double => 0x89abcdef,
        _             => 0x0123456789abcdef
      };
      assert_eq!((op1_idx, op2_idx), (Some(pattern), None));

      stream[0] = raw | 0x40;
      let (_, _, op1_idx, op2_idx) = move_arguments(&decode(&stream));
      assert_eq!((op1_idx, op2_idx), (None, Some(pattern)));

      // Operand 1's index comes first; operand 2's follows immediately.
      stream[0] = raw | 0xc0;
      let (instruction, size) = decode_instruction(&stream).unwrap();
      let (_, idx_len, op1_idx, op2_idx) = move_arguments(&instruction);
      let second = match idx_len {
        Width::Word   => 0x89ab,
        Width::Double => 0x01234567,
        _             => 0x0123456789abcdef
      };
      assert_eq!((op1_idx, op2_idx), (Some(pattern), Some(second)));
      assert_eq!(size, 2 + 2 * idx_len.bytes());
    }
  }

  #[test]
  fn truncated_streams(){
    assert_eq!(decode_instruction(&[]), Err(DecodeError::Truncated { needed: 2, available: 0 }));
    assert_eq!(decode_instruction(&[0x0c]), Err(DecodeError::Truncated { needed: 2, available: 1 }));
    assert_eq!(
      decode_instruction(&[0x8c, 0x21, 0x01]),
      Err(DecodeError::Truncated { needed: 4, available: 3 })
    );
    // MOVqq with both indexes needs eighteen bytes.
    let stream = mov_stream(0xe8);
    assert_eq!(
      decode_instruction(&stream[..17]),
      Err(DecodeError::Truncated { needed: 18, available: 17 })
    );
    assert!(decode_instruction(&stream).is_ok());
  }

  #[test]
  fn instruction_sizes(){
    assert_eq!(instruction_size(0x0004), 2);
    assert_eq!(instruction_size(0x008c), 4);
    assert_eq!(instruction_size(0x004c), 2);
    assert_eq!(instruction_size(0x00dd), 6);
    assert_eq!(instruction_size(0x00a3), 6);
    assert_eq!(instruction_size(0x00e8), 18);
  }

  #[test]
  fn header_round_trip(){
    let trailing = [0xef, 0xcd, 0xab, 0x89, 0x67, 0x45, 0x23, 0x01,
                    0xef, 0xcd, 0xab, 0x89, 0x67, 0x45, 0x23, 0x01];
    for header in 0..=u16::MAX {
      let mut stream = header.to_le_bytes().to_vec();
      stream.extend_from_slice(&trailing);

      let (instruction, size) = decode_instruction(&stream).unwrap();
      let encoded = encode_instruction(&instruction);
      assert_eq!(encoded.len(), size);

      let assigned = resolve_opcode(header as u8) != Nop;
      let expected = match assigned {
        true  => header,
        // Reserved opcodes come back as NOP; everything else survives.
        false => header & !OPCODE_MASK
      };
      assert_eq!(u16::from_le_bytes([encoded[0], encoded[1]]), expected, "header {:#06x}", header);
      assert_eq!(&encoded[2..], &stream[2..size]);
    }
  }

  proptest! {
    #[test]
    fn generic_records_round_trip(
      raw in prop::sample::select(vec![0x04u8, 0x0a, 0x0c, 0x10, 0x13, 0x18, 0x2b, 0x2c]),
      op1 in 0usize..8,
      op2 in 0usize..8,
      op1_indirect in any::<bool>(),
      op2_indirect in any::<bool>(),
      is_64op in any::<bool>(),
      imm in prop::option::of(any::<u16>())
    ) {
      let instruction = Instruction {
        opcode       : resolve_opcode(raw),
        operand1     : Register::ALL[op1],
        op1_indirect,
        operand2     : Register::ALL[op2],
        op2_indirect,
        arguments    : Arguments::Generic { is_64op, imm: imm.map(u32::from) }
      };
      let encoded = encode_instruction(&instruction);
      prop_assert_eq!(decode_instruction(&encoded), Ok((instruction, encoded.len())));
    }
  }
}
