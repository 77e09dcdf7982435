//! Error kinds raised by the decode and execute stages. None of them are recoverable inside
//! the pipeline: each aborts the current instruction and is handed to whoever drives the loop.

use thiserror::Error;

/// A malformed instruction stream.
#[derive(Debug, Error, Clone, Copy, Eq, PartialEq)]
pub enum DecodeError {
  /// A register field encodes a value outside R0..R7.
  #[error("invalid operand encoding {0:#x}")]
  InvalidOperand(u8),
  /// Fewer bytes remain than the instruction's format requires.
  #[error("instruction truncated: needs {needed} bytes, {available} available")]
  Truncated { needed: usize, available: usize },
}

#[derive(Debug, Error, Clone, Copy, Eq, PartialEq)]
pub enum MemoryError {
  #[error("access of {width} bytes at {address:#x} is outside memory")]
  OutOfBounds { address: u64, width: usize },
}

#[derive(Debug, Error, Clone, Copy, Eq, PartialEq)]
pub enum ExecutionError {
  #[error("division by zero")]
  DivisionByZero,
  #[error(transparent)]
  Memory(#[from] MemoryError),
}

/// Everything the driving loop can stop on.
#[derive(Debug, Error, Clone, Copy, Eq, PartialEq)]
pub enum VmError {
  #[error("decode failed: {0}")]
  Decode(#[from] DecodeError),
  #[error("execution failed: {0}")]
  Execution(#[from] ExecutionError),
}

impl From<MemoryError> for VmError {
  fn from(error: MemoryError) -> VmError {
    VmError::Execution(ExecutionError::Memory(error))
  }
}
