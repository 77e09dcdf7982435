//! The flat, byte-addressed memory region of a machine. Accesses are alignment-agnostic and
//! every multi-byte value is stored little-endian.

use std::convert::TryFrom;
use std::fmt::{Display, Formatter};

use crate::error::MemoryError;

/// Width of a memory access or of an encoded field.
#[derive(Clone, Copy, Eq, PartialEq, Debug, Hash)]
pub enum Width {
  Byte,
  Word,
  Double,
  Quad,
}

impl Width {
  pub fn bytes(&self) -> usize {
    match self {
      Width::Byte   => 1,
      Width::Word   => 2,
      Width::Double => 4,
      Width::Quad   => 8,
    }
  }

  pub fn bits(&self) -> u32 {
    (self.bytes() * 8) as u32
  }

  /// The operation width of a generic instruction.
  pub fn natural(is_64op: bool) -> Width {
    match is_64op {
      true  => Width::Quad,
      false => Width::Double,
    }
  }

  /// Keeps only the low `self.bits()` bits of `value`.
  pub fn truncate(&self, value: u64) -> u64 {
    match self {
      Width::Quad => value,
      _           => value & ((1u64 << self.bits()) - 1),
    }
  }

  /// Interprets the low `self.bits()` bits of `value` as a two's complement number.
  pub fn sign_extend(&self, value: u64) -> i64 {
    let shift = 64 - self.bits();
    ((value << shift) as i64) >> shift
  }
}

impl Display for Width {
  fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
    write!(f, "{}", self.bits())
  }
}


pub struct Memory {
  bytes: Vec<u8>,
}

impl Memory {

  /// A zero-filled region of `size` bytes.
  pub fn new(size: usize) -> Memory {
    Memory { bytes: vec![0; size] }
  }

  /// Takes ownership of a fully formed image produced by a loader.
  pub fn from_image(bytes: Vec<u8>) -> Memory {
    Memory { bytes }
  }

  pub fn len(&self) -> usize {
    self.bytes.len()
  }

  pub fn is_empty(&self) -> bool {
    self.bytes.is_empty()
  }

  /// Returns the byte range `[address, address + length)` or `OutOfBounds`.
  fn range(&self, address: u64, length: usize) -> Result<std::ops::Range<usize>, MemoryError> {
    let out_of_bounds = MemoryError::OutOfBounds { address, width: length };
    let start = usize::try_from(address).map_err(|_| out_of_bounds)?;
    let end   = start.checked_add(length).ok_or(out_of_bounds)?;

    match end <= self.bytes.len() {
      true  => Ok(start..end),
      false => Err(out_of_bounds),
    }
  }

  pub fn read(&self, address: u64, width: Width) -> Result<u64, MemoryError> {
    let range     = self.range(address, width.bytes())?;
    let mut value = [0u8; 8];
    value[..width.bytes()].copy_from_slice(&self.bytes[range]);
    Ok(u64::from_le_bytes(value))
  }

  /// Stores the low `width` bytes of `value`.
  pub fn write(&mut self, address: u64, width: Width, value: u64) -> Result<(), MemoryError> {
    let range = self.range(address, width.bytes())?;
    self.bytes[range].copy_from_slice(&value.to_le_bytes()[..width.bytes()]);
    Ok(())
  }

  pub fn read8 (&self, address: u64) -> Result<u8,  MemoryError> { self.read(address, Width::Byte  ).map(|v| v as u8 ) }
  pub fn read16(&self, address: u64) -> Result<u16, MemoryError> { self.read(address, Width::Word  ).map(|v| v as u16) }
  pub fn read32(&self, address: u64) -> Result<u32, MemoryError> { self.read(address, Width::Double).map(|v| v as u32) }
  pub fn read64(&self, address: u64) -> Result<u64, MemoryError> { self.read(address, Width::Quad  ) }

  pub fn write8 (&mut self, address: u64, value: u8 ) -> Result<(), MemoryError> { self.write(address, Width::Byte,   value as u64) }
  pub fn write16(&mut self, address: u64, value: u16) -> Result<(), MemoryError> { self.write(address, Width::Word,   value as u64) }
  pub fn write32(&mut self, address: u64, value: u32) -> Result<(), MemoryError> { self.write(address, Width::Double, value as u64) }
  pub fn write64(&mut self, address: u64, value: u64) -> Result<(), MemoryError> { self.write(address, Width::Quad,   value) }

  /// Copies `bytes` into memory starting at `address`.
  pub fn load(&mut self, address: u64, bytes: &[u8]) -> Result<(), MemoryError> {
    let range = self.range(address, bytes.len())?;
    self.bytes[range].copy_from_slice(bytes);
    Ok(())
  }

  /// Everything from `address` to the end of memory; the instruction fetch window.
  pub fn slice_from(&self, address: u64) -> Result<&[u8], MemoryError> {
    let range = self.range(address, 0)?;
    Ok(&self.bytes[range.start..])
  }
}
