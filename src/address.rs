//! Natural indexes: the encoded displacements carried by indirect operands, with some
//! convenience functions for applying them to a base address.
//!
//! An index of `B` bits is laid out as
//! ```text
//!   [sign:1][w:3][constant units][natural units: w * B/8 bits]
//! ```
//! and denotes the byte displacement `±(constant + natural * NATURAL_SIZE)`. Expressing part
//! of an offset in natural units keeps the same bytecode valid whatever the machine word is.

use std::fmt::{Display, Formatter};

use crate::memory::Width;

/// Size in bytes of one natural unit, the machine word.
pub const NATURAL_SIZE: u64 = 8;

#[derive(Copy, Clone, Eq, PartialEq, Hash, Debug)]
pub struct NaturalIndex {
  pub negative : bool,
  pub natural  : u64,
  pub constant : u64,
}

impl NaturalIndex {

  /// Splits the low `width` bytes of `raw` into its sign, natural, and constant parts.
  pub fn decode(raw: u64, width: Width) -> NaturalIndex {
    let bits  = width.bits();
    let raw   = width.truncate(raw);
    let w     = ((raw >> (bits - 4)) & 0x7) as u32;
    // Only `bits - 4` bits remain below the sign and `w` fields.
    let natural_bits  = (w * bits / 8).min(bits - 4);
    let constant_bits = bits - 4 - natural_bits;

    NaturalIndex {
      negative : (raw >> (bits - 1)) & 1 == 1,
      natural  : raw & low_mask(natural_bits),
      constant : (raw >> natural_bits) & low_mask(constant_bits),
    }
  }

  /// The signed byte displacement this index denotes.
  pub fn offset(&self) -> i64 {
    let magnitude = self.constant.wrapping_add(self.natural.wrapping_mul(NATURAL_SIZE)) as i64;
    match self.negative {
      true  => magnitude.wrapping_neg(),
      false => magnitude
    }
  }

  /// Applies the displacement to `base`, wrapping around the address space.
  pub fn apply(&self, base: u64) -> u64 {
    base.wrapping_add(self.offset() as u64)
  }
}

fn low_mask(bits: u32) -> u64 {
  match bits {
    0           => 0,
    b if b >= 64 => u64::MAX,
    b           => (1u64 << b) - 1
  }
}

impl Display for NaturalIndex {
  fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
    let sign = match self.negative {
      true  => '-',
      false => '+'
    };
    write!(f, "({}{},{}{})", sign, self.natural, sign, self.constant)
  }
}


#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn sixteen_bit_natural_units(){
    // w = 2: four bits of natural units, two of them, no constant.
    let index = NaturalIndex::decode(0x2002, Width::Word);
    assert_eq!(index, NaturalIndex { negative: false, natural: 2, constant: 0 });
    assert_eq!(index.offset(), 0x10);
    assert_eq!(index.apply(0x20), 0x30);
  }

  #[test]
  fn constant_only(){
    let index = NaturalIndex::decode(0x0010, Width::Word);
    assert_eq!(index.natural, 0);
    assert_eq!(index.constant, 0x10);
    assert_eq!(index.offset(), 0x10);
  }

  #[test]
  fn negative_index(){
    // sign set, w = 4: eight natural bits.
    let index = NaturalIndex::decode(0xcdef, Width::Word);
    assert!(index.negative);
    assert_eq!(index.natural, 0xef);
    assert_eq!(index.constant, 0xd);
    assert_eq!(index.offset(), -(0xd + 0xef * 8));
    assert_eq!(index.apply(0x1000), 0x1000 - (0xd + 0xef * 8));
  }

  #[test]
  fn wider_indexes(){
    // 32-bit: w = 1 gives four natural bits.
    let index = NaturalIndex::decode(0x1000_0123, Width::Double);
    assert_eq!(index.natural, 0x3);
    assert_eq!(index.constant, 0x12);
    assert_eq!(index.offset(), 0x12 + 3 * 8);

    // 64-bit: w = 1 gives eight natural bits.
    let index = NaturalIndex::decode(0x1000_0000_0000_0402, Width::Quad);
    assert_eq!(index.natural, 0x2);
    assert_eq!(index.constant, 0x4);
    assert_eq!(index.offset(), 0x14);
  }

  #[test]
  fn oversized_natural_field(){
    // w = 7 asks for fourteen natural bits of a sixteen bit index; only twelve exist.
    let index = NaturalIndex::decode(0x7fff, Width::Word);
    assert_eq!(index.natural, 0xfff);
    assert_eq!(index.constant, 0);
  }

  #[test]
  fn display(){
    assert_eq!(format!("{}", NaturalIndex::decode(0x2002, Width::Word)), "(+2,+0)");
  }
}
