//! The bit buffer into which an assembler emits its binary output,
//! together with the width-checked numeric writers used to fill it.
//!
//! Every numeric field is emitted least-significant bit first: for a
//! field of width `w` written at index `n`, bit `n + i` of the buffer
//! holds bit `i` of the value.  The patching operation
//! ([`BitBuffer::replace_unsigned`]) and the readers use exactly the
//! same order, so a field can be written with a placeholder and fixed
//! up later.
//!
//! Widths are the widths of the target's instruction fields and have
//! nothing to do with native integer widths.  A width of more than 64
//! bits is allowed; the bits above bit 63 are zero for unsigned values
//! and copies of the sign bit for signed values.
use std::fmt::{self, Display, Formatter, Write};

use super::error::EncodingError;

#[cfg(test)]
mod tests;

/// Returns true when `value` can be represented in an unsigned field
/// of `width` bits.
#[must_use]
pub fn fits_unsigned(value: u64, width: u32) -> bool {
    width >= u64::BITS || value < (1_u64 << width)
}

/// Returns true when `value` lies in the two's-complement range of a
/// field of `width` bits, `-2^(width-1)..=2^(width-1)-1`.
#[must_use]
pub fn fits_signed(value: i64, width: u32) -> bool {
    match width {
        0 => value == 0,
        w if w >= i64::BITS => true,
        w => {
            let limit = 1_i64 << (w - 1);
            (-limit..limit).contains(&value)
        }
    }
}

/// Bit `i` of `value` when it is viewed as a field of unbounded
/// width.  `fill` supplies the bits above bit 63.
fn bit_of(value: u64, i: u32, fill: bool) -> bool {
    if i < u64::BITS {
        (value >> i) & 1 != 0
    } else {
        fill
    }
}

#[derive(Debug, Default, Clone, PartialEq, Eq, Hash)]
pub struct BitBuffer {
    bits: Vec<bool>,
}

impl BitBuffer {
    #[must_use]
    pub fn new() -> BitBuffer {
        BitBuffer::default()
    }

    /// The number of bits emitted so far.  This is the basis of all
    /// address and alignment computations.
    #[must_use]
    pub fn len(&self) -> usize {
        self.bits.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.bits.is_empty()
    }

    #[must_use]
    pub fn get(&self, index: usize) -> Option<bool> {
        self.bits.get(index).copied()
    }

    #[must_use]
    pub fn as_slice(&self) -> &[bool] {
        &self.bits
    }

    pub fn iter(&self) -> impl Iterator<Item = bool> + '_ {
        self.bits.iter().copied()
    }

    pub fn write_bit(&mut self, bit: bool) {
        self.bits.push(bit);
    }

    pub fn write_bits<I: IntoIterator<Item = bool>>(&mut self, bits: I) {
        self.bits.extend(bits);
    }

    /// Overwrite a single, previously emitted, bit.
    ///
    /// # Errors
    ///
    /// Fails if `index` is not less than the current length.
    pub fn set_bit(&mut self, index: usize, bit: bool) -> Result<(), EncodingError> {
        match self.bits.get_mut(index) {
            Some(b) => {
                *b = bit;
                Ok(())
            }
            None => Err(EncodingError::OutOfBounds {
                start: index,
                width: 1,
                len: self.bits.len(),
            }),
        }
    }

    /// Append `width` bits holding `value`.
    ///
    /// # Errors
    ///
    /// Fails (without appending anything) when `value` is not less
    /// than `2^width`.
    pub fn write_unsigned(&mut self, value: u64, width: u32) -> Result<(), EncodingError> {
        if !fits_unsigned(value, width) {
            return Err(EncodingError::UnsignedOutOfRange { value, width });
        }
        self.bits
            .extend((0..width).map(|i| bit_of(value, i, false)));
        Ok(())
    }

    /// Append `width` bits holding `value` reduced modulo `2^width`
    /// (that is, in two's complement).
    ///
    /// # Errors
    ///
    /// Fails (without appending anything) when `value` is outside
    /// `-2^(width-1)..=2^(width-1)-1`.
    pub fn write_signed(&mut self, value: i64, width: u32) -> Result<(), EncodingError> {
        if !fits_signed(value, width) {
            return Err(EncodingError::SignedOutOfRange { value, width });
        }
        let pattern = value as u64;
        let negative = value < 0;
        self.bits
            .extend((0..width).map(|i| bit_of(pattern, i, negative)));
        Ok(())
    }

    /// Overwrite `width` bits starting at `start` with `value`, using
    /// the same bit order as [`BitBuffer::write_unsigned`].
    ///
    /// # Errors
    ///
    /// Fails when the value doesn't fit, or when
    /// `start..start+width` is not entirely inside the buffer.  In
    /// either case the buffer is left unchanged.
    pub fn replace_unsigned(
        &mut self,
        value: u64,
        width: u32,
        start: usize,
    ) -> Result<(), EncodingError> {
        if !fits_unsigned(value, width) {
            return Err(EncodingError::UnsignedOutOfRange { value, width });
        }
        let end = start.checked_add(width as usize);
        let field = match end {
            Some(end) if end <= self.bits.len() => &mut self.bits[start..end],
            _ => {
                return Err(EncodingError::OutOfBounds {
                    start,
                    width,
                    len: self.bits.len(),
                });
            }
        };
        for (i, slot) in (0..width).zip(field.iter_mut()) {
            *slot = bit_of(value, i, false);
        }
        Ok(())
    }

    /// Read back an unsigned field.  Returns `None` if the field is
    /// wider than 64 bits or is not entirely inside the buffer.
    #[must_use]
    pub fn read_unsigned(&self, start: usize, width: u32) -> Option<u64> {
        if width > u64::BITS {
            return None;
        }
        let end = start.checked_add(width as usize)?;
        let field = self.bits.get(start..end)?;
        Some(
            field
                .iter()
                .enumerate()
                .filter(|(_, bit)| **bit)
                .fold(0_u64, |acc, (i, _)| acc | (1 << i)),
        )
    }

    /// Read back a two's-complement field, sign-extending it.
    #[must_use]
    pub fn read_signed(&self, start: usize, width: u32) -> Option<i64> {
        let raw = self.read_unsigned(start, width)?;
        Some(match width {
            0 => 0,
            w if w >= u64::BITS => raw as i64,
            w => {
                let shift = u64::BITS - w;
                ((raw << shift) as i64) >> shift
            }
        })
    }

    /// Append zero bits until the length is a multiple of
    /// `alignment`.  An alignment of 0 or 1 never appends anything.
    pub fn align_to(&mut self, alignment: usize) {
        if alignment > 1 {
            let padding = (alignment - self.bits.len() % alignment) % alignment;
            self.bits.resize(self.bits.len() + padding, false);
        }
    }
}

impl Display for BitBuffer {
    /// Shows the bits in emission order as a string of `0` and `1`.
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        for bit in &self.bits {
            f.write_char(if *bit { '1' } else { '0' })?;
        }
        Ok(())
    }
}

impl FromIterator<bool> for BitBuffer {
    fn from_iter<I: IntoIterator<Item = bool>>(iter: I) -> Self {
        BitBuffer {
            bits: iter.into_iter().collect(),
        }
    }
}
