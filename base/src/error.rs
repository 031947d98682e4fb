//! Basic error reporting.

use std::error::Error;
use std::fmt::{self, Debug, Display, Formatter};

/// Represents a failure to encode a number into (or patch it into) a
/// [`BitBuffer`](crate::bits::BitBuffer).
///
/// These errors carry no source location; the assembler attaches one
/// at the point where the write was attempted.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum EncodingError {
    UnsignedOutOfRange {
        value: u64,
        width: u32,
    },
    SignedOutOfRange {
        value: i64,
        width: u32,
    },
    /// A patch (or single-bit update) would reach beyond the bits
    /// emitted so far.
    OutOfBounds {
        start: usize,
        width: u32,
        len: usize,
    },
}

impl Error for EncodingError {}

impl Display for EncodingError {
    fn fmt(&self, f: &mut Formatter<'_>) -> Result<(), fmt::Error> {
        match self {
            EncodingError::UnsignedOutOfRange { value, width } => {
                write!(
                    f,
                    "value {value} is too large for an unsigned field of {width} bits"
                )
            }
            EncodingError::SignedOutOfRange { value, width } => {
                write!(
                    f,
                    "value {value} does not fit in a signed field of {width} bits"
                )
            }
            EncodingError::OutOfBounds { start, width, len } => {
                write!(
                    f,
                    "bits {start}..{} are outside the {len} bits emitted so far",
                    start + *width as usize
                )
            }
        }
    }
}
