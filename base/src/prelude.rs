//! The prelude exports the things which are useful in representing
//! assembler output.  Providing this prelude is the main purpose of
//! the base crate.
pub use super::bits::{fits_signed, fits_unsigned, BitBuffer};
pub use super::error::EncodingError;
