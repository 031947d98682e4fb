//! The `base` crate defines the representation of an assembler's
//! binary output: a growable, patchable sequence of bits together
//! with width-checked writers for numeric fields.  The idea is that
//! a disassembler or an output formatter can depend on the base
//! crate without needing the assembler engine itself.

pub mod bits;
pub mod error;
pub mod prelude;

#[test]
fn test_prelude_exports() {
    use prelude::*;
    let mut buf = BitBuffer::new();
    buf.write_unsigned(5, 3).expect("5 fits in 3 bits");
    assert!(fits_unsigned(7, 3));
    assert!(!fits_signed(4, 3));
    assert!(matches!(
        buf.write_unsigned(8, 3),
        Err(EncodingError::UnsignedOutOfRange { .. })
    ));
}
