use super::super::error::EncodingError;
use super::*;

fn bits_of(s: &str) -> Vec<bool> {
    s.chars()
        .map(|ch| match ch {
            '0' => false,
            '1' => true,
            _ => panic!("test data should only contain 0 and 1, not {ch:?}"),
        })
        .collect()
}

#[test]
fn test_write_bit_appends() {
    let mut buf = BitBuffer::new();
    assert!(buf.is_empty());
    buf.write_bit(true);
    buf.write_bit(false);
    buf.write_bits([true, true]);
    assert_eq!(buf.len(), 4);
    assert_eq!(buf.as_slice(), bits_of("1011").as_slice());
}

#[test]
fn test_write_unsigned_is_lsb_first() {
    let mut buf = BitBuffer::new();
    buf.write_unsigned(0b110, 4).expect("6 fits in 4 bits");
    assert_eq!(buf.to_string(), "0110");
}

#[test]
fn test_write_unsigned_rejects_too_large() {
    let mut buf = BitBuffer::new();
    assert_eq!(
        buf.write_unsigned(16, 4),
        Err(EncodingError::UnsignedOutOfRange {
            value: 16,
            width: 4
        })
    );
    // A failed write emits nothing.
    assert!(buf.is_empty());
}

#[test]
fn test_write_unsigned_zero_width() {
    let mut buf = BitBuffer::new();
    assert_eq!(buf.write_unsigned(0, 0), Ok(()));
    assert!(buf.write_unsigned(1, 0).is_err());
    assert!(buf.is_empty());
}

#[test]
fn test_write_unsigned_wider_than_u64() {
    let mut buf = BitBuffer::new();
    buf.write_unsigned(u64::MAX, 70).expect("any u64 fits in 70 bits");
    assert_eq!(buf.len(), 70);
    assert_eq!(buf.read_unsigned(0, 64), Some(u64::MAX));
    assert!(buf.iter().skip(64).all(|bit| !bit));
}

#[test]
fn test_write_signed_twos_complement() {
    let mut buf = BitBuffer::new();
    buf.write_signed(-1, 3).expect("-1 fits in 3 bits");
    buf.write_signed(-4, 3).expect("-4 fits in 3 bits");
    buf.write_signed(3, 3).expect("3 fits in 3 bits");
    assert_eq!(buf.to_string(), "111001110");
}

#[test]
fn test_write_signed_range_limits() {
    let mut buf = BitBuffer::new();
    assert!(buf.write_signed(4, 3).is_err());
    assert!(buf.write_signed(-5, 3).is_err());
    assert!(buf.write_signed(i64::MIN, 64).is_ok());
    assert!(buf.write_signed(i64::MAX, 64).is_ok());
    assert_eq!(buf.len(), 128);
}

#[test]
fn test_write_signed_sign_extends_beyond_64_bits() {
    let mut buf = BitBuffer::new();
    buf.write_signed(-2, 66).expect("-2 fits in 66 bits");
    assert_eq!(buf.len(), 66);
    assert_eq!(buf.get(0), Some(false));
    assert!(buf.iter().skip(1).all(|bit| bit));
}

#[test]
fn test_replace_unsigned_patches_in_place() {
    let mut buf: BitBuffer = bits_of("1111111111").into_iter().collect();
    buf.replace_unsigned(0b0010, 4, 3).expect("patch is in range");
    assert_eq!(buf.to_string(), "1110100111");
    assert_eq!(buf.read_unsigned(3, 4), Some(0b0010));
}

#[test]
fn test_replace_unsigned_at_exact_end() {
    let mut buf: BitBuffer = bits_of("0000").into_iter().collect();
    assert_eq!(buf.replace_unsigned(3, 2, 2), Ok(()));
    assert_eq!(buf.to_string(), "0011");
}

#[test]
fn test_replace_unsigned_past_end() {
    let mut buf: BitBuffer = bits_of("0000").into_iter().collect();
    assert_eq!(
        buf.replace_unsigned(1, 2, 3),
        Err(EncodingError::OutOfBounds {
            start: 3,
            width: 2,
            len: 4
        })
    );
    assert!(buf.replace_unsigned(1, 2, usize::MAX).is_err());
    assert_eq!(buf.to_string(), "0000");
}

#[test]
fn test_replace_unsigned_checks_range_first() {
    let mut buf: BitBuffer = bits_of("0000").into_iter().collect();
    assert!(matches!(
        buf.replace_unsigned(4, 2, 0),
        Err(EncodingError::UnsignedOutOfRange { .. })
    ));
}

#[test]
fn test_set_bit() {
    let mut buf: BitBuffer = bits_of("000").into_iter().collect();
    buf.set_bit(1, true).expect("index 1 exists");
    assert_eq!(buf.to_string(), "010");
    assert!(buf.set_bit(3, true).is_err());
}

#[test]
fn test_align_to() {
    let mut buf = BitBuffer::new();
    buf.align_to(8);
    assert!(buf.is_empty());
    buf.write_bits([true, true, true]);
    buf.align_to(8);
    assert_eq!(buf.to_string(), "11100000");
    buf.align_to(8);
    assert_eq!(buf.len(), 8);
}

#[test]
fn test_align_to_one_is_noop() {
    let mut buf = BitBuffer::new();
    buf.write_bit(true);
    buf.align_to(1);
    buf.align_to(0);
    assert_eq!(buf.len(), 1);
}

#[test]
fn test_read_outside_buffer() {
    let buf: BitBuffer = bits_of("101").into_iter().collect();
    assert_eq!(buf.read_unsigned(0, 3), Some(0b101));
    assert_eq!(buf.read_unsigned(1, 3), None);
    assert_eq!(buf.read_signed(0, 3), Some(-3));
    assert_eq!(buf.read_unsigned(0, 65), None);
}

mod codec_proptests {
    use super::super::{fits_signed, fits_unsigned, BitBuffer};
    use test_strategy::{proptest, Arbitrary};

    #[derive(Debug, Arbitrary)]
    struct UnsignedField {
        #[strategy(1..=64u32)]
        width: u32,
        #[strategy(0..=(u64::MAX >> (64 - #width)))]
        value: u64,
    }

    #[derive(Debug, Arbitrary)]
    struct SignedField {
        #[strategy(1..=64u32)]
        width: u32,
        #[strategy((i64::MIN >> (64 - #width))..=(i64::MAX >> (64 - #width)))]
        value: i64,
    }

    #[derive(Debug, Arbitrary)]
    struct Patch {
        #[strategy(0..200usize)]
        prefix: usize,
        field: UnsignedField,
        #[strategy(0..200usize)]
        suffix: usize,
    }

    #[proptest]
    fn unsigned_round_trip(input: UnsignedField) {
        let mut buf = BitBuffer::new();
        buf.write_unsigned(input.value, input.width).unwrap();
        assert_eq!(buf.len(), input.width as usize);
        assert_eq!(buf.read_unsigned(0, input.width), Some(input.value));
    }

    #[proptest]
    fn signed_round_trip(input: SignedField) {
        let mut buf = BitBuffer::new();
        buf.write_signed(input.value, input.width).unwrap();
        assert_eq!(buf.len(), input.width as usize);
        assert_eq!(buf.read_signed(0, input.width), Some(input.value));
    }

    #[proptest]
    fn first_value_out_of_range_is_rejected(#[strategy(1..64u32)] width: u32) {
        let mut buf = BitBuffer::new();
        assert!(!fits_unsigned(1 << width, width));
        assert!(buf.write_unsigned(1 << width, width).is_err());
        assert!(!fits_signed(1 << (width - 1), width));
        assert!(buf.write_signed(1 << (width - 1), width).is_err());
        assert!(buf.is_empty());
    }

    #[proptest]
    fn replace_only_touches_the_field(input: Patch) {
        let width = input.field.width as usize;
        let mut buf = BitBuffer::new();
        // Alternating bits make any stray write visible.
        buf.write_bits((0..input.prefix + width + input.suffix).map(|i| i % 2 == 0));
        let before = buf.clone();
        buf.replace_unsigned(input.field.value, input.field.width, input.prefix)
            .unwrap();
        assert_eq!(buf.len(), before.len());
        assert_eq!(
            buf.read_unsigned(input.prefix, input.field.width),
            Some(input.field.value)
        );
        for i in (0..input.prefix).chain(input.prefix + width..buf.len()) {
            assert_eq!(buf.get(i), before.get(i), "bit {i} changed");
        }
    }

    #[proptest]
    fn alignment_is_idempotent(#[strategy(0..100usize)] len: usize, #[strategy(1..40usize)] alignment: usize) {
        let mut buf = BitBuffer::new();
        buf.write_bits(std::iter::repeat(true).take(len));
        buf.align_to(alignment);
        let once = buf.len();
        assert_eq!(once % alignment, 0);
        assert!(once >= len && once < len + alignment);
        buf.align_to(alignment);
        assert_eq!(buf.len(), once);
    }
}
