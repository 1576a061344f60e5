//! LEB128 varint codec. Decoding rejects overlong encodings and
//! non-zero unused bits in the final group; unsigned encoding always
//! produces the minimal byte count.

use num_traits::{NumCast, PrimInt, Signed, Unsigned};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LebError {
    /// Input ended while a continuation bit was set.
    Truncated,
    /// More groups than the width allows, or unused bits set.
    Overflow,
}

fn max_bytes(bits: u32) -> usize {
    ((bits + 6) / 7) as usize
}

/// Decode an unsigned value of the given bit width out of `input`.
/// Returns the value and the number of bytes consumed.
pub fn decode_unsigned_bits(input: &[u8], bits: u32) -> Result<(u64, usize), LebError> {
    let max = max_bytes(bits);
    let mut value = 0u64;
    for i in 0..max {
        let byte = *input.get(i).ok_or(LebError::Truncated)?;
        let group = byte & 0x7F;
        let shift = (i as u32) * 7;
        if i + 1 == max {
            let unused = 7 - (bits - shift);
            if unused > 0 && group >> (7 - unused) != 0 {
                return Err(LebError::Overflow);
            }
        }
        value |= <u64 as From<u8>>::from(group) << shift;
        if byte & 0x80 == 0 {
            return Ok((value, i + 1));
        }
    }
    Err(LebError::Overflow)
}

/// Decode a signed value of the given bit width. The final group's
/// unused bits must replicate the sign bit.
pub fn decode_signed_bits(input: &[u8], bits: u32) -> Result<(i64, usize), LebError> {
    let max = max_bytes(bits);
    let mut value = 0i64;
    let mut shift = 0u32;
    for i in 0..max {
        let byte = *input.get(i).ok_or(LebError::Truncated)?;
        let group = byte & 0x7F;
        if i + 1 == max {
            let used = bits - shift;
            if used < 7 {
                // Sign-extending the low `used` bits must give back
                // the whole group.
                let extended = ((group << (8 - used)) as i8) >> (8 - used);
                if (extended as u8) & 0x7F != group {
                    return Err(LebError::Overflow);
                }
            }
        }
        value |= <i64 as From<u8>>::from(group) << shift;
        shift += 7;
        if byte & 0x80 == 0 {
            if shift < 64 && byte & 0x40 != 0 {
                value |= -1i64 << shift;
            }
            return Ok((value, i + 1));
        }
    }
    Err(LebError::Overflow)
}

pub fn decode_unsigned<T>(input: &[u8]) -> Result<(T, usize), LebError>
where
    T: PrimInt + Unsigned + NumCast,
{
    let bits = T::zero().count_zeros();
    let (value, len) = decode_unsigned_bits(input, bits)?;
    let value = T::from(value).ok_or(LebError::Overflow)?;
    Ok((value, len))
}

pub fn decode_signed<T>(input: &[u8]) -> Result<(T, usize), LebError>
where
    T: PrimInt + Signed + NumCast,
{
    let bits = T::zero().count_zeros();
    let (value, len) = decode_signed_bits(input, bits)?;
    let value = T::from(value).ok_or(LebError::Overflow)?;
    Ok((value, len))
}

pub fn encode_unsigned_u64(mut value: u64, out: &mut Vec<u8>) {
    loop {
        let byte = (value & 0x7F) as u8;
        value >>= 7;
        if value == 0 {
            out.push(byte);
            return;
        }
        out.push(byte | 0x80);
    }
}

pub fn encode_signed_i64(mut value: i64, out: &mut Vec<u8>) {
    loop {
        let byte = (value & 0x7F) as u8;
        value >>= 7;
        let done = (value == 0 && byte & 0x40 == 0) || (value == -1 && byte & 0x40 != 0);
        if done {
            out.push(byte);
            return;
        }
        out.push(byte | 0x80);
    }
}

pub fn encode_unsigned<T>(value: T, out: &mut Vec<u8>)
where
    T: PrimInt + Unsigned,
{
    encode_unsigned_u64(value.to_u64().unwrap_or_default(), out);
}

pub fn encode_signed<T>(value: T, out: &mut Vec<u8>)
where
    T: PrimInt + Signed,
{
    encode_signed_i64(value.to_i64().unwrap_or_default(), out);
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case(0u32)]
    #[case(1)]
    #[case(127)]
    #[case(128)]
    #[case(624485)]
    #[case(u32::MAX - 1)]
    #[case(u32::MAX)]
    fn unsigned_round_trip(#[case] value: u32) {
        let mut out = Vec::new();
        encode_unsigned(value, &mut out);
        assert_eq!(decode_unsigned::<u32>(&out), Ok((value, out.len())));
    }

    #[rstest]
    #[case(0i32)]
    #[case(-1)]
    #[case(63)]
    #[case(64)]
    #[case(-64)]
    #[case(-65)]
    #[case(i32::MIN)]
    #[case(i32::MAX)]
    fn signed_round_trip(#[case] value: i32) {
        let mut out = Vec::new();
        encode_signed(value, &mut out);
        assert_eq!(decode_signed::<i32>(&out), Ok((value, out.len())));
    }

    #[test]
    fn unsigned_encoding_is_minimal() {
        for value in [0u32, 127, 128, 16383, 16384, u32::MAX] {
            let mut out = Vec::new();
            encode_unsigned(value, &mut out);
            let expected = match value {
                0..=0x7F => 1,
                0x80..=0x3FFF => 2,
                0x4000..=0x1F_FFFF => 3,
                0x20_0000..=0xFFF_FFFF => 4,
                _ => 5,
            };
            assert_eq!(out.len(), expected, "value {value}");
        }
    }

    #[test]
    fn rejects_unused_high_bits() {
        // u32 in 5 groups leaves 4 usable bits in the last; 0x10 sets
        // an unused one.
        let bytes = [0x80, 0x80, 0x80, 0x80, 0x10];
        assert_eq!(decode_unsigned::<u32>(&bytes), Err(LebError::Overflow));
        // All-zero payload in the unused bits is fine.
        let bytes = [0xFF, 0xFF, 0xFF, 0xFF, 0x0F];
        assert_eq!(decode_unsigned::<u32>(&bytes), Ok((u32::MAX, 5)));
    }

    #[test]
    fn rejects_overlong_and_truncated() {
        let overlong = [0x80, 0x80, 0x80, 0x80, 0x80, 0x00];
        assert_eq!(decode_unsigned::<u32>(&overlong), Err(LebError::Overflow));
        let truncated = [0x80, 0x80];
        assert_eq!(decode_unsigned::<u32>(&truncated), Err(LebError::Truncated));
    }

    #[test]
    fn signed_final_group_sign_bits() {
        // -1 as s32 in the maximal 5-byte form would need the unused
        // bits to be ones; a zero there is an overflow.
        let bad = [0xFF, 0xFF, 0xFF, 0xFF, 0x0F];
        assert_eq!(decode_signed::<i32>(&bad), Err(LebError::Overflow));
        let good = [0xFF, 0xFF, 0xFF, 0xFF, 0x7F];
        assert_eq!(decode_signed::<i32>(&good), Ok((-1, 5)));
    }

    #[test]
    fn s33_block_type_range() {
        // Heap/block indexes are signed 33-bit.
        let bytes = [0xC0, 0x00];
        assert_eq!(decode_signed_bits(&bytes, 33), Ok((64, 2)));
        let bytes = [0x70];
        assert_eq!(decode_signed_bits(&bytes, 33), Ok((-16, 1)));
    }
}
