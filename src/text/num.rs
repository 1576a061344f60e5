//! Numeric literal conversion: range-checked integers and exact
//! IEEE-754 bit patterns for decimal and hex float forms, including
//! `nan:0x…` payloads. The decimal path leans on the standard
//! library's correctly rounded parser.

use crate::text::token::{Base, LiteralInfo, LiteralKind, Sign};

fn strip(text: &str) -> String {
    text.chars().filter(|c| *c != '_').collect()
}

fn digits_value(digits: &str, base: Base) -> Option<u64> {
    let radix = match base {
        Base::Decimal => 10,
        Base::Hex => 16,
    };
    let mut value: u64 = 0;
    for c in digits.chars() {
        let d = c.to_digit(radix)? as u64;
        value = value.checked_mul(radix as u64)?.checked_add(d)?;
    }
    Some(value)
}

/// Split off the sign and the `0x` prefix, leaving bare digits.
fn literal_body(info: LiteralInfo, text: &str) -> &str {
    let body = match info.sign {
        Sign::None => text,
        _ => &text[1..],
    };
    match info.base {
        Base::Hex => body
            .strip_prefix("0x")
            .or_else(|| body.strip_prefix("0X"))
            .unwrap_or(body),
        Base::Decimal => body,
    }
}

/// Unsigned integer in `0..=max`.
pub fn parse_unsigned(info: LiteralInfo, text: &str, max: u64) -> Option<u64> {
    if info.sign == Sign::Minus || info.kind != LiteralKind::Normal {
        return None;
    }
    let digits = strip(literal_body(info, text));
    let value = digits_value(&digits, info.base)?;
    if value > max {
        return None;
    }
    Some(value)
}

pub fn parse_u32(info: LiteralInfo, text: &str) -> Option<u32> {
    parse_unsigned(info, text, u64::from(u32::MAX)).map(|v| v as u32)
}

pub fn parse_u8(info: LiteralInfo, text: &str) -> Option<u8> {
    parse_unsigned(info, text, u64::from(u8::MAX)).map(|v| v as u8)
}

/// Integer literal for an N-bit target: unsigned spellings accept
/// `0..2^N-1`, signed spellings accept `-2^(N-1)..2^(N-1)-1`; both
/// land in the same two's-complement bit pattern.
fn parse_int(info: LiteralInfo, text: &str, bits: u32) -> Option<u64> {
    if info.kind != LiteralKind::Normal {
        return None;
    }
    let digits = strip(literal_body(info, text));
    let magnitude = digits_value(&digits, info.base)?;
    let unsigned_max = if bits == 64 { u64::MAX } else { (1u64 << bits) - 1 };
    let signed_min_magnitude = 1u64 << (bits - 1);
    match info.sign {
        Sign::Minus => {
            if magnitude > signed_min_magnitude {
                return None;
            }
            Some(magnitude.wrapping_neg() & unsigned_max)
        }
        _ => {
            if magnitude > unsigned_max {
                return None;
            }
            Some(magnitude)
        }
    }
}

/// Two's-complement bit pattern of an N-bit integer literal, for the
/// lane values of `v128.const`.
pub fn parse_int_bits(info: LiteralInfo, text: &str, bits: u32) -> Option<u64> {
    parse_int(info, text, bits)
}

/// Bare digit text with an optional `0x` prefix, as found after
/// `offset=`/`align=`.
pub fn parse_nat_text(text: &str, max: u64) -> Option<u64> {
    let (base, digits) = match text.strip_prefix("0x").or_else(|| text.strip_prefix("0X")) {
        Some(rest) => (Base::Hex, rest),
        None => (Base::Decimal, text),
    };
    let digits = strip(digits);
    if digits.is_empty() {
        return None;
    }
    let value = digits_value(&digits, base)?;
    if value > max {
        return None;
    }
    Some(value)
}

pub fn parse_i32(info: LiteralInfo, text: &str) -> Option<i32> {
    parse_int(info, text, 32).map(|v| v as u32 as i32)
}

pub fn parse_i64(info: LiteralInfo, text: &str) -> Option<i64> {
    parse_int(info, text, 64).map(|v| v as i64)
}

// ---------------------------------------------------------------------------
// Floats.

struct FloatFormat {
    mantissa_bits: u32,
    exponent_bits: u32,
}

const F32_FORMAT: FloatFormat = FloatFormat { mantissa_bits: 23, exponent_bits: 8 };
const F64_FORMAT: FloatFormat = FloatFormat { mantissa_bits: 52, exponent_bits: 11 };

impl FloatFormat {
    fn bias(&self) -> i64 {
        (1i64 << (self.exponent_bits - 1)) - 1
    }

    fn max_biased(&self) -> i64 {
        (1i64 << self.exponent_bits) - 1
    }

    fn mantissa_mask(&self) -> u64 {
        (1u64 << self.mantissa_bits) - 1
    }

    fn sign_bit(&self) -> u64 {
        1u64 << (self.mantissa_bits + self.exponent_bits)
    }

    fn infinity(&self, negative: bool) -> u64 {
        let bits = (self.max_biased() as u64) << self.mantissa_bits;
        if negative { bits | self.sign_bit() } else { bits }
    }

    fn nan(&self, negative: bool, payload: u64) -> u64 {
        let bits = ((self.max_biased() as u64) << self.mantissa_bits) | payload;
        if negative { bits | self.sign_bit() } else { bits }
    }
}

/// Parse `h.hhhh` hex digits plus a binary exponent into bits with a
/// single round-to-nearest-even step. Returns `None` when the value
/// overflows to infinity, which the text format rejects.
fn parse_hex_float(format: &FloatFormat, negative: bool, body: &str) -> Option<u64> {
    let (mantissa_text, exponent) = match body.split_once(|c| c == 'p' || c == 'P') {
        Some((m, e)) => {
            let e = strip(e);
            (m, e.parse::<i64>().ok()?)
        }
        None => (body, 0),
    };
    let (int_text, frac_text) = match mantissa_text.split_once('.') {
        Some((i, f)) => (i, f),
        None => (mantissa_text, ""),
    };
    let int_digits = strip(int_text);
    let frac_digits = strip(frac_text);
    if int_digits.is_empty() && frac_digits.is_empty() {
        return None;
    }

    // value = 0.D * 16^point * 2^exponent, D the concatenated digits.
    let mut digits: Vec<u32> = Vec::new();
    for c in int_digits.chars().chain(frac_digits.chars()) {
        digits.push(c.to_digit(16)?);
    }
    let point = int_digits.len() as i64;

    let first_nonzero = match digits.iter().position(|d| *d != 0) {
        Some(i) => i as i64,
        None => {
            let sign = if negative { format.sign_bit() } else { 0 };
            return Some(sign);
        }
    };

    // Accumulate enough digits for the mantissa plus rounding slack;
    // everything beyond feeds the sticky bit.
    const MAX_DIGITS: usize = 30;
    let mut significand: u128 = 0;
    let mut used = 0i64;
    let mut sticky = false;
    for &d in &digits[first_nonzero as usize..] {
        if (used as usize) < MAX_DIGITS {
            significand = significand * 16 + u128::from(d);
            used += 1;
        } else if d != 0 {
            sticky = true;
        }
    }

    // value = significand * 2^e2
    let mut e2: i64 = exponent + 4 * (point - first_nonzero - used);

    let sig_bits = 128 - significand.leading_zeros() as i64;
    let want_bits = i64::from(format.mantissa_bits) + 1;
    let mut rounded = significand;
    if sig_bits > want_bits {
        let shift = (sig_bits - want_bits) as u32;
        let dropped = rounded & ((1u128 << shift) - 1);
        rounded >>= shift;
        e2 += i64::from(shift);
        let half = 1u128 << (shift - 1);
        let round_up = dropped > half
            || (dropped == half && (sticky || rounded & 1 == 1));
        if round_up {
            rounded += 1;
            if rounded >> want_bits != 0 {
                rounded >>= 1;
                e2 += 1;
            }
        }
    } else {
        rounded <<= (want_bits - sig_bits) as u32;
        e2 -= want_bits - sig_bits;
    }

    // rounded = 1.f * 2^(mantissa_bits), value = rounded * 2^e2.
    let unbiased = e2 + i64::from(format.mantissa_bits);
    let biased = unbiased + format.bias();
    if biased >= format.max_biased() {
        return None;
    }
    let sign = if negative { format.sign_bit() } else { 0 };
    if biased <= 0 {
        // Subnormal: shift the hidden bit into the mantissa field. A
        // carry out of the rounding lands exactly on the smallest
        // normal, which the bit layout already encodes.
        let shift = (1 - biased) as u32;
        if shift > format.mantissa_bits + 1 {
            return Some(sign);
        }
        let dropped = rounded & ((1u128 << shift) - 1);
        let mut sub = rounded >> shift;
        let half = 1u128 << (shift - 1);
        if dropped > half || (dropped == half && (sticky || sub & 1 == 1)) {
            sub += 1;
        }
        return Some(sub as u64 | sign);
    }
    let bits =
        ((biased as u64) << format.mantissa_bits) | ((rounded as u64) & format.mantissa_mask());
    Some(bits | sign)
}

fn float_bits(format: &FloatFormat, info: LiteralInfo, text: &str) -> Option<u64> {
    let negative = info.sign == Sign::Minus;
    match info.kind {
        LiteralKind::Inf => Some(format.infinity(negative)),
        LiteralKind::Nan => {
            Some(format.nan(negative, 1u64 << (format.mantissa_bits - 1)))
        }
        LiteralKind::NanPayload => {
            let body = literal_body(info, text);
            let payload_text = strip(body.strip_prefix("nan:0x")?);
            let payload = u64::from_str_radix(&payload_text, 16).ok()?;
            if payload == 0 || payload > format.mantissa_mask() {
                return None;
            }
            Some(format.nan(negative, payload))
        }
        LiteralKind::Normal => {
            let body = literal_body(info, text);
            match info.base {
                Base::Hex => parse_hex_float(format, negative, body),
                Base::Decimal => None, // handled per width below
            }
        }
    }
}

fn normalize_decimal(text: &str) -> String {
    let mut out = strip(text);
    // The text grammar allows a bare trailing point and `1.e5`, which
    // the standard parser does not.
    if let Some(pos) = out.find('.') {
        let after = out.as_bytes().get(pos + 1).copied();
        if after.is_none() || matches!(after, Some(b'e' | b'E')) {
            out.insert(pos + 1, '0');
        }
    }
    out
}

pub fn parse_f32(info: LiteralInfo, text: &str) -> Option<f32> {
    if let Some(bits) = float_bits(&F32_FORMAT, info, text) {
        return Some(f32::from_bits(bits as u32));
    }
    if info.kind == LiteralKind::Normal && info.base == Base::Decimal {
        let value: f32 = normalize_decimal(text).parse().ok()?;
        if value.is_infinite() {
            return None;
        }
        return Some(value);
    }
    None
}

pub fn parse_f64(info: LiteralInfo, text: &str) -> Option<f64> {
    if let Some(bits) = float_bits(&F64_FORMAT, info, text) {
        return Some(f64::from_bits(bits));
    }
    if info.kind == LiteralKind::Normal && info.base == Base::Decimal {
        let value: f64 = normalize_decimal(text).parse().ok()?;
        if value.is_infinite() {
            return None;
        }
        return Some(value);
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    fn lit(sign: Sign, base: Base, kind: LiteralKind) -> LiteralInfo {
        LiteralInfo { sign, base, has_underscores: false, kind }
    }

    fn normal(base: Base) -> LiteralInfo {
        lit(Sign::None, base, LiteralKind::Normal)
    }

    #[test]
    fn integer_ranges() {
        assert_eq!(parse_i32(normal(Base::Decimal), "42"), Some(42));
        assert_eq!(parse_i32(normal(Base::Decimal), "4294967295"), Some(-1));
        assert_eq!(parse_i32(normal(Base::Decimal), "4294967296"), None);
        let minus = lit(Sign::Minus, Base::Decimal, LiteralKind::Normal);
        assert_eq!(parse_i32(minus, "-2147483648"), Some(i32::MIN));
        assert_eq!(parse_i32(minus, "-2147483649"), None);
        assert_eq!(parse_i32(normal(Base::Hex), "0x2A"), Some(42));
        let under = LiteralInfo {
            has_underscores: true,
            ..normal(Base::Decimal)
        };
        assert_eq!(parse_i64(under, "1_000_000"), Some(1_000_000));
    }

    #[test]
    fn hex_floats() {
        assert_eq!(parse_f64(normal(Base::Hex), "0x1p0"), Some(1.0));
        assert_eq!(parse_f64(normal(Base::Hex), "0x1.8p1"), Some(3.0));
        assert_eq!(parse_f64(normal(Base::Hex), "0x1p-1"), Some(0.5));
        assert_eq!(parse_f64(normal(Base::Hex), "0xA.8p0"), Some(10.5));
        assert_eq!(parse_f32(normal(Base::Hex), "0x1.000002p0"), Some(f32::from_bits(0x3F80_0001)));
        let minus = lit(Sign::Minus, Base::Hex, LiteralKind::Normal);
        assert_eq!(parse_f64(minus, "-0x1p2"), Some(-4.0));
    }

    #[test]
    fn nan_and_inf_forms() {
        let inf = lit(Sign::None, Base::Decimal, LiteralKind::Inf);
        assert_eq!(parse_f32(inf, "inf"), Some(f32::INFINITY));
        let neg_inf = lit(Sign::Minus, Base::Decimal, LiteralKind::Inf);
        assert_eq!(parse_f32(neg_inf, "-inf"), Some(f32::NEG_INFINITY));

        let nan = lit(Sign::None, Base::Decimal, LiteralKind::Nan);
        let bits = parse_f32(nan, "nan").map(f32::to_bits);
        assert_eq!(bits, Some(0x7FC0_0000));

        let payload = lit(Sign::None, Base::Hex, LiteralKind::NanPayload);
        let bits = parse_f32(payload, "nan:0x7f").map(f32::to_bits);
        assert_eq!(bits, Some(0x7F80_007F));
        assert_eq!(parse_f32(payload, "nan:0x0"), None);
    }

    #[test]
    fn decimal_floats_round_correctly() {
        assert_eq!(parse_f64(normal(Base::Decimal), "0.1"), Some(0.1));
        assert_eq!(parse_f32(normal(Base::Decimal), "3.5"), Some(3.5));
        assert_eq!(parse_f64(normal(Base::Decimal), "1."), Some(1.0));
        assert_eq!(parse_f64(normal(Base::Decimal), "1.e3"), Some(1000.0));
    }
}
