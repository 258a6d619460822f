//! Hexadecimal floating point text (`0x1.8p+1`), exact in both directions.
//!
//! Model and cache files store every real this way so a value written and
//! read back is bit-identical. The reader also accepts plain decimal text.

/// Format `v` as a normalised hexadecimal float.
pub fn format_hex(v: f64) -> String {
    if v.is_nan() {
        return "nan".to_string();
    }
    if v.is_infinite() {
        return if v < 0.0 { "-inf" } else { "inf" }.to_string();
    }
    let bits = v.to_bits();
    let sign = if bits >> 63 == 1 { "-" } else { "" };
    let exp = ((bits >> 52) & 0x7ff) as i32;
    let mant = bits & ((1u64 << 52) - 1);
    if exp == 0 && mant == 0 {
        return format!("{sign}0x0p+0");
    }
    let (lead, e) = if exp == 0 { (0, -1022) } else { (1, exp - 1023) };
    let digits = format!("{mant:013x}");
    let frac = digits.trim_end_matches('0');
    if frac.is_empty() {
        format!("{sign}0x{lead}p{e:+}")
    } else {
        format!("{sign}0x{lead}.{frac}p{e:+}")
    }
}

/// `m * 2^e` without intermediate overflow or underflow.
fn ldexp(mut m: f64, mut e: i32) -> f64 {
    while e > 500 {
        m *= 2f64.powi(500);
        e -= 500;
    }
    while e < -500 {
        m *= 2f64.powi(-500);
        e += 500;
    }
    m * 2f64.powi(e)
}

/// Parse a hexadecimal or decimal float.
pub fn parse_hex(text: &str) -> Option<f64> {
    let t = text.trim();
    let (negative, body) = match t.as_bytes().first()? {
        b'-' => (true, &t[1..]),
        b'+' => (false, &t[1..]),
        _ => (false, t),
    };
    let hex = body
        .strip_prefix("0x")
        .or_else(|| body.strip_prefix("0X"));
    let value = match hex {
        Some(h) => parse_hex_body(h)?,
        None => body.parse::<f64>().ok()?,
    };
    Some(if negative { -value } else { value })
}

fn parse_hex_body(h: &str) -> Option<f64> {
    let (mantissa, exponent) = match h.find(['p', 'P']) {
        Some(i) => (&h[..i], h[i + 1..].parse::<i32>().ok()?),
        None => (h, 0),
    };
    let (int_part, frac_part) = match mantissa.find('.') {
        Some(i) => (&mantissa[..i], &mantissa[i + 1..]),
        None => (mantissa, ""),
    };
    if int_part.is_empty() && frac_part.is_empty() {
        return None;
    }
    let mut m: u64 = 0;
    let mut e = exponent;
    let mut significant = 0;
    for c in int_part.chars() {
        let d = c.to_digit(16)? as u64;
        if significant < 15 {
            m = (m << 4) | d;
            if m != 0 {
                significant += 1;
            }
        } else {
            e += 4;
        }
    }
    for c in frac_part.chars() {
        let d = c.to_digit(16)? as u64;
        if significant < 15 {
            m = (m << 4) | d;
            if m != 0 {
                significant += 1;
            }
            e -= 4;
        }
    }
    Some(ldexp(m as f64, e))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn formats_like_printf_a() {
        assert_eq!(format_hex(1.0), "0x1p+0");
        assert_eq!(format_hex(3.0), "0x1.8p+1");
        assert_eq!(format_hex(-0.5), "-0x1p-1");
        assert_eq!(format_hex(0.0), "0x0p+0");
        assert_eq!(format_hex(-0.0), "-0x0p+0");
    }

    #[test]
    fn parses_hex_and_decimal() {
        assert_eq!(parse_hex("0x1.8p+1"), Some(3.0));
        assert_eq!(parse_hex("-0x1p-1"), Some(-0.5));
        assert_eq!(parse_hex("0X1P4"), Some(16.0));
        assert_eq!(parse_hex("2.25"), Some(2.25));
        assert_eq!(parse_hex("0x"), None);
        assert_eq!(parse_hex("0x1.gp0"), None);
        assert_eq!(parse_hex(""), None);
    }

    #[test]
    fn round_trip_is_bit_exact() {
        let samples = [
            0.1f64,
            -1234.5678,
            f64::MIN_POSITIVE,
            5e-324,
            f64::MAX,
            0.1f32 as f64,
            std::f64::consts::PI,
            -0.0,
        ];
        for v in samples {
            let back = parse_hex(&format_hex(v)).unwrap();
            assert_eq!(back.to_bits(), v.to_bits(), "{v:e} via {}", format_hex(v));
        }
    }
}
