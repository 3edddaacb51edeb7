//! Literal decoding: numbers plus CEL string/bytes escape processing.
//!
//! Escapes: standard C escapes, `\x` (2 hex digits), `\u` (4), `\U` (8),
//! `\ooo` (3 octal digits). Unicode escapes must land on valid scalar values
//! and are rejected inside bytes literals, where escapes denote raw octets.

pub fn decode_int(digits: &str, radix: u32) -> Result<i64, String> {
    i64::from_str_radix(digits, radix).map_err(|_| format!("invalid int literal '{digits}'"))
}

pub fn decode_uint(digits: &str, radix: u32) -> Result<u64, String> {
    u64::from_str_radix(digits, radix).map_err(|_| format!("invalid uint literal '{digits}'"))
}

pub fn decode_double(text: &str) -> Result<f64, String> {
    text.parse::<f64>()
        .map_err(|_| format!("invalid double literal '{text}'"))
}

pub fn decode_string(body: &str, raw: bool) -> Result<String, String> {
    if raw {
        return Ok(body.to_string());
    }

    let decoded = decode_escapes(body, false)?;
    String::from_utf8(decoded).map_err(|_| "string literal is not valid UTF-8".to_string())
}

pub fn decode_bytes(body: &str, raw: bool) -> Result<Vec<u8>, String> {
    if raw {
        return Ok(body.as_bytes().to_vec());
    }

    decode_escapes(body, true)
}

fn decode_escapes(body: &str, bytes_mode: bool) -> Result<Vec<u8>, String> {
    let mut out = vec![];
    let mut chars = body.chars();

    while let Some(c) = chars.next() {
        if c != '\\' {
            let mut buffer = [0u8; 4];
            out.extend_from_slice(c.encode_utf8(&mut buffer).as_bytes());
            continue;
        }

        let Some(escape) = chars.next() else {
            return Err("trailing backslash in literal".to_string());
        };

        match escape {
            'a' => out.push(0x07),
            'b' => out.push(0x08),
            'f' => out.push(0x0c),
            'n' => out.push(b'\n'),
            'r' => out.push(b'\r'),
            't' => out.push(b'\t'),
            'v' => out.push(0x0b),
            '\\' => out.push(b'\\'),
            '\'' => out.push(b'\''),
            '"' => out.push(b'"'),
            '`' => out.push(b'`'),
            '?' => out.push(b'?'),
            'x' | 'X' => {
                let value = take_hex(&mut chars, 2)?;
                push_scalar_or_byte(&mut out, value, bytes_mode, 2)?;
            }
            'u' => {
                if bytes_mode {
                    return Err("\\u escapes are not allowed in bytes literals".to_string());
                }
                let value = take_hex(&mut chars, 4)?;
                push_scalar(&mut out, value)?;
            }
            'U' => {
                if bytes_mode {
                    return Err("\\U escapes are not allowed in bytes literals".to_string());
                }
                let value = take_hex(&mut chars, 8)?;
                push_scalar(&mut out, value)?;
            }
            digit @ '0'..='7' => {
                let mut value = digit as u32 - '0' as u32;
                for _ in 0..2 {
                    let Some(next) = chars.next() else {
                        return Err("octal escape requires 3 digits".to_string());
                    };
                    let Some(octal) = next.to_digit(8) else {
                        return Err("octal escape requires 3 digits".to_string());
                    };
                    value = value * 8 + octal;
                }
                push_scalar_or_byte(&mut out, value, bytes_mode, 3)?;
            }
            other => return Err(format!("invalid escape '\\{other}'")),
        }
    }

    Ok(out)
}

fn take_hex(chars: &mut std::str::Chars<'_>, count: usize) -> Result<u32, String> {
    let mut value = 0u32;
    for _ in 0..count {
        let Some(c) = chars.next() else {
            return Err(format!("hex escape requires {count} digits"));
        };
        let Some(digit) = c.to_digit(16) else {
            return Err(format!("hex escape requires {count} digits"));
        };
        value = value * 16 + digit;
    }
    Ok(value)
}

fn push_scalar(out: &mut Vec<u8>, value: u32) -> Result<(), String> {
    let Some(c) = char::from_u32(value) else {
        return Err(format!("invalid unicode code point U+{value:04X}"));
    };
    let mut buffer = [0u8; 4];
    out.extend_from_slice(c.encode_utf8(&mut buffer).as_bytes());
    Ok(())
}

fn push_scalar_or_byte(
    out: &mut Vec<u8>,
    value: u32,
    bytes_mode: bool,
    _width: usize,
) -> Result<(), String> {
    if bytes_mode {
        if value > 0xff {
            return Err("byte escape out of range".to_string());
        }
        out.push(value as u8);
        return Ok(());
    }
    push_scalar(out, value)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_standard_escapes() {
        assert_eq!(decode_string(r"a\nb\tc", false).unwrap(), "a\nb\tc");
        assert_eq!(decode_string(r"\'\\\x22", false).unwrap(), "'\\\"");
    }

    #[test]
    fn test_unicode_escapes() {
        assert_eq!(decode_string(r"\u00e9", false).unwrap(), "é");
        assert_eq!(decode_string(r"\U0001F600", false).unwrap(), "😀");
        assert!(decode_string(r"\ud800", false).is_err());
    }

    #[test]
    fn test_octal_escapes() {
        assert_eq!(decode_string(r"\101", false).unwrap(), "A");
        assert!(decode_string(r"\10", false).is_err());
    }

    #[test]
    fn test_bytes_mode() {
        assert_eq!(decode_bytes(r"\xff\001", false).unwrap(), vec![0xff, 0x01]);
        assert!(decode_bytes(r"\u0041", false).is_err());
    }

    #[test]
    fn test_raw_passthrough() {
        assert_eq!(decode_string(r"a\nb", true).unwrap(), "a\\nb");
    }
}
