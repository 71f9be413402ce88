//! 7-bit transport escaping
//!
//! Payloads travel between instances as printable ASCII so that `;` can
//! terminate a segment unambiguously. Every UTF-16 code unit outside the
//! printable range, `%` itself and the `;` terminator become `%` followed by
//! four lowercase hex digits of the unit.

/// Escape marker
const ESCAPE: char = '%';

/// Segment terminator, escaped so payloads never split a segment
const TERMINATOR: char = ';';

/// Number of hex digits following an escape marker
const ESCAPE_DIGITS: usize = 4;

fn to_hex(nibble: u16) -> char {
    let nibble = (nibble & 0x000F) as u8;
    if nibble >= 10 {
        char::from(b'a' + (nibble - 10))
    } else {
        char::from(b'0' + nibble)
    }
}

fn needs_escape(unit: u16) -> bool {
    unit < 32 || unit > 127 || unit == ESCAPE as u16 || unit == TERMINATOR as u16
}

/// Convert arbitrary text to its 7-bit transport form
pub fn escape_to_7bit(text: &str) -> String {
    let mut result = String::with_capacity(text.len() * 2);
    for unit in text.encode_utf16() {
        if needs_escape(unit) {
            result.push(ESCAPE);
            result.push(to_hex(unit >> 12));
            result.push(to_hex(unit >> 8));
            result.push(to_hex(unit >> 4));
            result.push(to_hex(unit));
        } else {
            // Printable ASCII maps to itself
            result.push(char::from(unit as u8));
        }
    }
    result
}

/// Reverse [`escape_to_7bit`]
///
/// An escape marker without four following hex digits is kept literally.
pub fn unescape_from_7bit(text: &str) -> String {
    let chars: Vec<char> = text.chars().collect();
    let mut units: Vec<u16> = Vec::with_capacity(chars.len());
    let mut buf = [0u16; 2];

    let mut i = 0;
    while i < chars.len() {
        let ch = chars[i];
        if ch == ESCAPE && i + ESCAPE_DIGITS < chars.len() {
            if let Some(unit) = parse_unit(&chars[i + 1..=i + ESCAPE_DIGITS]) {
                units.push(unit);
                i += ESCAPE_DIGITS + 1;
                continue;
            }
        }
        units.extend_from_slice(ch.encode_utf16(&mut buf));
        i += 1;
    }

    String::from_utf16_lossy(&units)
}

fn parse_unit(digits: &[char]) -> Option<u16> {
    digits.iter().try_fold(0u16, |acc, ch| {
        ch.to_digit(16).map(|digit| (acc << 4) | digit as u16)
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ascii_passes_through() {
        assert_eq!(escape_to_7bit("tg://resolve?domain=x"), "tg://resolve?domain=x");
        assert_eq!(escape_to_7bit(""), "");
    }

    #[test]
    fn test_percent_and_controls_are_escaped() {
        assert_eq!(escape_to_7bit("50%"), "50%0025");
        assert_eq!(escape_to_7bit("a\nb"), "a%000ab");
        assert_eq!(escape_to_7bit("é"), "%00e9");
    }

    #[test]
    fn test_terminator_is_escaped() {
        assert_eq!(escape_to_7bit("a;b"), "a%003bb");
        assert_eq!(unescape_from_7bit("a%003bb"), "a;b");
    }

    #[test]
    fn test_roundtrip_mixed_text() {
        let samples = [
            "",
            "/tmp/a.txt",
            "100% sure",
            "Привет, мир",
            "emoji 🎉 outside the BMP",
            "tabs\tand\r\nnewlines",
            "%0041 looks like an escape",
            "semi;colons;inside",
        ];
        for sample in samples {
            let encoded = escape_to_7bit(sample);
            assert_eq!(unescape_from_7bit(&encoded), sample, "sample {:?}", sample);
        }
    }

    #[test]
    fn test_encoded_output_is_framing_safe() {
        let encoded = escape_to_7bit("x%y;\u{0}\u{7f}\u{80}ü🎉");
        assert!(encoded.bytes().all(|b| (32..=127).contains(&b)));
        assert!(!encoded.contains(';'));

        // Every marker is followed by exactly four hex digits
        let chars: Vec<char> = encoded.chars().collect();
        for (i, ch) in chars.iter().enumerate() {
            if *ch == '%' {
                assert!(chars[i + 1..i + 5].iter().all(|c| c.is_ascii_hexdigit()));
            }
        }
    }

    #[test]
    fn test_trailing_malformed_escape_is_literal() {
        assert_eq!(unescape_from_7bit("abc%1"), "abc%1");
        assert_eq!(unescape_from_7bit("%"), "%");
        assert_eq!(unescape_from_7bit("%004"), "%004");
    }

    #[test]
    fn test_exactly_four_digits_at_end_decode() {
        assert_eq!(unescape_from_7bit("%0041"), "A");
    }

    #[test]
    fn test_non_hex_escape_is_literal() {
        assert_eq!(unescape_from_7bit("%zz41rest"), "%zz41rest");
    }

    #[test]
    fn test_uppercase_hex_accepted() {
        assert_eq!(unescape_from_7bit("%00E9"), "é");
    }
}
