//! Padding-free base32 (RFC 4648 alphabet), as used for TOTP secrets.

const ALPHABET: &[u8; 32] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZ234567";

/// Encode bytes into base32 without `=` padding.
///
/// Input is packed 8 bits at a time into 5-bit groups; a final partial
/// group is left-shifted to fill 5 bits before emission.
pub fn encode(data: &[u8]) -> String {
    let mut out = String::with_capacity(data.len() * 8 / 5 + 1);
    let mut buffer: u32 = 0;
    let mut bits_left: u32 = 0;

    for &b in data {
        buffer = (buffer << 8) | u32::from(b);
        bits_left += 8;
        while bits_left >= 5 {
            out.push(ALPHABET[((buffer >> (bits_left - 5)) & 0x1f) as usize] as char);
            bits_left -= 5;
        }
    }
    if bits_left > 0 {
        out.push(ALPHABET[((buffer << (5 - bits_left)) & 0x1f) as usize] as char);
    }
    out
}

/// Decode a base32 string, case-insensitively.
///
/// Characters outside the alphabet are skipped; trailing bits that do
/// not complete a byte are discarded.
pub fn decode(input: &str) -> Vec<u8> {
    let mut out = Vec::with_capacity(input.len() * 5 / 8);
    let mut buffer: u32 = 0;
    let mut bits_left: u32 = 0;

    for c in input.chars() {
        let val = match c.to_ascii_uppercase() {
            c @ 'A'..='Z' => c as u32 - 'A' as u32,
            c @ '2'..='7' => c as u32 - '2' as u32 + 26,
            _ => continue,
        };
        buffer = (buffer << 5) | val;
        bits_left += 5;
        if bits_left >= 8 {
            out.push((buffer >> (bits_left - 8)) as u8);
            bits_left -= 8;
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_rfc4648_vectors_unpadded() {
        assert_eq!(encode(b""), "");
        assert_eq!(encode(b"f"), "MY");
        assert_eq!(encode(b"fo"), "MZXQ");
        assert_eq!(encode(b"foo"), "MZXW6");
        assert_eq!(encode(b"foob"), "MZXW6YQ");
        assert_eq!(encode(b"fooba"), "MZXW6YTB");
        assert_eq!(encode(b"foobar"), "MZXW6YTBOI");
    }

    #[test]
    fn test_decode_is_case_insensitive() {
        assert_eq!(decode("mzxw6ytboi"), b"foobar");
        assert_eq!(decode("MzXw6YtBoI"), b"foobar");
    }

    #[test]
    fn test_decode_strips_foreign_characters() {
        assert_eq!(decode("MZXW 6YTB-OI="), b"foobar");
        assert_eq!(decode("M Z X W 6"), b"foo");
    }

    #[test]
    fn test_decode_empty_and_garbage() {
        assert!(decode("").is_empty());
        assert!(decode("!@# 0189").is_empty());
    }

    proptest! {
        #[test]
        fn prop_roundtrip(data: Vec<u8>) {
            prop_assert_eq!(decode(&encode(&data)), data);
        }
    }
}
