//! Time-based one-time passwords over HMAC-SHA1 (RFC 4226 / RFC 6238).
//!
//! Secrets are padding-free base32 strings. Verification tolerates one
//! 30-second step of clock skew in either direction and never returns an
//! error: anything malformed simply fails to verify.

use hmac::{Hmac, Mac};
use rand::RngCore;
use sha1::Sha1;
use std::time::SystemTime;

use crate::base32;

type HmacSha1 = Hmac<Sha1>;

/// TOTP time step in seconds.
const TIME_STEP_SECS: u64 = 30;
/// Modulus producing 6-digit codes.
const CODE_SPACE: u32 = 1_000_000;

/// Generate a fresh 160-bit shared secret, base32-encoded.
pub fn generate_secret() -> String {
    let mut buf = [0u8; 20];
    rand::thread_rng().fill_bytes(&mut buf);
    base32::encode(&buf)
}

/// Check a submitted code against a shared secret at wall-clock time `now`.
///
/// Accepts the code for the current 30-second step and its immediate
/// neighbours. Empty secrets and non-numeric codes verify as `false`.
pub fn verify(secret: &str, submitted_code: &str, now: SystemTime) -> bool {
    if secret.is_empty() {
        return false;
    }
    let code: u32 = match submitted_code.trim().parse() {
        Ok(c) => c,
        Err(_) => return false,
    };
    let key = base32::decode(secret);
    if key.is_empty() {
        return false;
    }

    let counter = epoch_secs(now) / TIME_STEP_SECS;
    for offset in -1i64..=1 {
        let c = counter as i64 + offset;
        if c < 0 {
            continue;
        }
        if hotp(&key, c as u64) == code {
            return true;
        }
    }
    false
}

/// The 6-digit code for `secret` at time `now`, zero-padded for display.
pub fn current_code(secret: &str, now: SystemTime) -> String {
    let key = base32::decode(secret);
    format!("{:06}", hotp(&key, epoch_secs(now) / TIME_STEP_SECS))
}

/// RFC 4226 HOTP: HMAC-SHA1 over the big-endian counter, dynamically
/// truncated to a 31-bit value, reduced modulo 10^6.
pub fn hotp(key: &[u8], counter: u64) -> u32 {
    let mut mac = match HmacSha1::new_from_slice(key) {
        Ok(mac) => mac,
        // HMAC accepts keys of any length.
        Err(_) => return 0,
    };
    mac.update(&counter.to_be_bytes());
    let digest = mac.finalize().into_bytes();

    let offset = (digest[19] & 0x0f) as usize;
    let binary = (u32::from(digest[offset] & 0x7f) << 24)
        | (u32::from(digest[offset + 1]) << 16)
        | (u32::from(digest[offset + 2]) << 8)
        | u32::from(digest[offset + 3]);
    binary % CODE_SPACE
}

fn epoch_secs(t: SystemTime) -> u64 {
    t.duration_since(std::time::UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::{Duration, UNIX_EPOCH};

    /// RFC 4226 Appendix D reference key and code sequence.
    const RFC_KEY: &[u8] = b"12345678901234567890";
    const RFC_CODES: [u32; 10] = [
        755_224, 287_082, 359_152, 969_429, 338_314, 254_676, 287_922, 162_583, 399_871, 520_489,
    ];

    #[test]
    fn test_hotp_rfc4226_vectors() {
        for (counter, expected) in RFC_CODES.iter().enumerate() {
            assert_eq!(hotp(RFC_KEY, counter as u64), *expected);
        }
    }

    #[test]
    fn test_generated_secret_verifies_current_code() {
        let secret = generate_secret();
        assert_eq!(secret.len(), 32); // 160 bits → 32 base32 symbols
        let now = SystemTime::now();
        let code = current_code(&secret, now);
        assert!(verify(&secret, &code, now));
    }

    #[test]
    fn test_one_step_skew_accepted() {
        let secret = base32::encode(RFC_KEY);
        let now = UNIX_EPOCH + Duration::from_secs(1_234_567_890);
        let code = current_code(&secret, now);
        assert!(verify(&secret, &code, now + Duration::from_secs(30)));
        assert!(verify(&secret, &code, now - Duration::from_secs(30)));
    }

    #[test]
    fn test_45s_skew_outside_window_rejected() {
        let secret = base32::encode(RFC_KEY);
        // 1_234_567_890 is step-aligned: 45s in the past lands two
        // steps away, outside the ±1-step window.
        let aligned = UNIX_EPOCH + Duration::from_secs(1_234_567_890);
        let code = current_code(&secret, aligned);
        assert!(!verify(&secret, &code, aligned - Duration::from_secs(45)));

        // Mid-step, the two-step boundary flips to the future side.
        let mid = aligned + Duration::from_secs(15);
        let code = current_code(&secret, mid);
        assert!(!verify(&secret, &code, mid + Duration::from_secs(45)));
    }

    #[test]
    fn test_two_step_skew_rejected_both_directions() {
        let secret = base32::encode(RFC_KEY);
        let mid = UNIX_EPOCH + Duration::from_secs(1_234_567_890 + 15);
        let code = current_code(&secret, mid);
        assert!(!verify(&secret, &code, mid + Duration::from_secs(60)));
        assert!(!verify(&secret, &code, mid - Duration::from_secs(60)));
    }

    #[test]
    fn test_malformed_inputs_fail_closed() {
        let now = SystemTime::now();
        assert!(!verify("", "123456", now));
        assert!(!verify("JBSWY3DPEHPK3PXP", "not-a-number", now));
        assert!(!verify("JBSWY3DPEHPK3PXP", "", now));
        // Secret with no decodable symbols behaves like an empty key.
        assert!(!verify("!!!", "123456", now));
    }

    #[test]
    fn test_code_is_numeric_comparison() {
        // Leading zeros in the submitted string must not matter.
        let secret = base32::encode(RFC_KEY);
        let now = UNIX_EPOCH + Duration::from_secs(59);
        let key = base32::decode(&secret);
        let code = hotp(&key, 59 / 30);
        assert!(verify(&secret, &format!("{code:06}"), now));
        assert!(verify(&secret, &format!("{code}"), now));
    }
}
