//! One-time-password engine gating access to key material.
//!
//! Pure and stateless: no I/O beyond reading the secret, safe to call
//! from any thread.

pub mod base32;
pub mod totp;

pub use totp::{current_code, generate_secret, hotp, verify};
