//! Two-mode encryptor seam (age 0.11 backend).
//!
//! The pipeline treats encryption as an opaque stream-to-stream contract
//! with exactly two invocation modes: a passphrase-derived key, or a
//! list of recipient public keys.

use pv_core::{PvError, PvResult};
use secrecy::SecretString;
use std::io::{Read, Write};

/// How a share is encrypted. Exactly one mode per pipeline run.
#[derive(Debug, Clone)]
pub enum EncryptionMode {
    /// Symmetric, scrypt-derived from a shared passphrase
    Passphrase(SecretString),
    /// Bound to one or more recipient public keys
    Recipients(Vec<String>),
}

impl EncryptionMode {
    /// Hard precondition check, performed before any staging artifact
    /// exists: an empty passphrase or an empty recipient list is a
    /// caller error, not a runtime failure.
    pub fn validate(&self) -> PvResult<()> {
        use secrecy::ExposeSecret;
        match self {
            EncryptionMode::Passphrase(secret) if secret.expose_secret().is_empty() => Err(
                PvError::Precondition("empty passphrase for secure share".into()),
            ),
            EncryptionMode::Recipients(keys) if keys.is_empty() => Err(PvError::Precondition(
                "no recipient public keys for secure share".into(),
            )),
            _ => Ok(()),
        }
    }
}

/// Stream-to-stream encryption over the full source byte stream.
pub trait Encryptor: Send + Sync {
    fn encrypt(
        &self,
        mode: &EncryptionMode,
        input: &mut dyn Read,
        output: &mut dyn Write,
    ) -> PvResult<()>;
}

/// age backend: scrypt recipient for passphrase mode, parsed x25519
/// recipients for public-key mode.
pub struct AgeEncryptor;

impl Encryptor for AgeEncryptor {
    fn encrypt(
        &self,
        mode: &EncryptionMode,
        input: &mut dyn Read,
        output: &mut dyn Write,
    ) -> PvResult<()> {
        match mode {
            EncryptionMode::Passphrase(secret) => {
                let recipient = age::scrypt::Recipient::new(secret.clone());
                wrap_and_copy(
                    std::iter::once(&recipient as &dyn age::Recipient),
                    input,
                    output,
                )
            }
            EncryptionMode::Recipients(keys) => {
                let recipients = parse_recipients(keys)?;
                wrap_and_copy(
                    recipients.iter().map(|r| r as &dyn age::Recipient),
                    input,
                    output,
                )
            }
        }
    }
}

fn parse_recipients(keys: &[String]) -> PvResult<Vec<age::x25519::Recipient>> {
    keys.iter()
        .map(|key| {
            key.parse::<age::x25519::Recipient>()
                .map_err(|e| PvError::Encrypt(format!("malformed recipient key: {e}")))
        })
        .collect()
}

fn wrap_and_copy<'a>(
    recipients: impl Iterator<Item = &'a dyn age::Recipient>,
    input: &mut dyn Read,
    output: &mut dyn Write,
) -> PvResult<()> {
    let encryptor = age::Encryptor::with_recipients(recipients)
        .map_err(|e| PvError::Encrypt(format!("building age encryptor: {e}")))?;
    let mut writer = encryptor
        .wrap_output(output)
        .map_err(|e| PvError::Encrypt(format!("starting age stream: {e}")))?;
    std::io::copy(input, &mut writer)?;
    writer.finish()?;
    Ok(())
}
