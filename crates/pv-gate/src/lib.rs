//! Master-key gate: the state machine guarding access to in-memory key
//! material behind the master password and, optionally, a TOTP check.
//!
//! States: `Locked → PasswordPending → (TwoFactorPending →)? Unlocked`.
//! Cancelling either pending step discards the just-entered password and
//! returns to `Locked`; nothing is ever retained half-authenticated.
//!
//! The unlocked key material lives only in memory (`SecretString`,
//! zeroized on drop) and is cleared on every transition to `Locked`.
//! Exceeding the configured inactivity window forces a relock the next
//! time the gate is consulted.

use pv_core::config::GateConfig;
use pv_core::PvResult;
use secrecy::SecretString;
use std::time::{Duration, Instant, SystemTime};

/// Checks a candidate master password against the stored settings key.
/// The concrete check (settings-protection KDF, keychain, ...) is an
/// external collaborator.
pub trait PasswordVerifier {
    fn verify(&self, candidate: &SecretString) -> PvResult<bool>;
}

impl<F> PasswordVerifier for F
where
    F: Fn(&SecretString) -> PvResult<bool>,
{
    fn verify(&self, candidate: &SecretString) -> PvResult<bool> {
        self(candidate)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GateState {
    Locked,
    PasswordPending,
    TwoFactorPending,
    Unlocked,
}

pub struct MasterKeyGate {
    state: GateState,
    /// Active key material, present only while `Unlocked`
    key: Option<SecretString>,
    /// Accepted password awaiting the second factor
    pending: Option<SecretString>,
    /// Base32 TOTP secret; `Some` iff two-factor auth is enabled
    totp_secret: Option<String>,
    inactivity_timeout: Duration,
    last_activity: Instant,
}

impl MasterKeyGate {
    pub fn new(config: &GateConfig, totp_secret: Option<String>) -> Self {
        let totp_secret = if config.totp_enabled {
            totp_secret
        } else {
            None
        };
        Self {
            state: GateState::Locked,
            key: None,
            pending: None,
            totp_secret,
            inactivity_timeout: Duration::from_secs(config.inactivity_timeout_secs),
            last_activity: Instant::now(),
        }
    }

    /// Current state, after applying the inactivity policy.
    pub fn state(&mut self) -> GateState {
        self.relock_if_idle();
        self.state
    }

    /// The unlocked key material, if any. Consulting the gate counts as
    /// activity only when it succeeds.
    pub fn key_material(&mut self) -> Option<SecretString> {
        self.relock_if_idle();
        let key = self.key.clone();
        if key.is_some() {
            self.touch();
        }
        key
    }

    /// Start an unlock attempt: `Locked → PasswordPending`.
    /// The caller is expected to present a password prompt.
    pub fn begin_unlock(&mut self) -> GateState {
        self.relock_if_idle();
        if self.state == GateState::Locked {
            self.state = GateState::PasswordPending;
        }
        self.touch();
        self.state
    }

    /// Submit the candidate master password.
    ///
    /// A rejected password drops the candidate and returns to `Locked`.
    /// An accepted one unlocks immediately, or moves to
    /// `TwoFactorPending` when a TOTP secret is configured.
    pub fn submit_password(
        &mut self,
        candidate: SecretString,
        verifier: &dyn PasswordVerifier,
    ) -> PvResult<GateState> {
        self.relock_if_idle();
        if self.state != GateState::PasswordPending {
            return Ok(self.state);
        }
        if !verifier.verify(&candidate)? {
            tracing::debug!("master password rejected");
            self.lock();
            return Ok(self.state);
        }
        self.touch();
        if self.totp_secret.is_some() {
            self.pending = Some(candidate);
            self.state = GateState::TwoFactorPending;
        } else {
            self.key = Some(candidate);
            self.state = GateState::Unlocked;
        }
        Ok(self.state)
    }

    /// Submit the TOTP code for the second factor. A mismatching code
    /// leaves the gate in `TwoFactorPending` for another attempt.
    pub fn submit_code(&mut self, code: &str, now: SystemTime) -> GateState {
        self.relock_if_idle();
        if self.state != GateState::TwoFactorPending {
            return self.state;
        }
        let verified = self
            .totp_secret
            .as_deref()
            .map(|secret| pv_otp::verify(secret, code, now))
            .unwrap_or(false);
        if verified {
            self.key = self.pending.take();
            self.state = GateState::Unlocked;
            self.touch();
        } else {
            tracing::debug!("one-time code rejected");
        }
        self.state
    }

    /// Abort the pending step, discarding the entered password.
    pub fn cancel(&mut self) {
        if matches!(
            self.state,
            GateState::PasswordPending | GateState::TwoFactorPending
        ) {
            self.lock();
        }
    }

    /// Record user activity for the inactivity policy.
    pub fn touch(&mut self) {
        self.last_activity = Instant::now();
    }

    /// Force the gate shut, dropping (and thereby zeroizing) key material.
    pub fn lock(&mut self) {
        self.key = None;
        self.pending = None;
        self.state = GateState::Locked;
    }

    fn relock_if_idle(&mut self) {
        if self.state != GateState::Locked && self.last_activity.elapsed() > self.inactivity_timeout
        {
            tracing::debug!("inactivity window exceeded, relocking");
            self.lock();
        }
    }
}

impl Drop for MasterKeyGate {
    fn drop(&mut self) {
        self.lock();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use secrecy::ExposeSecret;

    fn accept_hunter2(candidate: &SecretString) -> PvResult<bool> {
        Ok(candidate.expose_secret() == "hunter2")
    }

    fn gate(totp_enabled: bool, secret: Option<String>) -> MasterKeyGate {
        let config = GateConfig {
            inactivity_timeout_secs: 300,
            totp_enabled,
        };
        MasterKeyGate::new(&config, secret)
    }

    #[test]
    fn test_password_only_unlock() {
        let mut g = gate(false, None);
        assert_eq!(g.begin_unlock(), GateState::PasswordPending);
        let state = g
            .submit_password(SecretString::from("hunter2"), &accept_hunter2)
            .unwrap();
        assert_eq!(state, GateState::Unlocked);
        let key = g.key_material().unwrap();
        assert_eq!(key.expose_secret(), "hunter2");
    }

    #[test]
    fn test_wrong_password_locks() {
        let mut g = gate(false, None);
        g.begin_unlock();
        let state = g
            .submit_password(SecretString::from("wrong"), &accept_hunter2)
            .unwrap();
        assert_eq!(state, GateState::Locked);
        assert!(g.key_material().is_none());
    }

    #[test]
    fn test_two_factor_flow() {
        let secret = pv_otp::generate_secret();
        let mut g = gate(true, Some(secret.clone()));
        g.begin_unlock();
        let state = g
            .submit_password(SecretString::from("hunter2"), &accept_hunter2)
            .unwrap();
        assert_eq!(state, GateState::TwoFactorPending);
        // Key material must not be reachable before the second factor.
        assert!(g.key_material().is_none());

        let now = SystemTime::now();
        // 7 digits can never match a mod-10^6 code.
        assert_eq!(g.submit_code("1000000", now), GateState::TwoFactorPending);
        let code = pv_otp::current_code(&secret, now);
        assert_eq!(g.submit_code(&code, now), GateState::Unlocked);
        assert!(g.key_material().is_some());
    }

    #[test]
    fn test_cancel_two_factor_discards_password() {
        let secret = pv_otp::generate_secret();
        let mut g = gate(true, Some(secret.clone()));
        g.begin_unlock();
        g.submit_password(SecretString::from("hunter2"), &accept_hunter2)
            .unwrap();
        g.cancel();
        assert_eq!(g.state(), GateState::Locked);
        assert!(g.key_material().is_none());

        // A correct code after cancelling must not resurrect the session.
        let now = SystemTime::now();
        let code = pv_otp::current_code(&secret, now);
        assert_eq!(g.submit_code(&code, now), GateState::Locked);
    }

    #[test]
    fn test_inactivity_forces_relock() {
        let config = GateConfig {
            inactivity_timeout_secs: 0,
            totp_enabled: false,
        };
        let mut g = MasterKeyGate::new(&config, None);
        g.begin_unlock();
        g.submit_password(SecretString::from("hunter2"), &accept_hunter2)
            .unwrap();
        std::thread::sleep(Duration::from_millis(5));
        // Next consult applies the policy before answering.
        assert_eq!(g.state(), GateState::Locked);
        assert!(g.key_material().is_none());
    }

    #[test]
    fn test_totp_disabled_ignores_secret() {
        let secret = pv_otp::generate_secret();
        let mut g = gate(false, Some(secret));
        g.begin_unlock();
        let state = g
            .submit_password(SecretString::from("hunter2"), &accept_hunter2)
            .unwrap();
        assert_eq!(state, GateState::Unlocked);
    }
}
