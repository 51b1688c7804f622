//! Persistent peer trust: who we share with, why, and how those peers
//! have behaved. The store is explicitly constructed and injected — no
//! ambient global state.
//!
//! Records carry raw interaction counters only. The [`ranking`] module
//! is the policy layer that folds counters and recommendations into
//! advisory scores; nothing ever writes a score back into a record, and
//! the stored trust level stays a manual decision.

pub mod identity;
pub mod ranking;
pub mod store;

pub use identity::{fingerprint_for, Recommendation, TrustStatus, TrustedIdentity};
pub use ranking::{interaction_score, trust_rank};
pub use store::TrustStore;
