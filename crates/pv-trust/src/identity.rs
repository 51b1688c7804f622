//! Peer trust records: status, manual trust level, vouching, and
//! interaction statistics.

use pv_core::time::now_epoch_millis;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Trust decision for a peer. Independent of `trust_level`: a
/// distrusted peer keeps its historical level for audit purposes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TrustStatus {
    Pending,
    Trusted,
    Distrusted,
}

/// A vouching statement from one peer about another.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Recommendation {
    pub recommender_fingerprint: String,
    /// Asserted trust level, 0-5
    pub trust_level: u8,
    #[serde(default)]
    pub note: Option<String>,
    /// Unix millis when the recommendation was issued
    pub issued_at: u64,
}

/// A remote peer identity tracked by the trust store.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrustedIdentity {
    /// Opaque key material, base-encoded
    pub public_key: String,
    /// Stable unique identifier; may equal the public key string
    pub fingerprint: String,
    #[serde(default)]
    pub display_name: Option<String>,
    pub status: TrustStatus,
    /// Manually assigned, 0-5
    pub trust_level: u8,
    /// Ordered audit trail of trust decisions, deduplicated on insert
    #[serde(default)]
    pub reasons: Vec<String>,
    /// Latest recommendation per recommender fingerprint (last write wins)
    #[serde(default)]
    pub recommendations: BTreeMap<String, Recommendation>,
    /// Unix millis
    pub added_at: u64,
    pub last_seen_at: u64,
    #[serde(default)]
    pub expires_at: Option<u64>,

    // Interaction statistics feeding the reputation feedback loop.
    #[serde(default)]
    pub successful_transfers: u64,
    #[serde(default)]
    pub failed_transfers: u64,
    #[serde(default)]
    pub total_bytes_transferred: u64,
    #[serde(default)]
    pub last_interaction_at: Option<u64>,
    #[serde(default)]
    pub sum_latency_ms: u64,
    #[serde(default)]
    pub latency_samples: u64,
}

impl TrustedIdentity {
    /// New identity in `Pending` status with no history.
    pub fn new(public_key: impl Into<String>, fingerprint: impl Into<String>) -> Self {
        let now = now_epoch_millis();
        Self {
            public_key: public_key.into(),
            fingerprint: fingerprint.into(),
            display_name: None,
            status: TrustStatus::Pending,
            trust_level: 0,
            reasons: Vec::new(),
            recommendations: BTreeMap::new(),
            added_at: now,
            last_seen_at: now,
            expires_at: None,
            successful_transfers: 0,
            failed_transfers: 0,
            total_bytes_transferred: 0,
            last_interaction_at: None,
            sum_latency_ms: 0,
            latency_samples: 0,
        }
    }

    pub fn with_display_name(mut self, name: impl Into<String>) -> Self {
        self.display_name = Some(name.into());
        self
    }

    /// Append a reason to the audit trail unless already present.
    pub fn add_reason(&mut self, reason: impl Into<String>) {
        let reason = reason.into();
        if !self.reasons.contains(&reason) {
            self.reasons.push(reason);
        }
    }

    /// Record a recommendation, replacing any earlier one from the same
    /// recommender. No history is retained.
    pub fn add_recommendation(&mut self, rec: Recommendation) {
        self.recommendations
            .insert(rec.recommender_fingerprint.clone(), rec);
    }

    /// Record a transfer outcome: counters, byte total, and latency sample.
    pub fn record_outcome(&mut self, success: bool, bytes: u64, latency_ms: u64) {
        if success {
            self.successful_transfers += 1;
        } else {
            self.failed_transfers += 1;
        }
        self.total_bytes_transferred += bytes;
        self.sum_latency_ms += latency_ms;
        self.latency_samples += 1;
        self.last_interaction_at = Some(now_epoch_millis());
    }

    /// Mean observed latency, recomputed from the accumulator.
    /// 0.0 when no samples have been taken.
    pub fn average_latency_ms(&self) -> f64 {
        if self.latency_samples == 0 {
            0.0
        } else {
            self.sum_latency_ms as f64 / self.latency_samples as f64
        }
    }
}

/// Derive a stable fingerprint from a public-key string.
///
/// A store may also use the public key itself as the fingerprint; the
/// two fields stay independently replaceable either way.
pub fn fingerprint_for(public_key: &str) -> String {
    blake3::hash(public_key.as_bytes()).to_hex().to_string()
}
