//! Durable fingerprint-keyed trust store.
//!
//! One JSON document maps fingerprint → identity record. Every mutation
//! runs under a single exclusive lock covering both the in-memory update
//! and the synchronous write-through persist, so readers only ever see
//! fully committed snapshots. A missing or corrupt document degrades to
//! an empty store: trust is rebuildable, and load failures must never
//! take the process down.

use anyhow::Context;
use pv_core::time::now_epoch_millis;
use pv_core::{PvError, PvResult};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use crate::identity::{Recommendation, TrustStatus, TrustedIdentity};

pub struct TrustStore {
    path: PathBuf,
    inner: Mutex<HashMap<String, TrustedIdentity>>,
}

impl TrustStore {
    /// Open (or create) the store backed by the JSON document at `path`.
    pub fn open(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let identities = Self::load_document(&path);
        Self {
            path,
            inner: Mutex::new(identities),
        }
    }

    fn load_document(path: &Path) -> HashMap<String, TrustedIdentity> {
        if !path.exists() {
            return HashMap::new();
        }
        match std::fs::read_to_string(path) {
            Ok(content) => match serde_json::from_str(&content) {
                Ok(map) => map,
                Err(e) => {
                    tracing::warn!(
                        "trust store unparsable, starting empty: {}: {e}",
                        path.display()
                    );
                    HashMap::new()
                }
            },
            Err(e) => {
                tracing::warn!(
                    "trust store unreadable, starting empty: {}: {e}",
                    path.display()
                );
                HashMap::new()
            }
        }
    }

    /// Serialize the full store to disk. Writes a temp file in the same
    /// directory and renames it over the document so concurrent readers
    /// of the file never see a partial write.
    fn persist(&self, identities: &HashMap<String, TrustedIdentity>) -> PvResult<()> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("creating dir: {}", parent.display()))?;
        }
        let json = serde_json::to_string_pretty(identities).context("serializing trust store")?;

        let file_name = self
            .path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "trust_store.json".into());
        let tmp_path = self
            .path
            .parent()
            .unwrap_or(Path::new("."))
            .join(format!(".{file_name}.tmp"));

        std::fs::write(&tmp_path, json.as_bytes())?;
        std::fs::rename(&tmp_path, &self.path)?;
        Ok(())
    }

    fn with_identities<T>(
        &self,
        f: impl FnOnce(&mut HashMap<String, TrustedIdentity>) -> T,
    ) -> PvResult<T> {
        let mut guard = self
            .inner
            .lock()
            .map_err(|_| PvError::Trust("trust store lock poisoned".into()))?;
        let result = f(&mut guard);
        self.persist(&guard)?;
        Ok(result)
    }

    /// Insert or replace an identity under its fingerprint.
    pub fn add_identity(&self, identity: TrustedIdentity) -> PvResult<()> {
        self.with_identities(|ids| {
            tracing::debug!(fingerprint = %identity.fingerprint, "trust store: add identity");
            ids.insert(identity.fingerprint.clone(), identity);
        })
    }

    pub fn remove_identity(&self, fingerprint: &str) -> PvResult<()> {
        self.with_identities(|ids| {
            ids.remove(fingerprint);
        })
    }

    /// Defensive copy of a single record.
    pub fn get_identity(&self, fingerprint: &str) -> Option<TrustedIdentity> {
        self.inner.lock().ok()?.get(fingerprint).cloned()
    }

    /// Snapshot of every record. Callers never observe in-progress writes.
    pub fn all_identities(&self) -> Vec<TrustedIdentity> {
        self.inner
            .lock()
            .map(|ids| ids.values().cloned().collect())
            .unwrap_or_default()
    }

    /// True iff the fingerprint is known and its status is `Trusted`.
    pub fn is_trusted(&self, fingerprint: &str) -> bool {
        self.get_identity(fingerprint)
            .map(|id| id.status == TrustStatus::Trusted)
            .unwrap_or(false)
    }

    /// Advisory reputation score for one identity, or `None` when the
    /// fingerprint is unknown. See [`crate::ranking`].
    pub fn interaction_score(&self, fingerprint: &str) -> Option<f64> {
        self.get_identity(fingerprint)
            .map(|id| crate::ranking::interaction_score(&id, now_epoch_millis()))
    }

    /// Recommendation-weighted trust rank over the current snapshot.
    /// Unknown fingerprints rank 0.
    pub fn trust_rank(&self, fingerprint: &str) -> f64 {
        let snapshot = match self.inner.lock() {
            Ok(ids) => ids.clone(),
            Err(_) => return 0.0,
        };
        crate::ranking::trust_rank(&snapshot, fingerprint, now_epoch_millis())
    }

    /// Public keys of every `Trusted` identity, for recipient selection.
    pub fn trusted_recipient_keys(&self) -> Vec<String> {
        self.inner
            .lock()
            .map(|ids| {
                ids.values()
                    .filter(|id| id.status == TrustStatus::Trusted)
                    .map(|id| id.public_key.clone())
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Replace an identity's `(public_key, fingerprint)` pair, keeping
    /// status, trust level, reasons, recommendations, counters, and
    /// timestamps under the new fingerprint. The old entry is removed in
    /// the same mutation; an unknown `old_fingerprint` is a no-op.
    pub fn rotate_key(
        &self,
        old_fingerprint: &str,
        new_public_key: &str,
        new_fingerprint: &str,
    ) -> PvResult<()> {
        self.with_identities(|ids| {
            if let Some(mut identity) = ids.remove(old_fingerprint) {
                tracing::info!(
                    old = %old_fingerprint,
                    new = %new_fingerprint,
                    "trust store: key rotation"
                );
                identity.public_key = new_public_key.to_string();
                identity.fingerprint = new_fingerprint.to_string();
                ids.insert(identity.fingerprint.clone(), identity);
            }
        })
    }

    /// Feed an interaction outcome back into the identity's counters.
    /// Unknown fingerprints are ignored: outcomes never create records.
    pub fn record_outcome(
        &self,
        fingerprint: &str,
        success: bool,
        bytes: u64,
        latency_ms: u64,
    ) -> PvResult<()> {
        self.with_identities(|ids| {
            if let Some(identity) = ids.get_mut(fingerprint) {
                identity.record_outcome(success, bytes, latency_ms);
            }
        })
    }

    pub fn set_status(&self, fingerprint: &str, status: TrustStatus) -> PvResult<()> {
        self.with_identities(|ids| {
            if let Some(identity) = ids.get_mut(fingerprint) {
                identity.status = status;
            }
        })
    }

    pub fn set_trust_level(&self, fingerprint: &str, level: u8) -> PvResult<()> {
        if level > 5 {
            return Err(PvError::Trust(format!(
                "trust level out of range: {level} (expected 0-5)"
            )));
        }
        self.with_identities(|ids| {
            if let Some(identity) = ids.get_mut(fingerprint) {
                identity.trust_level = level;
            }
        })
    }

    pub fn add_reason(&self, fingerprint: &str, reason: &str) -> PvResult<()> {
        self.with_identities(|ids| {
            if let Some(identity) = ids.get_mut(fingerprint) {
                identity.add_reason(reason);
            }
        })
    }

    pub fn add_recommendation(&self, fingerprint: &str, rec: Recommendation) -> PvResult<()> {
        self.with_identities(|ids| {
            if let Some(identity) = ids.get_mut(fingerprint) {
                identity.add_recommendation(rec);
            }
        })
    }
}
