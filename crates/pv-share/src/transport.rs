//! Outbound hand-off seam.
//!
//! After encryption the pipeline hands its artifact list to a transport
//! (share intent, peer channel, ...). The hand-off is best-effort: a
//! transport failure is reported but never re-triggers encryption.

use pv_core::PvResult;
use std::path::PathBuf;

/// Fixed content type for encrypted share artifacts.
pub const OCTET_STREAM: &str = "application/octet-stream";

/// One staged encrypted file ready to leave the process.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ShareArtifact {
    pub path: PathBuf,
    pub content_type: String,
}

impl ShareArtifact {
    pub fn new(path: PathBuf) -> Self {
        Self {
            path,
            content_type: OCTET_STREAM.into(),
        }
    }
}

pub trait Transport: Send + Sync {
    fn send(&self, artifacts: &[ShareArtifact]) -> PvResult<()>;
}

/// Discards the artifact list. Useful when the caller only wants the
/// staged files (the CLI lists them itself).
pub struct NullTransport;

impl Transport for NullTransport {
    fn send(&self, artifacts: &[ShareArtifact]) -> PvResult<()> {
        tracing::debug!(count = artifacts.len(), "null transport: dropping artifacts");
        Ok(())
    }
}
