//! The secure-sharing pipeline.
//!
//! `prepare` validates the batch and claims a staging run directory,
//! `run` encrypts each source in input order on a single background
//! worker and finally hands the artifact list to the transport.
//!
//! State machine: `Prepared → Encrypting → Completed`, with `Failed` on
//! the first per-file error and `Cancelled` on a user abort. Each
//! transition is published on a watch channel alongside progress, so
//! observers can follow a run they did not start. A failure
//! aborts the remaining files but keeps artifacts already staged (the
//! staging area sweep removes them at shutdown, not the pipeline).
//!
//! Cancellation is honored between files: a file whose encryption has
//! started runs to completion and keeps its artifact, so no truncated
//! ciphertext is ever left behind.

use pv_core::{PvError, PvResult};
use std::fs::File;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;

use crate::encryptor::{EncryptionMode, Encryptor};
use crate::staging::StagingArea;
use crate::transport::{ShareArtifact, Transport};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PipelineState {
    Prepared,
    Encrypting,
    Completed,
    Failed,
    Cancelled,
}

/// Progress accounting uses plaintext sizes: the ciphertext overhead is
/// not exposed by the encryptor, so the source size is the accepted
/// approximation.
#[derive(Debug, Clone, Default)]
pub struct ShareProgress {
    pub files_done: usize,
    pub total_files: usize,
    pub bytes_done: u64,
    pub total_bytes: u64,
    pub current_file: Option<String>,
}

/// Terminal result of one pipeline run.
#[derive(Debug)]
pub struct ShareOutcome {
    pub state: PipelineState,
    /// Staged artifacts, in source order; on failure, everything
    /// produced before the failing file.
    pub artifacts: Vec<ShareArtifact>,
    /// The per-file error that aborted the batch, if any.
    pub error: Option<PvError>,
    /// Best-effort hand-off failure; the run still counts as completed.
    pub transport_error: Option<PvError>,
}

pub struct SharePipeline {
    sources: Vec<PathBuf>,
    mode: EncryptionMode,
    run_dir: PathBuf,
    suffix: String,
    cancel: CancellationToken,
    progress_tx: watch::Sender<ShareProgress>,
    progress_rx: watch::Receiver<ShareProgress>,
    state_tx: watch::Sender<PipelineState>,
    state_rx: watch::Receiver<PipelineState>,
}

impl SharePipeline {
    /// Validate the batch and claim a staging run directory.
    ///
    /// Precondition failures (empty batch, empty passphrase, empty
    /// recipient list) surface here, before any artifact exists.
    pub fn prepare(
        sources: Vec<PathBuf>,
        mode: EncryptionMode,
        staging: &StagingArea,
        suffix: &str,
    ) -> PvResult<Self> {
        if sources.is_empty() {
            return Err(PvError::Precondition("no files selected for share".into()));
        }
        mode.validate()?;
        let run_dir = staging.begin_run()?;
        let (progress_tx, progress_rx) = watch::channel(ShareProgress {
            total_files: sources.len(),
            ..Default::default()
        });
        let (state_tx, state_rx) = watch::channel(PipelineState::Prepared);
        Ok(Self {
            sources,
            mode,
            run_dir,
            suffix: suffix.to_string(),
            cancel: CancellationToken::new(),
            progress_tx,
            progress_rx,
            state_tx,
            state_rx,
        })
    }

    /// Token for cancelling the run between files.
    pub fn cancel_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    pub fn subscribe_progress(&self) -> watch::Receiver<ShareProgress> {
        self.progress_rx.clone()
    }

    /// The pipeline's current state. `run` consumes the pipeline, so
    /// observers that want to follow it across the run hold a
    /// [`SharePipeline::subscribe_state`] receiver instead.
    pub fn state(&self) -> PipelineState {
        *self.state_rx.borrow()
    }

    /// Watch channel tracking the state machine through to its terminal
    /// state; the last value matches the returned outcome's `state`.
    pub fn subscribe_state(&self) -> watch::Receiver<PipelineState> {
        self.state_rx.clone()
    }

    /// Encrypt the batch and hand the result to the transport.
    pub async fn run(
        self,
        encryptor: Arc<dyn Encryptor>,
        transport: &dyn Transport,
    ) -> ShareOutcome {
        tracing::info!(
            files = self.sources.len(),
            staging = %self.run_dir.display(),
            "share pipeline starting"
        );

        let mut progress = ShareProgress {
            total_files: self.sources.len(),
            ..Default::default()
        };
        for src in &self.sources {
            match std::fs::metadata(src) {
                Ok(meta) => progress.total_bytes += meta.len(),
                Err(e) => {
                    return self.fail(
                        Vec::new(),
                        PvError::Encrypt(format!("reading source {}: {e}", src.display())),
                    );
                }
            }
        }
        let _ = self.progress_tx.send(progress.clone());
        let _ = self.state_tx.send(PipelineState::Encrypting);

        let mut artifacts: Vec<ShareArtifact> = Vec::with_capacity(self.sources.len());
        let mut cancelled = false;

        for src in &self.sources {
            if self.cancel.is_cancelled() {
                cancelled = true;
                break;
            }

            let file_name = src
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_else(|| "unnamed".into());
            let dst_name = format!("{file_name}{}", self.suffix);
            let dst = self.run_dir.join(&dst_name);
            let plaintext_size = match std::fs::metadata(src) {
                Ok(meta) => meta.len(),
                Err(e) => {
                    return self.fail(
                        artifacts,
                        PvError::Encrypt(format!("reading source {}: {e}", src.display())),
                    );
                }
            };

            progress.current_file = Some(dst_name.clone());
            let _ = self.progress_tx.send(progress.clone());
            tracing::debug!(src = %src.display(), dst = %dst.display(), "encrypting");

            let result = {
                let encryptor = encryptor.clone();
                let mode = self.mode.clone();
                let src = src.clone();
                let dst = dst.clone();
                tokio::task::spawn_blocking(move || encrypt_one(&*encryptor, &mode, &src, &dst))
                    .await
            };
            match result {
                Ok(Ok(())) => {}
                Ok(Err(e)) => {
                    return self.fail(
                        artifacts,
                        PvError::Encrypt(format!("encrypting {}: {e}", src.display())),
                    );
                }
                Err(join_err) => {
                    return self.fail(
                        artifacts,
                        PvError::Other(anyhow::anyhow!("encryption worker failed: {join_err}")),
                    );
                }
            }

            progress.files_done += 1;
            progress.bytes_done += plaintext_size;
            let _ = self.progress_tx.send(progress.clone());
            artifacts.push(ShareArtifact::new(dst));
        }

        if cancelled {
            // A user abort is not an error: no reporting, staged
            // artifacts stay for the shutdown sweep.
            tracing::info!(staged = artifacts.len(), "share pipeline cancelled");
            let _ = self.state_tx.send(PipelineState::Cancelled);
            return ShareOutcome {
                state: PipelineState::Cancelled,
                artifacts,
                error: None,
                transport_error: None,
            };
        }

        tracing::info!(artifacts = artifacts.len(), "share pipeline completed");
        // Completed before the hand-off: a transport failure is
        // reported separately and does not reopen the run.
        let _ = self.state_tx.send(PipelineState::Completed);
        let transport_error = match transport.send(&artifacts) {
            Ok(()) => None,
            Err(e) => {
                tracing::error!("outbound hand-off failed: {e}");
                Some(e)
            }
        };
        ShareOutcome {
            state: PipelineState::Completed,
            artifacts,
            error: None,
            transport_error,
        }
    }

    fn fail(&self, artifacts: Vec<ShareArtifact>, error: PvError) -> ShareOutcome {
        tracing::error!(staged = artifacts.len(), "share pipeline failed: {error}");
        let _ = self.state_tx.send(PipelineState::Failed);
        ShareOutcome {
            state: PipelineState::Failed,
            artifacts,
            error: Some(error),
            transport_error: None,
        }
    }
}

/// Encrypt one source file into its staged destination, full stream.
fn encrypt_one(
    encryptor: &dyn Encryptor,
    mode: &EncryptionMode,
    src: &std::path::Path,
    dst: &std::path::Path,
) -> PvResult<()> {
    let mut input = File::open(src)?;
    let mut output = File::create(dst)?;
    encryptor.encrypt(mode, &mut input, &mut output)?;
    Ok(())
}
