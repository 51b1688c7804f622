//! Secure-sharing pipeline: stage selected files, encrypt each with the
//! chosen mode, hand the artifacts to an outbound transport.

pub mod encryptor;
pub mod pipeline;
pub mod staging;
pub mod transport;

pub use encryptor::{AgeEncryptor, EncryptionMode, Encryptor};
pub use pipeline::{PipelineState, ShareOutcome, SharePipeline, ShareProgress};
pub use staging::StagingArea;
pub use transport::{NullTransport, ShareArtifact, Transport, OCTET_STREAM};
