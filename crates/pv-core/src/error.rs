use thiserror::Error;

pub type PvResult<T> = Result<T, PvError>;

#[derive(Debug, Error)]
pub enum PvError {
    /// Invalid arguments detected before any work started
    /// (e.g. a share prepared with no encryption mode).
    #[error("precondition failed: {0}")]
    Precondition(String),

    #[error("trust store error: {0}")]
    Trust(String),

    #[error("encryption error: {0}")]
    Encrypt(String),

    #[error("transport error: {0}")]
    Transport(String),

    #[error("config error: {0}")]
    Config(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}
