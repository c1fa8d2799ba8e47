use thiserror::Error;

/// Why an installation or uninstallation could not complete.
#[derive(Debug, Error)]
pub enum InstallError {
    #[error("unable to locate the {0}")]
    Discovery(&'static str),
    #[error("no game channel found in {0}")]
    NoChannel(String),
    #[error("the latest translation version is unavailable")]
    RemoteUnavailable,
    #[error("the translation download failed")]
    Download,
    #[error("the downloaded translation is unusable: {0}")]
    CorruptArtifact(String),
    #[error("file system error: {0}")]
    Io(#[from] std::io::Error),
    #[error("could not update channel(s): {0}")]
    Channels(String),
}

impl InstallError {
    /// Errors that come from the environment rather than from a bug or the
    /// local disk are only worth a warning.
    pub fn is_transient(&self) -> bool {
        matches!(self, InstallError::RemoteUnavailable | InstallError::Download)
    }
}
