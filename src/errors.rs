use thiserror::Error;

/// Everything that can go wrong between a network file and a ready evaluator.
///
/// Evaluation itself is total: once a network is loaded, no evaluation path
/// can fail for a well-formed position view.
#[derive(Debug, Error)]
pub enum NnueError {
    /// The network file could not be opened or read.
    #[error("failed to read network file: {0}")]
    Io(#[from] std::io::Error),
    /// The byte image is not a valid network of the supported version.
    #[error("malformed network file: {0}")]
    Format(&'static str),
    /// Evaluation was requested before a network was installed.
    #[error("no network has been loaded")]
    Unready,
}
