use thiserror::Error;

/// Basic library error type
#[derive(Debug, Error)]
pub enum Error {
    /// Configuration could not be located, parsed or extracted
    #[error("Configuration error: {0}")]
    Config(String),
}

/// Error result type
pub type Result<T> = std::result::Result<T, Error>;
