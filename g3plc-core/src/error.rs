use thiserror::Error;

/// Main error type for G3-PLC protocol operations
#[derive(Error, Debug)]
pub enum G3Error {
    #[error("Link error: {0}")]
    Link(#[from] std::io::Error),

    #[error("Encode error: {0}")]
    Encode(String),

    #[error("Decode error: {0}")]
    Decode(String),

    #[error("Frame invalid: {0}")]
    FrameInvalid(String),

    #[error("Protocol error: {0}")]
    Protocol(String),

    #[error("Association error: {0}")]
    Association(String),

    #[error("Timeout")]
    Timeout,

    #[error("Invalid configuration: {0}")]
    Config(String),
}

/// Result type alias for G3-PLC protocol operations
pub type G3Result<T> = Result<T, G3Error>;
