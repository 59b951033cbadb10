// Copyright (c) 2022-2023 The MobileCoin Foundation

/// Wire format errors
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Buffer or stream too short for the encoded object
    #[error("Invalid length")]
    InvalidLength,

    /// Non-canonical or otherwise invalid encoding
    #[error("Invalid encoding")]
    InvalidEncoding,

    /// Command prefix does not match the expected prefix
    #[error("Prefix is not valid: {0}")]
    InvalidPrefix(String),

    /// Bundle declares no signatures
    #[error("At least one signature is required")]
    NoSignatures,

    /// Bundle declares more signatures than supported
    #[error("Too many signatures: {0}")]
    TooManySignatures(u64),

    /// Signature blob exceeds the maximum signature size
    #[error("Signature is too long: {0} bytes")]
    SignatureTooLong(u64),

    /// Stream ended before the declared payload length
    #[error("Unexpected end of stream")]
    UnexpectedEof,

    /// Underlying I/O failure
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<encdec::Error> for Error {
    fn from(_: encdec::Error) -> Self {
        Error::InvalidLength
    }
}

impl Error {
    /// Map `UnexpectedEof` I/O errors onto the wire-level variant
    pub(crate) fn from_io(e: std::io::Error) -> Self {
        match e.kind() {
            std::io::ErrorKind::UnexpectedEof => Error::UnexpectedEof,
            _ => Error::Io(e),
        }
    }
}
