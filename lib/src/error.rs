// Copyright (c) 2022-2023 The MobileCoin Foundation

/// QRSign host API error type
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Device engine error
    #[error("Device error: {0}")]
    Device(#[from] qrsign_core::Error),

    /// Wire decoding error
    #[error("Encoding error: {0}")]
    Proto(#[from] qrsign_proto::Error),

    /// Key could not be parsed
    #[error("Invalid key: {0}")]
    InvalidKey(String),

    /// Signing operation failed
    #[error("Signing failed: {0}")]
    Signing(String),

    /// Input ended before the payload was reassembled
    #[error("Incomplete payload ({0} parts received)")]
    Incomplete(usize),

    /// Part could not be decoded for transport
    #[error("Invalid part: {0}")]
    InvalidPart(String),

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}
