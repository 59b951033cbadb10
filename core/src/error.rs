// Copyright (c) 2022-2023 The MobileCoin Foundation

use std::io;

use strum::{Display, EnumString};

/// Generic message for authentication failures, shared by all auth variants
pub const AUTH_FAILED_MSG: &str = "PIN verification failed";

/// Device errors
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// No handler registered for the command prefix
    #[error("Host command is not recognized")]
    UnrecognizedCommand,

    /// Prefix is empty, contains whitespace, or overlaps a registered prefix
    #[error("Prefix conflict: {0}")]
    PrefixConflict(String),

    /// Handler rejected the command, message is safe to echo to the host
    #[error("{0}")]
    Command(String),

    /// Malformed command encoding
    #[error("{0}")]
    Proto(#[from] qrsign_proto::Error),

    /// Transport part could not be decoded
    #[error("Invalid part: {0}")]
    InvalidPart(String),

    /// PIN did not match
    #[error("{}", AUTH_FAILED_MSG)]
    InvalidPin,

    /// Attempt counter exhausted
    #[error("{}", AUTH_FAILED_MSG)]
    LockedOut,

    /// Host command received before the device was unlocked
    #[error("{}", AUTH_FAILED_MSG)]
    Locked,

    /// Extension signature did not verify against the trust key
    #[error("Invalid signature")]
    InvalidSignature,

    /// Storage failure, fatal failures halt the device
    #[error("Storage failure ({context}): {source}")]
    Persistence {
        fatal: bool,
        context: &'static str,
        #[source]
        source: io::Error,
    },

    /// No persisted secret exists
    #[error("Device is not provisioned")]
    NotProvisioned,

    /// Operation requires a state the device is not in
    #[error("Invalid device state")]
    InvalidState,

    /// Missing or invalid configuration
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// Another command is already being processed
    #[error("Device is busy")]
    Busy,

    /// A fatal storage failure occurred, the device must be reset
    #[error("Device halted, reset required")]
    Halted,
}

/// Error classes, used to decide how an error is surfaced
#[derive(Copy, Clone, PartialEq, Eq, Debug, Display, EnumString)]
#[strum(serialize_all = "snake_case")]
pub enum ErrorKind {
    Protocol,
    Auth,
    Trust,
    Persistence,
    State,
}

impl Error {
    /// Build a recoverable persistence error
    pub fn storage(context: &'static str, source: io::Error) -> Self {
        Self::Persistence {
            fatal: false,
            context,
            source,
        }
    }

    /// Build a fatal persistence error
    pub fn fatal(context: &'static str, source: io::Error) -> Self {
        Self::Persistence {
            fatal: true,
            context,
            source,
        }
    }

    /// Shorthand for a [Error::Command] with the provided message
    pub fn command(msg: impl Into<String>) -> Self {
        Self::Command(msg.into())
    }

    /// Check whether this error requires halting the device
    pub fn is_fatal(&self) -> bool {
        matches!(self, Self::Persistence { fatal: true, .. } | Self::Halted)
    }

    /// Fetch the class of this error
    pub fn kind(&self) -> ErrorKind {
        use Error::*;

        match self {
            UnrecognizedCommand | PrefixConflict(_) | Command(_) | Proto(_) | InvalidPart(_) => {
                ErrorKind::Protocol
            }
            InvalidPin | LockedOut | Locked | NotProvisioned => ErrorKind::Auth,
            InvalidSignature => ErrorKind::Trust,
            Persistence { .. } | Halted => ErrorKind::Persistence,
            InvalidState | Configuration(_) | Busy => ErrorKind::State,
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn auth_errors_are_indistinguishable() {
        assert_eq!(Error::InvalidPin.to_string(), Error::LockedOut.to_string());
        assert_eq!(Error::InvalidPin.kind(), Error::NotProvisioned.kind());
        assert_eq!(Error::Locked.to_string(), AUTH_FAILED_MSG);
        assert_eq!(Error::Locked.kind(), ErrorKind::Auth);
    }

    #[test]
    fn fatal_classification() {
        let e = Error::fatal("counter", io::Error::new(io::ErrorKind::Other, "nope"));
        assert!(e.is_fatal());
        assert_eq!(e.kind(), ErrorKind::Persistence);

        let e = Error::storage("label", io::Error::new(io::ErrorKind::Other, "nope"));
        assert!(!e.is_fatal());
    }

    #[test]
    fn command_messages_echo_verbatim() {
        let e = Error::command("Sorry, 1k bytes max.");
        assert_eq!(e.to_string(), "Sorry, 1k bytes max.");
        assert_eq!(e.kind(), ErrorKind::Protocol);
    }
}
