// Copyright (c) 2022-2023 The MobileCoin Foundation

//! Wire formats for communication with air-gapped signing devices
//!
//! Host commands are plain byte streams of the form `<prefix> <payload...>`,
//! where the prefix is the leading run of non-whitespace bytes and exactly
//! one ASCII space separates it from a handler-specific payload
//! (see [command]).
//!
//! Extensions are delivered as signed install bundles (see [bundle]):
//!
//! ```text
//! b"importapp " || compact(num_sigs) || { compact(sig_len) || sig }* || compact(payload_len) || payload
//! ```
//!
//! Length prefixes use the [compact] unsigned integer encoding, and
//! signatures cover a domain-separated [tagged hash][hash::tagged_hash] of
//! the payload digest so they cannot be replayed in another protocol.
//!

pub mod bundle;
pub mod command;
pub mod compact;
pub mod hash;
pub mod prelude;

mod error;
pub use error::Error;

/// Command prefix for extension install bundles
pub const IMPORT_APP_PREFIX: &[u8] = b"importapp";

/// Signing context tag for extension install bundles
pub const APP_SIGNING_TAG: &str = "diyapp";

/// Exclusive upper bound on encoded signature length (DER ECDSA is at most 72 bytes)
pub const MAX_SIG_LEN: usize = 74;

/// Maximum number of signatures accepted in a bundle
pub const MAX_SIGS: usize = 16;

/// Maximum prefix length scanned when reading a command
pub const MAX_PREFIX_LEN: usize = 20;
