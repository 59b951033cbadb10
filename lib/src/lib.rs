// Copyright (c) 2022-2023 The MobileCoin Foundation

//! QRSign host library (and CLI)
//!
//! Host-side tooling for the QRSign device: building and signing extension
//! install bundles, verifying bundles against a trust key, and encoding or
//! reassembling chunked transport parts.

/// Re-export `qrsign-core` for consumers
pub use qrsign_core as core;

/// Re-export `qrsign-proto` for consumers
pub use qrsign_proto as proto;

pub mod bundle;
pub use bundle::{sign_bundle, verify_bundle, Verdict, Verification};

mod error;
pub use error::Error;

pub mod transport;
pub use transport::{decode_parts, encode_parts, render_part};
