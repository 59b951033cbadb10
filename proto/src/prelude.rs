// Copyright (c) 2022-2023 The MobileCoin Foundation

//! Prelude to simplify downstream use of wire objects
//!

pub use crate::{
    bundle::{Bundle, BundleHeader},
    command::{expect_prefix, is_valid_prefix, read_prefix, split},
    compact::CompactUint,
    hash::{app_digest, app_digest_stream, tagged_hash},
    Error as ProtoError, APP_SIGNING_TAG, IMPORT_APP_PREFIX, MAX_PREFIX_LEN, MAX_SIGS, MAX_SIG_LEN,
};
