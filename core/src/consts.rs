// Copyright (c) 2022-2023 The MobileCoin Foundation

//! Device constants

/// Trust key for extension bundles (compressed SEC1, private key is `b"1" * 32`)
pub const TRUST_PUBKEY: &str =
    "036930f46dd0b16d866d59d1054aa63298b357499cd1862ef16f3f55f1cafceb82";

/// Number of valid signatures required to install an extension
pub const REQUIRED_SIGNATURES: usize = 1;

/// Chunk size for streaming extension payloads
pub const INSTALL_CHUNK_LEN: usize = 100;

/// Secret file name, JSON `{"secret": hex, "hmac": hex}`
pub const SECRET_FILE: &str = "secret.json";

/// Attempt counter file name, JSON `{"pin_counter": n}`
pub const COUNTER_FILE: &str = "pin_counter.json";

/// Device label file name, raw text
pub const LABEL_FILE: &str = "label";

/// Active extension slot
pub const EXTENSION_ACTIVE: &str = "extra_apps/mod1.mpy";

/// Staged extension slot, promoted to active at boot
pub const EXTENSION_STAGED: &str = "extra_apps/mod1.mpy.staged";

/// Temporary file for in-progress extension writes
pub const EXTENSION_TMP: &str = "extra_apps/mod1.mpy.tmp";

/// Context tag for antiphishing word derivation
pub const AUTH_TAG: &str = "auth";

/// Number of words in the antiphishing word list
pub const WORDLIST_LEN: usize = 2048;
