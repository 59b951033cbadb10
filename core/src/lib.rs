// Copyright (c) 2022-2023 The MobileCoin Foundation

//! Air-gapped signing device core
//!
//! This provides the device side of a QR-transport signing device: PIN
//! protected secret storage, host command routing, built-in command handlers,
//! and chunk codecs for splitting responses into displayable parts.
//!
//! Host commands are whitespace-prefixed byte streams (see [proto::command]),
//! responses are staged and served as parts in one of the [encoder::Format]s.
//!
//! ## Operations
//!
//! ### Booting
//!
//! [Device::boot] activates an extension staged by a previous `importapp`,
//! then loads the persisted secret. An unprovisioned device boots into
//! [PinState::Unprovisioned].
//!
//! ### PIN lifecycle
//!
//! PIN operations go through the [SecretStore][keystore::SecretStore]:
//!
//! 1. [`provision`][keystore::SecretStore::provision] a fresh secret under a PIN
//! 2. [`unlock`][keystore::SecretStore::unlock] with a PIN, each attempt
//!    decrements the persisted counter _before_ verification, an attempt
//!    started with an exhausted counter factory resets the device
//! 3. [`lock`][keystore::SecretStore::lock] or
//!    [`change_pin`][keystore::SecretStore::change_pin]
//!
//! The [antiphishing word][keystore::SecretStore::antiphishing_word] for a
//! partial PIN lets users recognise their device before completing entry.
//!
//! ### Host commands
//!
//! | prefix      | handler                         |
//! |-------------|---------------------------------|
//! | `getrandom` | [apps::GetRandom]               |
//! | `getlabel`  | [apps::Label]                   |
//! | `setlabel`  | [apps::Label]                   |
//! | `importapp` | [apps::AppInstaller]            |
//!
//! Handlers ask the user to confirm via [router::Confirm], a declined or
//! timed out confirmation is reported as `error: User cancelled`.

pub use qrsign_proto as proto;

pub mod apps;

pub mod config;
pub use config::Config;

pub mod consts;

mod device;
pub use device::{Device, HostReply, USER_CANCELLED_MSG};

pub mod encoder;

mod error;
pub use error::{Error, ErrorKind, AUTH_FAILED_MSG};

pub mod keystore;
pub use keystore::PinState;

pub mod router;

pub mod storage;

/// Common imports for device consumers
pub mod prelude {
    pub use crate::{
        config::Config,
        device::{Device, HostReply},
        encoder::{ChunkCodec, Format, PartDecoder},
        keystore::{PinState, SecretStore},
        router::{CommandHandler, Confirm, Meta, Outcome, Prompt, Response},
        storage::{FsStorage, Storage},
        Error, ErrorKind,
    };
}
