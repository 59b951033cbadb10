// Copyright (c) 2022-2023 The MobileCoin Foundation

//! Device wiring
//!
//! A [Device] owns the [SecretStore], the [CommandRouter] with the built-in
//! handlers registered, and renders dispatch results for the host as
//! [HostReply]s using the configured transport [Format][crate::encoder::Format].

use std::{io::Cursor, sync::Arc};

#[cfg(feature = "log")]
use log::{debug, info, warn};

use crate::{
    apps::{promote_staged, AppInstaller, GetRandom, Label},
    config::Config,
    encoder::{encoder, ChunkCodec},
    error::AUTH_FAILED_MSG,
    keystore::{PinState, SecretStore},
    router::{CommandRouter, Confirm, Meta, Outcome, Response},
    storage::{FsStorage, Storage},
    Error, ErrorKind,
};

/// Message sent when the user declines a command
pub const USER_CANCELLED_MSG: &str = "User cancelled";

/// Host-wire rendering of a dispatch result
pub enum HostReply {
    /// Accepted command, response staged for display
    Response {
        meta: Meta,
        codec: Box<dyn ChunkCodec>,
    },
    /// Error line shown to the host
    Error(String),
}

impl HostReply {
    /// Reply for a declined command
    pub fn declined() -> Self {
        Self::Error(format!("error: {USER_CANCELLED_MSG}"))
    }

    /// Reply for a failed command, auth failures never leak detail
    pub fn from_error(e: &Error) -> Self {
        match e.kind() {
            ErrorKind::Auth => Self::Error(format!("error: {AUTH_FAILED_MSG}")),
            _ => Self::Error(format!("error: {e}")),
        }
    }

    /// Error line, if this reply is an error
    pub fn error(&self) -> Option<&str> {
        match self {
            Self::Error(e) => Some(e.as_str()),
            _ => None,
        }
    }

    /// Response metadata, if this reply carries data
    pub fn meta(&self) -> Option<&Meta> {
        match self {
            Self::Response { meta, .. } => Some(meta),
            _ => None,
        }
    }

    /// Take the response codec, if this reply carries data
    pub fn into_codec(self) -> Option<Box<dyn ChunkCodec>> {
        match self {
            Self::Response { codec, .. } => Some(codec),
            _ => None,
        }
    }
}

/// Signing device
pub struct Device {
    config: Config,
    storage: Arc<dyn Storage>,
    store: SecretStore,
    router: CommandRouter,
    installer: Arc<AppInstaller>,
}

impl Device {
    /// Create a device over the provided storage, registering built-in handlers
    pub fn new(config: Config, storage: Arc<dyn Storage>) -> Result<Self, Error> {
        config.validate()?;

        let installer = Arc::new(AppInstaller::with_default_key(storage.clone())?);

        let mut router = CommandRouter::new(Some(config.user_timeout()));
        router.register_all(Arc::new(GetRandom::new(config.max_random_bytes)))?;
        router.register_all(Arc::new(Label::new(
            storage.clone(),
            config.default_label.clone(),
        )))?;
        router.register_all(installer.clone())?;

        let store = SecretStore::new(storage.clone(), config.max_pin_attempts);

        Ok(Self {
            config,
            storage,
            store,
            router,
            installer,
        })
    }

    /// Create a device with filesystem storage at the configured root
    pub fn from_config(config: Config) -> Result<Self, Error> {
        let storage = FsStorage::new(&config.storage_root)
            .map_err(|e| Error::storage("open storage", e))?;

        Self::new(config, Arc::new(storage))
    }

    /// Boot the device, activating any staged extension then loading the secret
    pub fn boot(&mut self) -> Result<PinState, Error> {
        if promote_staged(self.storage.as_ref())? {
            #[cfg(feature = "log")]
            info!("extension activated at boot");
        }

        match self.store.load() {
            Ok(()) | Err(Error::NotProvisioned) => (),
            Err(e) => {
                #[cfg(feature = "log")]
                warn!("failed to load secret: {}", e);

                return Err(e);
            }
        }

        #[cfg(feature = "log")]
        debug!("boot complete, state: {}", self.store.state());

        Ok(self.store.state())
    }

    /// Handle a host command, rendering the result for the host.
    ///
    /// Host commands are only served while the device is unlocked.
    pub async fn handle(&self, cmd: &[u8], confirm: &dyn Confirm) -> HostReply {
        if self.store.state() != PinState::Unlocked {
            #[cfg(feature = "log")]
            warn!("host command refused, state: {}", self.store.state());

            return HostReply::from_error(&Error::Locked);
        }

        let mut stream = Cursor::new(cmd.to_vec());

        let r = match self.router.dispatch(&mut stream, confirm).await {
            Ok(Outcome::Accepted(resp)) => self.encode(resp),
            Ok(Outcome::Declined) => return HostReply::declined(),
            Err(e) => Err(e),
        };

        match r {
            Ok(reply) => reply,
            Err(e) => HostReply::from_error(&e),
        }
    }

    /// Wrap a response in the configured transport format
    fn encode(&self, mut resp: Response) -> Result<HostReply, Error> {
        let dir = self.config.staging_dir();
        let codec = encoder(
            self.config.format,
            &mut resp.data,
            self.config.part_len,
            Some(&dir),
        )?;

        Ok(HostReply::Response {
            meta: resp.meta,
            codec,
        })
    }

    /// Fetch and clear a pending reboot request, the host should call
    /// [Device::boot] when this returns true
    pub fn take_reboot_request(&self) -> bool {
        self.installer.take_reboot_request()
    }

    /// Cancel a pending user confirmation
    pub fn cancel(&self) {
        self.router.cancel()
    }

    /// PIN lifecycle state
    pub fn state(&self) -> PinState {
        self.store.state()
    }

    /// Access the secret store
    pub fn secrets(&mut self) -> &mut SecretStore {
        &mut self.store
    }

    /// Device configuration
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Registered command prefixes
    pub fn prefixes(&self) -> impl Iterator<Item = &[u8]> {
        self.router.prefixes()
    }
}
