// Copyright (c) 2022-2023 The MobileCoin Foundation

//! Device label, `getlabel` / `setlabel <label>`

use std::sync::Arc;

use async_trait::async_trait;

#[cfg(feature = "log")]
use log::warn;

use super::{check_prefix, read_payload};
use crate::{
    consts::LABEL_FILE,
    router::{CommandHandler, Confirm, HostStream, Meta, Outcome, Prompt, Response},
    storage::Storage,
    Error,
};

const PREFIXES: &[&[u8]] = &[b"getlabel", b"setlabel"];

/// Maximum label length
pub const MAX_LABEL_LEN: usize = 64;

/// Device label handler
pub struct Label {
    storage: Arc<dyn Storage>,
    default: String,
}

impl Label {
    pub fn new(storage: Arc<dyn Storage>, default: impl Into<String>) -> Self {
        Self {
            storage,
            default: default.into(),
        }
    }

    /// Current label, the default when unset or unreadable
    pub fn get(&self) -> String {
        match self.storage.read(LABEL_FILE) {
            Ok(Some(d)) if !d.is_empty() => String::from_utf8_lossy(&d).into_owned(),
            _ => self.default.clone(),
        }
    }

    /// Store a new label
    pub fn set(&self, label: &str) -> Result<(), Error> {
        self.storage
            .write(LABEL_FILE, label.as_bytes())
            .map_err(|e| Error::storage("write label", e))
    }
}

#[async_trait]
impl CommandHandler for Label {
    fn prefixes(&self) -> &'static [&'static [u8]] {
        PREFIXES
    }

    async fn process(
        &self,
        prefix: &[u8],
        stream: &mut dyn HostStream,
        confirm: &dyn Confirm,
    ) -> Result<Outcome, Error> {
        check_prefix(prefix, PREFIXES)?;

        if prefix == b"getlabel" {
            let label = self.get();
            let meta = Meta::title(format!("Device's label is: {label}"));
            return Ok(Outcome::Accepted(Response::new(label.into_bytes(), meta)));
        }

        let payload = read_payload(stream, MAX_LABEL_LEN)?;
        let label = std::str::from_utf8(&payload)
            .ok()
            .filter(|s| s.is_ascii())
            .ok_or_else(|| Error::command("Device label must be ASCII"))?
            .trim()
            .to_string();

        if label.is_empty() {
            return Err(Error::command("Device label cannot be empty"));
        }

        let p = Prompt::new(
            format!("Set device label to: {label}"),
            format!("Current device label: {}", self.get()),
        );
        if !confirm.confirm(p).await {
            return Ok(Outcome::Declined);
        }

        // Label persistence is best effort
        if let Err(_e) = self.set(&label) {
            #[cfg(feature = "log")]
            warn!("failed to persist label: {}", _e);
        }

        let meta = Meta::title(format!("New device label: {label}"));
        Ok(Outcome::Accepted(Response::new(label.into_bytes(), meta)))
    }
}
