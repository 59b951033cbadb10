// Copyright (c) 2022-2023 The MobileCoin Foundation

//! Built-in command handlers

mod getrandom;
pub use getrandom::GetRandom;

mod installer;
pub use installer::{default_trust_key, promote_staged, verify_signature, AppInstaller};

mod label;
pub use label::Label;

use crate::Error;

/// Check a dispatched prefix belongs to the handler
pub(crate) fn check_prefix(prefix: &[u8], allowed: &[&[u8]]) -> Result<(), Error> {
    match allowed.iter().any(|p| *p == prefix) {
        true => Ok(()),
        false => Err(Error::command(format!(
            "Prefix is not valid: {}",
            String::from_utf8_lossy(prefix)
        ))),
    }
}

/// Read the remaining payload, bounded to `max` bytes
pub(crate) fn read_payload(
    stream: &mut dyn crate::router::HostStream,
    max: usize,
) -> Result<Vec<u8>, Error> {
    use std::io::Read;

    let mut d = vec![];
    stream
        .take(max as u64 + 1)
        .read_to_end(&mut d)
        .map_err(|e| Error::storage("read payload", e))?;

    if d.len() > max {
        return Err(Error::command("Payload is too long"));
    }

    Ok(d)
}
