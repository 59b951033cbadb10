// Copyright (c) 2022-2023 The MobileCoin Foundation

//! Master secret and PIN authentication
//!
//! The [SecretStore] owns the device master secret and the PIN lifecycle:
//!
//! ```text
//! Unprovisioned -> Locked -> Unlocked -> { Locked (lock), FactoryReset }
//! ```
//!
//! Each unlock attempt consumes one unit of the persisted attempt counter
//! _before_ the PIN is checked. An attempt starting with an exhausted counter
//! wipes the store regardless of the PIN supplied. Failures persisting the
//! counter or the secret are fatal and halt the store until the device
//! is reset.

use std::{collections::HashSet, io, sync::Arc};

use rand_core::{OsRng, RngCore};
use serde::{Deserialize, Serialize};
use strum::Display;
use zeroize::Zeroizing;

#[cfg(feature = "log")]
use log::{debug, error, info, warn};

use crate::{
    consts::{COUNTER_FILE, SECRET_FILE},
    storage::{wipe, Storage, WipeReport},
    Error,
};

mod crypto;
pub use crypto::{SECRET_LEN, TAG_LEN};

/// PIN lifecycle states
#[derive(Copy, Clone, PartialEq, Eq, Debug, Display)]
pub enum PinState {
    /// No secret has been provisioned
    Unprovisioned,
    /// Secret loaded, PIN required
    Locked,
    /// PIN verified
    Unlocked,
    /// Store wiped, terminal until reset
    FactoryReset,
}

/// Persisted secret file
#[derive(Serialize, Deserialize)]
struct SecretFile {
    secret: String,
    hmac: String,
}

/// Persisted attempt counter file
#[derive(Serialize, Deserialize)]
struct CounterFile {
    pin_counter: u32,
}

/// Device master secret store
pub struct SecretStore {
    storage: Arc<dyn Storage>,
    max_attempts: u32,
    secret: Option<Zeroizing<[u8; SECRET_LEN]>>,
    tag: Option<[u8; TAG_LEN]>,
    state: PinState,
    halted: bool,
}

impl SecretStore {
    /// Create a new store over the provided storage, call [SecretStore::load]
    /// to restore a persisted secret
    pub fn new(storage: Arc<dyn Storage>, max_attempts: u32) -> Self {
        Self {
            storage,
            max_attempts,
            secret: None,
            tag: None,
            state: PinState::Unprovisioned,
            halted: false,
        }
    }

    /// Current lifecycle state
    pub fn state(&self) -> PinState {
        self.state
    }

    /// Check whether a fatal failure has halted the store
    pub fn is_halted(&self) -> bool {
        self.halted
    }

    /// Load the persisted secret and integrity tag
    pub fn load(&mut self) -> Result<(), Error> {
        let d = match self.storage.read(SECRET_FILE) {
            Ok(Some(d)) => d,
            Ok(None) => {
                self.state = PinState::Unprovisioned;
                return Err(Error::NotProvisioned);
            }
            Err(e) => return Err(Error::storage("read secret", e)),
        };

        let f: SecretFile =
            serde_json::from_slice(&d).map_err(|e| Error::storage("parse secret", invalid(e)))?;

        let mut secret = Zeroizing::new([0u8; SECRET_LEN]);
        hex::decode_to_slice(&f.secret, &mut secret[..])
            .map_err(|e| Error::storage("decode secret", invalid(e)))?;

        let mut tag = [0u8; TAG_LEN];
        hex::decode_to_slice(&f.hmac, &mut tag)
            .map_err(|e| Error::storage("decode hmac", invalid(e)))?;

        self.secret = Some(secret);
        self.tag = Some(tag);
        self.state = PinState::Locked;

        #[cfg(feature = "log")]
        debug!("secret loaded, state: {}", self.state);

        Ok(())
    }

    /// Derive the PIN key for the loaded secret
    pub fn derive_key(&self, pin: &[u8]) -> Result<Zeroizing<[u8; 32]>, Error> {
        let secret = self.secret.as_ref().ok_or(Error::InvalidState)?;
        crypto::pin_key(&secret[..], pin)
    }

    /// Check a PIN against the stored integrity tag.
    ///
    /// This does not touch the attempt counter, see [SecretStore::unlock]
    /// for a counted attempt.
    pub fn verify_pin(&self, pin: &[u8]) -> Result<bool, Error> {
        let (secret, tag) = match (&self.secret, &self.tag) {
            (Some(s), Some(t)) => (s, t),
            _ => return Err(Error::InvalidState),
        };

        let key = self.derive_key(pin)?;
        let calc = crypto::integrity_tag(&key[..], &secret[..])?;

        Ok(crypto::tags_match(&calc, tag))
    }

    /// Compute the integrity tag under `pin` and persist secret and tag
    pub fn save_secret(&mut self, pin: &[u8]) -> Result<(), Error> {
        self.check_halted()?;

        let secret = self.secret.as_ref().ok_or(Error::InvalidState)?;
        let key = self.derive_key(pin)?;
        let tag = crypto::integrity_tag(&key[..], &secret[..])?;

        let f = Zeroizing::new(
            serde_json::to_vec(&SecretFile {
                secret: hex::encode(&secret[..]),
                hmac: hex::encode(tag),
            })
            .map_err(|e| Error::fatal("encode secret", invalid(e)))?,
        );

        let r = self
            .storage
            .write(SECRET_FILE, &f)
            .map_err(|e| Error::fatal("write secret", e));
        self.halt_on_fatal(r)?;

        self.tag = Some(tag);

        Ok(())
    }

    /// Read the persisted attempt counter, absent counters are full
    pub fn read_counter(&mut self) -> Result<u32, Error> {
        let r = match self.storage.read(COUNTER_FILE) {
            Ok(None) => Ok(self.max_attempts),
            Ok(Some(d)) => serde_json::from_slice::<CounterFile>(&d)
                .map(|c| c.pin_counter.min(self.max_attempts))
                .map_err(|e| Error::fatal("parse counter", invalid(e))),
            Err(e) => Err(Error::fatal("read counter", e)),
        };

        self.halt_on_fatal(r)
    }

    /// Persist the attempt counter, failure halts the store
    pub fn save_counter(&mut self, n: u32) -> Result<(), Error> {
        self.check_halted()?;

        let r = serde_json::to_vec(&CounterFile { pin_counter: n })
            .map_err(|e| Error::fatal("encode counter", invalid(e)))
            .and_then(|d| {
                self.storage
                    .write(COUNTER_FILE, &d)
                    .map_err(|e| Error::fatal("write counter", e))
            });

        self.halt_on_fatal(r)
    }

    /// Restore the counter to the maximum by removing the counter file,
    /// failure halts the store
    pub fn reset_counter(&mut self) -> Result<(), Error> {
        self.check_halted()?;

        let r = self
            .storage
            .remove(COUNTER_FILE)
            .map_err(|e| Error::fatal("remove counter", e));

        self.halt_on_fatal(r)
    }

    /// Remaining PIN attempts
    pub fn attempts_remaining(&mut self) -> Result<u32, Error> {
        self.read_counter()
    }

    /// Antiphishing word for a PIN fragment
    pub fn antiphishing_word(&self, pin_part: &[u8]) -> Result<&'static str, Error> {
        let secret = self.secret.as_ref().ok_or(Error::InvalidState)?;
        let n = crypto::auth_word_index(&secret[..], pin_part)?;

        bip39::Language::English
            .word_list()
            .get(n)
            .copied()
            .ok_or(Error::InvalidState)
    }

    /// Wipe the storage root except blacklisted names and forget the
    /// in-memory secret
    pub fn factory_wipe(&mut self, blacklist: &HashSet<String>) -> WipeReport {
        #[cfg(feature = "log")]
        warn!("factory wipe ({} names retained)", blacklist.len());

        let report = wipe(self.storage.root(), blacklist);

        self.teardown();
        self.state = PinState::FactoryReset;

        report
    }

    /// Generate and persist a new random secret protected by `pin`
    pub fn provision(&mut self, pin: &[u8]) -> Result<(), Error> {
        self.check_halted()?;

        if self.state != PinState::Unprovisioned {
            return Err(Error::InvalidState);
        }

        let mut secret = Zeroizing::new([0u8; SECRET_LEN]);
        OsRng.fill_bytes(&mut secret[..]);
        self.secret = Some(secret);

        self.save_secret(pin)?;
        self.reset_counter()?;

        self.state = PinState::Unlocked;

        #[cfg(feature = "log")]
        info!("device provisioned");

        Ok(())
    }

    /// Counted unlock attempt
    pub fn unlock(&mut self, pin: &[u8]) -> Result<(), Error> {
        if self.state != PinState::Locked {
            return Err(Error::InvalidState);
        }

        self.attempt(pin)?;
        self.state = PinState::Unlocked;

        #[cfg(feature = "log")]
        debug!("state: {}", self.state);

        Ok(())
    }

    /// Change the PIN, the old PIN is checked as a counted attempt
    pub fn change_pin(&mut self, old: &[u8], new: &[u8]) -> Result<(), Error> {
        if self.state != PinState::Unlocked {
            return Err(Error::InvalidState);
        }

        self.attempt(old)?;
        self.save_secret(new)
    }

    /// Return to the locked state (logout)
    pub fn lock(&mut self) {
        if self.state == PinState::Unlocked {
            self.state = PinState::Locked;
        }
    }

    /// Drop the in-memory secret, [SecretStore::load] is required before
    /// further use
    pub fn teardown(&mut self) {
        // Zeroizing clears the secret on drop
        self.secret = None;
        self.tag = None;
        self.state = PinState::Unprovisioned;
    }

    /// Consume one attempt then check the PIN
    fn attempt(&mut self, pin: &[u8]) -> Result<(), Error> {
        self.check_halted()?;

        let n = self.read_counter()?;

        if n == 0 {
            #[cfg(feature = "log")]
            error!("attempt counter exhausted, wiping device");

            let r = self.factory_wipe(&HashSet::new());
            if !r.is_complete() {
                self.halted = true;
            }

            return Err(Error::LockedOut);
        }

        self.save_counter(n - 1)?;

        #[cfg(feature = "log")]
        debug!("pin attempt, {} remaining", n - 1);

        if !self.verify_pin(pin)? {
            return Err(Error::InvalidPin);
        }

        self.reset_counter()
    }

    fn check_halted(&self) -> Result<(), Error> {
        match self.halted {
            true => Err(Error::Halted),
            false => Ok(()),
        }
    }

    fn halt_on_fatal<T>(&mut self, r: Result<T, Error>) -> Result<T, Error> {
        if let Err(e) = &r {
            if e.is_fatal() {
                #[cfg(feature = "log")]
                error!("fatal storage failure, halting: {}", e);

                self.halted = true;
            }
        }
        r
    }
}

impl Drop for SecretStore {
    fn drop(&mut self) {
        self.teardown();
    }
}

fn invalid<E: std::error::Error + Send + Sync + 'static>(e: E) -> io::Error {
    io::Error::new(io::ErrorKind::InvalidData, e)
}
