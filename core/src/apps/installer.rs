// Copyright (c) 2022-2023 The MobileCoin Foundation

//! Signed extension installer, `importapp <bundle>`
//!
//! Bundle signatures are checked against the trust key before the user is
//! asked to confirm, and before any byte is written. Accepted payloads are
//! streamed to a temporary slot then renamed to the staged slot, the active
//! extension is only replaced by [promote_staged] at boot.

use std::{
    io::{Read, Seek, SeekFrom, Write},
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc,
    },
};

use async_trait::async_trait;
use k256::ecdsa::{signature::hazmat::PrehashVerifier, Signature, VerifyingKey};
use sha2::{Digest, Sha256};

#[cfg(feature = "log")]
use log::{debug, info, warn};

use qrsign_proto::{
    bundle::BundleHeader,
    hash::{app_digest_stream, tagged_hash},
    APP_SIGNING_TAG, IMPORT_APP_PREFIX,
};

use super::check_prefix;
use crate::{
    consts::{
        EXTENSION_ACTIVE, EXTENSION_STAGED, EXTENSION_TMP, INSTALL_CHUNK_LEN, REQUIRED_SIGNATURES,
        TRUST_PUBKEY,
    },
    router::{CommandHandler, Confirm, HostStream, Meta, Outcome, Prompt, Response},
    storage::Storage,
    Error,
};

const PREFIXES: &[&[u8]] = &[IMPORT_APP_PREFIX];

/// Extension installer
pub struct AppInstaller {
    storage: Arc<dyn Storage>,
    trust_key: VerifyingKey,
    reboot: AtomicBool,
}

impl AppInstaller {
    /// Create an installer trusting the provided key
    pub fn new(storage: Arc<dyn Storage>, trust_key: VerifyingKey) -> Self {
        Self {
            storage,
            trust_key,
            reboot: AtomicBool::new(false),
        }
    }

    /// Create an installer trusting the built-in key
    pub fn with_default_key(storage: Arc<dyn Storage>) -> Result<Self, Error> {
        Ok(Self::new(storage, default_trust_key()?))
    }

    /// Fetch and clear a pending reboot request
    pub fn take_reboot_request(&self) -> bool {
        self.reboot.swap(false, Ordering::SeqCst)
    }

    /// Count signatures over `digest` that verify against the trust key
    pub fn count_valid(&self, sigs: &[Vec<u8>], digest: &[u8; 32]) -> usize {
        sigs.iter()
            .filter(|s| verify_signature(&self.trust_key, s, digest))
            .count()
    }

    /// Stream `len` payload bytes to the staged slot, checking they hash to `digest`
    fn stage(&self, stream: &mut dyn HostStream, len: u64, digest: &[u8; 32]) -> Result<(), Error> {
        let r = self.write_tmp(stream, len, digest);

        if r.is_err() {
            let _ = self.storage.remove(EXTENSION_TMP);
            return r;
        }

        self.storage
            .rename(EXTENSION_TMP, EXTENSION_STAGED)
            .map_err(|e| Error::storage("stage extension", e))
    }

    fn write_tmp(&self, stream: &mut dyn HostStream, len: u64, digest: &[u8; 32]) -> Result<(), Error> {
        let mut f = self
            .storage
            .create(EXTENSION_TMP)
            .map_err(|e| Error::storage("create extension", e))?;

        let mut h = Sha256::new();
        let mut buff = [0u8; INSTALL_CHUNK_LEN];
        let mut remaining = len;

        while remaining > 0 {
            let n = remaining.min(INSTALL_CHUNK_LEN as u64) as usize;
            stream
                .read_exact(&mut buff[..n])
                .map_err(|e| Error::storage("read extension", e))?;

            h.update(&buff[..n]);
            f.write_all(&buff[..n])
                .map_err(|e| Error::storage("write extension", e))?;

            remaining -= n as u64;
        }

        f.flush().map_err(|e| Error::storage("write extension", e))?;

        // Written bytes must match the verified digest
        let h: [u8; 32] = h.finalize().into();
        if &tagged_hash(APP_SIGNING_TAG, &h) != digest {
            return Err(Error::InvalidSignature);
        }

        Ok(())
    }
}

#[async_trait]
impl CommandHandler for AppInstaller {
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

        let header = BundleHeader::read_from(stream)?;
        let start = stream
            .stream_position()
            .map_err(|e| Error::storage("read extension", e))?;

        let digest = app_digest_stream(stream, header.payload_len, INSTALL_CHUNK_LEN)?;

        let valid = self.count_valid(&header.sigs, &digest);
        if valid < REQUIRED_SIGNATURES {
            #[cfg(feature = "log")]
            warn!(
                "extension rejected, {}/{} signatures valid",
                valid,
                header.sigs.len()
            );

            return Err(Error::InvalidSignature);
        }

        #[cfg(feature = "log")]
        debug!("extension signatures ok ({} bytes)", header.payload_len);

        if !confirm
            .confirm(Prompt::new("Install an app?", "The signatures looks ok."))
            .await
        {
            return Ok(Outcome::Declined);
        }

        stream
            .seek(SeekFrom::Start(start))
            .map_err(|e| Error::storage("read extension", e))?;
        self.stage(stream, header.payload_len, &digest)?;

        #[cfg(feature = "log")]
        info!("extension staged, active after reboot");

        let reboot = confirm
            .confirm(Prompt::new(
                "Success!",
                "App is verified and loaded! Reboot the device to make it active?",
            ))
            .await;
        self.reboot.store(reboot, Ordering::SeqCst);

        let meta = Meta {
            title: "App is verified and loaded".to_string(),
            note: Some(match reboot {
                true => "Rebooting to activate".to_string(),
                false => "Reboot the device to make it active".to_string(),
            }),
        };

        Ok(Outcome::Accepted(Response::new(vec![], meta)))
    }
}

/// Promote a staged extension to the active slot, returning whether one was staged
pub fn promote_staged(storage: &dyn Storage) -> Result<bool, Error> {
    if !storage.exists(EXTENSION_STAGED) {
        return Ok(false);
    }

    storage
        .rename(EXTENSION_STAGED, EXTENSION_ACTIVE)
        .map_err(|e| Error::storage("activate extension", e))?;

    #[cfg(feature = "log")]
    info!("staged extension activated");

    Ok(true)
}

/// Built-in extension trust key
pub fn default_trust_key() -> Result<VerifyingKey, Error> {
    let b = hex::decode(TRUST_PUBKEY).map_err(|e| Error::Configuration(e.to_string()))?;
    VerifyingKey::from_sec1_bytes(&b).map_err(|e| Error::Configuration(e.to_string()))
}

/// Verify a DER signature over a prehashed digest
pub fn verify_signature(key: &VerifyingKey, sig: &[u8], digest: &[u8; 32]) -> bool {
    let sig = match Signature::from_der(sig) {
        Ok(s) => s,
        Err(_) => return false,
    };

    // Accept high-S signatures from other signers
    let sig = sig.normalize_s().unwrap_or(sig);

    key.verify_prehash(digest, &sig).is_ok()
}

#[cfg(test)]
mod test {
    use std::io::Cursor;

    use k256::ecdsa::{signature::hazmat::PrehashSigner, SigningKey};
    use qrsign_proto::{bundle::Bundle, hash::app_digest};

    use super::*;
    use crate::storage::FsStorage;

    fn signed(key: &SigningKey, payload: &[u8]) -> Vec<u8> {
        let s: Signature = key.sign_prehash(&app_digest(payload)).unwrap();
        s.to_der().as_bytes().to_vec()
    }

    #[test]
    fn default_key_matches_known_secret() {
        let sk = SigningKey::from_slice(&[0x31; 32]).unwrap();
        assert_eq!(sk.verifying_key(), &default_trust_key().unwrap());
    }

    #[test]
    fn verify_rejects_other_key() {
        let sk = SigningKey::from_slice(&[0x31; 32]).unwrap();
        let other = SigningKey::from_slice(&[0x32; 32]).unwrap();

        let d = app_digest(b"payload");
        let sig = signed(&other, b"payload");

        assert!(!verify_signature(sk.verifying_key(), &sig, &d));
        assert!(verify_signature(other.verifying_key(), &sig, &d));
        assert!(!verify_signature(sk.verifying_key(), b"not der", &d));
    }

    #[tokio::test]
    async fn declined_writes_nothing() {
        let d = tempfile::tempdir().unwrap();
        let storage = Arc::new(FsStorage::new(d.path()).unwrap());
        let sk = SigningKey::from_slice(&[0x31; 32]).unwrap();

        let i = AppInstaller::new(storage.clone(), sk.verifying_key().clone());

        let payload = b"print('hello')".to_vec();
        let cmd = Bundle::new(vec![signed(&sk, &payload)], payload)
            .to_command()
            .unwrap();

        let mut s = Cursor::new(cmd);
        qrsign_proto::command::read_prefix(&mut s).unwrap();

        let o = i
            .process(b"importapp", &mut s, &|_: Prompt| async { false })
            .await
            .unwrap();

        assert!(o.is_declined());
        assert!(!storage.exists(EXTENSION_TMP));
        assert!(!storage.exists(EXTENSION_STAGED));
    }

    #[test]
    fn promote_without_staged() {
        let d = tempfile::tempdir().unwrap();
        let storage = FsStorage::new(d.path()).unwrap();

        assert!(!promote_staged(&storage).unwrap());

        storage.write(EXTENSION_STAGED, b"new").unwrap();
        assert!(promote_staged(&storage).unwrap());
        assert_eq!(storage.read(EXTENSION_ACTIVE).unwrap().as_deref(), Some(&b"new"[..]));
        assert!(!storage.exists(EXTENSION_STAGED));
    }
}
