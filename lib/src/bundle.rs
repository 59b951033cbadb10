// Copyright (c) 2022-2023 The MobileCoin Foundation

//! Extension bundle signing and verification

use std::io::Cursor;

use k256::ecdsa::{signature::hazmat::PrehashSigner, Signature, SigningKey, VerifyingKey};
use log::debug;
use serde::Serialize;
use zeroize::Zeroizing;

use qrsign_core::{apps::verify_signature, consts::REQUIRED_SIGNATURES};
use qrsign_proto::{bundle::Bundle, command::expect_prefix, hash::app_digest, IMPORT_APP_PREFIX};

use crate::Error;

/// Sign `payload` with each of `keys`, returning the install bundle
pub fn sign_bundle(payload: &[u8], keys: &[SigningKey]) -> Result<Bundle, Error> {
    let digest = app_digest(payload);

    let sigs = keys
        .iter()
        .map(|k| {
            let s: Signature = k
                .sign_prehash(&digest)
                .map_err(|e| Error::Signing(e.to_string()))?;
            Ok(s.to_der().as_bytes().to_vec())
        })
        .collect::<Result<Vec<_>, Error>>()?;

    debug!(
        "signed {} byte payload with {} keys",
        payload.len(),
        sigs.len()
    );

    Ok(Bundle::new(sigs, payload.to_vec()))
}

/// Bundle verification outcome
#[derive(Copy, Clone, PartialEq, Eq, Debug, Serialize, strum::Display)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum Verdict {
    /// Enough signatures verify, the device will offer to install
    Trusted,
    /// The device will reject this bundle
    Untrusted,
}

/// Bundle verification report
#[derive(Clone, PartialEq, Debug, Serialize)]
pub struct Verification {
    pub verdict: Verdict,
    pub signatures: usize,
    pub valid: usize,
    pub payload_len: usize,
    pub digest: String,
}

/// Parse and verify an `importapp` command against `key`
pub fn verify_bundle(cmd: &[u8], key: &VerifyingKey) -> Result<Verification, Error> {
    let mut c = Cursor::new(cmd);

    expect_prefix(&mut c, IMPORT_APP_PREFIX)?;
    let b = Bundle::read_from(&mut c)?;

    let digest = app_digest(&b.payload);
    let valid = b
        .sigs
        .iter()
        .filter(|s| verify_signature(key, s, &digest))
        .count();

    let verdict = match valid >= REQUIRED_SIGNATURES {
        true => Verdict::Trusted,
        false => Verdict::Untrusted,
    };

    Ok(Verification {
        verdict,
        signatures: b.sigs.len(),
        valid,
        payload_len: b.payload.len(),
        digest: hex::encode(digest),
    })
}

/// Parse a hex encoded secp256k1 signing key
pub fn parse_signing_key(s: &str) -> Result<SigningKey, Error> {
    let mut b = Zeroizing::new([0u8; 32]);
    hex::decode_to_slice(s.trim(), &mut b[..]).map_err(|e| Error::InvalidKey(e.to_string()))?;

    SigningKey::from_slice(&b[..]).map_err(|e| Error::InvalidKey(e.to_string()))
}

/// Parse a hex encoded SEC1 public key
pub fn parse_verifying_key(s: &str) -> Result<VerifyingKey, Error> {
    let b = hex::decode(s.trim()).map_err(|e| Error::InvalidKey(e.to_string()))?;
    VerifyingKey::from_sec1_bytes(&b).map_err(|e| Error::InvalidKey(e.to_string()))
}
