// Copyright (c) 2022-2023 The MobileCoin Foundation

//! Domain separated hashing

use std::io::Read;

use sha2::{Digest, Sha256};

use crate::{Error, APP_SIGNING_TAG};

/// Tagged hash `SHA256(SHA256(tag) || SHA256(tag) || msg)`
pub fn tagged_hash(tag: &str, msg: &[u8]) -> [u8; 32] {
    let t = Sha256::digest(tag.as_bytes());

    Sha256::new()
        .chain_update(t)
        .chain_update(t)
        .chain_update(msg)
        .finalize()
        .into()
}

/// Signing digest for an extension payload
/// `tagged_hash("diyapp", SHA256(payload))`
pub fn app_digest(payload: &[u8]) -> [u8; 32] {
    let h: [u8; 32] = Sha256::digest(payload).into();
    tagged_hash(APP_SIGNING_TAG, &h)
}

/// Compute the signing digest for `len` payload bytes read from `r`,
/// in chunks of at most `chunk` bytes
pub fn app_digest_stream<R: Read + ?Sized>(
    r: &mut R,
    len: u64,
    chunk: usize,
) -> Result<[u8; 32], Error> {
    let mut h = Sha256::new();
    let mut buff = vec![0u8; chunk.max(1)];

    let mut remaining = len;
    while remaining > 0 {
        let n = remaining.min(buff.len() as u64) as usize;
        r.read_exact(&mut buff[..n]).map_err(Error::from_io)?;
        h.update(&buff[..n]);
        remaining -= n as u64;
    }

    let d: [u8; 32] = h.finalize().into();
    Ok(tagged_hash(APP_SIGNING_TAG, &d))
}
