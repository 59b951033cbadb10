// Copyright (c) 2022-2023 The MobileCoin Foundation

//! Host command framing
//!
//! ```text
//! <prefix-bytes> <payload-bytes...>
//! ```
//!
//! The prefix is the leading run of non-whitespace bytes (at most
//! [MAX_PREFIX_LEN] bytes), a single ASCII space separates it from the
//! payload. A command consisting of a prefix alone carries an empty payload.

use std::io::{Read, Seek, SeekFrom};

use crate::{Error, MAX_PREFIX_LEN};

/// Check whether `prefix` may be used as a command prefix
/// (non-empty, no whitespace, within [MAX_PREFIX_LEN])
pub fn is_valid_prefix(prefix: &[u8]) -> bool {
    !prefix.is_empty()
        && prefix.len() <= MAX_PREFIX_LEN
        && !prefix.iter().any(|b| b.is_ascii_whitespace())
}

/// Split an in-memory command into `(prefix, payload)`
pub fn split(cmd: &[u8]) -> (&[u8], &[u8]) {
    match cmd.iter().position(|b| b.is_ascii_whitespace()) {
        Some(i) => (&cmd[..i], &cmd[i + 1..]),
        None => (cmd, &[]),
    }
}

/// Read the leading prefix token from a command stream.
///
/// On success the stream is left positioned at the first payload byte.
/// Returns `None` (with the stream rewound) when no prefix delimiter is found
/// within [MAX_PREFIX_LEN] bytes.
pub fn read_prefix<S: Read + Seek + ?Sized>(s: &mut S) -> Result<Option<Vec<u8>>, Error> {
    let start = s.stream_position()?;

    let mut buff = [0u8; MAX_PREFIX_LEN + 1];
    let n = read_up_to(s, &mut buff)?;
    let head = &buff[..n];

    match head.iter().position(|b| b.is_ascii_whitespace()) {
        // Prefix followed by a delimiter
        Some(i) => {
            s.seek(SeekFrom::Start(start + i as u64 + 1))?;
            Ok(Some(head[..i].to_vec()))
        }
        // Short command without payload
        None if n <= MAX_PREFIX_LEN => Ok(Some(head.to_vec())),
        // No delimiter in range, not a command we can route
        None => {
            s.seek(SeekFrom::Start(start))?;
            Ok(None)
        }
    }
}

/// Read the leading prefix and check it matches `expected`
pub fn expect_prefix<S: Read + Seek + ?Sized>(s: &mut S, expected: &[u8]) -> Result<(), Error> {
    match read_prefix(s)? {
        Some(p) if p == expected => Ok(()),
        Some(p) => Err(Error::InvalidPrefix(String::from_utf8_lossy(&p).into_owned())),
        None => Err(Error::InvalidPrefix(String::new())),
    }
}

/// Fill as much of `buff` as the stream allows
fn read_up_to<S: Read + ?Sized>(s: &mut S, buff: &mut [u8]) -> Result<usize, Error> {
    let mut n = 0;
    while n < buff.len() {
        match s.read(&mut buff[n..]) {
            Ok(0) => break,
            Ok(v) => n += v,
            Err(e) if e.kind() == std::io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(e.into()),
        }
    }
    Ok(n)
}
