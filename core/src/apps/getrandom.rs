// Copyright (c) 2022-2023 The MobileCoin Foundation

//! Random byte source, `getrandom [n]`

use async_trait::async_trait;
use rand_core::{OsRng, RngCore};

use super::{check_prefix, read_payload};
use crate::{
    router::{CommandHandler, Confirm, HostStream, Meta, Outcome, Prompt, Response},
    Error,
};

const PREFIXES: &[&[u8]] = &[b"getrandom"];

/// Bytes returned when no count is provided
pub const DEFAULT_RANDOM_BYTES: usize = 32;

/// Returns hex encoded random bytes from the OS RNG
pub struct GetRandom {
    max: usize,
}

impl GetRandom {
    pub fn new(max: usize) -> Self {
        Self { max }
    }

    fn parse_count(&self, payload: &[u8]) -> Result<usize, Error> {
        let s = String::from_utf8_lossy(payload);
        let s = s.trim();

        // Unparseable counts fall back to the default
        let n = match s.parse::<i64>() {
            Ok(n) => n,
            Err(_) => return Ok(DEFAULT_RANDOM_BYTES),
        };

        if n < 0 {
            return Err(Error::command(format!("Seriously? {n} bytes? No...")));
        }
        if n as u64 > self.max as u64 {
            return Err(Error::command(format!("Sorry, {} bytes max.", self.max)));
        }

        Ok(n as usize)
    }
}

#[async_trait]
impl CommandHandler for GetRandom {
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

        let payload = read_payload(stream, 32)?;
        let n = self.parse_count(&payload)?;

        let p = Prompt::new("Share entropy?", format!("Host requests {n} random bytes"));
        if !confirm.confirm(p).await {
            return Ok(Outcome::Declined);
        }

        let mut b = vec![0u8; n];
        OsRng.fill_bytes(&mut b);

        Ok(Outcome::Accepted(Response::new(
            hex::encode(b).into_bytes(),
            Meta::title("Here is your entropy"),
        )))
    }
}

#[cfg(test)]
mod test {
    use std::io::Cursor;

    use super::*;

    async fn run(payload: &[u8]) -> Result<Outcome, Error> {
        let h = GetRandom::new(1000);
        let mut s = Cursor::new(payload.to_vec());
        h.process(b"getrandom", &mut s, &|_: Prompt| async { true })
            .await
    }

    #[tokio::test]
    async fn default_count() {
        let r = run(b"").await.unwrap();
        match r {
            Outcome::Accepted(resp) => assert_eq!(resp.into_bytes().unwrap().len(), 64),
            _ => panic!("unexpected outcome"),
        }
    }

    #[tokio::test]
    async fn zero_bytes() {
        let r = run(b"0").await.unwrap();
        match r {
            Outcome::Accepted(resp) => assert!(resp.into_bytes().unwrap().is_empty()),
            _ => panic!("unexpected outcome"),
        }
    }

    #[tokio::test]
    async fn out_of_range() {
        let e = run(b"1001").await.unwrap_err();
        assert_eq!(e.to_string(), "Sorry, 1000 bytes max.");

        let e = run(b"-1").await.unwrap_err();
        assert_eq!(e.to_string(), "Seriously? -1 bytes? No...");
    }

    #[tokio::test]
    async fn wrong_prefix() {
        let h = GetRandom::new(1000);
        let mut s = Cursor::new(vec![]);
        let e = h
            .process(b"getlabel", &mut s, &|_: Prompt| async { true })
            .await
            .unwrap_err();

        assert_eq!(e.to_string(), "Prefix is not valid: getlabel");
    }
}
