// Copyright (c) 2022-2023 The MobileCoin Foundation

//! Host command routing
//!
//! The [CommandRouter] matches the leading token of a host command against
//! registered prefixes and hands the remaining stream to the owning
//! [CommandHandler]. Handlers may suspend on user [Confirm]ations, a declined,
//! cancelled, or timed out confirmation yields [Outcome::Declined].
//!
//! Only one dispatch is processed at a time, a command arriving while another
//! is pending is rejected with [Error::Busy].

use std::{
    fmt::Debug,
    future::Future,
    io::{Cursor, Read, Seek},
    sync::Arc,
    time::Duration,
};

use async_trait::async_trait;
use tokio::sync::{Mutex, Notify};

#[cfg(feature = "log")]
use log::{debug, warn};

use qrsign_proto::command::{is_valid_prefix, read_prefix};

use crate::Error;

/// Inbound host command stream
pub trait HostStream: Read + Seek + Send {}

impl<T: Read + Seek + Send> HostStream for T {}

/// Confirmation prompt shown to the user
#[derive(Clone, PartialEq, Debug)]
pub struct Prompt {
    pub title: String,
    pub message: String,
}

impl Prompt {
    pub fn new(title: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            message: message.into(),
        }
    }
}

/// User confirmation capability
#[async_trait]
pub trait Confirm: Send + Sync {
    /// Show a prompt and wait for the user's answer
    async fn confirm(&self, prompt: Prompt) -> bool;
}

/// [Confirm] impl for async closures
#[async_trait]
impl<F, R> Confirm for F
where
    F: Fn(Prompt) -> R + Send + Sync,
    R: Future<Output = bool> + Send,
{
    async fn confirm(&self, prompt: Prompt) -> bool {
        (self)(prompt).await
    }
}

/// Display metadata attached to a response
#[derive(Clone, PartialEq, Debug, Default)]
pub struct Meta {
    pub title: String,
    pub note: Option<String>,
}

impl Meta {
    pub fn title(title: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            note: None,
        }
    }
}

/// Handler response, a data stream with display metadata
pub struct Response {
    pub data: Box<dyn Read + Send>,
    pub meta: Meta,
}

impl Response {
    /// Create a response over in-memory data
    pub fn new(data: Vec<u8>, meta: Meta) -> Self {
        Self {
            data: Box::new(Cursor::new(data)),
            meta,
        }
    }

    /// Read the remaining response data
    pub fn into_bytes(mut self) -> Result<Vec<u8>, Error> {
        let mut v = vec![];
        self.data
            .read_to_end(&mut v)
            .map_err(|e| Error::storage("read response", e))?;
        Ok(v)
    }
}

impl Debug for Response {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Response").field("meta", &self.meta).finish()
    }
}

/// Result of a successful dispatch
#[derive(Debug)]
pub enum Outcome {
    /// Command completed with a response
    Accepted(Response),
    /// User declined, no response is sent
    Declined,
}

impl Outcome {
    pub fn is_declined(&self) -> bool {
        matches!(self, Outcome::Declined)
    }
}

/// Host command handler
#[async_trait]
pub trait CommandHandler: Send + Sync {
    /// Prefixes served by this handler
    fn prefixes(&self) -> &'static [&'static [u8]];

    /// Process a command, `stream` is positioned at the first payload byte
    async fn process(
        &self,
        prefix: &[u8],
        stream: &mut dyn HostStream,
        confirm: &dyn Confirm,
    ) -> Result<Outcome, Error>;
}

/// Command router
pub struct CommandRouter {
    handlers: Vec<(Vec<u8>, Arc<dyn CommandHandler>)>,
    busy: Mutex<()>,
    cancel: Notify,
    timeout: Option<Duration>,
}

impl CommandRouter {
    /// Create a new router, confirmations not answered within `timeout`
    /// are treated as declined
    pub fn new(timeout: Option<Duration>) -> Self {
        Self {
            handlers: vec![],
            busy: Mutex::new(()),
            cancel: Notify::new(),
            timeout,
        }
    }

    /// Register a handler for a single prefix
    pub fn register(&mut self, prefix: &[u8], handler: Arc<dyn CommandHandler>) -> Result<(), Error> {
        let p = String::from_utf8_lossy(prefix).into_owned();

        if !is_valid_prefix(prefix) {
            return Err(Error::PrefixConflict(p));
        }

        let overlaps = self
            .handlers
            .iter()
            .any(|(e, _)| e.starts_with(prefix) || prefix.starts_with(e));
        if overlaps {
            return Err(Error::PrefixConflict(p));
        }

        #[cfg(feature = "log")]
        debug!("registered handler for '{}'", p);

        self.handlers.push((prefix.to_vec(), handler));

        Ok(())
    }

    /// Register a handler for all of its prefixes
    pub fn register_all(&mut self, handler: Arc<dyn CommandHandler>) -> Result<(), Error> {
        for p in handler.prefixes() {
            self.register(p, handler.clone())?;
        }
        Ok(())
    }

    /// Registered prefixes
    pub fn prefixes(&self) -> impl Iterator<Item = &[u8]> {
        self.handlers.iter().map(|(p, _)| p.as_slice())
    }

    /// Dispatch a host command
    pub async fn dispatch(
        &self,
        stream: &mut dyn HostStream,
        confirm: &dyn Confirm,
    ) -> Result<Outcome, Error> {
        let _guard = self.busy.try_lock().map_err(|_| Error::Busy)?;

        let prefix = read_prefix(stream)?.ok_or(Error::UnrecognizedCommand)?;

        let handler = self
            .handlers
            .iter()
            .find(|(p, _)| p == &prefix)
            .map(|(_, h)| h.clone())
            .ok_or(Error::UnrecognizedCommand)?;

        #[cfg(feature = "log")]
        debug!("dispatch '{}'", String::from_utf8_lossy(&prefix));

        let guarded = Guarded {
            inner: confirm,
            cancel: &self.cancel,
            timeout: self.timeout,
        };

        let r = handler.process(&prefix, stream, &guarded).await;

        #[cfg(feature = "log")]
        match &r {
            Ok(Outcome::Declined) => debug!("command declined"),
            Ok(Outcome::Accepted(resp)) => debug!("command accepted: {}", resp.meta.title),
            Err(e) => warn!("command failed: {}", e),
        }

        r
    }

    /// Cancel a pending confirmation, resolving it as declined
    pub fn cancel(&self) {
        self.cancel.notify_waiters();
    }
}

/// Confirmation wrapper applying timeout and cancellation
struct Guarded<'a> {
    inner: &'a dyn Confirm,
    cancel: &'a Notify,
    timeout: Option<Duration>,
}

#[async_trait]
impl<'a> Confirm for Guarded<'a> {
    async fn confirm(&self, prompt: Prompt) -> bool {
        let answer = async {
            let f = self.inner.confirm(prompt);
            match self.timeout {
                Some(t) => tokio::time::timeout(t, f).await.unwrap_or(false),
                None => f.await,
            }
        };

        tokio::select! {
            a = answer => a,
            _ = self.cancel.notified() => false,
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;

    struct Echo;

    #[async_trait]
    impl CommandHandler for Echo {
        fn prefixes(&self) -> &'static [&'static [u8]] {
            &[b"echo"]
        }

        async fn process(
            &self,
            _prefix: &[u8],
            stream: &mut dyn HostStream,
            confirm: &dyn Confirm,
        ) -> Result<Outcome, Error> {
            let mut d = vec![];
            stream
                .read_to_end(&mut d)
                .map_err(|e| Error::storage("read", e))?;

            if !confirm.confirm(Prompt::new("Echo?", "")).await {
                return Ok(Outcome::Declined);
            }

            Ok(Outcome::Accepted(Response::new(d, Meta::title("echo"))))
        }
    }

    fn router() -> CommandRouter {
        let mut r = CommandRouter::new(Some(Duration::from_millis(100)));
        r.register_all(Arc::new(Echo)).unwrap();
        r
    }

    #[test]
    fn register_conflicts() {
        let mut r = router();

        let tests: &[&[u8]] = &[b"", b"ec ho", b"echo", b"ech", b"echoes"];
        for p in tests {
            let e = r.register(p, Arc::new(Echo));
            assert!(matches!(e, Err(Error::PrefixConflict(_))), "{:?}", p);
        }

        r.register(b"other", Arc::new(Echo)).unwrap();
        assert_eq!(r.prefixes().count(), 2);
    }

    #[tokio::test]
    async fn dispatch_echo() {
        let r = router();
        let mut s = Cursor::new(b"echo hello world".to_vec());

        let o = r.dispatch(&mut s, &|_: Prompt| async { true }).await.unwrap();
        match o {
            Outcome::Accepted(resp) => assert_eq!(resp.into_bytes().unwrap(), b"hello world"),
            _ => panic!("unexpected outcome"),
        }
    }

    #[tokio::test]
    async fn dispatch_unrecognized() {
        let r = router();
        let mut s = Cursor::new(b"nope 1".to_vec());

        let e = r.dispatch(&mut s, &|_: Prompt| async { true }).await;
        assert!(matches!(e, Err(Error::UnrecognizedCommand)));
    }

    #[tokio::test]
    async fn declined_is_not_an_error() {
        let r = router();
        let mut s = Cursor::new(b"echo x".to_vec());

        let o = r.dispatch(&mut s, &|_: Prompt| async { false }).await.unwrap();
        assert!(o.is_declined());
    }

    #[tokio::test]
    async fn timeout_declines() {
        let r = router();
        let mut s = Cursor::new(b"echo x".to_vec());

        let o = r
            .dispatch(&mut s, &|_: Prompt| async {
                tokio::time::sleep(Duration::from_secs(10)).await;
                true
            })
            .await
            .unwrap();

        assert!(o.is_declined());
    }
}
