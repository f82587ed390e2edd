//! Driver-facing connection abstraction.
//!
//! A [`Connector`] opens one physical connection and returns a [`Link`]:
//! the usable handle, a way to close it, and a notification that fires
//! once when the connection ends for any reason.

use std::future::Future;
use std::pin::Pin;
use std::task::{Context, Poll};

use async_trait::async_trait;
use tokio::sync::oneshot;

use crate::database::error::DatabaseResult;

/// Capability to open a connection.
#[async_trait]
pub trait Connector: Send + Sync + 'static {
    /// Handle handed out to callers for issuing queries.
    type Handle: Send + Sync + 'static;

    /// Open a new connection.
    async fn connect(&self) -> DatabaseResult<Link<Self::Handle>>;
}

/// A freshly established connection.
pub struct Link<H> {
    handle: H,
    closer: Closer,
    termination: Termination,
}

impl<H> Link<H> {
    pub fn new(handle: H, closer: Closer, termination: Termination) -> Self {
        Self {
            handle,
            closer,
            termination,
        }
    }

    pub fn into_parts(self) -> (H, Closer, Termination) {
        (self.handle, self.closer, self.termination)
    }
}

/// Request to close a connection. Runs at most once.
pub struct Closer(Box<dyn FnOnce() + Send>);

impl Closer {
    pub fn new<F>(f: F) -> Self
    where
        F: FnOnce() + Send + 'static,
    {
        Self(Box::new(f))
    }

    pub fn close(self) {
        (self.0)()
    }
}

impl std::fmt::Debug for Closer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("Closer")
    }
}

/// Resolves when the connection has ended, with the driver's reason if it
/// gave one.
///
/// Dropping the [`TerminationSender`] without notifying also counts as the
/// end of the connection.
#[derive(Debug)]
pub struct Termination(oneshot::Receiver<Option<String>>);

impl Termination {
    pub fn channel() -> (TerminationSender, Termination) {
        let (tx, rx) = oneshot::channel();
        (TerminationSender(tx), Termination(rx))
    }
}

impl Future for Termination {
    type Output = Option<String>;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        match Pin::new(&mut self.0).poll(cx) {
            Poll::Ready(Ok(reason)) => Poll::Ready(reason),
            Poll::Ready(Err(_)) => Poll::Ready(None),
            Poll::Pending => Poll::Pending,
        }
    }
}

/// Driver side of a [`Termination`].
#[derive(Debug)]
pub struct TerminationSender(oneshot::Sender<Option<String>>);

impl TerminationSender {
    pub fn notify(self, reason: Option<String>) {
        let _ = self.0.send(reason);
    }
}
