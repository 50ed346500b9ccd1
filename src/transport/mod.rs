//! Abstract link transport.
//!
//! The connection manager only cares about how the physical link is
//! (re)acquired and that the result reads and writes bytes. Production
//! uses [`SerialTransport`]; tests substitute scripted in-memory pipes.

mod serial;

pub use serial::SerialTransport;

use std::future::Future;
use std::pin::Pin;

use tokio::io::{AsyncRead, AsyncWrite};

/// Boxed future for dyn-dispatched async calls.
pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// A connected byte-oriented link.
pub trait TransportLink: AsyncRead + AsyncWrite + Unpin + Send {}

impl<T: AsyncRead + AsyncWrite + Unpin + Send> TransportLink for T {}

/// Factory for (re)opening the physical link.
pub trait Transport: Send + 'static {
    /// Attempt to acquire the link. Called once per connection attempt.
    fn open(&mut self) -> BoxFuture<'_, std::io::Result<Box<dyn TransportLink>>>;
}
