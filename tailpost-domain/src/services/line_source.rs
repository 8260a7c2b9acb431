use std::pin::Pin;

use async_trait::async_trait;
use futures::Stream;

use crate::error::TailPostError;
use crate::value_objects::LogLine;

/// A lazy, possibly infinite sequence of [`LogLine`]s. Not restartable:
/// once `stop()` has run, a `LineSource` is spent and a fresh one must be
/// constructed to read again.
///
/// This is an infrastructure port kept in the domain crate for the same
/// reason file and repository I/O traits are: the capability is abstract
/// enough for the core dispatch loop to depend on without knowing which
/// concrete source backs it, even though fulfilling it necessarily means
/// performing async I/O.
pub type BoxLineSequence = Pin<Box<dyn Stream<Item = LogLine> + Send>>;

#[async_trait]
pub trait LineSource: Send {
    /// Opens the underlying source. Called exactly once before `lines()`.
    /// Failure here is fatal at startup — see `TailPostError::SourceOpenError`.
    async fn start(&mut self) -> Result<(), TailPostError>;

    /// Returns the stream of lines. Must only be called after a successful
    /// `start()`, and at most once — the returned stream owns the
    /// underlying read loop.
    fn lines(&mut self) -> BoxLineSequence;

    /// Releases resources and signals end-of-stream to any in-flight
    /// `lines()` consumer. Idempotent: a second call is a no-op.
    async fn stop(&mut self);
}
