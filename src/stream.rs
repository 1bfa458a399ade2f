//! Closeable byte streams.
//!
//! Every layer of a decode chain is a [`Stream`]: a [`Read`] with an explicit
//! [`close`](Stream::close) that releases the layer and everything it wraps.
//! Dropping a stream releases its handles too, but only `close` reports
//! release failures.
//!
//! Two wrappers shape stream lifetimes:
//!
//! - [`LazyStream`] defers the (possibly expensive) open until the first read.
//! - [`ChainedCloseStream`] runs a cleanup action once the wrapped stream is
//!   closed, tying a member stream to its parent container.

use std::fmt;
use std::io::{self, Read};

use crate::Result;

/// A readable byte source with an explicit close.
pub trait Stream: Read + Send {
    /// Releases this stream and every stream it wraps.
    ///
    /// Reading after `close` fails. Closing twice is a no-op.
    fn close(&mut self) -> io::Result<()>;
}

/// An owned, type-erased stream.
pub type ByteStream = Box<dyn Stream>;

impl<S: Stream + ?Sized> Stream for Box<S> {
    fn close(&mut self) -> io::Result<()> {
        (**self).close()
    }
}

impl fmt::Debug for dyn Stream {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Stream")
    }
}

pub(crate) fn closed_error() -> io::Error {
    io::Error::other("read from a closed stream")
}

/// Adapts any [`Read`] into a [`Stream`]; closing drops the reader.
pub struct ReaderStream<R> {
    inner: Option<R>,
}

impl<R> fmt::Debug for ReaderStream<R> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ReaderStream")
            .field("open", &self.inner.is_some())
            .finish_non_exhaustive()
    }
}

impl<R: Read + Send> ReaderStream<R> {
    /// Wraps a reader.
    pub fn new(inner: R) -> Self {
        Self { inner: Some(inner) }
    }
}

impl<R: Read + Send + 'static> ReaderStream<R> {
    /// Wraps a reader and boxes it as a [`ByteStream`].
    pub fn boxed(inner: R) -> ByteStream {
        Box::new(Self::new(inner))
    }
}

impl<R: Read + Send> Read for ReaderStream<R> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        match self.inner.as_mut() {
            Some(inner) => inner.read(buf),
            None => Err(closed_error()),
        }
    }
}

impl<R: Read + Send> Stream for ReaderStream<R> {
    fn close(&mut self) -> io::Result<()> {
        self.inner = None;
        Ok(())
    }
}

enum LazyState<F> {
    Pending(F),
    Open(ByteStream),
    Failed,
    Closed,
}

/// A stream whose factory runs on first read.
///
/// The factory is invoked at most once. If it fails, that read returns the
/// failure and every later read fails as well. Closing a stream that was
/// never read does not invoke the factory.
///
/// # Example
///
/// ```rust
/// use std::io::Read;
/// use burrow::stream::{LazyStream, ReaderStream, Stream};
///
/// let mut lazy = LazyStream::new(|| Ok(ReaderStream::boxed(&b"abc"[..])));
/// assert!(!lazy.is_opened());
///
/// let mut out = String::new();
/// lazy.read_to_string(&mut out).unwrap();
/// assert_eq!(out, "abc");
/// lazy.close().unwrap();
/// ```
pub struct LazyStream<F> {
    state: LazyState<F>,
}

impl<F> fmt::Debug for LazyStream<F> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = match self.state {
            LazyState::Pending(_) => "pending",
            LazyState::Open(_) => "open",
            LazyState::Failed => "failed",
            LazyState::Closed => "closed",
        };
        f.debug_struct("LazyStream").field("state", &state).finish()
    }
}

impl<F> LazyStream<F>
where
    F: FnOnce() -> Result<ByteStream> + Send,
{
    /// Creates a lazy stream around `factory`.
    pub fn new(factory: F) -> Self {
        Self {
            state: LazyState::Pending(factory),
        }
    }

    /// Returns `true` once the factory has produced a stream.
    pub fn is_opened(&self) -> bool {
        matches!(self.state, LazyState::Open(_))
    }

    fn stream(&mut self) -> io::Result<&mut ByteStream> {
        if matches!(self.state, LazyState::Pending(_)) {
            if let LazyState::Pending(factory) =
                std::mem::replace(&mut self.state, LazyState::Failed)
            {
                self.state = LazyState::Open(factory()?);
            }
        }
        match &mut self.state {
            LazyState::Open(stream) => Ok(stream),
            LazyState::Failed => Err(io::Error::other("deferred open failed earlier")),
            LazyState::Closed | LazyState::Pending(_) => Err(closed_error()),
        }
    }
}

impl<F> Read for LazyStream<F>
where
    F: FnOnce() -> Result<ByteStream> + Send,
{
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        self.stream()?.read(buf)
    }
}

impl<F> Stream for LazyStream<F>
where
    F: FnOnce() -> Result<ByteStream> + Send,
{
    fn close(&mut self) -> io::Result<()> {
        match std::mem::replace(&mut self.state, LazyState::Closed) {
            LazyState::Open(mut stream) => stream.close(),
            LazyState::Pending(_) | LazyState::Failed | LazyState::Closed => Ok(()),
        }
    }
}

/// A stream that runs a cleanup action after closing the stream it wraps.
///
/// The cleanup runs exactly once: on [`close`](Stream::close), or on drop if
/// the stream was never closed. When both the inner close and the cleanup
/// fail, the cleanup failure is the one reported.
pub struct ChainedCloseStream<S, F>
where
    F: FnOnce() -> io::Result<()>,
{
    stream: S,
    cleanup: Option<F>,
    closed: bool,
}

impl<S, F> fmt::Debug for ChainedCloseStream<S, F>
where
    F: FnOnce() -> io::Result<()>,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ChainedCloseStream")
            .field("closed", &self.closed)
            .field("cleanup_pending", &self.cleanup.is_some())
            .finish_non_exhaustive()
    }
}

impl<S, F> ChainedCloseStream<S, F>
where
    S: Stream,
    F: FnOnce() -> io::Result<()> + Send,
{
    /// Wraps `stream` so that closing it also runs `cleanup`.
    pub fn new(stream: S, cleanup: F) -> Self {
        Self {
            stream,
            cleanup: Some(cleanup),
            closed: false,
        }
    }
}

impl<S, F> Read for ChainedCloseStream<S, F>
where
    S: Stream,
    F: FnOnce() -> io::Result<()> + Send,
{
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        if self.closed {
            return Err(closed_error());
        }
        self.stream.read(buf)
    }
}

impl<S, F> Stream for ChainedCloseStream<S, F>
where
    S: Stream,
    F: FnOnce() -> io::Result<()> + Send,
{
    fn close(&mut self) -> io::Result<()> {
        if self.closed {
            return Ok(());
        }
        self.closed = true;
        let closed = self.stream.close();
        let cleaned = self.cleanup.take().map_or(Ok(()), |cleanup| cleanup());
        cleaned.and(closed)
    }
}

impl<S, F> Drop for ChainedCloseStream<S, F>
where
    F: FnOnce() -> io::Result<()>,
{
    fn drop(&mut self) {
        if let Some(cleanup) = self.cleanup.take() {
            if let Err(err) = cleanup() {
                log::debug!("cleanup of an unclosed stream failed: {err}");
            }
        }
    }
}
