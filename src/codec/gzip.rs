//! gzip decompression layer.

use std::io::{self, Read};

use flate2::read::MultiGzDecoder;

use super::decode_error;
use crate::stream::{Stream, closed_error};

/// gzip decoder over a [`Stream`].
///
/// Concatenated gzip members are decoded as one stream.
pub struct GzipStream<S> {
    inner: MultiGzDecoder<S>,
    closed: bool,
}

impl<S> std::fmt::Debug for GzipStream<S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GzipStream")
            .field("closed", &self.closed)
            .finish_non_exhaustive()
    }
}

impl<S: Stream> GzipStream<S> {
    /// Creates a gzip decoder reading compressed bytes from `source`.
    pub fn new(source: S) -> Self {
        Self {
            inner: MultiGzDecoder::new(source),
            closed: false,
        }
    }
}

impl<S: Stream> Read for GzipStream<S> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        if self.closed {
            return Err(closed_error());
        }
        self.inner.read(buf).map_err(|e| decode_error("gzip", e))
    }
}

impl<S: Stream> Stream for GzipStream<S> {
    fn close(&mut self) -> io::Result<()> {
        if std::mem::replace(&mut self.closed, true) {
            return Ok(());
        }
        self.inner.get_mut().close()
    }
}
