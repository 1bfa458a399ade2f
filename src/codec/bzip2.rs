//! bzip2 decompression layer.

use std::io::{self, Read};

use bzip2::read::MultiBzDecoder;

use super::decode_error;
use crate::stream::{Stream, closed_error};

/// bzip2 decoder over a [`Stream`].
pub struct Bzip2Stream<S> {
    inner: MultiBzDecoder<S>,
    closed: bool,
}

impl<S> std::fmt::Debug for Bzip2Stream<S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Bzip2Stream")
            .field("closed", &self.closed)
            .finish_non_exhaustive()
    }
}

impl<S: Stream> Bzip2Stream<S> {
    /// Creates a bzip2 decoder.
    ///
    /// # Arguments
    ///
    /// * `source` - The compressed data source
    pub fn new(source: S) -> Self {
        Self {
            inner: MultiBzDecoder::new(source),
            closed: false,
        }
    }
}

impl<S: Stream> Read for Bzip2Stream<S> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        if self.closed {
            return Err(closed_error());
        }
        self.inner.read(buf).map_err(|e| decode_error("bzip2", e))
    }
}

impl<S: Stream> Stream for Bzip2Stream<S> {
    fn close(&mut self) -> io::Result<()> {
        if std::mem::replace(&mut self.closed, true) {
            return Ok(());
        }
        self.inner.get_mut().close()
    }
}
