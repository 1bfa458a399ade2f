//! Zstandard decompression layer.

use std::io::{self, BufReader, Read};

use zstd::stream::read::Decoder as ZstdDecoder;

use super::decode_error;
use crate::stream::{Stream, closed_error};

/// Zstandard decoder over a [`Stream`].
pub struct ZstdStream<S> {
    inner: ZstdDecoder<'static, BufReader<S>>,
    closed: bool,
}

impl<S> std::fmt::Debug for ZstdStream<S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ZstdStream")
            .field("closed", &self.closed)
            .finish_non_exhaustive()
    }
}

impl<S: Stream> ZstdStream<S> {
    /// Creates a Zstandard decoder.
    pub fn new(source: S) -> io::Result<Self> {
        Ok(Self {
            inner: ZstdDecoder::new(source)?,
            closed: false,
        })
    }
}

impl<S: Stream> Read for ZstdStream<S> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        if self.closed {
            return Err(closed_error());
        }
        self.inner.read(buf).map_err(|e| decode_error("zstd", e))
    }
}

impl<S: Stream> Stream for ZstdStream<S> {
    fn close(&mut self) -> io::Result<()> {
        if std::mem::replace(&mut self.closed, true) {
            return Ok(());
        }
        self.inner.get_mut().get_mut().close()
    }
}
