//! Single-stream decompression layers.
//!
//! Each decoder wraps a [`Stream`] and is itself a [`Stream`]: closing the
//! decoder closes the compressed source underneath it. Codecs other than
//! gzip are behind cargo features; asking for a disabled codec yields
//! [`Error::Unsupported`].

#[cfg(feature = "gzip")]
pub mod gzip;

#[cfg(feature = "bzip2")]
pub mod bzip2;

#[cfg(feature = "zstd")]
pub mod zstd;

use std::fmt;
use std::io;

use crate::stream::ByteStream;
use crate::{Error, Result};

/// A single-stream compression format recognised by filename suffix.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Compression {
    /// gzip (`.gz`), including concatenated members.
    Gzip,
    /// bzip2 (`.bz2`), including concatenated streams.
    Bzip2,
    /// Zstandard (`.zst`).
    Zstd,
}

impl Compression {
    /// All compressions, in the order the decode chain tries them.
    pub const ALL: [Compression; 3] = [Compression::Gzip, Compression::Bzip2, Compression::Zstd];

    /// Returns the filename suffix, including the dot.
    pub fn suffix(self) -> &'static str {
        match self {
            Compression::Gzip => ".gz",
            Compression::Bzip2 => ".bz2",
            Compression::Zstd => ".zst",
        }
    }

    /// Returns the format name used in diagnostics.
    pub fn name(self) -> &'static str {
        match self {
            Compression::Gzip => "gzip",
            Compression::Bzip2 => "bzip2",
            Compression::Zstd => "zstd",
        }
    }

    /// Wraps `stream` in a decoder for this format.
    pub fn decoder(self, stream: ByteStream) -> Result<ByteStream> {
        match self {
            #[cfg(feature = "gzip")]
            Compression::Gzip => Ok(Box::new(gzip::GzipStream::new(stream))),
            #[cfg(feature = "bzip2")]
            Compression::Bzip2 => Ok(Box::new(bzip2::Bzip2Stream::new(stream))),
            #[cfg(feature = "zstd")]
            Compression::Zstd => Ok(Box::new(zstd::ZstdStream::new(stream)?)),
            #[allow(unreachable_patterns)]
            _ => {
                drop(stream);
                Err(Error::unsupported(format!(
                    "{} decompression (enable the `{}` feature)",
                    self.name(),
                    self.name()
                )))
            }
        }
    }
}

impl fmt::Display for Compression {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Re-labels a codec's corrupt-data errors as [`Error::DecodeFailure`].
///
/// Errors that already carry a typed [`Error`] (for example a failure of the
/// stream underneath) pass through unchanged.
pub(crate) fn decode_error(format: &'static str, err: io::Error) -> io::Error {
    let corrupt = matches!(
        err.kind(),
        io::ErrorKind::InvalidData | io::ErrorKind::InvalidInput | io::ErrorKind::UnexpectedEof
    );
    if corrupt && !err.get_ref().is_some_and(|inner| inner.is::<Error>()) {
        Error::decode(format, err.to_string()).into()
    } else {
        err
    }
}
