//! Forward-only ZIP reading from local headers.
//!
//! [`ZipStreamReader`] never looks at the central directory, so it works on
//! non-seekable streams: a zip inside a gzip, a zip fetched over HTTP, or a
//! zip nested in another archive. Members are visited in stored order and
//! the list ends at the first central directory record.
//!
//! Supported member layouts:
//!
//! | Method | Known sizes | Data descriptor |
//! |--------|-------------|-----------------|
//! | Stored | yes | only if the local header also carries the size |
//! | Deflate | yes | yes |
//! | BZip2 (`bzip2` feature) | yes | no |
//! | Zstandard (`zstd` feature) | yes | no |
//!
//! Encrypted members and unknown methods are listed, and skipped when their
//! size is known; reading them fails with [`Error::Unsupported`].

use std::io::{self, BufReader, Read, Take};

use flate2::bufread::DeflateDecoder;

use super::record::{
    self, CENTRAL_HEADER_SIG, END_OF_CENTRAL_DIR_SIG, LOCAL_HEADER_SIG, LocalHeader,
    METHOD_DEFLATED, METHOD_STORED, ZIP64_END_OF_CENTRAL_DIR_SIG,
};
use super::{MemberHeader, MemberKind, SequentialArchive};
use crate::stream::Stream;
use crate::{Error, READ_BUFFER_SIZE, Result};

type Bounded<S> = Take<BufReader<S>>;

enum Body<S> {
    /// Positioned at a record boundary.
    Idle(BufReader<S>),
    Stored(Bounded<S>),
    Deflated(DeflateDecoder<Bounded<S>>),
    /// Deflate data whose end is found by the decoder; a data descriptor follows.
    DeflatedToDescriptor(DeflateDecoder<BufReader<S>>),
    #[cfg(feature = "bzip2")]
    Bzip2(bzip2::bufread::BzDecoder<Bounded<S>>),
    #[cfg(feature = "zstd")]
    Zstd(zstd::stream::read::Decoder<'static, Bounded<S>>),
    /// Content that can be skipped but not decoded.
    Opaque(Bounded<S>),
    Closed,
}

impl<S: Stream> Body<S> {
    fn open(source: BufReader<S>, header: &LocalHeader) -> Result<Self> {
        let descriptor = header.has_data_descriptor();
        let unsupported = || {
            Error::unsupported(format!(
                "zip member {:?} with method {} and a data descriptor",
                header.name, header.method
            ))
        };

        if header.is_encrypted() || !method_supported(header.method) {
            return if descriptor {
                Err(unsupported())
            } else {
                Ok(Body::Opaque(source.take(header.compressed_size)))
            };
        }

        let bounded = |source: BufReader<S>| source.take(header.compressed_size);
        match header.method {
            METHOD_STORED if descriptor && header.compressed_size == 0 => Err(unsupported()),
            METHOD_STORED => Ok(Body::Stored(bounded(source))),
            METHOD_DEFLATED if descriptor => {
                Ok(Body::DeflatedToDescriptor(DeflateDecoder::new(source)))
            }
            METHOD_DEFLATED => Ok(Body::Deflated(DeflateDecoder::new(bounded(source)))),
            _ if descriptor => Err(unsupported()),
            #[cfg(feature = "bzip2")]
            record::METHOD_BZIP2 => Ok(Body::Bzip2(bzip2::bufread::BzDecoder::new(bounded(
                source,
            )))),
            #[cfg(feature = "zstd")]
            record::METHOD_ZSTD => Ok(Body::Zstd(zstd::stream::read::Decoder::with_buffer(
                bounded(source),
            )?)),
            _ => Err(unsupported()),
        }
    }

    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        match self {
            Body::Idle(_) => Ok(0),
            Body::Stored(reader) => reader.read(buf),
            Body::Deflated(decoder) => decoder.read(buf),
            Body::DeflatedToDescriptor(decoder) => decoder.read(buf),
            #[cfg(feature = "bzip2")]
            Body::Bzip2(decoder) => decoder.read(buf),
            #[cfg(feature = "zstd")]
            Body::Zstd(decoder) => decoder.read(buf),
            Body::Opaque(_) => Err(Error::unsupported("encrypted or unknown zip method").into()),
            Body::Closed => Err(closed()),
        }
        .map_err(|e| crate::codec::decode_error("zip", e))
    }

    /// Recovers the underlying reader, skipping any unread compressed bytes
    /// of a member with a known size.
    fn into_source(self) -> io::Result<BufReader<S>> {
        match self {
            Body::Idle(source) => Ok(source),
            Body::Stored(bounded) | Body::Opaque(bounded) => drain(bounded),
            Body::Deflated(decoder) => drain(decoder.into_inner()),
            Body::DeflatedToDescriptor(decoder) => Ok(decoder.into_inner()),
            #[cfg(feature = "bzip2")]
            Body::Bzip2(decoder) => drain(decoder.into_inner()),
            #[cfg(feature = "zstd")]
            Body::Zstd(decoder) => drain(decoder.finish()),
            Body::Closed => Err(closed()),
        }
    }

    fn source_mut(&mut self) -> Option<&mut S> {
        match self {
            Body::Idle(source) => Some(source.get_mut()),
            Body::Stored(bounded) | Body::Opaque(bounded) => Some(bounded.get_mut().get_mut()),
            Body::Deflated(decoder) => Some(decoder.get_mut().get_mut().get_mut()),
            Body::DeflatedToDescriptor(decoder) => Some(decoder.get_mut().get_mut()),
            #[cfg(feature = "bzip2")]
            Body::Bzip2(decoder) => Some(decoder.get_mut().get_mut().get_mut()),
            #[cfg(feature = "zstd")]
            Body::Zstd(decoder) => Some(decoder.get_mut().get_mut().get_mut()),
            Body::Closed => None,
        }
    }
}

fn method_supported(method: u16) -> bool {
    match method {
        METHOD_STORED | METHOD_DEFLATED => true,
        record::METHOD_BZIP2 => cfg!(feature = "bzip2"),
        record::METHOD_ZSTD => cfg!(feature = "zstd"),
        _ => false,
    }
}

fn drain<S: Read>(mut bounded: Bounded<S>) -> io::Result<BufReader<S>> {
    io::copy(&mut bounded, &mut io::sink())?;
    Ok(bounded.into_inner())
}

fn closed() -> io::Error {
    io::Error::other("zip reader is closed")
}

struct Progress {
    header: LocalHeader,
    hasher: crc32fast::Hasher,
    produced: u64,
    done: bool,
}

/// Sequential ZIP reader over a [`Stream`].
pub struct ZipStreamReader<S> {
    body: Body<S>,
    member: Option<Progress>,
    finished: bool,
}

impl<S> std::fmt::Debug for ZipStreamReader<S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ZipStreamReader")
            .field("member", &self.member.as_ref().map(|m| m.header.name.as_str()))
            .field("finished", &self.finished)
            .finish_non_exhaustive()
    }
}

impl<S: Stream> ZipStreamReader<S> {
    /// Creates a reader positioned before the first member.
    pub fn new(source: S) -> Self {
        Self {
            body: Body::Idle(BufReader::with_capacity(READ_BUFFER_SIZE, source)),
            member: None,
            finished: false,
        }
    }

    fn take_source(&mut self) -> io::Result<BufReader<S>> {
        std::mem::replace(&mut self.body, Body::Closed).into_source()
    }

    /// Completes the current member so the next record can be read.
    fn finish_member(&mut self) -> Result<()> {
        let Some(member) = self.member.take() else {
            return Ok(());
        };
        if member.done {
            return Ok(());
        }
        if member.header.has_data_descriptor() {
            // The compressed length is unknown; decode to find the end.
            let mut scratch = vec![0u8; READ_BUFFER_SIZE];
            while self.body.read(&mut scratch)? > 0 {}
            let mut source = self.take_source()?;
            record::read_data_descriptor(&mut source, member.header.zip64)?;
            self.body = Body::Idle(source);
        } else {
            self.body = Body::Idle(self.take_source()?);
        }
        Ok(())
    }

    /// Handles the end of the current member's content.
    fn complete(&mut self) -> io::Result<()> {
        let Some(member) = self.member.as_mut() else {
            return Ok(());
        };
        member.done = true;
        let (crc32, size) = if member.header.has_data_descriptor() {
            let mut source = std::mem::replace(&mut self.body, Body::Closed).into_source()?;
            let (crc32, _, size) = record::read_data_descriptor(&mut source, member.header.zip64)?;
            self.body = Body::Idle(source);
            (crc32, size)
        } else {
            (member.header.crc32, member.header.size)
        };

        if member.produced != size {
            return Err(Error::decode(
                "zip",
                format!(
                    "member {:?} is {} bytes, header says {}",
                    member.header.name, member.produced, size
                ),
            )
            .into());
        }
        let actual = std::mem::take(&mut member.hasher).finalize();
        record::verify_crc(&member.header.name, crc32, actual)
    }
}

impl<S: Stream> SequentialArchive for ZipStreamReader<S> {
    fn next_member(&mut self) -> Result<Option<MemberHeader>> {
        if self.finished {
            return Ok(None);
        }
        self.finish_member()?;
        let mut source = self.take_source()?;

        let at_end = {
            let buffered = io::BufRead::fill_buf(&mut source)?;
            buffered.is_empty()
        };
        if at_end {
            self.finished = true;
            self.body = Body::Idle(source);
            return Ok(None);
        }

        let signature = record::read_u32(&mut source)?;
        match signature {
            LOCAL_HEADER_SIG => {}
            CENTRAL_HEADER_SIG | END_OF_CENTRAL_DIR_SIG | ZIP64_END_OF_CENTRAL_DIR_SIG => {
                self.finished = true;
                self.body = Body::Idle(source);
                return Ok(None);
            }
            other => {
                return Err(Error::decode(
                    "zip",
                    format!("unexpected record signature {other:#010x}"),
                ));
            }
        }

        let header = LocalHeader::read(&mut source)?;
        let kind = if header.name.ends_with('/') {
            MemberKind::Directory
        } else {
            MemberKind::File
        };
        let member = MemberHeader {
            name: header.name.clone(),
            kind,
            size: (!header.has_data_descriptor()).then_some(header.size),
            modified: header.modified,
        };

        self.body = Body::open(source, &header)?;
        self.member = Some(Progress {
            header,
            hasher: crc32fast::Hasher::new(),
            produced: 0,
            done: false,
        });
        Ok(Some(member))
    }

    fn read_member(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let Some(member) = self.member.as_mut() else {
            return Ok(0);
        };
        if member.done || buf.is_empty() {
            return Ok(0);
        }
        let n = self.body.read(buf)?;
        if n > 0 {
            member.hasher.update(&buf[..n]);
            member.produced += n as u64;
            return Ok(n);
        }
        self.complete()?;
        Ok(0)
    }

    fn close(&mut self) -> io::Result<()> {
        let result = self.body.source_mut().map_or(Ok(()), |source| source.close());
        self.body = Body::Closed;
        self.member = None;
        self.finished = true;
        result
    }
}
