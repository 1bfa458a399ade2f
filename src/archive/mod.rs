//! Archive readers.
//!
//! Two access models are provided:
//!
//! - **Sequential** readers ([`zip_stream`], [`tar`]) walk members in stream
//!   order over any [`Stream`]. Only the current member can be read, and
//!   advancing discards whatever remains of it. They are shared through an
//!   [`ArchiveCursor`].
//! - **Random-access** readers ([`zip_index`], and `rar` behind the `rar`
//!   feature) work on local files. Every member read opens its own file
//!   handle, so members can be read concurrently.

#[cfg(test)]
pub(crate) mod fixture;
mod record;
pub mod tar;
pub mod zip_index;
pub mod zip_stream;

#[cfg(feature = "rar")]
pub mod rar;

use std::fmt;
use std::io::{self, Read};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::SystemTime;

use crate::codec::Compression;
use crate::format::Format;
use crate::stream::{ByteStream, Stream};
use crate::{Error, Result};

/// What kind of filesystem object a member describes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MemberKind {
    /// A regular file with content.
    File,
    /// A directory marker.
    Directory,
}

/// Header information for one archive member.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MemberHeader {
    /// Member path as stored in the archive.
    pub name: String,
    /// File or directory.
    pub kind: MemberKind,
    /// Uncompressed size, when the header declares it.
    pub size: Option<u64>,
    /// Modification time, when the header carries a valid one.
    pub modified: Option<SystemTime>,
}

impl MemberHeader {
    /// Returns `true` for directory markers.
    pub fn is_dir(&self) -> bool {
        self.kind == MemberKind::Directory
    }
}

/// A forward-only archive reader.
pub trait SequentialArchive: Send {
    /// Advances to the next member, discarding the rest of the current one.
    ///
    /// Returns `Ok(None)` at the end of the archive.
    fn next_member(&mut self) -> Result<Option<MemberHeader>>;

    /// Reads from the current member's content.
    ///
    /// Returns `Ok(0)` at the end of the member, or before the first member.
    fn read_member(&mut self, buf: &mut [u8]) -> io::Result<usize>;

    /// Closes the archive and the stream it reads from.
    fn close(&mut self) -> io::Result<()>;
}

struct CursorState {
    archive: Box<dyn SequentialArchive>,
    generation: u64,
    closed: bool,
}

/// A shared handle on one sequential archive.
///
/// Clones refer to the same reader. Each [`advance`](Self::advance) starts a
/// new generation; a [`MemberStream`] obtained earlier stops working once the
/// cursor has moved past its member.
#[derive(Clone)]
pub struct ArchiveCursor {
    shared: Arc<Mutex<CursorState>>,
}

impl fmt::Debug for ArchiveCursor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ArchiveCursor").finish_non_exhaustive()
    }
}

impl ArchiveCursor {
    /// Wraps a sequential archive reader.
    pub fn new(archive: impl SequentialArchive + 'static) -> Self {
        Self {
            shared: Arc::new(Mutex::new(CursorState {
                archive: Box::new(archive),
                generation: 0,
                closed: false,
            })),
        }
    }

    /// Opens a sequential reader for `format` over `stream`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Unsupported`] for formats that need random access
    /// (rar) or single-stream compressions.
    pub fn open(format: Format, stream: ByteStream) -> Result<Self> {
        match format {
            Format::Zip => Ok(Self::new(zip_stream::ZipStreamReader::new(stream))),
            Format::Tar => Ok(Self::new(tar::TarReader::new(stream))),
            Format::TarGz => {
                let decoded = Compression::Gzip.decoder(stream)?;
                Ok(Self::new(tar::TarReader::new(decoded)))
            }
            Format::Rar | Format::Compressed(_) => Err(Error::unsupported(format!(
                "sequential reading of {format} data"
            ))),
        }
    }

    fn lock(&self) -> io::Result<MutexGuard<'_, CursorState>> {
        self.shared
            .lock()
            .map_err(|_| io::Error::other("archive cursor lock poisoned"))
    }

    /// Moves to the next member.
    pub fn advance(&self) -> Result<Option<MemberHeader>> {
        let mut state = self.lock()?;
        if state.closed {
            return Err(Error::Io(closed_cursor()));
        }
        state.generation += 1;
        let header = state.archive.next_member()?;
        if let Some(header) = &header {
            log::trace!("archive member {:?}", header.name);
        }
        Ok(header)
    }

    /// Advances until a member named `name` is found.
    ///
    /// Directory markers never match.
    pub fn seek_member(&self, name: &str) -> Result<Option<MemberHeader>> {
        while let Some(header) = self.advance()? {
            if header.name == name && !header.is_dir() {
                return Ok(Some(header));
            }
        }
        Ok(None)
    }

    /// Returns a stream over the current member's content.
    pub fn member(&self) -> Result<MemberStream> {
        let generation = self.lock()?.generation;
        Ok(MemberStream {
            cursor: self.clone(),
            generation,
            closed: false,
        })
    }

    /// Closes the archive. Later reads through any handle fail.
    pub fn close(&self) -> io::Result<()> {
        let mut state = self.lock()?;
        if state.closed {
            return Ok(());
        }
        state.closed = true;
        state.archive.close()
    }
}

fn closed_cursor() -> io::Error {
    io::Error::other("archive cursor is closed")
}

/// The content of one member of a sequential archive.
///
/// Closing a member stream does not close the archive.
pub struct MemberStream {
    cursor: ArchiveCursor,
    generation: u64,
    closed: bool,
}

impl fmt::Debug for MemberStream {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MemberStream")
            .field("generation", &self.generation)
            .field("closed", &self.closed)
            .finish_non_exhaustive()
    }
}

impl Read for MemberStream {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        if self.closed {
            return Err(io::Error::other("read from a closed member stream"));
        }
        let mut state = self.cursor.lock()?;
        if state.closed {
            return Err(closed_cursor());
        }
        if state.generation != self.generation {
            return Err(io::Error::other("archive cursor moved past this member"));
        }
        state.archive.read_member(buf)
    }
}

impl Stream for MemberStream {
    fn close(&mut self) -> io::Result<()> {
        self.closed = true;
        Ok(())
    }
}
