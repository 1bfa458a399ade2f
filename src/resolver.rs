//! Decode-chain resolution.
//!
//! [`resolve`] turns an [`Entry`] into a stream over its content by opening
//! the base and then peeling one layer per remaining segment. The layer is
//! chosen from the *sniffing filename*: the base's name for the first step,
//! then the segment just descended into.
//!
//! For each step, with `target` the next segment, the first matching rule
//! applies:
//!
//! 1. the name is exactly `target` + `.gz`, `.bz2` or `.zst` (tried in that
//!    order): decompress;
//! 2. the name ends with `.zip`: find `target` in a sequential zip reader;
//! 3. the name ends with `.tar`, `.tgz` or `.tar.gz`: the same over tar;
//! 4. the name ends with `.rar`: spool the data to a temporary file and
//!    extract `target` (requires the `rar` feature);
//! 5. otherwise the member cannot be reached: [`Error::NotFound`].
//!
//! Every reader created here is owned by the returned stream: closing it
//! closes the archive readers and decoders underneath, down to the base.
//!
//! # Example
//!
//! ```rust
//! use burrow::Entry;
//!
//! let entry = Entry::resolve("/data/archive.zip!report.csv.gz!report.csv").unwrap();
//! assert_eq!(entry.segments(), ["report.csv.gz", "report.csv"]);
//! ```

use std::fs::File;
use std::io;
use std::sync::Arc;

use crate::archive::ArchiveCursor;
use crate::codec::Compression;
use crate::config::Config;
use crate::entry::{Base, Entry};
use crate::format::{Format, base_name};
use crate::stream::{ByteStream, ChainedCloseStream, LazyStream, ReaderStream, Stream};
use crate::{Error, Result};

/// Opens `entry`'s content by walking its decode chain from the base.
pub fn resolve(entry: &Entry) -> Result<ByteStream> {
    let (stream, filename) = open_base(entry.base(), entry.shared_config())?;
    unwrap_layers(stream, &filename, entry.segments(), entry.config())
}

/// Opens the raw base resource and picks the first sniffing filename.
pub(crate) fn open_base(base: &Base, config: &Arc<Config>) -> Result<(ByteStream, String)> {
    match base {
        Base::LocalFile(path) => {
            let file = File::open(path)?;
            let name = path
                .file_name()
                .map_or_else(|| path.to_string_lossy(), |n| n.to_string_lossy())
                .into_owned();
            Ok((ReaderStream::boxed(file), name))
        }
        Base::RemoteUrl(url) => {
            let name = url.path().to_owned();
            let url = url.clone();
            let config = Arc::clone(config);
            let stream = LazyStream::new(move || config.url_opener.open(&url, &config));
            Ok((Box::new(stream), name))
        }
        Base::InlineBytes(bytes) => Ok((
            ReaderStream::boxed(io::Cursor::new(Arc::clone(bytes))),
            "file".to_owned(),
        )),
        Base::DataUri(uri) => Ok((
            ReaderStream::boxed(io::Cursor::new(uri.data().to_vec())),
            uri.sniff_name().to_owned(),
        )),
    }
}

fn unwrap_layers(
    stream: ByteStream,
    filename: &str,
    remaining: &[String],
    config: &Config,
) -> Result<ByteStream> {
    let Some((target, rest)) = remaining.split_first() else {
        return Ok(stream);
    };
    let name = base_name(filename);

    for compression in Compression::ALL {
        if name.strip_suffix(compression.suffix()) == Some(target.as_str()) {
            log::debug!("{name}: {compression} layer");
            let decoded = compression.decoder(stream)?;
            return unwrap_layers(decoded, target, rest, config);
        }
    }

    match Format::container_from_name(name) {
        Some(format @ (Format::Zip | Format::Tar | Format::TarGz)) => {
            log::debug!("{name}: looking for {target:?} in {format} archive");
            extract_sequential(format, stream, target, rest, config)
        }
        Some(Format::Rar) => {
            log::debug!("{name}: looking for {target:?} in rar archive");
            extract_rar(stream, target, rest, config)
        }
        Some(Format::Compressed(_)) | None => Err(Error::not_found(target.as_str())),
    }
}

fn abandon(cursor: &ArchiveCursor) {
    if let Err(e) = cursor.close() {
        log::debug!("closing abandoned archive failed: {e}");
    }
}

fn extract_sequential(
    format: Format,
    stream: ByteStream,
    target: &str,
    rest: &[String],
    config: &Config,
) -> Result<ByteStream> {
    let cursor = ArchiveCursor::open(format, stream)?;
    let inner = cursor
        .seek_member(target)
        .and_then(|found| match found {
            Some(_) => cursor.member(),
            None => Err(Error::not_found(target)),
        })
        .and_then(|member| unwrap_layers(Box::new(member), target, rest, config));

    match inner {
        Ok(inner) => Ok(Box::new(ChainedCloseStream::new(inner, move || {
            cursor.close()
        }))),
        Err(e) => {
            abandon(&cursor);
            Err(e)
        }
    }
}

#[cfg(feature = "rar")]
fn extract_rar(
    mut stream: ByteStream,
    target: &str,
    rest: &[String],
    config: &Config,
) -> Result<ByteStream> {
    let spool = config.spool_file()?;
    let copied = io::copy(&mut stream, &mut spool.as_file());
    let closed = stream.close();
    copied?;
    closed?;
    let data = crate::archive::rar::RarArchive::new(spool.path()).read(target)?;
    drop(spool);
    unwrap_layers(ReaderStream::boxed(io::Cursor::new(data)), target, rest, config)
}

#[cfg(not(feature = "rar"))]
fn extract_rar(
    _stream: ByteStream,
    _target: &str,
    _rest: &[String],
    _config: &Config,
) -> Result<ByteStream> {
    Err(Error::unsupported("rar archives (enable the `rar` feature)"))
}
