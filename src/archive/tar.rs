//! Sequential tar reading.
//!
//! Handles ustar, GNU and pax archives as produced by common tools: ustar
//! name prefixes, GNU long names (`L`), and pax `path`, `size` and `mtime`
//! records. Links, devices and other special entries are skipped; only
//! regular files and directories are reported.

use std::io::{self, BufReader, Read};

use super::{MemberHeader, MemberKind, SequentialArchive};
use crate::stream::Stream;
use crate::timestamp;
use crate::{Error, READ_BUFFER_SIZE, Result};

const BLOCK: usize = 512;

/// Largest member size accepted from a header.
const MAX_MEMBER_SIZE: u64 = i64::MAX as u64;

/// Fields of a pax extended header that apply to the next entry.
#[derive(Debug, Default)]
struct PaxOverrides {
    path: Option<String>,
    size: Option<u64>,
    mtime: Option<i64>,
}

/// Sequential tar reader over a [`Stream`].
pub struct TarReader<S> {
    source: Option<BufReader<S>>,
    remaining: u64,
    padding: u64,
    finished: bool,
}

impl<S> std::fmt::Debug for TarReader<S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TarReader")
            .field("remaining", &self.remaining)
            .field("finished", &self.finished)
            .finish_non_exhaustive()
    }
}

impl<S: Stream> TarReader<S> {
    /// Creates a reader positioned before the first entry.
    pub fn new(source: S) -> Self {
        Self {
            source: Some(BufReader::with_capacity(READ_BUFFER_SIZE, source)),
            remaining: 0,
            padding: 0,
            finished: false,
        }
    }

    fn source(&mut self) -> io::Result<&mut BufReader<S>> {
        self.source
            .as_mut()
            .ok_or_else(|| io::Error::other("tar reader is closed"))
    }

    fn skip_current(&mut self) -> io::Result<()> {
        let skip = self
            .remaining
            .checked_add(self.padding)
            .ok_or_else(|| io::Error::from(Error::decode("tar", "member size overflows")))?;
        self.remaining = 0;
        self.padding = 0;
        if skip > 0 {
            let source = self.source()?;
            let skipped = io::copy(&mut source.take(skip), &mut io::sink())?;
            if skipped != skip {
                return Err(truncated().into());
            }
        }
        Ok(())
    }

    /// Reads one header block, or `None` at a clean end of stream.
    fn read_block(&mut self) -> Result<Option<[u8; BLOCK]>> {
        let source = self.source()?;
        let mut block = [0u8; BLOCK];
        let mut filled = 0;
        while filled < BLOCK {
            match source.read(&mut block[filled..]) {
                Ok(0) => break,
                Ok(n) => filled += n,
                Err(e) if e.kind() == io::ErrorKind::Interrupted => {}
                Err(e) => return Err(e.into()),
            }
        }
        match filled {
            0 => Ok(None),
            BLOCK => Ok(Some(block)),
            _ => Err(truncated()),
        }
    }

    /// Reads the content of a metadata entry.
    fn read_payload(&mut self, size: u64) -> Result<Vec<u8>> {
        // Metadata entries are small; cap them to keep corrupt input bounded.
        if size > 1 << 20 {
            return Err(Error::decode("tar", format!("{size}-byte metadata entry")));
        }
        let mut payload = vec![0u8; size as usize];
        let source = self.source()?;
        source.read_exact(&mut payload).map_err(|_| truncated())?;
        self.padding = padding(size);
        self.skip_current()?;
        Ok(payload)
    }
}

impl<S: Stream> SequentialArchive for TarReader<S> {
    fn next_member(&mut self) -> Result<Option<MemberHeader>> {
        if self.finished {
            return Ok(None);
        }
        self.skip_current()?;

        let mut long_name = None;
        let mut pax = PaxOverrides::default();
        loop {
            let Some(block) = self.read_block()? else {
                self.finished = true;
                return Ok(None);
            };
            if block.iter().all(|&b| b == 0) {
                self.finished = true;
                return Ok(None);
            }
            verify_checksum(&block)?;

            let size = match pax.size {
                Some(size) => size,
                None => parse_numeric(&block[124..136])?,
            };
            if size > MAX_MEMBER_SIZE {
                return Err(Error::decode("tar", format!("{size}-byte member")));
            }
            let typeflag = block[156];
            match typeflag {
                b'L' => {
                    long_name = Some(cstr(&self.read_payload(size)?));
                    continue;
                }
                b'x' => {
                    let records = self.read_payload(size)?;
                    apply_pax(&records, &mut pax)?;
                    continue;
                }
                _ => {}
            }

            let name = match (pax.path.take(), long_name.take()) {
                (Some(path), _) | (None, Some(path)) => path,
                (None, None) => ustar_name(&block),
            };
            let kind = match typeflag {
                b'5' => MemberKind::Directory,
                b'0' | 0 | b'7' if name.ends_with('/') => MemberKind::Directory,
                b'0' | 0 | b'7' => MemberKind::File,
                other => {
                    log::trace!("skipping tar entry {name:?} of type {:?}", other as char);
                    self.remaining = size;
                    self.padding = padding(size);
                    self.skip_current()?;
                    pax = PaxOverrides::default();
                    continue;
                }
            };

            let mtime = match pax.mtime {
                Some(secs) => secs,
                None => i64::try_from(parse_numeric(&block[136..148])?).unwrap_or(i64::MAX),
            };
            self.remaining = size;
            self.padding = padding(size);
            if kind == MemberKind::Directory {
                self.skip_current()?;
            }
            return Ok(Some(MemberHeader {
                name,
                kind,
                size: Some(size),
                modified: timestamp::from_unix_secs(mtime),
            }));
        }
    }

    fn read_member(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        if self.remaining == 0 || buf.is_empty() {
            return Ok(0);
        }
        let limit = buf.len().min(usize::try_from(self.remaining).unwrap_or(usize::MAX));
        let source = self.source()?;
        let n = source.read(&mut buf[..limit])?;
        if n == 0 {
            return Err(truncated().into());
        }
        self.remaining -= n as u64;
        Ok(n)
    }

    fn close(&mut self) -> io::Result<()> {
        self.finished = true;
        self.remaining = 0;
        match self.source.take() {
            Some(mut source) => source.get_mut().close(),
            None => Ok(()),
        }
    }
}

fn truncated() -> Error {
    Error::decode("tar", "unexpected end of archive")
}

fn padding(size: u64) -> u64 {
    (BLOCK as u64 - size % BLOCK as u64) % BLOCK as u64
}

/// Text up to the first NUL.
fn cstr(field: &[u8]) -> String {
    let end = field.iter().position(|&b| b == 0).unwrap_or(field.len());
    String::from_utf8_lossy(&field[..end]).into_owned()
}

fn ustar_name(block: &[u8; BLOCK]) -> String {
    let name = cstr(&block[..100]);
    if &block[257..263] == b"ustar\0" {
        let prefix = cstr(&block[345..500]);
        if !prefix.is_empty() {
            return format!("{prefix}/{name}");
        }
    }
    name
}

/// Parses an octal or GNU base-256 numeric field.
fn parse_numeric(field: &[u8]) -> Result<u64> {
    if field.first().is_some_and(|&b| b & 0x80 != 0) {
        let mut value: u64 = u64::from(field[0] & 0x7f);
        for &b in &field[1..] {
            value = value
                .checked_mul(256)
                .and_then(|v| v.checked_add(u64::from(b)))
                .ok_or_else(|| Error::decode("tar", "numeric field overflows"))?;
        }
        return Ok(value);
    }

    let digits = field
        .iter()
        .skip_while(|&&b| b == b' ' || b == 0)
        .take_while(|&&b| b != b' ' && b != 0);
    let mut value: u64 = 0;
    for &b in digits {
        if !(b'0'..=b'7').contains(&b) {
            return Err(Error::decode("tar", "invalid octal field"));
        }
        value = value
            .checked_mul(8)
            .map(|v| v + u64::from(b - b'0'))
            .ok_or_else(|| Error::decode("tar", "numeric field overflows"))?;
    }
    Ok(value)
}

fn verify_checksum(block: &[u8; BLOCK]) -> Result<()> {
    let stored = parse_numeric(&block[148..156])?;
    let unsigned: u64 = block
        .iter()
        .enumerate()
        .map(|(i, &b)| if (148..156).contains(&i) { u64::from(b' ') } else { u64::from(b) })
        .sum();
    let signed: i64 = block
        .iter()
        .enumerate()
        .map(|(i, &b)| if (148..156).contains(&i) { i64::from(b' ') } else { i64::from(b as i8) })
        .sum();
    if stored == unsigned || i64::try_from(stored).is_ok_and(|s| s == signed) {
        Ok(())
    } else {
        Err(Error::decode("tar", "header checksum mismatch"))
    }
}

/// Applies `length key=value\n` records.
fn apply_pax(records: &[u8], pax: &mut PaxOverrides) -> Result<()> {
    let malformed = || Error::decode("tar", "malformed pax header");
    let mut rest = records;
    while !rest.is_empty() {
        let space = rest.iter().position(|&b| b == b' ').ok_or_else(malformed)?;
        let len: usize = std::str::from_utf8(&rest[..space])
            .ok()
            .and_then(|s| s.parse().ok())
            .filter(|&len| len > space && len <= rest.len())
            .ok_or_else(malformed)?;
        let record = &rest[space + 1..len];
        let record = record.strip_suffix(b"\n").unwrap_or(record);
        rest = &rest[len..];

        let Some(eq) = record.iter().position(|&b| b == b'=') else {
            return Err(malformed());
        };
        let value = String::from_utf8_lossy(&record[eq + 1..]);
        match &record[..eq] {
            b"path" => pax.path = Some(value.into_owned()),
            b"size" => pax.size = Some(value.parse().map_err(|_| malformed())?),
            b"mtime" => {
                let whole = value.split('.').next().unwrap_or_default();
                pax.mtime = Some(whole.parse().map_err(|_| malformed())?);
            }
            _ => {}
        }
    }
    Ok(())
}
