//! Random-access ZIP reading through the central directory.
//!
//! Used for zip files on the local filesystem. The index is read once; each
//! [`ZipIndex::open_member`] call opens its own file handle, so any number of
//! members can be read at the same time from different threads.

use std::fs::File;
use std::io::{self, BufReader, Read, Seek, SeekFrom};
use std::path::{Path, PathBuf};

use super::record::{
    self, CENTRAL_HEADER_LEN, CENTRAL_HEADER_SIG, END_OF_CENTRAL_DIR_LEN, END_OF_CENTRAL_DIR_SIG,
    LOCAL_HEADER_LEN, LOCAL_HEADER_SIG, METHOD_DEFLATED, METHOD_STORED, U32_SENTINEL,
    ZIP64_END_OF_CENTRAL_DIR_SIG, ZIP64_LOCATOR_SIG, Zip64Fields, le16, le32, le64,
};
use super::{MemberHeader, MemberKind};
use crate::stream::{ByteStream, ReaderStream};
use crate::timestamp;
use crate::{Error, READ_BUFFER_SIZE, Result};

const MAX_COMMENT_LEN: u64 = u16::MAX as u64;

/// One central directory entry.
#[derive(Debug, Clone)]
pub struct IndexedMember {
    header: MemberHeader,
    flags: u16,
    method: u16,
    crc32: u32,
    compressed_size: u64,
    size: u64,
    local_offset: u64,
}

impl IndexedMember {
    /// Returns the member's header.
    pub fn header(&self) -> &MemberHeader {
        &self.header
    }

    fn is_encrypted(&self) -> bool {
        self.flags & record::FLAG_ENCRYPTED != 0
    }
}

/// The central directory of a zip file.
#[derive(Debug)]
pub struct ZipIndex {
    path: PathBuf,
    members: Vec<IndexedMember>,
}

impl ZipIndex {
    /// Reads the central directory of the zip file at `path`.
    ///
    /// # Errors
    ///
    /// Fails with [`Error::DecodeFailure`] if no end of central directory
    /// record is found or the directory is inconsistent.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let mut file = File::open(&path)?;
        let len = file.metadata()?.len();
        if len < END_OF_CENTRAL_DIR_LEN as u64 {
            return Err(Error::decode("zip", "file too short for a zip archive"));
        }

        let tail_len = len.min(END_OF_CENTRAL_DIR_LEN as u64 + MAX_COMMENT_LEN);
        let tail_start = len - tail_len;
        file.seek(SeekFrom::Start(tail_start))?;
        let mut tail = vec![0u8; tail_len as usize];
        file.read_exact(&mut tail)?;

        let eocd = (0..=tail.len() - END_OF_CENTRAL_DIR_LEN)
            .rev()
            .find(|&at| le32(&tail, at) == END_OF_CENTRAL_DIR_SIG)
            .ok_or_else(|| Error::decode("zip", "end of central directory not found"))?;

        let mut count = u64::from(le16(&tail, eocd + 10));
        let mut cd_size = u64::from(le32(&tail, eocd + 12));
        let mut cd_offset = u64::from(le32(&tail, eocd + 16));

        if eocd >= 20 && le32(&tail, eocd - 20) == ZIP64_LOCATOR_SIG {
            let record_offset = le64(&tail, eocd - 20 + 8);
            file.seek(SeekFrom::Start(record_offset))?;
            let mut zip64 = [0u8; 56];
            file.read_exact(&mut zip64)?;
            if le32(&zip64, 0) != ZIP64_END_OF_CENTRAL_DIR_SIG {
                return Err(Error::decode("zip", "zip64 end of central directory not found"));
            }
            count = le64(&zip64, 32);
            cd_size = le64(&zip64, 40);
            cd_offset = le64(&zip64, 48);
        }

        if cd_offset.saturating_add(cd_size) > len {
            return Err(Error::decode("zip", "central directory extends past end of file"));
        }
        file.seek(SeekFrom::Start(cd_offset))?;
        let mut directory = vec![0u8; cd_size as usize];
        file.read_exact(&mut directory)?;

        let members = parse_directory(&directory, count)?;
        log::debug!("indexed {} zip members in {}", members.len(), path.display());
        Ok(Self { path, members })
    }

    /// Returns the zip file's path.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Returns the members in central directory order.
    pub fn members(&self) -> &[IndexedMember] {
        &self.members
    }

    /// Returns the index of the first file member named `name`.
    pub fn find(&self, name: &str) -> Option<usize> {
        self.members
            .iter()
            .position(|m| m.header.name == name && !m.header.is_dir())
    }

    /// Opens member `index` for reading on a fresh file handle.
    ///
    /// The returned stream verifies the member's CRC-32 at end of data.
    pub fn open_member(&self, index: usize) -> Result<ByteStream> {
        let member = self
            .members
            .get(index)
            .ok_or_else(|| Error::not_found(format!("zip member #{index}")))?;
        if member.is_encrypted() {
            return Err(Error::unsupported(format!(
                "encrypted zip member {:?}",
                member.header.name
            )));
        }

        let mut file = File::open(&self.path)?;
        file.seek(SeekFrom::Start(member.local_offset))?;
        if record::read_u32(&mut file)? != LOCAL_HEADER_SIG {
            return Err(Error::decode(
                "zip",
                format!("bad local header for {:?}", member.header.name),
            ));
        }
        let mut fixed = [0u8; LOCAL_HEADER_LEN];
        file.read_exact(&mut fixed)?;
        let skip = i64::from(le16(&fixed, 22)) + i64::from(le16(&fixed, 24));
        file.seek(SeekFrom::Current(skip))?;

        let raw = BufReader::with_capacity(READ_BUFFER_SIZE, file).take(member.compressed_size);
        let content: Box<dyn Read + Send> = match member.method {
            METHOD_STORED => Box::new(raw),
            METHOD_DEFLATED => Box::new(flate2::bufread::DeflateDecoder::new(raw)),
            #[cfg(feature = "bzip2")]
            record::METHOD_BZIP2 => Box::new(bzip2::bufread::BzDecoder::new(raw)),
            #[cfg(feature = "zstd")]
            record::METHOD_ZSTD => Box::new(zstd::stream::read::Decoder::with_buffer(raw)?),
            other => {
                return Err(Error::unsupported(format!(
                    "zip compression method {other} for {:?}",
                    member.header.name
                )));
            }
        };

        Ok(ReaderStream::boxed(Verified {
            inner: content,
            name: member.header.name.clone(),
            hasher: crc32fast::Hasher::new(),
            expected_crc: member.crc32,
            expected_size: member.size,
            produced: 0,
            done: false,
        }))
    }
}

fn parse_directory(directory: &[u8], count: u64) -> Result<Vec<IndexedMember>> {
    let truncated = || Error::decode("zip", "truncated central directory");
    let mut members = Vec::with_capacity(count.min(1 << 16) as usize);
    let mut at = 0;
    for _ in 0..count {
        let fixed_end = at + 4 + CENTRAL_HEADER_LEN;
        if fixed_end > directory.len() {
            return Err(truncated());
        }
        if le32(directory, at) != CENTRAL_HEADER_SIG {
            return Err(Error::decode("zip", "bad central directory signature"));
        }
        let h = &directory[at + 4..fixed_end];
        let flags = le16(h, 4);
        let method = le16(h, 6);
        let time = le16(h, 8);
        let date = le16(h, 10);
        let crc32 = le32(h, 12);
        let compressed = le32(h, 16);
        let size = le32(h, 20);
        let name_len = usize::from(le16(h, 24));
        let extra_len = usize::from(le16(h, 26));
        let comment_len = usize::from(le16(h, 28));
        let offset = le32(h, 38);

        let name_end = fixed_end + name_len;
        let extra_end = name_end + extra_len;
        let next = extra_end + comment_len;
        if next > directory.len() {
            return Err(truncated());
        }
        let name = record::decode_name(&directory[fixed_end..name_end]);
        let extra = &directory[name_end..extra_end];
        let wide = Zip64Fields::parse(
            extra,
            size == U32_SENTINEL,
            compressed == U32_SENTINEL,
            offset == U32_SENTINEL,
        )?;

        let size = wide.size.unwrap_or(u64::from(size));
        let kind = if name.ends_with('/') {
            MemberKind::Directory
        } else {
            MemberKind::File
        };
        members.push(IndexedMember {
            header: MemberHeader {
                modified: record::extended_mtime(extra).or_else(|| timestamp::from_dos(date, time)),
                name,
                kind,
                size: Some(size),
            },
            flags,
            method,
            crc32,
            compressed_size: wide.compressed_size.unwrap_or(u64::from(compressed)),
            size,
            local_offset: wide.local_offset.unwrap_or(u64::from(offset)),
        });
        at = next;
    }
    Ok(members)
}

/// Checks size and CRC-32 when the member's content ends.
struct Verified {
    inner: Box<dyn Read + Send>,
    name: String,
    hasher: crc32fast::Hasher,
    expected_crc: u32,
    expected_size: u64,
    produced: u64,
    done: bool,
}

impl Read for Verified {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        if self.done || buf.is_empty() {
            return Ok(0);
        }
        let n = self
            .inner
            .read(buf)
            .map_err(|e| crate::codec::decode_error("zip", e))?;
        if n > 0 {
            self.hasher.update(&buf[..n]);
            self.produced += n as u64;
            return Ok(n);
        }
        self.done = true;
        if self.produced != self.expected_size {
            return Err(Error::decode(
                "zip",
                format!(
                    "member {:?} is {} bytes, directory says {}",
                    self.name, self.produced, self.expected_size
                ),
            )
            .into());
        }
        let actual = std::mem::take(&mut self.hasher).finalize();
        record::verify_crc(&self.name, self.expected_crc, actual)?;
        Ok(0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::archive::fixture::{self, ZipMember};
    use std::io::Write;

    fn write_zip(members: &[ZipMember<'_>]) -> tempfile::NamedTempFile {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(&fixture::zip(members)).unwrap();
        file.flush().unwrap();
        file
    }

    fn read(index: &ZipIndex, i: usize) -> Vec<u8> {
        let mut out = Vec::new();
        index.open_member(i).unwrap().read_to_end(&mut out).unwrap();
        out
    }

    #[test]
    fn test_index_lists_members() {
        let file = write_zip(&[
            ZipMember::stored("dir/", b""),
            ZipMember::stored("dir/a.txt", b"alpha"),
            ZipMember::deflated("b.txt", b"bravo"),
        ]);
        let index = ZipIndex::open(file.path()).unwrap();
        let names: Vec<_> = index.members().iter().map(|m| m.header().name.as_str()).collect();
        assert_eq!(names, ["dir/", "dir/a.txt", "b.txt"]);
        assert!(index.members()[0].header().is_dir());
        assert_eq!(index.members()[1].header().size, Some(5));
        assert!(index.members()[2].header().modified.is_some());
    }

    #[test]
    fn test_open_member_reads_content() {
        let file = write_zip(&[
            ZipMember::stored("a", b"alpha"),
            ZipMember::deflated("b", b"bravo bravo"),
        ]);
        let index = ZipIndex::open(file.path()).unwrap();
        assert_eq!(read(&index, 0), b"alpha");
        assert_eq!(read(&index, 1), b"bravo bravo");
        assert_eq!(index.find("b"), Some(1));
        assert_eq!(index.find("missing"), None);
    }

    #[test]
    fn test_members_read_concurrently() {
        let file = write_zip(&[
            ZipMember::deflated("a", b"first member"),
            ZipMember::deflated("b", b"second member"),
        ]);
        let index = ZipIndex::open(file.path()).unwrap();
        let mut a = index.open_member(0).unwrap();
        let mut b = index.open_member(1).unwrap();
        let mut left = [0u8; 5];
        let mut right = [0u8; 6];
        a.read_exact(&mut left).unwrap();
        b.read_exact(&mut right).unwrap();
        assert_eq!(&left, b"first");
        assert_eq!(&right, b"second");
    }

    #[test]
    fn test_archive_comment_is_skipped() {
        let mut bytes = fixture::zip(&[ZipMember::stored("a", b"x")]);
        let len = bytes.len();
        bytes[len - 2..].copy_from_slice(&4u16.to_le_bytes());
        bytes.extend(b"note");
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(&bytes).unwrap();
        let index = ZipIndex::open(file.path()).unwrap();
        assert_eq!(read(&index, 0), b"x");
    }

    #[test]
    fn test_not_a_zip() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(&[0u8; 100]).unwrap();
        assert!(ZipIndex::open(file.path()).unwrap_err().is_decode_failure());
    }

    #[test]
    fn test_open_member_out_of_range() {
        let file = write_zip(&[ZipMember::stored("a", b"x")]);
        let index = ZipIndex::open(file.path()).unwrap();
        assert!(index.open_member(3).unwrap_err().is_not_found());
    }
}
