//! ZIP record layouts shared by the sequential and indexed readers.

use std::io::{self, BufRead, Read};
use std::time::SystemTime;

use crate::timestamp;
use crate::{Error, Result};

pub(crate) const LOCAL_HEADER_SIG: u32 = 0x0403_4b50;
pub(crate) const CENTRAL_HEADER_SIG: u32 = 0x0201_4b50;
pub(crate) const END_OF_CENTRAL_DIR_SIG: u32 = 0x0605_4b50;
pub(crate) const ZIP64_END_OF_CENTRAL_DIR_SIG: u32 = 0x0606_4b50;
pub(crate) const ZIP64_LOCATOR_SIG: u32 = 0x0706_4b50;
pub(crate) const DATA_DESCRIPTOR_SIG: u32 = 0x0807_4b50;

/// Fixed part of a local file header, signature excluded.
pub(crate) const LOCAL_HEADER_LEN: usize = 26;
/// Fixed part of a central directory header, signature excluded.
pub(crate) const CENTRAL_HEADER_LEN: usize = 42;
/// End of central directory record, signature included.
pub(crate) const END_OF_CENTRAL_DIR_LEN: usize = 22;

pub(crate) const FLAG_ENCRYPTED: u16 = 0x0001;
pub(crate) const FLAG_DATA_DESCRIPTOR: u16 = 0x0008;

pub(crate) const METHOD_STORED: u16 = 0;
pub(crate) const METHOD_DEFLATED: u16 = 8;
pub(crate) const METHOD_BZIP2: u16 = 12;
pub(crate) const METHOD_ZSTD: u16 = 93;

const EXTRA_ZIP64: u16 = 0x0001;
const EXTRA_EXTENDED_TIMESTAMP: u16 = 0x5455;

pub(crate) const U32_SENTINEL: u32 = 0xffff_ffff;

pub(crate) fn le16(bytes: &[u8], at: usize) -> u16 {
    u16::from_le_bytes([bytes[at], bytes[at + 1]])
}

pub(crate) fn le32(bytes: &[u8], at: usize) -> u32 {
    u32::from_le_bytes([bytes[at], bytes[at + 1], bytes[at + 2], bytes[at + 3]])
}

pub(crate) fn le64(bytes: &[u8], at: usize) -> u64 {
    let mut raw = [0u8; 8];
    raw.copy_from_slice(&bytes[at..at + 8]);
    u64::from_le_bytes(raw)
}

pub(crate) fn read_u32<R: Read + ?Sized>(reader: &mut R) -> io::Result<u32> {
    let mut raw = [0u8; 4];
    reader.read_exact(&mut raw)?;
    Ok(u32::from_le_bytes(raw))
}

/// Fields of a local header needed to read the member that follows it.
#[derive(Debug, Clone)]
pub(crate) struct LocalHeader {
    pub flags: u16,
    pub method: u16,
    pub crc32: u32,
    pub compressed_size: u64,
    pub size: u64,
    pub name: String,
    pub modified: Option<SystemTime>,
    pub zip64: bool,
}

impl LocalHeader {
    /// Parses the header that follows a local header signature.
    pub(crate) fn read<R: Read + ?Sized>(reader: &mut R) -> Result<Self> {
        let mut fixed = [0u8; LOCAL_HEADER_LEN];
        reader.read_exact(&mut fixed)?;
        let flags = le16(&fixed, 2);
        let method = le16(&fixed, 4);
        let time = le16(&fixed, 6);
        let date = le16(&fixed, 8);
        let crc32 = le32(&fixed, 10);
        let compressed = le32(&fixed, 14);
        let size = le32(&fixed, 18);
        let name_len = usize::from(le16(&fixed, 22));
        let extra_len = usize::from(le16(&fixed, 24));

        let mut name = vec![0u8; name_len];
        reader.read_exact(&mut name)?;
        let mut extra = vec![0u8; extra_len];
        reader.read_exact(&mut extra)?;

        let wide = Zip64Fields::parse(
            &extra,
            size == U32_SENTINEL,
            compressed == U32_SENTINEL,
            false,
        )?;
        Ok(Self {
            flags,
            method,
            crc32,
            compressed_size: wide.compressed_size.unwrap_or(u64::from(compressed)),
            size: wide.size.unwrap_or(u64::from(size)),
            name: decode_name(&name),
            modified: extended_mtime(&extra).or_else(|| timestamp::from_dos(date, time)),
            zip64: wide.present,
        })
    }

    pub(crate) fn is_encrypted(&self) -> bool {
        self.flags & FLAG_ENCRYPTED != 0
    }

    pub(crate) fn has_data_descriptor(&self) -> bool {
        self.flags & FLAG_DATA_DESCRIPTOR != 0
    }
}

/// Values from a zip64 extended information extra field.
#[derive(Debug, Default)]
pub(crate) struct Zip64Fields {
    pub present: bool,
    pub size: Option<u64>,
    pub compressed_size: Option<u64>,
    pub local_offset: Option<u64>,
}

impl Zip64Fields {
    /// Reads the fields flagged as overflowed, in their fixed order.
    pub(crate) fn parse(
        extra: &[u8],
        want_size: bool,
        want_compressed: bool,
        want_offset: bool,
    ) -> Result<Self> {
        let Some(data) = find_extra(extra, EXTRA_ZIP64) else {
            return Ok(Self::default());
        };
        let mut fields = Self {
            present: true,
            ..Self::default()
        };
        let mut at = 0;
        let mut take = |wanted: bool| -> Result<Option<u64>> {
            if !wanted {
                return Ok(None);
            }
            if data.len() < at + 8 {
                return Err(Error::decode("zip", "truncated zip64 extra field"));
            }
            let value = le64(data, at);
            at += 8;
            Ok(Some(value))
        };
        fields.size = take(want_size)?;
        fields.compressed_size = take(want_compressed)?;
        fields.local_offset = take(want_offset)?;
        Ok(fields)
    }
}

fn find_extra(extra: &[u8], id: u16) -> Option<&[u8]> {
    let mut at = 0;
    while at + 4 <= extra.len() {
        let field = le16(extra, at);
        let len = usize::from(le16(extra, at + 2));
        let start = at + 4;
        let end = start.checked_add(len)?;
        if end > extra.len() {
            return None;
        }
        if field == id {
            return Some(&extra[start..end]);
        }
        at = end;
    }
    None
}

/// Modification time from the extended timestamp extra field.
pub(crate) fn extended_mtime(extra: &[u8]) -> Option<SystemTime> {
    let data = find_extra(extra, EXTRA_EXTENDED_TIMESTAMP)?;
    if data.len() >= 5 && data[0] & 0x01 != 0 {
        let secs = le32(data, 1) as i32;
        timestamp::from_unix_secs(i64::from(secs))
    } else {
        None
    }
}

/// Decodes a stored member name as UTF-8, lossily for legacy code pages.
pub(crate) fn decode_name(raw: &[u8]) -> String {
    String::from_utf8_lossy(raw).into_owned()
}

/// Reads a data descriptor, returning `(crc32, compressed_size, size)`.
///
/// The leading signature is optional.
pub(crate) fn read_data_descriptor<R: BufRead + ?Sized>(
    reader: &mut R,
    zip64: bool,
) -> Result<(u32, u64, u64)> {
    let first = read_u32(reader)?;
    let crc32 = if first == DATA_DESCRIPTOR_SIG {
        read_u32(reader)?
    } else {
        first
    };
    if zip64 {
        let mut sizes = [0u8; 16];
        reader.read_exact(&mut sizes)?;
        Ok((crc32, le64(&sizes, 0), le64(&sizes, 8)))
    } else {
        let mut sizes = [0u8; 8];
        reader.read_exact(&mut sizes)?;
        Ok((crc32, u64::from(le32(&sizes, 0)), u64::from(le32(&sizes, 4))))
    }
}

/// Rejects a member whose content does not hash to the recorded CRC.
pub(crate) fn verify_crc(name: &str, expected: u32, actual: u32) -> io::Result<()> {
    if expected == actual {
        Ok(())
    } else {
        Err(Error::decode(
            "zip",
            format!("CRC mismatch for {name:?}: expected {expected:#010x}, got {actual:#010x}"),
        )
        .into())
    }
}
