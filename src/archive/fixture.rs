//! In-memory archive builders for unit tests.

use std::io::Write;

use flate2::Compression;
use flate2::write::{DeflateEncoder, GzEncoder};

use super::record::{
    CENTRAL_HEADER_SIG, DATA_DESCRIPTOR_SIG, END_OF_CENTRAL_DIR_SIG, LOCAL_HEADER_SIG,
};

/// 2024-03-01 12:00:00 in DOS format.
pub(crate) const DOS_DATE: u16 = ((2024 - 1980) << 9) | (3 << 5) | 1;
pub(crate) const DOS_TIME: u16 = 12 << 11;

pub(crate) struct ZipMember<'a> {
    pub name: &'a str,
    pub data: &'a [u8],
    pub deflate: bool,
    pub descriptor: bool,
}

impl<'a> ZipMember<'a> {
    pub(crate) fn stored(name: &'a str, data: &'a [u8]) -> Self {
        Self {
            name,
            data,
            deflate: false,
            descriptor: false,
        }
    }

    pub(crate) fn deflated(name: &'a str, data: &'a [u8]) -> Self {
        Self {
            deflate: true,
            ..Self::stored(name, data)
        }
    }

    pub(crate) fn with_descriptor(mut self) -> Self {
        self.descriptor = true;
        self
    }
}

fn deflate(data: &[u8]) -> Vec<u8> {
    let mut encoder = DeflateEncoder::new(Vec::new(), Compression::default());
    encoder.write_all(data).unwrap();
    encoder.finish().unwrap()
}

/// Builds a complete zip archive with a central directory.
pub(crate) fn zip(members: &[ZipMember<'_>]) -> Vec<u8> {
    let mut out = Vec::new();
    let mut central = Vec::new();
    for m in members {
        let offset = out.len() as u32;
        let compressed = if m.deflate {
            deflate(m.data)
        } else {
            m.data.to_vec()
        };
        let crc = crc32fast::hash(m.data);
        let flags: u16 = if m.descriptor { 0x0008 } else { 0 };
        let method: u16 = if m.deflate { 8 } else { 0 };
        let csize = compressed.len() as u32;
        let size = m.data.len() as u32;
        let name = m.name.as_bytes();

        out.extend(LOCAL_HEADER_SIG.to_le_bytes());
        out.extend(20u16.to_le_bytes());
        out.extend(flags.to_le_bytes());
        out.extend(method.to_le_bytes());
        out.extend(DOS_TIME.to_le_bytes());
        out.extend(DOS_DATE.to_le_bytes());
        if m.descriptor {
            out.extend([0u8; 12]);
        } else {
            out.extend(crc.to_le_bytes());
            out.extend(csize.to_le_bytes());
            out.extend(size.to_le_bytes());
        }
        out.extend((name.len() as u16).to_le_bytes());
        out.extend(0u16.to_le_bytes());
        out.extend(name);
        out.extend(&compressed);
        if m.descriptor {
            out.extend(DATA_DESCRIPTOR_SIG.to_le_bytes());
            out.extend(crc.to_le_bytes());
            out.extend(csize.to_le_bytes());
            out.extend(size.to_le_bytes());
        }

        central.extend(CENTRAL_HEADER_SIG.to_le_bytes());
        central.extend(20u16.to_le_bytes());
        central.extend(20u16.to_le_bytes());
        central.extend(flags.to_le_bytes());
        central.extend(method.to_le_bytes());
        central.extend(DOS_TIME.to_le_bytes());
        central.extend(DOS_DATE.to_le_bytes());
        central.extend(crc.to_le_bytes());
        central.extend(csize.to_le_bytes());
        central.extend(size.to_le_bytes());
        central.extend((name.len() as u16).to_le_bytes());
        central.extend([0u8; 12]);
        central.extend(offset.to_le_bytes());
        central.extend(name);
    }

    let cd_offset = out.len() as u32;
    let cd_size = central.len() as u32;
    let count = members.len() as u16;
    out.extend(central);
    out.extend(END_OF_CENTRAL_DIR_SIG.to_le_bytes());
    out.extend([0u8; 4]);
    out.extend(count.to_le_bytes());
    out.extend(count.to_le_bytes());
    out.extend(cd_size.to_le_bytes());
    out.extend(cd_offset.to_le_bytes());
    out.extend(0u16.to_le_bytes());
    out
}

/// One tar header and its padded content.
pub(crate) fn tar_entry(name: &str, typeflag: u8, data: &[u8]) -> Vec<u8> {
    let mut header = [0u8; 512];
    header[..name.len()].copy_from_slice(name.as_bytes());
    header[100..108].copy_from_slice(b"0000644\0");
    header[108..116].copy_from_slice(b"0000000\0");
    header[116..124].copy_from_slice(b"0000000\0");
    header[124..136].copy_from_slice(format!("{:011o}\0", data.len()).as_bytes());
    header[136..148].copy_from_slice(format!("{:011o}\0", TAR_MTIME).as_bytes());
    header[156] = typeflag;
    header[257..263].copy_from_slice(b"ustar\0");
    header[263..265].copy_from_slice(b"00");
    header[148..156].copy_from_slice(b"        ");
    let sum: u32 = header.iter().map(|&b| u32::from(b)).sum();
    header[148..156].copy_from_slice(format!("{sum:06o}\0 ").as_bytes());

    let mut out = header.to_vec();
    out.extend(data);
    out.resize(out.len().next_multiple_of(512), 0);
    out
}

/// 2024-03-01 12:00:00 UTC.
pub(crate) const TAR_MTIME: u64 = 1_709_294_400;

/// Builds a ustar archive. Names ending in `/` become directories.
pub(crate) fn tar(members: &[(&str, &[u8])]) -> Vec<u8> {
    let mut out = Vec::new();
    for (name, data) in members {
        let typeflag = if name.ends_with('/') { b'5' } else { b'0' };
        out.extend(tar_entry(name, typeflag, data));
    }
    out.extend([0u8; 1024]);
    out
}

pub(crate) fn gzip(data: &[u8]) -> Vec<u8> {
    let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
    encoder.write_all(data).unwrap();
    encoder.finish().unwrap()
}
