//! Shared test utilities for integration tests.
//!
//! Note: `#![allow(dead_code)]` is required because each integration test file
//! compiles as a separate crate and may only use a subset of these helpers.

#![allow(dead_code)]

use std::io::Write;
use std::path::Path;

use burrow::DataUri;
use flate2::write::{DeflateEncoder, GzEncoder};

/// How a member is stored by [`zip`].
#[derive(Clone, Copy, PartialEq, Eq)]
pub enum Method {
    Stored,
    Deflated,
}

/// Builds an in-memory zip archive with a central directory.
///
/// Every member carries the DOS timestamp 2024-03-01 12:00:00.
pub fn zip(entries: &[(&str, &[u8])], method: Method) -> Vec<u8> {
    const DOS_TIME: u16 = 12 << 11;
    const DOS_DATE: u16 = ((2024 - 1980) << 9) | (3 << 5) | 1;

    let mut out = Vec::new();
    let mut central = Vec::new();
    for (name, data) in entries {
        let offset = out.len() as u32;
        let body = match method {
            Method::Stored => data.to_vec(),
            Method::Deflated => {
                let mut encoder = DeflateEncoder::new(Vec::new(), flate2::Compression::fast());
                encoder.write_all(data).unwrap();
                encoder.finish().unwrap()
            }
        };
        let method_id: u16 = match method {
            Method::Stored => 0,
            Method::Deflated => 8,
        };
        let crc = crc32fast::hash(data);

        let mut fixed = Vec::new();
        fixed.extend(20u16.to_le_bytes());
        fixed.extend(0u16.to_le_bytes());
        fixed.extend(method_id.to_le_bytes());
        fixed.extend(DOS_TIME.to_le_bytes());
        fixed.extend(DOS_DATE.to_le_bytes());
        fixed.extend(crc.to_le_bytes());
        fixed.extend((body.len() as u32).to_le_bytes());
        fixed.extend((data.len() as u32).to_le_bytes());
        fixed.extend((name.len() as u16).to_le_bytes());
        fixed.extend(0u16.to_le_bytes());

        out.extend(0x0403_4b50u32.to_le_bytes());
        out.extend(&fixed);
        out.extend(name.as_bytes());
        out.extend(&body);

        central.extend(0x0201_4b50u32.to_le_bytes());
        central.extend(20u16.to_le_bytes());
        central.extend(&fixed);
        central.extend([0u8; 6]); // comment length, disk, internal attrs
        central.extend(0u32.to_le_bytes());
        central.extend(offset.to_le_bytes());
        central.extend(name.as_bytes());
    }

    let cd_offset = out.len() as u32;
    out.extend(&central);
    out.extend(0x0605_4b50u32.to_le_bytes());
    out.extend([0u8; 4]);
    out.extend((entries.len() as u16).to_le_bytes());
    out.extend((entries.len() as u16).to_le_bytes());
    out.extend((central.len() as u32).to_le_bytes());
    out.extend(cd_offset.to_le_bytes());
    out.extend(0u16.to_le_bytes());
    out
}

/// Gzip-compresses `data`.
pub fn gzip(data: &[u8]) -> Vec<u8> {
    let mut encoder = GzEncoder::new(Vec::new(), flate2::Compression::fast());
    encoder.write_all(data).unwrap();
    encoder.finish().unwrap()
}

/// Bzip2-compresses `data`.
#[cfg(feature = "bzip2")]
pub fn bzip2(data: &[u8]) -> Vec<u8> {
    let mut encoder = ::bzip2::write::BzEncoder::new(Vec::new(), ::bzip2::Compression::fast());
    encoder.write_all(data).unwrap();
    encoder.finish().unwrap()
}

/// Zstandard-compresses `data`.
#[cfg(feature = "zstd")]
pub fn zstd(data: &[u8]) -> Vec<u8> {
    ::zstd::encode_all(data, 1).unwrap()
}

/// Builds a ustar archive from (path, data) pairs.
pub fn tar(entries: &[(&str, &[u8])]) -> Vec<u8> {
    let mut builder = ::tar::Builder::new(Vec::new());
    for (path, data) in entries {
        let mut header = ::tar::Header::new_gnu();
        header.set_size(data.len() as u64);
        header.set_mode(0o644);
        header.set_mtime(1_709_294_400);
        header.set_entry_type(::tar::EntryType::Regular);
        builder.append_data(&mut header, path, *data).unwrap();
    }
    builder.into_inner().unwrap()
}

/// Renders `data` as a base64 `data:` URI.
pub fn data_uri(data: &[u8], media_type: &str) -> String {
    DataUri::new(Some(media_type), data.to_vec()).to_string()
}

/// Writes `data` to `dir/name`, creating parent directories.
pub fn write_file(dir: &Path, name: &str, data: &[u8]) {
    let path = dir.join(name);
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).unwrap();
    }
    std::fs::write(path, data).unwrap();
}
