//! Fuzz target for the sequential zip reader.
//!
//! Run with: cargo +nightly fuzz run zip_stream
//!
//! Arbitrary bytes are read as a zip stream. Every member is
//! visited and drained; any outcome other than a panic is acceptable.

#![no_main]

use burrow::archive::ArchiveCursor;
use burrow::stream::ReaderStream;
use burrow::{Format, Stream};
use libfuzzer_sys::fuzz_target;
use std::io::Read;

fuzz_target!(|data: &[u8]| {
    let stream = ReaderStream::boxed(std::io::Cursor::new(data.to_vec()));
    let Ok(cursor) = ArchiveCursor::open(Format::Zip, stream) else {
        return;
    };
    while let Ok(Some(_)) = cursor.advance() {
        let Ok(mut member) = cursor.member() else {
            break;
        };
        let mut sink = Vec::new();
        let _ = member.read_to_end(&mut sink);
        let _ = member.close();
    }
    let _ = cursor.close();
});
