//! Fuzz target for address parsing.
//!
//! Run with: cargo +nightly fuzz run address
//!
//! Properties checked:
//! - parsing never panics
//! - a parsed entry's address parses back to the same entry

#![no_main]

use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    let Ok(text) = std::str::from_utf8(data) else {
        return;
    };
    let Ok(entry) = burrow::Entry::resolve(text) else {
        return;
    };
    if let burrow::Base::LocalFile(_) = entry.base() {
        let again = burrow::Entry::resolve(&entry.address())
            .expect("a rendered address must parse");
        assert_eq!(again, entry, "address {:?} did not round-trip", entry.address());
    }
});
