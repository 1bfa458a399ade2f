//! # burrow
//!
//! Addressable access to content nested inside chained compression and
//! archive containers.
//!
//! An [`Entry`] names a piece of content by a base resource (a local file,
//! a URL, a `data:` URI or bytes in memory) and a list of *segments*, one
//! per container layer to descend through. Opening an entry walks the decode
//! chain lazily: each layer is decompressed or searched only as far as the
//! next segment requires.
//!
//! ## Quick Start
//!
//! ### Reading a Nested Member
//!
//! ```rust,no_run
//! use burrow::{Entry, Result};
//!
//! fn main() -> Result<()> {
//!     // A gzip file inside a zip inside a gzipped tarball.
//!     let entry = Entry::resolve("/data/bundle.tgz!inner.zip!report.csv.gz!report.csv")?;
//!     let text = entry.read_to_string()?;
//!     println!("{} lines", text.lines().count());
//!     Ok(())
//! }
//! ```
//!
//! ### Scanning Everything Below a Root
//!
//! ```rust,no_run
//! use burrow::{Entry, Result, ScanOptions, Scanner, Threads};
//!
//! fn main() -> Result<()> {
//!     let options = ScanOptions::new().threads(Threads::count_or_single(8));
//!     let scanner = Scanner::with_options(
//!         |entry: &Entry| -> Result<()> {
//!             println!("{}", entry.address());
//!             Ok(())
//!         },
//!         options,
//!     )?;
//!     let summary = scanner.scan_path("/data")?;
//!     println!("{} entries", summary.entries_delivered);
//!     Ok(())
//! }
//! ```
//!
//! ## Addresses
//!
//! A textual address is a base followed by `!`-separated segments:
//!
//! | Address | Base | Segments |
//! |---------|------|----------|
//! | `/tmp/a.zip!b.txt` | local file | `b.txt` |
//! | `zip:file:///tmp/a.zip!b.txt` | local file | `b.txt` |
//! | `gz:https://host/x.gz!x` | remote URL | `x` |
//! | `data:application/gzip;base64,...!file` | data URI | `file` |
//!
//! See [`address`] for the full grammar.
//!
//! ## Feature Flags
//!
//! | Feature | Default | Description |
//! |---------|---------|-------------|
//! | `gzip` | Yes | gzip layers and `.tgz` archives |
//! | `bzip2` | Yes | bzip2 layers |
//! | `zstd` | Yes | Zstandard layers |
//! | `http` | Yes | Built-in HTTP(S) URL opener |
//! | `rar` | No | RAR archives through `unrar` |
//! | `cli` | No | Command-line interface tool |
//!
//! ## Error Handling
//!
//! All operations return [`Result<T>`], an alias for
//! `std::result::Result<T, Error>`:
//!
//! ```rust,no_run
//! use burrow::{Entry, Error};
//!
//! fn peek(address: &str) -> burrow::Result<()> {
//!     match Entry::resolve(address)?.read_all() {
//!         Ok(data) => println!("{} bytes", data.len()),
//!         Err(Error::NotFound { member }) => eprintln!("no member {member}"),
//!         Err(e) if e.is_decode_failure() => eprintln!("corrupt data: {e}"),
//!         Err(e) => return Err(e),
//!     }
//!     Ok(())
//! }
//! # fn main() {}
//! ```
//!
//! ## Minimum Supported Rust Version (MSRV)
//!
//! This crate requires **Rust 1.85** or later.

#![cfg_attr(docsrs, feature(doc_cfg))]
#![warn(missing_docs)]
#![warn(rust_2018_idioms)]

/// Buffer size for archive and chunked reads (64 KiB).
pub const READ_BUFFER_SIZE: usize = 64 * 1024;

pub mod address;
pub mod archive;
pub mod codec;
pub mod config;
pub mod data_uri;
pub mod entry;
pub mod error;
pub mod format;
pub mod resolver;
pub mod scan;
pub mod stream;
pub mod timestamp;
pub mod transport;

pub use address::Address;
pub use codec::Compression;
pub use config::Config;
pub use data_uri::DataUri;
pub use entry::{Base, Entry};
pub use error::{Error, Result};
pub use format::Format;
pub use scan::{
    CancellationToken, Consumer, ScanHandle, ScanOptions, ScanSummary, Scanner, ShutdownPolicy,
    Threads,
};
pub use stream::{ByteStream, Stream};
pub use transport::{DefaultUrlOpener, UrlOpener};
