//! Concurrent recursive scanning.
//!
//! A [`Scanner`] walks everything reachable from a root entry and hands each
//! terminal entry to a [`Consumer`]. The traversal strategy depends on what
//! the current entry is, decided from its [`last_path`](Entry::last_path):
//!
//! | Entry | Strategy |
//! |-------|----------|
//! | local directory | children scanned in parallel |
//! | local `.zip` | central directory read once, members scanned in parallel |
//! | other `.zip` | one sequential reader, members scanned in-line, in order |
//! | local `.rar` | members scanned in parallel (`rar` feature) |
//! | other `.rar` | spooled to a temp file, members scanned in-line (`rar` feature) |
//! | `.gz`, `.bz2`, `.zst`, `.tar.gz` | delivered as-is with a warning |
//! | anything else | delivered |
//!
//! Members of a sequential archive are delivered with a bound opener that
//! reads straight from the open archive reader; it is detached before the
//! reader advances.
//!
//! Failures are isolated per branch: a corrupt member is logged and
//! recorded in the [`ScanSummary`], and its siblings are still scanned.
//! Cancellation always propagates and ends the scan with
//! [`Error::Cancelled`].
//!
//! # Example
//!
//! ```rust,no_run
//! use burrow::{Entry, Scanner, ScanOptions};
//!
//! # fn main() -> burrow::Result<()> {
//! let scanner = Scanner::new(|entry: &Entry| {
//!     println!("{} ({} bytes)", entry, entry.read_all()?.len());
//!     Ok(())
//! })?;
//! let summary = scanner.scan_path("/data/dumps")?;
//! println!("{} entries, {} failed branches", summary.entries_delivered, summary.branches_failed);
//! scanner.close();
//! # Ok(())
//! # }
//! ```

mod cancel;
mod consumer;
mod options;

pub use cancel::CancellationToken;
pub use consumer::Consumer;
pub use options::{ScanOptions, ShutdownPolicy, Threads};

use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Condvar, Mutex, PoisonError, mpsc};

use rayon::prelude::*;

use crate::archive::ArchiveCursor;
use crate::archive::zip_index::ZipIndex;
use crate::codec::Compression;
use crate::config::Config;
use crate::entry::Entry;
use crate::format::Format;
use crate::{Error, Result};

/// Outcome of one completed scan.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ScanSummary {
    /// Number of consumer calls.
    pub entries_delivered: u64,
    /// Number of branches abandoned because of an error.
    pub branches_failed: usize,
    /// Failed branches as (entry, error message).
    pub failures: Vec<(String, String)>,
}

impl ScanSummary {
    /// Returns `true` if no branch failed.
    pub fn is_complete(&self) -> bool {
        self.failures.is_empty()
    }
}

struct Shared {
    consumer: Box<dyn Consumer>,
    token: CancellationToken,
    config: Arc<Config>,
    running: Mutex<usize>,
    idle: Condvar,
}

impl Shared {
    fn begin(&self) {
        *self.running.lock().unwrap_or_else(PoisonError::into_inner) += 1;
    }

    fn end(&self) {
        let mut running = self.running.lock().unwrap_or_else(PoisonError::into_inner);
        *running -= 1;
        if *running == 0 {
            self.idle.notify_all();
        }
    }

    fn wait_idle(&self) {
        let mut running = self.running.lock().unwrap_or_else(PoisonError::into_inner);
        while *running > 0 {
            running = self.idle.wait(running).unwrap_or_else(PoisonError::into_inner);
        }
    }
}

/// A recursive scanner backed by a worker pool.
///
/// One scanner can run many scans; they share its pool, consumer and
/// cancellation token.
pub struct Scanner {
    shared: Arc<Shared>,
    pool: rayon::ThreadPool,
    shutdown: ShutdownPolicy,
    closed: bool,
}

impl std::fmt::Debug for Scanner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Scanner")
            .field("threads", &self.pool.current_num_threads())
            .field("shutdown", &self.shutdown)
            .field("token", &self.shared.token)
            .finish_non_exhaustive()
    }
}

impl Scanner {
    /// Creates a scanner with default options.
    pub fn new(consumer: impl Consumer + 'static) -> Result<Self> {
        Self::with_options(consumer, ScanOptions::default())
    }

    /// Creates a scanner.
    ///
    /// # Errors
    ///
    /// Fails if the worker pool cannot be started.
    pub fn with_options(consumer: impl Consumer + 'static, options: ScanOptions) -> Result<Self> {
        let threads = options.threads.count();
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(threads)
            .thread_name(|i| format!("burrow-scan-{i}"))
            .build()
            .map_err(|e| Error::Io(io::Error::other(e)))?;
        log::debug!("scanner started with {threads} workers");
        Ok(Self {
            shared: Arc::new(Shared {
                consumer: Box::new(consumer),
                token: options.token.unwrap_or_default(),
                config: Arc::new(options.config),
                running: Mutex::new(0),
                idle: Condvar::new(),
            }),
            pool,
            shutdown: options.shutdown,
            closed: false,
        })
    }

    /// Returns the scanner's cancellation token.
    pub fn token(&self) -> &CancellationToken {
        &self.shared.token
    }

    /// Scans `root` and waits for every branch it dispatched.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Cancelled`] if the scan was stopped, and the root's
    /// own failure if the root itself could not be scanned. Failures below
    /// the root are reported in the summary instead.
    pub fn scan(&self, root: &Entry) -> Result<ScanSummary> {
        self.shared.begin();
        let session = Session::new(&self.shared);
        let result = self.pool.install(|| session.scan(root));
        self.shared.end();
        result.map(|()| session.into_summary())
    }

    /// Scans a local file or directory tree.
    pub fn scan_path(&self, path: impl AsRef<Path>) -> Result<ScanSummary> {
        let root = Entry::from_path(path.as_ref()).with_shared_config(Arc::clone(&self.shared.config));
        self.scan(&root)
    }

    /// Starts scanning `root` in the background.
    pub fn spawn(&self, root: Entry) -> ScanHandle {
        let (sender, receiver) = mpsc::channel();
        let shared = Arc::clone(&self.shared);
        shared.begin();
        self.pool.spawn(move || {
            let session = Session::new(&shared);
            let result = session.scan(&root).map(|()| session.into_summary());
            if sender.send(result).is_err() {
                log::debug!("scan of {root} finished after its handle was dropped");
            }
            shared.end();
        });
        ScanHandle { receiver }
    }

    /// Requests that all scans stop.
    ///
    /// Work already running finishes its current step; nothing new is
    /// started once the token is seen.
    pub fn stop(&self) {
        if self.shared.token.cancel() {
            log::debug!("scan stop requested");
        }
    }

    /// Stops all scans from inside a consumer call.
    ///
    /// Return the result from [`Consumer::accept`] to unwind immediately.
    pub fn stop_from_consumer(&self) -> Error {
        self.shared.token.interrupt()
    }

    /// Shuts the scanner down according to its [`ShutdownPolicy`].
    pub fn close(mut self) {
        self.shutdown();
    }

    fn shutdown(&mut self) {
        if self.closed {
            return;
        }
        self.closed = true;
        if self.shutdown == ShutdownPolicy::Cancel {
            self.stop();
        }
        self.shared.wait_idle();
    }
}

impl Drop for Scanner {
    fn drop(&mut self) {
        self.shutdown();
    }
}

/// Handle on a scan started with [`Scanner::spawn`].
#[derive(Debug)]
pub struct ScanHandle {
    receiver: mpsc::Receiver<Result<ScanSummary>>,
}

impl ScanHandle {
    /// Waits for the scan to finish.
    pub fn join(self) -> Result<ScanSummary> {
        self.receiver
            .recv()
            .map_err(|_| Error::Io(io::Error::other("scan worker exited without a result")))?
    }
}

/// State of one scan call.
struct Session<'a> {
    shared: &'a Shared,
    delivered: AtomicU64,
    failures: Mutex<Vec<(String, String)>>,
}

impl<'a> Session<'a> {
    fn new(shared: &'a Shared) -> Self {
        Self {
            shared,
            delivered: AtomicU64::new(0),
            failures: Mutex::new(Vec::new()),
        }
    }

    fn into_summary(self) -> ScanSummary {
        let failures = self.failures.into_inner().unwrap_or_else(PoisonError::into_inner);
        ScanSummary {
            entries_delivered: self.delivered.into_inner(),
            branches_failed: failures.len(),
            failures,
        }
    }

    fn token(&self) -> &CancellationToken {
        &self.shared.token
    }

    fn scan(&self, entry: &Entry) -> Result<()> {
        self.token().check()?;

        if let Some(path) = entry.local_path().filter(|p| p.is_dir()) {
            return self.scan_directory(entry, path);
        }

        let name = entry.last_path();
        let format = Format::from_name(&name);
        log::trace!("{entry}: {}", format.map_or("plain", |f| f.name()));
        match format {
            Some(Format::Zip) if entry.is_native() => self.scan_zip_index(entry),
            Some(Format::Zip) => self.scan_sequential(entry),
            Some(Format::Rar) => self.scan_rar(entry),
            Some(Format::Compressed(compression)) => self.deliver_compressed(entry, compression),
            // Tar members are reachable only through explicit addresses.
            Some(Format::TarGz) if name.to_ascii_lowercase().ends_with(".gz") => {
                self.deliver_compressed(entry, Compression::Gzip)
            }
            Some(Format::Tar | Format::TarGz) | None => self.deliver(entry),
        }
    }

    fn deliver_compressed(&self, entry: &Entry, compression: Compression) -> Result<()> {
        log::warn!("{entry}: {compression} data without a member name is delivered undecoded");
        self.deliver(entry)
    }

    /// Scans `entry`, containing any failure other than cancellation.
    fn scan_branch(&self, entry: &Entry) -> Result<()> {
        match self.scan(entry) {
            Err(e) if !e.is_cancelled() => {
                log::warn!("skipping {entry}: {e}");
                self.failures
                    .lock()
                    .unwrap_or_else(PoisonError::into_inner)
                    .push((entry.to_string(), e.to_string()));
                Ok(())
            }
            result => result,
        }
    }

    fn deliver(&self, entry: &Entry) -> Result<()> {
        self.token().check()?;
        self.delivered.fetch_add(1, Ordering::Relaxed);
        match self.shared.consumer.accept(entry) {
            Err(e) if e.is_cancelled() => {
                self.token().cancel();
                Err(e)
            }
            result => result,
        }
    }

    fn scan_directory(&self, entry: &Entry, path: &Path) -> Result<()> {
        let mut children = fs::read_dir(path)?
            .map(|item| item.map(|item| item.path()))
            .collect::<io::Result<Vec<PathBuf>>>()?;
        children.sort();
        log::debug!("{}: {} directory entries", path.display(), children.len());

        children.par_iter().try_for_each(|child| {
            if child.is_symlink() && child.is_dir() {
                log::debug!("{}: not following directory symlink", child.display());
                return Ok(());
            }
            let child = Entry::from_path(child.as_path())
                .with_shared_config(Arc::clone(entry.shared_config()));
            self.scan_branch(&child)
        })
    }

    fn scan_zip_index(&self, entry: &Entry) -> Result<()> {
        let Some(path) = entry.local_path() else {
            return self.scan_sequential(entry);
        };
        let index = Arc::new(ZipIndex::open(path)?);

        (0..index.members().len()).into_par_iter().try_for_each(|i| {
            let header = index.members()[i].header();
            if header.is_dir() {
                return Ok(());
            }
            self.token().check()?;
            let members = Arc::clone(&index);
            let mut child = entry
                .child(header.name.as_str())
                .with_opener(move || members.open_member(i));
            if let Some(modified) = header.modified {
                child = child.with_modified(modified);
            }
            self.scan_branch(&child)
        })
    }

    fn scan_sequential(&self, entry: &Entry) -> Result<()> {
        let cursor = ArchiveCursor::open(Format::Zip, entry.open()?)?;
        let walked = self.walk_cursor(entry, &cursor);
        let closed = cursor.close();
        walked?;
        closed?;
        Ok(())
    }

    fn walk_cursor(&self, entry: &Entry, cursor: &ArchiveCursor) -> Result<()> {
        while let Some(header) = cursor.advance()? {
            if header.is_dir() {
                continue;
            }
            self.token().check()?;
            let mut child = entry.child(header.name.as_str());
            if let Some(modified) = header.modified {
                child = child.with_modified(modified);
            }
            let binding = child.bind_member(cursor.member()?);
            let scanned = self.scan_branch(&child);
            binding.release();
            scanned?;
        }
        Ok(())
    }

    #[cfg(feature = "rar")]
    fn scan_rar(&self, entry: &Entry) -> Result<()> {
        use crate::archive::rar::RarArchive;
        use crate::stream::{ReaderStream, Stream};

        let child_of = |header: &crate::archive::MemberHeader| {
            let child = entry.child(header.name.as_str());
            match header.modified {
                Some(modified) => child.with_modified(modified),
                None => child,
            }
        };

        if let Some(path) = entry.local_path() {
            let archive = RarArchive::new(path);
            let members = archive.members()?;
            return members
                .par_iter()
                .filter(|header| !header.is_dir())
                .try_for_each(|header| {
                    self.token().check()?;
                    let archive = archive.clone();
                    let name = header.name.clone();
                    let child = child_of(header).with_opener(move || {
                        Ok(ReaderStream::boxed(io::Cursor::new(archive.read(&name)?)))
                    });
                    self.scan_branch(&child)
                });
        }

        // Members are handled one at a time; the spool is removed on return.
        let spool = entry.config().spool_file()?;
        let mut stream = entry.open()?;
        let copied = io::copy(&mut stream, &mut spool.as_file());
        let closed = stream.close();
        copied?;
        closed?;
        log::debug!("{entry}: spooled to {}", spool.path().display());

        RarArchive::new(spool.path()).for_each(|header, data| {
            self.token().check()?;
            let mut child = child_of(&header);
            let binding = child.bind_bytes(data.into());
            let scanned = self.scan_branch(&child);
            binding.release();
            scanned.map(|()| true)
        })
    }

    #[cfg(not(feature = "rar"))]
    fn scan_rar(&self, entry: &Entry) -> Result<()> {
        log::warn!("{entry}: rar support is not enabled, delivering the archive itself");
        self.deliver(entry)
    }
}
