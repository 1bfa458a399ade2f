//! Scanner configuration.

use crate::config::Config;

use super::CancellationToken;

/// Worker thread configuration for scans.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Threads {
    /// One worker per available CPU.
    #[default]
    Auto,
    /// A fixed number of workers.
    ///
    /// Use [`Threads::count_or_single`] when the value might be zero.
    Count(std::num::NonZeroUsize),
    /// A single worker. Branches still run on the pool, one at a time.
    Single,
}

impl Threads {
    /// Creates `Threads::Count`, or `Threads::Single` for zero.
    ///
    /// # Example
    ///
    /// ```rust
    /// use burrow::Threads;
    ///
    /// assert_eq!(Threads::count_or_single(0), Threads::Single);
    /// assert_eq!(Threads::count_or_single(4).count(), 4);
    /// ```
    pub fn count_or_single(n: usize) -> Self {
        match std::num::NonZeroUsize::new(n) {
            Some(count) => Self::Count(count),
            None => Self::Single,
        }
    }

    /// Returns the number of workers to start.
    pub fn count(&self) -> usize {
        match self {
            Self::Auto => std::thread::available_parallelism()
                .map(|n| n.get())
                .unwrap_or(1),
            Self::Count(n) => n.get(),
            Self::Single => 1,
        }
    }
}

/// What closing a [`Scanner`](super::Scanner) does with scans still running.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ShutdownPolicy {
    /// Wait for running scans to finish.
    #[default]
    Await,
    /// Cancel the token, then wait for running scans to unwind.
    Cancel,
}

/// Options for creating a [`Scanner`](super::Scanner).
///
/// # Example
///
/// ```rust
/// use burrow::{ScanOptions, ShutdownPolicy, Threads};
///
/// let options = ScanOptions::new()
///     .threads(Threads::count_or_single(2))
///     .shutdown(ShutdownPolicy::Cancel);
/// assert_eq!(options.threads.count(), 2);
/// ```
#[derive(Debug, Clone, Default)]
pub struct ScanOptions {
    /// Worker pool size.
    ///
    /// Default: [`Threads::Auto`].
    pub threads: Threads,

    /// Behaviour of [`Scanner::close`](super::Scanner::close) and drop.
    ///
    /// Default: [`ShutdownPolicy::Await`].
    pub shutdown: ShutdownPolicy,

    /// Configuration for entries the scanner creates itself (see
    /// [`Scanner::scan_path`](super::Scanner::scan_path)).
    ///
    /// Default: [`Config::default`].
    pub config: Config,

    /// Token to share with the caller; a fresh one is created if `None`.
    ///
    /// Default: `None`.
    pub token: Option<CancellationToken>,
}

impl ScanOptions {
    /// Creates default options.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the worker pool size.
    pub fn threads(mut self, threads: Threads) -> Self {
        self.threads = threads;
        self
    }

    /// Sets the shutdown policy.
    pub fn shutdown(mut self, shutdown: ShutdownPolicy) -> Self {
        self.shutdown = shutdown;
        self
    }

    /// Sets the configuration for scanner-created entries.
    pub fn config(mut self, config: Config) -> Self {
        self.config = config;
        self
    }

    /// Uses `token` as the scanner's cancellation token.
    pub fn token(mut self, token: CancellationToken) -> Self {
        self.token = Some(token);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_threads_count() {
        assert_eq!(Threads::Single.count(), 1);
        assert_eq!(Threads::count_or_single(3), Threads::Count(3.try_into().unwrap()));
        assert!(Threads::Auto.count() >= 1);
    }

    #[test]
    fn test_defaults() {
        let options = ScanOptions::default();
        assert_eq!(options.threads, Threads::Auto);
        assert_eq!(options.shutdown, ShutdownPolicy::Await);
        assert!(options.token.is_none());
    }
}
