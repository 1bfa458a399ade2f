//! The receiver of scanned entries.

use crate::Result;
use crate::entry::Entry;

/// Receives every terminal entry a scan discovers.
///
/// `accept` is called from worker threads, possibly concurrently for
/// entries from independent branches. The entry may be opened any number of
/// times during the call; opening it after `accept` returns re-resolves it
/// from its base.
///
/// Returning [`Error::Cancelled`](crate::Error::Cancelled) (for example via
/// [`CancellationToken::interrupt`](super::CancellationToken::interrupt))
/// stops the whole scan. Any other error fails only the branch that
/// delivered the entry.
pub trait Consumer: Send + Sync {
    /// Handles one entry.
    fn accept(&self, entry: &Entry) -> Result<()>;
}

impl<F> Consumer for F
where
    F: Fn(&Entry) -> Result<()> + Send + Sync,
{
    fn accept(&self, entry: &Entry) -> Result<()> {
        self(entry)
    }
}
