//! Cooperative cancellation.

use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, OnceLock};

use crate::{Error, Result};

#[derive(Default)]
struct TokenState {
    set: AtomicBool,
    cause: OnceLock<String>,
}

/// A set-once cancellation flag shared by every branch of a scan.
///
/// Clones share state. Once set, a token stays set; there is no reset.
/// Scans check it before every step and unwind with [`Error::Cancelled`].
///
/// # Example
///
/// ```rust
/// use burrow::CancellationToken;
///
/// let token = CancellationToken::new();
/// let observer = token.clone();
/// assert!(token.cancel_with("user pressed ctrl-c"));
/// assert!(!token.cancel());
/// assert!(observer.is_cancelled());
/// assert_eq!(observer.cause(), Some("user pressed ctrl-c"));
/// ```
#[derive(Clone, Default)]
pub struct CancellationToken {
    inner: Arc<TokenState>,
}

impl fmt::Debug for CancellationToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CancellationToken")
            .field("cancelled", &self.is_cancelled())
            .field("cause", &self.cause())
            .finish()
    }
}

impl CancellationToken {
    /// Creates an unset token.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the token. Returns `true` if this call set it.
    pub fn cancel(&self) -> bool {
        self.inner
            .set
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
    }

    /// Sets the token, recording `cause` if this call set it.
    pub fn cancel_with(&self, cause: impl Into<String>) -> bool {
        let won = self.cancel();
        if won {
            // Only the winning caller reaches this, so the cell is empty.
            let _ = self.inner.cause.set(cause.into());
        }
        won
    }

    /// Returns `true` once the token is set.
    pub fn is_cancelled(&self) -> bool {
        self.inner.set.load(Ordering::Acquire)
    }

    /// Returns the cause given to [`cancel_with`](Self::cancel_with).
    pub fn cause(&self) -> Option<&str> {
        self.inner.cause.get().map(String::as_str)
    }

    /// Fails with [`Error::Cancelled`] if the token is set.
    pub fn check(&self) -> Result<()> {
        if self.is_cancelled() {
            Err(Error::Cancelled)
        } else {
            Ok(())
        }
    }

    /// Sets the token and returns the error that unwinds the current scan.
    ///
    /// Meant for consumers: `return Err(token.interrupt())`.
    pub fn interrupt(&self) -> Error {
        self.cancel();
        Error::Cancelled
    }
}
