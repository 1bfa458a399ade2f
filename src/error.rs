//! Error types for nested-content access and scanning.
//!
//! This module provides the [`Error`] enum which represents every failure
//! mode when resolving an [`Entry`](crate::Entry) or scanning a tree of
//! containers, along with a convenient [`Result<T>`] type alias.
//!
//! # Error Handling
//!
//! All fallible operations in this crate return `Result<T, Error>`:
//!
//! ```rust,no_run
//! use burrow::{Entry, Result};
//!
//! fn read_member(address: &str) -> Result<Vec<u8>> {
//!     Entry::resolve(address)?.read_all()
//! }
//! ```
//!
//! Streams handed out by the crate implement [`std::io::Read`], so failures
//! that happen mid-read travel as [`std::io::Error`]. Converting such an
//! error back with `Error::from` recovers the original variant:
//!
//! ```rust
//! use burrow::Error;
//!
//! let io: std::io::Error = Error::not_found("inner.txt").into();
//! assert_eq!(io.kind(), std::io::ErrorKind::NotFound);
//! assert!(Error::from(io).is_not_found());
//! ```

use std::io;

/// The error type for burrow operations.
///
/// | Category | Variants | Typical Cause |
/// |----------|----------|---------------|
/// | I/O | [`Io`][Self::Io] | File system or socket operations |
/// | Addressing | [`MalformedAddress`][Self::MalformedAddress], [`NotFound`][Self::NotFound] | Bad address or absent member |
/// | Content | [`DecodeFailure`][Self::DecodeFailure] | Corrupt compressed or archive data |
/// | Transport | [`Http`][Self::Http] | Non-200 responses, redirect loops |
/// | Control | [`Cancelled`][Self::Cancelled] | Scan stopped |
/// | Compatibility | [`Unsupported`][Self::Unsupported] | Disabled feature or unknown method |
#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum Error {
    /// An I/O error occurred while opening or reading a resource.
    #[error("I/O error: {0}")]
    Io(io::Error),

    /// A named member does not exist in its container, or the decode chain
    /// cannot make progress while segments remain.
    #[error("member not found: {member}")]
    NotFound {
        /// The segment that could not be located.
        member: String,
    },

    /// An address string violates the address grammar.
    #[error("malformed address {address:?}: {reason}")]
    MalformedAddress {
        /// The offending address.
        address: String,
        /// What was wrong with it.
        reason: String,
    },

    /// The scan was stopped through its cancellation token.
    #[error("scan cancelled")]
    Cancelled,

    /// Compressed or archived data could not be decoded.
    #[error("{format} decode failure: {reason}")]
    DecodeFailure {
        /// The format being decoded (`"zip"`, `"tar"`, `"gzip"`, ...).
        format: &'static str,
        /// A description of the failure.
        reason: String,
    },

    /// A remote fetch did not produce a body.
    #[error("HTTP request to {url} failed{}: {reason}", .status.map(|s| format!(" with status {s}")).unwrap_or_default())]
    Http {
        /// The requested URL.
        url: String,
        /// The final status code, if a response was received.
        status: Option<u16>,
        /// A description of the failure.
        reason: String,
    },

    /// The operation requires something this build or reader does not support.
    ///
    /// A disabled codec feature, an unknown zip compression method, or a
    /// non-HTTP URL scheme all land here.
    #[error("unsupported: {feature}")]
    Unsupported {
        /// What is unsupported.
        feature: String,
    },
}

impl Error {
    /// Returns `true` if this error is a cancellation.
    ///
    /// The scanner propagates cancellations and isolates everything else.
    pub fn is_cancelled(&self) -> bool {
        matches!(self, Error::Cancelled)
    }

    /// Returns `true` if a named member was absent.
    pub fn is_not_found(&self) -> bool {
        matches!(self, Error::NotFound { .. })
    }

    /// Returns `true` if this error came from corrupt content.
    pub fn is_decode_failure(&self) -> bool {
        matches!(self, Error::DecodeFailure { .. })
    }

    /// Returns `true` if this error indicates missing support.
    pub fn is_unsupported(&self) -> bool {
        matches!(self, Error::Unsupported { .. })
    }

    /// Creates a NotFound error.
    pub fn not_found(member: impl Into<String>) -> Self {
        Error::NotFound {
            member: member.into(),
        }
    }

    /// Creates a MalformedAddress error.
    pub fn malformed(address: impl Into<String>, reason: impl Into<String>) -> Self {
        Error::MalformedAddress {
            address: address.into(),
            reason: reason.into(),
        }
    }

    /// Creates a DecodeFailure error.
    pub fn decode(format: &'static str, reason: impl Into<String>) -> Self {
        Error::DecodeFailure {
            format,
            reason: reason.into(),
        }
    }

    /// Creates an Unsupported error.
    pub fn unsupported(feature: impl Into<String>) -> Self {
        Error::Unsupported {
            feature: feature.into(),
        }
    }
}

impl From<io::Error> for Error {
    fn from(err: io::Error) -> Self {
        // Typed errors that crossed a `Read` boundary come back out intact.
        if !err.get_ref().is_some_and(|inner| inner.is::<Error>()) {
            return Error::Io(err);
        }
        let kind = err.kind();
        match err.into_inner().map(|inner| inner.downcast::<Error>()) {
            Some(Ok(typed)) => *typed,
            Some(Err(inner)) => Error::Io(io::Error::new(kind, inner)),
            None => Error::Io(kind.into()),
        }
    }
}

impl From<Error> for io::Error {
    fn from(err: Error) -> Self {
        match err {
            Error::Io(e) => e,
            Error::NotFound { .. } => io::Error::new(io::ErrorKind::NotFound, err),
            Error::Cancelled => io::Error::new(io::ErrorKind::Interrupted, err),
            Error::MalformedAddress { .. } => io::Error::new(io::ErrorKind::InvalidInput, err),
            Error::DecodeFailure { .. } => io::Error::new(io::ErrorKind::InvalidData, err),
            Error::Unsupported { .. } => io::Error::new(io::ErrorKind::Unsupported, err),
            Error::Http { .. } => io::Error::other(err),
        }
    }
}

/// A specialized Result type for burrow operations.
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_io_error_from() {
        let io_err = io::Error::new(io::ErrorKind::PermissionDenied, "denied");
        let err: Error = io_err.into();
        assert!(matches!(err, Error::Io(_)));
        assert!(err.to_string().contains("I/O error"));
    }

    #[test]
    fn test_typed_error_survives_io_round_trip() {
        let io_err: io::Error = Error::decode("zip", "bad local header").into();
        assert_eq!(io_err.kind(), io::ErrorKind::InvalidData);
        let back = Error::from(io_err);
        assert!(back.is_decode_failure());
        assert_eq!(back.to_string(), "zip decode failure: bad local header");
    }

    #[test]
    fn test_not_found_maps_to_io_kind() {
        let io_err: io::Error = Error::not_found("a.csv").into();
        assert_eq!(io_err.kind(), io::ErrorKind::NotFound);
    }

    #[test]
    fn test_io_variant_unwraps_directly() {
        let original = io::Error::new(io::ErrorKind::UnexpectedEof, "short");
        let io_err: io::Error = Error::Io(original).into();
        assert_eq!(io_err.kind(), io::ErrorKind::UnexpectedEof);
    }

    #[test]
    fn test_http_display() {
        let err = Error::Http {
            url: "http://h/x".into(),
            status: Some(404),
            reason: "Not Found".into(),
        };
        assert_eq!(
            err.to_string(),
            "HTTP request to http://h/x failed with status 404: Not Found"
        );

        let err = Error::Http {
            url: "http://h/x".into(),
            status: None,
            reason: "too many redirects".into(),
        };
        assert_eq!(
            err.to_string(),
            "HTTP request to http://h/x failed: too many redirects"
        );
    }

    #[test]
    fn test_predicates() {
        assert!(Error::Cancelled.is_cancelled());
        assert!(!Error::Cancelled.is_not_found());
        assert!(Error::unsupported("bzip2").is_unsupported());
        assert!(Error::malformed("", "empty").to_string().contains("empty"));
    }
}
