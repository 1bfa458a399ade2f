//! Inline `data:` URIs.
//!
//! The accepted form is `data:[media-type][;base64],payload`. A URI without
//! a comma carries no media type and its whole remainder is the payload.
//! Payloads without `;base64` are form-decoded: `+` is a space and `%XX`
//! escapes produce raw bytes.

use std::fmt;

use base64::Engine as _;
use base64::engine::general_purpose::STANDARD;
use percent_encoding::{AsciiSet, NON_ALPHANUMERIC, percent_decode_str, percent_encode};

use crate::{Error, Result};

/// Bytes left unescaped when encoding a non-base64 payload.
const PAYLOAD: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'_')
    .remove(b'.')
    .remove(b'*');

/// Prefix shared by every data URI.
pub const SCHEME_PREFIX: &str = "data:";

/// A decoded data URI.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DataUri {
    media_type: Option<String>,
    base64: bool,
    data: Vec<u8>,
}

impl DataUri {
    /// Creates a base64 data URI carrying `data`.
    pub fn new(media_type: Option<&str>, data: impl Into<Vec<u8>>) -> Self {
        Self {
            media_type: media_type.map(str::to_owned),
            base64: true,
            data: data.into(),
        }
    }

    /// Returns `true` if `text` starts with `data:`.
    pub fn is_data_uri(text: &str) -> bool {
        text.starts_with(SCHEME_PREFIX)
    }

    /// Parses a data URI.
    ///
    /// # Example
    ///
    /// ```rust
    /// use burrow::DataUri;
    ///
    /// let uri = DataUri::parse("data:application/octet-stream;base64,dGVzdA==").unwrap();
    /// assert_eq!(uri.media_type(), Some("application/octet-stream"));
    /// assert_eq!(uri.data(), b"test");
    /// ```
    pub fn parse(text: &str) -> Result<Self> {
        let rest = text
            .strip_prefix(SCHEME_PREFIX)
            .ok_or_else(|| Error::malformed(text, "missing `data:` prefix"))?;

        let mut media_type = None;
        let mut base64 = false;
        let mut payload = rest;

        if let Some(comma) = rest.find(',') {
            match rest.find(';') {
                Some(semicolon) if semicolon < comma => {
                    base64 = &rest[semicolon + 1..comma] == "base64";
                    if semicolon > 0 {
                        media_type = Some(rest[..semicolon].to_owned());
                    }
                }
                _ if comma > 0 => media_type = Some(rest[..comma].to_owned()),
                _ => {}
            }
            payload = &rest[comma + 1..];
        }

        let data = if base64 {
            STANDARD
                .decode(payload)
                .map_err(|e| Error::malformed(text, format!("invalid base64 payload: {e}")))?
        } else {
            let spaced = payload.replace('+', " ");
            percent_decode_str(&spaced).collect()
        };

        Ok(Self {
            media_type,
            base64,
            data,
        })
    }

    /// Returns the declared media type, if any.
    pub fn media_type(&self) -> Option<&str> {
        self.media_type.as_deref()
    }

    /// Returns `true` if the payload is (or will be) base64 encoded.
    pub fn is_base64(&self) -> bool {
        self.base64
    }

    /// Returns the decoded payload.
    pub fn data(&self) -> &[u8] {
        &self.data
    }

    /// Returns the filename used to pick the first decode step.
    ///
    /// Only the media types with a container or compression meaning map to
    /// a suffix; everything else is plain `file`.
    pub fn sniff_name(&self) -> &'static str {
        match self.media_type() {
            Some("application/gzip") => "file.gz",
            Some("application/bzip2") => "file.bz2",
            Some("application/zip") => "file.zip",
            _ => "file",
        }
    }
}

impl fmt::Display for DataUri {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(SCHEME_PREFIX)?;
        if let Some(media_type) = &self.media_type {
            f.write_str(media_type)?;
        }
        if self.base64 {
            f.write_str(";base64")?;
        }
        if self.media_type.is_some() || self.base64 {
            f.write_str(",")?;
        }
        if self.base64 {
            f.write_str(&STANDARD.encode(&self.data))
        } else {
            write!(f, "{}", percent_encode(&self.data, PAYLOAD))
        }
    }
}

impl std::str::FromStr for DataUri {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}
