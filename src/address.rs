//! Address strings.
//!
//! An address names a base resource followed by the members to descend
//! into, separated by `!`. Leading `scheme:` tokens describe the layers and
//! are discarded, except that the last one is glued back onto the base so
//! that remote URLs survive:
//!
//! ```text
//! gz:http://example.org/a.csv.gz!a.csv   ->  ["http://example.org/a.csv.gz", "a.csv"]
//! zip:file:///data/x.zip!dir/y.txt       ->  ["/data/x.zip", "dir/y.txt"]
//! /data/x.zip!y.txt                      ->  ["/data/x.zip", "y.txt"]
//! ```

use std::path::PathBuf;

use url::Url;

use crate::data_uri::DataUri;
use crate::entry::Base;
use crate::{Error, Result};

/// Splits an address into its base string followed by its segments.
///
/// A scheme is a non-empty run of `[a-z0-9]` followed by `:`. Schemes are
/// stripped repeatedly from the front; the rest is split on `!`, dropping
/// empty pieces. If the last stripped scheme is `file` and the remainder
/// starts with `//`, the slashes are removed; otherwise the scheme is put
/// back in front of the first piece.
///
/// # Errors
///
/// Returns [`Error::MalformedAddress`] if nothing but schemes and separators
/// remain.
///
/// # Example
///
/// ```rust
/// use burrow::address::parse_path;
///
/// assert_eq!(parse_path("data:test").unwrap(), ["data:test"]);
/// assert_eq!(
///     parse_path("gz:http://example.org/test.csv.gz!test.csv").unwrap(),
///     ["http://example.org/test.csv.gz", "test.csv"]
/// );
/// ```
pub fn parse_path(address: &str) -> Result<Vec<String>> {
    let mut rest = address;
    let mut last_scheme = None;
    while let Some((scheme, tail)) = split_scheme(rest) {
        last_scheme = Some(scheme);
        rest = tail;
    }

    let mut pieces: Vec<String> = rest
        .split('!')
        .filter(|piece| !piece.is_empty())
        .map(str::to_owned)
        .collect();
    let Some(first) = pieces.first_mut() else {
        return Err(Error::malformed(address, "no resource after schemes"));
    };

    if let Some(scheme) = last_scheme {
        let glued = match first.strip_prefix("//") {
            Some(local) if scheme == "file" => local.to_owned(),
            _ => format!("{scheme}:{first}"),
        };
        *first = glued;
    }
    Ok(pieces)
}

fn split_scheme(text: &str) -> Option<(&str, &str)> {
    let len = text
        .bytes()
        .take_while(|b| b.is_ascii_lowercase() || b.is_ascii_digit())
        .count();
    if len > 0 && text.as_bytes().get(len) == Some(&b':') {
        Some((&text[..len], &text[len + 1..]))
    } else {
        None
    }
}

/// Classifies a base string produced by [`parse_path`].
///
/// `data:` strings are data URIs, anything else containing `:` is a URL, and
/// the remainder are local paths.
pub fn parse_base(base: &str) -> Result<Base> {
    if DataUri::is_data_uri(base) {
        DataUri::parse(base).map(Base::DataUri)
    } else if base.contains(':') {
        Url::parse(base)
            .map(Base::RemoteUrl)
            .map_err(|e| Error::malformed(base, e.to_string()))
    } else {
        Ok(Base::LocalFile(PathBuf::from(base)))
    }
}

/// A parsed address: base resource plus segment chain.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Address {
    /// The outermost resource.
    pub base: Base,
    /// Member names to descend through, outermost first.
    pub segments: Vec<String>,
}

impl Address {
    /// Parses an address string.
    pub fn parse(address: &str) -> Result<Self> {
        let mut pieces = parse_path(address)?.into_iter();
        let base = match pieces.next() {
            Some(first) => parse_base(&first)?,
            None => return Err(Error::malformed(address, "empty address")),
        };
        Ok(Self {
            base,
            segments: pieces.collect(),
        })
    }
}

impl std::str::FromStr for Address {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}
