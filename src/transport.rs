//! Opening remote base resources.
//!
//! Remote bases are opened through the [`UrlOpener`] held by the entry's
//! [`Config`]. The [`DefaultUrlOpener`] fetches `http` and `https` URLs,
//! following redirects itself, and opens `file` URLs from disk.

use std::fs::File;
use std::time::Duration;

use url::Url;

use crate::config::Config;
use crate::stream::{ByteStream, ReaderStream};
use crate::{Error, Result};

/// Opens a byte stream for a URL.
///
/// Implementations must be shareable across scan workers.
///
/// # Example
///
/// ```rust
/// use burrow::stream::{ByteStream, ReaderStream};
/// use burrow::transport::UrlOpener;
/// use burrow::{Config, Result};
/// use url::Url;
///
/// struct Canned;
///
/// impl UrlOpener for Canned {
///     fn open(&self, _url: &Url, _config: &Config) -> Result<ByteStream> {
///         Ok(ReaderStream::boxed(&b"canned body"[..]))
///     }
/// }
///
/// let config = Config::new().url_opener(Canned);
/// ```
pub trait UrlOpener: Send + Sync {
    /// Opens `url`, returning its body.
    fn open(&self, url: &Url, config: &Config) -> Result<ByteStream>;
}

impl<F> UrlOpener for F
where
    F: Fn(&Url, &Config) -> Result<ByteStream> + Send + Sync,
{
    fn open(&self, url: &Url, config: &Config) -> Result<ByteStream> {
        self(url, config)
    }
}

/// The built-in opener.
///
/// - `http`/`https`: GET with the configured user agent and timeouts.
///   Responses 301, 302 and 303 are followed by resolving `Location`
///   against the current URL, at most [`Config::max_redirects`] times.
///   Any other non-200 status fails with [`Error::Http`].
/// - `file`: opens the local path.
/// - anything else: [`Error::Unsupported`].
#[derive(Debug, Clone, Copy, Default)]
pub struct DefaultUrlOpener;

impl UrlOpener for DefaultUrlOpener {
    fn open(&self, url: &Url, config: &Config) -> Result<ByteStream> {
        match url.scheme() {
            "http" | "https" => fetch(url, config),
            "file" => {
                let path = url
                    .to_file_path()
                    .map_err(|()| Error::malformed(url.as_str(), "not a local file URL"))?;
                Ok(ReaderStream::boxed(File::open(path)?))
            }
            other => Err(Error::unsupported(format!("URL scheme `{other}`"))),
        }
    }
}

/// How a response status is handled by the redirect loop.
#[cfg_attr(not(feature = "http"), allow(dead_code))]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Disposition {
    Body,
    Redirect,
    Fail,
}

#[cfg_attr(not(feature = "http"), allow(dead_code))]
fn disposition(status: u16) -> Disposition {
    match status {
        200 => Disposition::Body,
        301..=303 => Disposition::Redirect,
        _ => Disposition::Fail,
    }
}

/// Connect and read timeout; zero leaves the transport's own default.
#[cfg_attr(not(feature = "http"), allow(dead_code))]
fn timeout(config: &Config) -> Option<Duration> {
    Some(config.http_timeout).filter(|t| !t.is_zero())
}

#[cfg(feature = "http")]
fn fetch(url: &Url, config: &Config) -> Result<ByteStream> {
    let mut builder = ureq::AgentBuilder::new().redirects(0);
    if let Some(timeout) = timeout(config) {
        builder = builder.timeout_connect(timeout).timeout_read(timeout);
    }
    if let Some(user_agent) = &config.user_agent {
        builder = builder.user_agent(user_agent);
    }
    let agent = builder.build();

    let mut current = url.clone();
    for _ in 0..=config.max_redirects {
        log::debug!("GET {current}");
        let response = match agent.get(current.as_str()).call() {
            Ok(response) => response,
            Err(ureq::Error::Status(_, response)) => response,
            Err(ureq::Error::Transport(transport)) => {
                return Err(Error::Http {
                    url: current.to_string(),
                    status: None,
                    reason: transport.to_string(),
                });
            }
        };

        let status = response.status();
        match disposition(status) {
            Disposition::Body => return Ok(ReaderStream::boxed(response.into_reader())),
            Disposition::Redirect => {
                let location = response.header("Location").ok_or_else(|| Error::Http {
                    url: current.to_string(),
                    status: Some(status),
                    reason: "redirect without Location header".into(),
                })?;
                current = current.join(location).map_err(|e| Error::Http {
                    url: current.to_string(),
                    status: Some(status),
                    reason: format!("invalid redirect target {location:?}: {e}"),
                })?;
            }
            Disposition::Fail => {
                return Err(Error::Http {
                    url: current.to_string(),
                    status: Some(status),
                    reason: response.status_text().to_owned(),
                });
            }
        }
    }

    Err(Error::Http {
        url: url.to_string(),
        status: None,
        reason: format!("more than {} redirects", config.max_redirects),
    })
}

#[cfg(not(feature = "http"))]
fn fetch(url: &Url, _config: &Config) -> Result<ByteStream> {
    Err(Error::unsupported(format!(
        "fetching {url} (enable the `http` feature)"
    )))
}
