//! Configuration threaded through entries and scans.
//!
//! A [`Config`] is attached to every [`Entry`](crate::Entry) and inherited by
//! the entries derived from it, so a scan or resolution never consults
//! process-wide state.

use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use crate::transport::{DefaultUrlOpener, UrlOpener};

/// The user agent sent by the default HTTP opener.
pub const DEFAULT_USER_AGENT: &str = concat!("burrow/", env!("CARGO_PKG_VERSION"));

/// Default connect and read timeout for remote fetches.
pub const DEFAULT_HTTP_TIMEOUT: Duration = Duration::from_secs(600);

/// Default number of HTTP redirects followed before giving up.
pub const DEFAULT_MAX_REDIRECTS: u32 = 10;

/// Resolution and transport settings.
///
/// # Example
///
/// ```rust
/// use burrow::Config;
/// use std::time::Duration;
///
/// let config = Config::new()
///     .user_agent("crawler/2.0")
///     .http_timeout(Duration::from_secs(30))
///     .max_redirects(3);
/// assert_eq!(config.max_redirects, 3);
/// ```
#[derive(Clone)]
pub struct Config {
    /// User agent for HTTP requests; `None` sends the transport's default.
    ///
    /// Default: [`DEFAULT_USER_AGENT`].
    pub user_agent: Option<String>,

    /// Connect and read timeout for HTTP requests.
    ///
    /// Default: 600 seconds. Zero leaves the timeouts unset.
    pub http_timeout: Duration,

    /// Redirects (301, 302, 303) followed before a fetch fails.
    ///
    /// Default: 10.
    pub max_redirects: u32,

    /// Opens remote base resources.
    pub url_opener: Arc<dyn UrlOpener>,

    /// Directory for spooled archives; `None` uses the system temp dir.
    pub temp_dir: Option<PathBuf>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            user_agent: Some(DEFAULT_USER_AGENT.to_owned()),
            http_timeout: DEFAULT_HTTP_TIMEOUT,
            max_redirects: DEFAULT_MAX_REDIRECTS,
            url_opener: Arc::new(DefaultUrlOpener),
            temp_dir: None,
        }
    }
}

impl fmt::Debug for Config {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Config")
            .field("user_agent", &self.user_agent)
            .field("http_timeout", &self.http_timeout)
            .field("max_redirects", &self.max_redirects)
            .field("temp_dir", &self.temp_dir)
            .finish_non_exhaustive()
    }
}

impl Config {
    /// Creates a configuration with default values.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the HTTP user agent.
    pub fn user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.user_agent = Some(user_agent.into());
        self
    }

    /// Sends no explicit user agent.
    pub fn no_user_agent(mut self) -> Self {
        self.user_agent = None;
        self
    }

    /// Sets the HTTP connect and read timeout.
    pub fn http_timeout(mut self, timeout: Duration) -> Self {
        self.http_timeout = timeout;
        self
    }

    /// Sets the redirect budget.
    pub fn max_redirects(mut self, max: u32) -> Self {
        self.max_redirects = max;
        self
    }

    /// Replaces the URL opener.
    pub fn url_opener(mut self, opener: impl UrlOpener + 'static) -> Self {
        self.url_opener = Arc::new(opener);
        self
    }

    /// Sets the directory used for spooled archives.
    pub fn temp_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.temp_dir = Some(dir.into());
        self
    }

    /// Creates a named temporary file in the configured directory.
    #[cfg_attr(not(feature = "rar"), allow(dead_code))]
    pub(crate) fn spool_file(&self) -> std::io::Result<tempfile::NamedTempFile> {
        let mut builder = tempfile::Builder::new();
        builder.prefix("burrow-spool-");
        match &self.temp_dir {
            Some(dir) => builder.tempfile_in(dir),
            None => builder.tempfile(),
        }
    }
}
