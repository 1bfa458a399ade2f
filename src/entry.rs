//! Addressable entries.
//!
//! An [`Entry`] names one piece of content: a [`Base`] resource followed by
//! the member names leading to it through nested containers. Entries are
//! cheap to clone and immutable; descending into a container produces a new
//! entry via [`Entry::child`].
//!
//! Content is produced by the entry's opener. By default that is a full
//! decode-chain resolution from the base (see [`crate::resolver`]). The
//! scanner installs *bound* openers on the entries it delivers so that
//! reading a member of a sequential archive uses the archive reader that is
//! already positioned on it. A bound opener serves one open and is detached
//! as soon as the scanner moves on; later opens fall back to resolution.

use std::fmt;
use std::fs;
use std::io::{self, Read};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::SystemTime;

use url::Url;

use crate::address::Address;
use crate::archive::MemberStream;
use crate::config::Config;
use crate::data_uri::DataUri;
use crate::format::base_name;
use crate::resolver;
use crate::stream::{ByteStream, LazyStream, ReaderStream, Stream};
use crate::{Error, READ_BUFFER_SIZE, Result};

/// The outermost resource of an entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Base {
    /// A file on the local filesystem.
    LocalFile(PathBuf),
    /// A resource fetched through the configured [`UrlOpener`](crate::transport::UrlOpener).
    RemoteUrl(Url),
    /// Content embedded in a `data:` URI.
    DataUri(DataUri),
    /// Raw bytes held in memory.
    InlineBytes(Arc<[u8]>),
}

impl Base {
    /// Returns the file name of a local base.
    pub fn file_name(&self) -> Option<&str> {
        match self {
            Base::LocalFile(path) => path.file_name().and_then(|n| n.to_str()),
            _ => None,
        }
    }
}

impl fmt::Display for Base {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Base::LocalFile(path) => write!(f, "{}", path.display()),
            Base::RemoteUrl(url) => write!(f, "{url}"),
            Base::DataUri(uri) => write!(f, "{uri}"),
            Base::InlineBytes(bytes) => write!(f, "{}", DataUri::new(None, bytes.to_vec())),
        }
    }
}

/// An opener installed by the scanner.
pub(crate) struct Binding {
    state: Mutex<Bound>,
}

enum Bound {
    /// The member a sequential archive cursor is positioned on. Single use.
    Member(MemberStream),
    /// A member already extracted to memory. Reusable until detached.
    Bytes(Arc<[u8]>),
    Detached,
}

impl Binding {
    /// Returns the bound stream, or `None` if the binding no longer applies.
    fn take(&self) -> Result<Option<ByteStream>> {
        let mut state = self
            .state
            .lock()
            .map_err(|_| io::Error::other("entry binding lock poisoned"))?;
        match std::mem::replace(&mut *state, Bound::Detached) {
            Bound::Member(member) => Ok(Some(Box::new(member))),
            Bound::Bytes(bytes) => {
                *state = Bound::Bytes(Arc::clone(&bytes));
                Ok(Some(ReaderStream::boxed(io::Cursor::new(bytes))))
            }
            Bound::Detached => Ok(None),
        }
    }

    /// Detaches the binding; later opens resolve from the base.
    pub(crate) fn release(&self) {
        if let Ok(mut state) = self.state.lock() {
            *state = Bound::Detached;
        }
    }
}

type OpenFn = dyn Fn() -> Result<ByteStream> + Send + Sync;

#[derive(Clone)]
enum Opener {
    Resolve,
    Custom(Arc<OpenFn>),
    Bound(Arc<Binding>),
}

/// One addressable piece of content.
///
/// # Example
///
/// ```rust
/// use burrow::Entry;
///
/// let entry = Entry::resolve("data:application/octet-stream;base64,dGVzdA==").unwrap();
/// assert_eq!(entry.read_all().unwrap(), b"test");
/// ```
#[derive(Clone)]
pub struct Entry {
    base: Arc<Base>,
    segments: Arc<[String]>,
    opener: Opener,
    modified: Option<SystemTime>,
    config: Arc<Config>,
}

impl fmt::Debug for Entry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let opener = match &self.opener {
            Opener::Resolve => "resolve",
            Opener::Custom(_) => "custom",
            Opener::Bound(_) => "bound",
        };
        f.debug_struct("Entry")
            .field("base", &self.base)
            .field("segments", &self.segments)
            .field("opener", &opener)
            .field("modified", &self.modified)
            .finish_non_exhaustive()
    }
}

impl PartialEq for Entry {
    fn eq(&self, other: &Self) -> bool {
        self.base == other.base && self.segments == other.segments
    }
}

impl Eq for Entry {}

impl Entry {
    /// Creates an entry from a base and segment names, with the default
    /// [`Config`].
    pub fn new<I, S>(base: Base, segments: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            base: Arc::new(base),
            segments: segments.into_iter().map(Into::into).collect(),
            opener: Opener::Resolve,
            modified: None,
            config: Arc::new(Config::default()),
        }
    }

    /// Parses an address string into an entry.
    ///
    /// See [`crate::address`] for the grammar.
    pub fn resolve(address: &str) -> Result<Self> {
        let Address { base, segments } = Address::parse(address)?;
        Ok(Self::new(base, segments))
    }

    /// Parses an address string into an entry that uses `config`.
    pub fn resolve_with(address: &str, config: Config) -> Result<Self> {
        Ok(Self::resolve(address)?.with_config(config))
    }

    /// An unsegmented entry for a local file.
    pub fn from_path(path: impl Into<PathBuf>) -> Self {
        Self::new(Base::LocalFile(path.into()), Vec::<String>::new())
    }

    /// An unsegmented entry for a URL.
    pub fn from_url(url: Url) -> Self {
        Self::new(Base::RemoteUrl(url), Vec::<String>::new())
    }

    /// An unsegmented entry over bytes held in memory.
    pub fn from_bytes(bytes: impl Into<Vec<u8>>) -> Self {
        let bytes: Arc<[u8]> = bytes.into().into();
        Self::new(Base::InlineBytes(bytes), Vec::<String>::new())
    }

    /// Replaces the configuration. Entries derived from this one inherit it.
    pub fn with_config(mut self, config: Config) -> Self {
        self.config = Arc::new(config);
        self
    }

    pub(crate) fn with_shared_config(mut self, config: Arc<Config>) -> Self {
        self.config = config;
        self
    }

    /// Returns the configuration.
    pub fn config(&self) -> &Config {
        &self.config
    }

    pub(crate) fn shared_config(&self) -> &Arc<Config> {
        &self.config
    }

    /// Returns the base resource.
    pub fn base(&self) -> &Base {
        &self.base
    }

    /// Returns the segment names, outermost first.
    pub fn segments(&self) -> &[String] {
        &self.segments
    }

    /// Returns a new entry one level deeper, inside member `name`.
    ///
    /// The child shares this entry's base and configuration. Its opener is
    /// the default resolution and it has no modification time override.
    pub fn child(&self, name: impl Into<String>) -> Self {
        let mut segments = self.segments.to_vec();
        segments.push(name.into());
        Self {
            base: Arc::clone(&self.base),
            segments: segments.into(),
            opener: Opener::Resolve,
            modified: None,
            config: Arc::clone(&self.config),
        }
    }

    /// Overrides the modification time.
    pub fn with_modified(mut self, modified: SystemTime) -> Self {
        self.modified = Some(modified);
        self
    }

    /// Returns the modification time.
    ///
    /// An explicit override wins; otherwise native entries report the file's
    /// metadata and all other entries report `None`.
    pub fn modified(&self) -> Option<SystemTime> {
        if self.modified.is_some() {
            return self.modified;
        }
        let path = self.local_path()?;
        fs::metadata(path).and_then(|m| m.modified()).ok()
    }

    /// Replaces the opener with `open`.
    pub fn with_opener<F>(mut self, open: F) -> Self
    where
        F: Fn() -> Result<ByteStream> + Send + Sync + 'static,
    {
        self.opener = Opener::Custom(Arc::new(open));
        self
    }

    pub(crate) fn bind_member(&mut self, member: MemberStream) -> Arc<Binding> {
        self.bind(Bound::Member(member))
    }

    pub(crate) fn bind_bytes(&mut self, bytes: Arc<[u8]>) -> Arc<Binding> {
        self.bind(Bound::Bytes(bytes))
    }

    fn bind(&mut self, bound: Bound) -> Arc<Binding> {
        let binding = Arc::new(Binding {
            state: Mutex::new(bound),
        });
        self.opener = Opener::Bound(Arc::clone(&binding));
        binding
    }

    /// Opens the entry's content.
    ///
    /// The caller owns the returned stream and should [`close`](Stream::close)
    /// it; dropping it releases its handles as well.
    pub fn open(&self) -> Result<ByteStream> {
        match &self.opener {
            Opener::Resolve => resolver::resolve(self),
            Opener::Custom(open) => open(),
            Opener::Bound(binding) => match binding.take()? {
                Some(stream) => Ok(stream),
                None => resolver::resolve(self),
            },
        }
    }

    /// Returns a stream that opens the entry on first read.
    pub fn open_lazy(&self) -> ByteStream {
        let entry = self.clone();
        Box::new(LazyStream::new(move || entry.open()))
    }

    /// Reads the entire content. The stream is closed on every path.
    pub fn read_all(&self) -> Result<Vec<u8>> {
        let mut out = Vec::new();
        self.for_each_chunk(|chunk| {
            out.extend_from_slice(chunk);
            Ok(())
        })?;
        Ok(out)
    }

    /// Reads the entire content as UTF-8.
    ///
    /// # Errors
    ///
    /// Invalid UTF-8 is an [`Error::DecodeFailure`].
    pub fn read_to_string(&self) -> Result<String> {
        String::from_utf8(self.read_all()?).map_err(|e| Error::decode("utf-8", e.to_string()))
    }

    /// Feeds the content to `f` in chunks of up to
    /// [`READ_BUFFER_SIZE`] bytes. The stream is closed on every path.
    pub fn for_each_chunk<F>(&self, mut f: F) -> Result<()>
    where
        F: FnMut(&[u8]) -> Result<()>,
    {
        let mut stream = self.open()?;
        let drained = drain(&mut stream, &mut f);
        let closed = stream.close();
        drained?;
        closed?;
        Ok(())
    }

    /// Returns the base string when there are no segments, else the last
    /// segment unchanged.
    pub fn last_path(&self) -> String {
        match self.segments.last() {
            Some(last) => last.clone(),
            None => self.base.to_string(),
        }
    }

    /// Returns the last path component: the base's file name when there are
    /// no segments, else the last segment without its directories.
    pub fn last_name(&self) -> String {
        match self.segments.last() {
            Some(last) => base_name(last).to_owned(),
            None => self
                .base
                .file_name()
                .map_or_else(|| self.base.to_string(), str::to_owned),
        }
    }

    /// Returns `true` for unsegmented local files, which allow random access.
    pub fn is_native(&self) -> bool {
        self.local_path().is_some()
    }

    /// Returns the file path of a native entry.
    pub fn local_path(&self) -> Option<&Path> {
        match (&*self.base, self.segments.is_empty()) {
            (Base::LocalFile(path), true) => Some(path),
            _ => None,
        }
    }

    /// Returns an address string that [`Entry::resolve`] maps back to this
    /// entry.
    pub fn address(&self) -> String {
        let mut out = self.base.to_string();
        for segment in self.segments.iter() {
            out.push('!');
            out.push_str(segment);
        }
        out
    }
}

impl fmt::Display for Entry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.base)?;
        for segment in self.segments.iter() {
            write!(f, "/{segment}")?;
        }
        Ok(())
    }
}

fn drain(stream: &mut ByteStream, f: &mut impl FnMut(&[u8]) -> Result<()>) -> Result<()> {
    let mut buf = vec![0u8; READ_BUFFER_SIZE];
    loop {
        let n = match stream.read(&mut buf) {
            Ok(0) => return Ok(()),
            Ok(n) => n,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(e.into()),
        };
        f(&buf[..n])?;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[test]
    fn test_last_path_and_name() {
        let entry = Entry::new(
            Base::LocalFile(PathBuf::from("/data/outer.zip")),
            ["dir\\inner.zip", "a/b/c.txt"],
        );
        assert_eq!(entry.last_path(), "a/b/c.txt");
        assert_eq!(entry.last_name(), "c.txt");

        let parent = Entry::new(Base::LocalFile(PathBuf::from("/data/outer.zip")), ["dir\\inner.zip"]);
        assert_eq!(parent.last_name(), "inner.zip");

        let root = Entry::from_path("/data/outer.zip");
        assert_eq!(root.last_path(), "/data/outer.zip");
        assert_eq!(root.last_name(), "outer.zip");
    }

    #[test]
    fn test_url_last_name_is_base_string() {
        let url = Url::parse("http://example.org/a.gz").unwrap();
        let entry = Entry::from_url(url);
        assert_eq!(entry.last_name(), "http://example.org/a.gz");
        assert!(!entry.is_native());
    }

    #[test]
    fn test_child_appends_without_mutating_parent() {
        let parent = Entry::from_path("/x.zip").with_modified(SystemTime::UNIX_EPOCH);
        let child = parent.child("a.txt");
        assert!(parent.segments().is_empty());
        assert_eq!(child.segments(), ["a.txt"]);
        assert_eq!(child.modified(), None);
        assert!(!child.is_native());
        assert_eq!(child.to_string(), "/x.zip/a.txt");
        assert_eq!(child.address(), "/x.zip!a.txt");
    }

    #[test]
    fn test_modified_native_and_override() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(b"x").unwrap();
        let entry = Entry::from_path(file.path());
        let os_time = fs::metadata(file.path()).unwrap().modified().unwrap();
        assert_eq!(entry.modified(), Some(os_time));

        let pinned = entry.with_modified(SystemTime::UNIX_EPOCH);
        assert_eq!(pinned.modified(), Some(SystemTime::UNIX_EPOCH));
    }

    #[test]
    fn test_read_all_from_bytes() {
        let entry = Entry::from_bytes(b"inline".to_vec());
        assert_eq!(entry.read_all().unwrap(), b"inline");
        assert_eq!(entry.read_to_string().unwrap(), "inline");
    }

    #[test]
    fn test_read_to_string_rejects_invalid_utf8() {
        let entry = Entry::from_bytes(vec![0xff, 0xfe]);
        assert!(entry.read_to_string().unwrap_err().is_decode_failure());
    }

    #[test]
    fn test_for_each_chunk_closes_on_callback_error() {
        struct Flagged(Arc<AtomicUsize>);
        impl Read for Flagged {
            fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
                buf[0] = 1;
                Ok(1)
            }
        }
        impl Stream for Flagged {
            fn close(&mut self) -> io::Result<()> {
                self.0.fetch_add(1, Ordering::SeqCst);
                Ok(())
            }
        }

        let closes = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&closes);
        let entry = Entry::from_bytes(Vec::new())
            .with_opener(move || Ok(Box::new(Flagged(Arc::clone(&counter)))));
        let err = entry
            .for_each_chunk(|_| Err(Error::Cancelled))
            .unwrap_err();
        assert!(err.is_cancelled());
        assert_eq!(closes.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_bound_bytes_reusable_until_detached() {
        let mut entry = Entry::from_bytes(b"from base".to_vec());
        let binding = entry.bind_bytes(Arc::from(&b"bound"[..]));
        assert_eq!(entry.read_all().unwrap(), b"bound");
        assert_eq!(entry.read_all().unwrap(), b"bound");
        binding.release();
        assert_eq!(entry.read_all().unwrap(), b"from base");
    }

    #[test]
    fn test_open_lazy_defers_opener() {
        let opens = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&opens);
        let entry = Entry::from_bytes(Vec::new()).with_opener(move || {
            counter.fetch_add(1, Ordering::SeqCst);
            Ok(ReaderStream::boxed(&b"lazy"[..]))
        });
        let mut stream = entry.open_lazy();
        assert_eq!(opens.load(Ordering::SeqCst), 0);
        let mut out = String::new();
        stream.read_to_string(&mut out).unwrap();
        assert_eq!(out, "lazy");
        assert_eq!(opens.load(Ordering::SeqCst), 1);
        stream.close().unwrap();
    }

    #[test]
    fn test_inline_bytes_display_round_trips() {
        let entry = Entry::from_bytes(b"abc".to_vec());
        let reparsed = Entry::resolve(&entry.address()).unwrap();
        assert_eq!(reparsed.read_all().unwrap(), b"abc");
    }
}
