//! Format classification by filename.
//!
//! Decisions about which decode step applies next are made from names
//! alone, never from content signatures. Matching is case-insensitive and
//! compound suffixes (`.tar.gz`) win over their trailing part (`.gz`).

use crate::codec::Compression;

/// A recognised container or compression format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Format {
    /// A single-stream compressed file.
    Compressed(Compression),
    /// ZIP archive.
    Zip,
    /// TAR archive.
    Tar,
    /// gzip-compressed TAR archive (`.tgz`, `.tar.gz`).
    TarGz,
    /// RAR archive.
    Rar,
}

impl Format {
    /// Classifies a file name by suffix.
    ///
    /// # Example
    ///
    /// ```rust
    /// use burrow::codec::Compression;
    /// use burrow::format::Format;
    ///
    /// assert_eq!(Format::from_name("a/B.ZIP"), Some(Format::Zip));
    /// assert_eq!(Format::from_name("x.tar.gz"), Some(Format::TarGz));
    /// assert_eq!(Format::from_name("x.csv.gz"), Some(Format::Compressed(Compression::Gzip)));
    /// assert_eq!(Format::from_name("notes.txt"), None);
    /// ```
    pub fn from_name(name: &str) -> Option<Format> {
        Self::container_from_name(name).or_else(|| {
            let lower = name.to_ascii_lowercase();
            Compression::ALL
                .into_iter()
                .find(|c| lower.ends_with(c.suffix()))
                .map(Format::Compressed)
        })
    }

    /// Classifies a file name, recognising archive containers only.
    pub fn container_from_name(name: &str) -> Option<Format> {
        let lower = name.to_ascii_lowercase();
        if lower.ends_with(".zip") {
            Some(Format::Zip)
        } else if lower.ends_with(".tar") {
            Some(Format::Tar)
        } else if lower.ends_with(".tgz") || lower.ends_with(".tar.gz") {
            Some(Format::TarGz)
        } else if lower.ends_with(".rar") {
            Some(Format::Rar)
        } else {
            None
        }
    }

    /// Returns the typical file extension for this format.
    pub fn extension(&self) -> &'static str {
        match self {
            Format::Compressed(c) => c.suffix().trim_start_matches('.'),
            Format::Zip => "zip",
            Format::Tar => "tar",
            Format::TarGz => "tgz",
            Format::Rar => "rar",
        }
    }

    /// Returns a human-readable name for this format.
    pub fn name(&self) -> &'static str {
        match self {
            Format::Compressed(c) => c.name(),
            Format::Zip => "zip",
            Format::Tar => "tar",
            Format::TarGz => "tar.gz",
            Format::Rar => "rar",
        }
    }

    /// Returns `true` for multi-member archives.
    pub fn is_container(&self) -> bool {
        !matches!(self, Format::Compressed(_))
    }
}

impl std::fmt::Display for Format {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.name())
    }
}

/// Strips leading directory components, accepting both `/` and `\`.
pub fn base_name(path: &str) -> &str {
    match path.rfind(['/', '\\']) {
        Some(pos) => &path[pos + 1..],
        None => path,
    }
}
