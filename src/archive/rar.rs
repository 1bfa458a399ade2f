//! RAR reading through the `unrar` library.
//!
//! `unrar` only works on files, so rar data that is not on the local
//! filesystem has to be spooled to a temporary file first (see
//! [`Config`](crate::Config) `temp_dir`). Each call opens the archive anew.

use std::path::{Path, PathBuf};

use super::{MemberHeader, MemberKind};
use crate::timestamp;
use crate::{Error, Result};

fn rar_error(err: unrar::error::UnrarError) -> Error {
    Error::decode("rar", err.to_string())
}

fn member_name(path: &Path) -> String {
    path.to_string_lossy().replace('\\', "/")
}

fn header_of(entry: &unrar::FileHeader) -> MemberHeader {
    MemberHeader {
        name: member_name(&entry.filename),
        kind: if entry.is_directory() {
            MemberKind::Directory
        } else {
            MemberKind::File
        },
        size: Some(entry.unpacked_size),
        modified: timestamp::from_dos_u32(entry.file_time),
    }
}

/// A rar file on the local filesystem.
#[derive(Debug, Clone)]
pub struct RarArchive {
    path: PathBuf,
}

impl RarArchive {
    /// Refers to the rar file at `path`. Nothing is read yet.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Returns the archive path.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Lists the archive's members in stored order.
    pub fn members(&self) -> Result<Vec<MemberHeader>> {
        let listing = unrar::Archive::new(&self.path)
            .open_for_listing()
            .map_err(rar_error)?;
        listing
            .map(|entry| entry.map(|e| header_of(&e)).map_err(rar_error))
            .collect()
    }

    /// Extracts the file member named `name` into memory.
    ///
    /// # Errors
    ///
    /// Returns [`Error::NotFound`] if no file member has that name.
    pub fn read(&self, name: &str) -> Result<Vec<u8>> {
        let mut found = None;
        self.visit(|header, content| {
            if found.is_none() && !header.is_dir() && header.name == name {
                found = Some(content()?);
            }
            Ok(found.is_none())
        })?;
        found.ok_or_else(|| Error::not_found(name))
    }

    /// Extracts every file member in order, one at a time.
    ///
    /// `f` receives each header and its content and returns `false` to stop.
    pub fn for_each(&self, mut f: impl FnMut(MemberHeader, Vec<u8>) -> Result<bool>) -> Result<()> {
        self.visit(|header, content| {
            if header.is_dir() {
                return Ok(true);
            }
            let data = content()?;
            f(header, data)
        })
    }

    /// Walks the archive, letting `f` decide per member whether to extract.
    ///
    /// `f` gets a closure that extracts the current member; members for
    /// which it is not called are skipped without decompression.
    fn visit(
        &self,
        mut f: impl FnMut(MemberHeader, &mut dyn FnMut() -> Result<Vec<u8>>) -> Result<bool>,
    ) -> Result<()> {
        let mut archive = unrar::Archive::new(&self.path)
            .open_for_processing()
            .map_err(rar_error)?;
        while let Some(cursor) = archive.read_header().map_err(rar_error)? {
            let header = header_of(cursor.entry());
            let mut cursor = Some(cursor);
            let mut rest = None;
            let mut extract = || -> Result<Vec<u8>> {
                let current = cursor
                    .take()
                    .ok_or_else(|| Error::decode("rar", "member extracted twice"))?;
                let (data, next) = current.read().map_err(rar_error)?;
                rest = Some(next);
                Ok(data)
            };
            let keep_going = f(header, &mut extract)?;
            let next = match (rest, cursor) {
                (Some(next), _) => next,
                (None, Some(current)) => current.skip().map_err(rar_error)?,
                (None, None) => return Err(Error::decode("rar", "lost archive cursor")),
            };
            if !keep_going {
                return Ok(());
            }
            archive = next;
        }
        Ok(())
    }
}
