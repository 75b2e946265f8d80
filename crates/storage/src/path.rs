//! Path validation.
//!
//! Every path handed to a backend is relative to the storage root. Anything
//! that would resolve outside of it is rejected before touching the disk.

use crate::error::{ErrorKind, Result};
use std::ffi::OsStr;
use std::path::{Component, Path, PathBuf};

/// Normalise a storage path, refusing anything that escapes the root.
///
/// Leading slashes and `.` components are dropped, `..` is resolved against
/// the components seen so far, and null bytes are rejected outright. An empty
/// result is also invalid.
///
/// # Examples
///
/// ```
/// use std::path::Path;
/// use mediabox_storage::validate_path;
///
/// assert_eq!(
///     validate_path("/uploads/./alice//holiday.jpg").unwrap(),
///     Path::new("uploads/alice/holiday.jpg"),
/// );
/// assert_eq!(validate_path("uploads/tmp/../a.jpg").unwrap(), Path::new("uploads/a.jpg"));
/// assert!(validate_path("uploads/../../etc/passwd").is_err());
/// assert!(validate_path("a\0b").is_err());
/// ```
pub fn validate(path: impl AsRef<Path>) -> Result<PathBuf> {
    let path = path.as_ref();
    let invalid = || exn::Exn::from(ErrorKind::InvalidPath(path.to_path_buf()));
    let mut kept: Vec<&OsStr> = Vec::new();
    for component in path.components() {
        match component {
            // Null bytes survive Path::components() on Unix but truncate in syscalls.
            Component::Normal(part) if part.as_encoded_bytes().contains(&0) => return Err(invalid()),
            Component::Normal(part) => kept.push(part),
            Component::CurDir | Component::RootDir => {},
            Component::ParentDir => {
                kept.pop().ok_or_else(invalid)?;
            },
            Component::Prefix(_) => return Err(invalid()),
        }
    }
    if kept.is_empty() {
        return Err(invalid());
    }
    Ok(kept.into_iter().collect())
}
