use std::path::{Component, Path};

use crate::StorageError;

/// Validates that `filename` names a single entry directly under the
/// storage root.
///
/// Rejects:
/// - Empty names and names containing NUL
/// - Any path separator of the host platform (`/`, plus `\` on Windows),
///   so nothing nests or escapes the root
/// - `.` and `..`
pub fn validate_filename(filename: &str) -> Result<(), StorageError> {
    if filename.is_empty() {
        return Err(StorageError::InvalidName("empty filename".into()));
    }

    if filename.contains('\0') {
        return Err(StorageError::InvalidName(format!(
            "NUL byte not allowed: {filename:?}"
        )));
    }

    if filename.chars().any(std::path::is_separator) {
        return Err(StorageError::InvalidName(format!(
            "path separators not allowed: {filename}"
        )));
    }

    let mut components = Path::new(filename).components();
    match (components.next(), components.next()) {
        (Some(Component::Normal(_)), None) => Ok(()),
        _ => Err(StorageError::InvalidName(format!(
            "not a plain filename: {filename}"
        ))),
    }
}
