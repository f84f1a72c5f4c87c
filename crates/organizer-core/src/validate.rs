//! Input validation rules for uploads and text fields.
//!
//! Upload checks run synchronously, before any bytes are transferred, so a
//! rejected file never produces a storage side effect.

use crate::error::ValidationError;

const MIB: u64 = 1024 * 1024;

/// Accepted MIME types and their upload size ceilings.
///
/// The PDF ceiling follows the document-understanding limit of the model
/// backend; the rest are application policy.
pub const MAX_FILE_SIZE: &[(&str, u64)] = &[
    ("application/pdf", 30 * MIB),
    ("text/html", 10 * MIB),
    ("text/json", MIB),
    ("text/markdown", 10 * MIB),
    ("text/plain", 10 * MIB),
    (
        "application/vnd.openxmlformats-officedocument.wordprocessingml.document",
        10 * MIB,
    ),
    (
        "application/vnd.openxmlformats-officedocument.presentationml.presentation",
        10 * MIB,
    ),
];

/// Notebook title bounds, in characters.
pub const NOTEBOOK_TITLE_LEN: (usize, usize) = (3, 20);
/// Source display-name bounds, in characters.
pub const SOURCE_NAME_LEN: (usize, usize) = (3, 50);
/// Minimum chat message length, in characters.
pub const MESSAGE_MIN_LEN: usize = 2;

/// Size ceiling for a MIME type, or `None` when the type is not accepted.
pub fn size_ceiling(mime: &str) -> Option<u64> {
    MAX_FILE_SIZE
        .iter()
        .find(|(m, _)| *m == mime)
        .map(|(_, limit)| *limit)
}

pub fn is_acceptable_file_type(mime: &str) -> bool {
    size_ceiling(mime).is_some()
}

/// Validate an upload candidate before any transfer is attempted.
pub fn check_upload(mime: &str, size: u64) -> Result<(), ValidationError> {
    let limit = size_ceiling(mime)
        .ok_or_else(|| ValidationError::UnsupportedFileType(mime.to_string()))?;
    if size > limit {
        return Err(ValidationError::FileTooLarge {
            mime: mime.to_string(),
            size,
            limit,
        });
    }
    Ok(())
}

/// Validate a text field against character-count bounds.
pub fn check_text_len(
    field: &'static str,
    value: &str,
    min: usize,
    max: usize,
) -> Result<(), ValidationError> {
    let len = value.chars().count();
    if len < min || len > max {
        return Err(ValidationError::TextLength {
            field,
            min,
            max,
            len,
        });
    }
    Ok(())
}

/// Validate a text field against a minimum character count only.
pub fn check_min_len(
    field: &'static str,
    value: &str,
    min: usize,
) -> Result<(), ValidationError> {
    let len = value.chars().count();
    if len < min {
        return Err(ValidationError::TextTooShort { field, min, len });
    }
    Ok(())
}
