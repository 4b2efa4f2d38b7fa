//! Name sanitizing
//!
//! Remote names may contain characters that are illegal on common target
//! filesystems. Names are stripped of those before they are compared or
//! written. Stored names are NFC-normalized and compared case-insensitively,
//! since the mirror may live on a case-insensitive, normalizing volume.

use unicode_normalization::UnicodeNormalization;

/// Characters that are never allowed in a mirrored file name
pub const ILLEGAL_CHARS: &[char] = &['/', '\\', ':', '*', '?', '"', '<', '>', '|'];

/// Replacement for names that sanitize to nothing
const EMPTY_NAME: &str = "_";

/// Strips path separators, illegal and control characters, and surrounding
/// whitespace. The result is in NFC.
pub fn sanitize(name: &str) -> String {
    let cleaned: String = name
        .nfc()
        .filter(|c| !ILLEGAL_CHARS.contains(c) && !c.is_control())
        .collect();
    let trimmed = cleaned.trim();
    if trimmed.is_empty() || trimmed == "." || trimmed == ".." {
        EMPTY_NAME.to_string()
    } else {
        trimmed.to_string()
    }
}

/// Index key of a name: sanitized, lowercased, then recomposed
pub fn fold(name: &str) -> String {
    sanitize(name).to_lowercase().nfc().collect()
}

/// Whether `name` is the default-folder sentinel
pub fn is_default_folder(name: &str, sentinel: &str) -> bool {
    name.trim() == sentinel.trim()
}
