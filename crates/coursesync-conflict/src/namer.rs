//! Suffix naming
//!
//! Suffixes are inserted between stem and extension so renamed files keep
//! opening with the right application:
//! `report.pdf` → `report_2024-05-01_12-30-00.pdf`, `report_v2.pdf`.

use chrono::DateTime;

/// Inserts `suffix` before the last extension of `name`.
///
/// Leading dots do not start an extension, so `.bashrc` becomes
/// `.bashrc_v1`.
pub fn append_to_stem(name: &str, suffix: &str) -> String {
    match name.rfind('.') {
        Some(dot) if dot > 0 => {
            let (stem, ext) = name.split_at(dot);
            format!("{stem}{suffix}{ext}")
        }
        _ => format!("{name}{suffix}"),
    }
}

/// Formats a change timestamp as `yyyy-MM-dd_HH-mm-ss` (UTC)
pub fn timestamp_suffix(changed: i64) -> String {
    match DateTime::from_timestamp(changed, 0) {
        Some(at) => at.format("%Y-%m-%d_%H-%M-%S").to_string(),
        None => changed.to_string(),
    }
}

/// Name of the `n`th preserved version of a local file
pub fn versioned_name(name: &str, n: u32) -> String {
    append_to_stem(name, &format!("_v{n}"))
}
