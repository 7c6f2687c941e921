//! Archive naming
//!
//! Default names are `orders_{NNNNNN}_{YYYYMMDD_HHMMSS}.zip`: a uniformly
//! random six-digit number plus the local wall-clock time, so names generated
//! concurrently within the same second still differ with probability
//! 1 - 1/900000 per pair, without coordination.

use chrono::{Local, NaiveDateTime};
use rand::Rng;

use crate::config::DOWNLOADS_DIR;
use crate::error::TransferError;

const SUFFIX_MIN: u32 = 100_000;
const SUFFIX_MAX: u32 = 999_999;

/// Generate a default archive file name
pub fn default_name() -> String {
    default_name_at(Local::now().naive_local(), &mut rand::thread_rng())
}

fn default_name_at<R: Rng>(now: NaiveDateTime, rng: &mut R) -> String {
    format!(
        "orders_{}_{}.zip",
        rng.gen_range(SUFFIX_MIN..=SUFFIX_MAX),
        now.format("%Y%m%d_%H%M%S")
    )
}

/// Pick the archive file name: the caller's choice verbatim, else a default.
///
/// Preferred names are not de-duplicated and get no extension enforcement,
/// but they must name a file directly inside `downloads/`.
pub fn resolve(preferred: Option<&str>) -> Result<String, TransferError> {
    match preferred {
        Some(name) if !name.is_empty() => {
            if name == "." || name == ".." || name.contains('/') || name.contains('\\') {
                return Err(TransferError::Configuration(format!(
                    "preferred file name must not contain path components: {name}"
                )));
            }
            Ok(name.to_string())
        }
        _ => Ok(default_name()),
    }
}

/// Name reported to clients for an archive file
pub fn archive_name(file_name: &str) -> String {
    format!("{}/{}", DOWNLOADS_DIR, file_name)
}
