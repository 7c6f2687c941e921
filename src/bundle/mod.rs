//! Bundle Module
//!
//! Builds zip archives from many objects:
//! - Bounded-concurrency fetching from the object store or a local directory
//! - Ordered, streaming archive assembly with cleanup on failure
//! - Collision-resistant archive naming

pub mod assembler;
pub mod fetcher;
pub mod naming;
pub mod types;

pub use assembler::{assemble, ArchiveAssembler, ArchiveSummary};
pub use fetcher::{BatchFetcher, FetchStream};
pub use types::{validate_local_key, BatchItem, FetchSource, FetchedEntry, ZipBundle};

use std::collections::HashSet;

use crate::error::TransferError;

/// Reject batches whose archive entry names collide or are empty
pub fn check_entry_names(items: &[BatchItem]) -> Result<(), TransferError> {
    let mut seen = HashSet::with_capacity(items.len());
    for item in items {
        if item.name.is_empty() {
            return Err(TransferError::Configuration(format!(
                "empty entry name for {}",
                item.key
            )));
        }
        if !seen.insert(item.name.as_str()) {
            return Err(TransferError::Configuration(format!(
                "duplicate entry name: {}",
                item.name
            )));
        }
    }
    Ok(())
}
