//! Component B — File Ordering (`spec.md` §4.B).
//!
//! Expands a file spec (with `*`/`?` wildcards), peeks the first frame of
//! each match, and sorts files by first-frame tick — preferred over mtime
//! because capture files are sometimes re-touched by other tools.

use std::path::PathBuf;

use tracing::warn;

use crate::error::{Error, Result};
use crate::tick::Tick;

/// One file, located and peeked, ready to be ingested in the returned order.
#[derive(Debug, Clone)]
pub struct OrderedFile {
    pub path: PathBuf,
    pub size: u64,
    pub last_write_time: std::time::SystemTime,
    pub first_tick: Tick,
}

/// Expands `file_spec` and orders the matches ascending by first-frame
/// tick. A per-file open/read failure is logged and that file is skipped;
/// the rest still proceed (`spec.md` §4.B, §7).
pub fn expand_and_order(file_spec: &str) -> Result<Vec<OrderedFile>> {
    let mut candidates = Vec::new();
    for entry in glob::glob(file_spec).map_err(|_| Error::UnsupportedFormat(PathBuf::from(file_spec)))? {
        match entry {
            Ok(path) => candidates.push(path),
            Err(e) => warn!(error = %e, "glob entry failed to resolve"),
        }
    }

    let mut ordered = Vec::with_capacity(candidates.len());
    for path in candidates {
        match peek_one(&path) {
            Ok(file) => ordered.push(file),
            Err(e) => warn!(path = %path.display(), error = %e, "skipping unreadable capture file"),
        }
    }

    ordered.sort_by_key(|f| f.first_tick);
    Ok(ordered)
}

fn peek_one(path: &PathBuf) -> Result<OrderedFile> {
    let metadata = std::fs::metadata(path).map_err(|source| Error::FileAccess { path: path.clone(), source })?;
    let mut reader = super::open(path)?;
    let first = reader
        .next_frame()
        .map_err(|_| Error::FileAccess { path: path.clone(), source: std::io::Error::new(std::io::ErrorKind::UnexpectedEof, "no frames") })?
        .ok_or_else(|| Error::FileAccess {
            path: path.clone(),
            source: std::io::Error::new(std::io::ErrorKind::UnexpectedEof, "empty capture"),
        })?;

    Ok(OrderedFile {
        path: path.clone(),
        size: metadata.len(),
        last_write_time: metadata.modified().unwrap_or(std::time::SystemTime::UNIX_EPOCH),
        first_tick: first.tick,
    })
}
