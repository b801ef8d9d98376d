use std::io;
use std::path::PathBuf;

pub type Result<T> = std::result::Result<T, Error>;

/// Per-file failures. Packet-level faults never reach this type — they're
/// contained at their origin (see `network::Decoded::truncation_errors` and
/// the `tracing::warn!` call sites throughout `link`/`network`/`transport`).
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("{0}: didn't recognise the capture format")]
    UnsupportedFormat(PathBuf),

    #[error("{path}: {source}")]
    FileAccess { path: PathBuf, source: io::Error },

    #[error("timestamp {0} ticks is outside the representable range")]
    BadTimestamp(i64),

    #[error("frame truncated before a complete header could be read")]
    TruncatedFrame,

    #[error("ESP trailer didn't validate at either blob length")]
    EspUnknown,

    #[error("unsupported link type {0}")]
    UnsupportedLinkType(u16),

    #[error("unsupported IPv6 extension header {0}")]
    UnsupportedExtensionHeader(u8),

    #[error("unrecognised .etl trace-log variant")]
    UnsupportedEtlVariant,
}

/// A raw I/O failure partway through a reader (a short read on a header,
/// say) is treated as a truncated frame — the reader can't tell the
/// difference between "file got cut off" and "disk hiccuped," and both are
/// handled the same way by the caller (drop this file, keep going).
impl From<io::Error> for Error {
    fn from(_: io::Error) -> Error {
        Error::TruncatedFrame
    }
}
