//! Capture ingestion and conversation-reconstruction engine for a SQL
//! network-trace analyzer.
//!
//! Given one or more capture files produced by heterogeneous tools, reads
//! raw frames, decodes link/network/transport headers, groups frames into
//! TCP/UDP conversations, extracts TCP payloads (optionally unwrapping an
//! SMP multiplexing shim), and runs three post-processing passes that fix
//! up inverted conversation direction, mark retransmitted TCP segments,
//! and mark continuation segments of a logical message.
//!
//! The concrete capture-file readers, the downstream TDS/SQL parser, and
//! any CLI or logging sink are all external collaborators; this crate
//! owns only ingestion and conversation reconstruction. See
//! [`engine::run`] for the top-level entry point.

pub mod conversation;
pub mod engine;
pub mod error;
pub mod file;
pub mod frame;
pub mod ip;
pub mod link;
pub mod link_type;
pub mod network;
pub mod postprocess;
pub mod reader;
pub mod store;
pub mod tick;
pub mod transport;

pub use conversation::Conversation;
pub use engine::run;
pub use error::{Error, Result};
pub use file::File;
pub use frame::Frame;
pub use store::{ConversationId, FileId, FrameId, TraceStore};
pub use tick::Tick;
