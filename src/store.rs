//! The in-memory trace store: three arenas (frames, conversations, files)
//! plus the symmetric secondary index described in `spec.md` §3/§9.
//!
//! Cyclic frame↔conversation ownership is avoided by using stable integer
//! indices (`FrameId`/`ConversationId`) instead of back-pointers, per
//! DESIGN NOTE 2 — the same trick the teacher uses for interface lookups
//! in its `Section` (`InterfaceId` indexing `Section::interfaces`).

use std::collections::HashMap;

use crate::conversation::Conversation;
use crate::file::File;
use crate::frame::Frame;
use crate::ip::IpAddress;
use crate::tick::Tick;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct FrameId(pub u32);
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ConversationId(pub u32);
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct FileId(pub u32);

/// Heuristic growth hints from total input bytes (DESIGN NOTE 4). Pure
/// performance hints — never a correctness contract.
const BYTES_PER_FRAME_HINT: u64 = 200;
const BYTES_PER_CONVERSATION_HINT: u64 = 50_000;

/// The directional 5-tuple identifying a conversation, per `spec.md` §4.E.
/// Deliberately excludes the transport protocol, matching the tuple as
/// defined in the spec (TCP and UDP flows sharing a 5-tuple alias onto the
/// same conversation, by design).
#[derive(Debug, Clone, Copy)]
pub struct FiveTuple {
    pub src_ip: IpAddress,
    pub src_port: u16,
    pub dst_ip: IpAddress,
    pub dst_port: u16,
    pub is_ipv6: bool,
}

impl FiveTuple {
    fn bucket_key(&self) -> u16 {
        self.src_port ^ self.dst_port
    }

    fn matches_as_given(&self, c: &Conversation) -> bool {
        c.is_ipv6 == self.is_ipv6
            && c.src_ip == self.src_ip
            && c.src_port == self.src_port
            && c.dst_ip == self.dst_ip
            && c.dst_port == self.dst_port
    }

    fn matches_reversed(&self, c: &Conversation) -> bool {
        c.is_ipv6 == self.is_ipv6
            && c.src_ip == self.dst_ip
            && c.src_port == self.dst_port
            && c.dst_ip == self.src_ip
            && c.dst_port == self.src_port
    }
}

/// The maximum allowed gap, in seconds, before a RST-terminated
/// conversation is eligible for port-rollover replacement (`spec.md` §4.E).
const ROLLOVER_RST_GAP_SECONDS: f64 = 20.0;

pub struct TraceStore {
    frames: Vec<Frame>,
    conversations: Vec<Conversation>,
    files: Vec<File>,
    /// Bucketed by `src_port XOR dst_port`, which is direction-symmetric —
    /// a lookup works regardless of which side captured the packet.
    bucket: HashMap<u16, Vec<ConversationId>>,
}

impl TraceStore {
    pub fn new() -> TraceStore {
        TraceStore { frames: Vec::new(), conversations: Vec::new(), files: Vec::new(), bucket: HashMap::new() }
    }

    /// Sizes the frame/conversation arenas from the total bytes across all
    /// files about to be ingested. A pure capacity hint.
    pub fn with_capacity_hint(total_input_bytes: u64) -> TraceStore {
        let mut store = TraceStore::new();
        let frame_cap = (total_input_bytes / BYTES_PER_FRAME_HINT).min(usize::MAX as u64) as usize;
        let conv_cap = (total_input_bytes / BYTES_PER_CONVERSATION_HINT).min(usize::MAX as u64) as usize;
        store.frames.reserve(frame_cap);
        store.conversations.reserve(conv_cap);
        store
    }

    pub fn add_file(&mut self, file: File) -> FileId {
        self.files.push(file);
        FileId((self.files.len() - 1) as u32)
    }

    pub fn file(&self, id: FileId) -> &File {
        &self.files[id.0 as usize]
    }

    pub fn file_mut(&mut self, id: FileId) -> &mut File {
        &mut self.files[id.0 as usize]
    }

    pub fn files(&self) -> &[File] {
        &self.files
    }

    pub fn conversation(&self, id: ConversationId) -> &Conversation {
        &self.conversations[id.0 as usize]
    }

    pub fn conversation_mut(&mut self, id: ConversationId) -> &mut Conversation {
        &mut self.conversations[id.0 as usize]
    }

    pub fn conversations(&self) -> &[Conversation] {
        &self.conversations
    }

    pub fn conversations_mut(&mut self) -> &mut [Conversation] {
        &mut self.conversations
    }

    pub fn frame(&self, id: FrameId) -> &Frame {
        &self.frames[id.0 as usize]
    }

    pub fn frame_mut(&mut self, id: FrameId) -> &mut Frame {
        &mut self.frames[id.0 as usize]
    }

    pub fn frames(&self) -> &[Frame] {
        &self.frames
    }

    pub fn frames_mut(&mut self) -> &mut [Frame] {
        &mut self.frames
    }

    fn push_conversation(&mut self, conv: Conversation) -> ConversationId {
        self.conversations.push(conv);
        let id = ConversationId((self.conversations.len() - 1) as u32);
        let key = id;
        let bucket_key = {
            let c = &self.conversations[key.0 as usize];
            c.src_port ^ c.dst_port
        };
        self.bucket.entry(bucket_key).or_default().push(id);
        id
    }

    /// Finds (or creates) the conversation for `tuple`, applying the
    /// TCP port-rollover split from `spec.md` §4.E. `is_syn` must reflect
    /// the SYN flag of the *current* segment (UDP callers pass `false`).
    ///
    /// Returns the target conversation id and whether `tuple`'s direction,
    /// as given, is the conversation's client→server direction (i.e.
    /// whether the current frame is "from client").
    pub fn lookup_or_create_conversation(
        &mut self,
        tuple: FiveTuple,
        is_udp: bool,
        next_protocol: u8,
        is_syn: bool,
        tick: Tick,
    ) -> (ConversationId, bool) {
        let bucket_key = tuple.bucket_key();
        let candidates = self.bucket.get(&bucket_key).cloned().unwrap_or_default();

        // Scan newest-first: a port-rollover split leaves both the retired
        // and replacement conversation in the same bucket, still matching
        // this tuple, and the replacement (pushed later, so later in this
        // list) must win so post-rollover frames bind to it rather than to
        // the conversation it replaced (`spec.md` §4.E: "the new
        // conversation becomes the target for this and subsequent frames").
        let mut found: Option<(ConversationId, bool)> = None;
        for id in candidates.into_iter().rev() {
            let c = &self.conversations[id.0 as usize];
            if tuple.matches_as_given(c) {
                found = Some((id, true));
                break;
            }
            if tuple.matches_reversed(c) {
                found = Some((id, false));
                break;
            }
        }

        let Some((existing_id, is_from_client)) = found else {
            let conv = Conversation::new(
                tuple.src_ip,
                tuple.dst_ip,
                tuple.src_port,
                tuple.dst_port,
                tuple.is_ipv6,
                is_udp,
                next_protocol,
                tick,
            );
            let id = self.push_conversation(conv);
            return (id, true);
        };

        if is_syn {
            let (fin_count, rst_count, end_tick) = {
                let c = &self.conversations[existing_id.0 as usize];
                (c.fin_count, c.rst_count, c.end_tick)
            };
            let should_roll = fin_count >= 1 || (rst_count >= 1 && tick.gap_seconds(end_tick) > ROLLOVER_RST_GAP_SECONDS);
            if should_roll {
                let replacement = {
                    let prior = &self.conversations[existing_id.0 as usize];
                    Conversation::spawn_rollover(prior, tick)
                };
                let new_id = self.push_conversation(replacement);
                return (new_id, is_from_client);
            }
        }

        (existing_id, is_from_client)
    }

    /// Attaches a fully-decoded frame to its conversation: appends it to
    /// both arenas, widens the conversation's time window, and updates the
    /// per-direction frame/byte counters. Per-flag TCP counters (SYN/ACK/
    /// FIN/RST/PUSH/keepalive) are the Transport Decoder's responsibility
    /// (`spec.md` §4.F) and are applied by the caller via
    /// `conversation_mut` before calling this.
    pub fn attach_frame(&mut self, frame: Frame) -> FrameId {
        let conv_id = frame.conversation;
        let tick = frame.tick;
        let is_from_client = frame.is_from_client;
        let payload_len = frame.payload_len() as u64;

        self.frames.push(frame);
        let frame_id = FrameId((self.frames.len() - 1) as u32);

        let conv = &mut self.conversations[conv_id.0 as usize];
        conv.frames.push(frame_id);
        conv.widen_window(tick);
        conv.total_bytes += payload_len;
        if is_from_client {
            conv.source_frames += 1;
        } else {
            conv.dest_frames += 1;
        }

        frame_id
    }
}

impl Default for TraceStore {
    fn default() -> Self {
        TraceStore::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tuple(a: u32, ap: u16, b: u32, bp: u16) -> FiveTuple {
        FiveTuple { src_ip: IpAddress::V4(a), src_port: ap, dst_ip: IpAddress::V4(b), dst_port: bp, is_ipv6: false }
    }

    #[test]
    fn reversed_tuple_maps_to_same_conversation() {
        let mut store = TraceStore::new();
        let t0 = Tick::new(0).unwrap();
        let (id1, from_client1) = store.lookup_or_create_conversation(tuple(1, 100, 2, 80), false, 6, true, t0);
        assert!(from_client1);
        let (id2, from_client2) =
            store.lookup_or_create_conversation(tuple(2, 80, 1, 100), false, 6, false, t0);
        assert_eq!(id1.0, id2.0);
        assert!(!from_client2);
    }

    #[test]
    fn rollover_after_fin_creates_new_conversation() {
        let mut store = TraceStore::new();
        let t0 = Tick::new(0).unwrap();
        let (id1, _) = store.lookup_or_create_conversation(tuple(1, 100, 2, 80), false, 6, true, t0);
        store.conversation_mut(id1).fin_count = 1;

        let t1 = Tick::new(1).unwrap();
        let (id2, _) = store.lookup_or_create_conversation(tuple(1, 100, 2, 80), false, 6, true, t1);
        assert_ne!(id1.0, id2.0);
    }

    #[test]
    fn rst_rollover_requires_20_second_gap() {
        let mut store = TraceStore::new();
        let t0 = Tick::new(0).unwrap();
        let (id1, _) = store.lookup_or_create_conversation(tuple(1, 100, 2, 80), false, 6, true, t0);
        store.conversation_mut(id1).rst_count = 1;
        store.conversation_mut(id1).end_tick = t0;

        let soon = Tick::new(5 * Tick::TICKS_PER_SECOND).unwrap();
        let (id2, _) = store.lookup_or_create_conversation(tuple(1, 100, 2, 80), false, 6, true, soon);
        assert_eq!(id1.0, id2.0, "gap under 20s must not roll over");

        let later = Tick::new(30 * Tick::TICKS_PER_SECOND).unwrap();
        let (id3, _) = store.lookup_or_create_conversation(tuple(1, 100, 2, 80), false, 6, true, later);
        assert_ne!(id1.0, id3.0, "gap over 20s must roll over");
    }

    #[test]
    fn post_rollover_frames_bind_to_the_replacement_not_the_retired_conversation() {
        let mut store = TraceStore::new();
        let t0 = Tick::new(0).unwrap();
        let (id1, _) = store.lookup_or_create_conversation(tuple(1, 100, 2, 80), false, 6, true, t0);
        store.conversation_mut(id1).fin_count = 1;

        let t1 = Tick::new(1).unwrap();
        let (id2, _) = store.lookup_or_create_conversation(tuple(1, 100, 2, 80), false, 6, true, t1);
        assert_ne!(id1.0, id2.0, "the SYN that reuses the port must roll over to a fresh conversation");

        // A non-SYN frame on the same reused 5-tuple (e.g. the SYN+ACK
        // reply) must resolve to the replacement conversation, not fall
        // back to the retired one just because it was created first.
        let (id3, _) = store.lookup_or_create_conversation(tuple(2, 80, 1, 100), false, 6, false, t1);
        assert_eq!(id3.0, id2.0, "subsequent frames must bind to the replacement conversation");
        assert_ne!(id3.0, id1.0);

        // And a following SYN on the same tuple must not trigger a second,
        // spurious rollover — the replacement conversation has no FIN/RST
        // of its own yet.
        let t2 = Tick::new(2).unwrap();
        let (id4, _) = store.lookup_or_create_conversation(tuple(1, 100, 2, 80), false, 6, true, t2);
        assert_eq!(id4.0, id2.0, "must not scatter the new connection across a third conversation");
    }
}
