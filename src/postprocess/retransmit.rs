//! Component H — Retransmit Marker (`spec.md` §4.H).
//!
//! Forward scan per conversation; for each candidate frame, a bounded
//! backward scan over same-direction predecessors looks for the first
//! segment it duplicates or overlaps.

use crate::store::{ConversationId, FrameId, TraceStore};

use super::BACK_COUNT_LIMIT;

const MIN_PAYLOAD_FOR_RETRANSMIT_CHECK: usize = 8;

/// Marks retransmitted segments across every conversation in the store.
///
/// Idempotent: counters are recomputed from scratch on every call, so
/// running it twice yields identical `is_retransmit` flags and counts
/// (`spec.md` §8).
pub fn run(store: &mut TraceStore) {
    let conversation_count = store.conversations().len();
    for idx in 0..conversation_count {
        mark_one(store, ConversationId(idx as u32));
    }
}

fn mark_one(store: &mut TraceStore, conv_id: ConversationId) {
    let frame_ids = store.conversation(conv_id).frames.clone();

    // Reset before recomputing, so repeated runs are idempotent.
    for &id in &frame_ids {
        store.frame_mut(id).is_retransmit = false;
    }
    {
        let conv = store.conversation_mut(conv_id);
        conv.raw_retransmits = 0;
        conv.sig_retransmits = 0;
    }

    for (i, &frame_id) in frame_ids.iter().enumerate() {
        let (payload_len, seq, is_from_client) = {
            let f = store.frame(frame_id);
            (f.payload_len(), f.tcp_seq, f.is_from_client)
        };
        let Some(seq) = seq else { continue };
        if payload_len < MIN_PAYLOAD_FOR_RETRANSMIT_CHECK {
            continue;
        }

        if has_prior_match(store, &frame_ids, i, is_from_client, seq, payload_len) {
            store.frame_mut(frame_id).is_retransmit = true;
            let conv = store.conversation_mut(conv_id);
            conv.raw_retransmits += 1;
            if payload_len > 1 {
                conv.sig_retransmits += 1;
            }
        }
    }
}

fn has_prior_match(
    store: &TraceStore,
    frame_ids: &[FrameId],
    current_idx: usize,
    direction: bool,
    seq: u32,
    payload_len: usize,
) -> bool {
    let mut examined = 0usize;
    for &candidate_id in frame_ids[..current_idx].iter().rev() {
        if examined >= BACK_COUNT_LIMIT {
            break;
        }
        let candidate = store.frame(candidate_id);
        if candidate.is_from_client != direction {
            continue;
        }
        examined += 1;

        let Some(prior_seq) = candidate.tcp_seq else { continue };
        let prior_len = candidate.payload_len();
        if prior_len != payload_len {
            continue;
        }

        if seq == prior_seq || seq_inside(seq, prior_seq, prior_len as u32) {
            return true;
        }
    }
    false
}

/// Whether `seq` falls strictly inside `[prior_seq, prior_seq + prior_len)`,
/// excluding the exact-equal case already covered by the caller.
fn seq_inside(seq: u32, prior_seq: u32, prior_len: u32) -> bool {
    let offset = seq.wrapping_sub(prior_seq);
    offset > 0 && offset < prior_len
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::conversation::Conversation;
    use crate::frame::Frame;
    use crate::ip::IpAddress;
    use crate::link_type::LinkType;
    use crate::store::FileId;
    use crate::tick::Tick;

    fn mk_conv(store: &mut TraceStore) -> ConversationId {
        let conv = Conversation::new(IpAddress::V4(1), IpAddress::V4(2), 100, 80, false, false, 6, Tick::new(0).unwrap());
        let tuple = crate::store::FiveTuple {
            src_ip: conv.src_ip,
            src_port: conv.src_port,
            dst_ip: conv.dst_ip,
            dst_port: conv.dst_port,
            is_ipv6: false,
        };
        store.lookup_or_create_conversation(tuple, false, 6, true, Tick::new(0).unwrap()).0
    }

    fn push(store: &mut TraceStore, conv: ConversationId, seq: u32, payload_len: usize, tick: i64) -> FrameId {
        let frame = Frame {
            number: 1,
            tick: Tick::new(tick).unwrap(),
            file: FileId(0),
            frame_length: 60,
            captured_length: 60,
            last_byte_offset: 59,
            link_type: LinkType::Ethernet,
            is_from_client: true,
            tcp_seq: Some(seq),
            tcp_ack: Some(0),
            tcp_flags: None,
            tcp_window: Some(0),
            smp_session: None,
            payload: vec![0u8; payload_len],
            is_udp: false,
            is_retransmit: false,
            is_continuation: false,
            conversation: conv,
        };
        store.attach_frame(frame)
    }

    #[test]
    fn identical_segment_marks_second_only() {
        let mut store = TraceStore::new();
        let conv = mk_conv(&mut store);
        let f1 = push(&mut store, conv, 1000, 100, 0);
        let f2 = push(&mut store, conv, 1000, 100, 1);

        run(&mut store);

        assert!(!store.frame(f1).is_retransmit);
        assert!(store.frame(f2).is_retransmit);
        assert_eq!(store.conversation(conv).raw_retransmits, 1);
        assert_eq!(store.conversation(conv).sig_retransmits, 1);
    }

    #[test]
    fn small_payload_below_threshold_is_never_checked() {
        let mut store = TraceStore::new();
        let conv = mk_conv(&mut store);
        push(&mut store, conv, 1000, 4, 0);
        let f2 = push(&mut store, conv, 1000, 4, 1);

        run(&mut store);

        assert!(!store.frame(f2).is_retransmit);
    }

    #[test]
    fn idempotent_across_repeated_runs() {
        let mut store = TraceStore::new();
        let conv = mk_conv(&mut store);
        push(&mut store, conv, 1000, 100, 0);
        push(&mut store, conv, 1000, 100, 1);

        run(&mut store);
        let first = (store.conversation(conv).raw_retransmits, store.conversation(conv).sig_retransmits);
        run(&mut store);
        let second = (store.conversation(conv).raw_retransmits, store.conversation(conv).sig_retransmits);
        assert_eq!(first, second);
    }
}
