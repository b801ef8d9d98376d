//! Component I — Continuation Marker (`spec.md` §4.I). Runs after H.
//!
//! For each frame with a non-empty payload, scans backward through at most
//! `BACK_COUNT_LIMIT` same-direction predecessors. A predecessor carrying
//! PUSH aborts the scan (it bounds a logical message); a non-retransmit
//! predecessor with equal ack number and a positive payload marks the
//! current frame as a continuation.

use crate::frame::TcpFlags;
use crate::store::{ConversationId, TraceStore};

use super::BACK_COUNT_LIMIT;

pub fn run(store: &mut TraceStore) {
    let conversation_count = store.conversations().len();
    for idx in 0..conversation_count {
        mark_one(store, ConversationId(idx as u32));
    }
}

fn mark_one(store: &mut TraceStore, conv_id: ConversationId) {
    let frame_ids = store.conversation(conv_id).frames.clone();

    for &id in &frame_ids {
        store.frame_mut(id).is_continuation = false;
    }

    for (i, &frame_id) in frame_ids.iter().enumerate() {
        let (payload_len, is_from_client) = {
            let f = store.frame(frame_id);
            (f.payload_len(), f.is_from_client)
        };
        if payload_len == 0 {
            continue;
        }

        let mut examined = 0usize;
        for &candidate_id in frame_ids[..i].iter().rev() {
            if examined >= BACK_COUNT_LIMIT {
                break;
            }
            let candidate = store.frame(candidate_id);
            if candidate.is_from_client != is_from_client {
                continue;
            }
            examined += 1;

            if candidate.tcp_flags.is_some_and(|f| f.contains(TcpFlags::PSH)) {
                break;
            }

            let candidate_ack = candidate.tcp_ack;
            let candidate_payload_len = candidate.payload_len();
            let candidate_is_retransmit = candidate.is_retransmit;

            let current_ack = store.frame(frame_id).tcp_ack;
            if !candidate_is_retransmit && candidate_payload_len > 0 && candidate_ack == current_ack {
                store.frame_mut(frame_id).is_continuation = true;
                break;
            }
        }
    }
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

    fn push(store: &mut TraceStore, conv: ConversationId, ack: u32, payload_len: usize, flags: Option<TcpFlags>, tick: i64) -> crate::store::FrameId {
        let frame = Frame {
            number: 1,
            tick: Tick::new(tick).unwrap(),
            file: FileId(0),
            frame_length: 60,
            captured_length: 60,
            last_byte_offset: 59,
            link_type: LinkType::Ethernet,
            is_from_client: true,
            tcp_seq: Some(0),
            tcp_ack: Some(ack),
            tcp_flags: flags,
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
    fn chain_of_equal_ack_frames_marks_all_but_first() {
        let mut store = TraceStore::new();
        let conv = mk_conv(&mut store);
        let f1 = push(&mut store, conv, 500, 512, None, 0);
        let f2 = push(&mut store, conv, 500, 512, None, 1);
        let f3 = push(&mut store, conv, 500, 512, None, 2);

        run(&mut store);

        assert!(!store.frame(f1).is_continuation);
        assert!(store.frame(f2).is_continuation);
        assert!(store.frame(f3).is_continuation);
    }

    #[test]
    fn push_flag_bounds_the_message() {
        let mut store = TraceStore::new();
        let conv = mk_conv(&mut store);
        push(&mut store, conv, 500, 512, Some(TcpFlags::PSH), 0);
        let f2 = push(&mut store, conv, 500, 512, None, 1);

        run(&mut store);

        assert!(!store.frame(f2).is_continuation);
    }
}
