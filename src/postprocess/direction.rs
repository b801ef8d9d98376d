//! Component G — Direction Fixup (`spec.md` §4.G).
//!
//! Looks only at each conversation's first frame's TCP flags (ECN ignored)
//! and swaps client/server when that first observation contradicts
//! SYN-from-client.

use tracing::debug;

use crate::frame::TcpFlags;
use crate::store::TraceStore;

/// Runs direction fixup over every conversation in the store.
pub fn run(store: &mut TraceStore) {
    let conversation_count = store.conversations().len();
    for idx in 0..conversation_count {
        fixup_one(store, crate::store::ConversationId(idx as u32));
    }
}

fn fixup_one(store: &mut TraceStore, conv_id: crate::store::ConversationId) {
    let Some(&first_frame_id) = store.conversation(conv_id).frames.first() else { return };
    let Some(flags) = store.frame(first_frame_id).tcp_flags else { return };

    let is_syn_only = flags.contains(TcpFlags::SYN) && !flags.contains(TcpFlags::ACK);
    let is_syn_ack = flags.contains(TcpFlags::SYN) && flags.contains(TcpFlags::ACK);
    let first_frame_is_from_client = store.frame(first_frame_id).is_from_client;

    let should_reverse = (is_syn_only && !first_frame_is_from_client) || (is_syn_ack && first_frame_is_from_client);
    if !should_reverse {
        return;
    }

    debug!(conversation = conv_id.0, "reversing client/server direction");
    store.conversation_mut(conv_id).swap_direction();

    let frame_ids: Vec<_> = store.conversation(conv_id).frames.clone();
    for frame_id in frame_ids {
        let frame = store.frame_mut(frame_id);
        frame.is_from_client = !frame.is_from_client;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::conversation::Conversation;
    use crate::frame::Frame;
    use crate::ip::IpAddress;
    use crate::link_type::LinkType;
    use crate::store::{ConversationId, FileId};
    use crate::tick::Tick;

    fn mk_frame(conv: ConversationId, is_from_client: bool, flags: TcpFlags) -> Frame {
        Frame {
            number: 1,
            tick: Tick::new(0).unwrap(),
            file: FileId(0),
            frame_length: 60,
            captured_length: 60,
            last_byte_offset: 59,
            link_type: LinkType::Ethernet,
            is_from_client,
            tcp_seq: Some(0),
            tcp_ack: Some(0),
            tcp_flags: Some(flags),
            tcp_window: Some(0),
            smp_session: None,
            payload: Vec::new(),
            is_udp: false,
            is_retransmit: false,
            is_continuation: false,
            conversation: conv,
        }
    }

    #[test]
    fn server_initiated_capture_gets_reversed() {
        let mut store = TraceStore::new();
        let conv = Conversation::new(IpAddress::V4(1), IpAddress::V4(2), 100, 80, false, false, 6, Tick::new(0).unwrap());
        let conv_id = {
            let tuple = crate::store::FiveTuple {
                src_ip: conv.src_ip,
                src_port: conv.src_port,
                dst_ip: conv.dst_ip,
                dst_port: conv.dst_port,
                is_ipv6: false,
            };
            store.lookup_or_create_conversation(tuple, false, 6, true, Tick::new(0).unwrap()).0
        };
        // SYN+ACK observed first, mislabelled as from-client.
        let frame = mk_frame(conv_id, true, TcpFlags::SYN | TcpFlags::ACK);
        store.attach_frame(frame);

        run(&mut store);

        assert!(!store.frame(store.conversation(conv_id).frames[0]).is_from_client);
        assert_eq!(store.conversation(conv_id).src_ip, IpAddress::V4(2));
        assert_eq!(store.conversation(conv_id).dst_ip, IpAddress::V4(1));
    }

    #[test]
    fn never_applies_twice() {
        let mut store = TraceStore::new();
        let conv = Conversation::new(IpAddress::V4(1), IpAddress::V4(2), 100, 80, false, false, 6, Tick::new(0).unwrap());
        let conv_id = {
            let tuple = crate::store::FiveTuple {
                src_ip: conv.src_ip,
                src_port: conv.src_port,
                dst_ip: conv.dst_ip,
                dst_port: conv.dst_port,
                is_ipv6: false,
            };
            store.lookup_or_create_conversation(tuple, false, 6, true, Tick::new(0).unwrap()).0
        };
        let frame = mk_frame(conv_id, true, TcpFlags::SYN);
        store.attach_frame(frame);

        run(&mut store);
        let after_first = store.frame(store.conversation(conv_id).frames[0]).is_from_client;
        run(&mut store);
        let after_second = store.frame(store.conversation(conv_id).frames[0]).is_from_client;
        assert_eq!(after_first, after_second);
    }
}
