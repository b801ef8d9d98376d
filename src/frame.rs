use crate::ip::IpAddress;
use crate::link_type::LinkType;
use crate::store::{ConversationId, FileId};
use crate::tick::Tick;

bitflags::bitflags! {
    /// The TCP flags byte, as read directly off the wire.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct TcpFlags: u8 {
        const FIN = 0b0000_0001;
        const SYN = 0b0000_0010;
        const RST = 0b0000_0100;
        const PSH = 0b0000_1000;
        const ACK = 0b0001_0000;
        const URG = 0b0010_0000;
        const ECE = 0b0100_0000;
        const CWR = 0b1000_0000;
    }
}

/// One decoded packet, attached to its owning conversation.
#[derive(Debug, Clone)]
pub struct Frame {
    pub number: u32,
    pub tick: Tick,
    pub file: FileId,
    pub frame_length: u32,
    pub captured_length: u32,
    pub last_byte_offset: usize,
    pub link_type: LinkType,
    pub is_from_client: bool,

    pub tcp_seq: Option<u32>,
    pub tcp_ack: Option<u32>,
    pub tcp_flags: Option<TcpFlags>,
    pub tcp_window: Option<u16>,
    pub smp_session: Option<u16>,

    pub payload: Vec<u8>,

    pub is_udp: bool,
    pub is_retransmit: bool,
    pub is_continuation: bool,

    pub conversation: ConversationId,
}

impl Frame {
    pub fn payload_len(&self) -> usize {
        self.payload.len()
    }

    /// A keepalive is exactly one zero payload byte, ACK set, and none of
    /// FIN/SYN/RST/PSH set (`spec.md` §4.F).
    pub fn is_keepalive(&self) -> bool {
        let Some(flags) = self.tcp_flags else { return false };
        self.payload.len() == 1
            && self.payload[0] == 0
            && flags.contains(TcpFlags::ACK)
            && !flags.intersects(TcpFlags::FIN | TcpFlags::SYN | TcpFlags::RST | TcpFlags::PSH)
    }

    pub fn src_ip(&self, conv: &crate::conversation::Conversation) -> IpAddress {
        if self.is_from_client { conv.src_ip } else { conv.dst_ip }
    }
}
