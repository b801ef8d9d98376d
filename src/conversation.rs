use crate::ip::{IpAddress, MacAddress};
use crate::store::FrameId;
use crate::tick::Tick;

/// A set of frames sharing a directional 5-tuple.
///
/// "Directional" means the conversation's `src_*`/`dst_*` fields name the
/// client→server direction as first observed; `spec.md` §4.G may later
/// swap them if that first observation turns out to be backwards.
#[derive(Debug, Clone)]
pub struct Conversation {
    pub src_ip: IpAddress,
    pub dst_ip: IpAddress,
    pub src_port: u16,
    pub dst_port: u16,
    pub is_ipv6: bool,
    pub is_udp: bool,
    pub is_mars_enabled: bool,
    pub next_protocol: u8,

    pub start_tick: Tick,
    pub end_tick: Tick,

    pub source_frames: u32,
    pub dest_frames: u32,
    pub total_bytes: u64,
    pub syn_count: u32,
    pub ack_count: u32,
    pub fin_count: u32,
    pub rst_count: u32,
    pub push_count: u32,
    pub keepalive_count: u32,
    pub raw_retransmits: u32,
    pub sig_retransmits: u32,
    pub truncation_error_count: u32,

    pub first_fin_tick: Option<Tick>,
    pub first_rst_tick: Option<Tick>,

    pub src_mac: Option<MacAddress>,
    pub dst_mac: Option<MacAddress>,

    /// 0 = untruncated so far; otherwise the shortest captured length seen.
    pub truncated_frame_length: u32,

    /// Frames belonging to this conversation, in capture-time (insertion)
    /// order.
    pub frames: Vec<FrameId>,
}

impl Conversation {
    pub fn new(
        src_ip: IpAddress,
        dst_ip: IpAddress,
        src_port: u16,
        dst_port: u16,
        is_ipv6: bool,
        is_udp: bool,
        next_protocol: u8,
        tick: Tick,
    ) -> Conversation {
        Conversation {
            src_ip,
            dst_ip,
            src_port,
            dst_port,
            is_ipv6,
            is_udp,
            is_mars_enabled: false,
            next_protocol,
            start_tick: tick,
            end_tick: tick,
            source_frames: 0,
            dest_frames: 0,
            total_bytes: 0,
            syn_count: 0,
            ack_count: 0,
            fin_count: 0,
            rst_count: 0,
            push_count: 0,
            keepalive_count: 0,
            raw_retransmits: 0,
            sig_retransmits: 0,
            truncation_error_count: 0,
            first_fin_tick: None,
            first_rst_tick: None,
            src_mac: None,
            dst_mac: None,
            truncated_frame_length: 0,
            frames: Vec::new(),
        }
    }

    /// Inherits the 5-tuple and MACs of a prior conversation when a
    /// TCP port is reused (`spec.md` §4.E, port-rollover split).
    pub fn spawn_rollover(prior: &Conversation, tick: Tick) -> Conversation {
        let mut c = Conversation::new(
            prior.src_ip,
            prior.dst_ip,
            prior.src_port,
            prior.dst_port,
            prior.is_ipv6,
            prior.is_udp,
            prior.next_protocol,
            tick,
        );
        c.src_mac = prior.src_mac;
        c.dst_mac = prior.dst_mac;
        c
    }

    pub fn widen_window(&mut self, tick: Tick) {
        if tick < self.start_tick {
            self.start_tick = tick;
        }
        if tick > self.end_tick {
            self.end_tick = tick;
        }
    }

    pub fn swap_direction(&mut self) {
        std::mem::swap(&mut self.src_ip, &mut self.dst_ip);
        std::mem::swap(&mut self.src_port, &mut self.dst_port);
        std::mem::swap(&mut self.src_mac, &mut self.dst_mac);
        std::mem::swap(&mut self.source_frames, &mut self.dest_frames);
    }
}
