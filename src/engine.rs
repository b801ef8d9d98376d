//! Top-level pipeline: open every file in tick order, decode each frame
//! through components C, D, E, F, then run the three post-processing
//! passes once over the complete trace (`spec.md` §2, §5).
//!
//! Ingest is strictly sequential — the conversation index, global frame
//! sequence, and per-conversation append order form one causal chain that
//! cannot be parallelized (`spec.md` §5). The three post-processing passes
//! run serially in `G → H → I` order; within each, per-conversation work
//! is independent and a caller embedding this engine in a parallel driver
//! MAY fan those out, but this crate runs them in-line.

use tracing::{info, warn};

use crate::error::Result;
use crate::file::File;
use crate::frame::{Frame, TcpFlags};
use crate::link;
use crate::network::{self, PROTO_TCP, PROTO_UDP};
use crate::postprocess;
use crate::reader::{self, ordering};
use crate::store::{FiveTuple, TraceStore};
use crate::transport;

/// Expands `file_spec`, ingests every matching file in ascending
/// first-frame-tick order, then runs Direction Fixup, Retransmit Marker,
/// and Continuation Marker over the assembled trace.
pub fn run(file_spec: &str) -> Result<TraceStore> {
    let ordered = ordering::expand_and_order(file_spec)?;
    let total_bytes: u64 = ordered.iter().map(|f| f.size).sum();
    let mut store = TraceStore::with_capacity_hint(total_bytes);

    for ordered_file in &ordered {
        if let Err(e) = ingest_file(&mut store, ordered_file) {
            warn!(path = %ordered_file.path.display(), error = %e, "skipping file after a read failure");
        }
    }

    postprocess::direction::run(&mut store);
    postprocess::retransmit::run(&mut store);
    postprocess::continuation::run(&mut store);

    Ok(store)
}

fn ingest_file(store: &mut TraceStore, ordered: &ordering::OrderedFile) -> Result<()> {
    let mut source = reader::open(&ordered.path)?;

    let file_id = store.add_file(File {
        path: ordered.path.clone(),
        last_write_time: ordered.last_write_time,
        size: ordered.size,
        first_tick: ordered.first_tick,
        last_tick: ordered.first_tick,
        frame_count: 0,
    });

    let mut frame_count = 0u32;
    let mut last_tick = ordered.first_tick;
    // One per file, so link.rs's "unsupported link type"/"unsupported
    // EtherType" diagnostics fire at most once per distinct cause per file
    // (`spec.md` §4.C), not once per frame.
    let mut link_diag = link::Diagnostics::default();

    while let Some(raw) = source.next_frame()? {
        last_tick = raw.tick;
        ingest_frame(store, file_id, raw, &mut link_diag);
        frame_count += 1;
    }

    let file = store.file_mut(file_id);
    file.frame_count = frame_count;
    file.last_tick = last_tick;

    info!(path = %ordered.path.display(), frames = frame_count, "ingested file");
    Ok(())
}

fn ingest_frame(store: &mut TraceStore, file_id: crate::store::FileId, raw: reader::RawFrame, link_diag: &mut link::Diagnostics) {
    let Some(linked) = link::decode(&raw.data, raw.link_type, link_diag) else { return };

    let decoded = match network::decode(&raw.data, linked.network, linked.offset) {
        Ok(Some(d)) => d,
        Ok(None) => return,
        Err(_) => {
            warn!("network header truncated before a 5-tuple could be established; dropping frame");
            return;
        }
    };

    let buf_last = raw.data.len().saturating_sub(1);
    let last_byte_offset = decoded.last_byte_offset.min(buf_last);

    let is_udp_protocol = decoded.next_protocol == PROTO_UDP;

    // Ports are the first 4 bytes of both the TCP and UDP fixed header, so
    // they can be read even when the rest of the header is truncated. Once
    // they're known the directional 5-tuple — and so this frame's owning
    // conversation — can be resolved, which is what lets a truncation past
    // this point be attributed to that conversation instead of just
    // dropping the frame anonymously.
    let Some((src_port, dst_port)) = transport::peek_ports(&raw.data, decoded.transport_offset) else {
        warn!("transport header truncated before ports could be read; dropping frame");
        return;
    };

    let tuple = FiveTuple {
        src_ip: decoded.src_ip,
        src_port,
        dst_ip: decoded.dst_ip,
        dst_port,
        is_ipv6: decoded.is_ipv6,
    };

    let (is_udp, tcp, payload) = if decoded.next_protocol == PROTO_TCP {
        match transport::decode_tcp(&raw.data, decoded.transport_offset, decoded.last_byte_offset) {
            Some(tcp) => {
                let payload = tcp.payload.clone();
                (false, Some(tcp), payload)
            }
            None => {
                record_transport_truncation(store, tuple, is_udp_protocol, decoded.next_protocol, raw.tick);
                return;
            }
        }
    } else if decoded.next_protocol == PROTO_UDP {
        match transport::decode_udp(&raw.data, decoded.transport_offset, decoded.last_byte_offset) {
            Some(udp) => (true, None, udp.payload),
            None => {
                record_transport_truncation(store, tuple, is_udp_protocol, decoded.next_protocol, raw.tick);
                return;
            }
        }
    } else {
        return;
    };
    let is_syn = tcp.as_ref().is_some_and(|t| t.flags.contains(TcpFlags::SYN));

    let (conv_id, is_from_client) =
        store.lookup_or_create_conversation(tuple, is_udp, decoded.next_protocol, is_syn, raw.tick);

    let frame = Frame {
        number: raw.number,
        tick: raw.tick,
        file: file_id,
        frame_length: raw.frame_length,
        captured_length: raw.captured_length,
        last_byte_offset,
        link_type: raw.link_type,
        is_from_client,
        tcp_seq: tcp.as_ref().map(|t| t.seq),
        tcp_ack: tcp.as_ref().map(|t| t.ack),
        tcp_flags: tcp.as_ref().map(|t| t.flags),
        tcp_window: tcp.as_ref().map(|t| t.window),
        smp_session: tcp.as_ref().and_then(|t| t.smp_session),
        payload,
        is_udp,
        is_retransmit: false,
        is_continuation: false,
        conversation: conv_id,
    };
    let is_keepalive = frame.is_keepalive();
    let smp_session = frame.smp_session;

    store.attach_frame(frame);

    let conv = store.conversation_mut(conv_id);
    conv.is_udp = conv.is_udp || is_udp;
    if smp_session.is_some() {
        conv.is_mars_enabled = true;
    }
    if is_from_client {
        conv.src_mac = Some(linked.src_mac);
        conv.dst_mac = Some(linked.dst_mac);
    } else {
        conv.src_mac = Some(linked.dst_mac);
        conv.dst_mac = Some(linked.src_mac);
    }
    if raw.captured_length < raw.frame_length
        && (conv.truncated_frame_length == 0 || raw.captured_length < conv.truncated_frame_length)
    {
        conv.truncated_frame_length = raw.captured_length;
    }

    if let Some(t) = &tcp {
        if t.flags.contains(TcpFlags::SYN) {
            conv.syn_count += 1;
        }
        if t.flags.contains(TcpFlags::ACK) {
            conv.ack_count += 1;
        }
        if t.flags.contains(TcpFlags::FIN) {
            conv.fin_count += 1;
            if conv.first_fin_tick.is_none() {
                conv.first_fin_tick = Some(raw.tick);
            }
        }
        if t.flags.contains(TcpFlags::RST) {
            conv.rst_count += 1;
            if conv.first_rst_tick.is_none() {
                conv.first_rst_tick = Some(raw.tick);
            }
        }
        if t.flags.contains(TcpFlags::PSH) {
            conv.push_count += 1;
        }
        if is_keepalive {
            conv.keepalive_count += 1;
        }
    }
}

/// Resolves (or creates) `tuple`'s conversation and increments its
/// `truncation_error_count` for a transport header that's truncated past
/// the point where its ports could be read (`spec.md` §4.D). The frame
/// itself is never attached — it's dropped like any other contained
/// per-frame fault (`spec.md` §7) — but the owning conversation records
/// that a decode was attempted and lost data.
///
/// `is_syn` is unknowable here (the TCP flags byte is part of the
/// truncated region), so port-rollover is never triggered by this path.
fn record_transport_truncation(store: &mut TraceStore, tuple: FiveTuple, is_udp: bool, next_protocol: u8, tick: crate::tick::Tick) {
    let (conv_id, _) = store.lookup_or_create_conversation(tuple, is_udp, next_protocol, false, tick);
    store.conversation_mut(conv_id).truncation_error_count += 1;
    warn!("transport header truncated after ports were read; frame dropped, truncation recorded on its conversation");
}
