//! Component F — Transport Decoder (`spec.md` §4.F).
//!
//! Parses TCP (with the optional SMP demultiplex shim) or UDP, and reports
//! what the Conversation Index and counters need updated. Conversation
//! mutation itself happens in the caller (`engine::ingest`), which owns the
//! `&mut Conversation` borrow alongside the rest of the trace store.

use byteorder::{BigEndian, ByteOrder, LittleEndian};
use tracing::warn;

use crate::frame::TcpFlags;

/// A 16-byte shim session-multiplexing header used by MARS to multiplex
/// logical TDS sessions over one TCP connection (`spec.md` Glossary: SMP).
const SMP_HEADER_LEN: usize = 16;
const SMP_MIN_PAYLOAD: usize = 16;
const SMP_MARKER_BYTE: u8 = 0x53;

#[derive(Debug, Clone)]
pub struct TcpDecoded {
    pub src_port: u16,
    pub dst_port: u16,
    pub seq: u32,
    pub ack: u32,
    pub flags: TcpFlags,
    pub window: u16,
    pub smp_session: Option<u16>,
    pub payload: Vec<u8>,
}

#[derive(Debug, Clone)]
pub struct UdpDecoded {
    pub src_port: u16,
    pub dst_port: u16,
    pub payload: Vec<u8>,
}

/// Reads just the source/destination ports — the first 4 bytes of both the
/// TCP and UDP fixed header — without requiring the rest of the header to
/// be present. Ports are all the Conversation Index needs to resolve (or
/// create) this frame's owning conversation, so a caller can identify that
/// conversation and attribute a truncation to it even when the full header
/// doesn't fit in the captured bytes (`spec.md` §4.D: "An `IndexOutOfRange`
/// during decode is caught and increments the owning conversation's
/// `truncation_error_count`").
pub fn peek_ports(buf: &[u8], offset: usize) -> Option<(u16, u16)> {
    if buf.len() < offset + 4 {
        return None;
    }
    Some((BigEndian::read_u16(&buf[offset..offset + 2]), BigEndian::read_u16(&buf[offset + 2..offset + 4])))
}

/// Decodes a TCP segment starting at `offset`, bounded by `last_byte_offset`
/// (inclusive) from the Network Decoder. `buf` holds exactly the captured
/// bytes of this frame, so `buf.len()` is the frame's captured length.
pub fn decode_tcp(buf: &[u8], offset: usize, last_byte_offset: usize) -> Option<TcpDecoded> {
    if buf.len() < offset + 20 {
        return None;
    }
    let header_length = ((buf[offset + 12] >> 4) as usize) * 4;
    if header_length < 20 || buf.len() < offset + header_length {
        warn!("TCP header length implausible; dropping frame");
        return None;
    }

    let src_port = BigEndian::read_u16(&buf[offset..offset + 2]);
    let dst_port = BigEndian::read_u16(&buf[offset + 2..offset + 4]);
    let seq = BigEndian::read_u32(&buf[offset + 4..offset + 8]);
    let ack = BigEndian::read_u32(&buf[offset + 8..offset + 12]);
    let flags = TcpFlags::from_bits_truncate(buf[offset + 13]);
    let window = BigEndian::read_u16(&buf[offset + 14..offset + 16]);

    let mut last_byte_offset = last_byte_offset.min(buf.len().saturating_sub(1));
    let mut payload_start = offset + header_length;
    let mut smp_session = None;

    let initial_payload_len = (last_byte_offset + 1).saturating_sub(payload_start);
    if initial_payload_len >= SMP_MIN_PAYLOAD && buf.get(payload_start) == Some(&SMP_MARKER_BYTE) {
        smp_session = Some(LittleEndian::read_u16(&buf[payload_start + 2..payload_start + 4]));
        payload_start += SMP_HEADER_LEN;
    }

    last_byte_offset = last_byte_offset.min(buf.len().saturating_sub(1));

    let payload = if last_byte_offset + 1 > payload_start {
        buf[payload_start..=last_byte_offset].to_vec()
    } else {
        Vec::new()
    };

    Some(TcpDecoded { src_port, dst_port, seq, ack, flags, window, smp_session, payload })
}

/// Decodes a UDP datagram starting at `offset`.
pub fn decode_udp(buf: &[u8], offset: usize, last_byte_offset: usize) -> Option<UdpDecoded> {
    if buf.len() < offset + 8 {
        return None;
    }
    let src_port = BigEndian::read_u16(&buf[offset..offset + 2]);
    let dst_port = BigEndian::read_u16(&buf[offset + 2..offset + 4]);
    let last_byte_offset = last_byte_offset.min(buf.len().saturating_sub(1));
    let payload_start = offset + 8;
    let payload = if last_byte_offset + 1 > payload_start {
        buf[payload_start..=last_byte_offset].to_vec()
    } else {
        Vec::new()
    };
    Some(UdpDecoded { src_port, dst_port, payload })
}
