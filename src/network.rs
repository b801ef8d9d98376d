//! Component D — Network Decoder (`spec.md` §4.D).
//!
//! Parses IPv4 or IPv6, unwraps ESP and AH, and computes the last-valid-byte
//! offset the Transport Decoder uses to bound the payload. ESP decryption
//! and full IPv6 extension-header chain walking are out of scope (`spec.md`
//! §1); ESP/AH are unwrapped only far enough to reach the encapsulated
//! transport header.

use byteorder::{BigEndian, ByteOrder};
use tracing::warn;

use crate::ip::IpAddress;
use crate::link::Network;

pub const PROTO_TCP: u8 = 6;
pub const PROTO_UDP: u8 = 17;
const PROTO_IPV6_IN_IPV4: u8 = 41;
const PROTO_ESP: u8 = 50;
const PROTO_AH: u8 = 51;

/// IPv6 extension headers that are recognised but not walked; seeing one
/// causes the frame to be dropped with a warning (`spec.md` §4.D).
const IGNORED_IPV6_EXT_HEADERS: [u8; 6] = [0, 43, 44, 51, 60, 135];

#[derive(Debug, Clone, Copy)]
pub struct Decoded {
    pub src_ip: IpAddress,
    pub dst_ip: IpAddress,
    pub is_ipv6: bool,
    pub next_protocol: u8,
    /// Offset into the frame buffer where the transport header begins.
    pub transport_offset: usize,
    /// Index of the final valid byte in the raw buffer, per the IP
    /// payload length (before any transport-level clamping).
    pub last_byte_offset: usize,
}

/// A per-frame fault that's contained at the call site rather than
/// propagated out of the engine (`spec.md` §4.D: "An `IndexOutOfRange`
/// during decode is caught..."). A truncation here happens before the
/// transport header — and so before the directional 5-tuple — can be read,
/// meaning there's no conversation yet to attribute it to; the caller logs
/// and drops the frame. Once the 5-tuple *is* resolved (transport ports
/// read successfully) a further truncation is instead counted on the
/// owning conversation's `truncation_error_count`, via
/// `transport::peek_ports` plus a failed `decode_tcp`/`decode_udp` — see
/// `engine::ingest_frame`.
#[derive(Debug, Clone, Copy)]
pub struct Truncated;

pub fn decode(buf: &[u8], network: Network, offset: usize) -> Result<Option<Decoded>, Truncated> {
    match network {
        Network::Ipv4 => decode_ipv4(buf, offset),
        Network::Ipv6 => decode_ipv6(buf, offset),
    }
}

fn require(buf: &[u8], end: usize) -> Result<(), Truncated> {
    if end > buf.len() {
        Err(Truncated)
    } else {
        Ok(())
    }
}

fn decode_ipv4(buf: &[u8], offset: usize) -> Result<Option<Decoded>, Truncated> {
    require(buf, offset + 20)?;
    let header = &buf[offset..];

    let mut header_length = ((header[0] & 0x0F) as usize) * 4;
    let total_length = BigEndian::read_u16(&header[2..4]) as usize;
    let mut next_protocol = header[9];
    let src_ip = IpAddress::V4(BigEndian::read_u32(&header[12..16]));
    let dst_ip = IpAddress::V4(BigEndian::read_u32(&header[16..20]));

    let mut last_byte_offset = if total_length == 0 { buf.len().saturating_sub(1) } else { offset + total_length - 1 };

    if next_protocol == PROTO_IPV6_IN_IPV4 {
        require(buf, offset + header_length + 7)?;
        next_protocol = buf[offset + header_length + 6];
        header_length += 40;
    }

    let mut transport_offset = offset + header_length;

    if next_protocol == PROTO_ESP {
        match unwrap_esp(buf, last_byte_offset) {
            Ok((inner_protocol, trailer_len)) => {
                last_byte_offset = last_byte_offset.saturating_sub(trailer_len);
                transport_offset += 8;
                next_protocol = inner_protocol;
            }
            Err(_) => {
                warn!("ESP trailer didn't validate; skipping payload");
                next_protocol = 0;
            }
        }
    } else if next_protocol == PROTO_AH {
        require(buf, transport_offset + 2)?;
        let ah_next = buf[transport_offset];
        let ah_len_field = buf[transport_offset + 1];
        next_protocol = ah_next;
        header_length += (ah_len_field as usize) * 4 + 8;
        transport_offset = offset + header_length;
    }

    if next_protocol != PROTO_TCP && next_protocol != PROTO_UDP {
        return Ok(None);
    }

    Ok(Some(Decoded { src_ip, dst_ip, is_ipv6: false, next_protocol, transport_offset, last_byte_offset }))
}

fn decode_ipv6(buf: &[u8], offset: usize) -> Result<Option<Decoded>, Truncated> {
    require(buf, offset + 40)?;
    let header = &buf[offset..];

    let payload_length = BigEndian::read_u16(&header[4..6]) as usize;
    let mut next_protocol = header[6];
    let src_ip = read_ipv6_half_pair(&header[8..24]);
    let dst_ip = read_ipv6_half_pair(&header[24..40]);

    let mut last_byte_offset = offset + 40 + payload_length - 1;
    let mut transport_offset = offset + 40;

    if next_protocol == PROTO_ESP {
        match unwrap_esp(buf, last_byte_offset) {
            Ok((inner_protocol, trailer_len)) => {
                last_byte_offset = last_byte_offset.saturating_sub(trailer_len);
                transport_offset += 8;
                next_protocol = inner_protocol;
            }
            Err(_) => {
                warn!("ESP trailer didn't validate; skipping payload");
                next_protocol = 0;
            }
        }
    } else if next_protocol == PROTO_AH {
        require(buf, transport_offset + 2)?;
        let ah_next = buf[transport_offset];
        let ah_len_field = buf[transport_offset + 1];
        next_protocol = ah_next;
        transport_offset += (ah_len_field as usize) * 4 + 8;
    } else if IGNORED_IPV6_EXT_HEADERS.contains(&next_protocol) {
        warn!(extension_header = next_protocol, "unsupported IPv6 extension header; dropping frame");
        return Ok(None);
    }

    if next_protocol != PROTO_TCP && next_protocol != PROTO_UDP {
        return Ok(None);
    }

    Ok(Some(Decoded {
        src_ip,
        dst_ip,
        is_ipv6: true,
        next_protocol,
        transport_offset,
        last_byte_offset,
    }))
}

fn read_ipv6_half_pair(b: &[u8]) -> IpAddress {
    let hi = BigEndian::read_u64(&b[0..8]);
    let lo = BigEndian::read_u64(&b[8..16]);
    IpAddress::V6(hi, lo)
}

/// ESP trailer routine (`spec.md` §4.D.1).
///
/// Tries a 12-byte integrity blob first, falling back to 16 bytes; returns
/// `(inner_protocol, total_trailer_length)` on success, where
/// `total_trailer_length == blob_len + 2 + pad_len`.
fn unwrap_esp(buf: &[u8], last_byte_offset: usize) -> Result<(u8, usize), Truncated> {
    try_esp_blob_len(buf, last_byte_offset, 12).or_else(|_| try_esp_blob_len(buf, last_byte_offset, 16))
}

fn try_esp_blob_len(buf: &[u8], last_byte_offset: usize, blob_len: usize) -> Result<(u8, usize), Truncated> {
    if last_byte_offset < blob_len + 2 {
        return Err(Truncated);
    }
    let next_header_idx = last_byte_offset - blob_len;
    let pad_len_idx = next_header_idx - 1;
    require(buf, next_header_idx + 1)?;
    let next_header = buf[next_header_idx];
    let pad_len = buf[pad_len_idx] as usize;
    if pad_len == 0 {
        return Ok((next_header, blob_len + 2));
    }
    if pad_len_idx < pad_len {
        return Err(Truncated);
    }
    let pad_start = pad_len_idx - pad_len;
    for (i, &byte) in buf[pad_start..pad_len_idx].iter().enumerate() {
        if byte as usize != i + 1 {
            return Err(Truncated);
        }
    }
    Ok((next_header, blob_len + 2 + pad_len))
}
