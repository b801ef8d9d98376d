//! Component C — Link Decoder (`spec.md` §4.C).
//!
//! Strips the Ethernet header and zero-or-more 802.1Q VLAN tags, then
//! dispatches on the resulting EtherType. WiFi and NetEvent link types are
//! recognised but not decoded; any other link type is dropped with one
//! diagnostic per file, per [`Diagnostics`].

use std::collections::HashSet;

use byteorder::{BigEndian, ByteOrder};
use tracing::warn;

use crate::ip::MacAddress;
use crate::link_type::LinkType;

const ETHERTYPE_VLAN: u16 = 0x8100;
const ETHERTYPE_IPV4: u16 = 0x0800;
const ETHERTYPE_IPV6: u16 = 0x86DD;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Network {
    Ipv4,
    Ipv6,
}

pub struct LinkDecoded {
    pub dst_mac: MacAddress,
    pub src_mac: MacAddress,
    pub network: Network,
    /// Byte offset of the first byte after the (VLAN-stripped) Ethernet
    /// header, i.e. where the IP header starts.
    pub offset: usize,
}

/// Tracks which "unsupported link type"/"unsupported EtherType" diagnostics
/// have already fired for one file, so each distinct cause logs exactly
/// once per file (`spec.md` §4.C) instead of once per frame. Owned by the
/// caller (one instance per file being ingested) and threaded through
/// [`decode`].
#[derive(Debug, Default)]
pub struct Diagnostics {
    warned_wifi: bool,
    warned_net_event: bool,
    warned_other_link_types: HashSet<u16>,
    warned_ethertypes: HashSet<u16>,
}

/// Decodes the link layer of `buf` for the given `link_type`.
///
/// Returns `None` for link types this decoder doesn't handle, or for an
/// EtherType it doesn't recognise, logging at most once per file for each
/// distinct cause via `diag`.
pub fn decode(buf: &[u8], link_type: LinkType, diag: &mut Diagnostics) -> Option<LinkDecoded> {
    match link_type {
        LinkType::Ethernet => decode_ethernet(buf, diag),
        LinkType::Wifi => {
            if !diag.warned_wifi {
                diag.warned_wifi = true;
                warn!("WiFi link type is recognised but not decoded; dropping frame");
            }
            None
        }
        LinkType::NetEvent => {
            if !diag.warned_net_event {
                diag.warned_net_event = true;
                warn!("NetEvent link type is recognised but not decoded; dropping frame");
            }
            None
        }
        LinkType::Other(code) => {
            if diag.warned_other_link_types.insert(code) {
                warn!(link_type = code, "unsupported link type; dropping frame");
            }
            None
        }
    }
}

fn decode_ethernet(buf: &[u8], diag: &mut Diagnostics) -> Option<LinkDecoded> {
    if buf.len() < 14 {
        return None;
    }
    let dst_mac = MacAddress::from_bytes(&buf[0..6]);
    let src_mac = MacAddress::from_bytes(&buf[6..12]);

    let mut offset = 12;
    let mut ethertype = BigEndian::read_u16(&buf[offset..offset + 2]);
    while ethertype == ETHERTYPE_VLAN {
        offset += 4;
        if buf.len() < offset + 2 {
            return None;
        }
        ethertype = BigEndian::read_u16(&buf[offset..offset + 2]);
    }
    offset += 2;

    let network = match ethertype {
        ETHERTYPE_IPV4 => Network::Ipv4,
        ETHERTYPE_IPV6 => Network::Ipv6,
        other => {
            if diag.warned_ethertypes.insert(other) {
                warn!(ethertype = format!("{:#06x}", other), "unsupported EtherType; dropping frame");
            }
            return None;
        }
    };

    Some(LinkDecoded { dst_mac, src_mac, network, offset })
}
