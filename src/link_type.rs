//! The physical link type backing a capture interface.
//!
//! Only the three values `spec.md` §4.C dispatches on are given real
//! handling (`Ethernet`, `Wifi`, `NetEvent`); everything else round-trips
//! through `LinkType::Other` so a reader can still surface the frame even
//! though the Link Decoder will drop it with a diagnostic.

#[allow(non_camel_case_types)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinkType {
    /// D/I/X and 802.3 Ethernet.
    Ethernet,
    /// IEEE 802.11 (wireless). Recognised but not decoded (`spec.md` §4.C).
    Wifi,
    /// A vendor network-event trace, recognised but not decoded.
    NetEvent,
    /// Anything else. Carries the raw link-type code for diagnostics.
    Other(u16),
}

impl LinkType {
    pub fn from_u16(code: u16) -> LinkType {
        match code {
            1 => LinkType::Ethernet,
            6 => LinkType::Wifi,
            0xFFE0 => LinkType::NetEvent,
            other => LinkType::Other(other),
        }
    }

    pub fn code(self) -> u16 {
        match self {
            LinkType::Ethernet => 1,
            LinkType::Wifi => 6,
            LinkType::NetEvent => 0xFFE0,
            LinkType::Other(x) => x,
        }
    }
}
