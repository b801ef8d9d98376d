//! A classic pcap reader (`spec.md` §4.B).
//!
//! Fixed 24-byte global header followed by a stream of 16-byte per-packet
//! headers + captured bytes. Four magic-number variants are recognised,
//! covering both byte orders and both microsecond/nanosecond timestamp
//! resolutions, matching the teacher's legacy `byteorder`-based readers
//! rather than its newer `bytes::Buf` pcap-ng path.

use std::io::Read;

use byteorder::{BigEndian, ByteOrder, LittleEndian};

use crate::error::{Error, Result};
use crate::link_type::LinkType;
use crate::tick::Tick;

use super::{FrameSource, RawFrame};

const MAGIC_MICROS_LE: u32 = 0xA1B2_C3D4;
const MAGIC_MICROS_BE: u32 = 0xD4C3_B2A1;
const MAGIC_NANOS_LE: u32 = 0xA1B2_3C4D;
const MAGIC_NANOS_BE: u32 = 0x4D3C_B2A1;

#[derive(Clone, Copy, PartialEq, Eq)]
enum Endianness {
    Big,
    Little,
}

pub struct PcapReader<R> {
    rdr: buf_redux::BufReader<R>,
    endianness: Endianness,
    /// 1 for nanosecond-resolution files, 1000 for microsecond-resolution.
    ns_per_tick_unit: u32,
    link_type: LinkType,
    frame_number: u32,
}

impl<R: Read> PcapReader<R> {
    pub fn new(mut rdr: R) -> Result<PcapReader<R>> {
        let mut header = [0u8; 24];
        rdr.read_exact(&mut header)?;

        let magic = LittleEndian::read_u32(&header[0..4]);
        let (endianness, ns_per_tick_unit) = match magic {
            MAGIC_MICROS_LE => (Endianness::Little, 1000),
            MAGIC_MICROS_BE => (Endianness::Big, 1000),
            MAGIC_NANOS_LE => (Endianness::Little, 1),
            MAGIC_NANOS_BE => (Endianness::Big, 1),
            _ => return Err(Error::TruncatedFrame),
        };

        let read_u32 = |b: &[u8]| -> u32 {
            match endianness {
                Endianness::Big => BigEndian::read_u32(b),
                Endianness::Little => LittleEndian::read_u32(b),
            }
        };
        let link_type = LinkType::from_u16(read_u32(&header[20..24]) as u16);

        Ok(PcapReader {
            rdr: buf_redux::BufReader::new(rdr),
            endianness,
            ns_per_tick_unit,
            link_type,
            frame_number: 0,
        })
    }

    fn read_u32(&self, b: &[u8]) -> u32 {
        match self.endianness {
            Endianness::Big => BigEndian::read_u32(b),
            Endianness::Little => LittleEndian::read_u32(b),
        }
    }
}

/// Seconds since the Unix epoch to 100-ns ticks since `0001-01-01`.
const UNIX_EPOCH_TICKS: i64 = 621_355_968_000_000_000;

impl<R: Read> FrameSource for PcapReader<R> {
    fn next_frame(&mut self) -> Result<Option<RawFrame>> {
        let mut header = [0u8; 16];
        match self.rdr.read_exact(&mut header) {
            Ok(()) => {}
            Err(e) if e.kind() == std::io::ErrorKind::UnexpectedEof => return Ok(None),
            Err(e) => return Err(e.into()),
        }

        let ts_sec = self.read_u32(&header[0..4]) as i64;
        let ts_subsec = self.read_u32(&header[4..8]) as i64;
        let captured_length = self.read_u32(&header[8..12]);
        let frame_length = self.read_u32(&header[12..16]);

        let ticks =
            UNIX_EPOCH_TICKS + ts_sec * Tick::TICKS_PER_SECOND + ts_subsec * (self.ns_per_tick_unit as i64) / 100;
        let tick = Tick::new(ticks)?;

        let mut data = vec![0u8; captured_length as usize];
        self.rdr.read_exact(&mut data)?;

        self.frame_number += 1;
        Ok(Some(RawFrame {
            number: self.frame_number,
            tick,
            link_type: self.link_type,
            frame_length,
            captured_length,
            data,
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample(magic: [u8; 4]) -> Vec<u8> {
        let mut buf = Vec::new();
        buf.extend_from_slice(&magic);
        buf.extend_from_slice(&[2, 0, 4, 0]); // version major/minor
        buf.extend_from_slice(&[0; 8]); // thiszone, sigfigs
        buf.extend_from_slice(&[0xFF, 0xFF, 0, 0]); // snaplen
        buf.extend_from_slice(&1u32.to_le_bytes()); // link type: Ethernet
        // one packet: ts_sec=0, ts_subsec=0, caplen=3, len=3
        buf.extend_from_slice(&[0; 4]);
        buf.extend_from_slice(&[0; 4]);
        buf.extend_from_slice(&3u32.to_le_bytes());
        buf.extend_from_slice(&3u32.to_le_bytes());
        buf.extend_from_slice(&[0xAA, 0xBB, 0xCC]);
        buf
    }

    #[test]
    fn reads_one_microsecond_little_endian_frame() {
        let buf = sample(MAGIC_MICROS_LE.to_le_bytes());
        let mut reader = PcapReader::new(std::io::Cursor::new(buf)).unwrap();
        let frame = reader.next_frame().unwrap().unwrap();
        assert_eq!(frame.data, vec![0xAA, 0xBB, 0xCC]);
        assert_eq!(frame.link_type, LinkType::Ethernet);
        assert!(reader.next_frame().unwrap().is_none());
    }

    #[test]
    fn rejects_unknown_magic() {
        let mut buf = sample(MAGIC_MICROS_LE.to_le_bytes());
        buf[0] = 0;
        assert!(PcapReader::new(std::io::Cursor::new(buf)).is_err());
    }
}
