//! A Microsoft NetMon (`.cap`) reader (`spec.md` §4.B, magic `0x55424D47`,
//! i.e. the ASCII bytes `"GMBU"`).
//!
//! NetMon's on-disk format carries a fair amount of capture-session
//! metadata (version, timezone, a seekable frame index at the tail of the
//! file) that a pure ingestion pipeline has no use for. This reader keeps
//! only what `spec.md` §6's uniform frame record needs — frame number,
//! tick, link type, lengths, payload — and reads frames in file order
//! rather than through the frame-index table, matching the "modest
//! fidelity" scope `SPEC_FULL.md` calls for.

use std::io::Read;

use byteorder::{LittleEndian, ReadBytesExt};

use crate::error::Result;
use crate::link_type::LinkType;
use crate::tick::Tick;

use super::{FrameSource, RawFrame};

const MAGIC: [u8; 4] = *b"GMBU";
/// magic(4) + version_major(1) + version_minor(1) + link_type(2) +
/// start_ticks(8) + frame_table_offset(4) + frame_table_length(4) +
/// frame_count(4) + reserved(4)
const FIXED_HEADER_LEN: usize = 32;

pub struct NetMonReader<R> {
    rdr: buf_redux::BufReader<R>,
    link_type: LinkType,
    frame_number: u32,
}

impl<R: Read> NetMonReader<R> {
    pub fn new(mut rdr: R) -> Result<NetMonReader<R>> {
        let mut header = [0u8; FIXED_HEADER_LEN];
        rdr.read_exact(&mut header)?;

        if header[0..4] != MAGIC {
            return Err(crate::error::Error::TruncatedFrame);
        }
        let link_type = LinkType::from_u16(LittleEndian::read_u16(&header[6..8]));

        Ok(NetMonReader {
            rdr: buf_redux::BufReader::new(rdr),
            link_type,
            frame_number: 0,
        })
    }
}

impl<R: Read> FrameSource for NetMonReader<R> {
    fn next_frame(&mut self) -> Result<Option<RawFrame>> {
        let ticks = match self.rdr.read_i64::<LittleEndian>() {
            Ok(v) => v,
            Err(e) if e.kind() == std::io::ErrorKind::UnexpectedEof => return Ok(None),
            Err(e) => return Err(e.into()),
        };
        let tick = Tick::new(ticks)?;
        let frame_length = self.rdr.read_u32::<LittleEndian>()?;
        let captured_length = self.rdr.read_u32::<LittleEndian>()?;

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

    fn sample() -> Vec<u8> {
        let mut buf = Vec::new();
        buf.extend_from_slice(&MAGIC);
        buf.push(2); // version major
        buf.push(1); // version minor
        buf.extend_from_slice(&1u16.to_le_bytes()); // link type: Ethernet
        buf.extend_from_slice(&[0u8; 8 + 4 + 4 + 4 + 4]); // remaining fixed header fields

        buf.extend_from_slice(&100i64.to_le_bytes()); // tick
        buf.extend_from_slice(&3u32.to_le_bytes()); // frame_length
        buf.extend_from_slice(&3u32.to_le_bytes()); // captured_length
        buf.extend_from_slice(&[1, 2, 3]);
        buf
    }

    #[test]
    fn reads_one_frame_after_the_fixed_header() {
        let mut reader = NetMonReader::new(std::io::Cursor::new(sample())).unwrap();
        let frame = reader.next_frame().unwrap().unwrap();
        assert_eq!(frame.data, vec![1, 2, 3]);
        assert_eq!(frame.link_type, LinkType::Ethernet);
        assert_eq!(frame.tick.as_i64(), 100);
        assert!(reader.next_frame().unwrap().is_none());
    }

    #[test]
    fn rejects_bad_magic() {
        let mut buf = sample();
        buf[0] = 0;
        assert!(NetMonReader::new(std::io::Cursor::new(buf)).is_err());
    }
}
