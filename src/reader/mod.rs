//! Component A — Frame Reader (collaborator).
//!
//! `spec.md` §1 treats the concrete capture-file readers as external
//! collaborators "specified only by the interface the core consumes" — a
//! narrow trait, realized here as `FrameSource`. Each reader owns its file
//! handle and releases it on drop, per DESIGN NOTE 1.

pub mod etl;
pub mod netmon;
pub mod ordering;
pub mod pcap;
pub mod pcapng;

use std::io::Read;
use std::path::Path;

use crate::error::{Error, Result};
use crate::link_type::LinkType;
use crate::tick::Tick;

/// One frame as handed up by a concrete reader, before any link/network/
/// transport decoding. Matches the uniform record contract in `spec.md` §6.
/// `link_type` travels with each record rather than living on the reader,
/// since pcap-ng allows distinct interfaces — and thus distinct link
/// types — within a single file.
#[derive(Debug, Clone)]
pub struct RawFrame {
    pub number: u32,
    pub tick: Tick,
    pub link_type: LinkType,
    pub frame_length: u32,
    pub captured_length: u32,
    pub data: Vec<u8>,
}

/// The capability set a concrete capture-file reader exposes: `init` is the
/// constructor (format-specific, so it isn't part of the trait), `read_frame`
/// is `next_frame`, and `close` is `Drop`.
pub trait FrameSource {
    fn next_frame(&mut self) -> Result<Option<RawFrame>>;
}

/// The detected on-disk format, dispatched on the four-byte leading magic
/// (or the `.etl` extension) per `spec.md` §4.B.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Format {
    NetMon,
    Pcap,
    PcapNg,
    Etl,
}

const MAGIC_NETMON: u32 = 0x5542_4D47;
const MAGIC_PCAP_VARIANTS: [u32; 4] = [0xA1B2_C3D4, 0xD4C3_B2A1, 0xA1B2_3C4D, 0x4D3C_B2A1];
const MAGIC_PCAPNG: u32 = 0x0A0D_0D0A;

/// Sniffs a format from its leading 4-byte little-endian magic, falling
/// back to the `.etl` file extension.
pub fn detect_format(path: &Path, leading_magic: u32) -> Result<Format> {
    if leading_magic == MAGIC_NETMON {
        return Ok(Format::NetMon);
    }
    if MAGIC_PCAP_VARIANTS.contains(&leading_magic) {
        return Ok(Format::Pcap);
    }
    if leading_magic == MAGIC_PCAPNG {
        return Ok(Format::PcapNg);
    }
    if path.extension().and_then(|e| e.to_str()).is_some_and(|e| e.eq_ignore_ascii_case("etl")) {
        return Ok(Format::Etl);
    }
    Err(Error::UnsupportedFormat(path.to_path_buf()))
}

/// Reads the 4-byte little-endian magic at the start of `reader` without
/// assuming anything about how much more data follows.
pub(crate) fn read_leading_magic(reader: &mut impl Read) -> std::io::Result<u32> {
    use byteorder::{LittleEndian, ReadBytesExt};
    reader.read_u32::<LittleEndian>()
}

/// Opens `path` and constructs the `FrameSource` matching its detected
/// format.
pub fn open(path: &Path) -> Result<Box<dyn FrameSource>> {
    let mut file = std::fs::File::open(path).map_err(|source| Error::FileAccess { path: path.to_path_buf(), source })?;

    // Always read the magic first and let `detect_format` decide, matching
    // its own precedence (the four magic families before the `.etl`
    // extension fallback) — a `.etl`-named file that actually carries a
    // recognised pcap/pcap-ng/NetMon magic must still resolve to that
    // format, not to `EtlReader` just because of its name.
    let format = match read_leading_magic(&mut file) {
        Ok(magic) => detect_format(path, magic)?,
        Err(_) if path.extension().and_then(|e| e.to_str()).is_some_and(|e| e.eq_ignore_ascii_case("etl")) => Format::Etl,
        Err(_) => return Err(Error::UnsupportedFormat(path.to_path_buf())),
    };

    use std::io::{Seek, SeekFrom};
    file.seek(SeekFrom::Start(0)).map_err(|source| Error::FileAccess { path: path.to_path_buf(), source })?;

    Ok(match format {
        Format::NetMon => Box::new(netmon::NetMonReader::new(file)?),
        Format::Pcap => Box::new(pcap::PcapReader::new(file)?),
        Format::PcapNg => Box::new(pcapng::PcapNgReader::new(file)?),
        Format::Etl => Box::new(etl::EtlReader::new(file)?),
    })
}
