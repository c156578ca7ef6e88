//! WPILog binary framing.
//!
//! This module covers the byte-level layout of a log, independent of how the
//! bytes are pulled from their source:
//! - File header (magic, version, extra header)
//! - Per-record variable-width framing header
//! - Control record (Start, Finish, Set Metadata) payloads

use crate::cursor::ByteCursor;
use crate::error::{Result, WpilogError};
use crate::types::{ControlPayload, MetadataRecordData, StartRecordData};
use byteorder::{ByteOrder, LittleEndian};

pub const MAGIC: &[u8; 6] = b"WPILOG";

/// Magic, minor version, major version and the 4-byte extra header length.
pub const HEADER_PREFIX_LEN: usize = 6 + 1 + 1 + 4;

const CONTROL_START: u8 = 0;
const CONTROL_FINISH: u8 = 1;
const CONTROL_SET_METADATA: u8 = 2;

/// Format version from the file header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Version {
    pub major: u8,
    pub minor: u8,
}

/// The decoded file header.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WpilogHeader {
    pub version: Version,
    pub extra_header: String,
}

/// Validates the fixed-size header prefix, returning the version and the
/// length of the extra header that follows it.
pub fn parse_header_prefix(prefix: &[u8], source_name: &str) -> Result<(Version, usize)> {
    if prefix.len() < HEADER_PREFIX_LEN || &prefix[0..6] != MAGIC {
        return Err(WpilogError::InvalidFormat(format!(
            "{} is not a WPILOG file",
            source_name
        )));
    }

    let version = Version {
        minor: prefix[6],
        major: prefix[7],
    };
    let extra_len = LittleEndian::read_u32(&prefix[8..12]) as usize;

    if version.major < 1 {
        log::warn!(
            "{}: unsupported WPILOG version {}.{}, decoding anyway",
            source_name,
            version.major,
            version.minor
        );
    }

    Ok((version, extra_len))
}

/// Field widths decoded from a record's leading bitfield byte.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RecordHeader {
    pub entry_id_len: usize,
    pub payload_size_len: usize,
    pub timestamp_len: usize,
    pub spare: bool,
}

impl RecordHeader {
    /// Decodes the bitfield: bits 0-1 entry ID width, bits 2-3 payload size
    /// width, bits 4-6 timestamp width (each stored minus one), bit 7 spare.
    pub fn from_bitfield(bitfield: u8) -> Self {
        Self {
            entry_id_len: ((bitfield & 0b11) + 1) as usize,
            payload_size_len: (((bitfield >> 2) & 0b11) + 1) as usize,
            timestamp_len: (((bitfield >> 4) & 0b111) + 1) as usize,
            spare: bitfield & 0x80 != 0,
        }
    }

    /// Encodes the widths back into a bitfield byte.
    pub fn to_bitfield(&self) -> Result<u8> {
        if !(1..=4).contains(&self.entry_id_len)
            || !(1..=4).contains(&self.payload_size_len)
            || !(1..=8).contains(&self.timestamp_len)
        {
            return Err(WpilogError::InvalidFormat(format!(
                "invalid record header length combination {:?}",
                self
            )));
        }

        Ok((self.entry_id_len - 1) as u8
            | (((self.payload_size_len - 1) as u8) << 2)
            | (((self.timestamp_len - 1) as u8) << 4)
            | if self.spare { 0x80 } else { 0 })
    }

    /// The narrowest header able to carry the given values.
    pub fn minimal(entry_id: u32, payload_size: u32, timestamp: u64) -> Self {
        Self {
            entry_id_len: byte_width(entry_id as u64),
            payload_size_len: byte_width(payload_size as u64),
            timestamp_len: byte_width(timestamp),
            spare: false,
        }
    }

    /// Number of bytes following the bitfield byte, before the payload.
    pub fn fields_len(&self) -> usize {
        self.entry_id_len + self.payload_size_len + self.timestamp_len
    }

    /// Writes the bitfield and the three length-prefixed fields.
    pub fn encode(
        &self,
        entry_id: u32,
        payload_size: u32,
        timestamp: u64,
        out: &mut Vec<u8>,
    ) -> Result<()> {
        out.push(self.to_bitfield()?);
        write_le_uint(entry_id as u64, self.entry_id_len, out)?;
        write_le_uint(payload_size as u64, self.payload_size_len, out)?;
        write_le_uint(timestamp, self.timestamp_len, out)?;
        Ok(())
    }

    /// Splits the bytes after the bitfield into (entry ID, payload size, timestamp).
    pub fn decode_fields(&self, fields: &[u8]) -> Result<(u32, u32, u64)> {
        if fields.len() != self.fields_len() {
            return Err(WpilogError::InvalidFormat(format!(
                "record header expects {} bytes, got {}",
                self.fields_len(),
                fields.len()
            )));
        }

        let (entry, rest) = fields.split_at(self.entry_id_len);
        let (size, timestamp) = rest.split_at(self.payload_size_len);

        Ok((
            read_le_uint(entry) as u32,
            read_le_uint(size) as u32,
            read_le_uint(timestamp),
        ))
    }
}

/// Reads an unsigned little-endian integer of 1 to 8 bytes, byte by byte.
pub fn read_le_uint(data: &[u8]) -> u64 {
    data.iter()
        .take(8)
        .enumerate()
        .fold(0u64, |val, (i, &b)| val | ((b as u64) << (i * 8)))
}

fn write_le_uint(value: u64, len: usize, out: &mut Vec<u8>) -> Result<()> {
    if len < 8 && value >> (len * 8) != 0 {
        return Err(WpilogError::InvalidFormat(format!(
            "value {} does not fit in {} bytes",
            value, len
        )));
    }
    out.extend_from_slice(&value.to_le_bytes()[..len]);
    Ok(())
}

fn byte_width(value: u64) -> usize {
    let bits = 64 - value.leading_zeros() as usize;
    bits.div_ceil(8).max(1)
}

/// A framed record before its payload has been interpreted.
#[derive(Debug, Clone, PartialEq)]
pub struct RawRecord {
    pub entry_id: u32,
    pub timestamp: u64,
    pub payload: Vec<u8>,
}

impl RawRecord {
    /// Returns true if the record is a control record (entry ID 0).
    pub fn is_control(&self) -> bool {
        self.entry_id == 0
    }
}

impl ControlPayload {
    /// Decodes a control record payload.
    pub fn decode(payload: &[u8]) -> Result<Self> {
        let mut cursor = ByteCursor::new(payload);

        match cursor.read_u8()? {
            CONTROL_START => {
                let entry_id = cursor.read_u32()?;
                let name = cursor.read_string()?;
                let type_name = cursor.read_string()?;
                let metadata = cursor.read_string()?;
                Ok(ControlPayload::Start(StartRecordData {
                    entry_id,
                    name,
                    type_name,
                    metadata,
                }))
            }
            CONTROL_FINISH => Ok(ControlPayload::Finish {
                entry_id: cursor.read_u32()?,
            }),
            CONTROL_SET_METADATA => {
                let entry_id = cursor.read_u32()?;
                let metadata = cursor.read_string()?;
                Ok(ControlPayload::SetMetadata(MetadataRecordData {
                    entry_id,
                    metadata,
                }))
            }
            other => Err(WpilogError::InvalidFormat(format!(
                "invalid control record type {}",
                other
            ))),
        }
    }

    /// Encodes the payload in the layout [`ControlPayload::decode`] reads.
    pub fn encode(&self) -> Vec<u8> {
        let mut out = Vec::new();
        match self {
            ControlPayload::Start(start) => {
                out.push(CONTROL_START);
                out.extend_from_slice(&start.entry_id.to_le_bytes());
                write_string(&start.name, &mut out);
                write_string(&start.type_name, &mut out);
                write_string(&start.metadata, &mut out);
            }
            ControlPayload::Finish { entry_id } => {
                out.push(CONTROL_FINISH);
                out.extend_from_slice(&entry_id.to_le_bytes());
            }
            ControlPayload::SetMetadata(data) => {
                out.push(CONTROL_SET_METADATA);
                out.extend_from_slice(&data.entry_id.to_le_bytes());
                write_string(&data.metadata, &mut out);
            }
        }
        out
    }
}

fn write_string(s: &str, out: &mut Vec<u8>) {
    out.extend_from_slice(&(s.len() as u32).to_le_bytes());
    out.extend_from_slice(s.as_bytes());
}
