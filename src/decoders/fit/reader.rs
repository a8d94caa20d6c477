// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! FIT container framing.
//!
//! A FIT file is a header, a stream of records, and a CRC trailer. Each
//! record is either a definition (binding a local type 0-15 to a global
//! message number and field layout) or data (field values laid out per
//! the definition currently bound to its local type).
//!
//! Decoding runs in two passes:
//! 1. [`index_records`] walks the record headers, parses every definition
//!    into a layout table and notes, for each data record, the layout in
//!    effect at that point. Local types may be rebound mid-file, so the
//!    binding is captured per record rather than as one final mapping.
//! 2. [`decode_messages`] reads the field values of each indexed data
//!    record against its layout, keeping only the message types the
//!    caller asks for and counting the rest as skipped.

use super::crc;
use super::profile::{self, field};
use crate::decoders::DecodeError;
use crate::models::FileType;

const MIN_HEADER_SIZE: usize = 12;
const SIGNATURE: &[u8; 4] = b".FIT";
const LOCAL_TYPES: usize = 16;

const HEADER_COMPRESSED_TIMESTAMP: u8 = 0x80;
const HEADER_DEFINITION: u8 = 0x40;
const HEADER_DEVELOPER_DATA: u8 = 0x20;

fn malformed(reason: impl Into<String>) -> DecodeError {
    DecodeError::malformed(FileType::Fit, reason)
}

/// Parsed file header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FileHeader {
    pub header_size: usize,
    pub protocol_version: u8,
    pub profile_version: u16,
    pub data_size: usize,
}

impl FileHeader {
    fn data_range(&self) -> std::ops::Range<usize> {
        self.header_size..self.header_size + self.data_size
    }
}

/// Validate signature, header and CRCs; return the header and the record
/// region. The signature is checked before anything else so that foreign
/// files are reported as unsupported rather than corrupt.
pub fn read_header(bytes: &[u8]) -> Result<(FileHeader, &[u8]), DecodeError> {
    if bytes.len() < MIN_HEADER_SIZE || &bytes[8..12] != SIGNATURE {
        return Err(DecodeError::not_supported(
            FileType::Fit,
            "missing .FIT signature",
        ));
    }

    let header_size = bytes[0] as usize;
    if header_size < MIN_HEADER_SIZE || bytes.len() < header_size {
        return Err(malformed(format!("invalid header size {}", header_size)));
    }

    if header_size >= 14 {
        let stored = u16::from_le_bytes([bytes[12], bytes[13]]);
        // Zero means the writer did not compute a header CRC.
        if stored != 0 && stored != crc::compute(&bytes[..12]) {
            return Err(malformed("header CRC mismatch"));
        }
    }

    let header = FileHeader {
        header_size,
        protocol_version: bytes[1],
        profile_version: u16::from_le_bytes([bytes[2], bytes[3]]),
        data_size: u32::from_le_bytes([bytes[4], bytes[5], bytes[6], bytes[7]]) as usize,
    };

    let range = header.data_range();
    if bytes.len() < range.end + 2 {
        return Err(malformed(format!(
            "truncated: header declares {} data bytes but only {} present",
            header.data_size,
            bytes.len().saturating_sub(header_size + 2)
        )));
    }

    let stored = u16::from_le_bytes([bytes[range.end], bytes[range.end + 1]]);
    if stored != crc::compute(&bytes[..range.end]) {
        return Err(malformed("file CRC mismatch"));
    }

    Ok((header, &bytes[range]))
}

/// One field in a definition record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FieldDef {
    pub number: u8,
    pub size: u8,
    pub base_type: u8,
}

/// Field layout bound to a local message type by a definition record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Layout {
    pub global: u16,
    pub big_endian: bool,
    pub fields: Vec<FieldDef>,
    /// Total size of developer fields, which are skipped
    pub developer_bytes: usize,
}

impl Layout {
    pub fn record_size(&self) -> usize {
        self.fields.iter().map(|f| f.size as usize).sum::<usize>() + self.developer_bytes
    }
}

/// A data record located by pass 1.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Frame {
    /// Index into the layout table
    pub layout: usize,
    /// Offset of the field bytes within the record region
    pub offset: usize,
    /// Low five bits of the timestamp, for compressed-timestamp headers
    pub time_offset: Option<u8>,
}

/// Output of pass 1.
#[derive(Debug, Default)]
pub struct RecordIndex {
    pub layouts: Vec<Layout>,
    pub frames: Vec<Frame>,
}

/// Pass 1: build the layout table and locate every data record.
pub fn index_records(data: &[u8]) -> Result<RecordIndex, DecodeError> {
    let mut index = RecordIndex::default();
    let mut bound: [Option<usize>; LOCAL_TYPES] = [None; LOCAL_TYPES];
    let mut pos = 0;

    while pos < data.len() {
        let header = data[pos];
        pos += 1;

        if header & HEADER_COMPRESSED_TIMESTAMP != 0 {
            let local = ((header >> 5) & 0x03) as usize;
            pos = push_frame(&mut index, &bound, data, pos, local, Some(header & 0x1F))?;
        } else if header & HEADER_DEFINITION != 0 {
            let local = (header & 0x0F) as usize;
            let has_developer = header & HEADER_DEVELOPER_DATA != 0;
            let (layout, next) = read_definition(data, pos, has_developer)?;
            index.layouts.push(layout);
            bound[local] = Some(index.layouts.len() - 1);
            pos = next;
        } else {
            let local = (header & 0x0F) as usize;
            pos = push_frame(&mut index, &bound, data, pos, local, None)?;
        }
    }

    Ok(index)
}

fn push_frame(
    index: &mut RecordIndex,
    bound: &[Option<usize>; LOCAL_TYPES],
    data: &[u8],
    pos: usize,
    local: usize,
    time_offset: Option<u8>,
) -> Result<usize, DecodeError> {
    let layout = bound[local].ok_or_else(|| {
        malformed(format!(
            "data record references undefined local message type {}",
            local
        ))
    })?;
    let end = pos + index.layouts[layout].record_size();
    if end > data.len() {
        return Err(malformed("data record extends past end of file"));
    }
    index.frames.push(Frame {
        layout,
        offset: pos,
        time_offset,
    });
    Ok(end)
}

fn read_definition(
    data: &[u8],
    pos: usize,
    has_developer: bool,
) -> Result<(Layout, usize), DecodeError> {
    let truncated = || malformed("definition record extends past end of file");

    // reserved, architecture, global message number (2), field count
    let fixed = data.get(pos..pos + 5).ok_or_else(truncated)?;
    let big_endian = match fixed[1] {
        0 => false,
        1 => true,
        other => return Err(malformed(format!("unknown architecture {}", other))),
    };
    let global = if big_endian {
        u16::from_be_bytes([fixed[2], fixed[3]])
    } else {
        u16::from_le_bytes([fixed[2], fixed[3]])
    };
    let field_count = fixed[4] as usize;
    let mut pos = pos + 5;

    let raw = data.get(pos..pos + field_count * 3).ok_or_else(truncated)?;
    let fields = raw
        .chunks_exact(3)
        .map(|f| FieldDef {
            number: f[0],
            size: f[1],
            base_type: f[2],
        })
        .collect();
    pos += field_count * 3;

    let mut developer_bytes = 0;
    if has_developer {
        let count = *data.get(pos).ok_or_else(truncated)? as usize;
        pos += 1;
        let raw = data.get(pos..pos + count * 3).ok_or_else(truncated)?;
        developer_bytes = raw.chunks_exact(3).map(|f| f[1] as usize).sum();
        pos += count * 3;
    }

    Ok((
        Layout {
            global,
            big_endian,
            fields,
            developer_bytes,
        },
        pos,
    ))
}

/// A decoded field value. Invalid (sentinel) values are dropped.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Unsigned(u64),
    Signed(i64),
    Float(f64),
    Text(String),
}

/// A data message with its resolved field values.
#[derive(Debug, Clone, PartialEq)]
pub struct Message {
    pub global: u16,
    /// Seconds since the FIT epoch, explicit or reconstructed from a
    /// compressed-timestamp header
    pub timestamp: Option<u32>,
    fields: Vec<(u8, Value)>,
}

impl Message {
    pub fn value(&self, number: u8) -> Option<&Value> {
        self.fields
            .iter()
            .find(|(n, _)| *n == number)
            .map(|(_, v)| v)
    }

    pub fn unsigned(&self, number: u8) -> Option<u64> {
        match self.value(number)? {
            Value::Unsigned(v) => Some(*v),
            Value::Signed(v) => u64::try_from(*v).ok(),
            Value::Float(v) if *v >= 0.0 => Some(*v as u64),
            _ => None,
        }
    }
}

/// Pass 2 output.
#[derive(Debug, Default)]
pub struct Decoded {
    pub messages: Vec<Message>,
    pub skipped: usize,
}

/// Pass 2: read the field values of every indexed data record whose
/// global message number is in `wanted`.
pub fn decode_messages(data: &[u8], index: &RecordIndex, wanted: &[u16]) -> Decoded {
    let mut decoded = Decoded::default();
    let mut last_timestamp: Option<u32> = None;

    for frame in &index.frames {
        let layout = &index.layouts[frame.layout];
        let mut pos = frame.offset;
        let mut fields = Vec::with_capacity(layout.fields.len());

        for def in &layout.fields {
            let raw = &data[pos..pos + def.size as usize];
            pos += def.size as usize;
            if let Some(value) = read_value(raw, def.base_type, layout.big_endian) {
                fields.push((def.number, value));
            }
        }

        let explicit = fields.iter().find_map(|(n, v)| match (n, v) {
            (&field::TIMESTAMP, Value::Unsigned(ts)) => u32::try_from(*ts).ok(),
            _ => None,
        });
        let timestamp = match (explicit, frame.time_offset, last_timestamp) {
            (Some(ts), _, _) => Some(ts),
            (None, Some(offset), Some(last)) => Some(expand_timestamp(last, offset)),
            _ => None,
        };
        if timestamp.is_some() {
            last_timestamp = timestamp;
        }

        if wanted.contains(&layout.global) {
            decoded.messages.push(Message {
                global: layout.global,
                timestamp,
                fields,
            });
        } else {
            decoded.skipped += 1;
        }
    }

    decoded
}

/// Rebuild a full timestamp from a 5-bit offset and the last full one.
/// FIT timestamps are 32-bit and roll over.
fn expand_timestamp(last: u32, offset: u8) -> u32 {
    let offset = offset as u32;
    let base = last & !0x1F;
    if offset >= (last & 0x1F) {
        base.wrapping_add(offset)
    } else {
        base.wrapping_add(offset).wrapping_add(0x20)
    }
}

/// Read the first element of a field. Arrays yield their first element;
/// sentinel "invalid" values yield `None`.
fn read_value(raw: &[u8], base_type: u8, big_endian: bool) -> Option<Value> {
    let kind = base_type & 0x1F;
    if kind == 7 {
        let end = raw.iter().position(|&b| b == 0).unwrap_or(raw.len());
        let text = String::from_utf8_lossy(&raw[..end]).trim().to_string();
        return (!text.is_empty()).then_some(Value::Text(text));
    }

    let size = profile::base_type_size(base_type)?;
    let element = raw.get(..size)?;
    let mut buf = [0u8; 8];
    if big_endian {
        buf[8 - size..].copy_from_slice(element);
        buf.reverse();
    } else {
        buf[..size].copy_from_slice(element);
    }
    let bits = u64::from_le_bytes(buf);

    match kind {
        // enum, uint8, uint16, uint32, uint64
        0 | 2 | 4 | 6 | 15 => {
            let invalid = if size == 8 { u64::MAX } else { (1u64 << (size * 8)) - 1 };
            (bits != invalid).then_some(Value::Unsigned(bits))
        }
        // uint8z, uint16z, uint32z, uint64z
        10 | 11 | 12 | 16 => (bits != 0).then_some(Value::Unsigned(bits)),
        // sint8, sint16, sint32, sint64
        1 | 3 | 5 | 14 => {
            let shift = 64 - size * 8;
            let value = ((bits << shift) as i64) >> shift;
            let invalid = (1i64 << (size * 8 - 1)).wrapping_sub(1);
            (value != invalid).then_some(Value::Signed(value))
        }
        8 => {
            let v = f32::from_bits(bits as u32);
            (bits as u32 != u32::MAX && v.is_finite()).then_some(Value::Float(v as f64))
        }
        9 => {
            let v = f64::from_bits(bits);
            (bits != u64::MAX && v.is_finite()).then_some(Value::Float(v))
        }
        _ => None,
    }
}
