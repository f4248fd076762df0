//! `__properties_version1.0` decoding.
//! https://learn.microsoft.com/en-us/openspecs/exchange_server_protocols/ms-oxmsg/20c1125f-043d-42d9-b1dc-cb9b7e5198ef

use chrono::{DateTime, Utc};
use log::{debug, warn};
use packed_struct::prelude::*;
use serde::Serialize;

use crate::constants;
use crate::error::OleError;
use crate::property::{tags, PropertyBag, PropertyValue};

/// Root-level header: 8 reserved bytes, four counters, 8 reserved bytes.
#[derive(PackedStruct, Clone, Copy, Debug, PartialEq)]
#[packed_struct(endian = "lsb")]
pub struct TopLevelPropertyHeader {
    pub reserved: [u8; 8],
    pub next_recipient_id: u32,
    pub next_attachment_id: u32,
    pub recipient_count: u32,
    pub attachment_count: u32,
    pub reserved_tail: [u8; 8],
}

#[derive(PackedStruct, Clone, Copy, Debug, PartialEq)]
#[packed_struct(endian = "lsb")]
pub struct RawPropertyRecord {
    pub property_type: u16,
    pub property_tag: u16,
    pub flags: u32,
    pub value: [u8; 8],
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PropertyStreamKind {
    /// directly under the root storage, 32-byte header
    TopLevel,
    /// inside an attachment or recipient storage, 8-byte header
    SubObject,
}

impl PropertyStreamKind {
    fn header_length(self) -> usize {
        match self {
            PropertyStreamKind::TopLevel => constants::TOP_LEVEL_PROPERTY_HEADER_LENGTH,
            PropertyStreamKind::SubObject => constants::SUB_OBJECT_PROPERTY_HEADER_LENGTH,
        }
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize)]
pub struct PropertyCounters {
    pub next_recipient_id: u32,
    pub next_attachment_id: u32,
    pub recipient_count: u32,
    pub attachment_count: u32,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize)]
pub struct PropertyFlags {
    pub mandatory: bool,
    pub readable: bool,
    pub writable: bool,
}

impl From<u32> for PropertyFlags {
    fn from(bits: u32) -> Self {
        Self {
            mandatory: bits & constants::PROPERTY_FLAG_MANDATORY != 0,
            readable: bits & constants::PROPERTY_FLAG_READABLE != 0,
            writable: bits & constants::PROPERTY_FLAG_WRITABLE != 0,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(untagged)]
pub enum FixedValue {
    Int16(i16),
    Int32(i32),
    Int64(i64),
    Bool(bool),
    Time(DateTime<Utc>),
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct FixedPropertyRecord {
    pub property_type: u16,
    pub tag: u16,
    pub flags: PropertyFlags,
    pub raw: [u8; 8],
    /// `None` for types whose value lives in a separate stream
    pub value: Option<FixedValue>,
}

impl FixedPropertyRecord {
    fn from_raw(raw: RawPropertyRecord) -> Self {
        Self {
            property_type: raw.property_type,
            tag: raw.property_tag,
            flags: PropertyFlags::from(raw.flags),
            raw: raw.value,
            value: decode_fixed_value(raw.property_type, raw.value),
        }
    }

    /// The canonical name, or `_<type>` in lowercase hex when the tag is unknown.
    pub fn key(&self) -> String {
        match tags::lookup_id(self.tag) {
            Some(name) => name.to_string(),
            None => format!("_{:04x}", self.property_type),
        }
    }
}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct PropertyStream {
    /// only present for the root stream
    pub counters: Option<PropertyCounters>,
    pub records: Vec<FixedPropertyRecord>,
}

impl PropertyStream {
    /// Keyed by [`FixedPropertyRecord::key`]; repeated keys get `-2`, `-3` suffixes.
    pub fn to_bag(&self) -> PropertyBag {
        let mut bag = PropertyBag::new();
        for record in &self.records {
            bag.insert_unique(&record.key(), PropertyValue::Fixed(record.clone()));
        }
        bag
    }
}

/// FILETIME ticks (100ns since 1601-01-01) to Unix milliseconds.
pub fn filetime_to_unix_millis(ticks: u64) -> i64 {
    ((ticks as i128 - constants::FILETIME_UNIX_EPOCH_TICKS)
        / constants::FILETIME_TICKS_PER_MILLISECOND) as i64
}

fn decode_fixed_value(property_type: u16, value: [u8; 8]) -> Option<FixedValue> {
    match property_type {
        constants::PROPERTY_TYPE_TIME => {
            let low = u32::from_le_bytes([value[0], value[1], value[2], value[3]]) as u64;
            let high = u32::from_le_bytes([value[4], value[5], value[6], value[7]]) as u64;
            let millis = filetime_to_unix_millis((high << 32) | low);
            DateTime::<Utc>::from_timestamp_millis(millis).map(FixedValue::Time)
        }
        constants::PROPERTY_TYPE_INT16 => {
            Some(FixedValue::Int16(i16::from_le_bytes([value[0], value[1]])))
        }
        constants::PROPERTY_TYPE_INT32 => Some(FixedValue::Int32(i32::from_le_bytes([
            value[0], value[1], value[2], value[3],
        ]))),
        constants::PROPERTY_TYPE_INT64 => Some(FixedValue::Int64(i64::from_le_bytes(value))),
        constants::PROPERTY_TYPE_BOOLEAN => Some(FixedValue::Bool(u64::from_le_bytes(value) != 0)),
        _ => None,
    }
}

/// Decodes a property stream. Non-zero leading reserved bytes abort the parse.
pub fn decode_property_stream(
    data: &[u8],
    kind: PropertyStreamKind,
) -> Result<PropertyStream, OleError> {
    let reserved_length = constants::SUB_OBJECT_PROPERTY_HEADER_LENGTH.min(data.len());
    let reserved = &data[..reserved_length];
    if reserved.iter().any(|byte| *byte != 0) {
        return Err(OleError::InvalidPropertyStream(format!(
            "non-zero reserved bytes {:x?}",
            reserved
        )));
    }

    let header_length = kind.header_length();
    if data.len() < header_length {
        warn!(
            "[msg] property stream is {} bytes, shorter than its {} byte header",
            data.len(),
            header_length
        );
        return Ok(PropertyStream::default());
    }

    let counters = match kind {
        PropertyStreamKind::TopLevel => {
            let header = TopLevelPropertyHeader::unpack_from_slice(&data[..header_length])?;
            if header.reserved_tail != [0u8; 8] {
                debug!("[msg] property stream header has non-zero trailing reserved bytes");
            }
            Some(PropertyCounters {
                next_recipient_id: header.next_recipient_id,
                next_attachment_id: header.next_attachment_id,
                recipient_count: header.recipient_count,
                attachment_count: header.attachment_count,
            })
        }
        PropertyStreamKind::SubObject => None,
    };

    let body = &data[header_length..];
    if body.len() % constants::PROPERTY_RECORD_LENGTH != 0 {
        debug!(
            "[msg] ignoring {} trailing bytes in property stream",
            body.len() % constants::PROPERTY_RECORD_LENGTH
        );
    }
    let mut records = Vec::with_capacity(body.len() / constants::PROPERTY_RECORD_LENGTH);
    for chunk in body.chunks_exact(constants::PROPERTY_RECORD_LENGTH) {
        let raw = RawPropertyRecord::unpack_from_slice(chunk)?;
        records.push(FixedPropertyRecord::from_raw(raw));
    }

    Ok(PropertyStream { counters, records })
}
