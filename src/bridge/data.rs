//! Payload classification and conversion

use core::fmt;
use core::str::FromStr;

use heapless::Vec;

use crate::config::limits::MAX_PACKET_SIZE;

/// Room for a packet converted to `["<hex>"]`, RSSI byte included
pub const CONVERTED_BUFFER_SIZE: usize = MAX_PACKET_SIZE * 2 + 4;

const HEX_DIGITS: &[u8; 16] = b"0123456789abcdef";

/// How the bridge treats packet payloads
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DataType {
    /// Forward JSON, drop everything else
    Json,
    /// Forward JSON, wrap anything else as a JSON hex string
    #[default]
    JsonConvert,
    /// Forward everything untouched
    Any,
}

/// Unrecognised data type name
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UnknownDataType;

impl fmt::Display for UnknownDataType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("unknown data type, expected json, json-convert or any")
    }
}

impl core::error::Error for UnknownDataType {}

impl FromStr for DataType {
    type Err = UnknownDataType;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "json" => Ok(DataType::Json),
            "json-convert" => Ok(DataType::JsonConvert),
            "any" => Ok(DataType::Any),
            _ => Err(UnknownDataType),
        }
    }
}

impl fmt::Display for DataType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DataType::Json => f.write_str("json"),
            DataType::JsonConvert => f.write_str("json-convert"),
            DataType::Any => f.write_str("any"),
        }
    }
}

/// Cheap check that a payload looks like a JSON object or array
///
/// At least two bytes, bracketed by `{`/`[` and `}`/`]`, every byte
/// printable ASCII. The content itself is not parsed.
pub fn is_reasonable_json(data: &[u8]) -> bool {
    let (Some(first), Some(last)) = (data.first(), data.last()) else {
        return false;
    };
    if data.len() < 2 {
        return false;
    }
    if !matches!(first, b'{' | b'[') || !matches!(last, b'}' | b']') {
        return false;
    }
    data.iter().all(|b| (0x20..=0x7E).contains(b))
}

/// Wrap a payload as `["<lowercase hex>"]`
///
/// Returns `None` when the result would not fit the conversion buffer.
pub fn json_convert(data: &[u8]) -> Option<Vec<u8, CONVERTED_BUFFER_SIZE>> {
    let size = 4 + data.len() * 2;
    if size > CONVERTED_BUFFER_SIZE {
        return None;
    }

    let mut out = Vec::new();
    out.extend_from_slice(b"[\"").ok()?;
    for byte in data {
        out.push(HEX_DIGITS[(byte >> 4) as usize]).ok()?;
        out.push(HEX_DIGITS[(byte & 0x0F) as usize]).ok()?;
    }
    out.extend_from_slice(b"\"]").ok()?;
    Some(out)
}
