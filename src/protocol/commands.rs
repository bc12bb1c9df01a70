//! Fixed command frames understood by E22 modules
//!
//! | Purpose             | Request                 | Response                   |
//! |---------------------|-------------------------|----------------------------|
//! | Read product info   | `C1 80 07`              | `C1 80 07` + 7 bytes       |
//! | Read registers      | `C1 00 09`              | `C1 00 09` + 9 bytes       |
//! | Write registers     | `C0 00 07` + 7 bytes    | `C1 00 07` + 7 bytes echo  |
//! | Mode -> config      | `C0 C1 C2 C3 02 01`     | `C1 C2 C3 02` + 1 byte     |
//! | Mode -> transfer    | `C0 C1 C2 C3 02 00`     | `C1 C2 C3 02` + 1 byte     |
//! | Channel RSSI scan   | `C0 C1 C2 C3 00 01`     | `C1 00 01` + 1 byte        |

use core::fmt;

use crate::config::protocol::{
    HEADER_READ, HEADER_SIZE, HEADER_WRITE, PRODUCT_INFO_ADDR, PRODUCT_INFO_SIZE, REGISTER_ADDR,
    REGISTER_SIZE, REGISTER_WRITE_SIZE,
};

pub const READ_PRODUCT_INFO: [u8; 3] = [HEADER_READ, PRODUCT_INFO_ADDR, PRODUCT_INFO_SIZE as u8];

pub const READ_REGISTERS: [u8; 3] = [HEADER_READ, REGISTER_ADDR, REGISTER_SIZE as u8];

pub const MODE_SWITCH_CONFIG: [u8; 6] = [0xC0, 0xC1, 0xC2, 0xC3, 0x02, 0x01];
pub const MODE_SWITCH_TRANSFER: [u8; 6] = [0xC0, 0xC1, 0xC2, 0xC3, 0x02, 0x00];
pub const MODE_SWITCH_RESPONSE_HEADER: [u8; 4] = [0xC1, 0xC2, 0xC3, 0x02];

/// Reply seen when the module is already in the requested mode
///
/// Observed on USB dongles, not documented by the vendor.
pub const MODE_SWITCH_ALREADY_SENTINEL: [u8; 3] = [0xFF, 0xFF, 0xFF];

pub const CHANNEL_RSSI: [u8; 6] = [0xC0, 0xC1, 0xC2, 0xC3, 0x00, 0x01];
pub const CHANNEL_RSSI_RESPONSE_HEADER: [u8; 3] = [0xC1, 0x00, 0x01];

/// Build the register write frame `C0 00 07` followed by the writable bytes
pub fn write_registers(bytes: &[u8; REGISTER_WRITE_SIZE]) -> [u8; HEADER_SIZE + REGISTER_WRITE_SIZE] {
    let mut command = [0u8; HEADER_SIZE + REGISTER_WRITE_SIZE];
    command[0] = HEADER_WRITE;
    command[1] = REGISTER_ADDR;
    command[2] = REGISTER_WRITE_SIZE as u8;
    command[HEADER_SIZE..].copy_from_slice(bytes);
    command
}

/// Product information reported by the module
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProductInfo {
    pub name: u16,
    pub version: u8,
    /// Maximum transmit power in dBm
    pub max_power: u8,
    /// Frequency family code
    pub frequency: u8,
    pub kind: u8,
    raw: [u8; PRODUCT_INFO_SIZE],
}

impl ProductInfo {
    pub fn from_bytes(bytes: &[u8; PRODUCT_INFO_SIZE]) -> Self {
        Self {
            name: u16::from_be_bytes([bytes[0], bytes[1]]),
            version: bytes[2],
            max_power: bytes[3],
            frequency: bytes[4],
            kind: bytes[5],
            raw: *bytes,
        }
    }

    pub fn raw(&self) -> &[u8; PRODUCT_INFO_SIZE] {
        &self.raw
    }
}

impl fmt::Display for ProductInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "name={:04X}, version={}, maxpower={}, frequency={}, type={} [{}]",
            self.name,
            self.version,
            self.max_power,
            self.frequency,
            self.kind,
            super::framing::HexBytes::new(&self.raw)
        )
    }
}
