//! Packet I/O in transfer mode
//!
//! Packets are raw bytes on the link. When per-packet RSSI is enabled the
//! module appends one RSSI byte to every received packet, which is split
//! off here.

use heapless::Vec;

use crate::config::limits::MAX_PACKET_BUFFER;
use crate::device::error::DeviceError;
use crate::device::settings::ModuleKind;
use crate::transport::Transport;

/// A received packet
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Packet {
    pub data: Vec<u8, MAX_PACKET_BUFFER>,
    /// Raw RSSI byte, present when per-packet RSSI capture is enabled
    pub rssi: Option<u8>,
}

impl Packet {
    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// RSSI in dBm using the encoding of `kind`
    pub fn rssi_dbm(&self, kind: ModuleKind) -> Option<i16> {
        self.rssi.map(|raw| kind.rssi_dbm(raw))
    }
}

/// Send one packet of 1..=`max_size` bytes
pub fn write_packet<T: Transport>(
    transport: &mut T,
    data: &[u8],
    max_size: usize,
) -> Result<(), DeviceError> {
    if data.is_empty() || data.len() > max_size {
        return Err(DeviceError::PacketLength {
            length: data.len(),
            max: max_size,
        });
    }

    let written = transport.write(data)?;
    if written != data.len() {
        return Err(DeviceError::ShortWrite {
            written,
            expected: data.len(),
        });
    }
    Ok(())
}

/// Receive one packet of up to `max_size` payload bytes
///
/// Returns `Ok(None)` when nothing arrives within `timeout_ms`, which is
/// the normal idle case.
pub fn read_packet<T: Transport>(
    transport: &mut T,
    max_size: usize,
    timeout_ms: u32,
    rssi_packet: bool,
) -> Result<Option<Packet>, DeviceError> {
    let mut buffer = [0u8; MAX_PACKET_BUFFER];
    // Room for the RSSI suffix only when the module appends one
    let capacity = (max_size + rssi_packet as usize).min(MAX_PACKET_BUFFER);

    let received = transport.read(&mut buffer[..capacity], timeout_ms)?;
    if received == 0 {
        return Ok(None);
    }

    let (payload, rssi) = if rssi_packet {
        (&buffer[..received - 1], Some(buffer[received - 1]))
    } else {
        (&buffer[..received], None)
    };
    // A lone RSSI byte carries no payload
    if payload.is_empty() {
        return Ok(None);
    }

    let mut data = Vec::new();
    // Bounded by MAX_PACKET_BUFFER above
    let _ = data.extend_from_slice(payload);
    Ok(Some(Packet { data, rssi }))
}
