//! Errors raised by device operations
//!
//! Every failure is terminal for the operation that raised it. Nothing in
//! the driver retries; callers decide whether to tear the session down.

use core::fmt;

use crate::transport::TransportError;

/// Coarse classification of a [`DeviceError`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// The link accepted or delivered fewer bytes than required
    Transport,
    /// The module answered with the wrong header or length
    Protocol,
    /// Written register bytes did not read back identically
    Verification,
    /// AUX never signalled ready
    ReadyTimeout,
    /// The caller supplied a configuration or payload the module cannot take
    ConfigInvalid,
}

/// Rejected configuration values
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigError {
    /// Packet size not one of 32, 64, 128 or 240
    PacketSize(u8),
    /// Air data rate code above 62 (62.5 kbps) or unknown
    PacketRate(u8),
    /// Transmit power class above 3
    TransmitPower(u8),
    /// WOR cycle outside 500..=4000 ms or not a multiple of 500 ms
    WorCycle(u16),
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::PacketSize(size) => write!(f, "invalid packet size {}", size),
            ConfigError::PacketRate(rate) => write!(f, "invalid packet rate {}", rate),
            ConfigError::TransmitPower(power) => write!(f, "invalid transmit power {}", power),
            ConfigError::WorCycle(cycle) => write!(f, "invalid wor cycle {}ms", cycle),
        }
    }
}

/// Which side of a pin mode switch timed out
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReadyStage {
    PreSwitch,
    PostSwitch,
}

impl fmt::Display for ReadyStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ReadyStage::PreSwitch => f.write_str("pre switch"),
            ReadyStage::PostSwitch => f.write_str("post switch"),
        }
    }
}

/// Up to four header bytes as seen on the wire, printed in hex
#[derive(Clone, Copy, PartialEq, Eq)]
pub struct HeaderBytes {
    bytes: [u8; 4],
    len: u8,
}

impl HeaderBytes {
    pub fn new(data: &[u8]) -> Self {
        let len = data.len().min(4);
        let mut bytes = [0u8; 4];
        bytes[..len].copy_from_slice(&data[..len]);
        Self {
            bytes,
            len: len as u8,
        }
    }

    pub fn as_slice(&self) -> &[u8] {
        &self.bytes[..self.len as usize]
    }
}

impl fmt::Debug for HeaderBytes {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self)
    }
}

impl fmt::Display for HeaderBytes {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, byte) in self.as_slice().iter().enumerate() {
            if i > 0 {
                f.write_str(" ")?;
            }
            write!(f, "{:02X}", byte)?;
        }
        Ok(())
    }
}

/// Errors that can occur during device operations
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeviceError {
    /// The transport itself failed
    Transport(TransportError),
    /// The transport accepted only part of a frame
    ShortWrite { written: usize, expected: usize },
    /// A mode pin could not be driven or sampled
    PinFailed,
    /// Command shorter than the three byte header
    CommandTooShort { length: usize },
    /// Caller's response capacity is below the length the command asks for
    ResponseCapacity { capacity: usize, required: usize },
    /// Fewer response bytes arrived than the command asked for
    ResponseTooShort { received: usize, expected: usize },
    /// Response header does not mirror the request
    HeaderMismatch { received: HeaderBytes },
    /// Echoed or re-read register byte differs from the byte written
    VerificationMismatch { offset: usize, expected: u8, actual: u8 },
    /// AUX stayed low for the whole ready timeout
    ReadyTimeout { stage: ReadyStage },
    /// Configuration rejected before touching the module
    ConfigInvalid(ConfigError),
    /// Packet empty or larger than the configured maximum
    PacketLength { length: usize, max: usize },
}

impl DeviceError {
    /// Classify this error
    pub fn kind(&self) -> ErrorKind {
        match self {
            DeviceError::Transport(_) | DeviceError::ShortWrite { .. } | DeviceError::PinFailed => {
                ErrorKind::Transport
            }
            DeviceError::CommandTooShort { .. }
            | DeviceError::ResponseCapacity { .. }
            | DeviceError::ResponseTooShort { .. }
            | DeviceError::HeaderMismatch { .. } => ErrorKind::Protocol,
            DeviceError::VerificationMismatch { .. } => ErrorKind::Verification,
            DeviceError::ReadyTimeout { .. } => ErrorKind::ReadyTimeout,
            DeviceError::ConfigInvalid(_) | DeviceError::PacketLength { .. } => {
                ErrorKind::ConfigInvalid
            }
        }
    }
}

impl From<TransportError> for DeviceError {
    fn from(error: TransportError) -> Self {
        DeviceError::Transport(error)
    }
}

impl From<ConfigError> for DeviceError {
    fn from(error: ConfigError) -> Self {
        DeviceError::ConfigInvalid(error)
    }
}

impl fmt::Display for DeviceError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DeviceError::Transport(error) => write!(f, "{}", error),
            DeviceError::ShortWrite { written, expected } => {
                write!(f, "wrote {} bytes, expected {} bytes", written, expected)
            }
            DeviceError::PinFailed => f.write_str("mode pin access failed"),
            DeviceError::CommandTooShort { length } => {
                write!(f, "command of {} bytes has no complete header", length)
            }
            DeviceError::ResponseCapacity { capacity, required } => {
                write!(f, "response capacity {} below required {}", capacity, required)
            }
            DeviceError::ResponseTooShort { received, expected } => {
                write!(f, "received {} bytes, expected {} bytes", received, expected)
            }
            DeviceError::HeaderMismatch { received } => {
                write!(f, "invalid response header: {}", received)
            }
            DeviceError::VerificationMismatch {
                offset,
                expected,
                actual,
            } => write!(
                f,
                "verification failed at {}: {:02X} != {:02X}",
                offset, actual, expected
            ),
            DeviceError::ReadyTimeout { stage } => write!(f, "wait_ready timeout ({})", stage),
            DeviceError::ConfigInvalid(error) => write!(f, "{}", error),
            DeviceError::PacketLength { length, max } => {
                write!(f, "packet of {} bytes outside 1..={}", length, max)
            }
        }
    }
}

impl core::error::Error for DeviceError {}
