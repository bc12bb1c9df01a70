//! Byte-stream transport trait for abstraction and testability
//!
//! The protocol engine only needs to write bytes, read bytes with a timeout
//! and discard pending input. USB-serial adapters and the UART of the
//! embedded front end both implement this trait, and tests swap in a mock.

use core::fmt;

/// Errors reported by a transport
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransportError {
    /// The underlying link refused the write
    WriteFailed,
    /// The underlying link failed while reading
    ReadFailed,
    /// Pending input could not be discarded
    FlushFailed,
}

impl fmt::Display for TransportError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TransportError::WriteFailed => f.write_str("transport write failed"),
            TransportError::ReadFailed => f.write_str("transport read failed"),
            TransportError::FlushFailed => f.write_str("transport flush failed"),
        }
    }
}

impl core::error::Error for TransportError {}

/// Abstract byte link to the module
///
/// All calls block. There is never more than one request in flight.
pub trait Transport {
    /// Write bytes to the module
    ///
    /// Returns the number of bytes accepted, which may be fewer than
    /// `data.len()` on a congested or failing link.
    fn write(&mut self, data: &[u8]) -> Result<usize, TransportError>;

    /// Read up to `buf.len()` bytes within `timeout_ms`
    ///
    /// Returns `Ok(0)` when nothing arrived before the timeout.
    fn read(&mut self, buf: &mut [u8], timeout_ms: u32) -> Result<usize, TransportError>;

    /// Discard any input the module sent that nobody asked for
    fn flush(&mut self) -> Result<(), TransportError>;
}

impl<T: Transport + ?Sized> Transport for &mut T {
    fn write(&mut self, data: &[u8]) -> Result<usize, TransportError> {
        (**self).write(data)
    }

    fn read(&mut self, buf: &mut [u8], timeout_ms: u32) -> Result<usize, TransportError> {
        (**self).read(buf, timeout_ms)
    }

    fn flush(&mut self) -> Result<(), TransportError> {
        (**self).flush()
    }
}
