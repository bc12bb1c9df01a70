//! Command framer for the E22 configuration protocol
//!
//! Requests are `[C0|C1][addr][length][payload...]`. Responses mirror the
//! request header as `[C1][addr][length][payload...]`. A response whose
//! header does not echo the request is a protocol error and is never
//! retried.

use core::fmt;

use embedded_hal::delay::DelayNs;
use heapless::Vec;
use log::{debug, error};

use crate::config::protocol::{
    HEADER_LENGTH_OFFSET, HEADER_READ, HEADER_SIZE, MAX_RESPONSE_PAYLOAD, MAX_RESPONSE_SIZE,
};
use crate::config::timing::COMMAND_DELAY_MS;
use crate::device::error::{DeviceError, HeaderBytes};
use crate::transport::Transport;

/// Received frames are traced up to this many bytes
const TRACE_RECEIVE_MAX: usize = 32;

/// Payload returned by [`CommandFramer::send_and_receive`]
pub type ResponsePayload = Vec<u8, MAX_RESPONSE_PAYLOAD>;

/// Hex rendering of a byte slice, `C1 00 09`, optionally truncated with `...`
pub struct HexBytes<'a> {
    bytes: &'a [u8],
    max: Option<usize>,
}

impl<'a> HexBytes<'a> {
    pub fn new(bytes: &'a [u8]) -> Self {
        Self { bytes, max: None }
    }

    pub fn truncated(bytes: &'a [u8], max: usize) -> Self {
        Self {
            bytes,
            max: Some(max),
        }
    }
}

impl fmt::Display for HexBytes<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let shown = match self.max {
            Some(max) => self.bytes.len().min(max),
            None => self.bytes.len(),
        };
        for (i, byte) in self.bytes[..shown].iter().enumerate() {
            if i > 0 {
                f.write_str(" ")?;
            }
            write!(f, "{:02X}", byte)?;
        }
        if shown < self.bytes.len() {
            f.write_str(" ...")?;
        }
        Ok(())
    }
}

/// Sends command frames and validates the module's responses
///
/// Owns the transport and the delay source for the lifetime of a session.
pub struct CommandFramer<T, D> {
    transport: T,
    delay: D,
    timeout_ms: u32,
    debug: bool,
}

impl<T, D> CommandFramer<T, D>
where
    T: Transport,
    D: DelayNs,
{
    /// Create a framer reading responses within `timeout_ms`
    pub fn new(transport: T, delay: D, timeout_ms: u32, debug: bool) -> Self {
        Self {
            transport,
            delay,
            timeout_ms,
            debug,
        }
    }

    /// Command response timeout in milliseconds
    pub fn timeout_ms(&self) -> u32 {
        self.timeout_ms
    }

    pub fn transport_mut(&mut self) -> &mut T {
        &mut self.transport
    }

    pub fn delay_mut(&mut self) -> &mut D {
        &mut self.delay
    }

    /// Give back the transport and delay
    pub fn release(self) -> (T, D) {
        (self.transport, self.delay)
    }

    /// Discard pending input
    pub fn flush(&mut self) -> Result<(), DeviceError> {
        self.transport.flush()?;
        Ok(())
    }

    /// Write a command frame verbatim
    ///
    /// Waits the module's command processing delay first. Fails unless the
    /// transport accepts every byte.
    pub fn send_command(&mut self, command: &[u8]) -> Result<(), DeviceError> {
        self.delay.delay_ms(COMMAND_DELAY_MS);

        if self.debug {
            debug!(
                "command: send: ({} bytes): {}",
                command.len(),
                HexBytes::new(command)
            );
        }

        let written = self.transport.write(command)?;
        if written != command.len() {
            return Err(DeviceError::ShortWrite {
                written,
                expected: command.len(),
            });
        }
        Ok(())
    }

    /// Read a response into `buf` within the command timeout
    ///
    /// Returns the number of bytes received, which may be short.
    pub fn receive(&mut self, buf: &mut [u8]) -> Result<usize, DeviceError> {
        let received = self.transport.read(buf, self.timeout_ms)?;

        if self.debug && received > 0 {
            debug!(
                "command: recv: ({} bytes): {}",
                received,
                HexBytes::truncated(&buf[..received], TRACE_RECEIVE_MAX)
            );
        }

        Ok(received)
    }

    /// Send a command and return the payload of its mirrored response
    ///
    /// `response_capacity` is the room the caller has for the payload and
    /// must cover the length byte in `command[2]`. Exactly
    /// `3 + command[2]` bytes are read.
    pub fn send_and_receive(
        &mut self,
        name: &str,
        command: &[u8],
        response_capacity: usize,
    ) -> Result<ResponsePayload, DeviceError> {
        if command.len() < HEADER_SIZE {
            return Err(DeviceError::CommandTooShort {
                length: command.len(),
            });
        }
        let payload_len = command[HEADER_LENGTH_OFFSET] as usize;
        if response_capacity < payload_len {
            return Err(DeviceError::ResponseCapacity {
                capacity: response_capacity,
                required: payload_len,
            });
        }
        let expected = HEADER_SIZE + payload_len;
        if expected > MAX_RESPONSE_SIZE {
            return Err(DeviceError::ResponseCapacity {
                capacity: MAX_RESPONSE_PAYLOAD,
                required: payload_len,
            });
        }

        if let Err(e) = self.send_command(command) {
            error!("device: {}: failed to send command: {}", name, e);
            return Err(e);
        }

        let mut buffer = [0u8; MAX_RESPONSE_SIZE];
        let received = self.receive(&mut buffer[..expected])?;
        if received < expected {
            error!(
                "device: {}: failed to read response, received {} bytes, expected {} bytes",
                name, received, expected
            );
            return Err(DeviceError::ResponseTooShort { received, expected });
        }

        if buffer[0] != HEADER_READ || buffer[1] != command[1] || buffer[2] != command[2] {
            let received = HeaderBytes::new(&buffer[..HEADER_SIZE]);
            error!("device: {}: invalid response header: {}", name, received);
            return Err(DeviceError::HeaderMismatch { received });
        }

        let mut payload = Vec::new();
        // Capacity checked above
        let _ = payload.extend_from_slice(&buffer[HEADER_SIZE..expected]);
        Ok(payload)
    }
}
