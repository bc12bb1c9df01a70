//! Serial port transport and std timing for the driver.

use std::io::{Read, Write};
use std::thread;
use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use e22_lora::{Clock, Transport, TransportError};
use embedded_hal::delay::DelayNs;
use serialport::{ClearBuffer, DataBits, Parity, SerialPort, StopBits};

/// Once some bytes have arrived, a gap this long ends the read
const IDLE_GAP: Duration = Duration::from_millis(50);

/// USB-serial link to the module, 8N1.
pub struct SerialTransport {
    port: Box<dyn SerialPort>,
}

impl SerialTransport {
    pub fn open(port: &str, baud: u32) -> Result<Self> {
        let port = serialport::new(port, baud)
            .data_bits(DataBits::Eight)
            .parity(Parity::None)
            .stop_bits(StopBits::One)
            .timeout(IDLE_GAP)
            .open()
            .with_context(|| format!("failed to open serial port {}", port))?;

        // Drop anything the module sent before we attached
        port.clear(ClearBuffer::All)
            .context("failed to clear serial buffers")?;

        Ok(Self { port })
    }
}

impl Transport for SerialTransport {
    fn write(&mut self, data: &[u8]) -> Result<usize, TransportError> {
        let mut written = 0;
        while written < data.len() {
            match self.port.write(&data[written..]) {
                Ok(0) => break,
                Ok(count) => written += count,
                Err(e) if e.kind() == std::io::ErrorKind::Interrupted => {}
                Err(_) => return Err(TransportError::WriteFailed),
            }
        }
        self.port.flush().map_err(|_| TransportError::WriteFailed)?;
        Ok(written)
    }

    /// Accumulate until the buffer is full, the deadline passes, or the
    /// line goes quiet after the first bytes.
    fn read(&mut self, buf: &mut [u8], timeout_ms: u32) -> Result<usize, TransportError> {
        let deadline = Instant::now() + Duration::from_millis(timeout_ms as u64);
        let mut received = 0;

        while received < buf.len() {
            let now = Instant::now();
            if now >= deadline {
                break;
            }
            let remaining = deadline - now;
            let wait = if received > 0 { IDLE_GAP.min(remaining) } else { remaining };
            self.port
                .set_timeout(wait)
                .map_err(|_| TransportError::ReadFailed)?;

            match self.port.read(&mut buf[received..]) {
                Ok(0) if received > 0 => break,
                Ok(0) => {}
                Ok(count) => received += count,
                Err(e) if e.kind() == std::io::ErrorKind::TimedOut => {
                    if received > 0 {
                        break;
                    }
                }
                Err(e) if e.kind() == std::io::ErrorKind::Interrupted => {}
                Err(_) => return Err(TransportError::ReadFailed),
            }
        }

        Ok(received)
    }

    fn flush(&mut self) -> Result<(), TransportError> {
        self.port
            .clear(ClearBuffer::Input)
            .map_err(|_| TransportError::FlushFailed)
    }
}

/// Blocking delay on the calling thread.
#[derive(Debug, Default, Clone, Copy)]
pub struct StdDelay;

impl DelayNs for StdDelay {
    fn delay_ns(&mut self, ns: u32) {
        thread::sleep(Duration::from_nanos(ns as u64));
    }

    fn delay_ms(&mut self, ms: u32) {
        thread::sleep(Duration::from_millis(ms as u64));
    }
}

/// Milliseconds since the clock was created.
#[derive(Debug, Clone, Copy)]
pub struct StdClock {
    start: Instant,
}

impl StdClock {
    pub fn new() -> Self {
        Self {
            start: Instant::now(),
        }
    }
}

impl Clock for StdClock {
    fn now_ms(&self) -> u64 {
        self.start.elapsed().as_millis() as u64
    }
}
