//! Line publisher for piping into a message bus client.

use std::io::{self, Write};

use e22_lora::bridge::Publisher;

/// Writes one `<topic> <payload>` line per message.
///
/// Payloads are printed as UTF-8, with invalid sequences replaced.
pub struct LinePublisher<W> {
    out: W,
}

impl<W: Write> LinePublisher<W> {
    pub fn new(out: W) -> Self {
        Self { out }
    }
}

impl LinePublisher<io::Stdout> {
    pub fn stdout() -> Self {
        Self::new(io::stdout())
    }
}

impl<W: Write> Publisher for LinePublisher<W> {
    type Error = io::Error;

    fn publish(&mut self, topic: &str, payload: &[u8]) -> Result<(), Self::Error> {
        writeln!(self.out, "{} {}", topic, String::from_utf8_lossy(payload))?;
        self.out.flush()
    }
}
