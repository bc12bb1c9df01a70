//! Bridge statistics

use core::fmt;

use crate::device::settings::ModuleKind;

/// Smoothing factor 51/256 (about 0.2)
const EMA_ALPHA_NUM: u16 = 51;
const EMA_ALPHA_DENOM: u16 = 256;

/// Exponential moving average of raw RSSI bytes
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Ema {
    value: u8,
    count: u32,
}

impl Ema {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fold in a sample; the first sample seeds the average
    pub fn update(&mut self, sample: u8) {
        if self.count == 0 {
            self.value = sample;
        } else {
            self.value = ((EMA_ALPHA_NUM * sample as u16
                + (EMA_ALPHA_DENOM - EMA_ALPHA_NUM) * self.value as u16)
                / EMA_ALPHA_DENOM) as u8;
        }
        self.count = self.count.saturating_add(1);
    }

    pub fn value(&self) -> u8 {
        self.value
    }

    /// Samples seen so far
    pub fn count(&self) -> u32 {
        self.count
    }
}

/// Packet counters and RSSI averages
#[derive(Debug, Clone, Default)]
pub struct Statistics {
    okay: u32,
    dropped: u32,
    packet_rssi: Option<Ema>,
    channel_rssi: Option<Ema>,
}

impl Statistics {
    /// Track packet and channel RSSI only when they are captured
    pub fn new(packet_rssi: bool, channel_rssi: bool) -> Self {
        Self {
            okay: 0,
            dropped: 0,
            packet_rssi: packet_rssi.then(Ema::new),
            channel_rssi: channel_rssi.then(Ema::new),
        }
    }

    pub fn packet_okay(&mut self) {
        self.okay = self.okay.saturating_add(1);
    }

    pub fn packet_dropped(&mut self) {
        self.dropped = self.dropped.saturating_add(1);
    }

    pub fn packet_rssi(&mut self, raw: u8) {
        if let Some(ema) = self.packet_rssi.as_mut() {
            ema.update(raw);
        }
    }

    pub fn channel_rssi(&mut self, raw: u8) {
        if let Some(ema) = self.channel_rssi.as_mut() {
            ema.update(raw);
        }
    }

    pub fn okay(&self) -> u32 {
        self.okay
    }

    pub fn dropped(&self) -> u32 {
        self.dropped
    }

    /// Summarise the last `period_ms` and reset the packet counters
    ///
    /// RSSI averages carry over between reports.
    pub fn report(&mut self, period_ms: u64, kind: ModuleKind) -> StatsReport {
        let per_minute = |count: u32| {
            if period_ms == 0 {
                0
            } else {
                (count as u64 * 6_000_000 / period_ms) as u32
            }
        };
        let average = |ema: Option<Ema>| ema.map(|e| (kind.rssi_dbm(e.value()), e.count()));

        let report = StatsReport {
            okay: self.okay,
            okay_rate_x100: per_minute(self.okay),
            dropped: self.dropped,
            dropped_rate_x100: per_minute(self.dropped),
            channel_rssi: average(self.channel_rssi),
            packet_rssi: average(self.packet_rssi),
        };
        self.okay = 0;
        self.dropped = 0;
        report
    }
}

/// One statistics line
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StatsReport {
    pub okay: u32,
    /// Packets per minute, times 100
    pub okay_rate_x100: u32,
    pub dropped: u32,
    pub dropped_rate_x100: u32,
    /// Average dBm and sample count
    pub channel_rssi: Option<(i16, u32)>,
    pub packet_rssi: Option<(i16, u32)>,
}

impl fmt::Display for StatsReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "packets-okay={} ({}.{:02}/min), packets-drop={} ({}.{:02}/min)",
            self.okay,
            self.okay_rate_x100 / 100,
            self.okay_rate_x100 % 100,
            self.dropped,
            self.dropped_rate_x100 / 100,
            self.dropped_rate_x100 % 100
        )?;
        if let Some((dbm, count)) = self.channel_rssi {
            write!(f, ", channel-rssi={} dBm ({})", dbm, count)?;
        }
        if let Some((dbm, count)) = self.packet_rssi {
            write!(f, ", packet-rssi={} dBm ({})", dbm, count)?;
        }
        Ok(())
    }
}
