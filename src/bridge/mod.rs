//! Packet to topic bridge
//!
//! Received packets are checked against the configured [`DataType`],
//! routed to a topic and handed to a [`Publisher`]. The message bus client
//! itself lives outside this crate.

pub mod data;
pub mod route;
pub mod stats;

use core::fmt;
use core::sync::atomic::{AtomicBool, Ordering};

use embedded_hal::delay::DelayNs;
use log::{error, info, warn};

use crate::clock::{Clock, Interval};
use crate::device::mode::ModeControl;
use crate::device::packet::Packet;
use crate::device::session::DeviceSession;
use crate::device::settings::ModuleKind;
use crate::transport::Transport;

pub use data::{is_reasonable_json, json_convert, DataType, UnknownDataType};
pub use route::{RouteError, Router, TopicRoute};
pub use stats::{Ema, Statistics, StatsReport};

/// Publishes payloads to topics on a message bus
pub trait Publisher {
    type Error: fmt::Display;

    fn publish(&mut self, topic: &str, payload: &[u8]) -> Result<(), Self::Error>;
}

impl<P: Publisher + ?Sized> Publisher for &mut P {
    type Error = P::Error;

    fn publish(&mut self, topic: &str, payload: &[u8]) -> Result<(), Self::Error> {
        (**self).publish(topic, payload)
    }
}

/// Bridge behaviour
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BridgeConfig {
    pub data_type: DataType,
    /// Average the RSSI byte of received packets
    pub capture_rssi_packet: bool,
    /// Scan and average channel RSSI
    pub capture_rssi_channel: bool,
    pub interval_stat_ms: u64,
    pub interval_rssi_ms: u64,
}

impl Default for BridgeConfig {
    fn default() -> Self {
        Self {
            data_type: DataType::JsonConvert,
            capture_rssi_packet: true,
            capture_rssi_channel: true,
            interval_stat_ms: 5 * 60 * 1000,
            interval_rssi_ms: 60 * 1000,
        }
    }
}

/// Why a packet was not published
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DropReason {
    NotJson,
    TooLargeToConvert,
    NoRoute,
    PublishFailed,
}

impl fmt::Display for DropReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DropReason::NotJson => f.write_str("non-json packet"),
            DropReason::TooLargeToConvert => f.write_str("packet too large for conversion"),
            DropReason::NoRoute => f.write_str("no topic route match"),
            DropReason::PublishFailed => f.write_str("publish failed"),
        }
    }
}

/// Forwards packets from a device session to a publisher
pub struct Bridge<P> {
    publisher: P,
    router: Router,
    config: BridgeConfig,
    stats: Statistics,
}

impl<P: Publisher> Bridge<P> {
    pub fn new(publisher: P, router: Router, config: BridgeConfig) -> Self {
        Self {
            publisher,
            router,
            stats: Statistics::new(config.capture_rssi_packet, config.capture_rssi_channel),
            config,
        }
    }

    pub fn config(&self) -> &BridgeConfig {
        &self.config
    }

    pub fn stats(&self) -> &Statistics {
        &self.stats
    }

    pub fn publisher(&self) -> &P {
        &self.publisher
    }

    pub fn into_publisher(self) -> P {
        self.publisher
    }

    /// Classify, route and publish one packet
    ///
    /// Every packet ends up counted as okay or dropped.
    pub fn handle_packet(&mut self, packet: &Packet) -> Result<(), DropReason> {
        let result = self.forward(packet);
        match result {
            Ok(()) => self.stats.packet_okay(),
            Err(reason) => {
                warn!(
                    "read-and-publish: discarding packet ({}, size={})",
                    reason,
                    packet.len()
                );
                self.stats.packet_dropped();
            }
        }
        result
    }

    fn forward(&mut self, packet: &Packet) -> Result<(), DropReason> {
        let data_type = self.config.data_type;
        let converted;
        let payload: &[u8] = match data_type {
            DataType::Json if !is_reasonable_json(&packet.data) => {
                return Err(DropReason::NotJson)
            }
            DataType::JsonConvert if !is_reasonable_json(&packet.data) => {
                converted = json_convert(&packet.data).ok_or(DropReason::TooLargeToConvert)?;
                &converted
            }
            _ => &packet.data,
        };

        let topic = self
            .router
            .select(payload, data_type)
            .ok_or(DropReason::NoRoute)?;

        if let Some(rssi) = packet.rssi {
            self.stats.packet_rssi(rssi);
        }

        if let Err(e) = self.publisher.publish(topic, payload) {
            error!("read-and-publish: publish to '{}' failed: {}", topic, e);
            return Err(DropReason::PublishFailed);
        }
        Ok(())
    }

    /// Record a channel RSSI sample
    pub fn handle_channel_rssi(&mut self, raw: u8) {
        self.stats.channel_rssi(raw);
    }

    /// Produce and log a statistics line
    pub fn report(&mut self, period_ms: u64, kind: ModuleKind) -> StatsReport {
        let report = self.stats.report(period_ms, kind);
        info!("{}", report);
        report
    }

    /// Forward packets until `running` is cleared
    pub fn run<T, D, M, C>(
        &mut self,
        session: &mut DeviceSession<T, D, M>,
        running: &AtomicBool,
        clock: &C,
    ) where
        T: Transport,
        D: DelayNs,
        M: ModeControl,
        C: Clock,
    {
        info!(
            "read-and-publish (stat={}s, rssi={}s [packets={}, channel={}], data-type={})",
            self.config.interval_stat_ms / 1000,
            self.config.interval_rssi_ms / 1000,
            if self.config.capture_rssi_packet { 'y' } else { 'n' },
            if self.config.capture_rssi_channel { 'y' } else { 'n' },
            self.config.data_type
        );

        let kind = session.kind();
        let mut stat_interval = Interval::new(self.config.interval_stat_ms);
        let mut rssi_interval = Interval::new(self.config.interval_rssi_ms);

        while running.load(Ordering::Relaxed) {
            match session.packet_read() {
                Ok(Some(packet)) if running.load(Ordering::Relaxed) => {
                    let _ = self.handle_packet(&packet);
                }
                Ok(_) => {}
                Err(e) => error!("read-and-publish: packet_read: {}", e),
            }

            if running.load(Ordering::Relaxed)
                && self.config.capture_rssi_channel
                && rssi_interval.passed(clock.now_ms()).is_some()
            {
                match session.channel_rssi_read() {
                    Ok(raw) if running.load(Ordering::Relaxed) => self.handle_channel_rssi(raw),
                    Ok(_) => {}
                    Err(e) => error!("read-and-publish: channel_rssi_read: {}", e),
                }
            }

            if running.load(Ordering::Relaxed) {
                if let Some(period_ms) = stat_interval.passed(clock.now_ms()) {
                    self.report(period_ms, kind);
                }
            }
        }
    }
}


#[cfg(test)]
mod tests {
    use super::mock::RecordingPublisher;
    use super::*;
    use crate::clock::mock::MockDelay;
    use crate::device::mode::SoftwareModeSwitch;
    use crate::device::settings::DeviceConfig;
    use crate::transport::mock::MockTransport;
    use core::cell::Cell;

    fn packet(data: &[u8], rssi: Option<u8>) -> Packet {
        Packet {
            data: heapless::Vec::from_slice(data).unwrap(),
            rssi,
        }
    }

    fn bridge(data_type: DataType) -> Bridge<RecordingPublisher> {
        let config = BridgeConfig {
            data_type,
            ..BridgeConfig::default()
        };
        Bridge::new(RecordingPublisher::new(), Router::new("e22").unwrap(), config)
    }

    #[test]
    fn test_json_mode_drops_binary() {
        let mut bridge = bridge(DataType::Json);

        assert_eq!(bridge.handle_packet(&packet(b"{\"a\":1}", Some(0xB4))), Ok(()));
        assert_eq!(
            bridge.handle_packet(&packet(&[0x01, 0x02], Some(0xB4))),
            Err(DropReason::NotJson)
        );

        assert_eq!(bridge.publisher().published().len(), 1);
        assert_eq!(bridge.publisher().published()[0].0, "e22");
        assert_eq!(bridge.stats().okay(), 1);
        assert_eq!(bridge.stats().dropped(), 1);
    }

    #[test]
    fn test_json_convert_wraps_binary() {
        let mut bridge = bridge(DataType::JsonConvert);

        bridge.handle_packet(&packet(&[0xDE, 0xAD], None)).unwrap();
        bridge.handle_packet(&packet(b"[1]", None)).unwrap();

        let published = bridge.publisher().published();
        assert_eq!(published[0].1, b"[\"dead\"]".to_vec());
        assert_eq!(published[1].1, b"[1]".to_vec());
    }

    #[test]
    fn test_any_forwards_untouched() {
        let mut bridge = bridge(DataType::Any);

        bridge.handle_packet(&packet(&[0x00, 0xFF], None)).unwrap();
        assert_eq!(bridge.publisher().published()[0].1, vec![0x00, 0xFF]);
    }

    #[test]
    fn test_routes_select_topic_or_drop() {
        let mut router = Router::new("e22").unwrap();
        router
            .add(TopicRoute::new("type", "sensor", "home/sensor").unwrap())
            .unwrap();
        let config = BridgeConfig {
            data_type: DataType::Json,
            ..BridgeConfig::default()
        };
        let mut bridge = Bridge::new(RecordingPublisher::new(), router, config);

        bridge
            .handle_packet(&packet(b"{\"type\":\"sensor\",\"t\":21}", None))
            .unwrap();
        assert_eq!(
            bridge.handle_packet(&packet(b"{\"type\":\"door\"}", None)),
            Err(DropReason::NoRoute)
        );

        assert_eq!(bridge.publisher().published()[0].0, "home/sensor");
    }

    #[test]
    fn test_converted_payload_is_routed_by_offset() {
        let mut router = Router::new("e22").unwrap();
        // Offset 0 of the converted text is '['
        router.add(TopicRoute::new("0", "5b", "converted").unwrap()).unwrap();
        let mut bridge = Bridge::new(RecordingPublisher::new(), router, BridgeConfig::default());

        bridge.handle_packet(&packet(&[0x01], None)).unwrap();
        assert_eq!(bridge.publisher().published()[0].0, "converted");
    }

    #[test]
    fn test_publish_failure_counts_as_drop() {
        let mut bridge = Bridge::new(
            RecordingPublisher::failing(),
            Router::new("e22").unwrap(),
            BridgeConfig::default(),
        );

        assert_eq!(
            bridge.handle_packet(&packet(b"{}", None)),
            Err(DropReason::PublishFailed)
        );
        assert_eq!(bridge.stats().dropped(), 1);
    }

    #[test]
    fn test_report_includes_rssi_averages() {
        let mut bridge = bridge(DataType::Any);
        bridge.handle_packet(&packet(&[0x01], Some(0xB4))).unwrap();
        bridge.handle_channel_rssi(0xC8);

        let report = bridge.report(60_000, ModuleKind::Usb);
        assert_eq!(report.okay, 1);
        assert_eq!(report.okay_rate_x100, 100);
        assert_eq!(report.packet_rssi, Some((-90, 1)));
        assert_eq!(report.channel_rssi, Some((-100, 1)));
    }

    /// Clock that moves 1 s every time it is read
    struct TickingClock(Cell<u64>);

    impl Clock for TickingClock {
        fn now_ms(&self) -> u64 {
            let now = self.0.get();
            self.0.set(now + 1000);
            now
        }
    }

    /// Publisher that stops the loop after a number of packets
    struct StopAfter<'a> {
        inner: RecordingPublisher,
        remaining: usize,
        running: &'a AtomicBool,
    }

    impl Publisher for StopAfter<'_> {
        type Error = &'static str;

        fn publish(&mut self, topic: &str, payload: &[u8]) -> Result<(), Self::Error> {
            self.inner.publish(topic, payload)?;
            self.remaining -= 1;
            if self.remaining == 0 {
                self.running.store(false, Ordering::Relaxed);
            }
            Ok(())
        }
    }

    #[test]
    fn test_run_forwards_and_samples_channel() {
        let mut transport = MockTransport::new();
        // Idle read, then a channel scan once the rssi interval has passed
        transport.queue_timeout();
        transport.queue_timeout();
        transport.queue_response(&[0xC1, 0x00, 0x01, 0xA0]);
        transport.queue_response(b"{\"n\":1}\xB4");

        let mut session = DeviceSession::connect(
            &mut transport,
            MockDelay::new(),
            SoftwareModeSwitch::new(),
            DeviceConfig::default(),
        )
        .unwrap();

        let running = AtomicBool::new(true);
        let publisher = StopAfter {
            inner: RecordingPublisher::new(),
            remaining: 1,
            running: &running,
        };
        let config = BridgeConfig {
            data_type: DataType::Json,
            interval_rssi_ms: 1500,
            interval_stat_ms: 60_000,
            ..BridgeConfig::default()
        };
        let mut bridge = Bridge::new(publisher, Router::new("e22").unwrap(), config);

        bridge.run(&mut session, &running, &TickingClock(Cell::new(0)));

        assert_eq!(bridge.stats().okay(), 1);
        let publisher = bridge.into_publisher();
        assert_eq!(publisher.inner.published()[0].1, b"{\"n\":1}".to_vec());
        drop(session);
        assert_eq!(transport.writes().len(), 1);
    }
}
