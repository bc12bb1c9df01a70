//! Packet bridge for an E22 USB module.
//!
//! Publishes received packets as `<topic> <payload>` lines on stdout, ready
//! to be piped into a message bus client. Status goes to stderr.

mod cli;
mod publisher;
mod serial;

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use anyhow::Context;
use clap::{Args as ClapArgs, Parser};
use colored::Colorize;
use e22_lora::bridge::{Bridge, BridgeConfig, DataType, Router, TopicRoute};
use e22_lora::{DeviceSession, SoftwareModeSwitch};
use log::warn;

use cli::{init_logging, DeviceArgs};
use publisher::LinePublisher;
use serial::{SerialTransport, StdClock, StdDelay};

/// Topic selection, payload handling and reporting intervals.
#[derive(ClapArgs, Debug, Clone)]
struct BridgeArgs {
    /// Topic used when no routes are configured
    #[arg(long, default_value = "e22900t22u")]
    topic: String,

    /// Route as key=value=topic, repeatable, first match wins
    #[arg(long = "topic-route", value_parser = parse_route)]
    routes: Vec<TopicRoute>,

    /// Payload handling: json, json-convert or any
    #[arg(long, default_value = "json-convert")]
    data_type: String,

    /// Statistics period in seconds
    #[arg(long, default_value_t = 5 * 60)]
    interval_stat: u64,

    /// Channel RSSI scan period in seconds
    #[arg(long, default_value_t = 60)]
    interval_rssi: u64,
}

impl BridgeArgs {
    /// Unknown names fall back to the default with a warning
    fn data_type(&self) -> DataType {
        self.data_type.parse().unwrap_or_else(|e| {
            warn!(
                "config: data-type '{}': {}, using '{}'",
                self.data_type,
                e,
                DataType::default()
            );
            DataType::default()
        })
    }

    fn router(&self) -> anyhow::Result<Router> {
        let mut router = Router::new(&self.topic)
            .map_err(|e| anyhow::anyhow!("topic '{}': {}", self.topic, e))?;
        for route in &self.routes {
            router
                .add(route.clone())
                .map_err(|e| anyhow::anyhow!("topic-route: {}", e))?;
        }
        Ok(router)
    }

    fn bridge_config(&self, device: &DeviceArgs) -> BridgeConfig {
        BridgeConfig {
            data_type: self.data_type(),
            capture_rssi_packet: device.rssi_packet,
            capture_rssi_channel: device.rssi_channel,
            interval_stat_ms: self.interval_stat * 1000,
            interval_rssi_ms: self.interval_rssi * 1000,
        }
    }
}

fn parse_route(s: &str) -> Result<TopicRoute, String> {
    let mut parts = s.splitn(3, '=');
    match (parts.next(), parts.next(), parts.next()) {
        (Some(key), Some(value), Some(topic))
            if !key.is_empty() && !value.is_empty() && !topic.is_empty() =>
        {
            TopicRoute::new(key, value, topic).map_err(|e| e.to_string())
        }
        _ => Err(format!("expected key=value=topic, got '{}'", s)),
    }
}

#[derive(Parser)]
#[command(name = "e22-bridge")]
#[command(about = "Publish packets from an E22 USB module as topic lines")]
struct Args {
    #[command(flatten)]
    device: DeviceArgs,

    #[command(flatten)]
    bridge: BridgeArgs,

    /// Debug logging
    #[arg(short, long)]
    verbose: bool,
}

fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    init_logging(args.verbose);

    eprintln!("{}", "E22 Bridge".bold());
    eprintln!("Port: {}", args.device.port);
    eprintln!("Baud: {}", args.device.baud);

    let router = args.bridge.router()?;
    if router.routes().is_empty() {
        eprintln!("Routes: none, publishing to '{}'", router.default_topic());
    }
    for (i, route) in router.routes().iter().enumerate() {
        eprintln!(
            "Route[{}]: key='{}', value='{}', topic='{}'",
            i,
            route.key(),
            route.value(),
            route.topic()
        );
    }
    eprintln!();

    let running = Arc::new(AtomicBool::new(true));
    let r = running.clone();
    ctrlc::set_handler(move || {
        r.store(false, Ordering::SeqCst);
    })
    .context("failed to install signal handler")?;

    let transport = SerialTransport::open(&args.device.port, args.device.baud)?;
    let mut session = DeviceSession::connect(
        transport,
        StdDelay,
        SoftwareModeSwitch::new(),
        args.device.device_config(),
    )
    .context("device connect failed")?;
    session.start().context("device startup failed")?;

    let mut bridge = Bridge::new(
        LinePublisher::stdout(),
        router,
        args.bridge.bridge_config(&args.device),
    );
    let clock = StdClock::new();
    bridge.run(&mut session, &running, &clock);

    session.disconnect();
    eprintln!("{}", "Stopped".yellow());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_route() {
        let route = parse_route("type=alarm=home/alarms").unwrap();
        assert_eq!(route.key(), "type");
        assert_eq!(route.value(), "alarm");
        assert_eq!(route.topic(), "home/alarms");

        // Only the first two separators split
        let route = parse_route("0=ab=a=b").unwrap();
        assert_eq!(route.topic(), "a=b");
    }

    #[test]
    fn test_parse_route_rejects_malformed() {
        assert!(parse_route("type=alarm").is_err());
        assert!(parse_route("=alarm=topic").is_err());
        assert!(parse_route("type==topic").is_err());
        assert!(parse_route(&format!("k=v={}", "t".repeat(65))).is_err());
    }

    #[test]
    fn test_bridge_args() {
        let args = Args::parse_from([
            "e22-bridge",
            "--topic-route",
            "type=sensor=home/sensors",
            "--topic-route",
            "type=alarm=home/alarms",
            "--data-type",
            "json",
            "--interval-rssi",
            "30",
            "--rssi-packet",
            "false",
        ]);
        let router = args.bridge.router().unwrap();
        assert_eq!(router.routes().len(), 2);
        assert_eq!(
            router.select(b"{\"type\":\"alarm\"}", DataType::Json),
            Some("home/alarms")
        );

        let config = args.bridge.bridge_config(&args.device);
        assert_eq!(config.data_type, DataType::Json);
        assert_eq!(config.interval_rssi_ms, 30_000);
        assert_eq!(config.interval_stat_ms, 300_000);
        assert!(!config.capture_rssi_packet);
        assert!(config.capture_rssi_channel);
    }

    #[test]
    fn test_unknown_data_type_falls_back() {
        let args = Args::parse_from(["e22-bridge", "--data-type", "xml"]);
        assert_eq!(args.bridge.data_type(), DataType::JsonConvert);
    }
}
