//! Command line options shared by the host tools.

use clap::{ArgAction, Args};
use e22_lora::config::{defaults, serial::BAUD_RATE};
use e22_lora::DeviceConfig;

/// Serial link and module configuration.
#[derive(Args, Debug, Clone)]
pub struct DeviceArgs {
    /// Serial port of the USB module
    #[arg(short, long, default_value = "/dev/e22900t22u")]
    pub port: String,

    /// Baud rate
    #[arg(short, long, default_value_t = BAUD_RATE)]
    pub baud: u32,

    /// Module address (decimal or 0x-prefixed hex)
    #[arg(long, default_value = "0x0000", value_parser = parse_u16)]
    pub address: u16,

    /// Network id (decimal or 0x-prefixed hex)
    #[arg(long, default_value = "0x00", value_parser = parse_u8)]
    pub network: u8,

    /// Channel, 1 MHz steps above the band base
    #[arg(long, default_value = "0x00", value_parser = parse_u8)]
    pub channel: u8,

    /// Maximum packet size: 32, 64, 128 or 240
    #[arg(long, default_value_t = defaults::PACKET_MAX_SIZE)]
    pub packet_size: u8,

    /// Air data rate in kbps: 2, 4, 9, 19, 38 or 62
    #[arg(long, default_value_t = defaults::PACKET_MAX_RATE)]
    pub packet_rate: u8,

    /// Listen before transmit
    #[arg(long, default_value_t = defaults::LISTEN_BEFORE_TRANSMIT, action = ArgAction::Set)]
    pub listen_before_transmit: bool,

    /// Append an RSSI byte to received packets
    #[arg(long, default_value_t = defaults::RSSI_PACKET, action = ArgAction::Set)]
    pub rssi_packet: bool,

    /// Enable channel RSSI scans
    #[arg(long, default_value_t = defaults::RSSI_CHANNEL, action = ArgAction::Set)]
    pub rssi_channel: bool,

    /// Command response timeout in milliseconds
    #[arg(long, default_value_t = defaults::READ_TIMEOUT_COMMAND_MS)]
    pub read_timeout_command: u32,

    /// Packet read timeout in milliseconds
    #[arg(long, default_value_t = defaults::READ_TIMEOUT_PACKET_MS)]
    pub read_timeout_packet: u32,

    /// Trace command frames
    #[arg(long)]
    pub debug_device: bool,
}

impl DeviceArgs {
    pub fn device_config(&self) -> DeviceConfig {
        DeviceConfig {
            address: self.address,
            network: self.network,
            channel: self.channel,
            packet_max_size: self.packet_size,
            packet_max_rate: self.packet_rate,
            listen_before_transmit: self.listen_before_transmit,
            rssi_packet: self.rssi_packet,
            rssi_channel: self.rssi_channel,
            read_timeout_command_ms: self.read_timeout_command,
            read_timeout_packet_ms: self.read_timeout_packet,
            debug: self.debug_device,
            ..DeviceConfig::default()
        }
    }
}

fn parse_number(s: &str) -> Result<u32, String> {
    let parsed = match s.strip_prefix("0x").or_else(|| s.strip_prefix("0X")) {
        Some(hex) => u32::from_str_radix(hex, 16),
        None => s.parse::<u32>(),
    };
    parsed.map_err(|e| format!("invalid number '{}': {}", s, e))
}

pub fn parse_u16(s: &str) -> Result<u16, String> {
    let value = parse_number(s)?;
    u16::try_from(value).map_err(|_| format!("{} does not fit in 16 bits", s))
}

pub fn parse_u8(s: &str) -> Result<u8, String> {
    let value = parse_number(s)?;
    u8::try_from(value).map_err(|_| format!("{} does not fit in 8 bits", s))
}

/// Log to stderr, `RUST_LOG` overrides the level.
pub fn init_logging(verbose: bool) {
    env_logger::Builder::new()
        .filter_level(if verbose {
            log::LevelFilter::Debug
        } else {
            log::LevelFilter::Info
        })
        .parse_default_env()
        .init();
}
