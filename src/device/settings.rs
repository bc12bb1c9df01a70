//! Desired module configuration supplied by the caller

use crate::config::{defaults, limits};
use crate::device::error::ConfigError;

/// Physical variant of the module, which decides how modes are switched
/// and how RSSI bytes are encoded
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ModuleKind {
    /// USB dongle (E22-900T22U), software mode switch, half-dB RSSI
    Usb,
    /// DIP module (E22-900T22D), M0/M1/AUX pins, RSSI offset from 256
    Dip,
}

impl ModuleKind {
    /// Convert a raw RSSI byte to dBm
    ///
    /// The two variants use different encodings and must not be mixed.
    pub fn rssi_dbm(self, raw: u8) -> i16 {
        match self {
            ModuleKind::Usb => -((raw / 2) as i16),
            ModuleKind::Dip => -(256 - raw as i16),
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            ModuleKind::Usb => "usb",
            ModuleKind::Dip => "dip",
        }
    }
}

/// Operating parameters the module should end up with
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeviceConfig {
    pub address: u16,
    pub network: u8,
    /// Frequency is base + channel at 1 MHz steps
    pub channel: u8,
    /// One of 32, 64, 128 or 240; 0 selects the default
    pub packet_max_size: u8,
    /// Air data rate in kbps (2, 4, 9, 19, 38 or 62); 0 selects the default
    pub packet_max_rate: u8,
    /// Write-only encryption key
    pub crypt: u16,
    pub wor_enabled: bool,
    pub wor_cycle_ms: u16,
    /// Power class 0 (maximum) to 3 (minimum)
    pub transmit_power: u8,
    pub listen_before_transmit: bool,
    /// Module appends an RSSI byte to every received packet
    pub rssi_packet: bool,
    /// Module answers channel RSSI scans
    pub rssi_channel: bool,
    /// 0 selects the default
    pub read_timeout_command_ms: u32,
    /// 0 selects the default
    pub read_timeout_packet_ms: u32,
    /// Trace every command frame
    pub debug: bool,
}

impl Default for DeviceConfig {
    fn default() -> Self {
        Self {
            address: defaults::ADDRESS,
            network: defaults::NETWORK,
            channel: defaults::CHANNEL,
            packet_max_size: defaults::PACKET_MAX_SIZE,
            packet_max_rate: defaults::PACKET_MAX_RATE,
            crypt: defaults::CRYPT,
            wor_enabled: defaults::WOR_ENABLED,
            wor_cycle_ms: defaults::WOR_CYCLE_MS,
            transmit_power: defaults::TRANSMIT_POWER,
            listen_before_transmit: defaults::LISTEN_BEFORE_TRANSMIT,
            rssi_packet: defaults::RSSI_PACKET,
            rssi_channel: defaults::RSSI_CHANNEL,
            read_timeout_command_ms: defaults::READ_TIMEOUT_COMMAND_MS,
            read_timeout_packet_ms: defaults::READ_TIMEOUT_PACKET_MS,
            debug: false,
        }
    }
}

impl DeviceConfig {
    /// Fill unset values with defaults and check every constraint
    pub fn validated(mut self) -> Result<Self, ConfigError> {
        if self.read_timeout_command_ms == 0 {
            self.read_timeout_command_ms = defaults::READ_TIMEOUT_COMMAND_MS;
        }
        if self.read_timeout_packet_ms == 0 {
            self.read_timeout_packet_ms = defaults::READ_TIMEOUT_PACKET_MS;
        }

        if self.packet_max_size == 0 {
            self.packet_max_size = defaults::PACKET_MAX_SIZE;
        } else if !limits::PACKET_SIZES.contains(&self.packet_max_size) {
            return Err(ConfigError::PacketSize(self.packet_max_size));
        }

        if self.packet_max_rate == 0 {
            self.packet_max_rate = defaults::PACKET_MAX_RATE;
        } else if self.packet_max_rate > limits::MAX_PACKET_RATE
            || !limits::PACKET_RATES.contains(&self.packet_max_rate)
        {
            return Err(ConfigError::PacketRate(self.packet_max_rate));
        }

        if self.transmit_power > limits::TRANSMIT_POWER_MAX {
            return Err(ConfigError::TransmitPower(self.transmit_power));
        }

        if self.wor_cycle_ms < limits::WOR_CYCLE_MIN_MS
            || self.wor_cycle_ms > limits::WOR_CYCLE_MAX_MS
            || self.wor_cycle_ms % limits::WOR_CYCLE_STEP_MS != 0
        {
            return Err(ConfigError::WorCycle(self.wor_cycle_ms));
        }

        Ok(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_valid() {
        let config = DeviceConfig::default().validated().unwrap();
        assert_eq!(config, DeviceConfig::default());
    }

    #[test]
    fn test_zero_values_take_defaults() {
        let config = DeviceConfig {
            packet_max_size: 0,
            packet_max_rate: 0,
            read_timeout_command_ms: 0,
            read_timeout_packet_ms: 0,
            ..DeviceConfig::default()
        }
        .validated()
        .unwrap();

        assert_eq!(config.packet_max_size, 240);
        assert_eq!(config.packet_max_rate, 2);
        assert_eq!(config.read_timeout_command_ms, 1000);
        assert_eq!(config.read_timeout_packet_ms, 5000);
    }

    #[test]
    fn test_rejects_oversized_packet() {
        let config = DeviceConfig {
            packet_max_size: 241,
            ..DeviceConfig::default()
        };
        assert_eq!(config.validated(), Err(ConfigError::PacketSize(241)));

        let config = DeviceConfig {
            packet_max_size: 100,
            ..DeviceConfig::default()
        };
        assert_eq!(config.validated(), Err(ConfigError::PacketSize(100)));
    }

    #[test]
    fn test_rejects_fast_packet_rate() {
        let config = DeviceConfig {
            packet_max_rate: 63,
            ..DeviceConfig::default()
        };
        assert_eq!(config.validated(), Err(ConfigError::PacketRate(63)));
    }

    #[test]
    fn test_rejects_power_and_wor_cycle() {
        let config = DeviceConfig {
            transmit_power: 4,
            ..DeviceConfig::default()
        };
        assert_eq!(config.validated(), Err(ConfigError::TransmitPower(4)));

        let config = DeviceConfig {
            wor_cycle_ms: 750,
            ..DeviceConfig::default()
        };
        assert_eq!(config.validated(), Err(ConfigError::WorCycle(750)));

        let config = DeviceConfig {
            wor_cycle_ms: 4500,
            ..DeviceConfig::default()
        };
        assert_eq!(config.validated(), Err(ConfigError::WorCycle(4500)));
    }

    #[test]
    fn test_rssi_encodings_differ() {
        assert_eq!(ModuleKind::Usb.rssi_dbm(0xB4), -90);
        assert_eq!(ModuleKind::Dip.rssi_dbm(0xB4), -76);
        assert_eq!(ModuleKind::Dip.rssi_dbm(0x00), -256);
        assert_eq!(ModuleKind::Usb.rssi_dbm(0xFF), -127);
    }
}
