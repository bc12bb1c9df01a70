//! Module register block
//!
//! The module exposes nine bytes of configuration at address 0x00:
//!
//! ```text
//! offset  name   bits
//! 0       ADDH   address high byte
//! 1       ADDL   address low byte
//! 2       NETID  network id
//! 3       REG0   uart rate (7-5) | uart parity (4-3) | air data rate (2-0)
//! 4       REG1   packet size (7-6) | rssi channel (5) | reserved (4-3)
//!                | switch config serial (2, USB only) | transmit power (1-0)
//! 5       REG2   channel
//! 6       REG3   rssi packet (7) | transmission method (6) | relay (5)
//!                | listen before tx (4) | wor enable (3) | wor cycle (2-0)
//! 7, 8    CRYPT  encryption key, write only, always reads back as zero
//! ```
//!
//! Only the first seven bytes are ever compared or written.

use core::fmt;

use bitflags::bitflags;
use embedded_hal::delay::DelayNs;
use log::{debug, error, info};

use crate::config::frequency::{FAMILY_900_BASE_KHZ, FAMILY_900_CODE, FAMILY_900_STEP_KHZ};
use crate::config::limits::{WOR_CYCLE_MIN_MS, WOR_CYCLE_STEP_MS};
use crate::config::protocol::{REGISTER_SIZE, REGISTER_WRITE_SIZE};
use crate::config::timing::WRITE_SETTLE_MS;
use crate::device::error::DeviceError;
use crate::device::settings::{DeviceConfig, ModuleKind};
use crate::protocol::commands::{self, ProductInfo};
use crate::protocol::framing::CommandFramer;
use crate::transport::Transport;

/// Byte offsets within the register block
mod offset {
    pub const ADDH: usize = 0;
    pub const ADDL: usize = 1;
    pub const NETID: usize = 2;
    pub const REG0: usize = 3;
    pub const REG1: usize = 4;
    pub const REG2: usize = 5;
    pub const REG3: usize = 6;
    pub const CRYPT_H: usize = 7;
    pub const CRYPT_L: usize = 8;
}

const TRANSMIT_POWER_MASK: u8 = 0x03;
const WOR_CYCLE_MASK: u8 = 0x07;

bitflags! {
    /// Flag bits of REG1
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct Reg1Flags: u8 {
        const RSSI_CHANNEL = 0x20;
        /// Allow mode switching by serial command (USB dongles)
        const SWITCH_CONFIG_SERIAL = 0x04;
    }
}

bitflags! {
    /// Flag bits of REG3
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct Reg3Flags: u8 {
        const RSSI_PACKET = 0x80;
        const TRANSMISSION_METHOD = 0x40;
        const RELAY = 0x20;
        const LISTEN_BEFORE_TRANSMIT = 0x10;
        const WOR_ENABLE = 0x08;
    }
}

/// Frequency in kHz of `channel` for a module family
///
/// Returns `None` for families without a known frequency plan.
pub fn frequency_khz(family: u8, channel: u8) -> Option<u32> {
    match family {
        FAMILY_900_CODE => Some(FAMILY_900_BASE_KHZ + channel as u32 * FAMILY_900_STEP_KHZ),
        _ => None,
    }
}

/// Frequency printed as `850.125MHz`
struct Mhz(Option<u32>);

impl fmt::Display for Mhz {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.0 {
            Some(khz) => write!(f, "{}.{:03}MHz", khz / 1000, khz % 1000),
            None => f.write_str("UNKNOWN"),
        }
    }
}

fn enabled(value: bool) -> &'static str {
    if value {
        "on"
    } else {
        "off"
    }
}

fn uart_rate_label(code: u8) -> &'static str {
    const LABELS: [&str; 8] = [
        "1200bps",
        "2400bps",
        "4800bps",
        "9600bps (Default)",
        "19200bps",
        "38400bps",
        "57600bps",
        "115200bps",
    ];
    LABELS[(code & 0x07) as usize]
}

fn uart_parity_label(code: u8) -> &'static str {
    const LABELS: [&str; 4] = ["8N1 (Default)", "8O1", "8E1", "8N1"];
    LABELS[(code & 0x03) as usize]
}

fn air_rate_label(family: Option<u8>, code: u8) -> &'static str {
    const FAMILY_900: [&str; 8] = [
        "2.4kbps",
        "2.4kbps",
        "2.4kbps (Default)",
        "4.8kbps",
        "9.6kbps",
        "19.2kbps",
        "38.4kbps",
        "62.5kbps",
    ];
    match family {
        Some(FAMILY_900_CODE) => FAMILY_900[(code & 0x07) as usize],
        _ => "UNKNOWN",
    }
}

fn packet_size_label(code: u8) -> &'static str {
    const LABELS: [&str; 4] = ["240bytes (Default)", "128bytes", "64bytes", "32bytes"];
    LABELS[(code & 0x03) as usize]
}

fn transmit_power_label(max_power: Option<u8>, class: u8) -> &'static str {
    let labels: [&str; 4] = match max_power {
        Some(20) => ["20dBm (Default)", "17dBm", "14dBm", "10dBm"],
        Some(22) => ["22dBm (Default)", "17dBm", "13dBm", "10dBm"],
        Some(30) => ["30dBm (Default)", "27dBm", "24dBm", "21dBm"],
        Some(33) => ["33dBm (Default)", "30dBm", "27dBm", "24dBm"],
        _ => return "UNKNOWN",
    };
    labels[(class & TRANSMIT_POWER_MASK) as usize]
}

fn transmission_method_label(flags: Reg3Flags) -> &'static str {
    if flags.contains(Reg3Flags::TRANSMISSION_METHOD) {
        "transparent"
    } else {
        "fixed-point"
    }
}

/// The module's register image
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RegisterBlock {
    bytes: [u8; REGISTER_SIZE],
}

impl RegisterBlock {
    pub fn from_bytes(bytes: [u8; REGISTER_SIZE]) -> Self {
        Self { bytes }
    }

    pub fn bytes(&self) -> &[u8; REGISTER_SIZE] {
        &self.bytes
    }

    /// The seven bytes the module accepts on write
    pub fn writable(&self) -> [u8; REGISTER_WRITE_SIZE] {
        let mut writable = [0u8; REGISTER_WRITE_SIZE];
        writable.copy_from_slice(&self.bytes[..REGISTER_WRITE_SIZE]);
        writable
    }

    pub fn address(&self) -> u16 {
        u16::from_be_bytes([self.bytes[offset::ADDH], self.bytes[offset::ADDL]])
    }

    pub fn set_address(&mut self, address: u16) {
        let [high, low] = address.to_be_bytes();
        self.bytes[offset::ADDH] = high;
        self.bytes[offset::ADDL] = low;
    }

    pub fn network(&self) -> u8 {
        self.bytes[offset::NETID]
    }

    pub fn set_network(&mut self, network: u8) {
        self.bytes[offset::NETID] = network;
    }

    pub fn uart_rate_code(&self) -> u8 {
        (self.bytes[offset::REG0] >> 5) & 0x07
    }

    pub fn uart_parity_code(&self) -> u8 {
        (self.bytes[offset::REG0] >> 3) & 0x03
    }

    pub fn air_rate_code(&self) -> u8 {
        self.bytes[offset::REG0] & 0x07
    }

    pub fn packet_size_code(&self) -> u8 {
        (self.bytes[offset::REG1] >> 6) & 0x03
    }

    /// Maximum packet size in bytes selected by REG1
    pub fn packet_size(&self) -> u8 {
        match self.packet_size_code() {
            0 => 240,
            1 => 128,
            2 => 64,
            _ => 32,
        }
    }

    pub fn reg1_flags(&self) -> Reg1Flags {
        Reg1Flags::from_bits_truncate(self.bytes[offset::REG1])
    }

    pub fn transmit_power(&self) -> u8 {
        self.bytes[offset::REG1] & TRANSMIT_POWER_MASK
    }

    pub fn set_transmit_power(&mut self, class: u8) {
        self.bytes[offset::REG1] =
            (self.bytes[offset::REG1] & !TRANSMIT_POWER_MASK) | (class & TRANSMIT_POWER_MASK);
    }

    pub fn channel(&self) -> u8 {
        self.bytes[offset::REG2]
    }

    pub fn set_channel(&mut self, channel: u8) {
        self.bytes[offset::REG2] = channel;
    }

    pub fn reg3_flags(&self) -> Reg3Flags {
        Reg3Flags::from_bits_truncate(self.bytes[offset::REG3])
    }

    pub fn wor_cycle_ms(&self) -> u16 {
        WOR_CYCLE_MIN_MS + (self.bytes[offset::REG3] & WOR_CYCLE_MASK) as u16 * WOR_CYCLE_STEP_MS
    }

    pub fn set_wor_cycle_ms(&mut self, cycle_ms: u16) {
        let code = (cycle_ms.saturating_sub(WOR_CYCLE_MIN_MS) / WOR_CYCLE_STEP_MS) as u8;
        self.bytes[offset::REG3] =
            (self.bytes[offset::REG3] & !WOR_CYCLE_MASK) | (code & WOR_CYCLE_MASK);
    }

    pub fn crypt(&self) -> u16 {
        u16::from_be_bytes([self.bytes[offset::CRYPT_H], self.bytes[offset::CRYPT_L]])
    }

    pub fn set_crypt(&mut self, crypt: u16) {
        let [high, low] = crypt.to_be_bytes();
        self.bytes[offset::CRYPT_H] = high;
        self.bytes[offset::CRYPT_L] = low;
    }

    /// Compare the writable bytes, reporting the first difference
    pub fn verify_writable(&self, actual: &[u8]) -> Result<(), DeviceError> {
        for (offset, expected) in self.bytes[..REGISTER_WRITE_SIZE].iter().enumerate() {
            let actual = actual.get(offset).copied().unwrap_or(0);
            if actual != *expected {
                return Err(DeviceError::VerificationMismatch {
                    offset,
                    expected: *expected,
                    actual,
                });
            }
        }
        Ok(())
    }

    /// The settings this block currently encodes, as a [`DeviceConfig`]
    ///
    /// Fields the block does not carry keep their defaults.
    pub fn to_config(&self) -> DeviceConfig {
        let reg1 = self.reg1_flags();
        let reg3 = self.reg3_flags();
        DeviceConfig {
            address: self.address(),
            network: self.network(),
            channel: self.channel(),
            packet_max_size: self.packet_size(),
            crypt: self.crypt(),
            wor_enabled: reg3.contains(Reg3Flags::WOR_ENABLE),
            wor_cycle_ms: self.wor_cycle_ms(),
            transmit_power: self.transmit_power(),
            listen_before_transmit: reg3.contains(Reg3Flags::LISTEN_BEFORE_TRANSMIT),
            rssi_packet: reg3.contains(Reg3Flags::RSSI_PACKET),
            rssi_channel: reg1.contains(Reg1Flags::RSSI_CHANNEL),
            ..DeviceConfig::default()
        }
    }

    fn update_flag(&mut self, name: &str, offset: usize, bits: u8, setting: bool) {
        let value = self.bytes[offset] & bits != 0;
        if value != setting {
            info!(
                "device: update_configuration: {}: {} --> {}",
                name,
                enabled(value),
                enabled(setting)
            );
            if setting {
                self.bytes[offset] |= bits;
            } else {
                self.bytes[offset] &= !bits;
            }
        }
    }

    /// Apply the desired configuration to a copy of this block
    ///
    /// Only fields that differ are rewritten, each change is logged, and the
    /// returned flag says whether any writable byte changed. Serial rates,
    /// air rate, packet size, transmission method and relay are left as the
    /// module reports them.
    pub fn diff_and_apply(
        &self,
        desired: &DeviceConfig,
        kind: ModuleKind,
        product: Option<&ProductInfo>,
    ) -> (RegisterBlock, bool) {
        let mut updated = *self;
        let family = product.map(|p| p.frequency);
        let max_power = product.map(|p| p.max_power);

        if updated.address() != desired.address {
            info!(
                "device: update_configuration: address: 0x{:04X} --> 0x{:04X}",
                updated.address(),
                desired.address
            );
            updated.set_address(desired.address);
        }

        if updated.network() != desired.network {
            info!(
                "device: update_configuration: network: 0x{:02X} --> 0x{:02X}",
                updated.network(),
                desired.network
            );
            updated.set_network(desired.network);
        }

        updated.update_flag(
            "rssi-channel",
            offset::REG1,
            Reg1Flags::RSSI_CHANNEL.bits(),
            desired.rssi_channel,
        );

        if kind == ModuleKind::Usb {
            updated.update_flag(
                "switch-config-serial",
                offset::REG1,
                Reg1Flags::SWITCH_CONFIG_SERIAL.bits(),
                true,
            );
        }

        let power = updated.transmit_power();
        if power != desired.transmit_power {
            info!(
                "device: update_configuration: transmit_power: {} ({}) --> {} ({})",
                power,
                transmit_power_label(max_power, power),
                desired.transmit_power,
                transmit_power_label(max_power, desired.transmit_power)
            );
            updated.set_transmit_power(desired.transmit_power);
        }

        let channel = updated.channel();
        if channel != desired.channel {
            let from = family.and_then(|f| frequency_khz(f, channel));
            let to = family.and_then(|f| frequency_khz(f, desired.channel));
            info!(
                "device: update_configuration: channel: {} ({}) --> {} ({})",
                channel,
                Mhz(from),
                desired.channel,
                Mhz(to)
            );
            updated.set_channel(desired.channel);
        }

        updated.update_flag(
            "rssi-packet",
            offset::REG3,
            Reg3Flags::RSSI_PACKET.bits(),
            desired.rssi_packet,
        );
        updated.update_flag(
            "listen-before-transmit",
            offset::REG3,
            Reg3Flags::LISTEN_BEFORE_TRANSMIT.bits(),
            desired.listen_before_transmit,
        );
        updated.update_flag(
            "wor-enabled",
            offset::REG3,
            Reg3Flags::WOR_ENABLE.bits(),
            desired.wor_enabled,
        );

        let wor_cycle = updated.wor_cycle_ms();
        if wor_cycle != desired.wor_cycle_ms {
            info!(
                "device: update_configuration: wor_cycle: {}ms --> {}ms",
                wor_cycle, desired.wor_cycle_ms
            );
            updated.set_wor_cycle_ms(desired.wor_cycle_ms);
        }

        let crypt = updated.crypt();
        if crypt != desired.crypt {
            info!(
                "device: update_configuration: crypt: 0x{:04X} --> 0x{:04X}",
                crypt, desired.crypt
            );
            updated.set_crypt(desired.crypt);
        }

        let changed = updated.bytes[..REGISTER_WRITE_SIZE] != self.bytes[..REGISTER_WRITE_SIZE];
        (updated, changed)
    }

    /// Human readable rendering of every field
    pub fn describe<'a>(
        &'a self,
        kind: ModuleKind,
        product: Option<&'a ProductInfo>,
    ) -> RegisterReport<'a> {
        RegisterReport {
            block: self,
            kind,
            product,
        }
    }
}

/// Display adapter returned by [`RegisterBlock::describe`]
pub struct RegisterReport<'a> {
    block: &'a RegisterBlock,
    kind: ModuleKind,
    product: Option<&'a ProductInfo>,
}

impl fmt::Display for RegisterReport<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let block = self.block;
        let family = self.product.map(|p| p.frequency);
        let max_power = self.product.map(|p| p.max_power);
        let reg1 = block.reg1_flags();
        let reg3 = block.reg3_flags();
        let frequency = family.and_then(|f| frequency_khz(f, block.channel()));

        write!(f, "address=0x{:04X}, ", block.address())?;
        write!(f, "network=0x{:02X}, ", block.network())?;
        write!(f, "channel={} (frequency={}), ", block.channel(), Mhz(frequency))?;
        write!(f, "data-rate={}, ", air_rate_label(family, block.air_rate_code()))?;
        write!(f, "packet-size={}, ", packet_size_label(block.packet_size_code()))?;
        write!(
            f,
            "transmit-power={}, ",
            transmit_power_label(max_power, block.transmit_power())
        )?;
        write!(f, "encryption-key=0x{:04X}, ", block.crypt())?;
        write!(f, "rssi-channel={}, ", enabled(reg1.contains(Reg1Flags::RSSI_CHANNEL)))?;
        write!(f, "rssi-packet={}, ", enabled(reg3.contains(Reg3Flags::RSSI_PACKET)))?;
        write!(
            f,
            "mode-listen-before-tx={}, ",
            enabled(reg3.contains(Reg3Flags::LISTEN_BEFORE_TRANSMIT))
        )?;
        write!(f, "mode-transmit={}, ", transmission_method_label(reg3))?;
        write!(f, "mode-relay={}, ", enabled(reg3.contains(Reg3Flags::RELAY)))?;
        if self.kind == ModuleKind::Dip {
            write!(f, "mode-wor-enable={}, ", enabled(reg3.contains(Reg3Flags::WOR_ENABLE)))?;
            write!(f, "mode-wor-cycle={}ms, ", block.wor_cycle_ms())?;
        }
        write!(f, "uart-rate={}, ", uart_rate_label(block.uart_rate_code()))?;
        write!(f, "uart-parity={}", uart_parity_label(block.uart_parity_code()))?;
        if self.kind == ModuleKind::Usb {
            write!(
                f,
                ", switch-config-serial={}",
                enabled(reg1.contains(Reg1Flags::SWITCH_CONFIG_SERIAL))
            )?;
        }
        Ok(())
    }
}

/// Read the register block from the module
pub fn read<T: Transport, D: DelayNs>(
    framer: &mut CommandFramer<T, D>,
) -> Result<RegisterBlock, DeviceError> {
    let payload =
        framer.send_and_receive("read_module_config", &commands::READ_REGISTERS, REGISTER_SIZE)?;

    let mut bytes = [0u8; REGISTER_SIZE];
    bytes.copy_from_slice(&payload[..REGISTER_SIZE]);
    Ok(RegisterBlock::from_bytes(bytes))
}

/// Write the writable bytes and check the module echoes them unchanged
pub fn write<T: Transport, D: DelayNs>(
    framer: &mut CommandFramer<T, D>,
    block: &RegisterBlock,
) -> Result<(), DeviceError> {
    let command = commands::write_registers(&block.writable());
    let echoed = framer.send_and_receive("write_module_config", &command, REGISTER_WRITE_SIZE)?;

    if let Err(e) = block.verify_writable(&echoed) {
        error!("device: write_module_config: {}", e);
        return Err(e);
    }
    Ok(())
}

/// Write the block, then read it back and compare the writable bytes
pub fn write_and_verify<T: Transport, D: DelayNs>(
    framer: &mut CommandFramer<T, D>,
    block: &RegisterBlock,
) -> Result<(), DeviceError> {
    debug!("device: update module configuration");
    write(framer, block)?;

    framer.delay_mut().delay_ms(WRITE_SETTLE_MS);

    debug!("device: verify module configuration");
    let readback = read(framer)?;
    if let Err(e) = block.verify_writable(readback.bytes()) {
        error!("device: failed to verify module configuration: {}", e);
        return Err(e);
    }
    Ok(())
}
