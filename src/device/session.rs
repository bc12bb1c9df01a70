//! Device session
//!
//! Owns the framer, the mode switch and the caller's configuration, and
//! runs the startup sequence:
//!
//! ```text
//! connect -> config mode -> product info -> registers (diff, write, verify)
//!         -> transfer mode -> packet loop
//! ```
//!
//! Any failing step aborts the sequence. Nothing is retried.

use core::sync::atomic::{AtomicBool, Ordering};

use embedded_hal::delay::DelayNs;
use log::{debug, error, info};

use crate::clock::{Clock, Interval};
use crate::config::protocol::{CHANNEL_RSSI_RESPONSE_SIZE, PRODUCT_INFO_SIZE};
use crate::device::error::{DeviceError, HeaderBytes};
use crate::device::mode::{DeviceMode, ModeControl};
use crate::device::packet::{self, Packet};
use crate::device::registers::{self, RegisterBlock};
use crate::device::settings::{DeviceConfig, ModuleKind};
use crate::protocol::commands::{
    ProductInfo, CHANNEL_RSSI, CHANNEL_RSSI_RESPONSE_HEADER, READ_PRODUCT_INFO,
};
use crate::protocol::framing::CommandFramer;
use crate::transport::Transport;

/// When the packet loop scans channel RSSI
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChannelRssiPolicy {
    /// Never scan
    Never,
    /// After every packet read that came back empty
    EveryIdle,
    /// After an empty read, at most once per period in milliseconds
    Every(u64),
}

/// Something the packet loop observed
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LoopEvent {
    Packet(Packet),
    /// Raw channel RSSI byte
    ChannelRssi(u8),
}

/// A connected module
pub struct DeviceSession<T, D, M> {
    framer: CommandFramer<T, D>,
    mode_control: M,
    config: DeviceConfig,
    product: Option<ProductInfo>,
    mode: Option<DeviceMode>,
}

impl<T, D, M> DeviceSession<T, D, M>
where
    T: Transport,
    D: DelayNs,
    M: ModeControl,
{
    /// Validate `config` and take ownership of the link
    ///
    /// No bytes are exchanged until a mode switch or command is issued.
    pub fn connect(
        transport: T,
        delay: D,
        mode_control: M,
        config: DeviceConfig,
    ) -> Result<Self, DeviceError> {
        let config = match config.validated() {
            Ok(config) => config,
            Err(e) => {
                error!("device: invalid configuration: {}", e);
                return Err(e.into());
            }
        };

        info!(
            "device: connect (module={}, address=0x{:04X}, network=0x{:02X}, channel={}, packet-maxsize={}, read-timeout-command={}, read-timeout-packet={})",
            mode_control.kind().name(),
            config.address,
            config.network,
            config.channel,
            config.packet_max_size,
            config.read_timeout_command_ms,
            config.read_timeout_packet_ms
        );

        let framer = CommandFramer::new(
            transport,
            delay,
            config.read_timeout_command_ms,
            config.debug,
        );

        Ok(Self {
            framer,
            mode_control,
            config,
            product: None,
            mode: None,
        })
    }

    pub fn kind(&self) -> ModuleKind {
        self.mode_control.kind()
    }

    /// The validated configuration
    pub fn config(&self) -> &DeviceConfig {
        &self.config
    }

    /// Product info from the last [`info_read`](Self::info_read)
    pub fn product_info(&self) -> Option<&ProductInfo> {
        self.product.as_ref()
    }

    /// Last mode switched to, `None` before the first switch
    pub fn mode(&self) -> Option<DeviceMode> {
        self.mode
    }

    fn mode_switch(&mut self, mode: DeviceMode) -> Result<(), DeviceError> {
        self.mode_control.switch_to(&mut self.framer, mode)?;
        debug!("device: mode_switch: --> {}", mode);
        self.mode = Some(mode);
        Ok(())
    }

    pub fn mode_config(&mut self) -> Result<(), DeviceError> {
        self.mode_switch(DeviceMode::Config)
    }

    pub fn mode_transfer(&mut self) -> Result<(), DeviceError> {
        self.mode_switch(DeviceMode::Transfer)
    }

    /// Read and keep the product information block
    pub fn info_read(&mut self) -> Result<ProductInfo, DeviceError> {
        let payload = match self.framer.send_and_receive(
            "read_product_info",
            &READ_PRODUCT_INFO,
            PRODUCT_INFO_SIZE,
        ) {
            Ok(payload) => payload,
            Err(e) => {
                error!("device: failed to read product information: {}", e);
                return Err(e);
            }
        };

        let mut raw = [0u8; PRODUCT_INFO_SIZE];
        raw.copy_from_slice(&payload[..PRODUCT_INFO_SIZE]);
        let product = ProductInfo::from_bytes(&raw);
        info!("device: product_info: {}", product);

        self.product = Some(product);
        Ok(product)
    }

    /// Read the register block and log its decoded form
    pub fn registers_read(&mut self) -> Result<RegisterBlock, DeviceError> {
        let block = match registers::read(&mut self.framer) {
            Ok(block) => block,
            Err(e) => {
                error!("device: failed to read module configuration");
                return Err(e);
            }
        };
        info!(
            "device: module_config: {}",
            block.describe(self.kind(), self.product.as_ref())
        );
        Ok(block)
    }

    /// Bring the module's registers in line with the configuration
    ///
    /// Writes and verifies only when a writable byte differs. Returns
    /// whether a write happened.
    pub fn config_read_and_update(&mut self) -> Result<bool, DeviceError> {
        let current = self.registers_read()?;
        let (updated, changed) =
            current.diff_and_apply(&self.config, self.kind(), self.product.as_ref());

        if changed {
            if let Err(e) = registers::write_and_verify(&mut self.framer, &updated) {
                error!("device: failed to update module configuration: {}", e);
                return Err(e);
            }
            info!(
                "device: module_config: {}",
                updated.describe(self.kind(), self.product.as_ref())
            );
        }

        Ok(changed)
    }

    /// Scan the channel and return the raw RSSI byte
    pub fn channel_rssi_read(&mut self) -> Result<u8, DeviceError> {
        const NAME: &str = "channel_rssi_read";

        self.framer.flush()?;
        if let Err(e) = self.framer.send_command(&CHANNEL_RSSI) {
            error!("device: {}: failed to send command: {}", NAME, e);
            return Err(e);
        }

        let mut buffer = [0u8; CHANNEL_RSSI_RESPONSE_SIZE];
        let received = self.framer.receive(&mut buffer)?;
        if received < CHANNEL_RSSI_RESPONSE_SIZE {
            error!(
                "device: {}: failed, received {} bytes, expected {} bytes",
                NAME, received, CHANNEL_RSSI_RESPONSE_SIZE
            );
            return Err(DeviceError::ResponseTooShort {
                received,
                expected: CHANNEL_RSSI_RESPONSE_SIZE,
            });
        }

        if buffer[..CHANNEL_RSSI_RESPONSE_HEADER.len()] != CHANNEL_RSSI_RESPONSE_HEADER {
            let received = HeaderBytes::new(&buffer);
            error!("device: {}: invalid response header: {}", NAME, received);
            return Err(DeviceError::HeaderMismatch { received });
        }

        Ok(buffer[CHANNEL_RSSI_RESPONSE_SIZE - 1])
    }

    /// Wait up to the packet timeout for one packet
    pub fn packet_read(&mut self) -> Result<Option<Packet>, DeviceError> {
        packet::read_packet(
            self.framer.transport_mut(),
            self.config.packet_max_size as usize,
            self.config.read_timeout_packet_ms,
            self.config.rssi_packet,
        )
    }

    pub fn packet_write(&mut self, data: &[u8]) -> Result<(), DeviceError> {
        packet::write_packet(
            self.framer.transport_mut(),
            data,
            self.config.packet_max_size as usize,
        )
    }

    /// Run the startup sequence, leaving the module in transfer mode
    pub fn start(&mut self) -> Result<(), DeviceError> {
        self.mode_config()?;
        self.info_read()?;
        self.config_read_and_update()?;
        self.mode_transfer()?;
        Ok(())
    }

    /// Read packets until `running` is cleared
    ///
    /// Idle reads may be followed by a channel RSSI scan according to
    /// `policy`. Errors are logged and the loop carries on. The flag is
    /// checked between operations, so an in-flight read always completes.
    pub fn run<C, F>(
        &mut self,
        running: &AtomicBool,
        clock: &C,
        policy: ChannelRssiPolicy,
        mut on_event: F,
    ) where
        C: Clock,
        F: FnMut(LoopEvent),
    {
        debug!("device: packet read (with periodic channel_rssi)");

        let mut interval = match policy {
            ChannelRssiPolicy::Every(period_ms) => Some(Interval::new(period_ms)),
            _ => None,
        };
        if let Some(interval) = interval.as_mut() {
            interval.passed(clock.now_ms());
        }

        while running.load(Ordering::Relaxed) {
            match self.packet_read() {
                Ok(Some(packet)) => {
                    if running.load(Ordering::Relaxed) {
                        on_event(LoopEvent::Packet(packet));
                    }
                    continue;
                }
                Ok(None) => {}
                Err(e) => error!("device: packet_read: {}", e),
            }

            if !running.load(Ordering::Relaxed) {
                break;
            }

            let scan = match (policy, interval.as_mut()) {
                (ChannelRssiPolicy::Never, _) => false,
                (ChannelRssiPolicy::EveryIdle, _) => true,
                (ChannelRssiPolicy::Every(_), Some(interval)) => {
                    interval.passed(clock.now_ms()).is_some()
                }
                (ChannelRssiPolicy::Every(_), None) => false,
            };
            if scan {
                match self.channel_rssi_read() {
                    Ok(rssi) if running.load(Ordering::Relaxed) => {
                        on_event(LoopEvent::ChannelRssi(rssi))
                    }
                    Ok(_) => {}
                    Err(e) => error!("device: channel_rssi_read: {}", e),
                }
            }
        }

        debug!("device: packet loop stopped");
    }

    /// End the session and give back the link, delay and mode switch
    pub fn disconnect(self) -> (T, D, M) {
        debug!("device: disconnect");
        let (transport, delay) = self.framer.release();
        (transport, delay, self.mode_control)
    }
}
