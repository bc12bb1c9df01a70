//! Config/transfer mode switching
//!
//! USB dongles switch modes with a software command. DIP modules switch
//! with the M0/M1 select lines and report readiness on AUX. Both are
//! reached through [`ModeControl`], chosen when the session is built.

use core::fmt;

use embedded_hal::delay::DelayNs;
use embedded_hal::digital::{InputPin, OutputPin};
use log::{error, warn};

use crate::config::protocol::{MODE_SWITCH_RESPONSE_SIZE, MODE_SWITCH_SENTINEL_SIZE};
use crate::config::timing::{READY_POLL_MS, READY_SETTLE_MS, READY_TIMEOUT_MS};
use crate::device::error::{DeviceError, HeaderBytes, ReadyStage};
use crate::device::settings::ModuleKind;
use crate::protocol::commands::{
    MODE_SWITCH_ALREADY_SENTINEL, MODE_SWITCH_CONFIG, MODE_SWITCH_RESPONSE_HEADER,
    MODE_SWITCH_TRANSFER,
};
use crate::protocol::framing::CommandFramer;
use crate::transport::Transport;

/// Operating mode of the module
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeviceMode {
    /// Registers can be read and written
    Config,
    /// Bytes on the link are sent and received over the air
    Transfer,
}

impl fmt::Display for DeviceMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DeviceMode::Config => f.write_str("config"),
            DeviceMode::Transfer => f.write_str("transfer"),
        }
    }
}

/// Capability to move the module between modes
pub trait ModeControl {
    /// Module variant this switch drives, which also decides RSSI decoding
    fn kind(&self) -> ModuleKind;

    /// Switch synchronously to `mode`
    fn switch_to<T: Transport, D: DelayNs>(
        &mut self,
        framer: &mut CommandFramer<T, D>,
        mode: DeviceMode,
    ) -> Result<(), DeviceError>;
}

/// Software mode switch used by USB dongles
#[derive(Debug, Default, Clone, Copy)]
pub struct SoftwareModeSwitch;

impl SoftwareModeSwitch {
    pub fn new() -> Self {
        Self
    }
}

impl ModeControl for SoftwareModeSwitch {
    fn kind(&self) -> ModuleKind {
        ModuleKind::Usb
    }

    fn switch_to<T: Transport, D: DelayNs>(
        &mut self,
        framer: &mut CommandFramer<T, D>,
        mode: DeviceMode,
    ) -> Result<(), DeviceError> {
        const NAME: &str = "mode_switch_software";

        let command = match mode {
            DeviceMode::Config => &MODE_SWITCH_CONFIG,
            DeviceMode::Transfer => &MODE_SWITCH_TRANSFER,
        };

        framer.flush()?;
        if let Err(e) = framer.send_command(command) {
            error!("device: {}: failed to send command: {}", NAME, e);
            return Err(e);
        }

        let mut buffer = [0u8; MODE_SWITCH_RESPONSE_SIZE];
        let received = framer.receive(&mut buffer)?;

        // Undocumented: some dongles answer FF FF FF when no switch is needed
        if received == MODE_SWITCH_SENTINEL_SIZE
            && buffer[..MODE_SWITCH_SENTINEL_SIZE] == MODE_SWITCH_ALREADY_SENTINEL
        {
            warn!(
                "device: {}: already appears to be in {} mode, will accept",
                NAME, mode
            );
            return Ok(());
        }

        if received < MODE_SWITCH_RESPONSE_SIZE {
            error!(
                "device: {}: failed, received {} bytes, expected {} bytes",
                NAME, received, MODE_SWITCH_RESPONSE_SIZE
            );
            return Err(DeviceError::ResponseTooShort {
                received,
                expected: MODE_SWITCH_RESPONSE_SIZE,
            });
        }

        let header = &buffer[..MODE_SWITCH_RESPONSE_HEADER.len()];
        if header != MODE_SWITCH_RESPONSE_HEADER {
            let received = HeaderBytes::new(header);
            error!("device: {}: invalid response header: {}", NAME, received);
            return Err(DeviceError::HeaderMismatch { received });
        }

        Ok(())
    }
}

/// Pin driven mode switch used by DIP modules
///
/// M0 and M1 select the mode, AUX is high while the module is idle.
pub struct PinModeSwitch<M0, M1, AUX> {
    m0: M0,
    m1: M1,
    aux: AUX,
    poll_ms: u32,
    timeout_ms: u32,
}

impl<M0, M1, AUX> PinModeSwitch<M0, M1, AUX>
where
    M0: OutputPin,
    M1: OutputPin,
    AUX: InputPin,
{
    /// Create a switch polling AUX every millisecond for up to 30 seconds
    pub fn new(m0: M0, m1: M1, aux: AUX) -> Self {
        Self {
            m0,
            m1,
            aux,
            poll_ms: READY_POLL_MS,
            timeout_ms: READY_TIMEOUT_MS,
        }
    }

    /// Poll AUX at a coarser step
    pub fn with_poll_ms(mut self, poll_ms: u32) -> Self {
        self.poll_ms = poll_ms.max(1);
        self
    }

    pub fn with_timeout_ms(mut self, timeout_ms: u32) -> Self {
        self.timeout_ms = timeout_ms;
        self
    }

    /// Give back the pins
    pub fn release(self) -> (M0, M1, AUX) {
        (self.m0, self.m1, self.aux)
    }

    /// Wait until AUX is high
    ///
    /// Returns `false` on timeout. Settles briefly if any wait happened.
    pub fn wait_ready<D: DelayNs>(&mut self, delay: &mut D) -> Result<bool, DeviceError> {
        let mut waited_ms: u32 = 0;
        while !self.aux.is_high().map_err(|_| DeviceError::PinFailed)? {
            waited_ms = waited_ms.saturating_add(self.poll_ms);
            if waited_ms > self.timeout_ms {
                return Ok(false);
            }
            delay.delay_ms(self.poll_ms);
        }
        if waited_ms > 0 {
            delay.delay_ms(READY_SETTLE_MS);
        }
        Ok(true)
    }

    fn set_select(&mut self, m0: bool, m1: bool) -> Result<(), DeviceError> {
        if m0 {
            self.m0.set_high().map_err(|_| DeviceError::PinFailed)?;
        } else {
            self.m0.set_low().map_err(|_| DeviceError::PinFailed)?;
        }
        if m1 {
            self.m1.set_high().map_err(|_| DeviceError::PinFailed)?;
        } else {
            self.m1.set_low().map_err(|_| DeviceError::PinFailed)?;
        }
        Ok(())
    }
}

impl<M0, M1, AUX> ModeControl for PinModeSwitch<M0, M1, AUX>
where
    M0: OutputPin,
    M1: OutputPin,
    AUX: InputPin,
{
    fn kind(&self) -> ModuleKind {
        ModuleKind::Dip
    }

    fn switch_to<T: Transport, D: DelayNs>(
        &mut self,
        framer: &mut CommandFramer<T, D>,
        mode: DeviceMode,
    ) -> Result<(), DeviceError> {
        const NAME: &str = "mode_switch_hardware";

        if !self.wait_ready(framer.delay_mut())? {
            error!("device: {}: wait_ready timeout (pre switch)", NAME);
            return Err(DeviceError::ReadyTimeout {
                stage: ReadyStage::PreSwitch,
            });
        }

        match mode {
            DeviceMode::Config => self.set_select(false, true)?,
            DeviceMode::Transfer => self.set_select(false, false)?,
        }

        if !self.wait_ready(framer.delay_mut())? {
            error!("device: {}: wait_ready timeout (post switch)", NAME);
            return Err(DeviceError::ReadyTimeout {
                stage: ReadyStage::PostSwitch,
            });
        }

        Ok(())
    }
}

#[cfg(test)]
pub mod mock {
    //! Mock mode pins for testing

    use embedded_hal::digital::{ErrorKind, ErrorType, InputPin, OutputPin};
    use std::cell::RefCell;
    use std::collections::VecDeque;
    use std::rc::Rc;
    use std::vec::Vec;

    /// Shared record of every level written to a select line
    pub type PinLog = Rc<RefCell<Vec<(&'static str, bool)>>>;

    /// Output pin that records its writes
    pub struct MockOutputPin {
        name: &'static str,
        log: PinLog,
        fail: bool,
    }

    impl MockOutputPin {
        pub fn new(name: &'static str, log: PinLog) -> Self {
            Self {
                name,
                log,
                fail: false,
            }
        }

        /// A pin whose writes always fail
        pub fn failing(name: &'static str, log: PinLog) -> Self {
            Self {
                name,
                log,
                fail: true,
            }
        }

        fn record(&mut self, level: bool) -> Result<(), ErrorKind> {
            if self.fail {
                return Err(ErrorKind::Other);
            }
            self.log.borrow_mut().push((self.name, level));
            Ok(())
        }
    }

    impl ErrorType for MockOutputPin {
        type Error = ErrorKind;
    }

    impl OutputPin for MockOutputPin {
        fn set_low(&mut self) -> Result<(), Self::Error> {
            self.record(false)
        }

        fn set_high(&mut self) -> Result<(), Self::Error> {
            self.record(true)
        }
    }

    /// AUX pin returning scripted levels, then a fixed idle level
    pub struct MockAuxPin {
        levels: VecDeque<bool>,
        idle: bool,
        reads: usize,
    }

    impl MockAuxPin {
        /// Always ready
        pub fn ready() -> Self {
            Self::scripted(&[], true)
        }

        /// Never ready
        pub fn stuck_low() -> Self {
            Self::scripted(&[], false)
        }

        pub fn scripted(levels: &[bool], idle: bool) -> Self {
            Self {
                levels: levels.iter().copied().collect(),
                idle,
                reads: 0,
            }
        }

        pub fn reads(&self) -> usize {
            self.reads
        }
    }

    impl ErrorType for MockAuxPin {
        type Error = ErrorKind;
    }

    impl InputPin for MockAuxPin {
        fn is_high(&mut self) -> Result<bool, Self::Error> {
            self.reads += 1;
            Ok(self.levels.pop_front().unwrap_or(self.idle))
        }

        fn is_low(&mut self) -> Result<bool, Self::Error> {
            self.is_high().map(|high| !high)
        }
    }

    pub fn pin_log() -> PinLog {
        Rc::new(RefCell::new(Vec::new()))
    }
}
