//! E22 module driver
//!
//! Mode switching, register management, packet I/O and the session that
//! sequences them.

pub mod error;
pub mod mode;
pub mod packet;
pub mod registers;
pub mod session;
pub mod settings;

pub use error::{ConfigError, DeviceError, ErrorKind};
pub use mode::{DeviceMode, ModeControl, PinModeSwitch, SoftwareModeSwitch};
pub use packet::Packet;
pub use registers::RegisterBlock;
pub use session::{ChannelRssiPolicy, DeviceSession, LoopEvent};
pub use settings::{DeviceConfig, ModuleKind};
