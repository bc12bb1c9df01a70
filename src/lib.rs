#![cfg_attr(not(test), no_std)]

//! Command/response driver for EBYTE E22 LoRa modules
//!
//! The driver talks to the module over any [`Transport`], switches modes
//! through a [`ModeControl`] (software command for USB dongles, M0/M1/AUX
//! pins for DIP modules) and keeps the module's registers in line with a
//! [`DeviceConfig`]. The [`bridge`] forwards received packets to a message
//! bus publisher.

pub mod bridge;
pub mod clock;
pub mod config;
pub mod device;
pub mod protocol;
pub mod transport;

pub use clock::{Clock, Interval};
pub use device::{
    ChannelRssiPolicy, DeviceConfig, DeviceError, DeviceMode, DeviceSession, ErrorKind,
    LoopEvent, ModeControl, ModuleKind, Packet, PinModeSwitch, RegisterBlock,
    SoftwareModeSwitch,
};
pub use protocol::ProductInfo;
pub use transport::{Transport, TransportError};
