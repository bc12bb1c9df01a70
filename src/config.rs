//! Protocol constants and configuration defaults for E22 modules

/// Command frame layout and fixed command bytes
pub mod protocol {
    /// Request header for writes and software commands
    pub const HEADER_WRITE: u8 = 0xC0;
    /// Request header for reads, and the header of every response
    pub const HEADER_READ: u8 = 0xC1;

    /// `[header][addr][length]`
    pub const HEADER_SIZE: usize = 3;
    pub const HEADER_LENGTH_OFFSET: usize = 2;

    /// Largest response the framer will accept (header + payload)
    pub const MAX_RESPONSE_SIZE: usize = 64;
    /// Largest payload carried by any command response
    pub const MAX_RESPONSE_PAYLOAD: usize = MAX_RESPONSE_SIZE - HEADER_SIZE;

    /// Product information block
    pub const PRODUCT_INFO_ADDR: u8 = 0x80;
    pub const PRODUCT_INFO_SIZE: usize = 7;

    /// Module register block
    pub const REGISTER_ADDR: u8 = 0x00;
    pub const REGISTER_SIZE: usize = 9;
    pub const REGISTER_WRITE_SIZE: usize = 7;

    /// Software mode switch response: `[C1 C2 C3 02 mode]`
    pub const MODE_SWITCH_RESPONSE_SIZE: usize = 5;
    pub const MODE_SWITCH_SENTINEL_SIZE: usize = 3;

    /// Channel RSSI scan response: `[C1 00 01 rssi]`
    pub const CHANNEL_RSSI_RESPONSE_SIZE: usize = 4;
}

/// Timing constraints imposed by the module
pub mod timing {
    /// Pause before every command so the module can finish the previous one
    pub const COMMAND_DELAY_MS: u32 = 300;

    /// Maximum wait for AUX to go high
    pub const READY_TIMEOUT_MS: u32 = 30 * 1000;
    /// AUX polling step on hosts
    pub const READY_POLL_MS: u32 = 1;
    /// AUX polling step on the embedded front end
    pub const READY_POLL_EMBEDDED_MS: u32 = 500;
    /// Pause after AUX rises, when we had to wait for it
    pub const READY_SETTLE_MS: u32 = 50;

    /// Pause between a register write and its verification read
    pub const WRITE_SETTLE_MS: u32 = 50;
}

/// Packet size and air rate limits
pub mod limits {
    pub const PACKET_SIZES: [u8; 4] = [32, 64, 128, 240];
    pub const MAX_PACKET_SIZE: usize = 240;
    /// Room for the trailing RSSI byte
    pub const MAX_PACKET_BUFFER: usize = MAX_PACKET_SIZE + 1;

    /// Air data rate codes in kbps (62 stands for 62.5)
    pub const PACKET_RATES: [u8; 6] = [2, 4, 9, 19, 38, 62];
    pub const MAX_PACKET_RATE: u8 = 62;

    pub const WOR_CYCLE_MIN_MS: u16 = 500;
    pub const WOR_CYCLE_MAX_MS: u16 = 4000;
    pub const WOR_CYCLE_STEP_MS: u16 = 500;

    pub const TRANSMIT_POWER_MAX: u8 = 3;
}

/// Default module configuration
pub mod defaults {
    pub const ADDRESS: u16 = 0x0000;
    pub const NETWORK: u8 = 0x00;
    /// Channel 0 (850.125 MHz on the 900 MHz family)
    pub const CHANNEL: u8 = 0x00;
    pub const LISTEN_BEFORE_TRANSMIT: bool = true;
    pub const RSSI_PACKET: bool = true;
    pub const RSSI_CHANNEL: bool = true;
    pub const READ_TIMEOUT_COMMAND_MS: u32 = 1000;
    pub const READ_TIMEOUT_PACKET_MS: u32 = 5000;
    pub const PACKET_MAX_SIZE: u8 = 240;
    pub const PACKET_MAX_RATE: u8 = 2;
    pub const CRYPT: u16 = 0x0000;
    pub const WOR_ENABLED: bool = false;
    pub const WOR_CYCLE_MS: u16 = 2000;
    pub const TRANSMIT_POWER: u8 = 3;
}

/// Frequency plan per module family
pub mod frequency {
    /// Product info frequency code of the 900 MHz family
    pub const FAMILY_900_CODE: u8 = 11;
    /// 850.125 MHz
    pub const FAMILY_900_BASE_KHZ: u32 = 850_125;
    pub const FAMILY_900_STEP_KHZ: u32 = 1_000;
}

/// Serial defaults for the module's UART
pub mod serial {
    pub const BAUD_RATE: u32 = 9600;
}
