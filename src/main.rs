#![no_std]
#![no_main]

// Required for ESP-IDF bootloader compatibility
// Use explicit parameters to ensure correct efuse block revision values
esp_bootloader_esp_idf::esp_app_desc!(
    env!("CARGO_PKG_VERSION"),  // version
    env!("CARGO_PKG_NAME"),     // project_name
    "00:00:00",                 // build_time
    "2025-01-01",               // build_date
    "0.0.0",                    // idf_ver (not using IDF)
    0x10000,                    // mmu_page_size (64KB)
    0,                          // min_efuse_blk_rev_full (accept all)
    u16::MAX                    // max_efuse_blk_rev_full (accept all)
);

use core::fmt::Write;

use e22_lora::clock::{Clock, Interval};
use e22_lora::config::serial::BAUD_RATE;
use e22_lora::config::timing::READY_POLL_EMBEDDED_MS;
use e22_lora::{DeviceConfig, DeviceSession, PinModeSwitch, Transport, TransportError};
use embedded_hal::delay::DelayNs;
use esp_backtrace as _;
use esp_hal::delay::Delay;
use esp_hal::gpio::{Input, InputConfig, Level, Output, OutputConfig, Pull};
use esp_hal::time::Instant;
use esp_hal::uart::{Config as UartConfig, Uart};
use esp_hal::Blocking;
use heapless::String;
use log::{error, info};

/// Channel RSSI scan period
const SCAN_PERIOD_MS: u32 = 5 * 1000;

/// Ping transmit period
const PING_PERIOD_MS: u64 = 30 * 1000;

/// Wait for the USB console to attach before logging anything
const STARTUP_DELAY_MS: u32 = 5 * 1000;

/// UART1 wired to the module's TXD/RXD
struct UartTransport<'d> {
    uart: Uart<'d, Blocking>,
}

impl Transport for UartTransport<'_> {
    fn write(&mut self, data: &[u8]) -> Result<usize, TransportError> {
        let mut written = 0;
        while written < data.len() {
            match self.uart.write(&data[written..]) {
                Ok(0) => break,
                Ok(count) => written += count,
                Err(_) => return Err(TransportError::WriteFailed),
            }
        }
        self.uart.flush().map_err(|_| TransportError::WriteFailed)?;
        Ok(written)
    }

    fn read(&mut self, buf: &mut [u8], timeout_ms: u32) -> Result<usize, TransportError> {
        let start = Instant::now();
        let mut received = 0;
        while received < buf.len() {
            if self.uart.read_ready() {
                received += self
                    .uart
                    .read(&mut buf[received..])
                    .map_err(|_| TransportError::ReadFailed)?;
            } else if start.elapsed().as_millis() >= timeout_ms as u64 {
                break;
            }
        }
        Ok(received)
    }

    fn flush(&mut self) -> Result<(), TransportError> {
        let mut scratch = [0u8; 32];
        while self.uart.read_ready() {
            self.uart
                .read(&mut scratch)
                .map_err(|_| TransportError::FlushFailed)?;
        }
        Ok(())
    }
}

/// Milliseconds since boot
struct BootClock;

impl Clock for BootClock {
    fn now_ms(&self) -> u64 {
        Instant::now().duration_since_epoch().as_millis()
    }
}

fn halt(delay: &mut Delay) -> ! {
    loop {
        delay.delay_ms(100);
    }
}

#[esp_hal::main]
fn main() -> ! {
    let peripherals = esp_hal::init(esp_hal::Config::default());
    esp_println::logger::init_logger(log::LevelFilter::Info);

    let mut delay = Delay::new();
    delay.delay_ms(STARTUP_DELAY_MS);
    info!("UP");

    // Select lines start high (sleep) until the first mode switch
    let m0 = Output::new(peripherals.GPIO5, Level::High, OutputConfig::default());
    let m1 = Output::new(peripherals.GPIO6, Level::High, OutputConfig::default());
    let aux = Input::new(peripherals.GPIO21, InputConfig::default().with_pull(Pull::Up));
    let mode_switch = PinModeSwitch::new(m0, m1, aux).with_poll_ms(READY_POLL_EMBEDDED_MS);

    let uart = match Uart::new(
        peripherals.UART1,
        UartConfig::default().with_baudrate(BAUD_RATE),
    ) {
        Ok(uart) => uart.with_rx(peripherals.GPIO20).with_tx(peripherals.GPIO7),
        Err(e) => {
            error!("setup: uart configuration failed: {:?}", e);
            halt(&mut delay);
        }
    };

    // Channel 23 is 873.125 MHz
    let config = DeviceConfig {
        address: 0x0008,
        network: 0x00,
        channel: 0x17,
        ..DeviceConfig::default()
    };

    let mut session = match DeviceSession::connect(UartTransport { uart }, Delay::new(), mode_switch, config) {
        Ok(session) => session,
        Err(e) => {
            error!("setup: device_connect failed: {}", e);
            halt(&mut delay);
        }
    };
    if let Err(e) = session.start() {
        error!("setup: device_mode/info/config failed: {}", e);
        halt(&mut delay);
    }

    let mac = esp_hal::efuse::Efuse::read_base_mac_address();
    let mut source: String<17> = String::new();
    for (i, byte) in mac.iter().enumerate() {
        let separator = if i > 0 { ":" } else { "" };
        let _ = write!(source, "{}{:02x}", separator, byte);
    }

    let clock = BootClock;
    let mut ping = Interval::new(PING_PERIOD_MS);
    ping.passed(clock.now_ms());
    let mut counts: u32 = 1;

    loop {
        delay.delay_ms(SCAN_PERIOD_MS);

        match session.channel_rssi_read() {
            Ok(raw) => info!("device: rssi-channel: {} dBm", session.kind().rssi_dbm(raw)),
            Err(e) => error!("loop: device_channel_rssi_read failed: {}", e),
        }

        if ping.passed(clock.now_ms()).is_some() {
            let mut message: String<128> = String::new();
            let _ = write!(
                message,
                "{{\"ping\":{{\"source\":\"{}\",\"millis\":{},\"counts\":{}}}}}",
                source,
                clock.now_ms(),
                counts
            );
            counts += 1;

            info!("loop: device_packet_write <<<{}>>>", message);
            if let Err(e) = session.packet_write(message.as_bytes()) {
                error!("loop: device_packet_write failed: {}", e);
            }
        }
    }
}
