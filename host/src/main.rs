//! Interactive monitor for an E22 USB module.
//!
//! Brings the module up with the requested configuration, then prints every
//! received packet and a channel RSSI reading whenever the link is idle.
//! Stops on Ctrl-C or SIGTERM.

mod cli;
mod display;
mod serial;

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use anyhow::Context;
use clap::Parser;
use colored::Colorize;
use e22_lora::{ChannelRssiPolicy, DeviceSession, LoopEvent, ModuleKind, Packet, SoftwareModeSwitch};

use cli::{init_logging, DeviceArgs};
use display::hexdump;
use serial::{SerialTransport, StdClock, StdDelay};

#[derive(Parser)]
#[command(name = "e22-monitor")]
#[command(about = "Display packets and channel RSSI from an E22 USB module")]
struct Args {
    #[command(flatten)]
    device: DeviceArgs,

    /// Debug logging
    #[arg(short, long)]
    verbose: bool,
}

fn print_packet(packet: &Packet, kind: ModuleKind) {
    let mut header = format!("device: packet: size={}", packet.len());
    if let Some(rssi) = packet.rssi {
        header.push_str(&format!(", rssi={} dBm", kind.rssi_dbm(rssi)));
    }
    println!("{}", header.cyan());
    for line in hexdump(&packet.data, "    ") {
        println!("{}", line);
    }
}

/// Scan on every idle read, unless channel RSSI is switched off
fn scan_policy(device: &DeviceArgs) -> ChannelRssiPolicy {
    if device.rssi_channel {
        ChannelRssiPolicy::EveryIdle
    } else {
        ChannelRssiPolicy::Never
    }
}

fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    init_logging(args.verbose);

    println!("{}", "E22 Monitor".bold());
    println!("Port: {}", args.device.port);
    println!("Baud: {}", args.device.baud);
    println!();

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
    println!("{}", "Module ready, waiting for packets (Ctrl-C to stop)".green());

    let kind = session.kind();
    let clock = StdClock::new();
    let policy = scan_policy(&args.device);
    session.run(&running, &clock, policy, |event| match event {
        LoopEvent::Packet(packet) => print_packet(&packet, kind),
        LoopEvent::ChannelRssi(raw) => {
            println!("{}", format!("device: rssi-channel: {} dBm", kind.rssi_dbm(raw)).dimmed())
        }
    });

    session.disconnect();
    println!("{}", "Stopped".yellow());
    Ok(())
}
