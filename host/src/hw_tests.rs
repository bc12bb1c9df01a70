//! Hardware checks against a real E22 USB module.
//!
//! Runs the driver's operations in startup order and reports each one.
//! Leaves the module configured as requested on the command line.

mod cli;
mod serial;

use anyhow::Context;
use clap::Parser;
use colored::Colorize;
use e22_lora::config::frequency::FAMILY_900_CODE;
use e22_lora::{DeviceMode, DeviceSession, ErrorKind, SoftwareModeSwitch};

use cli::{init_logging, DeviceArgs};
use serial::{SerialTransport, StdDelay};

type Session = DeviceSession<SerialTransport, StdDelay, SoftwareModeSwitch>;

#[derive(Parser)]
#[command(name = "e22-hw-tests")]
#[command(about = "Hardware checks for an E22 USB module")]
struct Args {
    #[command(flatten)]
    device: DeviceArgs,

    /// Debug logging
    #[arg(short, long)]
    verbose: bool,
}

/// Test result.
struct TestResult {
    name: String,
    passed: bool,
    message: Option<String>,
}

impl TestResult {
    fn pass() -> Self {
        Self {
            name: String::new(),
            passed: true,
            message: None,
        }
    }

    fn fail(message: impl Into<String>) -> Self {
        Self {
            name: String::new(),
            passed: false,
            message: Some(message.into()),
        }
    }
}

/// Run a check and print its outcome as it happens.
fn run_test<F>(name: &str, session: &mut Session, test_fn: F) -> TestResult
where
    F: FnOnce(&mut Session) -> TestResult,
{
    print!("  {} ... ", name);
    std::io::Write::flush(&mut std::io::stdout()).ok();

    let mut result = test_fn(session);
    result.name = name.to_string();

    if result.passed {
        println!("{}", "PASS".green().bold());
    } else {
        println!("{}", "FAIL".red().bold());
        if let Some(msg) = &result.message {
            println!("    {}", msg.red());
        }
    }

    result
}

fn run_all_tests(session: &mut Session) -> Vec<TestResult> {
    vec![
        run_test("Enter config mode", session, test_mode_config),
        run_test("Product info is a 900 MHz module", session, test_product_info),
        run_test("Register block reads", session, test_registers_read),
        run_test("Configuration applies and verifies", session, test_config_update),
        run_test("Second update changes nothing", session, test_config_idempotent),
        run_test("Registers match requested config", session, test_registers_match),
        run_test("Enter transfer mode", session, test_mode_transfer),
        run_test("Channel RSSI scan answers", session, test_channel_rssi),
        run_test("Packet write", session, test_packet_write),
        run_test("Oversize packet rejected", session, test_packet_oversize),
        run_test("Packet read completes", session, test_packet_read),
    ]
}

/// Summary table of every check.
fn print_results(results: &[TestResult]) {
    let rule = "=".repeat(60);
    println!("\n{}\n{}\n{}", rule, "Hardware Check Summary".bold(), rule);

    for result in results {
        let tag = if result.passed {
            "[PASS]".green().bold()
        } else {
            "[FAIL]".red().bold()
        };
        println!("  {} {}", tag, result.name);
        if let Some(msg) = &result.message {
            println!("         {}", msg.red());
        }
    }

    let failed = results.iter().filter(|r| !r.passed).count();
    let passed = results.len() - failed;
    let failed_text = if failed > 0 {
        failed.to_string().red()
    } else {
        failed.to_string().normal()
    };
    println!("{}", "-".repeat(60));
    println!("  {} passed, {} failed", passed.to_string().green(), failed_text);
    println!("{}", rule);
}

// --- Individual Tests ---

fn test_mode_config(session: &mut Session) -> TestResult {
    match session.mode_config() {
        Ok(()) if session.mode() == Some(DeviceMode::Config) => TestResult::pass(),
        Ok(()) => TestResult::fail(format!("mode is {:?}", session.mode())),
        Err(e) => TestResult::fail(format!("Error: {}", e)),
    }
}

fn test_product_info(session: &mut Session) -> TestResult {
    match session.info_read() {
        Ok(info) if info.frequency == FAMILY_900_CODE => {
            print!("({:04X} v{}) ", info.name, info.version);
            TestResult::pass()
        }
        Ok(info) => TestResult::fail(format!("Unexpected frequency family: {}", info)),
        Err(e) => TestResult::fail(format!("Error: {}", e)),
    }
}

fn test_registers_read(session: &mut Session) -> TestResult {
    match session.registers_read() {
        Ok(_) => TestResult::pass(),
        Err(e) => TestResult::fail(format!("Error: {}", e)),
    }
}

fn test_config_update(session: &mut Session) -> TestResult {
    match session.config_read_and_update() {
        Ok(changed) => {
            print!("({}) ", if changed { "written" } else { "unchanged" });
            TestResult::pass()
        }
        Err(e) => TestResult::fail(format!("Error: {}", e)),
    }
}

fn test_config_idempotent(session: &mut Session) -> TestResult {
    match session.config_read_and_update() {
        Ok(false) => TestResult::pass(),
        Ok(true) => TestResult::fail("Registers were written again"),
        Err(e) => TestResult::fail(format!("Error: {}", e)),
    }
}

fn test_registers_match(session: &mut Session) -> TestResult {
    let registers = match session.registers_read() {
        Ok(registers) => registers,
        Err(e) => return TestResult::fail(format!("Error: {}", e)),
    };
    let config = session.config();
    if registers.address() != config.address {
        return TestResult::fail(format!(
            "address 0x{:04X} != 0x{:04X}",
            registers.address(),
            config.address
        ));
    }
    if registers.network() != config.network {
        return TestResult::fail(format!(
            "network 0x{:02X} != 0x{:02X}",
            registers.network(),
            config.network
        ));
    }
    if registers.channel() != config.channel {
        return TestResult::fail(format!(
            "channel {} != {}",
            registers.channel(),
            config.channel
        ));
    }
    TestResult::pass()
}

fn test_mode_transfer(session: &mut Session) -> TestResult {
    match session.mode_transfer() {
        Ok(()) if session.mode() == Some(DeviceMode::Transfer) => TestResult::pass(),
        Ok(()) => TestResult::fail(format!("mode is {:?}", session.mode())),
        Err(e) => TestResult::fail(format!("Error: {}", e)),
    }
}

fn test_channel_rssi(session: &mut Session) -> TestResult {
    if !session.config().rssi_channel {
        print!("(disabled) ");
        return TestResult::pass();
    }
    match session.channel_rssi_read() {
        Ok(raw) => {
            print!("({} dBm) ", session.kind().rssi_dbm(raw));
            TestResult::pass()
        }
        Err(e) => TestResult::fail(format!("Error: {}", e)),
    }
}

fn test_packet_write(session: &mut Session) -> TestResult {
    match session.packet_write(b"{\"e22-hw-tests\":\"ping\"}") {
        Ok(()) => TestResult::pass(),
        Err(e) => TestResult::fail(format!("Error: {}", e)),
    }
}

fn test_packet_oversize(session: &mut Session) -> TestResult {
    let oversize = vec![0x55u8; session.config().packet_max_size as usize + 1];
    match session.packet_write(&oversize) {
        Err(e) if e.kind() == ErrorKind::ConfigInvalid => TestResult::pass(),
        Err(e) => TestResult::fail(format!("Unexpected error: {}", e)),
        Ok(()) => TestResult::fail("Oversize packet was sent"),
    }
}

fn test_packet_read(session: &mut Session) -> TestResult {
    match session.packet_read() {
        Ok(Some(packet)) => {
            print!("({} bytes) ", packet.len());
            TestResult::pass()
        }
        Ok(None) => {
            print!("(timeout) ");
            TestResult::pass()
        }
        Err(e) => TestResult::fail(format!("Error: {}", e)),
    }
}

fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    init_logging(args.verbose);

    println!("{}", "E22 Hardware Tests".bold());
    println!("Port: {}", args.device.port);
    println!("Baud: {}", args.device.baud);
    println!();

    println!("Connecting to module...");
    let transport = SerialTransport::open(&args.device.port, args.device.baud)?;
    let mut session = DeviceSession::connect(
        transport,
        StdDelay,
        SoftwareModeSwitch::new(),
        args.device.device_config(),
    )
    .context("device connect failed")?;
    println!("{}", "Connected!".green());

    println!("\nRunning tests...\n");

    let results = run_all_tests(&mut session);
    print_results(&results);

    session.disconnect();

    // Exit with error code if any tests failed
    let failed = results.iter().filter(|r| !r.passed).count();
    if failed > 0 {
        std::process::exit(1);
    }

    Ok(())
}
