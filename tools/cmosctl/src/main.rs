//! Host-side control tool for the CMOS bank driver.
//!
//! Loads the driver into a simulated kernel and chip, then operates on the
//! published nodes the way a user process would.
//!
//! Usage:
//!   cmosctl check                           - Validate the configuration and print the banks
//!   cmosctl nodes                           - Load the driver and list its device nodes
//!   cmosctl dump --bank N                   - Hex dump a whole bank
//!   cmosctl read --bank N --offset O --count C
//!   cmosctl write --bank N --offset O BYTES...
//!   cmosctl fault --step STEP [--nth K]     - Fail a registration step and show the rollback

mod config;
mod host;

use std::path::PathBuf;

use anyhow::{Context, Result, bail};
use clap::{Parser, Subcommand};
use cmos_driver::config::TransferMode;
use cmos_driver_api::{OpenFlags, SEEK_SET};
use cmos_sim::{FaultPlan, SimStep};

use crate::config::Config;
use crate::host::Host;

/// Bytes per hex dump line.
const DUMP_WIDTH: usize = 16;

#[derive(Parser)]
#[command(name = "cmosctl")]
#[command(about = "Load the CMOS bank driver into a simulated host and use its nodes")]
struct Cli {
    /// Configuration file (default: two 128-register banks at 0x70 and 0x72)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Show driver log output (repeat for more detail)
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Validate the configuration and print the bank table
    Check,

    /// Load the driver and list the device nodes it publishes
    Nodes,

    /// Hex dump every register of a bank
    Dump {
        /// Bank index
        #[arg(short, long)]
        bank: u32,
    },

    /// Read registers from a bank
    Read {
        /// Bank index
        #[arg(short, long)]
        bank: u32,

        /// First register (decimal or 0x-prefixed hex)
        #[arg(short, long, default_value = "0", value_parser = parse_number)]
        offset: u64,

        /// Number of registers
        #[arg(short = 'n', long, default_value = "1", value_parser = parse_number)]
        count: u64,
    },

    /// Write registers to a bank and read them back
    Write {
        /// Bank index
        #[arg(short, long)]
        bank: u32,

        /// First register (decimal or 0x-prefixed hex)
        #[arg(short, long, default_value = "0", value_parser = parse_number)]
        offset: u64,

        /// Bytes to write (decimal or 0x-prefixed hex)
        #[arg(required = true, value_parser = parse_byte)]
        bytes: Vec<u8>,
    },

    /// Fail one registration step and show that everything was released
    Fault {
        /// Step to fail: alloc-region, class-create, charge-memory,
        /// request-region, cdev-add or device-create
        #[arg(short, long)]
        step: SimStep,

        /// Fail the K-th call of that step (1-based)
        #[arg(long, default_value_t = 1)]
        nth: u32,
    },
}

fn parse_number(s: &str) -> Result<u64, String> {
    let parsed = match s.strip_prefix("0x").or_else(|| s.strip_prefix("0X")) {
        Some(hex) => u64::from_str_radix(hex, 16),
        None => s.parse(),
    };
    parsed.map_err(|e| format!("invalid number `{s}`: {e}"))
}

fn parse_byte(s: &str) -> Result<u8, String> {
    let value = parse_number(s)?;
    u8::try_from(value).map_err(|_| format!("`{s}` does not fit in a byte"))
}

fn to_offset(offset: u64) -> Result<i64> {
    i64::try_from(offset).context("offset out of range")
}

/// Reads up to `count` registers of `bank` starting at `offset`.
///
/// The buffer never exceeds the bank, whatever `count` asks for.
fn read_registers(host: &Host, bank: u32, offset: u64, count: u64) -> Result<Vec<u8>> {
    let mut file = host.open(bank, OpenFlags::READ)?;
    let size = host.driver.bank(bank).map_or(0, |desc| desc.size());
    let len = usize::try_from(count.min(u64::from(size))).context("count out of range")?;

    file.seek(to_offset(offset)?, SEEK_SET)?;
    let mut buf = vec![0u8; len];
    let n = file.read(&mut buf)?;
    buf.truncate(n);
    Ok(buf)
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    host::init_logging(cli.verbose);
    let config = Config::load(cli.config.as_deref())?;

    match cli.command {
        Commands::Check => {
            let driver = &config.driver;
            let mode = match driver.mode {
                TransferMode::Indexed => "indexed",
                TransferMode::Placeholder => "placeholder",
            };
            println!("name: {}  mode: {mode}  banks: {}", driver.name, driver.bank_count());
            println!("{:<10} {:>6} {:>6} {:>5}", "node", "index", "data", "size");
            for (i, bank) in driver.banks.iter().enumerate() {
                println!(
                    "{:<10} {:#06x} {:#06x} {:>5}",
                    format!("{}{i}", driver.name),
                    bank.index_port,
                    bank.data_port,
                    bank.size
                );
            }
        }

        Commands::Nodes => {
            let host = Host::load(&config)?;
            for bank in host.driver.banks() {
                let dev = host
                    .kernel
                    .node_dev(bank.name())
                    .context("published node vanished")?;
                println!("/dev/{:<8} {dev:>8}  ports {}", bank.name(), bank.ports());
            }
        }

        Commands::Dump { bank } => {
            let host = Host::load(&config)?;
            let mut file = host.open(bank, OpenFlags::READ)?;
            let data = file.read_to_end()?;
            print_hex(0, &data);
        }

        Commands::Read {
            bank,
            offset,
            count,
        } => {
            let host = Host::load(&config)?;
            let data = read_registers(&host, bank, offset, count)?;
            print_hex(offset, &data);
        }

        Commands::Write {
            bank,
            offset,
            bytes,
        } => {
            let host = Host::load(&config)?;
            let mut file = host.open(bank, OpenFlags::READ_WRITE)?;
            file.seek(to_offset(offset)?, SEEK_SET)?;
            let written = file.write(&bytes)?;
            if written < bytes.len() {
                eprintln!("short write: {written} of {} bytes", bytes.len());
            }

            file.seek(to_offset(offset)?, SEEK_SET)?;
            let mut back = vec![0u8; written];
            let n = file.read(&mut back)?;
            print_hex(offset, &back[..n]);
        }

        Commands::Fault { step, nth } => {
            let mut host = Host::new(&config);
            host.kernel.inject(FaultPlan::new(step).nth(nth));

            println!("before: {}", host.kernel.census());
            match host.driver.initialize() {
                Ok(()) => println!("{step} call {nth} never happened; driver loaded"),
                Err(err) => println!("initialize failed ({}): {err}", err.errno()),
            }
            println!("after:  {}", host.kernel.census());

            host.driver.teardown();
            let violations = host.kernel.violations();
            for violation in &violations {
                eprintln!("violation: {violation}");
            }
            if !host.kernel.census().is_empty() || !violations.is_empty() {
                bail!("resources leaked after teardown: {}", host.kernel.census());
            }
        }
    }

    Ok(())
}

fn print_hex(start: u64, data: &[u8]) {
    for (line, chunk) in (0u64..).zip(data.chunks(DUMP_WIDTH)) {
        let hex: Vec<String> = chunk.iter().map(|b| format!("{b:02x}")).collect();
        let ascii: String = chunk
            .iter()
            .map(|&b| if b.is_ascii_graphic() { char::from(b) } else { '.' })
            .collect();
        println!(
            "{:04x}  {:<width$}  {ascii}",
            start + line * DUMP_WIDTH as u64,
            hex.join(" "),
            width = DUMP_WIDTH * 3 - 1
        );
    }
}
