#[macro_use]
extern crate log;

use std::io::BufRead;

use anyhow::{Context, Result};
use clap::Parser;

use nvsim::{Args, Commands, Config, Device, RunArgs, Transaction, ValidateConfigArgs};

fn main() -> Result<()> {
    env_logger::init();
    let args = Args::parse();
    match args.command {
        Commands::Run(run_args) => run(run_args),
        Commands::ValidateConfig(validate_args) => validate_config(validate_args),
    }
}

fn validate_config(args: ValidateConfigArgs) -> Result<()> {
    match Config::from_path(&args.config) {
        Ok(_) => {
            info!("{} is a valid configuration", args.config);
            Ok(())
        }
        Err(err) => {
            eprintln!("invalid configuration: {err}");
            std::process::exit(1);
        }
    }
}

fn run(args: RunArgs) -> Result<()> {
    let config = Config::from_path(&args.config)
        .with_context(|| format!("loading config from {}", args.config))?;
    let mut device = Device::new(config)?;

    let trace = match &args.trace {
        Some(path) => load_trace(path)?,
        None => Vec::new(),
    };
    let trace_len = trace.len();
    for txn in trace {
        device.add(txn);
    }

    let cycles = args.cycles.unwrap_or_else(|| default_cycles(trace_len));
    let events = device.run(cycles)?;
    info!(
        "ran {cycles} cycles, {} harness events, {} accesses logged",
        events.len(),
        device.stats().num_accesses()
    );

    device.save_log();
    Ok(())
}

/// Without an explicit `--cycles`, run long enough for a trace of this
/// length to plausibly drain; this is a rough heuristic for the minimal
/// harness, not a precision scheduling guarantee.
fn default_cycles(trace_len: usize) -> u64 {
    (trace_len as u64 + 1) * 1000
}

/// Parse a trace file of `KIND vAddr [payload]` lines (`READ`/`WRITE`/`ERASE`,
/// hex or decimal addresses) into transactions.
fn load_trace(path: &str) -> Result<Vec<Transaction>> {
    let file = std::fs::File::open(path).with_context(|| format!("opening trace file {path}"))?;
    let reader = std::io::BufReader::new(file);
    let mut transactions = Vec::new();
    for (lineno, line) in reader.lines().enumerate() {
        let line = line?;
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        let mut fields = line.split_whitespace();
        let kind = fields.next().with_context(|| format!("trace line {}: missing kind", lineno + 1))?;
        let v_addr_str = fields
            .next()
            .with_context(|| format!("trace line {}: missing address", lineno + 1))?;
        let v_addr = parse_number(v_addr_str)
            .with_context(|| format!("trace line {}: invalid address `{v_addr_str}`", lineno + 1))?;
        let payload = match fields.next() {
            Some(raw) => parse_number(raw).with_context(|| format!("trace line {}: invalid payload `{raw}`", lineno + 1))?,
            None => 0,
        };
        let txn = match kind.to_ascii_uppercase().as_str() {
            "READ" => Transaction::read(v_addr),
            "WRITE" => Transaction::write(v_addr, payload),
            "ERASE" => Transaction::block_erase(v_addr),
            other => anyhow::bail!("trace line {}: unknown transaction kind `{other}`", lineno + 1),
        };
        transactions.push(txn);
    }
    Ok(transactions)
}

fn parse_number(s: &str) -> Result<u64, std::num::ParseIntError> {
    match s.get(0..2) {
        Some("0x") => u64::from_str_radix(&s[2..], 16),
        _ => s.parse::<u64>(),
    }
}
