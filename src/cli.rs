//! Command-line surface: subcommands derived with `clap`.

use clap::{Parser, Subcommand};

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Args {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Load a config, optionally replay a trace file, and run the simulator.
    Run(RunArgs),
    /// Parse and validate a config file without running a simulation.
    ValidateConfig(ValidateConfigArgs),
}

#[derive(Parser, Debug, Clone)]
pub struct RunArgs {
    #[arg(short, long)]
    pub config: String,

    /// Number of cycles to run. If omitted, runs until the trace file (and
    /// its in-flight completions) drain.
    #[arg(long)]
    pub cycles: Option<u64>,

    /// Trace file of `KIND vAddr [payload]` lines, one transaction per line.
    #[arg(short, long)]
    pub trace: Option<String>,
}

#[derive(Parser, Debug, Clone)]
pub struct ValidateConfigArgs {
    #[arg(short, long)]
    pub config: String,
}
