//! Command-line argument definitions.

use std::path::PathBuf;

use clap::{Parser, Subcommand};

#[derive(Parser)]
#[command(name = "hollowscan")]
#[command(about = "Recover PE artefacts from hollowed or manually mapped memory")]
#[command(version)]
pub struct Args {
    /// Scanner configuration (TOML)
    #[arg(short, long, global = true, env = "HOLLOWSCAN_CONFIG")]
    pub config: Option<PathBuf>,

    /// Print the outcome as JSON
    #[arg(long, global = true)]
    pub json: bool,

    /// Enable debug logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand)]
pub enum Command {
    /// Scan the region containing an address in a live process (Windows)
    Scan {
        /// Target process ID
        #[arg(short, long)]
        pid: u32,

        /// Address inside the region to scan (hex)
        #[arg(short, long)]
        address: String,
    },

    /// Scan a raw memory dump offline
    Inspect {
        /// Dump file holding one allocation's bytes
        #[arg(short, long)]
        file: PathBuf,

        /// Address the dump was taken from (hex)
        #[arg(short, long)]
        base: String,

        /// Offset of the scanned region within the dump (hex)
        #[arg(short, long, default_value = "0")]
        region_offset: String,

        /// Protection flags to report for the dump (hex)
        #[arg(long, default_value = "0x20")]
        protection: String,

        /// Treat the dump as a module listed by the loader
        #[arg(long)]
        listed: bool,
    },
}
