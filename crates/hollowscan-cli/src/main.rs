mod cli;
mod commands;
mod output;

use anyhow::Result;
use clap::Parser;
use hollowscan_core::ScanConfig;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use cli::{Args, Command};
use commands::hex_utils::{parse_hex_address, parse_hex_protection};
use commands::inspect::DumpLayout;

fn main() -> Result<()> {
    let args = Args::parse();

    // Initialize logging
    let directive = if args.verbose {
        "hollowscan=debug"
    } else {
        "hollowscan=info"
    };
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive(directive.parse()?))
        .with_writer(std::io::stderr)
        .init();

    let config = load_config(args.config.as_deref())?;

    match args.command {
        Command::Scan { pid, address } => {
            let address = parse_hex_address(&address)?;
            commands::scan::run(pid, address, &config, args.json)
        }
        Command::Inspect {
            file,
            base,
            region_offset,
            protection,
            listed,
        } => {
            let layout = DumpLayout {
                base: parse_hex_address(&base)?,
                region_offset: usize::try_from(parse_hex_address(&region_offset)?)?,
                protection: parse_hex_protection(&protection)?,
                listed,
            };
            commands::inspect::run(&file, layout, &config, args.json)
        }
    }
}

fn load_config(path: Option<&std::path::Path>) -> Result<ScanConfig> {
    let Some(path) = path else {
        return Ok(ScanConfig::default());
    };

    match ScanConfig::load(path) {
        Ok(config) => {
            info!("Loaded config from {:?}", path);
            Ok(config)
        }
        Err(e) if e.is_not_found() => {
            warn!("Config {:?} not found, using defaults", path);
            Ok(ScanConfig::default())
        }
        Err(e) => Err(e.into()),
    }
}
