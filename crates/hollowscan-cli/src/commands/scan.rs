//! Scan command implementation.
//!
//! Scans the region containing an address in a live process.

use anyhow::Result;
use hollowscan_core::ScanConfig;

#[cfg(target_os = "windows")]
pub fn run(pid: u32, address: u64, config: &ScanConfig, json: bool) -> Result<()> {
    use hollowscan_core::{ProcessHandle, ProcessMemory, scan};
    use tracing::info;

    use crate::output::{self, Outcome};

    let process = ProcessHandle::open(pid)?;
    let memory = ProcessMemory::new(&process);
    info!("Scanning process {} at 0x{:X}", pid, address);

    let outcome = Outcome::from_scan(address, scan(&memory, config, address));
    output::print(&outcome, json)
}

#[cfg(not(target_os = "windows"))]
pub fn run(_pid: u32, _address: u64, _config: &ScanConfig, _json: bool) -> Result<()> {
    anyhow::bail!("Live process scanning is only supported on Windows; use `inspect` on a dump")
}
