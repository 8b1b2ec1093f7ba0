//! Inspect command implementation.
//!
//! Scans a raw memory dump offline. The dump is treated as one allocation
//! starting at `base`; `region_offset` splits it into the bytes below the
//! scanned region and the scanned region itself, so headers that only
//! survive below the region can still be recovered.

use std::fs;
use std::path::Path;

use anyhow::{Context, Result, bail};
use hollowscan_core::{ScanConfig, SnapshotMemory, scan};
use tracing::info;

use crate::output::{self, Outcome};

/// How the dump maps into the address space
#[derive(Debug, Clone, Copy)]
pub struct DumpLayout {
    pub base: u64,
    pub region_offset: usize,
    pub protection: u32,
    pub listed: bool,
}

/// Run the inspect command
pub fn run(path: &Path, layout: DumpLayout, config: &ScanConfig, json: bool) -> Result<()> {
    let outcome = inspect(path, layout, config)?;
    output::print(&outcome, json)
}

/// Scan a dump file and return the outcome for its scanned region
pub fn inspect(path: &Path, layout: DumpLayout, config: &ScanConfig) -> Result<Outcome> {
    let data = fs::read(path).with_context(|| format!("Failed to read dump {}", path.display()))?;
    info!("Loaded dump {} ({} bytes)", path.display(), data.len());

    let address = layout
        .base
        .checked_add(layout.region_offset as u64)
        .with_context(|| {
            format!(
                "Region offset 0x{:X} overflows base 0x{:X}",
                layout.region_offset, layout.base
            )
        })?;
    let memory = build_snapshot(data, layout, address)?;
    Ok(Outcome::from_scan(address, scan(&memory, config, address)))
}

/// Split the dump at `region_start`, the address of `layout.region_offset`
fn build_snapshot(
    mut data: Vec<u8>,
    layout: DumpLayout,
    region_start: u64,
) -> Result<SnapshotMemory> {
    if layout.region_offset >= data.len() {
        bail!(
            "Region offset 0x{:X} is outside the dump (0x{:X} bytes)",
            layout.region_offset,
            data.len()
        );
    }

    let scanned = data.split_off(layout.region_offset);
    let memory = SnapshotMemory::builder()
        .allocation(layout.base)
        .listed_module(layout.listed)
        .region(layout.base, data, layout.protection)
        .region(region_start, scanned, layout.protection)
        .build()?;
    Ok(memory)
}
