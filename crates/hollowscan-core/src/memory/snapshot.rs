//! In-memory address space for offline dumps and tests
//!
//! A snapshot is a sorted set of regions, each either committed (with bytes)
//! or merely reserved. Queries behave like `VirtualQueryEx`: they report the
//! region containing the address, and committed sizes never extend past the
//! end of that region.

use crate::error::{Error, Result};
use crate::memory::{RegionInfo, RemoteMemory};

#[derive(Debug, Clone)]
struct SnapshotRegion {
    start: u64,
    size: usize,
    allocation_base: u64,
    protection: u32,
    is_listed_module: bool,
    /// `None` for reserved, uncommitted ranges
    data: Option<Vec<u8>>,
}

impl SnapshotRegion {
    fn end(&self) -> u64 {
        self.start + self.size as u64
    }

    fn contains(&self, address: u64) -> bool {
        address >= self.start && address < self.end()
    }
}

/// Address space assembled from captured regions
#[derive(Debug, Clone, Default)]
pub struct SnapshotMemory {
    regions: Vec<SnapshotRegion>,
}

impl SnapshotMemory {
    pub fn builder() -> SnapshotBuilder {
        SnapshotBuilder::default()
    }

    fn find(&self, address: u64) -> Option<&SnapshotRegion> {
        let idx = self.regions.partition_point(|r| r.end() <= address);
        self.regions.get(idx).filter(|r| r.contains(address))
    }
}

impl RemoteMemory for SnapshotMemory {
    fn query_region(&self, address: u64) -> Result<RegionInfo> {
        let region = self
            .find(address)
            .ok_or(Error::RegionQueryFailed { address })?;
        Ok(RegionInfo {
            base_address: address,
            region_start: region.start,
            region_end: region.end(),
            allocation_base: region.allocation_base,
            protection: region.protection,
            is_listed_module: region.is_listed_module,
        })
    }

    fn read_bytes(&self, address: u64, size: usize) -> Result<Vec<u8>> {
        let region = self
            .find(address)
            .ok_or_else(|| Error::MemoryReadFailed {
                address,
                message: "address is not mapped".to_string(),
            })?;
        let data = region.data.as_ref().ok_or_else(|| Error::MemoryReadFailed {
            address,
            message: "region is reserved but not committed".to_string(),
        })?;

        let offset = (address - region.start) as usize;
        data.get(offset..offset.saturating_add(size))
            .map(<[u8]>::to_vec)
            .ok_or_else(|| Error::MemoryReadFailed {
                address,
                message: format!("read of {} bytes crosses region end", size),
            })
    }

    fn region_committed_size(&self, address: u64) -> usize {
        match self.find(address) {
            Some(region) if region.data.is_some() => (region.end() - address) as usize,
            _ => 0,
        }
    }
}

/// Builder for [`SnapshotMemory`]
///
/// Regions inherit the allocation base and listed-module flag that were
/// current when they were added.
#[derive(Debug, Clone, Default)]
pub struct SnapshotBuilder {
    regions: Vec<SnapshotRegion>,
    allocation_base: Option<u64>,
    is_listed_module: bool,
}

impl SnapshotBuilder {
    /// Start a new allocation at `base`
    pub fn allocation(mut self, base: u64) -> Self {
        self.allocation_base = Some(base);
        self.is_listed_module = false;
        self
    }

    /// Mark subsequent regions of the current allocation as listed in the module list
    pub fn listed_module(mut self, listed: bool) -> Self {
        self.is_listed_module = listed;
        self
    }

    /// Add a committed region holding `data`
    pub fn region(mut self, start: u64, data: Vec<u8>, protection: u32) -> Self {
        let region = SnapshotRegion {
            start,
            size: data.len(),
            allocation_base: self.allocation_base.unwrap_or(start),
            protection,
            is_listed_module: self.is_listed_module,
            data: Some(data),
        };
        self.regions.push(region);
        self
    }

    /// Add a reserved region that cannot be read
    pub fn reserved(mut self, start: u64, size: usize) -> Self {
        let region = SnapshotRegion {
            start,
            size,
            allocation_base: self.allocation_base.unwrap_or(start),
            protection: 0,
            is_listed_module: self.is_listed_module,
            data: None,
        };
        self.regions.push(region);
        self
    }

    /// Sort regions and reject overlaps or regions that run past the address space
    pub fn build(mut self) -> Result<SnapshotMemory> {
        self.regions.retain(|r| r.size > 0);
        if let Some(region) = self
            .regions
            .iter()
            .find(|r| r.start.checked_add(r.size as u64).is_none())
        {
            return Err(Error::InvalidConfig(format!(
                "snapshot region at 0x{:X} of 0x{:X} bytes overflows the address space",
                region.start, region.size
            )));
        }
        self.regions.sort_by_key(|r| r.start);
        for pair in self.regions.windows(2) {
            if pair[0].end() > pair[1].start {
                return Err(Error::InvalidConfig(format!(
                    "snapshot regions overlap at 0x{:X}",
                    pair[1].start
                )));
            }
        }
        Ok(SnapshotMemory {
            regions: self.regions,
        })
    }
}
