use tracing::trace;

use crate::error::{Error, Result};

/// Metadata for one contiguous region as reported by the OS memory map
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RegionInfo {
    /// Address that was queried
    pub base_address: u64,
    pub region_start: u64,
    /// Exclusive end of the region
    pub region_end: u64,
    pub allocation_base: u64,
    pub protection: u32,
    /// Whether the loader's module list covers this region
    pub is_listed_module: bool,
}

impl RegionInfo {
    pub fn size(&self) -> usize {
        (self.region_end - self.region_start) as usize
    }

    fn is_consistent(&self) -> bool {
        self.allocation_base <= self.region_start && self.region_start <= self.region_end
    }
}

/// Access to the address space of a target process
///
/// Implemented by [`crate::memory::SnapshotMemory`] for offline dumps and by
/// `ProcessMemory` on Windows for live processes.
pub trait RemoteMemory {
    /// Query the region containing `address`
    fn query_region(&self, address: u64) -> Result<RegionInfo>;

    /// Copy `size` bytes starting at `address`
    fn read_bytes(&self, address: u64, size: usize) -> Result<Vec<u8>>;

    /// Number of contiguous committed bytes starting at `address`
    ///
    /// Zero when nothing is committed there.
    fn region_committed_size(&self, address: u64) -> usize;
}

/// One region of a target process with lazily copied contents
#[derive(Debug, Clone)]
pub struct MemoryRegion {
    info: RegionInfo,
    data: Option<Vec<u8>>,
}

impl MemoryRegion {
    /// Query the region containing `address`; bytes are copied on first [`load`](Self::load)
    pub fn fetch<M: RemoteMemory + ?Sized>(memory: &M, address: u64) -> Result<Self> {
        let info = memory.query_region(address)?;
        if !info.is_consistent() {
            return Err(Error::RegionQueryFailed { address });
        }
        Ok(Self { info, data: None })
    }

    pub fn info(&self) -> &RegionInfo {
        &self.info
    }

    pub fn region_start(&self) -> u64 {
        self.info.region_start
    }

    pub fn region_end(&self) -> u64 {
        self.info.region_end
    }

    pub fn allocation_base(&self) -> u64 {
        self.info.allocation_base
    }

    /// Contents, if they have been loaded
    pub fn data(&self) -> Option<&[u8]> {
        self.data.as_deref()
    }

    /// Copy the region's bytes from `memory` unless already loaded
    pub fn load<M: RemoteMemory + ?Sized>(&mut self, memory: &M) -> Result<&[u8]> {
        if self.data.is_none() {
            let bytes = memory.read_bytes(self.info.region_start, self.info.size())?;
            trace!(
                "Loaded region 0x{:X}..0x{:X} ({} bytes)",
                self.info.region_start,
                self.info.region_end,
                bytes.len()
            );
            self.data = Some(bytes);
        }
        Ok(self.data.as_deref().unwrap_or_default())
    }
}
