//! Scan result assembly

use tracing::debug;

use crate::memory::RegionInfo;

use super::types::{ReconstructedArtefacts, ScanResult, Verdict};

/// Builds a [`ScanResult`] from located artefacts and region metadata
#[derive(Debug, Clone)]
pub struct ScanReportBuilder {
    artefacts: ReconstructedArtefacts,
    target_address: u64,
    scan_end: u64,
    protection: u32,
    is_listed_module: bool,
}

impl ScanReportBuilder {
    /// `scanned` is the region the scan was asked about; the artefacts may
    /// come from a region preceding it.
    pub fn new(artefacts: ReconstructedArtefacts, scanned: &RegionInfo) -> Self {
        Self {
            target_address: artefacts.region_start,
            artefacts,
            scan_end: scanned.region_end,
            protection: scanned.protection,
            is_listed_module: scanned.is_listed_module,
        }
    }

    pub fn file_header_offset(mut self, offset: Option<usize>) -> Self {
        self.artefacts.file_header_offset = offset;
        self
    }

    pub fn build(self) -> ScanResult {
        let sampled_size = self.scan_end.saturating_sub(self.target_address);
        let final_image_size = sampled_size.max(self.artefacts.estimated_image_size);
        debug!(
            "Artefacts at 0x{:X}: sampled 0x{:X}, estimated 0x{:X}",
            self.target_address, sampled_size, self.artefacts.estimated_image_size
        );

        ScanResult {
            target_address: self.target_address,
            sampled_size,
            final_image_size,
            verdict: Verdict::Suspicious,
            is_manually_loaded: !self.is_listed_module,
            protection: self.protection,
            artefacts: self.artefacts,
        }
    }
}
