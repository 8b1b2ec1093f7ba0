use serde::Serialize;
use strum::Display;

/// Structural metadata recovered from one region
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ReconstructedArtefacts {
    /// Start of the region the artefacts were found in
    pub region_start: u64,
    /// Section table offset rounded down to page granularity
    pub image_base_offset: usize,
    /// Offset of the first section header within the region buffer
    pub section_table_offset: usize,
    /// Always at least 1
    pub section_count: usize,
    pub file_header_offset: Option<usize>,
    pub estimated_image_size: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Display)]
pub enum Verdict {
    #[strum(serialize = "not suspicious")]
    NotSuspicious,
    #[strum(serialize = "suspicious")]
    Suspicious,
    #[strum(serialize = "error")]
    Error,
}

/// Result of scanning one region
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ScanResult {
    /// Start of the region that holds the artefacts
    pub target_address: u64,
    /// Bytes from `target_address` to the end of the scanned region
    pub sampled_size: u64,
    /// Larger of the sampled size and the estimated image size
    pub final_image_size: u64,
    pub verdict: Verdict,
    /// The region is not covered by the loader's module list
    pub is_manually_loaded: bool,
    pub protection: u32,
    pub artefacts: ReconstructedArtefacts,
}
