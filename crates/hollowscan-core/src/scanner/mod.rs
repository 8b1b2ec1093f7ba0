//! Artefact scanner for possibly hollowed or manually mapped images
//!
//! # Search Strategy
//!
//! A region is never trusted to start with intact headers. The scanner looks
//! for a section table first, using cheap anchors and structural validation:
//!
//! ```text
//!   region buffer
//!   ?? ?? [file header][optional header][sec 0][sec 1][sec 2] ??
//!          ^                            ^             ^
//!          |                            |             anchor hit
//!          |                            walk back to table start
//!          machine word search, bytes before the table only
//! ```
//!
//! 1. An anchor (`.text` name, or the tail of a code section header) gives one
//!    candidate header.
//! 2. The candidate must validate; the table start is recovered by walking
//!    backward while entries still validate.
//! 3. The table is counted forward, and the image size is taken from what is
//!    actually committed after the highest section.
//! 4. If nothing is found and the region is not the start of its allocation,
//!    preceding regions of the same allocation are searched, since a hollowed
//!    image may only have its headers below the address where it was seen.

mod anchor;
#[cfg(test)]
mod fixtures;
mod report;
mod section_table;
mod types;
mod validation;

use tracing::{debug, error, trace};

use crate::config::ScanConfig;
use crate::error::Result;
use crate::memory::layout::section_flags;
use crate::memory::{MemoryRegion, RemoteMemory};

pub use anchor::{
    CODE_SECTION_NAME, CODE_SECTION_TAIL, SectionAnchor, find_file_header, find_section_anchor,
};
pub use report::ScanReportBuilder;
pub use section_table::{
    SectionWalk, TABLE_ENTRY_CHARACTERISTICS, count_consecutive_valid_sections,
    estimate_image_size, find_table_start,
};
pub use types::{ReconstructedArtefacts, ScanResult, Verdict};
pub use validation::{
    FileHeaderView, SectionHeaderView, is_plausible_file_header, is_plausible_section_header,
};

/// Characteristics the anchored section header must have
const ANCHOR_CHARACTERISTICS: u32 = section_flags::MEM_READ | section_flags::MEM_EXECUTE;

/// Scan the region containing `address`
///
/// Fails if `config` is invalid or that region cannot be queried; `Ok(None)`
/// means no artefacts.
pub fn scan<M: RemoteMemory + ?Sized>(
    memory: &M,
    config: &ScanConfig,
    address: u64,
) -> Result<Option<ScanResult>> {
    let mut scanner = ArtefactScanner::new(memory, config)?;
    let mut region = MemoryRegion::fetch(memory, address)?;
    Ok(scanner.scan(&mut region))
}

/// Locates PE artefacts in one region and, if needed, the regions before it
///
/// Holds at most one preceding region at a time. The slot is cleared before
/// every backward step and before [`scan`](Self::scan) returns.
pub struct ArtefactScanner<'a, M: RemoteMemory + ?Sized> {
    memory: &'a M,
    config: &'a ScanConfig,
    prev_region: Option<MemoryRegion>,
}

impl<'a, M: RemoteMemory + ?Sized> ArtefactScanner<'a, M> {
    /// Fails if `config` does not validate
    pub fn new(memory: &'a M, config: &'a ScanConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            memory,
            config,
            prev_region: None,
        })
    }

    /// Scan `region`, falling back to preceding regions of its allocation
    pub fn scan(&mut self, region: &mut MemoryRegion) -> Option<ScanResult> {
        self.release_prev_region();

        let mut artefacts = self.locate(region);
        if artefacts.is_none() && region.region_start() > region.allocation_base() {
            artefacts =
                self.locate_in_preceding_regions(region.allocation_base(), region.region_start());
        }
        let Some(artefacts) = artefacts else {
            trace!("No artefacts in region 0x{:X}", region.region_start());
            self.release_prev_region();
            return None;
        };

        let bearing: &MemoryRegion = self.prev_region.as_ref().unwrap_or(region);
        let file_header_offset = bearing.data().and_then(|data| {
            let before_table = &data[..artefacts.section_table_offset.min(data.len())];
            let (offset, arch) = find_file_header(before_table, self.config)?;
            debug!("File header ({}) at +0x{:X}", arch.name, offset);
            Some(offset)
        });

        let result = ScanReportBuilder::new(artefacts, region.info())
            .file_header_offset(file_header_offset)
            .build();
        self.release_prev_region();
        Some(result)
    }

    /// Reconstruct artefacts from a single region's contents
    ///
    /// Loads the region on first use; an unreadable region yields `None`.
    pub fn locate(&self, region: &mut MemoryRegion) -> Option<ReconstructedArtefacts> {
        let region_start = region.region_start();
        let data = match region.load(self.memory) {
            Ok(data) => data,
            Err(e) => {
                debug!("Skipping region 0x{:X}: {}", region_start, e);
                return None;
            }
        };

        let (anchor_offset, anchor) = find_section_anchor(data)?;
        if !is_plausible_section_header(data, anchor_offset, ANCHOR_CHARACTERISTICS) {
            trace!(
                "Anchor {} at 0x{:X}+0x{:X} failed validation",
                anchor, region_start, anchor_offset
            );
            return None;
        }

        let section_table_offset = find_table_start(data, anchor_offset);
        if section_table_offset >= data.len() {
            error!(
                "Section table offset 0x{:X} outside region buffer of 0x{:X} bytes",
                section_table_offset,
                data.len()
            );
            return None;
        }

        let section_count = count_consecutive_valid_sections(data, section_table_offset);
        if section_count == 0 {
            trace!(
                "Anchor at 0x{:X}+0x{:X} is executable but not readable",
                region_start, section_table_offset
            );
            return None;
        }

        let page_size = self.config.page_size;
        let image_base_offset = section_table_offset / page_size * page_size;
        let estimated_image_size =
            estimate_image_size(self.memory, region_start, data, section_table_offset);

        debug!(
            "Section table via {} at 0x{:X}+0x{:X}: {} sections",
            anchor, region_start, section_table_offset, section_count
        );

        Some(ReconstructedArtefacts {
            region_start,
            image_base_offset,
            section_table_offset,
            section_count,
            file_header_offset: None,
            estimated_image_size,
        })
    }

    /// Walk backward from `addr_stop` through regions no lower than `addr_start`
    ///
    /// Each step lands one page below the start of the region just examined,
    /// so the stride follows the real region layout. On success the
    /// artefact-bearing region stays in the slot.
    pub fn locate_in_preceding_regions(
        &mut self,
        addr_start: u64,
        addr_stop: u64,
    ) -> Option<ReconstructedArtefacts> {
        self.release_prev_region();
        let page_size = self.config.page_size as u64;
        let mut next_addr = addr_stop.checked_sub(page_size)?;

        while next_addr >= addr_start {
            let region_start = match MemoryRegion::fetch(self.memory, next_addr) {
                Ok(mut region) => {
                    let found = self.locate(&mut region);
                    let start = region.region_start();
                    self.prev_region = Some(region);
                    if found.is_some() {
                        debug!("Artefacts found in preceding region 0x{:X}", start);
                        return found;
                    }
                    self.release_prev_region();
                    start
                }
                Err(e) => {
                    debug!("Preceding region at 0x{:X} unavailable: {}", next_addr, e);
                    next_addr
                }
            };

            next_addr = match region_start.min(next_addr).checked_sub(page_size) {
                Some(addr) => addr,
                None => break,
            };
        }
        None
    }

    fn release_prev_region(&mut self) {
        self.prev_region = None;
    }
}

#[cfg(test)]
mod tests {
    use std::cell::Cell;

    use super::fixtures::{
        FileHeaderSpec, GARBAGE, SectionSpec, header_page, write_file_header, write_section,
    };
    use super::*;
    use crate::error::Error;
    use crate::memory::{RegionInfo, SnapshotMemory};

    const PAGE: usize = 0x1000;
    const BASE: u64 = 0x40_0000;

    fn three_sections() -> Vec<SectionSpec> {
        vec![
            SectionSpec::text(0x1000),
            SectionSpec::rdata(0x5000),
            SectionSpec::data(0x7000),
        ]
    }

    fn region_at(memory: &SnapshotMemory, address: u64) -> MemoryRegion {
        MemoryRegion::fetch(memory, address).unwrap()
    }

    /// Counts region queries so backward strides can be observed
    struct CountingMemory {
        inner: SnapshotMemory,
        queries: Cell<usize>,
    }

    impl RemoteMemory for CountingMemory {
        fn query_region(&self, address: u64) -> Result<RegionInfo> {
            self.queries.set(self.queries.get() + 1);
            self.inner.query_region(address)
        }

        fn read_bytes(&self, address: u64, size: usize) -> Result<Vec<u8>> {
            self.inner.read_bytes(address, size)
        }

        fn region_committed_size(&self, address: u64) -> usize {
            self.inner.region_committed_size(address)
        }
    }

    #[test]
    fn test_single_text_header_in_garbage() {
        let mut page = vec![GARBAGE; PAGE];
        write_section(&mut page, 0x200, &SectionSpec::text(0x1000));
        let memory = SnapshotMemory::builder()
            .allocation(BASE)
            .region(BASE, page, 0x20)
            .build()
            .unwrap();
        let config = ScanConfig::default();
        let scanner = ArtefactScanner::new(&memory, &config).unwrap();

        let artefacts = scanner.locate(&mut region_at(&memory, BASE)).unwrap();
        assert_eq!(artefacts.section_table_offset, 0x200);
        assert_eq!(artefacts.section_count, 1);
        assert_eq!(artefacts.image_base_offset, 0);
        assert_eq!(artefacts.region_start, BASE);
        // nothing committed at BASE + 0x1000
        assert_eq!(artefacts.estimated_image_size, 0x1000);
    }

    #[test]
    fn test_locate_is_idempotent() {
        let page = header_page(PAGE, 0x84, &FileHeaderSpec::amd64(3), &three_sections());
        let memory = SnapshotMemory::builder()
            .allocation(BASE)
            .region(BASE, page, 0x02)
            .region(BASE + 0x7000, vec![0; 0x2000], 0x04)
            .build()
            .unwrap();
        let config = ScanConfig::default();
        let scanner = ArtefactScanner::new(&memory, &config).unwrap();
        let mut region = region_at(&memory, BASE);

        let first = scanner.locate(&mut region).unwrap();
        let second = scanner.locate(&mut region).unwrap();
        assert_eq!(first, second);
        assert_eq!(first.section_count, 3);
        assert_eq!(first.estimated_image_size, 0x9000);
    }

    #[test]
    fn test_anchor_on_middle_entry_recovers_table_start() {
        // .text is the third entry; the anchor lands on it, not on entry 0
        let sections = vec![
            SectionSpec::rdata(0x1000),
            SectionSpec::data(0x2000),
            SectionSpec::text(0x3000),
        ];
        let page = header_page(PAGE, 0x84, &FileHeaderSpec::amd64(3), &sections);
        let memory = SnapshotMemory::builder()
            .region(BASE, page, 0x02)
            .build()
            .unwrap();
        let config = ScanConfig::default();

        let scanner = ArtefactScanner::new(&memory, &config).unwrap();

        let artefacts = scanner.locate(&mut region_at(&memory, BASE)).unwrap();
        assert_eq!(artefacts.section_table_offset, 0x188);
        assert_eq!(artefacts.section_count, 3);
    }

    #[test]
    fn test_image_base_offset_is_page_granular() {
        let mut data = vec![GARBAGE; 2 * PAGE];
        write_section(&mut data, PAGE + 0x188, &SectionSpec::text(0x1000));
        let memory = SnapshotMemory::builder()
            .region(BASE, data, 0x20)
            .build()
            .unwrap();
        let config = ScanConfig::default();

        let scanner = ArtefactScanner::new(&memory, &config).unwrap();

        let artefacts = scanner.locate(&mut region_at(&memory, BASE)).unwrap();
        assert_eq!(artefacts.section_table_offset, PAGE + 0x188);
        assert_eq!(artefacts.image_base_offset, PAGE);
    }

    #[test]
    fn test_non_executable_anchor_rejected() {
        let mut page = vec![GARBAGE; PAGE];
        write_section(
            &mut page,
            0x200,
            &SectionSpec::new(b".text", 0x1000, section_flags::MEM_WRITE),
        );
        let memory = SnapshotMemory::builder()
            .region(BASE, page, 0x04)
            .build()
            .unwrap();
        let config = ScanConfig::default();

        let scanner = ArtefactScanner::new(&memory, &config).unwrap();

        assert!(scanner.locate(&mut region_at(&memory, BASE)).is_none());
    }

    #[test]
    fn test_unreadable_region_is_a_negative_result() {
        let memory = SnapshotMemory::builder()
            .reserved(BASE, PAGE)
            .build()
            .unwrap();
        let config = ScanConfig::default();
        let mut region = region_at(&memory, BASE);

        let mut scanner = ArtefactScanner::new(&memory, &config).unwrap();
        assert!(scanner.locate(&mut region).is_none());
        assert!(scanner.scan(&mut region).is_none());
    }

    #[test]
    fn test_scan_reports_file_header_and_sizes() {
        let page = header_page(PAGE, 0x84, &FileHeaderSpec::amd64(3), &three_sections());
        let memory = SnapshotMemory::builder()
            .allocation(BASE)
            .region(BASE, page, 0x02)
            .region(BASE + 0x7000, vec![0; 0x2000], 0x04)
            .build()
            .unwrap();
        let config = ScanConfig::default();

        let result = scan(&memory, &config, BASE + 0x10).unwrap().unwrap();
        assert_eq!(result.target_address, BASE);
        assert_eq!(result.sampled_size, PAGE as u64);
        assert_eq!(result.final_image_size, 0x9000);
        assert_eq!(result.verdict, Verdict::Suspicious);
        assert!(result.is_manually_loaded);
        assert_eq!(result.protection, 0x02);
        assert_eq!(result.artefacts.file_header_offset, Some(0x84));
        assert_eq!(result.artefacts.section_count, 3);
    }

    #[test]
    fn test_file_header_after_section_table_is_ignored() {
        let mut page = vec![GARBAGE; PAGE];
        write_section(&mut page, 0x200, &SectionSpec::text(0x1000));
        write_file_header(&mut page, 0x400, &FileHeaderSpec::amd64(1));
        let memory = SnapshotMemory::builder()
            .region(BASE, page, 0x20)
            .build()
            .unwrap();
        let config = ScanConfig::default();

        let result = scan(&memory, &config, BASE).unwrap().unwrap();
        assert_eq!(result.artefacts.file_header_offset, None);
    }

    #[test]
    fn test_listed_module_is_not_manually_loaded() {
        let page = header_page(PAGE, 0x84, &FileHeaderSpec::i386(3), &three_sections());
        let memory = SnapshotMemory::builder()
            .allocation(BASE)
            .listed_module(true)
            .region(BASE, page, 0x02)
            .build()
            .unwrap();
        let config = ScanConfig::default();

        let result = scan(&memory, &config, BASE).unwrap().unwrap();
        assert!(!result.is_manually_loaded);
        // i386 optional header is shorter, so the table starts earlier
        assert_eq!(result.artefacts.section_table_offset, 0x84 + 20 + 0xE0);
        assert_eq!(result.artefacts.file_header_offset, Some(0x84));
    }

    #[test]
    fn test_scan_recovers_headers_from_preceding_region() {
        let alloc = 0x10000u64;
        let header = header_page(PAGE, 0x84, &FileHeaderSpec::amd64(3), &three_sections());
        let memory = SnapshotMemory::builder()
            .allocation(alloc)
            .region(alloc, vec![GARBAGE; PAGE], 0x02)
            .region(alloc + 0x1000, header, 0x02)
            .region(alloc + 0x2000, vec![GARBAGE; PAGE], 0x20)
            .build()
            .unwrap();
        let config = ScanConfig::default();
        let mut region = region_at(&memory, alloc + 0x2000);
        let mut scanner = ArtefactScanner::new(&memory, &config).unwrap();

        assert!(scanner.locate(&mut region).is_none());
        let result = scanner.scan(&mut region).unwrap();
        assert_eq!(result.target_address, alloc + 0x1000);
        assert_eq!(result.artefacts.region_start, alloc + 0x1000);
        assert_eq!(result.sampled_size, 0x2000);
        assert_eq!(result.protection, 0x20);
        assert_eq!(result.artefacts.file_header_offset, Some(0x84));
        assert!(scanner.prev_region.is_none());
    }

    #[test]
    fn test_backward_stride_follows_region_starts() {
        let alloc = 0x10000u64;
        let header = header_page(PAGE, 0x84, &FileHeaderSpec::amd64(3), &three_sections());
        let inner = SnapshotMemory::builder()
            .allocation(alloc)
            .region(alloc, header, 0x02)
            .region(alloc + 0x1000, vec![GARBAGE; 3 * PAGE], 0x04)
            .region(alloc + 0x4000, vec![GARBAGE; PAGE], 0x20)
            .build()
            .unwrap();
        let memory = CountingMemory {
            inner,
            queries: Cell::new(0),
        };
        let config = ScanConfig::default();
        let mut scanner = ArtefactScanner::new(&memory, &config).unwrap();

        let artefacts = scanner
            .locate_in_preceding_regions(alloc, alloc + 0x4000)
            .unwrap();
        assert_eq!(artefacts.region_start, alloc);
        // 0x13000 lands in the three-page region, next step goes straight to 0x10000
        assert_eq!(memory.queries.get(), 2);
        assert_eq!(
            scanner.prev_region.as_ref().map(MemoryRegion::region_start),
            Some(alloc)
        );
    }

    #[test]
    fn test_backward_walk_skips_unreadable_regions() {
        let alloc = 0x10000u64;
        let header = header_page(PAGE, 0x84, &FileHeaderSpec::amd64(3), &three_sections());
        let memory = SnapshotMemory::builder()
            .allocation(alloc)
            .region(alloc, header, 0x02)
            .reserved(alloc + 0x1000, PAGE)
            .region(alloc + 0x2000, vec![GARBAGE; PAGE], 0x20)
            .build()
            .unwrap();
        let config = ScanConfig::default();

        let result = scan(&memory, &config, alloc + 0x2000).unwrap().unwrap();
        assert_eq!(result.target_address, alloc);
        assert_eq!(result.sampled_size, 0x3000);
    }

    #[test]
    fn test_backward_walk_stops_at_allocation_base() {
        let header = header_page(PAGE, 0x84, &FileHeaderSpec::amd64(3), &three_sections());
        let memory = SnapshotMemory::builder()
            .allocation(0x10000)
            .region(0x10000, header, 0x02)
            .allocation(0x11000)
            .region(0x11000, vec![GARBAGE; PAGE], 0x02)
            .region(0x12000, vec![GARBAGE; PAGE], 0x20)
            .build()
            .unwrap();
        let config = ScanConfig::default();

        assert!(scan(&memory, &config, 0x12000).unwrap().is_none());
    }

    #[test]
    fn test_region_at_allocation_base_does_not_walk_backward() {
        let header = header_page(PAGE, 0x84, &FileHeaderSpec::amd64(3), &three_sections());
        let memory = CountingMemory {
            inner: SnapshotMemory::builder()
                .allocation(0x10000)
                .region(0x10000, header, 0x02)
                .allocation(0x11000)
                .region(0x11000, vec![GARBAGE; PAGE], 0x20)
                .build()
                .unwrap(),
            queries: Cell::new(0),
        };
        let config = ScanConfig::default();
        let mut region = MemoryRegion::fetch(&memory, 0x11000).unwrap();

        let mut scanner = ArtefactScanner::new(&memory, &config).unwrap();

        assert!(scanner.scan(&mut region).is_none());
        assert_eq!(memory.queries.get(), 1);
    }

    #[test]
    fn test_scan_of_unmapped_address_is_an_error() {
        let memory = SnapshotMemory::builder()
            .region(BASE, vec![GARBAGE; PAGE], 0x20)
            .build()
            .unwrap();
        let config = ScanConfig::default();
        assert!(scan(&memory, &config, 0x1000).is_err());
    }

    #[test]
    fn test_zero_page_size_is_rejected_before_scanning() {
        let mut page = vec![GARBAGE; PAGE];
        write_section(&mut page, 0x200, &SectionSpec::text(0x1000));
        let memory = SnapshotMemory::builder()
            .allocation(BASE)
            .region(BASE, page, 0x20)
            .build()
            .unwrap();
        let config = ScanConfig {
            page_size: 0,
            ..ScanConfig::default()
        };

        let err = scan(&memory, &config, BASE).unwrap_err();
        assert!(matches!(err, Error::InvalidConfig(_)));
    }

    #[test]
    fn test_invalid_config_stops_backward_walk_before_it_starts() {
        let memory = CountingMemory {
            inner: SnapshotMemory::builder()
                .allocation(0x10000)
                .region(0x10000, vec![GARBAGE; PAGE], 0x02)
                .region(0x11000, vec![GARBAGE; PAGE], 0x20)
                .build()
                .unwrap(),
            queries: Cell::new(0),
        };
        let config = ScanConfig {
            page_size: 0,
            ..ScanConfig::default()
        };

        assert!(ArtefactScanner::new(&memory, &config).is_err());
        assert!(scan(&memory, &config, 0x11000).is_err());
        assert_eq!(memory.queries.get(), 0);
    }

    #[test]
    fn test_custom_page_size_changes_base_rounding() {
        let mut data = vec![GARBAGE; PAGE];
        write_section(&mut data, 0x388, &SectionSpec::text(0x1000));
        let memory = SnapshotMemory::builder()
            .region(BASE, data, 0x20)
            .build()
            .unwrap();
        let config = ScanConfig::builder().page_size(0x200).build().unwrap();

        let scanner = ArtefactScanner::new(&memory, &config).unwrap();

        let artefacts = scanner.locate(&mut region_at(&memory, BASE)).unwrap();
        assert_eq!(artefacts.section_table_offset, 0x388);
        assert_eq!(artefacts.image_base_offset, 0x200);
    }
}
