//! Section table walking
//!
//! A section table is treated as a run of consecutive plausible headers. The
//! walk stops at the first entry that fails validation or leaves the buffer,
//! so a forged table can never report more entries than fit in the region.

use tracing::{Level, debug, enabled};

use crate::memory::RemoteMemory;
use crate::memory::layout::{section, section_flags};

use super::validation::{SectionHeaderView, is_plausible_section_header};

/// Characteristics every entry of a loaded section table must have
pub const TABLE_ENTRY_CHARACTERISTICS: u32 = section_flags::MEM_READ;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Direction {
    Forward,
    Backward,
}

/// Iterator over consecutive valid section headers starting at a given offset
///
/// Yields `(offset, header)` pairs, including the starting entry if it is valid.
#[derive(Debug, Clone)]
pub struct SectionWalk<'a> {
    buffer: &'a [u8],
    next: Option<usize>,
    direction: Direction,
}

impl<'a> SectionWalk<'a> {
    pub fn forward(buffer: &'a [u8], start: usize) -> Self {
        Self {
            buffer,
            next: Some(start),
            direction: Direction::Forward,
        }
    }

    pub fn backward(buffer: &'a [u8], start: usize) -> Self {
        Self {
            buffer,
            next: Some(start),
            direction: Direction::Backward,
        }
    }
}

impl<'a> Iterator for SectionWalk<'a> {
    type Item = (usize, SectionHeaderView<'a>);

    fn next(&mut self) -> Option<Self::Item> {
        let offset = self.next.take()?;
        if !is_plausible_section_header(self.buffer, offset, TABLE_ENTRY_CHARACTERISTICS) {
            return None;
        }
        let header = SectionHeaderView::at(self.buffer, offset)?;
        self.next = match self.direction {
            Direction::Forward => offset.checked_add(section::SIZE),
            Direction::Backward => offset.checked_sub(section::SIZE),
        };
        Some((offset, header))
    }
}

/// Number of consecutive valid headers starting at `start`
pub fn count_consecutive_valid_sections(buffer: &[u8], start: usize) -> usize {
    SectionWalk::forward(buffer, start).count()
}

/// Earliest offset of the run of valid headers that contains `known_offset`
pub fn find_table_start(buffer: &[u8], known_offset: usize) -> usize {
    SectionWalk::backward(buffer, known_offset)
        .last()
        .map_or(known_offset, |(offset, _)| offset)
}

/// Estimate the mapped size of the image whose section table starts at `table_start`
///
/// The highest section RVA plus however much memory is actually committed
/// there. Declared virtual sizes are not trusted.
pub fn estimate_image_size<M: RemoteMemory + ?Sized>(
    memory: &M,
    region_start: u64,
    buffer: &[u8],
    table_start: usize,
) -> u64 {
    let check_sizes = enabled!(Level::DEBUG);
    let mut max_rva = 0u32;

    for (_, header) in SectionWalk::forward(buffer, table_start) {
        let rva = header.virtual_address();
        if check_sizes {
            let committed = memory.region_committed_size(region_start + u64::from(rva));
            if header.virtual_size() as usize > committed {
                debug!(
                    "Corrupt section size: {} declares 0x{:X} bytes, 0x{:X} committed",
                    header.name_lossy(),
                    header.virtual_size(),
                    committed
                );
            }
        }
        max_rva = max_rva.max(rva);
    }

    let last_section = region_start + u64::from(max_rva);
    let committed = memory.region_committed_size(last_section) as u64;
    debug!(
        "Last section at 0x{:X} (RVA 0x{:X}) has 0x{:X} committed bytes",
        last_section, max_rva, committed
    );
    u64::from(max_rva) + committed
}
