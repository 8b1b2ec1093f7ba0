//! Anchor search: where might a section table or file header begin?
//!
//! Section anchors are an ordered list of independent strategies, each a pure
//! function of the buffer. The first strategy that matches wins; validation
//! happens afterwards in the locator.

use memchr::memmem;
use strum::Display;
use tracing::trace;

use crate::config::{Architecture, ScanConfig};
use crate::memory::layout::section;
use crate::memory::validate_bounds;

use super::validation::is_plausible_file_header;

/// Name of the conventional code section
pub const CODE_SECTION_NAME: &[u8] = b".text";

/// Last 16 bytes of a typical code section header: zero relocation and line
/// number fields followed by CNT_CODE | MEM_EXECUTE | MEM_READ
pub const CODE_SECTION_TAIL: [u8; 16] = [
    0x00, 0x00, 0x00, 0x00, // PointerToRelocations
    0x00, 0x00, 0x00, 0x00, // PointerToLinenumbers
    0x00, 0x00, 0x00, 0x00, // NumberOfRelocations, NumberOfLinenumbers
    0x20, 0x00, 0x00, 0x60, // Characteristics
];

/// Strategies for finding a section header candidate
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
pub enum SectionAnchor {
    /// Literal `.text` name at the start of a header
    #[strum(serialize = "code-section-name")]
    CodeSectionName,
    /// Structural tail of a code section header, for stripped names
    #[strum(serialize = "code-section-tail")]
    CodeSectionTail,
}

impl SectionAnchor {
    /// Tried in this order
    pub const ALL: [SectionAnchor; 2] = [
        SectionAnchor::CodeSectionName,
        SectionAnchor::CodeSectionTail,
    ];

    pub fn find(self, buffer: &[u8]) -> Option<usize> {
        match self {
            SectionAnchor::CodeSectionName => memmem::find(buffer, CODE_SECTION_NAME),
            SectionAnchor::CodeSectionTail => {
                let tail_pos = memmem::find(buffer, &CODE_SECTION_TAIL)?;
                let start = tail_pos.checked_sub(section::SIZE - CODE_SECTION_TAIL.len())?;
                validate_bounds(buffer.len(), start, section::SIZE).then_some(start)
            }
        }
    }
}

/// First section header candidate from any strategy, with the strategy that found it
pub fn find_section_anchor(buffer: &[u8]) -> Option<(usize, SectionAnchor)> {
    SectionAnchor::ALL.iter().find_map(|&anchor| {
        let offset = anchor.find(buffer)?;
        trace!("Section anchor {} matched at 0x{:X}", anchor, offset);
        Some((offset, anchor))
    })
}

/// Find a plausible file header by machine word
///
/// Architectures are tried in configuration order. For each, only the first
/// occurrence of its machine word is considered, and it must carry that
/// architecture's mandatory characteristics.
pub fn find_file_header<'c>(
    buffer: &[u8],
    config: &'c ScanConfig,
) -> Option<(usize, &'c Architecture)> {
    config.architectures.iter().find_map(|arch| {
        let offset = memmem::find(buffer, &arch.machine.to_le_bytes())?;
        if !is_plausible_file_header(buffer, offset, arch.required_characteristics, config) {
            trace!(
                "Machine word for {} at 0x{:X} is not a plausible file header",
                arch.name, offset
            );
            return None;
        }
        Some((offset, arch))
    })
}
