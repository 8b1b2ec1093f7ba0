//! Structural validators for header candidates
//!
//! These predicates decide whether an offset *could* hold a section header or
//! file header of a loaded image. They are used everywhere to reject false
//! positive pattern matches and accept attacker-controlled offsets.

use crate::config::ScanConfig;
use crate::memory::layout::{file_header, section};
use crate::memory::{read_u16, read_u32, validate_bounds, view_at};

/// Bounds-checked view of one section header
#[derive(Debug, Clone, Copy)]
pub struct SectionHeaderView<'a> {
    bytes: &'a [u8],
}

impl<'a> SectionHeaderView<'a> {
    pub fn at(buffer: &'a [u8], offset: usize) -> Option<Self> {
        view_at(buffer, offset, section::SIZE).map(|bytes| Self { bytes })
    }

    /// Raw name bytes, NUL padded
    pub fn name(&self) -> &'a [u8] {
        &self.bytes[section::NAME..section::NAME + section::NAME_LEN]
    }

    pub fn name_lossy(&self) -> String {
        let name = self.name();
        let len = name.iter().position(|&b| b == 0).unwrap_or(name.len());
        String::from_utf8_lossy(&name[..len]).into_owned()
    }

    pub fn virtual_size(&self) -> u32 {
        self.u32_at(section::VIRTUAL_SIZE)
    }

    pub fn virtual_address(&self) -> u32 {
        self.u32_at(section::VIRTUAL_ADDRESS)
    }

    pub fn pointer_to_relocations(&self) -> u32 {
        self.u32_at(section::POINTER_TO_RELOCATIONS)
    }

    pub fn pointer_to_linenumbers(&self) -> u32 {
        self.u32_at(section::POINTER_TO_LINENUMBERS)
    }

    pub fn number_of_relocations(&self) -> u16 {
        self.u16_at(section::NUMBER_OF_RELOCATIONS)
    }

    pub fn characteristics(&self) -> u32 {
        self.u32_at(section::CHARACTERISTICS)
    }

    // The view is exactly one header long, so field reads cannot miss.
    fn u32_at(&self, offset: usize) -> u32 {
        read_u32(self.bytes, offset).unwrap_or_default()
    }

    fn u16_at(&self, offset: usize) -> u16 {
        read_u16(self.bytes, offset).unwrap_or_default()
    }
}

/// Bounds-checked view of the fixed part of a file header
#[derive(Debug, Clone, Copy)]
pub struct FileHeaderView<'a> {
    bytes: &'a [u8],
}

impl<'a> FileHeaderView<'a> {
    pub fn at(buffer: &'a [u8], offset: usize) -> Option<Self> {
        view_at(buffer, offset, file_header::SIZE).map(|bytes| Self { bytes })
    }

    pub fn machine(&self) -> u16 {
        self.u16_at(file_header::MACHINE)
    }

    pub fn number_of_sections(&self) -> u16 {
        self.u16_at(file_header::NUMBER_OF_SECTIONS)
    }

    pub fn pointer_to_symbol_table(&self) -> u32 {
        self.u32_at(file_header::POINTER_TO_SYMBOL_TABLE)
    }

    pub fn number_of_symbols(&self) -> u32 {
        self.u32_at(file_header::NUMBER_OF_SYMBOLS)
    }

    pub fn size_of_optional_header(&self) -> u16 {
        self.u16_at(file_header::SIZE_OF_OPTIONAL_HEADER)
    }

    pub fn characteristics(&self) -> u16 {
        self.u16_at(file_header::CHARACTERISTICS)
    }

    fn u32_at(&self, offset: usize) -> u32 {
        read_u32(self.bytes, offset).unwrap_or_default()
    }

    fn u16_at(&self, offset: usize) -> u16 {
        read_u16(self.bytes, offset).unwrap_or_default()
    }
}

/// Could `offset` hold a section header of a loaded, non-relocatable image?
///
/// With non-zero `required_characteristics`, at least one of those bits must be set.
pub fn is_plausible_section_header(
    buffer: &[u8],
    offset: usize,
    required_characteristics: u32,
) -> bool {
    let Some(header) = SectionHeaderView::at(buffer, offset) else {
        return false;
    };

    // Loaded images never keep relocation or line number data per section
    if header.pointer_to_relocations() != 0
        || header.number_of_relocations() != 0
        || header.pointer_to_linenumbers() != 0
    {
        return false;
    }

    required_characteristics == 0 || header.characteristics() & required_characteristics != 0
}

/// Could `offset` hold the file header of a loaded image?
pub fn is_plausible_file_header(
    buffer: &[u8],
    offset: usize,
    required_characteristics: u16,
    config: &ScanConfig,
) -> bool {
    let Some(header) = FileHeaderView::at(buffer, offset) else {
        return false;
    };

    if header.number_of_sections() > config.max_file_header_sections {
        return false;
    }
    if header.pointer_to_symbol_table() != 0 || header.number_of_symbols() != 0 {
        return false;
    }

    let Some(arch) = config.architecture_for(header.machine()) else {
        return false;
    };
    let optional_size = header.size_of_optional_header();
    if optional_size < arch.optional_header_size || usize::from(optional_size) > config.page_size {
        return false;
    }
    if !validate_bounds(
        buffer.len(),
        offset,
        file_header::SIZE + usize::from(optional_size),
    ) {
        return false;
    }

    required_characteristics == 0 || header.characteristics() & required_characteristics != 0
}
