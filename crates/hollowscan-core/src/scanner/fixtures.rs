//! Synthetic header layouts for scanner tests

use crate::memory::layout::{
    file_flags, file_header, machine, optional_header, section, section_flags,
};

/// Filler that can never form a plausible header (non-zero relocation fields)
pub const GARBAGE: u8 = 0xCC;

pub const CODE_RX: u32 =
    section_flags::CNT_CODE | section_flags::MEM_EXECUTE | section_flags::MEM_READ;

#[derive(Debug, Clone, Copy)]
pub struct SectionSpec {
    pub name: [u8; 8],
    pub virtual_size: u32,
    pub virtual_address: u32,
    pub characteristics: u32,
}

impl SectionSpec {
    pub fn new(name: &[u8], virtual_address: u32, characteristics: u32) -> Self {
        let mut padded = [0u8; 8];
        let len = name.len().min(8);
        padded[..len].copy_from_slice(&name[..len]);
        Self {
            name: padded,
            virtual_size: 0x1000,
            virtual_address,
            characteristics,
        }
    }

    pub fn text(virtual_address: u32) -> Self {
        Self::new(b".text", virtual_address, CODE_RX)
    }

    pub fn rdata(virtual_address: u32) -> Self {
        Self::new(b".rdata", virtual_address, section_flags::MEM_READ)
    }

    pub fn data(virtual_address: u32) -> Self {
        Self::new(
            b".data",
            virtual_address,
            section_flags::MEM_READ | section_flags::MEM_WRITE,
        )
    }

    pub fn with_virtual_size(mut self, size: u32) -> Self {
        self.virtual_size = size;
        self
    }

    pub fn to_bytes(&self) -> Vec<u8> {
        let mut bytes = vec![0u8; section::SIZE];
        bytes[section::NAME..section::NAME + 8].copy_from_slice(&self.name);
        put_u32(&mut bytes, section::VIRTUAL_SIZE, self.virtual_size);
        put_u32(&mut bytes, section::VIRTUAL_ADDRESS, self.virtual_address);
        put_u32(&mut bytes, section::SIZE_OF_RAW_DATA, self.virtual_size);
        put_u32(&mut bytes, section::POINTER_TO_RAW_DATA, self.virtual_address);
        put_u32(&mut bytes, section::CHARACTERISTICS, self.characteristics);
        bytes
    }
}

#[derive(Debug, Clone, Copy)]
pub struct FileHeaderSpec {
    pub machine: u16,
    pub number_of_sections: u16,
    pub number_of_symbols: u32,
    pub size_of_optional_header: u16,
    pub characteristics: u16,
}

impl FileHeaderSpec {
    pub fn amd64(number_of_sections: u16) -> Self {
        Self {
            machine: machine::AMD64,
            number_of_sections,
            number_of_symbols: 0,
            size_of_optional_header: optional_header::SIZE_64,
            characteristics: file_flags::EXECUTABLE_IMAGE | file_flags::LARGE_ADDRESS_AWARE,
        }
    }

    pub fn i386(number_of_sections: u16) -> Self {
        Self {
            machine: machine::I386,
            number_of_sections,
            number_of_symbols: 0,
            size_of_optional_header: optional_header::SIZE_32,
            characteristics: file_flags::EXECUTABLE_IMAGE | file_flags::MACHINE_32BIT,
        }
    }

    /// Offset of the section table when this header sits at `offset`
    pub fn table_offset(&self, offset: usize) -> usize {
        offset + file_header::SIZE + usize::from(self.size_of_optional_header)
    }
}

pub fn write_section(buffer: &mut [u8], offset: usize, spec: &SectionSpec) {
    buffer[offset..offset + section::SIZE].copy_from_slice(&spec.to_bytes());
}

pub fn write_sections(buffer: &mut [u8], offset: usize, specs: &[SectionSpec]) {
    for (i, spec) in specs.iter().enumerate() {
        write_section(buffer, offset + i * section::SIZE, spec);
    }
}

pub fn write_file_header(buffer: &mut [u8], offset: usize, spec: &FileHeaderSpec) {
    buffer[offset..offset + file_header::SIZE].fill(0);
    put_u16(buffer, offset + file_header::MACHINE, spec.machine);
    put_u16(buffer, offset + file_header::NUMBER_OF_SECTIONS, spec.number_of_sections);
    put_u32(buffer, offset + file_header::NUMBER_OF_SYMBOLS, spec.number_of_symbols);
    put_u16(
        buffer,
        offset + file_header::SIZE_OF_OPTIONAL_HEADER,
        spec.size_of_optional_header,
    );
    put_u16(buffer, offset + file_header::CHARACTERISTICS, spec.characteristics);
}

/// Header page of a plausible image: garbage filler, a file header at
/// `file_header_offset` and `sections` immediately after the optional header
pub fn header_page(
    len: usize,
    file_header_offset: usize,
    header: &FileHeaderSpec,
    sections: &[SectionSpec],
) -> Vec<u8> {
    let mut buffer = vec![GARBAGE; len];
    write_file_header(&mut buffer, file_header_offset, header);
    write_sections(&mut buffer, header.table_offset(file_header_offset), sections);
    buffer
}

fn put_u16(buffer: &mut [u8], offset: usize, value: u16) {
    buffer[offset..offset + 2].copy_from_slice(&value.to_le_bytes());
}

fn put_u32(buffer: &mut [u8], offset: usize, value: u32) {
    buffer[offset..offset + 4].copy_from_slice(&value.to_le_bytes());
}
