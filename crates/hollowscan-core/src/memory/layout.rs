//! Memory layout constants for PE header structures
//!
//! This module centralizes the field offsets used when reading headers out of
//! raw region buffers. Constants are organized by structure type. All fields
//! are little-endian.

/// IMAGE_SECTION_HEADER layout (40 bytes)
pub mod section {
    /// Size of one section header
    pub const SIZE: usize = 40;

    /// Length of the inline name field
    pub const NAME_LEN: usize = 8;

    pub const NAME: usize = 0;
    pub const VIRTUAL_SIZE: usize = 8;
    pub const VIRTUAL_ADDRESS: usize = 12;
    pub const SIZE_OF_RAW_DATA: usize = 16;
    pub const POINTER_TO_RAW_DATA: usize = 20;
    pub const POINTER_TO_RELOCATIONS: usize = 24;
    pub const POINTER_TO_LINENUMBERS: usize = 28;
    pub const NUMBER_OF_RELOCATIONS: usize = 32;
    pub const CHARACTERISTICS: usize = 36;
}

/// Section characteristic bits
pub mod section_flags {
    pub const CNT_CODE: u32 = 0x0000_0020;
    pub const MEM_EXECUTE: u32 = 0x2000_0000;
    pub const MEM_READ: u32 = 0x4000_0000;
    pub const MEM_WRITE: u32 = 0x8000_0000;
}

/// IMAGE_FILE_HEADER layout (20 bytes)
pub mod file_header {
    /// Size of the fixed file header
    pub const SIZE: usize = 20;

    pub const MACHINE: usize = 0;
    pub const NUMBER_OF_SECTIONS: usize = 2;
    pub const POINTER_TO_SYMBOL_TABLE: usize = 8;
    pub const NUMBER_OF_SYMBOLS: usize = 12;
    pub const SIZE_OF_OPTIONAL_HEADER: usize = 16;
    pub const CHARACTERISTICS: usize = 18;
}

/// File header characteristic bits
pub mod file_flags {
    pub const EXECUTABLE_IMAGE: u16 = 0x0002;
    pub const LARGE_ADDRESS_AWARE: u16 = 0x0020;
    pub const MACHINE_32BIT: u16 = 0x0100;
    pub const DLL: u16 = 0x2000;
}

/// Machine type words
pub mod machine {
    pub const I386: u16 = 0x014C;
    pub const AMD64: u16 = 0x8664;
}

/// Optional header sizes per architecture
pub mod optional_header {
    /// sizeof(IMAGE_OPTIONAL_HEADER32)
    pub const SIZE_32: u16 = 0xE0;
    /// sizeof(IMAGE_OPTIONAL_HEADER64)
    pub const SIZE_64: u16 = 0xF0;
}

/// Default page granularity on x86/x64 Windows
pub const PAGE_SIZE: usize = 0x1000;
