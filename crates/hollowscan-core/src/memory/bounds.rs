//! Bounds-checked access to raw region buffers
//!
//! Every structured read goes through [`view_at`]; nothing in the scanner
//! indexes a region buffer directly.

/// Check that `[offset, offset + span)` lies within a buffer of `length` bytes.
pub fn validate_bounds(length: usize, offset: usize, span: usize) -> bool {
    match offset.checked_add(span) {
        Some(end) => end <= length,
        None => false,
    }
}

/// Borrow `span` bytes starting at `offset`, if they are all inside `buffer`.
pub fn view_at(buffer: &[u8], offset: usize, span: usize) -> Option<&[u8]> {
    if !validate_bounds(buffer.len(), offset, span) {
        return None;
    }
    Some(&buffer[offset..offset + span])
}

pub fn read_u16(buffer: &[u8], offset: usize) -> Option<u16> {
    let bytes = view_at(buffer, offset, 2)?;
    Some(u16::from_le_bytes([bytes[0], bytes[1]]))
}

pub fn read_u32(buffer: &[u8], offset: usize) -> Option<u32> {
    let bytes = view_at(buffer, offset, 4)?;
    Some(u32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]))
}
