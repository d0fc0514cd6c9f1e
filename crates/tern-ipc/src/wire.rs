//! Wire Format
//!
//! Bounds-checked little-endian primitives shared by every codec in this
//! crate. Decoding walks a cursor through a byte slice; encoding into a
//! caller-owned fixed region writes at explicit offsets and fails instead of
//! running past the region's end.

use crate::error::ProtocolError;

// ============================================================================
// Decoding
// ============================================================================

/// Take `len` bytes from data at the given cursor position
pub fn take<'a>(data: &'a [u8], cursor: &mut usize, len: usize) -> Result<&'a [u8], ProtocolError> {
    let end = cursor.checked_add(len).ok_or(ProtocolError::TooShort {
        needed: usize::MAX,
        available: data.len(),
    })?;
    let bytes = data.get(*cursor..end).ok_or(ProtocolError::TooShort {
        needed: end,
        available: data.len(),
    })?;
    *cursor = end;
    Ok(bytes)
}

/// Decode a u8 from data at the given cursor position
pub fn decode_u8(data: &[u8], cursor: &mut usize) -> Result<u8, ProtocolError> {
    Ok(take(data, cursor, 1)?[0])
}

/// Decode a u16 (little-endian) from data at the given cursor position
pub fn decode_u16(data: &[u8], cursor: &mut usize) -> Result<u16, ProtocolError> {
    let b = take(data, cursor, 2)?;
    Ok(u16::from_le_bytes([b[0], b[1]]))
}

/// Decode a u32 (little-endian) from data at the given cursor position
pub fn decode_u32(data: &[u8], cursor: &mut usize) -> Result<u32, ProtocolError> {
    let b = take(data, cursor, 4)?;
    Ok(u32::from_le_bytes([b[0], b[1], b[2], b[3]]))
}

/// Decode an i32 (little-endian) from data at the given cursor position
pub fn decode_i32(data: &[u8], cursor: &mut usize) -> Result<i32, ProtocolError> {
    let b = take(data, cursor, 4)?;
    Ok(i32::from_le_bytes([b[0], b[1], b[2], b[3]]))
}

// ============================================================================
// Fixed-region encoding
// ============================================================================

/// Check that a caller-owned region can hold `needed` bytes.
pub fn ensure_capacity(out: &[u8], needed: usize) -> Result<(), ProtocolError> {
    if out.len() < needed {
        return Err(ProtocolError::BufferTooSmall {
            needed,
            capacity: out.len(),
        });
    }
    Ok(())
}

/// Write raw bytes at `offset`, never past the end of `out`.
pub fn put_bytes(out: &mut [u8], offset: usize, bytes: &[u8]) -> Result<(), ProtocolError> {
    let capacity = out.len();
    let end = offset.saturating_add(bytes.len());
    let slot = out
        .get_mut(offset..end)
        .ok_or(ProtocolError::BufferTooSmall {
            needed: end,
            capacity,
        })?;
    slot.copy_from_slice(bytes);
    Ok(())
}

/// Write a u8 at `offset`.
pub fn put_u8(out: &mut [u8], offset: usize, value: u8) -> Result<(), ProtocolError> {
    put_bytes(out, offset, &[value])
}

/// Write a little-endian u16 at `offset`.
pub fn put_u16(out: &mut [u8], offset: usize, value: u16) -> Result<(), ProtocolError> {
    put_bytes(out, offset, &value.to_le_bytes())
}

/// Write a little-endian u32 at `offset`.
pub fn put_u32(out: &mut [u8], offset: usize, value: u32) -> Result<(), ProtocolError> {
    put_bytes(out, offset, &value.to_le_bytes())
}

// ============================================================================
// Terminated strings
// ============================================================================

/// Copy `src` into `dst`, stopping at the first NUL in `src` or when only the
/// terminator slot is left, and always terminate `dst`.
///
/// `None` produces an empty string. Returns the number of bytes copied,
/// excluding the terminator. A zero-capacity `dst` is left untouched.
pub fn copy_bounded(dst: &mut [u8], src: Option<&[u8]>) -> usize {
    let Some(max) = dst.len().checked_sub(1) else {
        return 0;
    };

    let mut copied = 0;
    if let Some(src) = src {
        for &byte in src.iter().take(max) {
            if byte == 0 {
                break;
            }
            dst[copied] = byte;
            copied += 1;
        }
    }
    dst[copied] = 0;
    copied
}

/// The bytes of `bytes` before its first NUL (all of it if there is none).
pub fn terminated(bytes: &[u8]) -> &[u8] {
    match bytes.iter().position(|&b| b == 0) {
        Some(end) => &bytes[..end],
        None => bytes,
    }
}
