//! Memory model for the engine
//!
//! This module provides the core memory abstractions:
//! - [`value`]: Runtime value representation and byte encoding
//! - [`heap`]: Byte-addressed blocks in data, stack and heap regions
//! - [`stack`]: Call frames and scoped local variables
//!
//! # Type Sizes
//!
//! Sizes follow LP64 with natural alignment (see
//! [`crate::sema::types::TypeTable::size_of`]):
//! - `char` 1, `short` 2, `int` 4, `long`/`long long` 8
//! - `float` 4, `double` 8, pointers 8
//! - structs are padded to their alignment
//!
//! # Pointer Arithmetic
//!
//! Pointer arithmetic is scaled by pointee size:
//! ```text
//! ptr + n  →  ptr + (n * sizeof(*ptr))
//! ```
//!
//! Helper functions [`pointer_add`] and [`pointer_diff`] handle the scaling.

pub mod heap;
pub mod stack;
pub mod value;

use value::Address;

/// Round `addr` up to a multiple of `align`
pub fn align_up(addr: Address, align: usize) -> Address {
    let align = align.max(1) as u64;
    addr.div_ceil(align) * align
}

/// Perform pointer arithmetic: addr + offset (scaled by pointee size)
pub fn pointer_add(addr: Address, offset: i64, pointee_size: usize) -> Address {
    let byte_offset = offset.wrapping_mul(pointee_size as i64);
    (addr as i64).wrapping_add(byte_offset) as Address
}

/// Calculate the difference between two pointers (in elements, not bytes)
pub fn pointer_diff(addr1: Address, addr2: Address, pointee_size: usize) -> i64 {
    let bytes = (addr1 as i64).wrapping_sub(addr2 as i64);
    bytes / pointee_size.max(1) as i64
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_alignment() {
        assert_eq!(align_up(13, 4), 16);
        assert_eq!(align_up(16, 8), 16);
        assert_eq!(align_up(5, 0), 5);
    }

    #[test]
    fn test_pointer_arithmetic() {
        assert_eq!(pointer_add(0x100, 3, 4), 0x10c);
        assert_eq!(pointer_add(0x100, -1, 8), 0xf8);
        assert_eq!(pointer_diff(0x110, 0x100, 4), 4);
    }
}
