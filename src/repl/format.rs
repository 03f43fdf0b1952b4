//! Result line formatting
//!
//! Only `char` pointers are probed for a string; the probe reads through the
//! memory model and gives up on anything unreadable or unprintable.

use crate::memory::heap::Memory;
use crate::memory::value::{Address, Value};
use crate::sema::types::{type_name, CType};

/// Format the value an expression of type `ty` produced
pub fn format_result(value: &Value, ty: &CType, memory: &Memory, probe_limit: usize) -> String {
    let tag = type_name(ty);
    match (ty, value) {
        (CType::Void, _) => "=> (void)".to_string(),
        (CType::Int(kind), Value::Int(n)) => {
            if kind.is_signed() {
                format!("=> ({}) {}", tag, n)
            } else {
                format!("=> ({}) {}", tag, *n as u64)
            }
        }
        (CType::Float | CType::Double, Value::Float(f)) => format!("=> ({}) {:.6}", tag, f),
        (CType::Pointer(pointee), value) => {
            let address = value.as_pointer().unwrap_or(0);
            if pointee.is_char_like() {
                if let Some(text) = probe_string(memory, address, probe_limit) {
                    return format!("=> ({}) \"{}\"", tag, text);
                }
            }
            format!("=> ({}) 0x{:x}", tag, address)
        }
        _ => format!("=> ({})", tag),
    }
}

/// Text of a readable, NUL-terminated, printable string at `address`
pub fn probe_string(memory: &Memory, address: Address, limit: usize) -> Option<String> {
    if address == 0 {
        return None;
    }
    let mut bytes = Vec::new();
    for i in 0..limit as u64 {
        let byte = *memory.read(address.checked_add(i)?, 1).ok()?.first()?;
        if byte == 0 {
            return Some(String::from_utf8_lossy(&bytes).into_owned());
        }
        if !(byte.is_ascii_graphic() || matches!(byte, b' ' | b'\t' | b'\n' | b'\r')) {
            return None;
        }
        bytes.push(byte);
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sema::types::IntKind;

    #[test]
    fn test_integers_follow_signedness() {
        let memory = Memory::new(1024);
        assert_eq!(format_result(&Value::Int(-3), &CType::int(), &memory, 16), "=> (int) -3");
        assert_eq!(
            format_result(&Value::Int(-1), &CType::Int(IntKind::ULong), &memory, 16),
            "=> (unsigned long) 18446744073709551615"
        );
    }

    #[test]
    fn test_floats_have_six_decimals() {
        let memory = Memory::new(1024);
        assert_eq!(format_result(&Value::Float(2.5), &CType::Double, &memory, 16), "=> (double) 2.500000");
    }

    #[test]
    fn test_string_probe() {
        let mut memory = Memory::new(1024);
        let text = memory.alloc_static(b"hello\0".to_vec(), 1);
        let binary = memory.alloc_static(vec![1, 2, 0], 1);
        let char_ptr = CType::Int(IntKind::Char).pointer_to();

        assert_eq!(format_result(&Value::Pointer(text), &char_ptr, &memory, 16), "=> (char *) \"hello\"");
        assert_eq!(
            format_result(&Value::Pointer(binary), &char_ptr, &memory, 16),
            format!("=> (char *) 0x{:x}", binary)
        );
        // Unterminated within the limit
        assert_eq!(probe_string(&memory, text, 3), None);
    }

    #[test]
    fn test_unmapped_pointer_prints_address() {
        let memory = Memory::new(1024);
        let char_ptr = CType::Int(IntKind::Char).pointer_to();
        assert_eq!(format_result(&Value::Pointer(0xdead), &char_ptr, &memory, 16), "=> (char *) 0xdead");
        assert_eq!(format_result(&Value::Pointer(0), &char_ptr, &memory, 16), "=> (char *) 0x0");
    }

    #[test]
    fn test_void_pointer_prints_address() {
        let mut memory = Memory::new(1024);
        let block = memory.malloc(4).unwrap();
        let void_ptr = CType::Void.pointer_to();
        assert_eq!(
            format_result(&Value::Pointer(block), &void_ptr, &memory, 16),
            format!("=> (void *) 0x{:x}", block)
        );
    }

    #[test]
    fn test_void_tag() {
        let memory = Memory::new(1024);
        assert_eq!(format_result(&Value::Void, &CType::Void, &memory, 16), "=> (void)");
    }
}
