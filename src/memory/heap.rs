//! Byte-addressed memory for the engine
//!
//! All objects live in [`Block`]s keyed by their start address. Three regions
//! hand out addresses:
//! - data: globals and string literals, allocated once at link time
//! - stack: locals and parameters, released in LIFO order by scope marks
//! - heap: `malloc`/`calloc`/`free`, with tombstones for freed blocks
//!
//! Every access is bounds-checked against the block containing its first
//! byte. Reads of unmapped or freed memory are errors, which is what lets the
//! result printer probe arbitrary pointers safely.

use super::value::Address;
use super::align_up;
use crate::interpreter::constants::{
    DATA_ADDRESS_START, HEAP_ADDRESS_START, HEAP_BLOCK_GAP, STACK_ADDRESS_START, STACK_SIZE,
};
use crate::interpreter::errors::RuntimeError;
use std::collections::BTreeMap;

/// Which region a block belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Region {
    Data,
    Stack,
    Heap,
}

/// A mapped range of memory
#[derive(Debug, Clone)]
pub struct Block {
    pub region: Region,
    pub data: Vec<u8>,
    /// Freed heap block kept around to report use-after-free
    pub freed: bool,
}

/// All mapped memory of one program image
#[derive(Debug, Clone)]
pub struct Memory {
    blocks: BTreeMap<Address, Block>,
    next_data: Address,
    stack_pointer: Address,
    next_heap: Address,
    heap_in_use: usize,
    heap_limit: usize,
}

impl Memory {
    pub fn new(heap_limit: usize) -> Self {
        Memory {
            blocks: BTreeMap::new(),
            next_data: DATA_ADDRESS_START,
            stack_pointer: STACK_ADDRESS_START,
            next_heap: HEAP_ADDRESS_START,
            heap_in_use: 0,
            heap_limit,
        }
    }

    /// Map a static object with the given initial bytes
    pub fn alloc_static(&mut self, bytes: Vec<u8>, align: usize) -> Address {
        let addr = align_up(self.next_data, align);
        // Zero-sized objects still get a distinct address
        self.next_data = addr + bytes.len().max(1) as u64;
        self.blocks.insert(
            addr,
            Block {
                region: Region::Data,
                data: bytes,
                freed: false,
            },
        );
        addr
    }

    pub fn stack_pointer(&self) -> Address {
        self.stack_pointer
    }

    /// Map a zeroed stack object
    pub fn alloc_stack(&mut self, size: usize, align: usize) -> Result<Address, RuntimeError> {
        let addr = align_up(self.stack_pointer, align);
        let end = addr
            .checked_add(size.max(1) as u64)
            .filter(|end| *end <= STACK_ADDRESS_START + STACK_SIZE)
            .ok_or(RuntimeError::StackExhausted)?;
        self.stack_pointer = end;
        self.blocks.insert(
            addr,
            Block {
                region: Region::Stack,
                data: vec![0; size],
                freed: false,
            },
        );
        Ok(addr)
    }

    /// Unmap every stack object at or above `mark`
    pub fn release_stack(&mut self, mark: Address) {
        if mark >= self.stack_pointer {
            return;
        }
        let released: Vec<Address> = self.blocks.range(mark..self.stack_pointer).map(|(addr, _)| *addr).collect();
        for addr in released {
            self.blocks.remove(&addr);
        }
        self.stack_pointer = mark;
    }

    /// Allocate a zeroed heap block
    pub fn malloc(&mut self, size: usize) -> Result<Address, RuntimeError> {
        if self.heap_in_use.checked_add(size).map_or(true, |total| total > self.heap_limit) {
            return Err(RuntimeError::OutOfMemory {
                requested: size,
                limit: self.heap_limit,
            });
        }

        let addr = align_up(self.next_heap, 16);
        self.next_heap = addr + size.max(1) as u64 + HEAP_BLOCK_GAP;
        self.heap_in_use += size;
        self.blocks.insert(
            addr,
            Block {
                region: Region::Heap,
                data: vec![0; size],
                freed: false,
            },
        );
        Ok(addr)
    }

    /// Release a heap block. Freeing null is a no-op.
    pub fn free(&mut self, addr: Address) -> Result<(), RuntimeError> {
        if addr == 0 {
            return Ok(());
        }
        match self.blocks.get_mut(&addr) {
            Some(block) if block.region == Region::Heap && !block.freed => {
                block.freed = true;
                self.heap_in_use -= block.data.len();
                Ok(())
            }
            Some(block) if block.region == Region::Heap => Err(RuntimeError::DoubleFree { address: addr }),
            _ => Err(RuntimeError::InvalidFree { address: addr }),
        }
    }

    fn locate(&self, addr: Address, len: usize) -> Result<(Address, &Block), RuntimeError> {
        if addr == 0 {
            return Err(RuntimeError::NullDereference);
        }
        let (&start, block) = self
            .blocks
            .range(..=addr)
            .next_back()
            .ok_or(RuntimeError::InvalidAccess { address: addr })?;
        if block.freed {
            return Err(RuntimeError::UseAfterFree { address: addr });
        }
        let end = start + block.data.len() as u64;
        let last = addr
            .checked_add(len as u64)
            .ok_or(RuntimeError::InvalidAccess { address: addr })?;
        if last > end || (len == 0 && addr > end) {
            return Err(RuntimeError::InvalidAccess { address: addr });
        }
        Ok((start, block))
    }

    pub fn read(&self, addr: Address, len: usize) -> Result<&[u8], RuntimeError> {
        let (start, block) = self.locate(addr, len)?;
        let offset = (addr - start) as usize;
        Ok(&block.data[offset..offset + len])
    }

    pub fn write(&mut self, addr: Address, bytes: &[u8]) -> Result<(), RuntimeError> {
        let (start, _) = self.locate(addr, bytes.len())?;
        let offset = (addr - start) as usize;
        if let Some(block) = self.blocks.get_mut(&start) {
            block.data[offset..offset + bytes.len()].copy_from_slice(bytes);
        }
        Ok(())
    }

    /// Whether `len` bytes starting at `addr` can be read
    pub fn is_readable(&self, addr: Address, len: usize) -> bool {
        self.locate(addr, len).is_ok()
    }

    /// Bytes of the NUL-terminated string at `addr`, without the terminator
    pub fn read_c_string(&self, addr: Address) -> Result<Vec<u8>, RuntimeError> {
        let (start, block) = self.locate(addr, 1)?;
        let offset = (addr - start) as usize;
        let tail = &block.data[offset..];
        match tail.iter().position(|&b| b == 0) {
            Some(len) => Ok(tail[..len].to_vec()),
            None => Err(RuntimeError::InvalidAccess {
                address: start + block.data.len() as u64,
            }),
        }
    }

    pub fn heap_in_use(&self) -> usize {
        self.heap_in_use
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_static_read_write() {
        let mut memory = Memory::new(1024);
        let addr = memory.alloc_static(vec![1, 2, 3, 4], 4);
        assert_eq!(memory.read(addr + 1, 2).unwrap(), &[2, 3]);
        memory.write(addr + 2, &[9]).unwrap();
        assert_eq!(memory.read(addr, 4).unwrap(), &[1, 2, 9, 4]);
        assert!(memory.read(addr + 3, 2).is_err());
    }

    #[test]
    fn test_access_at_end_of_address_space() {
        let mut memory = Memory::new(1024);
        memory.malloc(8).unwrap();
        assert_eq!(memory.read(u64::MAX, 1), Err(RuntimeError::InvalidAccess { address: u64::MAX }));
        assert!(!memory.is_readable(u64::MAX - 1, 4));
        assert!(matches!(memory.malloc(usize::MAX), Err(RuntimeError::OutOfMemory { .. })));
        assert_eq!(memory.alloc_stack(usize::MAX, 1), Err(RuntimeError::StackExhausted));
    }

    #[test]
    fn test_unmapped_and_null() {
        let memory = Memory::new(1024);
        assert_eq!(memory.read(0, 1), Err(RuntimeError::NullDereference));
        assert!(!memory.is_readable(0x1234, 1));
    }

    #[test]
    fn test_heap_lifecycle() {
        let mut memory = Memory::new(64);
        let addr = memory.malloc(16).unwrap();
        assert_eq!(memory.heap_in_use(), 16);
        memory.write(addr, b"hi\0").unwrap();
        assert_eq!(memory.read_c_string(addr).unwrap(), b"hi");

        memory.free(addr).unwrap();
        assert_eq!(memory.read(addr, 1), Err(RuntimeError::UseAfterFree { address: addr }));
        assert_eq!(memory.free(addr), Err(RuntimeError::DoubleFree { address: addr }));
        assert!(memory.malloc(100).is_err());
    }

    #[test]
    fn test_stack_release() {
        let mut memory = Memory::new(0);
        let mark = memory.stack_pointer();
        let a = memory.alloc_stack(4, 4).unwrap();
        let b = memory.alloc_stack(8, 8).unwrap();
        assert!(b > a);
        memory.release_stack(mark);
        assert!(!memory.is_readable(a, 4));
        assert_eq!(memory.stack_pointer(), mark);
    }

    #[test]
    fn test_unterminated_string() {
        let mut memory = Memory::new(0);
        let addr = memory.alloc_static(b"abc".to_vec(), 1);
        assert!(memory.read_c_string(addr).is_err());
    }
}
