// Constants for the engine's memory layout and default limits

/// Starting address for function entry points (no bytes are mapped there)
pub const TEXT_ADDRESS_START: u64 = 0x0001_0000;

/// Spacing between consecutive function addresses
pub const TEXT_ENTRY_STRIDE: u64 = 0x10;

/// Starting address for globals and string literals
pub const DATA_ADDRESS_START: u64 = 0x0100_0000;

/// Starting address for stack variable addresses
pub const STACK_ADDRESS_START: u64 = 0x1000_0000;

/// Bytes available to the stack region
pub const STACK_SIZE: u64 = 0x0100_0000;

/// Starting address for heap allocations
pub const HEAP_ADDRESS_START: u64 = 0x2000_0000;

/// Unmapped bytes between heap blocks so overruns fault
pub const HEAP_BLOCK_GAP: u64 = 0x10;

/// Default heap size: 64 MB
pub const DEFAULT_HEAP_LIMIT: usize = 64 * 1024 * 1024;

/// Default maximum nesting of C function calls
pub const DEFAULT_MAX_CALL_DEPTH: usize = 256;

/// Host stack for the thread user code runs on
pub const ENGINE_STACK_SIZE: usize = 256 * 1024 * 1024;

/// Default number of bytes the result printer will scan for a string
pub const DEFAULT_STRING_PROBE_LIMIT: usize = 256;
