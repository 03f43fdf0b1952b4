//! Captured program output
//!
//! Everything user code writes through `printf`, `puts` and `putchar` lands
//! here. The session drains it after each invocation so output can be shown
//! before the result line.

/// Byte buffer standing in for the program's stdout
#[derive(Debug, Clone, Default)]
pub struct Terminal {
    buffer: Vec<u8>,
}

impl Terminal {
    pub fn new() -> Self {
        Terminal { buffer: Vec::new() }
    }

    /// Print without newline
    pub fn print(&mut self, bytes: &[u8]) {
        self.buffer.extend_from_slice(bytes);
    }

    pub fn put_byte(&mut self, byte: u8) {
        self.buffer.push(byte);
    }

    pub fn is_empty(&self) -> bool {
        self.buffer.is_empty()
    }

    /// Take everything printed so far as text
    pub fn drain(&mut self) -> String {
        let bytes = std::mem::take(&mut self.buffer);
        String::from_utf8_lossy(&bytes).into_owned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_drain_resets() {
        let mut terminal = Terminal::new();
        terminal.print(b"hello ");
        terminal.put_byte(b'!');
        assert_eq!(terminal.drain(), "hello !");
        assert!(terminal.is_empty());
    }
}
