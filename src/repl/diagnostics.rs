//! Diagnostic deduplication across the repeated parses of one input

use crate::parser::{Diagnostic, DiagnosticKind, DiagnosticSink, Severity};
use rustc_hash::FxHashSet;

/// Sink that keeps the first report of each `(kind, relative offset)`
#[derive(Debug, Default)]
pub struct DiagnosticsDeduplicator {
    base: usize,
    seen: FxHashSet<(DiagnosticKind, usize)>,
    collected: Vec<Diagnostic>,
}

impl DiagnosticsDeduplicator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Where the current input starts in the source of the next pass
    pub fn set_base(&mut self, base: usize) {
        self.base = base;
    }

    /// Forget everything seen; called at the start of each input
    pub fn reset(&mut self) {
        self.base = 0;
        self.seen.clear();
        self.collected.clear();
    }

    /// Diagnostics collected since the last call, offsets relative to the input
    pub fn take(&mut self) -> Vec<Diagnostic> {
        std::mem::take(&mut self.collected)
    }
}

impl DiagnosticSink for DiagnosticsDeduplicator {
    fn report(&mut self, mut diagnostic: Diagnostic) {
        // Warnings in the already accepted context were shown when it was entered
        if diagnostic.offset < self.base && diagnostic.severity == Severity::Warning {
            return;
        }
        let relative = diagnostic.offset.saturating_sub(self.base);
        if !self.seen.insert((diagnostic.kind, relative)) {
            log::trace!("suppressed duplicate diagnostic: {}", diagnostic);
            return;
        }
        diagnostic.offset = relative;
        self.collected.push(diagnostic);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::lexer::LexErrorKind;

    #[test]
    fn test_same_relative_offset_is_reported_once() {
        let mut dedup = DiagnosticsDeduplicator::new();
        dedup.set_base(100);
        dedup.report(Diagnostic::warning(DiagnosticKind::TypeMismatch, "first pass", 104));
        dedup.set_base(250);
        dedup.report(Diagnostic::warning(DiagnosticKind::TypeMismatch, "second pass", 254));

        let collected = dedup.take();
        assert_eq!(collected.len(), 1);
        assert_eq!(collected[0].offset, 4);
        assert_eq!(collected[0].message, "first pass");
    }

    #[test]
    fn test_different_kinds_are_kept() {
        let mut dedup = DiagnosticsDeduplicator::new();
        dedup.report(Diagnostic::error(DiagnosticKind::Undeclared, "a", 3));
        dedup.report(Diagnostic::error(DiagnosticKind::Syntax, "b", 3));
        assert_eq!(dedup.take().len(), 2);
    }

    #[test]
    fn test_lexical_kinds_are_distinct() {
        let mut dedup = DiagnosticsDeduplicator::new();
        let string = DiagnosticKind::Lexical(LexErrorKind::UnterminatedString);
        let chr = DiagnosticKind::Lexical(LexErrorKind::UnterminatedChar);
        dedup.report(Diagnostic::error(string, "a", 7));
        dedup.report(Diagnostic::error(string, "a again", 7));
        dedup.report(Diagnostic::error(chr, "b", 7));
        assert_eq!(dedup.take().len(), 2);
    }

    #[test]
    fn test_context_warnings_are_dropped() {
        let mut dedup = DiagnosticsDeduplicator::new();
        dedup.set_base(50);
        dedup.report(Diagnostic::warning(DiagnosticKind::TypeMismatch, "old", 10));
        assert!(dedup.take().is_empty());
    }

    #[test]
    fn test_reset_forgets() {
        let mut dedup = DiagnosticsDeduplicator::new();
        dedup.report(Diagnostic::error(DiagnosticKind::Syntax, "x", 0));
        dedup.reset();
        dedup.report(Diagnostic::error(DiagnosticKind::Syntax, "x", 0));
        assert_eq!(dedup.take().len(), 1);
    }
}
