// Session state machine: buffering, evaluation and the append-only line log

use crate::interpreter::constants::{DEFAULT_HEAP_LIMIT, DEFAULT_MAX_CALL_DEPTH, DEFAULT_STRING_PROBE_LIMIT};
use crate::interpreter::errors::{LinkError, RuntimeError};
use crate::interpreter::image::{compile_unit, ProgramImage};
use crate::parser::{Diagnostic, DiagnosticSink};
use crate::repl::analyzer::analyze;
use crate::repl::classifier::{classify, Classification};
use crate::repl::commands::{help_text, parse_command, unknown_text, version_text, Command};
use crate::repl::diagnostics::DiagnosticsDeduplicator;
use crate::repl::format::format_result;
use crate::repl::splitter::split;
use crate::repl::wrapper::{wrap, UnitKind};
use crate::sema::types::type_name;
use thiserror::Error;

pub const PROMPT: &str = ">>> ";
pub const CONTINUATION_PROMPT: &str = "... ";
pub const IGNORED_NOTE: &str = "Note: last line ignored due to errors.";

/// Kind of an accepted line
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LineKind {
    Statement,
    Declaration,
    Preprocessor,
}

/// One accepted line of session history
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CodeLine {
    pub text: String,
    pub kind: LineKind,
}

impl CodeLine {
    pub fn new(text: impl Into<String>, kind: LineKind) -> Self {
        CodeLine {
            text: text.into(),
            kind,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum State {
    /// Waiting for a new entry
    Idle,
    /// In the middle of a multi-line entry
    Buffering,
}

/// Session limits
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionOptions {
    /// Bytes `malloc` may hand out in total
    pub heap_limit: usize,
    pub max_call_depth: usize,
    /// Longest string the result printer will look for a terminator in
    pub string_probe_limit: usize,
}

impl Default for SessionOptions {
    fn default() -> Self {
        SessionOptions {
            heap_limit: DEFAULT_HEAP_LIMIT,
            max_call_depth: DEFAULT_MAX_CALL_DEPTH,
            string_probe_limit: DEFAULT_STRING_PROBE_LIMIT,
        }
    }
}

/// Why a unit was not accepted
#[derive(Debug, Error)]
pub enum ReplError {
    #[error("{0}")]
    Compile(Diagnostic),

    #[error("link error: {0}")]
    Link(#[from] LinkError),

    #[error("runtime error: {0}")]
    Runtime(#[from] RuntimeError),
}

/// Something to show the user
#[derive(Debug, Clone, PartialEq)]
pub enum Event {
    /// Text printed by user code
    Output(String),
    /// A `=> (type) value` line
    Result(String),
    /// Compiler diagnostic; the offset is relative to the offending input
    Diagnostic(Diagnostic),
    /// Link or runtime failure
    Error(String),
    Note(String),
    /// Response to an internal command
    Message(String),
    Quit,
}

/// Response to one line of input
#[derive(Debug, Clone, PartialEq)]
pub struct Reply {
    pub events: Vec<Event>,
    pub prompt: &'static str,
    /// Text to pre-fill the next input line with
    pub indent: String,
}

/// An interactive compilation session
pub struct Session {
    options: SessionOptions,
    state: State,
    buffer: String,
    depth: usize,
    /// Set when the buffer has a closing bracket nothing opened
    unmatched: bool,
    lines: Vec<CodeLine>,
    image: ProgramImage,
    diagnostics: DiagnosticsDeduplicator,
}

impl Default for Session {
    fn default() -> Self {
        Self::new(SessionOptions::default())
    }
}

impl Session {
    pub fn new(options: SessionOptions) -> Self {
        let image = ProgramImage::new(options.heap_limit, options.max_call_depth);
        Session {
            options,
            state: State::Idle,
            buffer: String::new(),
            depth: 0,
            unmatched: false,
            lines: Vec::new(),
            image,
            diagnostics: DiagnosticsDeduplicator::new(),
        }
    }

    pub fn state(&self) -> State {
        self.state
    }

    /// Accepted history, oldest first
    pub fn lines(&self) -> &[CodeLine] {
        &self.lines
    }

    pub fn image(&self) -> &ProgramImage {
        &self.image
    }

    /// Number of statement lines so far; names the next wrapper function
    pub fn statement_count(&self) -> usize {
        self.lines.iter().filter(|l| l.kind == LineKind::Statement).count()
    }

    /// Preprocessor and declaration lines joined into the context every new
    /// input is compiled against
    pub fn session_source(&self) -> String {
        let mut source = String::new();
        for line in &self.lines {
            if line.kind != LineKind::Statement {
                source.push_str(&line.text);
                source.push('\n');
            }
        }
        source
    }

    pub fn prompt(&self) -> &'static str {
        match self.state {
            State::Idle => PROMPT,
            State::Buffering => CONTINUATION_PROMPT,
        }
    }

    fn reply(&self, events: Vec<Event>) -> Reply {
        let indent = match self.state {
            State::Idle => String::new(),
            State::Buffering => "  ".repeat(self.depth),
        };
        Reply {
            events,
            prompt: self.prompt(),
            indent,
        }
    }

    /// Feed one line of input
    pub fn process(&mut self, line: &str) -> Reply {
        if self.state == State::Idle {
            if let Some(command) = parse_command(line) {
                return self.reply(run_command(command));
            }
            if line.trim().is_empty() {
                return self.reply(Vec::new());
            }
        } else if line.trim().is_empty() && self.unmatched {
            log::debug!("discarding unbalanced buffer");
            self.clear_buffer();
            return self.reply(vec![Event::Note(IGNORED_NOTE.to_string())]);
        }

        self.buffer.push_str(line);
        self.buffer.push('\n');

        let analysis = analyze(&self.buffer);
        let mut events = Vec::new();
        if let Some(closer) = analysis.unmatched {
            events.push(Event::Error(format!("unmatched '{}'", closer)));
        }
        self.unmatched = analysis.unmatched.is_some();
        if !analysis.is_complete() {
            self.state = State::Buffering;
            self.depth = analysis.depth;
            return self.reply(events);
        }

        let input = std::mem::take(&mut self.buffer);
        self.state = State::Idle;
        self.depth = 0;
        self.diagnostics.reset();

        if !self.evaluate(&input, &mut events) {
            // An open comment: keep reading
            self.buffer = input;
            self.state = State::Buffering;
        }
        self.reply(events)
    }

    fn clear_buffer(&mut self) {
        self.buffer.clear();
        self.state = State::Idle;
        self.depth = 0;
        self.unmatched = false;
    }

    /// Run a complete entry. Returns false when it turned out incomplete.
    fn evaluate(&mut self, input: &str, events: &mut Vec<Event>) -> bool {
        let context = self.session_source();
        let result = match classify(&context, input) {
            Classification::Incomplete => return false,
            Classification::TopLevel(lines) => {
                log::debug!("top-level input");
                self.compile_top_level(&context, input, lines)
            }
            Classification::Stmt if input.trim_start().starts_with('#') => {
                let text = input.trim();
                self.compile_top_level(&context, text, vec![CodeLine::new(text, LineKind::Preprocessor)])
            }
            Classification::Stmt => self.run_statements(&context, input, events),
        };

        if let Err(err) = result {
            match err {
                ReplError::Compile(diagnostic) => self.diagnostics.report(diagnostic),
                other => {
                    self.flush_diagnostics(events);
                    events.push(Event::Error(other.to_string()));
                }
            }
            self.flush_diagnostics(events);
            events.push(Event::Note(IGNORED_NOTE.to_string()));
        } else {
            self.flush_diagnostics(events);
        }
        true
    }

    fn flush_diagnostics(&mut self, events: &mut Vec<Event>) {
        events.extend(self.diagnostics.take().into_iter().map(Event::Diagnostic));
    }

    /// Compile `input` as file-scope code and record `lines` once linked
    fn compile_top_level(&mut self, context: &str, input: &str, lines: Vec<CodeLine>) -> Result<(), ReplError> {
        let source = format!("{}{}\n", context, input);
        self.diagnostics.set_base(context.len());
        let unit = compile_unit(&source, context.len(), &mut self.diagnostics).map_err(ReplError::Compile)?;
        self.image.link(unit)?;
        self.lines.extend(lines);
        Ok(())
    }

    /// Split a statement-level entry and run its units in order
    fn run_statements(&mut self, context: &str, input: &str, events: &mut Vec<Event>) -> Result<(), ReplError> {
        let units = split(context, input).map_err(|d| self.relative(d))?;
        if units.len() > 1 {
            log::debug!("running {} units", units.len());
        }
        for unit in units {
            self.run_unit(&unit, events)?;
        }
        Ok(())
    }

    /// Treat an already relative diagnostic as reported against offset zero
    fn relative(&mut self, diagnostic: Diagnostic) -> ReplError {
        self.diagnostics.set_base(0);
        ReplError::Compile(diagnostic)
    }

    fn run_unit(&mut self, unit: &str, events: &mut Vec<Event>) -> Result<(), ReplError> {
        // Earlier units of the same entry may have added context
        let context = self.session_source();
        let wrapped = wrap(&context, unit, self.statement_count(), &mut self.diagnostics).map_err(|d| self.relative(d))?;

        let source = format!("{}{}", context, wrapped.appendix);
        self.diagnostics.set_base(context.len() + wrapped.text_offset);
        let compiled = compile_unit(&source, context.len(), &mut self.diagnostics).map_err(ReplError::Compile)?;
        self.image.link(compiled)?;
        self.lines.extend(wrapped.lines);
        self.flush_diagnostics(events);

        let Some(entry) = wrapped.entry else {
            return Ok(());
        };
        let result = self.image.invoke(&entry);
        let output = self.image.take_output();
        if !output.is_empty() {
            events.push(Event::Output(output));
        }
        let value = result?;

        if let UnitKind::Expression { ty, printable } = wrapped.kind {
            if printable {
                let line = format_result(&value, &ty, self.image.memory(), self.options.string_probe_limit);
                events.push(Event::Result(line));
            } else {
                events.push(Event::Result(format!("=> ({})", type_name(&ty))));
                events.push(Event::Note(format!(
                    "Note: values of type '{}' cannot be printed.",
                    type_name(&ty)
                )));
            }
        }
        Ok(())
    }
}

fn run_command(command: Command) -> Vec<Event> {
    match command {
        Command::Help => vec![Event::Message(help_text())],
        Command::Version => vec![Event::Message(version_text())],
        Command::Quit => vec![Event::Quit],
        Command::Unknown(name) => vec![Event::Message(unknown_text(&name))],
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn results(reply: &Reply) -> Vec<String> {
        reply
            .events
            .iter()
            .filter_map(|e| match e {
                Event::Result(line) => Some(line.clone()),
                _ => None,
            })
            .collect()
    }

    #[test]
    fn test_expression_result() {
        let mut session = Session::default();
        let reply = session.process("42 + 1;");
        assert_eq!(results(&reply), vec!["=> (int) 43"]);
        assert_eq!(reply.prompt, PROMPT);
        assert_eq!(session.statement_count(), 1);
    }

    #[test]
    fn test_multi_line_function() {
        let mut session = Session::default();
        let reply = session.process("int sq(int x) {");
        assert_eq!(reply.prompt, CONTINUATION_PROMPT);
        assert_eq!(reply.indent, "  ");
        assert_eq!(session.state(), State::Buffering);

        let reply = session.process("return x * x; }");
        assert!(reply.events.is_empty(), "{:?}", reply.events);
        assert_eq!(session.state(), State::Idle);
        assert_eq!(session.session_source(), "int sq(int x);\n");

        assert_eq!(results(&session.process("sq(7);")), vec!["=> (int) 49"]);
    }

    #[test]
    fn test_compile_error_leaves_state() {
        let mut session = Session::default();
        let reply = session.process("undefined_thing + 1;");
        assert!(reply.events.iter().any(|e| matches!(e, Event::Diagnostic(_))));
        assert_eq!(reply.events.last(), Some(&Event::Note(IGNORED_NOTE.to_string())));
        assert!(session.lines().is_empty());
    }

    #[test]
    fn test_runtime_error_keeps_session() {
        let mut session = Session::default();
        session.process("int z = 0;");
        let reply = session.process("10 / z;");
        assert!(reply
            .events
            .iter()
            .any(|e| matches!(e, Event::Error(msg) if msg.contains("division by zero"))));
        assert_eq!(results(&session.process("z + 2;")), vec!["=> (int) 2"]);
    }

    #[test]
    fn test_partial_block_stays_applied() {
        let mut session = Session::default();
        session.process("int a = 0;");
        let reply = session.process("a = 5; nope(); a = 9;");
        assert_eq!(reply.events.last(), Some(&Event::Note(IGNORED_NOTE.to_string())));
        assert_eq!(results(&session.process("a;")), vec!["=> (int) 5"]);
    }

    #[test]
    fn test_printf_output_precedes_result() {
        let mut session = Session::default();
        let reply = session.process("printf(\"hi %d\\n\", 3);");
        assert_eq!(reply.events[0], Event::Output("hi 3\n".to_string()));
        assert_eq!(results(&reply), vec!["=> (int) 5"]);
    }

    #[test]
    fn test_macros_are_remembered() {
        let mut session = Session::default();
        session.process("#define SQUARE(x) ((x) * (x))");
        assert_eq!(session.lines()[0].kind, LineKind::Preprocessor);
        assert_eq!(results(&session.process("SQUARE(6);")), vec!["=> (int) 36"]);
    }

    #[test]
    fn test_commands_bypass_compiler() {
        let mut session = Session::default();
        assert_eq!(session.process(":quit").events, vec![Event::Quit]);
        assert!(session.lines().is_empty());
    }

    #[test]
    fn test_unmatched_buffer_is_discarded_by_blank_line() {
        let mut session = Session::default();
        let reply = session.process("x = 1);");
        assert!(matches!(reply.events[0], Event::Error(_)));
        assert_eq!(session.state(), State::Buffering);
        session.process("");
        assert_eq!(session.state(), State::Idle);
    }
}
