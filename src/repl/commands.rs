// Internal `:` commands, handled before any compilation

/// A recognized `:` command
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Help,
    Version,
    Quit,
    /// Anything else after a `:`
    Unknown(String),
}

/// Parse `line` as an internal command. Lines not starting with `:` are
/// left for the compiler.
pub fn parse_command(line: &str) -> Option<Command> {
    let rest = line.trim().strip_prefix(':')?;
    let name = rest.split_whitespace().next().unwrap_or("");
    Some(match name {
        "help" | "h" => Command::Help,
        "version" => Command::Version,
        "quit" | "q" | "exit" => Command::Quit,
        other => Command::Unknown(other.to_string()),
    })
}

pub fn help_text() -> String {
    [
        "The following commands are available:",
        "  :help    - displays this message",
        "  :version - displays the version",
        "  :quit    - leaves the session",
        "Anything else is compiled as C. Declarations and function definitions",
        "persist for the rest of the session; expressions print their value.",
    ]
    .join("\n")
}

pub fn version_text() -> String {
    format!("{} {}", env!("CARGO_PKG_NAME"), env!("CARGO_PKG_VERSION"))
}

pub fn unknown_text(name: &str) -> String {
    format!("Invalid command ':{}'. Type :help for a list of commands.", name)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_command() {
        assert_eq!(parse_command(":help"), Some(Command::Help));
        assert_eq!(parse_command("  :quit  "), Some(Command::Quit));
        assert_eq!(parse_command(":load libm.so"), Some(Command::Unknown("load".to_string())));
        assert_eq!(parse_command("x = 1;"), None);
    }
}
