// crepl: incremental C read-eval-print loop

use std::io::{self, BufRead, IsTerminal, Write};

use clap::Parser;
use crossterm::style::{Color, Stylize};

use crepl::parser::Severity;
use crepl::repl::{Event, Reply, Session, SessionOptions};

/// Interactive C console
#[derive(Debug, Parser)]
#[command(name = "crepl", version, about = "An incremental read-eval-print loop for C")]
struct Cli {
    /// Print debugging information (classification, generated code)
    #[arg(long)]
    debug: bool,

    /// Read plain lines from stdin without prompts
    #[arg(long)]
    use_stdio: bool,

    /// Disable colored output
    #[arg(long)]
    no_color: bool,
}

struct Printer {
    color: bool,
}

impl Printer {
    fn paint(&self, text: &str, color: Color) -> String {
        if self.color {
            text.with(color).to_string()
        } else {
            text.to_string()
        }
    }

    fn print_events(&self, reply: &Reply) -> bool {
        let mut out = io::stdout().lock();
        for event in &reply.events {
            let written = match event {
                Event::Output(text) => write!(out, "{}", text),
                Event::Result(line) => writeln!(out, "{}", self.paint(line, Color::Green)),
                Event::Diagnostic(diagnostic) => {
                    let color = match diagnostic.severity {
                        Severity::Error => Color::Red,
                        Severity::Warning => Color::Yellow,
                    };
                    writeln!(out, "{}", self.paint(&diagnostic.to_string(), color))
                }
                Event::Error(message) => writeln!(out, "{}", self.paint(message, Color::Red)),
                Event::Note(note) => writeln!(out, "\n{}", self.paint(note, Color::DarkGrey)),
                Event::Message(message) => writeln!(out, "{}", message),
                Event::Quit => return false,
            };
            if let Err(err) = written {
                log::warn!("failed to write to stdout: {}", err);
            }
        }
        true
    }
}

fn run(cli: Cli) -> io::Result<()> {
    let interactive = !cli.use_stdio && io::stdin().is_terminal();
    let printer = Printer {
        color: !cli.no_color && io::stdout().is_terminal(),
    };
    if cli.debug {
        eprintln!("NOTE: Debugging information will be displayed.");
    }

    let mut session = Session::new(SessionOptions::default());
    let stdin = io::stdin();
    let mut lines = stdin.lock().lines();
    // Continuation lines start at the depth of the open block
    let mut indent = String::new();

    loop {
        if interactive {
            let mut out = io::stdout();
            write!(out, "{}{}", session.prompt(), indent)?;
            out.flush()?;
        }
        let Some(line) = lines.next() else {
            break;
        };
        let reply = session.process(&line?);
        if !printer.print_events(&reply) {
            break;
        }
        indent = reply.indent;
    }

    if interactive {
        println!();
    }
    Ok(())
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    let level = if cli.debug {
        log::LevelFilter::Debug
    } else {
        log::LevelFilter::Warn
    };
    env_logger::Builder::from_default_env().filter_level(level).init();

    run(cli)?;
    Ok(())
}
