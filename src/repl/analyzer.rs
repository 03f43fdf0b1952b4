//! Input completeness analysis
//!
//! Decides from tokens alone whether the buffered lines form a complete
//! unit. Brackets are tracked on a stack together with the token that
//! preceded each opener, so the `}` closing a `do { ... }` body is known
//! not to end the statement before its `while (...);` arrives.

use crate::parser::lexer::{Lexer, TokenKind};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Completeness {
    Complete,
    Incomplete,
}

/// Verdict on a buffer
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Analysis {
    pub completeness: Completeness,
    /// Open brackets plus open `#if` groups; drives the continuation indent
    pub depth: usize,
    /// A closing token that matched no opener, e.g. `")"`
    pub unmatched: Option<&'static str>,
}

impl Analysis {
    pub fn is_complete(&self) -> bool {
        self.completeness == Completeness::Complete
    }

    fn incomplete(depth: usize) -> Self {
        Analysis {
            completeness: Completeness::Incomplete,
            depth,
            unmatched: None,
        }
    }
}

/// Token the verdict looks at
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Last {
    None,
    Semicolon,
    CloseBrace { after_do: bool },
    Directive,
    Other,
}

/// Analyze `buffer` without side effects; the same buffer always gives
/// the same verdict.
pub fn analyze(buffer: &str) -> Analysis {
    if buffer.trim_end_matches(['\n', '\r']).ends_with('\\') {
        return Analysis::incomplete(0);
    }

    let tokens = match Lexer::new(buffer).tokenize() {
        Ok(tokens) => tokens,
        Err(err) => {
            // Comments and strings are judged by the classifier's parse
            log::trace!("analyzer: lex error treated as complete: {}", err);
            return Analysis {
                completeness: Completeness::Complete,
                depth: 0,
                unmatched: None,
            };
        }
    };

    let mut stack: Vec<(TokenKind, Option<TokenKind>)> = Vec::new();
    let mut conditionals: usize = 0;
    let mut previous: Option<TokenKind> = None;
    let mut last = Last::None;

    for token in tokens.into_iter().filter(|t| !t.is_eof()) {
        let kind = token.kind;
        last = Last::Other;
        match &kind {
            TokenKind::LParen | TokenKind::LBracket | TokenKind::LBrace => {
                stack.push((kind.clone(), previous.clone()));
            }
            TokenKind::RParen | TokenKind::RBracket | TokenKind::RBrace => {
                let opener = match kind {
                    TokenKind::RParen => TokenKind::LParen,
                    TokenKind::RBracket => TokenKind::LBracket,
                    _ => TokenKind::LBrace,
                };
                match stack.pop() {
                    Some((open, before)) if open == opener => {
                        if kind == TokenKind::RBrace {
                            last = Last::CloseBrace {
                                after_do: before == Some(TokenKind::Do),
                            };
                        }
                    }
                    _ => {
                        let closer = kind.punctuation();
                        log::trace!("analyzer: unmatched '{}'", closer);
                        return Analysis {
                            completeness: Completeness::Incomplete,
                            depth: stack.len(),
                            unmatched: Some(closer),
                        };
                    }
                }
            }
            TokenKind::Semicolon => last = Last::Semicolon,
            TokenKind::Directive(text) => {
                last = Last::Directive;
                match directive_name(text) {
                    "if" | "ifdef" | "ifndef" => conditionals += 1,
                    "endif" => conditionals = conditionals.saturating_sub(1),
                    _ => {}
                }
            }
            _ => {}
        }
        previous = Some(kind);
    }

    let depth = stack.len() + conditionals;
    let terminated = match last {
        Last::Semicolon | Last::Directive => true,
        Last::CloseBrace { after_do } => !after_do,
        Last::None | Last::Other => false,
    };
    let completeness = if depth == 0 && terminated {
        Completeness::Complete
    } else {
        Completeness::Incomplete
    };
    log::trace!("analyzer: {:?} at depth {}", completeness, depth);

    Analysis {
        completeness,
        depth,
        unmatched: None,
    }
}

/// Directive keyword, e.g. `ifdef` for `#  ifdef FOO`
fn directive_name(text: &str) -> &str {
    let body = text.trim_start().trim_start_matches('#').trim_start();
    let end = body
        .find(|c: char| !c.is_ascii_alphanumeric() && c != '_')
        .unwrap_or(body.len());
    &body[..end]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_balanced_input_is_complete() {
        for input in ["int x;", "x = 1;", "int f(void) { return 1; }", "struct P { int a[3]; };"] {
            let analysis = analyze(input);
            assert!(analysis.is_complete(), "{}", input);
            assert_eq!(analysis.depth, 0);
        }
    }

    #[test]
    fn test_open_brackets_set_depth() {
        let analysis = analyze("int f(void) {\n  if (x) {");
        assert_eq!(analysis.completeness, Completeness::Incomplete);
        assert_eq!(analysis.depth, 2);

        assert_eq!(analyze("foo(bar[").depth, 2);
    }

    #[test]
    fn test_do_while_waits_for_condition() {
        assert_eq!(analyze("do { x++; }").completeness, Completeness::Incomplete);
        assert!(analyze("do { x++; } while (x < 10);").is_complete());
    }

    #[test]
    fn test_missing_terminator() {
        let analysis = analyze("x + 1");
        assert_eq!(analysis.completeness, Completeness::Incomplete);
        assert_eq!(analysis.depth, 0);
    }

    #[test]
    fn test_preprocessor_conditionals() {
        let analysis = analyze("#ifdef FOO\nint x;");
        assert_eq!(analysis.completeness, Completeness::Incomplete);
        assert_eq!(analysis.depth, 1);
        assert!(analyze("#ifdef FOO\nint x;\n#endif").is_complete());
        assert!(analyze("#define N 10").is_complete());
    }

    #[test]
    fn test_trailing_backslash() {
        assert_eq!(analyze("#define F(x) \\\n").completeness, Completeness::Incomplete);
    }

    #[test]
    fn test_mismatch_reported() {
        let analysis = analyze("int x = (1];");
        assert_eq!(analysis.completeness, Completeness::Incomplete);
        assert_eq!(analysis.unmatched, Some("]"));
    }

    #[test]
    fn test_analysis_is_repeatable() {
        let buffer = "for (int i = 0; i < 3; i++) {\n  x += i;";
        assert_eq!(analyze(buffer), analyze(buffer));
    }
}
