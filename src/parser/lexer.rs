//! Lexer (tokenizer) for C source code
//!
//! Converts raw source text into a flat [`Token`] stream consumed by the
//! preprocessor and the parser. Every token carries the byte [`Span`] it was
//! read from so later stages can slice the original text back out verbatim.
//!
//! Preprocessor directives are not interpreted here: a `#` at the start of a
//! line produces a single [`TokenKind::Directive`] holding the whole logical
//! line (backslash continuations included). Backslash-newline pairs elsewhere
//! are treated as whitespace.

use super::ast::Span;
use crate::sema::types::IntKind;
use std::fmt;

/// All token kinds produced by the lexer
#[derive(Debug, Clone, PartialEq)]
pub enum TokenKind {
    // Literals
    IntLiteral(u64, IntKind),
    /// Value and whether it carried an `f` suffix
    FloatLiteral(f64, bool),
    CharLiteral(u8),
    StringLiteral(Vec<u8>),

    // Identifiers
    Ident(String),

    // Type keywords
    Void,
    Char,
    Short,
    Int,
    Long,
    Float,
    Double,
    Signed,
    Unsigned,
    Struct,
    Union,
    Typedef,
    Const,
    Volatile,
    Static,
    Extern,

    // Statement keywords
    If,
    Else,
    While,
    Do,
    For,
    Switch,
    Case,
    Default,
    Break,
    Continue,
    Return,
    Sizeof,

    // Arithmetic
    Plus,    // +
    Minus,   // -
    Star,    // *
    Slash,   // /
    Percent, // %

    // Comparison
    EqEq,  // ==
    NotEq, // !=
    Lt,    // <
    Le,    // <=
    Gt,    // >
    Ge,    // >=

    // Logical
    AndAnd, // &&
    OrOr,   // ||
    Bang,   // !

    // Bitwise
    Amp,   // &
    Pipe,  // |
    Caret, // ^
    Tilde, // ~
    LtLt,  // <<
    GtGt,  // >>

    // Assignment
    Eq,        // =
    PlusEq,    // +=
    MinusEq,   // -=
    StarEq,    // *=
    SlashEq,   // /=
    PercentEq, // %=
    AmpEq,     // &=
    PipeEq,    // |=
    CaretEq,   // ^=
    LtLtEq,    // <<=
    GtGtEq,    // >>=

    // Increment/Decrement
    PlusPlus,   // ++
    MinusMinus, // --

    // Member access
    Dot,   // .
    Arrow, // ->

    // Ternary
    Question, // ?
    Colon,    // :

    // Punctuation
    LParen,    // (
    RParen,    // )
    LBrace,    // {
    RBrace,    // }
    LBracket,  // [
    RBracket,  // ]
    Semicolon, // ;
    Comma,     // ,
    Ellipsis,  // ...
    Hash,      // # (only inside directive bodies)

    /// A whole preprocessor directive line, starting at `#`
    Directive(String),

    // End of file
    Eof,
}

/// A token with its byte span
#[derive(Debug, Clone, PartialEq)]
pub struct Token {
    pub kind: TokenKind,
    pub span: Span,
}

impl Token {
    pub fn new(kind: TokenKind, span: Span) -> Self {
        Token { kind, span }
    }

    pub fn is_eof(&self) -> bool {
        matches!(self.kind, TokenKind::Eof)
    }
}

impl fmt::Display for TokenKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TokenKind::IntLiteral(n, _) => write!(f, "int literal {}", n),
            TokenKind::FloatLiteral(n, _) => write!(f, "float literal {}", n),
            TokenKind::CharLiteral(c) => {
                if c.is_ascii_graphic() || *c == b' ' {
                    write!(f, "char literal '{}'", *c as char)
                } else {
                    write!(f, "char literal '\\x{:02x}'", c)
                }
            }
            TokenKind::StringLiteral(s) => {
                write!(f, "string literal \"{}\"", String::from_utf8_lossy(s))
            }
            TokenKind::Ident(s) => write!(f, "identifier '{}'", s),
            TokenKind::Directive(text) => write!(f, "directive '{}'", text.trim()),
            TokenKind::Eof => write!(f, "end of input"),
            other => write!(f, "'{}'", other.punctuation()),
        }
    }
}

impl TokenKind {
    /// Source spelling of keyword and punctuation tokens
    pub fn punctuation(&self) -> &'static str {
        match self {
            TokenKind::Void => "void",
            TokenKind::Char => "char",
            TokenKind::Short => "short",
            TokenKind::Int => "int",
            TokenKind::Long => "long",
            TokenKind::Float => "float",
            TokenKind::Double => "double",
            TokenKind::Signed => "signed",
            TokenKind::Unsigned => "unsigned",
            TokenKind::Struct => "struct",
            TokenKind::Union => "union",
            TokenKind::Typedef => "typedef",
            TokenKind::Const => "const",
            TokenKind::Volatile => "volatile",
            TokenKind::Static => "static",
            TokenKind::Extern => "extern",
            TokenKind::If => "if",
            TokenKind::Else => "else",
            TokenKind::While => "while",
            TokenKind::Do => "do",
            TokenKind::For => "for",
            TokenKind::Switch => "switch",
            TokenKind::Case => "case",
            TokenKind::Default => "default",
            TokenKind::Break => "break",
            TokenKind::Continue => "continue",
            TokenKind::Return => "return",
            TokenKind::Sizeof => "sizeof",
            TokenKind::Plus => "+",
            TokenKind::Minus => "-",
            TokenKind::Star => "*",
            TokenKind::Slash => "/",
            TokenKind::Percent => "%",
            TokenKind::EqEq => "==",
            TokenKind::NotEq => "!=",
            TokenKind::Lt => "<",
            TokenKind::Le => "<=",
            TokenKind::Gt => ">",
            TokenKind::Ge => ">=",
            TokenKind::AndAnd => "&&",
            TokenKind::OrOr => "||",
            TokenKind::Bang => "!",
            TokenKind::Amp => "&",
            TokenKind::Pipe => "|",
            TokenKind::Caret => "^",
            TokenKind::Tilde => "~",
            TokenKind::LtLt => "<<",
            TokenKind::GtGt => ">>",
            TokenKind::Eq => "=",
            TokenKind::PlusEq => "+=",
            TokenKind::MinusEq => "-=",
            TokenKind::StarEq => "*=",
            TokenKind::SlashEq => "/=",
            TokenKind::PercentEq => "%=",
            TokenKind::AmpEq => "&=",
            TokenKind::PipeEq => "|=",
            TokenKind::CaretEq => "^=",
            TokenKind::LtLtEq => "<<=",
            TokenKind::GtGtEq => ">>=",
            TokenKind::PlusPlus => "++",
            TokenKind::MinusMinus => "--",
            TokenKind::Dot => ".",
            TokenKind::Arrow => "->",
            TokenKind::Question => "?",
            TokenKind::Colon => ":",
            TokenKind::LParen => "(",
            TokenKind::RParen => ")",
            TokenKind::LBrace => "{",
            TokenKind::RBrace => "}",
            TokenKind::LBracket => "[",
            TokenKind::RBracket => "]",
            TokenKind::Semicolon => ";",
            TokenKind::Comma => ",",
            TokenKind::Ellipsis => "...",
            TokenKind::Hash => "#",
            _ => "",
        }
    }
}

/// Classes of lexical errors
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LexErrorKind {
    UnterminatedComment,
    UnterminatedString,
    UnterminatedChar,
    InvalidNumber,
    InvalidEscape,
    UnexpectedChar,
}

/// Lexer error type
#[derive(Debug, Clone)]
pub struct LexError {
    pub kind: LexErrorKind,
    pub message: String,
    pub offset: usize,
}

impl fmt::Display for LexError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Lexer error at offset {}: {}", self.offset, self.message)
    }
}

impl std::error::Error for LexError {}

/// Lexer for C source code
pub struct Lexer<'a> {
    input: &'a [u8],
    position: usize,
    /// Added to every reported offset; lets directive bodies be re-lexed in place
    base: usize,
    at_line_start: bool,
}

impl<'a> Lexer<'a> {
    /// Create a new lexer for the given source string.
    pub fn new(input: &'a str) -> Self {
        Self::with_base(input, 0)
    }

    /// Lexer whose offsets start at `base` instead of zero
    pub fn with_base(input: &'a str, base: usize) -> Self {
        Self {
            input: input.as_bytes(),
            position: 0,
            base,
            at_line_start: true,
        }
    }

    /// Tokenize the entire input
    pub fn tokenize(&mut self) -> Result<Vec<Token>, LexError> {
        let mut tokens = Vec::new();

        loop {
            self.skip_whitespace_and_comments()?;

            if self.is_at_end() {
                let end = self.offset();
                tokens.push(Token::new(TokenKind::Eof, Span::new(end, end)));
                break;
            }

            if self.at_line_start && self.peek() == Some(b'#') {
                tokens.push(self.directive()?);
                continue;
            }

            self.at_line_start = false;
            tokens.push(self.next_token()?);
        }

        Ok(tokens)
    }

    fn error(&self, kind: LexErrorKind, message: impl Into<String>, position: usize) -> LexError {
        LexError {
            kind,
            message: message.into(),
            offset: self.base + position,
        }
    }

    /// Get next token
    fn next_token(&mut self) -> Result<Token, LexError> {
        let start = self.position;
        let ch = self
            .advance()
            .ok_or_else(|| self.error(LexErrorKind::UnexpectedChar, "Unexpected end of input", start))?;

        let kind = match ch {
            b'"' => self.string_literal(start)?,
            b'\'' => self.char_literal(start)?,
            b'0'..=b'9' => self.number_literal(start)?,
            b'.' if self.peek().is_some_and(|c| c.is_ascii_digit()) => self.number_literal(start)?,
            b'a'..=b'z' | b'A'..=b'Z' | b'_' => self.identifier_or_keyword(start),

            b'+' => self.pick(&[("+", TokenKind::PlusPlus), ("=", TokenKind::PlusEq)], TokenKind::Plus),
            b'-' => self.pick(
                &[
                    ("-", TokenKind::MinusMinus),
                    ("=", TokenKind::MinusEq),
                    (">", TokenKind::Arrow),
                ],
                TokenKind::Minus,
            ),
            b'*' => self.pick(&[("=", TokenKind::StarEq)], TokenKind::Star),
            b'/' => self.pick(&[("=", TokenKind::SlashEq)], TokenKind::Slash),
            b'%' => self.pick(&[("=", TokenKind::PercentEq)], TokenKind::Percent),
            b'=' => self.pick(&[("=", TokenKind::EqEq)], TokenKind::Eq),
            b'!' => self.pick(&[("=", TokenKind::NotEq)], TokenKind::Bang),
            b'<' => self.pick(
                &[
                    ("<=", TokenKind::LtLtEq),
                    ("<", TokenKind::LtLt),
                    ("=", TokenKind::Le),
                ],
                TokenKind::Lt,
            ),
            b'>' => self.pick(
                &[
                    (">=", TokenKind::GtGtEq),
                    (">", TokenKind::GtGt),
                    ("=", TokenKind::Ge),
                ],
                TokenKind::Gt,
            ),
            b'&' => self.pick(&[("&", TokenKind::AndAnd), ("=", TokenKind::AmpEq)], TokenKind::Amp),
            b'|' => self.pick(&[("|", TokenKind::OrOr), ("=", TokenKind::PipeEq)], TokenKind::Pipe),
            b'^' => self.pick(&[("=", TokenKind::CaretEq)], TokenKind::Caret),
            b'.' => self.pick(&[("..", TokenKind::Ellipsis)], TokenKind::Dot),
            b'~' => TokenKind::Tilde,
            b'?' => TokenKind::Question,
            b':' => TokenKind::Colon,
            b'(' => TokenKind::LParen,
            b')' => TokenKind::RParen,
            b'{' => TokenKind::LBrace,
            b'}' => TokenKind::RBrace,
            b'[' => TokenKind::LBracket,
            b']' => TokenKind::RBracket,
            b';' => TokenKind::Semicolon,
            b',' => TokenKind::Comma,
            b'#' => TokenKind::Hash,

            _ => {
                return Err(self.error(
                    LexErrorKind::UnexpectedChar,
                    format!("Unexpected character: '{}'", ch.escape_ascii()),
                    start,
                ))
            }
        };

        Ok(Token::new(kind, Span::new(self.base + start, self.offset())))
    }

    /// Longest-match helper for multi-character operators. Candidates must be
    /// listed longest first.
    fn pick(&mut self, candidates: &[(&str, TokenKind)], fallback: TokenKind) -> TokenKind {
        for (suffix, kind) in candidates {
            if self.input[self.position..].starts_with(suffix.as_bytes()) {
                self.position += suffix.len();
                return kind.clone();
            }
        }
        fallback
    }

    /// Read a directive up to the end of its logical line
    fn directive(&mut self) -> Result<Token, LexError> {
        let start = self.position;
        while let Some(ch) = self.peek() {
            match ch {
                b'\n' => break,
                b'\\' if self.continues_line() => {
                    self.skip_continuation();
                }
                b'/' if self.peek_ahead(1) == Some(b'*') => self.skip_block_comment()?,
                b'/' if self.peek_ahead(1) == Some(b'/') => {
                    while self.peek().is_some_and(|c| c != b'\n') {
                        self.advance();
                    }
                }
                _ => {
                    self.advance();
                }
            }
        }
        let text = String::from_utf8_lossy(&self.input[start..self.position]).into_owned();
        Ok(Token::new(
            TokenKind::Directive(text),
            Span::new(self.base + start, self.offset()),
        ))
    }

    /// Parse string literal (opening quote already consumed)
    fn string_literal(&mut self, start: usize) -> Result<TokenKind, LexError> {
        let mut bytes = Vec::new();

        while let Some(ch) = self.peek() {
            match ch {
                b'"' => {
                    self.advance();
                    return Ok(TokenKind::StringLiteral(bytes));
                }
                b'\n' => break,
                b'\\' if self.continues_line() => self.skip_continuation(),
                b'\\' => {
                    self.advance();
                    bytes.push(self.escape_sequence()?);
                }
                _ => {
                    bytes.push(ch);
                    self.advance();
                }
            }
        }

        Err(self.error(LexErrorKind::UnterminatedString, "Unterminated string literal", start))
    }

    /// Parse character literal (opening quote already consumed)
    fn char_literal(&mut self, start: usize) -> Result<TokenKind, LexError> {
        let value = match self.advance() {
            Some(b'\\') => self.escape_sequence()?,
            Some(b'\'') => {
                return Err(self.error(LexErrorKind::UnterminatedChar, "Empty character literal", start));
            }
            Some(b'\n') | None => {
                return Err(self.error(
                    LexErrorKind::UnterminatedChar,
                    "Unterminated character literal",
                    start,
                ));
            }
            Some(ch) => ch,
        };

        if self.advance() != Some(b'\'') {
            return Err(self.error(
                LexErrorKind::UnterminatedChar,
                "Expected closing quote in character literal",
                start,
            ));
        }

        Ok(TokenKind::CharLiteral(value))
    }

    /// Decode one escape sequence; the backslash is already consumed
    fn escape_sequence(&mut self) -> Result<u8, LexError> {
        let at = self.position;
        let escaped = self
            .advance()
            .ok_or_else(|| self.error(LexErrorKind::InvalidEscape, "Incomplete escape sequence", at))?;

        let value = match escaped {
            b'n' => b'\n',
            b't' => b'\t',
            b'r' => b'\r',
            b'a' => 0x07,
            b'b' => 0x08,
            b'f' => 0x0c,
            b'v' => 0x0b,
            b'\\' => b'\\',
            b'\'' => b'\'',
            b'"' => b'"',
            b'?' => b'?',
            b'x' => {
                let mut value: u32 = 0;
                let mut digits = 0;
                while let Some(d) = self.peek().and_then(|c| (c as char).to_digit(16)) {
                    value = value.wrapping_mul(16).wrapping_add(d);
                    digits += 1;
                    self.advance();
                }
                if digits == 0 {
                    return Err(self.error(LexErrorKind::InvalidEscape, "Incomplete hex escape sequence", at));
                }
                value as u8
            }
            b'0'..=b'7' => {
                let mut value = (escaped - b'0') as u32;
                for _ in 0..2 {
                    match self.peek() {
                        Some(d @ b'0'..=b'7') => {
                            value = value * 8 + (d - b'0') as u32;
                            self.advance();
                        }
                        _ => break,
                    }
                }
                value as u8
            }
            _ => {
                return Err(self.error(
                    LexErrorKind::InvalidEscape,
                    format!("Unknown escape sequence: \\{}", escaped as char),
                    at,
                ));
            }
        };

        Ok(value)
    }

    /// Parse numeric literal; the first character is already consumed
    fn number_literal(&mut self, start: usize) -> Result<TokenKind, LexError> {
        self.position = start;

        let is_hex = self.input[start..].starts_with(b"0x") || self.input[start..].starts_with(b"0X");
        if is_hex {
            self.position += 2;
            let digits_start = self.position;
            while self.peek().is_some_and(|c| c.is_ascii_hexdigit()) {
                self.advance();
            }
            let digits = self.slice(digits_start, self.position);
            let value = u64::from_str_radix(&digits, 16)
                .map_err(|_| self.error(LexErrorKind::InvalidNumber, "Invalid hex literal", start))?;
            return self.int_suffix(start, value, false);
        }

        while self.peek().is_some_and(|c| c.is_ascii_digit()) {
            self.advance();
        }

        let mut is_float = false;
        if self.peek() == Some(b'.') {
            is_float = true;
            self.advance();
            while self.peek().is_some_and(|c| c.is_ascii_digit()) {
                self.advance();
            }
        }
        if matches!(self.peek(), Some(b'e') | Some(b'E')) {
            let save = self.position;
            self.advance();
            if matches!(self.peek(), Some(b'+') | Some(b'-')) {
                self.advance();
            }
            if self.peek().is_some_and(|c| c.is_ascii_digit()) {
                is_float = true;
                while self.peek().is_some_and(|c| c.is_ascii_digit()) {
                    self.advance();
                }
            } else {
                self.position = save;
            }
        }

        let text = self.slice(start, self.position);

        if is_float {
            let value: f64 = text
                .parse()
                .map_err(|_| self.error(LexErrorKind::InvalidNumber, format!("Invalid float literal: {}", text), start))?;
            let single = matches!(self.peek(), Some(b'f') | Some(b'F'));
            if single || matches!(self.peek(), Some(b'l') | Some(b'L')) {
                self.advance();
            }
            self.reject_trailing_alnum(start)?;
            return Ok(TokenKind::FloatLiteral(value, single));
        }

        let (digits, radix, decimal) = if text.len() > 1 && text.starts_with('0') {
            (&text[1..], 8, false)
        } else {
            (text.as_str(), 10, true)
        };
        let value = u64::from_str_radix(digits, radix)
            .map_err(|_| self.error(LexErrorKind::InvalidNumber, format!("Invalid integer literal: {}", text), start))?;
        self.int_suffix(start, value, decimal)
    }

    /// Read `u`/`l` suffixes and pick the literal's type
    fn int_suffix(&mut self, start: usize, value: u64, decimal: bool) -> Result<TokenKind, LexError> {
        let mut unsigned = false;
        let mut longs = 0;
        loop {
            match self.peek() {
                Some(b'u') | Some(b'U') if !unsigned => unsigned = true,
                Some(b'l') | Some(b'L') if longs < 2 => longs += 1,
                _ => break,
            }
            self.advance();
        }
        self.reject_trailing_alnum(start)?;

        let fits_int = value <= i32::MAX as u64;
        let fits_uint = value <= u32::MAX as u64;
        let fits_long = value <= i64::MAX as u64;

        let kind = match (unsigned, longs) {
            (false, 0) if fits_int => IntKind::Int,
            (false, 0) if !decimal && fits_uint => IntKind::UInt,
            (false, 0) | (false, 1) if fits_long => IntKind::Long,
            (false, 2) if fits_long => IntKind::LongLong,
            (true, 0) if fits_uint => IntKind::UInt,
            (_, 2) => IntKind::ULongLong,
            _ => IntKind::ULong,
        };

        Ok(TokenKind::IntLiteral(value, kind))
    }

    fn reject_trailing_alnum(&self, start: usize) -> Result<(), LexError> {
        match self.peek() {
            Some(c) if c.is_ascii_alphanumeric() || c == b'_' || c == b'.' => Err(self.error(
                LexErrorKind::InvalidNumber,
                format!("Invalid suffix on numeric literal: {}", self.slice(start, self.position + 1)),
                start,
            )),
            _ => Ok(()),
        }
    }

    /// Parse identifier or keyword
    fn identifier_or_keyword(&mut self, start: usize) -> TokenKind {
        while self.peek().is_some_and(|c| c.is_ascii_alphanumeric() || c == b'_') {
            self.advance();
        }

        let ident = self.slice(start, self.position);
        match ident.as_str() {
            "void" => TokenKind::Void,
            "char" => TokenKind::Char,
            "short" => TokenKind::Short,
            "int" => TokenKind::Int,
            "long" => TokenKind::Long,
            "float" => TokenKind::Float,
            "double" => TokenKind::Double,
            "signed" => TokenKind::Signed,
            "unsigned" => TokenKind::Unsigned,
            "struct" => TokenKind::Struct,
            "union" => TokenKind::Union,
            "typedef" => TokenKind::Typedef,
            "const" => TokenKind::Const,
            "volatile" => TokenKind::Volatile,
            "static" => TokenKind::Static,
            "extern" => TokenKind::Extern,
            "if" => TokenKind::If,
            "else" => TokenKind::Else,
            "while" => TokenKind::While,
            "do" => TokenKind::Do,
            "for" => TokenKind::For,
            "switch" => TokenKind::Switch,
            "case" => TokenKind::Case,
            "default" => TokenKind::Default,
            "break" => TokenKind::Break,
            "continue" => TokenKind::Continue,
            "return" => TokenKind::Return,
            "sizeof" => TokenKind::Sizeof,
            _ => TokenKind::Ident(ident),
        }
    }

    /// Skip whitespace, comments and line continuations
    fn skip_whitespace_and_comments(&mut self) -> Result<(), LexError> {
        loop {
            match self.peek() {
                Some(b'\n') => {
                    self.advance();
                    self.at_line_start = true;
                }
                Some(b' ') | Some(b'\t') | Some(b'\r') | Some(0x0b) | Some(0x0c) => {
                    self.advance();
                }
                Some(b'\\') if self.continues_line() => self.skip_continuation(),
                Some(b'/') if self.peek_ahead(1) == Some(b'/') => {
                    while self.peek().is_some_and(|c| c != b'\n') {
                        self.advance();
                    }
                }
                Some(b'/') if self.peek_ahead(1) == Some(b'*') => self.skip_block_comment()?,
                _ => break,
            }
        }
        Ok(())
    }

    /// Skip multi-line comment (/* ... */)
    fn skip_block_comment(&mut self) -> Result<(), LexError> {
        let start = self.position;
        self.position += 2;

        while !self.is_at_end() {
            if self.peek() == Some(b'*') && self.peek_ahead(1) == Some(b'/') {
                self.position += 2;
                return Ok(());
            }
            self.advance();
        }

        Err(self.error(LexErrorKind::UnterminatedComment, "Unterminated block comment", start))
    }

    /// Whether the backslash under the cursor starts a line continuation
    fn continues_line(&self) -> bool {
        match self.peek_ahead(1) {
            Some(b'\n') => true,
            Some(b'\r') => self.peek_ahead(2) == Some(b'\n'),
            _ => false,
        }
    }

    fn skip_continuation(&mut self) {
        self.advance();
        if self.peek() == Some(b'\r') {
            self.advance();
        }
        self.advance();
    }

    fn slice(&self, start: usize, end: usize) -> String {
        let end = end.min(self.input.len());
        String::from_utf8_lossy(&self.input[start..end]).into_owned()
    }

    /// Peek at current byte without consuming
    fn peek(&self) -> Option<u8> {
        self.input.get(self.position).copied()
    }

    /// Peek ahead n bytes
    fn peek_ahead(&self, n: usize) -> Option<u8> {
        self.input.get(self.position + n).copied()
    }

    /// Advance to next byte
    fn advance(&mut self) -> Option<u8> {
        let ch = self.peek()?;
        self.position += 1;
        Some(ch)
    }

    /// Check if at end of input
    fn is_at_end(&self) -> bool {
        self.position >= self.input.len()
    }

    fn offset(&self) -> usize {
        self.base + self.position
    }
}

/// Convenience wrapper: lex `source` from offset zero
pub fn tokenize(source: &str) -> Result<Vec<Token>, LexError> {
    Lexer::new(source).tokenize()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn kinds(source: &str) -> Vec<TokenKind> {
        tokenize(source).unwrap().into_iter().map(|t| t.kind).collect()
    }

    #[test]
    fn test_simple_tokens() {
        let tokens = kinds("int main() { return 0; }");

        assert_eq!(tokens[0], TokenKind::Int);
        assert!(matches!(tokens[1], TokenKind::Ident(ref s) if s == "main"));
        assert_eq!(tokens[2], TokenKind::LParen);
        assert_eq!(tokens[3], TokenKind::RParen);
        assert_eq!(tokens[4], TokenKind::LBrace);
        assert_eq!(tokens[5], TokenKind::Return);
        assert_eq!(tokens[6], TokenKind::IntLiteral(0, IntKind::Int));
        assert_eq!(tokens[7], TokenKind::Semicolon);
        assert_eq!(tokens[8], TokenKind::RBrace);
        assert_eq!(tokens[9], TokenKind::Eof);
    }

    #[test]
    fn test_operators() {
        let tokens = kinds("++ -- += -= == != && || <<= >>= -> ...");

        assert_eq!(
            tokens[..12],
            [
                TokenKind::PlusPlus,
                TokenKind::MinusMinus,
                TokenKind::PlusEq,
                TokenKind::MinusEq,
                TokenKind::EqEq,
                TokenKind::NotEq,
                TokenKind::AndAnd,
                TokenKind::OrOr,
                TokenKind::LtLtEq,
                TokenKind::GtGtEq,
                TokenKind::Arrow,
                TokenKind::Ellipsis,
            ]
        );
    }

    #[test]
    fn test_spans_are_byte_offsets() {
        let tokens = tokenize("int  xy = 42;").unwrap();
        assert_eq!(tokens[1].span, Span::new(5, 7));
        assert_eq!(tokens[3].span, Span::new(10, 12));
    }

    #[test]
    fn test_number_literals() {
        let tokens = kinds("0x1F 017 3000000000 10u 5L 1.5 2.0f 1e3");
        assert_eq!(tokens[0], TokenKind::IntLiteral(31, IntKind::Int));
        assert_eq!(tokens[1], TokenKind::IntLiteral(15, IntKind::Int));
        assert_eq!(tokens[2], TokenKind::IntLiteral(3_000_000_000, IntKind::Long));
        assert_eq!(tokens[3], TokenKind::IntLiteral(10, IntKind::UInt));
        assert_eq!(tokens[4], TokenKind::IntLiteral(5, IntKind::Long));
        assert_eq!(tokens[5], TokenKind::FloatLiteral(1.5, false));
        assert_eq!(tokens[6], TokenKind::FloatLiteral(2.0, true));
        assert_eq!(tokens[7], TokenKind::FloatLiteral(1000.0, false));
    }

    #[test]
    fn test_comments() {
        let tokens = kinds("int x; // comment\nint y; /* block\ncomment */ int z;");
        let idents: Vec<_> = tokens
            .iter()
            .filter_map(|t| match t {
                TokenKind::Ident(s) => Some(s.as_str()),
                _ => None,
            })
            .collect();
        assert_eq!(idents, ["x", "y", "z"]);
    }

    #[test]
    fn test_unterminated_comment_kind() {
        let err = tokenize("int x; /* open").unwrap_err();
        assert_eq!(err.kind, LexErrorKind::UnterminatedComment);
        assert_eq!(err.offset, 7);
    }

    #[test]
    fn test_string_and_char_escapes() {
        let tokens = kinds(r#""hello\n\x41\101" '\0' '\''"#);
        assert_eq!(tokens[0], TokenKind::StringLiteral(b"hello\nAA".to_vec()));
        assert_eq!(tokens[1], TokenKind::CharLiteral(0));
        assert_eq!(tokens[2], TokenKind::CharLiteral(b'\''));
    }

    #[test]
    fn test_directive_is_one_token() {
        let tokens = tokenize("#define SQ(x) \\\n  ((x)*(x))\nint y;").unwrap();
        assert!(matches!(&tokens[0].kind, TokenKind::Directive(t) if t.starts_with("#define SQ(x)")));
        assert_eq!(tokens[1].kind, TokenKind::Int);
    }

    #[test]
    fn test_hash_mid_line_is_not_directive() {
        let tokens = kinds("x # y");
        assert_eq!(tokens[1], TokenKind::Hash);
    }
}
