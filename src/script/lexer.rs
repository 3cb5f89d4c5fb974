//! Tokenizer for the test-source dialect (the TypeScript/JavaScript subset the
//! validation test corpus is written in).

use crate::error::{HarvestError, Result};

const PUNCTUATORS: &[&str] = &[
    "...", "===", "!==", "**", "=>", "==", "!=", "<=", ">=", "&&", "||", "??", "?.", "+=", "-=",
    "++", "--", "{", "}", "(", ")", "[", "]", ";", ",", "<", ">", "+", "-", "*", "/", "%", "!",
    "?", ":", "=", ".", "&", "|", "~", "@", "^",
];

#[derive(Debug, Clone, PartialEq)]
pub enum TokenKind {
    /// Identifiers and keywords alike; the parser decides.
    Ident(String),
    Number(f64),
    Str(String),
    Template(TemplateToken),
    Punct(&'static str),
    Eof,
}

/// A template literal split into cooked text chunks and the token streams of
/// its `${...}` substitutions. `quasis.len() == substitutions.len() + 1`.
#[derive(Debug, Clone, PartialEq)]
pub struct TemplateToken {
    pub quasis: Vec<String>,
    pub substitutions: Vec<Vec<Token>>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Token {
    pub kind: TokenKind,
    pub line: usize,
    pub column: usize,
    pub newline_before: bool,
}

impl Token {
    pub fn is_punct(&self, p: &str) -> bool {
        matches!(&self.kind, TokenKind::Punct(q) if *q == p)
    }

    pub fn is_ident(&self, name: &str) -> bool {
        matches!(&self.kind, TokenKind::Ident(id) if id == name)
    }
}

pub fn tokenize(source: &str, file: &str) -> Result<Vec<Token>> {
    let mut lexer = Lexer {
        chars: source.chars().collect(),
        pos: 0,
        line: 1,
        column: 1,
        file,
    };
    let mut tokens = lexer.lex_until(false)?;
    tokens.push(Token {
        kind: TokenKind::Eof,
        line: lexer.line,
        column: lexer.column,
        newline_before: true,
    });
    Ok(tokens)
}

struct Lexer<'a> {
    chars: Vec<char>,
    pos: usize,
    line: usize,
    column: usize,
    file: &'a str,
}

impl Lexer<'_> {
    fn peek(&self) -> Option<char> {
        self.chars.get(self.pos).copied()
    }

    fn peek_at(&self, offset: usize) -> Option<char> {
        self.chars.get(self.pos + offset).copied()
    }

    fn bump(&mut self) -> Option<char> {
        let ch = self.chars.get(self.pos).copied()?;
        self.pos += 1;
        if ch == '\n' {
            self.line += 1;
            self.column = 1;
        } else {
            self.column += 1;
        }
        Some(ch)
    }

    fn error(&self, message: impl Into<String>) -> HarvestError {
        HarvestError::Parse {
            file: self.file.to_string(),
            line: self.line,
            column: self.column,
            message: message.into(),
        }
    }

    /// Lex tokens until end of input, or, inside a template substitution,
    /// until the `}` that closes it (consumed, not returned).
    fn lex_until(&mut self, in_substitution: bool) -> Result<Vec<Token>> {
        let mut tokens = Vec::new();
        let mut depth = 0usize;
        loop {
            let newline_before = self.skip_trivia()?;
            let (line, column) = (self.line, self.column);
            let Some(ch) = self.peek() else {
                if in_substitution {
                    return Err(self.error("unterminated template substitution"));
                }
                return Ok(tokens);
            };

            let kind = if ch == '}' && in_substitution && depth == 0 {
                self.bump();
                return Ok(tokens);
            } else if ch.is_ascii_digit() || (ch == '.' && self.peek_at(1).is_some_and(|c| c.is_ascii_digit())) {
                TokenKind::Number(self.lex_number()?)
            } else if is_ident_start(ch) {
                let mut ident = String::new();
                while let Some(c) = self.peek() {
                    if is_ident_continue(c) {
                        ident.push(c);
                        self.bump();
                    } else {
                        break;
                    }
                }
                TokenKind::Ident(ident)
            } else if ch == '\'' || ch == '"' {
                TokenKind::Str(self.lex_string(ch)?)
            } else if ch == '`' {
                TokenKind::Template(self.lex_template()?)
            } else {
                let punct = self.lex_punct()?;
                match punct {
                    "{" => depth += 1,
                    "}" => depth = depth.saturating_sub(1),
                    _ => {}
                }
                TokenKind::Punct(punct)
            };

            tokens.push(Token {
                kind,
                line,
                column,
                newline_before,
            });
        }
    }

    /// Skips whitespace and comments; reports whether a line break was crossed.
    fn skip_trivia(&mut self) -> Result<bool> {
        let mut newline = false;
        loop {
            match (self.peek(), self.peek_at(1)) {
                (Some('\n'), _) => {
                    newline = true;
                    self.bump();
                }
                (Some(c), _) if c.is_whitespace() => {
                    self.bump();
                }
                (Some('/'), Some('/')) => {
                    while let Some(c) = self.peek() {
                        if c == '\n' {
                            break;
                        }
                        self.bump();
                    }
                }
                (Some('/'), Some('*')) => {
                    self.bump();
                    self.bump();
                    loop {
                        match self.bump() {
                            Some('*') if self.peek() == Some('/') => {
                                self.bump();
                                break;
                            }
                            Some('\n') => newline = true,
                            Some(_) => {}
                            None => return Err(self.error("unterminated block comment")),
                        }
                    }
                }
                _ => return Ok(newline),
            }
        }
    }

    fn lex_number(&mut self) -> Result<f64> {
        if self.peek() == Some('0') && matches!(self.peek_at(1), Some('x' | 'X')) {
            self.bump();
            self.bump();
            let mut digits = String::new();
            while let Some(c) = self.peek() {
                if c.is_ascii_hexdigit() || c == '_' {
                    if c != '_' {
                        digits.push(c);
                    }
                    self.bump();
                } else {
                    break;
                }
            }
            return u64::from_str_radix(&digits, 16)
                .map(|n| n as f64)
                .map_err(|_| self.error("malformed hex literal"));
        }

        let mut text = String::new();
        let mut seen_exponent = false;
        while let Some(c) = self.peek() {
            let accept = c.is_ascii_digit()
                || c == '_'
                || (c == '.' && !text.contains('.') && !seen_exponent)
                || ((c == 'e' || c == 'E') && !seen_exponent)
                || ((c == '+' || c == '-') && text.ends_with(['e', 'E']));
            if !accept {
                break;
            }
            if c == 'e' || c == 'E' {
                seen_exponent = true;
            }
            if c != '_' {
                text.push(c);
            }
            self.bump();
        }
        text.parse::<f64>()
            .map_err(|_| self.error(format!("malformed number literal '{text}'")))
    }

    fn lex_escape(&mut self, out: &mut String) -> Result<()> {
        let Some(esc) = self.bump() else {
            return Err(self.error("unterminated escape sequence"));
        };
        match esc {
            'n' => out.push('\n'),
            't' => out.push('\t'),
            'r' => out.push('\r'),
            'b' => out.push('\u{8}'),
            'f' => out.push('\u{c}'),
            'v' => out.push('\u{b}'),
            '0' => out.push('\0'),
            '\n' => {}
            'x' => {
                let hex: String = [self.bump(), self.bump()].into_iter().flatten().collect();
                let code = u32::from_str_radix(&hex, 16)
                    .map_err(|_| self.error("malformed \\x escape"))?;
                out.extend(char::from_u32(code));
            }
            'u' => {
                let hex = if self.peek() == Some('{') {
                    self.bump();
                    let mut hex = String::new();
                    while let Some(c) = self.bump() {
                        if c == '}' {
                            break;
                        }
                        hex.push(c);
                    }
                    hex
                } else {
                    (0..4).filter_map(|_| self.bump()).collect()
                };
                let code = u32::from_str_radix(&hex, 16)
                    .map_err(|_| self.error("malformed \\u escape"))?;
                out.push(char::from_u32(code).unwrap_or('\u{fffd}'));
            }
            other => out.push(other),
        }
        Ok(())
    }

    fn lex_string(&mut self, quote: char) -> Result<String> {
        self.bump();
        let mut out = String::new();
        loop {
            match self.bump() {
                Some(c) if c == quote => return Ok(out),
                Some('\\') => self.lex_escape(&mut out)?,
                Some('\n') | None => return Err(self.error("unterminated string literal")),
                Some(c) => out.push(c),
            }
        }
    }

    fn lex_template(&mut self) -> Result<TemplateToken> {
        self.bump();
        let mut quasis = Vec::new();
        let mut substitutions = Vec::new();
        let mut current = String::new();
        loop {
            match self.bump() {
                Some('`') => {
                    quasis.push(current);
                    return Ok(TemplateToken {
                        quasis,
                        substitutions,
                    });
                }
                Some('\\') => self.lex_escape(&mut current)?,
                Some('$') if self.peek() == Some('{') => {
                    self.bump();
                    quasis.push(std::mem::take(&mut current));
                    let mut inner = self.lex_until(true)?;
                    inner.push(Token {
                        kind: TokenKind::Eof,
                        line: self.line,
                        column: self.column,
                        newline_before: false,
                    });
                    substitutions.push(inner);
                }
                Some('\r') => {
                    // Template literals normalize CRLF and CR to LF.
                    if self.peek() == Some('\n') {
                        self.bump();
                    }
                    current.push('\n');
                }
                Some(c) => current.push(c),
                None => return Err(self.error("unterminated template literal")),
            }
        }
    }

    fn lex_punct(&mut self) -> Result<&'static str> {
        for punct in PUNCTUATORS {
            let len = punct.chars().count();
            let matches = punct
                .chars()
                .enumerate()
                .all(|(i, c)| self.peek_at(i) == Some(c));
            // `?.5` is a conditional followed by a number, not optional chaining.
            if matches
                && !(*punct == "?." && self.peek_at(2).is_some_and(|c| c.is_ascii_digit()))
            {
                for _ in 0..len {
                    self.bump();
                }
                return Ok(punct);
            }
        }
        let ch = self.peek().unwrap_or('\0');
        Err(self.error(format!("unexpected character '{ch}'")))
    }
}

fn is_ident_start(c: char) -> bool {
    c.is_alphabetic() || c == '_' || c == '$'
}

fn is_ident_continue(c: char) -> bool {
    c.is_alphanumeric() || c == '_' || c == '$'
}
