//! Lexical Analysis
//!
//! Compiler pass that tokenizes _Twine_ source code, producing a sequence of
//! tokens terminated by a single `Eof` token.

use std::fmt;

use thiserror::Error;

/// Reserved words of the _Twine_ language.
const KEYWORDS: [(&str, Keyword); 12] = [
    ("let", Keyword::Let),
    ("var", Keyword::Var),
    ("const", Keyword::Const),
    ("function", Keyword::Function),
    ("if", Keyword::If),
    ("else", Keyword::Else),
    ("while", Keyword::While),
    ("for", Keyword::For),
    ("return", Keyword::Return),
    ("true", Keyword::True),
    ("false", Keyword::False),
    ("null", Keyword::Null),
];

/// Keywords of the _Twine_ language.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[allow(missing_docs)]
pub enum Keyword {
    Let,
    Var,
    Const,
    Function,
    If,
    Else,
    While,
    For,
    Return,
    True,
    False,
    Null,
}

/// Operators of the _Twine_ language.
///
/// There are no bitwise operators; a bare `&` or `|` is a lex error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OperatorKind {
    /// `+` binary operator.
    Plus,
    /// `-` binary or unary operator.
    Minus,
    /// `*` binary operator.
    Asterisk,
    /// `/` binary operator.
    Division,
    /// `%` binary operator.
    Remainder,
    /// `=` assignment operator.
    Assign,
    /// `==` binary operator.
    Eq,
    /// `!=` binary operator.
    NotEq,
    /// `<` binary operator.
    LessThan,
    /// `<=` binary operator.
    LessThanEq,
    /// `>` binary operator.
    GreaterThan,
    /// `>=` binary operator.
    GreaterThanEq,
    /// `&&` binary operator.
    LogAnd,
    /// `||` binary operator.
    LogOr,
    /// `!` unary operator.
    LogNot,
}

/// Types of lexical elements.
#[derive(Debug, Clone, PartialEq)]
#[allow(missing_docs)]
pub enum TokenKind {
    Keyword(Keyword),
    Ident,
    Number,
    Str,
    Operator(OperatorKind),
    ParenOpen,
    ParenClose,
    BraceOpen,
    BraceClose,
    BracketOpen,
    BracketClose,
    Semicolon,
    Comma,
    Dot,
    /// Produced for bytes no rule recognizes; lexing continues.
    Unknown,
    Eof,
}

/// Minimal lexical element of a _Twine_ source file.
///
/// `lexeme` holds the source substring, already decoded for string literals.
/// `line` and `col` are 1-based and point at the token's first byte.
#[derive(Debug, Clone, PartialEq)]
#[allow(missing_docs)]
pub struct Token {
    pub kind: TokenKind,
    pub lexeme: String,
    pub line: usize,
    pub col: usize,
}

impl fmt::Display for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.kind {
            TokenKind::Eof => write!(f, "end of file"),
            _ => write!(f, "'{}'", self.lexeme),
        }
    }
}

/// Diagnostics produced during lexical analysis. Never fatal on their own.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[allow(missing_docs)]
pub enum LexError {
    /// A string literal ran to end of input without a closing quote.
    #[error("lex error at line {line}, column {col}: unterminated string")]
    UnterminatedString { line: usize, col: usize },
    /// A `/*` comment ran to end of input without a closing `*/`.
    #[error("lex error at line {line}, column {col}: unterminated block comment")]
    UnterminatedBlockComment { line: usize, col: usize },
    /// A byte no lexical rule recognizes.
    #[error("lex error at line {line}, column {col}: unexpected character '{ch}'")]
    UnexpectedCharacter { ch: char, line: usize, col: usize },
}

/// Tokenizer for _Twine_ source code.
#[derive(Debug)]
pub struct Lexer<'a> {
    src: &'a [u8],
    cur: usize,
    // Index of the byte following the last newline (used to calculate the
    // current column).
    bol: usize,
    line: usize,
    diagnostics: Vec<LexError>,
}

impl<'a> Lexer<'a> {
    /// Returns a new `Lexer` over the given source text.
    pub fn new(source: &'a str) -> Self {
        Self {
            src: source.as_bytes(),
            cur: 0,
            bol: 0,
            line: 1,
            diagnostics: Vec::new(),
        }
    }

    /// Tokenizes the entire input, producing a token sequence terminated by
    /// `Eof`. Diagnostics are collected rather than returned; lexing always
    /// runs to end of input.
    pub fn tokenize(&mut self) -> Vec<Token> {
        let mut tokens = Vec::new();

        loop {
            let token = self.next_token();
            let done = token.kind == TokenKind::Eof;
            tokens.push(token);

            if done {
                break;
            }
        }

        tokens
    }

    /// Returns the diagnostics collected so far.
    pub fn diagnostics(&self) -> &[LexError] {
        &self.diagnostics
    }

    /// Scans and returns the next token, skipping whitespace and comments.
    fn next_token(&mut self) -> Token {
        self.skip_whitespace_and_comments();

        if !self.has_next() {
            return Token {
                kind: TokenKind::Eof,
                lexeme: String::new(),
                line: self.line,
                col: self.col(),
            };
        }

        let line = self.line;
        let col = self.col();

        match self.first() {
            b'0'..=b'9' => self.scan_number(line, col),
            b'a'..=b'z' | b'A'..=b'Z' | b'_' | b'$' => self.scan_ident(line, col),
            b'"' | b'\'' => self.scan_string(line, col),
            b'=' => {
                self.cur += 1;
                if self.has_next() && self.first() == b'=' {
                    self.cur += 1;
                    self.operator(OperatorKind::Eq, "==", line, col)
                } else {
                    self.operator(OperatorKind::Assign, "=", line, col)
                }
            }
            b'!' => {
                self.cur += 1;
                if self.has_next() && self.first() == b'=' {
                    self.cur += 1;
                    self.operator(OperatorKind::NotEq, "!=", line, col)
                } else {
                    self.operator(OperatorKind::LogNot, "!", line, col)
                }
            }
            b'<' => {
                self.cur += 1;
                if self.has_next() && self.first() == b'=' {
                    self.cur += 1;
                    self.operator(OperatorKind::LessThanEq, "<=", line, col)
                } else {
                    self.operator(OperatorKind::LessThan, "<", line, col)
                }
            }
            b'>' => {
                self.cur += 1;
                if self.has_next() && self.first() == b'=' {
                    self.cur += 1;
                    self.operator(OperatorKind::GreaterThanEq, ">=", line, col)
                } else {
                    self.operator(OperatorKind::GreaterThan, ">", line, col)
                }
            }
            b'&' => {
                self.cur += 1;
                if self.has_next() && self.first() == b'&' {
                    self.cur += 1;
                    self.operator(OperatorKind::LogAnd, "&&", line, col)
                } else {
                    // No bitwise AND in the language.
                    self.unknown('&', line, col)
                }
            }
            b'|' => {
                self.cur += 1;
                if self.has_next() && self.first() == b'|' {
                    self.cur += 1;
                    self.operator(OperatorKind::LogOr, "||", line, col)
                } else {
                    // No bitwise OR in the language.
                    self.unknown('|', line, col)
                }
            }
            b'+' => self.single(TokenKind::Operator(OperatorKind::Plus), "+", line, col),
            b'-' => self.single(TokenKind::Operator(OperatorKind::Minus), "-", line, col),
            b'*' => self.single(TokenKind::Operator(OperatorKind::Asterisk), "*", line, col),
            b'/' => self.single(TokenKind::Operator(OperatorKind::Division), "/", line, col),
            b'%' => self.single(TokenKind::Operator(OperatorKind::Remainder), "%", line, col),
            b';' => self.single(TokenKind::Semicolon, ";", line, col),
            b',' => self.single(TokenKind::Comma, ",", line, col),
            b'.' => self.single(TokenKind::Dot, ".", line, col),
            b'(' => self.single(TokenKind::ParenOpen, "(", line, col),
            b')' => self.single(TokenKind::ParenClose, ")", line, col),
            b'{' => self.single(TokenKind::BraceOpen, "{", line, col),
            b'}' => self.single(TokenKind::BraceClose, "}", line, col),
            b'[' => self.single(TokenKind::BracketOpen, "[", line, col),
            b']' => self.single(TokenKind::BracketClose, "]", line, col),
            b => {
                self.cur += 1;
                self.unknown(b as char, line, col)
            }
        }
    }

    /// Skips whitespace, `//` line comments and `/* */` block comments.
    ///
    /// Block comments do **not** nest; the first `*/` closes the comment.
    fn skip_whitespace_and_comments(&mut self) {
        while self.has_next() {
            match self.first() {
                b'\n' => {
                    self.cur += 1;
                    self.line += 1;
                    self.bol = self.cur;
                }
                b' ' | b'\t' | b'\r' => {
                    self.cur += 1;
                }
                b'/' if self.peek(1) == Some(b'/') => {
                    while self.has_next() && self.first() != b'\n' {
                        self.cur += 1;
                    }
                }
                b'/' if self.peek(1) == Some(b'*') => {
                    let line = self.line;
                    let col = self.col();

                    // Consume the "/*".
                    self.cur += 2;

                    loop {
                        if !self.has_next() {
                            self.diagnostics
                                .push(LexError::UnterminatedBlockComment { line, col });
                            break;
                        }

                        match self.first() {
                            b'*' if self.peek(1) == Some(b'/') => {
                                self.cur += 2;
                                break;
                            }
                            b'\n' => {
                                self.cur += 1;
                                self.line += 1;
                                self.bol = self.cur;
                            }
                            _ => self.cur += 1,
                        }
                    }
                }
                _ => break,
            }
        }
    }

    /// Scans a number: one or more digits, optionally followed by `.` and one
    /// or more digits. A trailing `.` without a following digit is left for
    /// the next token.
    fn scan_number(&mut self, line: usize, col: usize) -> Token {
        let start = self.cur;

        while self.has_next() && self.first().is_ascii_digit() {
            self.cur += 1;
        }

        if self.has_next()
            && self.first() == b'.'
            && self.peek(1).is_some_and(|b| b.is_ascii_digit())
        {
            // Consume the ".".
            self.cur += 1;

            while self.has_next() && self.first().is_ascii_digit() {
                self.cur += 1;
            }
        }

        let lexeme = std::str::from_utf8(&self.src[start..self.cur])
            .expect("digit bytes should be valid UTF-8")
            .to_owned();

        Token {
            kind: TokenKind::Number,
            lexeme,
            line,
            col,
        }
    }

    /// Scans an identifier or keyword.
    fn scan_ident(&mut self, line: usize, col: usize) -> Token {
        let start = self.cur;

        while self.has_next()
            && (self.first().is_ascii_alphanumeric() || self.first() == b'_' || self.first() == b'$')
        {
            self.cur += 1;
        }

        let lexeme = std::str::from_utf8(&self.src[start..self.cur])
            .expect("identifier bytes should be valid UTF-8")
            .to_owned();

        let kind = match KEYWORDS.iter().find(|(word, _)| *word == lexeme) {
            Some((_, keyword)) => TokenKind::Keyword(*keyword),
            None => TokenKind::Ident,
        };

        Token {
            kind,
            lexeme,
            line,
            col,
        }
    }

    /// Scans a string literal delimited by `"` or `'` (matching quotes),
    /// decoding the escapes `\n` `\t` `\r` `\\` `\"` `\'`. Any other `\X`
    /// yields a literal `X`.
    fn scan_string(&mut self, line: usize, col: usize) -> Token {
        let quote = self.first();

        // Consume the opening quote.
        self.cur += 1;

        let mut value = Vec::new();

        while self.has_next() && self.first() != quote {
            match self.first() {
                b'\\' => {
                    self.cur += 1;

                    if !self.has_next() {
                        break;
                    }

                    let escaped = match self.first() {
                        b'n' => b'\n',
                        b't' => b'\t',
                        b'r' => b'\r',
                        other => other,
                    };
                    value.push(escaped);
                    self.cur += 1;
                }
                b'\n' => {
                    value.push(b'\n');
                    self.cur += 1;
                    self.line += 1;
                    self.bol = self.cur;
                }
                b => {
                    value.push(b);
                    self.cur += 1;
                }
            }
        }

        if !self.has_next() {
            self.diagnostics
                .push(LexError::UnterminatedString { line, col });

            return Token {
                kind: TokenKind::Unknown,
                lexeme: String::new(),
                line,
                col,
            };
        }

        // Consume the closing quote.
        self.cur += 1;

        Token {
            kind: TokenKind::Str,
            lexeme: String::from_utf8_lossy(&value).into_owned(),
            line,
            col,
        }
    }

    fn single(&mut self, kind: TokenKind, lexeme: &str, line: usize, col: usize) -> Token {
        self.cur += 1;

        Token {
            kind,
            lexeme: lexeme.to_owned(),
            line,
            col,
        }
    }

    fn operator(&mut self, op: OperatorKind, lexeme: &str, line: usize, col: usize) -> Token {
        Token {
            kind: TokenKind::Operator(op),
            lexeme: lexeme.to_owned(),
            line,
            col,
        }
    }

    fn unknown(&mut self, ch: char, line: usize, col: usize) -> Token {
        self.diagnostics
            .push(LexError::UnexpectedCharacter { ch, line, col });

        Token {
            kind: TokenKind::Unknown,
            lexeme: ch.to_string(),
            line,
            col,
        }
    }

    /// Returns the byte at the current cursor position. Does not update the
    /// cursor position.
    ///
    /// # Panics
    ///
    /// Will _panic_ if the cursor position is out of bounds.
    #[inline]
    fn first(&self) -> u8 {
        self.src[self.cur]
    }

    /// Returns the byte `offset` positions ahead of the cursor, or `None` if
    /// out of bounds.
    #[inline]
    fn peek(&self, offset: usize) -> Option<u8> {
        self.src.get(self.cur + offset).copied()
    }

    /// Returns `true` if the cursor position is within bounds of `src`.
    #[inline]
    const fn has_next(&self) -> bool {
        self.cur < self.src.len()
    }

    /// Returns the 1-based column of the current cursor position.
    #[inline]
    const fn col(&self) -> usize {
        self.cur - self.bol + 1
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn kinds(source: &str) -> Vec<TokenKind> {
        Lexer::new(source)
            .tokenize()
            .into_iter()
            .map(|t| t.kind)
            .collect()
    }

    #[test]
    fn lexer_ends_with_eof() {
        let tokens = Lexer::new("").tokenize();
        assert_eq!(tokens.len(), 1);
        assert_eq!(tokens[0].kind, TokenKind::Eof);
    }

    #[test]
    fn lexer_keywords_and_idents() {
        let tokens = Lexer::new("let x = true;").tokenize();

        assert_eq!(tokens[0].kind, TokenKind::Keyword(Keyword::Let));
        assert_eq!(tokens[1].kind, TokenKind::Ident);
        assert_eq!(tokens[1].lexeme, "x");
        assert_eq!(tokens[2].kind, TokenKind::Operator(OperatorKind::Assign));
        assert_eq!(tokens[3].kind, TokenKind::Keyword(Keyword::True));
        assert_eq!(tokens[4].kind, TokenKind::Semicolon);
        assert_eq!(tokens[5].kind, TokenKind::Eof);
    }

    #[test]
    fn lexer_dollar_in_ident() {
        let tokens = Lexer::new("$tmp_1").tokenize();
        assert_eq!(tokens[0].kind, TokenKind::Ident);
        assert_eq!(tokens[0].lexeme, "$tmp_1");
    }

    #[test]
    fn lexer_numbers() {
        let tokens = Lexer::new("42 3.14 7.").tokenize();

        assert_eq!(tokens[0].kind, TokenKind::Number);
        assert_eq!(tokens[0].lexeme, "42");
        assert_eq!(tokens[1].kind, TokenKind::Number);
        assert_eq!(tokens[1].lexeme, "3.14");
        // "7." is a number followed by a dot, since no digit follows.
        assert_eq!(tokens[2].kind, TokenKind::Number);
        assert_eq!(tokens[2].lexeme, "7");
        assert_eq!(tokens[3].kind, TokenKind::Dot);
    }

    #[test]
    fn lexer_string_escapes() {
        let tokens = Lexer::new(r#""a\tb\n\\\"q\'" 'single'"#).tokenize();

        assert_eq!(tokens[0].kind, TokenKind::Str);
        assert_eq!(tokens[0].lexeme, "a\tb\n\\\"q'");
        assert_eq!(tokens[1].kind, TokenKind::Str);
        assert_eq!(tokens[1].lexeme, "single");
    }

    #[test]
    fn lexer_unknown_escape_is_literal() {
        let tokens = Lexer::new(r#""\z""#).tokenize();
        assert_eq!(tokens[0].lexeme, "z");
    }

    #[test]
    fn lexer_two_char_operators() {
        assert_eq!(
            kinds("== != <= >= && || = < > !"),
            vec![
                TokenKind::Operator(OperatorKind::Eq),
                TokenKind::Operator(OperatorKind::NotEq),
                TokenKind::Operator(OperatorKind::LessThanEq),
                TokenKind::Operator(OperatorKind::GreaterThanEq),
                TokenKind::Operator(OperatorKind::LogAnd),
                TokenKind::Operator(OperatorKind::LogOr),
                TokenKind::Operator(OperatorKind::Assign),
                TokenKind::Operator(OperatorKind::LessThan),
                TokenKind::Operator(OperatorKind::GreaterThan),
                TokenKind::Operator(OperatorKind::LogNot),
                TokenKind::Eof,
            ]
        );
    }

    #[test]
    fn lexer_bare_ampersand_is_unknown() {
        let mut lexer = Lexer::new("a & b");
        let tokens = lexer.tokenize();

        assert_eq!(tokens[1].kind, TokenKind::Unknown);
        assert!(matches!(
            lexer.diagnostics()[0],
            LexError::UnexpectedCharacter { ch: '&', .. }
        ));
    }

    #[test]
    fn lexer_comments_are_skipped() {
        let source = "1 // line comment\n/* block\ncomment */ 2";
        let tokens = Lexer::new(source).tokenize();

        assert_eq!(tokens[0].lexeme, "1");
        assert_eq!(tokens[1].lexeme, "2");
        assert_eq!(tokens[1].line, 3);
        assert_eq!(tokens[2].kind, TokenKind::Eof);
    }

    #[test]
    fn lexer_block_comments_do_not_nest() {
        // The first "*/" closes the comment, leaving "rest" in the stream.
        let tokens = Lexer::new("/* outer /* inner */ rest").tokenize();
        assert_eq!(tokens[0].lexeme, "rest");
        assert_eq!(tokens[0].kind, TokenKind::Ident);
    }

    #[test]
    fn lexer_unterminated_block_comment() {
        let mut lexer = Lexer::new("1 /* never closed");
        let tokens = lexer.tokenize();

        assert_eq!(tokens[0].lexeme, "1");
        assert_eq!(tokens[1].kind, TokenKind::Eof);
        assert!(matches!(
            lexer.diagnostics()[0],
            LexError::UnterminatedBlockComment { line: 1, col: 3 }
        ));
    }

    #[test]
    fn lexer_unterminated_string() {
        let mut lexer = Lexer::new("\"open");
        let tokens = lexer.tokenize();

        assert_eq!(tokens[0].kind, TokenKind::Unknown);
        assert!(matches!(
            lexer.diagnostics()[0],
            LexError::UnterminatedString { line: 1, col: 1 }
        ));
    }

    #[test]
    fn lexer_positions_are_one_based() {
        let tokens = Lexer::new("let x;\n  y = 2;").tokenize();

        assert_eq!((tokens[0].line, tokens[0].col), (1, 1));
        assert_eq!((tokens[1].line, tokens[1].col), (1, 5));
        assert_eq!((tokens[2].line, tokens[2].col), (1, 6));
        // "y" on line 2 after two spaces.
        assert_eq!((tokens[3].line, tokens[3].col), (2, 3));
    }

    #[test]
    fn lexeme_concatenation_reproduces_the_source() {
        // With whitespace and comments discarded, lexemes in order spell the
        // remaining source text.
        let source = "let x = 1 + 2; // trailing\nwhile (x < 10) { x = x * 2; }";
        let joined: String = Lexer::new(source)
            .tokenize()
            .iter()
            .map(|t| t.lexeme.as_str())
            .collect();

        let stripped: String = source
            .split("// trailing")
            .map(|part| part.split_whitespace().collect::<String>())
            .collect();
        assert_eq!(joined, stripped);
    }

    #[test]
    fn lexer_is_idempotent() {
        let source = "function f(a) { return a * 2; } print(f(21));";
        let first = Lexer::new(source).tokenize();
        let second = Lexer::new(source).tokenize();
        assert_eq!(first, second);
    }
}
