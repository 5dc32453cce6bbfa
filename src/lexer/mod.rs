use std::string::String;
use thiserror::Error;

/// Deepest bracket nesting accepted
pub const MAX_BRACKET_DEPTH: usize = 200;

/// Deepest block indentation accepted
pub const MAX_INDENT_LEVELS: usize = 100;

#[derive(PartialEq, Debug, Clone)]
pub enum Token {
    // Keywords
    False,
    None,
    True,
    And,
    As,
    Assert,
    Async,
    Await,
    Break,
    Class,
    Continue,
    Def,
    Del,
    Elif,
    Else,
    Except,
    Finally,
    For,
    From,
    Global,
    If,
    Import,
    In,
    Is,
    Lambda,
    Nonlocal,
    Not,
    Or,
    Pass,
    Raise,
    Return,
    Try,
    While,
    With,
    Yield,

    // Identifiers and literals
    Identifier(String),
    /// Raw numeric text with digit separators removed
    NumberLiteral(String),
    StringLiteral {
        value: String,
        kind: StringKind,
    },

    // Operators and punctuation
    Plus,
    Minus,
    Star,
    DoubleStar,
    Slash,
    DoubleSlash,
    Percent,
    At,
    LeftShift,
    RightShift,
    BitwiseAnd,
    BitwiseOr,
    BitwiseXor,
    Tilde,
    ColonEqual,
    Less,
    Greater,
    LessEqual,
    GreaterEqual,
    EqualEqual,
    NotEqual,
    LeftParen,
    RightParen,
    LeftBracket,
    RightBracket,
    LeftBrace,
    RightBrace,
    Comma,
    Colon,
    Dot,
    Ellipsis,
    Semicolon,
    Equal,
    Arrow,

    // Augmented assignment
    PlusEqual,
    MinusEqual,
    StarEqual,
    DoubleStarEqual,
    SlashEqual,
    DoubleSlashEqual,
    PercentEqual,
    AtEqual,
    BitwiseAndEqual,
    BitwiseOrEqual,
    BitwiseXorEqual,
    LeftShiftEqual,
    RightShiftEqual,

    // Layout
    Newline,
    Indent,
    Dedent,

    // End of file
    EOF,
}

/// What a string literal's prefix made of it
#[derive(PartialEq, Debug, Clone, Copy)]
pub enum StringKind {
    Str,
    Bytes,
    /// f-string, `value` holds the undecoded body so the parser can
    /// extract the embedded expressions
    Format,
}

#[derive(PartialEq, Debug, Clone)]
pub struct SpannedToken {
    pub token: Token,
    pub line: usize,
    pub column: usize,
}

#[derive(Debug, Clone, PartialEq, Error)]
#[error("{message}")]
pub struct LexError {
    pub message: String,
    pub line: usize,
}

pub struct Lexer {
    chars: Vec<char>,
    pos: usize,
    line: usize,
    column: usize,
    indent_stack: Vec<usize>,
    /// Open brackets with the line each was opened on
    brackets: Vec<(char, usize)>,
    at_line_start: bool,
}

impl Lexer {
    pub fn new(source: &str) -> Self {
        Lexer {
            chars: source.chars().collect(),
            pos: 0,
            line: 1,
            column: 0,
            indent_stack: vec![0],
            brackets: Vec::new(),
            at_line_start: true,
        }
    }

    /// Starting line reported for the first token, used when lexing a
    /// fragment lifted out of a larger file
    pub fn with_line_offset(mut self, line: usize) -> Self {
        self.line = line;
        self
    }

    fn advance(&mut self) -> Option<char> {
        let ch = self.chars.get(self.pos).copied();
        if let Some(c) = ch {
            self.pos += 1;
            self.column += 1;
            if c == '\n' {
                self.line += 1;
                self.column = 0;
            }
        }
        ch
    }

    fn peek(&self) -> Option<char> {
        self.chars.get(self.pos).copied()
    }

    fn peek_at(&self, offset: usize) -> Option<char> {
        self.chars.get(self.pos + offset).copied()
    }

    fn error<T>(&self, message: impl Into<String>) -> Result<T, LexError> {
        Err(LexError {
            message: message.into(),
            line: self.line,
        })
    }

    fn skip_comment(&mut self) {
        while let Some(c) = self.peek() {
            if c == '\n' {
                break;
            }
            self.advance();
        }
    }

    /// Measures the indentation of the current physical line. Returns `None`
    /// for blank and comment-only lines, which never affect the block structure.
    fn read_indentation(&mut self) -> Option<usize> {
        let mut width = 0;
        loop {
            match self.peek() {
                Some(' ') => width += 1,
                Some('\t') => width = (width / 8 + 1) * 8,
                Some('\x0c') => width = 0,
                _ => break,
            }
            self.advance();
        }

        match self.peek() {
            Some('#') => {
                self.skip_comment();
                None
            }
            Some('\n') | Some('\r') | None => None,
            _ => Some(width),
        }
    }

    fn read_identifier(&mut self) -> String {
        let mut identifier = String::new();

        while let Some(c) = self.peek() {
            if c.is_alphanumeric() || c == '_' {
                identifier.push(c);
                self.advance();
            } else {
                break;
            }
        }

        identifier
    }

    fn read_number(&mut self) -> Result<String, LexError> {
        let mut number = String::new();

        let radix_prefix = matches!(
            (self.peek(), self.peek_at(1)),
            (Some('0'), Some('x' | 'X' | 'o' | 'O' | 'b' | 'B'))
        );
        if radix_prefix {
            number.push('0');
            self.advance();
            let marker = self.advance().map(|m| m.to_ascii_lowercase());
            let (radix, name) = match marker {
                Some('x') => (16, "hexadecimal"),
                Some('o') => (8, "octal"),
                _ => (2, "binary"),
            };
            number.extend(marker);
            while let Some(c) = self.peek() {
                if c.is_digit(radix) {
                    number.push(c);
                } else if c.is_ascii_digit() {
                    return self.error(format!("invalid digit '{}' in {} literal", c, name));
                } else if c != '_' {
                    break;
                }
                self.advance();
            }
            if number.len() == 2 {
                return self.error(format!("invalid {} literal", number));
            }
            return Ok(number);
        }

        let mut has_decimal = false;
        let mut has_exponent = false;

        while let Some(c) = self.peek() {
            if c.is_ascii_digit() {
                number.push(c);
                self.advance();
            } else if c == '_' && self.peek_at(1).is_some_and(|n| n.is_ascii_digit()) {
                self.advance();
            } else if c == '.' && !has_decimal && !has_exponent {
                has_decimal = true;
                number.push(c);
                self.advance();
            } else if (c == 'e' || c == 'E') && !has_exponent {
                let sign = matches!(self.peek_at(1), Some('+' | '-'));
                let digit_at = if sign { 2 } else { 1 };
                if !self.peek_at(digit_at).is_some_and(|n| n.is_ascii_digit()) {
                    break;
                }
                has_exponent = true;
                number.push('e');
                self.advance();
                if sign {
                    if let Some(s) = self.advance() {
                        number.push(s);
                    }
                }
            } else {
                break;
            }
        }

        if let Some('j' | 'J') = self.peek() {
            self.advance();
            number.push('j');
        }

        Ok(number)
    }

    fn read_string(&mut self, prefix: &str) -> Result<Token, LexError> {
        let lowered = prefix.to_ascii_lowercase();
        let raw = lowered.contains('r');
        let kind = if lowered.contains('b') {
            StringKind::Bytes
        } else if lowered.contains('f') {
            StringKind::Format
        } else {
            StringKind::Str
        };

        let Some(quote) = self.advance() else {
            return self.error("unterminated string literal");
        };
        let triple = self.peek() == Some(quote) && self.peek_at(1) == Some(quote);
        if triple {
            self.advance();
            self.advance();
        }

        let start_line = self.line;
        let mut value = String::new();

        loop {
            let Some(c) = self.advance() else {
                return Err(LexError {
                    message: if triple {
                        "unterminated triple-quoted string literal".to_string()
                    } else {
                        "unterminated string literal".to_string()
                    },
                    line: start_line,
                });
            };

            if c == quote {
                if !triple {
                    break;
                }
                if self.peek() == Some(quote) && self.peek_at(1) == Some(quote) {
                    self.advance();
                    self.advance();
                    break;
                }
                value.push(c);
            } else if c == '\n' && !triple {
                return Err(LexError {
                    message: "unterminated string literal".to_string(),
                    line: start_line,
                });
            } else if c == '\\' {
                let Some(escape) = self.advance() else {
                    continue;
                };
                if raw || kind == StringKind::Format {
                    value.push('\\');
                    value.push(escape);
                    continue;
                }
                match escape {
                    '\n' => {}
                    'n' => value.push('\n'),
                    't' => value.push('\t'),
                    'r' => value.push('\r'),
                    '0' => value.push('\0'),
                    '\\' => value.push('\\'),
                    '\'' => value.push('\''),
                    '"' => value.push('"'),
                    other => {
                        // Unknown escapes survive verbatim
                        value.push('\\');
                        value.push(other);
                    }
                }
            } else {
                value.push(c);
            }
        }

        Ok(Token::StringLiteral { value, kind })
    }

    fn read_operator(&mut self, c: char) -> Result<Token, LexError> {
        let next = self.peek();
        let token = match c {
            '(' | '[' | '{' => {
                if self.brackets.len() >= MAX_BRACKET_DEPTH {
                    return self.error("too many nested parentheses");
                }
                self.brackets.push((c, self.line));
                match c {
                    '(' => Token::LeftParen,
                    '[' => Token::LeftBracket,
                    _ => Token::LeftBrace,
                }
            }
            ')' | ']' | '}' => {
                let Some((open, _)) = self.brackets.pop() else {
                    return self.error(format!("unmatched '{}'", c));
                };
                let expected = match open {
                    '(' => ')',
                    '[' => ']',
                    _ => '}',
                };
                if c != expected {
                    return self.error(format!(
                        "closing parenthesis '{}' does not match opening parenthesis '{}'",
                        c, open
                    ));
                }
                match c {
                    ')' => Token::RightParen,
                    ']' => Token::RightBracket,
                    _ => Token::RightBrace,
                }
            }
            ',' => Token::Comma,
            ';' => Token::Semicolon,
            '~' => Token::Tilde,
            ':' => {
                if next == Some('=') {
                    self.advance();
                    Token::ColonEqual
                } else {
                    Token::Colon
                }
            }
            '.' => {
                if next == Some('.') && self.peek_at(1) == Some('.') {
                    self.advance();
                    self.advance();
                    Token::Ellipsis
                } else {
                    Token::Dot
                }
            }
            '+' => self.with_equal(Token::Plus, Token::PlusEqual),
            '%' => self.with_equal(Token::Percent, Token::PercentEqual),
            '@' => self.with_equal(Token::At, Token::AtEqual),
            '&' => self.with_equal(Token::BitwiseAnd, Token::BitwiseAndEqual),
            '|' => self.with_equal(Token::BitwiseOr, Token::BitwiseOrEqual),
            '^' => self.with_equal(Token::BitwiseXor, Token::BitwiseXorEqual),
            '=' => self.with_equal(Token::Equal, Token::EqualEqual),
            '-' => {
                if next == Some('>') {
                    self.advance();
                    Token::Arrow
                } else {
                    self.with_equal(Token::Minus, Token::MinusEqual)
                }
            }
            '*' => {
                if next == Some('*') {
                    self.advance();
                    self.with_equal(Token::DoubleStar, Token::DoubleStarEqual)
                } else {
                    self.with_equal(Token::Star, Token::StarEqual)
                }
            }
            '/' => {
                if next == Some('/') {
                    self.advance();
                    self.with_equal(Token::DoubleSlash, Token::DoubleSlashEqual)
                } else {
                    self.with_equal(Token::Slash, Token::SlashEqual)
                }
            }
            '<' => {
                if next == Some('<') {
                    self.advance();
                    self.with_equal(Token::LeftShift, Token::LeftShiftEqual)
                } else {
                    self.with_equal(Token::Less, Token::LessEqual)
                }
            }
            '>' => {
                if next == Some('>') {
                    self.advance();
                    self.with_equal(Token::RightShift, Token::RightShiftEqual)
                } else {
                    self.with_equal(Token::Greater, Token::GreaterEqual)
                }
            }
            '!' => {
                if next == Some('=') {
                    self.advance();
                    Token::NotEqual
                } else {
                    return self.error("invalid syntax");
                }
            }
            _ => return self.error(format!("invalid character '{}'", c)),
        };

        Ok(token)
    }

    fn with_equal(&mut self, plain: Token, with_equal: Token) -> Token {
        if self.peek() == Some('=') {
            self.advance();
            with_equal
        } else {
            plain
        }
    }

    fn keyword(identifier: &str) -> Option<Token> {
        let token = match identifier {
            "False" => Token::False,
            "None" => Token::None,
            "True" => Token::True,
            "and" => Token::And,
            "as" => Token::As,
            "assert" => Token::Assert,
            "async" => Token::Async,
            "await" => Token::Await,
            "break" => Token::Break,
            "class" => Token::Class,
            "continue" => Token::Continue,
            "def" => Token::Def,
            "del" => Token::Del,
            "elif" => Token::Elif,
            "else" => Token::Else,
            "except" => Token::Except,
            "finally" => Token::Finally,
            "for" => Token::For,
            "from" => Token::From,
            "global" => Token::Global,
            "if" => Token::If,
            "import" => Token::Import,
            "in" => Token::In,
            "is" => Token::Is,
            "lambda" => Token::Lambda,
            "nonlocal" => Token::Nonlocal,
            "not" => Token::Not,
            "or" => Token::Or,
            "pass" => Token::Pass,
            "raise" => Token::Raise,
            "return" => Token::Return,
            "try" => Token::Try,
            "while" => Token::While,
            "with" => Token::With,
            "yield" => Token::Yield,
            _ => return None,
        };
        Some(token)
    }

    fn is_string_prefix(identifier: &str) -> bool {
        matches!(
            identifier.to_ascii_lowercase().as_str(),
            "r" | "u" | "b" | "f" | "br" | "rb" | "fr" | "rf"
        )
    }

    fn push(&self, tokens: &mut Vec<SpannedToken>, token: Token, line: usize, column: usize) {
        tokens.push(SpannedToken {
            token,
            line,
            column,
        });
    }

    fn handle_line_start(&mut self, tokens: &mut Vec<SpannedToken>) -> Result<(), LexError> {
        let Some(width) = self.read_indentation() else {
            return Ok(());
        };
        self.at_line_start = false;

        let current = self.indent_stack.last().copied().unwrap_or(0);
        if width > current {
            if self.indent_stack.len() > MAX_INDENT_LEVELS {
                return self.error("too many levels of indentation");
            }
            self.indent_stack.push(width);
            self.push(tokens, Token::Indent, self.line, 0);
        } else if width < current {
            while self.indent_stack.last().is_some_and(|&top| top > width) {
                self.indent_stack.pop();
                self.push(tokens, Token::Dedent, self.line, 0);
            }
            if self.indent_stack.last() != Some(&width) {
                return self.error("unindent does not match any outer indentation level");
            }
        }
        Ok(())
    }

    pub fn tokenize(&mut self) -> Result<Vec<SpannedToken>, LexError> {
        let mut tokens: Vec<SpannedToken> = Vec::new();

        loop {
            if self.at_line_start && self.brackets.is_empty() {
                self.handle_line_start(&mut tokens)?;
            }

            let Some(c) = self.peek() else {
                break;
            };
            let (line, column) = (self.line, self.column);

            match c {
                ' ' | '\t' | '\x0c' | '\r' => {
                    self.advance();
                }
                '\n' => {
                    self.advance();
                    if self.brackets.is_empty() {
                        let ends_statement = tokens
                            .last()
                            .is_some_and(|t| !matches!(t.token, Token::Newline));
                        if ends_statement && !self.at_line_start {
                            self.push(&mut tokens, Token::Newline, line, column);
                        }
                        self.at_line_start = true;
                    }
                }
                '#' => self.skip_comment(),
                '\\' => {
                    self.advance();
                    if self.peek() == Some('\r') {
                        self.advance();
                    }
                    if self.peek() != Some('\n') {
                        return self.error("unexpected character after line continuation character");
                    }
                    self.advance();
                }
                '"' | '\'' => {
                    let token = self.read_string("")?;
                    self.push(&mut tokens, token, line, column);
                }
                '0'..='9' => {
                    let number = self.read_number()?;
                    self.push(&mut tokens, Token::NumberLiteral(number), line, column);
                }
                '.' if self.peek_at(1).is_some_and(|n| n.is_ascii_digit()) => {
                    let number = self.read_number()?;
                    self.push(&mut tokens, Token::NumberLiteral(number), line, column);
                }
                c if c.is_alphabetic() || c == '_' => {
                    let identifier = self.read_identifier();
                    let quoted = matches!(self.peek(), Some('"' | '\''));
                    let token = if quoted && Self::is_string_prefix(&identifier) {
                        self.read_string(&identifier)?
                    } else {
                        Self::keyword(&identifier).unwrap_or(Token::Identifier(identifier))
                    };
                    self.push(&mut tokens, token, line, column);
                }
                _ => {
                    self.advance();
                    let token = self.read_operator(c)?;
                    self.push(&mut tokens, token, line, column);
                }
            }
        }

        if let Some((open, line)) = self.brackets.last() {
            return Err(LexError {
                message: format!("'{}' was never closed", open),
                line: *line,
            });
        }

        let needs_newline = tokens
            .last()
            .is_some_and(|t| !matches!(t.token, Token::Newline | Token::Dedent));
        if needs_newline {
            self.push(&mut tokens, Token::Newline, self.line, self.column);
        }
        while self.indent_stack.len() > 1 {
            self.indent_stack.pop();
            self.push(&mut tokens, Token::Dedent, self.line, 0);
        }
        self.push(&mut tokens, Token::EOF, self.line, self.column);

        Ok(tokens)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn kinds(source: &str) -> Vec<Token> {
        Lexer::new(source)
            .tokenize()
            .unwrap()
            .into_iter()
            .map(|t| t.token)
            .collect()
    }

    #[test]
    fn test_indent_and_dedent() {
        let tokens = kinds("if x:\n    y\nz\n");
        assert_eq!(
            tokens,
            vec![
                Token::If,
                Token::Identifier("x".into()),
                Token::Colon,
                Token::Newline,
                Token::Indent,
                Token::Identifier("y".into()),
                Token::Newline,
                Token::Dedent,
                Token::Identifier("z".into()),
                Token::Newline,
                Token::EOF,
            ]
        );
    }

    #[test]
    fn test_blank_and_comment_lines_are_ignored() {
        let tokens = kinds("x = 1\n\n    # indented comment\ny = 2\n");
        assert!(!tokens.contains(&Token::Indent));
        assert_eq!(tokens.iter().filter(|t| **t == Token::Newline).count(), 2);
    }

    #[test]
    fn test_brackets_join_lines() {
        let tokens = kinds("f(a,\n  b)\n");
        assert_eq!(tokens.iter().filter(|t| **t == Token::Newline).count(), 1);
        assert!(!tokens.contains(&Token::Indent));
    }

    #[test]
    fn test_numbers() {
        let tokens = kinds("1_000 0x1F 3.5e-2 2j .5\n");
        assert_eq!(tokens[0], Token::NumberLiteral("1000".into()));
        assert_eq!(tokens[1], Token::NumberLiteral("0x1F".into()));
        assert_eq!(tokens[2], Token::NumberLiteral("3.5e-2".into()));
        assert_eq!(tokens[3], Token::NumberLiteral("2j".into()));
        assert_eq!(tokens[4], Token::NumberLiteral(".5".into()));
    }

    #[test]
    fn test_string_prefixes_and_triple_quotes() {
        let tokens = kinds("b'x' f\"{a}\" '''one\ntwo'''\n");
        assert_eq!(
            tokens[0],
            Token::StringLiteral {
                value: "x".into(),
                kind: StringKind::Bytes
            }
        );
        assert_eq!(
            tokens[1],
            Token::StringLiteral {
                value: "{a}".into(),
                kind: StringKind::Format
            }
        );
        assert_eq!(
            tokens[2],
            Token::StringLiteral {
                value: "one\ntwo".into(),
                kind: StringKind::Str
            }
        );
    }

    #[test]
    fn test_string_lines_are_tracked() {
        let tokens = Lexer::new("'''a\nb'''\nx\n").tokenize().unwrap();
        let x = tokens
            .iter()
            .find(|t| t.token == Token::Identifier("x".into()))
            .unwrap();
        assert_eq!(x.line, 3);
    }

    #[test]
    fn test_unterminated_string() {
        let err = Lexer::new("x = 'abc\n").tokenize().unwrap_err();
        assert_eq!(err.message, "unterminated string literal");
        assert_eq!(err.line, 1);
    }

    #[test]
    fn test_inconsistent_dedent() {
        let err = Lexer::new("if x:\n    y\n  z\n").tokenize().unwrap_err();
        assert_eq!(err.line, 3);
    }

    #[test]
    fn test_unclosed_bracket_reports_opening_line() {
        let err = Lexer::new("x = 1\nf(1,\n  [2,\n").tokenize().unwrap_err();
        assert_eq!(err.message, "'[' was never closed");
        assert_eq!(err.line, 3);
    }

    #[test]
    fn test_mismatched_bracket() {
        let err = Lexer::new("f(1]\n").tokenize().unwrap_err();
        assert_eq!(
            err.message,
            "closing parenthesis ']' does not match opening parenthesis '('"
        );
    }

    #[test]
    fn test_bracket_nesting_limit() {
        let at_limit = format!(
            "x = {}1{}\n",
            "(".repeat(MAX_BRACKET_DEPTH),
            ")".repeat(MAX_BRACKET_DEPTH)
        );
        assert!(Lexer::new(&at_limit).tokenize().is_ok());

        let deep = format!("x = {}1{}\n", "(".repeat(20000), ")".repeat(20000));
        let err = Lexer::new(&deep).tokenize().unwrap_err();
        assert_eq!(err.message, "too many nested parentheses");
        assert_eq!(err.line, 1);
    }

    #[test]
    fn test_indentation_limit() {
        let mut source = String::new();
        for level in 0..=MAX_INDENT_LEVELS {
            source.push_str(&" ".repeat(level));
            source.push_str("if x:\n");
        }
        source.push_str(&" ".repeat(MAX_INDENT_LEVELS + 1));
        source.push_str("pass\n");
        let err = Lexer::new(&source).tokenize().unwrap_err();
        assert_eq!(err.message, "too many levels of indentation");
    }

    #[test]
    fn test_invalid_radix_digits() {
        let err = Lexer::new("x = 0o19\n").tokenize().unwrap_err();
        assert_eq!(err.message, "invalid digit '9' in octal literal");
        assert!(Lexer::new("x = 0b102\n").tokenize().is_err());
        assert_eq!(kinds("0o17\n")[0], Token::NumberLiteral("0o17".into()));
    }

    #[test]
    fn test_compound_operators() {
        let tokens = kinds("a //= b ** c -> d := e != f\n");
        assert!(tokens.contains(&Token::DoubleSlashEqual));
        assert!(tokens.contains(&Token::DoubleStar));
        assert!(tokens.contains(&Token::Arrow));
        assert!(tokens.contains(&Token::ColonEqual));
        assert!(tokens.contains(&Token::NotEqual));
    }
}
