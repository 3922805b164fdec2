use std::str::Chars;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Span {
    pub start: usize,
    pub end: usize,
}

impl Span {
    pub fn new(start: usize, end: usize) -> Self {
        Self { start, end }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenKind {
    // Section headers, only recognized in the first column
    Name,
    Rows,
    Columns,
    Rhs,
    Ranges,
    Bounds,
    Objsense,
    Endata,

    /// Any other whitespace-delimited field
    Word,

    // Special
    Newline,
    Comment,
    Eof,
}

impl TokenKind {
    pub fn is_section(self) -> bool {
        matches!(
            self,
            TokenKind::Name
                | TokenKind::Rows
                | TokenKind::Columns
                | TokenKind::Rhs
                | TokenKind::Ranges
                | TokenKind::Bounds
                | TokenKind::Objsense
                | TokenKind::Endata
        )
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Token {
    pub kind: TokenKind,
    pub span: Span,
    /// 1-based source line
    pub line: usize,
    /// Token starts in the first column of its line
    pub leading: bool,
    pub text: String,
}

impl Token {
    pub fn new(kind: TokenKind, span: Span, line: usize, leading: bool, text: impl Into<String>) -> Self {
        Self {
            kind,
            span,
            line,
            leading,
            text: text.into(),
        }
    }
}

/// Splits MPS source into whitespace-delimited fields.
///
/// Free-format MPS is assumed: fields are separated by any run of blanks and
/// names may not contain spaces. Lines starting with `*` are comments.
pub struct Lexer<'a> {
    source: &'a str,
    chars: Chars<'a>,
    pos: usize,
    line: usize,
    line_start: usize,
    current: Option<char>,
}

impl<'a> Lexer<'a> {
    pub fn new(source: &'a str) -> Self {
        let mut chars = source.chars();
        let current = chars.next();
        Self {
            source,
            chars,
            pos: 0,
            line: 1,
            line_start: 0,
            current,
        }
    }

    pub fn tokenize(source: &str) -> Vec<Token> {
        let mut lexer = Lexer::new(source);
        let mut tokens = Vec::new();
        loop {
            let token = lexer.next_token();
            let is_eof = token.kind == TokenKind::Eof;
            tokens.push(token);
            if is_eof {
                break;
            }
        }
        tokens
    }

    fn advance(&mut self) -> Option<char> {
        let c = self.current?;
        self.current = self.chars.next();
        self.pos += c.len_utf8();
        Some(c)
    }

    fn peek(&self) -> Option<char> {
        self.current
    }

    fn skip_whitespace(&mut self) {
        while let Some(c) = self.peek() {
            if c == ' ' || c == '\t' || c == '\r' {
                self.advance();
            } else {
                break;
            }
        }
    }

    fn read_comment(&mut self) -> Token {
        let start = self.pos;
        while let Some(c) = self.peek() {
            if c == '\n' {
                break;
            }
            self.advance();
        }
        Token::new(
            TokenKind::Comment,
            Span::new(start, self.pos),
            self.line,
            true,
            &self.source[start..self.pos],
        )
    }

    fn read_word(&mut self) -> Token {
        let start = self.pos;
        let leading = start == self.line_start;
        while let Some(c) = self.peek() {
            if c.is_whitespace() {
                break;
            }
            self.advance();
        }
        let text = &self.source[start..self.pos];
        let kind = if leading {
            match text {
                "NAME" => TokenKind::Name,
                "ROWS" => TokenKind::Rows,
                "COLUMNS" => TokenKind::Columns,
                "RHS" => TokenKind::Rhs,
                "RANGES" => TokenKind::Ranges,
                "BOUNDS" => TokenKind::Bounds,
                "OBJSENSE" => TokenKind::Objsense,
                "ENDATA" => TokenKind::Endata,
                _ => TokenKind::Word,
            }
        } else {
            TokenKind::Word
        };
        Token::new(kind, Span::new(start, self.pos), self.line, leading, text)
    }

    pub fn next_token(&mut self) -> Token {
        self.skip_whitespace();

        let start = self.pos;

        let Some(c) = self.peek() else {
            return Token::new(TokenKind::Eof, Span::new(start, start), self.line, false, "");
        };

        match c {
            '\n' => {
                self.advance();
                let token = Token::new(TokenKind::Newline, Span::new(start, self.pos), self.line, false, "\n");
                self.line += 1;
                self.line_start = self.pos;
                token
            }
            '*' if start == self.line_start => self.read_comment(),
            _ => self.read_word(),
        }
    }
}
