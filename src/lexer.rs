use std::collections::VecDeque;
use std::fmt;
use std::io::BufRead;

use crate::error::{Result, TemplateError};
use crate::reader::{Position, Reader};

#[derive(Debug, Clone, PartialEq)]
pub enum TokenKind {
    Text(String),
    Comment(String),
    Whitespace,
    Eof,

    BlockStart,   // {%
    BlockEnd,     // %}
    VarStart,     // {{
    VarEnd,       // }}
    CommentStart, // {#
    CommentEnd,   // #}

    // Keywords
    Macro,
    EndMacro,
    Set,
    If,
    Elif,
    Else,
    EndIf,
    For,
    EndFor,
    In,
    And,
    Or,
    Not,
    True,
    False,

    // Symbols
    Plus,     // +
    Minus,    // -
    Slash,    // /
    Percent,  // %
    Star,     // *
    Assign,   // =
    Lt,       // <
    Gt,       // >
    Le,       // <=
    Ge,       // >=
    EqEq,     // ==
    NotEq,    // !=
    Comma,    // ,
    Dot,      // .
    LParen,   // (
    RParen,   // )
    LBracket, // [
    RBracket, // ]

    // Data
    Int(i64),
    Float(f64),
    Str(String),
    Ident(String),
}

impl TokenKind {
    pub fn keyword(word: &str) -> Option<TokenKind> {
        let kind = match word {
            "macro" => TokenKind::Macro,
            "endmacro" => TokenKind::EndMacro,
            "set" => TokenKind::Set,
            "if" => TokenKind::If,
            "elif" => TokenKind::Elif,
            "else" => TokenKind::Else,
            "endif" => TokenKind::EndIf,
            "for" => TokenKind::For,
            "endfor" => TokenKind::EndFor,
            "in" => TokenKind::In,
            "and" => TokenKind::And,
            "or" => TokenKind::Or,
            "not" => TokenKind::Not,
            "True" => TokenKind::True,
            "False" => TokenKind::False,
            _ => return None,
        };
        Some(kind)
    }

    /// Source spelling of keywords and symbols.
    pub fn spelling(&self) -> Option<&'static str> {
        let s = match self {
            TokenKind::BlockStart => "{%",
            TokenKind::BlockEnd => "%}",
            TokenKind::VarStart => "{{",
            TokenKind::VarEnd => "}}",
            TokenKind::CommentStart => "{#",
            TokenKind::CommentEnd => "#}",
            TokenKind::Macro => "macro",
            TokenKind::EndMacro => "endmacro",
            TokenKind::Set => "set",
            TokenKind::If => "if",
            TokenKind::Elif => "elif",
            TokenKind::Else => "else",
            TokenKind::EndIf => "endif",
            TokenKind::For => "for",
            TokenKind::EndFor => "endfor",
            TokenKind::In => "in",
            TokenKind::And => "and",
            TokenKind::Or => "or",
            TokenKind::Not => "not",
            TokenKind::True => "True",
            TokenKind::False => "False",
            TokenKind::Plus => "+",
            TokenKind::Minus => "-",
            TokenKind::Slash => "/",
            TokenKind::Percent => "%",
            TokenKind::Star => "*",
            TokenKind::Assign => "=",
            TokenKind::Lt => "<",
            TokenKind::Gt => ">",
            TokenKind::Le => "<=",
            TokenKind::Ge => ">=",
            TokenKind::EqEq => "==",
            TokenKind::NotEq => "!=",
            TokenKind::Comma => ",",
            TokenKind::Dot => ".",
            TokenKind::LParen => "(",
            TokenKind::RParen => ")",
            TokenKind::LBracket => "[",
            TokenKind::RBracket => "]",
            _ => return None,
        };
        Some(s)
    }
}

impl fmt::Display for TokenKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(s) = self.spelling() {
            return write!(f, "\"{s}\"");
        }
        match self {
            TokenKind::Text(_) => write!(f, "template text"),
            TokenKind::Comment(_) => write!(f, "comment"),
            TokenKind::Whitespace => write!(f, "whitespace"),
            TokenKind::Eof => write!(f, "end of input"),
            TokenKind::Int(n) => write!(f, "\"{n}\""),
            TokenKind::Float(n) => write!(f, "\"{n:?}\""),
            TokenKind::Str(s) => write!(f, "string \"{s}\""),
            TokenKind::Ident(s) => write!(f, "\"{s}\""),
            _ => write!(f, "{self:?}"),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Token {
    pub kind: TokenKind,
    pub pos: Position,
}

impl Token {
    pub fn new(kind: TokenKind, pos: Position) -> Self {
        Self { kind, pos }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Mode {
    Text,
    Code,
    Comment,
}

fn single_symbol(c: char) -> Option<TokenKind> {
    let kind = match c {
        '+' => TokenKind::Plus,
        '-' => TokenKind::Minus,
        '/' => TokenKind::Slash,
        '*' => TokenKind::Star,
        ',' => TokenKind::Comma,
        '.' => TokenKind::Dot,
        '(' => TokenKind::LParen,
        ')' => TokenKind::RParen,
        '[' => TokenKind::LBracket,
        ']' => TokenKind::RBracket,
        _ => return None,
    };
    Some(kind)
}

// Characters that are symbols on their own but may start a longer one.
fn prefix_symbol(c: char) -> Option<TokenKind> {
    let kind = match c {
        '%' => TokenKind::Percent,
        '=' => TokenKind::Assign,
        '<' => TokenKind::Lt,
        '>' => TokenKind::Gt,
        _ => return None,
    };
    Some(kind)
}

fn double_symbol(a: char, b: char) -> Option<TokenKind> {
    let kind = match (a, b) {
        ('<', '=') => TokenKind::Le,
        ('>', '=') => TokenKind::Ge,
        ('=', '=') => TokenKind::EqEq,
        ('!', '=') => TokenKind::NotEq,
        ('{', '%') => TokenKind::BlockStart,
        ('%', '}') => TokenKind::BlockEnd,
        ('{', '{') => TokenKind::VarStart,
        ('}', '}') => TokenKind::VarEnd,
        ('{', '#') => TokenKind::CommentStart,
        ('#', '}') => TokenKind::CommentEnd,
        _ => return None,
    };
    Some(kind)
}

/// Closer expected for a region opened by `a` `b`.
fn region_closer(a: char, b: char) -> Option<TokenKind> {
    match (a, b) {
        ('{', '%') => Some(TokenKind::BlockEnd),
        ('{', '{') => Some(TokenKind::VarEnd),
        ('{', '#') => Some(TokenKind::CommentEnd),
        _ => None,
    }
}

fn is_code_whitespace(c: char) -> bool {
    matches!(c, ' ' | '\t' | '\n' | '\r')
}

/// Mode-switching tokenizer: template text outside regions, code inside
/// `{{ }}` / `{% %}`, raw comment text inside `{# #}`.
pub struct Lexer<R> {
    reader: Reader<R>,
    pending: VecDeque<(char, Position)>,
    mode: Mode,
    closer: Option<TokenKind>,
}

impl<'a> Lexer<&'a [u8]> {
    pub fn from_text(input: &'a str) -> Self {
        Lexer::new(input.as_bytes())
    }
}

impl<R: BufRead> Lexer<R> {
    pub fn new(input: R) -> Self {
        Self {
            reader: Reader::new(input),
            pending: VecDeque::new(),
            mode: Mode::Text,
            closer: None,
        }
    }

    /// Produces the next token. Past the end of input this keeps returning
    /// `Eof`.
    pub fn next_token(&mut self, skip_whitespace: bool) -> Result<Token> {
        loop {
            let mode = self.mode;
            let token = match mode {
                Mode::Comment => self.scan_comment()?,
                _ if self.is_end()? => self.eof(),
                Mode::Text => self.scan_text()?,
                Mode::Code => self.scan_code()?,
            };
            if skip_whitespace && token.kind == TokenKind::Whitespace {
                continue;
            }
            return Ok(token);
        }
    }

    /// Lazy sequence of the remaining tokens, stopping before `Eof` or
    /// after the first error.
    pub fn tokens(&mut self, skip_whitespace: bool) -> Tokens<'_, R> {
        Tokens {
            lexer: self,
            skip_whitespace,
            done: false,
        }
    }

    fn next_char(&mut self) -> Result<Option<(char, Position)>> {
        if let Some(pending) = self.pending.pop_front() {
            return Ok(Some(pending));
        }
        Ok(self
            .reader
            .next_char()?
            .map(|c| (c, self.reader.position())))
    }

    fn push_back(&mut self, c: char, pos: Position) {
        self.pending.push_front((c, pos));
    }

    fn is_end(&mut self) -> Result<bool> {
        Ok(self.pending.is_empty() && !self.reader.has_char()?)
    }

    fn eof(&self) -> Token {
        let last = self.reader.position();
        Token::new(TokenKind::Eof, Position::new(last.line, last.column + 1))
    }

    fn scan_text(&mut self) -> Result<Token> {
        let mut content = String::new();
        let mut start = None;
        let mut prev: Option<(char, Position)> = None;

        while let Some((c, pos)) = self.next_char()? {
            if let Some((p, ppos)) = prev {
                if let Some(closer) = region_closer(p, c) {
                    content.pop();
                    self.push_back(c, pos);
                    self.push_back(p, ppos);
                    self.mode = Mode::Code;
                    self.closer = Some(closer);
                    break;
                }
            }
            start.get_or_insert(pos);
            content.push(c);
            prev = Some((c, pos));
        }

        if content.is_empty() {
            return self.scan_code();
        }
        Ok(Token::new(
            TokenKind::Text(content),
            start.unwrap_or_default(),
        ))
    }

    fn scan_code(&mut self) -> Result<Token> {
        let Some((c, pos)) = self.next_char()? else {
            return Ok(self.eof());
        };

        if is_code_whitespace(c) {
            while let Some((next, next_pos)) = self.next_char()? {
                if !is_code_whitespace(next) {
                    self.push_back(next, next_pos);
                    break;
                }
            }
            return Ok(Token::new(TokenKind::Whitespace, pos));
        }
        if c.is_ascii_digit() {
            return self.scan_number(c, pos);
        }
        if c == '\'' || c == '"' {
            return self.scan_string(c, pos);
        }
        if c.is_alphabetic() {
            return self.scan_word(c, pos);
        }
        if let Some(kind) = single_symbol(c) {
            return Ok(Token::new(kind, pos));
        }

        if let Some((next, next_pos)) = self.next_char()? {
            if let Some(kind) = double_symbol(c, next) {
                if kind == TokenKind::CommentStart {
                    self.mode = Mode::Comment;
                } else if self.closer.as_ref() == Some(&kind) {
                    self.mode = Mode::Text;
                    self.closer = None;
                }
                return Ok(Token::new(kind, pos));
            }
            self.push_back(next, next_pos);
        }

        match prefix_symbol(c) {
            Some(kind) => Ok(Token::new(kind, pos)),
            None => Err(TemplateError::syntax(
                format!("unrecognised construction '{c}'"),
                pos,
            )),
        }
    }

    fn scan_number(&mut self, first: char, pos: Position) -> Result<Token> {
        let mut digits = String::from(first);
        let mut is_float = false;

        while let Some((c, c_pos)) = self.next_char()? {
            if c.is_ascii_digit() {
                digits.push(c);
                continue;
            }
            // A dot only belongs to the number when a digit follows it.
            if c == '.' && !is_float {
                match self.next_char()? {
                    Some((d, _)) if d.is_ascii_digit() => {
                        is_float = true;
                        digits.push('.');
                        digits.push(d);
                        continue;
                    }
                    Some((d, d_pos)) => self.push_back(d, d_pos),
                    None => {}
                }
            }
            self.push_back(c, c_pos);
            break;
        }

        let kind = if is_float {
            digits
                .parse::<f64>()
                .map(TokenKind::Float)
                .map_err(|_| TemplateError::syntax(format!("invalid number '{digits}'"), pos))?
        } else {
            digits.parse::<i64>().map(TokenKind::Int).map_err(|_| {
                TemplateError::syntax(format!("integer literal '{digits}' is too large"), pos)
            })?
        };
        Ok(Token::new(kind, pos))
    }

    fn scan_string(&mut self, quote: char, pos: Position) -> Result<Token> {
        let mut content = String::new();
        loop {
            match self.next_char()? {
                Some((c, _)) if c == quote => return Ok(Token::new(TokenKind::Str(content), pos)),
                Some((c, _)) => content.push(c),
                None => return Err(TemplateError::syntax("unclosed string", pos)),
            }
        }
    }

    fn scan_word(&mut self, first: char, pos: Position) -> Result<Token> {
        let mut word = String::from(first);
        while let Some((c, c_pos)) = self.next_char()? {
            if c.is_alphanumeric() {
                word.push(c);
            } else {
                self.push_back(c, c_pos);
                break;
            }
        }

        let kind = TokenKind::keyword(&word).unwrap_or(TokenKind::Ident(word));
        Ok(Token::new(kind, pos))
    }

    // Comment bodies are swallowed up to the first `#}`; an unterminated
    // comment simply runs to the end of input.
    fn scan_comment(&mut self) -> Result<Token> {
        let mut content = String::new();
        let mut start = None;
        let mut prev: Option<(char, Position)> = None;

        while let Some((c, pos)) = self.next_char()? {
            if let Some((p, ppos)) = prev {
                if p == '#' && c == '}' {
                    content.pop();
                    self.push_back(c, pos);
                    self.push_back(p, ppos);
                    break;
                }
            }
            start.get_or_insert(pos);
            content.push(c);
            prev = Some((c, pos));
        }

        self.mode = Mode::Code;
        let pos = start.unwrap_or_else(|| self.eof().pos);
        Ok(Token::new(TokenKind::Comment(content), pos))
    }
}

pub struct Tokens<'l, R> {
    lexer: &'l mut Lexer<R>,
    skip_whitespace: bool,
    done: bool,
}

impl<R: BufRead> Iterator for Tokens<'_, R> {
    type Item = Result<Token>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }
        match self.lexer.next_token(self.skip_whitespace) {
            Ok(token) if token.kind == TokenKind::Eof => {
                self.done = true;
                None
            }
            Ok(token) => Some(Ok(token)),
            Err(e) => {
                self.done = true;
                Some(Err(e))
            }
        }
    }
}
