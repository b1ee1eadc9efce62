use std::fmt;
use std::io::{self, BufRead};

/// A 1-based line/column location in template source.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Position {
    pub line: usize,
    pub column: usize,
}

impl Position {
    pub fn new(line: usize, column: usize) -> Self {
        Self { line, column }
    }
}

impl fmt::Display for Position {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.line, self.column)
    }
}

/// Character source that pulls one line at a time from the underlying
/// stream and remembers where the last returned character came from.
///
/// The newline character belongs to the line it terminates; the character
/// after it is reported at column 1 of the next line.
pub struct Reader<R> {
    input: R,
    buffer: Vec<char>,
    cursor: usize,
    line: usize,
    exhausted: bool,
}

impl<R: BufRead> Reader<R> {
    pub fn new(input: R) -> Self {
        Self {
            input,
            buffer: Vec::new(),
            cursor: 0,
            line: 0,
            exhausted: false,
        }
    }

    /// Returns the next character, or `None` once the stream is drained.
    pub fn next_char(&mut self) -> io::Result<Option<char>> {
        if !self.fill()? {
            return Ok(None);
        }
        let c = self.buffer[self.cursor];
        self.cursor += 1;
        Ok(Some(c))
    }

    /// True while at least one more character can be read.
    pub fn has_char(&mut self) -> io::Result<bool> {
        self.fill()
    }

    /// Position of the character most recently returned by `next_char`.
    ///
    /// Before the first read this is `1:0`.
    pub fn position(&self) -> Position {
        Position::new(self.line.max(1), self.cursor)
    }

    fn fill(&mut self) -> io::Result<bool> {
        if self.cursor < self.buffer.len() {
            return Ok(true);
        }
        if self.exhausted {
            return Ok(false);
        }

        let mut line = String::new();
        if self.input.read_line(&mut line)? == 0 {
            self.exhausted = true;
            return Ok(false);
        }
        self.buffer = line.chars().collect();
        self.cursor = 0;
        self.line += 1;
        Ok(true)
    }
}
