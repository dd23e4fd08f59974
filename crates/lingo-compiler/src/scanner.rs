use crate::range::Position;

const CHAR_CR: char = '\r';
const CHAR_LF: char = '\n';
const CHAR_LS: char = '\u{2028}';
const CHAR_PS: char = '\u{2029}';

/// Character cursor over a message source with a pending peek offset.
///
/// `CRLF`, `LS` and `PS` are all reported as `'\n'`, and `CRLF` is consumed as a single
/// character. Line, column and byte offset are derived from the committed cursor only;
/// peeking never moves them.
#[derive(Debug, Clone)]
pub struct Scanner {
    chars: Vec<(usize, char)>,
    len: usize,
    index: usize,
    line: u32,
    column: u32,
    peek_offset: usize,
}

impl Scanner {
    pub fn new(source: &str) -> Self {
        Self {
            chars: source.char_indices().collect(),
            len: source.len(),
            index: 0,
            line: 1,
            column: 1,
            peek_offset: 0,
        }
    }

    /// Character index of the cursor.
    pub fn index(&self) -> usize {
        self.index
    }

    /// Byte offset of the cursor.
    pub fn offset(&self) -> usize {
        self.chars.get(self.index).map(|(offset, _)| *offset).unwrap_or(self.len)
    }

    pub fn line(&self) -> u32 {
        self.line
    }

    pub fn column(&self) -> u32 {
        self.column
    }

    pub fn peek_offset(&self) -> usize {
        self.peek_offset
    }

    pub fn position(&self) -> Position {
        Position::new(self.line, self.column, self.offset())
    }

    pub fn is_eof(&self) -> bool {
        self.index >= self.chars.len()
    }

    #[inline(always)]
    fn raw(&self, index: usize) -> Option<char> {
        self.chars.get(index).map(|(_, ch)| *ch)
    }

    #[inline(always)]
    fn is_crlf(&self, index: usize) -> bool {
        self.raw(index) == Some(CHAR_CR) && self.raw(index + 1) == Some(CHAR_LF)
    }

    #[inline(always)]
    fn is_line_end(&self, index: usize) -> bool {
        self.is_crlf(index) || matches!(self.raw(index), Some(CHAR_LF | CHAR_LS | CHAR_PS))
    }

    fn char_at(&self, index: usize) -> Option<char> {
        if self.is_line_end(index) {
            Some(CHAR_LF)
        } else {
            self.raw(index)
        }
    }

    /// Character under the cursor, `None` at end of input.
    pub fn current_char(&self) -> Option<char> {
        self.char_at(self.index)
    }

    /// Character at the pending peek position, `None` past the end of input.
    pub fn current_peek(&self) -> Option<char> {
        self.char_at(self.index + self.peek_offset)
    }

    /// Commits one character and discards any pending peek.
    pub fn next(&mut self) -> Option<char> {
        self.peek_offset = 0;

        if self.is_eof() {
            return None;
        }

        if self.is_line_end(self.index) {
            self.line += 1;
            self.column = 0;
        }

        if self.is_crlf(self.index) {
            self.index += 1;
        }

        self.index += 1;
        self.column += 1;
        self.char_at(self.index)
    }

    /// Advances the peek position by one character.
    pub fn peek(&mut self) -> Option<char> {
        if self.is_crlf(self.index + self.peek_offset) {
            self.peek_offset += 1;
        }

        self.peek_offset += 1;
        self.char_at(self.index + self.peek_offset)
    }

    pub fn reset(&mut self) {
        self.index = 0;
        self.line = 1;
        self.column = 1;
        self.peek_offset = 0;
    }

    pub fn reset_peek(&mut self, offset: usize) {
        self.peek_offset = offset;
    }

    /// Commits every peeked character.
    pub fn skip_to_peek(&mut self) {
        let target = self.index + self.peek_offset;

        while self.index < target && !self.is_eof() {
            self.next();
        }

        self.peek_offset = 0;
    }
}
