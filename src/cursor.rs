use std::fmt::Display;

/// Byte index plus zero-based line and column (columns count characters).
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub struct Position {
    pub index: usize,
    pub line: usize,
    pub column: usize,
}

impl Display for Position {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:{}", self.line + 1, self.column + 1)
    }
}

/// Position-tracking view over immutable text.
///
/// Cursors are `Copy`: a speculative copy shares the text and only duplicates
/// the position, which is what every backtracking step of the matcher relies on.
#[derive(Clone, Copy, Debug)]
pub struct Cursor<'s> {
    text: &'s str,
    position: Position,
}

impl<'s> Cursor<'s> {
    pub fn new(text: &'s str) -> Self {
        Cursor {
            text,
            position: Position::default(),
        }
    }

    pub fn position(&self) -> Position {
        self.position
    }

    pub fn index(&self) -> usize {
        self.position.index
    }

    pub fn text(&self) -> &'s str {
        self.text
    }

    pub fn has_next(&self) -> bool {
        self.position.index < self.text.len()
    }

    /// The character under the cursor, if any.
    pub fn current(&self) -> Option<char> {
        self.remainder().chars().next()
    }

    /// Consumes the current character and returns it.
    pub fn next(&mut self) -> Option<char> {
        let c = self.current()?;
        self.step(c);
        Some(c)
    }

    fn step(&mut self, c: char) {
        self.position.index += c.len_utf8();
        if c == '\n' {
            self.position.line += 1;
            self.position.column = 0;
        } else {
            self.position.column += 1;
        }
    }

    /// Up to `len` characters starting at the cursor, without consuming them.
    pub fn peek(&self, len: usize) -> &'s str {
        self.get(len, 0)
    }

    /// Up to `len` characters starting `offset` characters past the cursor.
    pub fn get(&self, len: usize, offset: usize) -> &'s str {
        let rest = self.remainder();
        let start = nth_boundary(rest, offset);
        let end = start + nth_boundary(&rest[start..], len);
        &rest[start..end]
    }

    pub fn is(&self, s: &str) -> bool {
        self.remainder().starts_with(s)
    }

    pub fn consume(&mut self, s: &str) -> bool {
        if self.is(s) {
            for c in s.chars() {
                self.step(c);
            }
            true
        } else {
            false
        }
    }

    pub fn copy(&self) -> Self {
        *self
    }

    /// Moves to a byte index, recomputing line and column in either direction.
    pub fn set(&mut self, index: usize) {
        let mut target = index.min(self.text.len());
        while !self.text.is_char_boundary(target) {
            target -= 1;
        }

        if target >= self.position.index {
            let skipped = &self.text[self.position.index..target];
            for c in skipped.chars() {
                self.step(c);
            }
        } else {
            let rewound = &self.text[target..self.position.index];
            self.position.line -= rewound.matches('\n').count();

            let line_start = self.text[..target].rfind('\n').map_or(0, |p| p + 1);
            self.position.column = self.text[line_start..target].chars().count();
            self.position.index = target;
        }
    }

    /// Jumps past the next occurrence of `delimiter`. Moves to the end and
    /// returns `false` when there is none.
    pub fn jump_to(&mut self, delimiter: &str) -> bool {
        match self.remainder().find(delimiter) {
            Some(offset) => {
                self.set(self.position.index + offset + delimiter.len());
                true
            }
            None => {
                self.set(self.text.len());
                false
            }
        }
    }

    pub fn jump_while<F: FnMut(char) -> bool>(&mut self, mut predicate: F) {
        while let Some(c) = self.current() {
            if !predicate(c) {
                break;
            }
            self.step(c);
        }
    }

    /// Moves by `offset` characters; negative offsets move backwards.
    pub fn jump_by(&mut self, offset: isize) {
        let target = if offset >= 0 {
            self.position.index + nth_boundary(self.remainder(), offset.unsigned_abs())
        } else {
            let before = &self.text[..self.position.index];
            before
                .char_indices()
                .rev()
                .nth(offset.unsigned_abs() - 1)
                .map_or(0, |(i, _)| i)
        };
        self.set(target);
    }

    pub fn remainder(&self) -> &'s str {
        &self.text[self.position.index..]
    }

    /// Text between a previous index and the cursor.
    pub fn slice_from(&self, start: usize) -> &'s str {
        &self.text[start.min(self.position.index)..self.position.index]
    }
}

/// Byte length of the first `n` characters of `s` (or all of it).
fn nth_boundary(s: &str, n: usize) -> usize {
    s.char_indices().nth(n).map_or(s.len(), |(i, _)| i)
}
