use serde::{Deserialize, Serialize};

/// A point in the message source.
///
/// `line` and `column` are 1-based, `offset` is the byte offset into the source.
#[derive(PartialEq, Eq, PartialOrd, Ord, Debug, Clone, Copy, Hash, Serialize, Deserialize)]
pub struct Position {
    pub line: u32,
    pub column: u32,
    pub offset: usize,
}

impl Default for Position {
    fn default() -> Self {
        Position {
            line: 1,
            column: 1,
            offset: 0,
        }
    }
}

impl Position {
    pub fn new(line: u32, column: u32, offset: usize) -> Self {
        Position { line, column, offset }
    }
}

#[derive(PartialEq, Eq, PartialOrd, Ord, Debug, Clone, Default, Hash, Serialize, Deserialize)]
pub struct SourceLocation {
    pub start: Position,
    pub end: Position,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub source: Option<String>,
}

impl SourceLocation {
    pub fn new(start: Position, end: Position) -> Self {
        SourceLocation {
            start,
            end,
            source: None,
        }
    }

    pub fn contains(&self, position: &Position) -> bool {
        self.start.offset <= position.offset && position.offset <= self.end.offset
    }

    pub fn len(&self) -> usize {
        self.end.offset.saturating_sub(self.start.offset)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case::start(Position::new(1, 1, 0), true)]
    #[case::inside(Position::new(1, 3, 2), true)]
    #[case::end(Position::new(1, 5, 4), true)]
    #[case::after(Position::new(1, 6, 5), false)]
    fn test_contains(#[case] position: Position, #[case] expected: bool) {
        let location = SourceLocation::new(Position::new(1, 1, 0), Position::new(1, 5, 4));
        assert_eq!(location.contains(&position), expected);
    }
}
