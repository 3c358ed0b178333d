//! Source positions and the offset-to-line map used for diagnostics.

use serde::{Deserialize, Serialize};

/// Half-open byte-offset span `[start, end)` in the model source.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Position {
    pub start: u32,
    pub end: u32,
}

impl Position {
    /// Position of synthesized nodes with no source counterpart.
    pub const UNKNOWN: Position = Position {
        start: u32::MAX,
        end: u32::MAX,
    };

    pub fn new(start: u32, end: u32) -> Self {
        Self { start, end }
    }

    pub fn is_unknown(&self) -> bool {
        *self == Position::UNKNOWN
    }

    /// Smallest span covering both positions. Unknown operands are ignored.
    pub fn merge(self, other: Position) -> Position {
        if self.is_unknown() {
            return other;
        }
        if other.is_unknown() {
            return self;
        }
        Position::new(self.start.min(other.start), self.end.max(other.end))
    }
}

impl Default for Position {
    fn default() -> Self {
        Position::UNKNOWN
    }
}

/// One record of the position map: the absolute offset where a source line
/// starts, the file-relative offset of that point, the line number, and the
/// path of the file the line came from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceLine {
    pub position: u32,
    pub offset: u32,
    pub line: u32,
    pub path: String,
}

/// A resolved position: what diagnostics print.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResolvedPosition {
    pub path: String,
    pub line: u32,
    pub column: u32,
}

/// Monotonic map from absolute byte offsets to (file, line) records.
///
/// Front-ends append one record per source line in ascending order of
/// `position`; lookups binary-search for the containing record.
#[derive(Debug, Clone, Default)]
pub struct Positions {
    lines: Vec<SourceLine>,
}

impl Positions {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a record. `position` must be at least the previous record's.
    pub fn add(&mut self, position: u32, offset: u32, line: u32, path: impl Into<String>) {
        debug_assert!(self
            .lines
            .last()
            .map(|l| l.position <= position)
            .unwrap_or(true));
        self.lines.push(SourceLine {
            position,
            offset,
            line,
            path: path.into(),
        });
    }

    /// The record containing the given absolute offset, if any.
    pub fn find(&self, position: u32) -> Option<&SourceLine> {
        if position == u32::MAX {
            return None;
        }
        match self.lines.binary_search_by(|l| l.position.cmp(&position)) {
            Ok(i) => Some(&self.lines[i]),
            Err(0) => None,
            Err(i) => Some(&self.lines[i - 1]),
        }
    }

    /// Resolve an absolute offset to file, line, and 1-based column.
    pub fn resolve(&self, position: u32) -> Option<ResolvedPosition> {
        self.find(position).map(|l| ResolvedPosition {
            path: l.path.clone(),
            line: l.line,
            column: position - l.position + 1,
        })
    }

    pub fn len(&self) -> usize {
        self.lines.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }
}
