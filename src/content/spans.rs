/// Byte-range spans and the paragraph-in-table test.
use serde::{Deserialize, Serialize};

/// Half-open range `[offset, offset + length)` into the analyzed text.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Span {
    pub offset: u64,
    pub length: u64,
}

impl Span {
    #[must_use]
    pub fn new(offset: u64, length: u64) -> Self {
        Self { offset, length }
    }

    #[must_use]
    pub fn end(&self) -> u64 {
        self.offset.saturating_add(self.length)
    }

    /// A paragraph belongs to a table when its start falls in `[t0, t1)` or
    /// its end falls in `(t0, t1]`.
    #[must_use]
    pub fn overlaps_table(&self, table: &Span) -> bool {
        let (p0, p1) = (self.offset, self.end());
        let (t0, t1) = (table.offset, table.end());
        (t0 <= p0 && p0 < t1) || (t0 < p1 && p1 <= t1)
    }
}

/// Whether `paragraph` overlaps any of `tables`.
#[must_use]
pub fn in_any_table(paragraph: &Span, tables: &[Span]) -> bool {
    tables.iter().any(|t| paragraph.overlaps_table(t))
}
