//! Store-level identifiers: sheets, workbooks and sheet-qualified addresses

use super::address::{CellAddress, CellRange};
use std::fmt;

/// Identifier of a sheet in the backing store
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct SheetId(pub u64);

impl fmt::Display for SheetId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Identifier of a workbook in the backing store
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct WorkbookId(pub u64);

impl fmt::Display for WorkbookId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Unique key for a cell (sheet + address)
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct CellKey {
    pub sheet: SheetId,
    pub addr: CellAddress,
}

impl CellKey {
    /// Create a new cell key
    pub fn new(sheet: SheetId, addr: CellAddress) -> Self {
        Self { sheet, addr }
    }
}

impl fmt::Display for CellKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}!{}", self.sheet, self.addr)
    }
}

/// A range resolved to a concrete sheet
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct SheetRange {
    pub sheet: SheetId,
    pub range: CellRange,
}

impl SheetRange {
    /// Create a new sheet range
    pub fn new(sheet: SheetId, range: CellRange) -> Self {
        Self { sheet, range }
    }

    /// Check if a cell key falls inside this range
    pub fn contains(&self, key: &CellKey) -> bool {
        key.sheet == self.sheet && self.range.contains(&key.addr)
    }

    /// Iterate over the keys of every cell in the range (row by row)
    pub fn keys(&self) -> impl Iterator<Item = CellKey> + '_ {
        self.range.cells().map(move |addr| CellKey::new(self.sheet, addr))
    }
}

impl From<CellKey> for SheetRange {
    fn from(key: CellKey) -> Self {
        SheetRange::new(key.sheet, CellRange::single(key.addr))
    }
}

impl fmt::Display for SheetRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}!{}", self.sheet, self.range)
    }
}
