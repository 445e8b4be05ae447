use core::fmt;

use serde::{Deserialize, Serialize};

/// Maximum number of columns in a worksheet (`A`..`XFD`).
pub const MAX_COLS: u32 = 16_384;
/// Maximum number of rows in a worksheet.
pub const MAX_ROWS: u32 = 1_048_576;

/// A reference to a single cell within a worksheet.
///
/// Rows and columns are **0-indexed**:
/// - `row = 0` is sheet row `1`
/// - `col = 0` is column `A`
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CellRef {
    /// 0-indexed row.
    pub row: u32,
    /// 0-indexed column.
    pub col: u32,
}

impl CellRef {
    /// Construct a new [`CellRef`].
    #[inline]
    pub const fn new(row: u32, col: u32) -> Self {
        Self { row, col }
    }

    /// Convert to A1 notation (e.g. `A1`, `BC32`).
    pub fn to_a1(self) -> String {
        format!("{}{}", col_to_name(self.col), self.row + 1)
    }

    /// Parse an A1-style reference (e.g. `A1`, `$B$2`).
    pub fn from_a1(a1: &str) -> Result<Self, A1ParseError> {
        let s = a1.trim();
        if s.is_empty() {
            return Err(A1ParseError::Empty);
        }

        // Accept optional `$` markers.
        let bytes = s.as_bytes();
        let mut idx = 0usize;
        if bytes.get(idx) == Some(&b'$') {
            idx += 1;
        }

        let col_start = idx;
        while idx < bytes.len() && bytes[idx].is_ascii_alphabetic() {
            idx += 1;
        }
        if idx == col_start {
            return Err(A1ParseError::MissingColumn);
        }
        let col_str = &s[col_start..idx];

        if bytes.get(idx) == Some(&b'$') {
            idx += 1;
        }

        let row_start = idx;
        while idx < bytes.len() && bytes[idx].is_ascii_digit() {
            idx += 1;
        }
        if idx == row_start {
            return Err(A1ParseError::MissingRow);
        }
        if idx != bytes.len() {
            return Err(A1ParseError::TrailingCharacters);
        }

        let col = name_to_col(col_str)?;
        if col >= MAX_COLS {
            return Err(A1ParseError::InvalidColumn);
        }
        let row_1_based: u32 = s[row_start..idx]
            .parse()
            .map_err(|_| A1ParseError::InvalidRow)?;
        if row_1_based == 0 || row_1_based > MAX_ROWS {
            return Err(A1ParseError::InvalidRow);
        }

        Ok(Self {
            row: row_1_based - 1,
            col,
        })
    }
}

impl fmt::Display for CellRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_a1())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum A1ParseError {
    #[error("empty cell reference")]
    Empty,
    #[error("missing column letters")]
    MissingColumn,
    #[error("missing row digits")]
    MissingRow,
    #[error("invalid column")]
    InvalidColumn,
    #[error("invalid row")]
    InvalidRow,
    #[error("trailing characters after cell reference")]
    TrailingCharacters,
}

/// Convert a 0-indexed column to its letter name (`0` -> `A`, `27` -> `AB`).
pub fn col_to_name(col: u32) -> String {
    let mut name = String::new();
    let mut n = col;
    loop {
        name.insert(0, (b'A' + (n % 26) as u8) as char);
        if n < 26 {
            break;
        }
        n = n / 26 - 1;
    }
    name
}

/// Convert a column letter name to its 0-indexed column (`A` -> `0`).
pub fn name_to_col(name: &str) -> Result<u32, A1ParseError> {
    if name.is_empty() {
        return Err(A1ParseError::MissingColumn);
    }
    let mut col: u32 = 0;
    for b in name.bytes() {
        if !b.is_ascii_alphabetic() {
            return Err(A1ParseError::InvalidColumn);
        }
        let digit = (b.to_ascii_uppercase() - b'A') as u32;
        col = col
            .checked_mul(26)
            .and_then(|c| c.checked_add(digit + 1))
            .ok_or(A1ParseError::InvalidColumn)?;
    }
    Ok(col - 1)
}
