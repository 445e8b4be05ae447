use serde::{Deserialize, Serialize};

/// Fixed layout of the uploaded grade workbook.
///
/// Both the loader and the merge pipeline take the layout as an explicit
/// parameter; nothing about it is derived from the workbook at runtime.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SheetLayout {
    /// 1-based sheet row containing the column titles.
    pub header_row: u32,
    /// Title of the column whose value uniquely names each student.
    pub identity_column: String,
}

impl SheetLayout {
    pub fn new(header_row: u32, identity_column: impl Into<String>) -> Self {
        Self {
            header_row,
            identity_column: identity_column.into(),
        }
    }

    /// Map a roster row position to its 1-based physical sheet row.
    ///
    /// `position` is the 0-based ordinal of the row among the data rows
    /// directly below the header. This is the only place the translation is
    /// defined; every caller that needs a sheet row for a roster row goes
    /// through here.
    #[inline]
    pub fn sheet_row(&self, position: u32) -> u32 {
        position + self.header_row + 1
    }

    /// Inverse of [`SheetLayout::sheet_row`]: the roster position for a
    /// 1-based sheet row, or `None` for the header row and anything above it.
    #[inline]
    pub fn position_for_sheet_row(&self, sheet_row: u32) -> Option<u32> {
        sheet_row.checked_sub(self.header_row + 1)
    }
}

impl Default for SheetLayout {
    fn default() -> Self {
        Self {
            header_row: 12,
            identity_column: "Name".to_string(),
        }
    }
}
