//! Roster loading: uploaded workbook bytes -> cleaned student table.

use std::collections::BTreeMap;

use signoff_model::{Roster, RosterColumn, RosterRow, SheetLayout};

use crate::strings::parse_shared_strings;
use crate::worksheet::parse_sheet_cells;
use crate::{FormatError, LoadError, Package, ParseError};

/// Parse workbook bytes into the cleaned roster.
///
/// The row at `layout.header_row` (1-based) supplies the column titles.
/// Columns whose header cell is missing or blank are synthetic "unnamed"
/// columns and are dropped; rows below the header whose identity value is
/// blank are dropped. Each surviving row keeps its pre-cleaning `position`
/// (0-based ordinal below the header) so it still maps to its physical
/// sheet row.
pub fn load_roster(bytes: &[u8], layout: &SheetLayout) -> Result<Roster, LoadError> {
    let package = Package::from_bytes(bytes)?;
    let sheet_part = package.primary_worksheet()?;
    let shared = parse_shared_strings(&package)?;
    let worksheet_xml = package.part_str(&sheet_part)?;
    let cells = parse_sheet_cells(worksheet_xml, &shared)?;

    // Header: titled columns only, in sheet-column order.
    let mut columns: Vec<RosterColumn> = cells
        .iter()
        .filter(|c| c.row == layout.header_row)
        .filter_map(|c| {
            let title = c.value.as_deref()?.trim();
            (!title.is_empty()).then(|| RosterColumn {
                sheet_col: c.col,
                title: title.to_string(),
            })
        })
        .collect();
    columns.sort_by_key(|c| c.sheet_col);

    if columns.is_empty() {
        return Err(ParseError::EmptyHeaderRow {
            header_row: layout.header_row,
        }
        .into());
    }
    let identity_index = columns
        .iter()
        .position(|c| c.title == layout.identity_column)
        .ok_or_else(|| ParseError::IdentityColumnMissing {
            column: layout.identity_column.clone(),
            header_row: layout.header_row,
        })?;

    // Data rows, keyed by sheet row so sparse `<row>` runs keep correct
    // positions.
    let mut by_row: BTreeMap<u32, BTreeMap<u32, String>> = BTreeMap::new();
    for cell in &cells {
        if cell.row <= layout.header_row {
            continue;
        }
        if let Some(value) = &cell.value {
            by_row
                .entry(cell.row)
                .or_default()
                .insert(cell.col, value.clone());
        }
    }

    let rows: Vec<RosterRow> = by_row
        .into_iter()
        .map(|(sheet_row, mut cells)| RosterRow {
            position: sheet_row - layout.header_row - 1,
            values: columns
                .iter()
                .map(|column| cells.remove(&column.sheet_col))
                .collect(),
        })
        .collect();

    Roster::new(columns, rows, identity_index)
        .map_err(|err| LoadError::Format(FormatError::Invalid(err.to_string())))
}
