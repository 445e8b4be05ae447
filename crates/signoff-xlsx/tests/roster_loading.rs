//! Loading rosters out of real workbook files produced by a third-party
//! writer.

use pretty_assertions::assert_eq;
use rust_xlsxwriter::Workbook;
use signoff_model::SheetLayout;
use signoff_xlsx::{load_roster, LoadError, ParseError};

/// A workbook whose header sits at 1-based `header_row`, with the given
/// titles and one data row per entry in `rows` (cells in title order;
/// `None` leaves the cell unwritten).
fn workbook(header_row: u32, titles: &[&str], rows: &[Vec<Option<&str>>]) -> Vec<u8> {
    let mut workbook = Workbook::new();
    let sheet = workbook.add_worksheet();
    for (col, title) in titles.iter().enumerate() {
        sheet.write_string(header_row - 1, col as u16, *title).unwrap();
    }
    for (i, row) in rows.iter().enumerate() {
        for (col, value) in row.iter().enumerate() {
            if let Some(value) = value {
                sheet
                    .write_string(header_row + i as u32, col as u16, *value)
                    .unwrap();
            }
        }
    }
    workbook.save_to_buffer().unwrap()
}

#[test]
fn titled_columns_come_back_in_sheet_order() {
    let bytes = workbook(
        1,
        &["Name", "Score", "Class"],
        &[
            vec![Some("Ada"), Some("95"), Some("A")],
            vec![Some("Grace"), Some("88"), Some("B")],
        ],
    );
    let roster = load_roster(&bytes, &SheetLayout::new(1, "Name")).unwrap();

    let titles: Vec<&str> = roster.columns().iter().map(|c| c.title.as_str()).collect();
    assert_eq!(titles, vec!["Name", "Score", "Class"]);
    assert_eq!(roster.identities(), vec!["Ada", "Grace"]);
    assert_eq!(roster.rows()[1].values[1].as_deref(), Some("88"));
}

#[test]
fn data_without_a_header_title_is_not_a_column() {
    // Column C holds stray values but its header cell is blank.
    let bytes = workbook(
        1,
        &["Name", "Score"],
        &[vec![Some("Ada"), Some("95"), Some("stray")]],
    );
    let roster = load_roster(&bytes, &SheetLayout::new(1, "Name")).unwrap();
    assert_eq!(roster.columns().len(), 2);
    assert_eq!(roster.rows()[0].values.len(), 2);
}

#[test]
fn blank_identity_rows_are_dropped_but_positions_survive() {
    let bytes = workbook(
        1,
        &["Name", "Score"],
        &[
            vec![Some("Ada"), Some("95")],
            vec![None, Some("12")],
            vec![Some("Grace"), Some("88")],
        ],
    );
    let layout = SheetLayout::new(1, "Name");
    let roster = load_roster(&bytes, &layout).unwrap();

    assert_eq!(roster.identities(), vec!["Ada", "Grace"]);
    let grace = roster.first_row_for("Grace").unwrap();
    // Grace stays on her original physical row even though the row above
    // her was dropped.
    assert_eq!(grace.position, 2);
    assert_eq!(layout.sheet_row(grace.position), 4);
}

#[test]
fn deep_header_rows_map_positions_from_the_header() {
    let bytes = workbook(12, &["Name"], &[vec![Some("Ada")], vec![Some("Grace")]]);
    let layout = SheetLayout::new(12, "Name");
    let roster = load_roster(&bytes, &layout).unwrap();

    assert_eq!(roster.first_row_for("Ada").unwrap().position, 0);
    assert_eq!(layout.sheet_row(0), 13);
    assert_eq!(layout.sheet_row(roster.first_row_for("Grace").unwrap().position), 14);
}

#[test]
fn duplicate_identities_are_reported_once_and_resolve_to_the_first_row() {
    let bytes = workbook(
        1,
        &["Name", "Score"],
        &[
            vec![Some("Ada"), Some("95")],
            vec![Some("Ada"), Some("60")],
        ],
    );
    let roster = load_roster(&bytes, &SheetLayout::new(1, "Name")).unwrap();
    assert_eq!(roster.identities(), vec!["Ada"]);
    assert_eq!(roster.first_row_for("Ada").unwrap().position, 0);
    assert_eq!(roster.rows_for("Ada").count(), 2);
}

#[test]
fn missing_identity_column_is_a_parse_error() {
    let bytes = workbook(1, &["Student", "Score"], &[vec![Some("Ada"), Some("95")]]);
    let err = load_roster(&bytes, &SheetLayout::new(1, "Name")).unwrap_err();
    match err {
        LoadError::Parse(ParseError::IdentityColumnMissing { column, header_row }) => {
            assert_eq!(column, "Name");
            assert_eq!(header_row, 1);
        }
        other => panic!("unexpected error: {other}"),
    }
}

#[test]
fn header_row_with_no_titles_is_a_parse_error() {
    // Titles on row 1, but the layout points at row 5 where nothing is.
    let bytes = workbook(1, &["Name"], &[vec![Some("Ada")]]);
    let err = load_roster(&bytes, &SheetLayout::new(5, "Name")).unwrap_err();
    assert!(matches!(
        err,
        LoadError::Parse(ParseError::EmptyHeaderRow { header_row: 5 })
    ));
}

#[test]
fn garbage_bytes_are_a_format_error() {
    let err = load_roster(b"definitely not a workbook", &SheetLayout::default()).unwrap_err();
    assert!(matches!(err, LoadError::Format(_)));
}
