use proptest::prelude::*;
use signoff_model::{
    col_to_name, name_to_col, CellRef, Roster, RosterColumn, RosterRow, SheetLayout,
    SignatureDisplay,
};

proptest! {
    #[test]
    fn column_names_round_trip(col in 0u32..16_384) {
        let name = col_to_name(col);
        prop_assert_eq!(name_to_col(&name).unwrap(), col);
    }

    #[test]
    fn a1_round_trips(row in 0u32..1_048_576, col in 0u32..16_384) {
        let cell = CellRef::new(row, col);
        prop_assert_eq!(CellRef::from_a1(&cell.to_a1()).unwrap(), cell);
    }

    #[test]
    fn sheet_row_arithmetic_inverts(header_row in 1u32..5_000, position in 0u32..100_000) {
        let layout = SheetLayout::new(header_row, "Name");
        let sheet_row = layout.sheet_row(position);
        prop_assert_eq!(layout.position_for_sheet_row(sheet_row), Some(position));
        // The header row itself never maps to a position.
        prop_assert_eq!(layout.position_for_sheet_row(header_row), None);
    }
}

#[test]
fn model_types_round_trip_through_serde() {
    let roster = Roster::new(
        vec![
            RosterColumn {
                sheet_col: 0,
                title: "Name".into(),
            },
            RosterColumn {
                sheet_col: 3,
                title: "Score".into(),
            },
        ],
        vec![
            RosterRow {
                position: 0,
                values: vec![Some("Ada".into()), Some("95".into())],
            },
            RosterRow {
                position: 2,
                values: vec![Some("Grace".into()), None],
            },
        ],
        0,
    )
    .unwrap();

    let json = serde_json::to_string(&roster).unwrap();
    let back: Roster = serde_json::from_str(&json).unwrap();
    assert_eq!(back, roster);
    assert_eq!(back.identities(), vec!["Ada", "Grace"]);

    let layout = SheetLayout::new(12, "Name");
    let back: SheetLayout = serde_json::from_str(&serde_json::to_string(&layout).unwrap()).unwrap();
    assert_eq!(back, layout);

    let display = SignatureDisplay::default();
    let back: SignatureDisplay =
        serde_json::from_str(&serde_json::to_string(&display).unwrap()).unwrap();
    assert_eq!(back, display);

    let cell = CellRef::new(12, 5);
    let back: CellRef = serde_json::from_str(&serde_json::to_string(&cell).unwrap()).unwrap();
    assert_eq!(back, cell);
}
