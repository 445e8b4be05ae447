use serde::{Deserialize, Serialize};
use thiserror::Error;

/// A kept column of the cleaned roster.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RosterColumn {
    /// 0-indexed column in the original worksheet.
    pub sheet_col: u32,
    /// Header title as written in the header row.
    pub title: String,
}

/// One cleaned roster row.
///
/// `position` is the 0-based ordinal of the row among the data rows directly
/// below the header *as laid out in the sheet*. Positions are assigned before
/// cleaning and survive it, so they always map back to physical sheet rows
/// via [`crate::SheetLayout::sheet_row`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RosterRow {
    pub position: u32,
    /// One value per roster column, in column order. `None` for blank cells.
    pub values: Vec<Option<String>>,
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum RosterError {
    #[error("row has {got} values but the roster has {expected} columns")]
    ColumnCountMismatch { expected: usize, got: usize },
}

/// The cleaned student table: synthetic unnamed columns and rows with a
/// blank identity value have already been dropped by the loader.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Roster {
    columns: Vec<RosterColumn>,
    rows: Vec<RosterRow>,
    identity_index: usize,
}

impl Roster {
    /// Build a roster from cleaned columns and rows.
    ///
    /// `identity_index` is the index into `columns` of the identity column.
    /// Rows whose identity value is blank are dropped here as a final guard;
    /// the loader is expected to have dropped them already.
    pub fn new(
        columns: Vec<RosterColumn>,
        rows: Vec<RosterRow>,
        identity_index: usize,
    ) -> Result<Self, RosterError> {
        for row in &rows {
            if row.values.len() != columns.len() {
                return Err(RosterError::ColumnCountMismatch {
                    expected: columns.len(),
                    got: row.values.len(),
                });
            }
        }
        let rows = rows
            .into_iter()
            .filter(|row| {
                row.values
                    .get(identity_index)
                    .and_then(|v| v.as_deref())
                    .is_some_and(|v| !v.trim().is_empty())
            })
            .collect();
        Ok(Self {
            columns,
            rows,
            identity_index,
        })
    }

    pub fn columns(&self) -> &[RosterColumn] {
        &self.columns
    }

    pub fn rows(&self) -> &[RosterRow] {
        &self.rows
    }

    pub fn identity_index(&self) -> usize {
        self.identity_index
    }

    /// The identity value of a row. Cleaned rows always have one.
    pub fn identity_of<'a>(&self, row: &'a RosterRow) -> Option<&'a str> {
        row.values.get(self.identity_index)?.as_deref()
    }

    /// De-duplicated identity values in sheet order, for selection UIs.
    pub fn identities(&self) -> Vec<&str> {
        let mut seen: Vec<&str> = Vec::new();
        for row in &self.rows {
            if let Some(identity) = self.identity_of(row) {
                if !seen.contains(&identity) {
                    seen.push(identity);
                }
            }
        }
        seen
    }

    /// All rows whose identity equals `identity`, in sheet order.
    pub fn rows_for<'s, 'i>(
        &'s self,
        identity: &'i str,
    ) -> impl Iterator<Item = &'s RosterRow> + use<'s, 'i> {
        self.rows
            .iter()
            .filter(move |row| self.identity_of(row) == Some(identity))
    }

    /// The first row for `identity`, if any. This is the row the merge
    /// pipeline anchors the signature at.
    pub fn first_row_for(&self, identity: &str) -> Option<&RosterRow> {
        self.rows_for(identity).next()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn sample() -> Roster {
        let columns = vec![
            RosterColumn {
                sheet_col: 0,
                title: "Name".into(),
            },
            RosterColumn {
                sheet_col: 2,
                title: "Math".into(),
            },
        ];
        let rows = vec![
            RosterRow {
                position: 0,
                values: vec![Some("Ada".into()), Some("95".into())],
            },
            RosterRow {
                position: 1,
                values: vec![None, Some("80".into())],
            },
            RosterRow {
                position: 2,
                values: vec![Some("Grace".into()), None],
            },
            RosterRow {
                position: 3,
                values: vec![Some("Ada".into()), Some("71".into())],
            },
        ];
        Roster::new(columns, rows, 0).unwrap()
    }

    #[test]
    fn blank_identity_rows_are_dropped() {
        let roster = sample();
        assert_eq!(roster.rows().len(), 3);
        assert!(roster
            .rows()
            .iter()
            .all(|row| roster.identity_of(row).is_some()));
    }

    #[test]
    fn positions_survive_cleaning() {
        let roster = sample();
        let positions: Vec<u32> = roster.rows().iter().map(|r| r.position).collect();
        assert_eq!(positions, vec![0, 2, 3]);
    }

    #[test]
    fn identities_are_deduplicated_in_order() {
        assert_eq!(sample().identities(), vec!["Ada", "Grace"]);
    }

    #[test]
    fn first_row_for_picks_the_earliest_match() {
        let roster = sample();
        assert_eq!(roster.first_row_for("Ada").unwrap().position, 0);
        assert_eq!(roster.first_row_for("Grace").unwrap().position, 2);
        assert!(roster.first_row_for("Linus").is_none());
    }

    #[test]
    fn mismatched_row_width_is_rejected() {
        let columns = vec![RosterColumn {
            sheet_col: 0,
            title: "Name".into(),
        }];
        let rows = vec![RosterRow {
            position: 0,
            values: vec![Some("Ada".into()), Some("extra".into())],
        }];
        assert_eq!(
            Roster::new(columns, rows, 0),
            Err(RosterError::ColumnCountMismatch {
                expected: 1,
                got: 2
            })
        );
    }
}
