//! Worksheet XML: reading the cell grid and applying targeted edits.
//!
//! Reads go through `roxmltree` into a flat cell list; writes stream the
//! original part through `quick-xml` and patch only what the merge needs
//! (a header cell, per-cell style overrides, row heights, and the
//! `<drawing>` reference), leaving every other byte of markup alone.

use std::collections::BTreeMap;
use std::io::Cursor;

use quick_xml::events::{BytesEnd, BytesStart, BytesText, Event};
use quick_xml::{Reader, Writer};
use roxmltree::Document;
use signoff_model::CellRef;

use crate::openxml::{local_name, prefixed_tag};
use crate::strings::visible_text;
use crate::FormatError;

const REL_NS_URI: &str = "http://schemas.openxmlformats.org/officeDocument/2006/relationships";

/// One populated cell, as read from `<sheetData>`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct SheetCell {
    /// 1-based sheet row.
    pub row: u32,
    /// 0-based column.
    pub col: u32,
    /// `s` style index, when present.
    pub style: Option<u32>,
    /// Display text, `None` when the cell holds no value.
    pub value: Option<String>,
}

/// Parse every `<c>` under `<sheetData>` into a flat list in document
/// order.
///
/// Cells without an `r` attribute are assigned implicit positions the way
/// consumers do: rows count up from the previous row, columns from the
/// previous cell in the row.
pub(crate) fn parse_sheet_cells(
    worksheet_xml: &str,
    shared_strings: &[String],
) -> Result<Vec<SheetCell>, FormatError> {
    let doc = Document::parse(worksheet_xml)?;
    let Some(sheet_data) = doc
        .root_element()
        .children()
        .find(|n| n.is_element() && n.tag_name().name() == "sheetData")
    else {
        return Ok(Vec::new());
    };

    let mut cells = Vec::new();
    let mut implicit_row: u32 = 0;
    for row in sheet_data
        .children()
        .filter(|n| n.is_element() && n.tag_name().name() == "row")
    {
        let row_num = match row.attribute("r").map(str::parse::<u32>) {
            Some(Ok(r)) if r >= 1 => r,
            Some(_) => {
                return Err(FormatError::Invalid("row has an invalid r attribute".into()))
            }
            None => implicit_row + 1,
        };
        implicit_row = row_num;

        let mut implicit_col: u32 = 0;
        for cell in row
            .children()
            .filter(|n| n.is_element() && n.tag_name().name() == "c")
        {
            let (cell_row, cell_col) = match cell.attribute("r") {
                Some(a1) => {
                    let cell_ref = CellRef::from_a1(a1).map_err(|err| {
                        FormatError::Invalid(format!("cell reference {a1:?}: {err}"))
                    })?;
                    (cell_ref.row + 1, cell_ref.col)
                }
                None => (row_num, implicit_col),
            };
            implicit_col = cell_col + 1;

            let style = cell.attribute("s").and_then(|s| s.parse::<u32>().ok());
            let cell_type = cell.attribute("t").unwrap_or("n");
            let v_text = cell
                .children()
                .find(|n| n.is_element() && n.tag_name().name() == "v")
                .and_then(|v| v.text())
                .map(str::to_string);

            let value = match cell_type {
                "s" => v_text
                    .as_deref()
                    .and_then(|idx| idx.trim().parse::<usize>().ok())
                    .and_then(|idx| shared_strings.get(idx))
                    .cloned(),
                "inlineStr" => cell
                    .children()
                    .find(|n| n.is_element() && n.tag_name().name() == "is")
                    .map(|is| visible_text(&is)),
                // str (formula string results), b, e, n: the raw `<v>` text
                // is good enough for header/identity matching.
                _ => v_text,
            };
            let value = value.filter(|v| !v.trim().is_empty());

            cells.push(SheetCell {
                row: cell_row,
                col: cell_col,
                style,
                value,
            });
        }
    }

    Ok(cells)
}

/// The highest populated 0-based column anywhere in the sheet, or `None`
/// for an empty sheet.
pub(crate) fn max_used_col(cells: &[SheetCell]) -> Option<u32> {
    cells.iter().map(|c| c.col).max()
}

/// A single cell patch for [`apply_worksheet_edits`].
#[derive(Debug, Clone, Default)]
pub(crate) struct CellEdit {
    /// Replace the cell content with an inline string.
    pub inline_text: Option<String>,
    /// Set the cell's `s` style index.
    pub style: Option<u32>,
}

/// All worksheet mutations for one merge, applied in a single streaming
/// pass.
#[derive(Debug, Clone, Default)]
pub(crate) struct WorksheetEdits {
    /// Cell patches keyed by (1-based row, 0-based col).
    pub cells: BTreeMap<(u32, u32), CellEdit>,
    /// Fixed row heights (points) keyed by 1-based row.
    pub row_heights: BTreeMap<u32, f64>,
    /// Add a `<drawing r:id="..."/>` reference to the sheet.
    pub drawing_rel_id: Option<String>,
}

impl WorksheetEdits {
    pub fn is_empty(&self) -> bool {
        self.cells.is_empty() && self.row_heights.is_empty() && self.drawing_rel_id.is_none()
    }
}

/// Stream `worksheet_xml` through, applying `edits`.
///
/// Rows and cells that the edits target but the markup lacks are created;
/// everything else is copied through untouched.
pub(crate) fn apply_worksheet_edits(
    worksheet_xml: &[u8],
    edits: &WorksheetEdits,
) -> Result<Vec<u8>, FormatError> {
    let mut reader = Reader::from_reader(Cursor::new(worksheet_xml));
    reader.config_mut().trim_text(false);
    let mut writer = Writer::new(Vec::with_capacity(worksheet_xml.len() + 1024));
    let mut buf = Vec::new();

    // Cell edits grouped per row; entries are consumed as they are applied
    // so leftovers can be materialized as new cells/rows.
    let mut pending: BTreeMap<u32, BTreeMap<u32, CellEdit>> = BTreeMap::new();
    for (&(row, col), edit) in &edits.cells {
        pending.entry(row).or_default().insert(col, edit.clone());
    }
    let mut heights = edits.row_heights.clone();
    let mut drawing_rel = edits.drawing_rel_id.clone();

    let mut implicit_row: u32 = 0;
    let mut current_row: Option<u32> = None;
    let mut implicit_col: u32 = 0;
    let mut saw_sheet_data = false;
    // Number of currently open elements; direct children of `<worksheet>`
    // are seen at depth 1.
    let mut depth: u32 = 0;

    loop {
        let event = reader.read_event_into(&mut buf)?;
        let mut depth_delta: i32 = match &event {
            Event::Start(_) => 1,
            Event::End(_) => -1,
            _ => 0,
        };
        match event {
            Event::Start(ref e) if local_name(e.name().as_ref()) == b"worksheet" => {
                writer.write_event(Event::Start(ensure_rel_ns(e, drawing_rel.is_some())?))?;
            }
            Event::Start(ref e) if local_name(e.name().as_ref()) == b"sheetData" => {
                saw_sheet_data = true;
                writer.write_event(Event::Start(e.to_owned()))?;
            }
            Event::Empty(ref e) if local_name(e.name().as_ref()) == b"sheetData" => {
                saw_sheet_data = true;
                let tag = String::from_utf8_lossy(e.name().as_ref()).into_owned();
                writer.write_event(Event::Start(e.to_owned()))?;
                flush_remaining_rows(&mut writer, &tag, &mut pending, &mut heights)?;
                writer.write_event(Event::End(BytesEnd::new(tag)))?;
            }
            Event::End(ref e) if local_name(e.name().as_ref()) == b"sheetData" => {
                let tag = String::from_utf8_lossy(e.name().as_ref()).into_owned();
                flush_remaining_rows(&mut writer, &tag, &mut pending, &mut heights)?;
                writer.write_event(Event::End(e.to_owned()))?;
            }
            Event::Start(ref e) if local_name(e.name().as_ref()) == b"row" => {
                let row_num = row_number(e)?.unwrap_or(implicit_row + 1);
                implicit_row = row_num;
                current_row = Some(row_num);
                implicit_col = 0;
                let patched = patch_row_height(e, heights.remove(&row_num))?;
                writer.write_event(Event::Start(patched))?;
            }
            Event::Empty(ref e) if local_name(e.name().as_ref()) == b"row" => {
                let row_num = row_number(e)?.unwrap_or(implicit_row + 1);
                implicit_row = row_num;
                let patched = patch_row_height(e, heights.remove(&row_num))?;
                let row_edits = pending.remove(&row_num);
                match row_edits {
                    Some(cells) if !cells.is_empty() => {
                        // The row exists but is childless; expand it so the
                        // new cells have somewhere to live.
                        let tag = String::from_utf8_lossy(e.name().as_ref()).into_owned();
                        writer.write_event(Event::Start(patched))?;
                        write_new_cells(&mut writer, &tag, row_num, &cells)?;
                        writer.write_event(Event::End(BytesEnd::new(tag)))?;
                    }
                    _ => writer.write_event(Event::Empty(patched))?,
                }
            }
            Event::End(ref e) if local_name(e.name().as_ref()) == b"row" => {
                if let Some(row_num) = current_row.take() {
                    if let Some(cells) = pending.remove(&row_num) {
                        let tag = String::from_utf8_lossy(e.name().as_ref()).into_owned();
                        write_new_cells(&mut writer, &tag, row_num, &cells)?;
                    }
                }
                writer.write_event(Event::End(e.to_owned()))?;
            }
            Event::Start(ref e) | Event::Empty(ref e)
                if local_name(e.name().as_ref()) == b"c" && current_row.is_some() =>
            {
                let is_empty = matches!(event, Event::Empty(_));
                let row_num = current_row.unwrap_or(implicit_row);
                let (cell_row, cell_col) = cell_position(e, row_num, implicit_col)?;
                implicit_col = cell_col + 1;

                let edit = pending
                    .get_mut(&cell_row)
                    .and_then(|cells| cells.remove(&cell_col));
                match edit {
                    None => {
                        if is_empty {
                            writer.write_event(Event::Empty(e.to_owned()))?;
                        } else {
                            writer.write_event(Event::Start(e.to_owned()))?;
                        }
                    }
                    Some(edit) => {
                        let tag = String::from_utf8_lossy(e.name().as_ref()).into_owned();
                        if edit.inline_text.is_some() {
                            // Content replacement: rewrite the whole cell and
                            // drop the original children.
                            if !is_empty {
                                reader.read_to_end_into(e.name(), &mut Vec::new())?;
                                // The subtree (including its end tag) was
                                // consumed outside the main loop.
                                depth_delta = 0;
                            }
                            let style = edit.style.or_else(|| attr_u32(e, b"s"));
                            write_inline_string_cell(
                                &mut writer,
                                &tag,
                                CellRef::new(cell_row - 1, cell_col),
                                edit.inline_text.as_deref().unwrap_or(""),
                                style,
                            )?;
                        } else {
                            // Style-only patch: keep the cell's content.
                            let patched = patch_cell_style(e, edit.style)?;
                            if is_empty {
                                writer.write_event(Event::Empty(patched))?;
                            } else {
                                writer.write_event(Event::Start(patched))?;
                            }
                        }
                    }
                }
            }
            Event::Start(ref e) | Event::Empty(ref e)
                if depth == 1
                    && drawing_insertion_point(e.name().as_ref())
                    && drawing_rel.is_some() =>
            {
                // `<drawing>` must precede `tableParts`/`extLst` in the
                // worksheet content model.
                if let Some(rel_id) = drawing_rel.take() {
                    write_drawing_ref(&mut writer, e.name().as_ref(), &rel_id)?;
                }
                writer.write_event(event.into_owned())?;
            }
            Event::Empty(ref e) if local_name(e.name().as_ref()) == b"drawing" => {
                // The sheet already references a drawing part; never add a
                // second reference.
                drawing_rel = None;
                writer.write_event(Event::Empty(e.to_owned()))?;
            }
            Event::End(ref e) if local_name(e.name().as_ref()) == b"worksheet" => {
                if !saw_sheet_data && !pending.is_empty() {
                    let tag = prefixed_tag(e.name().as_ref(), "sheetData");
                    writer.write_event(Event::Start(BytesStart::new(tag.clone())))?;
                    flush_remaining_rows(&mut writer, &tag, &mut pending, &mut heights)?;
                    writer.write_event(Event::End(BytesEnd::new(tag)))?;
                }
                if let Some(rel_id) = drawing_rel.take() {
                    write_drawing_ref(&mut writer, e.name().as_ref(), &rel_id)?;
                }
                writer.write_event(Event::End(e.to_owned()))?;
            }
            Event::Eof => break,
            other => writer.write_event(other.into_owned())?,
        }
        depth = depth.saturating_add_signed(depth_delta);
        buf.clear();
    }

    Ok(writer.into_inner())
}

fn drawing_insertion_point(name: &[u8]) -> bool {
    matches!(local_name(name), b"tableParts" | b"extLst")
}

fn row_number(e: &BytesStart<'_>) -> Result<Option<u32>, FormatError> {
    match attr_u32(e, b"r") {
        Some(r) if r >= 1 => Ok(Some(r)),
        Some(_) => Err(FormatError::Invalid("row has an invalid r attribute".into())),
        None => Ok(None),
    }
}

fn attr_u32(e: &BytesStart<'_>, key: &[u8]) -> Option<u32> {
    for attr in e.attributes().with_checks(false).flatten() {
        if local_name(attr.key.as_ref()) == key {
            return std::str::from_utf8(attr.value.as_ref())
                .ok()
                .and_then(|v| v.trim().parse().ok());
        }
    }
    None
}

fn cell_position(
    e: &BytesStart<'_>,
    row_num: u32,
    implicit_col: u32,
) -> Result<(u32, u32), FormatError> {
    for attr in e.attributes().with_checks(false) {
        let attr = attr?;
        if local_name(attr.key.as_ref()) == b"r" {
            let a1 = std::str::from_utf8(attr.value.as_ref())
                .map_err(|_| FormatError::Invalid("cell reference is not utf-8".into()))?;
            let cell_ref = CellRef::from_a1(a1)
                .map_err(|err| FormatError::Invalid(format!("cell reference {a1:?}: {err}")))?;
            return Ok((cell_ref.row + 1, cell_ref.col));
        }
    }
    Ok((row_num, implicit_col))
}

/// Copy a `<row>` start tag, overriding `ht`/`customHeight` when a height
/// is requested.
fn patch_row_height(
    e: &BytesStart<'_>,
    height: Option<f64>,
) -> Result<BytesStart<'static>, FormatError> {
    let Some(height) = height else {
        return Ok(e.to_owned());
    };

    let tag = String::from_utf8_lossy(e.name().as_ref()).into_owned();
    let mut patched = BytesStart::new(tag);
    for attr in e.attributes().with_checks(false) {
        let attr = attr?;
        match local_name(attr.key.as_ref()) {
            b"ht" | b"customHeight" => {}
            _ => patched.push_attribute((attr.key.as_ref(), attr.value.as_ref())),
        }
    }
    patched.push_attribute(("ht", format_height(height).as_str()));
    patched.push_attribute(("customHeight", "1"));
    Ok(patched.into_owned())
}

/// Copy a `<c>` start tag, overriding the `s` style attribute.
fn patch_cell_style(
    e: &BytesStart<'_>,
    style: Option<u32>,
) -> Result<BytesStart<'static>, FormatError> {
    let Some(style) = style else {
        return Ok(e.to_owned());
    };

    let tag = String::from_utf8_lossy(e.name().as_ref()).into_owned();
    let mut patched = BytesStart::new(tag);
    let mut wrote_style = false;
    for attr in e.attributes().with_checks(false) {
        let attr = attr?;
        if local_name(attr.key.as_ref()) == b"s" {
            patched.push_attribute((attr.key.as_ref(), style.to_string().as_bytes()));
            wrote_style = true;
        } else {
            patched.push_attribute((attr.key.as_ref(), attr.value.as_ref()));
        }
    }
    if !wrote_style {
        patched.push_attribute(("s", style.to_string().as_str()));
    }
    Ok(patched.into_owned())
}

/// Serialize fixed row heights the way spreadsheet producers do: no
/// trailing zeros, no scientific notation.
fn format_height(height: f64) -> String {
    let mut s = format!("{height}");
    if let Some(stripped) = s.strip_suffix(".0") {
        s = stripped.to_string();
    }
    s
}

fn write_inline_string_cell(
    writer: &mut Writer<Vec<u8>>,
    cell_tag: &str,
    cell: CellRef,
    text: &str,
    style: Option<u32>,
) -> Result<(), FormatError> {
    let mut c = BytesStart::new(cell_tag.to_string());
    c.push_attribute(("r", cell.to_a1().as_str()));
    if let Some(style) = style {
        c.push_attribute(("s", style.to_string().as_str()));
    }
    c.push_attribute(("t", "inlineStr"));
    writer.write_event(Event::Start(c))?;

    let is_tag = prefixed_tag(cell_tag.as_bytes(), "is");
    let t_tag = prefixed_tag(cell_tag.as_bytes(), "t");
    writer.write_event(Event::Start(BytesStart::new(is_tag.clone())))?;
    writer.write_event(Event::Start(BytesStart::new(t_tag.clone())))?;
    writer.write_event(Event::Text(BytesText::new(text)))?;
    writer.write_event(Event::End(BytesEnd::new(t_tag)))?;
    writer.write_event(Event::End(BytesEnd::new(is_tag)))?;

    writer.write_event(Event::End(BytesEnd::new(cell_tag.to_string())))?;
    Ok(())
}

fn write_new_cells(
    writer: &mut Writer<Vec<u8>>,
    row_tag: &str,
    row_num: u32,
    cells: &BTreeMap<u32, CellEdit>,
) -> Result<(), FormatError> {
    let cell_tag = prefixed_tag(row_tag.as_bytes(), "c");
    for (&col, edit) in cells {
        let cell = CellRef::new(row_num - 1, col);
        match &edit.inline_text {
            Some(text) => {
                write_inline_string_cell(writer, &cell_tag, cell, text, edit.style)?;
            }
            None => {
                let mut c = BytesStart::new(cell_tag.clone());
                c.push_attribute(("r", cell.to_a1().as_str()));
                if let Some(style) = edit.style {
                    c.push_attribute(("s", style.to_string().as_str()));
                }
                writer.write_event(Event::Empty(c))?;
            }
        }
    }
    Ok(())
}

fn flush_remaining_rows(
    writer: &mut Writer<Vec<u8>>,
    sheet_data_tag: &str,
    pending: &mut BTreeMap<u32, BTreeMap<u32, CellEdit>>,
    heights: &mut BTreeMap<u32, f64>,
) -> Result<(), FormatError> {
    if pending.is_empty() {
        return Ok(());
    }
    let row_tag = prefixed_tag(sheet_data_tag.as_bytes(), "row");
    let rows = std::mem::take(pending);
    for (row_num, cells) in rows {
        let mut row = BytesStart::new(row_tag.clone());
        row.push_attribute(("r", row_num.to_string().as_str()));
        if let Some(height) = heights.remove(&row_num) {
            row.push_attribute(("ht", format_height(height).as_str()));
            row.push_attribute(("customHeight", "1"));
        }
        writer.write_event(Event::Start(row))?;
        write_new_cells(writer, &row_tag, row_num, &cells)?;
        writer.write_event(Event::End(BytesEnd::new(row_tag.clone())))?;
    }
    Ok(())
}

fn write_drawing_ref(
    writer: &mut Writer<Vec<u8>>,
    reference_tag: &[u8],
    rel_id: &str,
) -> Result<(), FormatError> {
    let tag = prefixed_tag(reference_tag, "drawing");
    let mut el = BytesStart::new(tag);
    el.push_attribute(("r:id", rel_id));
    writer.write_event(Event::Empty(el))?;
    Ok(())
}

/// Copy the `<worksheet>` start tag, declaring `xmlns:r` when a drawing
/// reference will need it and the document does not already declare it.
fn ensure_rel_ns(
    e: &BytesStart<'_>,
    needs_rel_ns: bool,
) -> Result<BytesStart<'static>, FormatError> {
    if !needs_rel_ns {
        return Ok(e.to_owned());
    }
    let mut has_rel_ns = false;
    for attr in e.attributes().with_checks(false) {
        let attr = attr?;
        if attr.key.as_ref() == b"xmlns:r" {
            has_rel_ns = true;
        }
    }
    if has_rel_ns {
        return Ok(e.to_owned());
    }
    let mut patched = e.to_owned();
    patched.push_attribute(("xmlns:r", REL_NS_URI));
    Ok(patched)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    const SHEET: &str = r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<worksheet xmlns="http://schemas.openxmlformats.org/spreadsheetml/2006/main" xmlns:r="http://schemas.openxmlformats.org/officeDocument/2006/relationships">
<sheetData>
<row r="1"><c r="A1" t="inlineStr"><is><t>Name</t></is></c><c r="B1"><v>1</v></c></row>
<row r="2"><c r="A2" s="3"><v>42</v></c></row>
</sheetData>
</worksheet>"#;

    fn parse(xml: &[u8]) -> Vec<SheetCell> {
        parse_sheet_cells(std::str::from_utf8(xml).unwrap(), &[]).unwrap()
    }

    #[test]
    fn parse_reads_inline_strings_and_styles() {
        let cells = parse(SHEET.as_bytes());
        assert_eq!(cells.len(), 3);
        assert_eq!(cells[0].value.as_deref(), Some("Name"));
        assert_eq!((cells[2].row, cells[2].col), (2, 0));
        assert_eq!(cells[2].style, Some(3));
    }

    #[test]
    fn parse_resolves_shared_strings() {
        let xml = r#"<worksheet><sheetData>
<row r="1"><c r="A1" t="s"><v>1</v></c><c r="B1" t="s"><v>9</v></c></row>
</sheetData></worksheet>"#;
        let shared = vec!["zero".to_string(), "one".to_string()];
        let cells = parse_sheet_cells(xml, &shared).unwrap();
        assert_eq!(cells[0].value.as_deref(), Some("one"));
        // Out-of-range shared string indexes read as blank, not as errors.
        assert_eq!(cells[1].value, None);
    }

    #[test]
    fn parse_assigns_implicit_positions() {
        let xml = r#"<worksheet><sheetData>
<row><c><v>1</v></c><c><v>2</v></c></row>
<row r="5"><c r="C5"><v>3</v></c><c><v>4</v></c></row>
</sheetData></worksheet>"#;
        let cells = parse_sheet_cells(xml, &[]).unwrap();
        let positions: Vec<(u32, u32)> = cells.iter().map(|c| (c.row, c.col)).collect();
        assert_eq!(positions, vec![(1, 0), (1, 1), (5, 2), (5, 3)]);
    }

    #[test]
    fn style_edit_keeps_cell_content() {
        let mut edits = WorksheetEdits::default();
        edits.cells.insert((2, 0), CellEdit {
            inline_text: None,
            style: Some(7),
        });
        let out = apply_worksheet_edits(SHEET.as_bytes(), &edits).unwrap();
        let out = String::from_utf8(out).unwrap();
        assert!(out.contains(r#"<c r="A2" s="7"><v>42</v></c>"#), "{out}");
    }

    #[test]
    fn inline_text_edit_replaces_cell_content() {
        let mut edits = WorksheetEdits::default();
        edits.cells.insert((1, 1), CellEdit {
            inline_text: Some("Remarks".into()),
            style: None,
        });
        let out = apply_worksheet_edits(SHEET.as_bytes(), &edits).unwrap();
        let out = String::from_utf8(out).unwrap();
        assert!(
            out.contains(r#"<c r="B1" t="inlineStr"><is><t>Remarks</t></is></c>"#),
            "{out}"
        );
        assert!(!out.contains(r#"<c r="B1"><v>1</v></c>"#));
    }

    #[test]
    fn missing_cells_and_rows_are_created() {
        let mut edits = WorksheetEdits::default();
        // B2 is missing from row 2; row 4 does not exist at all.
        edits.cells.insert((2, 1), CellEdit {
            inline_text: None,
            style: Some(1),
        });
        edits.cells.insert((4, 2), CellEdit {
            inline_text: Some("x".into()),
            style: None,
        });
        edits.row_heights.insert(4, 15.0);
        let out = apply_worksheet_edits(SHEET.as_bytes(), &edits).unwrap();
        let out = String::from_utf8(out).unwrap();
        assert!(out.contains(r#"<c r="B2" s="1"/>"#), "{out}");
        assert!(
            out.contains(r#"<row r="4" ht="15" customHeight="1"><c r="C4" t="inlineStr"><is><t>x</t></is></c></row>"#),
            "{out}"
        );
    }

    #[test]
    fn row_height_overrides_existing_attrs() {
        let xml = br#"<worksheet><sheetData>
<row r="2" ht="30" customHeight="1" spans="1:2"><c r="A2"><v>1</v></c></row>
</sheetData></worksheet>"#;
        let mut edits = WorksheetEdits::default();
        edits.row_heights.insert(2, 15.0);
        let out = apply_worksheet_edits(xml, &edits).unwrap();
        let out = String::from_utf8(out).unwrap();
        assert!(
            out.contains(r#"<row r="2" spans="1:2" ht="15" customHeight="1">"#),
            "{out}"
        );
    }

    #[test]
    fn drawing_ref_lands_before_table_parts() {
        let xml = br#"<worksheet><sheetData/><tableParts count="1"><tablePart r:id="rId2"/></tableParts></worksheet>"#;
        let mut edits = WorksheetEdits::default();
        edits.drawing_rel_id = Some("rId5".into());
        let out = apply_worksheet_edits(xml, &edits).unwrap();
        let out = String::from_utf8(out).unwrap();
        let drawing = out.find(r#"<drawing r:id="rId5"/>"#).expect("drawing ref");
        let tables = out.find("<tableParts").unwrap();
        assert!(drawing < tables, "{out}");
    }

    #[test]
    fn drawing_ref_appends_at_end_otherwise() {
        let mut edits = WorksheetEdits::default();
        edits.drawing_rel_id = Some("rId5".into());
        let out = apply_worksheet_edits(SHEET.as_bytes(), &edits).unwrap();
        let out = String::from_utf8(out).unwrap();
        assert!(out.contains(r#"<drawing r:id="rId5"/></worksheet>"#), "{out}");
    }

    #[test]
    fn existing_drawing_ref_is_not_duplicated() {
        let xml = br#"<worksheet><sheetData/><drawing r:id="rId1"/></worksheet>"#;
        let mut edits = WorksheetEdits::default();
        edits.drawing_rel_id = Some("rId9".into());
        let out = apply_worksheet_edits(xml, &edits).unwrap();
        let out = String::from_utf8(out).unwrap();
        assert_eq!(out.matches("<drawing ").count(), 1, "{out}");
    }

    #[test]
    fn rel_namespace_is_declared_when_missing() {
        let xml = br#"<worksheet xmlns="http://schemas.openxmlformats.org/spreadsheetml/2006/main"><sheetData/></worksheet>"#;
        let mut edits = WorksheetEdits::default();
        edits.drawing_rel_id = Some("rId1".into());
        let out = apply_worksheet_edits(xml, &edits).unwrap();
        let out = String::from_utf8(out).unwrap();
        assert!(out.contains("xmlns:r=\"http://schemas.openxmlformats.org/officeDocument/2006/relationships\""), "{out}");
    }
}
