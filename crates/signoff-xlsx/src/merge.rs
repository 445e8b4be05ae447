//! The merge pipeline: embed signature images into a fresh copy of the
//! uploaded workbook.

use std::collections::BTreeSet;

use signoff_model::{CellRef, Roster, SheetLayout, SignatureDisplay};

use crate::content_types::{ensure_default, ensure_override, CT_DRAWING, CT_PNG};
use crate::drawing::{append_to_drawing_part, build_drawing_part, PictureAnchor};
use crate::openxml::{
    append_relationships, empty_rels_xml, next_rel_id, parse_relationships, relative_target,
    rels_for_part, resolve_target, Relationship, REL_TYPE_DRAWING, REL_TYPE_IMAGE,
};
use crate::strings::parse_shared_strings;
use crate::styles::centered_style_map;
use crate::worksheet::{
    apply_worksheet_edits, max_used_col, parse_sheet_cells, CellEdit, WorksheetEdits,
};
use crate::{MergeError, Package};

/// Knobs for [`merge_signatures`].
#[derive(Debug, Clone)]
pub struct MergeOptions {
    /// Header title of the column that receives the images. An existing
    /// column with this title is reused; otherwise one is appended after
    /// the last populated column.
    pub remarks_label: String,
    /// Image extent and row height applied to signed rows.
    pub display: SignatureDisplay,
}

impl Default for MergeOptions {
    fn default() -> Self {
        Self {
            remarks_label: "Remarks".to_string(),
            display: SignatureDisplay::default(),
        }
    }
}

/// Merge signature images into the workbook and return the new bytes.
///
/// `original` must be the same bytes `roster` was loaded from; the package
/// is reopened from them so the merge always starts from the pristine
/// upload. `signatures` pairs each identity with an encoded PNG; entries
/// whose identity has no roster row are skipped. For identities with
/// several matching rows the image lands on the first one.
///
/// Merging is a pure function of its inputs. Running it twice over the
/// same original bytes places the same images at the same anchors, so a
/// re-merge after an extra capture never stacks duplicates from the
/// earlier output.
pub fn merge_signatures(
    original: &[u8],
    roster: &Roster,
    signatures: &[(String, Vec<u8>)],
    layout: &SheetLayout,
    options: &MergeOptions,
) -> Result<Vec<u8>, MergeError> {
    let mut package = Package::from_bytes(original)?;
    let sheet_part = package.primary_worksheet()?;
    let shared = parse_shared_strings(&package)?;
    let cells = parse_sheet_cells(package.part_str(&sheet_part)?, &shared)?;

    // Remarks column: reuse a matching header, else append one past the
    // rightmost populated column.
    let existing_remarks = cells
        .iter()
        .find(|c| {
            c.row == layout.header_row
                && c.value.as_deref().map(str::trim) == Some(options.remarks_label.as_str())
        })
        .map(|c| c.col);
    let (remarks_col, needs_header) = match existing_remarks {
        Some(col) => (col, false),
        None => (max_used_col(&cells).map_or(0, |col| col + 1), true),
    };

    let mut edits = WorksheetEdits::default();
    if needs_header {
        edits.cells.insert(
            (layout.header_row, remarks_col),
            CellEdit {
                inline_text: Some(options.remarks_label.clone()),
                style: None,
            },
        );
    }

    // Reuse the sheet's drawing part when it already has one, otherwise
    // allocate a fresh part name.
    let sheet_rels_name = rels_for_part(&sheet_part);
    let sheet_rels = match package.part(&sheet_rels_name) {
        Some(xml) => parse_relationships(xml).map_err(MergeError::Format)?,
        None => Vec::new(),
    };
    let existing_drawing = sheet_rels
        .iter()
        .find(|rel| rel.type_uri == REL_TYPE_DRAWING && !rel.is_external())
        .map(|rel| resolve_target(&sheet_part, &rel.target))
        .filter(|part| package.part(part).is_some());
    let (drawing_part, drawing_is_new) = match existing_drawing {
        Some(part) => (part, false),
        None => (
            next_numbered_part(&package, "xl/drawings/drawing", ".xml"),
            true,
        ),
    };
    let drawing_rels_name = rels_for_part(&drawing_part);
    let mut drawing_rels = match package.part(&drawing_rels_name) {
        Some(xml) => parse_relationships(xml).map_err(MergeError::Format)?,
        None => Vec::new(),
    };

    // Plan one media part, one image relationship, and one anchor per
    // signature that matched a roster row.
    let mut next_image = next_numbered_index(&package, "xl/media/image");
    let mut anchors: Vec<PictureAnchor> = Vec::new();
    let mut image_rels: Vec<Relationship> = Vec::new();
    let mut anchor_rows: Vec<u32> = Vec::new();
    for (identity, png) in signatures {
        let Some(row) = roster.first_row_for(identity) else {
            continue;
        };
        let sheet_row = layout.sheet_row(row.position);

        let media_part = format!("xl/media/image{next_image}.png");
        next_image += 1;
        package.set_part(media_part.clone(), png.clone());

        let rel_id = next_rel_id(&drawing_rels);
        let rel = Relationship {
            id: rel_id.clone(),
            type_uri: REL_TYPE_IMAGE.to_string(),
            target: relative_target(&drawing_part, &media_part),
            target_mode: None,
        };
        drawing_rels.push(rel.clone());
        image_rels.push(rel);

        anchors.push(PictureAnchor {
            cell: CellRef::new(sheet_row - 1, remarks_col),
            ext_cx: options.display.width_emu(),
            ext_cy: options.display.height_emu(),
            rel_id,
            name: format!("Signature {identity}"),
        });
        anchor_rows.push(sheet_row);
        edits
            .row_heights
            .insert(sheet_row, options.display.row_height);
    }

    // Center the anchor cells so a later text fallback in the remarks
    // column lines up under the image.
    let mut base_styles: BTreeSet<u32> = BTreeSet::new();
    for &sheet_row in &anchor_rows {
        let base = cells
            .iter()
            .find(|c| c.row == sheet_row && c.col == remarks_col)
            .and_then(|c| c.style)
            .unwrap_or(0);
        base_styles.insert(base);
    }
    let centered = centered_style_map(&mut package, &base_styles)?;
    for &sheet_row in &anchor_rows {
        let base = cells
            .iter()
            .find(|c| c.row == sheet_row && c.col == remarks_col)
            .and_then(|c| c.style)
            .unwrap_or(0);
        if let Some(&style) = centered.get(&base) {
            edits
                .cells
                .entry((sheet_row, remarks_col))
                .or_default()
                .style = Some(style);
        }
    }

    if !anchors.is_empty() {
        let drawing_xml = if drawing_is_new {
            build_drawing_part(&anchors)?
        } else {
            let existing = package.part_required(&drawing_part)?.to_vec();
            append_to_drawing_part(&existing, &anchors)?
        };
        package.set_part(drawing_part.clone(), drawing_xml);

        let rels_base = package
            .part(&drawing_rels_name)
            .map(<[u8]>::to_vec)
            .unwrap_or_else(empty_rels_xml);
        let rels_xml = append_relationships(&rels_base, &image_rels)?;
        package.set_part(drawing_rels_name, rels_xml);

        if drawing_is_new {
            let sheet_rel_id = next_rel_id(&sheet_rels);
            let sheet_rel = Relationship {
                id: sheet_rel_id.clone(),
                type_uri: REL_TYPE_DRAWING.to_string(),
                target: relative_target(&sheet_part, &drawing_part),
                target_mode: None,
            };
            let sheet_rels_base = package
                .part(&sheet_rels_name)
                .map(<[u8]>::to_vec)
                .unwrap_or_else(empty_rels_xml);
            let sheet_rels_xml = append_relationships(&sheet_rels_base, &[sheet_rel])?;
            package.set_part(sheet_rels_name, sheet_rels_xml);
            edits.drawing_rel_id = Some(sheet_rel_id);

            ensure_override(&mut package, &drawing_part, CT_DRAWING)?;
        }
        ensure_default(&mut package, "png", CT_PNG)?;
    }

    if !edits.is_empty() {
        let sheet_xml = package.part_required(&sheet_part)?.to_vec();
        let patched = apply_worksheet_edits(&sheet_xml, &edits)?;
        package.set_part(sheet_part, patched);
    }

    Ok(package.write_to_bytes()?)
}

/// First unused `{prefix}{n}{suffix}` part name, counting from 1.
fn next_numbered_part(package: &Package, prefix: &str, suffix: &str) -> String {
    let mut n = 1;
    loop {
        let candidate = format!("{prefix}{n}{suffix}");
        if package.part(&candidate).is_none() {
            return candidate;
        }
        n += 1;
    }
}

/// One past the highest `{prefix}{n}.{ext}` index present in the package,
/// counting from 1. Extension-agnostic so a workbook that already carries
/// `image1.jpeg` does not collide with our `image2.png`.
fn next_numbered_index(package: &Package, prefix: &str) -> u32 {
    package
        .part_names()
        .filter_map(|name| {
            let rest = name.strip_prefix(prefix)?;
            let digits = rest.split('.').next()?;
            digits.parse::<u32>().ok()
        })
        .max()
        .map_or(1, |max| max + 1)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn numbered_index_skips_existing_media() {
        let bytes = crate::package::zip_parts(&[
            ("xl/media/image1.png", b"a".as_slice()),
            ("xl/media/image3.jpeg", b"b".as_slice()),
            ("xl/media/chart1.xml", b"c".as_slice()),
        ]);
        let package = Package::from_bytes(&bytes).unwrap();
        assert_eq!(next_numbered_index(&package, "xl/media/image"), 4);
        assert_eq!(
            next_numbered_part(&package, "xl/drawings/drawing", ".xml"),
            "xl/drawings/drawing1.xml"
        );
    }
}
