//! Worksheet drawing parts: `oneCellAnchor` pictures for signatures.

use std::io::Cursor;

use quick_xml::events::{BytesEnd, BytesStart, BytesText, Event};
use quick_xml::{Reader, Writer};
use signoff_model::CellRef;

use crate::openxml::local_name;
use crate::FormatError;

const XDR_NS: &str = "http://schemas.openxmlformats.org/drawingml/2006/spreadsheetDrawing";
const A_NS: &str = "http://schemas.openxmlformats.org/drawingml/2006/main";
const R_NS: &str = "http://schemas.openxmlformats.org/officeDocument/2006/relationships";

/// One picture to anchor: the image relationship must already exist in the
/// drawing's `.rels`.
#[derive(Debug, Clone)]
pub(crate) struct PictureAnchor {
    /// Cell the picture's top-left corner snaps to.
    pub cell: CellRef,
    /// Display extent in EMUs.
    pub ext_cx: u64,
    pub ext_cy: u64,
    /// `r:embed` relationship id of the image.
    pub rel_id: String,
    /// Non-visual picture name (shown in the selection pane).
    pub name: String,
}

/// Build a fresh drawing part containing only the given anchors.
pub(crate) fn build_drawing_part(anchors: &[PictureAnchor]) -> Result<Vec<u8>, FormatError> {
    let mut writer = Writer::new(Vec::with_capacity(512 + anchors.len() * 768));
    writer.write_event(Event::Decl(quick_xml::events::BytesDecl::new(
        "1.0",
        Some("UTF-8"),
        Some("yes"),
    )))?;

    let mut root = BytesStart::new("xdr:wsDr");
    root.push_attribute(("xmlns:xdr", XDR_NS));
    root.push_attribute(("xmlns:a", A_NS));
    root.push_attribute(("xmlns:r", R_NS));
    writer.write_event(Event::Start(root))?;

    for (i, anchor) in anchors.iter().enumerate() {
        write_one_cell_anchor(&mut writer, anchor, (i + 1) as u32, false)?;
    }

    writer.write_event(Event::End(BytesEnd::new("xdr:wsDr")))?;
    Ok(writer.into_inner())
}

/// Append anchors to an existing drawing part, keeping everything already
/// in it.
///
/// The inserted anchors are namespace self-contained (they re-declare
/// `xdr`/`a`/`r` on the anchor element), so they are valid regardless of
/// which prefixes the producer chose for the rest of the document.
pub(crate) fn append_to_drawing_part(
    drawing_xml: &[u8],
    anchors: &[PictureAnchor],
) -> Result<Vec<u8>, FormatError> {
    let mut next_shape_id = max_shape_id(drawing_xml)? + 1;

    let mut reader = Reader::from_reader(Cursor::new(drawing_xml));
    reader.config_mut().trim_text(false);
    let mut writer = Writer::new(Vec::with_capacity(drawing_xml.len() + anchors.len() * 768));
    let mut buf = Vec::new();

    loop {
        match reader.read_event_into(&mut buf)? {
            Event::End(ref e) if local_name(e.name().as_ref()) == b"wsDr" => {
                for anchor in anchors {
                    write_one_cell_anchor(&mut writer, anchor, next_shape_id, true)?;
                    next_shape_id += 1;
                }
                writer.write_event(Event::End(e.to_owned()))?;
            }
            Event::Empty(ref e) if local_name(e.name().as_ref()) == b"wsDr" => {
                let tag = String::from_utf8_lossy(e.name().as_ref()).into_owned();
                writer.write_event(Event::Start(e.to_owned()))?;
                for anchor in anchors {
                    write_one_cell_anchor(&mut writer, anchor, next_shape_id, true)?;
                    next_shape_id += 1;
                }
                writer.write_event(Event::End(BytesEnd::new(tag)))?;
            }
            Event::Eof => break,
            other => writer.write_event(other.into_owned())?,
        }
        buf.clear();
    }

    Ok(writer.into_inner())
}

/// Highest `cNvPr` id already used in the drawing, so appended pictures
/// get unique non-visual ids.
fn max_shape_id(drawing_xml: &[u8]) -> Result<u32, FormatError> {
    let mut reader = Reader::from_reader(Cursor::new(drawing_xml));
    reader.config_mut().trim_text(true);
    let mut buf = Vec::new();
    let mut max = 0u32;

    loop {
        match reader.read_event_into(&mut buf)? {
            Event::Start(ref e) | Event::Empty(ref e)
                if local_name(e.name().as_ref()) == b"cNvPr" =>
            {
                for attr in e.attributes().with_checks(false).flatten() {
                    if local_name(attr.key.as_ref()) == b"id" {
                        if let Ok(id) = std::str::from_utf8(attr.value.as_ref())
                            .unwrap_or("")
                            .trim()
                            .parse::<u32>()
                        {
                            max = max.max(id);
                        }
                    }
                }
            }
            Event::Eof => break,
            _ => {}
        }
        buf.clear();
    }

    Ok(max)
}

fn write_one_cell_anchor(
    writer: &mut Writer<Vec<u8>>,
    anchor: &PictureAnchor,
    shape_id: u32,
    self_contained: bool,
) -> Result<(), FormatError> {
    let text = |writer: &mut Writer<Vec<u8>>, tag: &str, value: String| -> Result<(), FormatError> {
        writer.write_event(Event::Start(BytesStart::new(tag.to_string())))?;
        writer.write_event(Event::Text(BytesText::new(&value)))?;
        writer.write_event(Event::End(BytesEnd::new(tag.to_string())))?;
        Ok(())
    };

    let mut one_cell = BytesStart::new("xdr:oneCellAnchor");
    if self_contained {
        one_cell.push_attribute(("xmlns:xdr", XDR_NS));
        one_cell.push_attribute(("xmlns:a", A_NS));
        one_cell.push_attribute(("xmlns:r", R_NS));
    }
    writer.write_event(Event::Start(one_cell))?;

    writer.write_event(Event::Start(BytesStart::new("xdr:from")))?;
    text(writer, "xdr:col", anchor.cell.col.to_string())?;
    text(writer, "xdr:colOff", "0".to_string())?;
    text(writer, "xdr:row", anchor.cell.row.to_string())?;
    text(writer, "xdr:rowOff", "0".to_string())?;
    writer.write_event(Event::End(BytesEnd::new("xdr:from")))?;

    let mut ext = BytesStart::new("xdr:ext");
    ext.push_attribute(("cx", anchor.ext_cx.to_string().as_str()));
    ext.push_attribute(("cy", anchor.ext_cy.to_string().as_str()));
    writer.write_event(Event::Empty(ext))?;

    writer.write_event(Event::Start(BytesStart::new("xdr:pic")))?;

    writer.write_event(Event::Start(BytesStart::new("xdr:nvPicPr")))?;
    let mut nv_pr = BytesStart::new("xdr:cNvPr");
    nv_pr.push_attribute(("id", shape_id.to_string().as_str()));
    nv_pr.push_attribute(("name", anchor.name.as_str()));
    writer.write_event(Event::Empty(nv_pr))?;
    writer.write_event(Event::Start(BytesStart::new("xdr:cNvPicPr")))?;
    let mut locks = BytesStart::new("a:picLocks");
    locks.push_attribute(("noChangeAspect", "1"));
    writer.write_event(Event::Empty(locks))?;
    writer.write_event(Event::End(BytesEnd::new("xdr:cNvPicPr")))?;
    writer.write_event(Event::End(BytesEnd::new("xdr:nvPicPr")))?;

    writer.write_event(Event::Start(BytesStart::new("xdr:blipFill")))?;
    let mut blip = BytesStart::new("a:blip");
    blip.push_attribute(("r:embed", anchor.rel_id.as_str()));
    writer.write_event(Event::Empty(blip))?;
    writer.write_event(Event::Start(BytesStart::new("a:stretch")))?;
    writer.write_event(Event::Empty(BytesStart::new("a:fillRect")))?;
    writer.write_event(Event::End(BytesEnd::new("a:stretch")))?;
    writer.write_event(Event::End(BytesEnd::new("xdr:blipFill")))?;

    writer.write_event(Event::Start(BytesStart::new("xdr:spPr")))?;
    writer.write_event(Event::Start(BytesStart::new("a:xfrm")))?;
    let mut off = BytesStart::new("a:off");
    off.push_attribute(("x", "0"));
    off.push_attribute(("y", "0"));
    writer.write_event(Event::Empty(off))?;
    let mut sp_ext = BytesStart::new("a:ext");
    sp_ext.push_attribute(("cx", anchor.ext_cx.to_string().as_str()));
    sp_ext.push_attribute(("cy", anchor.ext_cy.to_string().as_str()));
    writer.write_event(Event::Empty(sp_ext))?;
    writer.write_event(Event::End(BytesEnd::new("a:xfrm")))?;
    let mut geom = BytesStart::new("a:prstGeom");
    geom.push_attribute(("prst", "rect"));
    writer.write_event(Event::Start(geom))?;
    writer.write_event(Event::Empty(BytesStart::new("a:avLst")))?;
    writer.write_event(Event::End(BytesEnd::new("a:prstGeom")))?;
    writer.write_event(Event::End(BytesEnd::new("xdr:spPr")))?;

    writer.write_event(Event::End(BytesEnd::new("xdr:pic")))?;
    writer.write_event(Event::Empty(BytesStart::new("xdr:clientData")))?;
    writer.write_event(Event::End(BytesEnd::new("xdr:oneCellAnchor")))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn anchor(row: u32, col: u32, rel: &str) -> PictureAnchor {
        PictureAnchor {
            cell: CellRef::new(row, col),
            ext_cx: 285_750,
            ext_cy: 161_925,
            rel_id: rel.to_string(),
            name: format!("Signature {rel}"),
        }
    }

    #[test]
    fn fresh_part_anchors_at_the_requested_cell() {
        let xml = build_drawing_part(&[anchor(13, 5, "rId1")]).unwrap();
        let xml = String::from_utf8(xml).unwrap();
        assert!(xml.contains("<xdr:col>5</xdr:col>"), "{xml}");
        assert!(xml.contains("<xdr:row>13</xdr:row>"), "{xml}");
        assert!(xml.contains(r#"<xdr:ext cx="285750" cy="161925"/>"#), "{xml}");
        assert!(xml.contains(r#"<a:blip r:embed="rId1"/>"#), "{xml}");

        // The part parses, and the anchor is a direct child of the root.
        let doc = roxmltree::Document::parse(&xml).unwrap();
        assert_eq!(doc.root_element().tag_name().name(), "wsDr");
        assert_eq!(
            doc.root_element()
                .children()
                .filter(|n| n.is_element() && n.tag_name().name() == "oneCellAnchor")
                .count(),
            1
        );
    }

    #[test]
    fn appended_anchors_get_fresh_shape_ids() {
        let base = build_drawing_part(&[anchor(1, 0, "rId1")]).unwrap();
        let appended =
            append_to_drawing_part(&base, &[anchor(2, 0, "rId2"), anchor(3, 0, "rId3")]).unwrap();
        let xml = String::from_utf8(appended).unwrap();

        let doc = roxmltree::Document::parse(&xml).unwrap();
        let ids: Vec<&str> = doc
            .descendants()
            .filter(|n| n.is_element() && n.tag_name().name() == "cNvPr")
            .filter_map(|n| n.attribute("id"))
            .collect();
        assert_eq!(ids, vec!["1", "2", "3"]);
    }
}
