//! Cell style derivation: centered alignment for signature anchor cells.
//!
//! Anchor cells keep their existing format (number format, font, fill,
//! border); we only derive a new `cellXfs` entry per distinct base `xf`
//! with horizontal/vertical centering applied, and append it to
//! `xl/styles.xml`.

use std::collections::{BTreeMap, BTreeSet};
use std::io::Cursor;

use quick_xml::events::{BytesEnd, BytesStart, BytesText, Event};
use quick_xml::{Reader, Writer};
use roxmltree::{Document, Node};

use crate::openxml::{local_name, prefixed_tag};
use crate::{FormatError, Package};

const STYLES_PART: &str = "xl/styles.xml";

/// A styles part for workbooks that ship without one (rare, but a package
/// with only inline formatting is legal).
const MINIMAL_STYLES: &str = r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<styleSheet xmlns="http://schemas.openxmlformats.org/spreadsheetml/2006/main"><fonts count="1"><font><sz val="11"/><name val="Calibri"/></font></fonts><fills count="2"><fill><patternFill patternType="none"/></fill><fill><patternFill patternType="gray125"/></fill></fills><borders count="1"><border><left/><right/><top/><bottom/><diagonal/></border></borders><cellStyleXfs count="1"><xf numFmtId="0" fontId="0" fillId="0" borderId="0"/></cellStyleXfs><cellXfs count="1"><xf numFmtId="0" fontId="0" fillId="0" borderId="0" xfId="0"/></cellXfs></styleSheet>"#;

/// For every style index in `base_styles`, make sure a variant with
/// centered horizontal/vertical alignment exists in the package's
/// `cellXfs`, appending derived entries as needed.
///
/// Returns the base -> centered style index mapping. A base that is
/// already centered maps to itself; unknown/out-of-range bases fall back
/// to deriving from the default style 0.
pub(crate) fn centered_style_map(
    package: &mut Package,
    base_styles: &BTreeSet<u32>,
) -> Result<BTreeMap<u32, u32>, FormatError> {
    if base_styles.is_empty() {
        return Ok(BTreeMap::new());
    }

    if package.part(STYLES_PART).is_none() {
        package.set_part(STYLES_PART, MINIMAL_STYLES.as_bytes().to_vec());
    }
    let xml = package.part_str(STYLES_PART)?.to_string();
    let doc = Document::parse(&xml)?;

    let cell_xfs = doc
        .descendants()
        .find(|n| n.is_element() && n.tag_name().name() == "cellXfs");

    // Raw markup and centered-ness of each existing xf, in index order.
    let existing: Vec<(String, bool)> = cell_xfs
        .map(|node| {
            node.children()
                .filter(|n| n.is_element() && n.tag_name().name() == "xf")
                .map(|xf| (xml[xf.range()].to_string(), is_centered(&xf)))
                .collect()
        })
        .unwrap_or_default();

    let mut map = BTreeMap::new();
    let mut appended: Vec<String> = Vec::new();
    // Distinct derived entries, so two bases with the same markup share one.
    let mut derived_cache: BTreeMap<String, u32> = BTreeMap::new();

    for &base in base_styles {
        let base_xml = match existing.get(base as usize) {
            Some((_, true)) => {
                map.insert(base, base);
                continue;
            }
            Some((markup, false)) => markup.clone(),
            // Out-of-range style index: derive from the default.
            None => existing
                .first()
                .map(|(markup, _)| markup.clone())
                .unwrap_or_else(|| {
                    r#"<xf numFmtId="0" fontId="0" fillId="0" borderId="0"/>"#.to_string()
                }),
        };

        let centered = centered_variant(&base_xml)?;
        let derived = *derived_cache.entry(centered.clone()).or_insert_with(|| {
            appended.push(centered);
            (existing.len() + appended.len() - 1) as u32
        });
        map.insert(base, derived);
    }

    if !appended.is_empty() {
        let updated = append_cell_xfs(xml.as_bytes(), &appended, existing.len())?;
        package.set_part(STYLES_PART, updated);
    }

    Ok(map)
}

fn is_centered(xf: &Node) -> bool {
    xf.children()
        .find(|n| n.is_element() && n.tag_name().name() == "alignment")
        .is_some_and(|a| {
            a.attribute("horizontal") == Some("center") && a.attribute("vertical") == Some("center")
        })
}

/// Rewrite one `<xf>` subtree with centered alignment applied, keeping all
/// other attributes and children.
fn centered_variant(xf_xml: &str) -> Result<String, FormatError> {
    let mut reader = Reader::from_reader(Cursor::new(xf_xml.as_bytes()));
    reader.config_mut().trim_text(true);
    let mut writer = Writer::new(Vec::with_capacity(xf_xml.len() + 64));
    let mut buf = Vec::new();

    let mut xf_tag: Option<String> = None;
    let mut depth = 0u32;

    let copy_xf_start = |e: &BytesStart<'_>| -> Result<BytesStart<'static>, FormatError> {
        let tag = String::from_utf8_lossy(e.name().as_ref()).into_owned();
        let mut out = BytesStart::new(tag);
        for attr in e.attributes().with_checks(false) {
            let attr = attr?;
            if local_name(attr.key.as_ref()) == b"applyAlignment" {
                continue;
            }
            out.push_attribute((attr.key.as_ref(), attr.value.as_ref()));
        }
        out.push_attribute(("applyAlignment", "1"));
        Ok(out.into_owned())
    };

    let write_alignment = |writer: &mut Writer<Vec<u8>>, xf_tag: &str| -> Result<(), FormatError> {
        let mut el = BytesStart::new(prefixed_tag(xf_tag.as_bytes(), "alignment"));
        el.push_attribute(("horizontal", "center"));
        el.push_attribute(("vertical", "center"));
        writer.write_event(Event::Empty(el))?;
        Ok(())
    };

    loop {
        let event = reader.read_event_into(&mut buf)?;
        match event {
            Event::Start(ref e) if depth == 0 => {
                let tag = String::from_utf8_lossy(e.name().as_ref()).into_owned();
                writer.write_event(Event::Start(copy_xf_start(e)?))?;
                xf_tag = Some(tag);
                depth += 1;
            }
            Event::Empty(ref e) if depth == 0 => {
                let tag = String::from_utf8_lossy(e.name().as_ref()).into_owned();
                writer.write_event(Event::Start(copy_xf_start(e)?))?;
                write_alignment(&mut writer, &tag)?;
                writer.write_event(Event::End(BytesEnd::new(tag)))?;
            }
            // Drop any existing alignment; the centered one replaces it.
            Event::Empty(ref e) if depth == 1 && local_name(e.name().as_ref()) == b"alignment" => {}
            Event::Start(ref e) if depth == 1 && local_name(e.name().as_ref()) == b"alignment" => {
                reader.read_to_end_into(e.name(), &mut Vec::new())?;
            }
            Event::End(ref e) if depth == 1 => {
                let tag = xf_tag.clone().unwrap_or_default();
                write_alignment(&mut writer, &tag)?;
                writer.write_event(Event::End(e.to_owned()))?;
                depth -= 1;
            }
            Event::Start(ref e) => {
                depth += 1;
                writer.write_event(Event::Start(e.to_owned()))?;
            }
            Event::End(ref e) => {
                depth -= 1;
                writer.write_event(Event::End(e.to_owned()))?;
            }
            Event::Eof => break,
            other => writer.write_event(other.into_owned())?,
        }
        buf.clear();
    }

    Ok(String::from_utf8(writer.into_inner())?)
}

/// Append derived xf entries to `<cellXfs>` and bump its `count`.
fn append_cell_xfs(
    styles_xml: &[u8],
    additions: &[String],
    existing_count: usize,
) -> Result<Vec<u8>, FormatError> {
    let mut reader = Reader::from_reader(Cursor::new(styles_xml));
    reader.config_mut().trim_text(false);
    let mut writer = Writer::new(Vec::with_capacity(
        styles_xml.len() + additions.iter().map(String::len).sum::<usize>() + 64,
    ));
    let mut buf = Vec::new();

    let new_count = (existing_count + additions.len()).to_string();

    let patch_count = |e: &BytesStart<'_>| -> Result<BytesStart<'static>, FormatError> {
        let tag = String::from_utf8_lossy(e.name().as_ref()).into_owned();
        let mut out = BytesStart::new(tag);
        let mut wrote = false;
        for attr in e.attributes().with_checks(false) {
            let attr = attr?;
            if local_name(attr.key.as_ref()) == b"count" {
                out.push_attribute((attr.key.as_ref(), new_count.as_bytes()));
                wrote = true;
            } else {
                out.push_attribute((attr.key.as_ref(), attr.value.as_ref()));
            }
        }
        if !wrote {
            out.push_attribute(("count", new_count.as_str()));
        }
        Ok(out.into_owned())
    };

    let write_additions = |writer: &mut Writer<Vec<u8>>| -> Result<(), FormatError> {
        for xf in additions {
            writer.write_event(Event::Text(BytesText::from_escaped(xf.as_str())))?;
        }
        Ok(())
    };

    let mut saw_cell_xfs = false;

    loop {
        match reader.read_event_into(&mut buf)? {
            Event::Start(ref e) if local_name(e.name().as_ref()) == b"cellXfs" => {
                saw_cell_xfs = true;
                writer.write_event(Event::Start(patch_count(e)?))?;
            }
            Event::Empty(ref e) if local_name(e.name().as_ref()) == b"cellXfs" => {
                saw_cell_xfs = true;
                let tag = String::from_utf8_lossy(e.name().as_ref()).into_owned();
                writer.write_event(Event::Start(patch_count(e)?))?;
                write_additions(&mut writer)?;
                writer.write_event(Event::End(BytesEnd::new(tag)))?;
            }
            Event::End(ref e) if local_name(e.name().as_ref()) == b"cellXfs" => {
                write_additions(&mut writer)?;
                writer.write_event(Event::End(e.to_owned()))?;
            }
            // A styles part without `<cellXfs>` at all: create the container
            // right before the root closes, or every derived index dangles.
            Event::End(ref e)
                if local_name(e.name().as_ref()) == b"styleSheet" && !saw_cell_xfs =>
            {
                let tag = prefixed_tag(e.name().as_ref(), "cellXfs");
                let mut start = BytesStart::new(tag.clone());
                start.push_attribute(("count", new_count.as_str()));
                writer.write_event(Event::Start(start))?;
                write_additions(&mut writer)?;
                writer.write_event(Event::End(BytesEnd::new(tag)))?;
                writer.write_event(Event::End(e.to_owned()))?;
            }
            Event::Eof => break,
            other => writer.write_event(other.into_owned())?,
        }
        buf.clear();
    }

    Ok(writer.into_inner())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Package;
    use pretty_assertions::assert_eq;
    use std::io::Write;

    fn package_with_styles(styles: &str) -> Package {
        let cursor = Cursor::new(Vec::new());
        let mut zip = zip::ZipWriter::new(cursor);
        let options = zip::write::FileOptions::<()>::default();
        zip.start_file("xl/styles.xml", options).unwrap();
        zip.write_all(styles.as_bytes()).unwrap();
        let bytes = zip.finish().unwrap().into_inner();
        Package::from_bytes(&bytes).unwrap()
    }

    const STYLES: &str = r#"<styleSheet xmlns="http://schemas.openxmlformats.org/spreadsheetml/2006/main">
<cellXfs count="3">
<xf numFmtId="0" fontId="0" fillId="0" borderId="0" xfId="0"/>
<xf numFmtId="0" fontId="2" fillId="0" borderId="1" xfId="0" applyFont="1"/>
<xf numFmtId="0" fontId="0" fillId="0" borderId="0" xfId="0" applyAlignment="1"><alignment horizontal="center" vertical="center"/></xf>
</cellXfs>
</styleSheet>"#;

    #[test]
    fn derives_one_xf_per_distinct_base() {
        let mut pkg = package_with_styles(STYLES);
        let bases = BTreeSet::from([0u32, 1]);
        let map = centered_style_map(&mut pkg, &bases).unwrap();

        assert_eq!(map[&0], 3);
        assert_eq!(map[&1], 4);

        let styles = std::str::from_utf8(pkg.part("xl/styles.xml").unwrap()).unwrap();
        assert!(styles.contains(r#"count="5""#), "{styles}");
        // The font/border of base 1 survive the derivation.
        assert!(
            styles.contains(r#"fontId="2" fillId="0" borderId="1" xfId="0" applyFont="1" applyAlignment="1"><alignment horizontal="center" vertical="center"/>"#),
            "{styles}"
        );
    }

    #[test]
    fn already_centered_base_maps_to_itself() {
        let mut pkg = package_with_styles(STYLES);
        let bases = BTreeSet::from([2u32]);
        let map = centered_style_map(&mut pkg, &bases).unwrap();
        assert_eq!(map[&2], 2);
        let styles = std::str::from_utf8(pkg.part("xl/styles.xml").unwrap()).unwrap();
        assert!(styles.contains(r#"count="3""#), "{styles}");
    }

    #[test]
    fn missing_styles_part_is_created() {
        let cursor = Cursor::new(Vec::new());
        let mut zip = zip::ZipWriter::new(cursor);
        let options = zip::write::FileOptions::<()>::default();
        zip.start_file("placeholder.xml", options).unwrap();
        zip.write_all(b"<x/>").unwrap();
        let bytes = zip.finish().unwrap().into_inner();
        let mut pkg = Package::from_bytes(&bytes).unwrap();

        let map = centered_style_map(&mut pkg, &BTreeSet::from([0u32])).unwrap();
        assert_eq!(map[&0], 1);
        assert!(pkg.part("xl/styles.xml").is_some());
    }

    #[test]
    fn styles_part_without_cell_xfs_gains_the_container() {
        let styles = r#"<styleSheet xmlns="http://schemas.openxmlformats.org/spreadsheetml/2006/main"><fonts count="1"><font/></fonts></styleSheet>"#;
        let mut pkg = package_with_styles(styles);

        let map = centered_style_map(&mut pkg, &BTreeSet::from([0u32])).unwrap();
        assert_eq!(map[&0], 0);

        let out = std::str::from_utf8(pkg.part("xl/styles.xml").unwrap()).unwrap();
        assert!(out.contains(r#"<cellXfs count="1">"#), "{out}");
        assert!(out.contains(r#"horizontal="center""#), "{out}");
        // The container must close inside the root.
        assert!(out.contains("</cellXfs></styleSheet>"), "{out}");
    }

    #[test]
    fn existing_alignment_is_replaced_not_stacked() {
        let styles = r#"<styleSheet><cellXfs count="1"><xf numFmtId="0" applyAlignment="1"><alignment horizontal="left" wrapText="1"/></xf></cellXfs></styleSheet>"#;
        let mut pkg = package_with_styles(styles);
        let map = centered_style_map(&mut pkg, &BTreeSet::from([0u32])).unwrap();
        assert_eq!(map[&0], 1);
        let out = std::str::from_utf8(pkg.part("xl/styles.xml").unwrap()).unwrap();
        // One centered alignment in the derived xf; the base xf keeps its
        // own (so only the original `left` remains).
        assert_eq!(out.matches("horizontal=\"center\"").count(), 1);
        assert_eq!(out.matches("horizontal=\"left\"").count(), 1);
    }
}
