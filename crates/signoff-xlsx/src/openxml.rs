//! Small OPC helpers: relationship parts and target resolution.

use std::io::Cursor;

use quick_xml::events::{BytesEnd, BytesStart, Event};
use quick_xml::{Reader, Writer};

use crate::FormatError;

pub(crate) const REL_NS: &str =
    "http://schemas.openxmlformats.org/package/2006/relationships";
pub(crate) const REL_TYPE_IMAGE: &str =
    "http://schemas.openxmlformats.org/officeDocument/2006/relationships/image";
pub(crate) const REL_TYPE_DRAWING: &str =
    "http://schemas.openxmlformats.org/officeDocument/2006/relationships/drawing";

#[derive(Clone, Debug, PartialEq, Eq)]
pub(crate) struct Relationship {
    pub id: String,
    pub type_uri: String,
    pub target: String,
    pub target_mode: Option<String>,
}

impl Relationship {
    pub fn is_external(&self) -> bool {
        self.target_mode
            .as_deref()
            .is_some_and(|mode| mode.trim().eq_ignore_ascii_case("External"))
    }
}

/// The `.rels` part name for a part (`xl/workbook.xml` ->
/// `xl/_rels/workbook.xml.rels`).
pub(crate) fn rels_for_part(part: &str) -> String {
    match part.rsplit_once('/') {
        Some((dir, file_name)) => format!("{dir}/_rels/{file_name}.rels"),
        None => format!("_rels/{part}.rels"),
    }
}

/// Resolve a relationship target against its source part.
///
/// Targets are URIs; fragments are stripped and both relative and
/// package-absolute (`/xl/...`) forms are normalized to a canonical part
/// name without a leading slash.
pub(crate) fn resolve_target(source_part: &str, target: &str) -> String {
    let target = target.split('#').next().unwrap_or(target);
    if target.is_empty() {
        return normalize(source_part);
    }
    if let Some(target) = target.strip_prefix('/') {
        return normalize(target);
    }

    let base_dir = source_part
        .rsplit_once('/')
        .map(|(dir, _)| dir)
        .unwrap_or("");
    normalize(&format!("{base_dir}/{target}"))
}

/// Express `to_part` as a relationship target relative to `from_part`
/// (`xl/drawings/drawing1.xml` -> `xl/media/image1.png` gives
/// `../media/image1.png`).
pub(crate) fn relative_target(from_part: &str, to_part: &str) -> String {
    let from_dir: Vec<&str> = from_part
        .rsplit_once('/')
        .map(|(dir, _)| dir.split('/').collect())
        .unwrap_or_default();
    let (to_dir, to_file) = to_part.rsplit_once('/').unwrap_or(("", to_part));
    let to_dir: Vec<&str> = if to_dir.is_empty() {
        Vec::new()
    } else {
        to_dir.split('/').collect()
    };

    let common = from_dir
        .iter()
        .zip(to_dir.iter())
        .take_while(|(a, b)| a == b)
        .count();

    let mut segments: Vec<&str> = Vec::new();
    for _ in common..from_dir.len() {
        segments.push("..");
    }
    segments.extend(&to_dir[common..]);
    segments.push(to_file);
    segments.join("/")
}

fn normalize(path: &str) -> String {
    let mut out: Vec<&str> = Vec::new();
    for part in path.split('/') {
        match part {
            "" | "." => {}
            ".." => {
                out.pop();
            }
            other => out.push(other),
        }
    }
    out.join("/")
}

pub(crate) fn local_name(name: &[u8]) -> &[u8] {
    match name.iter().rposition(|b| *b == b':') {
        Some(idx) => &name[idx + 1..],
        None => name,
    }
}

pub(crate) fn parse_relationships(xml: &[u8]) -> Result<Vec<Relationship>, FormatError> {
    let mut reader = Reader::from_reader(Cursor::new(xml));
    reader.config_mut().trim_text(true);
    let mut buf = Vec::new();
    let mut relationships = Vec::new();

    loop {
        match reader.read_event_into(&mut buf)? {
            Event::Start(start) | Event::Empty(start) => {
                if local_name(start.name().as_ref()).eq_ignore_ascii_case(b"Relationship") {
                    let mut id = None;
                    let mut target = None;
                    let mut type_uri = None;
                    let mut target_mode = None;
                    for attr in start.attributes() {
                        let attr = attr?;
                        let key = local_name(attr.key.as_ref());
                        let value = attr.unescape_value()?.into_owned();
                        if key.eq_ignore_ascii_case(b"Id") {
                            id = Some(value);
                        } else if key.eq_ignore_ascii_case(b"Target") {
                            target = Some(value);
                        } else if key.eq_ignore_ascii_case(b"Type") {
                            type_uri = Some(value);
                        } else if key.eq_ignore_ascii_case(b"TargetMode") {
                            target_mode = Some(value);
                        }
                    }
                    if let (Some(id), Some(target), Some(type_uri)) = (id, target, type_uri) {
                        relationships.push(Relationship {
                            id,
                            target,
                            type_uri,
                            target_mode,
                        });
                    }
                }
            }
            Event::Eof => break,
            _ => {}
        }
        buf.clear();
    }

    Ok(relationships)
}

/// The next unused `rId{n}` in a relationship list.
pub(crate) fn next_rel_id(relationships: &[Relationship]) -> String {
    let max = relationships
        .iter()
        .filter_map(|rel| rel.id.strip_prefix("rId")?.parse::<u32>().ok())
        .max()
        .unwrap_or(0);
    format!("rId{}", max + 1)
}

/// An empty `.rels` document to seed parts that have no relationships yet.
pub(crate) fn empty_rels_xml() -> Vec<u8> {
    format!(
        "<?xml version=\"1.0\" encoding=\"UTF-8\" standalone=\"yes\"?>\
<Relationships xmlns=\"{REL_NS}\"/>"
    )
    .into_bytes()
}

/// Append relationships to an existing `.rels` payload.
///
/// The inserted elements reuse the document's `Relationship` tag prefix (if
/// any) so producers with prefixed relationship markup stay consistent.
pub(crate) fn append_relationships(
    rels_xml: &[u8],
    additions: &[Relationship],
) -> Result<Vec<u8>, FormatError> {
    let mut reader = Reader::from_reader(Cursor::new(rels_xml));
    reader.config_mut().trim_text(false);
    let mut writer = Writer::new(Vec::with_capacity(rels_xml.len() + additions.len() * 128));
    let mut buf = Vec::new();

    let write_additions = |writer: &mut Writer<Vec<u8>>,
                           tag: &str|
     -> Result<(), FormatError> {
        for rel in additions {
            let mut el = BytesStart::new(tag);
            el.push_attribute(("Id", rel.id.as_str()));
            el.push_attribute(("Type", rel.type_uri.as_str()));
            el.push_attribute(("Target", rel.target.as_str()));
            if let Some(mode) = &rel.target_mode {
                el.push_attribute(("TargetMode", mode.as_str()));
            }
            writer.write_event(Event::Empty(el))?;
        }
        Ok(())
    };

    loop {
        match reader.read_event_into(&mut buf)? {
            Event::End(e) if local_name(e.name().as_ref()).eq_ignore_ascii_case(b"Relationships") => {
                write_additions(&mut writer, &prefixed_tag(e.name().as_ref(), "Relationship"))?;
                writer.write_event(Event::End(e.to_owned()))?;
            }
            Event::Empty(e)
                if local_name(e.name().as_ref()).eq_ignore_ascii_case(b"Relationships") =>
            {
                let tag_name = String::from_utf8_lossy(e.name().as_ref()).into_owned();
                writer.write_event(Event::Start(e.to_owned()))?;
                write_additions(&mut writer, &prefixed_tag(tag_name.as_bytes(), "Relationship"))?;
                writer.write_event(Event::End(BytesEnd::new(tag_name.as_str())))?;
            }
            Event::Eof => break,
            other => writer.write_event(other.into_owned())?,
        }
        buf.clear();
    }

    Ok(writer.into_inner())
}

/// Build a tag name that reuses the namespace prefix of `reference` (e.g.
/// `ct:Types` -> `ct:Override`).
pub(crate) fn prefixed_tag(reference: &[u8], local: &str) -> String {
    match reference.iter().rposition(|b| *b == b':') {
        Some(idx) => format!(
            "{}:{local}",
            String::from_utf8_lossy(&reference[..idx])
        ),
        None => local.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn resolve_target_relative_and_absolute() {
        assert_eq!(
            resolve_target("xl/worksheets/sheet1.xml", "../media/image1.png"),
            "xl/media/image1.png"
        );
        assert_eq!(
            resolve_target("xl/workbook.xml", "/xl/worksheets/sheet1.xml"),
            "xl/worksheets/sheet1.xml"
        );
        assert_eq!(
            resolve_target("xl/workbook.xml", "worksheets/sheet1.xml#rId1"),
            "xl/worksheets/sheet1.xml"
        );
        assert_eq!(resolve_target("xl/workbook.xml", "#rId1"), "xl/workbook.xml");
    }

    #[test]
    fn relative_target_walks_up_and_down() {
        assert_eq!(
            relative_target("xl/drawings/drawing1.xml", "xl/media/image1.png"),
            "../media/image1.png"
        );
        assert_eq!(
            relative_target("xl/worksheets/sheet1.xml", "xl/drawings/drawing1.xml"),
            "../drawings/drawing1.xml"
        );
        assert_eq!(
            relative_target("xl/workbook.xml", "xl/worksheets/sheet1.xml"),
            "worksheets/sheet1.xml"
        );
        assert_eq!(relative_target("a.xml", "b.xml"), "b.xml");
    }

    #[test]
    fn rels_for_part_paths() {
        assert_eq!(rels_for_part("workbook.xml"), "_rels/workbook.xml.rels");
        assert_eq!(
            rels_for_part("xl/drawings/drawing1.xml"),
            "xl/drawings/_rels/drawing1.xml.rels"
        );
    }

    #[test]
    fn next_rel_id_skips_used_ids() {
        let rels = vec![
            Relationship {
                id: "rId1".into(),
                type_uri: String::new(),
                target: String::new(),
                target_mode: None,
            },
            Relationship {
                id: "rId7".into(),
                type_uri: String::new(),
                target: String::new(),
                target_mode: None,
            },
        ];
        assert_eq!(next_rel_id(&rels), "rId8");
        assert_eq!(next_rel_id(&[]), "rId1");
    }

    #[test]
    fn append_relationships_round_trips() {
        let base = empty_rels_xml();
        let additions = vec![Relationship {
            id: "rId1".into(),
            type_uri: REL_TYPE_IMAGE.into(),
            target: "../media/image1.png".into(),
            target_mode: None,
        }];
        let appended = append_relationships(&base, &additions).unwrap();
        let parsed = parse_relationships(&appended).unwrap();
        assert_eq!(parsed, additions);

        // Appending to a non-empty document keeps existing entries.
        let more = vec![Relationship {
            id: "rId2".into(),
            type_uri: REL_TYPE_DRAWING.into(),
            target: "../drawings/drawing1.xml".into(),
            target_mode: None,
        }];
        let appended = append_relationships(&appended, &more).unwrap();
        let parsed = parse_relationships(&appended).unwrap();
        assert_eq!(parsed.len(), 2);
        assert_eq!(parsed[1], more[0]);
    }
}
