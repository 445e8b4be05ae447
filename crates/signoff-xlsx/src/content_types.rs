//! `[Content_Types].xml` maintenance for parts the merge adds.

use std::io::Cursor;

use quick_xml::events::{BytesStart, Event};
use quick_xml::{Reader, Writer};

use crate::openxml::{local_name, prefixed_tag};
use crate::{FormatError, Package};

pub(crate) const CONTENT_TYPES_PART: &str = "[Content_Types].xml";
pub(crate) const CT_PNG: &str = "image/png";
pub(crate) const CT_DRAWING: &str =
    "application/vnd.openxmlformats-officedocument.drawing+xml";

/// Ensure a `<Default Extension=".."/>` entry exists for `extension`.
///
/// Conservative: nothing is touched when the extension is already
/// registered (matching is case-insensitive, as OPC requires).
pub(crate) fn ensure_default(
    package: &mut Package,
    extension: &str,
    content_type: &str,
) -> Result<(), FormatError> {
    let xml = package.part_required(CONTENT_TYPES_PART)?.to_vec();
    if let Some(updated) = insert_types_entry(
        &xml,
        "Default",
        ("Extension", extension),
        ("ContentType", content_type),
        |existing| existing.eq_ignore_ascii_case(extension),
    )? {
        package.set_part(CONTENT_TYPES_PART, updated);
    }
    Ok(())
}

/// Ensure a `<Override PartName="/..."/>` entry exists for `part_name`.
pub(crate) fn ensure_override(
    package: &mut Package,
    part_name: &str,
    content_type: &str,
) -> Result<(), FormatError> {
    let xml = package.part_required(CONTENT_TYPES_PART)?.to_vec();
    let absolute = format!("/{}", part_name.trim_start_matches('/'));
    if let Some(updated) = insert_types_entry(
        &xml,
        "Override",
        ("PartName", &absolute),
        ("ContentType", content_type),
        |existing| existing.trim_start_matches('/') == absolute.trim_start_matches('/'),
    )? {
        package.set_part(CONTENT_TYPES_PART, updated);
    }
    Ok(())
}

/// Insert `<{element} {key_attr}="{..}" ContentType="{..}"/>` before the
/// closing `</Types>` tag unless an entry whose key matches `matches`
/// already exists. Returns `None` when no change was needed.
fn insert_types_entry(
    xml: &[u8],
    element: &str,
    key: (&str, &str),
    content_type: (&str, &str),
    matches: impl Fn(&str) -> bool,
) -> Result<Option<Vec<u8>>, FormatError> {
    let mut reader = Reader::from_reader(Cursor::new(xml));
    reader.config_mut().trim_text(false);
    let mut writer = Writer::new(Vec::with_capacity(xml.len() + 128));
    let mut buf = Vec::new();

    let mut found = false;
    let mut entry_tag: Option<String> = None;

    loop {
        let event = reader.read_event_into(&mut buf)?;
        match event {
            Event::Start(ref e) | Event::Empty(ref e)
                if local_name(e.name().as_ref()).eq_ignore_ascii_case(element.as_bytes()) =>
            {
                if entry_tag.is_none() {
                    entry_tag = Some(String::from_utf8_lossy(e.name().as_ref()).into_owned());
                }
                for attr in e.attributes().with_checks(false) {
                    let attr = attr?;
                    if local_name(attr.key.as_ref()).eq_ignore_ascii_case(key.0.as_bytes())
                        && matches(&attr.unescape_value()?)
                    {
                        found = true;
                    }
                }
                writer.write_event(event.into_owned())?;
            }
            Event::End(ref e) if local_name(e.name().as_ref()).eq_ignore_ascii_case(b"Types") => {
                if !found {
                    let tag = entry_tag
                        .clone()
                        .unwrap_or_else(|| prefixed_tag(e.name().as_ref(), element));
                    let mut el = BytesStart::new(tag);
                    el.push_attribute(key);
                    el.push_attribute(content_type);
                    writer.write_event(Event::Empty(el))?;
                }
                writer.write_event(Event::End(e.to_owned()))?;
            }
            Event::Eof => break,
            other => writer.write_event(other.into_owned())?,
        }
        buf.clear();
    }

    if found {
        Ok(None)
    } else {
        Ok(Some(writer.into_inner()))
    }
}
