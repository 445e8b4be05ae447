//! Shared-string table parsing.

use roxmltree::{Document, Node};

use crate::{FormatError, Package};

/// Parse `xl/sharedStrings.xml` into plain display strings.
///
/// Rich-text runs are flattened to their concatenated text; phonetic guide
/// runs (`<rPh>`) are not part of the displayed string and are skipped.
pub(crate) fn parse_shared_strings(package: &Package) -> Result<Vec<String>, FormatError> {
    let Some(bytes) = package.part("xl/sharedStrings.xml") else {
        return Ok(Vec::new());
    };
    let xml = std::str::from_utf8(bytes)?;
    let doc = Document::parse(xml)?;

    let mut items = Vec::new();
    for si in doc
        .root_element()
        .children()
        .filter(|n| n.is_element() && n.tag_name().name() == "si")
    {
        items.push(visible_text(&si));
    }
    Ok(items)
}

/// Concatenated `<t>` text under `node`, excluding phonetic runs.
pub(crate) fn visible_text(node: &Node) -> String {
    let mut out = String::new();
    collect_text(node, &mut out);
    out
}

fn collect_text(node: &Node, out: &mut String) {
    for child in node.children() {
        if !child.is_element() {
            continue;
        }
        match child.tag_name().name() {
            "t" => out.push_str(child.text().unwrap_or("")),
            "rPh" => {}
            _ => collect_text(&child, out),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rich_runs_are_flattened_and_phonetics_skipped() {
        let xml = r#"<sst xmlns="http://schemas.openxmlformats.org/spreadsheetml/2006/main" count="2" uniqueCount="2">
  <si><t>Name</t></si>
  <si>
    <r><t>Ada </t></r>
    <r><rPr><b/></rPr><t>Lovelace</t></r>
    <rPh sb="0"><t>phonetic</t></rPh>
  </si>
</sst>"#;
        let doc = Document::parse(xml).unwrap();
        let items: Vec<String> = doc
            .root_element()
            .children()
            .filter(|n| n.is_element() && n.tag_name().name() == "si")
            .map(|si| visible_text(&si))
            .collect();
        assert_eq!(items, vec!["Name".to_string(), "Ada Lovelace".to_string()]);
    }
}
