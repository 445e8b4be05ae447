use std::collections::BTreeMap;
use std::io::{Cursor, Read, Write};

use crate::openxml;
use crate::FormatError;

/// Maximum allowed *inflated* bytes for a single ZIP entry.
///
/// A safety limit so untrusted uploads cannot decompress into unbounded
/// memory (ZIP bombs) when the package is materialized for merging.
pub const MAX_PART_BYTES: u64 = 64 * 1024 * 1024; // 64 MiB

/// Maximum allowed *inflated* bytes across all ZIP entries.
pub const MAX_TOTAL_BYTES: u64 = 256 * 1024 * 1024; // 256 MiB

/// In-memory representation of an XLSX package as a map of part name ->
/// bytes.
///
/// The map intentionally keeps every part it does not understand, so a
/// merged workbook round-trips formatting, formulas and other content we
/// never touch.
#[derive(Debug, Clone)]
pub struct Package {
    parts: BTreeMap<String, Vec<u8>>,
}

impl Package {
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, FormatError> {
        let reader = Cursor::new(bytes);
        let mut zip = zip::ZipArchive::new(reader)?;

        let mut parts = BTreeMap::new();
        let mut total: u64 = 0;
        for i in 0..zip.len() {
            let mut file = zip.by_index(i)?;
            if !file.is_file() {
                continue;
            }

            // ZIP entry names in valid packages should not start with `/`,
            // but tolerate producers that include it (or use `\`).
            let name = file
                .name()
                .trim_start_matches(['/', '\\'])
                .replace('\\', "/");

            // The declared uncompressed size lives in attacker-controlled
            // metadata; never allocate from it. Reading with a hard cap
            // bounds both memory and the inflated byte count.
            let mut buf = Vec::new();
            let read = (&mut file)
                .take(MAX_PART_BYTES + 1)
                .read_to_end(&mut buf)? as u64;
            if read > MAX_PART_BYTES {
                return Err(FormatError::PartTooLarge {
                    part: name,
                    size: read,
                    max: MAX_PART_BYTES,
                });
            }

            total = total.saturating_add(read);
            if total > MAX_TOTAL_BYTES {
                return Err(FormatError::PackageTooLarge {
                    total,
                    max: MAX_TOTAL_BYTES,
                });
            }

            parts.insert(name, buf);
        }

        Ok(Self { parts })
    }

    pub fn part(&self, name: &str) -> Option<&[u8]> {
        let name = name.strip_prefix('/').unwrap_or(name);
        self.parts.get(name).map(Vec::as_slice)
    }

    pub(crate) fn part_required(&self, name: &str) -> Result<&[u8], FormatError> {
        self.part(name)
            .ok_or_else(|| FormatError::MissingPart(name.to_string()))
    }

    pub(crate) fn part_str(&self, name: &str) -> Result<&str, FormatError> {
        Ok(std::str::from_utf8(self.part_required(name)?)?)
    }

    pub fn set_part(&mut self, name: impl Into<String>, bytes: Vec<u8>) {
        self.parts.insert(name.into(), bytes);
    }

    pub fn part_names(&self) -> impl Iterator<Item = &str> {
        self.parts.keys().map(String::as_str)
    }

    /// Resolve the worksheet part backing the primary (first) sheet in
    /// `xl/workbook.xml`.
    ///
    /// Falls back to the conventional `xl/worksheets/sheet{sheetId}.xml`
    /// name when the workbook relationships are missing or do not resolve.
    pub fn primary_worksheet(&self) -> Result<String, FormatError> {
        let workbook_xml = self.part_str("xl/workbook.xml")?;
        let doc = roxmltree::Document::parse(workbook_xml)?;

        let sheet = doc
            .descendants()
            .find(|n| n.is_element() && n.tag_name().name() == "sheet")
            .ok_or_else(|| FormatError::Invalid("workbook has no sheets".to_string()))?;

        // roxmltree exposes `r:id` under its local name `id`.
        let rel_id = sheet
            .attributes()
            .find(|a| a.name() == "id")
            .map(|a| a.value().to_string());
        let sheet_id = sheet.attribute("sheetId").map(str::to_string);

        if let Some(rel_id) = rel_id {
            if let Some(rels_bytes) = self.part(&openxml::rels_for_part("xl/workbook.xml")) {
                let rels = openxml::parse_relationships(rels_bytes)?;
                if let Some(rel) = rels.iter().find(|rel| rel.id == rel_id && !rel.is_external())
                {
                    let resolved = openxml::resolve_target("xl/workbook.xml", &rel.target);
                    if self.part(&resolved).is_some() {
                        return Ok(resolved);
                    }
                }
            }
        }

        if let Some(sheet_id) = sheet_id {
            let candidate = format!("xl/worksheets/sheet{sheet_id}.xml");
            if self.part(&candidate).is_some() {
                return Ok(candidate);
            }
        }

        Err(FormatError::Invalid(
            "primary worksheet part not found".to_string(),
        ))
    }

    /// Serialize the package back into a ZIP buffer (deflate).
    pub fn write_to_bytes(&self) -> Result<Vec<u8>, FormatError> {
        let cursor = Cursor::new(Vec::new());
        let mut zip = zip::ZipWriter::new(cursor);
        let options = zip::write::FileOptions::<()>::default()
            .compression_method(zip::CompressionMethod::Deflated);

        for (name, bytes) in &self.parts {
            zip.start_file(name.clone(), options)?;
            zip.write_all(bytes)?;
        }

        Ok(zip.finish()?.into_inner())
    }
}

/// Zip up literal parts for unit tests.
#[cfg(test)]
pub(crate) fn zip_parts(entries: &[(&str, &[u8])]) -> Vec<u8> {
    let cursor = Cursor::new(Vec::new());
    let mut zip = zip::ZipWriter::new(cursor);
    let options = zip::write::FileOptions::<()>::default()
        .compression_method(zip::CompressionMethod::Deflated);
    for (name, bytes) in entries {
        zip.start_file(*name, options).unwrap();
        zip.write_all(bytes).unwrap();
    }
    zip.finish().unwrap().into_inner()
}
