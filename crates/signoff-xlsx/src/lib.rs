//! XLSX support for Signoff: loading the roster table out of an uploaded
//! workbook and merging captured signature images back into it.
//!
//! The workbook is treated as an OPC package (a ZIP of XML parts). Loading
//! never mutates anything; merging reopens the package from the original
//! bytes, patches the worksheet/styles/drawing parts, and serializes a new
//! buffer, so the caller's copy of the original stays pristine and repeated
//! merges are deterministic.

mod content_types;
mod drawing;
mod merge;
mod openxml;
mod package;
mod roster;
mod strings;
mod styles;
mod worksheet;

pub use merge::{merge_signatures, MergeOptions};
pub use package::Package;
pub use roster::load_roster;

use thiserror::Error;

/// The bytes are not a valid spreadsheet package.
#[derive(Debug, Error)]
pub enum FormatError {
    #[error("zip error: {0}")]
    Zip(#[from] zip::result::ZipError),
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("xml error: {0}")]
    Xml(#[from] quick_xml::Error),
    #[error("xml error: {0}")]
    RoXml(#[from] roxmltree::Error),
    #[error("xml attribute error: {0}")]
    Attr(#[from] quick_xml::events::attributes::AttrError),
    #[error("utf-8 error: {0}")]
    Utf8(#[from] std::string::FromUtf8Error),
    #[error("part is not utf-8: {0}")]
    PartUtf8(#[from] std::str::Utf8Error),
    #[error("missing package part: {0}")]
    MissingPart(String),
    #[error("invalid package: {0}")]
    Invalid(String),
    #[error("package part is too large to load safely: {part} is {size} bytes (max {max})")]
    PartTooLarge { part: String, size: u64, max: u64 },
    #[error("package is too large to load safely: {total} bytes uncompressed (max {max})")]
    PackageTooLarge { total: u64, max: u64 },
}

/// The package is a valid spreadsheet but its table does not have the
/// structure the configured layout promises.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ParseError {
    #[error("identity column {column:?} is not present in header row {header_row}")]
    IdentityColumnMissing { column: String, header_row: u32 },
    #[error("header row {header_row} has no titled columns")]
    EmptyHeaderRow { header_row: u32 },
}

/// Union error for [`load_roster`].
#[derive(Debug, Error)]
pub enum LoadError {
    #[error(transparent)]
    Format(#[from] FormatError),
    #[error(transparent)]
    Parse(#[from] ParseError),
}

/// Any failure during the merge pipeline (reopen, embed, serialize),
/// wrapping its cause. A failed merge leaves the caller's original bytes
/// and registry untouched; retrying is always safe.
#[derive(Debug, Error)]
pub enum MergeError {
    #[error("merge failed: {0}")]
    Format(#[from] FormatError),
    #[error("merge failed: {0}")]
    Parse(#[from] ParseError),
    #[error("merge failed: {0}")]
    Invalid(String),
}
