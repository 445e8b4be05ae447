//! Session state for Signoff.
//!
//! A [`SessionContext`] owns everything one signing session needs: the
//! uploaded workbook bytes and their parsed roster, the signature registry,
//! the filesystem store handle and the last merge artifact. There are no
//! globals; a UI or CLI holds exactly one context and drives it through
//! upload, capture, merge and download.

use std::path::{Path, PathBuf};

use signoff_ink::{render_signature, BackgroundPolicy, CaptureError, PixelBuffer, SignatureStore};
use signoff_model::{Roster, SheetLayout, SignatureRegistry};
use signoff_xlsx::{load_roster, merge_signatures, LoadError, MergeError, MergeOptions};
use thiserror::Error;

/// Fixed download name for the merged workbook.
pub const MERGED_FILE_NAME: &str = "signed_grades.xlsx";

#[derive(Debug, Error)]
pub enum SessionError {
    /// The operation needs a workbook but none has been uploaded yet.
    #[error("no workbook has been uploaded")]
    WorkbookRequired,
    /// Merge was requested with an empty registry; there is nothing to
    /// embed, so refusing beats producing an unchanged copy.
    #[error("no signatures have been captured")]
    NoSignatures,
    /// A registered signature could not be read back from the store, named
    /// so a multi-student merge failure points at the broken file.
    #[error("failed to read the stored signature for {identity}: {source}")]
    SignatureRead {
        identity: String,
        #[source]
        source: CaptureError,
    },
    #[error(transparent)]
    Load(#[from] LoadError),
    #[error(transparent)]
    Capture(#[from] CaptureError),
    #[error(transparent)]
    Merge(#[from] MergeError),
}

/// All session knobs, explicit and owned by the caller.
#[derive(Debug, Clone)]
pub struct SessionConfig {
    pub layout: SheetLayout,
    pub merge: MergeOptions,
    pub background: BackgroundPolicy,
    /// Directory the per-student signature PNGs live in.
    pub signatures_dir: PathBuf,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            layout: SheetLayout::default(),
            merge: MergeOptions::default(),
            background: BackgroundPolicy::Keep,
            signatures_dir: PathBuf::from("signatures"),
        }
    }
}

/// What an upload (or re-upload) produced, for status display.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UploadSummary {
    /// Data rows that survived cleaning.
    pub rows: usize,
    /// Titled columns.
    pub columns: usize,
    /// Distinct signable identities.
    pub students: usize,
}

/// The merged workbook, held until the caller downloads it or a new
/// upload invalidates it.
#[derive(Debug, Clone)]
pub struct MergeArtifact {
    bytes: Vec<u8>,
}

impl MergeArtifact {
    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn file_name(&self) -> &'static str {
        MERGED_FILE_NAME
    }
}

struct UploadedWorkbook {
    bytes: Vec<u8>,
    roster: Roster,
}

/// One signing session.
pub struct SessionContext {
    config: SessionConfig,
    store: SignatureStore,
    workbook: Option<UploadedWorkbook>,
    registry: SignatureRegistry,
    last_merge: Option<MergeArtifact>,
}

impl SessionContext {
    /// Open a session, creating the signature directory if needed.
    pub fn new(config: SessionConfig) -> Result<Self, SessionError> {
        let store = SignatureStore::open(&config.signatures_dir)?;
        Ok(Self {
            config,
            store,
            workbook: None,
            registry: SignatureRegistry::new(),
            last_merge: None,
        })
    }

    /// Accept an uploaded workbook.
    ///
    /// Re-uploading byte-identical content is a no-op that keeps every
    /// captured signature. Different bytes are parsed first; only on
    /// success do they replace the current workbook, and the registry and
    /// any previous merge artifact are cleared because row positions from
    /// the old table no longer mean anything. A failed parse leaves all
    /// prior state intact.
    pub fn upload(&mut self, bytes: Vec<u8>) -> Result<UploadSummary, SessionError> {
        if let Some(current) = &self.workbook {
            if current.bytes == bytes {
                return Ok(summarize(&current.roster));
            }
        }

        let roster = load_roster(&bytes, &self.config.layout)?;
        let summary = summarize(&roster);
        self.workbook = Some(UploadedWorkbook { bytes, roster });
        self.registry.clear();
        self.last_merge = None;
        Ok(summary)
    }

    /// Capture a signature for `identity` from a raw canvas buffer.
    ///
    /// The buffer is rendered with the configured background policy,
    /// persisted to the store (overwriting any earlier signature for the
    /// same identity) and registered. Any failure, including an empty
    /// canvas, leaves the registry unchanged.
    pub fn capture(
        &mut self,
        identity: &str,
        buffer: &PixelBuffer,
    ) -> Result<PathBuf, SessionError> {
        if self.workbook.is_none() {
            return Err(SessionError::WorkbookRequired);
        }
        let png = render_signature(buffer, self.config.background)?;
        let path = self.store.save(identity, &png)?;
        self.registry.upsert(identity, path.clone());
        Ok(path)
    }

    /// Re-register every signature file already in the store.
    ///
    /// Sessions are per-process; the store directory is what survives
    /// between them. Returns the number of signatures registered.
    pub fn restore_signatures(&mut self) -> Result<usize, SessionError> {
        let entries = self.store.entries()?;
        let count = entries.len();
        for (identity, path) in entries {
            self.registry.upsert(identity, path);
        }
        Ok(count)
    }

    /// Merge every registered signature into a copy of the uploaded
    /// workbook and retain the result for download.
    ///
    /// The pipeline always starts from the original upload bytes, so
    /// merging again after more captures never stacks images on top of an
    /// earlier merge. Failures leave the registry, the workbook and any
    /// previously retained artifact untouched.
    pub fn merge(&mut self) -> Result<&MergeArtifact, SessionError> {
        let workbook = self
            .workbook
            .as_ref()
            .ok_or(SessionError::WorkbookRequired)?;
        if self.registry.is_empty() {
            return Err(SessionError::NoSignatures);
        }

        let mut signatures = Vec::with_capacity(self.registry.len());
        for (identity, _) in self.registry.iter() {
            let png = self
                .store
                .load(identity)
                .map_err(|source| SessionError::SignatureRead {
                    identity: identity.to_string(),
                    source,
                })?;
            signatures.push((identity.to_string(), png));
        }

        let bytes = merge_signatures(
            &workbook.bytes,
            &workbook.roster,
            &signatures,
            &self.config.layout,
            &self.config.merge,
        )?;
        Ok(self.last_merge.insert(MergeArtifact { bytes }))
    }

    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    pub fn store(&self) -> &SignatureStore {
        &self.store
    }

    /// The roster of the current upload, if any.
    pub fn roster(&self) -> Option<&Roster> {
        self.workbook.as_ref().map(|wb| &wb.roster)
    }

    /// How many students have a registered signature.
    pub fn signed_count(&self) -> usize {
        self.registry.len()
    }

    /// Registered signatures in capture order, for thumbnails.
    pub fn signatures(&self) -> impl Iterator<Item = (&str, &Path)> {
        self.registry.iter()
    }

    /// The retained artifact from the most recent successful merge.
    pub fn last_merge(&self) -> Option<&MergeArtifact> {
        self.last_merge.as_ref()
    }
}

fn summarize(roster: &Roster) -> UploadSummary {
    UploadSummary {
        rows: roster.rows().len(),
        columns: roster.columns().len(),
        students: roster.identities().len(),
    }
}
