use snafu::ensure;

use super::error::{InvalidIndexSnafu, SessionResult};
use super::registry::ObjectUrlRegistry;
use super::types::{FileHandle, RawFile, StagedAttachment};

/// What `AttachmentStagingList::clear` does with the handles it removes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClearMode {
    /// Cancel/teardown path: every handle is released.
    ReleaseHandles,
    /// Send path: handles are returned to the caller, which becomes their owner.
    TransferHandles,
}

/// One file leaving the composer with its handle still live.
#[derive(Debug)]
pub struct DrainedFile {
    pub file: RawFile,
    pub handle: FileHandle,
    pub name: String,
}

/// Everything the composer held at send time.
#[derive(Debug)]
pub struct DrainedDraft {
    pub text: String,
    pub files: Vec<DrainedFile>,
}

/// Composer state: draft text plus files selected but not yet sent.
#[derive(Debug, Default)]
pub struct AttachmentStagingList {
    draft: String,
    entries: Vec<StagedAttachment>,
}

impl AttachmentStagingList {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn draft(&self) -> &str {
        &self.draft
    }

    pub fn set_draft(&mut self, text: impl Into<String>) {
        self.draft = text.into();
    }

    pub fn entries(&self) -> &[StagedAttachment] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// True when a send would carry something: non-blank text or at least one file.
    pub fn has_content(&self) -> bool {
        !self.draft.trim().is_empty() || !self.entries.is_empty()
    }

    pub fn get(&self, index: usize) -> SessionResult<&StagedAttachment> {
        let len = self.entries.len();
        self.entries.get(index).ok_or_else(|| {
            InvalidIndexSnafu {
                stage: "staging-get",
                index,
                len,
            }
            .build()
        })
    }

    pub fn add(
        &mut self,
        registry: &mut ObjectUrlRegistry,
        files: impl IntoIterator<Item = RawFile>,
    ) -> &[StagedAttachment] {
        for file in files {
            let handle = registry.mint(&file);
            self.entries.push(StagedAttachment::new(file, handle));
        }
        &self.entries
    }

    /// Releases and removes the entry at `index`; the list is untouched when out of range.
    pub fn remove_at(
        &mut self,
        registry: &mut ObjectUrlRegistry,
        index: usize,
    ) -> SessionResult<RawFile> {
        let len = self.entries.len();
        ensure!(
            index < len,
            InvalidIndexSnafu {
                stage: "staging-remove-at",
                index,
                len,
            }
        );

        registry.release(self.entries[index].handle());
        let (file, _released) = self.entries.remove(index).into_parts();
        Ok(file)
    }

    /// Empties the file list. With `TransferHandles` the removed entries are returned and the
    /// list releases nothing; with `ReleaseHandles` the returned vector is empty.
    pub fn clear(
        &mut self,
        registry: &mut ObjectUrlRegistry,
        mode: ClearMode,
    ) -> Vec<StagedAttachment> {
        let entries = std::mem::take(&mut self.entries);
        match mode {
            ClearMode::TransferHandles => entries,
            ClearMode::ReleaseHandles => {
                for entry in &entries {
                    registry.release(entry.handle());
                }
                Vec::new()
            }
        }
    }

    /// Takes the draft text and every staged file in one step, leaving the composer empty.
    ///
    /// Handles stay live and move to the caller.
    pub fn drain_for_send(&mut self) -> DrainedDraft {
        let text = std::mem::take(&mut self.draft);
        let files = std::mem::take(&mut self.entries)
            .into_iter()
            .map(|entry| {
                let (file, handle) = entry.into_parts();
                DrainedFile {
                    name: file.name.clone(),
                    file,
                    handle,
                }
            })
            .collect();

        DrainedDraft { text, files }
    }
}
