use std::collections::HashMap;
use std::sync::Arc;

use snafu::OptionExt;

use super::error::{SessionResult, StaleHandleSnafu};
use super::ids::HandleId;
use super::types::{FileHandle, RawFile};

/// Prefix of every object URL minted by the registry.
pub const OBJECT_URL_PREFIX: &str = "blob:scenechat/";

#[derive(Debug)]
struct ObjectEntry {
    url: String,
    bytes: Arc<[u8]>,
    mime_hint: String,
}

/// Borrowed view of a live registry entry.
#[derive(Debug, Clone, Copy)]
pub struct ObjectView<'a> {
    pub handle_id: HandleId,
    pub url: &'a str,
    pub bytes: &'a [u8],
    pub mime_hint: &'a str,
}

/// Table of live object URLs.
///
/// Owned by a single task; callers that share it across threads must wrap it themselves.
#[derive(Debug, Default)]
pub struct ObjectUrlRegistry {
    live: HashMap<HandleId, ObjectEntry>,
    minted_total: u64,
    released_total: u64,
}

impl ObjectUrlRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn mint(&mut self, file: &RawFile) -> FileHandle {
        let id = HandleId::new_v7();
        let url = format!("{OBJECT_URL_PREFIX}{id}");
        self.live.insert(
            id,
            ObjectEntry {
                url: url.clone(),
                bytes: Arc::clone(&file.bytes),
                mime_hint: file.mime_type.clone(),
            },
        );
        self.minted_total += 1;
        tracing::debug!(handle = %id, name = %file.name, "minted object url");

        FileHandle::new(
            id,
            url,
            file.name.clone(),
            file.mime_type.clone(),
            file.size_bytes(),
        )
    }

    /// Releases one handle. Unknown or already released handles are a no-op.
    ///
    /// Returns whether the handle was live before the call.
    pub fn release(&mut self, handle: &FileHandle) -> bool {
        self.release_id(handle.id())
    }

    pub fn release_id(&mut self, handle_id: HandleId) -> bool {
        if self.live.remove(&handle_id).is_none() {
            return false;
        }

        self.released_total += 1;
        tracing::debug!(handle = %handle_id, "released object url");
        true
    }

    pub fn release_all(&mut self) -> usize {
        let released = self.live.len();
        self.live.clear();
        self.released_total += released as u64;
        if released > 0 {
            tracing::debug!(released, "released all object urls");
        }
        released
    }

    /// Dereferences a handle. A released handle is a caller bug and reported as `StaleHandle`.
    pub fn resolve(&self, handle: &FileHandle) -> SessionResult<ObjectView<'_>> {
        let handle_id = handle.id();
        let entry = self.live.get(&handle_id).context(StaleHandleSnafu {
            stage: "registry-resolve",
            handle_id,
        })?;

        Ok(ObjectView {
            handle_id,
            url: &entry.url,
            bytes: &entry.bytes,
            mime_hint: &entry.mime_hint,
        })
    }

    pub fn is_live(&self, handle_id: HandleId) -> bool {
        self.live.contains_key(&handle_id)
    }

    pub fn live_count(&self) -> usize {
        self.live.len()
    }

    pub fn minted_total(&self) -> u64 {
        self.minted_total
    }

    pub fn released_total(&self) -> u64 {
        self.released_total
    }
}
