use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

use super::ids::{HandleId, MessageId, RemoteFileId};

/// MIME hint used when the picker reports no type for a file.
pub const FALLBACK_MIME_TYPE: &str = "application/octet-stream";

/// A file as selected by the user or fetched from the backend, before any handle exists.
///
/// The byte source is shared: the send collaborator receives a clone while the registry keeps
/// its own reference for local preview.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawFile {
    pub name: String,
    pub mime_type: String,
    pub bytes: Arc<[u8]>,
}

impl RawFile {
    pub fn new(
        name: impl Into<String>,
        mime_type: impl Into<String>,
        bytes: impl Into<Arc<[u8]>>,
    ) -> Self {
        let mime_type = mime_type.into();
        Self {
            name: name.into(),
            mime_type: if mime_type.trim().is_empty() {
                FALLBACK_MIME_TYPE.to_string()
            } else {
                mime_type
            },
            bytes: bytes.into(),
        }
    }

    pub fn size_bytes(&self) -> u64 {
        self.bytes.len() as u64
    }
}

/// Opaque reference to one registry entry.
///
/// Not `Clone`: a handle has exactly one owner at a time (staging list, transcript message or a
/// transient download scope) and only moves between them.
#[derive(Debug, PartialEq, Eq)]
pub struct FileHandle {
    id: HandleId,
    url: String,
    display_name: String,
    mime_hint: String,
    size_bytes: u64,
}

impl FileHandle {
    pub(crate) fn new(
        id: HandleId,
        url: String,
        display_name: String,
        mime_hint: String,
        size_bytes: u64,
    ) -> Self {
        Self {
            id,
            url,
            display_name,
            mime_hint,
            size_bytes,
        }
    }

    pub fn id(&self) -> HandleId {
        self.id
    }

    /// Dereferenceable object URL, valid until the handle is released.
    pub fn url(&self) -> &str {
        &self.url
    }

    pub fn display_name(&self) -> &str {
        &self.display_name
    }

    pub fn mime_hint(&self) -> &str {
        &self.mime_hint
    }

    pub fn size_bytes(&self) -> u64 {
        self.size_bytes
    }
}

/// A selected file that has not been sent yet.
#[derive(Debug)]
pub struct StagedAttachment {
    file: RawFile,
    handle: FileHandle,
}

impl StagedAttachment {
    pub(crate) fn new(file: RawFile, handle: FileHandle) -> Self {
        Self { file, handle }
    }

    pub fn name(&self) -> &str {
        &self.file.name
    }

    pub fn mime_type(&self) -> &str {
        &self.file.mime_type
    }

    pub fn size_bytes(&self) -> u64 {
        self.file.size_bytes()
    }

    pub fn file(&self) -> &RawFile {
        &self.file
    }

    pub fn handle(&self) -> &FileHandle {
        &self.handle
    }

    pub fn into_parts(self) -> (RawFile, FileHandle) {
        (self.file, self.handle)
    }
}

/// Who authored a transcript entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Sender {
    User,
    Assistant,
    System,
}

impl Sender {
    pub fn label(self) -> &'static str {
        match self {
            Self::User => "you",
            Self::Assistant => "assistant",
            Self::System => "system",
        }
    }
}

/// Attachment carried by a transcript message.
#[derive(Debug, PartialEq, Eq)]
pub enum AttachmentRef {
    /// Backed by a live handle, downloadable without a network round trip.
    Local { handle: FileHandle, name: String },
    /// Described by the backend; bytes are fetched only when a download is requested.
    Remote { server_id: RemoteFileId, name: String },
}

impl AttachmentRef {
    pub fn name(&self) -> &str {
        match self {
            Self::Local { name, .. } | Self::Remote { name, .. } => name,
        }
    }

    pub fn is_local(&self) -> bool {
        matches!(self, Self::Local { .. })
    }

    pub fn handle(&self) -> Option<&FileHandle> {
        match self {
            Self::Local { handle, .. } => Some(handle),
            Self::Remote { .. } => None,
        }
    }
}

/// One appended transcript entry. The store never hands out mutable access.
#[derive(Debug, PartialEq, Eq)]
pub struct TranscriptMessage {
    pub id: MessageId,
    pub sender: Sender,
    pub content: String,
    pub attachments: Vec<AttachmentRef>,
    pub created_at_unix_millis: u64,
    /// User message this entry answers, set for send replies and failure notices.
    pub in_reply_to: Option<MessageId>,
}

/// Input for `TranscriptStore::append`; the store assigns id and timestamp.
#[derive(Debug, PartialEq, Eq)]
pub struct NewMessage {
    pub sender: Sender,
    pub content: String,
    pub attachments: Vec<AttachmentRef>,
    pub in_reply_to: Option<MessageId>,
}

impl NewMessage {
    pub fn new(sender: Sender, content: impl Into<String>) -> Self {
        Self {
            sender,
            content: content.into(),
            attachments: Vec::new(),
            in_reply_to: None,
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self::new(Sender::User, content)
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self::new(Sender::Assistant, content)
    }

    pub fn system(content: impl Into<String>) -> Self {
        Self::new(Sender::System, content)
    }

    pub fn with_attachments(mut self, attachments: Vec<AttachmentRef>) -> Self {
        self.attachments = attachments;
        self
    }

    pub fn in_reply_to(mut self, message_id: MessageId) -> Self {
        self.in_reply_to = Some(message_id);
        self
    }
}

/// Addresses one attachment inside the transcript.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct AttachmentLocator {
    pub message_id: MessageId,
    pub index: usize,
}

impl AttachmentLocator {
    pub const fn new(message_id: MessageId, index: usize) -> Self {
        Self { message_id, index }
    }
}

pub(crate) fn current_unix_timestamp_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|duration| duration.as_millis() as u64)
        .unwrap_or(0)
}
