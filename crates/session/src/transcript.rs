use snafu::OptionExt;

use super::error::{SessionResult, UnknownAttachmentSnafu, UnknownMessageSnafu};
use super::ids::MessageId;
use super::registry::ObjectUrlRegistry;
use super::types::{
    AttachmentLocator, AttachmentRef, NewMessage, TranscriptMessage,
    current_unix_timestamp_millis,
};

/// Append-only message log for one chat session.
#[derive(Debug, Default)]
pub struct TranscriptStore {
    messages: Vec<TranscriptMessage>,
    next_id: u64,
}

impl TranscriptStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends in insertion order and assigns a session-unique id.
    ///
    /// Empty content with no attachments is accepted; system notices use it.
    pub fn append(&mut self, input: NewMessage) -> &TranscriptMessage {
        self.next_id += 1;
        let message = TranscriptMessage {
            id: MessageId::new(self.next_id),
            sender: input.sender,
            content: input.content,
            attachments: input.attachments,
            created_at_unix_millis: current_unix_timestamp_millis(),
            in_reply_to: input.in_reply_to,
        };
        tracing::debug!(
            message_id = %message.id,
            sender = message.sender.label(),
            attachments = message.attachments.len(),
            "appended transcript message"
        );

        self.messages.push(message);
        let index = self.messages.len() - 1;
        &self.messages[index]
    }

    pub fn all(&self) -> &[TranscriptMessage] {
        &self.messages
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    pub fn last(&self) -> Option<&TranscriptMessage> {
        self.messages.last()
    }

    pub fn get(&self, message_id: MessageId) -> Option<&TranscriptMessage> {
        // Ids are assigned in append order, so the search can bisect.
        self.messages
            .binary_search_by_key(&message_id, |message| message.id)
            .ok()
            .map(|index| &self.messages[index])
    }

    pub fn attachment(&self, locator: AttachmentLocator) -> SessionResult<&AttachmentRef> {
        let message = self.get(locator.message_id).context(UnknownMessageSnafu {
            stage: "transcript-attachment-message",
            message_id: locator.message_id,
        })?;

        message
            .attachments
            .get(locator.index)
            .context(UnknownAttachmentSnafu {
                stage: "transcript-attachment-index",
                message_id: locator.message_id,
                index: locator.index,
            })
    }

    /// Releases the handle of every `Local` attachment. Safe to call repeatedly.
    ///
    /// Returns how many handles were still live.
    pub fn release_all_local_handles(&self, registry: &mut ObjectUrlRegistry) -> usize {
        self.messages
            .iter()
            .flat_map(|message| message.attachments.iter())
            .filter_map(AttachmentRef::handle)
            .filter(|handle| registry.release(handle))
            .count()
    }
}
