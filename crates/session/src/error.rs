use snafu::Snafu;

use super::collaborator::CollaboratorError;
use super::ids::{HandleId, MessageId, RequestId};

#[derive(Debug, Snafu)]
#[snafu(visibility(pub(crate)))]
pub enum SessionError {
    #[snafu(display("index {index} is out of range for {len} staged attachment(s)"))]
    InvalidIndex {
        stage: &'static str,
        index: usize,
        len: usize,
    },
    #[snafu(display("handle '{handle_id}' was released or never minted"))]
    StaleHandle {
        stage: &'static str,
        handle_id: HandleId,
    },
    #[snafu(display("message {message_id} is not in the transcript"))]
    UnknownMessage {
        stage: &'static str,
        message_id: MessageId,
    },
    #[snafu(display("message {message_id} has no attachment at index {index}"))]
    UnknownAttachment {
        stage: &'static str,
        message_id: MessageId,
        index: usize,
    },
    #[snafu(display("nothing to send: the draft is empty and no files are staged"))]
    NothingToSend { stage: &'static str },
    #[snafu(display("send request {request_id} is not in flight"))]
    UnknownRequest {
        stage: &'static str,
        request_id: RequestId,
    },
    #[snafu(display("chat session for scene '{scene}' has already been torn down"))]
    SessionClosed { stage: &'static str, scene: String },
    #[snafu(display("failed to download '{name}' on `{stage}`: {source}"))]
    DownloadFailed {
        stage: &'static str,
        name: String,
        source: CollaboratorError,
    },
    #[snafu(display("failed to save '{name}' on `{stage}`: {source}"))]
    SaveFailed {
        stage: &'static str,
        name: String,
        source: CollaboratorError,
    },
    #[snafu(display("id '{raw}' is invalid for {id_type}"))]
    InvalidId {
        stage: &'static str,
        id_type: &'static str,
        raw: String,
        source: uuid::Error,
    },
}

pub type SessionResult<T> = Result<T, SessionError>;
