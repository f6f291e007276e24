use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use snafu::Snafu;

use super::ids::{RemoteFileId, RequestId};
use super::registry::ObjectView;
use super::types::RawFile;

pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;
pub type CollaboratorResult<T> = Result<T, CollaboratorError>;

/// Failure reported by an external collaborator.
///
/// The session only records which collaborator failed and its message; it never branches on the
/// underlying cause.
#[derive(Debug, Snafu)]
#[snafu(visibility(pub))]
pub enum CollaboratorError {
    #[snafu(display("send collaborator failed: {message}"))]
    Sending { message: String },
    #[snafu(display("download collaborator failed: {message}"))]
    Fetching { message: String },
    #[snafu(display("save action failed: {message}"))]
    Saving { message: String },
}

/// Outgoing message handed to the backend.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SendRequest {
    pub request_id: RequestId,
    pub text: String,
    pub files: Vec<RawFile>,
    pub scene: String,
}

/// File descriptor returned by the backend alongside a reply.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteFile {
    pub id: RemoteFileId,
    pub name: String,
}

impl RemoteFile {
    pub fn new(id: impl Into<RemoteFileId>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct SendReply {
    pub content: String,
    pub files: Vec<RemoteFile>,
}

impl SendReply {
    pub fn new(content: impl Into<String>, files: Vec<RemoteFile>) -> Self {
        Self {
            content: content.into(),
            files,
        }
    }
}

/// Bytes fetched for a remote attachment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchedFile {
    pub bytes: Vec<u8>,
    pub mime_type: Option<String>,
}

pub trait SendCollaborator: Send + Sync {
    fn send(&self, request: SendRequest) -> BoxFuture<'static, CollaboratorResult<SendReply>>;
}

pub trait DownloadCollaborator: Send + Sync {
    fn fetch(&self, file_id: &RemoteFileId) -> BoxFuture<'static, CollaboratorResult<FetchedFile>>;
}

/// Hands a live object to the user, e.g. by writing it to the download directory.
pub trait SaveAction: Send + Sync {
    fn trigger(&self, object: ObjectView<'_>, suggested_name: &str) -> CollaboratorResult<()>;
}

/// External collaborators injected into a chat session at construction.
#[derive(Clone)]
pub struct Collaborators {
    pub sender: Arc<dyn SendCollaborator>,
    pub downloader: Arc<dyn DownloadCollaborator>,
    pub saver: Arc<dyn SaveAction>,
}

impl Collaborators {
    pub fn new(
        sender: Arc<dyn SendCollaborator>,
        downloader: Arc<dyn DownloadCollaborator>,
        saver: Arc<dyn SaveAction>,
    ) -> Self {
        Self {
            sender,
            downloader,
            saver,
        }
    }
}
