//! Attachment lifecycle core for a scene-based chat client.
//!
//! Every object URL handed to the view layer is minted by one [`ObjectUrlRegistry`] and has a
//! single owner at any time: the [`AttachmentStagingList`] before a send, a
//! [`TranscriptMessage`] after it, or a transient download scope.
//! [`AttachmentLifecycleCoordinator`] moves handles between those owners and releases all of
//! them when the session is torn down.

pub mod collaborator;
pub mod coordinator;
pub mod error;
pub mod ids;
pub mod registry;
pub mod scene;
pub mod staging;
pub mod transcript;
pub mod types;

pub use collaborator::{
    BoxFuture, CollaboratorError, CollaboratorResult, Collaborators, DownloadCollaborator,
    FetchedFile, RemoteFile, SaveAction, SendCollaborator, SendReply, SendRequest,
};
pub use coordinator::{
    AttachmentLifecycleCoordinator, DownloadStart, EMPTY_REPLY_NOTICE, PendingDownload,
    PendingSend, SEND_FAILURE_NOTICE, SendOutcome, SendTicket, TeardownReport,
};
pub use error::{SessionError, SessionResult};
pub use ids::{HandleId, MessageId, RemoteFileId, RequestId};
pub use registry::{OBJECT_URL_PREFIX, ObjectUrlRegistry, ObjectView};
pub use scene::{
    DEFAULT_WELCOME_MESSAGE, PROJECT_HANDOVER_SCENE_ID, PROJECT_HANDOVER_WELCOME_MESSAGE, Scene,
    UNKNOWN_SCENE_TITLE, find_scene, scene_catalog, scene_title, welcome_message,
};
pub use staging::{AttachmentStagingList, ClearMode, DrainedDraft, DrainedFile};
pub use transcript::TranscriptStore;
pub use types::{
    AttachmentLocator, AttachmentRef, FALLBACK_MIME_TYPE, FileHandle, NewMessage, RawFile,
    Sender, StagedAttachment, TranscriptMessage,
};
