use std::collections::HashMap;

use snafu::{OptionExt, ResultExt, ensure};

use super::collaborator::{
    BoxFuture, CollaboratorError, CollaboratorResult, Collaborators, FetchedFile, SendReply,
    SendRequest,
};
use super::error::{
    DownloadFailedSnafu, NothingToSendSnafu, SaveFailedSnafu, SessionClosedSnafu, SessionResult,
    UnknownRequestSnafu,
};
use super::ids::{MessageId, RemoteFileId, RequestId};
use super::registry::ObjectUrlRegistry;
use super::scene::{scene_title, welcome_message};
use super::staging::{AttachmentStagingList, ClearMode, DrainedDraft, DrainedFile};
use super::transcript::TranscriptStore;
use super::types::{AttachmentLocator, AttachmentRef, NewMessage, RawFile};

/// Appended as a system message when the backend rejects a send.
pub const SEND_FAILURE_NOTICE: &str = "Failed to send the message, please try again.";
/// Shown in place of an assistant reply that carried no text.
pub const EMPTY_REPLY_NOTICE: &str = "The assistant returned no content.";

/// Correlates one send with its reply.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SendTicket {
    pub request_id: RequestId,
    pub user_message_id: MessageId,
}

/// A send whose user message is already in the transcript and whose reply is still pending.
pub struct PendingSend {
    pub ticket: SendTicket,
    pub reply: BoxFuture<'static, CollaboratorResult<SendReply>>,
}

#[derive(Debug)]
pub enum SendOutcome {
    Delivered {
        ticket: SendTicket,
        assistant_message_id: MessageId,
    },
    /// The failure was absorbed into a system notice; the user message stays in place.
    Failed {
        ticket: SendTicket,
        notice_message_id: MessageId,
        error: CollaboratorError,
    },
}

impl SendOutcome {
    pub fn ticket(&self) -> SendTicket {
        match self {
            Self::Delivered { ticket, .. } | Self::Failed { ticket, .. } => *ticket,
        }
    }

    pub fn is_delivered(&self) -> bool {
        matches!(self, Self::Delivered { .. })
    }
}

pub struct PendingDownload {
    pub server_id: RemoteFileId,
    pub name: String,
    pub fetch: BoxFuture<'static, CollaboratorResult<FetchedFile>>,
}

pub enum DownloadStart {
    /// A local attachment was saved straight from its live handle.
    Saved { name: String },
    /// A remote attachment needs its bytes fetched first.
    Pending(PendingDownload),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct TeardownReport {
    pub transcript_released: usize,
    pub staged_released: usize,
    pub stray_released: usize,
    pub abandoned_sends: usize,
}

impl TeardownReport {
    pub fn handles_released(&self) -> usize {
        self.transcript_released + self.staged_released + self.stray_released
    }
}

/// Owns every handle of one chat session and enforces that each is released exactly once.
///
/// All mutation happens through `&mut self`, so a session is confined to the task that owns it.
/// Network round trips are split into `begin_*` / `complete_*` pairs; the futures in between
/// borrow nothing from the session and can be spawned.
pub struct AttachmentLifecycleCoordinator {
    scene: String,
    registry: ObjectUrlRegistry,
    staging: AttachmentStagingList,
    transcript: TranscriptStore,
    collaborators: Collaborators,
    in_flight: HashMap<RequestId, MessageId>,
    next_request_id: u64,
    torn_down: bool,
}

impl AttachmentLifecycleCoordinator {
    /// Opens a session for `scene` and greets the user with the scene's welcome message.
    pub fn new(scene: impl Into<String>, collaborators: Collaborators) -> Self {
        let scene = scene.into();
        let mut transcript = TranscriptStore::new();
        transcript.append(NewMessage::assistant(welcome_message(&scene)));
        tracing::info!(scene = %scene, "chat session opened");

        Self {
            scene,
            registry: ObjectUrlRegistry::new(),
            staging: AttachmentStagingList::new(),
            transcript,
            collaborators,
            in_flight: HashMap::new(),
            next_request_id: 0,
            torn_down: false,
        }
    }

    pub fn scene(&self) -> &str {
        &self.scene
    }

    pub fn scene_title(&self) -> &'static str {
        scene_title(&self.scene)
    }

    pub fn transcript(&self) -> &TranscriptStore {
        &self.transcript
    }

    pub fn staging(&self) -> &AttachmentStagingList {
        &self.staging
    }

    pub fn registry(&self) -> &ObjectUrlRegistry {
        &self.registry
    }

    pub fn live_handle_count(&self) -> usize {
        self.registry.live_count()
    }

    pub fn in_flight_count(&self) -> usize {
        self.in_flight.len()
    }

    pub fn is_torn_down(&self) -> bool {
        self.torn_down
    }

    pub fn set_draft(&mut self, text: impl Into<String>) {
        self.staging.set_draft(text);
    }

    pub fn stage_files(
        &mut self,
        files: impl IntoIterator<Item = RawFile>,
    ) -> SessionResult<usize> {
        self.ensure_open("stage-files")?;
        Ok(self.staging.add(&mut self.registry, files).len())
    }

    pub fn remove_staged(&mut self, index: usize) -> SessionResult<RawFile> {
        self.ensure_open("remove-staged")?;
        self.staging
            .remove_at(&mut self.registry, index)
            .inspect_err(|error| tracing::debug!(%error, "ignored staged attachment removal"))
    }

    /// Drops every staged file and releases their handles. Returns how many were dropped.
    pub fn cancel_staged(&mut self) -> usize {
        let dropped = self.staging.len();
        self.staging.clear(&mut self.registry, ClearMode::ReleaseHandles);
        dropped
    }

    /// Saves a staged file through its live handle without releasing it.
    pub fn download_staged(&self, index: usize) -> SessionResult<()> {
        self.ensure_open("download-staged")?;
        let staged = self.staging.get(index)?;
        let object = self.registry.resolve(staged.handle())?;
        self.collaborators
            .saver
            .trigger(object, staged.name())
            .context(SaveFailedSnafu {
                stage: "download-staged",
                name: staged.name(),
            })
    }

    /// Moves the composer into a user message and issues the send.
    ///
    /// The user message is appended before the request leaves, so transcript order follows
    /// submission order regardless of when replies arrive.
    pub fn begin_send(&mut self) -> SessionResult<PendingSend> {
        self.ensure_open("begin-send")?;
        ensure!(
            self.staging.has_content(),
            NothingToSendSnafu {
                stage: "begin-send"
            }
        );

        let DrainedDraft { text, files } = self.staging.drain_for_send();
        let text = text.trim().to_string();
        let mut outgoing = Vec::with_capacity(files.len());
        let mut attachments = Vec::with_capacity(files.len());
        for DrainedFile { file, handle, name } in files {
            outgoing.push(file);
            attachments.push(AttachmentRef::Local { handle, name });
        }

        let user_message_id = self
            .transcript
            .append(NewMessage::user(text.clone()).with_attachments(attachments))
            .id;

        self.next_request_id += 1;
        let request_id = RequestId::new(self.next_request_id);
        self.in_flight.insert(request_id, user_message_id);
        tracing::info!(
            request = %request_id,
            message_id = %user_message_id,
            files = outgoing.len(),
            "sending message"
        );

        let reply = self.collaborators.sender.send(SendRequest {
            request_id,
            text,
            files: outgoing,
            scene: self.scene.clone(),
        });

        Ok(PendingSend {
            ticket: SendTicket {
                request_id,
                user_message_id,
            },
            reply,
        })
    }

    /// Records the reply to a send. A rejected send becomes a system notice and is not retried.
    pub fn complete_send(
        &mut self,
        ticket: SendTicket,
        result: CollaboratorResult<SendReply>,
    ) -> SessionResult<SendOutcome> {
        self.ensure_open("complete-send")?;
        let user_message_id =
            self.in_flight
                .remove(&ticket.request_id)
                .context(UnknownRequestSnafu {
                    stage: "complete-send",
                    request_id: ticket.request_id,
                })?;
        let ticket = SendTicket {
            request_id: ticket.request_id,
            user_message_id,
        };

        match result {
            Ok(reply) => {
                let content = if reply.content.is_empty() {
                    EMPTY_REPLY_NOTICE.to_string()
                } else {
                    reply.content
                };
                let attachments = reply
                    .files
                    .into_iter()
                    .map(|file| AttachmentRef::Remote {
                        server_id: file.id,
                        name: file.name,
                    })
                    .collect::<Vec<_>>();
                let remote_files = attachments.len();

                let assistant_message_id = self
                    .transcript
                    .append(
                        NewMessage::assistant(content)
                            .with_attachments(attachments)
                            .in_reply_to(user_message_id),
                    )
                    .id;
                tracing::info!(
                    request = %ticket.request_id,
                    message_id = %assistant_message_id,
                    remote_files,
                    "assistant replied"
                );

                Ok(SendOutcome::Delivered {
                    ticket,
                    assistant_message_id,
                })
            }
            Err(error) => {
                tracing::warn!(request = %ticket.request_id, %error, "send failed");
                let notice_message_id = self
                    .transcript
                    .append(NewMessage::system(SEND_FAILURE_NOTICE).in_reply_to(user_message_id))
                    .id;

                Ok(SendOutcome::Failed {
                    ticket,
                    notice_message_id,
                    error,
                })
            }
        }
    }

    /// Sends `text` together with whatever is staged and waits for the reply in place.
    pub async fn on_send(&mut self, text: impl Into<String>) -> SessionResult<SendOutcome> {
        self.staging.set_draft(text);
        let PendingSend { ticket, reply } = self.begin_send()?;
        let result = reply.await;
        self.complete_send(ticket, result)
    }

    pub fn begin_download(&self, locator: AttachmentLocator) -> SessionResult<DownloadStart> {
        self.ensure_open("begin-download")?;

        match self.transcript.attachment(locator)? {
            AttachmentRef::Local { handle, name } => {
                let object = self.registry.resolve(handle)?;
                self.collaborators
                    .saver
                    .trigger(object, name)
                    .context(SaveFailedSnafu {
                        stage: "download-local",
                        name,
                    })?;
                Ok(DownloadStart::Saved { name: name.clone() })
            }
            AttachmentRef::Remote { server_id, name } => {
                tracing::debug!(file = %server_id, "fetching remote attachment");
                Ok(DownloadStart::Pending(PendingDownload {
                    server_id: server_id.clone(),
                    name: name.clone(),
                    fetch: self.collaborators.downloader.fetch(server_id),
                }))
            }
        }
    }

    /// Saves fetched bytes through a transient handle that lives only for the save itself.
    ///
    /// A failed fetch is reported and leaves the transcript untouched.
    pub fn complete_download(
        &mut self,
        name: &str,
        result: CollaboratorResult<FetchedFile>,
    ) -> SessionResult<()> {
        self.ensure_open("complete-download")?;
        let fetched = result
            .context(DownloadFailedSnafu {
                stage: "complete-download-fetch",
                name,
            })
            .inspect_err(|error| tracing::warn!(%error, "download failed"))?;

        let file = RawFile::new(name, fetched.mime_type.unwrap_or_default(), fetched.bytes);
        let handle = self.registry.mint(&file);
        let saved = self
            .registry
            .resolve(&handle)
            .map(|object| self.collaborators.saver.trigger(object, name));
        self.registry.release(&handle);

        saved?.context(SaveFailedSnafu {
            stage: "complete-download-save",
            name,
        })
    }

    pub async fn on_download_request(&mut self, locator: AttachmentLocator) -> SessionResult<()> {
        match self.begin_download(locator)? {
            DownloadStart::Saved { .. } => Ok(()),
            DownloadStart::Pending(PendingDownload { name, fetch, .. }) => {
                let result = fetch.await;
                self.complete_download(&name, result)
            }
        }
    }

    /// Releases every handle the session still owns. Only the first call does any work.
    pub fn on_teardown(&mut self) -> TeardownReport {
        if self.torn_down {
            tracing::debug!(scene = %self.scene, "chat session already torn down");
            return TeardownReport::default();
        }
        self.torn_down = true;

        let transcript_released = self.transcript.release_all_local_handles(&mut self.registry);
        let staged_released = self.staging.len();
        self.staging.clear(&mut self.registry, ClearMode::ReleaseHandles);
        self.staging.set_draft(String::new());

        let stray_released = self.registry.release_all();
        if stray_released > 0 {
            tracing::warn!(stray_released, "released handles with no owner at teardown");
        }

        let abandoned_sends = self.in_flight.len();
        self.in_flight.clear();

        let report = TeardownReport {
            transcript_released,
            staged_released,
            stray_released,
            abandoned_sends,
        };
        tracing::info!(
            scene = %self.scene,
            released = report.handles_released(),
            abandoned_sends,
            "chat session torn down"
        );
        report
    }

    fn ensure_open(&self, stage: &'static str) -> SessionResult<()> {
        ensure!(
            !self.torn_down,
            SessionClosedSnafu {
                stage,
                scene: self.scene.as_str(),
            }
        );
        Ok(())
    }
}

impl Drop for AttachmentLifecycleCoordinator {
    fn drop(&mut self) {
        self.on_teardown();
    }
}

#[cfg(test)]
mod tests {
    use std::sync::{Arc, Mutex};

    use super::*;
    use crate::collaborator::{
        DownloadCollaborator, FetchingSnafu, RemoteFile, SaveAction, SendCollaborator, SendingSnafu,
    };
    use crate::error::SessionError;
    use crate::registry::ObjectView;
    use crate::scene::PROJECT_HANDOVER_WELCOME_MESSAGE;
    use crate::types::Sender;

    #[derive(Default)]
    struct FakeSender {
        reply: Option<SendReply>,
        requests: Mutex<Vec<SendRequest>>,
    }

    impl FakeSender {
        fn replying(reply: SendReply) -> Arc<Self> {
            Arc::new(Self {
                reply: Some(reply),
                requests: Mutex::default(),
            })
        }

        fn rejecting() -> Arc<Self> {
            Arc::new(Self::default())
        }

        fn requests(&self) -> Vec<SendRequest> {
            self.requests.lock().expect("requests lock").clone()
        }
    }

    impl SendCollaborator for FakeSender {
        fn send(&self, request: SendRequest) -> BoxFuture<'static, CollaboratorResult<SendReply>> {
            self.requests.lock().expect("requests lock").push(request);
            let reply = self.reply.clone();
            Box::pin(async move {
                reply.ok_or_else(|| {
                    SendingSnafu {
                        message: "backend unavailable",
                    }
                    .build()
                })
            })
        }
    }

    #[derive(Default)]
    struct FakeDownloader {
        bytes: Option<Vec<u8>>,
        fetched: Mutex<Vec<RemoteFileId>>,
    }

    impl FakeDownloader {
        fn serving(bytes: &[u8]) -> Arc<Self> {
            Arc::new(Self {
                bytes: Some(bytes.to_vec()),
                fetched: Mutex::default(),
            })
        }

        fn failing() -> Arc<Self> {
            Arc::new(Self::default())
        }

        fn fetch_count(&self) -> usize {
            self.fetched.lock().expect("fetched lock").len()
        }
    }

    impl DownloadCollaborator for FakeDownloader {
        fn fetch(
            &self,
            file_id: &RemoteFileId,
        ) -> BoxFuture<'static, CollaboratorResult<FetchedFile>> {
            self.fetched.lock().expect("fetched lock").push(file_id.clone());
            let bytes = self.bytes.clone();
            Box::pin(async move {
                bytes
                    .map(|bytes| FetchedFile {
                        bytes,
                        mime_type: Some("text/markdown".to_string()),
                    })
                    .ok_or_else(|| {
                        FetchingSnafu {
                            message: "404 not found",
                        }
                        .build()
                    })
            })
        }
    }

    #[derive(Debug, Clone, PartialEq, Eq)]
    struct SavedCall {
        name: String,
        bytes: Vec<u8>,
        url: String,
    }

    #[derive(Default)]
    struct RecordingSaver {
        saved: Mutex<Vec<SavedCall>>,
    }

    impl RecordingSaver {
        fn saved(&self) -> Vec<SavedCall> {
            self.saved.lock().expect("saved lock").clone()
        }
    }

    impl SaveAction for RecordingSaver {
        fn trigger(&self, object: ObjectView<'_>, suggested_name: &str) -> CollaboratorResult<()> {
            self.saved.lock().expect("saved lock").push(SavedCall {
                name: suggested_name.to_string(),
                bytes: object.bytes.to_vec(),
                url: object.url.to_string(),
            });
            Ok(())
        }
    }

    struct Harness {
        sender: Arc<FakeSender>,
        downloader: Arc<FakeDownloader>,
        saver: Arc<RecordingSaver>,
    }

    impl Harness {
        fn new(sender: Arc<FakeSender>, downloader: Arc<FakeDownloader>) -> Self {
            Self {
                sender,
                downloader,
                saver: Arc::new(RecordingSaver::default()),
            }
        }

        fn session(&self, scene: &str) -> AttachmentLifecycleCoordinator {
            AttachmentLifecycleCoordinator::new(
                scene,
                Collaborators::new(
                    self.sender.clone(),
                    self.downloader.clone(),
                    self.saver.clone(),
                ),
            )
        }
    }

    fn file(name: &str, body: &[u8]) -> RawFile {
        RawFile::new(name, "text/plain", body.to_vec())
    }

    #[test]
    fn new_session_starts_with_scene_welcome() {
        let harness = Harness::new(FakeSender::rejecting(), FakeDownloader::failing());
        let session = harness.session("project-handover");

        let messages = session.transcript().all();
        assert_eq!(messages.len(), 1);
        assert_eq!(messages[0].sender, Sender::Assistant);
        assert_eq!(messages[0].content, PROJECT_HANDOVER_WELCOME_MESSAGE);
        assert_eq!(session.scene_title(), "Project handover");
    }

    #[tokio::test]
    async fn text_only_send_appends_user_then_assistant() {
        let harness = Harness::new(
            FakeSender::replying(SendReply::new("hi", Vec::new())),
            FakeDownloader::failing(),
        );
        let mut session = harness.session("project-handover");

        let outcome = session.on_send("hello").await.expect("send completes");

        let messages = session.transcript().all();
        assert_eq!(messages.len(), 3);
        assert_eq!(messages[1].sender, Sender::User);
        assert_eq!(messages[1].content, "hello");
        assert!(messages[1].attachments.is_empty());
        assert_eq!(messages[2].sender, Sender::Assistant);
        assert_eq!(messages[2].content, "hi");
        assert_eq!(messages[2].in_reply_to, Some(messages[1].id));
        assert!(outcome.is_delivered());

        let requests = harness.sender.requests();
        assert_eq!(requests.len(), 1);
        assert_eq!(requests[0].text, "hello");
        assert_eq!(requests[0].scene, "project-handover");
    }

    #[tokio::test]
    async fn rejected_send_appends_one_failure_notice_and_keeps_user_message() {
        let harness = Harness::new(FakeSender::rejecting(), FakeDownloader::failing());
        let mut session = harness.session("project-handover");
        session
            .stage_files([file("brief.txt", b"draft")])
            .expect("session open");

        let outcome = session.on_send("hello").await.expect("failure is absorbed");

        let messages = session.transcript().all();
        assert_eq!(messages.len(), 3);
        assert_eq!(messages[1].sender, Sender::User);
        assert_eq!(messages[1].content, "hello");
        assert_eq!(messages[1].attachments.len(), 1);
        assert_eq!(messages[2].sender, Sender::System);
        assert_eq!(messages[2].content, SEND_FAILURE_NOTICE);
        let system_count = messages
            .iter()
            .filter(|message| message.sender == Sender::System)
            .count();
        assert_eq!(system_count, 1);
        assert!(matches!(
            outcome,
            SendOutcome::Failed {
                error: CollaboratorError::Sending { .. },
                ..
            }
        ));
        // The user's local copy survives the failed send.
        assert_eq!(session.live_handle_count(), 1);
    }

    #[tokio::test]
    async fn staged_handles_move_into_the_user_message_and_release_once() {
        let harness = Harness::new(
            FakeSender::replying(SendReply::new("got them", Vec::new())),
            FakeDownloader::failing(),
        );
        let mut session = harness.session("project-handover");
        session
            .stage_files([file("a.txt", b"alpha"), file("b.txt", b"beta")])
            .expect("session open");

        session.on_send("  two files  ").await.expect("send completes");

        assert!(session.staging().is_empty());
        assert_eq!(session.live_handle_count(), 2);
        let user_message = &session.transcript().all()[1];
        assert_eq!(user_message.content, "two files");
        assert!(
            user_message
                .attachments
                .iter()
                .all(|attachment| attachment.is_local())
        );

        let requests = harness.sender.requests();
        let sent = requests[0]
            .files
            .iter()
            .map(|file| (file.name.as_str(), file.bytes.to_vec()))
            .collect::<Vec<_>>();
        assert_eq!(
            sent,
            [("a.txt", b"alpha".to_vec()), ("b.txt", b"beta".to_vec())]
        );

        let report = session.on_teardown();
        assert_eq!(report.transcript_released, 2);
        assert_eq!(report.stray_released, 0);
        assert_eq!(session.live_handle_count(), 0);
    }

    #[tokio::test]
    async fn teardown_leaves_no_live_handles_and_runs_once() {
        let harness = Harness::new(
            FakeSender::replying(SendReply::new(
                "summary attached",
                vec![RemoteFile::new("srv-1", "summary.md")],
            )),
            FakeDownloader::serving(b"# summary"),
        );
        let mut session = harness.session("project-handover");
        session
            .stage_files([file("a.txt", b"alpha")])
            .expect("session open");
        session.on_send("first").await.expect("send completes");
        let assistant_id = session.transcript().all()[2].id;
        session
            .on_download_request(AttachmentLocator::new(assistant_id, 0))
            .await
            .expect("download succeeds");
        session
            .stage_files([file("b.txt", b"beta"), file("c.txt", b"gamma")])
            .expect("session open");
        assert_eq!(session.live_handle_count(), 3);

        let report = session.on_teardown();

        assert_eq!(session.live_handle_count(), 0);
        assert_eq!(report.transcript_released, 1);
        assert_eq!(report.staged_released, 2);
        assert_eq!(session.on_teardown(), TeardownReport::default());
        assert!(session.is_torn_down());
    }

    #[tokio::test]
    async fn remote_download_mints_and_releases_a_transient_handle() {
        let harness = Harness::new(
            FakeSender::replying(SendReply::new(
                "done",
                vec![RemoteFile::new("srv-9", "handover.md")],
            )),
            FakeDownloader::serving(b"# handover"),
        );
        let mut session = harness.session("project-handover");
        session.on_send("summarise").await.expect("send completes");
        let assistant = &session.transcript().all()[2];
        assert!(!assistant.attachments[0].is_local());
        let locator = AttachmentLocator::new(assistant.id, 0);
        let live_before = session.live_handle_count();
        let minted_before = session.registry().minted_total();

        session
            .on_download_request(locator)
            .await
            .expect("download succeeds");

        assert_eq!(harness.downloader.fetch_count(), 1);
        let saved = harness.saver.saved();
        assert_eq!(saved.len(), 1);
        assert_eq!(saved[0].name, "handover.md");
        assert_eq!(saved[0].bytes, b"# handover");
        assert_eq!(session.live_handle_count(), live_before);
        assert_eq!(session.registry().minted_total(), minted_before + 1);
    }

    #[tokio::test]
    async fn failed_remote_download_changes_nothing() {
        let harness = Harness::new(
            FakeSender::replying(SendReply::new(
                "done",
                vec![RemoteFile::new("srv-9", "handover.md")],
            )),
            FakeDownloader::failing(),
        );
        let mut session = harness.session("project-handover");
        session.on_send("summarise").await.expect("send completes");
        let assistant_id = session.transcript().all()[2].id;
        let transcript_len = session.transcript().len();

        let error = session
            .on_download_request(AttachmentLocator::new(assistant_id, 0))
            .await
            .expect_err("fetch rejects");

        assert!(matches!(error, SessionError::DownloadFailed { .. }));
        assert_eq!(session.transcript().len(), transcript_len);
        assert_eq!(session.live_handle_count(), 0);
        assert!(harness.saver.saved().is_empty());
    }

    #[tokio::test]
    async fn local_download_uses_the_live_handle() {
        let harness = Harness::new(
            FakeSender::replying(SendReply::new("ok", Vec::new())),
            FakeDownloader::failing(),
        );
        let mut session = harness.session("project-handover");
        session
            .stage_files([file("notes.txt", b"local bytes")])
            .expect("session open");
        session.on_send("").await.expect("files alone are sendable");
        let user_message = &session.transcript().all()[1];
        let expected_url = user_message.attachments[0]
            .handle()
            .map(|handle| handle.url().to_string());
        let locator = AttachmentLocator::new(user_message.id, 0);

        session
            .on_download_request(locator)
            .await
            .expect("local save succeeds");

        let saved = harness.saver.saved();
        assert_eq!(saved.len(), 1);
        assert_eq!(saved[0].bytes, b"local bytes");
        assert_eq!(Some(saved[0].url.clone()), expected_url);
        assert_eq!(harness.downloader.fetch_count(), 0);
        assert_eq!(session.live_handle_count(), 1);
    }

    #[test]
    fn staged_files_can_be_saved_and_removed() {
        let harness = Harness::new(FakeSender::rejecting(), FakeDownloader::failing());
        let mut session = harness.session("scene-2");
        session
            .stage_files([file("a.txt", b"alpha"), file("b.txt", b"beta")])
            .expect("session open");

        session.download_staged(1).expect("in range");
        assert_eq!(harness.saver.saved()[0].name, "b.txt");
        assert_eq!(session.live_handle_count(), 2);

        let error = session.remove_staged(7).expect_err("out of range");
        assert!(matches!(error, SessionError::InvalidIndex { index: 7, .. }));
        assert_eq!(session.staging().len(), 2);
        assert_eq!(session.live_handle_count(), 2);

        let removed = session.remove_staged(0).expect("in range");
        assert_eq!(removed.name, "a.txt");
        assert_eq!(session.live_handle_count(), 1);

        assert_eq!(session.cancel_staged(), 1);
        assert_eq!(session.live_handle_count(), 0);
    }

    #[test]
    fn blank_draft_without_files_is_not_sent() {
        let harness = Harness::new(FakeSender::rejecting(), FakeDownloader::failing());
        let mut session = harness.session("project-handover");
        session.set_draft("   ");

        let error = session.begin_send().err().expect("nothing to send");

        assert!(matches!(error, SessionError::NothingToSend { .. }));
        assert_eq!(session.transcript().len(), 1);
        assert!(harness.sender.requests().is_empty());
    }

    #[tokio::test]
    async fn overlapping_sends_are_correlated_by_ticket() {
        let harness = Harness::new(
            FakeSender::replying(SendReply::new("reply", Vec::new())),
            FakeDownloader::failing(),
        );
        let mut session = harness.session("project-handover");

        session.set_draft("first");
        let first = session.begin_send().expect("first send");
        session.set_draft("second");
        let second = session.begin_send().expect("second send");
        assert_eq!(session.in_flight_count(), 2);

        let second_ticket = second.ticket;
        let second_reply = second.reply.await;
        session
            .complete_send(second_ticket, second_reply)
            .expect("second completes");
        let first_ticket = first.ticket;
        let first_reply = first.reply.await;
        session
            .complete_send(first_ticket, first_reply)
            .expect("first completes");

        let messages = session.transcript().all();
        assert_eq!(messages[1].content, "first");
        assert_eq!(messages[2].content, "second");
        assert_eq!(messages[3].in_reply_to, Some(second_ticket.user_message_id));
        assert_eq!(messages[4].in_reply_to, Some(first_ticket.user_message_id));

        let replayed = session.complete_send(first_ticket, Ok(SendReply::default()));
        assert!(matches!(
            replayed,
            Err(SessionError::UnknownRequest { .. })
        ));
    }

    #[tokio::test]
    async fn replies_after_teardown_are_dropped() {
        let harness = Harness::new(
            FakeSender::replying(SendReply::new("late", Vec::new())),
            FakeDownloader::failing(),
        );
        let mut session = harness.session("project-handover");
        session.set_draft("hello");
        let pending = session.begin_send().expect("send issued");

        let report = session.on_teardown();
        assert_eq!(report.abandoned_sends, 1);

        let reply = pending.reply.await;
        let result = session.complete_send(pending.ticket, reply);
        assert!(matches!(result, Err(SessionError::SessionClosed { .. })));
        assert_eq!(session.transcript().len(), 2);
        assert!(matches!(
            session.stage_files([file("late.txt", b"x")]),
            Err(SessionError::SessionClosed { .. })
        ));
        assert_eq!(session.live_handle_count(), 0);
    }

    #[tokio::test]
    async fn empty_assistant_content_is_replaced_with_notice() {
        let harness = Harness::new(
            FakeSender::replying(SendReply::new("", Vec::new())),
            FakeDownloader::failing(),
        );
        let mut session = harness.session("project-handover");

        session.on_send("hello").await.expect("send completes");

        let last = session.transcript().last().expect("reply appended");
        assert_eq!(last.content, EMPTY_REPLY_NOTICE);
    }
}
