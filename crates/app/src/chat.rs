use std::path::{Path, PathBuf};

use futures::StreamExt;
use futures::stream::FuturesUnordered;
use scenechat_session::{
    AttachmentLifecycleCoordinator, AttachmentLocator, BoxFuture, CollaboratorResult,
    DownloadStart, FetchedFile, MessageId, PendingDownload, PendingSend, RawFile, SendOutcome,
    SendReply, SendTicket, SessionError,
};
use snafu::ResultExt;
use tokio::io::{AsyncBufRead, AsyncWrite};

use crate::command::{ChatCommand, parse_command};
use crate::error::{AppResult, ReadInputSnafu};
use crate::render::{HELP_TEXT, render_header, render_message, render_staging};
use crate::terminal::{Output, Terminal};

const EXIT_CONFIRMATION: &str =
    "Leave this chat? All chat history and files will be discarded. [y/N] ";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChatExit {
    /// The user confirmed `/exit`; the home screen comes back.
    Left,
    /// Input ended; the application is closing.
    InputClosed,
}

/// Result of a network round trip, delivered back to the loop that owns the session.
enum SessionEvent {
    SendCompleted {
        ticket: SendTicket,
        result: CollaboratorResult<SendReply>,
    },
    DownloadCompleted {
        name: String,
        result: CollaboratorResult<FetchedFile>,
    },
}

enum LineOutcome {
    Continue,
    Await(BoxFuture<'static, SessionEvent>),
    Leave,
}

struct ChatScreen {
    session: AttachmentLifecycleCoordinator,
    download_dir: PathBuf,
    rendered: usize,
    confirming_exit: bool,
}

/// Runs one chat session until the user leaves or input ends, then tears it down.
///
/// Replies and downloads are awaited concurrently with input. The session itself never leaves
/// this task.
pub async fn run_chat<R, W>(
    terminal: &mut Terminal<R, W>,
    session: AttachmentLifecycleCoordinator,
    download_dir: &Path,
) -> AppResult<ChatExit>
where
    R: AsyncBufRead + Unpin,
    W: AsyncWrite + Unpin,
{
    let mut screen = ChatScreen {
        session,
        download_dir: download_dir.to_path_buf(),
        rendered: 0,
        confirming_exit: false,
    };
    let mut pending = FuturesUnordered::<BoxFuture<'static, SessionEvent>>::new();
    let Terminal { input, output } = terminal;

    output.write(&render_header(screen.session.scene_title())).await?;
    screen.render_new_messages(output).await?;

    loop {
        screen.prompt(output, pending.len()).await?;
        tokio::select! {
            biased;
            Some(event) = pending.next(), if !pending.is_empty() => {
                // The prompt was already printed; start the event output on a fresh line.
                output.write("\n").await?;
                screen.apply_event(output, event).await?;
            }
            line = input.next_line() => {
                let line = line.context(ReadInputSnafu { stage: "read-chat-line" })?;
                let Some(line) = line else {
                    output.write("\n").await?;
                    screen.close(output, pending.len()).await?;
                    return Ok(ChatExit::InputClosed);
                };
                match screen.handle_line(output, &line).await? {
                    LineOutcome::Continue => {}
                    LineOutcome::Await(event) => pending.push(event),
                    LineOutcome::Leave => {
                        screen.close(output, pending.len()).await?;
                        return Ok(ChatExit::Left);
                    }
                }
            }
        }
    }
}

impl ChatScreen {
    async fn prompt<W>(&self, output: &mut Output<W>, in_flight: usize) -> AppResult<()>
    where
        W: AsyncWrite + Unpin,
    {
        if self.confirming_exit {
            return output.write(EXIT_CONFIRMATION).await;
        }

        let staged = self.session.staging().len();
        let mut prompt = String::new();
        if in_flight > 0 {
            prompt.push_str("(waiting for reply) ");
        }
        if staged > 0 {
            prompt.push_str(&format!("[{staged} staged] "));
        }
        prompt.push_str("> ");
        output.write(&prompt).await
    }

    async fn render_new_messages<W>(&mut self, output: &mut Output<W>) -> AppResult<()>
    where
        W: AsyncWrite + Unpin,
    {
        let messages = self.session.transcript().all();
        for message in messages.iter().skip(self.rendered) {
            output.write(&render_message(message)).await?;
        }
        self.rendered = messages.len();
        Ok(())
    }

    async fn handle_line<W>(&mut self, output: &mut Output<W>, line: &str) -> AppResult<LineOutcome>
    where
        W: AsyncWrite + Unpin,
    {
        if self.confirming_exit {
            self.confirming_exit = false;
            let answer = line.trim();
            if answer.eq_ignore_ascii_case("y") || answer.eq_ignore_ascii_case("yes") {
                return Ok(LineOutcome::Leave);
            }
            output.line("Staying in the chat.").await?;
            return Ok(LineOutcome::Continue);
        }

        let command = match parse_command(line) {
            Ok(Some(command)) => command,
            Ok(None) => return Ok(LineOutcome::Continue),
            Err(error) => {
                output.line(&error.to_string()).await?;
                return Ok(LineOutcome::Continue);
            }
        };

        match command {
            ChatCommand::Send(text) => return self.send(output, text).await,
            ChatCommand::Attach(paths) => self.attach(output, paths).await?,
            ChatCommand::Remove(index) => match self.session.remove_staged(index) {
                Ok(file) => output.line(&format!("Removed {}.", file.name)).await?,
                Err(error) => output.line(&describe_error(&error)).await?,
            },
            ChatCommand::Files => output.write(&render_staging(self.session.staging())).await?,
            ChatCommand::Open(index) => {
                let message = match self.session.download_staged(index) {
                    Ok(()) => self.saved_notice(self.staged_name(index)),
                    Err(error) => describe_error(&error),
                };
                output.line(&message).await?;
            }
            ChatCommand::Download { message_id, index } => {
                let locator = AttachmentLocator::new(MessageId::new(message_id), index);
                return self.download(output, locator).await;
            }
            ChatCommand::History => {
                for message in self.session.transcript().all() {
                    output.write(&render_message(message)).await?;
                }
            }
            ChatCommand::Exit => self.confirming_exit = true,
            ChatCommand::Help => output.write(HELP_TEXT).await?,
        }
        Ok(LineOutcome::Continue)
    }

    async fn send<W>(&mut self, output: &mut Output<W>, text: String) -> AppResult<LineOutcome>
    where
        W: AsyncWrite + Unpin,
    {
        self.session.set_draft(text);
        match self.session.begin_send() {
            Ok(PendingSend { ticket, reply }) => {
                self.render_new_messages(output).await?;
                Ok(LineOutcome::Await(Box::pin(async move {
                    SessionEvent::SendCompleted {
                        ticket,
                        result: reply.await,
                    }
                })))
            }
            Err(error) => {
                output.line(&describe_error(&error)).await?;
                Ok(LineOutcome::Continue)
            }
        }
    }

    async fn attach<W>(&mut self, output: &mut Output<W>, paths: Vec<PathBuf>) -> AppResult<()>
    where
        W: AsyncWrite + Unpin,
    {
        let mut files = Vec::with_capacity(paths.len());
        for path in paths {
            match read_file(&path).await {
                Ok(file) => files.push(file),
                Err(error) => {
                    tracing::warn!(path = %path.display(), %error, "cannot read attachment");
                    output
                        .line(&format!("Cannot read {}: {error}", path.display()))
                        .await?;
                }
            }
        }
        if files.is_empty() {
            return Ok(());
        }

        match self.session.stage_files(files) {
            Ok(added) => {
                output.line(&format!("Staged {added} file(s).")).await?;
                output.write(&render_staging(self.session.staging())).await
            }
            Err(error) => output.line(&describe_error(&error)).await,
        }
    }

    async fn download<W>(
        &mut self,
        output: &mut Output<W>,
        locator: AttachmentLocator,
    ) -> AppResult<LineOutcome>
    where
        W: AsyncWrite + Unpin,
    {
        match self.session.begin_download(locator) {
            Ok(DownloadStart::Saved { name }) => {
                output.line(&self.saved_notice(&name)).await?;
                Ok(LineOutcome::Continue)
            }
            Ok(DownloadStart::Pending(PendingDownload { name, fetch, .. })) => {
                output.line(&format!("Downloading {name}...")).await?;
                Ok(LineOutcome::Await(Box::pin(async move {
                    SessionEvent::DownloadCompleted {
                        name,
                        result: fetch.await,
                    }
                })))
            }
            Err(error) => {
                output.line(&describe_error(&error)).await?;
                Ok(LineOutcome::Continue)
            }
        }
    }

    async fn apply_event<W>(&mut self, output: &mut Output<W>, event: SessionEvent) -> AppResult<()>
    where
        W: AsyncWrite + Unpin,
    {
        match event {
            SessionEvent::SendCompleted { ticket, result } => {
                match self.session.complete_send(ticket, result) {
                    Ok(SendOutcome::Failed { error, .. }) => {
                        tracing::debug!(request = %ticket.request_id, %error, "send rejected");
                    }
                    Ok(SendOutcome::Delivered { .. }) => {}
                    Err(error) => output.line(&describe_error(&error)).await?,
                }
                self.render_new_messages(output).await
            }
            SessionEvent::DownloadCompleted { name, result } => {
                let message = match self.session.complete_download(&name, result) {
                    Ok(()) => self.saved_notice(&name),
                    Err(error) => describe_error(&error),
                };
                output.line(&message).await
            }
        }
    }

    async fn close<W>(&mut self, output: &mut Output<W>, in_flight: usize) -> AppResult<()>
    where
        W: AsyncWrite + Unpin,
    {
        let report = self.session.on_teardown();
        if in_flight > 0 {
            tracing::info!(in_flight, "discarding unanswered requests");
        }
        output
            .line(&format!(
                "Chat closed; released {} file handle(s).",
                report.handles_released()
            ))
            .await
    }

    fn staged_name(&self, index: usize) -> &str {
        self.session
            .staging()
            .get(index)
            .map(|entry| entry.name())
            .unwrap_or("file")
    }

    fn saved_notice(&self, name: &str) -> String {
        format!("Saved {name} to {}.", self.download_dir.display())
    }
}

async fn read_file(path: &Path) -> std::io::Result<RawFile> {
    let bytes = tokio::fs::read(path).await?;
    let name = path
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string());
    let mime_type = mime_guess::from_path(path).first_or_octet_stream();
    Ok(RawFile::new(name, mime_type.essence_str(), bytes))
}

fn describe_error(error: &SessionError) -> String {
    match error {
        SessionError::NothingToSend { .. } => {
            "Nothing to send: type a message or /attach files first.".to_string()
        }
        SessionError::InvalidIndex { index, len, .. } => {
            format!("There is no file {} (have {len}).", index + 1)
        }
        SessionError::UnknownMessage { message_id, .. } => {
            format!("There is no message #{message_id}.")
        }
        SessionError::UnknownAttachment {
            message_id, index, ..
        } => format!("Message #{message_id} has no file {}.", index + 1),
        other => other.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use std::sync::{Arc, Mutex};

    use scenechat_session::{
        CollaboratorError, Collaborators, DownloadCollaborator, PROJECT_HANDOVER_SCENE_ID,
        RemoteFile, RemoteFileId, SEND_FAILURE_NOTICE, SendCollaborator, SendRequest,
    };

    use super::*;
    use crate::save::DirectorySaveAction;

    #[derive(Default)]
    struct ScriptedBackend {
        reject_sends: bool,
        requests: Mutex<Vec<SendRequest>>,
    }

    impl SendCollaborator for ScriptedBackend {
        fn send(&self, request: SendRequest) -> BoxFuture<'static, CollaboratorResult<SendReply>> {
            let reply = SendReply::new(
                format!("echo: {}", request.text),
                vec![RemoteFile::new("r-1", "summary.md")],
            );
            self.requests.lock().expect("requests lock").push(request);
            let reject = self.reject_sends;
            Box::pin(async move {
                if reject {
                    Err(CollaboratorError::Sending {
                        message: "offline".to_string(),
                    })
                } else {
                    Ok(reply)
                }
            })
        }
    }

    impl DownloadCollaborator for ScriptedBackend {
        fn fetch(
            &self,
            file_id: &RemoteFileId,
        ) -> BoxFuture<'static, CollaboratorResult<FetchedFile>> {
            let bytes = format!("contents of {file_id}").into_bytes();
            Box::pin(async move {
                Ok(FetchedFile {
                    bytes,
                    mime_type: Some("text/markdown".to_string()),
                })
            })
        }
    }

    struct Run {
        exit: ChatExit,
        output: String,
        backend: Arc<ScriptedBackend>,
        saves: tempfile::TempDir,
    }

    async fn run_script(backend: ScriptedBackend, input: String) -> Run {
        let backend = Arc::new(backend);
        let saves = tempfile::tempdir().expect("tempdir");
        let collaborators = Collaborators::new(
            backend.clone(),
            backend.clone(),
            Arc::new(DirectorySaveAction::new(saves.path())),
        );
        let session = AttachmentLifecycleCoordinator::new(PROJECT_HANDOVER_SCENE_ID, collaborators);

        let mut terminal = Terminal::new(input.as_bytes(), Vec::new());
        let exit = run_chat(&mut terminal, session, saves.path())
            .await
            .expect("chat runs");
        let output = String::from_utf8(terminal.into_writer()).expect("utf8 output");

        Run {
            exit,
            output,
            backend,
            saves,
        }
    }

    #[tokio::test]
    async fn send_with_attachment_then_download_reply_file() {
        let docs = tempfile::tempdir().expect("tempdir");
        let notes = docs.path().join("notes.txt");
        std::fs::write(&notes, b"handover notes").expect("write notes");

        let script = format!(
            "/attach {}\nplease summarise\n/download 3 1\n/download 2 1\n/exit\ny\n",
            notes.display()
        );
        let run = run_script(ScriptedBackend::default(), script).await;

        assert_eq!(run.exit, ChatExit::Left);
        let requests = run.backend.requests.lock().expect("requests lock").clone();
        assert_eq!(requests.len(), 1);
        assert_eq!(requests[0].text, "please summarise");
        assert_eq!(requests[0].files[0].name, "notes.txt");
        assert_eq!(requests[0].files[0].mime_type, "text/plain");

        assert!(run.output.contains("Staged 1 file(s)."));
        assert!(run.output.contains("echo: please summarise"));
        assert!(run.output.contains("[1] notes.txt (local)"));
        assert!(run.output.contains("[1] summary.md (remote)"));
        assert!(run.output.contains("Chat closed; released 1 file handle(s)."));

        let saved_remote = std::fs::read(run.saves.path().join("summary.md")).expect("remote saved");
        assert_eq!(saved_remote, b"contents of r-1");
        let saved_local = std::fs::read(run.saves.path().join("notes.txt")).expect("local saved");
        assert_eq!(saved_local, b"handover notes");
    }

    #[tokio::test]
    async fn failed_send_shows_notice_and_keeps_chatting() {
        let backend = ScriptedBackend {
            reject_sends: true,
            ..ScriptedBackend::default()
        };
        let run = run_script(backend, "hello\n/history\n".to_string()).await;

        assert_eq!(run.exit, ChatExit::InputClosed);
        assert_eq!(run.output.matches(SEND_FAILURE_NOTICE).count(), 2);
        assert!(run.output.contains("system (re #2)"));
    }

    #[tokio::test]
    async fn exit_can_be_declined_and_input_errors_are_reported() {
        let script = "\n/exit\nn\n/remove 1\n/open 1\n/download 9 1\n/frobnicate\n/files\n";
        let run = run_script(ScriptedBackend::default(), script.to_string()).await;

        assert_eq!(run.exit, ChatExit::InputClosed);
        assert!(run.output.contains("All chat history and files will be discarded."));
        assert!(run.output.contains("Staying in the chat."));
        assert!(run.output.contains("There is no file 1 (have 0)."));
        assert!(run.output.contains("There is no message #9."));
        assert!(run.output.contains("unknown command `/frobnicate`"));
        assert!(run.output.contains("No files staged."));
        assert!(run.backend.requests.lock().expect("requests lock").is_empty());
    }

    #[tokio::test]
    async fn unreadable_attachments_are_skipped() {
        let run = run_script(ScriptedBackend::default(), "/attach /definitely/missing\n".into()).await;

        assert!(run.output.contains("Cannot read /definitely/missing"));
        assert!(run.backend.requests.lock().expect("requests lock").is_empty());
        assert!(run.output.contains("Chat closed; released 0 file handle(s)."));
    }
}
