//! Terminal front end for scene-based chats.
//!
//! A home screen picks a scene, then a chat screen drives one
//! [`scenechat_session::AttachmentLifecycleCoordinator`] until the user leaves.

pub mod chat;
pub mod command;
pub mod error;
pub mod home;
pub mod render;
pub mod save;
pub mod settings;
pub mod terminal;

use std::sync::Arc;

use scenechat_api::HttpApiClient;
use scenechat_session::{AttachmentLifecycleCoordinator, Collaborators, Scene, find_scene};
use snafu::ResultExt;
use tokio::io::{AsyncBufRead, AsyncWrite};

use crate::chat::{ChatExit, run_chat};
use crate::error::{AppResult, ClientSnafu};
use crate::home::{HomeChoice, choose_scene};
use crate::save::DirectorySaveAction;
use crate::settings::{Settings, SettingsStore};
use crate::terminal::Terminal;

/// Loads settings, wires the HTTP backend and runs on stdin/stdout.
pub async fn run_app() -> AppResult<()> {
    let store = SettingsStore::load_or_init(SettingsStore::default_config_path());
    let settings = store.settings();
    tracing::debug!(path = ?store.config_path(), ?settings, "settings loaded");

    let client = Arc::new(HttpApiClient::new(settings.api_config()).context(ClientSnafu {
        stage: "build-backend-client",
    })?);
    let collaborators = Collaborators::new(
        client.clone(),
        client,
        Arc::new(DirectorySaveAction::new(settings.resolved_download_dir())),
    );

    let mut terminal = Terminal::stdio();
    run(&mut terminal, &settings, collaborators).await
}

/// Alternates between the home screen and chat sessions until the user quits or input ends.
pub async fn run<R, W>(
    terminal: &mut Terminal<R, W>,
    settings: &Settings,
    collaborators: Collaborators,
) -> AppResult<()>
where
    R: AsyncBufRead + Unpin,
    W: AsyncWrite + Unpin,
{
    let download_dir = settings.resolved_download_dir();
    let mut next_scene = startup_scene(settings);

    loop {
        let scene = match next_scene.take() {
            Some(scene) => scene,
            None => match choose_scene(terminal).await? {
                HomeChoice::Open(scene) => scene,
                HomeChoice::Quit => break,
            },
        };

        let session = AttachmentLifecycleCoordinator::new(scene.id, collaborators.clone());
        match run_chat(terminal, session, &download_dir).await? {
            ChatExit::Left => {}
            ChatExit::InputClosed => break,
        }
    }

    tracing::info!("bye");
    Ok(())
}

fn startup_scene(settings: &Settings) -> Option<&'static Scene> {
    let id = settings.default_scene.as_deref()?;
    match find_scene(id) {
        Some(scene) if scene.active => Some(scene),
        Some(_) => {
            tracing::warn!(scene = id, "default scene is not available yet");
            None
        }
        None => {
            tracing::warn!(scene = id, "default scene is unknown");
            None
        }
    }
}
