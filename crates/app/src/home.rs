use scenechat_session::{Scene, scene_catalog};
use tokio::io::{AsyncBufRead, AsyncWrite};

use crate::error::AppResult;
use crate::render::render_catalog;
use crate::terminal::Terminal;

const HOME_PROMPT: &str = "Pick a scene (number or id, q to quit): ";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HomeChoice {
    Open(&'static Scene),
    Quit,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Selection {
    Empty,
    Quit,
    Scene(&'static Scene),
    Unknown,
}

/// Shows the scene catalog until the user opens an active scene or quits.
pub async fn choose_scene<R, W>(terminal: &mut Terminal<R, W>) -> AppResult<HomeChoice>
where
    R: AsyncBufRead + Unpin,
    W: AsyncWrite + Unpin,
{
    let scenes = scene_catalog();
    terminal.output().write(&render_catalog(scenes)).await?;

    loop {
        terminal.output().write(HOME_PROMPT).await?;
        let Some(line) = terminal.read_line().await? else {
            return Ok(HomeChoice::Quit);
        };

        match resolve_selection(scenes, &line) {
            Selection::Empty => {}
            Selection::Quit => return Ok(HomeChoice::Quit),
            Selection::Scene(scene) if scene.active => return Ok(HomeChoice::Open(scene)),
            Selection::Scene(scene) => {
                terminal
                    .output()
                    .line(&format!("{} is coming soon.", scene.title))
                    .await?;
            }
            Selection::Unknown => {
                terminal
                    .output()
                    .line(&format!("No scene matches `{}`.", line.trim()))
                    .await?;
            }
        }
    }
}

fn resolve_selection(scenes: &'static [Scene], input: &str) -> Selection {
    let input = input.trim();
    if input.is_empty() {
        return Selection::Empty;
    }
    if input.eq_ignore_ascii_case("q") || input.eq_ignore_ascii_case("quit") {
        return Selection::Quit;
    }

    let by_number = input
        .parse::<usize>()
        .ok()
        .and_then(|number| number.checked_sub(1))
        .and_then(|index| scenes.get(index));
    by_number
        .or_else(|| scenes.iter().find(|scene| scene.id == input))
        .map_or(Selection::Unknown, Selection::Scene)
}
