pub const PROJECT_HANDOVER_SCENE_ID: &str = "project-handover";
pub const UNKNOWN_SCENE_TITLE: &str = "Unknown scene";

pub const DEFAULT_WELCOME_MESSAGE: &str = "Hello, I'm your AI assistant. How can I help you?";
pub const PROJECT_HANDOVER_WELCOME_MESSAGE: &str = "Hi~ I'm your project handover assistant.\n\
Upload the relevant documents and I'll generate summary files for you. \
Questions about the project are welcome too!";

/// Entry on the home screen.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Scene {
    pub id: &'static str,
    pub title: &'static str,
    pub description: &'static str,
    /// Inactive scenes are listed but cannot be opened.
    pub active: bool,
}

const SCENES: [Scene; 4] = [
    Scene {
        id: PROJECT_HANDOVER_SCENE_ID,
        title: "Project handover",
        description: "Talk to the assistant about handing over a project",
        active: true,
    },
    Scene {
        id: "scene-2",
        title: "Scene 2",
        description: "To be decided",
        active: false,
    },
    Scene {
        id: "scene-3",
        title: "Scene 3",
        description: "To be decided",
        active: false,
    },
    Scene {
        id: "scene-4",
        title: "Scene 4",
        description: "To be decided",
        active: false,
    },
];

pub fn scene_catalog() -> &'static [Scene] {
    &SCENES
}

pub fn find_scene(id: &str) -> Option<&'static Scene> {
    SCENES.iter().find(|scene| scene.id == id)
}

pub fn scene_title(id: &str) -> &'static str {
    find_scene(id)
        .map(|scene| scene.title)
        .unwrap_or(UNKNOWN_SCENE_TITLE)
}

pub fn welcome_message(id: &str) -> &'static str {
    match id {
        PROJECT_HANDOVER_SCENE_ID => PROJECT_HANDOVER_WELCOME_MESSAGE,
        _ => DEFAULT_WELCOME_MESSAGE,
    }
}
