use std::fmt;

use serde::Deserialize;

use scenechat_session::{RemoteFile, RemoteFileId, SendReply};

/// Reply body of `POST /messages`. Both fields may be absent or null.
#[derive(Debug, Deserialize)]
pub(crate) struct WireReply {
    #[serde(default)]
    content: Option<String>,
    #[serde(default)]
    files: Option<Vec<WireFile>>,
}

#[derive(Debug, Deserialize)]
struct WireFile {
    id: WireFileId,
    #[serde(default)]
    name: Option<String>,
}

/// Backends hand out either numeric or string file ids.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum WireFileId {
    Text(String),
    Number(serde_json::Number),
}

impl fmt::Display for WireFileId {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Text(value) => formatter.write_str(value),
            Self::Number(value) => write!(formatter, "{value}"),
        }
    }
}

impl WireReply {
    pub(crate) fn into_reply(self) -> SendReply {
        let files = self
            .files
            .unwrap_or_default()
            .into_iter()
            .map(|file| {
                let id = file.id.to_string();
                // Unnamed files are offered under their id.
                let name = file
                    .name
                    .filter(|name| !name.trim().is_empty())
                    .unwrap_or_else(|| id.clone());
                RemoteFile::new(RemoteFileId::new(id), name)
            })
            .collect();

        SendReply::new(self.content.unwrap_or_default(), files)
    }
}
