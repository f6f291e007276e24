use std::path::{Path, PathBuf};

use scenechat_session::{CollaboratorError, CollaboratorResult, ObjectView, SaveAction};

const UNNAMED_FILE: &str = "download";

/// Saves objects into a directory, the terminal counterpart of a browser download.
#[derive(Debug, Clone)]
pub struct DirectorySaveAction {
    dir: PathBuf,
}

impl DirectorySaveAction {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }
}

impl SaveAction for DirectorySaveAction {
    fn trigger(&self, object: ObjectView<'_>, suggested_name: &str) -> CollaboratorResult<()> {
        std::fs::create_dir_all(&self.dir).map_err(|error| CollaboratorError::Saving {
            message: format!("cannot create {}: {error}", self.dir.display()),
        })?;

        let target = unique_target(&self.dir, &file_name_only(suggested_name));
        std::fs::write(&target, object.bytes).map_err(|error| CollaboratorError::Saving {
            message: format!("cannot write {}: {error}", target.display()),
        })?;

        tracing::info!(
            handle = %object.handle_id,
            path = %target.display(),
            bytes = object.bytes.len(),
            "saved object"
        );
        Ok(())
    }
}

/// Strips any directory part so a suggested name cannot escape the target directory.
fn file_name_only(suggested_name: &str) -> String {
    let name = suggested_name
        .rsplit(['/', '\\'])
        .next()
        .unwrap_or_default()
        .trim();
    if name.is_empty() || name == "." || name == ".." {
        UNNAMED_FILE.to_string()
    } else {
        name.to_string()
    }
}

/// `report.pdf`, then `report (1).pdf`, `report (2).pdf`, ...
fn unique_target(dir: &Path, name: &str) -> PathBuf {
    let candidate = dir.join(name);
    if !candidate.exists() {
        return candidate;
    }

    let (stem, extension) = match name.rfind('.') {
        Some(dot) if dot > 0 => (&name[..dot], &name[dot..]),
        _ => (name, ""),
    };
    (1..)
        .map(|counter| dir.join(format!("{stem} ({counter}){extension}")))
        .find(|path| !path.exists())
        .unwrap_or(candidate)
}
