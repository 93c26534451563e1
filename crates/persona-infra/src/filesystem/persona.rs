//! Plain-text persona file.
//!
//! The whole file is the persona. Writes go to a sibling temp file first and
//! are renamed into place so a crash never leaves a truncated persona.

use std::path::{Path, PathBuf};

use persona_core::persona::PersonaStore;
use persona_types::error::PersonaError;

/// Local filesystem implementation of [`PersonaStore`].
#[derive(Debug, Clone)]
pub struct FilePersonaStore {
    path: PathBuf,
}

impl FilePersonaStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn temp_path(&self) -> PathBuf {
        let mut name = self
            .path
            .file_name()
            .map(|n| n.to_os_string())
            .unwrap_or_else(|| "persona".into());
        name.push(".tmp");
        self.path.with_file_name(name)
    }
}

impl PersonaStore for FilePersonaStore {
    async fn load(&self) -> Result<String, PersonaError> {
        match tokio::fs::read_to_string(&self.path).await {
            Ok(content) => Ok(content),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                Err(PersonaError::NotFound(self.path.display().to_string()))
            }
            Err(e) => Err(PersonaError::FileSystemError(format!(
                "{}: {e}",
                self.path.display()
            ))),
        }
    }

    async fn save(&self, content: &str) -> Result<(), PersonaError> {
        let io_err =
            |e: std::io::Error| PersonaError::FileSystemError(format!("{}: {e}", self.path.display()));

        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent).await.map_err(io_err)?;
        }

        let temp = self.temp_path();
        tokio::fs::write(&temp, content).await.map_err(io_err)?;
        tokio::fs::rename(&temp, &self.path).await.map_err(io_err)?;
        Ok(())
    }

    fn location(&self) -> String {
        self.path.display().to_string()
    }
}
