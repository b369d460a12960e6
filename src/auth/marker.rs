//! The "logged in" marker: a small JSON file standing beside the keyring
//! token that records who is signed in to which backend.

use serde::{Deserialize, Serialize};
use std::error::Error;
use std::fmt;
use std::fs;
use std::io::Write;
use std::path::PathBuf;
use tempfile::NamedTempFile;

use crate::api::User;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionState {
    pub logged_in: bool,
    pub backend: String,
    #[serde(default)]
    pub user: Option<User>,
}

#[derive(Debug)]
pub enum MarkerError {
    Io { path: PathBuf, source: std::io::Error },
    Parse { path: PathBuf, source: serde_json::Error },
}

impl fmt::Display for MarkerError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MarkerError::Io { path, source } => {
                write!(f, "Failed to access session file {}: {}", path.display(), source)
            }
            MarkerError::Parse { path, source } => {
                write!(f, "Session file {} is corrupt: {}", path.display(), source)
            }
        }
    }
}

impl Error for MarkerError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            MarkerError::Io { source, .. } => Some(source),
            MarkerError::Parse { source, .. } => Some(source),
        }
    }
}

#[derive(Debug, Clone)]
pub struct SessionMarker {
    path: PathBuf,
}

impl SessionMarker {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn load(&self) -> Result<Option<SessionState>, MarkerError> {
        let contents = match fs::read_to_string(&self.path) {
            Ok(contents) => contents,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(source) => {
                return Err(MarkerError::Io {
                    path: self.path.clone(),
                    source,
                })
            }
        };
        serde_json::from_str(&contents)
            .map(Some)
            .map_err(|source| MarkerError::Parse {
                path: self.path.clone(),
                source,
            })
    }

    /// Marker state for one backend; a marker written for another backend
    /// does not count.
    pub fn load_for(&self, backend: &str) -> Result<Option<SessionState>, MarkerError> {
        Ok(self
            .load()?
            .filter(|state| state.logged_in && state.backend == backend))
    }

    pub fn save(&self, state: &SessionState) -> Result<(), MarkerError> {
        let io_err = |source| MarkerError::Io {
            path: self.path.clone(),
            source,
        };
        let parent = self.path.parent().filter(|dir| !dir.as_os_str().is_empty());
        if let Some(dir) = parent {
            fs::create_dir_all(dir).map_err(io_err)?;
        }

        let contents = serde_json::to_vec_pretty(state).map_err(|source| MarkerError::Parse {
            path: self.path.clone(),
            source,
        })?;
        let mut temp_file = match parent {
            Some(dir) => NamedTempFile::new_in(dir),
            None => NamedTempFile::new(),
        }
        .map_err(io_err)?;
        temp_file.write_all(&contents).map_err(io_err)?;
        temp_file.as_file_mut().sync_all().map_err(io_err)?;
        temp_file
            .persist(&self.path)
            .map_err(|err| io_err(err.error))?;
        Ok(())
    }

    /// Removes the marker. Returns whether one existed.
    pub fn clear(&self) -> Result<bool, MarkerError> {
        match fs::remove_file(&self.path) {
            Ok(()) => Ok(true),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(false),
            Err(source) => Err(MarkerError::Io {
                path: self.path.clone(),
                source,
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::utils::test_utils::sample_user;
    use tempfile::TempDir;

    #[test]
    fn missing_marker_loads_as_none() {
        let dir = TempDir::new().unwrap();
        let marker = SessionMarker::new(dir.path().join("session.json"));
        assert_eq!(marker.load().unwrap(), None);
        assert!(!marker.clear().unwrap());
    }

    #[test]
    fn saves_into_nested_directory_and_clears() {
        let dir = TempDir::new().unwrap();
        let marker = SessionMarker::new(dir.path().join("state/rapport/session.json"));
        let state = SessionState {
            logged_in: true,
            backend: "http://localhost:8000".to_string(),
            user: Some(sample_user()),
        };

        marker.save(&state).unwrap();
        assert_eq!(marker.load().unwrap(), Some(state.clone()));
        assert_eq!(
            marker.load_for("http://localhost:8000").unwrap(),
            Some(state)
        );
        assert_eq!(marker.load_for("https://other.example.com").unwrap(), None);

        assert!(marker.clear().unwrap());
        assert_eq!(marker.load().unwrap(), None);
    }

    #[test]
    fn corrupt_marker_is_reported() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("session.json");
        fs::write(&path, "{not json").unwrap();
        let err = SessionMarker::new(&path).load().unwrap_err();
        assert!(matches!(err, MarkerError::Parse { .. }));
        assert!(err.to_string().contains("corrupt"));
    }
}
