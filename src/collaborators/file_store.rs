// File-backed project store: one JSON snapshot per project.
//
// Saves take an exclusive lock on `<project_id>.lock` for the whole
// read-compare-write, then write a temp file and rename it into place.

use async_trait::async_trait;
use fd_lock::RwLock;
use std::fs::{self, OpenOptions};
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

use super::traits::{ProjectStore, StoreError};
use crate::workflow::{ProjectId, ProjectState};

#[derive(Debug, Clone)]
pub struct FileProjectStore {
    state_dir: PathBuf,
}

impl FileProjectStore {
    pub fn new(state_dir: impl Into<PathBuf>) -> Self {
        Self {
            state_dir: state_dir.into(),
        }
    }

    pub fn state_dir(&self) -> &Path {
        &self.state_dir
    }

    fn state_file(&self, project_id: &ProjectId) -> Result<PathBuf, StoreError> {
        let id = project_id.as_str();
        let valid = !id.is_empty()
            && id != "."
            && id != ".."
            && !id.contains(['/', '\\'])
            && !id.starts_with('.');
        if !valid {
            return Err(StoreError::InvalidProjectId {
                project_id: project_id.clone(),
            });
        }
        Ok(self.state_dir.join(format!("{id}.json")))
    }

    /// Every project id with a snapshot on disk
    pub async fn list_projects(&self) -> Result<Vec<ProjectId>, StoreError> {
        let mut ids = Vec::new();
        let mut entries = match tokio::fs::read_dir(&self.state_dir).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(ids),
            Err(e) => return Err(e.into()),
        };
        while let Some(entry) = entries.next_entry().await? {
            let path = entry.path();
            if path.extension().and_then(|e| e.to_str()) != Some("json") {
                continue;
            }
            if let Some(stem) = path.file_stem().and_then(|s| s.to_str()) {
                ids.push(ProjectId::from(stem));
            }
        }
        ids.sort_by(|a, b| a.as_str().cmp(b.as_str()));
        Ok(ids)
    }
}

fn read_snapshot(path: &Path) -> Result<Option<ProjectState>, StoreError> {
    match fs::read_to_string(path) {
        Ok(raw) => Ok(Some(serde_json::from_str(&raw)?)),
        Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
        Err(e) => Err(e.into()),
    }
}

fn save_locked(
    state_dir: &Path,
    state_file: &Path,
    state: &ProjectState,
    expected_version: u64,
) -> Result<(), StoreError> {
    fs::create_dir_all(state_dir)?;

    let lock_path = state_file.with_extension("lock");
    let lock_file = OpenOptions::new()
        .create(true)
        .truncate(false)
        .write(true)
        .open(&lock_path)?;
    let mut lock = RwLock::new(lock_file);
    let _guard = lock.write().map_err(|e| StoreError::Lock {
        reason: format!("{}: {e}", lock_path.display()),
    })?;

    let found = read_snapshot(state_file)?.map(|s| s.version).unwrap_or(0);
    if found != expected_version {
        return Err(StoreError::ConcurrentModification {
            project_id: state.project_id.clone(),
            expected: expected_version,
            found,
        });
    }

    let serialized = serde_json::to_string_pretty(state)?;
    let temp_file = state_file.with_extension("json.tmp");
    fs::write(&temp_file, serialized)?;
    fs::rename(&temp_file, state_file)?;
    Ok(())
}

#[async_trait]
impl ProjectStore for FileProjectStore {
    async fn load_project_state(&self, project_id: &ProjectId) -> Result<ProjectState, StoreError> {
        let path = self.state_file(project_id)?;
        let raw = match tokio::fs::read_to_string(&path).await {
            Ok(raw) => raw,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                return Err(StoreError::NotFound {
                    project_id: project_id.clone(),
                })
            }
            Err(e) => return Err(e.into()),
        };
        let state: ProjectState = serde_json::from_str(&raw)?;
        debug!(
            project_id = %project_id,
            version = state.version,
            path = %path.display(),
            "Loaded project state"
        );
        Ok(state)
    }

    async fn save_project_state(
        &self,
        state: &ProjectState,
        expected_version: u64,
    ) -> Result<(), StoreError> {
        let state_file = self.state_file(&state.project_id)?;
        let state_dir = self.state_dir.clone();
        let snapshot = state.clone();

        let path = state_file.clone();
        tokio::task::spawn_blocking(move || {
            save_locked(&state_dir, &path, &snapshot, expected_version)
        })
        .await
        .map_err(|e| StoreError::Lock {
            reason: format!("save task failed: {e}"),
        })??;

        info!(
            project_id = %state.project_id,
            version = state.version,
            path = %state_file.display(),
            "Project state saved"
        );
        Ok(())
    }
}
