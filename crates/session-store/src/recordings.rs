//! Durable persistence for `RecordingSession`s, split out from the automation
//! session store because a recording has an independent lifetime (created on
//! "start recording", frozen on "save", never mutated) and no owning
//! `AutomationSession` until one is later started against it.
//!
//! Layout: `{root}/recordings/{id}/recording.json` plus the recorder's own
//! `snapshots/{id}/` directory of per-action screenshots, referenced by path
//! from each `RecordedAction` rather than copied into this store.

use std::path::PathBuf;

use automation_types::{RecordingSession, RecordingSessionId};
use tokio::fs;

use crate::{write_atomic, SessionStoreError};

pub struct RecordingStore {
    root: PathBuf,
}

impl RecordingStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    fn recording_dir(&self, id: RecordingSessionId) -> PathBuf {
        self.root.join("recordings").join(id.to_string())
    }

    fn recording_path(&self, id: RecordingSessionId) -> PathBuf {
        self.recording_dir(id).join("recording.json")
    }

    /// Persists a frozen recording. Called once, on save; a `RecordingSession`
    /// is never mutated afterward, so this never needs an update counterpart.
    pub async fn save_recording(&self, session: &RecordingSession) -> Result<(), SessionStoreError> {
        let dir = self.recording_dir(session.id);
        fs::create_dir_all(&dir).await?;
        let payload = serde_json::to_vec_pretty(session)?;
        write_atomic(&self.recording_path(session.id), &payload).await?;
        Ok(())
    }

    pub async fn load_recording(&self, id: RecordingSessionId) -> Result<RecordingSession, SessionStoreError> {
        let path = self.recording_path(id);
        let bytes = match fs::read(&path).await {
            Ok(bytes) => bytes,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
                return Err(SessionStoreError::RecordingNotFound(id))
            }
            Err(err) => return Err(err.into()),
        };
        Ok(serde_json::from_slice(&bytes)?)
    }

    pub async fn list_recordings(&self) -> Result<Vec<RecordingSession>, SessionStoreError> {
        let recordings_dir = self.root.join("recordings");
        if fs::metadata(&recordings_dir).await.is_err() {
            return Ok(Vec::new());
        }

        let mut sessions = Vec::new();
        let mut entries = fs::read_dir(&recordings_dir).await?;
        while let Some(entry) = entries.next_entry().await? {
            let path = entry.path().join("recording.json");
            match fs::read(&path).await {
                Ok(bytes) => match serde_json::from_slice(&bytes) {
                    Ok(session) => sessions.push(session),
                    Err(err) => tracing::warn!(?err, path = %path.display(), "failed to parse recording record"),
                },
                Err(err) => tracing::warn!(?err, path = %path.display(), "failed to read recording record"),
            }
        }
        Ok(sessions)
    }

    pub async fn delete_recording(&self, id: RecordingSessionId) -> Result<(), SessionStoreError> {
        let dir = self.recording_dir(id);
        match fs::remove_dir_all(&dir).await {
            Ok(()) => Ok(()),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Err(SessionStoreError::RecordingNotFound(id)),
            Err(err) => Err(err.into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use automation_types::{RecordingSession, RecordingSessionId};
    use tempfile::tempdir;

    fn sample(id: RecordingSessionId) -> RecordingSession {
        RecordingSession {
            id,
            display_name: "sign up flow".to_string(),
            start_url: "https://example.com".to_string(),
            duration_ms: 4_200,
            actions: Vec::new(),
            tabs: Vec::new(),
            video_path: None,
            snapshot_dir: PathBuf::from("/tmp/snapshots"),
        }
    }

    #[tokio::test]
    async fn save_then_load_round_trips() {
        let dir = tempdir().unwrap();
        let store = RecordingStore::new(dir.path());
        let id = RecordingSessionId::new();
        store.save_recording(&sample(id)).await.unwrap();

        let loaded = store.load_recording(id).await.unwrap();
        assert_eq!(loaded.display_name, "sign up flow");
    }

    #[tokio::test]
    async fn load_missing_recording_errors() {
        let dir = tempdir().unwrap();
        let store = RecordingStore::new(dir.path());
        let bogus = RecordingSessionId::new();
        assert!(matches!(store.load_recording(bogus).await, Err(SessionStoreError::RecordingNotFound(_))));
    }

    #[tokio::test]
    async fn list_recordings_returns_all_saved() {
        let dir = tempdir().unwrap();
        let store = RecordingStore::new(dir.path());
        store.save_recording(&sample(RecordingSessionId::new())).await.unwrap();
        store.save_recording(&sample(RecordingSessionId::new())).await.unwrap();

        let all = store.list_recordings().await.unwrap();
        assert_eq!(all.len(), 2);
    }

    #[tokio::test]
    async fn delete_recording_removes_directory() {
        let dir = tempdir().unwrap();
        let store = RecordingStore::new(dir.path());
        let id = RecordingSessionId::new();
        store.save_recording(&sample(id)).await.unwrap();
        store.delete_recording(id).await.unwrap();
        assert!(matches!(store.load_recording(id).await, Err(SessionStoreError::RecordingNotFound(_))));
    }
}
