//! Persistent storage for the anonymous client id.

use std::path::PathBuf;

use tracing::warn;

use crate::domain::identity::ClientId;

/// Owns the file holding the client id. IO failures degrade to an
/// ephemeral id so counters keep working; the id is simply not stable
/// across restarts in that case.
pub struct ClientIdStorage {
    path: PathBuf,
}

impl ClientIdStorage {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub async fn load_or_create(&self) -> ClientId {
        if let Ok(raw) = tokio::fs::read_to_string(&self.path).await {
            if let Ok(id) = ClientId::parse(&raw) {
                return id;
            }
            warn!(path = %self.path.display(), "replacing unreadable client id file");
        }

        let id = ClientId::generate();
        if let Some(parent) = self.path.parent() {
            let _ = tokio::fs::create_dir_all(parent).await;
        }
        if let Err(err) = tokio::fs::write(&self.path, id.as_str()).await {
            warn!(
                path = %self.path.display(),
                error = %err,
                "failed to persist client id; continuing with an ephemeral one"
            );
        }
        id
    }
}
