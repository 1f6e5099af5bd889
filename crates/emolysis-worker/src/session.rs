//! Session id allocation.

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};

use tracing::info;

use emolysis_models::{SessionId, SessionLayout};

use crate::error::WorkerResult;

/// Hands out session ids that never collide with existing session
/// directories, even across restarts.
#[derive(Debug)]
pub struct SessionIdPool {
    data_dir: PathBuf,
    next: AtomicU64,
}

impl SessionIdPool {
    /// Scan `data_dir` and start after the highest numeric directory name.
    pub async fn open(data_dir: impl AsRef<Path>) -> WorkerResult<Self> {
        let data_dir = data_dir.as_ref().to_path_buf();
        tokio::fs::create_dir_all(&data_dir).await?;

        let mut highest: Option<u64> = None;
        let mut entries = tokio::fs::read_dir(&data_dir).await?;
        while let Some(entry) = entries.next_entry().await? {
            if !entry.file_type().await?.is_dir() {
                continue;
            }
            let name = entry.file_name();
            if let Some(id) = name.to_str().and_then(SessionId::from_dir_name) {
                highest = Some(highest.map_or(id.as_u64(), |h| h.max(id.as_u64())));
            }
        }

        let next = highest.map_or(0, |h| h + 1);
        info!(data_dir = %data_dir.display(), next_id = next, "Session id pool ready");
        Ok(Self {
            data_dir,
            next: AtomicU64::new(next),
        })
    }

    pub fn data_dir(&self) -> &Path {
        &self.data_dir
    }

    /// Reserve the next id.
    pub fn next_id(&self) -> SessionId {
        SessionId(self.next.fetch_add(1, Ordering::SeqCst))
    }

    /// Reserve an id and create its directory.
    pub async fn create(&self) -> WorkerResult<SessionLayout> {
        let layout = SessionLayout::new(&self.data_dir, self.next_id());
        tokio::fs::create_dir_all(&layout.dir).await?;
        Ok(layout)
    }
}
