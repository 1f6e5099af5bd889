//! Session identity and on-disk layout.

use std::path::{Path, PathBuf};

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// Uploaded video file name.
pub const VIDEO_FILE: &str = "video.mp4";
/// Transcript JSON file name.
pub const TRANSCRIPT_FILE: &str = "transcript.json";
/// Audio result table.
pub const AUDIO_TABLE: &str = "audio.csv";
/// Text result table.
pub const TEXT_TABLE: &str = "text.csv";
/// Face result table.
pub const FACES_TABLE: &str = "faces.csv";

/// Numeric session identifier; also the name of the session directory.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, JsonSchema,
)]
#[serde(transparent)]
pub struct SessionId(pub u64);

impl SessionId {
    pub fn as_u64(&self) -> u64 {
        self.0
    }

    /// Parse a directory name; only plain decimal names qualify.
    pub fn from_dir_name(name: &str) -> Option<Self> {
        if name.is_empty() || !name.bytes().all(|b| b.is_ascii_digit()) {
            return None;
        }
        name.parse().ok().map(SessionId)
    }
}

impl std::fmt::Display for SessionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Paths of one session's artifacts under a data directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionLayout {
    pub id: SessionId,
    pub dir: PathBuf,
}

impl SessionLayout {
    pub fn new(data_dir: impl AsRef<Path>, id: SessionId) -> Self {
        Self {
            id,
            dir: data_dir.as_ref().join(id.to_string()),
        }
    }

    pub fn video(&self) -> PathBuf {
        self.dir.join(VIDEO_FILE)
    }

    pub fn transcript(&self) -> PathBuf {
        self.dir.join(TRANSCRIPT_FILE)
    }

    pub fn audio_table(&self) -> PathBuf {
        self.dir.join(AUDIO_TABLE)
    }

    pub fn text_table(&self) -> PathBuf {
        self.dir.join(TEXT_TABLE)
    }

    pub fn faces_table(&self) -> PathBuf {
        self.dir.join(FACES_TABLE)
    }

    /// Client-facing paths of the result tables, as announced in `done`.
    pub fn result_paths(&self) -> ResultPaths {
        let rel = |file: &str| format!("data/{}/{}", self.id, file);
        ResultPaths {
            id: self.id,
            audio: rel(AUDIO_TABLE),
            text: rel(TEXT_TABLE),
            visual: rel(FACES_TABLE),
        }
    }
}

/// Result locations sent with the final `done` message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct ResultPaths {
    pub id: SessionId,
    pub audio: String,
    pub text: String,
    pub visual: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_dir_name() {
        assert_eq!(SessionId::from_dir_name("12"), Some(SessionId(12)));
        assert_eq!(SessionId::from_dir_name("007"), Some(SessionId(7)));
        assert_eq!(SessionId::from_dir_name("-1"), None);
        assert_eq!(SessionId::from_dir_name("tmp"), None);
        assert_eq!(SessionId::from_dir_name(""), None);
    }

    #[test]
    fn test_layout_paths() {
        let layout = SessionLayout::new("/srv/data", SessionId(3));
        assert_eq!(layout.video(), PathBuf::from("/srv/data/3/video.mp4"));
        assert_eq!(layout.faces_table(), PathBuf::from("/srv/data/3/faces.csv"));

        let paths = layout.result_paths();
        assert_eq!(paths.audio, "data/3/audio.csv");
        assert_eq!(paths.text, "data/3/text.csv");
        assert_eq!(paths.visual, "data/3/faces.csv");
    }
}
