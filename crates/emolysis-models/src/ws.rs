//! Progress channel message types.
//!
//! Every message is a `{status, data}` object. The client answers each
//! message except `done` and `error` with any text frame; that answer is the
//! acknowledgment the producer waits for.

use chrono::{DateTime, Utc};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::session::ResultPaths;

/// Pipeline stages, in execution order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    Transcription,
    Audio,
    Text,
    Visual,
}

impl Stage {
    pub fn as_str(&self) -> &'static str {
        match self {
            Stage::Transcription => "transcription",
            Stage::Audio => "audio",
            Stage::Text => "text",
            Stage::Visual => "visual",
        }
    }
}

impl std::fmt::Display for Stage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Position of the last processed unit within a stage.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct ProgressToken {
    /// Zero-based index of the last processed unit
    pub current: u64,
    /// Total units, when known up front
    pub total: Option<u64>,
}

/// Message payload.
///
/// Variant order matters for deserialization: the catch-all `Empty` must
/// stay last.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(untagged)]
pub enum MessageData {
    Progress(ProgressToken),
    StageStart {
        fps: f64,
    },
    Done(ResultPaths),
    Error {
        message: String,
        timestamp: DateTime<Utc>,
    },
    Empty {},
}

/// Message sent from the pipeline to the client.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct ProgressMessage {
    pub status: String,
    pub data: MessageData,
}

impl ProgressMessage {
    /// The uploaded video was stored.
    pub fn uploaded() -> Self {
        Self {
            status: "uploaded".to_string(),
            data: MessageData::Empty {},
        }
    }

    /// A frame-based stage is starting at the given frame rate.
    pub fn stage_start(stage: Stage, fps: f64) -> Self {
        Self {
            status: format!("{} start", stage),
            data: MessageData::StageStart { fps },
        }
    }

    pub fn progress(stage: Stage, token: ProgressToken) -> Self {
        Self {
            status: stage.as_str().to_string(),
            data: MessageData::Progress(token),
        }
    }

    pub fn stage_done(stage: Stage) -> Self {
        Self {
            status: format!("{} done", stage),
            data: MessageData::Empty {},
        }
    }

    pub fn done(paths: ResultPaths) -> Self {
        Self {
            status: "done".to_string(),
            data: MessageData::Done(paths),
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self {
            status: "error".to_string(),
            data: MessageData::Error {
                message: message.into(),
                timestamp: Utc::now(),
            },
        }
    }

    /// Whether the producer waits for an acknowledgment after this message.
    pub fn expects_ack(&self) -> bool {
        !matches!(self.data, MessageData::Done(_) | MessageData::Error { .. })
    }

    /// Short label for metrics.
    pub fn kind(&self) -> &'static str {
        match self.data {
            MessageData::Progress(_) => "progress",
            MessageData::StageStart { .. } => "stage_start",
            MessageData::Done(_) => "done",
            MessageData::Error { .. } => "error",
            MessageData::Empty {} => "announce",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::SessionId;

    #[test]
    fn test_progress_wire_shape() {
        let msg = ProgressMessage::progress(
            Stage::Audio,
            ProgressToken {
                current: 9,
                total: Some(12),
            },
        );
        let json = serde_json::to_value(&msg).unwrap();
        assert_eq!(
            json,
            serde_json::json!({"status": "audio", "data": {"current": 9, "total": 12}})
        );
    }

    #[test]
    fn test_unknown_total_is_null() {
        let msg = ProgressMessage::progress(
            Stage::Visual,
            ProgressToken {
                current: 99,
                total: None,
            },
        );
        let json = serde_json::to_value(&msg).unwrap();
        assert_eq!(json["data"]["total"], serde_json::Value::Null);
    }

    #[test]
    fn test_announcements() {
        let json = serde_json::to_value(ProgressMessage::uploaded()).unwrap();
        assert_eq!(json, serde_json::json!({"status": "uploaded", "data": {}}));

        let json = serde_json::to_value(ProgressMessage::stage_start(Stage::Visual, 25.0)).unwrap();
        assert_eq!(json, serde_json::json!({"status": "visual start", "data": {"fps": 25.0}}));

        let msg = ProgressMessage::stage_done(Stage::Transcription);
        assert_eq!(msg.status, "transcription done");
        assert!(msg.expects_ack());
    }

    #[test]
    fn test_done_and_error_do_not_expect_ack() {
        let paths = ResultPaths {
            id: SessionId(4),
            audio: "data/4/audio.csv".to_string(),
            text: "data/4/text.csv".to_string(),
            visual: "data/4/faces.csv".to_string(),
        };
        let done = ProgressMessage::done(paths);
        assert!(!done.expects_ack());
        let json = serde_json::to_value(&done).unwrap();
        assert_eq!(json["data"]["id"], 4);
        assert_eq!(json["data"]["visual"], "data/4/faces.csv");

        let err = ProgressMessage::error("boom");
        assert!(!err.expects_ack());
        assert_eq!(err.kind(), "error");
    }

    #[test]
    fn test_round_trip_keeps_variant() {
        let msg = ProgressMessage::stage_start(Stage::Visual, 30.0);
        let text = serde_json::to_string(&msg).unwrap();
        let back: ProgressMessage = serde_json::from_str(&text).unwrap();
        assert_eq!(back, msg);

        let back: ProgressMessage =
            serde_json::from_str(r#"{"status":"audio done","data":{}}"#).unwrap();
        assert_eq!(back, ProgressMessage::stage_done(Stage::Audio));
    }
}
