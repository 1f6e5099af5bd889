//! CSV result tables.
//!
//! Columns are fixed and purely numeric, so rows are formatted directly.

use std::fmt::Write as _;
use std::path::Path;

use tracing::debug;

use emolysis_models::{EmotionVector, FaceRow, SegmentRow};

use crate::error::MediaResult;

const EMOTION_COLUMNS: [&str; 9] = [
    "emotion0", "emotion1", "emotion2", "emotion3", "emotion4", "emotion5", "emotion6",
    "emotion7", "emotion8",
];

fn header(leading: &[&str], trailing: &[&str]) -> String {
    leading
        .iter()
        .chain(EMOTION_COLUMNS.iter())
        .chain(trailing.iter())
        .copied()
        .collect::<Vec<_>>()
        .join(",")
}

fn push_emotion(out: &mut String, emotion: &EmotionVector) {
    for value in emotion.components() {
        let _ = write!(out, ",{}", value);
    }
}

/// Audio/text table: `start,end,valence,arousal,emotion0..emotion8`.
pub fn render_segment_table(rows: &[SegmentRow]) -> String {
    let mut out = header(&["start", "end", "valence", "arousal"], &[]);
    out.push('\n');
    for row in rows {
        let _ = write!(
            out,
            "{},{},{},{}",
            row.start, row.end, row.valence, row.arousal
        );
        push_emotion(&mut out, &row.emotion);
        out.push('\n');
    }
    out
}

/// Face table: `frame,x1,y1,x2,y2,box_prob,emotion0..emotion8,valence,arousal`.
pub fn render_face_table(rows: &[FaceRow]) -> String {
    let mut out = header(
        &["frame", "x1", "y1", "x2", "y2", "box_prob"],
        &["valence", "arousal"],
    );
    out.push('\n');
    for row in rows {
        let _ = write!(
            out,
            "{},{},{},{},{},{}",
            row.frame, row.x1, row.y1, row.x2, row.y2, row.box_prob
        );
        push_emotion(&mut out, &row.emotion);
        let _ = writeln!(out, ",{},{}", row.valence, row.arousal);
    }
    out
}

pub async fn write_segment_table(path: impl AsRef<Path>, rows: &[SegmentRow]) -> MediaResult<()> {
    write_table(path.as_ref(), render_segment_table(rows), rows.len()).await
}

pub async fn write_face_table(path: impl AsRef<Path>, rows: &[FaceRow]) -> MediaResult<()> {
    write_table(path.as_ref(), render_face_table(rows), rows.len()).await
}

async fn write_table(path: &Path, body: String, rows: usize) -> MediaResult<()> {
    if let Some(parent) = path.parent() {
        tokio::fs::create_dir_all(parent).await?;
    }
    tokio::fs::write(path, body).await?;
    debug!(path = %path.display(), rows, "Wrote result table");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use emolysis_models::AffectPair;

    #[test]
    fn test_segment_table() {
        let rows = vec![SegmentRow::new(
            7.5,
            20.0,
            AffectPair::new(500.5, 1.0),
            EmotionVector::new([0.0, 0.0, 0.5, 0.0, 0.0, 0.0, 0.0, 0.25, 0.25]),
        )];
        let csv = render_segment_table(&rows);
        let lines: Vec<&str> = csv.lines().collect();
        assert_eq!(
            lines[0],
            "start,end,valence,arousal,emotion0,emotion1,emotion2,emotion3,emotion4,emotion5,emotion6,emotion7,emotion8"
        );
        assert_eq!(lines[1], "7.5,20,500.5,1,0,0,0.5,0,0,0,0,0.25,0.25");
    }

    #[test]
    fn test_face_table() {
        let rows = vec![FaceRow {
            frame: 12,
            x1: -3,
            y1: 4,
            x2: 50,
            y2: 61,
            box_prob: 0.99,
            emotion: EmotionVector::new([0.0, 0.0, 1.0, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0]),
            valence: 750,
            arousal: 1,
        }];
        let csv = render_face_table(&rows);
        let lines: Vec<&str> = csv.lines().collect();
        assert_eq!(
            lines[0],
            "frame,x1,y1,x2,y2,box_prob,emotion0,emotion1,emotion2,emotion3,emotion4,emotion5,emotion6,emotion7,emotion8,valence,arousal"
        );
        assert_eq!(lines[1], "12,-3,4,50,61,0.99,0,0,1,0,0,0,0,0,0,750,1");
    }

    #[test]
    fn test_empty_table_has_header_only() {
        assert_eq!(render_face_table(&[]).lines().count(), 1);
    }

    #[tokio::test]
    async fn test_write_creates_parent() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("5").join("audio.csv");
        write_segment_table(&path, &[]).await.unwrap();
        let body = tokio::fs::read_to_string(&path).await.unwrap();
        assert!(body.starts_with("start,end"));
    }
}
