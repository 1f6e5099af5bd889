//! Audio and frame decoding through the FFmpeg CLI.

use std::path::Path;
use std::process::Stdio;
use std::sync::Arc;

use async_trait::async_trait;
use image::RgbImage;
use tokio::io::AsyncReadExt;
use tokio::process::{Child, ChildStdout, Command};
use tracing::{debug, warn};

use emolysis_models::TimeWindow;

use crate::error::{MediaError, MediaResult};
use crate::probe::probe_video;

/// A decoded RGB24 video frame.
pub type Frame = RgbImage;

/// Default PCM sample rate handed to the audio analyzer.
pub const DEFAULT_SAMPLE_RATE: u32 = 16_000;

/// Mono 16-bit PCM for a whole asset.
#[derive(Debug, Clone)]
pub struct AudioTrack {
    samples: Arc<[i16]>,
    sample_rate: u32,
}

impl AudioTrack {
    pub fn new(samples: Vec<i16>, sample_rate: u32) -> Self {
        Self {
            samples: samples.into(),
            sample_rate,
        }
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    pub fn duration_secs(&self) -> f64 {
        if self.sample_rate == 0 {
            return 0.0;
        }
        self.samples.len() as f64 / self.sample_rate as f64
    }

    /// Copy out the samples covering `window`; bounds past the end are cut.
    pub fn clip(&self, window: TimeWindow) -> AudioClip {
        let start = self.sample_index(window.start_ms());
        let end = self.sample_index(window.end_ms()).max(start);
        AudioClip {
            window,
            samples: self.samples[start..end].to_vec(),
            sample_rate: self.sample_rate,
        }
    }

    fn sample_index(&self, ms: u64) -> usize {
        let idx = ms as u128 * self.sample_rate as u128 / 1000;
        (idx as usize).min(self.samples.len())
    }
}

/// PCM for one analysis window.
#[derive(Debug, Clone, PartialEq)]
pub struct AudioClip {
    pub window: TimeWindow,
    pub samples: Vec<i16>,
    pub sample_rate: u32,
}

/// Sequential frame reader.
#[async_trait]
pub trait FrameSource: Send {
    fn fps(&self) -> f64;

    /// Expected frame count, `ceil(fps * duration)`, when the duration is known.
    fn expected_frames(&self) -> Option<u64>;

    /// Next frame, or `None` once the stream is exhausted.
    async fn next_frame(&mut self) -> MediaResult<Option<Frame>>;
}

/// Opens decoded views of an uploaded video.
#[async_trait]
pub trait MediaDecoder: Send + Sync {
    async fn open_audio(&self, video_path: &Path, sample_rate: u32) -> MediaResult<AudioTrack>;

    async fn open_frames(&self, video_path: &Path) -> MediaResult<Box<dyn FrameSource>>;
}

/// [`MediaDecoder`] backed by `ffmpeg`/`ffprobe` on `PATH`.
#[derive(Debug, Clone, Copy, Default)]
pub struct FfmpegDecoder;

impl FfmpegDecoder {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl MediaDecoder for FfmpegDecoder {
    async fn open_audio(&self, video_path: &Path, sample_rate: u32) -> MediaResult<AudioTrack> {
        if !video_path.exists() {
            return Err(MediaError::FileNotFound(video_path.to_path_buf()));
        }
        which::which("ffmpeg").map_err(|_| MediaError::FfmpegNotFound)?;

        let output = Command::new("ffmpeg")
            .args(["-hide_banner", "-loglevel", "error", "-i"])
            .arg(video_path)
            .args(["-vn", "-ac", "1", "-ar"])
            .arg(sample_rate.to_string())
            .args(["-f", "s16le", "-"])
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .output()
            .await?;

        if !output.status.success() {
            return Err(MediaError::ffmpeg_failed(
                "audio extraction failed",
                Some(String::from_utf8_lossy(&output.stderr).to_string()),
                output.status.code(),
            ));
        }

        let samples = pcm_from_le_bytes(&output.stdout);
        debug!(
            path = %video_path.display(),
            samples = samples.len(),
            sample_rate,
            "Decoded audio track"
        );
        Ok(AudioTrack::new(samples, sample_rate))
    }

    async fn open_frames(&self, video_path: &Path) -> MediaResult<Box<dyn FrameSource>> {
        let info = probe_video(video_path).await?;
        if info.width == 0 || info.height == 0 {
            return Err(MediaError::InvalidVideo(format!(
                "invalid frame size {}x{}",
                info.width, info.height
            )));
        }
        which::which("ffmpeg").map_err(|_| MediaError::FfmpegNotFound)?;

        let mut child = Command::new("ffmpeg")
            .args(["-hide_banner", "-loglevel", "error", "-i"])
            .arg(video_path)
            .args(["-an", "-pix_fmt", "rgb24", "-f", "rawvideo", "-"])
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::null())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| {
                MediaError::ffmpeg_failed(format!("Failed to spawn FFmpeg: {}", e), None, None)
            })?;

        let stdout = child.stdout.take().ok_or_else(|| {
            MediaError::ffmpeg_failed("Failed to capture FFmpeg stdout", None, None)
        })?;

        debug!(
            path = %video_path.display(),
            width = info.width,
            height = info.height,
            fps = info.fps,
            "Opened frame stream"
        );

        Ok(Box::new(FfmpegFrameStream {
            child,
            stdout,
            width: info.width,
            height: info.height,
            fps: info.fps,
            duration: info.duration,
            finished: false,
        }))
    }
}

/// RGB24 frames piped out of an FFmpeg child process.
pub struct FfmpegFrameStream {
    child: Child,
    stdout: ChildStdout,
    width: u32,
    height: u32,
    fps: f64,
    duration: f64,
    finished: bool,
}

impl FfmpegFrameStream {
    fn frame_len(&self) -> usize {
        self.width as usize * self.height as usize * 3
    }

    async fn finish(&mut self) {
        self.finished = true;
        match self.child.wait().await {
            Ok(status) if !status.success() => {
                warn!("FFmpeg frame stream exited with status {:?}", status.code());
            }
            Ok(_) => {}
            Err(e) => warn!("FFmpeg frame stream wait failed: {}", e),
        }
    }
}

#[async_trait]
impl FrameSource for FfmpegFrameStream {
    fn fps(&self) -> f64 {
        self.fps
    }

    fn expected_frames(&self) -> Option<u64> {
        expected_frame_count(self.fps, self.duration)
    }

    async fn next_frame(&mut self) -> MediaResult<Option<Frame>> {
        if self.finished {
            return Ok(None);
        }

        let mut buffer = vec![0u8; self.frame_len()];
        let mut filled = 0;
        while filled < buffer.len() {
            let n = self.stdout.read(&mut buffer[filled..]).await?;
            if n == 0 {
                break;
            }
            filled += n;
        }

        if filled < buffer.len() {
            if filled > 0 {
                warn!(
                    bytes = filled,
                    expected = buffer.len(),
                    "Dropping truncated trailing frame"
                );
            }
            self.finish().await;
            return Ok(None);
        }

        RgbImage::from_raw(self.width, self.height, buffer)
            .map(Some)
            .ok_or_else(|| MediaError::internal("frame buffer size mismatch"))
    }
}

/// `ceil(fps * duration)` for a probed stream.
pub fn expected_frame_count(fps: f64, duration: f64) -> Option<u64> {
    let frames = (fps * duration).ceil();
    if frames.is_finite() && frames > 0.0 {
        Some(frames as u64)
    } else {
        None
    }
}

fn pcm_from_le_bytes(bytes: &[u8]) -> Vec<i16> {
    bytes
        .chunks_exact(2)
        .map(|pair| i16::from_le_bytes([pair[0], pair[1]]))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_clip_slices_by_millisecond() {
        let track = AudioTrack::new((0..16_000 * 20).map(|i| (i % 100) as i16).collect(), 16_000);
        assert_eq!(track.duration_secs(), 20.0);

        let clip = track.clip(TimeWindow::from_millis(7_500, 20_000).unwrap());
        assert_eq!(clip.samples.len(), 16_000 * 25 / 2);
        assert_eq!(clip.samples[0], track.samples[120_000]);
        assert_eq!(clip.sample_rate, 16_000);
    }

    #[test]
    fn test_clip_past_end_is_cut() {
        let track = AudioTrack::new(vec![1; 1_600], 16_000);
        let clip = track.clip(TimeWindow::from_millis(50, 15_000).unwrap());
        assert_eq!(clip.samples.len(), 800);
        let clip = track.clip(TimeWindow::from_millis(500, 15_000).unwrap());
        assert!(clip.samples.is_empty());
    }

    #[test]
    fn test_pcm_decoding() {
        assert_eq!(pcm_from_le_bytes(&[0x01, 0x00, 0xff, 0xff, 0x7f]), vec![1, -1]);
    }

    #[test]
    fn test_expected_frame_count() {
        assert_eq!(expected_frame_count(25.0, 10.0), Some(250));
        assert_eq!(expected_frame_count(29.97, 10.0), Some(300));
        assert_eq!(expected_frame_count(30.0, 0.0), None);
    }
}
