//! Session orchestration: transcribe, then audio, text and visual reduction.

use std::sync::Arc;
use std::time::Instant;

use tracing::Instrument;

use emolysis_media::table::{write_face_table, write_segment_table};
use emolysis_media::{
    AudioSegmenter, FrameReducer, MediaDecoder, MediaError, ModelRegistry, Transcript,
    TranscriptReducer, WindowAggregator,
};
use emolysis_models::{Language, ProgressMessage, ResultPaths, SegmentRow, SessionLayout, Stage};

use crate::config::PipelineConfig;
use crate::error::{WorkerError, WorkerResult};
use crate::executor::InferencePool;
use crate::logging::SessionLogger;
use crate::metrics;
use crate::progress::{ProgressProtocol, ProgressTransport, StageCursor};

/// Runs the analysis pipeline for one session at a time.
///
/// Shared between sessions; everything session-specific lives on the stack
/// of [`run_session`](Self::run_session).
pub struct SessionProcessor {
    config: PipelineConfig,
    models: ModelRegistry,
    decoder: Arc<dyn MediaDecoder>,
    pool: InferencePool,
    segmenter: AudioSegmenter,
}

impl SessionProcessor {
    pub fn new(
        config: PipelineConfig,
        models: ModelRegistry,
        decoder: Arc<dyn MediaDecoder>,
    ) -> WorkerResult<Self> {
        let segmenter = AudioSegmenter::new(config.segment_stride, config.segment_duration)
            .map_err(|e| WorkerError::config_error(e.to_string()))?;
        let pool = InferencePool::new(config.max_inference_parallel);
        Ok(Self {
            config,
            models,
            decoder,
            pool,
            segmenter,
        })
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    pub fn models(&self) -> &ModelRegistry {
        &self.models
    }

    /// Run a whole session over `transport`, ending with `done` or `error`.
    ///
    /// The video must already be stored at `layout.video()`.
    pub async fn run_session<T: ProgressTransport>(
        &self,
        layout: &SessionLayout,
        language: Language,
        transport: T,
    ) -> WorkerResult<ResultPaths> {
        let logger = SessionLogger::new(layout.id);
        let span = logger.create_span();

        async move {
            logger.log_start(&format!("analysis in {}", language));
            let started = Instant::now();
            let mut protocol = ProgressProtocol::new(transport, self.config.ack_timeout);

            match self.drive(layout, language, &mut protocol).await {
                Ok(paths) => {
                    if let Err(e) = protocol.finish(paths.clone()).await {
                        logger.log_warning(&format!("results ready but not delivered: {}", e));
                        metrics::record_session_failed(failure_reason(&e));
                        return Err(e);
                    }
                    metrics::record_session_completed();
                    logger.log_completion(&format!(
                        "session finished in {:.1}s",
                        started.elapsed().as_secs_f64()
                    ));
                    Ok(paths)
                }
                Err(e) => {
                    logger.log_error(&e.to_string());
                    protocol.abort(&e.to_string()).await;
                    metrics::record_session_failed(failure_reason(&e));
                    Err(e)
                }
            }
        }
        .instrument(span)
        .await
    }

    async fn drive<T: ProgressTransport>(
        &self,
        layout: &SessionLayout,
        language: Language,
        protocol: &mut ProgressProtocol<T>,
    ) -> WorkerResult<ResultPaths> {
        // Fail before any inference when the language has no text model.
        let text_analyzer = self
            .models
            .text_analyzer(language)
            .map_err(|e| match e {
                MediaError::UnsupportedLanguage(err) => WorkerError::UnsupportedLanguage(err),
                other => WorkerError::Media(other),
            })?;

        protocol.announce(ProgressMessage::uploaded()).await?;

        let transcript = self.transcribe(layout, language).await?;
        protocol
            .announce(ProgressMessage::stage_done(Stage::Transcription))
            .await?;

        self.audio_stage(layout, protocol).await?;
        protocol
            .announce(ProgressMessage::stage_done(Stage::Audio))
            .await?;

        self.text_stage(layout, &transcript, TranscriptReducer::new(text_analyzer), protocol)
            .await?;
        protocol
            .announce(ProgressMessage::stage_done(Stage::Text))
            .await?;

        self.visual_stage(layout, protocol).await?;
        protocol
            .announce(ProgressMessage::stage_done(Stage::Visual))
            .await?;

        Ok(layout.result_paths())
    }

    async fn transcribe(&self, layout: &SessionLayout, language: Language) -> WorkerResult<Transcript> {
        let logger = SessionLogger::new(layout.id).for_stage(Stage::Transcription);
        let started = Instant::now();
        logger.log_start(self.models.transcriber().name());

        let transcriber = self.models.transcriber();
        let video = layout.video();
        let transcript = self
            .pool
            .run(transcriber.transcribe(&video, language))
            .await??;
        transcript.save(layout.transcript()).await?;

        metrics::record_stage_duration(Stage::Transcription, started.elapsed().as_secs_f64());
        logger.log_completion(&format!("{} segments", transcript.segments.len()));
        Ok(transcript)
    }

    async fn audio_stage<T: ProgressTransport>(
        &self,
        layout: &SessionLayout,
        protocol: &mut ProgressProtocol<T>,
    ) -> WorkerResult<()> {
        let logger = SessionLogger::new(layout.id).for_stage(Stage::Audio);
        let started = Instant::now();

        let track = self
            .decoder
            .open_audio(&layout.video(), self.config.audio_sample_rate)
            .await?;
        let duration = track.duration_secs();
        let windows = self.segmenter.segment(duration);
        let total_ms = windows.total_ms();
        let window_count = self.segmenter.window_count(duration) as u64;
        logger.log_start(&format!("{:.3}s of audio, {} windows", duration, window_count));

        let analyzer = self.models.audio_analyzer();
        let mut cursor = StageCursor::new(Stage::Audio, self.config.audio_step, Some(window_count));
        let mut aggregator = WindowAggregator::new();

        for analysis in windows {
            let clip = track.clip(analysis.window);
            let scores = self.pool.run(analyzer.analyze(&clip)).await??;
            let observation = scores.to_observation()?;
            for cell in self.segmenter.split(analysis.window, total_ms)?.cells() {
                aggregator.add(cell, observation);
            }
            protocol.advance(&mut cursor).await?;
        }

        let rows: Vec<SegmentRow> = aggregator
            .finalize()
            .iter()
            .map(|row| row.to_segment_row())
            .collect();
        write_segment_table(layout.audio_table(), &rows).await?;

        metrics::record_rows_written(Stage::Audio, rows.len());
        metrics::record_stage_duration(Stage::Audio, started.elapsed().as_secs_f64());
        logger.log_completion(&format!("{} rows", rows.len()));
        Ok(())
    }

    async fn text_stage<T: ProgressTransport>(
        &self,
        layout: &SessionLayout,
        transcript: &Transcript,
        reducer: TranscriptReducer,
        protocol: &mut ProgressProtocol<T>,
    ) -> WorkerResult<()> {
        let logger = SessionLogger::new(layout.id).for_stage(Stage::Text);
        let started = Instant::now();
        logger.log_start(&format!(
            "{} segments in {}",
            transcript.segments.len(),
            reducer.language()
        ));

        let mut cursor = StageCursor::new(
            Stage::Text,
            self.config.text_step,
            Some(transcript.segments.len() as u64),
        );
        let mut rows = Vec::with_capacity(transcript.segments.len());
        for segment in &transcript.segments {
            rows.push(self.pool.run(reducer.reduce_segment(segment)).await??);
            protocol.advance(&mut cursor).await?;
        }
        write_segment_table(layout.text_table(), &rows).await?;

        metrics::record_rows_written(Stage::Text, rows.len());
        metrics::record_stage_duration(Stage::Text, started.elapsed().as_secs_f64());
        logger.log_completion(&format!("{} rows", rows.len()));
        Ok(())
    }

    async fn visual_stage<T: ProgressTransport>(
        &self,
        layout: &SessionLayout,
        protocol: &mut ProgressProtocol<T>,
    ) -> WorkerResult<()> {
        let logger = SessionLogger::new(layout.id).for_stage(Stage::Visual);
        let started = Instant::now();

        let mut frames = self.decoder.open_frames(&layout.video()).await?;
        let fps = frames.fps();
        let expected = frames.expected_frames();
        logger.log_start(&format!("{} fps, {:?} frames expected", fps, expected));
        protocol
            .announce(ProgressMessage::stage_start(Stage::Visual, fps))
            .await?;

        let reducer = FrameReducer::new(
            self.models.face_detector(),
            self.models.face_scorer(),
            self.config.face_threshold,
        );
        let mut cursor = StageCursor::new(Stage::Visual, self.config.visual_step, expected);
        let mut rows = Vec::new();
        let mut frame_index = 0u64;

        while let Some(frame) = frames.next_frame().await? {
            rows.extend(self.pool.run(reducer.reduce(frame_index, &frame)).await??);
            frame_index += 1;
            protocol.advance(&mut cursor).await?;
        }
        write_face_table(layout.faces_table(), &rows).await?;

        metrics::record_rows_written(Stage::Visual, rows.len());
        metrics::record_stage_duration(Stage::Visual, started.elapsed().as_secs_f64());
        logger.log_completion(&format!("{} frames, {} faces", frame_index, rows.len()));
        Ok(())
    }
}

fn failure_reason(error: &WorkerError) -> &'static str {
    match error {
        WorkerError::Disconnected => "disconnected",
        WorkerError::AckTimeout(_) => "ack_timeout",
        WorkerError::Protocol(_) => "protocol",
        WorkerError::UnsupportedLanguage(_) => "unsupported_language",
        WorkerError::Media(_) => "media",
        WorkerError::Io(_) => "io",
        WorkerError::ProcessingFailed(_) | WorkerError::ConfigError(_) => "processing",
    }
}
