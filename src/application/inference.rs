use image::RgbImage;
use std::time::Instant;
use tracing::{debug, info};

use crate::application::imaging::{resize_for_stream, Annotator};
use crate::application::ports::{FrameSink, FrameSource, SharedDetector};
use crate::domain::{
    detection::DetectionResult,
    errors::{DomainError, DomainResult},
    model::ConfidenceThreshold,
    stream::{summarize_detections, CancellationToken, FrameMeta, StreamReport},
};

/// Runs the detector once on `image` and draws the result.
pub fn infer_image(
    detector: &SharedDetector,
    annotator: &Annotator,
    image: &RgbImage,
    confidence: ConfidenceThreshold,
) -> DomainResult<DetectionResult> {
    let detections = {
        let mut guard = detector
            .lock()
            .map_err(|_| DomainError::OperationFailed("detector lock poisoned".into()))?;
        guard.detect(image, confidence)?
    };
    let annotated = annotator.annotate(image, &detections);
    Ok(DetectionResult { detections, annotated })
}

/// Pulls frames until the source runs dry or `token` is cancelled, pushing each
/// annotated frame to `sink`. The source is dropped on return, whatever the outcome.
pub fn run_stream(
    mut source: Box<dyn FrameSource>,
    detector: &SharedDetector,
    annotator: &Annotator,
    confidence: ConfidenceThreshold,
    token: &CancellationToken,
    sink: &mut dyn FrameSink,
) -> DomainResult<StreamReport> {
    let mut report = StreamReport::default();
    let mut fps_est: f32 = 0.0;
    let mut last_t = Instant::now();

    loop {
        if token.is_cancelled() {
            report.cancelled = true;
            break;
        }
        let Some(raw) = source.next_frame() else {
            break;
        };

        let frame = resize_for_stream(&raw);
        let t_infer_start = Instant::now();
        let result = infer_image(detector, annotator, &frame, confidence)?;
        let infer_ms = t_infer_start.elapsed().as_secs_f32() * 1000.0;

        let dt = last_t.elapsed().as_secs_f32().max(0.001);
        last_t = Instant::now();
        fps_est = if report.frames == 0 { 1.0 / dt } else { 0.9 * fps_est + 0.1 * (1.0 / dt) };

        if !result.detections.is_empty() {
            debug!("frame {}: {}", report.frames, summarize_detections(&result.detections));
        }

        let meta = FrameMeta {
            index: report.frames,
            width: frame.width(),
            height: frame.height(),
            infer_ms,
            fps_est,
            detections: result.detections,
        };
        sink.show(&meta, &result.annotated);
        report.frames += 1;
    }

    drop(source);
    info!(
        "stream finished after {} frames{}",
        report.frames,
        if report.cancelled { " (cancelled)" } else { "" }
    );
    Ok(report)
}
