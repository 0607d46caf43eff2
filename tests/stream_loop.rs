mod common;

use image::{Rgb, RgbImage};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use common::{detection, shared, BrokenSource, RecordingSink, ScriptedDetector, SyntheticSource};
use yolo_studio::application::imaging::Annotator;
use yolo_studio::application::inference::{infer_image, run_stream};
use yolo_studio::domain::{errors::DomainError, model::ConfidenceThreshold, stream::CancellationToken};

fn conf(percent: u32) -> ConfidenceThreshold {
    ConfidenceThreshold::from_percent(percent).unwrap()
}

#[test]
fn video_runs_until_exhausted_at_720x405() {
    let detector = ScriptedDetector { boxes: vec![detection("mario", 0.9)], ..Default::default() };
    let seen = detector.seen.clone();
    let source = SyntheticSource::finite(5, 1280, 720);
    let dropped = source.dropped.clone();
    let mut sink = RecordingSink::default();

    let report = run_stream(
        Box::new(source),
        &shared(detector),
        &Annotator::default(),
        conf(50),
        &CancellationToken::new(),
        &mut sink,
    )
    .unwrap();

    assert_eq!(report.frames, 5);
    assert!(!report.cancelled);
    assert!(dropped.load(Ordering::SeqCst));
    assert!(seen.lock().unwrap().iter().all(|&(w, h, c)| (w, h) == (720, 405) && c == 0.5));
    assert_eq!(sink.frames.len(), 5);
    assert_eq!(sink.frames[4].0.index, 4);
    assert_eq!(sink.frames[0].1, (720, 405));
    assert_eq!(sink.frames[0].0.detections.len(), 1);
}

#[test]
fn cancelling_before_first_frame_pushes_nothing_and_releases_source() {
    let source = SyntheticSource::endless(640, 480);
    let dropped = source.dropped.clone();
    let reads = source.reads.clone();
    let token = CancellationToken::new();
    token.cancel();
    let mut sink = RecordingSink::default();

    let report = run_stream(
        Box::new(source),
        &shared(ScriptedDetector::default()),
        &Annotator::default(),
        conf(30),
        &token,
        &mut sink,
    )
    .unwrap();

    assert!(report.cancelled);
    assert_eq!(report.frames, 0);
    assert!(sink.frames.is_empty());
    assert_eq!(reads.load(Ordering::SeqCst), 0);
    assert!(dropped.load(Ordering::SeqCst));
}

#[test]
fn read_failure_on_first_frame_is_a_clean_end() {
    let dropped = Arc::new(AtomicBool::new(false));
    let mut sink = RecordingSink::default();

    let report = run_stream(
        Box::new(BrokenSource { dropped: dropped.clone() }),
        &shared(ScriptedDetector::default()),
        &Annotator::default(),
        conf(50),
        &CancellationToken::new(),
        &mut sink,
    )
    .unwrap();

    let empty = run_stream(
        Box::new(SyntheticSource::finite(0, 1280, 720)),
        &shared(ScriptedDetector::default()),
        &Annotator::default(),
        conf(50),
        &CancellationToken::new(),
        &mut RecordingSink::default(),
    )
    .unwrap();

    assert_eq!(report, empty);
    assert!(sink.frames.is_empty());
    assert!(dropped.load(Ordering::SeqCst));
}

#[test]
fn detector_error_aborts_the_stream_and_still_releases_the_source() {
    let detector = ScriptedDetector { fail_on: Some(2), ..Default::default() };
    let source = SyntheticSource::finite(5, 640, 480);
    let dropped = source.dropped.clone();
    let mut sink = RecordingSink::default();

    let err = run_stream(
        Box::new(source),
        &shared(detector),
        &Annotator::default(),
        conf(50),
        &CancellationToken::new(),
        &mut sink,
    )
    .unwrap_err();

    assert!(matches!(err, DomainError::OperationFailed(_)));
    assert_eq!(sink.frames.len(), 2);
    assert!(dropped.load(Ordering::SeqCst));
}

#[test]
fn image_without_detections_comes_back_unchanged() {
    let image = RgbImage::from_pixel(320, 240, Rgb([1, 2, 3]));
    let result = infer_image(
        &shared(ScriptedDetector::default()),
        &Annotator::default(),
        &image,
        conf(30),
    )
    .unwrap();

    assert!(result.detections.is_empty());
    assert!(result.summaries().is_empty());
    assert_eq!(result.annotated, image);
}

#[test]
fn image_inference_filters_by_confidence_and_summarises_boxes() {
    let detector = ScriptedDetector {
        boxes: vec![detection("mario", 0.95), detection("goomba", 0.4)],
        ..Default::default()
    };
    let image = RgbImage::from_pixel(100, 100, Rgb([0, 0, 0]));
    let result = infer_image(&shared(detector), &Annotator::default(), &image, conf(50)).unwrap();

    let boxes = result.summaries();
    assert_eq!(boxes.len(), 1);
    assert_eq!(boxes[0].label, "mario");
    assert_eq!((boxes[0].x, boxes[0].y, boxes[0].width, boxes[0].height), (35.0, 25.0, 50.0, 30.0));
    assert_ne!(result.annotated, image);
}
