mod common;

use std::sync::atomic::Ordering;
use std::time::Duration;
use tokio::sync::broadcast::{error::RecvError, Receiver};
use tokio::time::timeout;

use common::{detection, shared, ScriptedDetector, SyntheticSource};
use yolo_studio::adapters::onnx::pipeline::PipelineAdapter;
use yolo_studio::application::imaging::Annotator;
use yolo_studio::application::ports::{StreamEvent, StreamJob, StreamPort};
use yolo_studio::domain::{
    model::ConfidenceThreshold,
    stream::{CancellationToken, SourceKind},
};

async fn next_event(rx: &mut Receiver<StreamEvent>) -> StreamEvent {
    loop {
        match timeout(Duration::from_secs(10), rx.recv()).await.expect("stream stalled") {
            Ok(event) => return event,
            Err(RecvError::Lagged(_)) => continue,
            Err(RecvError::Closed) => panic!("channel closed"),
        }
    }
}

fn job(kind: SourceKind, source: SyntheticSource) -> StreamJob {
    StreamJob {
        kind,
        source: Box::new(source),
        detector: shared(ScriptedDetector { boxes: vec![detection("goomba", 0.8)], ..Default::default() }),
        confidence: ConfidenceThreshold::from_percent(50).unwrap(),
        token: CancellationToken::new(),
    }
}

#[tokio::test(flavor = "multi_thread")]
async fn video_frames_are_broadcast_then_end_is_reported() {
    let adapter = PipelineAdapter::new(Annotator::default(), 80);
    let mut rx = adapter.subscribe().await.unwrap();

    let source = SyntheticSource::finite(3, 1280, 720);
    let dropped = source.dropped.clone();
    adapter.start(job(SourceKind::Video, source)).await.unwrap();

    for expected_index in 0..3 {
        match next_event(&mut rx).await {
            StreamEvent::Frame(meta, jpeg) => {
                assert_eq!(meta.index, expected_index);
                assert_eq!((meta.width, meta.height), (720, 405));
                assert_eq!(meta.detections.len(), 1);
                let decoded = image::load_from_memory(&jpeg).unwrap();
                assert_eq!((decoded.width(), decoded.height()), (720, 405));
            }
            other => panic!("expected frame, got {other:?}"),
        }
    }

    match next_event(&mut rx).await {
        StreamEvent::End { kind, frames, cancelled, error } => {
            assert_eq!(kind, SourceKind::Video);
            assert_eq!(frames, 3);
            assert!(!cancelled);
            assert!(error.is_none());
        }
        other => panic!("expected end, got {other:?}"),
    }
    assert!(dropped.load(Ordering::SeqCst));
}

#[tokio::test(flavor = "multi_thread")]
async fn stop_cancels_a_webcam_stream_and_releases_it() {
    let adapter = PipelineAdapter::new(Annotator::default(), 80);
    let mut rx = adapter.subscribe().await.unwrap();

    let source = SyntheticSource::endless(640, 480);
    let dropped = source.dropped.clone();
    adapter.start(job(SourceKind::Webcam, source)).await.unwrap();

    assert!(matches!(next_event(&mut rx).await, StreamEvent::Frame(..)));
    assert!(adapter.stop().await.unwrap());
    assert!(dropped.load(Ordering::SeqCst));

    loop {
        if let StreamEvent::End { kind, cancelled, .. } = next_event(&mut rx).await {
            assert_eq!(kind, SourceKind::Webcam);
            assert!(cancelled);
            break;
        }
    }
    assert!(!adapter.stop().await.unwrap());
}

#[tokio::test(flavor = "multi_thread")]
async fn starting_a_new_stream_stops_the_previous_one() {
    let adapter = PipelineAdapter::new(Annotator::default(), 80);

    let first = SyntheticSource::endless(320, 240);
    let first_dropped = first.dropped.clone();
    adapter.start(job(SourceKind::Webcam, first)).await.unwrap();
    adapter.start(job(SourceKind::Video, SyntheticSource::finite(1, 320, 240))).await.unwrap();

    assert!(first_dropped.load(Ordering::SeqCst));
    adapter.stop().await.unwrap();
}

#[tokio::test(flavor = "multi_thread")]
async fn detector_error_is_reported_in_the_end_event() {
    let adapter = PipelineAdapter::new(Annotator::default(), 80);
    let mut rx = adapter.subscribe().await.unwrap();

    let source = SyntheticSource::finite(10, 320, 240);
    let dropped = source.dropped.clone();
    let job = StreamJob {
        kind: SourceKind::Video,
        source: Box::new(source),
        detector: shared(ScriptedDetector { fail_on: Some(1), ..Default::default() }),
        confidence: ConfidenceThreshold::default(),
        token: CancellationToken::new(),
    };
    adapter.start(job).await.unwrap();

    assert!(matches!(next_event(&mut rx).await, StreamEvent::Frame(..)));
    match next_event(&mut rx).await {
        StreamEvent::End { kind, frames, cancelled, error } => {
            assert_eq!(kind, SourceKind::Video);
            assert_eq!(frames, 1);
            assert!(!cancelled);
            assert!(error.unwrap().contains("inference failed"));
        }
        other => panic!("expected end, got {other:?}"),
    }
    assert!(dropped.load(Ordering::SeqCst));
}

#[tokio::test(flavor = "multi_thread")]
async fn concurrent_starts_leave_no_stream_behind_stop() {
    let adapter = PipelineAdapter::new(Annotator::default(), 80);

    for _ in 0..20 {
        let a = SyntheticSource::endless(64, 48);
        let b = SyntheticSource::endless(64, 48);
        let (a_dropped, b_dropped) = (a.dropped.clone(), b.dropped.clone());

        let (ra, rb) = tokio::join!(
            adapter.start(job(SourceKind::Webcam, a)),
            adapter.start(job(SourceKind::Webcam, b)),
        );
        ra.unwrap();
        rb.unwrap();
        assert!(adapter.stop().await.unwrap());

        assert!(a_dropped.load(Ordering::SeqCst));
        assert!(b_dropped.load(Ordering::SeqCst));
    }
}
