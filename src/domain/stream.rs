use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use super::detection::Detection;

/// Width every streamed frame is resized to before inference.
pub const STREAM_FRAME_WIDTH: u32 = 720;
/// 16:9 height for [`STREAM_FRAME_WIDTH`], rounded down.
pub const STREAM_FRAME_HEIGHT: u32 = STREAM_FRAME_WIDTH * 9 / 16;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SourceKind {
    Image,
    Video,
    Webcam,
}

pub const SOURCES_LIST: [SourceKind; 3] = [SourceKind::Image, SourceKind::Video, SourceKind::Webcam];

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FrameMeta {
    pub index: u64,
    pub width: u32,
    pub height: u32,
    pub infer_ms: f32,
    pub fps_est: f32,
    pub detections: Vec<Detection>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WsFrameMetaMessage {
    pub r#type: String,
    pub meta: FrameMeta,
}

/// Sent once when a stream stops, whichever way it stopped.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WsStreamEndMessage {
    pub r#type: String,
    pub source: SourceKind,
    pub frames: u64,
    pub cancelled: bool,
    pub error: Option<String>,
}

/// Outcome of a frame-stream loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct StreamReport {
    pub frames: u64,
    pub cancelled: bool,
}

/// Cooperative stop signal, polled once per frame by the stream loop.
#[derive(Debug, Clone, Default)]
pub struct CancellationToken {
    cancelled: Arc<AtomicBool>,
}

impl CancellationToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }
}

pub fn summarize_detections(detections: &[Detection]) -> String {
    let mut counts = BTreeMap::new();
    for det in detections {
        *counts.entry(&det.label).or_insert(0) += 1;
    }
    counts.iter()
        .map(|(label, count)| format!("{} {}", count, label))
        .collect::<Vec<_>>()
        .join(", ")
}
