#![allow(dead_code)]

use image::{Rgb, RgbImage};
use std::path::Path;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use yolo_studio::application::ports::{
    Detector, DetectorLoader, FrameSink, FrameSource, SharedDetector, SourceInfo,
};
use yolo_studio::domain::{
    detection::Detection,
    errors::{DomainError, DomainResult},
    model::ConfidenceThreshold,
    stream::FrameMeta,
};

/// Detector returning a fixed set of boxes and remembering input sizes.
/// With `fail_on: Some(n)` the call on the n-th frame (0-based) errors.
#[derive(Clone, Default)]
pub struct ScriptedDetector {
    pub boxes: Vec<Detection>,
    pub seen: Arc<Mutex<Vec<(u32, u32, f32)>>>,
    pub fail_on: Option<usize>,
}

impl Detector for ScriptedDetector {
    fn detect(&mut self, image: &RgbImage, confidence: ConfidenceThreshold) -> DomainResult<Vec<Detection>> {
        let mut seen = self.seen.lock().unwrap();
        if self.fail_on == Some(seen.len()) {
            return Err(DomainError::OperationFailed(format!("inference failed on frame {}", seen.len())));
        }
        seen.push((image.width(), image.height(), confidence.value()));
        drop(seen);
        Ok(self
            .boxes
            .iter()
            .filter(|d| d.score >= confidence.value())
            .cloned()
            .collect())
    }
}

pub fn shared(detector: ScriptedDetector) -> SharedDetector {
    Arc::new(Mutex::new(Box::new(detector)))
}

pub fn detection(label: &str, score: f32) -> Detection {
    Detection { x1: 10.0, y1: 10.0, x2: 60.0, y2: 40.0, score, class_id: 0, label: label.into() }
}

/// Loader that counts calls and fails for paths containing "broken".
#[derive(Default)]
pub struct CountingLoader {
    pub calls: AtomicUsize,
}

impl DetectorLoader for CountingLoader {
    fn load(&self, path: &Path) -> DomainResult<Box<dyn Detector>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if path.to_string_lossy().contains("broken") {
            return Err(DomainError::Load(format!("{} is not a model", path.display())));
        }
        Ok(Box::new(ScriptedDetector::default()))
    }
}

/// Finite (or endless) synthetic source that records when it is dropped.
pub struct SyntheticSource {
    pub remaining: Option<u64>,
    pub width: u32,
    pub height: u32,
    pub dropped: Arc<AtomicBool>,
    pub reads: Arc<AtomicUsize>,
}

impl SyntheticSource {
    pub fn finite(frames: u64, width: u32, height: u32) -> Self {
        Self {
            remaining: Some(frames),
            width,
            height,
            dropped: Arc::new(AtomicBool::new(false)),
            reads: Arc::new(AtomicUsize::new(0)),
        }
    }

    pub fn endless(width: u32, height: u32) -> Self {
        Self {
            remaining: None,
            width,
            height,
            dropped: Arc::new(AtomicBool::new(false)),
            reads: Arc::new(AtomicUsize::new(0)),
        }
    }
}

impl FrameSource for SyntheticSource {
    fn next_frame(&mut self) -> Option<RgbImage> {
        self.reads.fetch_add(1, Ordering::SeqCst);
        if let Some(remaining) = self.remaining.as_mut() {
            if *remaining == 0 {
                return None;
            }
            *remaining -= 1;
        }
        Some(RgbImage::from_pixel(self.width, self.height, Rgb([90, 120, 150])))
    }

    fn info(&self) -> SourceInfo {
        SourceInfo {
            width: self.width,
            height: self.height,
            fps: Some(30.0),
            frame_count: self.remaining,
        }
    }
}

impl Drop for SyntheticSource {
    fn drop(&mut self) {
        self.dropped.store(true, Ordering::SeqCst);
    }
}

/// Source whose very first read fails.
pub struct BrokenSource {
    pub dropped: Arc<AtomicBool>,
}

impl FrameSource for BrokenSource {
    fn next_frame(&mut self) -> Option<RgbImage> {
        None
    }
}

impl Drop for BrokenSource {
    fn drop(&mut self) {
        self.dropped.store(true, Ordering::SeqCst);
    }
}

#[derive(Default)]
pub struct RecordingSink {
    pub frames: Vec<(FrameMeta, (u32, u32))>,
}

impl FrameSink for RecordingSink {
    fn show(&mut self, meta: &FrameMeta, annotated: &RgbImage) {
        self.frames.push((meta.clone(), annotated.dimensions()));
    }
}
