use anyhow::{Context, Result};
use image::{imageops::FilterType, RgbImage};
use ndarray::{s, Array4, ArrayView2, ArrayViewD, Axis, Ix2, IxDyn};
use ort::execution_providers::{CUDAExecutionProvider, ExecutionProvider};
use ort::session::Session;
use ort::value::Tensor;
use std::fs;
use std::path::Path;
use tracing::info;

use crate::application::ports::{Detector, DetectorLoader};
use crate::domain::detection::Detection;
use crate::domain::errors::{DomainError, DomainResult};
use crate::domain::model::{ConfidenceThreshold, YoloParams};

const COCO_CLASSES: [&str; 80] = [
    "person", "bicycle", "car", "motorcycle", "airplane", "bus", "train", "truck", "boat",
    "traffic light", "fire hydrant", "stop sign", "parking meter", "bench", "bird", "cat", "dog",
    "horse", "sheep", "cow", "elephant", "bear", "zebra", "giraffe", "backpack", "umbrella",
    "handbag", "tie", "suitcase", "frisbee", "skis", "snowboard", "sports ball", "kite",
    "baseball bat", "baseball glove", "skateboard", "surfboard", "tennis racket", "bottle",
    "wine glass", "cup", "fork", "knife", "spoon", "bowl", "banana", "apple", "sandwich",
    "orange", "broccoli", "carrot", "hot dog", "pizza", "donut", "cake", "chair", "couch",
    "potted plant", "bed", "dining table", "toilet", "tv", "laptop", "mouse", "remote",
    "keyboard", "cell phone", "microwave", "oven", "toaster", "sink", "refrigerator", "book",
    "clock", "vase", "scissors", "teddy bear", "hair drier", "toothbrush",
];

pub struct OnnxYoloEngine {
    session: Session,
    params: YoloParams,
    class_names: Vec<String>,
}

impl OnnxYoloEngine {
    pub fn load(path: &Path, params: YoloParams) -> Result<Self> {
        let mut builder = Session::builder()?.with_intra_threads(4)?;

        // CUDA is optional; without it the session runs on the CPU.
        let cuda = CUDAExecutionProvider::default();
        let mut device = "cpu";
        if cuda.is_available().unwrap_or(false) {
            if let Ok(builder_with_cuda) = builder.clone().with_execution_providers([cuda.build()]) {
                builder = builder_with_cuda;
                device = "cuda";
            }
        }

        let model_bytes = fs::read(path)
            .with_context(|| format!("reading weights {}", path.display()))?;
        let session = builder
            .commit_from_memory(&model_bytes)
            .with_context(|| format!("parsing model {}", path.display()))?;

        let class_names = read_class_names(&session)
            .unwrap_or_else(|| COCO_CLASSES.iter().map(|c| c.to_string()).collect());
        info!(
            "model {} ready on {device} ({} classes)",
            path.display(),
            class_names.len()
        );

        Ok(Self { session, params, class_names })
    }

    pub fn infer(&mut self, rgb: &RgbImage, conf_threshold: f32) -> Result<Vec<Detection>> {
        let imgsz = self.params.input_size as usize;
        let resized = image::imageops::resize(rgb, imgsz as u32, imgsz as u32, FilterType::Nearest);

        let mut input = Array4::<f32>::zeros((1, 3, imgsz, imgsz));
        for (x, y, pixel) in resized.enumerate_pixels() {
            input[[0, 0, y as usize, x as usize]] = pixel[0] as f32 / 255.0;
            input[[0, 1, y as usize, x as usize]] = pixel[1] as f32 / 255.0;
            input[[0, 2, y as usize, x as usize]] = pixel[2] as f32 / 255.0;
        }

        let input_shape = vec![1, 3, imgsz as i64, imgsz as i64];
        let (data, _) = input.into_raw_vec_and_offset();
        let input_tensor = Tensor::from_array((input_shape, data))?;

        let outputs = self.session.run(ort::inputs![input_tensor])?;
        let (shape_out, data_out) = outputs[0].try_extract_tensor::<f32>()?;

        let dims: Vec<usize> = shape_out.iter().map(|&x| x as usize).collect();
        let array_view = ArrayViewD::from_shape(IxDyn(&dims), data_out)?;
        let view = array_view.index_axis(Axis(0), 0).into_dimensionality::<Ix2>()?;

        let sx = rgb.width() as f32 / imgsz as f32;
        let sy = rgb.height() as f32 / imgsz as f32;

        let candidates = decode_predictions(view, conf_threshold, (sx, sy), &self.class_names);
        let mut detections = non_max_suppression(candidates, self.params.iou_threshold);
        detections.truncate(self.params.max_detections);
        Ok(detections)
    }
}

impl Detector for OnnxYoloEngine {
    fn detect(&mut self, image: &RgbImage, confidence: ConfidenceThreshold) -> DomainResult<Vec<Detection>> {
        self.infer(image, confidence.value())
            .map_err(|e| DomainError::OperationFailed(format!("inference failed: {e:#}")))
    }
}

/// Builds [`OnnxYoloEngine`]s for the model cache.
pub struct OnnxDetectorLoader {
    params: YoloParams,
}

impl OnnxDetectorLoader {
    pub fn new(params: YoloParams) -> Self {
        Self { params }
    }
}

impl DetectorLoader for OnnxDetectorLoader {
    fn load(&self, path: &Path) -> DomainResult<Box<dyn Detector>> {
        let engine = OnnxYoloEngine::load(path, self.params.clone())
            .map_err(|e| DomainError::Load(format!("{}: {e:#}", path.display())))?;
        Ok(Box::new(engine))
    }
}

/// Ultralytics exports store class names as a python dict literal under the
/// `names` metadata key, e.g. `{0: 'person', 1: 'bicycle'}`.
fn read_class_names(session: &Session) -> Option<Vec<String>> {
    let metadata = session.metadata().ok()?;
    let raw = metadata.custom("names").ok()??;
    parse_class_names(&raw)
}

fn parse_class_names(raw: &str) -> Option<Vec<String>> {
    let body = raw.trim().trim_start_matches('{').trim_end_matches('}');
    let mut entries: Vec<(usize, String)> = body
        .split(',')
        .filter_map(|part| {
            let (key, value) = part.split_once(':')?;
            let id = key.trim().parse::<usize>().ok()?;
            let name = value.trim().trim_matches(|c| c == '\'' || c == '"');
            Some((id, name.to_string()))
        })
        .collect();
    if entries.is_empty() {
        return None;
    }
    entries.sort_by_key(|(id, _)| *id);
    Some(entries.into_iter().map(|(_, name)| name).collect())
}

/// Turns a `[4 + classes, candidates]` YOLOv8 head into boxes above the
/// threshold, scaled back to the source image.
fn decode_predictions(
    view: ArrayView2<f32>,
    conf_threshold: f32,
    (sx, sy): (f32, f32),
    class_names: &[String],
) -> Vec<Detection> {
    let mut detections = Vec::new();
    if view.shape()[0] <= 4 {
        return detections;
    }

    for i in 0..view.shape()[1] {
        let scores = view.slice(s![4.., i]);
        let Some((class_id, &max_score)) = scores
            .indexed_iter()
            .max_by(|(_, a), (_, b)| a.total_cmp(b))
        else {
            continue;
        };

        if max_score >= conf_threshold {
            let cx = view[[0, i]];
            let cy = view[[1, i]];
            let w = view[[2, i]];
            let h = view[[3, i]];

            detections.push(Detection {
                x1: (cx - w / 2.0) * sx,
                y1: (cy - h / 2.0) * sy,
                x2: (cx + w / 2.0) * sx,
                y2: (cy + h / 2.0) * sy,
                score: max_score,
                class_id,
                label: class_names
                    .get(class_id)
                    .cloned()
                    .unwrap_or_else(|| format!("class {class_id}")),
            });
        }
    }
    detections
}

/// Greedy per-class NMS; output is sorted by score, highest first.
fn non_max_suppression(mut boxes: Vec<Detection>, iou_threshold: f32) -> Vec<Detection> {
    boxes.sort_unstable_by(|a, b| b.score.total_cmp(&a.score));

    let mut kept: Vec<Detection> = Vec::new();
    for candidate in boxes {
        let overlaps = kept
            .iter()
            .any(|k| k.class_id == candidate.class_id && k.iou(&candidate) > iou_threshold);
        if !overlaps {
            kept.push(candidate);
        }
    }
    kept
}
