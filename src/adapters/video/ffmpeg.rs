use ez_ffmpeg::core::context::null_output::create_null_output;
use ez_ffmpeg::filter::frame_filter::FrameFilter;
use ez_ffmpeg::filter::frame_filter_context::FrameFilterContext;
use ez_ffmpeg::filter::frame_pipeline_builder::FramePipelineBuilder;
use ez_ffmpeg::stream_info::{find_video_stream_info, StreamInfo};
use ez_ffmpeg::{AVMediaType, FfmpegContext, Frame, Input};
use image::RgbImage;
use std::io::Write;
use std::path::Path;
use std::sync::mpsc::{self, Receiver, Sender, SyncSender};
use std::thread::JoinHandle;
use tempfile::NamedTempFile;
use tracing::{debug, info, warn};

use crate::application::ports::{FrameSource, SourceInfo, VideoSourcePort};
use crate::domain::errors::{DomainError, DomainResult};

/// Decoded frames buffered ahead of the inference loop.
const FRAME_QUEUE: usize = 4;

/// Decodes video files in-process with ez-ffmpeg into packed RGB24 frames.
#[derive(Debug, Default, Clone, Copy)]
pub struct FfmpegVideos;

impl FfmpegVideos {
    pub fn new() -> Self {
        Self
    }
}

impl VideoSourcePort for FfmpegVideos {
    fn open_video(&self, path: &Path) -> DomainResult<Box<dyn FrameSource>> {
        let source = FfmpegVideoSource::open(path, None)
            .map_err(|e| DomainError::SourceOpen(format!("{}: {e}", path.display())))?;
        Ok(Box::new(source))
    }

    fn open_video_bytes(&self, bytes: &[u8]) -> DomainResult<Box<dyn FrameSource>> {
        let mut spool = NamedTempFile::new()?;
        spool.write_all(bytes)?;
        spool.flush()?;
        let path = spool.path().to_path_buf();
        debug!("spooled {} upload bytes to {}", bytes.len(), path.display());

        let source = FfmpegVideoSource::open(&path, Some(spool))
            .map_err(|e| DomainError::SourceOpen(format!("uploaded video: {e}")))?;
        Ok(Box::new(source))
    }
}

/// Frames arrive from a decoder thread through a bounded channel. Dropping the
/// source closes the channel, which stops the decoder at its next frame.
pub struct FfmpegVideoSource {
    frames: Option<Receiver<RgbImage>>,
    pending: Option<RgbImage>,
    worker: Option<JoinHandle<()>>,
    info: SourceInfo,
}

impl FfmpegVideoSource {
    fn open(path: &Path, spool: Option<NamedTempFile>) -> Result<Self, String> {
        let url = path.to_string_lossy().to_string();
        let (fps, frame_count) = probe(&url)?;

        let (tx, rx) = mpsc::sync_channel(FRAME_QUEUE);
        let (ready_tx, ready_rx) = mpsc::channel();
        let worker = std::thread::Builder::new()
            .name("video-decoder".into())
            .spawn(move || {
                // An uploaded file stays on disk until decoding is over.
                let _spool = spool;
                decode(url, tx, ready_tx);
            })
            .map_err(|e| format!("could not spawn decoder: {e}"))?;

        let started = ready_rx
            .recv()
            .unwrap_or_else(|_| Err("decoder exited before starting".to_string()));
        if let Err(e) = started {
            let _ = worker.join();
            return Err(e);
        }

        let source = Self::from_decoder(rx, Some(worker), fps, frame_count);
        info!(
            "video {} open: {}x{}, fps {:?}, frames {:?}",
            path.display(), source.info.width, source.info.height, fps, frame_count
        );
        Ok(source)
    }

    /// Peeks the first frame so the reported size is the decoded one, which
    /// differs from the coded size for rotated clips.
    fn from_decoder(
        frames: Receiver<RgbImage>,
        worker: Option<JoinHandle<()>>,
        fps: Option<f32>,
        frame_count: Option<u64>,
    ) -> Self {
        let pending = frames.recv().ok();
        let (width, height) = pending.as_ref().map(RgbImage::dimensions).unwrap_or((0, 0));
        Self {
            frames: Some(frames),
            pending,
            worker,
            info: SourceInfo { width, height, fps, frame_count },
        }
    }
}

impl FrameSource for FfmpegVideoSource {
    fn next_frame(&mut self) -> Option<RgbImage> {
        if let Some(frame) = self.pending.take() {
            return Some(frame);
        }
        self.frames.as_ref()?.recv().ok()
    }

    fn info(&self) -> SourceInfo {
        self.info
    }
}

impl Drop for FfmpegVideoSource {
    fn drop(&mut self) {
        self.frames.take();
        self.pending.take();
        if let Some(worker) = self.worker.take() {
            if worker.join().is_err() {
                warn!("video decoder thread panicked");
            }
        }
    }
}

fn probe(url: &str) -> Result<(Option<f32>, Option<u64>), String> {
    match find_video_stream_info(url) {
        Ok(Some(StreamInfo::Video { fps, nb_frames, .. })) => Ok(stream_rate(fps, nb_frames)),
        Ok(_) => Err("no video stream".to_string()),
        Err(e) => Err(format!("cannot read stream info: {e}")),
    }
}

/// Containers report unknown rates and counts as zero or negative.
fn stream_rate(fps: f64, nb_frames: i64) -> (Option<f32>, Option<u64>) {
    let fps = (fps.is_finite() && fps > 0.0).then_some(fps as f32);
    let frame_count = u64::try_from(nb_frames).ok().filter(|&n| n > 0);
    (fps, frame_count)
}

fn decode(url: String, frames: SyncSender<RgbImage>, ready: Sender<Result<(), String>>) {
    let pipe: FramePipelineBuilder = AVMediaType::AVMEDIA_TYPE_VIDEO.into();
    let pipe = pipe.filter("rgb24", Box::new(RgbFrameFilter { frames }));
    let out = create_null_output().add_frame_pipeline(pipe);

    let ctx = match FfmpegContext::builder()
        .input(Input::new(url.as_str()))
        .filter_descs(["format=rgb24"].into())
        .output(out)
        .build()
    {
        Ok(ctx) => ctx,
        Err(e) => {
            let _ = ready.send(Err(format!("decoder build failed: {e}")));
            return;
        }
    };
    let sch = match ctx.start() {
        Ok(sch) => sch,
        Err(e) => {
            let _ = ready.send(Err(format!("decoder start failed: {e}")));
            return;
        }
    };
    let _ = ready.send(Ok(()));

    let _ = sch.wait();
    debug!("video decoder for {url} finished");
}

/// Copies each RGB24 frame out of the ffmpeg buffer and hands it to the source.
struct RgbFrameFilter {
    frames: SyncSender<RgbImage>,
}

impl FrameFilter for RgbFrameFilter {
    fn media_type(&self) -> AVMediaType {
        AVMediaType::AVMEDIA_TYPE_VIDEO
    }

    fn init(&mut self, _ctx: &FrameFilterContext) -> Result<(), String> {
        debug!("rgb24 frame filter ready");
        Ok(())
    }

    fn filter_frame(&mut self, frame: Frame, _ctx: &FrameFilterContext) -> Result<Option<Frame>, String> {
        if frame.as_ptr().is_null() || frame.is_empty() {
            return Ok(None);
        }

        let image = unsafe {
            let raw = &*frame.as_ptr();
            let (w, h, stride) = (raw.width, raw.height, raw.linesize[0]);
            if raw.data[0].is_null() || w <= 0 || h <= 0 || stride < w * 3 {
                return Ok(None);
            }
            let len = stride as usize * (h as usize - 1) + w as usize * 3;
            let plane = std::slice::from_raw_parts(raw.data[0], len);
            pack_rgb_rows(plane, w as u32, h as u32, stride as usize)
        };
        let Some(image) = image else {
            return Ok(None);
        };

        // A closed channel means the source was dropped: abort decoding.
        self.frames
            .send(image)
            .map_err(|_| "frame receiver dropped".to_string())?;
        Ok(None)
    }
}

/// Strips row padding from an RGB24 plane. The size always comes from the
/// decoded frame itself.
fn pack_rgb_rows(plane: &[u8], width: u32, height: u32, stride: usize) -> Option<RgbImage> {
    let row = width as usize * 3;
    if stride < row {
        return None;
    }
    let mut buf = Vec::with_capacity(row * height as usize);
    for y in 0..height as usize {
        let start = y * stride;
        buf.extend_from_slice(plane.get(start..start + row)?);
    }
    RgbImage::from_raw(width, height, buf)
}
