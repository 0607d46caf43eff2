use std::path::Path;
use tracing::{error, info};

use crate::application::ports::{FrameWriter, VideoSourcePort};
use crate::domain::{
    errors::DomainResult,
    sampling::{frame_file_name, FrameInterval, SampleReport},
};

/// Extracts every Nth frame of a video into still images.
#[derive(Debug, Clone, Copy)]
pub struct FrameSampler {
    interval: FrameInterval,
}

impl FrameSampler {
    /// Fails with a configuration error for intervals below 1, before any
    /// source is touched.
    pub fn new(interval: i64) -> DomainResult<Self> {
        Ok(Self { interval: FrameInterval::new(interval)? })
    }

    pub fn interval(&self) -> FrameInterval {
        self.interval
    }

    pub fn run(
        &self,
        videos: &dyn VideoSourcePort,
        input: &Path,
        writer: &mut dyn FrameWriter,
    ) -> DomainResult<SampleReport> {
        let mut source = videos.open_video(input).map_err(|e| {
            error!("could not open video {}: {e}", input.display());
            e
        })?;

        let info = source.info();
        if let Some(fps) = info.fps {
            info!("video fps: {fps}");
        }
        if let Some(count) = info.frame_count {
            info!("total frames: {count}");
        }

        let mut report = SampleReport::default();
        let mut index: u64 = 0;
        while let Some(frame) = source.next_frame() {
            if self.interval.keeps(index) {
                let path = writer.write(&frame_file_name(index), &frame)?;
                report.written.push(path);
            }
            index += 1;
        }
        report.frames_read = index;
        info!("no frame at index {index}, closing source");
        drop(source);

        info!(
            "sampled {} of {} frames (interval {})",
            report.written.len(),
            report.frames_read,
            self.interval.get()
        );
        Ok(report)
    }
}
