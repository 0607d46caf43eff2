use clap::Parser;

use yolo_studio::adapters::video::{ffmpeg::FfmpegVideos, jpeg_writer::JpegFrameWriter};
use yolo_studio::application::sampler::FrameSampler;
use yolo_studio::config::SamplerConfig;

fn main() -> anyhow::Result<()> {
    yolo_studio::init_tracing();
    let cfg = SamplerConfig::parse();

    // Reject bad strides before touching the video.
    let sampler = FrameSampler::new(cfg.interval)?;
    let videos = FfmpegVideos::new();
    let mut writer = JpegFrameWriter::new(&cfg.output)?;

    tracing::info!(
        "sampling {} into {} every {} frames",
        cfg.input.display(),
        cfg.output.display(),
        sampler.interval().get()
    );
    let report = sampler.run(&videos, &cfg.input, &mut writer)?;
    tracing::info!("wrote {} frames", report.written.len());
    Ok(())
}
