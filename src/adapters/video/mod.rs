pub mod ffmpeg;
pub mod jpeg_writer;
