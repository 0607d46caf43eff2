use image::{ImageError, ImageFormat, RgbImage};
use std::path::{Path, PathBuf};

use crate::application::ports::FrameWriter;
use crate::domain::errors::{DomainError, DomainResult};

/// Writes sampled frames as JPEG files into one directory.
pub struct JpegFrameWriter {
    output_dir: PathBuf,
}

impl JpegFrameWriter {
    /// Creates `output_dir` if it does not exist yet.
    pub fn new(output_dir: impl AsRef<Path>) -> DomainResult<Self> {
        let output_dir = output_dir.as_ref().to_path_buf();
        std::fs::create_dir_all(&output_dir)?;
        Ok(Self { output_dir })
    }
}

impl FrameWriter for JpegFrameWriter {
    fn write(&mut self, file_name: &str, frame: &RgbImage) -> DomainResult<PathBuf> {
        let path = self.output_dir.join(file_name);
        frame.save_with_format(&path, ImageFormat::Jpeg).map_err(|e| match e {
            ImageError::IoError(io) => DomainError::Io(io),
            other => DomainError::OperationFailed(format!("{}: {other}", path.display())),
        })?;
        Ok(path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn writes_jpeg_and_creates_directory() {
        let tmp = tempfile::tempdir().unwrap();
        let out = tmp.path().join("nested/frames");
        let mut writer = JpegFrameWriter::new(&out).unwrap();

        let path = writer.write("frame_0000.jpg", &RgbImage::new(8, 8)).unwrap();
        assert_eq!(path, out.join("frame_0000.jpg"));
        let decoded = image::open(&path).unwrap();
        assert_eq!((decoded.width(), decoded.height()), (8, 8));
    }
}
