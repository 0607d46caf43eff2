use ab_glyph::{FontArc, PxScale};
use image::{imageops::FilterType, ImageFormat, Rgb, RgbImage};
use imageproc::drawing::{draw_filled_rect_mut, draw_hollow_rect_mut, draw_text_mut, text_size};
use imageproc::rect::Rect;
use std::io::Cursor;

use crate::domain::{
    detection::Detection,
    errors::{DomainError, DomainResult},
    stream::{STREAM_FRAME_HEIGHT, STREAM_FRAME_WIDTH},
};

const BOX_THICKNESS: i32 = 2;
const LABEL_SCALE: f32 = 16.0;

const PALETTE: [[u8; 3]; 10] = [
    [255, 56, 56],
    [255, 157, 151],
    [255, 112, 31],
    [255, 178, 29],
    [207, 210, 49],
    [72, 249, 10],
    [26, 147, 52],
    [0, 212, 187],
    [52, 69, 147],
    [203, 56, 255],
];

fn class_color(class_id: usize) -> Rgb<u8> {
    Rgb(PALETTE[class_id % PALETTE.len()])
}

/// Draws detections onto a copy of the frame. Without a font, labels are
/// reduced to a coloured tab above each box.
#[derive(Clone, Default)]
pub struct Annotator {
    font: Option<FontArc>,
}

impl Annotator {
    pub fn new(font: Option<FontArc>) -> Self {
        Self { font }
    }

    pub fn from_font_bytes(bytes: Vec<u8>) -> DomainResult<Self> {
        let font = FontArc::try_from_vec(bytes)
            .map_err(|e| DomainError::InvalidInput(format!("font: {e}")))?;
        Ok(Self { font: Some(font) })
    }

    pub fn annotate(&self, image: &RgbImage, detections: &[Detection]) -> RgbImage {
        let mut out = image.clone();
        let (w, h) = out.dimensions();
        if w == 0 || h == 0 {
            return out;
        }

        for det in detections {
            let color = class_color(det.class_id);
            let x1 = det.x1.clamp(0.0, (w - 1) as f32) as i32;
            let y1 = det.y1.clamp(0.0, (h - 1) as f32) as i32;
            let x2 = det.x2.clamp(0.0, (w - 1) as f32) as i32;
            let y2 = det.y2.clamp(0.0, (h - 1) as f32) as i32;
            if x2 <= x1 || y2 <= y1 {
                continue;
            }

            for t in 0..BOX_THICKNESS {
                let bw = (x2 - x1 - 2 * t).max(1) as u32;
                let bh = (y2 - y1 - 2 * t).max(1) as u32;
                draw_hollow_rect_mut(&mut out, Rect::at(x1 + t, y1 + t).of_size(bw, bh), color);
            }

            let caption = format!("{} {:.2}", det.label, det.score);
            let (tw, th) = match &self.font {
                Some(font) => text_size(PxScale::from(LABEL_SCALE), font, &caption),
                None => (((x2 - x1) as u32).min(48), 6),
            };
            let tab_h = th + 4;
            let tab_y = if y1 >= tab_h as i32 { y1 - tab_h as i32 } else { y1 };
            draw_filled_rect_mut(&mut out, Rect::at(x1, tab_y).of_size(tw + 4, tab_h), color);
            if let Some(font) = &self.font {
                draw_text_mut(
                    &mut out,
                    Rgb([255, 255, 255]),
                    x1 + 2,
                    tab_y + 2,
                    PxScale::from(LABEL_SCALE),
                    font,
                    &caption,
                );
            }
        }
        out
    }
}

/// Scales a streamed frame to the fixed 720x405 inference size.
pub fn resize_for_stream(frame: &RgbImage) -> RgbImage {
    if frame.dimensions() == (STREAM_FRAME_WIDTH, STREAM_FRAME_HEIGHT) {
        return frame.clone();
    }
    image::imageops::resize(frame, STREAM_FRAME_WIDTH, STREAM_FRAME_HEIGHT, FilterType::Triangle)
}

pub fn decode_image(bytes: &[u8]) -> DomainResult<RgbImage> {
    let format = image::guess_format(bytes)
        .map_err(|e| DomainError::InvalidInput(format!("unrecognised image: {e}")))?;
    if !matches!(
        format,
        ImageFormat::Jpeg | ImageFormat::Png | ImageFormat::Bmp | ImageFormat::WebP
    ) {
        return Err(DomainError::InvalidInput(format!("unsupported image format {format:?}")));
    }
    let img = image::load_from_memory_with_format(bytes, format)
        .map_err(|e| DomainError::InvalidInput(format!("image decode failed: {e}")))?;
    Ok(img.to_rgb8())
}

pub fn encode_jpeg(image: &RgbImage, quality: u8) -> DomainResult<Vec<u8>> {
    let mut jpeg = Vec::new();
    let mut enc = image::codecs::jpeg::JpegEncoder::new_with_quality(Cursor::new(&mut jpeg), quality);
    enc.encode(image.as_raw(), image.width(), image.height(), image::ExtendedColorType::Rgb8)
        .map_err(|e| DomainError::OperationFailed(format!("jpeg encode failed: {e}")))?;
    Ok(jpeg)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn det(x1: f32, y1: f32, x2: f32, y2: f32) -> Detection {
        Detection { x1, y1, x2, y2, score: 0.8, class_id: 3, label: "car".into() }
    }

    #[test]
    fn no_detections_leaves_pixels_untouched() {
        let img = RgbImage::from_pixel(64, 48, Rgb([10, 20, 30]));
        let out = Annotator::default().annotate(&img, &[]);
        assert_eq!(out, img);
    }

    #[test]
    fn box_outline_is_drawn_in_class_colour() {
        let img = RgbImage::from_pixel(100, 100, Rgb([0, 0, 0]));
        let out = Annotator::default().annotate(&img, &[det(20.0, 30.0, 80.0, 90.0)]);
        assert_eq!(*out.get_pixel(50, 89), class_color(3));
        // interior untouched
        assert_eq!(*out.get_pixel(50, 60), Rgb([0, 0, 0]));
    }

    #[test]
    fn out_of_bounds_boxes_are_clamped() {
        let img = RgbImage::from_pixel(32, 32, Rgb([0, 0, 0]));
        let out = Annotator::default().annotate(&img, &[det(-50.0, -50.0, 500.0, 500.0)]);
        assert_eq!(out.dimensions(), (32, 32));
    }

    #[test]
    fn hd_frame_resizes_to_720x405() {
        let frame = RgbImage::new(1280, 720);
        assert_eq!(resize_for_stream(&frame).dimensions(), (720, 405));
    }

    #[test]
    fn jpeg_round_trip_keeps_dimensions() {
        let img = RgbImage::from_pixel(40, 30, Rgb([200, 100, 50]));
        let bytes = encode_jpeg(&img, 90).unwrap();
        assert_eq!(decode_image(&bytes).unwrap().dimensions(), (40, 30));
    }

    #[test]
    fn garbage_bytes_are_invalid_input() {
        assert!(matches!(decode_image(b"not an image"), Err(DomainError::InvalidInput(_))));
    }
}
