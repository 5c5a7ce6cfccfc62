use std::path::Path;

use ab_glyph::{FontVec, PxScale};
use anyhow::{anyhow, Context, Result};
use image::codecs::jpeg::JpegEncoder;
use image::{ExtendedColorType, Rgb, RgbImage};
use imageproc::drawing::{draw_hollow_rect_mut, draw_text_mut};
use imageproc::rect::Rect;

use crate::application::ports::FrameRenderer;
use crate::domain::detection::Detection;
use crate::domain::errors::{DomainError, DomainResult};
use crate::domain::frame::Frame;
use crate::domain::geometry::{BBox, Roi};

const DETECTION_COLOR: Rgb<u8> = Rgb([255, 0, 0]);
const ROI_COLOR: Rgb<u8> = Rgb([0, 0, 255]);
const CAPTION_SCALE: f32 = 16.0;

/// Red detection boxes with their captions and a blue ROI outline, JPEG encoded.
pub struct JpegOverlayRenderer {
    quality: u8,
    font: Option<FontVec>,
}

impl JpegOverlayRenderer {
    pub fn new(quality: u8) -> Self {
        Self { quality: quality.clamp(1, 100), font: None }
    }

    /// Captions are only drawn once a font is set.
    pub fn with_font(mut self, font: FontVec) -> Self {
        self.font = Some(font);
        self
    }

    pub fn with_font_file(self, path: &Path) -> Result<Self> {
        let bytes = std::fs::read(path).with_context(|| format!("reading font {}", path.display()))?;
        let font = FontVec::try_from_vec(bytes).map_err(|e| anyhow!("font {}: {e}", path.display()))?;
        Ok(self.with_font(font))
    }

    pub fn draws_captions(&self) -> bool {
        self.font.is_some()
    }
}

impl Default for JpegOverlayRenderer {
    fn default() -> Self {
        Self::new(80)
    }
}

impl FrameRenderer for JpegOverlayRenderer {
    fn render(&self, frame: &Frame, detections: &[Detection], roi: &Roi) -> DomainResult<Vec<u8>> {
        let mut canvas = frame.image.clone();
        outline(&mut canvas, &roi.as_bbox(), ROI_COLOR);
        for d in detections {
            outline(&mut canvas, &d.bbox, DETECTION_COLOR);
            if let Some(font) = &self.font {
                let (x, y) = caption_origin(&d.bbox);
                draw_text_mut(&mut canvas, DETECTION_COLOR, x, y, PxScale::from(CAPTION_SCALE), font, &d.caption());
            }
        }

        let mut jpeg = Vec::new();
        JpegEncoder::new_with_quality(&mut jpeg, self.quality)
            .encode(canvas.as_raw(), canvas.width(), canvas.height(), ExtendedColorType::Rgb8)
            .map_err(|e| DomainError::OperationFailed(format!("jpeg encoding: {e}")))?;
        Ok(jpeg)
    }
}

/// Two pixel wide outline, clipped to the canvas. Degenerate boxes are skipped.
fn outline(canvas: &mut RgbImage, bbox: &BBox, color: Rgb<u8>) {
    let b = bbox.clamp_to(canvas.width() as f32, canvas.height() as f32);
    let (w, h) = (b.width.round() as u32, b.height.round() as u32);
    if w < 1 || h < 1 {
        return;
    }
    let (x, y) = (b.x.round() as i32, b.y.round() as i32);
    draw_hollow_rect_mut(canvas, Rect::at(x, y).of_size(w, h), color);
    if w > 2 && h > 2 {
        draw_hollow_rect_mut(canvas, Rect::at(x + 1, y + 1).of_size(w - 2, h - 2), color);
    }
}

/// Top-left of the caption. Its baseline sits 5px above the box, or at 10px
/// for boxes touching the top edge.
fn caption_origin(bbox: &BBox) -> (i32, i32) {
    let baseline = if bbox.y > 10.0 { bbox.y - 5.0 } else { 10.0 };
    (bbox.x.round() as i32, (baseline - CAPTION_SCALE).round().max(0.0) as i32)
}
