use image::RgbImage;
use std::time::Instant;

/// One captured frame. Lives for a single detection + render cycle.
#[derive(Debug, Clone)]
pub struct Frame {
    pub seq: u64,
    pub image: RgbImage,
    pub captured_at: Instant,
}

impl Frame {
    pub fn new(seq: u64, image: RgbImage) -> Self {
        Self { seq, image, captured_at: Instant::now() }
    }

    pub fn width(&self) -> u32 {
        self.image.width()
    }

    pub fn height(&self) -> u32 {
        self.image.height()
    }
}
