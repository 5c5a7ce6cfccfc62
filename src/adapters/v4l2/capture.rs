use anyhow::{anyhow, Context, Result};
use image::{ImageFormat, RgbImage};
use v4l::format::FourCC;
use v4l::io::mmap::Stream;
use v4l::io::traits::CaptureStream;
use v4l::video::Capture;
use v4l::Device;

use super::camera_repo::parse_fourcc;
use crate::domain::camera::CameraMode;

/// MMAP capture on an open device. Dropping it stops streaming; the
/// device itself is closed by its owner.
pub struct V4l2Capture<'a> {
    stream: Stream<'a>,
    fourcc: FourCC,
    width: u32,
    height: u32,
}

impl<'a> V4l2Capture<'a> {
    /// Apply `mode` to the device and start streaming. The driver may
    /// settle on the nearest size it supports.
    pub fn open(dev: &'a Device, mode: &CameraMode) -> Result<Self> {
        let mut fmt = dev.format().context("reading format")?;
        fmt.fourcc = parse_fourcc(&mode.format)
            .ok_or_else(|| anyhow!("fourcc must be 4 characters: {:?}", mode.format))?;
        fmt.width = mode.size.width;
        fmt.height = mode.size.height;
        let actual = dev.set_format(&fmt).context("setting format")?;

        let mut params = dev.params().context("reading stream params")?;
        params.interval.numerator = 1;
        params.interval.denominator = mode.fps;
        if let Err(e) = dev.set_params(&params) {
            tracing::warn!(fps = mode.fps, "Frame rate not accepted: {e}");
        }

        let stream = Stream::with_buffers(dev, v4l::buffer::Type::VideoCapture, 4)
            .context("mapping capture buffers")?;

        tracing::info!(
            "Camera streaming {}x{} [{}] at {} fps",
            actual.width,
            actual.height,
            actual.fourcc,
            mode.fps
        );
        Ok(Self {
            stream,
            fourcc: actual.fourcc,
            width: actual.width,
            height: actual.height,
        })
    }

    /// Block for the next frame and decode it to RGB.
    pub fn next_rgb(&mut self) -> Result<RgbImage> {
        let (data, _) = self.stream.next().context("dequeuing frame")?;
        let fourcc = self.fourcc.str().map_err(|_| anyhow!("invalid fourcc"))?;

        match fourcc {
            "MJPG" => Ok(image::load_from_memory_with_format(data, ImageFormat::Jpeg)?.to_rgb8()),
            "YUYV" => Ok(yuyv_to_rgb(data, self.width, self.height)),
            other => Err(anyhow!("pixel format {other} is not supported")),
        }
    }
}

/// YUYV 4:2:2 to RGB (BT.601). Every 4 bytes `[Y0, U, Y1, V]` give two pixels.
fn yuyv_to_rgb(yuyv: &[u8], w: u32, h: u32) -> RgbImage {
    let mut out = RgbImage::new(w, h);
    let convert = |y: f32, u: f32, v: f32| {
        image::Rgb([
            (y + 1.402 * v).clamp(0.0, 255.0) as u8,
            (y - 0.344136 * u - 0.714136 * v).clamp(0.0, 255.0) as u8,
            (y + 1.772 * u).clamp(0.0, 255.0) as u8,
        ])
    };

    for (i, chunk) in yuyv.chunks_exact(4).enumerate() {
        let u = chunk[1] as f32 - 128.0;
        let v = chunk[3] as f32 - 128.0;

        let idx = i as u32 * 2;
        let (x, y) = (idx % w, idx / w);
        if y >= h {
            break;
        }
        out.put_pixel(x, y, convert(chunk[0] as f32, u, v));
        if x + 1 < w {
            out.put_pixel(x + 1, y, convert(chunk[2] as f32, u, v));
        }
    }
    out
}
