use anyhow::{anyhow, bail, Result};
use image::{imageops::FilterType, RgbImage};
use ndarray::{s, ArrayView2, Axis};
use ort::execution_providers::CUDAExecutionProvider;
use ort::session::Session;
use ort::value::Tensor;
use tracing::{debug, info};

use crate::application::ports::{Detector, DetectorLoader};
use crate::domain::detection::Prediction;
use crate::domain::errors::{DomainError, DomainResult};
use crate::domain::frame::Frame;
use crate::domain::geometry::BBox;
use crate::domain::model::{DetectOptions, InferenceConfig};

pub struct OnnxYoloEngine {
    session: Session,
    input_size: u32,
    iou_threshold: f32,
    labels: Vec<String>,
}

impl OnnxYoloEngine {
    pub fn load(config: &InferenceConfig) -> Result<Self> {
        let mut builder = Session::builder()
            .map_err(|e| anyhow!("session builder: {e}"))?
            .with_intra_threads(config.intra_threads)
            .map_err(|e| anyhow!("intra threads: {e}"))?;

        // CUDA is optional: registered when available, CPU otherwise.
        let cuda = CUDAExecutionProvider::default().build();
        if let Ok(with_cuda) = builder.clone().with_execution_providers([cuda]) {
            builder = with_cuda;
        }

        let session = builder
            .commit_from_file(&config.model.onnx_path)
            .map_err(|e| anyhow!("loading {}: {e}", config.model.onnx_path))?;

        info!(
            model = %config.model.name,
            input_size = config.input_size,
            classes = config.labels.len(),
            "ONNX session ready"
        );
        Ok(Self {
            session,
            input_size: config.input_size,
            iou_threshold: config.iou_threshold,
            labels: config.labels.clone(),
        })
    }

    pub fn infer(&mut self, rgb: &RgbImage, options: &DetectOptions) -> Result<Vec<Prediction>> {
        let imgsz = self.input_size as usize;
        let resized = image::imageops::resize(rgb, self.input_size, self.input_size, FilterType::Nearest);

        // NCHW, 0..1
        let plane = imgsz * imgsz;
        let mut input = vec![0f32; 3 * plane];
        for (x, y, pixel) in resized.enumerate_pixels() {
            let i = y as usize * imgsz + x as usize;
            input[i] = pixel[0] as f32 / 255.0;
            input[plane + i] = pixel[1] as f32 / 255.0;
            input[2 * plane + i] = pixel[2] as f32 / 255.0;
        }
        let tensor = Tensor::from_array(([1usize, 3, imgsz, imgsz], input))
            .map_err(|e| anyhow!("input tensor: {e}"))?;

        let outputs = self
            .session
            .run(ort::inputs![tensor])
            .map_err(|e| anyhow!("session run: {e}"))?;
        let (shape, data) = outputs[0]
            .try_extract_tensor::<f32>()
            .map_err(|e| anyhow!("output tensor: {e}"))?;
        let dims: Vec<usize> = shape.iter().map(|&d| d as usize).collect();

        let scale = (
            rgb.width() as f32 / imgsz as f32,
            rgb.height() as f32 / imgsz as f32,
        );
        let candidates = decode_output(&dims, data, &self.labels, scale, options.min_score)?;
        let mut kept = non_max_suppression(candidates, self.iou_threshold);
        kept.truncate(options.max_results);

        let (w, h) = (rgb.width() as f32, rgb.height() as f32);
        for p in &mut kept {
            p.bbox = p.bbox.clamp_to(w, h);
        }
        debug!(kept = kept.len(), "Inference done");
        Ok(kept)
    }
}

impl Detector for OnnxYoloEngine {
    fn detect(&mut self, frame: &Frame, options: &DetectOptions) -> DomainResult<Vec<Prediction>> {
        self.infer(&frame.image, options)
            .map_err(|e| DomainError::Inference(format!("{e:#}")))
    }
}

/// Builds an [`OnnxYoloEngine`] inside the detection worker thread.
pub struct OnnxDetectorLoader;

impl DetectorLoader for OnnxDetectorLoader {
    fn load(&self, config: &InferenceConfig) -> DomainResult<Box<dyn Detector>> {
        let engine = OnnxYoloEngine::load(config).map_err(|e| DomainError::ModelLoad(format!("{e:#}")))?;
        Ok(Box::new(engine))
    }
}

/// Decode a YOLOv8-style `[1, 4 + classes, candidates]` output (cx, cy, w, h, scores...).
fn decode_output(
    dims: &[usize],
    data: &[f32],
    labels: &[String],
    (sx, sy): (f32, f32),
    min_score: f32,
) -> Result<Vec<Prediction>> {
    let [1, rows, candidates] = dims else {
        bail!("unexpected output shape {dims:?}");
    };
    if *rows <= 4 {
        bail!("output has no class scores: {dims:?}");
    }
    let view = ArrayView2::from_shape((*rows, *candidates), data)?;

    let mut out = Vec::new();
    for (i, column) in view.axis_iter(Axis(1)).enumerate() {
        let scores = column.slice(s![4..]);
        let Some((class_id, &score)) = scores
            .indexed_iter()
            .max_by(|(_, a), (_, b)| a.total_cmp(b))
        else {
            continue;
        };
        if score < min_score {
            continue;
        }

        let (cx, cy, w, h) = (view[[0, i]], view[[1, i]], view[[2, i]], view[[3, i]]);
        let label = labels
            .get(class_id)
            .cloned()
            .unwrap_or_else(|| format!("class_{class_id}"));
        out.push(Prediction::new(
            label,
            score,
            BBox::from_tlbr((cx - w / 2.0) * sx, (cy - h / 2.0) * sy, (cx + w / 2.0) * sx, (cy + h / 2.0) * sy),
        ));
    }
    Ok(out)
}

/// Greedy per-label NMS. Output is sorted by descending score.
fn non_max_suppression(mut predictions: Vec<Prediction>, iou_threshold: f32) -> Vec<Prediction> {
    predictions.sort_unstable_by(|a, b| b.score.total_cmp(&a.score));
    let mut kept: Vec<Prediction> = Vec::with_capacity(predictions.len());
    for p in predictions {
        let suppressed = kept
            .iter()
            .any(|k| k.label == p.label && k.bbox.iou(&p.bbox) > iou_threshold);
        if !suppressed {
            kept.push(p);
        }
    }
    kept
}

#[cfg(test)]
mod tests {
    use super::*;

    fn labels() -> Vec<String> {
        vec!["bottle".into(), "can".into()]
    }

    /// Column-major helper: each candidate is [cx, cy, w, h, s0, s1].
    fn output(cands: &[[f32; 6]]) -> Vec<f32> {
        let n = cands.len();
        let mut data = vec![0f32; 6 * n];
        for (i, c) in cands.iter().enumerate() {
            for (r, v) in c.iter().enumerate() {
                data[r * n + i] = *v;
            }
        }
        data
    }

    #[test]
    fn decodes_best_class_and_scales_boxes() {
        let data = output(&[[50.0, 50.0, 20.0, 10.0, 0.1, 0.8], [10.0, 10.0, 4.0, 4.0, 0.3, 0.2]]);
        let preds = decode_output(&[1, 6, 2], &data, &labels(), (2.0, 1.0), 0.5).unwrap();
        assert_eq!(preds.len(), 1);
        assert_eq!(preds[0].label, "can");
        assert_eq!(preds[0].bbox, BBox::new(80.0, 45.0, 40.0, 10.0));
    }

    #[test]
    fn min_score_is_inclusive() {
        let data = output(&[[5.0, 5.0, 2.0, 2.0, 0.5, 0.0]]);
        let preds = decode_output(&[1, 6, 1], &data, &labels(), (1.0, 1.0), 0.5).unwrap();
        assert_eq!(preds.len(), 1);
    }

    #[test]
    fn rejects_unexpected_shapes() {
        assert!(decode_output(&[6, 2], &[0.0; 12], &labels(), (1.0, 1.0), 0.5).is_err());
        assert!(decode_output(&[1, 4, 3], &[0.0; 12], &labels(), (1.0, 1.0), 0.5).is_err());
    }

    #[test]
    fn nms_keeps_best_of_overlapping_same_label() {
        let preds = vec![
            Prediction::new("bottle", 0.6, BBox::new(0.0, 0.0, 10.0, 10.0)),
            Prediction::new("bottle", 0.9, BBox::new(1.0, 0.0, 10.0, 10.0)),
            Prediction::new("can", 0.7, BBox::new(0.0, 0.0, 10.0, 10.0)),
            Prediction::new("bottle", 0.5, BBox::new(50.0, 50.0, 10.0, 10.0)),
        ];
        let kept = non_max_suppression(preds, 0.45);
        let scores: Vec<f32> = kept.iter().map(|p| p.score).collect();
        assert_eq!(scores, vec![0.9, 0.7, 0.5]);
    }
}
