//! YOLOv8 output decoding and the ONNX Runtime person detector

use crate::error::VisionError;
use crate::processing::{non_max_suppression, Letterbox};
use climasight_core::{BoundingBox, DetectionFilter};
use tracing::debug;

/// Number of box coordinates ahead of the class scores in each prediction.
const BOX_FIELDS: usize = 4;

/// Decode a raw YOLOv8 head output into frame-space boxes.
///
/// `shape` is `[1, 4 + classes, anchors]` (the exported layout) or its transpose
/// `[1, anchors, 4 + classes]`. Each prediction is `(cx, cy, w, h)` in network input
/// pixels followed by per-class scores. Only predictions whose best class passes
/// `filter` survive, then NMS runs with `iou_threshold`.
pub fn decode_yolov8(
    output: &[f32],
    shape: &[usize],
    letterbox: &Letterbox,
    frame_size: (u32, u32),
    filter: &DetectionFilter,
    iou_threshold: f32,
) -> Result<Vec<BoundingBox>, VisionError> {
    let (fields, anchors, transposed) = match shape {
        [1, a, b] if a < b => (*a, *b, false),
        [1, a, b] => (*b, *a, true),
        other => {
            return Err(VisionError::Processing(format!(
                "unexpected YOLOv8 output shape {:?}",
                other
            )))
        }
    };
    if fields <= BOX_FIELDS {
        return Err(VisionError::Processing(format!("YOLOv8 output has only {} fields", fields)));
    }
    let expected = fields * anchors;
    if output.len() != expected {
        return Err(VisionError::Processing(format!(
            "YOLOv8 output has {} values, shape says {}",
            output.len(),
            expected
        )));
    }

    let at = |field: usize, anchor: usize| {
        if transposed {
            output[anchor * fields + field]
        } else {
            output[field * anchors + anchor]
        }
    };

    let (frame_w, frame_h) = (frame_size.0 as f32, frame_size.1 as f32);
    let mut candidates = Vec::new();
    for anchor in 0..anchors {
        let (mut best_class, mut best_score) = (0u32, f32::MIN);
        for class in 0..fields - BOX_FIELDS {
            let score = at(BOX_FIELDS + class, anchor);
            if score > best_score {
                best_score = score;
                best_class = class as u32;
            }
        }
        if !filter.accepts(best_class, best_score) {
            continue;
        }

        let (cx, cy, w, h) = (at(0, anchor), at(1, anchor), at(2, anchor), at(3, anchor));
        if !(cx.is_finite() && cy.is_finite() && w.is_finite() && h.is_finite()) {
            continue;
        }
        let (x1, y1) = letterbox.to_frame(cx - w / 2.0, cy - h / 2.0);
        let (x2, y2) = letterbox.to_frame(cx + w / 2.0, cy + h / 2.0);
        let b = BoundingBox::new(
            x1.clamp(0.0, frame_w),
            y1.clamp(0.0, frame_h),
            x2.clamp(0.0, frame_w),
            y2.clamp(0.0, frame_h),
            best_score,
            best_class,
        );
        if b.area() > 0.0 {
            candidates.push(b);
        }
    }

    let kept = non_max_suppression(candidates, iou_threshold);
    debug!("YOLOv8 decoded {} boxes from {} anchors", kept.len(), anchors);
    Ok(kept)
}

#[cfg(feature = "onnx")]
pub use onnx::OnnxPersonDetector;

#[cfg(feature = "onnx")]
mod onnx {
    use super::decode_yolov8;
    use crate::error::VisionError;
    use crate::processing::Letterbox;
    use climasight_core::{BoundingBox, Detector, DetectionFilter, Frame, Result};
    use ort::session::builder::GraphOptimizationLevel;
    use ort::session::Session;
    use ort::value::Tensor;
    use std::path::Path;
    use tracing::info;

    /// YOLOv8 person detector running on ONNX Runtime (CPU).
    pub struct OnnxPersonDetector {
        session: Session,
        input_size: u32,
        iou_threshold: f32,
    }

    impl OnnxPersonDetector {
        /// Load the model. Failure here is fatal for the process.
        pub fn load(
            model_path: &Path,
            input_size: u32,
            iou_threshold: f32,
        ) -> std::result::Result<Self, VisionError> {
            if !model_path.exists() {
                return Err(VisionError::Model(format!("model file {:?} not found", model_path)));
            }
            let session = Session::builder()
                .and_then(|b| b.with_optimization_level(GraphOptimizationLevel::Level3))
                .and_then(|b| b.commit_from_file(model_path))
                .map_err(|e| {
                    VisionError::Model(format!("failed to load {:?}: {}", model_path, e))
                })?;
            info!("YOLOv8 model loaded from {:?} (input {}px)", model_path, input_size);
            Ok(Self { session, input_size, iou_threshold })
        }

        fn infer(
            &mut self,
            frame: &Frame,
            filter: &DetectionFilter,
        ) -> std::result::Result<Vec<BoundingBox>, VisionError> {
            let letterbox = Letterbox::new(frame.width(), frame.height(), self.input_size)?;
            let size = self.input_size as usize;
            let pixels = letterbox.tensor(frame.image());
            let input = Tensor::from_array(([1usize, 3, size, size], pixels))
                .map_err(|e| VisionError::Ort(e.to_string()))?;
            let outputs = self
                .session
                .run(ort::inputs![input])
                .map_err(|e| VisionError::Ort(e.to_string()))?;
            let (shape, data) = outputs[0]
                .try_extract_tensor::<f32>()
                .map_err(|e| VisionError::Ort(e.to_string()))?;
            let dims: Vec<usize> = shape.iter().map(|d| *d as usize).collect();
            decode_yolov8(
                data,
                &dims,
                &letterbox,
                (frame.width(), frame.height()),
                filter,
                self.iou_threshold,
            )
        }
    }

    impl Detector for OnnxPersonDetector {
        fn detect(&mut self, frame: &Frame, filter: &DetectionFilter) -> Result<Vec<BoundingBox>> {
            Ok(self.infer(frame, filter)?)
        }

        fn name(&self) -> &str {
            "yolov8-onnx"
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Build a `[1, 4 + classes, anchors]` output from per-anchor rows.
    fn output(rows: &[[f32; 6]]) -> (Vec<f32>, Vec<usize>) {
        let fields = 6;
        let anchors = rows.len().max(fields + 1);
        let mut data = vec![0.0; fields * anchors];
        for (a, row) in rows.iter().enumerate() {
            for (f, v) in row.iter().enumerate() {
                data[f * anchors + a] = *v;
            }
        }
        (data, vec![1, fields, anchors])
    }

    #[test]
    fn test_decode_filters_class_and_confidence() {
        let (data, shape) = output(&[
            [100.0, 180.0, 20.0, 40.0, 0.9, 0.1],
            [300.0, 300.0, 20.0, 40.0, 0.3, 0.1],
            [500.0, 300.0, 20.0, 40.0, 0.1, 0.95],
        ]);
        let lb = Letterbox::new(640, 480, 640).unwrap();
        let filter = DetectionFilter::new(0, 0.5);
        let boxes = decode_yolov8(&data, &shape, &lb, (640, 480), &filter, 0.45).unwrap();
        assert_eq!(boxes.len(), 1);
        let b = boxes[0];
        assert_eq!((b.x1, b.y1, b.x2, b.y2), (90.0, 80.0, 110.0, 120.0));
        assert_eq!(b.class_id, 0);
    }

    #[test]
    fn test_decode_other_class() {
        let (data, shape) = output(&[[500.0, 300.0, 20.0, 40.0, 0.1, 0.95]]);
        let lb = Letterbox::new(640, 480, 640).unwrap();
        let filter = DetectionFilter::new(1, 0.5);
        let boxes = decode_yolov8(&data, &shape, &lb, (640, 480), &filter, 0.45).unwrap();
        assert_eq!(boxes.len(), 1);
        assert_eq!(boxes[0].class_id, 1);
    }

    #[test]
    fn test_decode_runs_nms() {
        let (data, shape) = output(&[
            [100.0, 180.0, 20.0, 40.0, 0.9, 0.0],
            [101.0, 181.0, 20.0, 40.0, 0.8, 0.0],
        ]);
        let lb = Letterbox::new(640, 480, 640).unwrap();
        let filter = DetectionFilter::default();
        let boxes = decode_yolov8(&data, &shape, &lb, (640, 480), &filter, 0.45).unwrap();
        assert_eq!(boxes.len(), 1);
        assert_eq!(boxes[0].confidence, 0.9);
    }

    #[test]
    fn test_decode_transposed_layout() {
        // [1, anchors, fields] with anchors > fields
        let anchors = 8;
        let fields = 6;
        let mut data = vec![0.0; anchors * fields];
        data[..6].copy_from_slice(&[320.0, 320.0, 64.0, 64.0, 0.8, 0.0]);
        let lb = Letterbox::new(640, 640, 640).unwrap();
        let filter = DetectionFilter::default();
        let boxes =
            decode_yolov8(&data, &[1, anchors, fields], &lb, (640, 640), &filter, 0.45).unwrap();
        assert_eq!(boxes.len(), 1);
        assert_eq!(boxes[0].x1, 288.0);
    }

    #[test]
    fn test_decode_clamps_to_frame() {
        let (data, shape) = output(&[[5.0, 85.0, 40.0, 40.0, 0.9, 0.0]]);
        let lb = Letterbox::new(640, 480, 640).unwrap();
        let filter = DetectionFilter::default();
        let boxes = decode_yolov8(&data, &shape, &lb, (640, 480), &filter, 0.45).unwrap();
        assert_eq!(boxes[0].x1, 0.0);
        assert_eq!(boxes[0].y1, 0.0);
    }

    #[test]
    fn test_decode_rejects_bad_shapes() {
        let lb = Letterbox::new(640, 480, 640).unwrap();
        let f = DetectionFilter::default();
        assert!(decode_yolov8(&[0.0; 10], &[1, 84], &lb, (640, 480), &f, 0.45).is_err());
        assert!(decode_yolov8(&[0.0; 10], &[1, 84, 8400], &lb, (640, 480), &f, 0.45).is_err());
        assert!(decode_yolov8(&[0.0; 12], &[1, 4, 3], &lb, (640, 480), &f, 0.45).is_err());
    }
}
