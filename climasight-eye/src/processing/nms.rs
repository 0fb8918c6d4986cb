//! Non-maximum suppression

use climasight_core::BoundingBox;
use std::cmp::Ordering;

/// Greedy NMS: keep the most confident box, drop every box overlapping it by more than
/// `iou_threshold`, repeat. Output is ordered by descending confidence.
pub fn non_max_suppression(mut boxes: Vec<BoundingBox>, iou_threshold: f32) -> Vec<BoundingBox> {
    boxes.retain(|b| b.confidence.is_finite());
    boxes.sort_by(|a, b| b.confidence.partial_cmp(&a.confidence).unwrap_or(Ordering::Equal));

    let mut kept: Vec<BoundingBox> = Vec::with_capacity(boxes.len());
    for candidate in boxes {
        if kept.iter().all(|k| k.iou(&candidate) <= iou_threshold) {
            kept.push(candidate);
        }
    }
    kept
}
