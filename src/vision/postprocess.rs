//! Detection postprocessing.
//!
//! Filters raw detector output by confidence and class, suppresses
//! overlapping same-class boxes, maps survivors back into original-frame
//! pixels, and draws overlays on a copy of the frame.

use image::RgbImage;

use crate::detect::result::{DetectionCandidate, RawDetection};
use crate::frame::Frame;
use crate::vision::overlay::OverlayPainter;
use crate::vision::preprocess::LetterboxTransform;

/// Filter, suppress, rescale, and draw.
///
/// Returns the surviving candidates (count = `len()`) and an annotated copy
/// of the frame. With zero survivors the copy is returned unannotated. The
/// input frame is never mutated.
pub fn filter_and_draw(
    raw: &[RawDetection],
    confidence_threshold: f32,
    iou_threshold: f32,
    class_filter: Option<&[u32]>,
    transform: &LetterboxTransform,
    frame: &Frame,
    painter: &OverlayPainter,
) -> (Vec<DetectionCandidate>, RgbImage) {
    let qualified: Vec<RawDetection> = raw
        .iter()
        .filter(|d| d.confidence >= confidence_threshold)
        .filter(|d| match class_filter {
            Some(classes) => classes.contains(&d.class_id),
            None => true,
        })
        .cloned()
        .collect();

    let kept = non_max_suppression(qualified, iou_threshold);

    let candidates: Vec<DetectionCandidate> = kept
        .into_iter()
        .map(|d| DetectionCandidate {
            bbox: transform.to_frame(d.bbox),
            confidence: d.confidence,
            class_id: d.class_id,
        })
        .collect();

    let mut annotated = frame.to_annotatable();
    painter.draw(&mut annotated, &candidates);
    (candidates, annotated)
}

/// Greedy non-max suppression over same-class boxes.
///
/// Sort by confidence descending; keep the best remaining box and suppress
/// every same-class box whose IoU with it exceeds the threshold.
fn non_max_suppression(mut rows: Vec<RawDetection>, iou_threshold: f32) -> Vec<RawDetection> {
    rows.sort_unstable_by(|a, b| {
        b.confidence
            .partial_cmp(&a.confidence)
            .unwrap_or(std::cmp::Ordering::Equal)
    });

    let mut suppressed = vec![false; rows.len()];
    let mut kept = Vec::new();
    for i in 0..rows.len() {
        if suppressed[i] {
            continue;
        }
        for j in (i + 1)..rows.len() {
            if !suppressed[j]
                && rows[j].class_id == rows[i].class_id
                && iou(&rows[i].bbox, &rows[j].bbox) > iou_threshold
            {
                suppressed[j] = true;
            }
        }
        kept.push(rows[i].clone());
    }
    kept
}

fn iou(a: &[f32; 4], b: &[f32; 4]) -> f32 {
    let left = a[0].max(b[0]);
    let top = a[1].max(b[1]);
    let right = a[2].min(b[2]);
    let bottom = a[3].min(b[3]);
    let intersection = (right - left).max(0.0) * (bottom - top).max(0.0);

    let area_a = (a[2] - a[0]).max(0.0) * (a[3] - a[1]).max(0.0);
    let area_b = (b[2] - b[0]).max(0.0) * (b[3] - b[1]).max(0.0);
    let union = area_a + area_b - intersection;
    if union <= 0.0 {
        0.0
    } else {
        intersection / union
    }
}
