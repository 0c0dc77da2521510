//! YOLO-v8 output layout: `[1, 4+C, N]`, rows `0..3` are `cx,cy,w,h` in
//! letterboxed pixel space, rows `4..4+C` are already-sigmoided class
//! scores.

use super::{Detection, Letterbox};
use crate::kernels::{cxcywh_to_xyxy, nms};

/// `num_classes`-wide candidate columns decoded into original-image-space
/// detections, class-agnostic NMS applied across the full candidate set.
pub fn decode(
    output: &[f32],
    num_classes: usize,
    num_candidates: usize,
    letterbox: &Letterbox,
    orig_width: u32,
    orig_height: u32,
    conf_threshold: f32,
    iou_threshold: f32,
) -> Vec<Detection> {
    let row_stride = num_candidates;
    let mut boxes_xyxy = Vec::new();
    let mut scores = Vec::new();
    let mut classes = Vec::new();

    for candidate in 0..num_candidates {
        let cx = output[candidate];
        let cy = output[row_stride + candidate];
        let w = output[2 * row_stride + candidate];
        let h = output[3 * row_stride + candidate];

        let mut best_class = 0usize;
        let mut best_score = f32::NEG_INFINITY;
        for class in 0..num_classes {
            let score = output[(4 + class) * row_stride + candidate];
            if score > best_score {
                best_score = score;
                best_class = class;
            }
        }

        if best_score < conf_threshold {
            continue;
        }

        let xyxy = cxcywh_to_xyxy(&[cx, cy, w, h]);
        let unletterboxed = [
            (xyxy[0] - letterbox.pad_x) / letterbox.scale,
            (xyxy[1] - letterbox.pad_y) / letterbox.scale,
            (xyxy[2] - letterbox.pad_x) / letterbox.scale,
            (xyxy[3] - letterbox.pad_y) / letterbox.scale,
        ];
        let clipped = [
            unletterboxed[0].clamp(0.0, orig_width as f32),
            unletterboxed[1].clamp(0.0, orig_height as f32),
            unletterboxed[2].clamp(0.0, orig_width as f32),
            unletterboxed[3].clamp(0.0, orig_height as f32),
        ];

        boxes_xyxy.extend_from_slice(&clipped);
        scores.push(best_score);
        classes.push(best_class);
    }

    let kept = nms(&boxes_xyxy, &scores, iou_threshold);
    kept.into_iter()
        .map(|i| Detection {
            box_xyxy: boxes_xyxy[i * 4..i * 4 + 4].try_into().unwrap(),
            class_index: classes[i],
            confidence: scores[i],
        })
        .collect()
}
