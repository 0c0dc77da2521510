//! Pure numeric kernels: softmax family, sigmoid, L2 normalization, top-k,
//! non-maximum suppression, CTC greedy decoding, and box-format conversion.
//! None of these mutate their input; all return freshly allocated output.

use crate::error::{OnnxKitError, Result};

/// Numerically stable softmax: subtracts `max(x)` before exponentiation.
pub fn softmax(x: &[f32]) -> Vec<f32> {
    if x.is_empty() {
        return Vec::new();
    }
    let max = x.iter().cloned().fold(f32::NEG_INFINITY, f32::max);
    let exps: Vec<f32> = x.iter().map(|&v| (v - max).exp()).collect();
    let sum: f32 = exps.iter().sum();
    exps.iter().map(|&e| e / sum).collect()
}

/// Numerically stable log-softmax: `x - max(x) - log(sum(exp(x - max(x))))`.
pub fn log_softmax(x: &[f32]) -> Vec<f32> {
    if x.is_empty() {
        return Vec::new();
    }
    let max = x.iter().cloned().fold(f32::NEG_INFINITY, f32::max);
    let shifted: Vec<f32> = x.iter().map(|&v| v - max).collect();
    let sum_exp: f32 = shifted.iter().map(|&v| v.exp()).sum();
    let log_sum = sum_exp.ln();
    shifted.iter().map(|&v| v - log_sum).collect()
}

/// `1 / (1 + exp(-x))`, elementwise.
pub fn sigmoid(x: &[f32]) -> Vec<f32> {
    x.iter().map(|&v| 1.0 / (1.0 + (-v).exp())).collect()
}

/// Divide by the Euclidean norm; the zero vector maps to itself (no NaN).
pub fn l2_normalize(x: &[f32]) -> Vec<f32> {
    let norm = x.iter().map(|&v| v * v).sum::<f32>().sqrt();
    if norm == 0.0 {
        return x.to_vec();
    }
    x.iter().map(|&v| v / norm).collect()
}

pub fn dot_product(a: &[f32], b: &[f32]) -> Result<f32> {
    if a.len() != b.len() {
        return Err(OnnxKitError::DimensionMismatch {
            a: a.len(),
            b: b.len(),
        });
    }
    Ok(a.iter().zip(b).map(|(&x, &y)| x * y).sum())
}

/// Indices of the `k` largest values, sorted descending by value.
/// `k == 0` yields empty; `k >= len` yields a permutation of all indices.
pub fn top_k(values: &[f32], k: usize) -> Vec<usize> {
    if k == 0 || values.is_empty() {
        return Vec::new();
    }
    let mut indices: Vec<usize> = (0..values.len()).collect();
    indices.sort_by(|&a, &b| {
        values[b]
            .partial_cmp(&values[a])
            .unwrap_or(std::cmp::Ordering::Equal)
            .then(a.cmp(&b))
    });
    indices.truncate(k.min(values.len()));
    indices
}

/// `[cx, cy, w, h]`-packed boxes → `[x1, y1, x2, y2]`-packed boxes.
pub fn cxcywh_to_xyxy(boxes: &[f32]) -> Vec<f32> {
    let mut out = Vec::with_capacity(boxes.len());
    for chunk in boxes.chunks(4) {
        if chunk.len() < 4 {
            break;
        }
        let (cx, cy, w, h) = (chunk[0], chunk[1], chunk[2], chunk[3]);
        out.push(cx - w / 2.0);
        out.push(cy - h / 2.0);
        out.push(cx + w / 2.0);
        out.push(cy + h / 2.0);
    }
    out
}

fn iou(a: &[f32], b: &[f32]) -> f32 {
    let (ax1, ay1, ax2, ay2) = (a[0], a[1], a[2], a[3]);
    let (bx1, by1, bx2, by2) = (b[0], b[1], b[2], b[3]);

    let ix1 = ax1.max(bx1);
    let iy1 = ay1.max(by1);
    let ix2 = ax2.min(bx2);
    let iy2 = ay2.min(by2);

    let iw = (ix2 - ix1).max(0.0);
    let ih = (iy2 - iy1).max(0.0);
    let intersection = iw * ih;
    if intersection <= 0.0 {
        return 0.0;
    }

    let area_a = (ax2 - ax1).max(0.0) * (ay2 - ay1).max(0.0);
    let area_b = (bx2 - bx1).max(0.0) * (by2 - by1).max(0.0);
    let union = area_a + area_b - intersection;
    if union <= 0.0 {
        0.0
    } else {
        intersection / union
    }
}

/// Greedy non-maximum suppression. Boxes packed as `[x1,y1,x2,y2]` repeated.
/// Returns kept indices in descending-score selection order.
pub fn nms(boxes: &[f32], scores: &[f32], iou_threshold: f32) -> Vec<usize> {
    let n = scores.len();
    let mut order: Vec<usize> = (0..n).collect();
    order.sort_by(|&a, &b| {
        scores[b]
            .partial_cmp(&scores[a])
            .unwrap_or(std::cmp::Ordering::Equal)
    });

    let mut kept: Vec<usize> = Vec::new();
    for &idx in &order {
        let candidate = &boxes[idx * 4..idx * 4 + 4];
        let suppressed = kept.iter().any(|&k| {
            let kept_box = &boxes[k * 4..k * 4 + 4];
            iou(candidate, kept_box) > iou_threshold
        });
        if !suppressed {
            kept.push(idx);
        }
    }
    kept
}

/// CTC greedy decode: argmax per timestep, collapse consecutive duplicates,
/// then drop blanks.
pub fn ctc_greedy_decode(
    logits: &[f32],
    timesteps: usize,
    vocab_size: usize,
    blank_id: usize,
) -> Vec<usize> {
    let mut raw = Vec::with_capacity(timesteps);
    for t in 0..timesteps {
        let frame = &logits[t * vocab_size..(t + 1) * vocab_size];
        let mut best_idx = 0usize;
        let mut best_val = f32::NEG_INFINITY;
        for (i, &v) in frame.iter().enumerate() {
            if v > best_val {
                best_val = v;
                best_idx = i;
            }
        }
        raw.push(best_idx);
    }

    let mut collapsed = Vec::with_capacity(raw.len());
    let mut prev: Option<usize> = None;
    for tok in raw {
        if Some(tok) != prev {
            collapsed.push(tok);
        }
        prev = Some(tok);
    }
    collapsed.into_iter().filter(|&t| t != blank_id).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn softmax_sums_to_one_and_is_finite() {
        let out = softmax(&[1.0, 2.0, 3.0]);
        let sum: f32 = out.iter().sum();
        assert!((sum - 1.0).abs() < 1e-5);
        assert!(out.iter().all(|v| v.is_finite()));
    }

    #[test]
    fn softmax_stable_for_large_magnitudes() {
        let out = softmax(&[1000.0, 1000.0, 1000.0]);
        assert!(out.iter().all(|v| v.is_finite()));
        let sum: f32 = out.iter().sum();
        assert!((sum - 1.0).abs() < 1e-5);
    }

    #[test]
    fn log_softmax_matches_log_of_softmax() {
        let x = [0.5, -1.0, 2.0];
        let sm = softmax(&x);
        let lsm = log_softmax(&x);
        for (s, l) in sm.iter().zip(lsm.iter()) {
            assert!((s.ln() - l).abs() < 1e-4);
        }
    }

    #[test]
    fn sigmoid_properties() {
        assert!((sigmoid(&[0.0])[0] - 0.5).abs() < 1e-6);
        for a in [-5.0, 0.3, 10.0] {
            let sum = sigmoid(&[a])[0] + sigmoid(&[-a])[0];
            assert!((sum - 1.0).abs() < 1e-5);
        }
    }

    #[test]
    fn l2_normalize_zero_vector_stays_zero() {
        assert_eq!(l2_normalize(&[0.0, 0.0, 0.0]), vec![0.0, 0.0, 0.0]);
    }

    #[test]
    fn l2_normalize_unit_norm() {
        let out = l2_normalize(&[3.0, 4.0]);
        let norm = (out[0] * out[0] + out[1] * out[1]).sqrt();
        assert!((norm - 1.0).abs() < 1e-6);
    }

    #[test]
    fn dot_product_dimension_mismatch() {
        assert!(matches!(
            dot_product(&[1.0, 2.0], &[1.0]),
            Err(OnnxKitError::DimensionMismatch { .. })
        ));
    }

    #[test]
    fn top_k_boundaries() {
        let values = [0.1, 0.9, 0.4, 0.7];
        assert_eq!(top_k(&values, 0), Vec::<usize>::new());
        assert_eq!(top_k(&values, 2), vec![1, 3]);
        let all = top_k(&values, 10);
        assert_eq!(all.len(), 4);
        for w in all.windows(2) {
            assert!(values[w[0]] >= values[w[1]]);
        }
    }

    #[test]
    fn cxcywh_conversion() {
        let boxes = [160.0, 160.0, 40.0, 40.0];
        let xyxy = cxcywh_to_xyxy(&boxes);
        assert_eq!(xyxy, vec![140.0, 140.0, 180.0, 180.0]);
    }

    #[test]
    fn nms_suppresses_overlapping_lower_score_box() {
        // Boxes (0,0,10,10) score 0.9 and (1,1,11,11) score 0.8, IoU > 0.5.
        let boxes = [0.0, 0.0, 10.0, 10.0, 1.0, 1.0, 11.0, 11.0];
        let scores = [0.9, 0.8];
        let kept = nms(&boxes, &scores, 0.5);
        assert_eq!(kept, vec![0]);
    }

    #[test]
    fn nms_respects_iou_threshold_invariant() {
        let boxes = [
            0.0, 0.0, 10.0, 10.0, //
            20.0, 20.0, 30.0, 30.0, //
        ];
        let scores = [0.5, 0.9];
        let kept = nms(&boxes, &scores, 0.3);
        assert_eq!(kept, vec![1, 0]);
        assert_eq!(kept[0], 1); // highest score first
    }

    #[test]
    fn ctc_greedy_decode_hello_pattern() {
        // vocab size 5, blank = 0; argmax sequence 1,1,0,2,2,3,3,3,4 -> [1,2,3,4]
        let timesteps = 9;
        let vocab = 5;
        let mut logits = vec![0.0f32; timesteps * vocab];
        let argmax_seq = [1, 1, 0, 2, 2, 3, 3, 3, 4];
        for (t, &tok) in argmax_seq.iter().enumerate() {
            logits[t * vocab + tok] = 10.0;
        }
        let decoded = ctc_greedy_decode(&logits, timesteps, vocab, 0);
        assert_eq!(decoded, vec![1, 2, 3, 4]);
    }

    #[test]
    fn ctc_greedy_decode_same_token_separated_by_blank_survives_twice() {
        let timesteps = 3;
        let vocab = 3;
        let mut logits = vec![0.0f32; timesteps * vocab];
        for (t, &tok) in [1usize, 0, 1].iter().enumerate() {
            logits[t * vocab + tok] = 10.0;
        }
        let decoded = ctc_greedy_decode(&logits, timesteps, vocab, 0);
        assert_eq!(decoded, vec![1, 1]);
    }
}
