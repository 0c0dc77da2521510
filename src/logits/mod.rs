//! Logits processors: pure `logits -> logits` transforms composed in a
//! fixed order, plus the samplers that consume the result.

pub mod sampler;

const NEG_INF: f32 = f32::NEG_INFINITY;

/// Divide every logit by `t`. Caller guarantees `t > 0` (validated at
/// `GenerationConfig` construction).
pub fn temperature(logits: &[f32], t: f32) -> Vec<f32> {
    logits.iter().map(|&v| v / t).collect()
}

/// Mask everything strictly below the k-th largest value to `-inf`.
/// Identity when `k == 0` or `k >= len`.
pub fn top_k(logits: &[f32], k: usize) -> Vec<f32> {
    if k == 0 || k >= logits.len() {
        return logits.to_vec();
    }
    let mut sorted = logits.to_vec();
    sorted.sort_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));
    let threshold = sorted[sorted.len() - k];
    logits
        .iter()
        .map(|&v| if v < threshold { NEG_INF } else { v })
        .collect()
}

/// Keep the smallest prefix (by descending probability) whose cumulative
/// mass is >= `p`, inclusive of the crossing index; mask the rest to
/// `-inf`. Identity when `p >= 1`.
pub fn top_p(logits: &[f32], p: f32) -> Vec<f32> {
    if p >= 1.0 {
        return logits.to_vec();
    }
    let probs = crate::kernels::softmax(logits);
    let mut order: Vec<usize> = (0..probs.len()).collect();
    order.sort_by(|&a, &b| probs[b].partial_cmp(&probs[a]).unwrap_or(std::cmp::Ordering::Equal));

    let mut cumulative = 0.0f32;
    let mut keep = vec![false; logits.len()];
    for &idx in &order {
        keep[idx] = true;
        cumulative += probs[idx];
        if cumulative >= p {
            break;
        }
    }

    logits
        .iter()
        .zip(keep)
        .map(|(&v, k)| if k { v } else { NEG_INF })
        .collect()
}

/// The stages configured for a generation run, composed in the order
/// identity -> temperature -> top-k -> top-p.
#[derive(Debug, Clone, Default)]
pub struct LogitsPipeline {
    pub temperature: Option<f32>,
    pub top_k: Option<usize>,
    pub top_p: Option<f32>,
}

impl LogitsPipeline {
    pub fn apply(&self, logits: &[f32]) -> Vec<f32> {
        let mut out = logits.to_vec();
        if let Some(t) = self.temperature {
            out = temperature(&out, t);
        }
        if let Some(k) = self.top_k {
            out = top_k(&out, k);
        }
        if let Some(p) = self.top_p {
            out = top_p(&out, p);
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn top_k_masks_below_kth_largest() {
        let logits = [0.1, 0.9, 0.4, 0.7];
        let out = top_k(&logits, 2);
        let finite_count = out.iter().filter(|v| v.is_finite()).count();
        assert_eq!(finite_count, 2);
        assert!(out[1].is_finite() && out[3].is_finite());
    }

    #[test]
    fn top_k_identity_when_k_is_zero_or_covers_all() {
        let logits = [1.0, 2.0, 3.0];
        assert_eq!(top_k(&logits, 0), logits.to_vec());
        assert_eq!(top_k(&logits, 10), logits.to_vec());
    }

    #[test]
    fn top_p_keeps_only_dominant_index_at_p_0_6() {
        // softmax([2,1,0]) ~= [0.665, 0.245, 0.09]
        let logits = [2.0, 1.0, 0.0];
        let out = top_p(&logits, 0.6);
        assert!(out[0].is_finite());
        assert!(out[1].is_infinite() && out[1] < 0.0);
        assert!(out[2].is_infinite() && out[2] < 0.0);
    }

    #[test]
    fn top_p_identity_at_p_ge_1() {
        let logits = [1.0, 2.0, 3.0];
        assert_eq!(top_p(&logits, 1.0), logits.to_vec());
    }

    #[test]
    fn pipeline_composes_in_fixed_order() {
        let pipeline = LogitsPipeline {
            temperature: Some(2.0),
            top_k: Some(1),
            top_p: None,
        };
        let out = pipeline.apply(&[4.0, 2.0, 0.0]);
        let finite_count = out.iter().filter(|v| v.is_finite()).count();
        assert_eq!(finite_count, 1);
        assert!(out[0].is_finite());
    }
}
