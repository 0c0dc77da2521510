//! Samplers consume processed logits and an explicitly-passed RNG, so
//! generation is deterministic under a fixed seed.

use rand::Rng;

use crate::kernels::softmax;

pub trait Sampler {
    fn sample(&self, logits: &[f32], rng: &mut dyn rand::RngCore) -> usize;
}

/// Argmax, ties broken toward the lowest index.
pub struct Greedy;

impl Sampler for Greedy {
    fn sample(&self, logits: &[f32], _rng: &mut dyn rand::RngCore) -> usize {
        let mut best_idx = 0usize;
        let mut best_val = f32::NEG_INFINITY;
        for (i, &v) in logits.iter().enumerate() {
            if v > best_val {
                best_val = v;
                best_idx = i;
            }
        }
        best_idx
    }
}

/// Softmax + inverse-CDF sampling from a uniform draw in `[0, 1)`. A draw
/// that exceeds the final cumulative sum due to rounding returns the last
/// index rather than panicking.
pub struct Categorical;

impl Sampler for Categorical {
    fn sample(&self, logits: &[f32], rng: &mut dyn rand::RngCore) -> usize {
        let probs = softmax(logits);
        let draw: f32 = rng.gen_range(0.0..1.0);

        let mut cumulative = 0.0f32;
        for (i, &p) in probs.iter().enumerate() {
            cumulative += p;
            if draw < cumulative {
                return i;
            }
        }
        probs.len() - 1
    }
}
