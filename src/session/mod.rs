//! KV-cache state machines driving decoder-only and encoder-decoder
//! models one token at a time. The set of variants is closed, so the
//! engine dispatches through an enum rather than a trait object.

pub mod decoder_only;
pub mod encoder_decoder;

pub use decoder_only::DecoderOnlySession;
pub use encoder_decoder::EncoderDecoderSession;

use crate::backend::NamedTensors;
use crate::error::Result;

pub enum GenerativeSession<'b> {
    DecoderOnly(DecoderOnlySession<'b>),
    EncoderDecoder(EncoderDecoderSession<'b>),
}

impl<'b> GenerativeSession<'b> {
    pub fn prefill(&mut self, ids: &[i64]) -> Result<Vec<f32>> {
        match self {
            GenerativeSession::DecoderOnly(s) => s.prefill(ids),
            GenerativeSession::EncoderDecoder(s) => s.prefill(ids),
        }
    }

    pub fn decode(&mut self, token_id: i64) -> Result<Vec<f32>> {
        match self {
            GenerativeSession::DecoderOnly(s) => s.decode(token_id),
            GenerativeSession::EncoderDecoder(s) => s.decode(token_id),
        }
    }

    pub fn cache_sequence_length(&self) -> usize {
        match self {
            GenerativeSession::DecoderOnly(s) => s.cache_sequence_length(),
            GenerativeSession::EncoderDecoder(s) => s.cache_sequence_length(),
        }
    }

    pub fn reset_cache(&mut self) {
        match self {
            GenerativeSession::DecoderOnly(s) => s.reset_cache(),
            GenerativeSession::EncoderDecoder(s) => s.reset_cache(),
        }
    }
}

/// Extracts the last-position logits from a `[1, n, vocab]` output:
/// `slice(0,0)` drops the batch axis, `slice(0,-1)` drops all but the last
/// sequence position.
pub(crate) fn last_position_logits(logits: &crate::tensor::Tensor) -> Result<Vec<f32>> {
    logits.slice(0, 0)?.slice(0, -1)?.to_f32()
}

pub(crate) fn layer_indices_from_input_names(names: &[String], prefix: &str, suffix: &str) -> usize {
    names
        .iter()
        .filter(|n| n.starts_with(prefix) && n.ends_with(suffix))
        .count()
}

pub(crate) fn cast_cache_if_needed(
    cache: NamedTensors,
    target: crate::tensor::ElementType,
) -> Result<NamedTensors> {
    if target != crate::tensor::ElementType::F16 {
        return Ok(cache);
    }
    cache
        .into_iter()
        .map(|(name, tensor)| Ok((name, tensor.cast_to_f16()?)))
        .collect()
}
