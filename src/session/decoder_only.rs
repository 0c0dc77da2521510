//! `past_key_values.{layer}.{key|value}` in, `present.{layer}.{key|value}`
//! out. The self-attention cache grows by one along the sequence axis
//! each `decode`.

use tracing::{debug, info_span};

use super::{cast_cache_if_needed, last_position_logits, layer_indices_from_input_names};
use crate::backend::{Backend, NamedTensors};
use crate::error::Result;
use crate::tensor::{ElementType, Tensor};

const KEY_PREFIX: &str = "past_key_values.";
const KEY_SUFFIX: &str = ".key";

pub struct DecoderOnlySession<'b> {
    backend: &'b dyn Backend,
    num_layers: usize,
    num_heads: usize,
    head_dim: usize,
    kv_element_type: ElementType,
    has_position_ids: bool,
    self_cache: NamedTensors,
    seq_len: usize,
}

impl<'b> DecoderOnlySession<'b> {
    pub fn new(backend: &'b dyn Backend, num_heads: usize, head_dim: usize) -> Self {
        let inputs = backend.input_names();
        let num_layers = layer_indices_from_input_names(&inputs, KEY_PREFIX, KEY_SUFFIX);
        let kv_element_type = inputs
            .iter()
            .find(|n| n.starts_with(KEY_PREFIX) && n.ends_with(KEY_SUFFIX))
            .and_then(|n| backend.input_element_type(n))
            .unwrap_or(ElementType::F32);
        let has_position_ids = inputs.iter().any(|n| n == "position_ids");

        Self {
            backend,
            num_layers,
            num_heads,
            head_dim,
            kv_element_type,
            has_position_ids,
            self_cache: Vec::new(),
            seq_len: 0,
        }
    }

    fn empty_cache(&self) -> Result<NamedTensors> {
        let mut cache = Vec::with_capacity(self.num_layers * 2);
        for layer in 0..self.num_layers {
            for field in ["key", "value"] {
                let name = format!("{KEY_PREFIX}{layer}.{field}");
                let shape = vec![1, self.num_heads, 0, self.head_dim];
                let tensor = match self.kv_element_type {
                    ElementType::F16 => Tensor::from_f16(Vec::new(), shape)?,
                    _ => Tensor::from_f32(Vec::new(), shape)?,
                };
                cache.push((name, tensor));
            }
        }
        Ok(cache)
    }

    fn present_to_past_cache(&self, outputs: &NamedTensors) -> Result<NamedTensors> {
        let mut cache = Vec::with_capacity(self.num_layers * 2);
        for layer in 0..self.num_layers {
            for field in ["key", "value"] {
                let present_name = format!("present.{layer}.{field}");
                let tensor = crate::backend::get_named(outputs, &present_name)
                    .cloned()
                    .ok_or_else(|| crate::error::OnnxKitError::backend(format!("missing output {present_name}")))?;
                cache.push((format!("{KEY_PREFIX}{layer}.{field}"), tensor));
            }
        }
        cast_cache_if_needed(cache, self.kv_element_type)
    }

    pub fn prefill(&mut self, ids: &[i64]) -> Result<Vec<f32>> {
        let n = ids.len();
        let _span = info_span!("decoder_only_prefill", layers = self.num_layers, seq_len = n).entered();

        let mut inputs: NamedTensors = vec![
            ("input_ids".to_string(), Tensor::from_i64(ids.to_vec(), vec![1, n])?),
            (
                "attention_mask".to_string(),
                Tensor::from_i64(vec![1i64; n], vec![1, n])?,
            ),
        ];
        if self.has_position_ids {
            let positions: Vec<i64> = (0..n as i64).collect();
            inputs.push(("position_ids".to_string(), Tensor::from_i64(positions, vec![1, n])?));
        }
        inputs.extend(self.empty_cache()?);

        debug!("backend run: {} inputs", inputs.len());
        let outputs = self.backend.run(inputs)?;
        let logits = crate::backend::get_named(&outputs, "logits")
            .ok_or_else(|| crate::error::OnnxKitError::backend("missing logits output"))?;
        let last_logits = last_position_logits(logits)?;

        self.self_cache = self.present_to_past_cache(&outputs)?;
        self.seq_len = n;
        Ok(last_logits)
    }

    pub fn decode(&mut self, token_id: i64) -> Result<Vec<f32>> {
        let total_len = self.seq_len + 1;
        let _span = info_span!("decoder_only_decode", layers = self.num_layers, seq_len = total_len).entered();

        let mut inputs: NamedTensors = vec![
            ("input_ids".to_string(), Tensor::from_i64(vec![token_id], vec![1, 1])?),
            (
                "attention_mask".to_string(),
                Tensor::from_i64(vec![1i64; total_len], vec![1, total_len])?,
            ),
        ];
        if self.has_position_ids {
            inputs.push((
                "position_ids".to_string(),
                Tensor::from_i64(vec![self.seq_len as i64], vec![1, 1])?,
            ));
        }
        inputs.extend(self.self_cache.clone());

        debug!("backend run: {} inputs", inputs.len());
        let outputs = self.backend.run(inputs)?;
        let logits = crate::backend::get_named(&outputs, "logits")
            .ok_or_else(|| crate::error::OnnxKitError::backend("missing logits output"))?;
        let last_logits = last_position_logits(logits)?;

        self.self_cache = self.present_to_past_cache(&outputs)?;
        self.seq_len += 1;
        Ok(last_logits)
    }

    pub fn cache_sequence_length(&self) -> usize {
        self.seq_len
    }

    pub fn reset_cache(&mut self) {
        self.self_cache.clear();
        self.seq_len = 0;
    }
}
