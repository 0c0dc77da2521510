//! `past_key_values.{layer}.{decoder|encoder}.{key|value}`. The
//! cross-attention cache is populated once at `prefill` and frozen for
//! the life of the session; only the self-attention (decoder) cache
//! grows per `decode`.

use tracing::{debug, info_span};

use super::{cast_cache_if_needed, last_position_logits, layer_indices_from_input_names};
use crate::backend::{Backend, NamedTensors};
use crate::error::{OnnxKitError, Result};
use crate::tensor::{ElementType, Tensor};

const DECODER_KEY_PREFIX: &str = "past_key_values.";

pub struct EncoderDecoderSession<'b> {
    encoder: &'b dyn Backend,
    decoder_init: &'b dyn Backend,
    decoder_with_past: &'b dyn Backend,
    decoder_start_token_id: i64,
    num_layers: usize,
    kv_element_type: ElementType,
    encoder_hidden_states: Option<Tensor>,
    encoder_attention_mask: Option<Tensor>,
    self_cache: NamedTensors,
    cross_cache: NamedTensors,
    seq_len: usize,
}

impl<'b> EncoderDecoderSession<'b> {
    pub fn new(
        encoder: &'b dyn Backend,
        decoder_init: &'b dyn Backend,
        decoder_with_past: &'b dyn Backend,
        decoder_start_token_id: i64,
    ) -> Self {
        let inputs = decoder_with_past.input_names();
        let num_layers = layer_indices_from_input_names(&inputs, DECODER_KEY_PREFIX, ".decoder.key");
        let kv_element_type = inputs
            .iter()
            .find(|n| n.ends_with(".decoder.key"))
            .and_then(|n| decoder_with_past.input_element_type(n))
            .unwrap_or(ElementType::F32);

        Self {
            encoder,
            decoder_init,
            decoder_with_past,
            decoder_start_token_id,
            num_layers,
            kv_element_type,
            encoder_hidden_states: None,
            encoder_attention_mask: None,
            self_cache: Vec::new(),
            cross_cache: Vec::new(),
            seq_len: 0,
        }
    }

    fn split_present_cache(&self, outputs: &NamedTensors) -> Result<(NamedTensors, NamedTensors)> {
        let mut self_cache = Vec::with_capacity(self.num_layers * 2);
        let mut cross_cache = Vec::with_capacity(self.num_layers * 2);
        for layer in 0..self.num_layers {
            for field in ["key", "value"] {
                let decoder_present = format!("present.{layer}.decoder.{field}");
                let decoder_tensor = crate::backend::get_named(outputs, &decoder_present)
                    .cloned()
                    .ok_or_else(|| OnnxKitError::backend(format!("missing output {decoder_present}")))?;
                self_cache.push((format!("{DECODER_KEY_PREFIX}{layer}.decoder.{field}"), decoder_tensor));

                let encoder_present = format!("present.{layer}.encoder.{field}");
                if let Some(tensor) = crate::backend::get_named(outputs, &encoder_present) {
                    cross_cache.push((
                        format!("{DECODER_KEY_PREFIX}{layer}.encoder.{field}"),
                        tensor.clone(),
                    ));
                }
            }
        }
        let self_cache = cast_cache_if_needed(self_cache, self.kv_element_type)?;
        Ok((self_cache, cross_cache))
    }

    pub fn prefill(&mut self, src_ids: &[i64]) -> Result<Vec<f32>> {
        let n = src_ids.len();
        let _span = info_span!("encoder_decoder_prefill", layers = self.num_layers, seq_len = n).entered();

        let encoder_inputs: NamedTensors = vec![
            ("input_ids".to_string(), Tensor::from_i64(src_ids.to_vec(), vec![1, n])?),
            (
                "attention_mask".to_string(),
                Tensor::from_i64(vec![1i64; n], vec![1, n])?,
            ),
        ];
        debug!("backend run (encoder): {} inputs", encoder_inputs.len());
        let encoder_outputs = self.encoder.run(encoder_inputs)?;
        let hidden_states = crate::backend::get_named(&encoder_outputs, "last_hidden_state")
            .cloned()
            .ok_or_else(|| OnnxKitError::backend("missing encoder output last_hidden_state"))?;
        let encoder_mask = Tensor::from_i64(vec![1i64; n], vec![1, n])?;

        let decoder_inputs: NamedTensors = vec![
            (
                "input_ids".to_string(),
                Tensor::from_i64(vec![self.decoder_start_token_id], vec![1, 1])?,
            ),
            ("encoder_hidden_states".to_string(), hidden_states.clone()),
            ("encoder_attention_mask".to_string(), encoder_mask.clone()),
        ];
        debug!("backend run (decoder init): {} inputs", decoder_inputs.len());
        let decoder_outputs = self.decoder_init.run(decoder_inputs)?;
        let logits = crate::backend::get_named(&decoder_outputs, "logits")
            .ok_or_else(|| OnnxKitError::backend("missing decoder logits output"))?;
        let last_logits = last_position_logits(logits)?;

        let (self_cache, cross_cache) = self.split_present_cache(&decoder_outputs)?;
        self.self_cache = self_cache;
        self.cross_cache = cross_cache;
        self.encoder_hidden_states = Some(hidden_states);
        self.encoder_attention_mask = Some(encoder_mask);
        self.seq_len = 1;
        Ok(last_logits)
    }

    pub fn decode(&mut self, token_id: i64) -> Result<Vec<f32>> {
        let _span = info_span!("encoder_decoder_decode", layers = self.num_layers, seq_len = self.seq_len + 1).entered();

        let hidden_states = self
            .encoder_hidden_states
            .clone()
            .ok_or_else(|| OnnxKitError::backend("decode called before prefill"))?;
        let encoder_mask = self
            .encoder_attention_mask
            .clone()
            .ok_or_else(|| OnnxKitError::backend("decode called before prefill"))?;

        let mut inputs: NamedTensors = vec![
            ("input_ids".to_string(), Tensor::from_i64(vec![token_id], vec![1, 1])?),
            ("encoder_hidden_states".to_string(), hidden_states),
            ("encoder_attention_mask".to_string(), encoder_mask),
        ];
        inputs.extend(self.self_cache.clone());
        inputs.extend(self.cross_cache.clone());

        debug!("backend run (decoder with past): {} inputs", inputs.len());
        let outputs = self.decoder_with_past.run(inputs)?;
        let logits = crate::backend::get_named(&outputs, "logits")
            .ok_or_else(|| OnnxKitError::backend("missing decoder logits output"))?;
        let last_logits = last_position_logits(logits)?;

        let (self_cache, _cross_cache_unused) = self.split_present_cache(&outputs)?;
        self.self_cache = self_cache;
        self.seq_len += 1;
        Ok(last_logits)
    }

    pub fn cache_sequence_length(&self) -> usize {
        self.seq_len
    }

    pub fn reset_cache(&mut self) {
        self.self_cache.clear();
        self.cross_cache.clear();
        self.encoder_hidden_states = None;
        self.encoder_attention_mask = None;
        self.seq_len = 0;
    }
}
