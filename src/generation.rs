//! Prompt -> tokenize -> prefill -> iterative decode -> detokenize,
//! driving a `GenerativeSession` through a configured logits pipeline,
//! sampler, and stop-sequence-safe streamer.

use std::time::Duration;

use crate::config::GenerationConfig;
use crate::error::Result;
use crate::logits::sampler::{Categorical, Greedy, Sampler};
use crate::session::GenerativeSession;
use crate::streamer::TokenStreamer;

/// Result of a single generation run.
#[derive(Debug, Clone)]
pub struct GenerationResult {
    pub text: String,
    pub prompt_tokens: usize,
    pub generated_tokens: usize,
    pub duration: Duration,
}

pub struct GenerationLoop<'s, 'b> {
    session: &'s mut GenerativeSession<'b>,
    config: GenerationConfig,
}

impl<'s, 'b> GenerationLoop<'s, 'b> {
    pub fn new(session: &'s mut GenerativeSession<'b>, config: GenerationConfig) -> Self {
        Self { session, config }
    }

    /// `tokenize` turns the (possibly chat-templated) prompt into input
    /// ids; `decode_token` turns a sampled token id into the text
    /// fragment to stream; `on_fragment` is the live listener.
    pub fn run(
        &mut self,
        prompt: &str,
        chat_template: Option<&dyn Fn(&str) -> String>,
        tokenize: &dyn Fn(&str) -> Vec<i64>,
        decode_token: &dyn Fn(i64) -> String,
        rng: &mut dyn rand::RngCore,
        mut on_fragment: impl FnMut(&str),
        elapsed_since_start: impl Fn() -> Duration,
    ) -> Result<GenerationResult> {
        let formatted = match chat_template {
            Some(template) => template(prompt),
            None => prompt.to_string(),
        };

        let mut ids = tokenize(&formatted);
        if self.config.append_eos_to_input {
            if let Some(&first_eos) = self.config.eos_token_ids.iter().next() {
                ids.push(first_eos);
            }
        }
        let prompt_tokens = ids.len();

        self.session.reset_cache();
        let mut logits = self.session.prefill(&ids)?;

        let sampler: Box<dyn Sampler> = if self.config.uses_greedy_sampling() {
            Box::new(Greedy)
        } else {
            Box::new(Categorical)
        };

        let mut streamer = TokenStreamer::new(self.config.stop_sequences.clone());
        let mut generated = 0usize;

        for _ in 0..self.config.max_new_tokens {
            let processed = self.pipeline().apply(&logits);
            let token_id = sampler.sample(&processed, rng) as i64;

            if self.config.eos_token_ids.contains(&token_id) {
                break;
            }

            let fragment = decode_token(token_id);
            streamer.accept(&fragment, &mut on_fragment);
            generated += 1;

            if streamer.is_stopped() {
                break;
            }

            logits = self.session.decode(token_id)?;
        }

        if !streamer.is_stopped() {
            streamer.flush(&mut on_fragment);
        }

        Ok(GenerationResult {
            text: streamer.text().to_string(),
            prompt_tokens,
            generated_tokens: generated,
            duration: elapsed_since_start(),
        })
    }

    fn pipeline(&self) -> crate::logits::LogitsPipeline {
        crate::logits::LogitsPipeline {
            temperature: self.config.temperature,
            top_k: self.config.top_k,
            top_p: self.config.top_p,
        }
    }
}
