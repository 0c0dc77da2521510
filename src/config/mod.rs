//! Explicit, immutable configuration records: one per task, validated at
//! construction, no telescoping builders.

use std::collections::BTreeSet;

use crate::error::{OnnxKitError, Result};

/// Generation parameters for a single `GenerationLoop` run.
#[derive(Debug, Clone)]
pub struct GenerationConfig {
    pub max_new_tokens: usize,
    pub eos_token_ids: BTreeSet<i64>,
    pub stop_sequences: Vec<String>,
    pub temperature: Option<f32>,
    pub top_k: Option<usize>,
    pub top_p: Option<f32>,
    pub append_eos_to_input: bool,
}

impl GenerationConfig {
    /// `eos_token_ids` must be non-empty; `temperature`, if set, must be > 0.
    pub fn new(max_new_tokens: usize, eos_token_ids: BTreeSet<i64>) -> Result<Self> {
        if eos_token_ids.is_empty() {
            return Err(OnnxKitError::InvalidArgument(
                "eos_token_ids must not be empty".to_string(),
            ));
        }
        Ok(Self {
            max_new_tokens,
            eos_token_ids,
            stop_sequences: Vec::new(),
            temperature: None,
            top_k: None,
            top_p: None,
            append_eos_to_input: false,
        })
    }

    pub fn with_temperature(mut self, temperature: f32) -> Result<Self> {
        if !(temperature > 0.0) {
            return Err(OnnxKitError::InvalidArgument(
                "temperature must be > 0".to_string(),
            ));
        }
        self.temperature = Some(temperature);
        Ok(self)
    }

    pub fn with_top_k(mut self, top_k: usize) -> Self {
        self.top_k = Some(top_k);
        self
    }

    pub fn with_top_p(mut self, top_p: f32) -> Self {
        self.top_p = Some(top_p);
        self
    }

    pub fn with_stop_sequences(mut self, stop_sequences: Vec<String>) -> Self {
        self.stop_sequences = stop_sequences;
        self
    }

    pub fn with_append_eos_to_input(mut self, append: bool) -> Self {
        self.append_eos_to_input = append;
        self
    }

    /// Sampling is greedy only when temperature, top-k, and top-p are all unset.
    pub fn uses_greedy_sampling(&self) -> bool {
        self.temperature.is_none() && self.top_k.is_none() && self.top_p.is_none()
    }
}

/// Which execution provider to request from the backend, in priority order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExecutionProviderConfig {
    Cpu,
    CoreMl,
    Cuda,
    TensorRt,
    DirectMl,
}

impl ExecutionProviderConfig {
    /// Platform-appropriate provider preference list, always ending in CPU.
    pub fn default_for_platform() -> Vec<Self> {
        #[cfg(target_os = "macos")]
        {
            vec![ExecutionProviderConfig::CoreMl, ExecutionProviderConfig::Cpu]
        }
        #[cfg(target_os = "windows")]
        {
            vec![ExecutionProviderConfig::DirectMl, ExecutionProviderConfig::Cpu]
        }
        #[cfg(all(target_os = "linux", feature = "cuda"))]
        {
            vec![ExecutionProviderConfig::Cuda, ExecutionProviderConfig::Cpu]
        }
        #[cfg(not(any(target_os = "macos", target_os = "windows", all(target_os = "linux", feature = "cuda"))))]
        {
            vec![ExecutionProviderConfig::Cpu]
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            ExecutionProviderConfig::Cpu => "CPU",
            ExecutionProviderConfig::CoreMl => "CoreML",
            ExecutionProviderConfig::Cuda => "CUDA",
            ExecutionProviderConfig::TensorRt => "TensorRT",
            ExecutionProviderConfig::DirectMl => "DirectML",
        }
    }
}

/// Session-construction knobs that don't belong to any single generation run.
#[derive(Debug, Clone)]
pub struct SessionConfig {
    pub intra_op_threads: usize,
    pub execution_providers: Vec<ExecutionProviderConfig>,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            intra_op_threads: 4,
            execution_providers: ExecutionProviderConfig::default_for_platform(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn generation_config_rejects_empty_eos_set() {
        let err = GenerationConfig::new(10, BTreeSet::new()).unwrap_err();
        assert!(matches!(err, OnnxKitError::InvalidArgument(_)));
    }

    #[test]
    fn generation_config_rejects_nonpositive_temperature() {
        let cfg = GenerationConfig::new(10, BTreeSet::from([1])).unwrap();
        assert!(cfg.with_temperature(0.0).is_err());
    }

    #[test]
    fn uses_greedy_sampling_iff_all_unset() {
        let cfg = GenerationConfig::new(10, BTreeSet::from([1])).unwrap();
        assert!(cfg.uses_greedy_sampling());
        let cfg = cfg.with_top_k(5);
        assert!(!cfg.uses_greedy_sampling());
    }

    #[test]
    fn default_provider_list_ends_in_cpu() {
        let providers = ExecutionProviderConfig::default_for_platform();
        assert_eq!(*providers.last().unwrap(), ExecutionProviderConfig::Cpu);
    }
}
