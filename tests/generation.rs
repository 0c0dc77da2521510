use std::cell::RefCell;
use std::collections::BTreeSet;
use std::time::Duration;

use onnxkit::backend::{Backend, NamedTensors};
use onnxkit::config::GenerationConfig;
use onnxkit::generation::GenerationLoop;
use onnxkit::session::{DecoderOnlySession, GenerativeSession};
use onnxkit::tensor::{ElementType, Tensor};

use rand::rngs::StdRng;
use rand::SeedableRng;

/// A single-layer decoder-only model double whose argmax token at each
/// call is scripted in advance, independent of the prompt.
struct ScriptedBackend {
    vocab: usize,
    calls: RefCell<usize>,
    argmaxes: Vec<usize>,
}

impl Backend for ScriptedBackend {
    fn input_names(&self) -> Vec<String> {
        vec![
            "input_ids".to_string(),
            "attention_mask".to_string(),
            "past_key_values.0.key".to_string(),
            "past_key_values.0.value".to_string(),
        ]
    }
    fn output_names(&self) -> Vec<String> {
        vec!["logits".to_string(), "present.0.key".to_string(), "present.0.value".to_string()]
    }
    fn input_shape(&self, _name: &str) -> Option<Vec<usize>> {
        None
    }
    fn input_element_type(&self, _name: &str) -> Option<ElementType> {
        Some(ElementType::F32)
    }
    fn run(&self, inputs: NamedTensors) -> onnxkit::Result<NamedTensors> {
        let n = inputs.iter().find(|(name, _)| name == "input_ids").unwrap().1.shape()[1];
        let mut call = self.calls.borrow_mut();
        let argmax = self.argmaxes[*call];
        *call += 1;

        let mut flat = vec![0.0f32; n * self.vocab];
        flat[(n - 1) * self.vocab + argmax] = 10.0;
        let logits = Tensor::from_f32(flat, vec![1, n, self.vocab])?;
        let cache = Tensor::from_f32(vec![0.0; 4], vec![1, 1, 4, 1])?;
        Ok(vec![
            ("logits".to_string(), logits),
            ("present.0.key".to_string(), cache.clone()),
            ("present.0.value".to_string(), cache),
        ])
    }
}

#[test]
fn generation_stops_at_max_new_tokens_when_eos_never_sampled() {
    let backend = ScriptedBackend {
        vocab: 50,
        calls: RefCell::new(0),
        argmaxes: vec![1, 2, 3, 4],
    };
    let decoder = DecoderOnlySession::new(&backend, 1, 1);
    let mut session = GenerativeSession::DecoderOnly(decoder);
    let config = GenerationConfig::new(3, BTreeSet::from([999])).unwrap();
    let mut gen_loop = GenerationLoop::new(&mut session, config);

    let mut rng = StdRng::seed_from_u64(0);
    let mut emitted = Vec::new();
    let result = gen_loop
        .run(
            "prompt",
            None,
            &|_s: &str| vec![10, 11],
            &|id: i64| format!("[{id}]"),
            &mut rng,
            |fragment| emitted.push(fragment.to_string()),
            || Duration::from_millis(0),
        )
        .unwrap();

    assert_eq!(result.generated_tokens, 3);
    assert_eq!(result.prompt_tokens, 2);
    assert_eq!(emitted.join(""), "[1][2][3]");
}

#[test]
fn chat_template_runs_before_tokenization() {
    let backend = ScriptedBackend {
        vocab: 10,
        calls: RefCell::new(0),
        argmaxes: vec![7],
    };
    let decoder = DecoderOnlySession::new(&backend, 1, 1);
    let mut session = GenerativeSession::DecoderOnly(decoder);
    let config = GenerationConfig::new(1, BTreeSet::from([7])).unwrap();
    let mut gen_loop = GenerationLoop::new(&mut session, config);

    let seen_prompt: RefCell<String> = RefCell::new(String::new());
    let tokenize = |text: &str| {
        *seen_prompt.borrow_mut() = text.to_string();
        vec![text.len() as i64]
    };
    let mut rng = StdRng::seed_from_u64(0);
    let result = gen_loop
        .run(
            "hi",
            Some(&|p: &str| format!("<system>{p}</system>")),
            &tokenize,
            &|id: i64| format!("[{id}]"),
            &mut rng,
            |_| {},
            || Duration::from_millis(0),
        )
        .unwrap();

    assert_eq!(*seen_prompt.borrow(), "<system>hi</system>");
    // the chat template runs before tokenization, producing exactly one token id.
    assert_eq!(result.prompt_tokens, 1);
    // argmax is the EOS id itself, so zero tokens are generated.
    assert_eq!(result.generated_tokens, 0);
}
