//! Reads a model directory's layout: which companion files are present and
//! which tokenizer/label/config artifacts they imply.

use std::fs;
use std::path::{Path, PathBuf};

use crate::error::{OnnxKitError, Result};

/// Which files a model directory carries, located relative to its root.
#[derive(Debug, Clone)]
pub struct ModelSourceLayout {
    pub root: PathBuf,
    pub onnx_model: PathBuf,
    pub wordpiece_vocab: Option<PathBuf>,
    pub bpe_vocab: Option<PathBuf>,
    pub bpe_merges: Option<PathBuf>,
    pub labels: Option<PathBuf>,
    pub config_json: Option<PathBuf>,
}

impl ModelSourceLayout {
    /// `model.onnx` is required; every other companion is optional.
    pub fn scan<P: AsRef<Path>>(root: P) -> Result<Self> {
        let root = root.as_ref().to_path_buf();
        let onnx_model = root.join("model.onnx");
        if !onnx_model.exists() {
            return Err(OnnxKitError::ModelSourceError(format!(
                "missing model.onnx under {}",
                root.display()
            )));
        }

        let bpe_vocab = root.join("vocab.json");
        let bpe_merges = root.join("merges.txt");
        let has_bpe = bpe_vocab.exists() && bpe_merges.exists();

        Ok(Self {
            wordpiece_vocab: existing(&root, "vocab.txt"),
            bpe_vocab: has_bpe.then(|| bpe_vocab.clone()),
            bpe_merges: has_bpe.then_some(bpe_merges),
            labels: existing(&root, "labels.txt"),
            config_json: existing(&root, "config.json"),
            onnx_model,
            root,
        })
    }

    pub fn read_labels(&self) -> Result<Option<Vec<String>>> {
        match &self.labels {
            None => Ok(None),
            Some(path) => {
                let text = fs::read_to_string(path)
                    .map_err(|e| OnnxKitError::ModelSourceError(format!("reading labels.txt: {e}")))?;
                Ok(Some(text.lines().map(str::to_string).collect()))
            }
        }
    }
}

fn existing(root: &Path, name: &str) -> Option<PathBuf> {
    let candidate = root.join(name);
    candidate.exists().then_some(candidate)
}

/// HuggingFace-style `config.json` subset this crate cares about.
#[derive(Debug, Clone, serde::Deserialize)]
pub struct ModelConfigJson {
    #[serde(default)]
    pub id2label: std::collections::BTreeMap<String, String>,
    #[serde(default)]
    pub problem_type: Option<String>,
}

impl ModelConfigJson {
    pub fn load(path: &Path) -> Result<Self> {
        let text = fs::read_to_string(path)
            .map_err(|e| OnnxKitError::ModelSourceError(format!("reading config.json: {e}")))?;
        serde_json::from_str(&text)
            .map_err(|e| OnnxKitError::ModelSourceError(format!("parsing config.json: {e}")))
    }
}
