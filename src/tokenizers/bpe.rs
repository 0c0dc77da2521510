//! Byte-level BPE: GPT-2/CLIP-style byte-to-unicode mapping, merge-rank
//! pair merging, and a fixed pre-tokenization regex.

use std::collections::HashMap;
use std::fs;
use std::path::Path;
use std::sync::OnceLock;

use regex::Regex;

use super::Encoding;
use crate::error::{OnnxKitError, Result};

const END_OF_WORD: &str = "</w>";

static PRETOKENIZE_RE: OnceLock<Regex> = OnceLock::new();

fn pretokenize_re() -> &'static Regex {
    PRETOKENIZE_RE.get_or_init(|| {
        Regex::new(
            r"<\|startoftext\|>|<\|endoftext\|>|'s|'t|'re|'ve|'m|'ll|'d|\p{L}+|\p{N}|[^\s\p{L}\p{N}]+",
        )
        .expect("static pre-tokenization pattern is valid")
    })
}

/// Build the GPT-2 byte-to-unicode table: printable bytes map to
/// themselves, the rest map to fresh codepoints starting at 256, assigned
/// in byte-ascending order.
fn byte_to_unicode() -> HashMap<u8, char> {
    let mut printable: Vec<u32> = Vec::new();
    printable.extend(33u32..=126);
    printable.extend(161u32..=172);
    printable.extend(174u32..=255);

    let mut table = HashMap::with_capacity(256);
    let mut next_codepoint = 256u32;
    for byte in 0u32..256 {
        if printable.contains(&byte) {
            table.insert(byte as u8, char::from_u32(byte).unwrap());
        } else {
            table.insert(byte as u8, char::from_u32(next_codepoint).unwrap());
            next_codepoint += 1;
        }
    }
    table
}

pub struct BpeTokenizer {
    vocab: HashMap<String, i64>,
    merge_ranks: HashMap<(String, String), usize>,
    byte_to_unicode: HashMap<u8, char>,
    bos_id: i64,
    eos_id: i64,
    pad_id: i64,
}

impl BpeTokenizer {
    pub fn new(vocab_json: &str, merges_text: &str, bos_id: i64, eos_id: i64, pad_id: i64) -> Result<Self> {
        let vocab: HashMap<String, i64> = serde_json::from_str(vocab_json)
            .map_err(|e| OnnxKitError::ModelSourceError(format!("parsing vocab.json: {e}")))?;

        let mut merge_ranks = HashMap::new();
        for (rank, line) in merges_text.lines().skip(1).filter(|l| !l.trim().is_empty()).enumerate() {
            let mut parts = line.split_whitespace();
            let a = parts.next();
            let b = parts.next();
            if let (Some(a), Some(b)) = (a, b) {
                merge_ranks.insert((a.to_string(), b.to_string()), rank);
            }
        }

        Ok(Self {
            vocab,
            merge_ranks,
            byte_to_unicode: byte_to_unicode(),
            bos_id,
            eos_id,
            pad_id,
        })
    }

    pub fn from_files<P: AsRef<Path>>(
        vocab_path: P,
        merges_path: P,
        bos_id: i64,
        eos_id: i64,
        pad_id: i64,
    ) -> Result<Self> {
        let vocab_json = fs::read_to_string(vocab_path)
            .map_err(|e| OnnxKitError::ModelSourceError(format!("reading vocab.json: {e}")))?;
        let merges_text = fs::read_to_string(merges_path)
            .map_err(|e| OnnxKitError::ModelSourceError(format!("reading merges.txt: {e}")))?;
        Self::new(&vocab_json, &merges_text, bos_id, eos_id, pad_id)
    }

    fn normalize(text: &str) -> String {
        let lowered = text.to_lowercase();
        let mut collapsed = String::with_capacity(lowered.len());
        let mut last_was_space = false;
        for c in lowered.chars() {
            if c.is_whitespace() {
                if !last_was_space {
                    collapsed.push(' ');
                }
                last_was_space = true;
            } else {
                collapsed.push(c);
                last_was_space = false;
            }
        }
        collapsed.trim().to_string()
    }

    fn pretokenize(text: &str) -> Vec<String> {
        pretokenize_re()
            .find_iter(text)
            .map(|m| m.as_str().to_string())
            .collect()
    }

    fn encode_bytes_as_symbols(&self, pretoken: &str) -> Vec<String> {
        let mapped: Vec<char> = pretoken.bytes().map(|b| self.byte_to_unicode[&b]).collect();

        let mut symbols: Vec<String> = mapped.iter().map(|c| c.to_string()).collect();
        if let Some(last) = symbols.last_mut() {
            last.push_str(END_OF_WORD);
        }
        symbols
    }

    /// Repeatedly merge the lowest-rank adjacent pair, left-to-right and
    /// non-overlapping per pass, until no ranked pair remains or one
    /// element is left.
    fn bpe_merge(&self, mut symbols: Vec<String>) -> Vec<String> {
        loop {
            if symbols.len() < 2 {
                break;
            }

            let mut best_rank: Option<usize> = None;
            let mut best_pair: Option<(String, String)> = None;
            for pair in symbols.windows(2) {
                if let Some(&rank) = self.merge_ranks.get(&(pair[0].clone(), pair[1].clone())) {
                    if best_rank.map(|r| rank < r).unwrap_or(true) {
                        best_rank = Some(rank);
                        best_pair = Some((pair[0].clone(), pair[1].clone()));
                    }
                }
            }

            let (a, b) = match best_pair {
                Some(pair) => pair,
                None => break,
            };

            let mut merged = Vec::with_capacity(symbols.len());
            let mut i = 0;
            while i < symbols.len() {
                if i + 1 < symbols.len() && symbols[i] == a && symbols[i + 1] == b {
                    merged.push(format!("{a}{b}"));
                    i += 2;
                } else {
                    merged.push(symbols[i].clone());
                    i += 1;
                }
            }
            symbols = merged;
        }
        symbols
    }

    pub fn encode(&self, text: &str, max_len: usize) -> Encoding {
        let normalized = Self::normalize(text);
        let mut ids: Vec<i64> = vec![self.bos_id];

        for pretoken in Self::pretokenize(&normalized) {
            let symbols = self.encode_bytes_as_symbols(&pretoken);
            let merged = self.bpe_merge(symbols);
            for symbol in merged {
                if let Some(&id) = self.vocab.get(&symbol) {
                    ids.push(id);
                }
                // Unknown final symbols are silently dropped.
            }
        }

        ids.push(self.eos_id);
        if ids.len() > max_len {
            ids.truncate(max_len - 1);
            ids.push(self.eos_id);
        }

        let mut attention_mask = vec![1i64; ids.len()];
        while ids.len() < max_len {
            ids.push(self.pad_id);
            attention_mask.push(0);
        }
        let token_type_ids = vec![0i64; ids.len()];

        Encoding {
            input_ids: ids,
            attention_mask,
            token_type_ids,
        }
    }
}
