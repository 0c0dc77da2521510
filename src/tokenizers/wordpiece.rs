//! WordPiece: greedy longest-match subword tokenization from a vocabulary
//! file, one token per line (zero-based index = id).

use std::collections::HashMap;
use std::fs;
use std::path::Path;

use super::{is_punctuation, Encoding};
use crate::error::{OnnxKitError, Result};

const DEFAULT_UNK_ID: i64 = 0;

pub struct WordPieceTokenizer {
    vocab: HashMap<String, i64>,
    cls_token: String,
    sep_token: String,
    unk_token: String,
    cls_id: i64,
    sep_id: i64,
    unk_id: i64,
}

impl WordPieceTokenizer {
    /// Load an ordered `token -> id` mapping from a vocab file (one token
    /// per line). `[UNK]` falls back to id 0 if absent from the vocab.
    pub fn from_vocab_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let contents = fs::read_to_string(path.as_ref())
            .map_err(|e| OnnxKitError::ModelSourceError(format!("reading vocab file: {e}")))?;
        Self::from_vocab_text(&contents)
    }

    pub fn from_vocab_text(contents: &str) -> Result<Self> {
        let mut vocab = HashMap::new();
        for (idx, line) in contents.lines().enumerate() {
            vocab.insert(line.to_string(), idx as i64);
        }

        let cls_token = "[CLS]".to_string();
        let sep_token = "[SEP]".to_string();
        let unk_token = "[UNK]".to_string();

        let cls_id = *vocab.get(&cls_token).ok_or_else(|| {
            OnnxKitError::ModelSourceError("vocab missing [CLS]".to_string())
        })?;
        let sep_id = *vocab.get(&sep_token).ok_or_else(|| {
            OnnxKitError::ModelSourceError("vocab missing [SEP]".to_string())
        })?;
        let unk_id = vocab.get(&unk_token).copied().unwrap_or(DEFAULT_UNK_ID);

        Ok(Self {
            vocab,
            cls_token,
            sep_token,
            unk_token,
            cls_id,
            sep_id,
            unk_id,
        })
    }

    /// Lowercase + trim, then split on whitespace and isolate punctuation
    /// into standalone basic tokens.
    fn basic_tokenize(&self, text: &str) -> Vec<String> {
        let lowered = text.to_lowercase();
        let mut tokens = Vec::new();
        let mut current = String::new();

        for c in lowered.trim().chars() {
            if c.is_whitespace() {
                if !current.is_empty() {
                    tokens.push(std::mem::take(&mut current));
                }
            } else if is_punctuation(c) {
                if !current.is_empty() {
                    tokens.push(std::mem::take(&mut current));
                }
                tokens.push(c.to_string());
            } else {
                current.push(c);
            }
        }
        if !current.is_empty() {
            tokens.push(current);
        }
        tokens
    }

    /// Greedy longest-match-first subword split of a single basic token.
    fn wordpiece_tokenize(&self, token: &str) -> Vec<String> {
        let chars: Vec<char> = token.chars().collect();
        let mut sub_tokens = Vec::new();
        let mut start = 0usize;

        while start < chars.len() {
            let mut end = chars.len();
            let mut found = None;

            while start < end {
                let mut candidate: String = chars[start..end].iter().collect();
                if start > 0 {
                    candidate = format!("##{candidate}");
                }
                if self.vocab.contains_key(&candidate) {
                    found = Some(candidate);
                    break;
                }
                end -= 1;
            }

            match found {
                Some(piece) => {
                    sub_tokens.push(piece);
                    start = end;
                }
                None => return vec![self.unk_token.clone()],
            }
        }

        sub_tokens
    }

    fn tokenize(&self, text: &str) -> Vec<String> {
        let mut out = Vec::new();
        for basic in self.basic_tokenize(text) {
            out.extend(self.wordpiece_tokenize(&basic));
        }
        out
    }

    fn token_id(&self, token: &str) -> i64 {
        self.vocab.get(token).copied().unwrap_or(self.unk_id)
    }

    /// Single-sequence encode: `[CLS] tokens [SEP]`, truncated so the last
    /// position is always `[SEP]`.
    pub fn encode(&self, text: &str, max_len: usize) -> Encoding {
        let tokens = self.tokenize(text);
        let budget = max_len.saturating_sub(2);
        let truncated = &tokens[..tokens.len().min(budget)];

        let mut ids = vec![self.cls_id];
        ids.extend(truncated.iter().map(|t| self.token_id(t)));
        ids.push(self.sep_id);

        let attention_mask = vec![1i64; ids.len()];
        let token_type_ids = vec![0i64; ids.len()];

        Encoding {
            input_ids: ids,
            attention_mask,
            token_type_ids,
        }
    }

    /// Sentence-pair encode: `[CLS] A [SEP] B [SEP]`, token-type 0 through
    /// the first `[SEP]` inclusive and 1 afterward. Truncation removes from
    /// the longer side first.
    pub fn encode_pair(&self, text_a: &str, text_b: &str, max_len: usize) -> Encoding {
        let mut a = self.tokenize(text_a);
        let mut b = self.tokenize(text_b);

        // 3 special tokens: [CLS] ... [SEP] ... [SEP]
        let budget = max_len.saturating_sub(3);
        while a.len() + b.len() > budget {
            if a.len() >= b.len() {
                a.pop();
            } else {
                b.pop();
            }
        }

        let mut ids = vec![self.cls_id];
        ids.extend(a.iter().map(|t| self.token_id(t)));
        ids.push(self.sep_id);
        let first_segment_len = ids.len();
        ids.extend(b.iter().map(|t| self.token_id(t)));
        ids.push(self.sep_id);

        let attention_mask = vec![1i64; ids.len()];
        let mut token_type_ids = vec![0i64; first_segment_len];
        token_type_ids.resize(ids.len(), 1);

        Encoding {
            input_ids: ids,
            attention_mask,
            token_type_ids,
        }
    }

    pub fn cls_token(&self) -> &str {
        &self.cls_token
    }

    pub fn sep_token(&self) -> &str {
        &self.sep_token
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_vocab() -> &'static str {
        "[PAD]\n[UNK]\n[CLS]\n[SEP]\nhello\nworld\n##ing\nplay\nrun\n##n\n##ner\n!\n"
    }

    #[test]
    fn encode_wraps_with_cls_and_sep() {
        let tok = WordPieceTokenizer::from_vocab_text(sample_vocab()).unwrap();
        let enc = tok.encode("hello world", 10);
        assert_eq!(enc.input_ids.first().copied().unwrap(), tok.cls_id);
        assert_eq!(enc.input_ids.last().copied().unwrap(), tok.sep_id);
        assert!(enc.attention_mask.iter().all(|&m| m == 1));
        assert!(enc.token_type_ids.iter().all(|&t| t == 0));
    }

    #[test]
    fn truncation_keeps_sep_as_last_token() {
        let tok = WordPieceTokenizer::from_vocab_text(sample_vocab()).unwrap();
        let enc = tok.encode("hello world hello world hello world", 4);
        assert_eq!(enc.input_ids.len(), 4);
        assert_eq!(*enc.input_ids.last().unwrap(), tok.sep_id);
    }

    #[test]
    fn unknown_word_emits_unk_and_abandons_rest() {
        let tok = WordPieceTokenizer::from_vocab_text(sample_vocab()).unwrap();
        let pieces = tok.tokenize("zzzznotinvocab");
        assert_eq!(pieces, vec!["[UNK]".to_string()]);
    }

    #[test]
    fn greedy_longest_match_prefers_longest_prefix_with_continuation() {
        let tok = WordPieceTokenizer::from_vocab_text(sample_vocab()).unwrap();
        // "runner" -> "run" + "##ner"
        let pieces = tok.tokenize("runner");
        assert_eq!(pieces, vec!["run".to_string(), "##ner".to_string()]);
    }

    #[test]
    fn pair_encoding_sets_token_type_ids() {
        let tok = WordPieceTokenizer::from_vocab_text(sample_vocab()).unwrap();
        let enc = tok.encode_pair("hello", "world", 20);
        let first_sep = enc
            .input_ids
            .iter()
            .position(|&id| id == tok.sep_id)
            .unwrap();
        for (i, &tt) in enc.token_type_ids.iter().enumerate() {
            if i <= first_sep {
                assert_eq!(tt, 0);
            } else {
                assert_eq!(tt, 1);
            }
        }
    }

    #[test]
    fn punctuation_is_isolated_as_its_own_token() {
        let tok = WordPieceTokenizer::from_vocab_text(sample_vocab()).unwrap();
        let basic = tok.basic_tokenize("hello!");
        assert_eq!(basic, vec!["hello".to_string(), "!".to_string()]);
    }
}
