use onnxkit::tokenizers::bpe::BpeTokenizer;
use onnxkit::tokenizers::wordpiece::WordPieceTokenizer;

fn sample_wordpiece_vocab() -> &'static str {
    "[PAD]\n[UNK]\n[CLS]\n[SEP]\nhello\nworld\nplay\n##ing\n##s\n"
}

#[test]
fn wordpiece_encode_pair_truncates_longer_side_first() {
    let tok = WordPieceTokenizer::from_vocab_text(sample_wordpiece_vocab()).unwrap();
    let enc = tok.encode_pair("hello world playing", "hello", 6);
    assert_eq!(enc.input_ids.len(), 6);
    // vocab order: [PAD]=0 [UNK]=1 [CLS]=2 [SEP]=3 ...
    assert_eq!(enc.input_ids.first().copied(), Some(2));
    assert_eq!(enc.input_ids.last().copied(), Some(3));
}

#[test]
fn wordpiece_attention_mask_is_always_all_ones() {
    let tok = WordPieceTokenizer::from_vocab_text(sample_wordpiece_vocab()).unwrap();
    let enc = tok.encode("hello world", 10);
    assert!(enc.attention_mask.iter().all(|&m| m == 1));
}

fn tiny_bpe_vocab_and_merges() -> (String, String) {
    let vocab = serde_json::json!({
        "h": 10, "e": 11, "l": 12, "o</w>": 13,
        "he": 14, "ll": 15, "hell": 16,
        "<|startoftext|>": 1, "<|endoftext|>": 2, "<pad>": 0,
    })
    .to_string();
    let merges = "#version: tiny\nh e\nl l\nhe ll\n".to_string();
    (vocab, merges)
}

#[test]
fn bpe_round_trips_through_the_model_source_layout_style_constructor() {
    let (vocab, merges) = tiny_bpe_vocab_and_merges();
    let tok = BpeTokenizer::new(&vocab, &merges, 1, 2, 0).unwrap();
    let enc = tok.encode("hell", 16);
    assert_eq!(enc.input_ids.first().copied(), Some(1));
    assert!(enc.input_ids.contains(&2));
    assert_eq!(enc.input_ids.len(), enc.attention_mask.len());
}

#[test]
fn wordpiece_and_bpe_encodings_are_both_fixed_length_when_padded() {
    let wp = WordPieceTokenizer::from_vocab_text(sample_wordpiece_vocab()).unwrap();
    let wp_enc = wp.encode("hello world", 12);
    assert!(wp_enc.input_ids.len() <= 12);

    let (vocab, merges) = tiny_bpe_vocab_and_merges();
    let bpe = BpeTokenizer::new(&vocab, &merges, 1, 2, 0).unwrap();
    let bpe_enc = bpe.encode("he", 8);
    assert_eq!(bpe_enc.input_ids.len(), 8);
}
