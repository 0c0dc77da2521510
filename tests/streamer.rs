use onnxkit::streamer::TokenStreamer;

#[test]
fn listener_never_observes_characters_inside_a_matched_stop_sequence() {
    let mut streamer = TokenStreamer::new(vec!["STOP".to_string()]);
    let mut seen = String::new();
    for fragment in ["answer", " is ", "42", "STOP", "ignored after"] {
        streamer.accept(fragment, |s| seen.push_str(s));
    }
    assert!(!seen.contains("STOP"));
    assert_eq!(seen, "answer is 42");
    assert!(streamer.is_stopped());
}

#[test]
fn multiple_stop_sequences_use_the_earliest_match() {
    let mut streamer = TokenStreamer::new(vec!["bb".to_string(), "a".to_string()]);
    let mut seen = String::new();
    streamer.accept("xabb", |s| seen.push_str(s));
    assert_eq!(seen, "x");
    assert!(streamer.is_stopped());
}

#[test]
fn final_flush_is_unnecessary_once_a_stop_sequence_is_found_mid_fragment() {
    let mut streamer = TokenStreamer::new(vec!["END".to_string()]);
    let mut seen = String::new();
    streamer.accept("beforeEND", |s| seen.push_str(s));
    streamer.flush(|s| seen.push_str(s));
    assert_eq!(seen, "before");
}
