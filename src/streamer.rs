//! A stop-sequence-safe buffered emitter: withholds only the suffix that
//! could still grow into a stop sequence, and nothing a matched stop
//! sequence covers ever reaches the listener.

/// The largest byte offset `<= index` that lands on a UTF-8 char boundary.
fn floor_char_boundary(s: &str, index: usize) -> usize {
    let mut i = index.min(s.len());
    while i > 0 && !s.is_char_boundary(i) {
        i -= 1;
    }
    i
}

pub struct TokenStreamer {
    stop_sequences: Vec<String>,
    max_stop_len: usize,
    buffer: String,
    flushed: String,
    stopped: bool,
}

impl TokenStreamer {
    pub fn new(stop_sequences: Vec<String>) -> Self {
        let max_stop_len = stop_sequences.iter().map(|s| s.len()).max().unwrap_or(0);
        Self {
            stop_sequences,
            max_stop_len,
            buffer: String::new(),
            flushed: String::new(),
            stopped: false,
        }
    }

    fn find_first_stop(&self) -> Option<usize> {
        self.stop_sequences
            .iter()
            .filter_map(|s| self.buffer.find(s.as_str()))
            .min()
    }

    /// Appends `fragment`, then emits via `listener` whatever is now
    /// confirmed safe. No-op once `stopped`.
    pub fn accept(&mut self, fragment: &str, mut listener: impl FnMut(&str)) {
        if self.stopped {
            return;
        }
        self.buffer.push_str(fragment);

        if let Some(offset) = self.find_first_stop() {
            let safe: String = self.buffer.drain(..offset).collect();
            self.buffer.clear();
            self.stopped = true;
            if !safe.is_empty() {
                listener(&safe);
                self.flushed.push_str(&safe);
            }
            return;
        }

        let target_len = self.buffer.len().saturating_sub(self.max_stop_len);
        let safe_len = floor_char_boundary(&self.buffer, target_len);
        if safe_len > 0 {
            let safe: String = self.buffer.drain(..safe_len).collect();
            listener(&safe);
            self.flushed.push_str(&safe);
        }
    }

    /// Flushes the remaining buffer unconditionally, unless already
    /// stopped or empty.
    pub fn flush(&mut self, mut listener: impl FnMut(&str)) {
        if self.stopped || self.buffer.is_empty() {
            return;
        }
        let safe = std::mem::take(&mut self.buffer);
        listener(&safe);
        self.flushed.push_str(&safe);
    }

    pub fn is_stopped(&self) -> bool {
        self.stopped
    }

    pub fn text(&self) -> &str {
        &self.flushed
    }
}
