//! A size-indexed pool of native-order byte buffers, amortizing allocation
//! across inference calls. Not safe for concurrent use on the same
//! instance; guard with a `Mutex` if shared across threads.

const DEFAULT_MAX_POOLED: usize = 16;

/// A leased or pooled native-order byte buffer.
#[derive(Debug, Clone)]
pub struct PooledBuffer {
    bytes: Vec<u8>,
    position: usize,
}

impl PooledBuffer {
    fn new(capacity: usize) -> Self {
        Self {
            bytes: vec![0u8; capacity],
            position: 0,
        }
    }

    pub fn capacity(&self) -> usize {
        self.bytes.len()
    }

    pub fn position(&self) -> usize {
        self.position
    }

    pub fn as_slice(&self) -> &[u8] {
        &self.bytes
    }

    pub fn as_mut_slice(&mut self) -> &mut [u8] {
        &mut self.bytes
    }
}

/// An unordered collection of reusable buffers bounded by `max_pooled`.
pub struct DirectBufferPool {
    pooled: Vec<PooledBuffer>,
    max_pooled: usize,
}

impl Default for DirectBufferPool {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_POOLED)
    }
}

impl DirectBufferPool {
    pub fn new(max_pooled: usize) -> Self {
        Self {
            pooled: Vec::new(),
            max_pooled,
        }
    }

    /// Smallest pooled index with capacity >= `min_capacity`, if any.
    fn smallest_suitable_index(&self, min_capacity: usize) -> Option<usize> {
        self.pooled
            .iter()
            .enumerate()
            .filter(|(_, b)| b.capacity() >= min_capacity)
            .min_by_key(|(_, b)| b.capacity())
            .map(|(i, _)| i)
    }

    fn smallest_index(&self) -> Option<usize> {
        self.pooled
            .iter()
            .enumerate()
            .min_by_key(|(_, b)| b.capacity())
            .map(|(i, _)| i)
    }

    /// Lease a buffer with capacity >= `min_capacity`, position 0. Prefers
    /// the smallest suitable pooled buffer; allocates fresh otherwise.
    pub fn lease(&mut self, min_capacity: usize) -> PooledBuffer {
        if let Some(idx) = self.smallest_suitable_index(min_capacity) {
            self.pooled.remove(idx)
        } else {
            PooledBuffer::new(min_capacity)
        }
    }

    /// Return a buffer to the pool. Position is reset to 0 unconditionally.
    /// If the pool is full, evicts the smallest member only if `buf` is
    /// larger; otherwise the returned buffer is dropped.
    pub fn return_buffer(&mut self, mut buf: PooledBuffer) {
        buf.position = 0;

        if self.pooled.len() < self.max_pooled {
            self.pooled.push(buf);
            return;
        }

        if let Some(idx) = self.smallest_index() {
            if self.pooled[idx].capacity() < buf.capacity() {
                self.pooled.remove(idx);
                self.pooled.push(buf);
            }
        }
    }

    pub fn size(&self) -> usize {
        self.pooled.len()
    }

    pub fn clear(&mut self) {
        self.pooled.clear();
    }
}
