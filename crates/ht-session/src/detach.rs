//! Detach sequence recognition
//!
//! The filter sits between local input and the connection. Bytes that could
//! still be the start of the detach sequence are held back until the next
//! byte decides; once the full sequence is seen nothing else is forwarded.
//! Matching follows a failure table so overlapping prefixes like `a,a,b`
//! against input `aaab` resolve correctly.

use ht_core::DetachKeys;

/// Result of feeding a chunk through the filter
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct Filtered {
    /// Bytes safe to forward to the remote
    pub forward: Vec<u8>,
    /// The detach sequence completed within this chunk
    pub detached: bool,
}

/// Streaming matcher for the detach key sequence
#[derive(Debug, Clone)]
pub struct DetachSequenceFilter {
    keys: Vec<u8>,
    failure: Vec<usize>,
    matched: usize,
    detached: bool,
}

impl DetachSequenceFilter {
    /// Create a filter for the given sequence
    pub fn new(keys: &DetachKeys) -> Self {
        let keys = if keys.as_bytes().is_empty() {
            DetachKeys::default().as_bytes().to_vec()
        } else {
            keys.as_bytes().to_vec()
        };
        let failure = failure_table(&keys);
        Self {
            keys,
            failure,
            matched: 0,
            detached: false,
        }
    }

    /// Feed a chunk of local input
    pub fn feed(&mut self, input: &[u8]) -> Filtered {
        if self.detached {
            return Filtered {
                forward: Vec::new(),
                detached: true,
            };
        }

        let mut forward = Vec::with_capacity(input.len() + self.matched);
        for &byte in input {
            let held = self.matched;
            let mut state = held;
            while state > 0 && self.keys[state] != byte {
                state = self.failure[state - 1];
            }
            if self.keys[state] == byte {
                state += 1;
            }

            // Held bytes plus this one, minus what is still a live prefix
            let released = held + 1 - state;
            forward.extend_from_slice(&self.keys[..released.min(held)]);
            if state == 0 {
                forward.push(byte);
            }
            self.matched = state;

            if state == self.keys.len() {
                self.matched = 0;
                self.detached = true;
                return Filtered {
                    forward,
                    detached: true,
                };
            }
        }

        Filtered {
            forward,
            detached: false,
        }
    }

    /// Release any held partial match at end of input
    pub fn finish(&mut self) -> Vec<u8> {
        if self.detached {
            return Vec::new();
        }
        let held = self.keys[..self.matched].to_vec();
        self.matched = 0;
        held
    }

    /// Whether the sequence has been seen
    pub fn is_detached(&self) -> bool {
        self.detached
    }
}

fn failure_table(keys: &[u8]) -> Vec<usize> {
    let mut table = vec![0; keys.len()];
    let mut k = 0;
    for i in 1..keys.len() {
        while k > 0 && keys[i] != keys[k] {
            k = table[k - 1];
        }
        if keys[i] == keys[k] {
            k += 1;
        }
        table[i] = k;
    }
    table
}
