//! Curl-P-81 sponge. The ledger's transaction identity is the Curl digest of
//! the full 2673-tryte frame.

use crate::trinary::{trits_from_trytes, trytes_from_trits};
use crate::Result;

pub const HASH_TRITS: usize = 243;
pub const HASH_TRYTES: usize = 81;

const STATE_TRITS: usize = 729;
const ROUNDS: usize = 81;

// Indexed by a + 4b + 5 for trits a, b; entries at 3 and 7 are unreachable.
const TRUTH_TABLE: [i8; 11] = [1, 0, -1, 2, 1, -1, 0, 2, -1, 1, 0];

pub struct Curl {
    state: [i8; STATE_TRITS],
}

impl Curl {
    pub fn new() -> Self {
        Self {
            state: [0; STATE_TRITS],
        }
    }

    pub fn reset(&mut self) {
        self.state = [0; STATE_TRITS];
    }

    pub fn absorb(&mut self, trits: &[i8]) {
        for chunk in trits.chunks(HASH_TRITS) {
            self.state[..chunk.len()].copy_from_slice(chunk);
            self.transform();
        }
    }

    pub fn squeeze(&mut self, out: &mut [i8]) {
        for chunk in out.chunks_mut(HASH_TRITS) {
            chunk.copy_from_slice(&self.state[..chunk.len()]);
            if chunk.len() == HASH_TRITS {
                self.transform();
            }
        }
    }

    fn transform(&mut self) {
        let mut scratch = [0i8; STATE_TRITS];
        for _ in 0..ROUNDS {
            scratch.copy_from_slice(&self.state);
            let mut index = 0usize;
            for trit in self.state.iter_mut() {
                let a = scratch[index];
                index = if index < 365 { index + 364 } else { index - 365 };
                let b = scratch[index];
                *trit = TRUTH_TABLE[(a + (b << 2) + 5) as usize];
            }
        }
    }
}

impl Default for Curl {
    fn default() -> Self {
        Self::new()
    }
}

/// Digest of an attached transaction frame: deterministic, pure, and the
/// identity under which the ledger knows the transaction.
pub fn transaction_hash(frame: &str) -> Result<String> {
    let trits = trits_from_trytes(frame)?;
    let mut curl = Curl::new();
    curl.absorb(&trits);
    let mut out = [0i8; HASH_TRITS];
    curl.squeeze(&mut out);
    trytes_from_trits(&out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::trinary::is_trytes;

    #[test]
    fn digest_is_deterministic() {
        let frame = "9".repeat(2673);
        let a = transaction_hash(&frame).unwrap();
        let b = transaction_hash(&frame).unwrap();
        assert_eq!(a, b);
        assert_eq!(a.len(), HASH_TRYTES);
        assert!(is_trytes(&a));
    }

    #[test]
    fn digest_separates_inputs() {
        let zeros = "9".repeat(2673);
        let mut other = "A".to_string();
        other.push_str(&"9".repeat(2672));
        assert_ne!(
            transaction_hash(&zeros).unwrap(),
            transaction_hash(&other).unwrap()
        );
    }

    #[test]
    fn reset_restores_the_empty_state() {
        let trits = trits_from_trytes(&"ABC".repeat(81)).unwrap();
        let mut curl = Curl::new();
        curl.absorb(&trits);
        let mut first = [0i8; HASH_TRITS];
        curl.squeeze(&mut first);

        curl.reset();
        curl.absorb(&trits);
        let mut second = [0i8; HASH_TRITS];
        curl.squeeze(&mut second);
        assert_eq!(first, second);
    }

    #[test]
    fn rejects_non_tryte_input() {
        assert!(transaction_hash("abc").is_err());
    }
}
