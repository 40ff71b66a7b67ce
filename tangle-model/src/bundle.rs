//! Minimal bundle assembly: essence hashing and finalization. Signing is not
//! handled here; the hub only builds unsigned zero-value bundles itself.

use hub_types::types::Trytes;

use crate::curl::{Curl, HASH_TRITS};
use crate::transaction::TransactionDraft;
use crate::trinary::{increment_trits, trits_from_trytes, tryte_value, trytes_from_trits};
use crate::{ModelError, Result};

pub struct Bundle {
    drafts: Vec<TransactionDraft>,
    hash: Option<String>,
}

impl Bundle {
    pub fn new() -> Self {
        Self {
            drafts: Vec::new(),
            hash: None,
        }
    }

    pub fn push(&mut self, draft: TransactionDraft) {
        self.drafts.push(draft);
        self.hash = None;
    }

    pub fn hash(&self) -> Option<&str> {
        self.hash.as_deref()
    }

    pub fn len(&self) -> usize {
        self.drafts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.drafts.is_empty()
    }

    /// Assigns indices, computes the content hash over all essences, and
    /// stamps it into every transaction. The obsolete tag of the first
    /// transaction is incremented until the normalized hash is free of the
    /// value 13, matching the ledger's signing rules even for unsigned
    /// bundles.
    pub fn finalize(&mut self) -> Result<String> {
        if self.drafts.is_empty() {
            return Err(ModelError::EmptyBundle);
        }
        let last_index = self.drafts.len() as u64 - 1;
        for (index, draft) in self.drafts.iter_mut().enumerate() {
            draft.current_index = index as u64;
            draft.last_index = last_index;
        }
        loop {
            let mut curl = Curl::new();
            for draft in &self.drafts {
                curl.absorb(&draft.essence_trits()?);
            }
            let mut out = [0i8; HASH_TRITS];
            curl.squeeze(&mut out);
            let hash = trytes_from_trits(&out)?;

            if normalized(&hash)?.contains(&13) {
                let first = &mut self.drafts[0];
                let mut tag = trits_from_trytes(&first.obsolete_tag)?;
                increment_trits(&mut tag);
                first.obsolete_tag = trytes_from_trits(&tag)?;
                continue;
            }

            for draft in self.drafts.iter_mut() {
                draft.bundle = hash.clone();
            }
            self.hash = Some(hash.clone());
            return Ok(hash);
        }
    }

    /// Attachable frames, tail (index 0) first. Requires `finalize`.
    pub fn to_trytes(&self) -> Result<Vec<Trytes>> {
        if self.hash.is_none() {
            return Err(ModelError::NotFinalized);
        }
        self.drafts.iter().map(|draft| draft.to_trytes()).collect()
    }
}

impl Default for Bundle {
    fn default() -> Self {
        Self::new()
    }
}

/// Per-27-tryte-chunk sum normalization of a bundle hash.
pub fn normalized(hash: &str) -> Result<Vec<i8>> {
    let mut values = hash
        .chars()
        .map(tryte_value)
        .collect::<Result<Vec<i8>>>()?;
    for chunk in values.chunks_mut(27) {
        let mut sum: i64 = chunk.iter().map(|v| *v as i64).sum();
        while sum > 0 {
            for value in chunk.iter_mut() {
                if *value > -13 {
                    *value -= 1;
                    sum -= 1;
                    break;
                }
            }
        }
        while sum < 0 {
            for value in chunk.iter_mut() {
                if *value < 13 {
                    *value += 1;
                    sum += 1;
                    break;
                }
            }
        }
    }
    Ok(values)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transaction::{parse_transaction, TRANSACTION_TRYTES};
    use crate::trinary::is_trytes;

    fn address(seed: &str) -> String {
        seed.chars().cycle().take(81).collect()
    }

    #[test]
    fn finalize_requires_a_transaction() {
        let mut bundle = Bundle::new();
        assert!(matches!(bundle.finalize(), Err(ModelError::EmptyBundle)));
    }

    #[test]
    fn finalize_stamps_every_frame() {
        let mut bundle = Bundle::new();
        bundle.push(TransactionDraft::zero_value(&address("HUB"), 1_543_585_920));
        bundle.push(TransactionDraft::zero_value(&address("SPAM"), 1_543_585_920));
        let hash = bundle.finalize().unwrap();
        assert_eq!(hash.len(), 81);
        assert!(is_trytes(&hash));

        let frames = bundle.to_trytes().unwrap();
        assert_eq!(frames.len(), 2);
        for (index, frame) in frames.iter().enumerate() {
            assert_eq!(frame.len(), TRANSACTION_TRYTES);
            let parsed = parse_transaction(frame).unwrap();
            assert_eq!(parsed.bundle_hash, hash);
            assert_eq!(parsed.current_index, index as u64);
            assert_eq!(parsed.last_index, 1);
        }
    }

    #[test]
    fn finalize_is_deterministic() {
        let build = || {
            let mut bundle = Bundle::new();
            bundle.push(TransactionDraft::zero_value(&address("HUB"), 1_543_585_920));
            bundle
        };
        assert_eq!(build().finalize().unwrap(), build().finalize().unwrap());
    }

    #[test]
    fn finalized_hash_normalizes_without_thirteen() {
        let mut bundle = Bundle::new();
        bundle.push(TransactionDraft::zero_value(&address("Z"), 1_543_585_920));
        let hash = bundle.finalize().unwrap();
        assert!(!normalized(&hash).unwrap().contains(&13));
    }

    #[test]
    fn to_trytes_requires_finalize() {
        let mut bundle = Bundle::new();
        bundle.push(TransactionDraft::zero_value(&address("HUB"), 0));
        assert!(matches!(bundle.to_trytes(), Err(ModelError::NotFinalized)));
    }

    #[test]
    fn normalized_chunks_sum_to_zero() {
        let hash = "M".repeat(81);
        let values = normalized(&hash).unwrap();
        for chunk in values.chunks(27) {
            assert_eq!(chunk.iter().map(|v| *v as i64).sum::<i64>(), 0);
        }
    }
}
