//! Trinary domain model for the tangle: tryte codec, Curl digest, the fixed
//! transaction frame, and minimal bundle finalization.

pub mod bundle;
pub mod curl;
pub mod transaction;
pub mod trinary;

use thiserror::Error;

pub use bundle::Bundle;
pub use curl::{transaction_hash, Curl, HASH_TRYTES};
pub use transaction::{parse_transaction, TransactionDraft, TRANSACTION_TRYTES};

pub type Result<T> = std::result::Result<T, ModelError>;

#[derive(Debug, Error)]
pub enum ModelError {
    #[error("invalid tryte character {0:?}")]
    InvalidTryte(char),
    #[error("invalid trit value {0}")]
    InvalidTrit(i8),
    #[error("trit slice length {0} is not a multiple of 3")]
    TritLength(usize),
    #[error("{field} must be {expected} trytes, got {actual}")]
    FieldLength {
        field: &'static str,
        expected: usize,
        actual: usize,
    },
    #[error("value does not fit in {trits} trits")]
    ValueOverflow { trits: usize },
    #[error("timestamp {0} out of range")]
    Timestamp(i64),
    #[error("index {0} out of range")]
    Index(i64),
    #[error("bundle has no transactions")]
    EmptyBundle,
    #[error("bundle is not finalized")]
    NotFinalized,
}
