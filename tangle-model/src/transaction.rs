//! Fixed-offset transaction frame: 2673 trytes, fields at the ledger's
//! canonical positions.

use chrono::{DateTime, Utc};
use hub_types::types::{Transaction, Trytes};

use crate::curl::transaction_hash;
use crate::trinary::{i64_to_trits, trits_from_trytes, trits_to_i64, trytes_from_trits};
use crate::{ModelError, Result};

pub const TRANSACTION_TRYTES: usize = 2673;

#[derive(Debug, Clone, Copy)]
pub struct Field {
    pub offset: usize,
    pub len: usize,
}

impl Field {
    fn slice<'a>(&self, frame: &'a str) -> &'a str {
        &frame[self.offset..self.offset + self.len]
    }
}

pub const SIGNATURE_MESSAGE: Field = Field { offset: 0, len: 2187 };
pub const ADDRESS: Field = Field { offset: 2187, len: 81 };
pub const VALUE: Field = Field { offset: 2268, len: 27 };
pub const OBSOLETE_TAG: Field = Field { offset: 2295, len: 27 };
pub const TIMESTAMP: Field = Field { offset: 2322, len: 9 };
pub const CURRENT_INDEX: Field = Field { offset: 2331, len: 9 };
pub const LAST_INDEX: Field = Field { offset: 2340, len: 9 };
pub const BUNDLE: Field = Field { offset: 2349, len: 81 };
pub const TRUNK: Field = Field { offset: 2430, len: 81 };
pub const BRANCH: Field = Field { offset: 2511, len: 81 };
pub const TAG: Field = Field { offset: 2592, len: 27 };
pub const ATTACHMENT_TIMESTAMP: Field = Field { offset: 2619, len: 9 };
pub const ATTACHMENT_TIMESTAMP_LOWER: Field = Field { offset: 2628, len: 9 };
pub const ATTACHMENT_TIMESTAMP_UPPER: Field = Field { offset: 2637, len: 9 };
pub const NONCE: Field = Field { offset: 2646, len: 27 };

fn field_i64(frame: &str, field: Field) -> Result<i64> {
    trits_to_i64(&trits_from_trytes(field.slice(frame))?)
}

fn field_index(frame: &str, field: Field) -> Result<u64> {
    let raw = field_i64(frame, field)?;
    u64::try_from(raw).map_err(|_| ModelError::Index(raw))
}

/// Decodes an attached frame into the shared ledger view. The hash is
/// computed, not trusted from the caller.
pub fn parse_transaction(frame: &str) -> Result<Transaction> {
    if frame.len() != TRANSACTION_TRYTES {
        return Err(ModelError::FieldLength {
            field: "transaction",
            expected: TRANSACTION_TRYTES,
            actual: frame.len(),
        });
    }
    let hash = transaction_hash(frame)?;
    let timestamp_s = field_i64(frame, TIMESTAMP)?;
    let timestamp = DateTime::<Utc>::from_timestamp(timestamp_s, 0)
        .ok_or(ModelError::Timestamp(timestamp_s))?;
    Ok(Transaction {
        hash,
        address: ADDRESS.slice(frame).to_string(),
        value: field_i64(frame, VALUE)?,
        timestamp,
        current_index: field_index(frame, CURRENT_INDEX)?,
        last_index: field_index(frame, LAST_INDEX)?,
        bundle_hash: BUNDLE.slice(frame).to_string(),
        trunk_hash: TRUNK.slice(frame).to_string(),
    })
}

/// Unattached transaction under construction. Signature, trunk, branch, and
/// nonce stay empty; proof-of-work fills the attachment fields.
#[derive(Debug, Clone)]
pub struct TransactionDraft {
    pub address: String,
    pub value: i64,
    pub obsolete_tag: String,
    pub timestamp: i64,
    pub current_index: u64,
    pub last_index: u64,
    pub bundle: String,
    pub tag: String,
}

impl TransactionDraft {
    /// Zero-value draft, as used for promotion spam.
    pub fn zero_value(address: &str, timestamp: i64) -> Self {
        Self {
            address: address.to_string(),
            value: 0,
            obsolete_tag: "9".repeat(OBSOLETE_TAG.len),
            timestamp,
            current_index: 0,
            last_index: 0,
            bundle: "9".repeat(BUNDLE.len),
            tag: "9".repeat(TAG.len),
        }
    }

    fn check(&self, field: &'static str, value: &str, expected: usize) -> Result<()> {
        if value.len() != expected {
            return Err(ModelError::FieldLength {
                field,
                expected,
                actual: value.len(),
            });
        }
        match value.chars().find(|c| !(*c == '9' || c.is_ascii_uppercase())) {
            Some(c) => Err(ModelError::InvalidTryte(c)),
            None => Ok(()),
        }
    }

    /// Bundle-essence trits: address, value, obsolete tag, timestamp, and
    /// the two indices, 486 trits per transaction.
    pub fn essence_trits(&self) -> Result<Vec<i8>> {
        self.check("address", &self.address, ADDRESS.len)?;
        self.check("obsolete_tag", &self.obsolete_tag, OBSOLETE_TAG.len)?;
        let mut trits = trits_from_trytes(&self.address)?;
        trits.extend(i64_to_trits(self.value, VALUE.len * 3)?);
        trits.extend(trits_from_trytes(&self.obsolete_tag)?);
        trits.extend(i64_to_trits(self.timestamp, TIMESTAMP.len * 3)?);
        trits.extend(i64_to_trits(self.current_index as i64, CURRENT_INDEX.len * 3)?);
        trits.extend(i64_to_trits(self.last_index as i64, LAST_INDEX.len * 3)?);
        Ok(trits)
    }

    pub fn to_trytes(&self) -> Result<Trytes> {
        self.check("address", &self.address, ADDRESS.len)?;
        self.check("obsolete_tag", &self.obsolete_tag, OBSOLETE_TAG.len)?;
        self.check("bundle", &self.bundle, BUNDLE.len)?;
        self.check("tag", &self.tag, TAG.len)?;

        let mut frame = vec![b'9'; TRANSACTION_TRYTES];
        write_field(&mut frame, ADDRESS, &self.address);
        write_field(
            &mut frame,
            VALUE,
            &trytes_from_trits(&i64_to_trits(self.value, VALUE.len * 3)?)?,
        );
        write_field(&mut frame, OBSOLETE_TAG, &self.obsolete_tag);
        write_field(
            &mut frame,
            TIMESTAMP,
            &trytes_from_trits(&i64_to_trits(self.timestamp, TIMESTAMP.len * 3)?)?,
        );
        write_field(
            &mut frame,
            CURRENT_INDEX,
            &trytes_from_trits(&i64_to_trits(self.current_index as i64, CURRENT_INDEX.len * 3)?)?,
        );
        write_field(
            &mut frame,
            LAST_INDEX,
            &trytes_from_trits(&i64_to_trits(self.last_index as i64, LAST_INDEX.len * 3)?)?,
        );
        write_field(&mut frame, BUNDLE, &self.bundle);
        write_field(&mut frame, TAG, &self.tag);

        debug_assert!(frame.is_ascii());
        Ok(String::from_utf8(frame).expect("frame is ascii trytes"))
    }
}

fn write_field(frame: &mut [u8], field: Field, trytes: &str) {
    frame[field.offset..field.offset + field.len].copy_from_slice(trytes.as_bytes());
}
