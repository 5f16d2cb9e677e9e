//! Hash chain over appended audit records
//!
//! Each stored record is sealed with `hash = sha256(prev_hash || json(record))`.
//! The record itself keeps its exact field set; the chain lives in the
//! envelope written by the sink.

use super::types::AuditRecord;
use crate::error::Result;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

/// An audit record as stored by a sink
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SealedRecord {
    pub record: AuditRecord,
    pub prev_hash: Option<String>,
    pub hash: String,
}

impl SealedRecord {
    /// Seal `record` onto a chain whose head is `prev_hash`
    pub fn seal(record: AuditRecord, prev_hash: Option<String>) -> Result<Self> {
        let hash = compute_hash(prev_hash.as_deref(), &record)?;
        Ok(Self {
            record,
            prev_hash,
            hash,
        })
    }
}

fn compute_hash(prev_hash: Option<&str>, record: &AuditRecord) -> Result<String> {
    let mut hasher = Sha256::new();
    hasher.update(prev_hash.unwrap_or("").as_bytes());
    hasher.update(serde_json::to_vec(record)?);
    Ok(format!("{:x}", hasher.finalize()))
}

/// Running head of the chain
#[derive(Debug, Default)]
pub struct IntegrityChain {
    last_hash: Option<String>,
    entry_count: u64,
}

impl IntegrityChain {
    pub fn new() -> Self {
        Self::default()
    }

    /// Resume a chain from persisted state
    pub fn from_state(last_hash: Option<String>, entry_count: u64) -> Self {
        Self {
            last_hash,
            entry_count,
        }
    }

    /// Seal the next record without advancing the head
    pub fn seal(&self, record: AuditRecord) -> Result<SealedRecord> {
        SealedRecord::seal(record, self.last_hash.clone())
    }

    /// Advance the head after the sealed record was stored
    pub fn advance(&mut self, sealed: &SealedRecord) {
        self.last_hash = Some(sealed.hash.clone());
        self.entry_count += 1;
    }

    pub fn head(&self) -> Option<&str> {
        self.last_hash.as_deref()
    }

    pub fn entry_count(&self) -> u64 {
        self.entry_count
    }
}

/// Result of verifying a stored chain
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ChainVerification {
    pub valid: bool,
    pub total_entries: usize,
    pub first_invalid_index: Option<usize>,
}

/// Check that every entry links to its predecessor and its hash matches
pub fn verify_chain(entries: &[SealedRecord]) -> Result<ChainVerification> {
    verify_entries(entries.iter().map(Some))
}

/// `verify_chain` over stored entries where `None` marks one that could not
/// be read back; an unreadable entry breaks the chain at its index.
pub fn verify_entries<'a, I>(entries: I) -> Result<ChainVerification>
where
    I: IntoIterator<Item = Option<&'a SealedRecord>>,
{
    let mut prev: Option<&str> = None;
    let mut total_entries = 0;
    let mut first_invalid_index = None;
    for (index, entry) in entries.into_iter().enumerate() {
        total_entries += 1;
        if first_invalid_index.is_some() {
            continue;
        }
        match entry {
            Some(entry) => {
                let expected = compute_hash(prev, &entry.record)?;
                if entry.prev_hash.as_deref() != prev || entry.hash != expected {
                    first_invalid_index = Some(index);
                } else {
                    prev = Some(entry.hash.as_str());
                }
            }
            None => first_invalid_index = Some(index),
        }
    }
    Ok(ChainVerification {
        valid: first_invalid_index.is_none(),
        total_entries,
        first_invalid_index,
    })
}
