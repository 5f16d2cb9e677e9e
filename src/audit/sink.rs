//! Audit sinks: delegated, append-only storage for audit records
//!
//! Sinks never rewrite or delete what they stored; rotation and pruning are
//! a storage-layer concern outside this crate. A sink returns only after the
//! record is stored, so callers can treat `Ok` as an acknowledgement.
//!
//! `FileAuditSink` treats an unterminated last line as an append that was
//! never acknowledged. It is moved to `<log>.torn` before the log is used
//! again, so later appends always start on a fresh line.

use super::integrity::{
    verify_chain, verify_entries, ChainVerification, IntegrityChain, SealedRecord,
};
use super::types::AuditRecord;
use crate::error::Result;
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use tokio::fs::OpenOptions;
use tokio::io::AsyncWriteExt;
use tokio::sync::Mutex;

/// Append-only audit storage
#[async_trait]
pub trait AuditSink: Send + Sync {
    /// Append one record; `Ok` means the record is stored
    async fn append(&self, record: &AuditRecord) -> Result<SealedRecord>;

    /// Read back every stored entry in append order
    async fn read_sealed(&self) -> Result<Vec<SealedRecord>>;

    /// Read back every stored record in append order
    async fn read_all(&self) -> Result<Vec<AuditRecord>> {
        Ok(self
            .read_sealed()
            .await?
            .into_iter()
            .map(|s| s.record)
            .collect())
    }

    /// Verify the hash chain over everything stored
    async fn verify(&self) -> Result<ChainVerification> {
        verify_chain(&self.read_sealed().await?)
    }
}

struct MemoryInner {
    entries: Vec<SealedRecord>,
    chain: IntegrityChain,
}

/// In-memory audit sink
pub struct MemoryAuditSink {
    inner: Mutex<MemoryInner>,
}

impl MemoryAuditSink {
    /// Create a new empty sink
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(MemoryInner {
                entries: Vec::new(),
                chain: IntegrityChain::new(),
            }),
        }
    }

    /// Number of stored records
    pub async fn len(&self) -> usize {
        self.inner.lock().await.entries.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.inner.lock().await.entries.is_empty()
    }
}

impl Default for MemoryAuditSink {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl AuditSink for MemoryAuditSink {
    async fn append(&self, record: &AuditRecord) -> Result<SealedRecord> {
        let mut inner = self.inner.lock().await;
        let sealed = inner.chain.seal(record.clone())?;
        inner.chain.advance(&sealed);
        inner.entries.push(sealed.clone());
        Ok(sealed)
    }

    async fn read_sealed(&self) -> Result<Vec<SealedRecord>> {
        Ok(self.inner.lock().await.entries.clone())
    }
}

struct FileState {
    chain: IntegrityChain,
    /// A failed append may have left a partial line behind
    torn: bool,
}

/// File-backed sink writing one JSON line per record
pub struct FileAuditSink {
    path: PathBuf,
    durable: bool,
    state: Mutex<FileState>,
}

impl FileAuditSink {
    /// Open (creating if needed) an audit log at `path`.
    ///
    /// With `durable = true` every append is synced to disk before it is
    /// acknowledged.
    pub async fn new(path: PathBuf, durable: bool) -> Result<Self> {
        let chain = if tokio::fs::try_exists(&path).await? {
            Self::repair_torn_tail(&path).await?;
            Self::load_chain_state(&path).await?
        } else {
            if let Some(parent) = path.parent() {
                tokio::fs::create_dir_all(parent).await?;
            }
            IntegrityChain::new()
        };

        Ok(Self {
            path,
            durable,
            state: Mutex::new(FileState { chain, torn: false }),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Where unacknowledged partial lines are moved
    pub fn torn_path(&self) -> PathBuf {
        Self::torn_path_for(&self.path)
    }

    fn torn_path_for(path: &Path) -> PathBuf {
        let mut name = path.as_os_str().to_owned();
        name.push(".torn");
        PathBuf::from(name)
    }

    /// Move an unterminated last line out of the log
    async fn repair_torn_tail(path: &Path) -> Result<()> {
        let data = match tokio::fs::read(path).await {
            Ok(data) => data,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(()),
            Err(e) => return Err(e.into()),
        };
        if data.is_empty() || data.ends_with(b"\n") {
            return Ok(());
        }
        let keep = data.iter().rposition(|b| *b == b'\n').map_or(0, |i| i + 1);
        let torn = &data[keep..];

        let mut quarantine = OpenOptions::new()
            .create(true)
            .append(true)
            .open(Self::torn_path_for(path))
            .await?;
        quarantine.write_all(torn).await?;
        quarantine.write_all(b"\n").await?;
        quarantine.sync_data().await?;

        let log = OpenOptions::new().write(true).open(path).await?;
        log.set_len(keep as u64).await?;
        log.sync_data().await?;

        tracing::warn!(
            path = %path.display(),
            bytes = torn.len(),
            "Moved torn audit line out of the log"
        );
        Ok(())
    }

    async fn load_chain_state(path: &Path) -> Result<IntegrityChain> {
        let lines = Self::read_lines(path).await?;
        let last = lines.iter().flatten().last().map(|e| e.hash.clone());
        Ok(IntegrityChain::from_state(last, lines.len() as u64))
    }

    /// Every non-empty line of the log; `None` where a line does not parse
    async fn read_lines(path: &Path) -> Result<Vec<Option<SealedRecord>>> {
        let data = match tokio::fs::read_to_string(path).await {
            Ok(data) => data,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };
        let mut lines = Vec::new();
        for (number, line) in data.lines().enumerate() {
            if line.trim().is_empty() {
                continue;
            }
            match serde_json::from_str::<SealedRecord>(line) {
                Ok(entry) => lines.push(Some(entry)),
                Err(e) => {
                    tracing::warn!(
                        path = %path.display(),
                        line = number + 1,
                        error = %e,
                        "Unreadable audit line"
                    );
                    lines.push(None);
                }
            }
        }
        Ok(lines)
    }
}

#[async_trait]
impl AuditSink for FileAuditSink {
    async fn append(&self, record: &AuditRecord) -> Result<SealedRecord> {
        // Hold the state lock for the whole write so file order matches chain order
        let mut state = self.state.lock().await;
        if state.torn {
            Self::repair_torn_tail(&self.path).await?;
            state.torn = false;
        }
        let sealed = state.chain.seal(record.clone())?;
        let mut line = serde_json::to_string(&sealed)?;
        line.push('\n');

        state.torn = true;
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .await?;
        file.write_all(line.as_bytes()).await?;
        file.flush().await?;
        if self.durable {
            file.sync_data().await?;
        }
        state.torn = false;

        state.chain.advance(&sealed);
        Ok(sealed)
    }

    async fn read_sealed(&self) -> Result<Vec<SealedRecord>> {
        let lines = Self::read_lines(&self.path).await?;
        Ok(lines.into_iter().flatten().collect())
    }

    async fn verify(&self) -> Result<ChainVerification> {
        let lines = Self::read_lines(&self.path).await?;
        verify_entries(lines.iter().map(Option::as_ref))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audit::integrity::verify_chain;
    use crate::governance::{AuthorityGate, AuthorityLevel, OperationType};
    use crate::memory::NodeId;
    use chrono::Utc;
    use tempfile::TempDir;

    fn record(op: OperationType, actor: u8, required: u8) -> AuditRecord {
        let gate = AuthorityGate::new().evaluate(
            op,
            AuthorityLevel(actor),
            AuthorityLevel(required),
            None,
            None,
        );
        AuditRecord::from_gate(Utc::now(), &gate, op, Some(&NodeId::new("n-1")), None)
    }

    #[tokio::test]
    async fn test_memory_sink_appends_in_order() {
        let sink = MemoryAuditSink::new();
        sink.append(&record(OperationType::Write, 1, 1)).await.unwrap();
        sink.append(&record(OperationType::Govern, 1, 3)).await.unwrap();

        let all = sink.read_all().await.unwrap();
        assert_eq!(all.len(), 2);
        assert_eq!(all[0].operation(), OperationType::Write);
        assert_eq!(all[1].operation(), OperationType::Govern);
        assert!(verify_chain(&sink.read_sealed().await.unwrap()).unwrap().valid);
    }

    #[tokio::test]
    async fn test_file_sink_roundtrip_and_chain() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("audit").join("log.jsonl");
        let sink = FileAuditSink::new(path.clone(), true).await.unwrap();

        let first = record(OperationType::Mark, 2, 2);
        sink.append(&first).await.unwrap();
        sink.append(&record(OperationType::Govern, 0, 3)).await.unwrap();

        let all = sink.read_all().await.unwrap();
        assert_eq!(all.len(), 2);
        assert_eq!(all[0], first);
        assert!(verify_chain(&sink.read_sealed().await.unwrap()).unwrap().valid);
    }

    #[tokio::test]
    async fn test_file_sink_resumes_chain_after_reopen() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("log.jsonl");

        {
            let sink = FileAuditSink::new(path.clone(), false).await.unwrap();
            sink.append(&record(OperationType::Write, 1, 1)).await.unwrap();
        }

        let reopened = FileAuditSink::new(path.clone(), false).await.unwrap();
        reopened
            .append(&record(OperationType::Write, 2, 1))
            .await
            .unwrap();

        let sealed = reopened.read_sealed().await.unwrap();
        assert_eq!(sealed.len(), 2);
        assert!(verify_chain(&sealed).unwrap().valid);
    }

    #[tokio::test]
    async fn test_file_sink_tamper_detected() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("log.jsonl");
        let sink = FileAuditSink::new(path.clone(), false).await.unwrap();
        sink.append(&record(OperationType::Govern, 2, 5)).await.unwrap();
        sink.append(&record(OperationType::Govern, 6, 5)).await.unwrap();

        let data = std::fs::read_to_string(&path).unwrap();
        let tampered = data.replacen("insufficient authority: 2<5", "authority exceeds requirement: 6>5", 1);
        std::fs::write(&path, tampered).unwrap();

        let result = verify_chain(&sink.read_sealed().await.unwrap()).unwrap();
        assert!(!result.valid);
        assert_eq!(result.first_invalid_index, Some(0));
    }

    #[tokio::test]
    async fn test_file_sink_quarantines_torn_tail() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("log.jsonl");
        {
            let sink = FileAuditSink::new(path.clone(), true).await.unwrap();
            sink.append(&record(OperationType::Mark, 2, 2)).await.unwrap();
        }
        let torn = r#"{"record":{"timestamp":"20"#;
        let mut file = std::fs::OpenOptions::new().append(true).open(&path).unwrap();
        std::io::Write::write_all(&mut file, torn.as_bytes()).unwrap();
        drop(file);

        let sink = FileAuditSink::new(path.clone(), true).await.unwrap();
        assert_eq!(sink.read_all().await.unwrap().len(), 1);
        let quarantined = std::fs::read_to_string(sink.torn_path()).unwrap();
        assert_eq!(quarantined.trim_end(), torn);

        sink.append(&record(OperationType::Govern, 0, 3)).await.unwrap();
        assert_eq!(sink.read_all().await.unwrap().len(), 2);
        let result = sink.verify().await.unwrap();
        assert!(result.valid);
        assert_eq!(result.total_entries, 2);
    }

    #[tokio::test]
    async fn test_file_sink_reports_unreadable_line() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("log.jsonl");
        let sink = FileAuditSink::new(path.clone(), false).await.unwrap();
        sink.append(&record(OperationType::Write, 1, 1)).await.unwrap();
        let mut file = std::fs::OpenOptions::new().append(true).open(&path).unwrap();
        std::io::Write::write_all(&mut file, b"{garbage}\n").unwrap();
        drop(file);
        sink.append(&record(OperationType::Write, 2, 1)).await.unwrap();

        let reopened = FileAuditSink::new(path.clone(), false).await.unwrap();
        assert_eq!(reopened.read_all().await.unwrap().len(), 2);
        let result = reopened.verify().await.unwrap();
        assert!(!result.valid);
        assert_eq!(result.total_entries, 3);
        assert_eq!(result.first_invalid_index, Some(1));
    }
}
