//! memgov configuration management

use crate::audit::AuditLevel;
use crate::error::{Error, Result};
use crate::governance::{AuthorityLevel, AuthorityPolicy};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Longest span any window, extension or radius may be configured to (100 years)
pub const MAX_SPAN_SECS: u64 = 100 * 365 * 24 * 60 * 60;

/// Seconds as a chrono span, saturating instead of wrapping
fn span(secs: u64) -> chrono::Duration {
    i64::try_from(secs)
        .ok()
        .and_then(chrono::Duration::try_seconds)
        .unwrap_or(chrono::Duration::MAX)
}

/// Main memgov configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GovernanceConfig {
    /// Audit trail configuration
    #[serde(default)]
    pub audit: AuditConfig,

    /// Compression engine configuration
    #[serde(default)]
    pub compression: CompressionConfig,

    /// Reconstruction engine configuration
    #[serde(default)]
    pub reconstruction: ReconstructionConfig,

    /// Required authority per operation
    #[serde(default)]
    pub authority: AuthorityPolicy,

    /// Storage configuration
    #[serde(default)]
    pub storage: StorageConfig,
}

impl GovernanceConfig {
    /// Load and validate a TOML configuration file
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Self = toml::from_str(&content)?;
        config.validate()?;
        Ok(config)
    }

    /// Reject settings the engines cannot run with
    pub fn validate(&self) -> Result<()> {
        if self.compression.density_window_secs == 0 {
            return Err(Error::Config(
                "compression.density_window_secs must be greater than zero".to_string(),
            ));
        }
        for (name, secs) in [
            ("compression.density_window_secs", self.compression.density_window_secs),
            ("compression.sigil_extension_secs", self.compression.sigil_extension_secs),
            ("reconstruction.traversal_radius_secs", self.reconstruction.traversal_radius_secs),
        ] {
            if secs > MAX_SPAN_SECS {
                return Err(Error::Config(format!(
                    "{name} must be at most {MAX_SPAN_SECS} seconds, got {secs}"
                )));
            }
        }
        if self.compression.summarizer_timeout_ms == 0 {
            return Err(Error::Config(
                "compression.summarizer_timeout_ms must be greater than zero".to_string(),
            ));
        }
        if self.reconstruction.traversal_timeout_ms == 0 {
            return Err(Error::Config(
                "reconstruction.traversal_timeout_ms must be greater than zero".to_string(),
            ));
        }
        Ok(())
    }
}

/// Audit trail configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AuditConfig {
    /// Which judgments are recorded
    pub level: AuditLevel,

    /// Record READ operations too (excluded by default)
    pub include_reads: bool,

    /// Sync the audit log to disk before acknowledging each record
    pub durable: bool,

    /// JSONL audit log; records stay in memory when unset
    pub log_path: Option<PathBuf>,
}

impl Default for AuditConfig {
    fn default() -> Self {
        Self {
            level: AuditLevel::Full,
            include_reads: false,
            durable: true,
            log_path: None,
        }
    }
}

/// Compression engine configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CompressionConfig {
    /// Inactivity span after which a node drops one level (default 6 days)
    pub density_window_secs: u64,

    /// Extra span granted past the window by the latest sigil (default 3 days)
    pub sigil_extension_secs: u64,

    /// Judge explicit downgrades against the GOVERN requirement
    pub gate_transitions: bool,

    /// Authority under which scheduled ticks are judged
    pub system_authority: AuthorityLevel,

    /// Upper bound on a single summarizer call
    pub summarizer_timeout_ms: u64,
}

impl Default for CompressionConfig {
    fn default() -> Self {
        Self {
            density_window_secs: 6 * 24 * 60 * 60,
            sigil_extension_secs: 3 * 24 * 60 * 60,
            gate_transitions: false,
            system_authority: AuthorityLevel::MAX,
            summarizer_timeout_ms: 5000,
        }
    }
}

impl CompressionConfig {
    pub fn density_window(&self) -> chrono::Duration {
        span(self.density_window_secs)
    }

    pub fn sigil_extension(&self) -> chrono::Duration {
        span(self.sigil_extension_secs)
    }

    pub fn summarizer_timeout(&self) -> Duration {
        Duration::from_millis(self.summarizer_timeout_ms)
    }
}

/// Reconstruction engine configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReconstructionConfig {
    /// Upper bound on context traversal and seed enrichment calls
    pub traversal_timeout_ms: u64,

    /// Nodes created within this span of an anchor count as its context
    pub traversal_radius_secs: u64,
}

impl Default for ReconstructionConfig {
    fn default() -> Self {
        Self {
            traversal_timeout_ms: 3000,
            traversal_radius_secs: 24 * 60 * 60,
        }
    }
}

impl ReconstructionConfig {
    pub fn traversal_timeout(&self) -> Duration {
        Duration::from_millis(self.traversal_timeout_ms)
    }

    pub fn traversal_radius(&self) -> chrono::Duration {
        span(self.traversal_radius_secs)
    }
}

/// Storage configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    /// One JSON file per node; nodes stay in memory when unset
    pub nodes_dir: Option<PathBuf>,
}

impl StorageConfig {
    /// Default base directory (~/.memgov/)
    pub fn default_dir() -> PathBuf {
        dirs_next::home_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(".memgov")
    }
}
