//! Provenance configuration.
//!
//! Built once at startup and shared by `Arc` through the environment; nothing
//! in here changes while the system runs.
//!
//! # Example
//!
//! ```no_run
//! use batchtrace_lifecycle::config::{ConflictPolicy, ProvenanceConfig};
//! use std::time::Duration;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! // Read BATCHTRACE_* variables, falling back to defaults
//! let config = ProvenanceConfig::from_env()?;
//!
//! // Or build explicitly
//! let config = ProvenanceConfig::default()
//!     .with_conflict_policy(ConflictPolicy::LastWriteWins)
//!     .with_pending_ttl(Some(Duration::from_secs(300)));
//! # Ok(())
//! # }
//! ```

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::time::Duration;
use thiserror::Error;

/// Configuration error
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ConfigError {
    /// A variable could not be parsed
    #[error("Invalid value '{value}' for {key}")]
    Invalid {
        /// Variable name
        key: &'static str,
        /// Raw value
        value: String,
    },

    /// Configuration validation failed
    #[error("Configuration validation failed: {0}")]
    Validation(String),
}

/// What happens when two approved proposals target the same batch.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum ConflictPolicy {
    /// Commit only if the batch is still at the revision the proposal was built on
    #[default]
    CompareAndCommit,
    /// Whichever fulfillment lands last overwrites the batch
    LastWriteWins,
}

impl fmt::Display for ConflictPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::CompareAndCommit => write!(f, "compare-and-commit"),
            Self::LastWriteWins => write!(f, "last-write-wins"),
        }
    }
}

impl FromStr for ConflictPolicy {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "compare-and-commit" | "cas" => Ok(Self::CompareAndCommit),
            "last-write-wins" | "lww" => Ok(Self::LastWriteWins),
            _ => Err(ConfigError::Invalid {
                key: "BATCHTRACE_CONFLICT_POLICY",
                value: s.to_string(),
            }),
        }
    }
}

/// Parameters sent with every oracle request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OracleConfig {
    /// Response bytes that mean "approved".
    ///
    /// Default: `b"true"`
    pub approval_sentinel: Vec<u8>,

    /// Source the oracle network runs to check a hash.
    pub source: String,

    /// Billing subscription on the oracle network.
    pub subscription_id: u64,

    /// Gas budget for the callback.
    ///
    /// Default: 300 000
    pub gas_limit: u32,

    /// Oracle network identifier.
    pub don_id: String,
}

impl OracleConfig {
    /// Set the approval sentinel.
    #[must_use]
    pub fn with_approval_sentinel(mut self, sentinel: impl Into<Vec<u8>>) -> Self {
        self.approval_sentinel = sentinel.into();
        self
    }

    /// Set the oracle source.
    #[must_use]
    pub fn with_source(mut self, source: impl Into<String>) -> Self {
        self.source = source.into();
        self
    }

    /// Set the subscription id.
    #[must_use]
    pub const fn with_subscription_id(mut self, id: u64) -> Self {
        self.subscription_id = id;
        self
    }
}

impl Default for OracleConfig {
    fn default() -> Self {
        Self {
            approval_sentinel: b"true".to_vec(),
            source: "return Functions.encodeString(String(args[0].length > 0));".to_string(),
            subscription_id: 0,
            gas_limit: 300_000,
            don_id: "local-don".to_string(),
        }
    }
}

/// Lifecycle rules and read limits.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LifecycleConfig {
    /// Largest page accepted by URI listing.
    ///
    /// Default: 100
    pub max_page_size: usize,

    /// Prefix joined with the metadata hash to form a token URI.
    ///
    /// Default: `ipfs://`
    pub metadata_uri_prefix: String,

    /// Reject transitions the stage table forbids.
    ///
    /// Default: `true`. With `false` the check is still computed and logged.
    pub enforce_stage_order: bool,

    /// Guard against concurrent proposals on one batch.
    pub conflict_policy: ConflictPolicy,

    /// Discard pending requests older than this.
    ///
    /// Default: `None` (requests wait forever)
    pub pending_ttl: Option<Duration>,
}

impl LifecycleConfig {
    /// Token URI for a metadata hash.
    #[must_use]
    pub fn metadata_uri(&self, hash: &str) -> String {
        format!("{}{hash}", self.metadata_uri_prefix)
    }
}

impl Default for LifecycleConfig {
    fn default() -> Self {
        Self {
            max_page_size: 100,
            metadata_uri_prefix: "ipfs://".to_string(),
            enforce_stage_order: true,
            conflict_policy: ConflictPolicy::CompareAndCommit,
            pending_ttl: None,
        }
    }
}

/// Complete provenance configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProvenanceConfig {
    /// Oracle request parameters
    pub oracle: OracleConfig,
    /// Lifecycle rules
    pub lifecycle: LifecycleConfig,
    /// `tracing-subscriber` filter directive used by binaries.
    ///
    /// Default: `info`
    pub log_filter: String,
}

impl Default for ProvenanceConfig {
    fn default() -> Self {
        Self {
            oracle: OracleConfig::default(),
            lifecycle: LifecycleConfig::default(),
            log_filter: "info".to_string(),
        }
    }
}

impl ProvenanceConfig {
    /// Load configuration from `BATCHTRACE_*` environment variables.
    ///
    /// # Errors
    ///
    /// Returns error if a variable is set but cannot be parsed, or the result
    /// is invalid.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load configuration through an arbitrary variable lookup.
    ///
    /// Unset variables keep their defaults.
    ///
    /// # Errors
    ///
    /// Returns error if a variable is set but cannot be parsed, or the result
    /// is invalid.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();

        if let Some(sentinel) = lookup("BATCHTRACE_APPROVAL_SENTINEL") {
            config.oracle.approval_sentinel = sentinel.into_bytes();
        }
        if let Some(source) = lookup("BATCHTRACE_ORACLE_SOURCE") {
            config.oracle.source = source;
        }
        if let Some(id) = lookup("BATCHTRACE_SUBSCRIPTION_ID") {
            config.oracle.subscription_id = parse("BATCHTRACE_SUBSCRIPTION_ID", &id)?;
        }
        if let Some(gas) = lookup("BATCHTRACE_GAS_LIMIT") {
            config.oracle.gas_limit = parse("BATCHTRACE_GAS_LIMIT", &gas)?;
        }
        if let Some(don) = lookup("BATCHTRACE_DON_ID") {
            config.oracle.don_id = don;
        }
        if let Some(size) = lookup("BATCHTRACE_MAX_PAGE_SIZE") {
            config.lifecycle.max_page_size = parse("BATCHTRACE_MAX_PAGE_SIZE", &size)?;
        }
        if let Some(prefix) = lookup("BATCHTRACE_METADATA_URI_PREFIX") {
            config.lifecycle.metadata_uri_prefix = prefix;
        }
        if let Some(enforce) = lookup("BATCHTRACE_ENFORCE_STAGE_ORDER") {
            config.lifecycle.enforce_stage_order =
                parse("BATCHTRACE_ENFORCE_STAGE_ORDER", &enforce)?;
        }
        if let Some(policy) = lookup("BATCHTRACE_CONFLICT_POLICY") {
            config.lifecycle.conflict_policy = policy.parse()?;
        }
        if let Some(secs) = lookup("BATCHTRACE_PENDING_TTL_SECS") {
            let secs: u64 = parse("BATCHTRACE_PENDING_TTL_SECS", &secs)?;
            config.lifecycle.pending_ttl = (secs > 0).then(|| Duration::from_secs(secs));
        }
        if let Some(filter) = lookup("BATCHTRACE_LOG") {
            config.log_filter = filter;
        }

        config.validate()?;
        Ok(config)
    }

    /// Validate the configuration.
    ///
    /// # Errors
    ///
    /// Returns error if the sentinel is empty or the page size is zero.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.oracle.approval_sentinel.is_empty() {
            return Err(ConfigError::Validation(
                "approval sentinel must not be empty".to_string(),
            ));
        }
        if self.lifecycle.max_page_size == 0 {
            return Err(ConfigError::Validation(
                "max page size must be at least 1".to_string(),
            ));
        }
        Ok(())
    }

    /// Replace the oracle section.
    #[must_use]
    pub fn with_oracle(mut self, oracle: OracleConfig) -> Self {
        self.oracle = oracle;
        self
    }

    /// Toggle stage-order enforcement.
    #[must_use]
    pub const fn with_stage_order_enforced(mut self, enforce: bool) -> Self {
        self.lifecycle.enforce_stage_order = enforce;
        self
    }

    /// Set the conflict policy.
    #[must_use]
    pub const fn with_conflict_policy(mut self, policy: ConflictPolicy) -> Self {
        self.lifecycle.conflict_policy = policy;
        self
    }

    /// Set the pending request time-to-live.
    #[must_use]
    pub const fn with_pending_ttl(mut self, ttl: Option<Duration>) -> Self {
        self.lifecycle.pending_ttl = ttl;
        self
    }
}

fn parse<T: FromStr>(key: &'static str, value: &str) -> Result<T, ConfigError> {
    value.trim().parse().map_err(|_| ConfigError::Invalid {
        key,
        value: value.to_string(),
    })
}
