//! Capability checks.

use crate::types::Identity;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt;
use std::sync::{PoisonError, RwLock};

/// A permission a caller may hold.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Capability {
    /// Submit lifecycle transitions
    CompanyOperator,
    /// Deliver oracle verdicts through `fulfill`
    OracleIntegration,
}

impl fmt::Display for Capability {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::CompanyOperator => write!(f, "company-operator"),
            Self::OracleIntegration => write!(f, "oracle-integration"),
        }
    }
}

/// Access guard.
///
/// Consulted before any lifecycle operation executes.
pub trait AccessGuard: Send + Sync {
    /// Returns `true` if `caller` holds `capability`.
    fn has_capability(&self, capability: Capability, caller: &Identity) -> bool;
}

/// In-memory capability table.
#[derive(Debug, Default)]
pub struct RoleTable {
    grants: RwLock<HashSet<(Capability, Identity)>>,
}

impl RoleTable {
    /// Create an empty table.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Grant a capability. Returns `false` if it was already held.
    pub fn grant(&self, capability: Capability, account: Identity) -> bool {
        self.grants
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert((capability, account))
    }

    /// Revoke a capability. Returns `false` if it was not held.
    pub fn revoke(&self, capability: Capability, account: &Identity) -> bool {
        self.grants
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(&(capability, account.clone()))
    }
}

impl AccessGuard for RoleTable {
    fn has_capability(&self, capability: Capability, caller: &Identity) -> bool {
        self.grants
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .contains(&(capability, caller.clone()))
    }
}
