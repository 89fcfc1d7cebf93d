//! Collaborator interfaces.
//!
//! The reducer depends only on these traits. In-memory implementations live
//! next to each trait; test doubles live in [`crate::mocks`].

pub mod access;
pub mod directory;
pub mod oracle;
pub mod registry;

pub use access::{AccessGuard, Capability, RoleTable};
pub use directory::{ActorDirectory, IdentityRegistry};
pub use oracle::{ChannelOracle, OracleError, OracleRequest, ValidationOracle};
pub use registry::{OwnershipRegistry, RegistryError, TokenLedger};
