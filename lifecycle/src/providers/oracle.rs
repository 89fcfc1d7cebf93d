//! Outbound validation requests.
//!
//! The oracle only receives requests here. Its verdict comes back later
//! through [`crate::LifecycleOrchestrator::fulfill`], called by the trusted
//! integration identity with the correlation id carried in the request.

use crate::config::OracleConfig;
use crate::types::{CorrelationId, MetadataHash};
use futures::future::BoxFuture;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::sync::mpsc;

/// Dispatch failures. A failed dispatch never produces a verdict.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum OracleError {
    /// The oracle could not be reached
    #[error("Oracle unavailable: {0}")]
    Unavailable(String),

    /// The oracle refused to accept the request
    #[error("Oracle refused request: {0}")]
    Refused(String),
}

/// A request to check one metadata hash.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OracleRequest {
    /// Token to echo back on fulfillment
    pub correlation_id: CorrelationId,
    /// Hash under review
    pub metadata_hash: MetadataHash,
    /// Source the oracle runs
    pub source: String,
    /// Billing subscription
    pub subscription_id: u64,
    /// Callback gas budget
    pub gas_limit: u32,
    /// Oracle network
    pub don_id: String,
}

impl OracleRequest {
    /// Build a request from the static oracle parameters.
    #[must_use]
    pub fn new(
        correlation_id: CorrelationId,
        metadata_hash: MetadataHash,
        config: &OracleConfig,
    ) -> Self {
        Self {
            correlation_id,
            metadata_hash,
            source: config.source.clone(),
            subscription_id: config.subscription_id,
            gas_limit: config.gas_limit,
            don_id: config.don_id.clone(),
        }
    }
}

/// External validation oracle.
pub trait ValidationOracle: Send + Sync {
    /// Dispatch a request. Resolves once the oracle accepted it, not when it answers.
    ///
    /// # Errors
    ///
    /// Returns [`OracleError`] if the request could not be delivered.
    fn request(&self, request: OracleRequest) -> BoxFuture<'static, Result<(), OracleError>>;
}

/// Oracle adapter that hands requests to an integration task over a channel.
#[derive(Debug, Clone)]
pub struct ChannelOracle {
    sender: mpsc::Sender<OracleRequest>,
}

impl ChannelOracle {
    /// Create the adapter and the receiving end for the integration task.
    #[must_use]
    pub fn new(capacity: usize) -> (Self, mpsc::Receiver<OracleRequest>) {
        let (sender, receiver) = mpsc::channel(capacity.max(1));
        (Self { sender }, receiver)
    }
}

impl ValidationOracle for ChannelOracle {
    fn request(&self, request: OracleRequest) -> BoxFuture<'static, Result<(), OracleError>> {
        let sender = self.sender.clone();
        Box::pin(async move {
            sender
                .send(request)
                .await
                .map_err(|_| OracleError::Unavailable("integration channel closed".to_string()))
        })
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)] // Test code

    use super::*;

    #[tokio::test]
    async fn channel_oracle_delivers_requests() {
        let (oracle, mut receiver) = ChannelOracle::new(4);
        let request = OracleRequest::new(
            CorrelationId::new(1),
            MetadataHash::new("h1"),
            &OracleConfig::default(),
        );

        oracle.request(request.clone()).await.unwrap();
        assert_eq!(receiver.recv().await, Some(request));
    }

    #[tokio::test]
    async fn closed_channel_is_unavailable() {
        let (oracle, receiver) = ChannelOracle::new(1);
        drop(receiver);

        let request = OracleRequest::new(
            CorrelationId::new(2),
            MetadataHash::new("h2"),
            &OracleConfig::default(),
        );
        assert!(matches!(
            oracle.request(request).await,
            Err(OracleError::Unavailable(_))
        ));
    }
}
