//! End-to-end lifecycle scenarios through the orchestrator.

#![allow(clippy::unwrap_used, clippy::panic)] // Test code

use batchtrace_lifecycle::batch::{HarvestEvent, PackagingEvent};
use batchtrace_lifecycle::mocks::{AllowAll, FailingOracle, InMemoryAuditLog, RecordingOracle};
use batchtrace_lifecycle::providers::{Capability, RoleTable, ValidationOracle};
use batchtrace_lifecycle::vocabulary::{Handling, HarvestMethod, StorageCondition};
use batchtrace_lifecycle::{
    ActorId, BatchId, ConflictPolicy, CorrelationId, FulfillOutcome, GeoPoint, Identity,
    LifecycleOrchestrator, MetadataHash, ProvenanceAction, ProvenanceConfig, ProvenanceEnvironment,
    ProvenanceError, ProvenanceEvent, Quantity, Role, Stage,
};
use batchtrace_core::environment::Clock;
use batchtrace_testing::mocks::{ManualClock, test_clock};
use std::collections::BTreeSet;
use std::sync::Arc;
use std::time::Duration;

const SETTLE: Duration = Duration::from_secs(2);

struct Harness {
    orchestrator: LifecycleOrchestrator,
    oracle: RecordingOracle,
    audit: InMemoryAuditLog,
}

fn environment(
    config: ProvenanceConfig,
    oracle: Arc<dyn ValidationOracle>,
    audit: &InMemoryAuditLog,
) -> ProvenanceEnvironment {
    ProvenanceEnvironment::new(config, oracle)
        .with_clock(Arc::new(test_clock()))
        .with_access(Arc::new(AllowAll))
        .with_directory(Arc::new(AllowAll))
        .with_audit(Arc::new(audit.clone()))
}

fn harness_with(config: ProvenanceConfig) -> Harness {
    let oracle = RecordingOracle::new();
    let audit = InMemoryAuditLog::new();
    let env = environment(config, Arc::new(oracle.clone()), &audit);
    Harness {
        orchestrator: LifecycleOrchestrator::new(env),
        oracle,
        audit,
    }
}

fn harness() -> Harness {
    harness_with(ProvenanceConfig::default())
}

fn operator() -> Identity {
    Identity::new("operator")
}

fn integration() -> Identity {
    Identity::new("oracle-integration")
}

fn site() -> GeoPoint {
    GeoPoint::from_degrees(45, 9)
}

fn hash(value: &str) -> MetadataHash {
    MetadataHash::new(value)
}

impl Harness {
    async fn approve(&self, id: CorrelationId) -> FulfillOutcome {
        self.orchestrator
            .fulfill(&integration(), id, b"true", b"")
            .await
            .unwrap()
    }

    async fn create(&self, farmer: u64, metadata: &str) -> BatchId {
        let id = self
            .orchestrator
            .create_harvested_batch(
                &operator(),
                ActorId::new(farmer),
                site(),
                "Hand Picking",
                hash(metadata),
            )
            .await
            .unwrap();
        match self.approve(id).await {
            FulfillOutcome::Committed { batch_id, created: true, .. } => batch_id,
            other => panic!("creation not committed: {other:?}"),
        }
    }

    async fn process(&self, batch_id: BatchId, metadata: &str) -> CorrelationId {
        self.orchestrator
            .push_to_processed(
                &operator(),
                batch_id,
                ActorId::new(3),
                site(),
                Quantity::from_units(500),
                hash(metadata),
            )
            .await
            .unwrap()
    }

    async fn distribute(
        &self,
        batch_id: BatchId,
        distributor: u64,
        metadata: &str,
    ) -> CorrelationId {
        self.orchestrator
            .assign_to_distributor(
                &operator(),
                batch_id,
                ActorId::new(distributor),
                site(),
                "Refrigerated",
                "Fragile",
                hash(metadata),
            )
            .await
            .unwrap()
    }

    async fn retail(&self, batch_id: BatchId, retailer: u64, metadata: &str) -> CorrelationId {
        self.orchestrator
            .assign_to_retailer(
                &operator(),
                batch_id,
                ActorId::new(retailer),
                site(),
                Quantity::from_units(250),
                hash(metadata),
            )
            .await
            .unwrap()
    }

    async fn committed_state(&self) -> Vec<u8> {
        self.orchestrator
            .read(|s| bincode::serialize(&(&s.batches, &s.events, &s.index)).unwrap())
            .await
    }
}

#[tokio::test]
async fn farmer_processor_distributor_scenario() {
    let h = harness();

    let batch = h.create(7, "h1").await;
    assert_eq!(batch, BatchId::new(0));
    assert_eq!(
        h.orchestrator.get_batches_by_role(Role::Farmer, ActorId::new(7)).await,
        BTreeSet::from([batch])
    );

    let id = h.process(batch, "h2").await;
    assert_eq!(
        h.approve(id).await,
        FulfillOutcome::Committed { batch_id: batch, stage: Stage::Processed, created: false }
    );
    assert_eq!(h.orchestrator.get_batch(batch).await.unwrap().stage, Stage::Processed);
    assert_eq!(
        h.orchestrator.get_batches_by_role(Role::Processor, ActorId::new(3)).await,
        BTreeSet::from([batch])
    );

    let first = h.distribute(batch, 9, "h3").await;
    assert!(h.approve(first).await.is_committed());
    let second = h.distribute(batch, 9, "h4").await;
    assert!(h.approve(second).await.is_committed());

    assert_eq!(
        h.orchestrator.get_all_distributors_for_batch(batch).await.unwrap(),
        BTreeSet::from([ActorId::new(9)])
    );
    assert_eq!(
        h.orchestrator.get_batches_by_role(Role::Distributor, ActorId::new(9)).await,
        BTreeSet::from([batch])
    );

    let event_ids = h.orchestrator.get_distribution_event_ids(ActorId::new(9)).await;
    assert_eq!(event_ids.len(), 2);
    for event_id in &event_ids {
        let event = h.orchestrator.get_distribution_event(*event_id).await.unwrap();
        assert_eq!(event.batch_id, batch);
        assert_eq!(event.storage_condition, StorageCondition::Refrigerated);
        assert_eq!(event.handling, Handling::Fragile);
    }
    let stored = h.orchestrator.get_batch(batch).await.unwrap();
    assert_eq!(stored.distribution_event_ids, event_ids);
    assert_eq!(stored.stage, Stage::AtDistributors);
    assert_eq!(h.orchestrator.get_batch_metadata_uri(batch).unwrap(), "ipfs://h4");
}

#[tokio::test]
async fn retail_appends_records_and_indexes_retailer() {
    let h = harness();
    let batch = h.create(7, "h1").await;
    let id = h.process(batch, "h2").await;
    h.approve(id).await;

    let id = h
        .orchestrator
        .assign_to_retailer(
            &operator(),
            batch,
            ActorId::new(4),
            site(),
            Quantity::from_units(250),
            hash("h3"),
        )
        .await
        .unwrap();
    assert!(h.approve(id).await.is_committed());

    assert_eq!(
        h.orchestrator.get_all_retailers_for_batch(batch).await.unwrap(),
        BTreeSet::from([ActorId::new(4)])
    );
    let ids = h.orchestrator.get_retail_event_ids(ActorId::new(4)).await;
    let event = h.orchestrator.get_retail_event(*ids.first().unwrap()).await.unwrap();
    assert_eq!(event.quantity, Quantity::from_units(250));
    assert!(h.orchestrator.get_distribution_event_ids(ActorId::new(4)).await.is_empty());
}

#[tokio::test]
async fn retailer_reassignment_keeps_single_member() {
    let h = harness();
    let batch = h.create(7, "h1").await;
    let id = h.process(batch, "h2").await;
    h.approve(id).await;

    let first = h.retail(batch, 4, "h3").await;
    assert!(h.approve(first).await.is_committed());
    let second = h.retail(batch, 4, "h4").await;
    assert_eq!(
        h.approve(second).await,
        FulfillOutcome::Committed { batch_id: batch, stage: Stage::AtRetailers, created: false }
    );

    assert_eq!(
        h.orchestrator.get_all_retailers_for_batch(batch).await.unwrap(),
        BTreeSet::from([ActorId::new(4)])
    );
    let event_ids = h.orchestrator.get_retail_event_ids(ActorId::new(4)).await;
    assert_eq!(event_ids.len(), 2);
    assert_eq!(h.orchestrator.get_batch(batch).await.unwrap().retail_event_ids, event_ids);
    assert_eq!(
        h.orchestrator.get_batches_by_role(Role::Retailer, ActorId::new(4)).await,
        BTreeSet::from([batch])
    );
}

#[tokio::test]
async fn packaged_batch_moves_to_distributors() {
    let h = harness();
    let batch = h.create(7, "h1").await;
    let id = h.process(batch, "h2").await;
    h.approve(id).await;

    let id = h
        .orchestrator
        .push_to_packaged(
            &operator(),
            batch,
            ActorId::new(2),
            site(),
            Quantity::from_units(400),
            hash("h3"),
        )
        .await
        .unwrap();
    assert_eq!(
        h.approve(id).await,
        FulfillOutcome::Committed { batch_id: batch, stage: Stage::Packaged, created: false }
    );

    let stored = h.orchestrator.get_batch(batch).await.unwrap();
    assert_eq!(stored.packager_id, Some(ActorId::new(2)));
    assert_eq!(
        stored.packaging,
        Some(PackagingEvent {
            date: test_clock().now(),
            location: site(),
            quantity: Quantity::from_units(400),
        })
    );
    assert_eq!(
        h.orchestrator.get_batches_by_role(Role::Packager, ActorId::new(2)).await,
        BTreeSet::from([batch])
    );

    let id = h.distribute(batch, 9, "h4").await;
    assert_eq!(
        h.approve(id).await,
        FulfillOutcome::Committed { batch_id: batch, stage: Stage::AtDistributors, created: false }
    );
    let stored = h.orchestrator.get_batch(batch).await.unwrap();
    assert_eq!(stored.distributor_ids, BTreeSet::from([ActorId::new(9)]));
    assert!(stored.packaging.is_some());
    assert_eq!(h.orchestrator.get_batch_metadata_uri(batch).unwrap(), "ipfs://h4");
}

#[tokio::test]
async fn creation_round_trip() {
    let h = harness();
    let batch = h.create(7, "h1").await;

    let stored = h.orchestrator.get_batch(batch).await.unwrap();
    assert_eq!(stored.stage, Stage::Harvested);
    assert!(stored.certified);
    assert_eq!(stored.farmer_id, Some(ActorId::new(7)));
    assert_eq!(
        stored.harvest,
        Some(HarvestEvent {
            date: test_clock().now(),
            location: site(),
            method: HarvestMethod::HandPicking,
        })
    );

    h.orchestrator.wait_for_effects(SETTLE).await.unwrap();
    let request = h.oracle.last().unwrap();
    assert_eq!(request.correlation_id, CorrelationId::new(0));
    assert_eq!(request.metadata_hash, hash("h1"));
}

#[tokio::test]
async fn negative_verdict_leaves_no_trace() {
    let h = harness();
    let batch = h.create(7, "h1").await;
    let before = h.committed_state().await;

    let id = h.process(batch, "h2").await;
    assert!(h.orchestrator.pending_request(id).await.is_some());

    let outcome = h
        .orchestrator
        .fulfill(&integration(), id, b"", b"hash not found")
        .await
        .unwrap();
    assert_eq!(
        outcome,
        FulfillOutcome::Rejected { batch_id: Some(batch), detail: "hash not found".to_string() }
    );
    assert_eq!(h.committed_state().await, before);
    assert!(h.orchestrator.pending_request(id).await.is_none());

    let id = h.process(batch, "h3").await;
    let outcome = h.orchestrator.fulfill(&integration(), id, b"false", b"").await.unwrap();
    assert!(matches!(outcome, FulfillOutcome::Rejected { .. }));
    assert_eq!(h.committed_state().await, before);

    h.orchestrator.wait_for_effects(SETTLE).await.unwrap();
    assert_eq!(h.audit.of_type("DataCertificationFailed").len(), 2);
}

#[tokio::test]
async fn pagination_bounds() {
    let h = harness();
    assert_eq!(
        h.orchestrator.list_batch_metadata_uris(0, 100),
        Err(ProvenanceError::OutOfBounds { value: 0, limit: 0 })
    );
    assert_eq!(
        h.orchestrator.list_batch_metadata_uris(0, 101),
        Err(ProvenanceError::OutOfBounds { value: 101, limit: 100 })
    );

    for (farmer, metadata) in [(1, "h1"), (2, "h2"), (3, "h3")] {
        h.create(farmer, metadata).await;
    }
    assert_eq!(
        h.orchestrator.list_batch_metadata_uris(1, 100).unwrap(),
        vec!["ipfs://h2".to_string(), "ipfs://h3".to_string()]
    );
    assert_eq!(
        h.orchestrator.list_batch_metadata_uris(0, 1).unwrap(),
        vec!["ipfs://h1".to_string()]
    );
    assert!(h.orchestrator.list_batch_metadata_uris(3, 1).is_err());
}

#[tokio::test]
async fn unknown_request_mutates_nothing() {
    let h = harness();
    let batch = h.create(7, "h1").await;
    let before = h.committed_state().await;

    let never_issued = CorrelationId::new(42);
    assert_eq!(
        h.orchestrator.fulfill(&integration(), never_issued, b"true", b"").await,
        Err(ProvenanceError::UnknownRequest(never_issued))
    );

    let id = h.process(batch, "h2").await;
    h.approve(id).await;
    let after_commit = h.committed_state().await;
    assert_ne!(after_commit, before);
    assert_eq!(
        h.orchestrator.fulfill(&integration(), id, b"true", b"").await,
        Err(ProvenanceError::UnknownRequest(id))
    );
    assert_eq!(h.committed_state().await, after_commit);
}

#[tokio::test]
async fn capabilities_are_enforced() {
    let roles = Arc::new(RoleTable::new());
    roles.grant(Capability::CompanyOperator, operator());
    let audit = InMemoryAuditLog::new();
    let env = environment(ProvenanceConfig::default(), Arc::new(RecordingOracle::new()), &audit)
        .with_access(roles);
    let orchestrator = LifecycleOrchestrator::new(env);

    let stranger = Identity::new("stranger");
    assert_eq!(
        orchestrator
            .create_harvested_batch(&stranger, ActorId::new(7), site(), "Cutting", hash("h1"))
            .await,
        Err(ProvenanceError::Unauthorized(Capability::CompanyOperator))
    );

    let id = orchestrator
        .create_harvested_batch(&operator(), ActorId::new(7), site(), "Cutting", hash("h1"))
        .await
        .unwrap();
    assert_eq!(
        orchestrator.fulfill(&operator(), id, b"true", b"").await,
        Err(ProvenanceError::Unauthorized(Capability::OracleIntegration))
    );
    assert_eq!(orchestrator.pending_count().await, 1);
}

#[tokio::test]
async fn local_validation_rejects_before_submission() {
    let h = harness();
    let batch = h.create(7, "h1").await;

    let result = h
        .orchestrator
        .push_to_processed(
            &operator(),
            batch,
            ActorId::new(3),
            site(),
            Quantity::from_units(100),
            hash("h2"),
        )
        .await;
    assert!(matches!(result, Err(ProvenanceError::Validation(_))));

    let result = h
        .orchestrator
        .push_to_processed(
            &operator(),
            BatchId::new(5),
            ActorId::new(3),
            site(),
            Quantity::from_units(500),
            hash("h2"),
        )
        .await;
    assert_eq!(result, Err(ProvenanceError::InvalidBatchId(BatchId::new(5))));

    let result = h
        .orchestrator
        .create_harvested_batch(
            &operator(),
            ActorId::new(7),
            GeoPoint::from_degrees(91, 0),
            "Cutting",
            hash("h3"),
        )
        .await;
    assert!(matches!(result, Err(ProvenanceError::Validation(_))));

    let result = h
        .orchestrator
        .create_harvested_batch(&operator(), ActorId::new(7), site(), "Cutting", hash(""))
        .await;
    assert!(matches!(result, Err(ProvenanceError::Validation(_))));

    assert_eq!(h.orchestrator.pending_count().await, 0);
    h.orchestrator.wait_for_effects(SETTLE).await.unwrap();
    assert_eq!(h.oracle.requests().len(), 1);
}

#[tokio::test]
async fn illegal_transition_is_rejected() {
    let h = harness();
    let batch = h.create(7, "h1").await;
    let id = h.process(batch, "h2").await;
    h.approve(id).await;

    let result = h
        .orchestrator
        .push_to_processed(
            &operator(),
            batch,
            ActorId::new(3),
            site(),
            Quantity::from_units(500),
            hash("h3"),
        )
        .await;
    assert_eq!(
        result,
        Err(ProvenanceError::IllegalTransition { from: Stage::Processed, to: Stage::Processed })
    );
}

#[tokio::test]
async fn concurrent_proposals_conflict_by_default() {
    let h = harness();
    let batch = h.create(7, "h1").await;

    let first = h.process(batch, "h2").await;
    let second = h.process(batch, "h3").await;
    assert!(h.approve(first).await.is_committed());
    assert!(matches!(h.approve(second).await, FulfillOutcome::Conflicted { .. }));
    assert_eq!(h.orchestrator.get_batch_metadata_uri(batch).unwrap(), "ipfs://h2");
}

#[tokio::test]
async fn last_write_wins_when_configured() {
    let h = harness_with(
        ProvenanceConfig::default().with_conflict_policy(ConflictPolicy::LastWriteWins),
    );
    let batch = h.create(7, "h1").await;

    let first = h.process(batch, "h2").await;
    let second = h.process(batch, "h3").await;
    assert!(h.approve(first).await.is_committed());
    assert!(h.approve(second).await.is_committed());
    assert_eq!(h.orchestrator.get_batch_metadata_uri(batch).unwrap(), "ipfs://h3");
    assert_eq!(h.orchestrator.read(|s| s.batches.revision(batch)).await, Some(2));
}

#[tokio::test]
async fn last_write_wins_keeps_every_distributor() {
    let h = harness_with(
        ProvenanceConfig::default().with_conflict_policy(ConflictPolicy::LastWriteWins),
    );
    let batch = h.create(7, "h1").await;
    let id = h.process(batch, "h2").await;
    h.approve(id).await;

    let first = h.distribute(batch, 9, "h3").await;
    let second = h.distribute(batch, 10, "h4").await;
    assert!(h.approve(first).await.is_committed());
    assert!(h.approve(second).await.is_committed());

    let stored = h.orchestrator.get_batch(batch).await.unwrap();
    assert_eq!(stored.distributor_ids, BTreeSet::from([ActorId::new(9), ActorId::new(10)]));
    let mut logged = h.orchestrator.get_distribution_event_ids(ActorId::new(9)).await;
    logged.extend(h.orchestrator.get_distribution_event_ids(ActorId::new(10)).await);
    assert_eq!(stored.distribution_event_ids, logged);
    assert_eq!(logged.len(), 2);

    for distributor in [9, 10] {
        assert_eq!(
            h.orchestrator
                .get_batches_by_role(Role::Distributor, ActorId::new(distributor))
                .await,
            BTreeSet::from([batch])
        );
    }
    assert_eq!(h.orchestrator.get_batch_metadata_uri(batch).unwrap(), "ipfs://h4");
}

#[tokio::test]
async fn unreachable_oracle_discards_proposal() {
    let audit = InMemoryAuditLog::new();
    let env = environment(ProvenanceConfig::default(), Arc::new(FailingOracle), &audit);
    let orchestrator = LifecycleOrchestrator::new(env);
    let mut feedback = orchestrator.subscribe();

    let id = orchestrator
        .create_harvested_batch(&operator(), ActorId::new(7), site(), "Shaking", hash("h1"))
        .await
        .unwrap();
    orchestrator.wait_for_effects(SETTLE).await.unwrap();

    assert!(matches!(
        feedback.recv().await.unwrap(),
        ProvenanceAction::OracleUnreachable { correlation_id, .. } if correlation_id == id
    ));
    assert_eq!(orchestrator.pending_count().await, 0);
    assert!(orchestrator.read(|s| s.batches.is_empty()).await);

    let failures = audit.of_type("DataCertificationFailed");
    assert!(matches!(
        failures.as_slice(),
        [ProvenanceEvent::DataCertificationFailed { batch_id: None, error_detail, .. }]
            if error_detail.starts_with("oracle unreachable")
    ));
}

#[tokio::test]
async fn pending_requests_expire_after_ttl() {
    let h = harness_with(
        ProvenanceConfig::default().with_pending_ttl(Some(Duration::from_millis(20))),
    );

    let id = h
        .orchestrator
        .create_harvested_batch(&operator(), ActorId::new(7), site(), "Cutting", hash("h1"))
        .await
        .unwrap();
    h.orchestrator.wait_for_effects(SETTLE).await.unwrap();

    assert_eq!(h.orchestrator.pending_count().await, 0);
    assert_eq!(h.audit.of_type("RequestExpired").len(), 1);
    assert_eq!(
        h.orchestrator.fulfill(&integration(), id, b"true", b"").await,
        Err(ProvenanceError::UnknownRequest(id))
    );
}

#[tokio::test]
async fn expire_stale_uses_submission_time() {
    let clock = Arc::new(ManualClock::new(test_clock().now()));
    let audit = InMemoryAuditLog::new();
    let config = ProvenanceConfig::default().with_pending_ttl(Some(Duration::from_secs(600)));
    let env =
        environment(config, Arc::new(RecordingOracle::new()), &audit).with_clock(clock.clone());
    let orchestrator = LifecycleOrchestrator::new(env);

    let old = orchestrator
        .create_harvested_batch(&operator(), ActorId::new(7), site(), "Cutting", hash("h1"))
        .await
        .unwrap();
    clock.advance(chrono::Duration::minutes(11));
    let fresh = orchestrator
        .create_harvested_batch(&operator(), ActorId::new(8), site(), "Cutting", hash("h2"))
        .await
        .unwrap();

    assert_eq!(orchestrator.expire_stale().await.unwrap(), vec![old]);
    assert!(orchestrator.pending_request(old).await.is_none());
    assert!(orchestrator.pending_request(fresh).await.is_some());
}
