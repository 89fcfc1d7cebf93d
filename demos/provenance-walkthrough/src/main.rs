//! Walks one batch from harvest to retail against an in-process oracle integration.
//!
//! Configuration comes from `BATCHTRACE_*` variables, optionally loaded from a
//! `.env` file. `RUST_LOG` overrides the configured log filter.

use anyhow::{Context, bail, ensure};
use batchtrace_lifecycle::providers::{Capability, ChannelOracle, IdentityRegistry, RoleTable};
use batchtrace_lifecycle::{
    ActorType, BatchId, CorrelationId, FulfillOutcome, GeoPoint, Identity, LifecycleOrchestrator,
    MetadataHash, ProvenanceConfig, ProvenanceEnvironment, ProvenanceError, Quantity, Role,
};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tracing_subscriber::EnvFilter;

type Verdicts = mpsc::Receiver<(CorrelationId, Result<FulfillOutcome, ProvenanceError>)>;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let config = ProvenanceConfig::from_env().context("loading configuration")?;

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(&config.log_filter)),
        )
        .init();

    let operator = Identity::new("operator");
    let integration_identity = Identity::new("oracle-integration");

    let roles = Arc::new(RoleTable::new());
    roles.grant(Capability::CompanyOperator, operator.clone());
    roles.grant(Capability::OracleIntegration, integration_identity.clone());

    let identities = Arc::new(IdentityRegistry::new());
    let register = |account: &str, actor_type: ActorType| {
        identities.register(
            Identity::new(account),
            actor_type,
            MetadataHash::new(format!("{account}-doc")),
        )
    };
    let farmer = register("farm", ActorType::Farmer)?;
    let processor = register("mill", ActorType::Processor)?;
    let packager = register("packer", ActorType::Packager)?;
    let distributor = register("depot", ActorType::Distributor)?;
    let retailer = register("shop", ActorType::Retailer)?;

    let (oracle, mut requests) = ChannelOracle::new(64);
    let env = ProvenanceEnvironment::new(config, Arc::new(oracle))
        .with_access(roles)
        .with_directory(identities);
    let orchestrator = LifecycleOrchestrator::new(env);

    // Stand-in for the oracle network: approves every non-blank hash.
    let (verdict_tx, mut verdicts) = mpsc::channel(64);
    let integration = orchestrator.clone();
    tokio::spawn(async move {
        while let Some(request) = requests.recv().await {
            let response: &[u8] = if request.metadata_hash.is_blank() { b"false" } else { b"true" };
            let outcome = integration
                .fulfill(&integration_identity, request.correlation_id, response, b"")
                .await;
            if verdict_tx.send((request.correlation_id, outcome)).await.is_err() {
                break;
            }
        }
    });

    let site = GeoPoint::from_degrees(45, 9);
    let quantity = Quantity::from_units(1_000);

    let id = orchestrator
        .create_harvested_batch(
            &operator,
            farmer,
            site,
            "Hand Picking",
            MetadataHash::new("bafy-harvest"),
        )
        .await?;
    let batch_id = match settle(&mut verdicts, id).await? {
        FulfillOutcome::Committed { batch_id, .. } => batch_id,
        other => bail!("harvest not committed: {other:?}"),
    };

    let id = orchestrator
        .push_to_processed(
            &operator,
            batch_id,
            processor,
            site,
            quantity,
            MetadataHash::new("bafy-process"),
        )
        .await?;
    expect_committed(settle(&mut verdicts, id).await?, batch_id)?;

    let id = orchestrator
        .push_to_packaged(
            &operator,
            batch_id,
            packager,
            site,
            quantity,
            MetadataHash::new("bafy-package"),
        )
        .await?;
    expect_committed(settle(&mut verdicts, id).await?, batch_id)?;

    let id = orchestrator
        .assign_to_distributor(
            &operator,
            batch_id,
            distributor,
            site,
            "Refrigerated",
            "Keep Upright",
            MetadataHash::new("bafy-distribute"),
        )
        .await?;
    expect_committed(settle(&mut verdicts, id).await?, batch_id)?;

    let id = orchestrator
        .assign_to_retailer(
            &operator,
            batch_id,
            retailer,
            site,
            quantity,
            MetadataHash::new("bafy-retail"),
        )
        .await?;
    expect_committed(settle(&mut verdicts, id).await?, batch_id)?;

    let batch = orchestrator.get_batch(batch_id).await?;
    tracing::info!(
        %batch_id,
        stage = %batch.stage,
        uri = %orchestrator.get_batch_metadata_uri(batch_id)?,
        distributors = ?batch.distributor_ids,
        retailers = ?batch.retailer_ids,
        "Batch reached retail"
    );
    tracing::info!(
        farmer_batches = ?orchestrator.get_batches_by_role(Role::Farmer, farmer).await,
        distribution_records = ?orchestrator.get_distribution_event_ids(distributor).await,
        uris = ?orchestrator.list_batch_metadata_uris(0, 10)?,
        "Index snapshot"
    );

    orchestrator.shutdown(Duration::from_secs(5)).await?;
    Ok(())
}

async fn settle(
    verdicts: &mut Verdicts,
    expected: CorrelationId,
) -> anyhow::Result<FulfillOutcome> {
    let (id, outcome) = verdicts.recv().await.context("oracle integration stopped")?;
    ensure!(id == expected, "verdict for {id}, expected {expected}");
    Ok(outcome?)
}

fn expect_committed(outcome: FulfillOutcome, batch_id: BatchId) -> anyhow::Result<()> {
    match outcome {
        FulfillOutcome::Committed { batch_id: committed, stage, .. } if committed == batch_id => {
            tracing::info!(%batch_id, %stage, "Stage committed");
            Ok(())
        },
        other => bail!("{batch_id} not committed: {other:?}"),
    }
}
