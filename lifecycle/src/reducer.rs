//! Lifecycle reducer.
//!
//! Implements the validate-then-commit protocol as a pure state machine.
//!
//! # Flow
//!
//! 1. `Submit`: capability check, local validation, speculative snapshot,
//!    pending record, then an oracle request effect
//! 2. The oracle answers out of band; the integration calls `Fulfill`
//! 3. `Fulfill`: the pending record is consumed; an approval commits the
//!    snapshot to the batch store, the event log and the participation index
//! 4. A negative verdict, a conflict or a dispatch failure discards the
//!    proposal and leaves committed state untouched
//!
//! Every command leaves its synchronous result in [`ProvenanceState::receipt`].
//! Nothing talks to the outside world from here: oracle requests, audit
//! events and expiry timers are returned as effects.

use crate::actions::{FulfillOutcome, ProvenanceAction, Receipt, Transition};
use crate::audit::ProvenanceEvent;
use crate::batch::{Batch, HarvestEvent, PackagingEvent, ProcessingEvent};
use crate::config::ConflictPolicy;
use crate::environment::ProvenanceEnvironment;
use crate::error::ProvenanceError;
use crate::event_log::{DistributionEvent, LogAppend, RetailEvent};
use crate::index::EventKind;
use crate::pending::{Proposal, ValidationRequest, Verdict};
use crate::providers::{Capability, OracleRequest};
use crate::state::ProvenanceState;
use crate::types::{BatchId, CorrelationId, Identity, MetadataHash, Stage};
use crate::validation::{
    validate_batch_events, validate_chronological_order, validate_distribution_event,
    validate_handling, validate_metadata_hash, validate_method, validate_retail_event,
    validate_storage_condition,
};
use batchtrace_core::effect::Effect;
use batchtrace_core::reducer::Reducer;
use batchtrace_core::{SmallVec, smallvec};
use std::sync::Arc;

type Effects = SmallVec<[Effect<ProvenanceAction>; 4]>;

/// Lifecycle reducer.
#[derive(Debug, Clone, Copy, Default)]
pub struct LifecycleReducer;

impl LifecycleReducer {
    /// Create a new lifecycle reducer.
    #[must_use]
    pub const fn new() -> Self {
        Self
    }

    fn submit(
        state: &mut ProvenanceState,
        caller: &Identity,
        metadata_hash: MetadataHash,
        transition: Transition,
        env: &ProvenanceEnvironment,
    ) -> Result<(CorrelationId, Effects), ProvenanceError> {
        let request = Self::prepare(state, caller, metadata_hash, transition, env)?;
        let batch_id = request.target_batch_id();
        let metadata_hash = request.metadata_hash.clone();
        let timestamp = request.submitted_at;

        let correlation_id = state.pending.submit(request);
        metrics::counter!("batchtrace.submissions").increment(1);
        record_pending(state);
        tracing::debug!(%correlation_id, ?batch_id, %metadata_hash, "Submitted for validation");

        let oracle = Arc::clone(&env.oracle);
        let oracle_request =
            OracleRequest::new(correlation_id, metadata_hash.clone(), &env.config.oracle);

        let mut effects: Effects = smallvec![
            Effect::Future(Box::pin(async move {
                match oracle.request(oracle_request).await {
                    Ok(()) => None,
                    Err(error) => Some(ProvenanceAction::OracleUnreachable {
                        correlation_id,
                        detail: error.to_string(),
                    }),
                }
            })),
            publish(
                env,
                vec![ProvenanceEvent::ValidationRequested {
                    correlation_id,
                    batch_id,
                    metadata_hash,
                    timestamp,
                }],
            ),
        ];

        if let Some(ttl) = env.config.lifecycle.pending_ttl {
            effects.push(Effect::Delay {
                duration: ttl,
                action: Box::new(ProvenanceAction::ExpireRequest { correlation_id }),
            });
        }

        Ok((correlation_id, effects))
    }

    /// Run every local check and build the speculative request.
    ///
    /// Reads state only; a failure leaves nothing behind.
    fn prepare(
        state: &ProvenanceState,
        caller: &Identity,
        metadata_hash: MetadataHash,
        transition: Transition,
        env: &ProvenanceEnvironment,
    ) -> Result<ValidationRequest, ProvenanceError> {
        if !env.access.has_capability(Capability::CompanyOperator, caller) {
            return Err(ProvenanceError::Unauthorized(Capability::CompanyOperator));
        }
        validate_metadata_hash(&metadata_hash)?;

        let assignee = transition.assignee();
        let actor_type = transition.actor_type();
        let actor_id = assignee.1;
        if !env.directory.exists(actor_type, actor_id) {
            return Err(ProvenanceError::UnknownActor {
                actor_type,
                actor_id: actor_id.get(),
            });
        }

        let now = env.clock.now();
        let target = transition.target_stage();

        let (proposal, mut snapshot) = match transition.batch_id() {
            None => (Proposal::Create, Batch::unharvested()),
            Some(batch_id) => {
                let stored = state
                    .batches
                    .get(batch_id)
                    .ok_or(ProvenanceError::InvalidBatchId(batch_id))?;
                check_stage_order(stored.batch.stage, target, env)?;
                (
                    Proposal::Update {
                        batch_id,
                        base_revision: stored.revision,
                    },
                    stored.batch.clone(),
                )
            },
        };

        let append = match transition {
            Transition::Harvest {
                farmer_id,
                location,
                method,
            } => {
                snapshot.farmer_id = Some(farmer_id);
                snapshot.harvest = Some(HarvestEvent {
                    date: now,
                    location,
                    method: validate_method(&method)?,
                });
                None
            },
            Transition::Process {
                processor_id,
                location,
                quantity,
                ..
            } => {
                snapshot.processor_id = Some(processor_id);
                snapshot.processing = Some(ProcessingEvent {
                    date: now,
                    location,
                    quantity,
                });
                None
            },
            Transition::Package {
                packager_id,
                location,
                quantity,
                ..
            } => {
                snapshot.packager_id = Some(packager_id);
                snapshot.packaging = Some(PackagingEvent {
                    date: now,
                    location,
                    quantity,
                });
                None
            },
            Transition::Distribute {
                batch_id,
                distributor_id,
                location,
                storage_condition,
                handling,
            } => {
                let event = DistributionEvent {
                    batch_id,
                    distributor_id,
                    date: now,
                    location,
                    storage_condition: validate_storage_condition(&storage_condition)?,
                    handling: validate_handling(&handling)?,
                };
                validate_distribution_event(&event, now)?;
                snapshot.distributor_ids.insert(distributor_id);
                Some(LogAppend::Distribution(event))
            },
            Transition::Retail {
                batch_id,
                retailer_id,
                location,
                quantity,
            } => {
                let event = RetailEvent {
                    batch_id,
                    retailer_id,
                    date: now,
                    location,
                    quantity,
                };
                validate_retail_event(&event, now)?;
                snapshot.retailer_ids.insert(retailer_id);
                Some(LogAppend::Retail(event))
            },
        };

        snapshot.stage = target;
        snapshot.certified = false;
        validate_batch_events(&snapshot, now)?;

        Ok(ValidationRequest {
            proposal,
            requester: caller.clone(),
            snapshot,
            metadata_hash,
            append,
            assignee,
            submitted_at: now,
        })
    }

    fn fulfill(
        state: &mut ProvenanceState,
        caller: &Identity,
        correlation_id: CorrelationId,
        response: &[u8],
        error: &[u8],
        env: &ProvenanceEnvironment,
    ) -> Result<(FulfillOutcome, Effects), ProvenanceError> {
        if !env.access.has_capability(Capability::OracleIntegration, caller) {
            tracing::warn!(
                target: "batchtrace::security",
                %caller,
                %correlation_id,
                "Fulfillment from caller without oracle integration capability"
            );
            return Err(ProvenanceError::Unauthorized(Capability::OracleIntegration));
        }

        let verdict = state
            .pending
            .fulfill(
                correlation_id,
                response,
                error,
                &env.config.oracle.approval_sentinel,
            )
            .inspect_err(|_| {
                metrics::counter!("batchtrace.unknown_requests").increment(1);
                tracing::warn!(
                    target: "batchtrace::security",
                    %correlation_id,
                    "Fulfillment for unknown request: duplicate callback or oracle desync"
                );
            })?;
        record_pending(state);

        match verdict {
            Verdict::Approved(request) => Ok(Self::commit(state, request, env)),
            Verdict::Rejected { request, detail } => {
                let batch_id = request.target_batch_id();
                Ok((
                    FulfillOutcome::Rejected {
                        batch_id,
                        detail: detail.clone(),
                    },
                    discard_effects(env, batch_id, request.metadata_hash, detail),
                ))
            },
        }
    }

    /// Apply an approved snapshot.
    ///
    /// Guards run before any write, so a conflict or a registry refusal
    /// leaves the stores exactly as they were.
    fn commit(
        state: &mut ProvenanceState,
        request: ValidationRequest,
        env: &ProvenanceEnvironment,
    ) -> (FulfillOutcome, Effects) {
        let ValidationRequest {
            proposal,
            requester,
            mut snapshot,
            metadata_hash,
            append,
            assignee: (role, actor_id),
            ..
        } = request;
        let uri = env.config.lifecycle.metadata_uri(metadata_hash.as_str());
        let timestamp = env.clock.now();
        snapshot.certified = true;
        let stage = snapshot.stage;

        match proposal {
            Proposal::Create => {
                let batch_id = state.batches.peek_next_id();
                if let Err(error) = env.registry.mint(batch_id, requester, uri) {
                    tracing::error!(%batch_id, %error, "Registry refused mint");
                    return (
                        FulfillOutcome::Rejected {
                            batch_id: None,
                            detail: error.to_string(),
                        },
                        discard_effects(env, None, metadata_hash, error.to_string()),
                    );
                }

                let batch_id = state.batches.create(snapshot, metadata_hash.clone());
                state.index.record_batch(role, actor_id, batch_id);

                metrics::counter!("batchtrace.commits", "kind" => "create").increment(1);
                tracing::info!(%batch_id, %metadata_hash, "Batch created");

                (
                    FulfillOutcome::Committed {
                        batch_id,
                        stage,
                        created: true,
                    },
                    smallvec![publish(
                        env,
                        vec![
                            ProvenanceEvent::DataCertified {
                                batch_id,
                                metadata_hash: metadata_hash.clone(),
                                timestamp,
                            },
                            ProvenanceEvent::BatchCreated {
                                batch_id,
                                metadata_hash,
                                timestamp,
                            },
                        ],
                    )],
                )
            },
            Proposal::Update {
                batch_id,
                base_revision,
            } => {
                let current = state.batches.revision(batch_id);
                if env.config.lifecycle.conflict_policy == ConflictPolicy::CompareAndCommit
                    && current != Some(base_revision)
                {
                    let detail = format!(
                        "{batch_id} changed since proposal (revision {base_revision} -> {})",
                        current.map_or_else(|| "missing".to_string(), |r| r.to_string())
                    );
                    tracing::warn!(%batch_id, %detail, "Discarding conflicting proposal");
                    metrics::counter!("batchtrace.rejections", "reason" => "conflict")
                        .increment(1);
                    return (
                        FulfillOutcome::Conflicted {
                            batch_id,
                            detail: detail.clone(),
                        },
                        discard_effects(env, Some(batch_id), metadata_hash, detail),
                    );
                }

                if let Err(error) = env.registry.set_metadata(batch_id, uri) {
                    tracing::error!(%batch_id, %error, "Registry refused metadata update");
                    return (
                        FulfillOutcome::Rejected {
                            batch_id: Some(batch_id),
                            detail: error.to_string(),
                        },
                        discard_effects(env, Some(batch_id), metadata_hash, error.to_string()),
                    );
                }

                if let Some(stored) = state.batches.get(batch_id) {
                    snapshot.absorb_membership(&stored.batch);
                }

                match append {
                    Some(LogAppend::Distribution(event)) => {
                        let author = event.distributor_id;
                        let event_id = state.events.append_distribution(event);
                        snapshot.distribution_event_ids.insert(event_id);
                        state
                            .index
                            .record_event(EventKind::Distribution, author, event_id);
                    },
                    Some(LogAppend::Retail(event)) => {
                        let author = event.retailer_id;
                        let event_id = state.events.append_retail(event);
                        snapshot.retail_event_ids.insert(event_id);
                        state.index.record_event(EventKind::Retail, author, event_id);
                    },
                    None => {},
                }

                state
                    .batches
                    .replace(batch_id, snapshot, metadata_hash.clone());
                if !stage.is_auxiliary() {
                    state.index.record_batch(role, actor_id, batch_id);
                }

                metrics::counter!("batchtrace.commits", "kind" => "update").increment(1);
                tracing::info!(%batch_id, %stage, %metadata_hash, "Batch stage updated");

                (
                    FulfillOutcome::Committed {
                        batch_id,
                        stage,
                        created: false,
                    },
                    smallvec![publish(
                        env,
                        vec![
                            ProvenanceEvent::DataCertified {
                                batch_id,
                                metadata_hash: metadata_hash.clone(),
                                timestamp,
                            },
                            ProvenanceEvent::BatchStageUpdated {
                                batch_id,
                                stage,
                                metadata_hash,
                                timestamp,
                            },
                        ],
                    )],
                )
            },
        }
    }

    /// Drop the given requests if still live, returning the ids actually expired.
    fn expire(
        state: &mut ProvenanceState,
        ids: impl IntoIterator<Item = CorrelationId>,
        env: &ProvenanceEnvironment,
    ) -> (Vec<CorrelationId>, Effects) {
        let timestamp = env.clock.now();
        let mut expired = Vec::new();
        let mut events = Vec::new();

        for correlation_id in ids {
            if let Some(request) = state.pending.discard(correlation_id) {
                tracing::warn!(%correlation_id, "Pending request expired");
                events.push(ProvenanceEvent::RequestExpired {
                    correlation_id,
                    batch_id: request.target_batch_id(),
                    metadata_hash: request.metadata_hash,
                    timestamp,
                });
                expired.push(correlation_id);
            }
        }

        if expired.is_empty() {
            return (expired, smallvec![Effect::None]);
        }
        metrics::counter!("batchtrace.rejections", "reason" => "expired")
            .increment(expired.len() as u64);
        record_pending(state);
        (expired, smallvec![publish(env, events)])
    }
}

impl Reducer for LifecycleReducer {
    type State = ProvenanceState;
    type Action = ProvenanceAction;
    type Environment = ProvenanceEnvironment;

    fn reduce(
        &self,
        state: &mut Self::State,
        action: Self::Action,
        env: &Self::Environment,
    ) -> SmallVec<[Effect<Self::Action>; 4]> {
        state.receipt = None;

        match action {
            // ═══════════════════════════════════════════════════════════════
            // Submit: validate locally, park the snapshot, ask the oracle
            // ═══════════════════════════════════════════════════════════════
            ProvenanceAction::Submit {
                caller,
                metadata_hash,
                transition,
            } => match Self::submit(state, &caller, metadata_hash, transition, env) {
                Ok((correlation_id, effects)) => {
                    state.receipt = Some(Ok(Receipt::Submitted(correlation_id)));
                    effects
                },
                Err(error) => {
                    tracing::warn!(%caller, %error, "Submission rejected");
                    metrics::counter!("batchtrace.rejections", "reason" => "submission")
                        .increment(1);
                    state.receipt = Some(Err(error));
                    smallvec![Effect::None]
                },
            },

            // ═══════════════════════════════════════════════════════════════
            // Fulfill: consume the pending record, commit or discard
            // ═══════════════════════════════════════════════════════════════
            ProvenanceAction::Fulfill {
                caller,
                correlation_id,
                response,
                error,
            } => match Self::fulfill(state, &caller, correlation_id, &response, &error, env) {
                Ok((outcome, effects)) => {
                    state.receipt = Some(Ok(Receipt::Fulfilled(outcome)));
                    effects
                },
                Err(error) => {
                    state.receipt = Some(Err(error));
                    smallvec![Effect::None]
                },
            },

            // ═══════════════════════════════════════════════════════════════
            // OracleUnreachable: the request never left, discard it
            // ═══════════════════════════════════════════════════════════════
            ProvenanceAction::OracleUnreachable {
                correlation_id,
                detail,
            } => {
                let Some(request) = state.pending.discard(correlation_id) else {
                    tracing::debug!(
                        %correlation_id,
                        "Dispatch failure for request no longer pending"
                    );
                    return smallvec![Effect::None];
                };
                record_pending(state);
                tracing::warn!(%correlation_id, %detail, "Oracle unreachable, proposal discarded");
                discard_effects(
                    env,
                    request.target_batch_id(),
                    request.metadata_hash,
                    format!("oracle unreachable: {detail}"),
                )
            },

            // ═══════════════════════════════════════════════════════════════
            // Expiry
            // ═══════════════════════════════════════════════════════════════
            ProvenanceAction::ExpireRequest { correlation_id } => {
                let (expired, effects) = Self::expire(state, [correlation_id], env);
                state.receipt = Some(Ok(Receipt::Expired(expired)));
                effects
            },

            ProvenanceAction::ExpireStale => {
                let stale = env
                    .config
                    .lifecycle
                    .pending_ttl
                    .and_then(|ttl| chrono::Duration::from_std(ttl).ok())
                    .and_then(|ttl| env.clock.now().checked_sub_signed(ttl))
                    .map(|cutoff| state.pending.submitted_before(cutoff))
                    .unwrap_or_default();
                let (expired, effects) = Self::expire(state, stale, env);
                state.receipt = Some(Ok(Receipt::Expired(expired)));
                effects
            },
        }
    }
}

/// Gate or log a stage change the transition table forbids.
fn check_stage_order(
    from: Stage,
    to: Stage,
    env: &ProvenanceEnvironment,
) -> Result<(), ProvenanceError> {
    if validate_chronological_order(from, to) {
        return Ok(());
    }
    if env.config.lifecycle.enforce_stage_order {
        return Err(ProvenanceError::IllegalTransition { from, to });
    }
    tracing::warn!(%from, %to, "Out-of-order transition accepted: stage order not enforced");
    Ok(())
}

fn publish(env: &ProvenanceEnvironment, events: Vec<ProvenanceEvent>) -> Effect<ProvenanceAction> {
    let audit = Arc::clone(&env.audit);
    Effect::fire_and_forget(async move {
        for event in events {
            audit.publish(event);
        }
    })
}

fn discard_effects(
    env: &ProvenanceEnvironment,
    batch_id: Option<BatchId>,
    metadata_hash: MetadataHash,
    error_detail: String,
) -> Effects {
    metrics::counter!("batchtrace.rejections", "reason" => "verdict").increment(1);
    tracing::warn!(?batch_id, %metadata_hash, %error_detail, "Certification failed");
    smallvec![publish(
        env,
        vec![ProvenanceEvent::DataCertificationFailed {
            batch_id,
            metadata_hash,
            error_detail,
            timestamp: env.clock.now(),
        }],
    )]
}

#[allow(clippy::cast_precision_loss)] // Gauge value
fn record_pending(state: &ProvenanceState) {
    metrics::gauge!("batchtrace.pending_requests").set(state.pending.len() as f64);
}
