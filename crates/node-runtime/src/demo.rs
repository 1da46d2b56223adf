//! Scripted federation used by the binary when `FL_DEMO` is set.
//!
//! Three organizations train for a few rounds under one agreement; the
//! returned summary is what the binary prints.

use serde_json::json;
use shared_types::{AgreementInfo, AgreementStatus, CallContext, UpdateMetrics};
use tracing::info;

use fl_04_update_intake::SubmitModelUpdateRequest;
use fl_05_session_manager::CreateSessionRequest;
use fl_06_reporting::{SessionProgress, SystemStats};

use crate::container::FederationContainer;
use crate::error::NodeError;

pub const DEMO_AGREEMENT: &str = "AGR-DEMO";
pub const DEMO_ORGS: [&str; 3] = ["org1", "org2", "org3"];
pub const DEMO_ROUNDS: u32 = 3;

const EPSILON_PER_ROUND: f64 = 1.0;
const EPSILON_SPENT_PER_UPDATE: f64 = 0.8;

/// What the demo left on the ledger.
#[derive(Debug)]
pub struct DemoSummary {
    pub session_id: String,
    pub progress: SessionProgress,
    pub stats: SystemStats,
}

/// Run one session from creation to completion.
pub fn run_demo(container: &FederationContainer) -> Result<DemoSummary, NodeError> {
    if let Some(registry) = &container.agreements {
        registry.register(&AgreementInfo {
            agreement_id: DEMO_AGREEMENT.into(),
            status: AgreementStatus::Active,
            partner_orgs: DEMO_ORGS.iter().map(|org| org.to_string()).collect(),
            terms: json!({ "purpose": "demo" }),
        })?;
    }

    let [creator, partner, late_joiner] = DEMO_ORGS.map(CallContext::new);
    let coordinator = &container.coordinator;

    let request = CreateSessionRequest::new(
        "demo-classifier",
        DEMO_AGREEMENT,
        "cnn",
        DEMO_ROUNDS,
        EPSILON_PER_ROUND,
    )
    .with_participants([DEMO_ORGS[0], DEMO_ORGS[1]]);
    let session = container.retry(|| coordinator.create_session(&creator, request.clone()))?;
    let session_id = session.session_id.clone();

    container.retry(|| coordinator.join_session(&late_joiner, &session_id, DEMO_ORGS[2]))?;
    container.retry(|| coordinator.start_session(&creator, &session_id))?;

    for round in 1..=DEMO_ROUNDS {
        for (i, ctx) in [&creator, &partner, &late_joiner].into_iter().enumerate() {
            let offset = f64::from(round) * 0.05 + i as f64 * 0.01;
            let request = SubmitModelUpdateRequest {
                session_id: session_id.clone(),
                org_id: ctx.principal.clone(),
                round,
                update_hash: format!("sha256:{}-{round}", ctx.principal),
                privacy_budget_used: EPSILON_SPENT_PER_UPDATE,
                metrics: Some(UpdateMetrics::new(Some(0.7 + offset), Some(1.0 - offset))),
                computation_time: Some(12.5),
                samples_used: Some(1_000),
            };
            let receipt =
                container.retry(|| coordinator.submit_model_update(ctx, request.clone()))?;
            if let Some(closed) = receipt.round_closed {
                info!(
                    "Round {} closed, session {} now {}",
                    closed.round, session_id, closed.status
                );
            }
        }
    }

    let progress = container.stats.get_session_progress(&session_id)?;
    let stats = container.stats.get_system_stats()?;
    Ok(DemoSummary {
        session_id,
        progress,
        stats,
    })
}
