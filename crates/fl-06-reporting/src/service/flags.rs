use crate::domain::{self, FlagRequest};
use fl_01_ledger::{LedgerStore, LedgerTransaction};
use shared_bus::{EventPublisher, FederationEvent};
use shared_types::{AnomalyFlag, CallContext, FlError, IdentityResolver, KeyPrefix, TimeSource};
use std::sync::Arc;
use tracing::info;

/// Free-standing anomaly reports against updates.
///
/// Flags are never attached to the update record and do not change any
/// counter; the referenced update is not required to exist.
pub struct AnomalyReporting {
    ledger: Arc<dyn LedgerStore>,
    identity: Arc<dyn IdentityResolver>,
    publisher: Arc<dyn EventPublisher>,
    time: Arc<dyn TimeSource>,
}

impl AnomalyReporting {
    pub fn new(
        ledger: Arc<dyn LedgerStore>,
        identity: Arc<dyn IdentityResolver>,
        publisher: Arc<dyn EventPublisher>,
        time: Arc<dyn TimeSource>,
    ) -> Self {
        Self {
            ledger,
            identity,
            publisher,
            time,
        }
    }

    pub fn flag_anomalous_update(
        &self,
        ctx: &CallContext,
        update_id: &str,
        request: FlagRequest,
    ) -> Result<AnomalyFlag, FlError> {
        let reporter = self.identity.resolve(ctx)?;
        let nonce = uuid::Uuid::new_v4().simple().to_string();
        let flag = domain::build_flag(
            update_id,
            reporter,
            request,
            domain::flag_id(update_id, &nonce),
            self.time.now(),
        )?;

        let mut tx = LedgerTransaction::begin(self.ledger.as_ref());
        tx.put_json(KeyPrefix::flag_key(&flag.flag_id), &flag)?;
        tx.commit()?;

        info!(
            "[fl-06] {} flagged {} ({:?}): {}",
            flag.reported_by, flag.update_id, flag.severity, flag.reason
        );
        self.publisher.publish(FederationEvent::AnomalyFlagged {
            update_id: flag.update_id.clone(),
            flag_id: flag.flag_id.clone(),
            severity: flag.severity,
        });
        Ok(flag)
    }
}
