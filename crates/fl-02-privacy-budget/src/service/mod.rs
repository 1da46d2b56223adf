//! # Privacy Budget Service
//!
//! Loads budget records through the caller's transaction, applies the domain
//! transformation and buffers the result. Committing is the caller's job,
//! except for the standalone bootstrap.

use crate::domain::{self, BudgetAdjustment};
use fl_01_ledger::{LedgerStore, LedgerTransaction};
use shared_types::{EntityKind, FlError, KeyPrefix, OrgId, PrivacyBudgetRecord, TimeSource};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Sole mutator of `budget:` records.
pub struct PrivacyBudgetLedger {
    time: Arc<dyn TimeSource>,
}

impl PrivacyBudgetLedger {
    pub fn new(time: Arc<dyn TimeSource>) -> Self {
        Self { time }
    }

    /// Load a budget by id within `tx`.
    pub fn get_budget(
        &self,
        tx: &mut LedgerTransaction<'_>,
        budget_id: &str,
    ) -> Result<PrivacyBudgetRecord, FlError> {
        tx.get_json(&KeyPrefix::budget_key(budget_id))?
            .ok_or_else(|| FlError::not_found(EntityKind::Budget, budget_id))
    }

    /// Spend `amount` from the (org, session) budget inside `tx`.
    pub fn check_and_reserve(
        &self,
        tx: &mut LedgerTransaction<'_>,
        org_id: &str,
        session_id: &str,
        amount: f64,
    ) -> Result<PrivacyBudgetRecord, FlError> {
        let budget_id = PrivacyBudgetRecord::session_budget_id(session_id, org_id);
        let budget = self.get_budget(tx, &budget_id)?;

        let updated = domain::reserve(budget, amount, self.time.now()).map_err(|e| {
            if let FlError::ResourceExhausted {
                remaining,
                requested,
            } = &e
            {
                warn!(
                    "[fl-02] Budget {} exhausted: remaining {:.4}, requested {:.4}",
                    budget_id, remaining, requested
                );
            }
            e
        })?;

        tx.put_json(KeyPrefix::budget_key(&budget_id), &updated)?;
        debug!(
            "[fl-02] Reserved {:.4} from {} ({:.4} left)",
            amount, budget_id, updated.remaining_budget
        );
        Ok(updated)
    }

    /// Create the per-session budget for `org_id`. An existing record is
    /// returned unchanged.
    pub fn open_session_budget(
        &self,
        tx: &mut LedgerTransaction<'_>,
        session_id: &str,
        org_id: &str,
        total: f64,
    ) -> Result<PrivacyBudgetRecord, FlError> {
        let budget_id = PrivacyBudgetRecord::session_budget_id(session_id, org_id);
        let key = KeyPrefix::budget_key(&budget_id);
        if let Some(existing) = tx.get_json::<PrivacyBudgetRecord>(&key)? {
            return Ok(existing);
        }

        let record = domain::new_session_budget(
            &session_id.to_string(),
            &org_id.to_string(),
            total,
            self.time.now(),
        );
        tx.put_json(key, &record)?;
        debug!("[fl-02] Opened {} with epsilon {:.4}", budget_id, total);
        Ok(record)
    }

    /// Administrative adjustment. Authorization is checked by the caller.
    pub fn adjust(
        &self,
        tx: &mut LedgerTransaction<'_>,
        budget_id: &str,
        adjustment: &BudgetAdjustment,
    ) -> Result<PrivacyBudgetRecord, FlError> {
        let budget = self.get_budget(tx, budget_id)?;
        let updated = domain::apply_adjustment(budget, adjustment, self.time.now())?;
        tx.put_json(KeyPrefix::budget_key(budget_id), &updated)?;
        info!(
            "[fl-02] Adjusted {}: total {:.4}, remaining {:.4}",
            budget_id, updated.total_budget, updated.remaining_budget
        );
        Ok(updated)
    }

    /// Create global `BUDGET_<org>` records for organizations that have none.
    ///
    /// Runs and commits its own transaction. Returns the ids created.
    pub fn bootstrap_global_budgets(
        &self,
        ledger: &dyn LedgerStore,
        orgs: &[OrgId],
        amount: f64,
    ) -> Result<Vec<String>, FlError> {
        if !amount.is_finite() || amount < 0.0 {
            return Err(FlError::validation(
                "global_budget",
                "must be a finite, non-negative number",
            ));
        }

        let mut tx = LedgerTransaction::begin(ledger);
        let now = self.time.now();
        let mut created = Vec::new();

        for org in orgs {
            shared_types::validate_component("org_id", org)?;
            let budget_id = PrivacyBudgetRecord::global_budget_id(org);
            let key = KeyPrefix::budget_key(&budget_id);
            if tx.exists(&key)? {
                continue;
            }
            tx.put_json(key, &domain::new_global_budget(org, amount, now))?;
            created.push(budget_id);
        }

        if created.is_empty() {
            debug!("[fl-02] Global budgets already present");
            return Ok(created);
        }

        tx.commit()?;
        info!(
            "[fl-02] Bootstrapped {} global budget(s) of {:.2}",
            created.len(),
            amount
        );
        Ok(created)
    }
}
