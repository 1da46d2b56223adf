//! # Domain Layer
//!
//! Pure transformations over [`PrivacyBudgetRecord`]. No I/O.

use serde::{Deserialize, Serialize};
use shared_types::{
    BudgetAdjustmentRecord, FlError, OrgId, PrivacyBudgetRecord, SessionId, Timestamp,
};

/// Epsilon granted to each bootstrapped organization.
pub const DEFAULT_GLOBAL_BUDGET: f64 = 10.0;

pub const DEFAULT_ADJUSTMENT_REASON: &str = "Manual adjustment";

/// Administrative change to a budget.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BudgetAdjustment {
    /// Added to both total and remaining. May be negative.
    #[serde(default)]
    pub add_to_total: Option<f64>,
    /// Applied after `add_to_total`, capped at the total.
    #[serde(default)]
    pub set_remaining: Option<f64>,
    #[serde(default)]
    pub reason: Option<String>,
}

pub fn new_session_budget(
    session_id: &SessionId,
    org_id: &OrgId,
    total: f64,
    now: Timestamp,
) -> PrivacyBudgetRecord {
    PrivacyBudgetRecord {
        budget_id: PrivacyBudgetRecord::session_budget_id(session_id, org_id),
        org_id: org_id.clone(),
        session_id: Some(session_id.clone()),
        total_budget: total,
        remaining_budget: total,
        last_updated: now,
        last_adjustment: None,
    }
}

pub fn new_global_budget(org_id: &OrgId, total: f64, now: Timestamp) -> PrivacyBudgetRecord {
    PrivacyBudgetRecord {
        budget_id: PrivacyBudgetRecord::global_budget_id(org_id),
        org_id: org_id.clone(),
        session_id: None,
        total_budget: total,
        remaining_budget: total,
        last_updated: now,
        last_adjustment: None,
    }
}

/// Spend `amount` from `budget`.
pub fn reserve(
    mut budget: PrivacyBudgetRecord,
    amount: f64,
    now: Timestamp,
) -> Result<PrivacyBudgetRecord, FlError> {
    if !amount.is_finite() || amount < 0.0 {
        return Err(FlError::validation(
            "privacy_budget_used",
            "must be a finite, non-negative number",
        ));
    }
    if budget.remaining_budget < amount {
        return Err(FlError::ResourceExhausted {
            remaining: budget.remaining_budget,
            requested: amount,
        });
    }
    budget.remaining_budget -= amount;
    budget.last_updated = now;
    Ok(budget)
}

/// Apply an administrative adjustment, keeping `0 <= remaining <= total`.
pub fn apply_adjustment(
    mut budget: PrivacyBudgetRecord,
    adjustment: &BudgetAdjustment,
    now: Timestamp,
) -> Result<PrivacyBudgetRecord, FlError> {
    if let Some(add) = adjustment.add_to_total {
        if !add.is_finite() {
            return Err(FlError::validation("add_to_total", "must be finite"));
        }
        budget.total_budget += add;
        budget.remaining_budget += add;
    }

    if let Some(set) = adjustment.set_remaining {
        if !set.is_finite() || set < 0.0 {
            return Err(FlError::validation(
                "set_remaining",
                "must be a finite, non-negative number",
            ));
        }
        budget.remaining_budget = set.min(budget.total_budget);
    }

    if budget.total_budget < 0.0 {
        return Err(FlError::validation(
            "add_to_total",
            format!("would make total negative ({})", budget.total_budget),
        ));
    }
    if budget.remaining_budget < 0.0 {
        return Err(FlError::validation(
            "add_to_total",
            format!("would make remaining negative ({})", budget.remaining_budget),
        ));
    }

    budget.last_adjustment = Some(BudgetAdjustmentRecord {
        reason: adjustment
            .reason
            .clone()
            .filter(|r| !r.trim().is_empty())
            .unwrap_or_else(|| DEFAULT_ADJUSTMENT_REASON.to_string()),
        amount: adjustment.add_to_total.unwrap_or(0.0),
        timestamp: now,
    });
    budget.last_updated = now;
    Ok(budget)
}
