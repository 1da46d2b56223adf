//! # Ledger Key Scheme
//!
//! Every record lives under a `<prefix>:<natural key>` string key. Rounds are
//! zero-padded to eight digits so lexicographic range scans return them in
//! numeric order.
//!
//! | Record | Key |
//! |--------|-----|
//! | session | `session:<session_id>` |
//! | budget | `budget:<budget_id>` |
//! | update | `update:<session_id>:<round:08>:<org_id>` |
//! | aggregation | `aggregation:<session_id>:<round:08>` |
//! | flag | `flag:<flag_id>` |
//! | agreement | `agreement:<agreement_id>` |

use crate::entities::Round;
use crate::errors::FlError;

/// Separator between key components. Identifiers must not contain it.
pub const KEY_SEPARATOR: char = ':';

/// Record family of a ledger key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum KeyPrefix {
    Session,
    Budget,
    Update,
    Aggregation,
    Flag,
    Agreement,
}

impl KeyPrefix {
    /// The prefix including its trailing separator, e.g. `"session:"`.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Session => "session:",
            Self::Budget => "budget:",
            Self::Update => "update:",
            Self::Aggregation => "aggregation:",
            Self::Flag => "flag:",
            Self::Agreement => "agreement:",
        }
    }

    #[must_use]
    pub fn session_key(session_id: &str) -> String {
        format!("{}{session_id}", Self::Session.as_str())
    }

    #[must_use]
    pub fn budget_key(budget_id: &str) -> String {
        format!("{}{budget_id}", Self::Budget.as_str())
    }

    #[must_use]
    pub fn update_key(session_id: &str, round: Round, org_id: &str) -> String {
        format!("{}{org_id}", Self::round_updates_prefix(session_id, round))
    }

    /// Prefix shared by every update of one round.
    #[must_use]
    pub fn round_updates_prefix(session_id: &str, round: Round) -> String {
        format!("{}{session_id}:{round:08}:", Self::Update.as_str())
    }

    /// Prefix shared by every update of one session.
    #[must_use]
    pub fn session_updates_prefix(session_id: &str) -> String {
        format!("{}{session_id}:", Self::Update.as_str())
    }

    #[must_use]
    pub fn aggregation_key(session_id: &str, round: Round) -> String {
        format!(
            "{}{session_id}:{round:08}",
            Self::Aggregation.as_str()
        )
    }

    #[must_use]
    pub fn session_aggregations_prefix(session_id: &str) -> String {
        format!("{}{session_id}:", Self::Aggregation.as_str())
    }

    #[must_use]
    pub fn flag_key(flag_id: &str) -> String {
        format!("{}{flag_id}", Self::Flag.as_str())
    }

    #[must_use]
    pub fn agreement_key(agreement_id: &str) -> String {
        format!("{}{agreement_id}", Self::Agreement.as_str())
    }

    /// Half-open `[low, high)` bounds covering every key of this family.
    #[must_use]
    pub fn family_range(self) -> (String, String) {
        prefix_range(self.as_str())
    }
}

/// Half-open bounds covering every key that starts with `prefix`.
#[must_use]
pub fn prefix_range(prefix: &str) -> (String, String) {
    (prefix.to_string(), prefix_end(prefix))
}

/// Smallest string greater than every key starting with `prefix`.
#[must_use]
pub fn prefix_end(prefix: &str) -> String {
    let mut end = prefix.to_string();
    match end.pop().and_then(|last| char::from_u32(last as u32 + 1).map(|next| (last, next))) {
        Some((_, next)) => end.push(next),
        None => {
            end = prefix.to_string();
            end.push(char::MAX);
        }
    }
    end
}

/// Rejects identifiers that would break the key layout.
pub fn validate_component(field: &'static str, value: &str) -> Result<(), FlError> {
    if value.trim().is_empty() {
        return Err(FlError::validation(field, "must not be empty"));
    }
    if value.contains(KEY_SEPARATOR) {
        return Err(FlError::validation(
            field,
            format!("must not contain '{KEY_SEPARATOR}'"),
        ));
    }
    Ok(())
}
