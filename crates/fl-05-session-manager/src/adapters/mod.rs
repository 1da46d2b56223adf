//! # Agreement Adapters
//!
//! - [`LedgerAgreementRegistry`]: agreements stored under `agreement:` keys
//!   and enforced (existence, status, partnership).
//! - [`PermissiveAgreementValidator`]: every agreement id exists and admits
//!   everyone. Suitable for demos only.

use crate::ports::AgreementValidator;
use fl_01_ledger::{LedgerStore, LedgerTransaction};
use shared_types::{validate_component, AgreementInfo, AgreementStatus, FlError, KeyPrefix};
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;
use tracing::info;

/// Which validator the node wires in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum AgreementMode {
    #[default]
    Registry,
    Permissive,
}

impl FromStr for AgreementMode {
    type Err = FlError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "registry" => Ok(Self::Registry),
            "permissive" => Ok(Self::Permissive),
            other => Err(FlError::validation(
                "agreement_mode",
                format!("unknown mode '{other}', expected registry or permissive"),
            )),
        }
    }
}

impl fmt::Display for AgreementMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Registry => f.write_str("registry"),
            Self::Permissive => f.write_str("permissive"),
        }
    }
}

/// Ledger-backed agreement registry.
pub struct LedgerAgreementRegistry {
    ledger: Arc<dyn LedgerStore>,
}

impl LedgerAgreementRegistry {
    pub fn new(ledger: Arc<dyn LedgerStore>) -> Self {
        Self { ledger }
    }

    /// Insert or replace an agreement. Used by the host's signing workflow.
    pub fn register(&self, agreement: &AgreementInfo) -> Result<(), FlError> {
        validate_component("agreement_id", &agreement.agreement_id)?;
        for org in &agreement.partner_orgs {
            validate_component("partner_orgs", org)?;
        }

        let mut tx = LedgerTransaction::begin(self.ledger.as_ref());
        tx.put_json(KeyPrefix::agreement_key(&agreement.agreement_id), agreement)?;
        tx.commit()?;
        info!(
            "[fl-05] Registered agreement {} ({:?}, {} partners)",
            agreement.agreement_id,
            agreement.status,
            agreement.partner_orgs.len()
        );
        Ok(())
    }
}

impl AgreementValidator for LedgerAgreementRegistry {
    fn lookup(&self, agreement_id: &str) -> Result<Option<AgreementInfo>, FlError> {
        match self.ledger.get(&KeyPrefix::agreement_key(agreement_id))? {
            Some(versioned) => Ok(Some(serde_json::from_slice(&versioned.value)?)),
            None => Ok(None),
        }
    }

    fn enforces_partnership(&self) -> bool {
        true
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct PermissiveAgreementValidator;

impl AgreementValidator for PermissiveAgreementValidator {
    fn lookup(&self, agreement_id: &str) -> Result<Option<AgreementInfo>, FlError> {
        Ok(Some(AgreementInfo {
            agreement_id: agreement_id.to_string(),
            status: AgreementStatus::Active,
            partner_orgs: Vec::new(),
            terms: serde_json::Value::Null,
        }))
    }

    fn enforces_partnership(&self) -> bool {
        false
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use fl_01_ledger::InMemoryLedger;

    #[test]
    fn test_registry_round_trip() {
        let registry = LedgerAgreementRegistry::new(Arc::new(InMemoryLedger::new()));
        assert_eq!(registry.lookup("AGR-1").unwrap(), None);

        let agreement = AgreementInfo {
            agreement_id: "AGR-1".into(),
            status: AgreementStatus::Active,
            partner_orgs: vec!["org1".into(), "org2".into()],
            terms: serde_json::json!({"purpose": "fraud detection"}),
        };
        registry.register(&agreement).unwrap();
        assert_eq!(registry.lookup("AGR-1").unwrap(), Some(agreement));
        assert!(registry.enforces_partnership());
    }

    #[test]
    fn test_registry_rejects_bad_ids() {
        let registry = LedgerAgreementRegistry::new(Arc::new(InMemoryLedger::new()));
        let agreement = AgreementInfo {
            agreement_id: "AGR:1".into(),
            status: AgreementStatus::Active,
            partner_orgs: vec![],
            terms: serde_json::Value::Null,
        };
        assert!(registry.register(&agreement).is_err());
    }

    #[test]
    fn test_permissive_admits_anything() {
        let validator = PermissiveAgreementValidator;
        let found = validator.lookup("whatever").unwrap().unwrap();
        assert_eq!(found.status, AgreementStatus::Active);
        assert!(!validator.enforces_partnership());
    }

    #[test]
    fn test_mode_parsing() {
        assert_eq!("Registry".parse::<AgreementMode>().unwrap(), AgreementMode::Registry);
        assert_eq!(" permissive ".parse::<AgreementMode>().unwrap(), AgreementMode::Permissive);
        assert!("open".parse::<AgreementMode>().is_err());
        assert_eq!(AgreementMode::default().to_string(), "registry");
    }
}
