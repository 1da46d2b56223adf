//! # Outbound Ports
//!
//! Agreement lookup. The signing workflow that produces agreements is owned
//! by the host.

use shared_types::{AgreementInfo, FlError};

/// Source of collaboration agreements.
pub trait AgreementValidator: Send + Sync {
    fn lookup(&self, agreement_id: &str) -> Result<Option<AgreementInfo>, FlError>;

    /// When false, any org may take part under any agreement.
    fn enforces_partnership(&self) -> bool;
}
