//! # Caller Identity
//!
//! Signature verification happens in the host. The core only sees a resolved
//! principal and maps it to an organization through [`IdentityResolver`].

use crate::entities::OrgId;
use crate::errors::FlError;
use std::collections::HashMap;

/// Per-call context supplied by the host.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CallContext {
    /// Authenticated principal, e.g. an MSP id or a certificate subject.
    pub principal: String,
}

impl CallContext {
    pub fn new(principal: impl Into<String>) -> Self {
        Self {
            principal: principal.into(),
        }
    }
}

/// Maps an authenticated principal to the organization it acts for.
pub trait IdentityResolver: Send + Sync {
    fn resolve(&self, ctx: &CallContext) -> Result<OrgId, FlError>;
}

/// Treats the principal itself as the organization id.
#[derive(Debug, Clone, Copy, Default)]
pub struct TrustedPrincipalResolver;

impl IdentityResolver for TrustedPrincipalResolver {
    fn resolve(&self, ctx: &CallContext) -> Result<OrgId, FlError> {
        if ctx.principal.is_empty() {
            return Err(FlError::unauthorized("", "empty principal"));
        }
        Ok(ctx.principal.clone())
    }
}

/// Fixed principal → organization table. Unknown principals are rejected.
#[derive(Debug, Clone, Default)]
pub struct StaticIdentityResolver {
    mapping: HashMap<String, OrgId>,
}

impl StaticIdentityResolver {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_mapping(mut self, principal: impl Into<String>, org: impl Into<OrgId>) -> Self {
        self.mapping.insert(principal.into(), org.into());
        self
    }
}

impl IdentityResolver for StaticIdentityResolver {
    fn resolve(&self, ctx: &CallContext) -> Result<OrgId, FlError> {
        self.mapping
            .get(&ctx.principal)
            .cloned()
            .ok_or_else(|| FlError::unauthorized(ctx.principal.clone(), "unknown principal"))
    }
}
