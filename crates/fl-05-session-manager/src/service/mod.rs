//! # Session Manager Service
//!
//! One ledger transaction per operation. Events go out after the commit.

mod coordinator;

pub use coordinator::FederationCoordinator;

use crate::domain::{self, CreateSessionRequest};
use crate::ports::AgreementValidator;
use crate::PermissiveAgreementValidator;
use fl_01_ledger::{LedgerStore, LedgerTransaction};
use fl_02_privacy_budget::{BudgetAdjustment, PrivacyBudgetLedger};
use shared_bus::{EventPublisher, FederationEvent};
use shared_types::{
    validate_component, CallContext, EntityKind, FlError, FlSession, IdGenerator,
    IdentityResolver, KeyPrefix, OrgId, PrivacyBudgetRecord, SystemTimeSource, TimeSource,
    TrustedPrincipalResolver, UuidIdGenerator,
};
use std::collections::HashSet;
use std::sync::Arc;
use tracing::{debug, info};

/// Coordinator policy.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CoordinatorConfig {
    /// Organizations allowed to adjust budgets and complete any session.
    /// Empty means nobody is an administrator.
    pub admin_orgs: HashSet<OrgId>,
}

impl CoordinatorConfig {
    pub fn with_admins<I, S>(admins: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<OrgId>,
    {
        Self {
            admin_orgs: admins.into_iter().map(Into::into).collect(),
        }
    }

    #[must_use]
    pub fn is_admin(&self, org: &str) -> bool {
        self.admin_orgs.contains(org)
    }
}

/// Ports shared by the coordinator's services.
#[derive(Clone)]
pub struct CoordinatorDeps {
    pub ledger: Arc<dyn LedgerStore>,
    pub publisher: Arc<dyn EventPublisher>,
    pub identity: Arc<dyn IdentityResolver>,
    pub agreements: Arc<dyn AgreementValidator>,
    pub ids: Arc<dyn IdGenerator>,
    pub time: Arc<dyn TimeSource>,
}

impl CoordinatorDeps {
    /// Principals trusted as org ids, permissive agreements, UUID session
    /// ids and the system clock.
    pub fn new(ledger: Arc<dyn LedgerStore>, publisher: Arc<dyn EventPublisher>) -> Self {
        Self {
            ledger,
            publisher,
            identity: Arc::new(TrustedPrincipalResolver),
            agreements: Arc::new(PermissiveAgreementValidator),
            ids: Arc::new(UuidIdGenerator),
            time: Arc::new(SystemTimeSource),
        }
    }

    #[must_use]
    pub fn with_identity(mut self, identity: Arc<dyn IdentityResolver>) -> Self {
        self.identity = identity;
        self
    }

    #[must_use]
    pub fn with_agreements(mut self, agreements: Arc<dyn AgreementValidator>) -> Self {
        self.agreements = agreements;
        self
    }

    #[must_use]
    pub fn with_ids(mut self, ids: Arc<dyn IdGenerator>) -> Self {
        self.ids = ids;
        self
    }

    #[must_use]
    pub fn with_time(mut self, time: Arc<dyn TimeSource>) -> Self {
        self.time = time;
        self
    }
}

/// Creates, starts, joins and terminates sessions.
pub struct SessionManager {
    deps: CoordinatorDeps,
    budgets: Arc<PrivacyBudgetLedger>,
    config: CoordinatorConfig,
}

impl SessionManager {
    pub fn new(
        deps: CoordinatorDeps,
        budgets: Arc<PrivacyBudgetLedger>,
        config: CoordinatorConfig,
    ) -> Self {
        Self {
            deps,
            budgets,
            config,
        }
    }

    pub fn config(&self) -> &CoordinatorConfig {
        &self.config
    }

    pub fn create_session(
        &self,
        ctx: &CallContext,
        request: CreateSessionRequest,
    ) -> Result<FlSession, FlError> {
        request.validate()?;
        let caller = self.deps.identity.resolve(ctx)?;

        let mut orgs: Vec<&str> = vec![caller.as_str()];
        orgs.extend(request.participants.iter().map(String::as_str));
        self.admit(&request.agreement_id, &orgs)?;

        let session_id = self.deps.ids.next_session_id();
        let mut tx = LedgerTransaction::begin(self.deps.ledger.as_ref());
        let key = KeyPrefix::session_key(&session_id);
        if tx.exists(&key)? {
            return Err(FlError::Storage(format!(
                "session id {session_id} already allocated"
            )));
        }

        let (session, event) =
            domain::new_session(session_id, caller, request, self.deps.time.now());
        let allotment = session.budget_allotment();
        for org in &session.participants {
            self.budgets
                .open_session_budget(&mut tx, &session.session_id, org, allotment)?;
        }
        tx.put_json(key, &session)?;
        tx.commit()?;

        info!(
            "[fl-05] Session {} '{}' created by {} with {} participants",
            session.session_id,
            session.session_name,
            session.created_by,
            session.participants.len()
        );
        self.publish(event);
        Ok(session)
    }

    pub fn start_session(&self, ctx: &CallContext, session_id: &str) -> Result<FlSession, FlError> {
        let caller = self.deps.identity.resolve(ctx)?;
        let mut tx = LedgerTransaction::begin(self.deps.ledger.as_ref());
        let session = load_session(&mut tx, session_id)?;
        self.authorize_member(&caller, &session, "start")?;

        let (session, event) = domain::start(session, self.deps.time.now())?;
        tx.put_json(KeyPrefix::session_key(session_id), &session)?;
        tx.commit()?;

        info!(
            "[fl-05] Session {} started by {} with {} participants",
            session_id,
            caller,
            session.participants.len()
        );
        self.publish(event);
        Ok(session)
    }

    pub fn join_session(
        &self,
        ctx: &CallContext,
        session_id: &str,
        org_id: &str,
    ) -> Result<FlSession, FlError> {
        validate_component("org_id", org_id)?;
        let caller = self.deps.identity.resolve(ctx)?;
        if caller != org_id {
            return Err(FlError::unauthorized(
                caller,
                format!("cannot join on behalf of {org_id}"),
            ));
        }

        let mut tx = LedgerTransaction::begin(self.deps.ledger.as_ref());
        let session = load_session(&mut tx, session_id)?;
        self.admit(&session.agreement_id, &[org_id])?;

        let (session, event) = domain::join(session, org_id)?;
        self.budgets.open_session_budget(
            &mut tx,
            session_id,
            org_id,
            session.budget_allotment(),
        )?;
        tx.put_json(KeyPrefix::session_key(session_id), &session)?;
        tx.commit()?;

        info!(
            "[fl-05] {} joined session {} ({}/{})",
            org_id,
            session_id,
            session.participants.len(),
            shared_types::MAX_PARTICIPANTS
        );
        self.publish(event);
        Ok(session)
    }

    pub fn complete_session(
        &self,
        ctx: &CallContext,
        session_id: &str,
        reason: Option<String>,
    ) -> Result<FlSession, FlError> {
        let caller = self.deps.identity.resolve(ctx)?;
        let mut tx = LedgerTransaction::begin(self.deps.ledger.as_ref());
        let session = load_session(&mut tx, session_id)?;
        self.authorize_member(&caller, &session, "complete")?;

        let (session, event) = domain::complete(session, reason, self.deps.time.now())?;
        tx.put_json(KeyPrefix::session_key(session_id), &session)?;
        tx.commit()?;

        info!(
            "[fl-05] Session {} completed by {}: {}",
            session_id,
            caller,
            session.completion_reason.as_deref().unwrap_or_default()
        );
        self.publish(event);
        Ok(session)
    }

    /// Administrative budget adjustment.
    pub fn update_privacy_budget(
        &self,
        ctx: &CallContext,
        budget_id: &str,
        adjustment: &BudgetAdjustment,
    ) -> Result<PrivacyBudgetRecord, FlError> {
        let caller = self.deps.identity.resolve(ctx)?;
        if !self.config.is_admin(&caller) {
            return Err(FlError::unauthorized(
                caller,
                "only administrators may adjust privacy budgets",
            ));
        }

        let mut tx = LedgerTransaction::begin(self.deps.ledger.as_ref());
        let updated = self.budgets.adjust(&mut tx, budget_id, adjustment)?;
        tx.commit()?;
        Ok(updated)
    }

    /// Create global budgets for `orgs` that have none. Host-invoked at
    /// ledger initialization.
    pub fn bootstrap_global_budgets(
        &self,
        orgs: &[OrgId],
        amount: f64,
    ) -> Result<Vec<String>, FlError> {
        self.budgets
            .bootstrap_global_budgets(self.deps.ledger.as_ref(), orgs, amount)
    }

    fn admit(&self, agreement_id: &str, orgs: &[&str]) -> Result<(), FlError> {
        let agreement = self.deps.agreements.lookup(agreement_id)?;
        domain::check_agreement(
            agreement_id,
            agreement.as_ref(),
            orgs,
            self.deps.agreements.enforces_partnership(),
        )
    }

    fn authorize_member(
        &self,
        caller: &str,
        session: &FlSession,
        action: &str,
    ) -> Result<(), FlError> {
        if session.is_participant(caller)
            || session.created_by == caller
            || self.config.is_admin(caller)
        {
            return Ok(());
        }
        Err(FlError::unauthorized(
            caller,
            format!("cannot {action} session {}", session.session_id),
        ))
    }

    fn publish(&self, event: FederationEvent) {
        let delivered = self.deps.publisher.publish(event);
        debug!("[fl-05] Event delivered to {} subscribers", delivered);
    }
}

fn load_session(tx: &mut LedgerTransaction<'_>, session_id: &str) -> Result<FlSession, FlError> {
    tx.get_json(&KeyPrefix::session_key(session_id))?
        .ok_or_else(|| FlError::not_found(EntityKind::Session, session_id))
}
