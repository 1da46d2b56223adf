//! # Federation Events
//!
//! Every event the coordinator emits. Events are published only after the
//! ledger commit of the call that produced them succeeded.

use serde::{Deserialize, Serialize};
use shared_types::entities::{OrgId, Round, SessionId, SessionStatus};
use shared_types::FlagSeverity;

/// All events that can be published to the event bus.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum FederationEvent {
    // =========================================================================
    // SUBSYSTEM 5: SESSION MANAGER
    // =========================================================================
    SessionCreated {
        session_id: SessionId,
        session_name: String,
        created_by: OrgId,
        participants: Vec<OrgId>,
    },

    SessionStarted {
        session_id: SessionId,
        participants: Vec<OrgId>,
        current_round: Round,
    },

    ParticipantJoined {
        session_id: SessionId,
        org_id: OrgId,
        total_participants: usize,
    },

    /// Manual completion only; automatic completion is reported through
    /// `AggregationCompleted`.
    SessionCompleted {
        session_id: SessionId,
        completion_reason: String,
        total_rounds: Round,
    },

    // =========================================================================
    // SUBSYSTEM 4: UPDATE INTAKE
    // =========================================================================
    ModelUpdateSubmitted {
        update_id: String,
        session_id: SessionId,
        org_id: OrgId,
        round: Round,
        is_valid: bool,
    },

    // =========================================================================
    // SUBSYSTEM 3: AGGREGATION
    // =========================================================================
    /// Emitted whenever a round barrier closes, whether it aggregated or
    /// failed the session.
    AggregationCompleted {
        session_id: SessionId,
        round: Round,
        /// Round the session moved to; equals `round` when it stopped.
        next_round: Round,
        status: SessionStatus,
        current_accuracy: Option<f64>,
    },

    // =========================================================================
    // SUBSYSTEM 6: REPORTING
    // =========================================================================
    AnomalyFlagged {
        update_id: String,
        flag_id: String,
        severity: FlagSeverity,
    },
}

impl FederationEvent {
    /// Get the topic for this event.
    #[must_use]
    pub fn topic(&self) -> EventTopic {
        match self {
            Self::SessionCreated { .. }
            | Self::SessionStarted { .. }
            | Self::ParticipantJoined { .. }
            | Self::SessionCompleted { .. } => EventTopic::Session,
            Self::ModelUpdateSubmitted { .. } => EventTopic::Update,
            Self::AggregationCompleted { .. } => EventTopic::Aggregation,
            Self::AnomalyFlagged { .. } => EventTopic::Anomaly,
        }
    }

    /// Subsystem number of the emitter.
    #[must_use]
    pub fn source_subsystem(&self) -> u8 {
        match self.topic() {
            EventTopic::Session | EventTopic::All => 5,
            EventTopic::Update => 4,
            EventTopic::Aggregation => 3,
            EventTopic::Anomaly => 6,
        }
    }

    /// Session the event belongs to, if any.
    #[must_use]
    pub fn session_id(&self) -> Option<&str> {
        match self {
            Self::SessionCreated { session_id, .. }
            | Self::SessionStarted { session_id, .. }
            | Self::ParticipantJoined { session_id, .. }
            | Self::SessionCompleted { session_id, .. }
            | Self::ModelUpdateSubmitted { session_id, .. }
            | Self::AggregationCompleted { session_id, .. } => Some(session_id),
            Self::AnomalyFlagged { .. } => None,
        }
    }

    /// Wire name of the event, as host listeners know it.
    #[must_use]
    pub fn name(&self) -> &'static str {
        match self {
            Self::SessionCreated { .. } => "FLSessionCreated",
            Self::SessionStarted { .. } => "FLSessionStarted",
            Self::ParticipantJoined { .. } => "ParticipantJoined",
            Self::SessionCompleted { .. } => "SessionCompleted",
            Self::ModelUpdateSubmitted { .. } => "ModelUpdateSubmitted",
            Self::AggregationCompleted { .. } => "AggregationCompleted",
            Self::AnomalyFlagged { .. } => "AnomalyFlagged",
        }
    }
}

/// Event topics for filtering subscriptions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EventTopic {
    /// Session lifecycle.
    Session,
    /// Model update submissions.
    Update,
    /// Round barrier outcomes.
    Aggregation,
    /// Anomaly reports.
    Anomaly,
    /// Wildcard.
    All,
}

/// Filter for subscribing to specific events.
#[derive(Debug, Clone, Default)]
pub struct EventFilter {
    /// Topics to subscribe to (empty = all).
    pub topics: Vec<EventTopic>,
    /// Only events of this session (None = every session).
    pub session_id: Option<SessionId>,
}

impl EventFilter {
    /// Create a filter that accepts all events.
    #[must_use]
    pub fn all() -> Self {
        Self::default()
    }

    /// Create a filter for specific topics.
    #[must_use]
    pub fn topics(topics: Vec<EventTopic>) -> Self {
        Self {
            topics,
            session_id: None,
        }
    }

    /// Narrow the filter to one session.
    #[must_use]
    pub fn for_session(mut self, session_id: impl Into<SessionId>) -> Self {
        self.session_id = Some(session_id.into());
        self
    }

    /// Check if an event matches this filter.
    #[must_use]
    pub fn matches(&self, event: &FederationEvent) -> bool {
        let topic_match = self.topics.is_empty()
            || self.topics.contains(&EventTopic::All)
            || self.topics.contains(&event.topic());

        let session_match = match &self.session_id {
            None => true,
            Some(wanted) => event.session_id() == Some(wanted.as_str()),
        };

        topic_match && session_match
    }
}
