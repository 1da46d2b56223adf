//! # Shared Bus - Federation Event Bus
//!
//! Best-effort, in-process fan-out of [`FederationEvent`]s to host listeners.
//!
//! ## Rules
//!
//! - Services publish only after their ledger commit succeeded, so a listener
//!   never sees an event for state that was rolled back.
//! - Publishing never fails the calling operation; an event with no receivers
//!   is dropped and logged.
//!
//! ```text
//! ┌──────────────┐    publish()    ┌──────────────┐   subscribe()   ┌──────────┐
//! │ fl-0N service│ ──────────────→ │  Event Bus   │ ──────────────→ │ listener │
//! └──────────────┘                 └──────────────┘                 └──────────┘
//! ```

// Allow in tests
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

pub mod events;
pub mod publisher;
pub mod subscriber;

pub use events::{EventFilter, EventTopic, FederationEvent};
pub use publisher::{EventPublisher, InMemoryEventBus, RecordingPublisher};
pub use subscriber::Subscription;

/// Maximum events to buffer per subscriber before it starts lagging.
pub const DEFAULT_CHANNEL_CAPACITY: usize = 1000;
