//! Event types for the management audit stream
//!
//! Every committed model change and every deployment transition is published
//! as an event so that operators can audit what happened and when.

use crate::{ModelValue, PathAddress};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Envelope wrapping all management events
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ManagementEventEnvelope {
    /// Unique event ID
    pub id: Uuid,

    /// Event timestamp
    pub timestamp: chrono::DateTime<chrono::Utc>,

    /// Event source
    pub source: EventSource,

    /// Event severity
    pub severity: EventSeverity,

    /// Caller that triggered the event, when known
    pub actor: Option<String>,

    /// The actual event
    pub event: ManagementEvent,
}

/// Event sources
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum EventSource {
    /// Operation dispatcher
    Controller,
    /// Deployment phase pipeline
    Deployment,
    /// Mount/resource lifecycle manager
    Lifecycle,
}

/// Event severity levels
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum EventSeverity {
    Debug,
    Info,
    Warning,
    Error,
}

/// Management events
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum ManagementEvent {
    // ═══════════════════════════════════════════════════════════════════
    // MODEL EVENTS
    // ═══════════════════════════════════════════════════════════════════
    /// A resource was created
    ResourceAdded { address: PathAddress, operation: String },

    /// A resource was removed
    ResourceRemoved { address: PathAddress, operation: String },

    /// A resource's attributes changed in place
    AttributeWritten {
        address: PathAddress,
        attribute: String,
        value: ModelValue,
    },

    /// A resource was replaced wholesale
    ResourceReplaced { address: PathAddress, operation: String },

    /// An operation was rejected
    OperationFailed {
        address: PathAddress,
        operation: String,
        message: String,
    },

    // ═══════════════════════════════════════════════════════════════════
    // DEPLOYMENT EVENTS
    // ═══════════════════════════════════════════════════════════════════
    /// A unit entered the phase pipeline
    DeploymentStarted { unit: String },

    /// Every phase completed
    DeploymentCompleted { unit: String },

    /// A processor failed
    DeploymentFailed {
        unit: String,
        phase: u32,
        message: String,
    },

    /// A unit was torn down
    DeploymentUndeployed { unit: String },

    /// Closing an external resource failed
    CleanupFailed {
        unit: String,
        path: String,
        message: String,
    },
}

impl ManagementEventEnvelope {
    /// Create a new event envelope
    pub fn new(event: ManagementEvent, source: EventSource) -> Self {
        Self {
            id: Uuid::new_v4(),
            timestamp: chrono::Utc::now(),
            source,
            severity: Self::infer_severity(&event),
            actor: None,
            event,
        }
    }

    /// Create with actor
    pub fn with_actor(mut self, actor: impl Into<String>) -> Self {
        self.actor = Some(actor.into());
        self
    }

    /// Infer severity from event type
    fn infer_severity(event: &ManagementEvent) -> EventSeverity {
        match event {
            ManagementEvent::DeploymentFailed { .. } => EventSeverity::Error,
            ManagementEvent::OperationFailed { .. } | ManagementEvent::CleanupFailed { .. } => {
                EventSeverity::Warning
            }
            _ => EventSeverity::Info,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_severity_inference() {
        let failed = ManagementEventEnvelope::new(
            ManagementEvent::DeploymentFailed {
                unit: "app.war".into(),
                phase: 200,
                message: "bad descriptor".into(),
            },
            EventSource::Deployment,
        );
        assert_eq!(failed.severity, EventSeverity::Error);

        let added = ManagementEventEnvelope::new(
            ManagementEvent::ResourceAdded {
                address: PathAddress::root(),
                operation: "add".into(),
            },
            EventSource::Controller,
        )
        .with_actor("admin");
        assert_eq!(added.severity, EventSeverity::Info);
        assert_eq!(added.actor.as_deref(), Some("admin"));
    }
}
