//! Multi-step transactions built on compensating operations
//!
//! Single dispatches never roll anything back on their own. The coordinator
//! runs a list of operations and, when one fails, dispatches the collected
//! compensations of the steps that succeeded in reverse order.

use crate::context::RequestContext;
use crate::dispatcher::Dispatcher;
use keel_types::{Operation, OperationOutcome};
use serde::{Deserialize, Serialize};
use tracing::{info, instrument, warn};

/// Result of a coordinated run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TransactionOutcome {
    /// Outcome of each step that was attempted, in order
    pub steps: Vec<OperationOutcome>,

    /// Index of the step that failed
    pub failed_step: Option<usize>,

    /// Whether compensations were dispatched
    pub rolled_back: bool,

    /// Messages of compensations that themselves failed
    pub rollback_failures: Vec<String>,
}

impl TransactionOutcome {
    pub fn is_success(&self) -> bool {
        self.failed_step.is_none()
    }

    /// Failure message of the step that failed
    pub fn failure_message(&self) -> Option<&str> {
        self.failed_step
            .and_then(|i| self.steps.get(i))
            .and_then(OperationOutcome::failure_message)
    }
}

/// Runs operation sequences all-or-nothing
pub struct TransactionCoordinator<'a> {
    dispatcher: &'a Dispatcher,
    request: RequestContext,
}

impl<'a> TransactionCoordinator<'a> {
    pub fn new(dispatcher: &'a Dispatcher) -> Self {
        Self {
            dispatcher,
            request: RequestContext::default(),
        }
    }

    pub fn with_request(mut self, request: RequestContext) -> Self {
        self.request = request;
        self
    }

    #[instrument(skip(self, steps), fields(steps = steps.len()))]
    pub fn execute(&self, steps: &[Operation]) -> TransactionOutcome {
        let mut outcomes = Vec::with_capacity(steps.len());
        let mut undo: Vec<Operation> = Vec::new();

        for (index, step) in steps.iter().enumerate() {
            let outcome = self.dispatcher.dispatch_as(step, &self.request);
            if !outcome.is_success() {
                warn!(step = index, operation = %step, "Transaction step failed, rolling back");
                outcomes.push(outcome);
                let rollback_failures = self.roll_back(undo);
                return TransactionOutcome {
                    steps: outcomes,
                    failed_step: Some(index),
                    rolled_back: true,
                    rollback_failures,
                };
            }
            if let Some(compensation) = outcome.compensating_operation() {
                undo.push(compensation.clone());
            }
            outcomes.push(outcome);
        }

        info!("Transaction committed");
        TransactionOutcome {
            steps: outcomes,
            failed_step: None,
            rolled_back: false,
            rollback_failures: Vec::new(),
        }
    }

    fn roll_back(&self, undo: Vec<Operation>) -> Vec<String> {
        let mut failures = Vec::new();
        for compensation in undo.into_iter().rev() {
            let outcome = self.dispatcher.dispatch_as(&compensation, &self.request);
            if let Some(message) = outcome.failure_message() {
                warn!(operation = %compensation, error = %message, "Compensation failed");
                failures.push(format!("{}: {}", compensation, message));
            }
        }
        failures
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::handler::OperationFlags;
    use crate::handlers::{ResourceAddHandler, ResourceRemoveHandler};
    use crate::registry::OperationRegistry;
    use keel_types::{names, PathAddress};
    use std::sync::Arc;

    fn addr(s: &str) -> PathAddress {
        s.parse().unwrap()
    }

    fn dispatcher() -> Dispatcher {
        let registry = Arc::new(OperationRegistry::new());
        for pattern in ["/host=*", "/host=*/interface=*"] {
            registry
                .register(
                    addr(pattern),
                    names::ADD,
                    Arc::new(ResourceAddHandler::permissive()),
                    OperationFlags::creates(),
                )
                .unwrap();
            registry
                .register(
                    addr(pattern),
                    names::REMOVE,
                    Arc::new(ResourceRemoveHandler),
                    OperationFlags::mutating(),
                )
                .unwrap();
        }
        Dispatcher::builder().with_registry(registry).build().unwrap()
    }

    #[test]
    fn test_all_steps_commit() {
        let d = dispatcher();
        let outcome = TransactionCoordinator::new(&d).execute(&[
            Operation::add(addr("/host=a")),
            Operation::add(addr("/host=a/interface=public")),
        ]);
        assert!(outcome.is_success());
        assert_eq!(outcome.steps.len(), 2);
        assert!(d.resource(&addr("/host=a/interface=public")).is_some());
    }

    #[test]
    fn test_failure_rolls_back_in_reverse() {
        let d = dispatcher();
        d.dispatch(&Operation::add(addr("/host=b")));
        let before = d.model_snapshot();

        let outcome = TransactionCoordinator::new(&d).execute(&[
            Operation::add(addr("/host=a")),
            Operation::add(addr("/host=a/interface=public")),
            Operation::add(addr("/host=b")),
        ]);

        assert_eq!(outcome.failed_step, Some(2));
        assert!(outcome.rolled_back);
        assert!(outcome.rollback_failures.is_empty());
        assert_eq!(outcome.failure_message(), Some("Duplicate resource: /host=b"));
        // The interface must go before its host, otherwise the host remove is refused
        assert_eq!(d.model_snapshot(), before);
    }
}
