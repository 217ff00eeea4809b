//! Transition engine: checks a requested state change against the workflow
//! tables and the actor's role, then records it.
//!
//! The engine never performs the work behind a transition (payments, customs
//! filings, documents). Callers do that first and then ask the engine to
//! record the outcome.
use std::sync::Arc;

use super::error::{ValidationError, WorkflowError};
use super::roles::{self, Role};
use super::shipment::{HistoryEntry, NewMessage, Shipment};
use super::store::ShipmentStore;
use super::workflow::StepDefinition;

#[derive(Debug, Clone)]
pub struct TransitionRequest {
    pub shipment_id: String,
    pub target: String,
    pub actor: String,
    pub role: Role,
    pub action: String,
    pub message: Option<NewMessage>,
    /// Settles the shipment value in the same write, e.g. when a quote is sent.
    pub value: Option<String>,
}

impl TransitionRequest {
    pub fn new(
        shipment_id: impl Into<String>,
        target: impl Into<String>,
        actor: impl Into<String>,
        role: Role,
        action: impl Into<String>,
    ) -> Self {
        Self {
            shipment_id: shipment_id.into(),
            target: target.into(),
            actor: actor.into(),
            role,
            action: action.into(),
            message: None,
            value: None,
        }
    }
    pub fn with_message(mut self, message: NewMessage) -> Self {
        self.message = Some(message);
        self
    }
    pub fn settle_value(mut self, value: impl Into<String>) -> Self {
        self.value = Some(value.into());
        self
    }

    fn validate(&self) -> Result<(), ValidationError> {
        if self.actor.trim().is_empty() {
            return Err(ValidationError::MissingActor);
        }
        if self.action.trim().is_empty() {
            return Err(ValidationError::MissingAction);
        }
        if self.value.as_ref().is_some_and(|value| value.trim().is_empty()) {
            return Err(ValidationError::MissingValue);
        }
        if let Some(message) = &self.message {
            message.validate()?;
        }
        Ok(())
    }
}

pub struct TransitionEngine {
    store: Arc<ShipmentStore>,
}

impl TransitionEngine {
    pub fn new(store: Arc<ShipmentStore>) -> Self {
        Self { store }
    }

    /// Check whether `role` may move `shipment` into `target` right now.
    ///
    /// Checks run in a fixed order: terminal state, target in the track's
    /// table, target differs from the current state, role authorization.
    /// Request fields are validated only once all of these pass.
    pub fn check(
        &self,
        shipment: &Shipment,
        target: &str,
        role: Role,
    ) -> Result<&'static StepDefinition, WorkflowError> {
        let registry = self.store.registry();
        let table = registry.table(shipment.track());

        if table.is_terminal(&shipment.status) {
            return Err(WorkflowError::TerminalStateViolation {
                shipment_id: shipment.id.clone(),
                status: shipment.status.clone(),
            });
        }

        let invalid = |reason: String| WorkflowError::InvalidTargetState {
            shipment_id: shipment.id.clone(),
            target: target.to_string(),
            reason,
        };
        let step = match table.step(target) {
            Some(step) => step,
            None => {
                let reason = match registry.track_of(target) {
                    Some(other) => format!("it belongs to the {other} track"),
                    None => "no such state".to_string(),
                };
                return Err(invalid(reason));
            }
        };
        if step.id == shipment.status {
            return Err(invalid("shipment is already in this state".to_string()));
        }

        if !roles::is_authorized(role, step, shipment.cha_mode) {
            return Err(WorkflowError::Unauthorized {
                shipment_id: shipment.id.clone(),
                target: target.to_string(),
                role,
            });
        }
        Ok(step)
    }

    /// Apply a transition atomically: status, history entry, optional message
    /// and optional value land together or not at all.
    pub fn apply(&self, request: TransitionRequest) -> Result<Shipment, WorkflowError> {
        let result = self.apply_inner(&request);
        match &result {
            Ok(shipment) => tracing::info!(
                shipment_id = %shipment.id,
                status = %shipment.status,
                actor = %request.actor,
                role = %request.role,
                "{}",
                request.action
            ),
            Err(e) => tracing::warn!(
                shipment_id = %request.shipment_id,
                target = %request.target,
                role = %request.role,
                error = %e,
                "transition rejected"
            ),
        }
        result
    }

    fn apply_inner(&self, request: &TransitionRequest) -> Result<Shipment, WorkflowError> {
        self.store.update(&request.shipment_id, |shipment| {
            let step = self.check(shipment, &request.target, request.role)?;
            request.validate()?;

            shipment.status = step.id.to_string();
            shipment.history.push(HistoryEntry::new(
                step.id,
                request.actor.as_str(),
                request.role,
                request.action.as_str(),
            ));
            if let Some(message) = &request.message {
                shipment.messages.push(message.clone().finalise()?);
            }
            if let Some(value) = &request.value {
                shipment.value = value.clone();
            }
            Ok(())
        })
    }

    /// Correspondence without a state change. Allowed in every state,
    /// terminal ones included.
    pub fn append_message(&self, shipment_id: &str, message: NewMessage) -> Result<Shipment, WorkflowError> {
        let shipment = self.store.update(shipment_id, |shipment| {
            shipment.messages.push(message.clone().finalise()?);
            Ok(())
        })?;
        if let Some(message) = shipment.messages.last() {
            tracing::info!(shipment_id, message_id = %message.id, sender = ?message.sender, "message appended");
        }
        Ok(shipment)
    }

    /// Steps `role` may move `shipment` into, recommended steps first.
    pub fn available_transitions(&self, shipment: &Shipment, role: Role) -> Vec<&'static StepDefinition> {
        let table = self.store.registry().table(shipment.track());
        let Some(current) = table.step(&shipment.status) else {
            return vec![];
        };

        let recommended = current.next.iter().filter_map(|id| table.step(id));
        let others = table
            .steps()
            .iter()
            .filter(|step| !current.next.contains(&step.id));

        recommended
            .chain(others)
            .filter(|step| self.check(shipment, step.id, role).is_ok())
            .collect()
    }
}
