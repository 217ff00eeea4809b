//! Service layer API for shipment workflow operations
use std::collections::BTreeMap;
use std::sync::Arc;

use super::config::StoreConfig;
use super::engine::{TransitionEngine, TransitionRequest};
use super::error::{ConfigError, WorkflowError};
use super::query::{self, ShipmentFilter};
use super::roles::Role;
use super::shipment::{NewMessage, NewShipment, Shipment};
use super::store::ShipmentStore;
use super::workflow::{StepDefinition, WorkflowRegistry};

/// Entry point for callers. Holds no global state; every service owns the
/// database handle it was built with.
pub struct ShipmentService {
    store: Arc<ShipmentStore>,
    engine: TransitionEngine,
}

impl ShipmentService {
    /// Build a service over an open database with the standard workflows.
    /// Fails if the workflow tables do not validate.
    pub fn new(instance: Arc<sled::Db>) -> Result<Self, ConfigError> {
        Self::with_registry(instance, WorkflowRegistry::standard()?)
    }

    pub fn with_registry(instance: Arc<sled::Db>, registry: WorkflowRegistry) -> Result<Self, ConfigError> {
        let store = Arc::new(ShipmentStore::new(instance, Arc::new(registry))?);
        let engine = TransitionEngine::new(store.clone());
        Ok(Self { store, engine })
    }

    pub fn open(config: &StoreConfig) -> Result<Self, ConfigError> {
        Self::new(Arc::new(config.open()?))
    }

    pub fn registry(&self) -> &WorkflowRegistry {
        self.store.registry()
    }

    /// Open a new shipment. The track follows from the counterpart.
    pub fn create_shipment(&self, new: NewShipment) -> Result<Shipment, WorkflowError> {
        self.store.create(new)
    }

    pub fn get_shipment(&self, id: &str) -> Result<Shipment, WorkflowError> {
        self.store.get(id)
    }

    pub fn list_shipments(&self, filter: &ShipmentFilter) -> Result<Vec<Shipment>, WorkflowError> {
        self.store.list(filter)
    }

    pub fn apply_transition(
        &self,
        id: &str,
        target: &str,
        actor: &str,
        role: Role,
        action: &str,
        message: Option<NewMessage>,
    ) -> Result<Shipment, WorkflowError> {
        let mut request = TransitionRequest::new(id, target, actor, role, action);
        request.message = message;
        self.engine.apply(request)
    }

    pub fn apply(&self, request: TransitionRequest) -> Result<Shipment, WorkflowError> {
        self.engine.apply(request)
    }

    pub fn append_message(&self, id: &str, message: NewMessage) -> Result<Shipment, WorkflowError> {
        self.engine.append_message(id, message)
    }

    pub fn available_transitions(&self, id: &str, role: Role) -> Result<Vec<&'static StepDefinition>, WorkflowError> {
        let shipment = self.store.get(id)?;
        Ok(self.engine.available_transitions(&shipment, role))
    }

    pub fn status_summary(&self, filter: &ShipmentFilter) -> Result<BTreeMap<String, usize>, WorkflowError> {
        let shipments = self.store.list(filter)?;
        Ok(query::status_summary(&shipments))
    }

    pub fn flush(&self) -> Result<usize, WorkflowError> {
        self.store.flush()
    }
}
