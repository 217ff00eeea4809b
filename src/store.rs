//! Sled-backed shipment store.
//!
//! Every write runs inside a sled transaction, so concurrent writers to the
//! same shipment are serialized by sled's conflict detection and a failed
//! write leaves nothing behind.
use std::sync::Arc;

use sled::Transactional;
use sled::transaction::{
    ConflictableTransactionError, ConflictableTransactionResult, TransactionError, TransactionalTree,
};

use super::error::WorkflowError;
use super::query::ShipmentFilter;
use super::roles;
use super::shipment::{NewShipment, Shipment};
use super::utils;
use super::workflow::{WorkflowRegistry, WorkflowTable};

const SHIPMENTS_TREE: &str = "shipments";
const CREATION_INDEX_TREE: &str = "creation_index";
const COUNTERS_TREE: &str = "counters";
const SEQUENCE_KEY: &[u8] = b"sequence";

pub struct ShipmentStore {
    instance: Arc<sled::Db>,
    registry: Arc<WorkflowRegistry>,
    shipments: sled::Tree,      // id -> cbor shipment
    creation_index: sled::Tree, // big-endian sequence -> id
    counters: sled::Tree,       // track prefix / sequence -> big-endian u64
}

fn abort(e: WorkflowError) -> ConflictableTransactionError<WorkflowError> {
    ConflictableTransactionError::Abort(e)
}

fn from_transaction(e: TransactionError<WorkflowError>) -> WorkflowError {
    match e {
        TransactionError::Abort(e) => e,
        TransactionError::Storage(e) => WorkflowError::Storage(e),
    }
}

fn next_counter(counters: &TransactionalTree, key: &[u8]) -> ConflictableTransactionResult<u64, WorkflowError> {
    let current = match counters.get(key)? {
        Some(raw) => <[u8; 8]>::try_from(raw.as_ref())
            .map(u64::from_be_bytes)
            .map_err(|_| abort(WorkflowError::Encoding(format!("corrupt counter {:?}", String::from_utf8_lossy(key)))))?,
        None => 0,
    };
    let next = current + 1;
    counters.insert(key, next.to_be_bytes().to_vec())?;
    Ok(next)
}

/// Mutations may only append to the logs, settle the value, and move the
/// status together with exactly one matching history entry.
fn ensure_append_only(table: &WorkflowTable, before: &Shipment, after: &Shipment) -> Result<(), WorkflowError> {
    let violation = |reason: String| WorkflowError::IntegrityViolation {
        shipment_id: before.id.clone(),
        reason,
    };

    if before.id != after.id {
        return Err(violation("id changed".into()));
    }
    if before.counterpart != after.counterpart {
        return Err(violation("counterpart or track changed".into()));
    }
    if before.enquiry != after.enquiry {
        return Err(violation("enquiry changed".into()));
    }
    if before.goods != after.goods {
        return Err(violation("goods changed".into()));
    }
    if before.cha_mode != after.cha_mode {
        return Err(violation("CHA mode changed".into()));
    }
    if !after.history.starts_with(&before.history) {
        return Err(violation("history entries were edited or removed".into()));
    }
    if !after.messages.starts_with(&before.messages) {
        return Err(violation("messages were edited or removed".into()));
    }
    if !table.contains(&after.status) {
        return Err(violation(format!("status {} is not a {} state", after.status, after.track())));
    }

    let appended = &after.history[before.history.len()..];
    if before.status == after.status {
        if !appended.is_empty() {
            return Err(violation("history grew without a status change".into()));
        }
        return Ok(());
    }
    if table.is_terminal(&before.status) {
        return Err(violation(format!("status left terminal state {}", before.status)));
    }
    match appended {
        [entry] if entry.state == after.status => Ok(()),
        _ => Err(violation(format!(
            "status moved to {} without exactly one matching history entry",
            after.status
        ))),
    }
}

impl ShipmentStore {
    pub fn new(instance: Arc<sled::Db>, registry: Arc<WorkflowRegistry>) -> Result<Self, sled::Error> {
        let shipments = instance.open_tree(SHIPMENTS_TREE)?;
        let creation_index = instance.open_tree(CREATION_INDEX_TREE)?;
        let counters = instance.open_tree(COUNTERS_TREE)?;
        Ok(Self {
            instance,
            registry,
            shipments,
            creation_index,
            counters,
        })
    }

    pub fn registry(&self) -> &WorkflowRegistry {
        &self.registry
    }

    /// Open a shipment in its track's initial state. The id is allocated
    /// inside the write transaction, so concurrent creators never collide.
    pub fn create(&self, new: NewShipment) -> Result<Shipment, WorkflowError> {
        new.validate()?;
        let track = new.track();
        let table = self.registry.table(track);
        let initial = table.initial();

        if let Some(step) = table.step(initial)
            && !roles::is_authorized(new.role(), step, None)
        {
            return Err(WorkflowError::Unauthorized {
                shipment_id: format!("new {track} shipment"),
                target: initial.to_string(),
                role: new.role(),
            });
        }

        let draft = new.finalise(initial)?;

        let shipment = (&self.shipments, &self.creation_index, &self.counters)
            .transaction(|(shipments, creation_index, counters)| -> ConflictableTransactionResult<Shipment, WorkflowError> {
                let sequence = next_counter(counters, SEQUENCE_KEY)?;
                let number = next_counter(counters, draft.track().id_prefix().as_bytes())?;
                let shipment = draft.clone().into_shipment(utils::shipment_id(track, number));

                let encoded = minicbor::to_vec(&shipment).map_err(|e| abort(e.into()))?;
                shipments.insert(shipment.id.as_bytes(), encoded)?;
                creation_index.insert(sequence.to_be_bytes().to_vec(), shipment.id.as_bytes())?;
                Ok(shipment)
            })
            .map_err(from_transaction)?;

        tracing::info!(shipment_id = %shipment.id, track = %track, status = %shipment.status, "shipment created");
        Ok(shipment)
    }

    pub fn get(&self, id: &str) -> Result<Shipment, WorkflowError> {
        tracing::debug!(shipment_id = id, "loading shipment");
        let raw = self
            .shipments
            .get(id.as_bytes())?
            .ok_or_else(|| WorkflowError::ShipmentNotFound(id.to_string()))?;
        Ok(minicbor::decode(&raw)?)
    }

    /// Shipments matching `filter`, oldest first.
    pub fn list(&self, filter: &ShipmentFilter) -> Result<Vec<Shipment>, WorkflowError> {
        let mut shipments = vec![];
        for item in self.creation_index.iter() {
            let (_, id) = item?;
            let Some(raw) = self.shipments.get(&id)? else {
                continue;
            };
            let shipment: Shipment = minicbor::decode(&raw)?;
            if filter.matches(&shipment) {
                shipments.push(shipment);
            }
        }
        Ok(shipments)
    }

    pub fn len(&self) -> usize {
        self.shipments.len()
    }

    pub fn is_empty(&self) -> bool {
        self.shipments.is_empty()
    }

    /// Read, mutate and write back one shipment as a single transaction.
    ///
    /// `mutate` may run more than once if another writer touches the same
    /// shipment concurrently; it must not have side effects outside the
    /// shipment. Returning an error rolls the whole write back.
    pub(crate) fn update<F>(&self, id: &str, mutate: F) -> Result<Shipment, WorkflowError>
    where
        F: Fn(&mut Shipment) -> Result<(), WorkflowError>,
    {
        self.shipments
            .transaction(|tx| -> ConflictableTransactionResult<Shipment, WorkflowError> {
                let raw = tx
                    .get(id.as_bytes())?
                    .ok_or_else(|| abort(WorkflowError::ShipmentNotFound(id.to_string())))?;
                let before: Shipment = minicbor::decode(&raw).map_err(|e| abort(e.into()))?;

                let mut after = before.clone();
                mutate(&mut after).map_err(abort)?;
                ensure_append_only(self.registry.table(before.track()), &before, &after).map_err(abort)?;

                let encoded = minicbor::to_vec(&after).map_err(|e| abort(e.into()))?;
                tx.insert(id.as_bytes(), encoded)?;
                Ok(after)
            })
            .map_err(from_transaction)
    }

    pub fn flush(&self) -> Result<usize, WorkflowError> {
        Ok(self.instance.flush()?)
    }
}
