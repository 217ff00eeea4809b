//! Dual-track export/import shipment workflow engine.
//!
//! Shipments move through the states of their track's [`workflow`] table.
//! Every move is authorized by [`roles::is_authorized`], applied atomically by
//! the [`engine`] and recorded in an append-only history kept by the [`store`].

pub mod config;
pub mod engine;
pub mod error;
pub mod query;
pub mod roles;
pub mod service;
pub mod shipment;
pub mod store;
pub mod utils;
pub mod workflow;
