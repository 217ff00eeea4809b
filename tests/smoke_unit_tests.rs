//! Smoke Screen Unit tests for shipment workflow components
//!
//! These tests span the codebase, testing behavior of each component in
//! isolation from the end-to-end scenarios. They mostly cover the happy path
//! plus the table-driven authorization rules.

use std::sync::Arc;

use chrono::{Datelike, Timelike, Utc};
use eximley_workflow::{
    config::StoreConfig,
    error::{ValidationError, WorkflowError},
    query::{ShipmentFilter, status_summary},
    roles::{Role, is_authorized},
    service::ShipmentService,
    shipment::{Counterpart, NewMessage, NewShipment, Party, TimeStamp},
    store::ShipmentStore,
    utils::new_uuid_to_bech32,
    workflow::{ChaMode, EXPORT_WORKFLOW, IMPORT_WORKFLOW, Track, WorkflowRegistry},
};

fn temporary_service() -> ShipmentService {
    ShipmentService::open(&StoreConfig::temporary()).unwrap()
}

fn export_enquiry() -> NewShipment {
    NewShipment::new(Counterpart::export("Acme GmbH", "Hamburg"), "Basmati rice", "Klaus", Role::Buyer)
}

// UTILS MODULE TESTS
#[cfg(test)]
mod utils_tests {
    use super::*;

    /// Test that new_uuid_to_bech32 generates valid bech32-encoded strings
    /// with the correct human-readable prefix
    #[test]
    fn generates_valid_bech32_with_hrp() {
        let encoded = new_uuid_to_bech32("msg").unwrap();
        assert!(encoded.starts_with("msg1"));
        assert!(encoded.len() > 10);
    }

    /// Test that the function rejects an empty prefix
    #[test]
    fn handles_empty_hrp() {
        assert!(new_uuid_to_bech32("").is_err());
    }

    /// Test that multiple calls generate unique identifiers
    #[test]
    fn generates_unique_ids() {
        let id1 = new_uuid_to_bech32("att").unwrap();
        let id2 = new_uuid_to_bech32("att").unwrap();
        assert_ne!(id1, id2);
    }
}

// SHIPMENT MODULE TESTS
#[cfg(test)]
mod shipment_tests {
    use super::*;

    /// Test that TimeStamp::new() creates a timestamp close to current time
    #[test]
    fn timestamp_new_creates_current_time() {
        let ts = TimeStamp::new();
        let diff = (Utc::now() - ts.to_datetime_utc()).num_seconds().abs();
        assert!(diff < 1);
    }

    /// Test that TimeStamp can be created with specific date/time values
    #[test]
    fn timestamp_new_with_creates_specific_time() {
        let dt = TimeStamp::new_with(2024, 6, 15, 10, 30, 0).unwrap().to_datetime_utc();

        assert_eq!(dt.year(), 2024);
        assert_eq!(dt.month(), 6);
        assert_eq!(dt.day(), 15);
        assert_eq!(dt.hour(), 10);
        assert_eq!(dt.minute(), 30);
        assert!(TimeStamp::new_with(2024, 2, 30, 0, 0, 0).is_none());
    }

    /// Test that the counterpart variant fixes the track
    #[test]
    fn counterpart_decides_track() {
        let export = Counterpart::export("Acme GmbH", "Hamburg");
        let import = Counterpart::import("Shenzhen Parts", "Shenzhen");

        assert_eq!(export.track(), Track::Export);
        assert_eq!(import.track(), Track::Import);
        assert_eq!(import.name(), "Shenzhen Parts");
        assert_eq!(import.location(), "Shenzhen");
    }

    /// Test that creation input is validated field by field
    #[test]
    fn new_shipment_validation() {
        assert!(export_enquiry().validate().is_ok());
        assert_eq!(
            NewShipment::new(Counterpart::export("", "Hamburg"), "Rice", "Klaus", Role::Buyer).validate(),
            Err(ValidationError::MissingCounterpart)
        );
        assert_eq!(
            NewShipment::new(Counterpart::export("Acme", ""), "Rice", "Klaus", Role::Buyer).validate(),
            Err(ValidationError::MissingLocation)
        );
        assert_eq!(export_enquiry().set_value("").validate(), Err(ValidationError::MissingValue));
        assert_eq!(
            export_enquiry().set_message(NewMessage::new(Party::Counterparty, "")).validate(),
            Err(ValidationError::EmptyMessage)
        );
    }
}

// ROLES MODULE TESTS
#[cfg(test)]
mod roles_tests {
    use super::*;

    /// Test that the super role passes every step of both tracks
    #[test]
    fn super_role_is_authorized_everywhere() {
        for step in EXPORT_WORKFLOW.steps().iter().chain(IMPORT_WORKFLOW.steps()) {
            for mode in [None, Some(ChaMode::Embedded), Some(ChaMode::Manual)] {
                assert!(is_authorized(Role::CompanyAdmin, step, mode), "{}", step.id);
            }
        }
    }

    /// Test that without a CHA mode the table's roles are authoritative
    #[test]
    fn table_roles_decide_without_cha_mode() {
        for step in EXPORT_WORKFLOW.steps().iter().chain(IMPORT_WORKFLOW.steps()) {
            for role in Role::ALL {
                let expected = role.is_super() || step.allowed_roles.contains(&role);
                assert_eq!(is_authorized(role, step, None), expected, "{} / {role}", step.id);
            }
        }
    }

    /// Test that the CHA mode only narrows customs filing steps
    #[test]
    fn cha_mode_only_affects_customs_steps() {
        let quote = EXPORT_WORKFLOW.step("QUOTE_SENT").unwrap();
        assert!(is_authorized(Role::CompanyExportAnalyst, quote, Some(ChaMode::Embedded)));

        let boe = IMPORT_WORKFLOW.step("BOE_FILED").unwrap();
        assert!(is_authorized(Role::Cha, boe, Some(ChaMode::Embedded)));
        assert!(!is_authorized(Role::CompanyImportManager, boe, Some(ChaMode::Embedded)));
        assert!(!is_authorized(Role::Cha, boe, Some(ChaMode::Manual)));
        assert!(is_authorized(Role::CompanyImportManager, boe, Some(ChaMode::Manual)));
        // manual mode never widens a step
        assert!(!is_authorized(Role::Buyer, boe, Some(ChaMode::Manual)));
    }
}

// WORKFLOW MODULE TESTS
#[cfg(test)]
mod workflow_tests {
    use super::*;

    /// Test that the two tracks start where the business expects
    #[test]
    fn initial_states() {
        let registry = WorkflowRegistry::standard().unwrap();
        assert_eq!(registry.table(Track::Export).initial(), "ENQUIRY_RECEIVED");
        assert_eq!(registry.table(Track::Import).initial(), "IMPORT_ENQUIRY_SENT");
    }

    /// Test terminal states of each track
    #[test]
    fn terminal_states() {
        assert!(EXPORT_WORKFLOW.is_terminal("CLOSED"));
        assert!(EXPORT_WORKFLOW.is_terminal("REJECTED"));
        assert!(IMPORT_WORKFLOW.is_terminal("IMPORT_CLOSED"));
        assert!(IMPORT_WORKFLOW.is_terminal("IMPORT_CANCELLED"));
        assert!(!EXPORT_WORKFLOW.is_terminal("SHIPPED"));
        assert!(!EXPORT_WORKFLOW.is_terminal("IMPORT_CLOSED"));
    }

    /// Test that every step carries display text for the presentation layer
    #[test]
    fn steps_have_labels() {
        for step in EXPORT_WORKFLOW.steps().iter().chain(IMPORT_WORKFLOW.steps()) {
            assert!(!step.label.is_empty(), "{}", step.id);
            assert!(!step.description.is_empty(), "{}", step.id);
        }
    }
}

// STORE MODULE TESTS
#[cfg(test)]
mod store_tests {
    use super::*;

    fn store() -> ShipmentStore {
        let db = StoreConfig::temporary().open().unwrap();
        ShipmentStore::new(Arc::new(db), Arc::new(WorkflowRegistry::standard().unwrap())).unwrap()
    }

    /// Test that ids are allocated per track
    #[test]
    fn ids_are_sequential_per_track() {
        let store = store();
        let a = store.create(export_enquiry()).unwrap();
        let b = store
            .create(NewShipment::new(
                Counterpart::import("Shenzhen Parts", "Shenzhen"),
                "Motors",
                "Priya",
                Role::CompanyImportManager,
            ))
            .unwrap();
        let c = store.create(export_enquiry()).unwrap();

        assert_eq!((a.id.as_str(), b.id.as_str(), c.id.as_str()), ("EXP-001", "IMP-001", "EXP-002"));
        assert_eq!(store.len(), 3);
    }

    /// Test that creation records the opening history entry
    #[test]
    fn create_writes_singleton_history() {
        let store = store();
        let shipment = store.create(export_enquiry().set_action("Enquiry via website")).unwrap();

        assert_eq!(shipment.history.len(), 1);
        assert_eq!(shipment.history[0].state, "ENQUIRY_RECEIVED");
        assert_eq!(shipment.history[0].actor, "Klaus");
        assert_eq!(shipment.history[0].role, Role::Buyer);
        assert_eq!(shipment.history[0].action, "Enquiry via website");
    }

    /// Test that a role not allowed on the initial state can't open a shipment
    #[test]
    fn create_requires_initial_state_permission() {
        let store = store();
        let err = store
            .create(NewShipment::new(Counterpart::export("Acme", "Hamburg"), "Rice", "Desk", Role::Cha))
            .unwrap_err();

        assert!(matches!(err, WorkflowError::Unauthorized { .. }));
        assert!(store.is_empty());
    }
}

// QUERY / ENGINE TESTS
#[cfg(test)]
mod engine_tests {
    use super::*;

    /// Test that suggested next steps come first
    #[test]
    fn available_transitions_lead_with_recommended_steps() {
        let service = temporary_service();
        let id = service.create_shipment(export_enquiry()).unwrap().id;

        let analyst: Vec<_> = service
            .available_transitions(&id, Role::CompanyExportAnalyst)
            .unwrap()
            .into_iter()
            .map(|step| step.id)
            .collect();
        assert_eq!(analyst.first(), Some(&"QUOTE_SENT"));
        assert!(analyst.contains(&"REJECTED"));
        assert!(!analyst.contains(&"ENQUIRY_RECEIVED"));
        assert!(!analyst.contains(&"ADVANCE_RECEIVED"));

        let cha = service.available_transitions(&id, Role::Cha).unwrap();
        assert!(cha.iter().all(|step| step.customs_filing));
    }

    /// Test that blank actors and actions never reach the history
    #[test]
    fn blank_actor_is_a_validation_error() {
        let service = temporary_service();
        let id = service.create_shipment(export_enquiry()).unwrap().id;

        let err = service
            .apply_transition(&id, "QUOTE_SENT", " ", Role::CompanyExportAnalyst, "Quote", None)
            .unwrap_err();
        assert!(matches!(err, WorkflowError::Validation(ValidationError::MissingActor)));

        let err = service
            .apply_transition(&id, "QUOTE_SENT", "Anita", Role::CompanyExportAnalyst, "", None)
            .unwrap_err();
        assert!(matches!(err, WorkflowError::Validation(ValidationError::MissingAction)));
        assert_eq!(service.get_shipment(&id).unwrap().history.len(), 1);
    }

    /// Test that an unknown shipment is reported before the request is
    /// validated
    #[test]
    fn unknown_shipment_wins_over_blank_request() {
        let service = temporary_service();

        let err = service
            .apply_transition("EXP-404", "QUOTE_SENT", " ", Role::CompanyExportAnalyst, "", None)
            .unwrap_err();
        assert!(matches!(err, WorkflowError::ShipmentNotFound(_)), "{err}");

        let err = service
            .append_message("EXP-404", NewMessage::new(Party::Us, ""))
            .unwrap_err();
        assert!(matches!(err, WorkflowError::ShipmentNotFound(_)), "{err}");
    }

    /// Test that state errors win over a blank request on a known shipment
    #[test]
    fn unauthorized_wins_over_blank_request() {
        let service = temporary_service();
        let id = service.create_shipment(export_enquiry()).unwrap().id;

        let err = service
            .apply_transition(&id, "CLOSED", "", Role::Cha, "", None)
            .unwrap_err();
        assert!(matches!(err, WorkflowError::Unauthorized { .. }), "{err}");
    }

    /// Test summary counting
    #[test]
    fn status_summary_counts() {
        let service = temporary_service();
        for _ in 0..3 {
            service.create_shipment(export_enquiry()).unwrap();
        }
        let all = service.list_shipments(&ShipmentFilter::new()).unwrap();
        let summary = status_summary(&all);
        assert_eq!(summary.len(), 1);
        assert_eq!(summary["ENQUIRY_RECEIVED"], 3);
    }
}
