//! Workflow definition tables for the export and import tracks.
//!
//! Each track owns a disjoint set of state ids. The tables are static and are
//! checked once, when a [`WorkflowRegistry`] is built; a broken table is a
//! fatal [`ConfigError`] rather than something a caller sees at runtime.
use std::collections::HashSet;

use super::error::ConfigError;
use super::roles::Role;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Track {
    Export,
    Import,
}

impl Track {
    pub fn id_prefix(&self) -> &'static str {
        match self {
            Track::Export => "EXP",
            Track::Import => "IMP",
        }
    }
    pub fn as_str(&self) -> &'static str {
        match self {
            Track::Export => "EXPORT",
            Track::Import => "IMPORT",
        }
    }
}

impl std::fmt::Display for Track {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Who files customs documents for a shipment.
#[derive(minicbor::Encode, minicbor::Decode, Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChaMode {
    // the customs agent works inside the platform
    #[n(0)]
    Embedded,
    // the company files on its own
    #[n(1)]
    Manual,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StepDefinition {
    pub id: &'static str,
    pub label: &'static str,
    pub description: &'static str,
    pub allowed_roles: &'static [Role],
    /// Recommended follow-up steps. Advisory only, the engine accepts any
    /// authorized target in the same track.
    pub next: &'static [&'static str],
    pub terminal: bool,
    pub customs_filing: bool,
}

impl StepDefinition {
    pub const fn new(
        id: &'static str,
        label: &'static str,
        description: &'static str,
        allowed_roles: &'static [Role],
        next: &'static [&'static str],
    ) -> Self {
        Self {
            id,
            label,
            description,
            allowed_roles,
            next,
            terminal: false,
            customs_filing: false,
        }
    }
    pub const fn terminal(self) -> Self {
        Self {
            terminal: true,
            ..self
        }
    }
    pub const fn customs_filing(self) -> Self {
        Self {
            customs_filing: true,
            ..self
        }
    }
}

#[derive(Debug, Clone)]
pub struct WorkflowTable {
    track: Track,
    initial: &'static str,
    steps: &'static [StepDefinition],
}

impl WorkflowTable {
    pub const fn new(track: Track, initial: &'static str, steps: &'static [StepDefinition]) -> Self {
        Self {
            track,
            initial,
            steps,
        }
    }
    pub fn track(&self) -> Track {
        self.track
    }
    pub fn initial(&self) -> &'static str {
        self.initial
    }
    pub fn steps(&self) -> &'static [StepDefinition] {
        self.steps
    }
    pub fn step(&self, id: &str) -> Option<&'static StepDefinition> {
        self.steps.iter().find(|step| step.id == id)
    }
    pub fn contains(&self, id: &str) -> bool {
        self.step(id).is_some()
    }
    pub fn is_terminal(&self, id: &str) -> bool {
        self.step(id).is_some_and(|step| step.terminal)
    }

    fn fail(&self, reason: String) -> ConfigError {
        ConfigError::WorkflowTable {
            track: self.track.to_string(),
            reason,
        }
    }

    fn validate(&self) -> Result<(), ConfigError> {
        let mut seen = HashSet::new();
        for step in self.steps {
            if !seen.insert(step.id) {
                return Err(self.fail(format!("state {} is defined twice", step.id)));
            }
        }

        match self.step(self.initial) {
            None => return Err(self.fail(format!("initial state {} is not defined", self.initial))),
            Some(step) if step.terminal => {
                return Err(self.fail(format!("initial state {} is terminal", self.initial)));
            }
            Some(_) => {}
        }

        for step in self.steps {
            if step.allowed_roles.is_empty() {
                return Err(self.fail(format!("state {} has no allowed roles", step.id)));
            }
            if step.terminal && !step.next.is_empty() {
                return Err(self.fail(format!("terminal state {} lists next steps", step.id)));
            }
            if !step.terminal && step.next.is_empty() {
                return Err(self.fail(format!("state {} has no way forward", step.id)));
            }
            if let Some(missing) = step.next.iter().find(|id| !seen.contains(*id)) {
                return Err(self.fail(format!("state {} points at unknown state {missing}", step.id)));
            }
            if step.customs_filing {
                let has_cha = step.allowed_roles.contains(&Role::Cha);
                let has_company = step.allowed_roles.iter().any(|role| *role != Role::Cha);
                if !(has_cha && has_company) {
                    return Err(self.fail(format!(
                        "customs state {} must allow both CHA and a company role",
                        step.id
                    )));
                }
            }
        }
        Ok(())
    }
}

/// Both track tables, validated together.
#[derive(Debug, Clone)]
pub struct WorkflowRegistry {
    export: WorkflowTable,
    import: WorkflowTable,
}

impl WorkflowRegistry {
    /// The standard Eximley export and import workflows.
    pub fn standard() -> Result<Self, ConfigError> {
        Self::new(EXPORT_WORKFLOW, IMPORT_WORKFLOW)
    }

    pub fn new(export: WorkflowTable, import: WorkflowTable) -> Result<Self, ConfigError> {
        if export.track != Track::Export || import.track != Track::Import {
            return Err(ConfigError::WorkflowTable {
                track: format!("{}/{}", export.track, import.track),
                reason: "tables are registered under the wrong track".into(),
            });
        }
        export.validate()?;
        import.validate()?;

        // a state id must resolve to exactly one track
        if let Some(shared) = export.steps.iter().find(|step| import.contains(step.id)) {
            return Err(ConfigError::WorkflowTable {
                track: "EXPORT/IMPORT".into(),
                reason: format!("state {} is defined in both tracks", shared.id),
            });
        }

        tracing::debug!(
            export_states = export.steps.len(),
            import_states = import.steps.len(),
            "workflow tables validated"
        );
        Ok(Self { export, import })
    }

    pub fn table(&self, track: Track) -> &WorkflowTable {
        match track {
            Track::Export => &self.export,
            Track::Import => &self.import,
        }
    }

    pub fn track_of(&self, state_id: &str) -> Option<Track> {
        [&self.export, &self.import]
            .into_iter()
            .find(|table| table.contains(state_id))
            .map(|table| table.track)
    }
}

use Role::*;

const ANALYSTS: &[Role] = &[CompanyExportAnalyst, CompanyExportManager];

static EXPORT_STEPS: [StepDefinition; 13] = [
    StepDefinition::new(
        "ENQUIRY_RECEIVED",
        "Enquiry Received",
        "Buyer submitted an enquiry for goods",
        &[Buyer, System],
        &["QUOTE_SENT", "REJECTED"],
    ),
    StepDefinition::new(
        "QUOTE_SENT",
        "Quotation Sent",
        "Quotation shared with the buyer",
        ANALYSTS,
        &["NEGOTIATION", "PO_RECEIVED", "REJECTED"],
    ),
    StepDefinition::new(
        "NEGOTIATION",
        "Under Negotiation",
        "Buyer and exporter are exchanging counter-offers",
        &[Buyer, CompanyExportAnalyst, CompanyExportManager],
        &["QUOTE_SENT", "PO_RECEIVED", "REJECTED"],
    ),
    StepDefinition::new(
        "PO_RECEIVED",
        "Purchase Order Received",
        "Buyer confirmed the order",
        &[Buyer, CompanyExportManager],
        &["PROFORMA_ISSUED", "REJECTED"],
    ),
    StepDefinition::new(
        "PROFORMA_ISSUED",
        "Proforma Invoice Issued",
        "Proforma invoice sent for advance payment",
        &[CompanyExportManager, Finance],
        &["ADVANCE_RECEIVED"],
    ),
    StepDefinition::new(
        "ADVANCE_RECEIVED",
        "Advance Payment Received",
        "Advance payment confirmed by finance",
        &[Finance],
        &["PRODUCTION"],
    ),
    StepDefinition::new(
        "PRODUCTION",
        "In Production",
        "Goods are being manufactured and packed",
        &[CompanyExportManager],
        &["SB_FILED"],
    ),
    StepDefinition::new(
        "SB_FILED",
        "Shipping Bill Filed",
        "Shipping bill filed with customs",
        &[Cha, CompanyExportManager],
        &["LEO_GRANTED"],
    )
    .customs_filing(),
    StepDefinition::new(
        "LEO_GRANTED",
        "Let Export Order Granted",
        "Customs cleared the goods for export",
        &[Cha, CompanyExportManager],
        &["SHIPPED"],
    )
    .customs_filing(),
    StepDefinition::new(
        "SHIPPED",
        "Shipped",
        "Goods loaded and bill of lading issued",
        &[CompanyExportManager],
        &["PAYMENT_RECEIVED"],
    ),
    StepDefinition::new(
        "PAYMENT_RECEIVED",
        "Balance Payment Received",
        "Buyer settled the balance",
        &[Finance],
        &["CLOSED"],
    ),
    StepDefinition::new(
        "CLOSED",
        "Closed",
        "Shipment completed and archived",
        &[CompanyExportManager, Finance],
        &[],
    )
    .terminal(),
    StepDefinition::new(
        "REJECTED",
        "Rejected",
        "Enquiry or order declined",
        &[Buyer, CompanyExportAnalyst, CompanyExportManager],
        &[],
    )
    .terminal(),
];

static IMPORT_STEPS: [StepDefinition; 10] = [
    StepDefinition::new(
        "IMPORT_ENQUIRY_SENT",
        "Sourcing Enquiry Sent",
        "Company asked a supplier for a quotation",
        &[CompanyImportManager],
        &["SUPPLIER_QUOTE_RECEIVED", "IMPORT_CANCELLED"],
    ),
    StepDefinition::new(
        "SUPPLIER_QUOTE_RECEIVED",
        "Supplier Quote Received",
        "Supplier responded with a quotation",
        &[Supplier, CompanyImportManager],
        &["IMPORT_PO_ISSUED", "IMPORT_CANCELLED"],
    ),
    StepDefinition::new(
        "IMPORT_PO_ISSUED",
        "Purchase Order Issued",
        "Company placed the order with the supplier",
        &[CompanyImportManager],
        &["IMPORT_PAYMENT_SENT", "IMPORT_CANCELLED"],
    ),
    StepDefinition::new(
        "IMPORT_PAYMENT_SENT",
        "Payment Sent",
        "Payment remitted to the supplier",
        &[Finance],
        &["IN_TRANSIT"],
    ),
    StepDefinition::new(
        "IN_TRANSIT",
        "In Transit",
        "Supplier dispatched the goods",
        &[Supplier, CompanyImportManager],
        &["BOE_FILED"],
    ),
    StepDefinition::new(
        "BOE_FILED",
        "Bill of Entry Filed",
        "Bill of entry filed with customs",
        &[Cha, CompanyImportManager],
        &["DUTY_PAID"],
    )
    .customs_filing(),
    StepDefinition::new(
        "DUTY_PAID",
        "Duty Paid",
        "Import duty paid",
        &[Finance],
        &["CUSTOMS_CLEARED"],
    ),
    StepDefinition::new(
        "CUSTOMS_CLEARED",
        "Customs Cleared",
        "Out of charge issued by customs",
        &[Cha, CompanyImportManager],
        &["IMPORT_CLOSED"],
    )
    .customs_filing(),
    StepDefinition::new(
        "IMPORT_CLOSED",
        "Closed",
        "Goods received and shipment archived",
        &[CompanyImportManager, Finance],
        &[],
    )
    .terminal(),
    StepDefinition::new(
        "IMPORT_CANCELLED",
        "Cancelled",
        "Sourcing abandoned before shipment",
        &[CompanyImportManager],
        &[],
    )
    .terminal(),
];

pub const EXPORT_WORKFLOW: WorkflowTable =
    WorkflowTable::new(Track::Export, "ENQUIRY_RECEIVED", &EXPORT_STEPS);
pub const IMPORT_WORKFLOW: WorkflowTable =
    WorkflowTable::new(Track::Import, "IMPORT_ENQUIRY_SENT", &IMPORT_STEPS);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn standard_tables_validate() {
        let registry = WorkflowRegistry::standard().unwrap();
        assert_eq!(registry.track_of("SB_FILED"), Some(Track::Export));
        assert_eq!(registry.track_of("BOE_FILED"), Some(Track::Import));
        assert_eq!(registry.track_of("NOWHERE"), None);
    }

    #[test]
    fn empty_roles_are_fatal() {
        static STEPS: [StepDefinition; 2] = [
            StepDefinition::new("OPEN", "Open", "", &[], &["DONE"]),
            StepDefinition::new("DONE", "Done", "", &[Role::Finance], &[]).terminal(),
        ];
        let broken = WorkflowTable::new(Track::Export, "OPEN", &STEPS);

        let err = WorkflowRegistry::new(broken, IMPORT_WORKFLOW).unwrap_err();
        assert!(err.to_string().contains("no allowed roles"));
    }

    #[test]
    fn dangling_next_step_is_fatal() {
        static STEPS: [StepDefinition; 1] =
            [StepDefinition::new("OPEN", "Open", "", &[Role::Buyer], &["GONE"])];
        let broken = WorkflowTable::new(Track::Export, "OPEN", &STEPS);

        assert!(WorkflowRegistry::new(broken, IMPORT_WORKFLOW).is_err());
    }

    #[test]
    fn missing_initial_state_is_fatal() {
        let broken = WorkflowTable::new(Track::Import, "IMPORT_SOMEWHERE", &IMPORT_STEPS);
        assert!(WorkflowRegistry::new(EXPORT_WORKFLOW, broken).is_err());
    }

    #[test]
    fn shared_state_ids_are_fatal() {
        let import_as_export = WorkflowTable::new(Track::Import, "ENQUIRY_RECEIVED", &EXPORT_STEPS);
        let err = WorkflowRegistry::new(EXPORT_WORKFLOW, import_as_export).unwrap_err();
        assert!(err.to_string().contains("both tracks"));
    }
}
