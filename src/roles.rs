//! Actor roles and the single authorization check consulted by the engine.
use std::fmt;
use std::str::FromStr;

use super::workflow::{ChaMode, StepDefinition};

/// The category of the acting user. Roles belong to the session, never to a
/// shipment.
#[derive(minicbor::Encode, minicbor::Decode, Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Role {
    #[n(0)]
    CompanyAdmin,
    #[n(1)]
    CompanyExportAnalyst,
    #[n(2)]
    CompanyExportManager,
    #[n(3)]
    CompanyImportManager,
    #[n(4)]
    Cha,
    #[n(5)]
    Finance,
    #[n(6)]
    Buyer,
    #[n(7)]
    Supplier,
    // the exporter acting as an automated system
    #[n(8)]
    System,
}

impl Role {
    /// Authorized for every state regardless of a step's allowed roles.
    pub const SUPER: Role = Role::CompanyAdmin;

    pub const ALL: [Role; 9] = [
        Role::CompanyAdmin,
        Role::CompanyExportAnalyst,
        Role::CompanyExportManager,
        Role::CompanyImportManager,
        Role::Cha,
        Role::Finance,
        Role::Buyer,
        Role::Supplier,
        Role::System,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Role::CompanyAdmin => "COMPANY_ADMIN",
            Role::CompanyExportAnalyst => "COMPANY_EXPORT_ANALYST",
            Role::CompanyExportManager => "COMPANY_EXPORT_MANAGER",
            Role::CompanyImportManager => "COMPANY_IMPORT_MANAGER",
            Role::Cha => "CHA",
            Role::Finance => "FINANCE",
            Role::Buyer => "BUYER",
            Role::Supplier => "SUPPLIER",
            Role::System => "SYSTEM",
        }
    }

    pub fn is_super(&self) -> bool {
        *self == Role::SUPER
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(thiserror::Error, Debug, PartialEq, Eq)]
#[error("unknown role {0:?}")]
pub struct UnknownRole(pub String);

impl FromStr for Role {
    type Err = UnknownRole;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Role::ALL
            .into_iter()
            .find(|role| role.as_str().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| UnknownRole(s.to_string()))
    }
}

/// Whether `role` may move a shipment into `step`.
///
/// On customs filing steps the shipment's CHA mode narrows the step's roles:
/// `Embedded` leaves only the customs agent, `Manual` leaves only the
/// company's own roles. The super role passes every check.
pub fn is_authorized(role: Role, step: &StepDefinition, cha_mode: Option<ChaMode>) -> bool {
    if role.is_super() {
        return true;
    }
    if !step.allowed_roles.contains(&role) {
        return false;
    }
    match (step.customs_filing, cha_mode) {
        (true, Some(ChaMode::Embedded)) => role == Role::Cha,
        (true, Some(ChaMode::Manual)) => role != Role::Cha,
        _ => true,
    }
}
