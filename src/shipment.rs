//! Shipment aggregate, its correspondence thread and its audit trail
use super::error::{ValidationError, WorkflowError};
use super::roles::Role;
use super::utils;
use super::workflow::{ChaMode, Track};
use chrono::{DateTime, TimeZone, Utc};

pub const PENDING_VALUE: &str = "Pending";

#[derive(Debug, PartialEq, Eq, PartialOrd, Ord, Clone)]
pub struct TimeStamp<T: TimeZone>(DateTime<T>);

impl TimeStamp<Utc> {
    pub fn new() -> Self {
        Self(Utc::now())
    }
    pub fn new_with(year: i32, month: u32, day: u32, hour: u32, min: u32, sec: u32) -> Option<Self> {
        Utc.with_ymd_and_hms(year, month, day, hour, min, sec)
            .single()
            .map(Into::into)
    }
    pub fn to_datetime_utc(&self) -> DateTime<Utc> {
        self.0
    }
}

impl Default for TimeStamp<Utc> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: TimeZone> From<DateTime<T>> for TimeStamp<T> {
    fn from(value: DateTime<T>) -> Self {
        TimeStamp(value)
    }
}

impl<C> minicbor::Encode<C> for TimeStamp<Utc> {
    fn encode<W: minicbor::encode::Write>(
        &self,
        e: &mut minicbor::Encoder<W>,
        _: &mut C,
    ) -> Result<(), minicbor::encode::Error<W::Error>> {
        if let Some(nsec) = self.0.timestamp_nanos_opt() {
            return e.i64(nsec)?.ok();
        }

        Err(minicbor::encode::Error::message(
            "failed to encode timestamp. timestamp_nanos_opt returned None",
        ))
    }
}

impl<'b, C> minicbor::Decode<'b, C> for TimeStamp<Utc> {
    fn decode(d: &mut minicbor::Decoder<'b>, _: &mut C) -> Result<Self, minicbor::decode::Error> {
        let nsecs = d.i64()?;

        Ok(TimeStamp(DateTime::from_timestamp_nanos(nsecs)))
    }
}

/// The other side of the deal. Which variant is present fixes the track.
#[derive(minicbor::Encode, minicbor::Decode, Debug, Clone, PartialEq, Eq)]
pub enum Counterpart {
    #[n(0)]
    Export {
        #[n(0)]
        buyer: String,
        #[n(1)]
        destination: String,
    },
    #[n(1)]
    Import {
        #[n(0)]
        supplier: String,
        #[n(1)]
        origin: String,
    },
}

impl Counterpart {
    pub fn export(buyer: impl Into<String>, destination: impl Into<String>) -> Self {
        Counterpart::Export {
            buyer: buyer.into(),
            destination: destination.into(),
        }
    }
    pub fn import(supplier: impl Into<String>, origin: impl Into<String>) -> Self {
        Counterpart::Import {
            supplier: supplier.into(),
            origin: origin.into(),
        }
    }
    pub fn track(&self) -> Track {
        match self {
            Counterpart::Export { .. } => Track::Export,
            Counterpart::Import { .. } => Track::Import,
        }
    }
    /// Buyer or supplier name.
    pub fn name(&self) -> &str {
        match self {
            Counterpart::Export { buyer, .. } => buyer,
            Counterpart::Import { supplier, .. } => supplier,
        }
    }
    /// Destination or origin.
    pub fn location(&self) -> &str {
        match self {
            Counterpart::Export { destination, .. } => destination,
            Counterpart::Import { origin, .. } => origin,
        }
    }
}

/// The request a shipment originated from. Never changes after creation.
#[derive(minicbor::Encode, minicbor::Decode, Debug, Clone, PartialEq, Eq)]
pub struct Enquiry {
    #[n(0)]
    pub product: String,
    #[n(1)]
    pub quantity: String,
    #[n(2)]
    pub target_price: Option<String>,
    #[n(3)]
    pub requirements: Option<String>,
}

/// Two-party correspondence channel, the same on both tracks.
#[derive(minicbor::Encode, minicbor::Decode, Debug, Clone, Copy, PartialEq, Eq)]
pub enum Party {
    #[n(0)]
    Us,
    #[n(1)]
    Counterparty,
}

#[derive(minicbor::Encode, minicbor::Decode, Debug, Clone, PartialEq, Eq)]
pub struct Attachment {
    #[n(0)]
    pub id: String,
    #[n(1)]
    pub name: String,
    #[n(2)]
    pub kind: String, // mime type or document type, e.g. "application/pdf"
    #[n(3)]
    pub url: Option<String>,
}

impl Attachment {
    /// New attachment with a generated `att1…` id.
    pub fn new(name: impl Into<String>, kind: impl Into<String>) -> anyhow::Result<Self> {
        Ok(Self {
            id: utils::new_uuid_to_bech32("att")?,
            name: name.into(),
            kind: kind.into(),
            url: None,
        })
    }
    pub fn with_url(mut self, url: impl Into<String>) -> Self {
        self.url = Some(url.into());
        self
    }
}

#[derive(minicbor::Encode, minicbor::Decode, Debug, Clone, PartialEq, Eq)]
pub struct Message {
    #[n(0)]
    pub id: String,
    #[n(1)]
    pub sender: Party,
    #[n(2)]
    pub content: String,
    #[n(3)]
    pub timestamp: TimeStamp<Utc>,
    #[n(4)]
    pub attachments: Vec<Attachment>,
}

/// A message before the store has stamped it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewMessage {
    pub sender: Party,
    pub content: String,
    pub attachments: Vec<Attachment>,
}

impl NewMessage {
    pub fn new(sender: Party, content: impl Into<String>) -> Self {
        Self {
            sender,
            content: content.into(),
            attachments: vec![],
        }
    }
    pub fn attach(mut self, attachment: Attachment) -> Self {
        self.attachments.push(attachment);
        self
    }
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.content.trim().is_empty() && self.attachments.is_empty() {
            return Err(ValidationError::EmptyMessage);
        }
        if let Some(unnamed) = self.attachments.iter().find(|a| a.name.trim().is_empty()) {
            return Err(ValidationError::UnnamedAttachment(unnamed.id.clone()));
        }
        Ok(())
    }
    /// Stamp the message with an id and the current time.
    pub fn finalise(self) -> Result<Message, WorkflowError> {
        self.validate()?;
        let id = utils::new_uuid_to_bech32("msg").map_err(|e| WorkflowError::Encoding(e.to_string()))?;
        Ok(Message {
            id,
            sender: self.sender,
            content: self.content,
            timestamp: TimeStamp::new(),
            attachments: self.attachments,
        })
    }
}

/// One entry of the audit trail: the state entered and who moved it there.
#[derive(minicbor::Encode, minicbor::Decode, Debug, Clone, PartialEq, Eq)]
pub struct HistoryEntry {
    #[n(0)]
    pub state: String,
    #[n(1)]
    pub timestamp: TimeStamp<Utc>,
    #[n(2)]
    pub actor: String,
    #[n(3)]
    pub role: Role,
    #[n(4)]
    pub action: String,
}

impl HistoryEntry {
    pub fn new(state: impl Into<String>, actor: impl Into<String>, role: Role, action: impl Into<String>) -> Self {
        Self {
            state: state.into(),
            timestamp: TimeStamp::new(),
            actor: actor.into(),
            role,
            action: action.into(),
        }
    }
    /// CBOR encoding of the entry and its sha256 digest.
    pub fn build(&self) -> Result<(String, Vec<u8>), WorkflowError> {
        let cbor = minicbor::to_vec(self)?;
        let hash = sha256::digest(&cbor);

        Ok((hash, cbor))
    }
}

#[derive(minicbor::Encode, minicbor::Decode, Debug, Clone, PartialEq, Eq)]
pub struct Shipment {
    #[n(0)]
    pub id: String, // track prefixed, e.g. EXP-001
    #[n(1)]
    pub counterpart: Counterpart,
    #[n(2)]
    pub status: String,
    #[n(3)]
    pub value: String,
    #[n(4)]
    pub goods: String,
    #[n(5)]
    pub enquiry: Option<Enquiry>,
    #[n(6)]
    pub cha_mode: Option<ChaMode>,
    #[n(7)]
    pub messages: Vec<Message>,
    #[n(8)]
    pub history: Vec<HistoryEntry>,
}

impl Shipment {
    pub fn track(&self) -> Track {
        self.counterpart.track()
    }
    pub fn is_value_pending(&self) -> bool {
        self.value == PENDING_VALUE
    }
    pub fn last_transition(&self) -> Option<&HistoryEntry> {
        self.history.last()
    }

    /// Hash chain over the audit trail. Any edit, removal or reordering of a
    /// history entry changes the digest.
    pub fn audit_digest(&self) -> Result<String, WorkflowError> {
        let mut chain = sha256::digest(self.id.as_str());
        for entry in &self.history {
            let (hash, _) = entry.build()?;
            chain = sha256::digest(format!("{chain}{hash}"));
        }
        Ok(chain)
    }

    pub fn view_history(&self) {
        for (i, entry) in self.history.iter().enumerate() {
            tracing::info!(
                shipment_id = %self.id,
                step = i,
                state = %entry.state,
                actor = %entry.actor,
                role = %entry.role,
                at = %entry.timestamp.to_datetime_utc(),
                "{}",
                entry.action
            );
        }
    }
}

/// Fields supplied by whoever opens a shipment. The store assigns the id,
/// the initial state and the first history entry.
#[derive(Debug, Clone)]
pub struct NewShipment {
    counterpart: Counterpart,
    goods: String,
    value: String,
    enquiry: Option<Enquiry>,
    cha_mode: Option<ChaMode>,
    message: Option<NewMessage>,
    actor: String,
    role: Role,
    action: String,
}

impl NewShipment {
    pub fn new(counterpart: Counterpart, goods: impl Into<String>, actor: impl Into<String>, role: Role) -> Self {
        let action = match counterpart.track() {
            Track::Export => "Enquiry received",
            Track::Import => "Sourcing enquiry sent",
        };
        Self {
            counterpart,
            goods: goods.into(),
            value: PENDING_VALUE.into(),
            enquiry: None,
            cha_mode: None,
            message: None,
            actor: actor.into(),
            role,
            action: action.into(),
        }
    }
    pub fn set_value(mut self, value: impl Into<String>) -> Self {
        self.value = value.into();
        self
    }
    pub fn set_enquiry(mut self, enquiry: Enquiry) -> Self {
        self.enquiry = Some(enquiry);
        self
    }
    pub fn set_cha_mode(mut self, mode: ChaMode) -> Self {
        self.cha_mode = Some(mode);
        self
    }
    pub fn set_message(mut self, message: NewMessage) -> Self {
        self.message = Some(message);
        self
    }
    pub fn set_action(mut self, action: impl Into<String>) -> Self {
        self.action = action.into();
        self
    }
    pub fn track(&self) -> Track {
        self.counterpart.track()
    }
    pub fn role(&self) -> Role {
        self.role
    }

    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.counterpart.name().trim().is_empty() {
            return Err(ValidationError::MissingCounterpart);
        }
        if self.counterpart.location().trim().is_empty() {
            return Err(ValidationError::MissingLocation);
        }
        if self.goods.trim().is_empty() {
            return Err(ValidationError::MissingGoods);
        }
        if self.value.trim().is_empty() {
            return Err(ValidationError::MissingValue);
        }
        if self.actor.trim().is_empty() {
            return Err(ValidationError::MissingActor);
        }
        if self.action.trim().is_empty() {
            return Err(ValidationError::MissingAction);
        }
        if let Some(message) = &self.message {
            message.validate()?;
        }
        Ok(())
    }

    /// Validate and stamp everything except the id.
    pub(crate) fn finalise(self, initial_state: &str) -> Result<Draft, WorkflowError> {
        self.validate()?;
        let messages = match self.message {
            Some(message) => vec![message.finalise()?],
            None => vec![],
        };
        let entry = HistoryEntry::new(initial_state, self.actor, self.role, self.action);
        Ok(Draft {
            counterpart: self.counterpart,
            status: initial_state.to_string(),
            value: self.value,
            goods: self.goods,
            enquiry: self.enquiry,
            cha_mode: self.cha_mode,
            messages,
            history: vec![entry],
        })
    }
}

/// A finalised shipment waiting for its id.
#[derive(Debug, Clone)]
pub(crate) struct Draft {
    counterpart: Counterpart,
    status: String,
    value: String,
    goods: String,
    enquiry: Option<Enquiry>,
    cha_mode: Option<ChaMode>,
    messages: Vec<Message>,
    history: Vec<HistoryEntry>,
}

impl Draft {
    pub(crate) fn track(&self) -> Track {
        self.counterpart.track()
    }
    pub(crate) fn into_shipment(self, id: String) -> Shipment {
        Shipment {
            id,
            counterpart: self.counterpart,
            status: self.status,
            value: self.value,
            goods: self.goods,
            enquiry: self.enquiry,
            cha_mode: self.cha_mode,
            messages: self.messages,
            history: self.history,
        }
    }
}
