use rust_decimal::Decimal;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use strum::IntoEnumIterator;
use strum_macros::{EnumIter, EnumString, IntoStaticStr};

/// Closed set of event kinds. The serialized name of each variant is the
/// routing key (topic) its events are published to and consumed from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, EnumIter, EnumString, IntoStaticStr)]
pub enum EventKind {
    #[strum(serialize = "OpenAccountEvent")]
    OpenAccount,
    #[strum(serialize = "DepositFundEvent")]
    DepositFund,
    #[strum(serialize = "WithdrawFundEvent")]
    WithdrawFund,
    #[strum(serialize = "CloseAccountEvent")]
    CloseAccount,
}

/// Every topic a projection consumer has to subscribe to.
pub const TOPICS: [&str; 4] = [
    "OpenAccountEvent",
    "DepositFundEvent",
    "WithdrawFundEvent",
    "CloseAccountEvent",
];

impl EventKind {
    pub fn topic(self) -> &'static str {
        self.into()
    }

    pub fn from_topic(topic: &str) -> Option<Self> {
        topic.parse().ok()
    }

    pub fn all() -> impl Iterator<Item = EventKind> {
        EventKind::iter()
    }
}

impl std::fmt::Display for EventKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.topic())
    }
}

/// Implemented by each event payload; ties the type to its routing key.
pub trait DomainEvent: Serialize + DeserializeOwned {
    const KIND: EventKind;

    fn account_id(&self) -> &str;
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OpenAccountEvent {
    pub id: String,
    pub account_holder: String,
    pub account_type: i32,
    pub opening_balance: Decimal,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DepositFundEvent {
    pub id: String,
    pub amount: Decimal,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WithdrawFundEvent {
    pub id: String,
    pub amount: Decimal,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CloseAccountEvent {
    pub id: String,
}

impl DomainEvent for OpenAccountEvent {
    const KIND: EventKind = EventKind::OpenAccount;

    fn account_id(&self) -> &str {
        &self.id
    }
}

impl DomainEvent for DepositFundEvent {
    const KIND: EventKind = EventKind::DepositFund;

    fn account_id(&self) -> &str {
        &self.id
    }
}

impl DomainEvent for WithdrawFundEvent {
    const KIND: EventKind = EventKind::WithdrawFund;

    fn account_id(&self) -> &str {
        &self.id
    }
}

impl DomainEvent for CloseAccountEvent {
    const KIND: EventKind = EventKind::CloseAccount;

    fn account_id(&self) -> &str {
        &self.id
    }
}

#[derive(Debug, thiserror::Error)]
#[error("failed to decode {kind} payload: {source}")]
pub struct DecodeError {
    pub kind: EventKind,
    #[source]
    pub source: serde_json::Error,
}

#[derive(Debug, Clone, PartialEq)]
pub enum AccountEvent {
    OpenAccount(OpenAccountEvent),
    DepositFund(DepositFundEvent),
    WithdrawFund(WithdrawFundEvent),
    CloseAccount(CloseAccountEvent),
}

impl AccountEvent {
    pub fn kind(&self) -> EventKind {
        match self {
            AccountEvent::OpenAccount(_) => OpenAccountEvent::KIND,
            AccountEvent::DepositFund(_) => DepositFundEvent::KIND,
            AccountEvent::WithdrawFund(_) => WithdrawFundEvent::KIND,
            AccountEvent::CloseAccount(_) => CloseAccountEvent::KIND,
        }
    }

    pub fn topic(&self) -> &'static str {
        self.kind().topic()
    }

    pub fn account_id(&self) -> &str {
        match self {
            AccountEvent::OpenAccount(e) => e.account_id(),
            AccountEvent::DepositFund(e) => e.account_id(),
            AccountEvent::WithdrawFund(e) => e.account_id(),
            AccountEvent::CloseAccount(e) => e.account_id(),
        }
    }

    /// Serializes the event body only; the kind travels as the topic.
    pub fn to_payload(&self) -> Result<Vec<u8>, serde_json::Error> {
        match self {
            AccountEvent::OpenAccount(e) => serde_json::to_vec(e),
            AccountEvent::DepositFund(e) => serde_json::to_vec(e),
            AccountEvent::WithdrawFund(e) => serde_json::to_vec(e),
            AccountEvent::CloseAccount(e) => serde_json::to_vec(e),
        }
    }

    pub fn from_payload(kind: EventKind, payload: &[u8]) -> Result<Self, DecodeError> {
        let event = match kind {
            EventKind::OpenAccount => AccountEvent::OpenAccount(decode(payload)?),
            EventKind::DepositFund => AccountEvent::DepositFund(decode(payload)?),
            EventKind::WithdrawFund => AccountEvent::WithdrawFund(decode(payload)?),
            EventKind::CloseAccount => AccountEvent::CloseAccount(decode(payload)?),
        };
        Ok(event)
    }
}

fn decode<E: DomainEvent>(payload: &[u8]) -> Result<E, DecodeError> {
    serde_json::from_slice(payload).map_err(|source| DecodeError {
        kind: E::KIND,
        source,
    })
}

impl From<OpenAccountEvent> for AccountEvent {
    fn from(event: OpenAccountEvent) -> Self {
        AccountEvent::OpenAccount(event)
    }
}

impl From<DepositFundEvent> for AccountEvent {
    fn from(event: DepositFundEvent) -> Self {
        AccountEvent::DepositFund(event)
    }
}

impl From<WithdrawFundEvent> for AccountEvent {
    fn from(event: WithdrawFundEvent) -> Self {
        AccountEvent::WithdrawFund(event)
    }
}

impl From<CloseAccountEvent> for AccountEvent {
    fn from(event: CloseAccountEvent) -> Self {
        AccountEvent::CloseAccount(event)
    }
}
