// Event entities
// One fixed record shape per event kind. The identity columns are not part of the
// payload; they are stamped from the page record after decoding.

use clickhouse::Row;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::utils::{
    decimal_from_number_or_string, json_text, optional_u64_from_number_or_string,
    u64_from_number_or_string,
};
use crate::value_objects::{EventId, EventKind};

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, Row)]
#[serde(default)]
pub struct TransferObjectEvent {
    pub tx_digest: String,
    pub event_seq: u64,
    pub timestamp: i64,
    #[serde(alias = "packageId")]
    pub package_id: String,
    #[serde(alias = "transactionModule")]
    pub transaction_module: String,
    pub sender: String,
    pub recipient: String,
    #[serde(alias = "objectType")]
    pub object_type: String,
    #[serde(alias = "objectId")]
    pub object_id: String,
    #[serde(deserialize_with = "u64_from_number_or_string")]
    pub version: u64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, Row)]
#[serde(default)]
pub struct PublishEvent {
    pub tx_digest: String,
    pub event_seq: u64,
    pub timestamp: i64,
    pub sender: String,
    #[serde(alias = "packageId")]
    pub package_id: String,
    #[serde(deserialize_with = "optional_u64_from_number_or_string")]
    pub version: Option<u64>,
    pub digest: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, Row)]
#[serde(default)]
pub struct CoinBalanceChangeEvent {
    pub tx_digest: String,
    pub event_seq: u64,
    pub timestamp: i64,
    #[serde(alias = "packageId")]
    pub package_id: String,
    #[serde(alias = "transactionModule")]
    pub transaction_module: String,
    pub sender: String,
    pub owner: String,
    #[serde(alias = "changeType")]
    pub change_type: String,
    #[serde(alias = "coinType")]
    pub coin_type: String,
    #[serde(alias = "coinObjectId")]
    pub coin_object_id: String,
    #[serde(deserialize_with = "u64_from_number_or_string")]
    pub version: u64,
    /// Decimal text; balances are not bounded by 64 bits.
    #[serde(deserialize_with = "decimal_from_number_or_string")]
    pub amount: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, Row)]
#[serde(default)]
pub struct MoveEvent {
    pub tx_digest: String,
    pub event_seq: u64,
    pub timestamp: i64,
    #[serde(alias = "packageId")]
    pub package_id: String,
    #[serde(alias = "transactionModule")]
    pub transaction_module: String,
    pub sender: String,
    #[serde(alias = "type")]
    pub event_type: String,
    /// The Move struct fields, kept as JSON text.
    #[serde(deserialize_with = "json_text")]
    pub fields: String,
    pub bcs: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, Row)]
#[serde(default)]
pub struct MutateObjectEvent {
    pub tx_digest: String,
    pub event_seq: u64,
    pub timestamp: i64,
    #[serde(alias = "packageId")]
    pub package_id: String,
    #[serde(alias = "transactionModule")]
    pub transaction_module: String,
    pub sender: String,
    #[serde(alias = "objectType")]
    pub object_type: String,
    #[serde(alias = "objectId")]
    pub object_id: String,
    #[serde(deserialize_with = "u64_from_number_or_string")]
    pub version: u64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, Row)]
#[serde(default)]
pub struct DeleteObjectEvent {
    pub tx_digest: String,
    pub event_seq: u64,
    pub timestamp: i64,
    #[serde(alias = "packageId")]
    pub package_id: String,
    #[serde(alias = "transactionModule")]
    pub transaction_module: String,
    pub sender: String,
    #[serde(alias = "objectId")]
    pub object_id: String,
    #[serde(deserialize_with = "u64_from_number_or_string")]
    pub version: u64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, Row)]
#[serde(default)]
pub struct NewObjectEvent {
    pub tx_digest: String,
    pub event_seq: u64,
    pub timestamp: i64,
    #[serde(alias = "packageId")]
    pub package_id: String,
    #[serde(alias = "transactionModule")]
    pub transaction_module: String,
    pub sender: String,
    pub recipient: String,
    #[serde(alias = "objectType")]
    pub object_type: String,
    #[serde(alias = "objectId")]
    pub object_id: String,
    #[serde(deserialize_with = "u64_from_number_or_string")]
    pub version: u64,
}

/// A decoded event of one of the known kinds.
#[derive(Debug, Clone, PartialEq)]
pub enum SuiEvent {
    TransferObject(TransferObjectEvent),
    Publish(PublishEvent),
    CoinBalanceChange(CoinBalanceChangeEvent),
    Move(MoveEvent),
    MutateObject(MutateObjectEvent),
    DeleteObject(DeleteObjectEvent),
    NewObject(NewObjectEvent),
}

macro_rules! each_event {
    ($value:expr, $event:ident => $body:expr) => {
        match $value {
            SuiEvent::TransferObject($event) => $body,
            SuiEvent::Publish($event) => $body,
            SuiEvent::CoinBalanceChange($event) => $body,
            SuiEvent::Move($event) => $body,
            SuiEvent::MutateObject($event) => $body,
            SuiEvent::DeleteObject($event) => $body,
            SuiEvent::NewObject($event) => $body,
        }
    };
}

impl SuiEvent {
    pub fn empty(kind: EventKind) -> Self {
        match kind {
            EventKind::TransferObject => SuiEvent::TransferObject(Default::default()),
            EventKind::Publish => SuiEvent::Publish(Default::default()),
            EventKind::CoinBalanceChange => SuiEvent::CoinBalanceChange(Default::default()),
            EventKind::MoveEvent => SuiEvent::Move(Default::default()),
            EventKind::MutateObject => SuiEvent::MutateObject(Default::default()),
            EventKind::DeleteObject => SuiEvent::DeleteObject(Default::default()),
            EventKind::NewObject => SuiEvent::NewObject(Default::default()),
        }
    }

    /// Decodes an already flattened payload into the shape of `kind`.
    pub fn decode(kind: EventKind, payload: Value) -> Result<Self, serde_json::Error> {
        Ok(match kind {
            EventKind::TransferObject => SuiEvent::TransferObject(serde_json::from_value(payload)?),
            EventKind::Publish => SuiEvent::Publish(serde_json::from_value(payload)?),
            EventKind::CoinBalanceChange => {
                SuiEvent::CoinBalanceChange(serde_json::from_value(payload)?)
            }
            EventKind::MoveEvent => SuiEvent::Move(serde_json::from_value(payload)?),
            EventKind::MutateObject => SuiEvent::MutateObject(serde_json::from_value(payload)?),
            EventKind::DeleteObject => SuiEvent::DeleteObject(serde_json::from_value(payload)?),
            EventKind::NewObject => SuiEvent::NewObject(serde_json::from_value(payload)?),
        })
    }

    pub fn kind(&self) -> EventKind {
        match self {
            SuiEvent::TransferObject(_) => EventKind::TransferObject,
            SuiEvent::Publish(_) => EventKind::Publish,
            SuiEvent::CoinBalanceChange(_) => EventKind::CoinBalanceChange,
            SuiEvent::Move(_) => EventKind::MoveEvent,
            SuiEvent::MutateObject(_) => EventKind::MutateObject,
            SuiEvent::DeleteObject(_) => EventKind::DeleteObject,
            SuiEvent::NewObject(_) => EventKind::NewObject,
        }
    }

    pub fn stamp(&mut self, id: &EventId, timestamp: i64) {
        each_event!(self, event => {
            event.tx_digest = id.tx_digest.clone();
            event.event_seq = id.event_seq;
            event.timestamp = timestamp;
        })
    }

    pub fn id(&self) -> EventId {
        each_event!(self, event => EventId::new(event.tx_digest.clone(), event.event_seq))
    }

    pub fn timestamp(&self) -> i64 {
        each_event!(self, event => event.timestamp)
    }

    /// Column name to value, in column order.
    pub fn to_row_value(&self) -> Result<Value, serde_json::Error> {
        each_event!(self, event => serde_json::to_value(event))
    }
}
