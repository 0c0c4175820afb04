// Column layout shared by the relational and the columnar sinks

use crate::value_objects::EventKind;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColumnType {
    Text,
    OptionalText,
    UInt64,
    OptionalUInt64,
    TimestampMillis,
    /// Arbitrary precision integer stored as decimal text.
    Decimal,
    /// A JSON document stored as text.
    Json,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Column {
    pub name: &'static str,
    pub ty: ColumnType,
}

const fn column(name: &'static str, ty: ColumnType) -> Column {
    Column { name, ty }
}

use ColumnType::*;

const TRANSFER_OBJECT: &[Column] = &[
    column("tx_digest", Text),
    column("event_seq", UInt64),
    column("timestamp", TimestampMillis),
    column("package_id", Text),
    column("transaction_module", Text),
    column("sender", Text),
    column("recipient", Text),
    column("object_type", Text),
    column("object_id", Text),
    column("version", UInt64),
];

const PUBLISH: &[Column] = &[
    column("tx_digest", Text),
    column("event_seq", UInt64),
    column("timestamp", TimestampMillis),
    column("sender", Text),
    column("package_id", Text),
    column("version", OptionalUInt64),
    column("digest", OptionalText),
];

const COIN_BALANCE_CHANGE: &[Column] = &[
    column("tx_digest", Text),
    column("event_seq", UInt64),
    column("timestamp", TimestampMillis),
    column("package_id", Text),
    column("transaction_module", Text),
    column("sender", Text),
    column("owner", Text),
    column("change_type", Text),
    column("coin_type", Text),
    column("coin_object_id", Text),
    column("version", UInt64),
    column("amount", Decimal),
];

const MOVE_EVENT: &[Column] = &[
    column("tx_digest", Text),
    column("event_seq", UInt64),
    column("timestamp", TimestampMillis),
    column("package_id", Text),
    column("transaction_module", Text),
    column("sender", Text),
    column("event_type", Text),
    column("fields", Json),
    column("bcs", Text),
];

const MUTATE_OBJECT: &[Column] = &[
    column("tx_digest", Text),
    column("event_seq", UInt64),
    column("timestamp", TimestampMillis),
    column("package_id", Text),
    column("transaction_module", Text),
    column("sender", Text),
    column("object_type", Text),
    column("object_id", Text),
    column("version", UInt64),
];

const DELETE_OBJECT: &[Column] = &[
    column("tx_digest", Text),
    column("event_seq", UInt64),
    column("timestamp", TimestampMillis),
    column("package_id", Text),
    column("transaction_module", Text),
    column("sender", Text),
    column("object_id", Text),
    column("version", UInt64),
];

const NEW_OBJECT: &[Column] = TRANSFER_OBJECT;

impl EventKind {
    /// Columns in the field order of the matching record type.
    pub fn columns(&self) -> &'static [Column] {
        match self {
            EventKind::TransferObject => TRANSFER_OBJECT,
            EventKind::Publish => PUBLISH,
            EventKind::CoinBalanceChange => COIN_BALANCE_CHANGE,
            EventKind::MoveEvent => MOVE_EVENT,
            EventKind::MutateObject => MUTATE_OBJECT,
            EventKind::DeleteObject => DELETE_OBJECT,
            EventKind::NewObject => NEW_OBJECT,
        }
    }
}

#[cfg(test)]
mod tests {
    use crate::entities::SuiEvent;
    use crate::value_objects::EventKind;

    #[test]
    fn columns_follow_record_fields() {
        for kind in EventKind::ALL {
            let row = SuiEvent::empty(kind).to_row_value().expect("row");
            let fields: Vec<&str> = row
                .as_object()
                .expect("object")
                .keys()
                .map(String::as_str)
                .collect();
            let columns: Vec<&str> = kind.columns().iter().map(|column| column.name).collect();
            assert_eq!(fields, columns, "{}", kind);
        }
    }
}
