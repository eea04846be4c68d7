//! Parameter bindings attached to generated SQL. The generator never
//! inlines a measure-authored literal directly into the SQL text (other
//! than a code list under a direct-code `in (...)`, which is itself quoted
//! and controlled, not user input) — everything else travels as a named
//! binding a caller supplies at execution time.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "camelCase")]
pub enum SqlValue {
    Text(String),
    Date(NaiveDate),
    Integer(i64),
    Decimal(f64),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SqlBinding {
    pub name: String,
    pub value: SqlValue,
}
