//! Field-level comparison between the system of record and a staged upload.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldDiff {
    pub field: String,
    pub current_value: Option<String>,
    pub proposed_value: Option<String>,
    /// `proposed - current`, only when both sides are numeric
    pub delta: Option<Decimal>,
}

impl FieldDiff {
    /// Whether applying the upload would alter this field.
    ///
    /// Numeric fields compare by value, so `150000` and `150000.00` are equal.
    pub fn is_change(&self) -> bool {
        match self.delta {
            Some(delta) => !delta.is_zero(),
            None => self.proposed_value.is_some() && self.current_value != self.proposed_value,
        }
    }
}


#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DiffReport {
    pub upload_id: Uuid,
    pub property_id: String,
    pub fields: Vec<FieldDiff>,
}

impl DiffReport {
    pub fn changes(&self) -> impl Iterator<Item = &FieldDiff> {
        self.fields.iter().filter(|f| f.is_change())
    }
}
