//! The ledger's atomic record.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Category assigned when the extraction omits one.
pub const FALLBACK_CATEGORY: &str = "Other";

/// One statement row.
///
/// `amount` is signed: positive is income or credit, negative is expense
/// or debit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Transaction {
    /// Opaque identifier, unique within a ledger and stable for the
    /// record's lifetime.
    pub id: String,
    /// Calendar date as text, canonically `YYYY-MM-DD`; not validated.
    pub date: String,
    pub description: String,
    pub amount: f64,
    #[serde(default = "fallback_category")]
    pub category: String,
    #[serde(default)]
    pub notes: String,
}

fn fallback_category() -> String {
    FALLBACK_CATEGORY.to_string()
}

impl Transaction {
    /// Create a record with a freshly generated id.
    pub fn new(
        date: impl Into<String>,
        description: impl Into<String>,
        amount: f64,
        category: impl Into<String>,
        notes: impl Into<String>,
    ) -> Self {
        Self {
            id: new_id(),
            date: date.into(),
            description: description.into(),
            amount,
            category: category.into(),
            notes: notes.into(),
        }
    }

    pub fn is_income(&self) -> bool {
        self.amount > 0.0
    }
}

/// Generate a fresh opaque record id.
pub fn new_id() -> String {
    Uuid::new_v4().to_string()
}
