//! Category vocabulary.
//!
//! The vocabulary offered to the user is derived, never stored: the fixed
//! defaults, then the account's custom list, then any label found on a
//! stored transaction, de-duplicated in first-seen order. Transactions are
//! the source of truth.

use crate::transaction::Transaction;
use serde::{Deserialize, Serialize};

/// The built-in vocabulary. "Other" is the catch-all and always last.
pub const DEFAULT_CATEGORIES: [&str; 10] = [
    "Rent",
    "Insurance",
    "Subscription",
    "Groceries",
    "Dining",
    "Utilities",
    "Transport",
    "Shopping",
    "Income",
    "Other",
];

pub fn is_default(category: &str) -> bool {
    DEFAULT_CATEGORIES.contains(&category)
}

/// Categories newly added to an account's custom list by an edit.
///
/// Returned by [`crate::ledger::Ledger::update`] and
/// [`crate::ledger::Ledger::bulk_update_category`] so callers can observe
/// vocabulary growth without inspecting ledger state.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct VocabularyDelta {
    pub added: Vec<String>,
}

impl VocabularyDelta {
    pub fn is_empty(&self) -> bool {
        self.added.is_empty()
    }
}

/// Append `category` to `custom` when it is non-empty and in neither the
/// defaults nor the custom list already.
pub(crate) fn grow_vocabulary(custom: &mut Vec<String>, category: &str) -> VocabularyDelta {
    if category.is_empty() || is_default(category) || custom.iter().any(|c| c == category) {
        return VocabularyDelta::default();
    }
    custom.push(category.to_string());
    VocabularyDelta {
        added: vec![category.to_string()],
    }
}

/// Union of defaults, custom categories and labels on `transactions`.
///
/// Order: defaults, then custom, then transaction labels in ledger order.
/// Empty labels are omitted.
pub fn all_categories(custom: &[String], transactions: &[Transaction]) -> Vec<String> {
    let mut out: Vec<String> = Vec::new();
    let candidates = DEFAULT_CATEGORIES
        .iter()
        .copied()
        .chain(custom.iter().map(String::as_str))
        .chain(transactions.iter().map(|t| t.category.as_str()));

    for c in candidates {
        if !c.is_empty() && !out.iter().any(|o| o == c) {
            out.push(c.to_string());
        }
    }
    out
}
