//! Derived views over a transaction collection.
//!
//! Pure functions, recomputed on demand from the current collection; there
//! is no cache to invalidate.

use crate::transaction::Transaction;
use serde::{Deserialize, Serialize};

/// Summed expenses for one category.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CategoryTotal {
    pub category: String,
    /// Always negative.
    pub total: f64,
}

/// Ledger-wide totals.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Summary {
    pub total_records: usize,
    /// Sum of positive amounts.
    pub total_income: f64,
    /// Sum of non-positive amounts; keeps its sign.
    pub total_spending: f64,
    /// `total_income + total_spending`.
    pub net: f64,
}

/// Both aggregate views at once.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Aggregates {
    pub category_totals: Vec<CategoryTotal>,
    pub summary: Summary,
}

/// Per-category sums of expense (negative) amounts, most negative first.
///
/// Categories with no expenses do not appear. Ties keep first-seen order.
pub fn category_totals(transactions: &[Transaction]) -> Vec<CategoryTotal> {
    let mut totals: Vec<CategoryTotal> = Vec::new();
    for t in transactions.iter().filter(|t| t.amount < 0.0) {
        match totals.iter_mut().find(|c| c.category == t.category) {
            Some(c) => c.total += t.amount,
            None => totals.push(CategoryTotal {
                category: t.category.clone(),
                total: t.amount,
            }),
        }
    }
    totals.sort_by(|a, b| a.total.total_cmp(&b.total));
    totals
}

pub fn summary(transactions: &[Transaction]) -> Summary {
    let (income, spending) = transactions.iter().fold((0.0, 0.0), |(inc, sp), t| {
        if t.is_income() {
            (inc + t.amount, sp)
        } else {
            (inc, sp + t.amount)
        }
    });
    Summary {
        total_records: transactions.len(),
        total_income: income,
        total_spending: spending,
        net: income + spending,
    }
}

pub fn aggregates(transactions: &[Transaction]) -> Aggregates {
    Aggregates {
        category_totals: category_totals(transactions),
        summary: summary(transactions),
    }
}
