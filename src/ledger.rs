//! Ledger store: the signed-in user's working transaction collection.
//!
//! A [`Ledger`] is opened for an explicit [`Session`] and owns that user's
//! transactions and custom categories. Every mutation writes the whole
//! account back through the [`KeyValueStore`] before returning, so what the
//! ledger holds and what is persisted never diverge. A failed write leaves
//! the in-memory state untouched.
//!
//! The selection set (rows ticked for a bulk action) is working state only
//! and is never persisted.

use crate::aggregates::{self, Aggregates};
use crate::auth::Session;
use crate::categories::{self, VocabularyDelta};
use crate::error::FintracksError;
use crate::store::{self, KeyValueStore, UserAccount};
use crate::transaction::{new_id, Transaction};
use std::collections::HashSet;
use std::sync::Arc;
use tracing::{debug, info};

pub struct Ledger {
    session: Session,
    store: Arc<dyn KeyValueStore>,
    account: UserAccount,
    selection: HashSet<String>,
}

impl std::fmt::Debug for Ledger {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Ledger")
            .field("user", &self.session.username())
            .field("transactions", &self.account.transactions.len())
            .field("custom_categories", &self.account.custom_categories)
            .field("selected", &self.selection.len())
            .finish()
    }
}

impl Ledger {
    /// Load the account behind `session`.
    pub fn open(session: Session, store: Arc<dyn KeyValueStore>) -> Result<Self, FintracksError> {
        let account = store::load_account(store.as_ref(), session.username())?.ok_or_else(|| {
            FintracksError::Storage {
                key: store::account_key(session.username()),
                detail: "account not found".to_string(),
            }
        })?;
        debug!(
            "Opened ledger for '{}': {} transactions",
            session.username(),
            account.transactions.len()
        );
        Ok(Self {
            session,
            store,
            account,
            selection: HashSet::new(),
        })
    }

    pub fn session(&self) -> &Session {
        &self.session
    }

    pub fn transactions(&self) -> &[Transaction] {
        &self.account.transactions
    }

    pub fn custom_categories(&self) -> &[String] {
        &self.account.custom_categories
    }

    pub fn len(&self) -> usize {
        self.account.transactions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.account.transactions.is_empty()
    }

    pub fn get(&self, id: &str) -> Option<&Transaction> {
        self.account.transactions.iter().find(|t| t.id == id)
    }

    /// Defaults, custom categories and every label in use.
    pub fn all_categories(&self) -> Vec<String> {
        categories::all_categories(&self.account.custom_categories, &self.account.transactions)
    }

    pub fn aggregates(&self) -> Aggregates {
        aggregates::aggregates(&self.account.transactions)
    }

    // ── Mutations ────────────────────────────────────────────────────────

    /// Append `records` after the existing rows, in order.
    ///
    /// No de-duplication against existing rows. A record whose id collides
    /// with one already held is given a fresh id. Appending nothing does
    /// not touch the store.
    pub fn append_batch(&mut self, records: Vec<Transaction>) -> Result<usize, FintracksError> {
        if records.is_empty() {
            return Ok(0);
        }
        let count = records.len();
        self.commit(|account| {
            let mut ids: HashSet<String> =
                account.transactions.iter().map(|t| t.id.clone()).collect();
            for mut record in records {
                if !ids.insert(record.id.clone()) {
                    record.id = new_id();
                    ids.insert(record.id.clone());
                }
                account.transactions.push(record);
            }
        })?;
        info!("Appended {} transaction(s) for '{}'", count, self.session.username());
        Ok(count)
    }

    /// Remove the record `id`; `false` when absent.
    pub fn delete(&mut self, id: &str) -> Result<bool, FintracksError> {
        if self.get(id).is_none() {
            return Ok(false);
        }
        self.commit(|account| account.transactions.retain(|t| t.id != id))?;
        self.selection.remove(id);
        Ok(true)
    }

    /// Replace the record with `record.id` in place.
    ///
    /// A category outside the defaults and the custom list joins the
    /// custom list, whether or not the id matched, as with
    /// [`bulk_update_category`](Self::bulk_update_category). When the id
    /// is unknown and the vocabulary is unchanged nothing is written.
    pub fn update(&mut self, record: Transaction) -> Result<VocabularyDelta, FintracksError> {
        let matched = self.account.transactions.iter().any(|t| t.id == record.id);
        let mut custom = self.account.custom_categories.clone();
        let delta = categories::grow_vocabulary(&mut custom, &record.category);

        if !matched && delta.is_empty() {
            debug!("No record with id {}; nothing to update", record.id);
            return Ok(delta);
        }

        self.commit(|account| {
            account.custom_categories = custom;
            if let Some(slot) = account.transactions.iter_mut().find(|t| t.id == record.id) {
                *slot = record;
            }
        })?;
        Ok(delta)
    }

    /// Set `category` on every record in `ids`, then clear the selection.
    ///
    /// Returns the vocabulary growth, which holds a new label once however
    /// many records it was applied to.
    pub fn bulk_update_category(
        &mut self,
        ids: &[String],
        category: &str,
    ) -> Result<VocabularyDelta, FintracksError> {
        let targets: HashSet<&str> = ids.iter().map(String::as_str).collect();
        let mut delta = VocabularyDelta::default();
        self.commit(|account| {
            for t in account
                .transactions
                .iter_mut()
                .filter(|t| targets.contains(t.id.as_str()))
            {
                t.category = category.to_string();
            }
            delta = categories::grow_vocabulary(&mut account.custom_categories, category);
        })?;
        self.selection.clear();
        Ok(delta)
    }

    /// Remove every record in `ids`, then clear the selection.
    pub fn bulk_delete(&mut self, ids: &[String]) -> Result<usize, FintracksError> {
        let targets: HashSet<&str> = ids.iter().map(String::as_str).collect();
        let before = self.len();
        self.commit(|account| {
            account
                .transactions
                .retain(|t| !targets.contains(t.id.as_str()))
        })?;
        self.selection.clear();
        Ok(before - self.len())
    }

    /// Drop every record. Confirmation is the caller's job.
    pub fn clear_all(&mut self) -> Result<usize, FintracksError> {
        let removed = self.len();
        self.commit(|account| account.transactions.clear())?;
        self.selection.clear();
        info!("Cleared {} transaction(s) for '{}'", removed, self.session.username());
        Ok(removed)
    }

    /// Remove records repeating an earlier record's (date, description,
    /// amount). The first occurrence is kept. Never run implicitly.
    pub fn dedupe(&mut self) -> Result<usize, FintracksError> {
        let before = self.len();
        self.commit(|account| {
            let mut seen: HashSet<(String, String, u64)> = HashSet::new();
            account.transactions.retain(|t| {
                seen.insert((t.date.clone(), t.description.clone(), t.amount.to_bits()))
            });
        })?;
        let removed = before - self.len();
        self.selection.retain(|id| {
            self.account.transactions.iter().any(|t| &t.id == id)
        });
        debug!("Dedupe removed {} record(s)", removed);
        Ok(removed)
    }

    // ── Selection ────────────────────────────────────────────────────────

    /// Mark `id` for a bulk action; `false` if no such record.
    pub fn select(&mut self, id: &str) -> bool {
        if self.get(id).is_none() {
            return false;
        }
        self.selection.insert(id.to_string());
        true
    }

    pub fn deselect(&mut self, id: &str) {
        self.selection.remove(id);
    }

    pub fn select_all(&mut self) {
        self.selection = self.account.transactions.iter().map(|t| t.id.clone()).collect();
    }

    pub fn clear_selection(&mut self) {
        self.selection.clear();
    }

    pub fn is_selected(&self, id: &str) -> bool {
        self.selection.contains(id)
    }

    /// Selected ids, in ledger order.
    pub fn selected(&self) -> Vec<String> {
        self.account
            .transactions
            .iter()
            .filter(|t| self.selection.contains(&t.id))
            .map(|t| t.id.clone())
            .collect()
    }

    /// Apply `change` to a copy of the account, persist it, then adopt it.
    fn commit(&mut self, change: impl FnOnce(&mut UserAccount)) -> Result<(), FintracksError> {
        let mut next = self.account.clone();
        change(&mut next);
        store::save_account(self.store.as_ref(), &next)?;
        self.account = next;
        Ok(())
    }
}
