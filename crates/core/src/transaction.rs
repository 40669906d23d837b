use chrono::{NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use super::amount::Amount;
use super::taxonomy::{validate_pair, Category, Subcategory, TaxonomyError};
use super::window::DateWindow;

/// One normalised financial event.
///
/// Construction does not re-check the category/subcategory pair; mappings are
/// validated when they are created. Call [`Transaction::validate_category`]
/// when building transactions by hand.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Transaction {
    pub date: NaiveDateTime,
    pub amount: Amount,
    pub currency: String,
    pub category: Category,
    pub subcategory: Option<Subcategory>,
    pub title: String,
    pub note: Option<String>,
    pub account: Option<String>,
}

impl Transaction {
    pub fn new(
        date: NaiveDateTime,
        amount: Amount,
        currency: impl Into<String>,
        title: impl Into<String>,
    ) -> Self {
        Transaction {
            date,
            amount,
            currency: currency.into(),
            category: Category::Uncategorized,
            subcategory: None,
            title: title.into(),
            note: None,
            account: None,
        }
    }

    /// Midnight is used when the source only knows the calendar date.
    pub fn on_date(
        date: NaiveDate,
        amount: Amount,
        currency: impl Into<String>,
        title: impl Into<String>,
    ) -> Self {
        Self::new(date.and_time(chrono::NaiveTime::MIN), amount, currency, title)
    }

    pub fn with_category(mut self, category: Category, subcategory: Option<Subcategory>) -> Self {
        self.category = category;
        self.subcategory = subcategory;
        self
    }

    pub fn with_note(mut self, note: impl Into<String>) -> Self {
        self.note = Some(note.into());
        self
    }

    pub fn with_account(mut self, account: impl Into<String>) -> Self {
        self.account = Some(account.into());
        self
    }

    pub fn is_uncategorized(&self) -> bool {
        self.category == Category::Uncategorized
    }

    pub fn validate_category(&self) -> Result<(), TaxonomyError> {
        validate_pair(self.category, self.subcategory)
    }
}

/// Ordered output of one processing run.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct TransactionBatch {
    pub source: String,
    pub transactions: Vec<Transaction>,
}

impl TransactionBatch {
    pub fn new(source: impl Into<String>, transactions: Vec<Transaction>) -> Self {
        TransactionBatch {
            source: source.into(),
            transactions,
        }
    }

    pub fn len(&self) -> usize {
        self.transactions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.transactions.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Transaction> {
        self.transactions.iter()
    }

    pub fn into_transactions(self) -> Vec<Transaction> {
        self.transactions
    }

    /// Net amount per currency. No conversion between currencies is attempted.
    pub fn total_by_currency(&self) -> BTreeMap<String, Amount> {
        let mut totals = BTreeMap::new();
        for tx in &self.transactions {
            let entry = totals.entry(tx.currency.clone()).or_insert_with(Amount::zero);
            *entry = *entry + tx.amount;
        }
        totals
    }

    pub fn expenses(&self) -> impl Iterator<Item = &Transaction> {
        self.transactions.iter().filter(|t| t.amount.is_expense())
    }

    pub fn income(&self) -> impl Iterator<Item = &Transaction> {
        self.transactions.iter().filter(|t| t.amount.is_income())
    }

    pub fn uncategorized_count(&self) -> usize {
        self.transactions.iter().filter(|t| t.is_uncategorized()).count()
    }

    /// Earliest and latest timestamps, or `None` for an empty batch.
    pub fn date_span(&self) -> Option<(NaiveDateTime, NaiveDateTime)> {
        let min = self.transactions.iter().map(|t| t.date).min()?;
        let max = self.transactions.iter().map(|t| t.date).max()?;
        Some((min, max))
    }

    /// Copy of this batch keeping only transactions inside `window`.
    pub fn within(&self, window: &DateWindow) -> TransactionBatch {
        TransactionBatch {
            source: self.source.clone(),
            transactions: self
                .transactions
                .iter()
                .filter(|t| window.contains(t.date))
                .cloned()
                .collect(),
        }
    }
}

impl IntoIterator for TransactionBatch {
    type Item = Transaction;
    type IntoIter = std::vec::IntoIter<Transaction>;

    fn into_iter(self) -> Self::IntoIter {
        self.transactions.into_iter()
    }
}

impl<'a> IntoIterator for &'a TransactionBatch {
    type Item = &'a Transaction;
    type IntoIter = std::slice::Iter<'a, Transaction>;

    fn into_iter(self) -> Self::IntoIter {
        self.transactions.iter()
    }
}
