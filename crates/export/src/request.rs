use serde::Serialize;
use std::time::Duration;

use kassensturz_core::{Category, Transaction, TransactionBatch};

use crate::dispatch::{CancelFlag, DispatchReport, Dispatcher};
use crate::error::ExportError;

/// Upper bound on transactions encoded into one import link.
pub const MAX_TRANSACTIONS_PER_REQUEST: usize = 25;
pub const DEFAULT_BASE_URL: &str = "https://budget-track.web.app";
pub const DEFAULT_PAUSE: Duration = Duration::from_secs(10);

const ISO_DATE_TIME: &str = "%Y-%m-%dT%H:%M:%S";

/// One import link covering a group of transactions.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImportRequest {
    /// Position of the group within the batch, starting at 0.
    pub index: usize,
    pub transaction_count: usize,
    pub url: String,
}

#[derive(Debug, Serialize)]
struct ImportTransaction<'a> {
    date: String,
    title: &'a str,
    amount: f64,
    currency: &'a str,
    category: Option<&'static str>,
    subcategory: Option<&'static str>,
    account: Option<&'a str>,
    notes: Option<&'a str>,
}

impl<'a> From<&'a Transaction> for ImportTransaction<'a> {
    fn from(tx: &'a Transaction) -> Self {
        ImportTransaction {
            date: tx.date.format(ISO_DATE_TIME).to_string(),
            title: &tx.title,
            amount: tx.amount.to_f64(),
            currency: &tx.currency,
            // Left empty so the app files it under its own default.
            category: (tx.category != Category::Uncategorized).then(|| tx.category.name()),
            subcategory: tx.subcategory.map(|s| s.name()),
            account: tx.account.as_deref(),
            notes: tx.note.as_deref(),
        }
    }
}

#[derive(Debug, Serialize)]
struct ImportPayload<'a> {
    transactions: Vec<ImportTransaction<'a>>,
}

/// Turns a batch into size-bounded import links for the budgeting app.
#[derive(Debug, Clone)]
pub struct RequestBatchExporter {
    base_url: String,
    route_only: bool,
    pause: Duration,
}

impl Default for RequestBatchExporter {
    fn default() -> Self {
        Self::new(DEFAULT_BASE_URL)
    }
}

impl RequestBatchExporter {
    pub fn new(base_url: impl Into<String>) -> Self {
        RequestBatchExporter {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            route_only: false,
            pause: DEFAULT_PAUSE,
        }
    }

    /// Targets `/addTransactionRoute`, which opens the form without saving.
    pub fn route_only(mut self, route_only: bool) -> Self {
        self.route_only = route_only;
        self
    }

    /// Wait between two dispatched groups.
    pub fn with_pause(mut self, pause: Duration) -> Self {
        self.pause = pause;
        self
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn endpoint(&self) -> String {
        let path = if self.route_only {
            "/addTransactionRoute"
        } else {
            "/addTransaction"
        };
        format!("{}{}", self.base_url, path)
    }

    /// Consecutive groups of at most [`MAX_TRANSACTIONS_PER_REQUEST`], in
    /// batch order.
    pub fn groups<'a>(&self, batch: &'a TransactionBatch) -> std::slice::Chunks<'a, Transaction> {
        batch.transactions.chunks(MAX_TRANSACTIONS_PER_REQUEST)
    }

    pub fn group_url(&self, group: &[Transaction]) -> Result<String, ExportError> {
        let payload = ImportPayload {
            transactions: group.iter().map(ImportTransaction::from).collect(),
        };
        let json = serde_json::to_string(&payload)?;
        Ok(format!("{}?JSON={}", self.endpoint(), urlencoding::encode(&json)))
    }

    /// Plain query-string link for a single transaction.
    pub fn single_transaction_url(&self, tx: &Transaction) -> String {
        let amount = tx.amount.to_string();
        let date = tx.date.date().format("%Y-%m-%d").to_string();
        let mut params: Vec<(&str, &str)> = vec![("amount", amount.as_str())];
        if !tx.title.is_empty() {
            params.push(("title", tx.title.as_str()));
        }
        if let Some(note) = tx.note.as_deref().filter(|n| !n.is_empty()) {
            params.push(("notes", note));
        }
        params.push(("date", date.as_str()));
        if tx.category != Category::Uncategorized {
            params.push(("category", tx.category.name()));
        }
        if let Some(sub) = tx.subcategory {
            params.push(("subcategory", sub.name()));
        }
        if let Some(account) = tx.account.as_deref() {
            params.push(("account", account));
        }
        let query = params
            .iter()
            .map(|(k, v)| format!("{k}={}", urlencoding::encode(v)))
            .collect::<Vec<_>>()
            .join("&");
        format!("{}?{}", self.endpoint(), query)
    }

    /// Every request that `dispatch` would send, without sending anything.
    pub fn dry_run(&self, batch: &TransactionBatch) -> Result<Vec<ImportRequest>, ExportError> {
        self.groups(batch)
            .enumerate()
            .map(|(index, group)| -> Result<ImportRequest, ExportError> {
                Ok(ImportRequest {
                    index,
                    transaction_count: group.len(),
                    url: self.group_url(group)?,
                })
            })
            .collect()
    }

    /// The first request only, for a quick check in the browser.
    pub fn preview(&self, batch: &TransactionBatch) -> Result<Option<ImportRequest>, ExportError> {
        match self.groups(batch).next() {
            Some(group) => Ok(Some(ImportRequest {
                index: 0,
                transaction_count: group.len(),
                url: self.group_url(group)?,
            })),
            None => Ok(None),
        }
    }

    /// Sends every group in order, one at a time.
    ///
    /// A failed group is recorded in the report and the remaining groups are
    /// still sent. Nothing is retried. Once `cancel` is set no further group
    /// is started.
    pub fn dispatch(
        &self,
        batch: &TransactionBatch,
        dispatcher: &dyn Dispatcher,
        cancel: &CancelFlag,
    ) -> Result<DispatchReport, ExportError> {
        let requests = self.dry_run(batch)?;
        let mut report = DispatchReport::new(requests.len());

        for (i, request) in requests.iter().enumerate() {
            if cancel.is_cancelled() {
                report.cancelled = true;
                break;
            }
            if i > 0 && !self.pause.is_zero() && cancel.wait(self.pause) {
                report.cancelled = true;
                break;
            }
            tracing::debug!(
                group = request.index + 1,
                of = report.total,
                transactions = request.transaction_count,
                "Dispatching import request"
            );
            match dispatcher.dispatch(request) {
                Ok(()) => report.dispatched += 1,
                Err(err) => {
                    tracing::warn!(
                        group = request.index + 1,
                        error = %err,
                        "Import request failed"
                    );
                    report.failed.push((request.index, err));
                }
            }
        }

        tracing::info!(
            dispatched = report.dispatched,
            failed = report.failed.len(),
            total = report.total,
            cancelled = report.cancelled,
            "Dispatch finished"
        );
        Ok(report)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use kassensturz_core::{Amount, Subcategory};

    fn tx(i: usize) -> Transaction {
        Transaction::on_date(
            NaiveDate::from_ymd_opt(2025, 3, 1).unwrap(),
            Amount::from(-(i as i64)),
            "CHF",
            format!("Item {i}"),
        )
    }

    fn batch(n: usize) -> TransactionBatch {
        TransactionBatch::new("test", (0..n).map(tx).collect())
    }

    fn decoded_payload(url: &str) -> serde_json::Value {
        let (_, encoded) = url.split_once("?JSON=").unwrap();
        let json = urlencoding::decode(encoded).unwrap();
        serde_json::from_str(&json).unwrap()
    }

    #[test]
    fn group_count_is_ceiling_of_len_over_cap() {
        let exporter = RequestBatchExporter::default();
        for (n, expected) in [(0, 0), (1, 1), (25, 1), (26, 2), (50, 2), (51, 3), (73, 3)] {
            assert_eq!(exporter.groups(&batch(n)).count(), expected, "n = {n}");
            assert_eq!(exporter.dry_run(&batch(n)).unwrap().len(), expected, "n = {n}");
        }
    }

    #[test]
    fn groups_preserve_order_and_cap() {
        let exporter = RequestBatchExporter::default();
        let b = batch(60);
        let requests = exporter.dry_run(&b).unwrap();
        let counts: Vec<usize> = requests.iter().map(|r| r.transaction_count).collect();
        assert_eq!(counts, vec![25, 25, 10]);

        let titles: Vec<String> = requests
            .iter()
            .flat_map(|r| {
                decoded_payload(&r.url)["transactions"]
                    .as_array()
                    .unwrap()
                    .iter()
                    .map(|t| t["title"].as_str().unwrap().to_string())
                    .collect::<Vec<_>>()
            })
            .collect();
        let expected: Vec<String> = b.iter().map(|t| t.title.clone()).collect();
        assert_eq!(titles, expected);
    }

    #[test]
    fn url_shape_and_payload_fields() {
        let t = tx(3)
            .with_category(Category::Dining, Some(Subcategory::Social))
            .with_note("Team & friends")
            .with_account("Sanzio");
        let url = RequestBatchExporter::default()
            .group_url(std::slice::from_ref(&t))
            .unwrap();
        assert!(url.starts_with("https://budget-track.web.app/addTransaction?JSON=%7B"));
        assert!(!url.contains(' '));
        assert!(!url.contains('&'));

        let payload = decoded_payload(&url);
        let first = &payload["transactions"][0];
        assert_eq!(first["date"], "2025-03-01T00:00:00");
        assert_eq!(first["amount"], -3.0);
        assert_eq!(first["currency"], "CHF");
        assert_eq!(first["category"], "Dining");
        assert_eq!(first["subcategory"], "Social");
        assert_eq!(first["account"], "Sanzio");
        assert_eq!(first["notes"], "Team & friends");
    }

    #[test]
    fn uncategorized_is_sent_as_null() {
        let url = RequestBatchExporter::default().group_url(&[tx(1)]).unwrap();
        let payload = decoded_payload(&url);
        assert!(payload["transactions"][0]["category"].is_null());
        assert!(payload["transactions"][0]["notes"].is_null());
    }

    #[test]
    fn route_only_and_custom_base() {
        let url = RequestBatchExporter::new("https://cashewapp.web.app/")
            .route_only(true)
            .group_url(&[tx(1)])
            .unwrap();
        assert!(url.starts_with("https://cashewapp.web.app/addTransactionRoute?JSON="));
    }

    #[test]
    fn single_transaction_link() {
        let t = tx(12)
            .with_category(Category::Essentials, Some(Subcategory::Groceries))
            .with_account("ZKB");
        let url = RequestBatchExporter::default().single_transaction_url(&t);
        assert_eq!(
            url,
            "https://budget-track.web.app/addTransaction?amount=-12&title=Item%2012&date=2025-03-01&category=Essentials&subcategory=Groceries&account=ZKB"
        );
    }

    #[test]
    fn preview_is_first_group_only() {
        let exporter = RequestBatchExporter::default();
        assert_eq!(exporter.preview(&batch(0)).unwrap(), None);
        let preview = exporter.preview(&batch(40)).unwrap().unwrap();
        assert_eq!(preview.index, 0);
        assert_eq!(preview.transaction_count, 25);
        assert_eq!(preview, exporter.dry_run(&batch(40)).unwrap()[0]);
    }
}
