use kassensturz_core::{Amount, DateWindow, MappingTable, Transaction};

use crate::api::{AccountApi, ApiTransaction};
use crate::error::ImportError;
use crate::processor::{CategoryResolver, Processor};

pub const DEFAULT_PAGE_SIZE: usize = 100;

/// Pulls card transactions from an [`AccountApi`] session.
///
/// The source passed to `load_data` is the account (card) id.
pub struct RemoteAccountProcessor<A> {
    name: String,
    api: A,
    page_size: usize,
    resolver: CategoryResolver,
}

impl<A: AccountApi> RemoteAccountProcessor<A> {
    pub fn new(name: impl Into<String>, api: A) -> Self {
        RemoteAccountProcessor {
            name: name.into(),
            api,
            page_size: DEFAULT_PAGE_SIZE,
            resolver: CategoryResolver::default(),
        }
    }

    pub fn with_page_size(mut self, page_size: usize) -> Self {
        self.page_size = page_size.max(1);
        self
    }

    pub fn api(&self) -> &A {
        &self.api
    }
}

impl<A: AccountApi> Processor for RemoteAccountProcessor<A> {
    type Source = str;
    type Raw = Vec<ApiTransaction>;

    fn name(&self) -> &str {
        &self.name
    }

    fn load_data(
        &self,
        account_id: &str,
        window: &DateWindow,
    ) -> Result<Vec<ApiTransaction>, ImportError> {
        let mut rows = Vec::new();
        let mut offset = 0usize;
        loop {
            let page = self.api.fetch_page(account_id, offset, self.page_size)?;
            if page.transactions.is_empty() {
                break;
            }
            offset += page.transactions.len();
            let oldest = page.transactions.iter().map(|t| t.date.date()).min();
            tracing::debug!(
                processor = %self.name,
                offset,
                fetched = page.transactions.len(),
                total = ?page.total_count,
                "Fetched transaction page"
            );
            rows.extend(page.transactions.into_iter().filter(|t| window.contains(t.date)));

            if page.total_count.is_some_and(|total| offset >= total) {
                break;
            }
            // Pages are newest first, so nothing later can be in range.
            if oldest.is_some_and(|d| window.is_before(d)) {
                break;
            }
        }
        Ok(rows)
    }

    fn transform_data(&self, raw: Vec<ApiTransaction>) -> Vec<Transaction> {
        raw.into_iter()
            .map(|t| {
                let merchant = t.merchant_name.clone().unwrap_or_default();
                let pfm = t.pfm_category.as_ref().map(|c| c.name.clone()).unwrap_or_default();
                let mapping = self.resolver.resolve(&[merchant.as_str(), pfm.as_str()]);

                let title = [&t.pretty_name, &t.merchant_name, &t.details]
                    .into_iter()
                    .flatten()
                    .find(|s| !s.trim().is_empty())
                    .cloned()
                    .unwrap_or_default();

                Transaction::new(t.date, -Amount::new(t.amount), t.currency, title)
                    .with_category(mapping.category, mapping.subcategory)
                    .with_account(self.name.clone())
            })
            .collect()
    }

    fn set_category_mapper(&mut self, table: &MappingTable) {
        self.resolver = CategoryResolver::new(table);
    }
}
