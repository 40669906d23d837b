use std::collections::HashMap;

use kassensturz_core::{CategoryMapping, DateWindow, MappingTable, Transaction, TransactionBatch};

use crate::error::ImportError;

/// Per-institution load/transform protocol.
///
/// Implementors provide the two steps; the orchestration lives in [`Process`]
/// so every institution filters and assembles batches the same way.
pub trait Processor {
    /// What `load_data` reads from: a path, an account id, ...
    type Source: ?Sized;
    /// Institution-specific intermediate rows.
    type Raw;

    fn name(&self) -> &str;

    /// Reads the source and drops rows outside `window` at the source level.
    fn load_data(&self, source: &Self::Source, window: &DateWindow)
        -> Result<Self::Raw, ImportError>;

    /// Maps raw rows to transactions. Unknown labels become uncategorized.
    fn transform_data(&self, raw: Self::Raw) -> Vec<Transaction>;

    /// Replaces the mapping snapshot used by later `transform_data` calls.
    fn set_category_mapper(&mut self, table: &MappingTable);
}

/// Fixed orchestration over any [`Processor`].
///
/// The blanket impl below is the only impl, so no processor can change how a
/// batch is assembled.
pub trait Process: Processor {
    fn process(
        &self,
        source: &Self::Source,
        window: &DateWindow,
    ) -> Result<TransactionBatch, ImportError> {
        let raw = self.load_data(source, window)?;
        let transformed = self.transform_data(raw);
        let loaded = transformed.len();

        // Source-level filters may work on a coarser granularity than the
        // normalised timestamp, so filter again.
        let transactions: Vec<Transaction> = transformed
            .into_iter()
            .filter(|t| window.contains(t.date))
            .collect();

        let batch = TransactionBatch::new(self.name(), transactions);
        let uncategorized = batch.uncategorized_count();
        if uncategorized > 0 {
            tracing::warn!(
                processor = self.name(),
                uncategorized,
                "Some transactions have no category mapping"
            );
        }
        tracing::info!(
            processor = self.name(),
            window = %window,
            loaded,
            kept = batch.len(),
            "Processed transactions"
        );
        Ok(batch)
    }
}

impl<P: Processor + ?Sized> Process for P {}

/// Case-insensitive lookup over a [`MappingTable`] snapshot.
#[derive(Debug, Clone, Default)]
pub struct CategoryResolver {
    mappings: HashMap<String, CategoryMapping>,
}

fn normalise(label: &str) -> String {
    label.trim().to_lowercase()
}

impl CategoryResolver {
    pub fn new(table: &MappingTable) -> Self {
        let mappings = table
            .iter()
            .map(|(label, mapping)| (normalise(label), *mapping))
            .collect();
        CategoryResolver { mappings }
    }

    pub fn len(&self) -> usize {
        self.mappings.len()
    }

    pub fn is_empty(&self) -> bool {
        self.mappings.is_empty()
    }

    /// Resolves a row's candidate labels, highest priority first.
    ///
    /// Every candidate is tried as a whole; the first candidate is also tried
    /// word by word so "Coop Pronto Zürich HB" finds a `coop` entry.
    pub fn resolve<S: AsRef<str>>(&self, labels: &[S]) -> CategoryMapping {
        let mut candidates = labels
            .iter()
            .map(|l| normalise(l.as_ref()))
            .filter(|l| !l.is_empty());

        if let Some(first) = candidates.next() {
            if let Some(m) = self.mappings.get(&first) {
                return *m;
            }
            if let Some(m) = first.split_whitespace().find_map(|w| self.mappings.get(w)) {
                return *m;
            }
        }
        candidates
            .find_map(|l| self.mappings.get(&l).copied())
            .unwrap_or_else(CategoryMapping::uncategorized)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use kassensturz_core::{Amount, Category, CategoryMapper, Subcategory};
    use std::cell::Cell;

    fn table() -> MappingTable {
        let mut mapper = CategoryMapper::new();
        mapper
            .add_mapping("Coop", Category::Essentials, Some(Subcategory::Groceries))
            .unwrap();
        mapper
            .add_mapping("EATING PLACES, RESTAURANTS", Category::Dining, Some(Subcategory::Social))
            .unwrap();
        mapper.add_mapping("Travel", Category::Travel, None).unwrap();
        mapper.export()
    }

    // ── CategoryResolver ──

    #[test]
    fn resolve_is_case_insensitive() {
        let r = CategoryResolver::new(&table());
        assert_eq!(r.resolve(&["COOP"]).category, Category::Essentials);
        assert_eq!(r.resolve(&["  coop "]).category, Category::Essentials);
    }

    #[test]
    fn resolve_matches_words_of_first_candidate() {
        let r = CategoryResolver::new(&table());
        let m = r.resolve(&["Coop Pronto Zürich HB", "Shopping"]);
        assert_eq!(m.subcategory, Some(Subcategory::Groceries));
    }

    #[test]
    fn resolve_falls_through_candidates_in_order() {
        let r = CategoryResolver::new(&table());
        let m = r.resolve(&["Trattoria Sempre", "", "Eating places, restaurants", "Travel"]);
        assert_eq!(m.category, Category::Dining);
    }

    #[test]
    fn later_candidates_need_exact_match() {
        let r = CategoryResolver::new(&table());
        assert!(r.resolve(&["Unknown", "Travel agency"]).is_uncategorized());
    }

    #[test]
    fn resolve_miss_is_uncategorized() {
        let r = CategoryResolver::new(&table());
        let m = r.resolve(&["Kiosk"]);
        assert_eq!(m, CategoryMapping::uncategorized());
        let none: [&str; 0] = [];
        assert!(r.resolve(&none).is_uncategorized());
    }

    // ── Process orchestration ──

    struct FixedProcessor {
        rows: Vec<(NaiveDate, i64, &'static str)>,
        resolver: CategoryResolver,
        loads: Cell<usize>,
    }

    impl Processor for FixedProcessor {
        type Source = str;
        type Raw = Vec<(NaiveDate, i64, &'static str)>;

        fn name(&self) -> &str {
            "fixed"
        }

        // Deliberately ignores the window so `process` has to filter.
        fn load_data(&self, _source: &str, _window: &DateWindow) -> Result<Self::Raw, ImportError> {
            self.loads.set(self.loads.get() + 1);
            Ok(self.rows.clone())
        }

        fn transform_data(&self, raw: Self::Raw) -> Vec<Transaction> {
            raw.into_iter()
                .map(|(date, amount, label)| {
                    let m = self.resolver.resolve(&[label]);
                    Transaction::on_date(date, Amount::from(amount), "CHF", label)
                        .with_category(m.category, m.subcategory)
                })
                .collect()
        }

        fn set_category_mapper(&mut self, table: &MappingTable) {
            self.resolver = CategoryResolver::new(table);
        }
    }

    fn d(m: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, m, day).unwrap()
    }

    fn fixed() -> FixedProcessor {
        FixedProcessor {
            rows: vec![
                (d(2, 27), -1, "Coop"),
                (d(3, 1), -2, "Coop"),
                (d(3, 31), -3, "Kiosk"),
                (d(4, 1), -4, "Coop"),
            ],
            resolver: CategoryResolver::default(),
            loads: Cell::new(0),
        }
    }

    #[test]
    fn process_refilters_on_date() {
        let p = fixed();
        let batch = p.process("", &DateWindow::between(d(3, 1), d(3, 31))).unwrap();
        assert_eq!(batch.source, "fixed");
        let amounts: Vec<_> = batch.iter().map(|t| t.amount).collect();
        assert_eq!(amounts, vec![Amount::from(-2_i64), Amount::from(-3_i64)]);
        assert_eq!(p.loads.get(), 1);
    }

    #[test]
    fn process_with_inverted_window_is_empty() {
        let p = fixed();
        let batch = p.process("", &DateWindow::between(d(4, 1), d(3, 1))).unwrap();
        assert!(batch.is_empty());
    }

    #[test]
    fn mapper_applies_to_later_calls_only() {
        let mut p = fixed();
        let before = p.process("", &DateWindow::unbounded()).unwrap();
        assert_eq!(before.uncategorized_count(), 4);

        p.set_category_mapper(&table());
        let after = p.process("", &DateWindow::unbounded()).unwrap();
        assert_eq!(after.uncategorized_count(), 1);
        assert_eq!(before.uncategorized_count(), 4);
    }

    #[test]
    fn process_is_repeatable() {
        let p = fixed();
        let w = DateWindow::unbounded();
        assert_eq!(p.process("", &w).unwrap(), p.process("", &w).unwrap());
    }
}
