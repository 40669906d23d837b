use chrono::{NaiveDate, NaiveDateTime};
use std::collections::HashMap;
use std::io::Read;
use std::path::Path;

use kassensturz_core::{Amount, DateWindow, MappingTable, Transaction};

use crate::error::ImportError;
use crate::layout::{AmountColumns, CurrencyColumn, TableLayout};
use crate::processor::{CategoryResolver, Processor};

/// One data row after column extraction, before categorisation.
#[derive(Debug, Clone, PartialEq)]
pub struct TabularRow {
    /// 1-based line in the source file.
    pub line: usize,
    pub date: NaiveDateTime,
    pub amount: Amount,
    pub currency: String,
    pub title: String,
    pub labels: Vec<String>,
    pub note: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct TabularData {
    pub institution: String,
    pub rows: Vec<TabularRow>,
}

/// Reads CSV exports whose column layout is one of a known set.
pub struct TabularProcessor {
    name: String,
    layouts: Vec<TableLayout>,
    account: Option<String>,
    resolver: CategoryResolver,
}

impl TabularProcessor {
    pub fn new(layouts: Vec<TableLayout>) -> Self {
        TabularProcessor {
            name: "tabular".to_string(),
            layouts,
            account: None,
            resolver: CategoryResolver::default(),
        }
    }

    /// Detects among all built-in layouts.
    pub fn auto() -> Self {
        Self::new(TableLayout::builtin())
    }

    pub fn for_layout(layout: TableLayout) -> Self {
        let name = layout.institution.clone();
        TabularProcessor {
            name,
            ..Self::new(vec![layout])
        }
    }

    /// Account label stamped on every transaction. Defaults to the detected
    /// institution.
    pub fn with_account(mut self, account: impl Into<String>) -> Self {
        self.account = Some(account.into());
        self
    }

    pub fn layouts(&self) -> &[TableLayout] {
        &self.layouts
    }

    /// Same as `load_data` for in-memory uploads. Input that is not UTF-8 is
    /// read as Latin-1, which covers the umlauts of Windows-1252 exports.
    pub fn load_reader<R: Read>(
        &self,
        mut reader: R,
        window: &DateWindow,
    ) -> Result<TabularData, ImportError> {
        let mut bytes = Vec::new();
        reader.read_to_end(&mut bytes)?;
        let text = match String::from_utf8(bytes) {
            Ok(text) => text,
            Err(err) => {
                tracing::debug!("Input is not UTF-8, decoding as Latin-1");
                err.into_bytes().into_iter().map(char::from).collect()
            }
        };
        self.parse(text.trim_start_matches('\u{feff}'), window)
    }

    fn detect<'a>(&'a self, text: &str) -> Result<(&'a TableLayout, usize), ImportError> {
        let mut problems = Vec::new();
        for layout in &self.layouts {
            let delimiter = delimiter_byte(layout)?;
            let header = text.lines().enumerate().find_map(|(idx, line)| {
                let fields = split_line(line, delimiter);
                fields.iter().any(|f| f == &layout.date_column).then_some((idx, fields))
            });
            let Some((idx, fields)) = header else {
                problems.push(format!(
                    "{}: no header with '{}'",
                    layout.institution, layout.date_column
                ));
                continue;
            };
            let missing: Vec<&str> = layout
                .required_columns()
                .into_iter()
                .filter(|c| !fields.iter().any(|f| f.as_str() == *c))
                .collect();
            if missing.is_empty() {
                tracing::debug!(
                    layout = %layout.institution,
                    header_line = idx + 1,
                    "Detected layout"
                );
                return Ok((layout, idx));
            }
            problems.push(format!(
                "{}: missing columns {}",
                layout.institution,
                missing.join(", ")
            ));
        }
        Err(ImportError::UnsupportedFormat(format!(
            "no known layout fits ({})",
            problems.join("; ")
        )))
    }

    fn parse(&self, text: &str, window: &DateWindow) -> Result<TabularData, ImportError> {
        let (layout, header_idx) = self.detect(text)?;
        let body = text.lines().skip(header_idx).collect::<Vec<_>>().join("\n");

        let mut reader = csv::ReaderBuilder::new()
            .delimiter(delimiter_byte(layout)?)
            .flexible(true)
            .trim(csv::Trim::All)
            .from_reader(body.as_bytes());

        let headers = reader.headers().map_err(format_error)?.clone();
        let index: HashMap<&str, usize> = headers.iter().enumerate().map(|(i, h)| (h, i)).collect();

        let mut rows = Vec::new();
        let mut skipped = 0usize;
        for result in reader.records() {
            let record = result.map_err(format_error)?;
            let line = header_idx + record.position().map_or(0, |p| p.line() as usize);
            let get = |col: &str| index.get(col).and_then(|&i| record.get(i)).unwrap_or("");

            let raw_date = get(&layout.date_column);
            if raw_date.is_empty() {
                continue;
            }
            if !layout.row_filters.iter().all(|f| f.keeps(get(f.column()))) {
                skipped += 1;
                continue;
            }

            let date = parse_timestamp(raw_date, &layout.date_formats).ok_or_else(|| {
                ImportError::UnsupportedFormat(format!("line {line}: invalid date '{raw_date}'"))
            })?;
            if !window.contains(date) {
                continue;
            }

            let amount_at = |col: &str| -> Result<Option<Amount>, ImportError> {
                let raw = get(col);
                if raw.is_empty() {
                    return Ok(None);
                }
                Amount::parse(raw).map(Some).map_err(|_| {
                    ImportError::UnsupportedFormat(format!("line {line}: invalid amount '{raw}'"))
                })
            };
            let amount = match &layout.amount {
                AmountColumns::Signed { column, negate } => {
                    let value = amount_at(column)?.ok_or_else(|| {
                        ImportError::UnsupportedFormat(format!(
                            "line {line}: missing amount in '{column}'"
                        ))
                    })?;
                    if *negate {
                        -value
                    } else {
                        value
                    }
                }
                AmountColumns::DebitCredit { debit, credit } => {
                    match (amount_at(debit)?, amount_at(credit)?) {
                        (None, None) => {
                            return Err(ImportError::UnsupportedFormat(format!(
                                "line {line}: neither '{debit}' nor '{credit}' has an amount"
                            )))
                        }
                        (debit, credit) => {
                            credit.unwrap_or_else(Amount::zero) - debit.unwrap_or_else(Amount::zero)
                        }
                    }
                }
            };

            let currency = match &layout.currency {
                CurrencyColumn::Column(col) => {
                    let code = get(col);
                    if code.is_empty() {
                        return Err(ImportError::UnsupportedFormat(format!(
                            "line {line}: missing currency in '{col}'"
                        )));
                    }
                    code.to_string()
                }
                CurrencyColumn::Fixed(code) => code.clone(),
            };

            let text_at = |col: &str| layout.cleanup_for(col).apply(get(col));
            let title = layout
                .title_columns
                .iter()
                .map(|c| text_at(c))
                .find(|t| !t.is_empty())
                .unwrap_or_default();
            let labels = layout
                .label_columns
                .iter()
                .map(|c| text_at(c))
                .filter(|t| !t.is_empty())
                .collect();
            let note = layout
                .note_column
                .as_deref()
                .map(text_at)
                .filter(|n| !n.is_empty());

            rows.push(TabularRow {
                line,
                date,
                amount,
                currency,
                title,
                labels,
                note,
            });
        }

        tracing::debug!(
            layout = %layout.institution,
            rows = rows.len(),
            skipped,
            "Parsed tabular rows"
        );
        Ok(TabularData {
            institution: layout.institution.clone(),
            rows,
        })
    }
}

impl Processor for TabularProcessor {
    type Source = Path;
    type Raw = TabularData;

    fn name(&self) -> &str {
        &self.name
    }

    fn load_data(&self, path: &Path, window: &DateWindow) -> Result<TabularData, ImportError> {
        let file = std::fs::File::open(path)
            .map_err(|e| ImportError::SourceUnavailable(format!("{}: {e}", path.display())))?;
        self.load_reader(file, window)
    }

    fn transform_data(&self, data: TabularData) -> Vec<Transaction> {
        let account = self.account.clone().unwrap_or(data.institution);
        data.rows
            .into_iter()
            .map(|row| {
                let mapping = self.resolver.resolve(&row.labels);
                let tx = Transaction::new(row.date, row.amount, row.currency, row.title)
                    .with_category(mapping.category, mapping.subcategory)
                    .with_account(account.clone());
                match row.note {
                    Some(note) => tx.with_note(note),
                    None => tx,
                }
            })
            .collect()
    }

    fn set_category_mapper(&mut self, table: &MappingTable) {
        self.resolver = CategoryResolver::new(table);
    }
}

fn delimiter_byte(layout: &TableLayout) -> Result<u8, ImportError> {
    u8::try_from(layout.delimiter).map_err(|_| {
        ImportError::UnsupportedFormat(format!(
            "{}: delimiter '{}' is not a single byte",
            layout.institution, layout.delimiter
        ))
    })
}

fn format_error(err: csv::Error) -> ImportError {
    ImportError::UnsupportedFormat(err.to_string())
}

fn split_line(line: &str, delimiter: u8) -> Vec<String> {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(false)
        .delimiter(delimiter)
        .flexible(true)
        .trim(csv::Trim::All)
        .from_reader(line.as_bytes());
    match reader.records().next() {
        Some(Ok(record)) => record.iter().map(|f| f.to_string()).collect(),
        _ => Vec::new(),
    }
}

fn parse_timestamp(s: &str, formats: &[String]) -> Option<NaiveDateTime> {
    let s = s.trim();
    formats.iter().find_map(|fmt| {
        NaiveDateTime::parse_from_str(s, fmt)
            .ok()
            .or_else(|| {
                NaiveDate::parse_from_str(s, fmt)
                    .ok()
                    .map(|d| d.and_time(chrono::NaiveTime::MIN))
            })
    })
}
