use chrono::NaiveDateTime;
use std::fs::File;
use std::io::{BufWriter, Read, Write};
use std::path::Path;

use kassensturz_core::{Amount, Category, Transaction, TransactionBatch};

use crate::error::ExportError;

pub const FILE_HEADER: [&str; 6] = ["Date", "Amount", "Category", "Title", "Note", "Account"];
pub const DATE_FORMAT: &str = "%d/%m/%Y %H:%M";
pub const PREVIEW_ROWS: usize = 5;

/// Writes batches as the budgeting app's CSV import file.
#[derive(Debug, Clone, Copy, Default)]
pub struct FileExporter;

fn record(tx: &Transaction) -> [String; 6] {
    [
        tx.date.format(DATE_FORMAT).to_string(),
        tx.amount.to_string(),
        tx.category.name().to_string(),
        tx.title.clone(),
        tx.note.clone().unwrap_or_default(),
        tx.account.clone().unwrap_or_default(),
    ]
}

impl FileExporter {
    pub fn new() -> Self {
        FileExporter
    }

    /// Writes header and rows; returns the number of rows.
    pub fn write_to<W: Write>(
        &self,
        batch: &TransactionBatch,
        writer: W,
    ) -> Result<usize, ExportError> {
        let mut csv = csv::Writer::from_writer(writer);
        csv.write_record(FILE_HEADER)?;
        for tx in batch {
            csv.write_record(record(tx))?;
        }
        csv.flush()?;
        Ok(batch.len())
    }

    pub fn write_file(&self, batch: &TransactionBatch, path: &Path) -> Result<usize, ExportError> {
        let file = File::create(path)?;
        let rows = self.write_to(batch, BufWriter::new(file))?;
        tracing::info!(path = %path.display(), rows, "Wrote export file");
        Ok(rows)
    }

    /// Header plus the first five rows, as they would be written.
    pub fn preview(&self, batch: &TransactionBatch) -> Result<String, ExportError> {
        let head = TransactionBatch::new(
            batch.source.clone(),
            batch.iter().take(PREVIEW_ROWS).cloned().collect(),
        );
        let mut buf = Vec::new();
        self.write_to(&head, &mut buf)?;
        String::from_utf8(buf).map_err(|e| ExportError::InvalidRow {
            line: 0,
            reason: e.to_string(),
        })
    }

    /// Parses an export file back into transactions.
    ///
    /// The file carries neither currency nor subcategory; `currency` is
    /// applied to every row and subcategories come back empty.
    pub fn read_export<R: Read>(
        &self,
        reader: R,
        currency: &str,
    ) -> Result<Vec<Transaction>, ExportError> {
        let mut csv = csv::Reader::from_reader(reader);
        let headers = csv.headers()?;
        if headers.iter().ne(FILE_HEADER) {
            return Err(ExportError::InvalidRow {
                line: 1,
                reason: format!(
                    "unexpected header '{}'",
                    headers.iter().collect::<Vec<_>>().join(",")
                ),
            });
        }

        let mut out = Vec::new();
        for result in csv.records() {
            let rec = result?;
            let line = rec.position().map_or(0, |p| p.line() as usize);
            let invalid = |reason: String| ExportError::InvalidRow { line, reason };
            let field = |i: usize| rec.get(i).unwrap_or("");

            let date = NaiveDateTime::parse_from_str(field(0), DATE_FORMAT)
                .map_err(|e| invalid(format!("date '{}': {e}", field(0))))?;
            let amount = Amount::parse(field(1)).map_err(|e| invalid(e.to_string()))?;
            let category = Category::from_name(field(2)).map_err(|e| invalid(e.to_string()))?;

            let mut tx =
                Transaction::new(date, amount, currency, field(3)).with_category(category, None);
            if !field(4).is_empty() {
                tx = tx.with_note(field(4));
            }
            if !field(5).is_empty() {
                tx = tx.with_account(field(5));
            }
            out.push(tx);
        }
        Ok(out)
    }
}
