use regex::Regex;
use serde::{Deserialize, Serialize};
use std::sync::OnceLock;

/// How the signed amount is read from a row.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum AmountColumns {
    /// One signed column. `negate` flips card exports where debits are positive.
    Signed {
        column: String,
        #[serde(default)]
        negate: bool,
    },
    /// Separate debit and credit columns; amount = credit - debit.
    DebitCredit { debit: String, credit: String },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum CurrencyColumn {
    Column(String),
    Fixed(String),
}

/// Row predicate; rows failing any filter are skipped.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum RowFilter {
    Equals { column: String, value: String },
    NotEquals { column: String, value: String },
    ExcludeContaining { column: String, needles: Vec<String> },
}

impl RowFilter {
    pub fn column(&self) -> &str {
        match self {
            RowFilter::Equals { column, .. }
            | RowFilter::NotEquals { column, .. }
            | RowFilter::ExcludeContaining { column, .. } => column,
        }
    }

    pub fn keeps(&self, field: &str) -> bool {
        let field = field.trim();
        match self {
            RowFilter::Equals { value, .. } => field == value,
            RowFilter::NotEquals { value, .. } => field != value,
            RowFilter::ExcludeContaining { needles, .. } => {
                !needles.iter().any(|n| field.contains(n.as_str()))
            }
        }
    }
}

/// Institution-specific clean-up of free-text booking columns.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TextCleanup {
    #[default]
    None,
    /// `"Debit TWINT: Coop, Zürich, 123"` style account booking texts.
    BookingText,
    /// `"TWINT Belastung IKEA AG 0400003132762475"` style remittance texts.
    Remittance,
}

macro_rules! re {
    ($name:ident, $pat:expr) => {
        fn $name() -> &'static Regex {
            static R: OnceLock<Regex> = OnceLock::new();
            R.get_or_init(|| Regex::new($pat).expect("invalid regex"))
        }
    };
}

re!(trailing_reference, r"\s+0\d{5,}.*$");
re!(phone_number, r"\+41\d");

fn title_case(s: &str) -> String {
    s.split_whitespace()
        .map(|w| {
            let mut chars = w.chars();
            match chars.next() {
                Some(first) => first
                    .to_uppercase()
                    .chain(chars.flat_map(char::to_lowercase))
                    .collect(),
                None => String::new(),
            }
        })
        .collect::<Vec<String>>()
        .join(" ")
}

impl TextCleanup {
    pub fn apply(self, text: &str) -> String {
        match self {
            TextCleanup::None => text.trim().to_string(),
            TextCleanup::BookingText => clean_booking_text(text),
            TextCleanup::Remittance => clean_remittance(text),
        }
    }
}

fn clean_booking_text(text: &str) -> String {
    let body = text.rsplit(':').next().unwrap_or(text);
    let body = if body.matches(',').count() > 1 {
        body.split(',').next().unwrap_or(body)
    } else {
        body
    };
    let body = body.trim();
    if text.contains("TWINT") {
        let counterpart = body.rsplit(',').next().unwrap_or(body).trim();
        format!("TWINT {}", title_case(counterpart))
    } else {
        body.to_string()
    }
}

fn clean_remittance(text: &str) -> String {
    let mut parts = text.split(',');
    let head = parts.next().unwrap_or(text).trim();
    if !head.contains("TWINT") {
        return head.to_string();
    }
    if phone_number().is_match(text) {
        if let Some(person) = parts.next().map(str::trim).filter(|p| !p.is_empty()) {
            return format!("TWINT {person}");
        }
    }
    match head.split_once("TWINT Belastung ") {
        Some((_, merchant)) => trailing_reference().replace(merchant, "").trim().to_string(),
        None => head.to_string(),
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ColumnCleanup {
    pub column: String,
    pub cleanup: TextCleanup,
}

/// Column layout of one institution's tabular export.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TableLayout {
    pub institution: String,
    #[serde(default = "default_delimiter")]
    pub delimiter: char,
    pub date_column: String,
    /// Tried in order; date-time formats and date-only formats both work.
    pub date_formats: Vec<String>,
    /// First non-empty column wins.
    pub title_columns: Vec<String>,
    pub amount: AmountColumns,
    pub currency: CurrencyColumn,
    /// Category lookup candidates, highest priority first.
    #[serde(default)]
    pub label_columns: Vec<String>,
    #[serde(default)]
    pub note_column: Option<String>,
    #[serde(default)]
    pub row_filters: Vec<RowFilter>,
    #[serde(default)]
    pub cleanups: Vec<ColumnCleanup>,
}

fn default_delimiter() -> char {
    ','
}

impl TableLayout {
    /// Every column the layout reads.
    pub fn required_columns(&self) -> Vec<&str> {
        let mut cols: Vec<&str> = vec![self.date_column.as_str()];
        cols.extend(self.title_columns.iter().map(String::as_str));
        match &self.amount {
            AmountColumns::Signed { column, .. } => cols.push(column.as_str()),
            AmountColumns::DebitCredit { debit, credit } => {
                cols.push(debit.as_str());
                cols.push(credit.as_str());
            }
        }
        if let CurrencyColumn::Column(c) = &self.currency {
            cols.push(c.as_str());
        }
        cols.extend(self.label_columns.iter().map(String::as_str));
        if let Some(note) = &self.note_column {
            cols.push(note.as_str());
        }
        cols.extend(self.row_filters.iter().map(RowFilter::column));
        let mut seen = std::collections::HashSet::new();
        cols.retain(|c| seen.insert(*c));
        cols
    }

    pub fn cleanup_for(&self, column: &str) -> TextCleanup {
        self.cleanups
            .iter()
            .find(|c| c.column == column)
            .map(|c| c.cleanup)
            .unwrap_or_default()
    }

    /// Date, Description, Amount, Currency, Category; ISO or Swiss dates.
    pub fn generic() -> Self {
        TableLayout {
            institution: "generic".to_string(),
            delimiter: ',',
            date_column: "Date".to_string(),
            date_formats: strings(&[
                "%Y-%m-%d %H:%M:%S",
                "%Y-%m-%d %H:%M",
                "%Y-%m-%d",
                "%d.%m.%Y",
                "%d/%m/%Y %H:%M",
                "%d/%m/%Y",
            ]),
            title_columns: strings(&["Description"]),
            amount: AmountColumns::Signed {
                column: "Amount".to_string(),
                negate: false,
            },
            currency: CurrencyColumn::Column("Currency".to_string()),
            label_columns: strings(&["Category"]),
            note_column: None,
            row_filters: Vec::new(),
            cleanups: Vec::new(),
        }
    }

    /// Swisscard credit card statement. Debits are positive; only posted
    /// debits are kept.
    pub fn swisscard() -> Self {
        TableLayout {
            institution: "swisscard".to_string(),
            delimiter: ',',
            date_column: "Transaction date".to_string(),
            date_formats: strings(&["%d.%m.%Y", "%Y-%m-%d", "%Y-%m-%d %H:%M:%S"]),
            title_columns: strings(&["Merchant", "Description"]),
            amount: AmountColumns::Signed {
                column: "Amount".to_string(),
                negate: true,
            },
            currency: CurrencyColumn::Column("Currency".to_string()),
            label_columns: strings(&["Merchant", "Merchant Category", "Registered Category"]),
            note_column: None,
            row_filters: vec![
                RowFilter::Equals {
                    column: "Status".to_string(),
                    value: "Posted".to_string(),
                },
                RowFilter::NotEquals {
                    column: "Debit/Credit".to_string(),
                    value: "Credit".to_string(),
                },
            ],
            cleanups: Vec::new(),
        }
    }

    /// ZKB account statement. Card settlements are dropped; they are
    /// imported from the card statements themselves.
    pub fn zkb() -> Self {
        TableLayout {
            institution: "zkb".to_string(),
            delimiter: ';',
            date_column: "Date".to_string(),
            date_formats: strings(&["%d.%m.%Y", "%Y-%m-%d"]),
            title_columns: strings(&["Booking text"]),
            amount: AmountColumns::DebitCredit {
                debit: "Debit CHF".to_string(),
                credit: "Credit CHF".to_string(),
            },
            currency: CurrencyColumn::Fixed("CHF".to_string()),
            label_columns: strings(&["Booking text"]),
            note_column: None,
            row_filters: vec![RowFilter::ExcludeContaining {
                column: "Booking text".to_string(),
                needles: strings(&["Viseca", "Swisscard"]),
            }],
            cleanups: vec![ColumnCleanup {
                column: "Booking text".to_string(),
                cleanup: TextCleanup::BookingText,
            }],
        }
    }

    /// Migros Bank account statement with a preamble before the header.
    pub fn migros() -> Self {
        TableLayout {
            institution: "migros".to_string(),
            delimiter: ';',
            date_column: "Datum".to_string(),
            date_formats: strings(&["%d.%m.%Y"]),
            title_columns: strings(&["Mitteilung", "Buchungstext"]),
            amount: AmountColumns::Signed {
                column: "Betrag".to_string(),
                negate: false,
            },
            currency: CurrencyColumn::Fixed("CHF".to_string()),
            label_columns: strings(&["Mitteilung", "Buchungstext"]),
            note_column: None,
            row_filters: Vec::new(),
            cleanups: vec![ColumnCleanup {
                column: "Buchungstext".to_string(),
                cleanup: TextCleanup::Remittance,
            }],
        }
    }

    pub fn builtin() -> Vec<TableLayout> {
        vec![Self::swisscard(), Self::zkb(), Self::migros(), Self::generic()]
    }

    pub fn builtin_named(name: &str) -> Option<TableLayout> {
        Self::builtin()
            .into_iter()
            .find(|l| l.institution.eq_ignore_ascii_case(name))
    }
}

fn strings(items: &[&str]) -> Vec<String> {
    items.iter().map(|s| s.to_string()).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn booking_text_strips_prefix_and_location() {
        assert_eq!(
            TextCleanup::BookingText.apply("Debit Visa: Coop-1234 Zürich, Zürich, CH"),
            "Coop-1234 Zürich"
        );
        assert_eq!(TextCleanup::BookingText.apply("Salary ACME AG"), "Salary ACME AG");
    }

    #[test]
    fn booking_text_twint_counterpart_is_title_cased() {
        assert_eq!(
            TextCleanup::BookingText.apply("Credit TWINT: MAX MUSTER"),
            "TWINT Max Muster"
        );
        assert_eq!(
            TextCleanup::BookingText.apply("Debit TWINT: ANNA, MEIER"),
            "TWINT Meier"
        );
    }

    #[test]
    fn remittance_twint_merchant() {
        assert_eq!(
            TextCleanup::Remittance.apply("TWINT Belastung IKEA AG 0400003132762475"),
            "IKEA AG"
        );
    }

    #[test]
    fn remittance_twint_person() {
        assert_eq!(
            TextCleanup::Remittance.apply("TWINT Gutschrift +41791234567, Lara Keller"),
            "TWINT Lara Keller"
        );
    }

    #[test]
    fn remittance_plain_text_keeps_head() {
        assert_eq!(
            TextCleanup::Remittance.apply("Einkauf Migros Limmatplatz, Zürich"),
            "Einkauf Migros Limmatplatz"
        );
    }

    #[test]
    fn required_columns_are_deduplicated() {
        let zkb = TableLayout::zkb();
        assert_eq!(
            zkb.required_columns(),
            vec!["Date", "Booking text", "Debit CHF", "Credit CHF"]
        );
    }

    #[test]
    fn row_filters() {
        let eq = RowFilter::Equals {
            column: "Status".into(),
            value: "Posted".into(),
        };
        assert!(eq.keeps(" Posted "));
        assert!(!eq.keeps("Pending"));
        let ex = RowFilter::ExcludeContaining {
            column: "t".into(),
            needles: vec!["Viseca".into()],
        };
        assert!(!ex.keeps("LSV Viseca Card Services"));
        assert!(ex.keeps("Coop"));
    }

    #[test]
    fn builtin_lookup_ignores_case() {
        assert_eq!(TableLayout::builtin_named("ZKB").unwrap().delimiter, ';');
        assert!(TableLayout::builtin_named("ubs").is_none());
    }

    #[test]
    fn layout_from_toml() {
        let toml = r#"
            institution = "postfinance"
            delimiter = ";"
            date_column = "Buchungsdatum"
            date_formats = ["%d.%m.%Y"]
            title_columns = ["Avisierungstext"]
            currency = { kind = "fixed", value = "CHF" }
            amount = { kind = "debit_credit", debit = "Lastschrift", credit = "Gutschrift" }
        "#;
        let layout: TableLayout = toml::from_str(toml).unwrap();
        assert_eq!(layout.delimiter, ';');
        assert_eq!(layout.currency, CurrencyColumn::Fixed("CHF".into()));
        assert!(layout.label_columns.is_empty());
        assert_eq!(layout.cleanup_for("Avisierungstext"), TextCleanup::None);
    }
}
