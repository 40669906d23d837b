pub mod api;
pub mod error;
pub mod layout;
pub mod processor;
pub mod remote;
pub mod tabular;

pub use api::{
    AccountApi, ApiConfig, ApiPage, ApiTransaction, Credentials, HttpAccountApi, PfmCategory,
};
pub use error::ImportError;
pub use layout::{
    AmountColumns, ColumnCleanup, CurrencyColumn, RowFilter, TableLayout, TextCleanup,
};
pub use processor::{CategoryResolver, Process, Processor};
pub use remote::{RemoteAccountProcessor, DEFAULT_PAGE_SIZE};
pub use tabular::{TabularData, TabularProcessor, TabularRow};
