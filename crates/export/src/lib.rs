pub mod dispatch;
pub mod error;
pub mod file;
pub mod request;

pub use dispatch::{
    BrowserDispatcher, CancelFlag, DispatchReport, Dispatcher, HttpDispatcher, RecordingDispatcher,
};
pub use error::{DispatchError, ExportError};
pub use file::{FileExporter, DATE_FORMAT, FILE_HEADER, PREVIEW_ROWS};
pub use request::{
    ImportRequest, RequestBatchExporter, DEFAULT_BASE_URL, DEFAULT_PAUSE,
    MAX_TRANSACTIONS_PER_REQUEST,
};
