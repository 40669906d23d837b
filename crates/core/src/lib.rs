pub mod amount;
pub mod mapper;
pub mod taxonomy;
pub mod transaction;
pub mod window;

pub use amount::{Amount, AmountParseError};
pub use mapper::{CategoryMapper, CategoryMapping, MapperError, MappingTable};
pub use taxonomy::{allowed_subcategories_for, validate_pair, Category, Subcategory, TaxonomyError};
pub use transaction::{Transaction, TransactionBatch};
pub use window::DateWindow;
