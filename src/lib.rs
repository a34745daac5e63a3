//! Generic list views: filter, sort, paginate and export rows described by
//! a column schema, plus a TTL cache for the fetches that feed them.

pub mod cache;
pub mod column;
pub mod config;
pub mod export;
pub mod fetch;
pub mod filter;
pub mod paginate;
pub mod query;
pub mod sort;
pub mod table;
pub mod value;

pub use column::{Column, SemanticType};
pub use export::{DownloadSink, Export, FileSink};
pub use fetch::Fetched;
pub use filter::{ColumnFilter, FilterState};
pub use paginate::PageState;
pub use sort::{SortDirection, SortState};
pub use table::{TableView, ViewResult};
pub use value::Value;
