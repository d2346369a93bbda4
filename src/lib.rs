pub mod cache;
pub mod chapter;
pub mod config;
pub mod error;
pub mod fields;
pub mod image;
pub mod library;
pub mod logger;
pub mod query;
pub mod row;
pub mod sheet;
pub mod utils;

pub use chapter::{Chapter, ChapterCollection};
pub use config::AppConfig;
pub use error::{CacheError, LoadError};
pub use fields::{FieldCandidates, FieldMap, Role};
pub use image::{ImageCandidates, ImageResolver};
pub use library::{CardView, ChapterView, Library, LoadStatus};
pub use query::{QueryContext, SortMode};
pub use row::Row;
pub use sheet::{Dataset, Origin, SheetLoader, SheetSource};
