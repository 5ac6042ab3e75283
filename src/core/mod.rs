pub mod error;
pub mod types;
pub mod value;

pub use error::{DbError, Result};
pub use types::{CollectionSchema, Field, Record, RowId};
pub use value::{DataType, Value};
