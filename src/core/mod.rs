pub mod error;
pub mod row;
pub mod value;

pub use error::{MigrateError, Result};
pub use row::{Row, RowBuilder, SourceRow};
pub use value::{DataType, Value};
