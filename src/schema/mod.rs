pub mod registry;
pub mod snapshot;

pub use registry::SnapshotRegistry;
pub use snapshot::{ColumnDef, TableSnapshot};
