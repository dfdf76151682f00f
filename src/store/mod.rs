pub mod file;
pub mod lock;
pub mod session;
pub mod store;
pub mod table;

pub use file::{FORMAT_VERSION, StoreFile, StoreHeader};
pub use lock::{LockRetryPolicy, StoreLock};
pub use session::DualStoreSession;
pub use store::Store;
pub use table::Table;
