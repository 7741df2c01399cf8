pub mod ledger_store;
pub mod lock;

pub use ledger_store::{LedgerStore, StoreOptions};
pub use lock::LedgerLock;
