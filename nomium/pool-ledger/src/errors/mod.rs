mod ledger;
mod store;

pub use ledger::LedgerError;
pub use store::StoreError;
