pub mod account_ledger;
pub mod clock;
pub mod registry;
pub mod reporting;
pub mod retry;
pub mod reward_engine;
pub mod share_ledger;
pub mod split;
pub mod sweeper;
pub mod tournament;

pub use account_ledger::AccountLedger;
pub use clock::{ManualClock, SystemClock};
pub use registry::{HashrateRank, MinedShares};
pub use reporting::Reporting;
pub use retry::{retry_operation, RetryConfig};
pub use reward_engine::RewardEngine;
pub use share_ledger::ShareLedger;
pub use sweeper::StaleSweeper;
pub use tournament::JobTournament;
