mod amount;
mod history;
mod report;
mod reward;
mod share_event;

pub use amount::{Scaled, SCALE};
pub use history::{AccountSnapshot, BalanceEntry, BalanceKind};
pub use report::{Credit, Distribution, FailedCredit, ScanReport};
pub use reward::{CandidateState, Reward};
pub use share_event::{ShareEvent, ShareOutcome};
