mod collaborators;
mod store;

pub use collaborators::{Clock, HashrateRanking, ShareRegistry};
pub use store::KvStore;
