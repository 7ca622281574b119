mod command;
mod keys;
mod memory;
mod redis_store;

pub use command::{Command, Reply, Transaction};
pub(crate) use command::{HELD_HOLDER, HELD_VALUE};
pub use keys::{join, KeySpace};
pub use memory::MemoryStore;
pub use redis_store::RedisStore;
