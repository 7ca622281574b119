use crate::errors::StoreError;
use std::time::Duration;

/// A single store operation, queued into a [`Transaction`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    ZAdd { key: String, score: u64, member: String },
    ZRangeWithScores { key: String, start: i64, stop: i64 },
    ZRemRangeByRank { key: String, start: i64, stop: i64 },
    /// Removes scores in `[min, max)`.
    ZRemRangeByScore { key: String, min: u64, max: u64 },
    ZCard { key: String },
    HIncrBy { key: String, field: String, delta: i64 },
    HSet { key: String, field: String, value: String },
    HGet { key: String, field: String },
    SAdd { key: String, member: String },
    SIsMember { key: String, member: String },
    SMove { source: String, destination: String, member: String },
    /// Keeps in the hash at `key` the `(value, holder)` with the smallest
    /// `value` seen so far. An equal value leaves the current holder in
    /// place. Replies with the holder after the update.
    HoldMinimum { key: String, value: u64, holder: String },
    Expire { key: String, ttl: Duration },
    Del { key: String },
}

impl Command {
    /// Keys the command reads or writes.
    pub fn keys(&self) -> Vec<&str> {
        match self {
            Command::SMove {
                source,
                destination,
                ..
            } => vec![source.as_str(), destination.as_str()],
            Command::ZAdd { key, .. }
            | Command::ZRangeWithScores { key, .. }
            | Command::ZRemRangeByRank { key, .. }
            | Command::ZRemRangeByScore { key, .. }
            | Command::ZCard { key }
            | Command::HIncrBy { key, .. }
            | Command::HSet { key, .. }
            | Command::HGet { key, .. }
            | Command::SAdd { key, .. }
            | Command::SIsMember { key, .. }
            | Command::HoldMinimum { key, .. }
            | Command::Expire { key, .. }
            | Command::Del { key } => vec![key.as_str()],
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Reply {
    Int(i64),
    Bool(bool),
    Value(Option<String>),
    Scored(Vec<(String, u64)>),
    Held { holder: String, value: u64 },
}

impl Reply {
    fn unexpected(&self, wanted: &str) -> StoreError {
        StoreError::Command(format!("expected {} reply, got {:?}", wanted, self))
    }

    pub fn into_int(self) -> Result<i64, StoreError> {
        match self {
            Reply::Int(n) => Ok(n),
            other => Err(other.unexpected("integer")),
        }
    }

    pub fn into_bool(self) -> Result<bool, StoreError> {
        match self {
            Reply::Bool(b) => Ok(b),
            other => Err(other.unexpected("boolean")),
        }
    }

    pub fn into_value(self) -> Result<Option<String>, StoreError> {
        match self {
            Reply::Value(v) => Ok(v),
            other => Err(other.unexpected("value")),
        }
    }

    pub fn into_held(self) -> Result<(String, u64), StoreError> {
        match self {
            Reply::Held { holder, value } => Ok((holder, value)),
            other => Err(other.unexpected("held minimum")),
        }
    }

    pub fn into_scored(self) -> Result<Vec<(String, u64)>, StoreError> {
        match self {
            Reply::Scored(entries) => Ok(entries),
            other => Err(other.unexpected("scored range")),
        }
    }
}

/// Ordered batch of commands executed atomically by
/// [`KvStore::exec`](crate::traits::KvStore::exec).
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Transaction {
    commands: Vec<Command>,
}

impl Transaction {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(mut self, command: Command) -> Self {
        self.commands.push(command);
        self
    }

    pub fn len(&self) -> usize {
        self.commands.len()
    }

    pub fn is_empty(&self) -> bool {
        self.commands.is_empty()
    }

    pub fn commands(&self) -> &[Command] {
        &self.commands
    }

    pub fn into_commands(self) -> Vec<Command> {
        self.commands
    }

    pub fn zadd(self, key: &str, score: u64, member: &str) -> Self {
        self.push(Command::ZAdd {
            key: key.to_string(),
            score,
            member: member.to_string(),
        })
    }

    pub fn zrange_with_scores(self, key: &str, start: i64, stop: i64) -> Self {
        self.push(Command::ZRangeWithScores {
            key: key.to_string(),
            start,
            stop,
        })
    }

    pub fn zrem_range_by_rank(self, key: &str, start: i64, stop: i64) -> Self {
        self.push(Command::ZRemRangeByRank {
            key: key.to_string(),
            start,
            stop,
        })
    }

    pub fn zrem_range_by_score(self, key: &str, min: u64, max: u64) -> Self {
        self.push(Command::ZRemRangeByScore {
            key: key.to_string(),
            min,
            max,
        })
    }

    pub fn zcard(self, key: &str) -> Self {
        self.push(Command::ZCard {
            key: key.to_string(),
        })
    }

    pub fn hincr_by(self, key: &str, field: &str, delta: i64) -> Self {
        self.push(Command::HIncrBy {
            key: key.to_string(),
            field: field.to_string(),
            delta,
        })
    }

    pub fn hset(self, key: &str, field: &str, value: &str) -> Self {
        self.push(Command::HSet {
            key: key.to_string(),
            field: field.to_string(),
            value: value.to_string(),
        })
    }

    pub fn hget(self, key: &str, field: &str) -> Self {
        self.push(Command::HGet {
            key: key.to_string(),
            field: field.to_string(),
        })
    }

    pub fn sadd(self, key: &str, member: &str) -> Self {
        self.push(Command::SAdd {
            key: key.to_string(),
            member: member.to_string(),
        })
    }

    pub fn sismember(self, key: &str, member: &str) -> Self {
        self.push(Command::SIsMember {
            key: key.to_string(),
            member: member.to_string(),
        })
    }

    pub fn smove(self, source: &str, destination: &str, member: &str) -> Self {
        self.push(Command::SMove {
            source: source.to_string(),
            destination: destination.to_string(),
            member: member.to_string(),
        })
    }

    pub fn hold_minimum(self, key: &str, value: u64, holder: &str) -> Self {
        self.push(Command::HoldMinimum {
            key: key.to_string(),
            value,
            holder: holder.to_string(),
        })
    }

    pub fn expire(self, key: &str, ttl: Duration) -> Self {
        self.push(Command::Expire {
            key: key.to_string(),
            ttl,
        })
    }

    pub fn del(self, key: &str) -> Self {
        self.push(Command::Del {
            key: key.to_string(),
        })
    }
}

/// Hash fields backing [`Command::HoldMinimum`].
pub(crate) const HELD_VALUE: &str = "value";
pub(crate) const HELD_HOLDER: &str = "holder";

/// Fixed-width decimal form of a held value: string order equals numeric
/// order, so a store can compare it exactly without going through a float.
pub(crate) fn pad_value(value: u64) -> String {
    format!("{:020}", value)
}
