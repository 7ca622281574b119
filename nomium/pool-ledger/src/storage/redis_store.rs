//! [`KvStore`] over a networked Redis-protocol server (Redis, kvrocks).

use super::command::{pad_value, HELD_HOLDER, HELD_VALUE};
use super::{Command, Reply, Transaction};
use crate::errors::StoreError;
use crate::traits::KvStore;
use async_trait::async_trait;
use log::{debug, error, info};
use redis::aio::ConnectionManager;
use redis::{from_redis_value, Client, Cmd, RedisError, Value};

/// `KEYS[1]` hash, `ARGV`: padded value, holder, value field, holder field.
/// Padded values compare as strings, which keeps the comparison exact for
/// every `u64`.
const HOLD_MINIMUM_SCRIPT: &str = r#"
local current = redis.call('HGET', KEYS[1], ARGV[3])
if (not current) or ARGV[1] < current then
  redis.call('HSET', KEYS[1], ARGV[3], ARGV[1], ARGV[4], ARGV[2])
  return {ARGV[2], ARGV[1]}
end
return {redis.call('HGET', KEYS[1], ARGV[4]), current}
"#;

impl From<RedisError> for StoreError {
    fn from(e: RedisError) -> Self {
        if e.is_io_error() || e.is_connection_dropped() || e.is_connection_refusal() || e.is_timeout() {
            StoreError::Connection(e.to_string())
        } else {
            StoreError::Command(e.to_string())
        }
    }
}

/// Redis client running every [`Transaction`] as one `MULTI`/`EXEC`
/// pipeline.
///
/// Ordered-set scores travel as Redis doubles; the ledger only stores
/// second timestamps there, which doubles hold exactly. Values that need
/// the full `u64` range go through [`Command::HoldMinimum`].
#[derive(Clone)]
pub struct RedisStore {
    manager: ConnectionManager,
}

impl RedisStore {
    pub async fn connect(url: &str) -> Result<Self, StoreError> {
        let client = Client::open(url)?;
        let manager = ConnectionManager::new(client).await.map_err(|e| {
            error!("Key-value store connection failed: {}", e);
            StoreError::from(e)
        })?;
        info!("Key-value store client connected");
        Ok(Self { manager })
    }
}

fn to_cmd(command: &Command) -> Cmd {
    let mut cmd;
    match command {
        Command::ZAdd { key, score, member } => {
            cmd = redis::cmd("ZADD");
            cmd.arg(key).arg(*score).arg(member);
        }
        Command::ZRangeWithScores { key, start, stop } => {
            cmd = redis::cmd("ZRANGE");
            cmd.arg(key).arg(*start).arg(*stop).arg("WITHSCORES");
        }
        Command::ZRemRangeByRank { key, start, stop } => {
            cmd = redis::cmd("ZREMRANGEBYRANK");
            cmd.arg(key).arg(*start).arg(*stop);
        }
        Command::ZRemRangeByScore { key, min, max } => {
            cmd = redis::cmd("ZREMRANGEBYSCORE");
            cmd.arg(key).arg(*min).arg(format!("({}", max));
        }
        Command::ZCard { key } => {
            cmd = redis::cmd("ZCARD");
            cmd.arg(key);
        }
        Command::HIncrBy { key, field, delta } => {
            cmd = redis::cmd("HINCRBY");
            cmd.arg(key).arg(field).arg(*delta);
        }
        Command::HSet { key, field, value } => {
            cmd = redis::cmd("HSET");
            cmd.arg(key).arg(field).arg(value);
        }
        Command::HGet { key, field } => {
            cmd = redis::cmd("HGET");
            cmd.arg(key).arg(field);
        }
        Command::SAdd { key, member } => {
            cmd = redis::cmd("SADD");
            cmd.arg(key).arg(member);
        }
        Command::SIsMember { key, member } => {
            cmd = redis::cmd("SISMEMBER");
            cmd.arg(key).arg(member);
        }
        Command::SMove {
            source,
            destination,
            member,
        } => {
            cmd = redis::cmd("SMOVE");
            cmd.arg(source).arg(destination).arg(member);
        }
        Command::HoldMinimum { key, value, holder } => {
            cmd = redis::cmd("EVAL");
            cmd.arg(HOLD_MINIMUM_SCRIPT)
                .arg(1)
                .arg(key)
                .arg(pad_value(*value))
                .arg(holder)
                .arg(HELD_VALUE)
                .arg(HELD_HOLDER);
        }
        Command::Expire { key, ttl } => {
            cmd = redis::cmd("PEXPIRE");
            cmd.arg(key).arg(ttl.as_millis() as u64);
        }
        Command::Del { key } => {
            cmd = redis::cmd("DEL");
            cmd.arg(key);
        }
    }
    cmd
}

fn score_of(raw: f64) -> u64 {
    raw.max(0.0).round() as u64
}

fn decode(command: &Command, value: &Value) -> Result<Reply, StoreError> {
    let reply = match command {
        Command::ZAdd { .. }
        | Command::ZRemRangeByRank { .. }
        | Command::ZRemRangeByScore { .. }
        | Command::ZCard { .. }
        | Command::HIncrBy { .. }
        | Command::HSet { .. }
        | Command::SAdd { .. }
        | Command::Del { .. } => Reply::Int(from_redis_value(value)?),
        Command::SIsMember { .. } | Command::SMove { .. } | Command::Expire { .. } => {
            Reply::Bool(from_redis_value(value)?)
        }
        Command::HGet { .. } => Reply::Value(from_redis_value(value)?),
        Command::ZRangeWithScores { .. } => {
            let entries: Vec<(String, f64)> = from_redis_value(value)?;
            Reply::Scored(
                entries
                    .into_iter()
                    .map(|(member, score)| (member, score_of(score)))
                    .collect(),
            )
        }
        Command::HoldMinimum { key, .. } => {
            let (holder, raw): (String, String) = from_redis_value(value)?;
            let value = raw.parse().map_err(|_| StoreError::Parse {
                key: format!("{}/{}", key, HELD_VALUE),
                value: raw,
            })?;
            Reply::Held { holder, value }
        }
    };
    Ok(reply)
}

#[async_trait]
impl KvStore for RedisStore {
    async fn ping(&self) -> Result<String, StoreError> {
        let mut conn = self.manager.clone();
        let pong: String = redis::cmd("PING").query_async(&mut conn).await.map_err(|e| {
            error!("Key-value store health check failed: {}", e);
            StoreError::from(e)
        })?;
        Ok(pong)
    }

    async fn exec(&self, tx: Transaction) -> Result<Vec<Reply>, StoreError> {
        if tx.is_empty() {
            return Ok(Vec::new());
        }
        let mut pipe = redis::pipe();
        pipe.atomic();
        for command in tx.commands() {
            pipe.add_command(to_cmd(command));
        }

        let mut conn = self.manager.clone();
        let values: Vec<Value> = pipe.query_async(&mut conn).await?;
        if values.len() != tx.len() {
            return Err(StoreError::Command(format!(
                "transaction of {} commands got {} replies",
                tx.len(),
                values.len()
            )));
        }
        debug!("Transaction of {} commands applied", tx.len());
        tx.commands()
            .iter()
            .zip(values.iter())
            .map(|(command, value)| decode(command, value))
            .collect()
    }

    async fn scan(
        &self,
        cursor: u64,
        pattern: &str,
        count: usize,
    ) -> Result<(u64, Vec<String>), StoreError> {
        let mut conn = self.manager.clone();
        let page: (u64, Vec<String>) = redis::cmd("SCAN")
            .arg(cursor)
            .arg("MATCH")
            .arg(pattern)
            .arg("COUNT")
            .arg(count.max(1))
            .query_async(&mut conn)
            .await?;
        Ok(page)
    }

    async fn hscan(
        &self,
        key: &str,
        cursor: u64,
        count: usize,
    ) -> Result<(u64, Vec<(String, String)>), StoreError> {
        let mut conn = self.manager.clone();
        let page: (u64, Vec<(String, String)>) = redis::cmd("HSCAN")
            .arg(key)
            .arg(cursor)
            .arg("COUNT")
            .arg(count.max(1))
            .query_async(&mut conn)
            .await?;
        Ok(page)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn data(s: &str) -> Value {
        Value::Data(s.as_bytes().to_vec())
    }

    #[test]
    fn score_range_upper_bound_is_exclusive() {
        let cmd = to_cmd(&Command::ZRemRangeByScore {
            key: "k".into(),
            min: 0,
            max: 100,
        });
        let mut expected = redis::cmd("ZREMRANGEBYSCORE");
        expected.arg("k").arg(0u64).arg("(100");
        assert_eq!(cmd.get_packed_command(), expected.get_packed_command());
    }

    #[test]
    fn expiry_is_sent_in_millis() {
        let cmd = to_cmd(&Command::Expire {
            key: "k".into(),
            ttl: Duration::from_secs(2),
        });
        let mut expected = redis::cmd("PEXPIRE");
        expected.arg("k").arg(2000u64);
        assert_eq!(cmd.get_packed_command(), expected.get_packed_command());
    }

    #[test]
    fn held_minimum_decodes_full_u64() {
        let command = Command::HoldMinimum {
            key: "m".into(),
            value: u64::MAX,
            holder: "s1".into(),
        };
        let reply = decode(
            &command,
            &Value::Bulk(vec![data("s1"), data(&pad_value(u64::MAX - 1))]),
        )
        .unwrap();
        assert_eq!(
            reply,
            Reply::Held {
                holder: "s1".into(),
                value: u64::MAX - 1
            }
        );
    }

    #[test]
    fn scored_range_decodes_pairs() {
        let command = Command::ZRangeWithScores {
            key: "z".into(),
            start: 0,
            stop: -1,
        };
        let value = Value::Bulk(vec![data("a"), data("1700000000"), data("b"), data("1700000001")]);
        assert_eq!(
            decode(&command, &value).unwrap(),
            Reply::Scored(vec![("a".into(), 1_700_000_000), ("b".into(), 1_700_000_001)])
        );
    }

    #[test]
    fn padded_values_sort_numerically() {
        assert!(pad_value(9) < pad_value(10));
        assert!(pad_value(u64::MAX - 1) < pad_value(u64::MAX));
        assert_eq!(pad_value(u64::MAX).len(), 20);
    }
}
