mod zset;

use super::command::{pad_value, HELD_HOLDER, HELD_VALUE};
use super::{Command, Reply, Transaction};
use crate::errors::StoreError;
use crate::traits::{Clock, KvStore};
use async_trait::async_trait;
use log::debug;
use parking_lot::Mutex;
use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::ops::Bound;
use std::sync::Arc;
use zset::SortedSet;

const DEFAULT_SCAN_COUNT: usize = 10;
const MAX_OPEN_CURSORS: usize = 1024;

#[derive(Debug, Clone)]
enum Value {
    Hash(BTreeMap<String, String>),
    SortedSet(SortedSet),
    Set(BTreeSet<String>),
}

impl Value {
    fn is_empty(&self) -> bool {
        match self {
            Value::Hash(h) => h.is_empty(),
            Value::SortedSet(z) => z.is_empty(),
            Value::Set(s) => s.is_empty(),
        }
    }
}

#[derive(Default)]
struct State {
    entries: BTreeMap<String, Value>,
    expiry: HashMap<String, i64>,
    /// Open scan cursors, each holding the last key or field it returned.
    cursors: BTreeMap<u64, String>,
    last_cursor: u64,
}

type Snapshot = Vec<(String, Option<Value>, Option<i64>)>;

impl State {
    fn purge_expired(&mut self, now_millis: i64) {
        let expired: Vec<String> = self
            .expiry
            .iter()
            .filter(|(_, deadline)| **deadline <= now_millis)
            .map(|(key, _)| key.clone())
            .collect();
        for key in expired {
            debug!("Key {} expired", key);
            self.expiry.remove(&key);
            self.entries.remove(&key);
        }
    }

    fn snapshot(&self, commands: &[Command]) -> Snapshot {
        let keys: BTreeSet<&str> = commands.iter().flat_map(|c| c.keys()).collect();
        keys.into_iter()
            .map(|key| {
                (
                    key.to_string(),
                    self.entries.get(key).cloned(),
                    self.expiry.get(key).copied(),
                )
            })
            .collect()
    }

    fn restore(&mut self, snapshot: Snapshot) {
        for (key, value, deadline) in snapshot {
            match value {
                Some(v) => self.entries.insert(key.clone(), v),
                None => self.entries.remove(&key),
            };
            match deadline {
                Some(d) => self.expiry.insert(key, d),
                None => self.expiry.remove(&key),
            };
        }
    }

    /// Where a scan resumes: from the start for cursor `0`, otherwise right
    /// after the last item the cursor handed out.
    fn resume(&mut self, cursor: u64) -> Result<Bound<String>, StoreError> {
        if cursor == 0 {
            return Ok(Bound::Unbounded);
        }
        self.cursors
            .remove(&cursor)
            .map(Bound::Excluded)
            .ok_or_else(|| StoreError::Command(format!("unknown scan cursor {}", cursor)))
    }

    fn open_cursor(&mut self, last: String) -> u64 {
        if self.cursors.len() >= MAX_OPEN_CURSORS {
            self.cursors.pop_first();
        }
        self.last_cursor += 1;
        self.cursors.insert(self.last_cursor, last);
        self.last_cursor
    }

    fn drop_if_empty(&mut self, key: &str) {
        if self.entries.get(key).map_or(false, Value::is_empty) {
            self.entries.remove(key);
            self.expiry.remove(key);
        }
    }

    fn hash(&self, key: &str) -> Result<Option<&BTreeMap<String, String>>, StoreError> {
        match self.entries.get(key) {
            None => Ok(None),
            Some(Value::Hash(h)) => Ok(Some(h)),
            Some(_) => Err(wrong_type(key)),
        }
    }

    fn hash_mut(&mut self, key: &str) -> Result<&mut BTreeMap<String, String>, StoreError> {
        match self
            .entries
            .entry(key.to_string())
            .or_insert_with(|| Value::Hash(BTreeMap::new()))
        {
            Value::Hash(h) => Ok(h),
            _ => Err(wrong_type(key)),
        }
    }

    fn zset(&self, key: &str) -> Result<Option<&SortedSet>, StoreError> {
        match self.entries.get(key) {
            None => Ok(None),
            Some(Value::SortedSet(z)) => Ok(Some(z)),
            Some(_) => Err(wrong_type(key)),
        }
    }

    fn zset_mut(&mut self, key: &str) -> Result<&mut SortedSet, StoreError> {
        match self
            .entries
            .entry(key.to_string())
            .or_insert_with(|| Value::SortedSet(SortedSet::default()))
        {
            Value::SortedSet(z) => Ok(z),
            _ => Err(wrong_type(key)),
        }
    }

    fn set(&self, key: &str) -> Result<Option<&BTreeSet<String>>, StoreError> {
        match self.entries.get(key) {
            None => Ok(None),
            Some(Value::Set(s)) => Ok(Some(s)),
            Some(_) => Err(wrong_type(key)),
        }
    }

    fn set_mut(&mut self, key: &str) -> Result<&mut BTreeSet<String>, StoreError> {
        match self
            .entries
            .entry(key.to_string())
            .or_insert_with(|| Value::Set(BTreeSet::new()))
        {
            Value::Set(s) => Ok(s),
            _ => Err(wrong_type(key)),
        }
    }

    fn apply(&mut self, command: Command, now_millis: i64) -> Result<Reply, StoreError> {
        let touched: Vec<String> = command.keys().into_iter().map(String::from).collect();
        let reply = self.apply_inner(command, now_millis);
        for key in &touched {
            self.drop_if_empty(key);
        }
        reply
    }

    fn apply_inner(&mut self, command: Command, now_millis: i64) -> Result<Reply, StoreError> {
        match command {
            Command::ZAdd { key, score, member } => {
                Ok(Reply::Int(self.zset_mut(&key)?.insert(&member, score)))
            }
            Command::ZRangeWithScores { key, start, stop } => Ok(Reply::Scored(
                self.zset(&key)?
                    .map(|z| z.range(start, stop))
                    .unwrap_or_default(),
            )),
            Command::ZRemRangeByRank { key, start, stop } => {
                if self.zset(&key)?.is_none() {
                    return Ok(Reply::Int(0));
                }
                Ok(Reply::Int(self.zset_mut(&key)?.remove_range_by_rank(start, stop)))
            }
            Command::ZRemRangeByScore { key, min, max } => {
                if self.zset(&key)?.is_none() {
                    return Ok(Reply::Int(0));
                }
                Ok(Reply::Int(self.zset_mut(&key)?.remove_range_by_score(min, max)))
            }
            Command::ZCard { key } => Ok(Reply::Int(
                self.zset(&key)?.map_or(0, |z| z.len() as i64),
            )),
            Command::HIncrBy { key, field, delta } => {
                let hash = self.hash_mut(&key)?;
                let current = match hash.get(&field) {
                    Some(raw) => raw.parse::<i64>().map_err(|_| StoreError::Parse {
                        key: format!("{}/{}", key, field),
                        value: raw.clone(),
                    })?,
                    None => 0,
                };
                let next = current.checked_add(delta).ok_or_else(|| {
                    StoreError::Command(format!("increment overflow at {}/{}", key, field))
                })?;
                hash.insert(field, next.to_string());
                Ok(Reply::Int(next))
            }
            Command::HSet { key, field, value } => {
                let added = self.hash_mut(&key)?.insert(field, value).is_none();
                Ok(Reply::Int(added as i64))
            }
            Command::HGet { key, field } => Ok(Reply::Value(
                self.hash(&key)?.and_then(|h| h.get(&field).cloned()),
            )),
            Command::SAdd { key, member } => {
                Ok(Reply::Int(self.set_mut(&key)?.insert(member) as i64))
            }
            Command::SIsMember { key, member } => Ok(Reply::Bool(
                self.set(&key)?.map_or(false, |s| s.contains(&member)),
            )),
            Command::SMove {
                source,
                destination,
                member,
            } => {
                // destination type is checked before anything moves
                self.set(&destination)?;
                let present = match self.set(&source)? {
                    Some(s) => s.contains(&member),
                    None => false,
                };
                if !present {
                    return Ok(Reply::Bool(false));
                }
                self.set_mut(&source)?.remove(&member);
                self.set_mut(&destination)?.insert(member);
                Ok(Reply::Bool(true))
            }
            Command::HoldMinimum { key, value, holder } => {
                let padded = pad_value(value);
                let hash = self.hash_mut(&key)?;
                let replace = match hash.get(HELD_VALUE) {
                    Some(current) => padded < *current,
                    None => true,
                };
                if replace {
                    hash.insert(HELD_VALUE.to_string(), padded);
                    hash.insert(HELD_HOLDER.to_string(), holder);
                }
                held_reply(&key, hash)
            }
            Command::Expire { key, ttl } => {
                if !self.entries.contains_key(&key) {
                    return Ok(Reply::Bool(false));
                }
                let deadline = now_millis.saturating_add(ttl.as_millis() as i64);
                self.expiry.insert(key, deadline);
                Ok(Reply::Bool(true))
            }
            Command::Del { key } => {
                self.expiry.remove(&key);
                Ok(Reply::Int(self.entries.remove(&key).is_some() as i64))
            }
        }
    }
}

fn wrong_type(key: &str) -> StoreError {
    StoreError::WrongType {
        key: key.to_string(),
    }
}

fn held_reply(key: &str, hash: &BTreeMap<String, String>) -> Result<Reply, StoreError> {
    let holder = hash.get(HELD_HOLDER).cloned().unwrap_or_default();
    let raw = hash.get(HELD_VALUE).cloned().unwrap_or_default();
    let value = raw.parse().map_err(|_| StoreError::Parse {
        key: format!("{}/{}", key, HELD_VALUE),
        value: raw,
    })?;
    Ok(Reply::Held { holder, value })
}

/// Takes up to `count` items from `items`, reporting whether any are left.
fn take_page<T>(items: impl Iterator<Item = T>, count: usize) -> (Vec<T>, bool) {
    let count = if count == 0 { DEFAULT_SCAN_COUNT } else { count };
    let mut items = items.peekable();
    let mut page = Vec::with_capacity(count);
    while page.len() < count {
        match items.next() {
            Some(item) => page.push(item),
            None => break,
        }
    }
    let more = items.peek().is_some();
    (page, more)
}

/// In-process [`KvStore`] with the same atomicity guarantees as the
/// networked store: a transaction either applies fully or not at all.
pub struct MemoryStore {
    state: Mutex<State>,
    clock: Arc<dyn Clock>,
}

impl MemoryStore {
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        Self {
            state: Mutex::new(State::default()),
            clock,
        }
    }

    /// Number of live keys, expired ones excluded.
    pub fn key_count(&self) -> usize {
        let mut state = self.state.lock();
        state.purge_expired(self.clock.now_millis());
        state.entries.len()
    }
}

#[async_trait]
impl KvStore for MemoryStore {
    async fn ping(&self) -> Result<String, StoreError> {
        Ok("PONG".to_string())
    }

    async fn exec(&self, tx: Transaction) -> Result<Vec<Reply>, StoreError> {
        let now = self.clock.now_millis();
        let mut state = self.state.lock();
        state.purge_expired(now);

        let snapshot = state.snapshot(tx.commands());
        let mut replies = Vec::with_capacity(tx.len());
        for command in tx.into_commands() {
            match state.apply(command, now) {
                Ok(reply) => replies.push(reply),
                Err(e) => {
                    debug!("Transaction aborted, rolling back: {}", e);
                    state.restore(snapshot);
                    return Err(e);
                }
            }
        }
        Ok(replies)
    }

    /// Supports `prefix*` patterns and exact keys. The cursor resumes
    /// after the last key returned, so keys deleted or created meanwhile
    /// never shift a live key out of the iteration.
    async fn scan(
        &self,
        cursor: u64,
        pattern: &str,
        count: usize,
    ) -> Result<(u64, Vec<String>), StoreError> {
        let mut state = self.state.lock();
        state.purge_expired(self.clock.now_millis());
        let (prefix, exact) = match pattern.strip_suffix('*') {
            Some(prefix) => (prefix, false),
            None => (pattern, true),
        };
        let start = match state.resume(cursor)? {
            Bound::Unbounded => Bound::Included(prefix.to_string()),
            after => after,
        };
        let keys = state
            .entries
            .range::<String, _>((start, Bound::Unbounded))
            .map(|(key, _)| key)
            .take_while(|key| key.starts_with(prefix))
            .filter(|key| !exact || key.as_str() == prefix)
            .cloned();
        let (page, more) = take_page(keys, count);
        let next = match (more, page.last()) {
            (true, Some(last)) => {
                let last = last.clone();
                state.open_cursor(last)
            }
            _ => 0,
        };
        Ok((next, page))
    }

    async fn hscan(
        &self,
        key: &str,
        cursor: u64,
        count: usize,
    ) -> Result<(u64, Vec<(String, String)>), StoreError> {
        let mut state = self.state.lock();
        state.purge_expired(self.clock.now_millis());
        let start = state.resume(cursor)?;
        let (page, more) = match state.hash(key)? {
            Some(hash) => take_page(
                hash.range::<String, _>((start, Bound::Unbounded))
                    .map(|(f, v)| (f.clone(), v.clone())),
                count,
            ),
            None => return Ok((0, Vec::new())),
        };
        let next = match (more, page.last()) {
            (true, Some((last, _))) => {
                let last = last.clone();
                state.open_cursor(last)
            }
            _ => 0,
        };
        Ok((next, page))
    }
}
