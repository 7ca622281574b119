use std::collections::{BTreeSet, HashMap};

/// Sorted set ordered by `(score, member)`, the same order a Redis sorted
/// set uses for equal scores.
#[derive(Debug, Clone, Default)]
pub struct SortedSet {
    by_member: HashMap<String, u64>,
    ordered: BTreeSet<(u64, String)>,
}

impl SortedSet {
    pub fn len(&self) -> usize {
        self.by_member.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_member.is_empty()
    }

    #[cfg(test)]
    pub fn score(&self, member: &str) -> Option<u64> {
        self.by_member.get(member).copied()
    }

    /// Returns `1` when `member` is new, `0` otherwise.
    pub fn insert(&mut self, member: &str, score: u64) -> i64 {
        match self.by_member.insert(member.to_string(), score) {
            Some(current) => {
                self.ordered.remove(&(current, member.to_string()));
                self.ordered.insert((score, member.to_string()));
                0
            }
            None => {
                self.ordered.insert((score, member.to_string()));
                1
            }
        }
    }

    pub fn range(&self, start: i64, stop: i64) -> Vec<(String, u64)> {
        match rank_bounds(start, stop, self.len()) {
            Some((from, to)) => self
                .ordered
                .iter()
                .skip(from)
                .take(to - from + 1)
                .map(|(score, member)| (member.clone(), *score))
                .collect(),
            None => Vec::new(),
        }
    }

    pub fn remove_range_by_rank(&mut self, start: i64, stop: i64) -> i64 {
        let doomed: Vec<_> = match rank_bounds(start, stop, self.len()) {
            Some((from, to)) => self
                .ordered
                .iter()
                .skip(from)
                .take(to - from + 1)
                .cloned()
                .collect(),
            None => return 0,
        };
        self.remove_entries(doomed)
    }

    pub fn remove_range_by_score(&mut self, min: u64, max: u64) -> i64 {
        let doomed: Vec<_> = self
            .ordered
            .iter()
            .take_while(|(score, _)| *score < max)
            .filter(|(score, _)| *score >= min)
            .cloned()
            .collect();
        self.remove_entries(doomed)
    }

    fn remove_entries(&mut self, doomed: Vec<(u64, String)>) -> i64 {
        let removed = doomed.len() as i64;
        for entry in doomed {
            self.by_member.remove(&entry.1);
            self.ordered.remove(&entry);
        }
        removed
    }
}

/// Resolves inclusive, possibly negative, rank bounds against `len`.
fn rank_bounds(start: i64, stop: i64, len: usize) -> Option<(usize, usize)> {
    let len = len as i64;
    let start = if start < 0 { (len + start).max(0) } else { start };
    let stop = if stop < 0 { len + stop } else { stop.min(len - 1) };
    if len == 0 || start > stop || start >= len {
        return None;
    }
    Some((start as usize, stop as usize))
}
