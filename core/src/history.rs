//! Departed-user history for WHOWAS
//!
//! Entries are captured by the user-destroy observer, before the user is
//! removed from the registries. The store is shared between the observer and
//! the WHOWAS handler, hence the mutex.

use crate::utils::casefold;
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::sync::Arc;

/// One departed user.
#[derive(Debug, Clone)]
pub struct HistoryEntry {
    pub nick: String,
    pub ident: String,
    pub host: String,
    pub realname: String,
    pub departed_at: DateTime<Utc>,
}

const DEFAULT_PER_NICK: usize = 8;

/// Bounded per-nick history of departed users, newest first.
#[derive(Debug)]
pub struct History {
    entries: Mutex<rustc_hash::FxHashMap<String, VecDeque<HistoryEntry>>>,
    per_nick: usize,
}

impl Default for History {
    fn default() -> Self {
        Self::new(DEFAULT_PER_NICK)
    }
}

impl History {
    pub fn new(per_nick: usize) -> Self {
        Self {
            entries: Mutex::new(Default::default()),
            per_nick,
        }
    }

    pub fn shared(per_nick: usize) -> Arc<Self> {
        Arc::new(Self::new(per_nick))
    }

    pub fn record(&self, entry: HistoryEntry) {
        let mut entries = self.entries.lock();
        let bucket = entries.entry(casefold(&entry.nick)).or_default();
        bucket.push_front(entry);
        bucket.truncate(self.per_nick);
    }

    /// Entries for a nick, newest first, at most `limit` if given.
    pub fn lookup(&self, nick: &str, limit: Option<usize>) -> Vec<HistoryEntry> {
        let entries = self.entries.lock();
        match entries.get(&casefold(nick)) {
            Some(bucket) => {
                let take = limit.unwrap_or(bucket.len());
                bucket.iter().take(take).cloned().collect()
            }
            None => Vec::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(nick: &str) -> HistoryEntry {
        HistoryEntry {
            nick: nick.to_string(),
            ident: "id".to_string(),
            host: "host".to_string(),
            realname: "Real Name".to_string(),
            departed_at: Utc::now(),
        }
    }

    #[test]
    fn test_record_and_lookup_casefolded() {
        let history = History::new(4);
        history.record(entry("Alice"));
        assert_eq!(history.lookup("alice", None).len(), 1);
        assert_eq!(history.lookup("ALICE", None).len(), 1);
        assert!(history.lookup("bob", None).is_empty());
    }

    #[test]
    fn test_bounded_newest_first(){
        let history = History::new(2);
        for i in 0..3 {
            let mut e = entry("alice");
            e.ident = format!("id{}", i);
            history.record(e);
        }
        let found = history.lookup("alice", None);
        assert_eq!(found.len(), 2);
        assert_eq!(found[0].ident, "id2");
        assert_eq!(found[1].ident, "id1");
    }

    #[test]
    fn test_lookup_limit() {
        let history = History::new(8);
        for _ in 0..5 {
            history.record(entry("alice"));
        }
        assert_eq!(history.lookup("alice", Some(3)).len(), 3);
    }
}
