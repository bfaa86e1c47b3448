//! Packrat memoization: the memo cache, the left-recursion seed
//! table, and the rule-name interner that keys both.

use std::collections::HashMap;

use crate::value::Value;

/// Interns rule (and leftrec/operator) names to small ids so cache
/// keys avoid string hashing.
#[derive(Debug, Default)]
pub struct RuleIds {
    ids: HashMap<String, u32>,
}

impl RuleIds {
    pub fn get_id(&mut self, name: &str) -> u32 {
        if let Some(&id) = self.ids.get(name) {
            return id;
        }
        let id = self.ids.len() as u32;
        self.ids.insert(name.to_string(), id);
        id
    }
}

/// Key for the memo cache and seed table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct MemoKey {
    pub rule: u32,
    pub pos: usize,
}

/// A cached outcome: the `(val, failed, newpos)` triple.
#[derive(Debug, Clone)]
pub struct MemoEntry {
    pub val: Value,
    pub failed: bool,
    pub pos: usize,
}

/// The packrat cache. Entries live for one parse.
#[derive(Debug, Default)]
pub struct MemoCache {
    entries: HashMap<MemoKey, MemoEntry>,
}

impl MemoCache {
    pub fn get(&self, key: MemoKey) -> Option<&MemoEntry> {
        self.entries.get(&key)
    }

    pub fn insert(&mut self, key: MemoKey, entry: MemoEntry) {
        self.entries.insert(key, entry);
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// The left-recursion seed table: same shape as the memo cache, but
/// entries are inserted, refined, and removed as fixed points are
/// computed.
#[derive(Debug, Default)]
pub struct SeedTable {
    entries: HashMap<MemoKey, MemoEntry>,
}

impl SeedTable {
    pub fn get(&self, key: MemoKey) -> Option<&MemoEntry> {
        self.entries.get(&key)
    }

    pub fn insert(&mut self, key: MemoKey, entry: MemoEntry) {
        self.entries.insert(key, entry);
    }

    pub fn remove(&mut self, key: MemoKey) {
        self.entries.remove(&key);
    }
}
