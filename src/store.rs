use serde::de::DeserializeOwned;
use serde::Serialize;
use std::rc::Rc;

use crate::db;

/// Durable string key-value substrate. Each collection lives under one key as
/// a full JSON snapshot.
pub trait KvStore {
    fn get(&self, key: &str) -> anyhow::Result<Option<String>>;
    fn set(&self, key: &str, value: &str) -> anyhow::Result<()>;
}

impl KvStore for rusqlite::Connection {
    fn get(&self, key: &str) -> anyhow::Result<Option<String>> {
        db::kv_get(self, key)
    }

    fn set(&self, key: &str, value: &str) -> anyhow::Result<()> {
        db::kv_set(self, key, value)
    }
}

/// In-process substrate for tests.
#[cfg(test)]
#[derive(Debug, Default)]
pub struct MemoryKv {
    entries: std::cell::RefCell<std::collections::HashMap<String, String>>,
}

#[cfg(test)]
impl MemoryKv {
    pub fn new() -> Self {
        Self::default()
    }
}

#[cfg(test)]
impl KvStore for MemoryKv {
    fn get(&self, key: &str) -> anyhow::Result<Option<String>> {
        Ok(self.entries.borrow().get(key).cloned())
    }

    fn set(&self, key: &str, value: &str) -> anyhow::Result<()> {
        self.entries
            .borrow_mut()
            .insert(key.to_string(), value.to_string());
        Ok(())
    }
}

pub trait Keyed {
    fn key_id(&self) -> &str;
}

/// Ordered collection persisted as one snapshot per mutation.
///
/// Every mutation builds the next snapshot, writes it, and only then swaps it
/// in, so a failed write leaves memory and disk agreeing on the old state.
pub struct Collection<T> {
    kv: Rc<dyn KvStore>,
    key: &'static str,
    items: Vec<T>,
}

impl<T> Collection<T>
where
    T: Serialize + DeserializeOwned + Keyed + Clone,
{
    /// Rehydrates from `key`. Missing keys start empty; so do malformed
    /// snapshots, which are logged and otherwise ignored.
    pub fn open(kv: Rc<dyn KvStore>, key: &'static str) -> anyhow::Result<Self> {
        let items = match kv.get(key)? {
            None => Vec::new(),
            Some(raw) => match serde_json::from_str::<Vec<T>>(&raw) {
                Ok(v) => v,
                Err(e) => {
                    log::warn!("discarding malformed snapshot under {key}: {e}");
                    Vec::new()
                }
            },
        };
        Ok(Self { kv, key, items })
    }

    pub fn list_all(&self) -> &[T] {
        &self.items
    }

    pub fn find_by_id(&self, id: &str) -> Option<&T> {
        self.items.iter().find(|it| it.key_id() == id)
    }

    pub fn insert(&mut self, item: T) -> anyhow::Result<()> {
        let mut next = self.items.clone();
        next.push(item);
        self.commit(next)
    }

    /// Applies `f` to the item with `id`. Returns the updated item, or `None`
    /// when no such item exists.
    pub fn update<F>(&mut self, id: &str, f: F) -> anyhow::Result<Option<T>>
    where
        F: FnOnce(&mut T),
    {
        let Some(idx) = self.items.iter().position(|it| it.key_id() == id) else {
            return Ok(None);
        };
        let mut next = self.items.clone();
        f(&mut next[idx]);
        let updated = next[idx].clone();
        self.commit(next)?;
        Ok(Some(updated))
    }

    /// Applies `f` to every item matching `pred`. Nothing is written when no
    /// item matches.
    pub fn update_where<P, F>(&mut self, pred: P, mut f: F) -> anyhow::Result<Vec<T>>
    where
        P: Fn(&T) -> bool,
        F: FnMut(&mut T),
    {
        let mut next = self.items.clone();
        let mut touched = Vec::new();
        for it in next.iter_mut() {
            if pred(it) {
                f(it);
                touched.push(it.clone());
            }
        }
        if touched.is_empty() {
            return Ok(touched);
        }
        self.commit(next)?;
        Ok(touched)
    }

    pub fn remove(&mut self, id: &str) -> anyhow::Result<Option<T>> {
        let Some(idx) = self.items.iter().position(|it| it.key_id() == id) else {
            return Ok(None);
        };
        let mut next = self.items.clone();
        let removed = next.remove(idx);
        self.commit(next)?;
        Ok(Some(removed))
    }

    fn commit(&mut self, next: Vec<T>) -> anyhow::Result<()> {
        let raw = serde_json::to_string(&next)?;
        self.kv.set(self.key, &raw)?;
        self.items = next;
        Ok(())
    }
}
