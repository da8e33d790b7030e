#![forbid(unsafe_code)]

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Mutex, MutexGuard};

use crate::board::tree::BoardDocument;
use crate::store::workspace::Workspaces;
use crate::store::{BoardStore, Scope, StoreKey};

#[derive(Debug, Default)]
struct Inner {
    boards: BTreeMap<StoreKey, BoardDocument>,
    workspaces: BTreeMap<Scope, Workspaces>,
}

/// Process-local store.
#[derive(Debug, Default)]
pub struct MemoryStore {
    inner: Mutex<Inner>,
    read_only: AtomicBool,
    workspaces_read_only: AtomicBool,
}

impl MemoryStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes every write fail until switched back.
    pub fn set_read_only(&self, read_only: bool) {
        self.read_only.store(read_only, Ordering::SeqCst);
    }

    /// Makes only workspace list writes fail.
    pub fn set_workspaces_read_only(&self, read_only: bool) {
        self.workspaces_read_only.store(read_only, Ordering::SeqCst);
    }

    fn lock(&self) -> anyhow::Result<MutexGuard<'_, Inner>> {
        self.inner
            .lock()
            .map_err(|_| anyhow::anyhow!("memory store lock poisoned"))
    }

    fn writable(&self) -> anyhow::Result<()> {
        if self.read_only.load(Ordering::SeqCst) {
            anyhow::bail!("memory store is read-only");
        }
        Ok(())
    }
}

impl BoardStore for MemoryStore {
    fn load(&self, key: &StoreKey) -> anyhow::Result<Option<BoardDocument>> {
        Ok(self.lock()?.boards.get(key).cloned())
    }

    fn save(&self, key: &StoreKey, doc: &BoardDocument) -> anyhow::Result<()> {
        self.writable()?;
        self.lock()?.boards.insert(key.clone(), doc.clone());
        Ok(())
    }

    fn remove(&self, key: &StoreKey) -> anyhow::Result<()> {
        self.writable()?;
        self.lock()?.boards.remove(key);
        Ok(())
    }

    fn load_workspaces(&self, scope: &Scope) -> anyhow::Result<Option<Workspaces>> {
        Ok(self.lock()?.workspaces.get(scope).cloned())
    }

    fn save_workspaces(&self, scope: &Scope, list: &Workspaces) -> anyhow::Result<()> {
        self.writable()?;
        if self.workspaces_read_only.load(Ordering::SeqCst) {
            anyhow::bail!("memory store workspace list is read-only");
        }
        self.lock()?.workspaces.insert(scope.clone(), list.clone());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn read_only_rejects_writes_but_serves_reads() {
        let store = MemoryStore::new();
        let key = StoreKey::scoped(Scope::Local, "Default");
        store.save(&key, &BoardDocument::default()).unwrap();
        store.set_read_only(true);
        assert!(store.save(&key, &BoardDocument::default()).is_err());
        assert!(store.remove(&key).is_err());
        assert!(store.load(&key).unwrap().is_some());
    }
}
