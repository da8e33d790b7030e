#![forbid(unsafe_code)]

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::error::TierboardError;
use crate::store::{BoardStore, Scope, StoreKey};

pub const DEFAULT_WORKSPACE: &str = "Default";

/// Ordered workspace names plus the active one.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Workspaces {
    #[serde(default)]
    names: Vec<String>,
    #[serde(default)]
    active: String,
}

impl Default for Workspaces {
    fn default() -> Self {
        Self {
            names: vec![DEFAULT_WORKSPACE.to_owned()],
            active: DEFAULT_WORKSPACE.to_owned(),
        }
    }
}

impl Workspaces {
    #[must_use]
    pub fn names(&self) -> &[String] {
        &self.names
    }

    #[must_use]
    pub fn active(&self) -> &str {
        &self.active
    }

    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.names.iter().any(|n| n == name)
    }

    /// Drops blanks and repeats, and points `active` at a real entry.
    #[must_use]
    pub fn repaired(mut self) -> Self {
        let mut seen = Vec::with_capacity(self.names.len());
        for name in self.names.drain(..) {
            let name = name.trim().to_owned();
            if !name.is_empty() && !seen.contains(&name) {
                seen.push(name);
            }
        }
        if seen.is_empty() {
            return Self::default();
        }
        if !seen.contains(&self.active) {
            self.active = seen[0].clone();
        }
        self.names = seen;
        self
    }

    pub fn add(&mut self, name: &str) -> Result<String, TierboardError> {
        let name = normalize(name)?;
        if self.contains(&name) {
            return Err(TierboardError::DuplicateWorkspace(name));
        }
        self.names.push(name.clone());
        Ok(name)
    }

    /// Renaming to the current name is accepted and changes nothing.
    pub fn rename(&mut self, old: &str, new: &str) -> Result<String, TierboardError> {
        let new = normalize(new)?;
        let Some(idx) = self.names.iter().position(|n| n == old) else {
            return Err(TierboardError::WorkspaceNotFound(old.to_owned()));
        };
        if new != old && self.contains(&new) {
            return Err(TierboardError::DuplicateWorkspace(new));
        }
        self.names[idx].clone_from(&new);
        if self.active == old {
            self.active.clone_from(&new);
        }
        Ok(new)
    }

    /// Removing the active workspace activates the first remaining one.
    pub fn remove(&mut self, name: &str) -> Result<(), TierboardError> {
        let Some(idx) = self.names.iter().position(|n| n == name) else {
            return Err(TierboardError::WorkspaceNotFound(name.to_owned()));
        };
        if self.names.len() == 1 {
            return Err(TierboardError::LastWorkspace);
        }
        self.names.remove(idx);
        if self.active == name {
            self.active = self.names[0].clone();
        }
        Ok(())
    }

    pub fn activate(&mut self, name: &str) -> Result<(), TierboardError> {
        if !self.contains(name) {
            return Err(TierboardError::WorkspaceNotFound(name.to_owned()));
        }
        self.active = name.to_owned();
        Ok(())
    }
}

fn normalize(name: &str) -> Result<String, TierboardError> {
    let name = name.trim();
    if name.is_empty() {
        return Err(TierboardError::EmptyWorkspaceName);
    }
    Ok(name.to_owned())
}

/// Workspace list of one scope, kept in sync with the store. Validation
/// runs before any document is touched.
pub struct WorkspaceRegistry {
    store: Arc<dyn BoardStore>,
    scope: Scope,
    list: Workspaces,
}

impl WorkspaceRegistry {
    /// Unreadable lists fall back to the default one.
    pub fn open(store: Arc<dyn BoardStore>, scope: Scope) -> Self {
        let list = match store.load_workspaces(&scope) {
            Ok(Some(list)) => list.repaired(),
            Ok(None) => Workspaces::default(),
            Err(e) => {
                warn!(scope = %scope, "failed to load workspaces: {e:#}");
                Workspaces::default()
            }
        };
        Self { store, scope, list }
    }

    #[must_use]
    pub fn list(&self) -> &Workspaces {
        &self.list
    }

    #[must_use]
    pub fn scope(&self) -> &Scope {
        &self.scope
    }

    #[must_use]
    pub fn key(&self, name: &str) -> StoreKey {
        StoreKey::scoped(self.scope.clone(), name)
    }

    #[must_use]
    pub fn active_key(&self) -> StoreKey {
        self.key(self.list.active())
    }

    pub fn add(&mut self, name: &str) -> anyhow::Result<String> {
        let mut next = self.list.clone();
        let name = next.add(name)?;
        self.commit(next)?;
        info!(workspace = %name, "workspace added");
        Ok(name)
    }

    /// Moves the board document along with the name.
    pub fn rename(&mut self, old: &str, new: &str) -> anyhow::Result<String> {
        let mut next = self.list.clone();
        let new = next.rename(old, new)?;
        if new != old {
            let from = self.key(old);
            let to = self.key(&new);
            if let Some(doc) = self.store.load(&from)? {
                self.store.save(&to, &doc)?;
            }
            if let Err(e) = self.commit(next) {
                if let Err(cleanup) = self.store.remove(&to) {
                    warn!(workspace = %to, "failed to drop copied board: {cleanup:#}");
                }
                return Err(e);
            }
            // The old name is gone from the list, so a leftover document is
            // unreachable.
            if let Err(e) = self.store.remove(&from) {
                warn!(workspace = %from, "failed to remove renamed board: {e:#}");
            }
        } else {
            self.commit(next)?;
        }
        info!(from = old, to = %new, "workspace renamed");
        Ok(new)
    }

    pub fn remove(&mut self, name: &str) -> anyhow::Result<()> {
        let mut next = self.list.clone();
        next.remove(name)?;
        self.commit(next)?;
        if let Err(e) = self.store.remove(&self.key(name)) {
            warn!(workspace = name, "failed to remove board: {e:#}");
        }
        info!(workspace = name, "workspace removed");
        Ok(())
    }

    pub fn activate(&mut self, name: &str) -> anyhow::Result<StoreKey> {
        let mut next = self.list.clone();
        next.activate(name)?;
        self.commit(next)?;
        info!(workspace = name, "workspace activated");
        Ok(self.active_key())
    }

    fn commit(&mut self, next: Workspaces) -> anyhow::Result<()> {
        self.store.save_workspaces(&self.scope, &next)?;
        self.list = next;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::board::tree::BoardDocument;
    use crate::store::memory::MemoryStore;

    #[test]
    fn starts_with_default() {
        let list = Workspaces::default();
        assert_eq!(list.names(), ["Default"]);
        assert_eq!(list.active(), "Default");
    }

    #[test]
    fn rejects_empty_and_duplicate_names() {
        let mut list = Workspaces::default();
        assert!(matches!(
            list.add("  "),
            Err(TierboardError::EmptyWorkspaceName)
        ));
        assert!(matches!(
            list.add(" Default "),
            Err(TierboardError::DuplicateWorkspace(_))
        ));
        assert_eq!(list.add(" Lab ").unwrap(), "Lab");
        assert!(matches!(
            list.rename("Lab", "Default"),
            Err(TierboardError::DuplicateWorkspace(_))
        ));
        assert_eq!(list.rename("Lab", "Lab").unwrap(), "Lab");
    }

    #[test]
    fn rename_follows_active() {
        let mut list = Workspaces::default();
        list.rename("Default", "Home").unwrap();
        assert_eq!(list.active(), "Home");
        assert_eq!(list.names(), ["Home"]);
    }

    #[test]
    fn removing_active_picks_first_remaining() {
        let mut list = Workspaces::default();
        list.add("Lab").unwrap();
        list.add("Work").unwrap();
        list.activate("Work").unwrap();
        list.remove("Work").unwrap();
        assert_eq!(list.active(), "Default");
        list.remove("Default").unwrap();
        assert!(matches!(
            list.remove("Lab"),
            Err(TierboardError::LastWorkspace)
        ));
        assert!(matches!(
            list.activate("Gone"),
            Err(TierboardError::WorkspaceNotFound(_))
        ));
    }

    #[test]
    fn repair_cleans_loaded_lists() {
        let raw: Workspaces =
            serde_json::from_str(r#"{"names": ["", "A", "A", " B "], "active": "Z"}"#).unwrap();
        let list = raw.repaired();
        assert_eq!(list.names(), ["A", "B"]);
        assert_eq!(list.active(), "A");

        let empty: Workspaces = serde_json::from_str("{}").unwrap();
        assert_eq!(empty.repaired(), Workspaces::default());
    }

    #[test]
    fn registry_moves_and_deletes_documents() {
        let store = Arc::new(MemoryStore::new());
        let mut registry = WorkspaceRegistry::open(store.clone(), Scope::Local);
        registry.add("Lab").unwrap();
        store
            .save(&registry.key("Lab"), &BoardDocument::default())
            .unwrap();

        registry.rename("Lab", "Research").unwrap();
        assert!(store.load(&registry.key("Lab")).unwrap().is_none());
        assert!(store.load(&registry.key("Research")).unwrap().is_some());

        registry.remove("Research").unwrap();
        assert!(store.load(&registry.key("Research")).unwrap().is_none());

        let reopened = WorkspaceRegistry::open(store, Scope::Local);
        assert_eq!(reopened.list().names(), ["Default"]);
    }

    #[test]
    fn failed_list_write_keeps_documents_reachable() {
        let store = Arc::new(MemoryStore::new());
        let mut registry = WorkspaceRegistry::open(store.clone(), Scope::Local);
        registry.add("Lab").unwrap();
        let lab = registry.key("Lab");
        store.save(&lab, &BoardDocument::default()).unwrap();

        store.set_workspaces_read_only(true);
        assert!(registry.rename("Lab", "Research").is_err());
        assert!(registry.list().contains("Lab"));
        assert!(store.load(&lab).unwrap().is_some());
        assert!(store.load(&registry.key("Research")).unwrap().is_none());

        assert!(registry.remove("Lab").is_err());
        assert!(registry.list().contains("Lab"));
        assert!(store.load(&lab).unwrap().is_some());
    }

    #[test]
    fn failed_validation_leaves_store_untouched() {
        let store = Arc::new(MemoryStore::new());
        let mut registry = WorkspaceRegistry::open(store.clone(), Scope::Local);
        assert!(registry.remove("Default").is_err());
        assert!(store.load_workspaces(&Scope::Local).unwrap().is_none());
    }
}
