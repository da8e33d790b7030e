#![forbid(unsafe_code)]

use std::sync::Arc;

use tracing::{debug, info, warn};

use crate::board::connector::{LayoutBus, LayoutEvent};
use crate::board::model::{ColumnId, Task, TaskDraft, TaskId, TaskStatus, is_hex_color};
use crate::board::tree::{BoardDocument, TaskTree};
use crate::error::TierboardError;
use crate::reminder::{self, ReminderScheduler};
use crate::store::{BoardStore, StoreKey};

/// The open board of one workspace. Every mutation is persisted, re-arms
/// reminders and tells the connector renderer to recompute.
pub struct BoardService {
    store: Arc<dyn BoardStore>,
    key: StoreKey,
    palette: Vec<String>,
    tree: TaskTree,
    bus: Option<LayoutBus>,
    reminders: Option<ReminderScheduler>,
    last_save_error: Option<String>,
}

impl BoardService {
    /// Load failures leave an empty board and are logged.
    pub fn open(store: Arc<dyn BoardStore>, key: StoreKey, palette: Vec<String>) -> Self {
        let tree = load_tree(store.as_ref(), &key, &palette);
        Self {
            store,
            key,
            palette,
            tree,
            bus: None,
            reminders: None,
            last_save_error: None,
        }
    }

    #[must_use]
    pub fn with_bus(mut self, bus: LayoutBus) -> Self {
        self.bus = Some(bus);
        self
    }

    #[must_use]
    pub fn with_reminders(mut self, mut scheduler: ReminderScheduler) -> Self {
        scheduler.rearm(&self.tree, reminder::now());
        self.reminders = Some(scheduler);
        self
    }

    #[must_use]
    pub fn tree(&self) -> &TaskTree {
        &self.tree
    }

    #[must_use]
    pub fn key(&self) -> &StoreKey {
        &self.key
    }

    /// Most recent persist failure, cleared on read.
    pub fn take_save_error(&mut self) -> Option<String> {
        self.last_save_error.take()
    }

    pub fn switch(&mut self, key: StoreKey) {
        info!(workspace = %key, "switching board");
        self.tree = load_tree(self.store.as_ref(), &key, &self.palette);
        self.key = key;
        self.refresh();
    }

    /// Reloads the current key, e.g. after the document was moved.
    pub fn reload(&mut self) {
        self.switch(self.key.clone());
    }

    pub fn add_task(&mut self, column: ColumnId, draft: TaskDraft) -> Result<TaskId, TierboardError> {
        self.validate(column, &draft, None)?;
        let id = self.tree.add_task(column, draft).id.clone();
        self.commit();
        Ok(id)
    }

    pub fn update_task(
        &mut self,
        column: ColumnId,
        id: &TaskId,
        draft: TaskDraft,
    ) -> Result<(), TierboardError> {
        let current = self.tree.get(column, id).and_then(|t| t.parent_id.clone());
        self.validate(column, &draft, current.as_ref())?;
        if !self.tree.update_task(column, id, draft) {
            return Err(TierboardError::TaskNotFound(id.to_string()));
        }
        self.commit();
        Ok(())
    }

    pub fn delete_task(&mut self, id: &TaskId) -> Result<Task, TierboardError> {
        let (column, _) = self.locate(id)?;
        let task = self
            .tree
            .delete_task(id, column)
            .ok_or_else(|| TierboardError::TaskNotFound(id.to_string()))?;
        self.commit();
        Ok(task)
    }

    /// Out of range indices are ignored.
    pub fn move_task(&mut self, column: ColumnId, from: usize, to: usize) -> bool {
        if !self.tree.move_task(column, from, to) {
            return false;
        }
        if from != to {
            self.commit();
        }
        true
    }

    pub fn set_status(&mut self, id: &TaskId, status: TaskStatus) -> Result<(), TierboardError> {
        let (column, _) = self.locate(id)?;
        self.tree.set_status(column, id, status);
        self.commit();
        Ok(())
    }

    pub fn cycle_status(&mut self, id: &TaskId) -> Result<TaskStatus, TierboardError> {
        let next = self
            .tree
            .find(id)
            .map(|t| t.status.cycle())
            .ok_or_else(|| TierboardError::TaskNotFound(id.to_string()))?;
        self.set_status(id, next)?;
        Ok(next)
    }

    pub fn duplicate_task(&mut self, id: &TaskId) -> Result<TaskId, TierboardError> {
        let (column, _) = self.locate(id)?;
        let copy = self
            .tree
            .duplicate_task(column, id)
            .ok_or_else(|| TierboardError::TaskNotFound(id.to_string()))?;
        self.commit();
        Ok(copy)
    }

    /// Swaps in a whole document, e.g. from an import.
    pub fn replace(&mut self, doc: BoardDocument) {
        self.tree = TaskTree::from_document(doc, self.palette.clone());
        self.commit();
    }

    pub fn shutdown(&mut self) {
        if let Some(reminders) = self.reminders.as_mut() {
            reminders.shutdown();
        }
    }

    fn locate(&self, id: &TaskId) -> Result<(ColumnId, usize), TierboardError> {
        self.tree
            .locate(id)
            .ok_or_else(|| TierboardError::TaskNotFound(id.to_string()))
    }

    /// `current_parent` is the link the edited record already has; an
    /// orphan may keep it even though that parent is gone.
    fn validate(
        &self,
        column: ColumnId,
        draft: &TaskDraft,
        current_parent: Option<&TaskId>,
    ) -> Result<(), TierboardError> {
        if draft.title.trim().is_empty() {
            return Err(TierboardError::EmptyTitle);
        }
        if let Some(color) = &draft.color
            && column == ColumnId::Final
            && !is_hex_color(color)
        {
            return Err(TierboardError::InvalidColor(color.clone()));
        }
        if let Some(parent) = &draft.parent_id
            && column != ColumnId::Final
            && current_parent != Some(parent)
            && !self.tree.parent_candidates(column).iter().any(|t| &t.id == parent)
        {
            return Err(TierboardError::TaskNotFound(parent.to_string()));
        }
        Ok(())
    }

    fn commit(&mut self) {
        match self.store.save(&self.key, &self.tree.to_document()) {
            Ok(()) => {
                debug!(workspace = %self.key, tasks = self.tree.len(), "board saved");
                self.last_save_error = None;
            }
            Err(e) => {
                warn!(workspace = %self.key, "failed to save board: {e:#}");
                self.last_save_error = Some(format!("save failed: {e:#}"));
            }
        }
        self.refresh();
    }

    fn refresh(&mut self) {
        if let Some(reminders) = self.reminders.as_mut() {
            reminders.rearm(&self.tree, reminder::now());
        }
        if let Some(bus) = &self.bus {
            bus.notify(LayoutEvent::TreeChanged);
        }
    }
}

impl Drop for BoardService {
    fn drop(&mut self) {
        self.shutdown();
    }
}

fn load_tree(store: &dyn BoardStore, key: &StoreKey, palette: &[String]) -> TaskTree {
    match store.load(key) {
        Ok(Some(doc)) => TaskTree::from_document(doc, palette.to_vec()),
        Ok(None) => TaskTree::new(palette.to_vec()),
        Err(e) => {
            warn!(workspace = %key, "failed to load board: {e:#}");
            TaskTree::new(palette.to_vec())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::board::connector::{CardLayout, ConnectorRenderer, FrameOutcome};
    use crate::store::Scope;
    use crate::store::memory::MemoryStore;

    fn service() -> (Arc<MemoryStore>, BoardService) {
        let store = Arc::new(MemoryStore::new());
        let key = StoreKey::scoped(Scope::Local, "Default");
        let svc = BoardService::open(store.clone(), key, Vec::new());
        (store, svc)
    }

    #[test]
    fn mutations_are_persisted() {
        let (store, mut svc) = service();
        let a = svc.add_task(ColumnId::Final, TaskDraft::titled("A")).unwrap();
        svc.add_task(ColumnId::Parent, TaskDraft::titled("B").with_parent(&a))
            .unwrap();
        let doc = store.load(svc.key()).unwrap().unwrap();
        assert_eq!(doc.finals.len(), 1);
        assert_eq!(doc.parent.len(), 1);

        let reopened = BoardService::open(store, svc.key().clone(), Vec::new());
        assert_eq!(reopened.tree(), svc.tree());
    }

    #[test]
    fn validation_errors_do_not_touch_the_board() {
        let (store, mut svc) = service();
        assert!(matches!(
            svc.add_task(ColumnId::Final, TaskDraft::titled("  ")),
            Err(TierboardError::EmptyTitle)
        ));
        assert!(matches!(
            svc.add_task(ColumnId::Final, TaskDraft::titled("A").with_color("red")),
            Err(TierboardError::InvalidColor(_))
        ));
        assert!(matches!(
            svc.add_task(
                ColumnId::Parent,
                TaskDraft::titled("B").with_parent(&TaskId::from("missing"))
            ),
            Err(TierboardError::TaskNotFound(_))
        ));
        assert!(svc.tree().is_empty());
        assert!(store.load(svc.key()).unwrap().is_none());
    }

    #[test]
    fn save_failures_are_surfaced_not_fatal() {
        let (store, mut svc) = service();
        store.set_read_only(true);
        svc.add_task(ColumnId::Final, TaskDraft::titled("A")).unwrap();
        assert_eq!(svc.tree().len(), 1);
        let err = svc.take_save_error().unwrap();
        assert!(err.contains("read-only"));
        assert!(svc.take_save_error().is_none());

        store.set_read_only(false);
        svc.add_task(ColumnId::Final, TaskDraft::titled("B")).unwrap();
        assert!(svc.take_save_error().is_none());
        assert_eq!(store.load(svc.key()).unwrap().unwrap().finals.len(), 2);
    }

    #[test]
    fn orphans_keep_their_link_when_edited() {
        let (_store, mut svc) = service();
        let a = svc.add_task(ColumnId::Final, TaskDraft::titled("A")).unwrap();
        let b = svc
            .add_task(ColumnId::Parent, TaskDraft::titled("B").with_parent(&a))
            .unwrap();
        svc.delete_task(&a).unwrap();

        let mut draft = TaskDraft::from(svc.tree().get(ColumnId::Parent, &b).unwrap());
        draft.title = "B renamed".to_owned();
        svc.update_task(ColumnId::Parent, &b, draft).unwrap();
        let task = svc.tree().get(ColumnId::Parent, &b).unwrap();
        assert_eq!(task.title, "B renamed");
        assert_eq!(task.parent_id.as_ref(), Some(&a));

        let elsewhere = TaskDraft::titled("B").with_parent(&TaskId::from("missing"));
        assert!(matches!(
            svc.update_task(ColumnId::Parent, &b, elsewhere),
            Err(TierboardError::TaskNotFound(_))
        ));
    }

    #[test]
    fn status_duplicate_and_delete_by_id() {
        let (_store, mut svc) = service();
        let a = svc.add_task(ColumnId::Final, TaskDraft::titled("A")).unwrap();
        assert_eq!(svc.cycle_status(&a).unwrap(), TaskStatus::InProgress);
        let copy = svc.duplicate_task(&a).unwrap();
        assert_eq!(svc.tree().find(&copy).unwrap().status, TaskStatus::InProgress);
        assert_eq!(svc.delete_task(&a).unwrap().id, a);
        assert!(matches!(
            svc.delete_task(&a),
            Err(TierboardError::TaskNotFound(_))
        ));
    }

    #[test]
    fn switching_loads_the_other_board() {
        let (_store, mut svc) = service();
        svc.add_task(ColumnId::Final, TaskDraft::titled("A")).unwrap();
        let home = svc.key().clone();
        svc.switch(home.with_workspace("Lab"));
        assert!(svc.tree().is_empty());
        svc.switch(home);
        assert_eq!(svc.tree().len(), 1);
    }

    #[test]
    fn mutations_notify_the_renderer() {
        let (renderer, bus) = ConnectorRenderer::new();
        let mut renderer = renderer;
        let (_store, svc) = service();
        let mut svc = svc.with_bus(bus);
        let layout = CardLayout::default();
        renderer.frame(svc.tree(), &layout);

        svc.add_task(ColumnId::Final, TaskDraft::titled("A")).unwrap();
        svc.add_task(ColumnId::Final, TaskDraft::titled("B")).unwrap();
        assert_eq!(renderer.frame(svc.tree(), &layout), FrameOutcome::Redrawn);
        assert_eq!(renderer.frame(svc.tree(), &layout), FrameOutcome::Idle);

        assert!(svc.move_task(ColumnId::Final, 0, 0));
        assert_eq!(renderer.frame(svc.tree(), &layout), FrameOutcome::Idle);
    }
}
