#![forbid(unsafe_code)]

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::board::model::{ColumnId, DEFAULT_PALETTE, Task, TaskDraft, TaskId, TaskStatus};
use crate::board::numbering;

/// Persisted form of a board: one ordered list per column.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct BoardDocument {
    #[serde(rename = "final", default)]
    pub finals: Vec<Task>,
    #[serde(default)]
    pub parent: Vec<Task>,
    #[serde(default)]
    pub child: Vec<Task>,
    #[serde(default)]
    pub grandchild: Vec<Task>,
    #[serde(default)]
    pub next_color: usize,
}

/// Owner of every task record on a board.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TaskTree {
    columns: [Vec<Task>; 4],
    next_color: usize,
    palette: Vec<String>,
}

impl Default for TaskTree {
    fn default() -> Self {
        Self::new(Vec::new())
    }
}

impl TaskTree {
    /// An empty tree. An empty palette falls back to the built-in one.
    #[must_use]
    pub fn new(palette: Vec<String>) -> Self {
        let palette = if palette.is_empty() {
            DEFAULT_PALETTE.iter().map(|c| (*c).to_owned()).collect()
        } else {
            palette
        };
        Self {
            columns: [Vec::new(), Vec::new(), Vec::new(), Vec::new()],
            next_color: 0,
            palette,
        }
    }

    #[must_use]
    pub fn from_document(doc: BoardDocument, palette: Vec<String>) -> Self {
        let mut tree = Self::new(palette);
        tree.next_color = doc.next_color % tree.palette.len();
        tree.columns = [doc.finals, doc.parent, doc.child, doc.grandchild];
        tree
    }

    #[must_use]
    pub fn to_document(&self) -> BoardDocument {
        let [finals, parent, child, grandchild] = self.columns.clone();
        BoardDocument {
            finals,
            parent,
            child,
            grandchild,
            next_color: self.next_color,
        }
    }

    #[must_use]
    pub fn palette(&self) -> &[String] {
        &self.palette
    }

    /// The palette color the next root task will receive.
    #[must_use]
    pub fn next_color(&self) -> &str {
        self.palette
            .get(self.next_color)
            .map_or(DEFAULT_PALETTE[0], String::as_str)
    }

    #[must_use]
    pub fn column(&self, column: ColumnId) -> &[Task] {
        &self.columns[column.index()]
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.columns.iter().map(Vec::len).sum()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.columns.iter().all(Vec::is_empty)
    }

    /// Every task, column by column.
    pub fn iter(&self) -> impl Iterator<Item = &Task> {
        self.columns.iter().flatten()
    }

    #[must_use]
    pub fn get(&self, column: ColumnId, id: &TaskId) -> Option<&Task> {
        self.column(column).iter().find(|t| &t.id == id)
    }

    #[must_use]
    pub fn locate(&self, id: &TaskId) -> Option<(ColumnId, usize)> {
        ColumnId::ALL.into_iter().find_map(|c| {
            self.column(c)
                .iter()
                .position(|t| &t.id == id)
                .map(|idx| (c, idx))
        })
    }

    #[must_use]
    pub fn find(&self, id: &TaskId) -> Option<&Task> {
        let (column, idx) = self.locate(id)?;
        self.column(column).get(idx)
    }

    /// Tasks a new task in `column` may hang under.
    #[must_use]
    pub fn parent_candidates(&self, column: ColumnId) -> &[Task] {
        column.previous().map_or(&[], |prev| self.column(prev))
    }

    /// Direct children of `task` in the next column, in list order.
    pub fn children_of<'a>(&'a self, task: &'a Task) -> impl Iterator<Item = &'a Task> + 'a {
        task.column_id
            .next()
            .map_or(&[][..], |next| self.column(next))
            .iter()
            .filter(move |child| child.parent_id.as_ref() == Some(&task.id))
    }

    /// Column a subtask of `task` goes into. Grandchildren have none.
    #[must_use]
    pub fn add_subtask_column(&self, task: &Task) -> Option<ColumnId> {
        task.column_id.next()
    }

    /// Appends a task to `column`. Root tasks take their color from the
    /// draft when one was picked, else from the palette; either way the
    /// palette cursor advances.
    pub fn add_task(&mut self, column: ColumnId, draft: TaskDraft) -> &Task {
        let mut task = Task::from_draft(TaskId::generate(), column, draft);
        if column == ColumnId::Final {
            task.parent_id = None;
            if task.color.is_none() {
                task.color = Some(self.next_color().to_owned());
            }
            self.next_color = (self.next_color + 1) % self.palette.len();
        } else {
            task.color = None;
        }
        debug!(id = %task.id, column = %column, "task added");

        let list = &mut self.columns[column.index()];
        list.push(task);
        numbering::renumber(list);
        let last = list.len() - 1;
        &list[last]
    }

    /// Merges `draft` into an existing record, keeping its id, column and
    /// status. Returns false when the task is not in `column`.
    pub fn update_task(&mut self, column: ColumnId, id: &TaskId, draft: TaskDraft) -> bool {
        let list = &mut self.columns[column.index()];
        let Some(task) = list.iter_mut().find(|t| &t.id == id) else {
            return false;
        };
        let previous_color = task.color.take();
        task.title = draft.title;
        task.content = draft.content;
        task.deadline = draft.deadline;
        task.priority = draft.priority;
        task.reminder = draft.reminder;
        task.tags = draft.tags;
        if column == ColumnId::Final {
            task.parent_id = None;
            task.color = draft.color.or(previous_color);
        } else {
            task.parent_id = draft.parent_id;
        }
        debug!(id = %id, column = %column, "task updated");
        numbering::renumber(list);
        true
    }

    /// Removes a task from one column. Children keep their now dangling
    /// parent reference.
    pub fn delete_task(&mut self, id: &TaskId, column: ColumnId) -> Option<Task> {
        let list = &mut self.columns[column.index()];
        let idx = list.iter().position(|t| &t.id == id)?;
        debug!(id = %id, column = %column, "task deleted");
        Some(list.remove(idx))
    }

    /// Moves the task at `from` to `to` within one column. Out of range
    /// indices leave the column untouched.
    pub fn move_task(&mut self, column: ColumnId, from: usize, to: usize) -> bool {
        let list = &mut self.columns[column.index()];
        if from >= list.len() || to >= list.len() {
            return false;
        }
        if from != to {
            let task = list.remove(from);
            list.insert(to, task);
            debug!(column = %column, from, to, "task moved");
        }
        true
    }

    pub fn set_status(&mut self, column: ColumnId, id: &TaskId, status: TaskStatus) -> bool {
        let Some(task) = self.columns[column.index()]
            .iter_mut()
            .find(|t| &t.id == id)
        else {
            return false;
        };
        task.status = status;
        true
    }

    /// Appends a copy of a task, under a fresh id, to the same column.
    pub fn duplicate_task(&mut self, column: ColumnId, id: &TaskId) -> Option<TaskId> {
        let list = &mut self.columns[column.index()];
        let mut copy = list.iter().find(|t| &t.id == id)?.clone();
        copy.id = TaskId::generate();
        let new_id = copy.id.clone();
        list.push(copy);
        debug!(source = %id, id = %new_id, "task duplicated");
        Some(new_id)
    }

    /// Walks parent links up to the root column. Broken links, self
    /// references, tasks filed under the wrong column and walks deeper
    /// than the column count all resolve to `None`.
    #[must_use]
    pub fn find_root<'a>(&'a self, task: &'a Task) -> Option<&'a Task> {
        let mut current = task;
        for _ in 0..ColumnId::ALL.len() {
            if current.column_id == ColumnId::Final {
                return Some(current);
            }
            let parent_column = current.column_id.previous()?;
            let parent_id = current.parent_id.as_ref()?;
            if parent_id == &current.id {
                return None;
            }
            let parent = self.get(parent_column, parent_id)?;
            if parent.column_id != parent_column {
                return None;
            }
            current = parent;
        }
        None
    }

    /// The display color of any task: a root's own color, or the color of
    /// the root it descends from.
    #[must_use]
    pub fn find_ancestor_color<'a>(&'a self, task: &'a Task) -> Option<&'a str> {
        self.find_root(task).and_then(|root| root.color.as_deref())
    }
}
