#![forbid(unsafe_code)]

use std::collections::BTreeSet;

use crate::board::model::{ColumnId, TaskId};
use crate::board::tree::TaskTree;

/// A task plus everything reachable below it through parent links.
#[must_use]
pub fn descendant_closure(tree: &TaskTree, id: &TaskId) -> BTreeSet<TaskId> {
    let mut members = BTreeSet::from([id.clone()]);
    let Some((column, _)) = tree.locate(id) else {
        return members;
    };

    let mut frontier = BTreeSet::from([id.clone()]);
    let mut current = column;
    while let Some(next) = current.next() {
        if frontier.is_empty() {
            break;
        }
        let found: BTreeSet<TaskId> = tree
            .column(next)
            .iter()
            .filter(|t| t.parent_id.as_ref().is_some_and(|p| frontier.contains(p)))
            .map(|t| t.id.clone())
            .collect();
        members.extend(found.iter().cloned());
        frontier = found;
        current = next;
    }
    members
}

/// Transient highlighting of one task's descendant closure.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FocusFilter {
    active: Option<BTreeSet<TaskId>>,
}

impl FocusFilter {
    /// Clicking a task inside the active set clears the filter; any other
    /// click focuses the clicked task's closure.
    pub fn toggle(&mut self, tree: &TaskTree, id: &TaskId) {
        if self.active.as_ref().is_some_and(|set| set.contains(id)) {
            self.active = None;
        } else {
            self.active = Some(descendant_closure(tree, id));
        }
    }

    pub fn clear(&mut self) {
        self.active = None;
    }

    #[must_use]
    pub fn is_active(&self) -> bool {
        self.active.is_some()
    }

    /// Whether a card renders at full prominence.
    #[must_use]
    pub fn is_highlighted(&self, id: &TaskId) -> bool {
        self.active.as_ref().is_none_or(|set| set.contains(id))
    }

    #[must_use]
    pub fn members(&self) -> Option<&BTreeSet<TaskId>> {
        self.active.as_ref()
    }
}

/// Columns the closure touches, used to label the focus in the footer.
#[must_use]
pub fn spanned_columns(tree: &TaskTree, members: &BTreeSet<TaskId>) -> Vec<ColumnId> {
    ColumnId::ALL
        .into_iter()
        .filter(|c| tree.column(*c).iter().any(|t| members.contains(&t.id)))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::board::model::TaskDraft;

    struct Fixture {
        tree: TaskTree,
        a: TaskId,
        b1: TaskId,
        b2: TaskId,
        c1: TaskId,
        other: TaskId,
    }

    fn fixture() -> Fixture {
        let mut tree = TaskTree::default();
        let a = tree.add_task(ColumnId::Final, TaskDraft::titled("A")).id.clone();
        let other = tree.add_task(ColumnId::Final, TaskDraft::titled("Z")).id.clone();
        let b1 = tree
            .add_task(ColumnId::Parent, TaskDraft::titled("B1").with_parent(&a))
            .id
            .clone();
        let b2 = tree
            .add_task(ColumnId::Parent, TaskDraft::titled("B2").with_parent(&a))
            .id
            .clone();
        tree.add_task(ColumnId::Parent, TaskDraft::titled("Y").with_parent(&other));
        let c1 = tree
            .add_task(ColumnId::Child, TaskDraft::titled("C1").with_parent(&b2))
            .id
            .clone();
        Fixture {
            tree,
            a,
            b1,
            b2,
            c1,
            other,
        }
    }

    #[test]
    fn closure_covers_all_descendants() {
        let f = fixture();
        let set = descendant_closure(&f.tree, &f.a);
        let expected = BTreeSet::from([f.a.clone(), f.b1.clone(), f.b2.clone(), f.c1.clone()]);
        assert_eq!(set, expected);
        assert!(!set.contains(&f.other));
        assert_eq!(
            spanned_columns(&f.tree, &set),
            vec![ColumnId::Final, ColumnId::Parent, ColumnId::Child]
        );
    }

    #[test]
    fn closure_of_leaf_is_itself() {
        let f = fixture();
        assert_eq!(descendant_closure(&f.tree, &f.c1), BTreeSet::from([f.c1.clone()]));
    }

    #[test]
    fn toggle_twice_restores_unfiltered_view() {
        let f = fixture();
        let mut filter = FocusFilter::default();
        filter.toggle(&f.tree, &f.b2);
        assert!(filter.is_active());
        assert!(filter.is_highlighted(&f.c1));
        assert!(!filter.is_highlighted(&f.a));
        filter.toggle(&f.tree, &f.b2);
        assert_eq!(filter, FocusFilter::default());
        assert!(filter.is_highlighted(&f.a));
    }

    #[test]
    fn clicking_outside_the_set_refocuses() {
        let f = fixture();
        let mut filter = FocusFilter::default();
        filter.toggle(&f.tree, &f.b1);
        filter.toggle(&f.tree, &f.other);
        assert!(filter.is_highlighted(&f.other));
        assert!(!filter.is_highlighted(&f.b1));
    }

    #[test]
    fn clicking_a_member_clears() {
        let f = fixture();
        let mut filter = FocusFilter::default();
        filter.toggle(&f.tree, &f.a);
        filter.toggle(&f.tree, &f.c1);
        assert!(!filter.is_active());
    }
}
