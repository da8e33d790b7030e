#![forbid(unsafe_code)]

use crate::board::model::ColumnId;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum DragState {
    #[default]
    Idle,
    Dragging {
        column: ColumnId,
        source: usize,
    },
    DraggingOver {
        column: ColumnId,
        source: usize,
        target: ColumnId,
        over: usize,
    },
}

/// Preview displacement of a card while a drag is in flight.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Shift {
    None,
    /// The card being dragged.
    Lifted,
    /// One card height up.
    Up,
    /// One card height down.
    Down,
}

/// Sibling reordering within a single column.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DragReorder {
    state: DragState,
}

impl DragReorder {
    #[must_use]
    pub fn state(&self) -> DragState {
        self.state
    }

    #[must_use]
    pub fn is_dragging(&self) -> bool {
        self.state != DragState::Idle
    }

    /// Column and index of the card being dragged.
    #[must_use]
    pub fn source(&self) -> Option<(ColumnId, usize)> {
        match self.state {
            DragState::Idle => None,
            DragState::Dragging { column, source } | DragState::DraggingOver { column, source, .. } => {
                Some((column, source))
            }
        }
    }

    /// Current candidate insertion point, if the pointer has reached one.
    #[must_use]
    pub fn target(&self) -> Option<(ColumnId, usize)> {
        match self.state {
            DragState::DraggingOver { target, over, .. } => Some((target, over)),
            _ => None,
        }
    }

    pub fn start(&mut self, column: ColumnId, index: usize) {
        self.state = DragState::Dragging {
            column,
            source: index,
        };
    }

    /// Records the card under the pointer. Returns true only when the
    /// candidate changed, so callers redraw once per index change.
    pub fn hover(&mut self, target: ColumnId, index: usize) -> bool {
        let Some((column, source)) = self.source() else {
            return false;
        };
        if self.target() == Some((target, index)) {
            return false;
        }
        self.state = DragState::DraggingOver {
            column,
            source,
            target,
            over: index,
        };
        true
    }

    /// Finishes the drag over `column`. Yields the `(from, to)` move only
    /// when the drop lands in the source column at a tracked index;
    /// anything else is a no-op. The machine is idle afterwards.
    pub fn drop(&mut self, column: ColumnId) -> Option<(usize, usize)> {
        let state = std::mem::take(&mut self.state);
        match state {
            DragState::DraggingOver {
                column: source_column,
                source,
                target,
                over,
            } if source_column == column && target == column => Some((source, over)),
            _ => None,
        }
    }

    /// Abandons the drag. Returns whether one was in flight.
    pub fn end(&mut self) -> bool {
        let was = self.is_dragging();
        self.state = DragState::Idle;
        was
    }

    /// Visual offset for the card at `index` in `column`.
    #[must_use]
    pub fn offset_for(&self, column: ColumnId, index: usize) -> Shift {
        let Some((source_column, source)) = self.source() else {
            return Shift::None;
        };
        if source_column != column {
            return Shift::None;
        }
        if index == source {
            return Shift::Lifted;
        }
        let Some((target, over)) = self.target() else {
            return Shift::None;
        };
        if target != column {
            return Shift::None;
        }
        if source < over && index > source && index <= over {
            Shift::Up
        } else if source > over && index < source && index >= over {
            Shift::Down
        } else {
            Shift::None
        }
    }
}
