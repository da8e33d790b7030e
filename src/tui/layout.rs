#![forbid(unsafe_code)]

use ratatui::layout::Rect;

use crate::board::connector::CardRect;
use crate::board::model::{ColumnId, Task, TaskId};
use crate::board::tree::TaskTree;

/// Width of the connector lane between two columns.
pub const GUTTER: u16 = 5;
/// Blank rows between stacked cards.
pub const CARD_GAP: i32 = 1;
/// Content lines an expanded card shows.
pub const MAX_CONTENT_LINES: usize = 4;

/// Vertical placement of one card, relative to the top of the board.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Slot {
    pub id: TaskId,
    pub y: i32,
    pub height: i32,
}

#[must_use]
pub fn card_height(task: &Task, base: u16, expanded: bool) -> i32 {
    let base = i32::from(base.max(3));
    if !expanded {
        return base;
    }
    let content = task.content.lines().count().min(MAX_CONTENT_LINES);
    let tags = usize::from(!task.tags.is_empty());
    base + i32::try_from(content + tags).unwrap_or(0)
}

/// Where every card of the board goes for one frame.
#[derive(Debug, Clone)]
pub struct BoardGeometry {
    cards: Rect,
    col_width: u16,
    slots: [Vec<Slot>; 4],
}

impl BoardGeometry {
    /// `cards` is the screen area below the column headers. The card of
    /// `expanded` gets room for its content.
    #[must_use]
    pub fn compute(cards: Rect, tree: &TaskTree, base: u16, expanded: Option<&TaskId>) -> Self {
        let col_width = (cards.width.saturating_sub(GUTTER * 3) / 4).max(1);
        let slots = ColumnId::ALL.map(|column| {
            let mut y = 0;
            tree.column(column)
                .iter()
                .map(|task| {
                    let height = card_height(task, base, expanded == Some(&task.id));
                    let slot = Slot {
                        id: task.id.clone(),
                        y,
                        height,
                    };
                    y += height + CARD_GAP;
                    slot
                })
                .collect()
        });
        Self {
            cards,
            col_width,
            slots,
        }
    }

    #[must_use]
    pub fn cards(&self) -> Rect {
        self.cards
    }

    #[must_use]
    pub fn col_width(&self) -> u16 {
        self.col_width
    }

    #[must_use]
    pub fn slots(&self, column: ColumnId) -> &[Slot] {
        &self.slots[column.index()]
    }

    /// Screen x of a column's left edge.
    #[must_use]
    pub fn column_x(&self, column: ColumnId) -> i32 {
        let step = i32::from(self.col_width) + i32::from(GUTTER);
        i32::from(self.cards.x) + step * i32::try_from(column.index()).unwrap_or(0)
    }

    #[must_use]
    pub fn column_at(&self, x: i32) -> Option<ColumnId> {
        ColumnId::ALL.into_iter().find(|c| {
            let left = self.column_x(*c);
            x >= left && x < left + i32::from(self.col_width)
        })
    }

    /// Index of the card slot at board row `y` (screen row plus scroll).
    /// Below the last card counts as the last slot.
    #[must_use]
    pub fn index_at(&self, column: ColumnId, y: i32) -> Option<usize> {
        let slots = self.slots(column);
        let rel = y - i32::from(self.cards.y);
        slots
            .iter()
            .position(|s| rel < s.y + s.height + CARD_GAP)
            .or_else(|| slots.len().checked_sub(1))
    }

    /// Unscrolled screen box of a card, moved down by `dy` rows.
    #[must_use]
    pub fn card_rect(&self, column: ColumnId, index: usize, dy: i32) -> Option<CardRect> {
        let slot = self.slots(column).get(index)?;
        Some(CardRect::new(
            self.column_x(column),
            i32::from(self.cards.y) + slot.y + dy,
            i32::from(self.col_width),
            slot.height,
        ))
    }

    /// Rows siblings move by to close the gap of a lifted card.
    #[must_use]
    pub fn lift(&self, column: ColumnId, index: usize) -> i32 {
        self.slots(column)
            .get(index)
            .map_or(0, |s| s.height + CARD_GAP)
    }

    /// Rows the lifted card moves by so it sits in the gap its siblings
    /// opened at `over`.
    #[must_use]
    pub fn lifted_offset(&self, column: ColumnId, source: usize, over: usize) -> i32 {
        let slots = self.slots(column);
        let (Some(from), Some(to)) = (slots.get(source), slots.get(over)) else {
            return 0;
        };
        if over > source {
            to.y + to.height + CARD_GAP - self.lift(column, source) - from.y
        } else {
            to.y - from.y
        }
    }

    /// Lane to the right of `column`, if there is a next column.
    #[must_use]
    pub fn gutter(&self, column: ColumnId) -> Option<Rect> {
        column.next()?;
        let x = self.column_x(column) + i32::from(self.col_width);
        Some(Rect {
            x: u16::try_from(x).ok()?,
            y: self.cards.y,
            width: GUTTER,
            height: self.cards.height,
        })
    }

    #[must_use]
    pub fn content_height(&self) -> i32 {
        self.slots
            .iter()
            .filter_map(|col| col.last().map(|s| s.y + s.height))
            .max()
            .unwrap_or(0)
    }

    #[must_use]
    pub fn max_scroll(&self) -> i32 {
        (self.content_height() - i32::from(self.cards.height)).max(0)
    }
}
