#![forbid(unsafe_code)]

use std::collections::{HashMap, HashSet};

use tokio::sync::mpsc;
use tracing::trace;

use crate::board::model::{ColumnId, TaskId};
use crate::board::tree::TaskTree;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Point {
    pub x: i32,
    pub y: i32,
}

impl Point {
    #[must_use]
    pub const fn new(x: i32, y: i32) -> Self {
        Self { x, y }
    }
}

/// On-screen box of one card, in unscrolled board coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CardRect {
    pub x: i32,
    pub y: i32,
    pub width: i32,
    pub height: i32,
}

impl CardRect {
    #[must_use]
    pub const fn new(x: i32, y: i32, width: i32, height: i32) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    #[must_use]
    pub const fn right_center(&self) -> Point {
        Point::new(self.x + self.width, self.y + self.height / 2)
    }

    #[must_use]
    pub const fn left_center(&self) -> Point {
        Point::new(self.x, self.y + self.height / 2)
    }

    #[must_use]
    pub const fn contains(&self, x: i32, y: i32) -> bool {
        x >= self.x && x < self.x + self.width && y >= self.y && y < self.y + self.height
    }
}

/// Card boxes measured during the last layout pass.
#[derive(Debug, Clone, Default)]
pub struct CardLayout {
    rects: HashMap<TaskId, CardRect>,
}

impl CardLayout {
    pub fn clear(&mut self) {
        self.rects.clear();
    }

    pub fn record(&mut self, id: TaskId, rect: CardRect) {
        self.rects.insert(id, rect);
    }

    #[must_use]
    pub fn get(&self, id: &TaskId) -> Option<&CardRect> {
        self.rects.get(id)
    }

    /// The card under a point given in board coordinates.
    #[must_use]
    pub fn hit(&self, x: i32, y: i32) -> Option<&TaskId> {
        self.rects
            .iter()
            .find(|(_, r)| r.contains(x, y))
            .map(|(id, _)| id)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.rects.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.rects.is_empty()
    }
}

/// A line from a parent card to one of its children.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Connector {
    pub parent: TaskId,
    pub child: TaskId,
    pub from: Point,
    pub to: Point,
    pub color: String,
}

/// Everything that can move a card on screen.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LayoutEvent {
    TreeChanged,
    Resized,
    TransitionEnd,
    DragStarted,
    DragOver,
    DragEnded,
    Scrolled { dx: i32, dy: i32 },
    Explicit,
}

/// Sending half of the layout channel, handed to anything that changes
/// the board or its geometry.
#[derive(Debug, Clone)]
pub struct LayoutBus {
    tx: mpsc::UnboundedSender<LayoutEvent>,
}

impl LayoutBus {
    pub fn notify(&self, event: LayoutEvent) {
        if self.tx.send(event).is_err() {
            trace!(?event, "layout event dropped: renderer gone");
        }
    }

    /// Requests a full recompute on the next frame.
    pub fn redraw(&self) {
        self.notify(LayoutEvent::Explicit);
    }
}

/// Connectors for every parent/child pair whose cards are both laid out
/// and whose color resolves, one per pair even when ids repeat. Points are
/// in board coordinates.
#[must_use]
pub fn compute_connectors(tree: &TaskTree, layout: &CardLayout) -> Vec<Connector> {
    let mut out = Vec::new();
    let mut seen: HashSet<(&TaskId, &TaskId)> = HashSet::new();
    for column in ColumnId::ALL {
        if column.next().is_none() {
            continue;
        }
        for parent in tree.column(column) {
            let Some(start) = layout.get(&parent.id) else {
                continue;
            };
            for child in tree.children_of(parent) {
                let Some(end) = layout.get(&child.id) else {
                    continue;
                };
                let Some(color) = tree.find_ancestor_color(child) else {
                    continue;
                };
                if !seen.insert((&parent.id, &child.id)) {
                    continue;
                }
                out.push(Connector {
                    parent: parent.id.clone(),
                    child: child.id.clone(),
                    from: start.right_center(),
                    to: end.left_center(),
                    color: color.to_owned(),
                });
            }
        }
    }
    out
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameOutcome {
    /// Nothing happened since the last frame.
    Idle,
    /// Only the scroll offset moved.
    Scrolled,
    /// Connectors were recomputed from the tree and layout.
    Redrawn,
}

/// Receiving half of the layout channel. Drains every pending event once
/// per frame and recomputes at most once however many arrived.
#[derive(Debug)]
pub struct ConnectorRenderer {
    rx: mpsc::UnboundedReceiver<LayoutEvent>,
    connectors: Vec<Connector>,
    origin: Point,
    scroll: Point,
    dirty: bool,
    recomputes: u64,
}

impl ConnectorRenderer {
    #[must_use]
    pub fn new() -> (Self, LayoutBus) {
        let (tx, rx) = mpsc::unbounded_channel();
        let renderer = Self {
            rx,
            connectors: Vec::new(),
            origin: Point::default(),
            scroll: Point::default(),
            dirty: true,
            recomputes: 0,
        };
        (renderer, LayoutBus { tx })
    }

    /// Top-left corner of the drawing surface in board coordinates.
    pub fn set_origin(&mut self, origin: Point) {
        if origin != self.origin {
            self.origin = origin;
            self.dirty = true;
        }
    }

    #[must_use]
    pub fn scroll_offset(&self) -> Point {
        self.scroll
    }

    #[must_use]
    pub fn recomputes(&self) -> u64 {
        self.recomputes
    }

    pub fn frame(&mut self, tree: &TaskTree, layout: &CardLayout) -> FrameOutcome {
        let mut scrolled = false;
        while let Ok(event) = self.rx.try_recv() {
            match event {
                LayoutEvent::Scrolled { dx, dy } => {
                    self.scroll.x += dx;
                    self.scroll.y += dy;
                    scrolled = true;
                }
                LayoutEvent::Resized => {
                    self.scroll = Point::default();
                    self.dirty = true;
                }
                _ => self.dirty = true,
            }
        }

        if self.dirty {
            self.connectors = compute_connectors(tree, layout);
            self.dirty = false;
            self.recomputes += 1;
            trace!(count = self.connectors.len(), "connectors recomputed");
            FrameOutcome::Redrawn
        } else if scrolled {
            FrameOutcome::Scrolled
        } else {
            FrameOutcome::Idle
        }
    }

    /// Connectors relative to the drawing surface, after scrolling.
    pub fn visible(&self) -> impl Iterator<Item = Connector> + '_ {
        let dx = self.origin.x + self.scroll.x;
        let dy = self.origin.y + self.scroll.y;
        self.connectors.iter().map(move |c| Connector {
            from: Point::new(c.from.x - dx, c.from.y - dy),
            to: Point::new(c.to.x - dx, c.to.y - dy),
            ..c.clone()
        })
    }
}
