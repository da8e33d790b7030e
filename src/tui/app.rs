#![forbid(unsafe_code)]

use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant};

use crossterm::event::{
    self, Event, KeyCode, KeyEvent, KeyEventKind, KeyModifiers, MouseButton, MouseEvent,
    MouseEventKind,
};
use ratatui::Frame;
use ratatui::layout::{Constraint, Layout, Rect};
use ratatui::style::{Color, Modifier, Style};
use ratatui::symbols::Marker;
use ratatui::text::{Line, Span};
use ratatui::widgets::canvas::{Canvas, Circle, Line as CanvasLine, Points};
use ratatui::widgets::{
    Block, BorderType, Borders, Clear, List, ListItem, ListState, Paragraph, Wrap,
};
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use crate::board::connector::{
    CardLayout, CardRect, Connector, ConnectorRenderer, LayoutBus, LayoutEvent, Point,
};
use crate::board::drag::{DragReorder, Shift};
use crate::board::focus::{FocusFilter, spanned_columns};
use crate::board::model::{ColumnId, ReminderKind, Task, TaskId, TaskStatus, format_date};
use crate::board::service::BoardService;
use crate::board::tree::TaskTree;
use crate::config::{self, Config};
use crate::reminder::{ChannelNotifier, Notification, ReminderScheduler};
use crate::store::BoardStore;
use crate::store::session::Session;
use crate::store::workspace::WorkspaceRegistry;
use crate::tui;
use crate::tui::form::{FormMode, FormOutcome, TaskForm};
use crate::tui::input::{TextInput, centered_rect, handle_text_input_key};
use crate::tui::layout::{BoardGeometry, MAX_CONTENT_LINES};
use crate::tui::theme::{Theme, hex_color, priority_color, status_icon};

const WHEEL_STEP: i32 = 3;
const SIDEBAR_WIDTH: u16 = 24;

/// What the terminal UI needs from the command line layer.
pub struct AppContext {
    pub cfg: Config,
    pub config_path: PathBuf,
    pub session: Session,
    pub store: Arc<dyn BoardStore>,
}

#[derive(Debug, Clone)]
struct Toast {
    message: String,
    until: Instant,
}

impl Toast {
    fn info(message: impl Into<String>) -> Self {
        Self::lasting(message, Duration::from_secs(3))
    }

    fn lasting(message: impl Into<String>, ttl: Duration) -> Self {
        Self {
            message: message.into(),
            until: Instant::now() + ttl,
        }
    }
}

#[derive(Debug, Clone)]
enum ConfirmAction {
    DeleteTask(TaskId),
    RemoveWorkspace(String),
}

#[derive(Debug, Clone)]
struct ConfirmDialog {
    title: String,
    message: String,
    action: ConfirmAction,
}

#[derive(Debug, Clone)]
enum PanelInput {
    New(TextInput),
    Rename { old: String, name: TextInput },
}

impl PanelInput {
    fn text_mut(&mut self) -> &mut TextInput {
        match self {
            PanelInput::New(name) | PanelInput::Rename { name, .. } => name,
        }
    }

    fn text(&self) -> &TextInput {
        match self {
            PanelInput::New(name) | PanelInput::Rename { name, .. } => name,
        }
    }
}

#[derive(Debug, Clone, Default)]
struct WorkspacePanel {
    selected: usize,
    input: Option<PanelInput>,
    error: Option<String>,
}

/// Card under the pointer when the left button went down.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Press {
    column: ColumnId,
    index: usize,
}

struct AppState {
    cfg: Config,
    config_path: PathBuf,
    theme: Theme,
    session: Session,
    registry: WorkspaceRegistry,
    service: BoardService,
    renderer: ConnectorRenderer,
    bus: LayoutBus,
    notifications: mpsc::UnboundedReceiver<Notification>,

    layout: CardLayout,
    geometry: Option<BoardGeometry>,
    column: ColumnId,
    selected: [usize; 4],
    scroll: i32,
    follow: bool,
    focus: FocusFilter,
    drag: DragReorder,
    press: Option<Press>,
    sidebar: bool,

    form: Option<TaskForm>,
    confirm: Option<ConfirmDialog>,
    workspaces: Option<WorkspacePanel>,

    toast: Option<Toast>,
    last_error: Option<String>,
    should_quit: bool,
}

impl AppState {
    fn new(ctx: AppContext) -> Self {
        let AppContext {
            cfg,
            config_path,
            session,
            store,
        } = ctx;
        let (renderer, bus) = ConnectorRenderer::new();
        let (notifier, notifications) = ChannelNotifier::new();
        let registry = WorkspaceRegistry::open(Arc::clone(&store), session.scope());
        let mut service = BoardService::open(
            store,
            registry.active_key(),
            cfg.board.palette.clone(),
        )
        .with_bus(bus.clone());
        if cfg.reminders.enabled {
            service = service.with_reminders(ReminderScheduler::new(
                Arc::new(notifier),
                cfg.reminders.hour,
            ));
        }
        info!(workspace = %service.key(), "board opened");

        Self {
            theme: Theme::for_name(cfg.ui.theme),
            sidebar: cfg.ui.sidebar,
            cfg,
            config_path,
            session,
            registry,
            service,
            renderer,
            bus,
            notifications,
            layout: CardLayout::default(),
            geometry: None,
            column: ColumnId::Final,
            selected: [0; 4],
            scroll: 0,
            follow: false,
            focus: FocusFilter::default(),
            drag: DragReorder::default(),
            press: None,
            form: None,
            confirm: None,
            workspaces: None,
            toast: None,
            last_error: None,
            should_quit: false,
        }
    }

    fn tree(&self) -> &TaskTree {
        self.service.tree()
    }

    fn selected_index(&self) -> Option<usize> {
        let len = self.tree().column(self.column).len();
        (len > 0).then(|| self.selected[self.column.index()].min(len - 1))
    }

    fn selected_task(&self) -> Option<&Task> {
        self.selected_index()
            .and_then(|i| self.tree().column(self.column).get(i))
    }

    fn selected_id(&self) -> Option<TaskId> {
        self.selected_task().map(|t| t.id.clone())
    }

    /// Moves the cursor. A different card expands, so the layout changes.
    fn select(&mut self, column: ColumnId, index: usize) {
        let before = self.selected_id();
        self.column = column;
        self.selected[column.index()] = index;
        if self.selected_id() != before {
            self.bus.notify(LayoutEvent::TransitionEnd);
        }
    }

    fn select_id(&mut self, id: &TaskId) {
        if let Some((column, index)) = self.tree().locate(id) {
            self.select(column, index);
        }
    }

    fn move_selection(&mut self, delta: isize) {
        let len = self.tree().column(self.column).len();
        if len == 0 {
            return;
        }
        let cur = self.selected_index().unwrap_or(0);
        let next = cur.saturating_add_signed(delta).min(len - 1);
        self.select(self.column, next);
    }

    fn move_column(&mut self, forward: bool) {
        let next = if forward {
            self.column.next()
        } else {
            self.column.previous()
        };
        if let Some(column) = next {
            self.select(column, self.selected[column.index()]);
        }
    }

    fn apply_scroll(&mut self, target: i32, max: i32) {
        let next = target.clamp(0, max);
        let dy = next - self.scroll;
        if dy != 0 {
            self.scroll = next;
            self.bus.notify(LayoutEvent::Scrolled { dx: 0, dy });
        }
    }

    fn scroll_by(&mut self, dy: i32) {
        let max = self.geometry.as_ref().map_or(0, BoardGeometry::max_scroll);
        self.apply_scroll(self.scroll + dy, max);
    }

    fn page(&self) -> i32 {
        self.geometry
            .as_ref()
            .map_or(1, |g| (i32::from(g.cards().height) / 2).max(1))
    }

    /// Keeps the scroll in range and, after keyboard moves, the selected
    /// card in view.
    fn follow_selection(&mut self, geometry: &BoardGeometry) {
        let max = geometry.max_scroll();
        let mut target = self.scroll.min(max);
        if std::mem::take(&mut self.follow)
            && let Some(index) = self.selected_index()
            && let Some(slot) = geometry.slots(self.column).get(index)
        {
            let view = i32::from(geometry.cards().height);
            if slot.y < target {
                target = slot.y;
            } else if slot.y + slot.height > target + view {
                target = slot.y + slot.height - view;
            }
        }
        self.apply_scroll(target, max);
    }

    fn on_resize(&mut self) {
        self.scroll = 0;
        self.bus.notify(LayoutEvent::Resized);
    }

    fn reset_board_view(&mut self) {
        self.focus.clear();
        self.drag.end();
        self.press = None;
        self.selected = [0; 4];
        self.column = ColumnId::Final;
        self.scroll_by(-self.scroll);
    }

    fn begin_drag(&mut self, column: ColumnId, index: usize) {
        self.drag.start(column, index);
        self.bus.notify(LayoutEvent::DragStarted);
        debug!(%column, index, "drag started");
    }

    fn hover(&mut self, column: ColumnId, index: usize) {
        if self.drag.hover(column, index) {
            self.bus.notify(LayoutEvent::DragOver);
        }
    }

    /// Drops over `column`, or abandons the drag when it is `None`.
    fn finish_drag(&mut self, column: Option<ColumnId>) {
        let result = match column {
            Some(c) => self.drag.drop(c),
            None => {
                self.drag.end();
                None
            }
        };
        self.bus.notify(LayoutEvent::DragEnded);
        if let (Some(column), Some((from, to))) = (column, result)
            && self.service.move_task(column, from, to)
        {
            self.select(column, to);
        }
    }

    fn submit_form(&mut self) {
        let Some(form) = self.form.as_mut() else {
            return;
        };
        let draft = match form.draft() {
            Ok(d) => d,
            Err(e) => {
                form.error = Some(e.to_string());
                return;
            }
        };
        let column = form.column;
        let result = match form.mode.clone() {
            FormMode::Add => self.service.add_task(column, draft),
            FormMode::Edit(id) => self.service.update_task(column, &id, draft).map(|()| id),
        };
        match result {
            Ok(id) => {
                self.form = None;
                self.select_id(&id);
                self.toast = Some(Toast::info("Saved"));
            }
            Err(e) => {
                if let Some(form) = self.form.as_mut() {
                    form.error = Some(e.to_string());
                }
            }
        }
    }

    fn open_subtask_form(&mut self) {
        let Some(task) = self.selected_task() else {
            return;
        };
        match self.tree().add_subtask_column(task) {
            Some(column) => {
                let form = TaskForm::add(self.tree(), column, Some(&task.id));
                self.form = Some(form);
            }
            None => self.toast = Some(Toast::info("Grandchild tasks cannot have subtasks")),
        }
    }

    fn ask_delete(&mut self) {
        let Some(task) = self.selected_task() else {
            return;
        };
        let id = task.id.clone();
        let orphans = self.tree().children_of(task).count();
        let message = if orphans == 0 {
            format!("Delete \"{}\"?", task.title)
        } else {
            format!(
                "Delete \"{}\"? {orphans} subtask(s) will be left without a parent.",
                task.title
            )
        };
        self.confirm = Some(ConfirmDialog {
            title: "Delete task".to_owned(),
            message,
            action: ConfirmAction::DeleteTask(id),
        });
    }

    fn run_confirm(&mut self, action: ConfirmAction) {
        match action {
            ConfirmAction::DeleteTask(id) => match self.service.delete_task(&id) {
                Ok(task) => self.toast = Some(Toast::info(format!("Deleted \"{}\"", task.title))),
                Err(e) => self.last_error = Some(e.to_string()),
            },
            ConfirmAction::RemoveWorkspace(name) => {
                let was_active = self.registry.list().active() == name;
                match self.registry.remove(&name) {
                    Ok(()) => {
                        if was_active {
                            self.service.switch(self.registry.active_key());
                            self.reset_board_view();
                        }
                        let len = self.registry.list().names().len();
                        if let Some(panel) = self.workspaces.as_mut() {
                            panel.selected = panel.selected.min(len.saturating_sub(1));
                            panel.error = None;
                        }
                        self.toast = Some(Toast::info(format!("Removed workspace \"{name}\"")));
                    }
                    Err(e) => {
                        if let Some(panel) = self.workspaces.as_mut() {
                            panel.error = Some(format!("{e:#}"));
                        }
                    }
                }
            }
        }
    }

    fn open_workspace(&mut self, name: &str) -> anyhow::Result<()> {
        let key = self.registry.activate(name)?;
        self.service.switch(key);
        self.reset_board_view();
        Ok(())
    }

    /// Applies a pending create or rename. Returns the resulting name.
    fn apply_workspace_input(&mut self, input: &PanelInput) -> anyhow::Result<String> {
        match input {
            PanelInput::New(name) => self.registry.add(name.as_str()),
            PanelInput::Rename { old, name } => {
                let was_active = self.registry.list().active() == old;
                let new = self.registry.rename(old, name.as_str())?;
                if was_active {
                    self.service.switch(self.registry.active_key());
                }
                Ok(new)
            }
        }
    }

    fn cycle_theme(&mut self) {
        let next = self.theme.name.next();
        self.theme = Theme::for_name(next);
        self.cfg.ui.theme = next;
        match config::set_value_string_at_path(&self.config_path, "ui.theme", next.as_str()) {
            Ok(()) => self.toast = Some(Toast::info(format!("Theme: {}", next.as_str()))),
            Err(e) => {
                warn!("failed to persist theme: {e:#}");
                self.last_error = Some(format!("{e:#}"));
            }
        }
    }

    fn drain_background(&mut self) {
        while let Ok(n) = self.notifications.try_recv() {
            self.toast = Some(Toast::lasting(
                format!("{}: {}", n.title, n.body),
                Duration::from_secs(8),
            ));
        }
        if let Some(e) = self.service.take_save_error() {
            self.last_error = Some(e);
        }
    }
}

pub async fn run(ctx: AppContext) -> anyhow::Result<()> {
    let terminal = tui::init_terminal()?;
    let mut guard = TerminalGuard::new(terminal);
    let mut app = AppState::new(ctx);

    loop {
        if let Some(toast) = &app.toast
            && Instant::now() >= toast.until
        {
            app.toast = None;
        }
        app.drain_background();

        {
            let Some(terminal) = guard.terminal.as_mut() else {
                anyhow::bail!("terminal unavailable");
            };
            terminal.draw(|f| draw(f, &mut app))?;
        }

        if app.should_quit {
            break;
        }

        if event::poll(Duration::from_millis(50))? {
            match event::read()? {
                Event::Key(key) => handle_key(key, &mut app),
                Event::Mouse(mouse) => handle_mouse(mouse, &mut app),
                Event::Resize(..) => app.on_resize(),
                _ => {}
            }
        } else {
            // Gives reminder timers a turn on this worker.
            tokio::task::yield_now().await;
        }
    }

    app.service.shutdown();
    Ok(())
}

fn handle_key(key: KeyEvent, app: &mut AppState) {
    if key.kind != KeyEventKind::Press {
        return;
    }
    if app.confirm.is_some() {
        handle_confirm_key(key, app);
    } else if app.form.is_some() {
        handle_form_key(key, app);
    } else if app.workspaces.is_some() {
        handle_workspace_key(key, app);
    } else if app.drag.is_dragging() {
        handle_drag_key(key, app);
    } else {
        handle_board_key(key, app);
    }
}

fn handle_confirm_key(key: KeyEvent, app: &mut AppState) {
    match key.code {
        KeyCode::Char('y' | 'Y') => {
            if let Some(confirm) = app.confirm.take() {
                app.run_confirm(confirm.action);
            }
        }
        KeyCode::Char('n' | 'N') | KeyCode::Esc => app.confirm = None,
        _ => {}
    }
}

fn handle_form_key(key: KeyEvent, app: &mut AppState) {
    let Some(form) = app.form.as_mut() else {
        return;
    };
    match form.handle_key(key) {
        FormOutcome::Continue => {}
        FormOutcome::Cancel => app.form = None,
        FormOutcome::Submit => app.submit_form(),
    }
}

fn handle_drag_key(key: KeyEvent, app: &mut AppState) {
    let Some((column, source)) = app.drag.source() else {
        return;
    };
    let last = app.tree().column(column).len().saturating_sub(1);
    let over = app
        .drag
        .target()
        .filter(|(c, _)| *c == column)
        .map_or(source, |(_, i)| i);
    match key.code {
        KeyCode::Char('j') | KeyCode::Down => app.hover(column, (over + 1).min(last)),
        KeyCode::Char('k') | KeyCode::Up => app.hover(column, over.saturating_sub(1)),
        KeyCode::Enter | KeyCode::Char('m') => app.finish_drag(Some(column)),
        KeyCode::Esc => app.finish_drag(None),
        _ => {}
    }
}

fn handle_workspace_key(key: KeyEvent, app: &mut AppState) {
    let Some(panel) = app.workspaces.as_mut() else {
        return;
    };

    if let Some(input) = panel.input.as_mut() {
        match key.code {
            KeyCode::Esc => {
                panel.input = None;
                panel.error = None;
            }
            KeyCode::Enter => {
                let pending = input.clone();
                let result = app.apply_workspace_input(&pending);
                let names = app.registry.list().names().to_vec();
                if let Some(panel) = app.workspaces.as_mut() {
                    match result {
                        Ok(name) => {
                            panel.input = None;
                            panel.error = None;
                            panel.selected = names.iter().position(|n| *n == name).unwrap_or(0);
                        }
                        Err(e) => panel.error = Some(format!("{e:#}")),
                    }
                }
            }
            _ => handle_text_input_key(key, input.text_mut()),
        }
        return;
    }

    let names = app.registry.list().names();
    let selected = names.get(panel.selected).cloned();
    match key.code {
        KeyCode::Esc | KeyCode::Char('w' | 'q') => app.workspaces = None,
        KeyCode::Char('j') | KeyCode::Down => {
            panel.selected = (panel.selected + 1).min(names.len().saturating_sub(1));
        }
        KeyCode::Char('k') | KeyCode::Up => panel.selected = panel.selected.saturating_sub(1),
        KeyCode::Char('n') => {
            panel.input = Some(PanelInput::New(TextInput::default()));
            panel.error = None;
        }
        KeyCode::Char('r') => {
            if let Some(old) = selected {
                panel.input = Some(PanelInput::Rename {
                    name: TextInput::new(old.clone()),
                    old,
                });
                panel.error = None;
            }
        }
        KeyCode::Char('x') => {
            if let Some(name) = selected {
                app.confirm = Some(ConfirmDialog {
                    title: "Remove workspace".to_owned(),
                    message: format!("Remove \"{name}\" and its board?"),
                    action: ConfirmAction::RemoveWorkspace(name),
                });
            }
        }
        KeyCode::Enter => {
            if let Some(name) = selected {
                match app.open_workspace(&name) {
                    Ok(()) => {
                        app.workspaces = None;
                        app.toast = Some(Toast::info(format!("Workspace: {name}")));
                    }
                    Err(e) => {
                        if let Some(panel) = app.workspaces.as_mut() {
                            panel.error = Some(format!("{e:#}"));
                        }
                    }
                }
            }
        }
        _ => {}
    }
}

fn handle_board_key(key: KeyEvent, app: &mut AppState) {
    app.last_error = None;
    app.follow = true;
    match key.code {
        KeyCode::Char('q') => app.should_quit = true,
        KeyCode::Char('c') if key.modifiers.contains(KeyModifiers::CONTROL) => {
            app.should_quit = true;
        }
        KeyCode::Esc => app.focus.clear(),
        KeyCode::Char('h') | KeyCode::Left => app.move_column(false),
        KeyCode::Char('l') | KeyCode::Right => app.move_column(true),
        KeyCode::Char('j') | KeyCode::Down => app.move_selection(1),
        KeyCode::Char('k') | KeyCode::Up => app.move_selection(-1),
        KeyCode::Char('g') | KeyCode::Home => app.select(app.column, 0),
        KeyCode::Char('G') | KeyCode::End => {
            let last = app.tree().column(app.column).len().saturating_sub(1);
            app.select(app.column, last);
        }
        KeyCode::PageDown => app.scroll_by(app.page()),
        KeyCode::PageUp => app.scroll_by(-app.page()),
        KeyCode::Char('a') => app.form = Some(TaskForm::add(app.service.tree(), app.column, None)),
        KeyCode::Char('s') => app.open_subtask_form(),
        KeyCode::Char('e') => {
            if let Some(task) = app.selected_task() {
                let form = TaskForm::edit(app.tree(), task);
                app.form = Some(form);
            }
        }
        KeyCode::Char('y') => {
            if let Some(id) = app.selected_id() {
                match app.service.duplicate_task(&id) {
                    Ok(copy) => app.select_id(&copy),
                    Err(e) => app.last_error = Some(e.to_string()),
                }
            }
        }
        KeyCode::Char('d') | KeyCode::Delete => app.ask_delete(),
        KeyCode::Char(' ') => {
            if let Some(id) = app.selected_id()
                && let Err(e) = app.service.cycle_status(&id)
            {
                app.last_error = Some(e.to_string());
            }
        }
        KeyCode::Enter => {
            if let Some(id) = app.selected_id() {
                app.focus.toggle(app.service.tree(), &id);
            }
        }
        KeyCode::Char('m') => {
            if let Some(index) = app.selected_index() {
                app.begin_drag(app.column, index);
            }
        }
        KeyCode::Char('t') => app.cycle_theme(),
        KeyCode::Char('b') => app.sidebar = !app.sidebar,
        KeyCode::Char('w') => {
            let active = app.registry.list().active();
            let selected = app
                .registry
                .list()
                .names()
                .iter()
                .position(|n| n == active)
                .unwrap_or(0);
            app.workspaces = Some(WorkspacePanel {
                selected,
                ..WorkspacePanel::default()
            });
        }
        KeyCode::Char('r') => app.bus.redraw(),
        _ => {}
    }
}

fn handle_mouse(mouse: MouseEvent, app: &mut AppState) {
    if app.form.is_some() || app.confirm.is_some() || app.workspaces.is_some() {
        return;
    }
    let x = i32::from(mouse.column);
    let y = i32::from(mouse.row) + app.scroll;
    let slot_at = |app: &AppState| {
        app.geometry.as_ref().and_then(|g| {
            let column = g.column_at(x)?;
            Some((column, g.index_at(column, y)?))
        })
    };

    match mouse.kind {
        MouseEventKind::Down(MouseButton::Left) => {
            app.press = app
                .layout
                .hit(x, y)
                .and_then(|id| app.service.tree().locate(id))
                .map(|(column, index)| Press { column, index });
            if let Some(press) = app.press {
                app.select(press.column, press.index);
            }
        }
        MouseEventKind::Drag(MouseButton::Left) => {
            if !app.drag.is_dragging()
                && let Some(press) = app.press
            {
                app.begin_drag(press.column, press.index);
            }
            if app.drag.is_dragging()
                && let Some((column, index)) = slot_at(app)
            {
                app.hover(column, index);
            }
        }
        MouseEventKind::Up(MouseButton::Left) => {
            let press = app.press.take();
            if app.drag.is_dragging() {
                let column = app.geometry.as_ref().and_then(|g| g.column_at(x));
                app.finish_drag(column);
            } else if let Some(press) = press
                && let Some(task) = app.tree().column(press.column).get(press.index)
            {
                let id = task.id.clone();
                app.focus.toggle(app.service.tree(), &id);
            }
        }
        MouseEventKind::ScrollDown => app.scroll_by(WHEEL_STEP),
        MouseEventKind::ScrollUp => app.scroll_by(-WHEEL_STEP),
        _ => {}
    }
}

fn draw(f: &mut Frame<'_>, app: &mut AppState) {
    let area = f.area();
    f.render_widget(
        Block::default().style(Style::default().bg(app.theme.background).fg(app.theme.text)),
        area,
    );
    let [header, body, footer] = Layout::vertical([
        Constraint::Length(1),
        Constraint::Min(1),
        Constraint::Length(1),
    ])
    .areas(area);

    draw_header(f, header, app);
    let board = if app.sidebar {
        let [side, board] =
            Layout::horizontal([Constraint::Length(SIDEBAR_WIDTH), Constraint::Min(1)]).areas(body);
        draw_sidebar(f, side, app);
        board
    } else {
        body
    };
    draw_board(f, board, app);
    draw_footer(f, footer, app);

    if let Some(panel) = &app.workspaces {
        draw_workspaces(f, panel, app);
    }
    if let Some(form) = &app.form {
        form.draw(f, area, &app.theme);
    }
    if let Some(confirm) = &app.confirm {
        draw_confirm(f, confirm, &app.theme);
    }
}

fn draw_header(f: &mut Frame<'_>, area: Rect, app: &AppState) {
    let who = app
        .session
        .user()
        .map_or_else(|| "local".to_owned(), |u| format!("signed in as {u}"));
    let spans = vec![
        Span::styled(
            format!(" {} ", app.registry.list().active()),
            Style::default()
                .fg(app.theme.accent_text)
                .bg(app.theme.accent)
                .add_modifier(Modifier::BOLD),
        ),
        Span::styled(
            format!(
                " {who} • {} tasks • {} ",
                app.tree().len(),
                app.theme.name.as_str()
            ),
            Style::default().fg(app.theme.muted),
        ),
    ];
    f.render_widget(Paragraph::new(Line::from(spans)), area);
}

fn draw_sidebar(f: &mut Frame<'_>, area: Rect, app: &AppState) {
    let list = app.registry.list();
    let items: Vec<ListItem> = list
        .names()
        .iter()
        .map(|name| {
            if name == list.active() {
                ListItem::new(format!("▶ {name}")).style(
                    Style::default()
                        .fg(app.theme.accent)
                        .add_modifier(Modifier::BOLD),
                )
            } else {
                ListItem::new(format!("  {name}"))
            }
        })
        .collect();
    let block = Block::default()
        .borders(Borders::ALL)
        .border_style(Style::default().fg(app.theme.border))
        .title("Workspaces");
    f.render_widget(List::new(items).block(block), area);
}

#[derive(Debug, Clone, Copy)]
struct CardLook {
    color: Option<Color>,
    selected: bool,
    dimmed: bool,
    lifted: bool,
}

/// Rows cut off a card by the edges of the board.
#[derive(Debug, Clone, Copy, Default)]
struct Cut {
    top: u16,
    bottom: bool,
}

fn clip(rect: CardRect, scroll: i32, area: Rect) -> Option<(Rect, Cut)> {
    let top = rect.y - scroll;
    let bottom = top + rect.height;
    let y0 = top.max(i32::from(area.y));
    let y1 = bottom.min(i32::from(area.bottom()));
    if y1 <= y0 {
        return None;
    }
    let screen = Rect {
        x: u16::try_from(rect.x).ok()?,
        y: u16::try_from(y0).ok()?,
        width: u16::try_from(rect.width).ok()?,
        height: u16::try_from(y1 - y0).ok()?,
    }
    .intersection(area);
    let cut = Cut {
        top: u16::try_from(y0 - top).unwrap_or(0),
        bottom: y1 < bottom,
    };
    Some((screen, cut))
}

fn draw_board(f: &mut Frame<'_>, area: Rect, app: &mut AppState) {
    let [headers, cards] =
        Layout::vertical([Constraint::Length(1), Constraint::Min(1)]).areas(area);
    let selected = app.selected_id();
    let geometry = BoardGeometry::compute(
        cards,
        app.service.tree(),
        app.cfg.ui.card_height,
        selected.as_ref(),
    );
    app.follow_selection(&geometry);

    for column in ColumnId::ALL {
        let Ok(x) = u16::try_from(geometry.column_x(column)) else {
            continue;
        };
        let rect = Rect::new(x, headers.y, geometry.col_width(), 1).intersection(headers);
        let style = if column == app.column {
            Style::default()
                .fg(app.theme.accent)
                .add_modifier(Modifier::BOLD)
        } else {
            Style::default()
                .fg(app.theme.muted)
                .add_modifier(Modifier::BOLD)
        };
        let title = format!(
            "{} ({})",
            app.cfg.board.column_title(column.index()),
            app.tree().column(column).len()
        );
        f.render_widget(Paragraph::new(title).style(style), rect);
    }

    app.layout.clear();
    app.renderer
        .set_origin(Point::new(i32::from(cards.x), i32::from(cards.y)));
    let tree = app.service.tree();
    for column in ColumnId::ALL {
        let (lift, lifted_dy) = match app.drag.source() {
            Some((c, source)) if c == column => {
                let over = app
                    .drag
                    .target()
                    .filter(|(t, _)| *t == column)
                    .map_or(source, |(_, i)| i);
                (
                    geometry.lift(column, source),
                    geometry.lifted_offset(column, source, over),
                )
            }
            _ => (0, 0),
        };
        for (index, task) in tree.column(column).iter().enumerate() {
            let shift = app.drag.offset_for(column, index);
            let dy = match shift {
                Shift::None => 0,
                Shift::Lifted => lifted_dy,
                Shift::Up => -lift,
                Shift::Down => lift,
            };
            let Some(rect) = geometry.card_rect(column, index, dy) else {
                continue;
            };
            app.layout.record(task.id.clone(), rect);
            let Some((screen, cut)) = clip(rect, app.scroll, cards) else {
                continue;
            };
            let look = CardLook {
                color: tree.find_ancestor_color(task).and_then(hex_color),
                selected: selected.as_ref() == Some(&task.id),
                dimmed: !app.focus.is_highlighted(&task.id) || shift == Shift::Lifted,
                lifted: shift == Shift::Lifted,
            };
            draw_card(f, screen, cut, task, look, &app.theme);
        }
    }

    app.renderer.frame(tree, &app.layout);
    draw_connectors(f, &geometry, app);
    app.geometry = Some(geometry);
}

fn draw_card(f: &mut Frame<'_>, area: Rect, cut: Cut, task: &Task, look: CardLook, theme: &Theme) {
    let mut borders = Borders::ALL;
    if cut.top > 0 {
        borders.remove(Borders::TOP);
    }
    if cut.bottom {
        borders.remove(Borders::BOTTOM);
    }
    let border_color = if look.lifted {
        theme.accent
    } else {
        look.color.unwrap_or(theme.border)
    };
    let block = Block::default()
        .borders(borders)
        .border_type(if look.selected {
            BorderType::Thick
        } else {
            BorderType::Rounded
        })
        .border_style(Style::default().fg(border_color))
        .style(Style::default().bg(theme.background).fg(theme.text));

    let mut title_style = Style::default().add_modifier(Modifier::BOLD);
    if task.status == TaskStatus::Done {
        title_style = title_style.add_modifier(Modifier::CROSSED_OUT);
    }
    let muted = Style::default().fg(theme.muted);
    let mut lines = vec![Line::from(vec![
        Span::raw(format!("{} ", status_icon(task.status))),
        Span::styled(task.title.clone(), title_style),
    ])];

    let mut meta = vec![
        Span::styled("● ", Style::default().fg(priority_color(task.priority))),
        Span::styled(task.priority.as_str(), muted),
    ];
    if let Some(deadline) = task.deadline {
        meta.push(Span::styled(format!("  due {}", format_date(deadline)), muted));
    }
    if task.reminder.kind != ReminderKind::None {
        meta.push(Span::styled("  ⏰", muted));
    }
    lines.push(Line::from(meta));

    if look.selected {
        lines.extend(
            task.content
                .lines()
                .take(MAX_CONTENT_LINES)
                .map(|l| Line::from(l.to_owned())),
        );
        if !task.tags.is_empty() {
            let tags: Vec<String> = task.tags.iter().map(|t| format!("#{t}")).collect();
            lines.push(Line::from(Span::styled(
                tags.join(" "),
                Style::default().fg(theme.accent),
            )));
        }
    }

    let para = Paragraph::new(lines)
        .block(block)
        .scroll((cut.top.saturating_sub(1), 0));
    f.render_widget(para, area);
    if look.dimmed {
        f.buffer_mut()
            .set_style(area, Style::default().add_modifier(Modifier::DIM));
    }
}

/// One braille canvas per lane between columns.
fn draw_connectors(f: &mut Frame<'_>, geometry: &BoardGeometry, app: &AppState) {
    let origin_x = i32::from(geometry.cards().x);
    for column in ColumnId::ALL {
        let Some(lane) = geometry.gutter(column) else {
            continue;
        };
        let left = i32::from(lane.x) - origin_x;
        let lines: Vec<Connector> = app
            .renderer
            .visible()
            .filter(|c| c.from.x == left)
            .collect();
        if lines.is_empty() {
            continue;
        }
        let width = f64::from(lane.width);
        let height = f64::from(lane.height);
        let canvas = Canvas::default()
            .marker(Marker::Braille)
            .background_color(app.theme.background)
            .x_bounds([0.0, width])
            .y_bounds([0.0, height])
            .paint(move |ctx| {
                // Rows grow downwards on screen, upwards on the canvas.
                let at = |p: Point| (f64::from(p.x - left), height - f64::from(p.y) - 0.5);
                for c in &lines {
                    let color = hex_color(&c.color).unwrap_or(Color::Gray);
                    let (x1, y1) = at(c.from);
                    let (x2, y2) = at(c.to);
                    ctx.draw(&CanvasLine {
                        x1,
                        y1,
                        x2,
                        y2,
                        color,
                    });
                    for (x, y) in [(x1, y1), (x2, y2)] {
                        ctx.draw(&Circle {
                            x,
                            y,
                            radius: 0.3,
                            color,
                        });
                    }
                }
                ctx.layer();
                for c in &lines {
                    ctx.draw(&Points {
                        coords: &[at(c.from), at(c.to)],
                        color: Color::White,
                    });
                }
            });
        f.render_widget(canvas, lane);
    }
}

fn draw_footer(f: &mut Frame<'_>, area: Rect, app: &AppState) {
    let mut left = if app.confirm.is_some() {
        "y confirm • n cancel"
    } else if app.form.is_some() {
        "Enter save • Tab field • ←/→ choose • Esc cancel"
    } else if app.workspaces.is_some() {
        "j/k move • Enter open • n new • r rename • x remove • Esc close"
    } else if app.drag.is_dragging() {
        "j/k move card • Enter drop • Esc cancel"
    } else {
        "q quit • h/j/k/l move • a add • s subtask • e edit • y duplicate • d delete • space status • Enter focus • m move • w workspaces • t theme • b sidebar"
    }
    .to_owned();

    if let Some(err) = &app.last_error {
        left = format!("Error: {err}");
    } else if let Some(toast) = &app.toast {
        left.clone_from(&toast.message);
    }

    let right = match app.focus.members() {
        Some(members) => {
            let columns: Vec<&str> = spanned_columns(app.tree(), members)
                .into_iter()
                .map(ColumnId::as_str)
                .collect();
            format!("Focus: {} tasks ({})", members.len(), columns.join(", "))
        }
        None => String::new(),
    };

    let spans = vec![
        Span::styled(left, Style::default().fg(Color::White).bg(Color::Blue)),
        Span::raw(" "),
        Span::styled(
            right,
            Style::default()
                .fg(Color::White)
                .bg(Color::Blue)
                .add_modifier(Modifier::DIM),
        ),
    ];
    f.render_widget(
        Paragraph::new(Line::from(spans)).style(Style::default().bg(Color::Blue)),
        area,
    );
}

fn draw_confirm(f: &mut Frame<'_>, confirm: &ConfirmDialog, theme: &Theme) {
    let area = centered_rect(60, 25, f.area());
    f.render_widget(Clear, area);
    let block = Block::default()
        .borders(Borders::ALL)
        .border_style(Style::default().fg(theme.accent))
        .style(Style::default().bg(theme.background).fg(theme.text))
        .title(confirm.title.as_str());
    let inner = block.inner(area);
    f.render_widget(block, area);
    let lines = vec![
        Line::from(confirm.message.clone()),
        Line::from(""),
        Line::from("[y] yes    [n] no"),
    ];
    f.render_widget(Paragraph::new(lines).wrap(Wrap { trim: true }), inner);
}

fn draw_workspaces(f: &mut Frame<'_>, panel: &WorkspacePanel, app: &AppState) {
    let area = centered_rect(50, 50, f.area());
    f.render_widget(Clear, area);
    let block = Block::default()
        .borders(Borders::ALL)
        .border_style(Style::default().fg(app.theme.accent))
        .style(Style::default().bg(app.theme.background).fg(app.theme.text))
        .title("Workspaces");
    let inner = block.inner(area);
    f.render_widget(block, area);

    let [list_area, input_area, error_area] = Layout::vertical([
        Constraint::Min(1),
        Constraint::Length(1),
        Constraint::Length(1),
    ])
    .areas(inner);

    let list = app.registry.list();
    let items: Vec<ListItem> = list
        .names()
        .iter()
        .map(|name| {
            let marker = if name == list.active() { "▶ " } else { "  " };
            ListItem::new(format!("{marker}{name}"))
        })
        .collect();
    let mut state = ListState::default();
    state.select(Some(panel.selected));
    f.render_stateful_widget(
        List::new(items).highlight_style(
            Style::default()
                .fg(app.theme.accent_text)
                .bg(app.theme.accent),
        ),
        list_area,
        &mut state,
    );

    if let Some(input) = &panel.input {
        let label = match input {
            PanelInput::New(_) => "New: ",
            PanelInput::Rename { .. } => "Rename to: ",
        };
        f.render_widget(
            Paragraph::new(Line::from(vec![
                Span::styled(label, Style::default().add_modifier(Modifier::BOLD)),
                Span::raw(input.text().as_str().to_owned()),
            ])),
            input_area,
        );
    }
    if let Some(err) = &panel.error {
        f.render_widget(
            Paragraph::new(err.as_str()).style(Style::default().fg(Color::Red)),
            error_area,
        );
    }
}

struct TerminalGuard {
    terminal: Option<ratatui::Terminal<ratatui::backend::CrosstermBackend<std::io::Stdout>>>,
}

impl TerminalGuard {
    fn new(
        terminal: ratatui::Terminal<ratatui::backend::CrosstermBackend<std::io::Stdout>>,
    ) -> Self {
        Self {
            terminal: Some(terminal),
        }
    }
}

impl Drop for TerminalGuard {
    fn drop(&mut self) {
        if let Some(terminal) = self.terminal.take() {
            let _ = tui::restore_terminal(terminal);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::board::model::TaskDraft;
    use crate::store::memory::MemoryStore;
    use ratatui::Terminal;
    use ratatui::backend::TestBackend;

    struct Harness {
        app: AppState,
        terminal: Terminal<TestBackend>,
        _dir: tempfile::TempDir,
    }

    impl Harness {
        fn new() -> Self {
            let dir = tempfile::tempdir().unwrap();
            let mut cfg = Config::default();
            cfg.reminders.enabled = false;
            let ctx = AppContext {
                cfg,
                config_path: dir.path().join("config.toml"),
                session: Session::default(),
                store: Arc::new(MemoryStore::new()),
            };
            Self {
                app: AppState::new(ctx),
                terminal: Terminal::new(TestBackend::new(140, 40)).unwrap(),
                _dir: dir,
            }
        }

        fn draw(&mut self) {
            let app = &mut self.app;
            self.terminal.draw(|f| draw(f, app)).unwrap();
        }

        fn key(&mut self, code: KeyCode) {
            handle_key(KeyEvent::new(code, KeyModifiers::NONE), &mut self.app);
        }

        fn typed(&mut self, text: &str) {
            for c in text.chars() {
                self.key(KeyCode::Char(c));
            }
        }

        fn mouse(&mut self, kind: MouseEventKind, x: i32, y: i32) {
            let event = MouseEvent {
                kind,
                column: u16::try_from(x).unwrap(),
                row: u16::try_from(y).unwrap(),
                modifiers: KeyModifiers::NONE,
            };
            handle_mouse(event, &mut self.app);
        }

        fn add(&mut self, column: ColumnId, draft: TaskDraft) -> TaskId {
            self.app.service.add_task(column, draft).unwrap()
        }

        fn titles(&self, column: ColumnId) -> Vec<String> {
            self.app
                .tree()
                .column(column)
                .iter()
                .map(|t| t.title.clone())
                .collect()
        }
    }

    #[test]
    fn adds_a_task_through_the_form() {
        let mut h = Harness::new();
        h.key(KeyCode::Char('a'));
        assert!(h.app.form.is_some());
        h.key(KeyCode::Enter);
        assert!(h.app.form.as_ref().unwrap().error.is_some());

        h.typed("Ship it");
        h.key(KeyCode::Enter);
        assert!(h.app.form.is_none());
        assert_eq!(h.titles(ColumnId::Final), vec!["Ship it"]);
    }

    #[test]
    fn subtask_form_targets_the_next_column() {
        let mut h = Harness::new();
        let root = h.add(ColumnId::Final, TaskDraft::titled("Root"));
        h.key(KeyCode::Char('s'));
        h.typed("Leaf");
        h.key(KeyCode::Enter);
        let leaf = &h.app.tree().column(ColumnId::Parent)[0];
        assert_eq!(leaf.parent_id.as_ref(), Some(&root));
        assert_eq!(h.app.column, ColumnId::Parent);

        let mut h = Harness::new();
        let a = h.add(ColumnId::Final, TaskDraft::titled("A"));
        let b = h.add(ColumnId::Parent, TaskDraft::titled("B").with_parent(&a));
        let c = h.add(ColumnId::Child, TaskDraft::titled("C").with_parent(&b));
        h.add(ColumnId::Grandchild, TaskDraft::titled("D").with_parent(&c));
        h.app.select(ColumnId::Grandchild, 0);
        h.key(KeyCode::Char('s'));
        assert!(h.app.form.is_none());
        assert!(h.app.toast.is_some());
    }

    #[test]
    fn delete_asks_first() {
        let mut h = Harness::new();
        h.add(ColumnId::Final, TaskDraft::titled("Doomed"));
        h.key(KeyCode::Char('d'));
        h.key(KeyCode::Char('n'));
        assert_eq!(h.app.tree().len(), 1);
        h.key(KeyCode::Char('d'));
        h.key(KeyCode::Char('y'));
        assert!(h.app.tree().is_empty());
    }

    #[test]
    fn keyboard_drag_reorders_siblings() {
        let mut h = Harness::new();
        for t in ["A", "B", "C"] {
            h.add(ColumnId::Final, TaskDraft::titled(t));
        }
        h.app.select(ColumnId::Final, 0);
        h.key(KeyCode::Char('m'));
        h.key(KeyCode::Char('j'));
        h.key(KeyCode::Char('j'));
        h.key(KeyCode::Enter);
        assert!(!h.app.drag.is_dragging());
        assert_eq!(h.titles(ColumnId::Final), vec!["B", "C", "A"]);
        assert_eq!(h.app.selected_index(), Some(2));

        h.key(KeyCode::Char('m'));
        h.key(KeyCode::Char('k'));
        h.key(KeyCode::Esc);
        assert_eq!(h.titles(ColumnId::Final), vec!["B", "C", "A"]);
    }

    #[test]
    fn drawing_lays_out_cards_and_connectors() {
        let mut h = Harness::new();
        let a = h.add(ColumnId::Final, TaskDraft::titled("A"));
        h.add(ColumnId::Parent, TaskDraft::titled("B").with_parent(&a));
        h.add(ColumnId::Parent, TaskDraft::titled("Orphan"));
        h.draw();
        assert_eq!(h.app.layout.len(), 3);
        assert_eq!(h.app.renderer.visible().count(), 1);
        let recomputes = h.app.renderer.recomputes();
        h.draw();
        assert_eq!(h.app.renderer.recomputes(), recomputes);
    }

    #[test]
    fn mouse_drag_moves_a_card() {
        let mut h = Harness::new();
        let ids: Vec<TaskId> = ["A", "B", "C"]
            .iter()
            .map(|t| h.add(ColumnId::Final, TaskDraft::titled(*t)))
            .collect();
        h.draw();
        let first = *h.app.layout.get(&ids[0]).unwrap();
        let last = *h.app.layout.get(&ids[2]).unwrap();

        h.mouse(MouseEventKind::Down(MouseButton::Left), first.x + 1, first.y + 1);
        h.mouse(MouseEventKind::Drag(MouseButton::Left), last.x + 1, last.y + 1);
        assert!(h.app.drag.is_dragging());
        h.mouse(MouseEventKind::Up(MouseButton::Left), last.x + 1, last.y + 1);
        assert_eq!(h.titles(ColumnId::Final), vec!["B", "C", "A"]);
    }

    #[test]
    fn click_toggles_focus() {
        let mut h = Harness::new();
        let a = h.add(ColumnId::Final, TaskDraft::titled("A"));
        let b = h.add(ColumnId::Parent, TaskDraft::titled("B").with_parent(&a));
        h.add(ColumnId::Final, TaskDraft::titled("Other"));
        h.draw();
        let rect = *h.app.layout.get(&a).unwrap();

        h.mouse(MouseEventKind::Down(MouseButton::Left), rect.x + 1, rect.y + 1);
        h.mouse(MouseEventKind::Up(MouseButton::Left), rect.x + 1, rect.y + 1);
        let members = h.app.focus.members().unwrap();
        assert!(members.contains(&a) && members.contains(&b));
        assert_eq!(members.len(), 2);

        h.mouse(MouseEventKind::Down(MouseButton::Left), rect.x + 1, rect.y + 1);
        h.mouse(MouseEventKind::Up(MouseButton::Left), rect.x + 1, rect.y + 1);
        assert!(!h.app.focus.is_active());
    }

    #[test]
    fn workspace_panel_creates_and_opens() {
        let mut h = Harness::new();
        h.add(ColumnId::Final, TaskDraft::titled("Home task"));
        h.key(KeyCode::Char('w'));
        h.key(KeyCode::Char('n'));
        h.typed("Work");
        h.key(KeyCode::Enter);
        assert!(h.app.registry.list().contains("Work"));
        assert_eq!(h.app.workspaces.as_ref().unwrap().selected, 1);

        h.key(KeyCode::Enter);
        assert!(h.app.workspaces.is_none());
        assert_eq!(h.app.service.key().workspace(), "Work");
        assert!(h.app.tree().is_empty());
    }

    #[test]
    fn theme_choice_is_persisted() {
        let mut h = Harness::new();
        h.key(KeyCode::Char('t'));
        assert_eq!(h.app.theme.name, config::ThemeName::Dark);
        let saved = config::get_value_string_at_path(&h.app.config_path, "ui.theme").unwrap();
        assert_eq!(saved.as_deref(), Some("dark"));
    }

    #[test]
    fn scrolling_is_clamped_and_reported() {
        let mut h = Harness::new();
        for i in 0..12 {
            h.add(ColumnId::Final, TaskDraft::titled(format!("T{i}")));
        }
        h.draw();
        h.mouse(MouseEventKind::ScrollDown, 30, 10);
        assert_eq!(h.app.scroll, WHEEL_STEP);
        h.draw();
        assert_eq!(h.app.renderer.scroll_offset(), Point::new(0, WHEEL_STEP));

        for _ in 0..100 {
            h.mouse(MouseEventKind::ScrollDown, 30, 10);
        }
        let max = h.app.geometry.as_ref().unwrap().max_scroll();
        assert_eq!(h.app.scroll, max);

        h.app.on_resize();
        h.draw();
        assert_eq!(h.app.renderer.scroll_offset(), Point::default());
    }
}
