#![forbid(unsafe_code)]

use crossterm::event::{KeyCode, KeyEvent};
use ratatui::Frame;
use ratatui::layout::Rect;
use ratatui::style::{Color, Modifier, Style};
use ratatui::text::{Line, Span};
use ratatui::widgets::{Block, Borders, Clear, Paragraph, Wrap};

use crate::board::model::{
    ColumnId, Priority, Reminder, ReminderKind, Task, TaskDraft, TaskId, format_date,
    is_hex_color, parse_date, parse_tags,
};
use crate::board::tree::TaskTree;
use crate::error::TierboardError;
use crate::tui::input::{TextInput, centered_rect, handle_text_input_key};
use crate::tui::theme::{Theme, hex_color};

const MISSING_PARENT: &str = "(missing parent)";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FormField {
    Title,
    Content,
    Deadline,
    Priority,
    Reminder,
    CustomDate,
    Tags,
    Parent,
    Color,
}

impl FormField {
    fn label(self) -> &'static str {
        match self {
            FormField::Title => "Title:    ",
            FormField::Content => "Content:  ",
            FormField::Deadline => "Deadline: ",
            FormField::Priority => "Priority: ",
            FormField::Reminder => "Reminder: ",
            FormField::CustomDate => "Remind on:",
            FormField::Tags => "Tags:     ",
            FormField::Parent => "Parent:   ",
            FormField::Color => "Color:    ",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FormMode {
    Add,
    Edit(TaskId),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FormOutcome {
    Continue,
    Cancel,
    Submit,
}

/// Add/edit dialog for one task.
#[derive(Debug, Clone)]
pub struct TaskForm {
    pub mode: FormMode,
    pub column: ColumnId,
    pub field: FormField,
    title: TextInput,
    content: TextInput,
    deadline: TextInput,
    priority: Priority,
    reminder: ReminderKind,
    custom_date: TextInput,
    tags: TextInput,
    candidates: Vec<(TaskId, String)>,
    parent: Option<usize>,
    color: TextInput,
    pub error: Option<String>,
}

impl TaskForm {
    #[must_use]
    pub fn add(tree: &TaskTree, column: ColumnId, parent: Option<&TaskId>) -> Self {
        let mut form = Self::blank(tree, column, FormMode::Add);
        form.parent = parent.and_then(|p| form.candidates.iter().position(|(id, _)| id == p));
        if column == ColumnId::Final {
            form.color = TextInput::new(tree.next_color());
        }
        form
    }

    #[must_use]
    pub fn edit(tree: &TaskTree, task: &Task) -> Self {
        let mut form = Self::blank(tree, task.column_id, FormMode::Edit(task.id.clone()));
        form.title = TextInput::new(task.title.clone());
        form.content = TextInput::new(task.content.clone());
        form.deadline = TextInput::new(task.deadline.map(format_date).unwrap_or_default());
        form.priority = task.priority;
        form.reminder = task.reminder.kind;
        form.custom_date =
            TextInput::new(task.reminder.custom_date.map(format_date).unwrap_or_default());
        form.tags = TextInput::new(task.tags.join(", "));
        if let Some(p) = &task.parent_id {
            // A deleted parent stays selectable so the link survives the edit.
            let slot = match form.candidates.iter().position(|(id, _)| id == p) {
                Some(i) => i,
                None => {
                    form.candidates.push((p.clone(), MISSING_PARENT.to_owned()));
                    form.candidates.len() - 1
                }
            };
            form.parent = Some(slot);
        }
        form.color = TextInput::new(task.color.clone().unwrap_or_default());
        form
    }

    fn blank(tree: &TaskTree, column: ColumnId, mode: FormMode) -> Self {
        Self {
            mode,
            column,
            field: FormField::Title,
            title: TextInput::default(),
            content: TextInput::default(),
            deadline: TextInput::default(),
            priority: Priority::Unset,
            reminder: ReminderKind::None,
            custom_date: TextInput::default(),
            tags: TextInput::default(),
            candidates: tree
                .parent_candidates(column)
                .iter()
                .map(|t| (t.id.clone(), t.title.clone()))
                .collect(),
            parent: None,
            color: TextInput::default(),
            error: None,
        }
    }

    /// Fields shown for this column and reminder choice, in tab order.
    #[must_use]
    pub fn fields(&self) -> Vec<FormField> {
        let mut fields = vec![
            FormField::Title,
            FormField::Content,
            FormField::Deadline,
            FormField::Priority,
            FormField::Reminder,
        ];
        if self.reminder == ReminderKind::Custom {
            fields.push(FormField::CustomDate);
        }
        fields.push(FormField::Tags);
        if self.column == ColumnId::Final {
            fields.push(FormField::Color);
        } else {
            fields.push(FormField::Parent);
        }
        fields
    }

    fn step(&mut self, forward: bool) {
        let fields = self.fields();
        let len = fields.len();
        let idx = fields.iter().position(|f| *f == self.field).unwrap_or(0);
        let next = if forward { idx + 1 } else { idx + len - 1 };
        self.field = fields[next % len];
    }

    fn cycle(&mut self, forward: bool) {
        fn rotate<T: Copy + PartialEq>(all: &[T], cur: T, forward: bool) -> T {
            let len = all.len();
            let idx = all.iter().position(|x| *x == cur).unwrap_or(0);
            let next = if forward { idx + 1 } else { idx + len - 1 };
            all[next % len]
        }
        match self.field {
            FormField::Priority => self.priority = rotate(&Priority::ALL, self.priority, forward),
            FormField::Reminder => {
                self.reminder = rotate(&ReminderKind::ALL, self.reminder, forward);
            }
            FormField::Parent => {
                // Slot 0 is "no parent", slot i+1 is candidate i.
                let slots = self.candidates.len() + 1;
                let cur = self.parent.map_or(0, |i| i + 1);
                let next = if forward { cur + 1 } else { cur + slots - 1 };
                self.parent = (next % slots).checked_sub(1);
            }
            _ => {}
        }
    }

    fn is_choice(&self) -> bool {
        matches!(
            self.field,
            FormField::Priority | FormField::Reminder | FormField::Parent
        )
    }

    fn text_mut(&mut self) -> Option<&mut TextInput> {
        match self.field {
            FormField::Title => Some(&mut self.title),
            FormField::Content => Some(&mut self.content),
            FormField::Deadline => Some(&mut self.deadline),
            FormField::CustomDate => Some(&mut self.custom_date),
            FormField::Tags => Some(&mut self.tags),
            FormField::Color => Some(&mut self.color),
            FormField::Priority | FormField::Reminder | FormField::Parent => None,
        }
    }

    pub fn handle_key(&mut self, key: KeyEvent) -> FormOutcome {
        match key.code {
            KeyCode::Esc => return FormOutcome::Cancel,
            KeyCode::Enter => return FormOutcome::Submit,
            KeyCode::Tab | KeyCode::Down => self.step(true),
            KeyCode::BackTab | KeyCode::Up => self.step(false),
            KeyCode::Left if self.is_choice() => self.cycle(false),
            KeyCode::Right | KeyCode::Char(' ') if self.is_choice() => self.cycle(true),
            _ => {
                if let Some(input) = self.text_mut() {
                    handle_text_input_key(key, input);
                }
            }
        }
        FormOutcome::Continue
    }

    pub fn draft(&self) -> Result<TaskDraft, TierboardError> {
        let title = self.title.as_str().trim();
        if title.is_empty() {
            return Err(TierboardError::EmptyTitle);
        }
        let custom_date = if self.reminder == ReminderKind::Custom {
            optional_date(self.custom_date.as_str())?
        } else {
            None
        };
        let color = match self.color.as_str().trim() {
            "" => None,
            c if self.column == ColumnId::Final && !is_hex_color(c) => {
                return Err(TierboardError::InvalidColor(c.to_owned()));
            }
            c => Some(c.to_owned()),
        };
        Ok(TaskDraft {
            title: title.to_owned(),
            content: self.content.as_str().to_owned(),
            deadline: optional_date(self.deadline.as_str())?,
            priority: self.priority,
            reminder: Reminder {
                kind: self.reminder,
                custom_date,
            },
            tags: parse_tags(self.tags.as_str()),
            parent_id: self
                .parent
                .and_then(|i| self.candidates.get(i))
                .map(|(id, _)| id.clone()),
            color: color.filter(|_| self.column == ColumnId::Final),
        })
    }

    pub fn draw(&self, f: &mut Frame<'_>, area: Rect, theme: &Theme) {
        let area = centered_rect(70, 70, area);
        f.render_widget(Clear, area);
        let title = match self.mode {
            FormMode::Add => format!("Add task ({})", self.column),
            FormMode::Edit(_) => format!("Edit task ({})", self.column),
        };
        let block = Block::default()
            .borders(Borders::ALL)
            .border_style(Style::default().fg(theme.accent))
            .style(Style::default().bg(theme.background).fg(theme.text))
            .title(title);
        let inner = block.inner(area);
        f.render_widget(block, area);

        let label_style = Style::default().add_modifier(Modifier::BOLD);
        let active_style = Style::default()
            .fg(theme.accent)
            .add_modifier(Modifier::BOLD);

        let mut lines = Vec::new();
        for field in self.fields() {
            let style = if field == self.field {
                active_style
            } else {
                Style::default()
            };
            let mut spans = vec![
                Span::styled(field.label(), label_style),
                Span::raw(" "),
            ];
            match field {
                FormField::Priority => {
                    spans.push(Span::styled(format!("< {} >", self.priority.as_str()), style));
                }
                FormField::Reminder => {
                    spans.push(Span::styled(format!("< {} >", self.reminder.label()), style));
                }
                FormField::Parent => {
                    let name = self
                        .parent
                        .and_then(|i| self.candidates.get(i))
                        .map_or("(none)", |(_, title)| title.as_str());
                    spans.push(Span::styled(format!("< {name} >"), style));
                }
                FormField::Color => {
                    spans.push(Span::styled(self.color.as_str().to_owned(), style));
                    if let Some(swatch) = hex_color(self.color.as_str().trim()) {
                        spans.push(Span::raw(" "));
                        spans.push(Span::styled("  ", Style::default().bg(swatch)));
                    }
                }
                FormField::Deadline | FormField::CustomDate => {
                    spans.push(Span::styled(self.text(field).to_owned(), style));
                    spans.push(Span::styled("  YYYY-MM-DD", Style::default().fg(theme.muted)));
                }
                _ => spans.push(Span::styled(self.text(field).to_owned(), style)),
            }
            lines.push(Line::from(spans));
        }

        if let Some(err) = self.error.as_deref() {
            lines.push(Line::from(""));
            lines.push(Line::from(vec![
                Span::styled(
                    "Error: ",
                    Style::default().fg(Color::Red).add_modifier(Modifier::BOLD),
                ),
                Span::styled(err, Style::default().fg(Color::Red)),
            ]));
        }

        lines.push(Line::from(""));
        lines.push(Line::from(Span::styled(
            "Enter save • Tab/↑↓ field • ←/→ choose • Esc cancel",
            Style::default().fg(theme.muted),
        )));
        f.render_widget(Paragraph::new(lines).wrap(Wrap { trim: false }), inner);
    }

    fn text(&self, field: FormField) -> &str {
        match field {
            FormField::Title => self.title.as_str(),
            FormField::Content => self.content.as_str(),
            FormField::Deadline => self.deadline.as_str(),
            FormField::CustomDate => self.custom_date.as_str(),
            FormField::Tags => self.tags.as_str(),
            FormField::Color => self.color.as_str(),
            FormField::Priority | FormField::Reminder | FormField::Parent => "",
        }
    }
}

fn optional_date(input: &str) -> Result<Option<time::Date>, TierboardError> {
    if input.trim().is_empty() {
        Ok(None)
    } else {
        parse_date(input).map(Some)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crossterm::event::KeyModifiers;
    use time::macros::date;

    fn press(form: &mut TaskForm, code: KeyCode) -> FormOutcome {
        form.handle_key(KeyEvent::new(code, KeyModifiers::NONE))
    }

    fn type_text(form: &mut TaskForm, text: &str) {
        for c in text.chars() {
            press(form, KeyCode::Char(c));
        }
    }

    #[test]
    fn empty_title_is_an_inline_error() {
        let tree = TaskTree::default();
        let form = TaskForm::add(&tree, ColumnId::Final, None);
        assert!(matches!(form.draft(), Err(TierboardError::EmptyTitle)));
    }

    #[test]
    fn builds_a_draft_from_typed_fields() {
        let tree = TaskTree::default();
        let mut form = TaskForm::add(&tree, ColumnId::Final, None);
        type_text(&mut form, "Write report");
        press(&mut form, KeyCode::Tab);
        press(&mut form, KeyCode::Tab);
        type_text(&mut form, "2026-11-01");
        press(&mut form, KeyCode::Tab);
        press(&mut form, KeyCode::Right);
        press(&mut form, KeyCode::Right);
        press(&mut form, KeyCode::Tab);
        press(&mut form, KeyCode::Left);
        assert_eq!(form.fields().last(), Some(&FormField::Color));
        assert!(form.fields().contains(&FormField::CustomDate));
        press(&mut form, KeyCode::Tab);
        type_text(&mut form, "2026-10-20");
        press(&mut form, KeyCode::Tab);
        type_text(&mut form, "a, b");
        assert_eq!(press(&mut form, KeyCode::Enter), FormOutcome::Submit);

        let draft = form.draft().unwrap();
        assert_eq!(draft.title, "Write report");
        assert_eq!(draft.deadline, Some(date!(2026 - 11 - 01)));
        assert_eq!(draft.priority, Priority::Medium);
        assert_eq!(draft.reminder.kind, ReminderKind::Custom);
        assert_eq!(draft.reminder.custom_date, Some(date!(2026 - 10 - 20)));
        assert_eq!(draft.tags, vec!["a", "b"]);
        assert_eq!(draft.color.as_deref(), Some(tree.next_color()));
    }

    #[test]
    fn bad_dates_and_colors_are_rejected() {
        let tree = TaskTree::default();
        let mut form = TaskForm::add(&tree, ColumnId::Final, None);
        type_text(&mut form, "T");
        form.field = FormField::Deadline;
        type_text(&mut form, "tomorrow");
        assert!(matches!(form.draft(), Err(TierboardError::InvalidDate(_))));

        let mut form = TaskForm::add(&tree, ColumnId::Final, None);
        type_text(&mut form, "T");
        form.field = FormField::Color;
        type_text(&mut form, "zz");
        assert!(matches!(form.draft(), Err(TierboardError::InvalidColor(_))));
    }

    #[test]
    fn parent_choice_cycles_through_candidates() {
        let mut tree = TaskTree::default();
        let a = tree.add_task(ColumnId::Final, TaskDraft::titled("A")).id.clone();
        let b = tree.add_task(ColumnId::Final, TaskDraft::titled("B")).id.clone();
        let mut form = TaskForm::add(&tree, ColumnId::Parent, Some(&b));
        type_text(&mut form, "child");
        assert_eq!(form.draft().unwrap().parent_id.as_ref(), Some(&b));

        form.field = FormField::Parent;
        press(&mut form, KeyCode::Right);
        assert_eq!(form.draft().unwrap().parent_id, None);
        press(&mut form, KeyCode::Right);
        assert_eq!(form.draft().unwrap().parent_id.as_ref(), Some(&a));
        assert!(form.draft().unwrap().color.is_none());
    }

    #[test]
    fn editing_an_orphan_keeps_its_parent_link() {
        let mut tree = TaskTree::default();
        let a = tree.add_task(ColumnId::Final, TaskDraft::titled("A")).id.clone();
        let b = tree
            .add_task(ColumnId::Parent, TaskDraft::titled("B").with_parent(&a))
            .id
            .clone();
        tree.delete_task(&a, ColumnId::Final);

        let task = tree.get(ColumnId::Parent, &b).unwrap();
        let mut form = TaskForm::edit(&tree, task);
        assert_eq!(form.draft().unwrap().parent_id, Some(a.clone()));

        form.field = FormField::Parent;
        press(&mut form, KeyCode::Right);
        assert_eq!(form.draft().unwrap().parent_id, None);
        press(&mut form, KeyCode::Right);
        assert_eq!(form.draft().unwrap().parent_id, Some(a));
    }

    #[test]
    fn edit_prefills_from_the_task() {
        let mut tree = TaskTree::default();
        let mut draft = TaskDraft::titled("A");
        draft.tags = vec!["x".to_owned(), "y".to_owned()];
        draft.deadline = Some(date!(2026 - 12 - 24));
        let id = tree.add_task(ColumnId::Final, draft).id.clone();
        let task = tree.get(ColumnId::Final, &id).unwrap();
        let form = TaskForm::edit(&tree, task);
        assert_eq!(form.mode, FormMode::Edit(id));
        let round = form.draft().unwrap();
        assert_eq!(round.tags, vec!["x", "y"]);
        assert_eq!(round.deadline, Some(date!(2026 - 12 - 24)));
        assert_eq!(round.color, task.color);
    }
}
