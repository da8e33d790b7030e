#![forbid(unsafe_code)]

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize};
use time::{Date, OffsetDateTime};
use uuid::Uuid;

use crate::error::TierboardError;

/// Palette consumed round-robin by new root tasks.
pub const DEFAULT_PALETTE: [&str; 16] = [
    "#FF6B6B", "#4ECDC4", "#45B7D1", "#FFA07A", "#98D8C8", "#F7DC6F", "#BB8FCE", "#F1948A",
    "#82E0AA", "#85C1E9", "#F8C471", "#D7BDE2", "#73C6B6", "#F0B27A", "#FAD7A0", "#D2B4DE",
];

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[serde(rename_all = "lowercase")]
pub enum ColumnId {
    Final,
    Parent,
    Child,
    Grandchild,
}

impl ColumnId {
    pub const ALL: [ColumnId; 4] = [
        ColumnId::Final,
        ColumnId::Parent,
        ColumnId::Child,
        ColumnId::Grandchild,
    ];

    #[must_use]
    pub const fn index(self) -> usize {
        match self {
            ColumnId::Final => 0,
            ColumnId::Parent => 1,
            ColumnId::Child => 2,
            ColumnId::Grandchild => 3,
        }
    }

    #[must_use]
    pub fn from_index(index: usize) -> Option<Self> {
        Self::ALL.get(index).copied()
    }

    /// The column holding this column's parents.
    #[must_use]
    pub fn previous(self) -> Option<Self> {
        self.index().checked_sub(1).and_then(Self::from_index)
    }

    /// The column holding this column's children.
    #[must_use]
    pub fn next(self) -> Option<Self> {
        Self::from_index(self.index() + 1)
    }

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            ColumnId::Final => "final",
            ColumnId::Parent => "parent",
            ColumnId::Child => "child",
            ColumnId::Grandchild => "grandchild",
        }
    }
}

impl fmt::Display for ColumnId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ColumnId {
    type Err = TierboardError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "final" | "root" => Ok(ColumnId::Final),
            "parent" => Ok(ColumnId::Parent),
            "child" => Ok(ColumnId::Child),
            "grandchild" => Ok(ColumnId::Grandchild),
            _ => Err(TierboardError::InvalidColumn(s.to_owned())),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TaskId(String);

impl TaskId {
    /// Millisecond timestamp plus a short random suffix so ids minted in
    /// the same millisecond stay distinct.
    #[must_use]
    pub fn generate() -> Self {
        let millis = OffsetDateTime::now_utc().unix_timestamp_nanos() / 1_000_000;
        let suffix: String = Uuid::new_v4().simple().to_string().chars().take(4).collect();
        Self(format!("{millis}-{suffix}"))
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<String> for TaskId {
    fn from(value: String) -> Self {
        Self(value)
    }
}

impl From<&str> for TaskId {
    fn from(value: &str) -> Self {
        Self(value.to_owned())
    }
}

impl fmt::Display for TaskId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
pub enum Priority {
    #[serde(rename = "low")]
    Low,
    #[serde(rename = "medium")]
    Medium,
    #[serde(rename = "high")]
    High,
    #[default]
    #[serde(rename = "", alias = "none")]
    Unset,
}

impl Priority {
    pub const ALL: [Priority; 4] = [
        Priority::Unset,
        Priority::Low,
        Priority::Medium,
        Priority::High,
    ];

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Priority::Low => "low",
            Priority::Medium => "medium",
            Priority::High => "high",
            Priority::Unset => "none",
        }
    }
}

impl FromStr for Priority {
    type Err = TierboardError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "low" => Ok(Priority::Low),
            "medium" | "med" => Ok(Priority::Medium),
            "high" => Ok(Priority::High),
            "" | "none" | "unset" => Ok(Priority::Unset),
            _ => Err(TierboardError::InvalidPriority(s.to_owned())),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "kebab-case")]
pub enum TaskStatus {
    #[default]
    #[serde(alias = "未着手")]
    NotStarted,
    #[serde(alias = "進行中")]
    InProgress,
    #[serde(alias = "完了")]
    Done,
}

impl TaskStatus {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            TaskStatus::NotStarted => "not-started",
            TaskStatus::InProgress => "in-progress",
            TaskStatus::Done => "done",
        }
    }

    #[must_use]
    pub const fn cycle(self) -> Self {
        match self {
            TaskStatus::NotStarted => TaskStatus::InProgress,
            TaskStatus::InProgress => TaskStatus::Done,
            TaskStatus::Done => TaskStatus::NotStarted,
        }
    }
}

impl FromStr for TaskStatus {
    type Err = TierboardError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().replace('_', "-").as_str() {
            "not-started" | "todo" => Ok(TaskStatus::NotStarted),
            "in-progress" | "doing" => Ok(TaskStatus::InProgress),
            "done" => Ok(TaskStatus::Done),
            _ => Err(TierboardError::InvalidStatus(s.to_owned())),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
pub enum ReminderKind {
    #[default]
    #[serde(rename = "none")]
    None,
    #[serde(rename = "1month")]
    OneMonth,
    #[serde(rename = "1week")]
    OneWeek,
    #[serde(rename = "1day")]
    OneDay,
    #[serde(rename = "custom")]
    Custom,
}

impl ReminderKind {
    pub const ALL: [ReminderKind; 5] = [
        ReminderKind::None,
        ReminderKind::OneMonth,
        ReminderKind::OneWeek,
        ReminderKind::OneDay,
        ReminderKind::Custom,
    ];

    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            ReminderKind::None => "none",
            ReminderKind::OneMonth => "1 month before",
            ReminderKind::OneWeek => "1 week before",
            ReminderKind::OneDay => "1 day before",
            ReminderKind::Custom => "custom date",
        }
    }
}

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct Reminder {
    #[serde(rename = "type", default)]
    pub kind: ReminderKind,
    #[serde(rename = "customDate", default, with = "date_opt")]
    pub custom_date: Option<Date>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Task {
    pub id: TaskId,
    pub title: String,
    #[serde(default)]
    pub content: String,
    #[serde(default, with = "date_opt")]
    pub deadline: Option<Date>,
    #[serde(default)]
    pub priority: Priority,
    #[serde(default)]
    pub reminder: Reminder,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default, deserialize_with = "de_parent_id")]
    pub parent_id: Option<TaskId>,
    pub column_id: ColumnId,
    #[serde(default)]
    pub status: TaskStatus,
    #[serde(default, deserialize_with = "de_non_empty")]
    pub color: Option<String>,
}

impl Task {
    /// Builds a fresh, not-started record for `column` from form data.
    #[must_use]
    pub fn from_draft(id: TaskId, column: ColumnId, draft: TaskDraft) -> Self {
        Self {
            id,
            title: draft.title,
            content: draft.content,
            deadline: draft.deadline,
            priority: draft.priority,
            reminder: draft.reminder,
            tags: draft.tags,
            parent_id: draft.parent_id,
            column_id: column,
            status: TaskStatus::NotStarted,
            color: draft.color,
        }
    }

    #[must_use]
    pub fn is_root(&self) -> bool {
        self.column_id == ColumnId::Final
    }
}

/// Form data for creating or editing a task.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TaskDraft {
    pub title: String,
    pub content: String,
    pub deadline: Option<Date>,
    pub priority: Priority,
    pub reminder: Reminder,
    pub tags: Vec<String>,
    pub parent_id: Option<TaskId>,
    pub color: Option<String>,
}

impl TaskDraft {
    #[must_use]
    pub fn titled(title: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            ..Self::default()
        }
    }

    #[must_use]
    pub fn with_parent(mut self, parent: &TaskId) -> Self {
        self.parent_id = Some(parent.clone());
        self
    }

    #[must_use]
    pub fn with_color(mut self, color: impl Into<String>) -> Self {
        self.color = Some(color.into());
        self
    }
}

impl From<&Task> for TaskDraft {
    fn from(task: &Task) -> Self {
        Self {
            title: task.title.clone(),
            content: task.content.clone(),
            deadline: task.deadline,
            priority: task.priority,
            reminder: task.reminder,
            tags: task.tags.clone(),
            parent_id: task.parent_id.clone(),
            color: task.color.clone(),
        }
    }
}

pub fn parse_date(input: &str) -> Result<Date, TierboardError> {
    let trimmed = input.trim();
    // Accept datetime values as well; only the calendar date matters.
    let day = trimmed.get(..10).unwrap_or(trimmed);
    Date::parse(day, time::macros::format_description!("[year]-[month]-[day]"))
        .map_err(|_| TierboardError::InvalidDate(input.to_owned()))
}

#[must_use]
pub fn format_date(date: Date) -> String {
    format!(
        "{:04}-{:02}-{:02}",
        date.year(),
        u8::from(date.month()),
        date.day()
    )
}

#[must_use]
pub fn parse_tags(input: &str) -> Vec<String> {
    input
        .split(',')
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .map(str::to_owned)
        .collect()
}

#[must_use]
pub fn is_hex_color(s: &str) -> bool {
    s.strip_prefix('#')
        .is_some_and(|hex| hex.len() == 6 && hex.chars().all(|c| c.is_ascii_hexdigit()))
}

/// Splits `#RRGGBB` into its components.
#[must_use]
pub fn hex_rgb(s: &str) -> Option<(u8, u8, u8)> {
    if !is_hex_color(s) {
        return None;
    }
    let hex = s.get(1..)?;
    let r = u8::from_str_radix(hex.get(0..2)?, 16).ok()?;
    let g = u8::from_str_radix(hex.get(2..4)?, 16).ok()?;
    let b = u8::from_str_radix(hex.get(4..6)?, 16).ok()?;
    Some((r, g, b))
}

fn de_non_empty<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw: Option<String> = Option::deserialize(deserializer)?;
    Ok(raw.filter(|s| !s.trim().is_empty()))
}

fn de_parent_id<'de, D>(deserializer: D) -> Result<Option<TaskId>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(de_non_empty(deserializer)?.map(TaskId::from))
}

mod date_opt {
    use serde::{Deserialize as _, Deserializer, Serializer};
    use time::Date;

    pub fn serialize<S: Serializer>(value: &Option<Date>, s: S) -> Result<S::Ok, S::Error> {
        match value {
            Some(d) => s.serialize_str(&super::format_date(*d)),
            None => s.serialize_none(),
        }
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Option<Date>, D::Error> {
        let raw: Option<String> = Option::deserialize(d)?;
        match raw.as_deref().map(str::trim) {
            None | Some("") => Ok(None),
            Some(s) => super::parse_date(s)
                .map(Some)
                .map_err(serde::de::Error::custom),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use time::macros::date;

    #[test]
    fn column_neighbours() {
        assert_eq!(ColumnId::Final.previous(), None);
        assert_eq!(ColumnId::Child.previous(), Some(ColumnId::Parent));
        assert_eq!(ColumnId::Child.next(), Some(ColumnId::Grandchild));
        assert_eq!(ColumnId::Grandchild.next(), None);
        assert_eq!("Parent".parse::<ColumnId>().unwrap(), ColumnId::Parent);
        assert!("sibling".parse::<ColumnId>().is_err());
    }

    #[test]
    fn generated_ids_are_unique() {
        let a = TaskId::generate();
        let b = TaskId::generate();
        assert_ne!(a, b);
    }

    #[test]
    fn parses_loose_task_documents() {
        let raw = r##"{
            "id": "1700000000000",
            "title": "Write report",
            "content": "",
            "deadline": "2024-05-10",
            "priority": "",
            "reminder": { "type": "1week", "customDate": "" },
            "tags": ["work"],
            "parentId": "",
            "columnId": "final",
            "status": "進行中",
            "color": "#FF6B6B"
        }"##;
        let task: Task = serde_json::from_str(raw).unwrap();
        assert_eq!(task.deadline, Some(date!(2024 - 05 - 10)));
        assert_eq!(task.priority, Priority::Unset);
        assert_eq!(task.reminder.kind, ReminderKind::OneWeek);
        assert_eq!(task.reminder.custom_date, None);
        assert_eq!(task.parent_id, None);
        assert_eq!(task.status, TaskStatus::InProgress);
        assert_eq!(task.color.as_deref(), Some("#FF6B6B"));
    }

    #[test]
    fn serializes_with_camel_case_keys() {
        let task = Task {
            id: TaskId::from("t1"),
            title: "A".to_owned(),
            content: String::new(),
            deadline: None,
            priority: Priority::High,
            reminder: Reminder::default(),
            tags: Vec::new(),
            parent_id: Some(TaskId::from("p1")),
            column_id: ColumnId::Parent,
            status: TaskStatus::NotStarted,
            color: None,
        };
        let v = serde_json::to_value(&task).unwrap();
        assert_eq!(v["parentId"], "p1");
        assert_eq!(v["columnId"], "parent");
        assert_eq!(v["status"], "not-started");
        assert_eq!(v["reminder"]["type"], "none");
    }

    #[test]
    fn parses_dates_and_tags() {
        assert_eq!(parse_date("2024-02-29").unwrap(), date!(2024 - 02 - 29));
        assert_eq!(parse_date("2024-02-29T10:30").unwrap(), date!(2024 - 02 - 29));
        assert!(parse_date("29/02/2024").is_err());
        assert_eq!(format_date(date!(2024 - 01 - 05)), "2024-01-05");
        assert_eq!(parse_tags(" a, b ,,c"), vec!["a", "b", "c"]);
    }

    #[test]
    fn validates_hex_colors() {
        assert!(is_hex_color("#4ECDC4"));
        assert!(!is_hex_color("4ECDC4"));
        assert!(!is_hex_color("#4ECDC"));
        assert_eq!(hex_rgb("#FF6B6B"), Some((0xFF, 0x6B, 0x6B)));
        assert!(DEFAULT_PALETTE.iter().all(|c| is_hex_color(c)));
    }
}
