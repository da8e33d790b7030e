#![forbid(unsafe_code)]

use std::sync::Arc;

use time::{Date, Duration, Month, OffsetDateTime, PrimitiveDateTime, Time, UtcOffset};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::board::model::{ReminderKind, Task, TaskId};
use crate::board::tree::TaskTree;

pub const DEFAULT_HOUR: u8 = 9;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notification {
    pub task: TaskId,
    pub title: String,
    pub body: String,
}

impl Notification {
    #[must_use]
    pub fn for_task(task: &Task) -> Self {
        Self {
            task: task.id.clone(),
            title: "Task reminder".to_owned(),
            body: format!("\"{}\" is due soon.", task.title),
        }
    }
}

pub trait Notifier: Send + Sync {
    fn notify(&self, notification: Notification);
}

/// Hands notifications to whoever owns the receiver (the TUI shows them
/// as toasts).
#[derive(Debug, Clone)]
pub struct ChannelNotifier {
    tx: mpsc::UnboundedSender<Notification>,
}

impl ChannelNotifier {
    #[must_use]
    pub fn new() -> (Self, mpsc::UnboundedReceiver<Notification>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }
}

impl Notifier for ChannelNotifier {
    fn notify(&self, notification: Notification) {
        if self.tx.send(notification).is_err() {
            debug!("notification dropped: receiver gone");
        }
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct LogNotifier;

impl Notifier for LogNotifier {
    fn notify(&self, notification: Notification) {
        info!(task = %notification.task, "{}: {}", notification.title, notification.body);
    }
}

/// The calendar day a task's reminder is due, if it has one.
#[must_use]
pub fn fire_date(task: &Task) -> Option<Date> {
    match task.reminder.kind {
        ReminderKind::None => None,
        ReminderKind::OneMonth => task.deadline.and_then(one_month_before),
        ReminderKind::OneWeek => task.deadline?.checked_sub(Duration::days(7)),
        ReminderKind::OneDay => task.deadline?.checked_sub(Duration::days(1)),
        ReminderKind::Custom => task.reminder.custom_date,
    }
}

#[must_use]
pub fn fire_time(task: &Task, hour: u8, offset: UtcOffset) -> Option<OffsetDateTime> {
    let date = fire_date(task)?;
    let time = Time::from_hms(hour, 0, 0).ok()?;
    Some(PrimitiveDateTime::new(date, time).assume_offset(offset))
}

/// Same day of the previous month, clamped to that month's length.
fn one_month_before(date: Date) -> Option<Date> {
    let (year, month) = match date.month() {
        Month::January => (date.year() - 1, Month::December),
        m => (date.year(), m.previous()),
    };
    let day = date.day().min(time::util::days_in_year_month(year, month));
    Date::from_calendar_date(year, month, day).ok()
}

#[must_use]
pub fn local_offset() -> UtcOffset {
    UtcOffset::current_local_offset().unwrap_or(UtcOffset::UTC)
}

#[must_use]
pub fn now() -> OffsetDateTime {
    OffsetDateTime::now_utc().to_offset(local_offset())
}

/// One timer task per future reminder. Re-arming aborts the previous
/// generation; dropping the scheduler aborts everything.
pub struct ReminderScheduler {
    notifier: Arc<dyn Notifier>,
    hour: u8,
    offset: UtcOffset,
    handles: Vec<JoinHandle<()>>,
}

impl ReminderScheduler {
    #[must_use]
    pub fn new(notifier: Arc<dyn Notifier>, hour: u8) -> Self {
        Self::with_offset(notifier, hour, local_offset())
    }

    #[must_use]
    pub fn with_offset(notifier: Arc<dyn Notifier>, hour: u8, offset: UtcOffset) -> Self {
        Self {
            notifier,
            hour: hour.min(23),
            offset,
            handles: Vec::new(),
        }
    }

    #[must_use]
    pub fn armed(&self) -> usize {
        self.handles.iter().filter(|h| !h.is_finished()).count()
    }

    /// Returns how many timers are now pending. Outside a tokio runtime
    /// nothing is armed.
    pub fn rearm(&mut self, tree: &TaskTree, now: OffsetDateTime) -> usize {
        self.shutdown();
        let Ok(runtime) = tokio::runtime::Handle::try_current() else {
            warn!("no async runtime; reminders disabled");
            return 0;
        };

        for task in tree.iter() {
            let Some(at) = fire_time(task, self.hour, self.offset) else {
                continue;
            };
            let Ok(delay) = std::time::Duration::try_from(at - now) else {
                continue;
            };
            if delay.is_zero() {
                continue;
            }
            let notifier = Arc::clone(&self.notifier);
            let notification = Notification::for_task(task);
            debug!(task = %task.id, %at, "reminder armed");
            self.handles.push(runtime.spawn(async move {
                tokio::time::sleep(delay).await;
                notifier.notify(notification);
            }));
        }
        self.handles.len()
    }

    pub fn shutdown(&mut self) {
        for handle in self.handles.drain(..) {
            handle.abort();
        }
    }
}

impl Drop for ReminderScheduler {
    fn drop(&mut self) {
        self.shutdown();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::board::model::{ColumnId, Reminder, TaskDraft};
    use time::macros::{date, datetime};

    fn task_with(kind: ReminderKind, deadline: Option<Date>, custom: Option<Date>) -> Task {
        let mut draft = TaskDraft::titled("Report");
        draft.deadline = deadline;
        draft.reminder = Reminder {
            kind,
            custom_date: custom,
        };
        Task::from_draft(TaskId::from("t1"), ColumnId::Final, draft)
    }

    #[test]
    fn fire_dates_by_kind() {
        let deadline = Some(date!(2026 - 03 - 31));
        assert_eq!(
            fire_date(&task_with(ReminderKind::OneMonth, deadline, None)),
            Some(date!(2026 - 02 - 28))
        );
        assert_eq!(
            fire_date(&task_with(ReminderKind::OneMonth, Some(date!(2026 - 01 - 15)), None)),
            Some(date!(2025 - 12 - 15))
        );
        assert_eq!(
            fire_date(&task_with(ReminderKind::OneWeek, deadline, None)),
            Some(date!(2026 - 03 - 24))
        );
        assert_eq!(
            fire_date(&task_with(ReminderKind::OneDay, deadline, None)),
            Some(date!(2026 - 03 - 30))
        );
        assert_eq!(
            fire_date(&task_with(ReminderKind::Custom, deadline, Some(date!(2026 - 03 - 01)))),
            Some(date!(2026 - 03 - 01))
        );
        assert_eq!(fire_date(&task_with(ReminderKind::None, deadline, None)), None);
        assert_eq!(fire_date(&task_with(ReminderKind::OneDay, None, None)), None);
        assert_eq!(fire_date(&task_with(ReminderKind::Custom, deadline, None)), None);
    }

    #[test]
    fn fire_time_uses_configured_hour() {
        let task = task_with(ReminderKind::OneDay, Some(date!(2026 - 05 - 10)), None);
        assert_eq!(
            fire_time(&task, 9, UtcOffset::UTC),
            Some(datetime!(2026 - 05 - 09 09:00 UTC))
        );
    }

    #[test]
    fn notification_text() {
        let n = Notification::for_task(&task_with(ReminderKind::None, None, None));
        assert_eq!(n.title, "Task reminder");
        assert_eq!(n.body, "\"Report\" is due soon.");
    }

    fn tree_with_reminder(custom: Date) -> TaskTree {
        let mut tree = TaskTree::default();
        let mut draft = TaskDraft::titled("Ship");
        draft.reminder = Reminder {
            kind: ReminderKind::Custom,
            custom_date: Some(custom),
        };
        tree.add_task(ColumnId::Final, draft);
        let mut past = TaskDraft::titled("Old");
        past.reminder = Reminder {
            kind: ReminderKind::Custom,
            custom_date: Some(date!(2020 - 01 - 01)),
        };
        tree.add_task(ColumnId::Final, past);
        tree
    }

    #[tokio::test(start_paused = true)]
    async fn fires_future_reminders_only() {
        let (notifier, mut rx) = ChannelNotifier::new();
        let mut scheduler = ReminderScheduler::with_offset(Arc::new(notifier), 9, UtcOffset::UTC);
        let tree = tree_with_reminder(date!(2026 - 10 - 15));
        let armed = scheduler.rearm(&tree, datetime!(2026 - 10 - 14 09:00 UTC));
        assert_eq!(armed, 1);

        tokio::time::sleep(std::time::Duration::from_secs(24 * 3600 + 1)).await;
        let fired = rx.recv().await.unwrap();
        assert_eq!(fired.body, "\"Ship\" is due soon.");
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test(start_paused = true)]
    async fn rearm_and_shutdown_cancel_pending_timers() {
        let (notifier, mut rx) = ChannelNotifier::new();
        let mut scheduler = ReminderScheduler::with_offset(Arc::new(notifier), 9, UtcOffset::UTC);
        let tree = tree_with_reminder(date!(2026 - 10 - 15));
        let now = datetime!(2026 - 10 - 14 09:00 UTC);

        scheduler.rearm(&tree, now);
        assert_eq!(scheduler.rearm(&tree, now), 1);
        scheduler.shutdown();
        assert_eq!(scheduler.armed(), 0);

        tokio::time::sleep(std::time::Duration::from_secs(3 * 24 * 3600)).await;
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn no_runtime_arms_nothing() {
        let mut scheduler = ReminderScheduler::with_offset(Arc::new(LogNotifier), 9, UtcOffset::UTC);
        let tree = tree_with_reminder(date!(2099 - 01 - 01));
        assert_eq!(scheduler.rearm(&tree, datetime!(2026 - 10 - 14 09:00 UTC)), 0);
    }
}
