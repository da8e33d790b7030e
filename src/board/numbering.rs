#![forbid(unsafe_code)]

use std::collections::HashMap;
use std::sync::OnceLock;

use regex::Regex;

use crate::board::model::Task;

fn suffix_re() -> Option<&'static Regex> {
    static RE: OnceLock<Option<Regex>> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r" #\d+$").ok()).as_ref()
}

/// The title with any trailing ` #<n>` disambiguation suffix removed.
#[must_use]
pub fn base_title(title: &str) -> &str {
    match suffix_re().and_then(|re| re.find(title)) {
        Some(m) => title.get(..m.start()).unwrap_or(title),
        None => title,
    }
}

/// Renumbers duplicate titles in list order: the first occurrence keeps
/// the bare title, later ones get ` #2`, ` #3`, ...
pub fn renumber(tasks: &mut [Task]) {
    let mut counts: HashMap<String, usize> = HashMap::new();
    for task in tasks.iter_mut() {
        let base = base_title(&task.title).to_owned();
        let n = counts.entry(base.clone()).or_insert(0);
        *n += 1;
        task.title = if *n > 1 { format!("{base} #{n}") } else { base };
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::board::model::{ColumnId, Task, TaskDraft, TaskId};

    fn task(title: &str) -> Task {
        Task::from_draft(TaskId::generate(), ColumnId::Final, TaskDraft::titled(title))
    }

    fn titles(tasks: &[Task]) -> Vec<&str> {
        tasks.iter().map(|t| t.title.as_str()).collect()
    }

    #[test]
    fn strips_only_trailing_numeric_suffix() {
        assert_eq!(base_title("Report #3"), "Report");
        assert_eq!(base_title("Report#3"), "Report#3");
        assert_eq!(base_title("Issue #12 follow-up"), "Issue #12 follow-up");
        assert_eq!(base_title("Report # 3"), "Report # 3");
    }

    #[test]
    fn numbers_duplicates_in_order() {
        let mut tasks = vec![task("Report"), task("Report"), task("Plan"), task("Report")];
        renumber(&mut tasks);
        assert_eq!(titles(&tasks), vec!["Report", "Report #2", "Plan", "Report #3"]);
    }

    #[test]
    fn renumbering_is_idempotent() {
        let mut tasks = vec![task("A"), task("A #7"), task("B"), task("A")];
        renumber(&mut tasks);
        let once: Vec<String> = tasks.iter().map(|t| t.title.clone()).collect();
        renumber(&mut tasks);
        let twice: Vec<String> = tasks.iter().map(|t| t.title.clone()).collect();
        assert_eq!(once, twice);
        assert_eq!(once, vec!["A", "A #2", "B", "A #3"]);
    }

    #[test]
    fn lone_suffixed_title_loses_suffix() {
        let mut tasks = vec![task("Report #2")];
        renumber(&mut tasks);
        assert_eq!(titles(&tasks), vec!["Report"]);
    }
}
