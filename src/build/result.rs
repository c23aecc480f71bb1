//! Task results.
//!
//! Every named task reports a [`TaskResult`]; a [`BuildResult`] collects the
//! results of one invocation in completion order and renders the summary
//! the CLI prints.

use std::fmt;
use std::path::PathBuf;
use std::time::Duration;

use super::pipeline::Task;

/// Most warnings listed per task in the summary.
const WARNINGS_PER_TASK: usize = 5;

/// How a task ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TaskStatus {
    Done,
    /// Nothing to do, e.g. the locale catalog was already generated
    Skipped { reason: String },
    Failed(String),
}

impl fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TaskStatus::Done => write!(f, "ok"),
            TaskStatus::Skipped { reason } => write!(f, "skipped ({})", reason),
            TaskStatus::Failed(err) => write!(f, "failed: {}", err),
        }
    }
}

/// Result of running one named task.
#[derive(Debug, Clone)]
pub struct TaskResult {
    pub task: Task,
    pub status: TaskStatus,
    /// Files written by the task
    pub files: Vec<PathBuf>,
    pub warnings: Vec<String>,
    pub duration: Duration,
}

impl TaskResult {
    pub fn new(task: Task, status: TaskStatus, duration: Duration) -> Self {
        Self { task, status, files: Vec::new(), warnings: Vec::new(), duration }
    }

    pub fn with_output(mut self, files: Vec<PathBuf>, warnings: Vec<String>) -> Self {
        self.files = files;
        self.warnings = warnings;
        self
    }

    /// Skipped tasks count as successful.
    pub fn is_success(&self) -> bool {
        !matches!(self.status, TaskStatus::Failed(_))
    }

    fn summary_line(&self) -> String {
        let status = match &self.status {
            TaskStatus::Done => format!("ok       {:>4} files", self.files.len()),
            TaskStatus::Skipped { reason } => format!("skipped  ({})", reason),
            TaskStatus::Failed(_) => "FAILED".to_string(),
        };
        format!("  {:<16} {}  {:?}", self.task.name(), status, self.duration)
    }
}

/// Results of one invocation.
#[derive(Debug, Default)]
pub struct BuildResult {
    pub tasks: Vec<TaskResult>,
    pub total_duration: Duration,
}

impl BuildResult {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, result: TaskResult) {
        self.tasks.push(result);
    }

    pub fn with_duration(mut self, duration: Duration) -> Self {
        self.total_duration = duration;
        self
    }

    pub fn is_success(&self) -> bool {
        self.tasks.iter().all(TaskResult::is_success)
    }

    /// Result of a task by name.
    pub fn task(&self, name: &str) -> Option<&TaskResult> {
        self.tasks.iter().find(|r| r.task.name() == name)
    }

    pub fn failures(&self) -> Vec<&TaskResult> {
        self.tasks.iter().filter(|r| !r.is_success()).collect()
    }

    /// One line per task with its warnings underneath, then the verdict.
    pub fn summary(&self) -> String {
        let mut lines = Vec::new();
        for task in &self.tasks {
            lines.push(task.summary_line());
            for warning in task.warnings.iter().take(WARNINGS_PER_TASK) {
                lines.push(format!("      warning: {}", warning));
            }
            if task.warnings.len() > WARNINGS_PER_TASK {
                lines.push(format!(
                    "      ... and {} more warning(s)",
                    task.warnings.len() - WARNINGS_PER_TASK
                ));
            }
        }

        let failures = self.failures();
        if failures.is_empty() {
            let files: usize = self.tasks.iter().map(|t| t.files.len()).sum();
            let skipped = self
                .tasks
                .iter()
                .filter(|t| matches!(t.status, TaskStatus::Skipped { .. }))
                .count();
            lines.push(format!(
                "Build succeeded: {} task(s), {} skipped, {} file(s) in {:?}",
                self.tasks.len(),
                skipped,
                files,
                self.total_duration
            ));
        } else {
            lines.push(format!(
                "Build failed: {} of {} task(s) failed",
                failures.len(),
                self.tasks.len()
            ));
            for task in failures {
                lines.push(format!("  - {}: {}", task.task.name(), task.status));
            }
        }
        lines.join("\n")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_display() {
        assert_eq!(TaskStatus::Done.to_string(), "ok");
        let skipped = TaskStatus::Skipped { reason: "docs/i18n/merged already exists".to_string() };
        assert_eq!(skipped.to_string(), "skipped (docs/i18n/merged already exists)");
        assert_eq!(TaskStatus::Failed("boom".to_string()).to_string(), "failed: boom");
    }

    #[test]
    fn test_skipped_counts_as_success() {
        let skipped = TaskResult::new(
            Task::Locale,
            TaskStatus::Skipped { reason: "exists".to_string() },
            Duration::ZERO,
        );
        assert!(skipped.is_success());
        let failed = TaskResult::new(Task::Types, TaskStatus::Failed("e".to_string()), Duration::ZERO);
        assert!(!failed.is_success());
    }

    #[test]
    fn test_lookup_by_task_name() {
        let mut result = BuildResult::new();
        result.add(TaskResult::new(Task::Modules, TaskStatus::Done, Duration::ZERO));
        result.add(TaskResult::new(Task::Types, TaskStatus::Failed("bad".to_string()), Duration::ZERO));

        assert!(!result.is_success());
        assert!(result.task("modules").is_some_and(TaskResult::is_success));
        assert!(result.task("types").is_some_and(|t| !t.is_success()));
        assert!(result.task("theme").is_none());
        assert_eq!(result.failures().len(), 1);
    }

    #[test]
    fn test_summary_reports_skip_reason_and_warnings() {
        let mut result = BuildResult::new();
        result.add(
            TaskResult::new(Task::FullBundle, TaskStatus::Done, Duration::ZERO).with_output(
                vec![PathBuf::from("dist/index.full.js")],
                vec!["no global configured for external 'dayjs', guessing 'dayjs'".to_string()],
            ),
        );
        result.add(TaskResult::new(
            Task::Locale,
            TaskStatus::Skipped { reason: "docs/i18n/merged already exists".to_string() },
            Duration::ZERO,
        ));

        let summary = result.summary();
        assert!(summary.contains("full-bundle"));
        assert!(summary.contains("      warning: no global configured for external 'dayjs'"));
        assert!(summary.contains("skipped  (docs/i18n/merged already exists)"));
        assert!(summary.contains("Build succeeded: 2 task(s), 1 skipped, 1 file(s)"));
    }

    #[test]
    fn test_summary_lists_failures_and_caps_warnings() {
        let mut result = BuildResult::new();
        let warnings = (0..7).map(|i| format!("w{}", i)).collect();
        result.add(
            TaskResult::new(Task::Types, TaskStatus::Failed("type check failed".to_string()), Duration::ZERO)
                .with_output(Vec::new(), warnings),
        );
        let summary = result.summary();
        assert!(summary.contains("      ... and 2 more warning(s)"));
        assert!(summary.contains("Build failed: 1 of 1 task(s) failed"));
        assert!(summary.contains("  - types: failed: type check failed"));
    }
}
