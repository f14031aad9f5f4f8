// crates/velocut-media/src/task.rs
//
// Task: one unit of background work (indexing a file, building thumbnails,
// rendering an export range) plus the hooks it uses while running.
//
// Lifecycle:
//   Pending ─► Running ─► Completed
//      │          └─────► Aborted   (abort observed while running)
//      └────────────────► Aborted   (aborted before it started; never runs)
//
// Abort is cooperative. `TaskHandle::abort` only raises a flag; the work
// closure is expected to poll `TaskContext::is_aborted` at safe points and
// return early. Work that never polls runs to completion.
//
// A task dropped without running (flushed by TaskRunner::abort, refused by a
// disabled runner) ends Aborted, so every handle eventually sees a terminal
// state. A work closure that panics also ends Aborted.
//
// Progress calls are never executed on the worker thread: they are posted to
// the main thread through the MainThreadDispatcher, and silently dropped
// when the task is invisible or has been aborted.

use std::fmt;
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, AtomicU8, Ordering};
use std::sync::Arc;

use uuid::Uuid;

use crate::dispatch::MainThreadDispatcher;

/// Receives status updates on the main thread. Implemented by whatever
/// displays them (status bar, CLI log, test recorder).
pub trait StatusSink: Send + Sync {
    /// Number of tasks waiting in runner `runner`.
    fn queue_size_changed(&self, runner: &str, size: usize);
    fn progress_text(&self, text: &str);
    /// Start a determinate progress bar running from 0 to `max`.
    fn progress_bar(&self, max: u64);
    fn progress(&self, value: u64);
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TaskState {
    Pending,
    Running,
    Completed,
    Aborted,
}

impl TaskState {
    fn from_u8(v: u8) -> Self {
        match v {
            0 => TaskState::Pending,
            1 => TaskState::Running,
            2 => TaskState::Completed,
            _ => TaskState::Aborted,
        }
    }

    fn as_u8(self) -> u8 {
        match self {
            TaskState::Pending => 0,
            TaskState::Running => 1,
            TaskState::Completed => 2,
            TaskState::Aborted => 3,
        }
    }
}

struct TaskShared {
    aborted: AtomicBool,
    state:   AtomicU8,
}

type Work = Box<dyn FnOnce(&TaskContext) + Send + 'static>;

pub struct Task {
    id:               Uuid,
    description:      String,
    progress_visible: bool,
    shared:           Arc<TaskShared>,
    /// Taken by `run`; still present on drop means the task never ran.
    work:             Option<Work>,
}

impl Task {
    /// Wrap `work`. Progress reporting is enabled by default.
    pub fn new<F>(description: impl Into<String>, work: F) -> Self
    where
        F: FnOnce(&TaskContext) + Send + 'static,
    {
        Self {
            id:               Uuid::new_v4(),
            description:      description.into(),
            progress_visible: true,
            shared:           Arc::new(TaskShared {
                aborted: AtomicBool::new(false),
                state:   AtomicU8::new(TaskState::Pending.as_u8()),
            }),
            work:             Some(Box::new(work)),
        }
    }

    pub fn with_progress(mut self, visible: bool) -> Self {
        self.progress_visible = visible;
        self
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn description(&self) -> &str {
        &self.description
    }

    pub fn progress_visible(&self) -> bool {
        self.progress_visible
    }

    /// A handle that stays valid after the task has been moved into a runner.
    pub fn handle(&self) -> TaskHandle {
        TaskHandle {
            id:          self.id,
            description: Arc::from(self.description.as_str()),
            shared:      Arc::clone(&self.shared),
        }
    }

    /// Execute the work on the calling thread. `progress` is where progress
    /// calls are forwarded; `None` mutes them.
    ///
    /// A task aborted while pending is not run. Returns the terminal state.
    pub(crate) fn run(mut self, progress: Option<Progress>) -> TaskState {
        let Some(work) = self.work.take() else {
            return TaskState::from_u8(self.shared.state.load(Ordering::Acquire));
        };
        if self.shared.aborted.load(Ordering::Acquire) {
            self.set_state(TaskState::Aborted);
            return TaskState::Aborted;
        }
        self.set_state(TaskState::Running);

        let progress = if self.progress_visible { progress } else { None };
        if let Some(p) = &progress {
            p.text(&self.description);
        }
        let ctx = TaskContext { shared: &self.shared, progress };
        let outcome = panic::catch_unwind(AssertUnwindSafe(|| work(&ctx)));
        if outcome.is_err() {
            log::error!("[task] '{}' panicked", self.description);
        }

        let end = if outcome.is_err() || self.shared.aborted.load(Ordering::Acquire) {
            TaskState::Aborted
        } else {
            TaskState::Completed
        };
        self.set_state(end);
        end
    }

    fn set_state(&self, state: TaskState) {
        self.shared.state.store(state.as_u8(), Ordering::Release);
    }
}

impl Drop for Task {
    fn drop(&mut self) {
        if self.work.is_some() {
            self.shared.aborted.store(true, Ordering::Release);
            self.set_state(TaskState::Aborted);
        }
    }
}

impl fmt::Debug for Task {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Task")
            .field("id", &self.id)
            .field("description", &self.description)
            .field("state", &TaskState::from_u8(self.shared.state.load(Ordering::Acquire)))
            .finish_non_exhaustive()
    }
}

/// Shared view of a scheduled task: abort it, or watch its state.
#[derive(Clone)]
pub struct TaskHandle {
    id:          Uuid,
    description: Arc<str>,
    shared:      Arc<TaskShared>,
}

impl TaskHandle {
    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn description(&self) -> &str {
        &self.description
    }

    /// Request cooperative abort. Observed eventually, not immediately.
    pub fn abort(&self) {
        self.shared.aborted.store(true, Ordering::Release);
    }

    pub fn is_aborted(&self) -> bool {
        self.shared.aborted.load(Ordering::Acquire)
    }

    pub fn state(&self) -> TaskState {
        TaskState::from_u8(self.shared.state.load(Ordering::Acquire))
    }
}

impl fmt::Debug for TaskHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TaskHandle")
            .field("id", &self.id)
            .field("description", &self.description)
            .field("state", &self.state())
            .finish()
    }
}

/// Forwards progress to a StatusSink on the main thread.
#[derive(Clone)]
pub(crate) struct Progress {
    dispatcher: MainThreadDispatcher,
    sink:       Arc<dyn StatusSink>,
}

impl Progress {
    pub(crate) fn new(dispatcher: MainThreadDispatcher, sink: Arc<dyn StatusSink>) -> Self {
        Self { dispatcher, sink }
    }

    pub(crate) fn text(&self, text: &str) {
        let sink = Arc::clone(&self.sink);
        let text = text.to_owned();
        self.dispatcher.run(move || sink.progress_text(&text));
    }

    fn bar(&self, max: u64) {
        let sink = Arc::clone(&self.sink);
        self.dispatcher.run(move || sink.progress_bar(max));
    }

    fn value(&self, value: u64) {
        let sink = Arc::clone(&self.sink);
        self.dispatcher.run(move || sink.progress(value));
    }

    pub(crate) fn queue_size(&self, runner: &str, size: usize) {
        let sink = Arc::clone(&self.sink);
        let runner = runner.to_owned();
        self.dispatcher.run(move || sink.queue_size_changed(&runner, size));
    }
}

/// What the work closure sees while it runs.
pub struct TaskContext<'a> {
    shared:   &'a TaskShared,
    progress: Option<Progress>,
}

impl TaskContext<'_> {
    /// Poll this at safe points and return early when it turns true.
    pub fn is_aborted(&self) -> bool {
        self.shared.aborted.load(Ordering::Acquire)
    }

    pub fn show_progress_text(&self, text: &str) {
        if let Some(p) = self.reporter() {
            p.text(text);
        }
    }

    pub fn show_progress_bar(&self, max: u64) {
        if let Some(p) = self.reporter() {
            p.bar(max);
        }
    }

    pub fn show_progress(&self, value: u64) {
        if let Some(p) = self.reporter() {
            p.value(value);
        }
    }

    fn reporter(&self) -> Option<&Progress> {
        if self.is_aborted() {
            return None;
        }
        self.progress.as_ref()
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use parking_lot::Mutex;
    use std::sync::atomic::AtomicUsize;

    /// Records everything it is told, in order.
    #[derive(Default)]
    pub(crate) struct RecordingSink {
        pub(crate) events: Mutex<Vec<String>>,
    }

    impl StatusSink for RecordingSink {
        fn queue_size_changed(&self, runner: &str, size: usize) {
            self.events.lock().push(format!("queue {runner} {size}"));
        }
        fn progress_text(&self, text: &str) {
            self.events.lock().push(format!("text {text}"));
        }
        fn progress_bar(&self, max: u64) {
            self.events.lock().push(format!("bar {max}"));
        }
        fn progress(&self, value: u64) {
            self.events.lock().push(format!("progress {value}"));
        }
    }

    #[test]
    fn run_completes_and_reports_progress() {
        let (d, _main_loop) = MainThreadDispatcher::new();
        let sink = Arc::new(RecordingSink::default());
        let task = Task::new("index clip", |ctx: &TaskContext| {
            ctx.show_progress_bar(2);
            ctx.show_progress(1);
            ctx.show_progress(2);
        });
        let handle = task.handle();
        assert_eq!(handle.state(), TaskState::Pending);

        // Running on the dispatcher's own thread → progress is delivered inline.
        let end = task.run(Some(Progress::new(d, sink.clone())));
        assert_eq!(end, TaskState::Completed);
        assert_eq!(handle.state(), TaskState::Completed);
        assert_eq!(
            *sink.events.lock(),
            vec!["text index clip", "bar 2", "progress 1", "progress 2"],
        );
    }

    #[test]
    fn aborted_before_start_never_runs() {
        let runs = Arc::new(AtomicUsize::new(0));
        let r = Arc::clone(&runs);
        let task = Task::new("thumbs", move |_: &TaskContext| { r.fetch_add(1, Ordering::SeqCst); });
        let handle = task.handle();
        handle.abort();
        assert_eq!(task.run(None), TaskState::Aborted);
        assert_eq!(runs.load(Ordering::SeqCst), 0);
        assert_eq!(handle.state(), TaskState::Aborted);
    }

    #[test]
    fn abort_mid_run_suppresses_later_progress() {
        let (d, _main_loop) = MainThreadDispatcher::new();
        let sink = Arc::new(RecordingSink::default());
        let task = Task::new("export", |ctx: &TaskContext| {
            ctx.show_progress(1);
            ctx.shared.aborted.store(true, Ordering::Release);
            ctx.show_progress(2);
            assert!(ctx.is_aborted());
        });
        assert_eq!(task.run(Some(Progress::new(d, sink.clone()))), TaskState::Aborted);
        assert_eq!(*sink.events.lock(), vec!["text export", "progress 1"]);
    }

    #[test]
    fn dropped_unrun_task_ends_aborted() {
        let task = Task::new("flushed", |_: &TaskContext| panic!("must not run"));
        let handle = task.handle();
        drop(task);
        assert_eq!(handle.state(), TaskState::Aborted);
        assert!(handle.is_aborted());
    }

    #[test]
    fn panicking_work_ends_aborted() {
        let task = Task::new("explodes", |_: &TaskContext| panic!("decoder blew up"));
        let handle = task.handle();
        assert_eq!(task.run(None), TaskState::Aborted);
        assert_eq!(handle.state(), TaskState::Aborted);
    }

    #[test]
    fn invisible_task_reports_nothing() {
        let (d, _main_loop) = MainThreadDispatcher::new();
        let sink = Arc::new(RecordingSink::default());
        let task = Task::new("quiet", |ctx: &TaskContext| ctx.show_progress_text("hello"))
            .with_progress(false);
        task.run(Some(Progress::new(d, sink.clone())));
        assert!(sink.events.lock().is_empty());
    }
}
