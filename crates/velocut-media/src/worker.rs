// crates/velocut-media/src/worker.rs
//
// TaskRunner: one background thread draining one BoundedQueue of Tasks,
// strictly in submission order, one task at a time.
//
// An application owns one runner per work category — typically a Visible
// runner whose queue depth and progress show in the status bar, and an
// Invisible one for housekeeping. Runners are owned values, not globals;
// pass them (or an Arc) to whatever needs to schedule.
//
// Thread lifecycle:
//   - spawned lazily by the first schedule()
//   - abort() disables scheduling, raises the abort flag on the in-flight
//     task, flushes the queue, posts a Stop sentinel to unblock pop(), then
//     polls a bounded number of times for the thread to exit and joins it.
//     If the in-flight task ignores its abort flag the thread is detached
//     rather than waited on forever; it exits once that task returns.
//   - start() re-enables scheduling; the next schedule() spawns a fresh thread.
//
// Each spawned thread has a generation number, and abort() retires the
// current one by bumping it. A thread whose generation is stale touches no
// shared bookkeeping and exits at its next loop turn, so a detached thread
// finishing late cannot count work for its successor. A Stop sentinel only
// stops the thread of its own generation.
//
// A task that panics ends Aborted and still counts as executed; the thread
// keeps draining the queue.

use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use parking_lot::{Condvar, Mutex};

use velocut_core::config::PipelineConfig;
use velocut_core::queue::BoundedQueue;

use crate::dispatch::MainThreadDispatcher;
use crate::task::{Progress, StatusSink, Task, TaskHandle};

// ── Configuration ─────────────────────────────────────────────────────────────

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RunnerKind {
    /// Reports queue depth and task progress to the StatusSink.
    Visible,
    /// Never reports anything.
    Invisible,
}

#[derive(Clone, Debug)]
pub struct RunnerConfig {
    pub name:           String,
    pub kind:           RunnerKind,
    pub queue_capacity: usize,
    pub abort_retries:  u32,
    pub abort_poll:     Duration,
}

impl RunnerConfig {
    pub fn new(name: impl Into<String>, kind: RunnerKind) -> Self {
        Self::from_pipeline(name, kind, &PipelineConfig::default())
    }

    pub fn from_pipeline(name: impl Into<String>, kind: RunnerKind, cfg: &PipelineConfig) -> Self {
        Self {
            name:           name.into(),
            kind,
            queue_capacity: cfg.task_queue_capacity,
            abort_retries:  cfg.abort_retries,
            abort_poll:     Duration::from_millis(cfg.abort_poll_ms),
        }
    }
}

// ── Internal types ────────────────────────────────────────────────────────────

enum Job {
    Run(Task),
    /// Poison pill for the thread of the given generation.
    Stop(u64),
}

struct RunnerState {
    enabled:    bool,
    current:    Option<TaskHandle>,
    executed:   u64,
    /// Tasks accepted by schedule() since the last start().
    submitted:  u64,
    /// `executed` value that releases wait_for_execution_count().
    target:     u64,
    /// Bumped by every abort(); waiters give up when it changes.
    aborts:     u64,
    /// Generation of the live thread; bumped by spawn and by abort.
    generation: u64,
    thread:     Option<JoinHandle<()>>,
}

struct Shared {
    name:     String,
    queue:    BoundedQueue<Job>,
    state:    Mutex<RunnerState>,
    /// Signalled after every executed task and on abort.
    reached:  Condvar,
    progress: Option<Progress>,
}

impl Shared {
    fn report_queue_size(&self) {
        if let Some(p) = &self.progress {
            p.queue_size(&self.name, self.queue.size());
        }
    }
}

// ── TaskRunner ────────────────────────────────────────────────────────────────

pub struct TaskRunner {
    shared:        Arc<Shared>,
    abort_retries: u32,
    abort_poll:    Duration,
}

impl TaskRunner {
    /// A runner that reports nothing, whatever `config.kind` says.
    pub fn new(config: RunnerConfig) -> Self {
        Self::build(config, None)
    }

    /// A runner that, when `config.kind` is Visible, posts queue depth and
    /// task progress to `sink` on the dispatcher's main thread.
    pub fn with_status(
        config: RunnerConfig,
        dispatcher: MainThreadDispatcher,
        sink: Arc<dyn StatusSink>,
    ) -> Self {
        let progress = match config.kind {
            RunnerKind::Visible => Some(Progress::new(dispatcher, sink)),
            RunnerKind::Invisible => None,
        };
        Self::build(config, progress)
    }

    fn build(config: RunnerConfig, progress: Option<Progress>) -> Self {
        let shared = Arc::new(Shared {
            name:     config.name,
            queue:    BoundedQueue::new(config.queue_capacity),
            state:    Mutex::new(RunnerState {
                enabled:    true,
                current:    None,
                executed:   0,
                submitted:  0,
                target:     0,
                aborts:     0,
                generation: 0,
                thread:     None,
            }),
            reached:  Condvar::new(),
            progress,
        });
        Self {
            shared,
            abort_retries: config.abort_retries,
            abort_poll:    config.abort_poll,
        }
    }

    pub fn name(&self) -> &str {
        &self.shared.name
    }

    /// Queue `task`. Returns its handle, or `None` if the runner is disabled
    /// (aborted and not restarted) — the task is dropped in that case.
    ///
    /// Blocks while the queue is full.
    pub fn schedule(&self, task: Task) -> Option<TaskHandle> {
        {
            let mut st = self.shared.state.lock();
            if !st.enabled {
                log::debug!("[worker] {}: disabled, dropping '{}'", self.shared.name, task.description());
                return None;
            }
            if st.thread.is_none() && !self.spawn_thread(&mut st) {
                return None;
            }
            st.submitted += 1;
        }
        let handle = task.handle();
        log::debug!("[worker] {}: scheduled '{}'", self.shared.name, handle.description());
        self.shared.queue.push(Job::Run(task));
        self.shared.report_queue_size();
        Some(handle)
    }

    /// Convenience for `schedule(Task::new(..).with_progress(..))`.
    pub fn schedule_fn<F>(&self, description: &str, progress_visible: bool, work: F) -> Option<TaskHandle>
    where
        F: FnOnce(&crate::task::TaskContext) + Send + 'static,
    {
        self.schedule(Task::new(description, work).with_progress(progress_visible))
    }

    /// Stop the runner: no more scheduling, abort the running task, drop the
    /// queued ones, and shut the thread down (bounded wait). Safe to call
    /// repeatedly and when no thread was ever started.
    pub fn abort(&self) {
        let (thread, generation) = {
            let mut st = self.shared.state.lock();
            st.enabled = false;
            if let Some(current) = st.current.take() {
                log::info!("[worker] {}: aborting '{}'", self.shared.name, current.description());
                current.abort();
            }
            // Anyone waiting on an execution count would wait for tasks that
            // are about to be flushed; release them now.
            st.aborts += 1;
            st.submitted = st.executed;
            self.shared.reached.notify_all();
            let retiring = st.generation;
            st.generation += 1;
            (st.thread.take(), retiring)
        };

        self.shared.queue.flush();

        let Some(thread) = thread else {
            self.shared.report_queue_size();
            return;
        };
        self.shared.queue.push(Job::Stop(generation));

        let mut tries = 0;
        while !thread.is_finished() && tries < self.abort_retries {
            thread::sleep(self.abort_poll);
            tries += 1;
        }
        if thread.is_finished() {
            if thread.join().is_err() {
                log::warn!("[worker] {}: thread panicked", self.shared.name);
            }
            log::info!("[worker] {}: stopped", self.shared.name);
        } else {
            log::warn!(
                "[worker] {}: running task ignored abort after {} polls — detaching thread",
                self.shared.name,
                tries,
            );
        }
        // The thread may have left on its generation check without popping
        // the sentinel.
        self.shared.queue.flush();
        self.shared.report_queue_size();
    }

    /// Re-enable scheduling after abort(). Anything left in the queue is
    /// discarded first.
    pub fn start(&self) {
        let mut st = self.shared.state.lock();
        if st.enabled {
            return;
        }
        self.shared.queue.flush();
        st.submitted = st.executed;
        st.enabled = true;
        log::info!("[worker] {}: restarted", self.shared.name);
    }

    pub fn is_enabled(&self) -> bool {
        self.shared.state.lock().enabled
    }

    /// True while a worker thread exists.
    pub fn is_running(&self) -> bool {
        self.shared.state.lock().thread.is_some()
    }

    /// Tasks waiting to run (excludes the one in flight). Snapshot only.
    pub fn queue_size(&self) -> usize {
        self.shared.queue.size()
    }

    pub fn executed_count(&self) -> u64 {
        self.shared.state.lock().executed
    }

    /// Description of the task currently running, if any.
    pub fn current_description(&self) -> Option<String> {
        self.shared.state.lock().current.as_ref().map(|h| h.description().to_owned())
    }

    /// Arm wait_for_execution_count() to return after `n` more tasks finish.
    pub fn set_expected_work(&self, n: u64) {
        let mut st = self.shared.state.lock();
        st.target = st.executed + n;
    }

    /// Block until the count armed by set_expected_work() is reached (or the
    /// runner is aborted).
    pub fn wait_for_execution_count(&self) {
        let mut st = self.shared.state.lock();
        let epoch = st.aborts;
        while st.executed < st.target && st.aborts == epoch {
            self.shared.reached.wait(&mut st);
        }
    }

    /// Wait for every task scheduled so far to finish (or the runner to be
    /// aborted).
    pub fn wait_until_idle(&self) {
        let mut st = self.shared.state.lock();
        let epoch = st.aborts;
        let goal = st.submitted;
        while st.executed < goal && st.aborts == epoch {
            self.shared.reached.wait(&mut st);
        }
    }

    fn spawn_thread(&self, st: &mut RunnerState) -> bool {
        st.generation += 1;
        let generation = st.generation;
        let shared = Arc::clone(&self.shared);

        match thread::Builder::new()
            .name(format!("velocut-{}", self.shared.name))
            .spawn(move || run_loop(shared, generation))
        {
            Ok(handle) => {
                log::info!("[worker] {}: thread started (generation {generation})", self.shared.name);
                st.thread = Some(handle);
                true
            }
            Err(e) => {
                log::error!("[worker] {}: spawn failed: {e}", self.shared.name);
                false
            }
        }
    }
}

impl Drop for TaskRunner {
    fn drop(&mut self) {
        self.abort();
    }
}

fn run_loop(shared: Arc<Shared>, generation: u64) {
    loop {
        if shared.state.lock().generation != generation {
            break;
        }
        let task = match shared.queue.pop() {
            Job::Stop(g) if g == generation => break,
            Job::Stop(_) => continue,
            Job::Run(task) => task,
        };

        {
            let mut st = shared.state.lock();
            // abort() bumps the generation under this lock, so either it sees
            // this task as current or we see the new generation here.
            if st.generation != generation {
                break;
            }
            st.current = Some(task.handle());
        }
        shared.report_queue_size();

        let description = task.description().to_owned();
        let end = task.run(shared.progress.clone());
        log::debug!("[worker] {}: '{description}' → {end:?}", shared.name);

        let mut st = shared.state.lock();
        if st.generation != generation {
            break;
        }
        st.current = None;
        st.executed += 1;
        shared.reached.notify_all();
    }
    log::debug!("[worker] {}: thread exiting (generation {generation})", shared.name);
}
