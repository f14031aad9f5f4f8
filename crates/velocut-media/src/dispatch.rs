// crates/velocut-media/src/dispatch.rs
//
// MainThreadDispatcher: hands closures from worker threads to the one thread
// allowed to touch UI state.
//
// The dispatcher is created on the main thread and remembers its ThreadId.
// Calls made from that thread run inline; calls from any other thread go
// through an unbounded channel that the main thread drains with
// `MainLoop::pump`. No UI toolkit is assumed — the owner decides where in its
// event loop to pump.

use std::sync::Arc;
use std::thread::{self, ThreadId};
use std::time::Duration;

use crossbeam_channel::{unbounded, Receiver, RecvTimeoutError, Sender};
use parking_lot::{Condvar, Mutex};

type MainJob = Box<dyn FnOnce() + Send + 'static>;

/// Cloneable handle for posting work to the main thread.
#[derive(Clone)]
pub struct MainThreadDispatcher {
    main: ThreadId,
    tx:   Sender<MainJob>,
}

/// Receiving end. Lives on the main thread.
pub struct MainLoop {
    rx: Receiver<MainJob>,
}

impl MainThreadDispatcher {
    /// Create a dispatcher whose main thread is the calling thread.
    pub fn new() -> (Self, MainLoop) {
        let (tx, rx) = unbounded();
        let main = thread::current().id();
        (Self { main, tx }, MainLoop { rx })
    }

    pub fn is_main_thread(&self) -> bool {
        thread::current().id() == self.main
    }

    /// Run `f` on the main thread: inline if already there, else posted.
    pub fn run<F>(&self, f: F)
    where
        F: FnOnce() + Send + 'static,
    {
        if self.is_main_thread() {
            f();
        } else if self.tx.send(Box::new(f)).is_err() {
            log::warn!("[dispatch] main loop is gone — dropping posted call");
        }
    }

    /// Like `run`, but blocks until `f` has executed on the main thread.
    ///
    /// Returns `false` if `f` never ran because the main loop was dropped
    /// first; the caller is released either way.
    pub fn run_and_wait<F>(&self, f: F) -> bool
    where
        F: FnOnce() + Send + 'static,
    {
        if self.is_main_thread() {
            f();
            return true;
        }

        let done = Arc::new((Mutex::new(None::<bool>), Condvar::new()));
        let guard = Completion { done: Arc::clone(&done), ran: false };
        let job = move || {
            let mut guard = guard;
            f();
            guard.ran = true;
        };
        if self.tx.send(Box::new(job)).is_err() {
            // The job (and its guard) came back inside the error and has been
            // dropped, which already signalled `done` with ran = false.
            log::warn!("[dispatch] main loop is gone — run_and_wait not executed");
        }

        let (lock, cvar) = &*done;
        let mut state = lock.lock();
        while state.is_none() {
            cvar.wait(&mut state);
        }
        (*state).unwrap_or(false)
    }
}

// Signals the waiting thread when the posted job finishes — or when it is
// dropped unrun because the main loop went away.
struct Completion {
    done: Arc<(Mutex<Option<bool>>, Condvar)>,
    ran:  bool,
}

impl Drop for Completion {
    fn drop(&mut self) {
        let (lock, cvar) = &*self.done;
        *lock.lock() = Some(self.ran);
        cvar.notify_all();
    }
}

impl MainLoop {
    /// Run everything posted so far. Returns how many calls ran.
    pub fn pump(&self) -> usize {
        let mut n = 0;
        while let Ok(job) = self.rx.try_recv() {
            job();
            n += 1;
        }
        n
    }

    /// Wait up to `timeout` for the first posted call, then drain the rest.
    pub fn pump_for(&self, timeout: Duration) -> usize {
        match self.rx.recv_timeout(timeout) {
            Ok(job) => {
                job();
                1 + self.pump()
            }
            Err(RecvTimeoutError::Timeout) | Err(RecvTimeoutError::Disconnected) => 0,
        }
    }
}
