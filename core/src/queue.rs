//! Event-loop callback queue.
//!
//! One loop per thread. The thread that installs an [`EventLoop`] owns it and
//! is the only thread that ever runs its callbacks. Two lanes feed the loop:
//!
//! - the local lane, a FIFO of non-`Send` callbacks scheduled from the loop
//!   thread itself ([`schedule`]);
//! - the remote lane, an unbounded channel of `Send` callbacks scheduled from
//!   any thread through a [`LoopHandle`]. Remote callbacks are moved onto the
//!   local FIFO at the start of each iteration and the owner is unparked.
//!
//! The host drives the loop by calling [`EventLoop::run_once`] once per
//! iteration of its own loop.

use std::{
    cell::{Cell, RefCell},
    collections::{HashMap, VecDeque},
    fmt,
    future::IntoFuture,
    panic::{self, AssertUnwindSafe},
    rc::Rc,
    sync::Arc,
    thread::{self, Thread, ThreadId},
    time::Duration,
};

use tokio::sync::mpsc;
use tracing::{debug, trace, warn};

use crate::driver::{self, Task, TaskId};
use crate::error::{LoopError, ScheduleError};

pub(crate) type LocalCallback = Box<dyn FnOnce() + 'static>;
type RemoteCallback = Box<dyn FnOnce() + Send + 'static>;

/// Upper bound on a single idle park inside [`EventLoop::block_on`].
const IDLE_PARK: Duration = Duration::from_millis(100);

thread_local! {
    static CURRENT: RefCell<Option<Rc<LoopState>>> = const { RefCell::new(None) };
}

struct LoopState {
    handle: LoopHandle,
    local: RefCell<VecDeque<LocalCallback>>,
    remote: RefCell<mpsc::UnboundedReceiver<RemoteCallback>>,
    tasks: RefCell<HashMap<TaskId, Task>>,
    next_task: Cell<u64>,
}

fn current() -> Option<Rc<LoopState>> {
    // `try_with`: wakers may fire while thread-locals are being destroyed.
    CURRENT
        .try_with(|slot| slot.borrow().clone())
        .ok()
        .flatten()
}

// ============================================================================
// Local lane
// ============================================================================

/// Infallible access to the current thread's loop, obtained up front so that
/// callers can validate before mutating their own state.
pub(crate) struct LocalLane(Rc<LoopState>);

impl LocalLane {
    pub(crate) fn push(&self, callback: LocalCallback) {
        self.0.local.borrow_mut().push_back(callback);
    }

    pub(crate) fn handle(&self) -> LoopHandle {
        self.0.handle.clone()
    }

    pub(crate) fn insert_task(&self, task: Task) -> TaskId {
        let id = TaskId::new(self.0.next_task.get());
        self.0.next_task.set(self.0.next_task.get() + 1);
        self.0.tasks.borrow_mut().insert(id, task);
        id
    }

    pub(crate) fn take_task(&self, id: TaskId) -> Option<Task> {
        self.0.tasks.borrow_mut().remove(&id)
    }

    pub(crate) fn restore_task(&self, id: TaskId, task: Task) {
        self.0.tasks.borrow_mut().insert(id, task);
    }
}

pub(crate) fn local_lane() -> Result<LocalLane, ScheduleError> {
    current().map(LocalLane).ok_or(ScheduleError::NoLoop)
}

/// Queue `callback` on the current thread's loop.
///
/// Runs at the next iteration, after every callback already queued from this
/// thread.
pub fn schedule<F>(callback: F) -> Result<(), ScheduleError>
where
    F: FnOnce() + 'static,
{
    local_lane()?.push(Box::new(callback));
    Ok(())
}

/// Whether the current thread owns a live event loop.
#[must_use]
pub fn is_loop_thread() -> bool {
    current().is_some()
}

/// Handle of the loop owned by the current thread, if any.
#[must_use]
pub fn current_handle() -> Option<LoopHandle> {
    current().map(|state| state.handle.clone())
}

// ============================================================================
// Loop handle
// ============================================================================

/// Sendable reference to an event loop.
///
/// Callbacks scheduled through a handle run exactly once, on the loop thread.
/// There is no ordering promise between callbacks scheduled from different
/// threads.
#[derive(Clone)]
pub struct LoopHandle {
    inner: Arc<HandleInner>,
}

struct HandleInner {
    owner: Thread,
    tx: mpsc::UnboundedSender<RemoteCallback>,
}

impl fmt::Debug for LoopHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LoopHandle")
            .field("owner", &self.inner.owner.id())
            .field("closed", &self.is_closed())
            .finish()
    }
}

impl LoopHandle {
    #[must_use]
    pub fn owner(&self) -> ThreadId {
        self.inner.owner.id()
    }

    #[must_use]
    pub fn is_loop_thread(&self) -> bool {
        thread::current().id() == self.owner()
    }

    /// True once the loop has been torn down.
    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.inner.tx.is_closed()
    }

    #[must_use]
    pub fn same_loop(&self, other: &LoopHandle) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }

    /// Queue `callback` on this loop from any thread.
    ///
    /// From the loop thread itself this is the local FIFO lane, so ordering
    /// with [`schedule`] is preserved.
    pub fn schedule<F>(&self, callback: F) -> Result<(), ScheduleError>
    where
        F: FnOnce() + Send + 'static,
    {
        if self.is_loop_thread()
            && let Some(state) = current()
            && state.handle.same_loop(self)
        {
            state.local.borrow_mut().push_back(Box::new(callback));
            return Ok(());
        }

        self.inner
            .tx
            .send(Box::new(callback))
            .map_err(|_| ScheduleError::Closed)?;
        self.inner.owner.unpark();
        Ok(())
    }
}

// ============================================================================
// Event loop
// ============================================================================

/// The loop owned by the current thread.
///
/// Dropping it tears the loop down: queued callbacks and suspended drivers
/// are dropped without running, and every [`LoopHandle`] reports
/// [`ScheduleError::Closed`] from then on.
pub struct EventLoop {
    state: Rc<LoopState>,
    contain_panics: bool,
}

impl fmt::Debug for EventLoop {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventLoop")
            .field("owner", &self.state.handle.owner())
            .field("queued", &self.state.local.borrow().len())
            .field("tasks", &self.state.tasks.borrow().len())
            .field("contain_panics", &self.contain_panics)
            .finish()
    }
}

impl EventLoop {
    /// Bind a new loop to the current thread.
    pub fn install() -> Result<Self, LoopError> {
        CURRENT.with(|slot| {
            let mut slot = slot.borrow_mut();
            if slot.is_some() {
                return Err(LoopError::AlreadyInstalled);
            }

            let (tx, rx) = mpsc::unbounded_channel();
            let handle = LoopHandle {
                inner: Arc::new(HandleInner {
                    owner: thread::current(),
                    tx,
                }),
            };
            let state = Rc::new(LoopState {
                handle,
                local: RefCell::new(VecDeque::new()),
                remote: RefCell::new(rx),
                tasks: RefCell::new(HashMap::new()),
                next_task: Cell::new(0),
            });
            *slot = Some(Rc::clone(&state));
            Ok(Self {
                state,
                contain_panics: false,
            })
        })
        .inspect(|installed| debug!(owner = ?installed.handle().owner(), "Event loop installed"))
    }

    /// Catch panics per callback instead of unwinding out of [`run_once`](Self::run_once).
    ///
    /// The panic hook has already seen the panic by the time it is caught.
    pub fn contain_panics(mut self, contain: bool) -> Self {
        self.contain_panics = contain;
        self
    }

    #[must_use]
    pub fn handle(&self) -> LoopHandle {
        self.state.handle.clone()
    }

    /// Number of callbacks waiting for the next iteration.
    #[must_use]
    pub fn queued(&self) -> usize {
        self.pull_remote();
        self.state.local.borrow().len()
    }

    /// Number of drivers that have not finished yet.
    #[must_use]
    pub fn live_tasks(&self) -> usize {
        self.state.tasks.borrow().len()
    }

    #[must_use]
    pub fn is_idle(&self) -> bool {
        self.queued() == 0
    }

    /// One host-loop iteration: run every callback queued so far.
    ///
    /// Callbacks scheduled while this runs are left for the next call.
    /// Returns how many callbacks ran.
    pub fn run_once(&self) -> usize {
        self.pull_remote();
        let due = self.state.local.borrow().len();
        let mut ran = 0;

        for _ in 0..due {
            let Some(callback) = self.state.local.borrow_mut().pop_front() else {
                break;
            };
            ran += 1;
            if self.contain_panics {
                if panic::catch_unwind(AssertUnwindSafe(callback)).is_err() {
                    debug!("Scheduled callback panicked; loop continues");
                }
            } else {
                callback();
            }
        }

        if ran > 0 {
            trace!(ran, "Loop iteration");
        }
        ran
    }

    /// Iterate until an iteration runs nothing.
    pub fn run_until_stalled(&self) -> usize {
        let mut total = 0;
        loop {
            let ran = self.run_once();
            if ran == 0 {
                return total;
            }
            total += ran;
        }
    }

    /// Park the owner thread until a remote callback arrives or `timeout`
    /// elapses. Returns immediately when work is already queued.
    pub fn park_timeout(&self, timeout: Duration) {
        if self.is_idle() {
            thread::park_timeout(timeout);
        }
    }

    /// Drive `computation` to completion on this loop, running other queued
    /// work meanwhile.
    ///
    /// Never returns if the computation waits on a container nobody resolves.
    /// Panics if the computation panicked inside a contained callback.
    pub fn block_on<F>(&self, computation: F) -> F::Output
    where
        F: IntoFuture + 'static,
        F::IntoFuture: 'static,
        F::Output: 'static,
    {
        let lane = LocalLane(Rc::clone(&self.state));
        let result = driver::start_in(&lane, computation.into_future(), driver::Start::Immediate);
        loop {
            if let Some(value) = result.try_take() {
                return value;
            }
            // Contained panics never resolve the container.
            if result.state() == driver::DriverState::Faulted {
                panic!("computation driven by block_on panicked");
            }
            if self.run_once() == 0 {
                self.park_timeout(IDLE_PARK);
            }
        }
    }

    fn pull_remote(&self) {
        let mut remote = self.state.remote.borrow_mut();
        let mut local = self.state.local.borrow_mut();
        while let Ok(callback) = remote.try_recv() {
            local.push_back(callback);
        }
    }
}

impl Drop for EventLoop {
    fn drop(&mut self) {
        let _ = CURRENT.try_with(|slot| {
            let mut slot = slot.borrow_mut();
            if slot
                .as_ref()
                .is_some_and(|installed| Rc::ptr_eq(installed, &self.state))
            {
                *slot = None;
            }
        });

        // Closing first makes late `LoopHandle::schedule` calls fail instead of
        // queueing work that would never run. Whatever is still buffered is
        // dropped along with the receiver.
        self.state.remote.borrow_mut().close();
        self.pull_remote();

        let queued = self.state.local.borrow().len();
        let tasks = self.state.tasks.borrow().len();
        if queued > 0 || tasks > 0 {
            warn!(queued, tasks, "Event loop torn down with unfinished work");
        } else {
            debug!("Event loop torn down");
        }

        // Dropped outside the borrows: destructors may try to schedule.
        let pending = std::mem::take(&mut *self.state.local.borrow_mut());
        let suspended = std::mem::take(&mut *self.state.tasks.borrow_mut());
        drop(pending);
        drop(suspended);
    }
}
