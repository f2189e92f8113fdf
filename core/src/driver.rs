//! Coroutine driver.
//!
//! Steps a future to completion on the current thread's event loop and
//! resolves a [`Deferred`] with its output. Each step polls the future once; the
//! waker handed to it schedules the next step through the callback queue, so
//! resumption is never re-entrant.
//!
//! ```text
//! Created -> Running -> (Suspended <-> Running)* -> Completed
//!                  \-> Faulted   (the computation panicked)
//! ```

use std::{
    cell::Cell,
    fmt,
    future::{Future, IntoFuture},
    pin::Pin,
    rc::Rc,
    sync::Arc,
    task::{Context, Poll, Wake, Waker},
    thread,
};

use tracing::trace;

use crate::deferred::{Deferred, DeferredFuture, Dispatch};
use crate::error::{DeferredError, ScheduleError};
use crate::queue::{self, LocalLane, LoopHandle};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TaskId(u64);

impl TaskId {
    pub(crate) const fn new(raw: u64) -> Self {
        Self(raw)
    }

    #[must_use]
    pub const fn as_u64(self) -> u64 {
        self.0
    }
}

impl fmt::Display for TaskId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "task#{}", self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DriverState {
    /// Built, not stepped yet.
    Created,
    /// Inside a step.
    Running,
    /// Waiting for an awaited container to resolve.
    Suspended,
    /// Finished; the driver's container holds (or has delivered) the value.
    Completed,
    /// A step panicked. The container will never resolve.
    Faulted,
}

/// Whether the first step happens inside the start call or on the next
/// loop iteration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Start {
    #[default]
    Scheduled,
    Immediate,
}

pub(crate) struct Task {
    future: Pin<Box<dyn Future<Output = ()> + 'static>>,
    state: Rc<Cell<DriverState>>,
}

/// A running computation and the container it will resolve.
///
/// Only the driver resolves that container. Callers can subscribe to it,
/// chain off it or await the driver.
pub struct Driver<T> {
    id: TaskId,
    state: Rc<Cell<DriverState>>,
    result: Deferred<T>,
}

impl<T> fmt::Debug for Driver<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Driver")
            .field("id", &self.id)
            .field("state", &self.state.get())
            .field("result", &self.result)
            .finish()
    }
}

impl<T: 'static> Driver<T> {
    /// Take ownership of `computation` and start driving it on the current
    /// thread's loop.
    pub fn start<F>(computation: F, start: Start) -> Result<Self, ScheduleError>
    where
        F: IntoFuture<Output = T> + 'static,
        F::IntoFuture: 'static,
    {
        let lane = queue::local_lane()?;
        Ok(start_in(&lane, computation.into_future(), start))
    }

    #[must_use]
    pub fn id(&self) -> TaskId {
        self.id
    }

    #[must_use]
    pub fn state(&self) -> DriverState {
        self.state.get()
    }

    #[must_use]
    pub fn is_resolved(&self) -> bool {
        self.result.is_resolved()
    }

    #[must_use]
    pub fn is_registered(&self) -> bool {
        self.result.is_registered()
    }

    /// See [`Deferred::register`].
    pub fn register<F>(&self, continuation: F, dispatch: Dispatch) -> Result<(), DeferredError>
    where
        F: FnOnce(T) + 'static,
    {
        self.result.register(continuation, dispatch)
    }

    /// See [`Deferred::then`].
    pub fn then<U, F>(&self, f: F) -> Result<Deferred<U>, DeferredError>
    where
        U: 'static,
        F: FnOnce(T) -> U + 'static,
    {
        self.result.then(f)
    }

    pub(crate) fn try_take(&self) -> Option<T> {
        self.result.try_take()
    }

    pub(crate) fn into_result(self) -> Deferred<T> {
        self.result
    }
}

impl<T: 'static> IntoFuture for Driver<T> {
    type Output = T;
    type IntoFuture = DeferredFuture<T>;

    fn into_future(self) -> Self::IntoFuture {
        self.result.into_future()
    }
}

/// Drive `computation` starting on the next loop iteration.
pub fn spawn<F>(computation: F) -> Result<Driver<F::Output>, ScheduleError>
where
    F: IntoFuture + 'static,
    F::IntoFuture: 'static,
    F::Output: 'static,
{
    Driver::start(computation, Start::Scheduled)
}

/// Drive `computation`, taking the first step before returning.
///
/// A panic raised before the first suspension unwinds out of this call.
pub fn spawn_now<F>(computation: F) -> Result<Driver<F::Output>, ScheduleError>
where
    F: IntoFuture + 'static,
    F::IntoFuture: 'static,
    F::Output: 'static,
{
    Driver::start(computation, Start::Immediate)
}

pub(crate) fn start_in<F>(lane: &LocalLane, computation: F, start: Start) -> Driver<F::Output>
where
    F: Future + 'static,
    F::Output: 'static,
{
    let result = Deferred::new();
    let state = Rc::new(Cell::new(DriverState::Created));
    let sink = result.clone();
    let future = Box::pin(async move {
        let value = computation.await;
        if let Err(err) = sink.resolve(value, Dispatch::Scheduled) {
            panic!("driver could not resolve its own container: {err}");
        }
    });

    let id = lane.insert_task(Task {
        future,
        state: Rc::clone(&state),
    });
    trace!(%id, ?start, "Driver created");

    match start {
        Start::Immediate => step(id),
        Start::Scheduled => lane.push(Box::new(move || step(id))),
    }
    Driver { id, state, result }
}

/// Marks the driver faulted if the poll unwinds.
struct FaultGuard<'a> {
    state: &'a Cell<DriverState>,
}

impl Drop for FaultGuard<'_> {
    fn drop(&mut self) {
        if thread::panicking() {
            self.state.set(DriverState::Faulted);
        }
    }
}

/// Poll the task once. Steps for finished or faulted tasks are no-ops.
fn step(id: TaskId) {
    let Ok(lane) = queue::local_lane() else {
        return;
    };
    let Some(mut task) = lane.take_task(id) else {
        trace!(%id, "Stale step ignored");
        return;
    };

    let waker = Waker::from(Arc::new(TaskWaker {
        id,
        handle: lane.handle(),
    }));
    let mut cx = Context::from_waker(&waker);

    task.state.set(DriverState::Running);
    let poll = {
        let _guard = FaultGuard { state: &task.state };
        task.future.as_mut().poll(&mut cx)
    };

    match poll {
        Poll::Ready(()) => {
            task.state.set(DriverState::Completed);
            trace!(%id, "Driver completed");
        }
        Poll::Pending => {
            task.state.set(DriverState::Suspended);
            lane.restore_task(id, task);
        }
    }
}

/// Resumption entry point handed to awaited futures. `Send`, so foreign
/// futures may wake the driver from any thread.
struct TaskWaker {
    id: TaskId,
    handle: LoopHandle,
}

impl Wake for TaskWaker {
    fn wake(self: Arc<Self>) {
        self.wake_by_ref();
    }

    fn wake_by_ref(self: &Arc<Self>) {
        let id = self.id;
        if self.handle.schedule(move || step(id)).is_err() {
            trace!(%id, "Wake after loop teardown ignored");
        }
    }
}
