//! Single-assignment, single-subscriber value containers.
//!
//! A [`Deferred`] is resolved at most once by its owner and hands its value to
//! at most one continuation. Every handle is a clone of the same container and
//! stays on the loop thread.

use std::{
    cell::RefCell,
    fmt,
    future::{Future, IntoFuture},
    mem,
    pin::Pin,
    rc::Rc,
    task::{Context, Poll},
};

use tokio::sync::oneshot;
use tracing::trace;

use crate::driver;
use crate::error::DeferredError;
use crate::queue::{self, LocalLane};

/// When a continuation runs relative to the call that triggers it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Dispatch {
    /// Queue the continuation for the next loop iteration.
    #[default]
    Scheduled,
    /// Run the continuation inline, before the triggering call returns.
    Immediate,
}

type Continuation<T> = Box<dyn FnOnce(T) + 'static>;

enum State<T> {
    /// Not resolved; holds the continuation once one is registered.
    Pending(Option<Continuation<T>>),
    /// Resolved, nobody has taken the value yet.
    Resolved(T),
    /// Resolved and consumed. Inert.
    Delivered,
}

pub struct Deferred<T> {
    inner: Rc<RefCell<State<T>>>,
}

impl<T> Clone for Deferred<T> {
    fn clone(&self) -> Self {
        Self {
            inner: Rc::clone(&self.inner),
        }
    }
}

impl<T> Default for Deferred<T> {
    fn default() -> Self {
        Self {
            inner: Rc::new(RefCell::new(State::Pending(None))),
        }
    }
}

impl<T> fmt::Debug for Deferred<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = match &*self.inner.borrow() {
            State::Pending(None) => "pending",
            State::Pending(Some(_)) => "pending (subscribed)",
            State::Resolved(_) => "resolved",
            State::Delivered => "delivered",
        };
        f.debug_struct("Deferred").field("state", &state).finish()
    }
}

fn lane_for(dispatch: Dispatch) -> Result<Option<LocalLane>, DeferredError> {
    match dispatch {
        Dispatch::Immediate => Ok(None),
        Dispatch::Scheduled => Ok(Some(queue::local_lane()?)),
    }
}

fn deliver<T: 'static>(continuation: Continuation<T>, value: T, lane: Option<LocalLane>) {
    match lane {
        Some(lane) => lane.push(Box::new(move || continuation(value))),
        None => continuation(value),
    }
}

impl<T: 'static> Deferred<T> {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// A container that is already resolved with `value`.
    #[must_use]
    pub fn resolved(value: T) -> Self {
        Self {
            inner: Rc::new(RefCell::new(State::Resolved(value))),
        }
    }

    #[must_use]
    pub fn is_resolved(&self) -> bool {
        !matches!(*self.inner.borrow(), State::Pending(_))
    }

    #[must_use]
    pub fn is_registered(&self) -> bool {
        matches!(
            *self.inner.borrow(),
            State::Pending(Some(_)) | State::Delivered
        )
    }

    /// Subscribe the one continuation this container will ever call.
    ///
    /// If the value is already there, `dispatch` decides whether the
    /// continuation runs inline or on the next iteration. Otherwise it runs
    /// at resolution time under the resolver's dispatch.
    pub fn register<F>(&self, continuation: F, dispatch: Dispatch) -> Result<(), DeferredError>
    where
        F: FnOnce(T) + 'static,
    {
        let mut state = self.inner.borrow_mut();
        let lane = match &*state {
            State::Pending(Some(_)) | State::Delivered => {
                return Err(DeferredError::AlreadyRegistered);
            }
            State::Pending(None) => {
                *state = State::Pending(Some(Box::new(continuation)));
                return Ok(());
            }
            State::Resolved(_) => lane_for(dispatch)?,
        };
        let State::Resolved(value) = mem::replace(&mut *state, State::Delivered) else {
            unreachable!("resolved state was matched above");
        };
        drop(state);

        deliver(Box::new(continuation), value, lane);
        Ok(())
    }

    /// Store the value and fire the continuation, if one is registered.
    ///
    /// Fails without touching the container when it is already resolved or
    /// when a scheduled continuation has no loop to run on.
    pub fn resolve(&self, value: T, dispatch: Dispatch) -> Result<(), DeferredError> {
        let mut state = self.inner.borrow_mut();
        let lane = match &*state {
            State::Resolved(_) | State::Delivered => return Err(DeferredError::AlreadyResolved),
            State::Pending(None) => {
                *state = State::Resolved(value);
                return Ok(());
            }
            State::Pending(Some(_)) => lane_for(dispatch)?,
        };
        let State::Pending(Some(continuation)) = mem::replace(&mut *state, State::Delivered) else {
            unreachable!("subscribed pending state was matched above");
        };
        drop(state);

        deliver(continuation, value, lane);
        Ok(())
    }

    /// Chain `f` onto this container; the returned container resolves with
    /// its result.
    pub fn then<U, F>(&self, f: F) -> Result<Deferred<U>, DeferredError>
    where
        U: 'static,
        F: FnOnce(T) -> U + 'static,
    {
        let next = Deferred::new();
        let sink = next.clone();
        self.register(
            move |value| {
                if let Err(err) = sink.resolve(f(value), Dispatch::Immediate) {
                    panic!("chained container could not be resolved: {err}");
                }
            },
            Dispatch::Scheduled,
        )?;
        Ok(next)
    }

    /// Take the value if it is sitting unclaimed in the container.
    ///
    /// Counts as the container's one subscriber.
    pub(crate) fn try_take(&self) -> Option<T> {
        let mut state = self.inner.borrow_mut();
        match mem::replace(&mut *state, State::Delivered) {
            State::Resolved(value) => Some(value),
            other => {
                *state = other;
                None
            }
        }
    }
}

impl<T: Send + 'static> Deferred<T> {
    /// A `Send` handle that resolves this container from another thread.
    ///
    /// The value travels back to the loop thread and is stored with
    /// scheduled dispatch. Dropping the resolver unused leaves the container
    /// pending forever.
    pub fn resolver(&self) -> Result<Resolver<T>, DeferredError> {
        let (tx, rx) = oneshot::channel();
        let sink = self.clone();
        driver::spawn(async move {
            match rx.await {
                Ok(value) => {
                    if let Err(err) = sink.resolve(value, Dispatch::Scheduled) {
                        panic!("remote resolution failed: {err}");
                    }
                }
                Err(_) => trace!("Resolver dropped without a value"),
            }
        })?;
        Ok(Resolver { tx })
    }
}

/// Cross-thread resolution capability for one [`Deferred`].
#[derive(Debug)]
pub struct Resolver<T> {
    tx: oneshot::Sender<T>,
}

impl<T> Resolver<T> {
    /// Hand `value` to the loop thread. Gives the value back if the loop is
    /// already gone.
    pub fn resolve(self, value: T) -> Result<(), T> {
        self.tx.send(value)
    }
}

// ============================================================================
// Awaiting
// ============================================================================

/// Future returned by awaiting a [`Deferred`].
///
/// On first poll it registers the awaiting task's waker as the container's
/// continuation, so a container can be awaited by one task only.
pub struct DeferredFuture<T> {
    source: Deferred<T>,
    landed: Rc<RefCell<Option<T>>>,
    subscribed: bool,
}

impl<T: 'static> IntoFuture for Deferred<T> {
    type Output = T;
    type IntoFuture = DeferredFuture<T>;

    fn into_future(self) -> Self::IntoFuture {
        DeferredFuture {
            source: self,
            landed: Rc::new(RefCell::new(None)),
            subscribed: false,
        }
    }
}

impl<T: 'static> Future for DeferredFuture<T> {
    type Output = T;

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<T> {
        let this = self.get_mut();
        if let Some(value) = this.landed.borrow_mut().take() {
            return Poll::Ready(value);
        }
        if this.subscribed {
            return Poll::Pending;
        }

        this.subscribed = true;
        let landed = Rc::clone(&this.landed);
        let registered = if this.source.is_resolved() {
            this.source.register(
                move |value| *landed.borrow_mut() = Some(value),
                Dispatch::Immediate,
            )
        } else {
            let waker = cx.waker().clone();
            this.source.register(
                move |value| {
                    *landed.borrow_mut() = Some(value);
                    waker.wake();
                },
                Dispatch::Scheduled,
            )
        };
        if let Err(err) = registered {
            panic!("cannot await container: {err}");
        }

        match this.landed.borrow_mut().take() {
            Some(value) => Poll::Ready(value),
            None => Poll::Pending,
        }
    }
}
