//! Single-threaded asynchronous core for Tether.
//!
//! - [`EventLoop`]: the per-thread callback queue the host drives once per
//!   iteration, plus the [`LoopHandle`] other threads use to reach it.
//! - [`Deferred`]: a single-assignment value container with exactly one
//!   subscriber.
//! - [`Driver`]: runs a future on the loop, one step per wake-up, and
//!   resolves a [`Deferred`] with its output.
//!
//! Everything except [`LoopHandle`] and [`Resolver`] is confined to the
//! thread that installed the loop.

mod batch;
mod deferred;
mod driver;
mod error;
mod queue;

pub use batch::{Awaitable, gather};
pub use deferred::{Deferred, DeferredFuture, Dispatch, Resolver};
pub use driver::{Driver, DriverState, Start, TaskId, spawn, spawn_now};
pub use error::{DeferredError, LoopError, ScheduleError};
pub use queue::{EventLoop, LoopHandle, current_handle, is_loop_thread, schedule};
