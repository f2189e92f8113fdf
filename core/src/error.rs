use thiserror::Error;

/// Why a callback could not be queued.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum ScheduleError {
    #[error("no event loop is installed on this thread")]
    NoLoop,
    #[error("the event loop has been torn down")]
    Closed,
}

/// Misuse of a [`Deferred`](crate::Deferred).
///
/// These are defects in the calling code, never conditions to retry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum DeferredError {
    #[error("container is already resolved")]
    AlreadyResolved,
    #[error("container already has a continuation")]
    AlreadyRegistered,
    #[error(transparent)]
    Schedule(#[from] ScheduleError),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum LoopError {
    #[error("an event loop is already installed on this thread")]
    AlreadyInstalled,
}
