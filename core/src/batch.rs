//! Awaiting several things at once.

use std::future::{Future, IntoFuture};

use futures_util::future::{FutureExt, LocalBoxFuture};

use crate::deferred::Deferred;
use crate::driver::Driver;

/// Anything [`gather`] accepts: a container, a driver's container, or a
/// computation that has not started yet.
pub enum Awaitable<T> {
    Deferred(Deferred<T>),
    Computation(LocalBoxFuture<'static, T>),
}

impl<T: 'static> Awaitable<T> {
    pub fn computation<F>(future: F) -> Self
    where
        F: Future<Output = T> + 'static,
    {
        Self::Computation(future.boxed_local())
    }
}

impl<T> From<Deferred<T>> for Awaitable<T> {
    fn from(deferred: Deferred<T>) -> Self {
        Self::Deferred(deferred)
    }
}

impl<T: 'static> From<Driver<T>> for Awaitable<T> {
    fn from(driver: Driver<T>) -> Self {
        Self::Deferred(driver.into_result())
    }
}

impl<T: 'static> IntoFuture for Awaitable<T> {
    type Output = T;
    type IntoFuture = LocalBoxFuture<'static, T>;

    fn into_future(self) -> Self::IntoFuture {
        match self {
            Self::Deferred(deferred) => deferred.into_future().boxed_local(),
            Self::Computation(future) => future,
        }
    }
}

/// Await every item in turn and collect the results in input order.
///
/// Items are awaited one after another from the calling driver. Nothing is
/// spawned: a [`Computation`](Awaitable::Computation) only starts making
/// progress when its turn comes, while drivers passed in keep running on the
/// loop in the meantime.
pub async fn gather<T, I>(items: I) -> Vec<T>
where
    T: 'static,
    I: IntoIterator,
    I::Item: Into<Awaitable<T>>,
{
    let pending: Vec<Awaitable<T>> = items.into_iter().map(Into::into).collect();
    let mut results = Vec::with_capacity(pending.len());
    for item in pending {
        results.push(item.await);
    }
    results
}
