//! The demo scenario: a coroutine on the loop thread waits for work done on
//! worker threads, then one worker raises a diagnostic that has to cross back
//! to the loop thread to be shown.

use std::{fmt, thread};

use anyhow::{Context, Result};
use tracing::{debug, info};

use tether_core::{Deferred, gather};
use tether_engine::{Delivery, Fault, Severity, call_soon, report};

const WORKERS: u64 = 4;
const CHUNK: u64 = 250_000;

#[derive(Debug)]
pub struct DemoReport {
    pub partials: Vec<u64>,
    pub total: u64,
    pub diagnostic: Delivery,
}

impl fmt::Display for DemoReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "partial sums: {:?}", self.partials)?;
        writeln!(f, "total:        {}", self.total)?;
        write!(f, "diagnostic:   {:?}", self.diagnostic)
    }
}

/// Sum of `0..WORKERS * CHUNK`, computed one chunk per worker.
pub async fn run() -> Result<DemoReport> {
    let mut partials = Vec::new();
    for worker in 0..WORKERS {
        let partial: Deferred<u64> = Deferred::new();
        let resolver = partial.resolver().context("failed to create resolver")?;
        thread::Builder::new()
            .name(format!("sum-{worker}"))
            .spawn(move || {
                let start = worker * CHUNK;
                let sum: u64 = (start..start + CHUNK).sum();
                if let Err(err) = call_soon(move || info!(worker, sum, "Partial sum delivered")) {
                    debug!(worker, %err, "Could not log the partial sum on the loop");
                }
                if resolver.resolve(sum).is_err() {
                    debug!(worker, "Partial sum dropped; nobody is waiting for it");
                }
            })
            .context("failed to spawn worker thread")?;
        partials.push(partial);
    }

    let partials = gather::<u64, _>(partials).await;
    let total = partials.iter().sum();

    let answered: Deferred<Delivery> = Deferred::new();
    let resolver = answered.resolver().context("failed to create resolver")?;
    thread::Builder::new()
        .name("auditor".to_string())
        .spawn(move || {
            let fault = Fault::new(
                Severity::Warning,
                "Worker Diagnostic",
                format!("Auditor finished off the loop thread (total {total})"),
            )
            .with_detail([
                format!("thread: {}", thread::current().name().unwrap_or("<unnamed>")),
                "Ignore to continue, Abort to exit.".to_string(),
            ]);
            if let Err(delivery) = resolver.resolve(report(fault)) {
                debug!(?delivery, "Diagnostic answered after the demo stopped waiting");
            }
        })
        .context("failed to spawn auditor thread")?;
    let diagnostic = answered.await;

    Ok(DemoReport {
        partials,
        total,
        diagnostic,
    })
}
