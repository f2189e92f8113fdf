//! The process-wide application.
//!
//! At most one [`Application`] is live per process. It owns the event loop on
//! the thread that created it, keeps the display handler there, and publishes
//! a `Send` link that the bridge and [`call_soon`] use from any thread.
//!
//! ```text
//! init() ──► LINK = Some(link) ──► tick()/block_on()/exec() ... ──► drop
//!                                                                  │
//!            LINK = None, handler dropped, loop torn down ◄────────┘
//! ```

use std::{
    cell::RefCell,
    fmt,
    future::IntoFuture,
    rc::Rc,
    sync::{
        Arc, PoisonError, RwLock,
        atomic::{AtomicBool, Ordering},
    },
    time::Duration,
};

use thiserror::Error;
use tracing::{debug, info};

use tether_config::TetherConfig;
use tether_core::{EventLoop, LoopError, LoopHandle, ScheduleError};
use tether_types::{DisplayMode, Fault, Outcome};

use crate::handler::DisplayHandler;

static LINK: RwLock<Option<AppLink>> = RwLock::new(None);

thread_local! {
    static HANDLER: RefCell<Option<Rc<dyn DisplayHandler>>> = const { RefCell::new(None) };
}

#[derive(Debug, Error)]
pub enum AppError {
    #[error("an application is already running in this process")]
    AlreadyRunning,
    #[error(transparent)]
    Loop(#[from] LoopError),
}

/// What other threads see of the live application.
#[derive(Clone)]
pub(crate) struct AppLink {
    inner: Arc<LinkInner>,
}

struct LinkInner {
    handle: LoopHandle,
    interactive: AtomicBool,
}

impl AppLink {
    fn new(handle: LoopHandle, mode: DisplayMode) -> Self {
        Self {
            inner: Arc::new(LinkInner {
                handle,
                interactive: AtomicBool::new(mode.is_interactive()),
            }),
        }
    }

    pub(crate) fn handle(&self) -> &LoopHandle {
        &self.inner.handle
    }

    pub(crate) fn display_mode(&self) -> DisplayMode {
        DisplayMode::from_interactive(self.inner.interactive.load(Ordering::Acquire))
    }

    fn set_display_mode(&self, mode: DisplayMode) {
        self.inner
            .interactive
            .store(mode.is_interactive(), Ordering::Release);
    }

    fn same(&self, other: &AppLink) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }
}

/// The live application's link, cloned out of the lock.
pub(crate) fn link() -> Option<AppLink> {
    LINK.read().unwrap_or_else(PoisonError::into_inner).clone()
}

/// Show `fault` with the handler installed on this thread.
///
/// `None` when this thread has no handler (not the loop thread, or the
/// application is gone).
pub(crate) fn dispatch(fault: &Fault) -> Option<Outcome> {
    let mode = link()?.display_mode();
    let handler = HANDLER
        .try_with(|slot| slot.borrow().clone())
        .ok()
        .flatten()?;
    handler.pause_for_notification();
    Some(handler.show(fault, mode))
}

/// Schedule `callback` on the application's loop from any thread.
pub fn call_soon<F>(callback: F) -> Result<(), ScheduleError>
where
    F: FnOnce() + Send + 'static,
{
    let link = link().ok_or(ScheduleError::NoLoop)?;
    link.handle().schedule(callback)
}

#[derive(Debug, Clone, Copy)]
pub struct AppSettings {
    pub mode: DisplayMode,
    /// Longest park in [`Application::tick`] when there is nothing to run.
    pub tick: Duration,
    pub contain_panics: bool,
}

impl Default for AppSettings {
    fn default() -> Self {
        Self {
            mode: DisplayMode::Interactive,
            tick: Duration::from_millis(8),
            contain_panics: true,
        }
    }
}

impl AppSettings {
    #[must_use]
    pub fn from_config(config: &TetherConfig) -> Self {
        Self {
            mode: config.notify.display_mode(),
            tick: config.event_loop.tick(),
            contain_panics: config.event_loop.contain_panics,
        }
    }

    #[must_use]
    pub fn with_mode(mut self, mode: DisplayMode) -> Self {
        self.mode = mode;
        self
    }
}

/// The live application. Must be dropped on the thread that created it.
pub struct Application {
    link: AppLink,
    tick: Duration,
    event_loop: EventLoop,
}

impl fmt::Debug for Application {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Application")
            .field("mode", &self.display_mode())
            .field("tick", &self.tick)
            .field("event_loop", &self.event_loop)
            .finish()
    }
}

impl Application {
    /// Install the loop on the current thread and make it the process-wide
    /// application.
    pub fn init<H>(handler: H, settings: AppSettings) -> Result<Self, AppError>
    where
        H: DisplayHandler + 'static,
    {
        if Self::is_running() {
            return Err(AppError::AlreadyRunning);
        }

        // Installing logs, and a diagnostic layer may turn that into a fault
        // that reads `LINK`. Nothing that logs may run under the write lock.
        let event_loop = EventLoop::install()?.contain_panics(settings.contain_panics);
        let link = AppLink::new(event_loop.handle(), settings.mode);

        let mut slot = LINK.write().unwrap_or_else(PoisonError::into_inner);
        if slot.is_some() {
            drop(slot);
            drop(event_loop);
            return Err(AppError::AlreadyRunning);
        }
        let handler: Rc<dyn DisplayHandler> = Rc::new(handler);
        HANDLER.with(|current| *current.borrow_mut() = Some(handler));
        *slot = Some(link.clone());
        drop(slot);

        info!(mode = ?settings.mode, tick = ?settings.tick, "Application initialized");
        Ok(Self {
            link,
            tick: settings.tick,
            event_loop,
        })
    }

    /// Whether any thread currently hosts a live application.
    #[must_use]
    pub fn is_running() -> bool {
        link().is_some()
    }

    #[must_use]
    pub fn handle(&self) -> LoopHandle {
        self.event_loop.handle()
    }

    #[must_use]
    pub fn event_loop(&self) -> &EventLoop {
        &self.event_loop
    }

    #[must_use]
    pub fn display_mode(&self) -> DisplayMode {
        self.link.display_mode()
    }

    /// Switch between blocking dialogs and record-only delivery. Affects
    /// faults dispatched from now on.
    pub fn set_display_mode(&self, mode: DisplayMode) {
        debug!(?mode, "Display mode changed");
        self.link.set_display_mode(mode);
    }

    /// One host iteration: run what is due, or park for up to one tick when
    /// nothing is.
    pub fn tick(&self) -> usize {
        let ran = self.event_loop.run_once();
        if ran == 0 {
            self.event_loop.park_timeout(self.tick);
        }
        ran
    }

    /// Keep ticking while `keep_running` says so.
    pub fn exec<F>(&self, mut keep_running: F)
    where
        F: FnMut() -> bool,
    {
        while keep_running() {
            self.tick();
        }
    }

    pub fn block_on<F>(&self, computation: F) -> F::Output
    where
        F: IntoFuture + 'static,
        F::IntoFuture: 'static,
        F::Output: 'static,
    {
        self.event_loop.block_on(computation)
    }
}

impl Drop for Application {
    fn drop(&mut self) {
        {
            let mut slot = LINK.write().unwrap_or_else(PoisonError::into_inner);
            if slot.as_ref().is_some_and(|live| live.same(&self.link)) {
                *slot = None;
            }
        }
        let handler = HANDLER
            .try_with(|current| current.borrow_mut().take())
            .ok()
            .flatten();
        drop(handler);
        debug!("Application torn down");
        // `event_loop` drops next and releases anyone still waiting on it.
    }
}
