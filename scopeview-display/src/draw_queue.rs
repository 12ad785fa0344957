//! Coalescing draw queue with a dedicated render thread.
//!
//! Draw requests are cheap to enqueue from any thread. The render thread
//! runs at most one pass at a time, and each pass draws only the most
//! recent coordinates in the backlog; older requests are dropped. While a
//! pass is running, new requests accumulate and trigger exactly one
//! follow-up pass.
//!
//! ```text
//!            enqueue                 pass ends, backlog empty
//!   Idle ───────────────▶ RenderPending ───────────────────▶ Idle
//!     │                      │   ▲
//!     │ halt          halt   │   │ resume (redraws last request)
//!     ▼                      ▼   │
//!   Halted ◀─────────────────────┘
//! ```
//!
//! Work that must run on the render thread, such as contrast edits or
//! timer callbacks, is submitted with [`QueueHandle::exec`] and runs
//! between passes, serialized with them.

use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::mpsc::{channel, Receiver, Sender};
use std::sync::{Arc, Condvar, Mutex, OnceLock};
use std::thread::{self, JoinHandle, ThreadId};
use std::time::{Duration, Instant};

use log::{debug, error, trace, warn};

use scopeview_core::Coords;

use crate::error::{Error, Result};
use crate::sync::lock;

/// Work done by one render pass.
pub trait Renderer: 'static {
    /// Draws the image(s) at `coords`.
    ///
    /// # Errors
    /// Errors are logged by the queue; they never stop the render thread.
    fn render(&mut self, coords: &Coords) -> Result<()>;
}

/// Scheduling state of the queue.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QueuePhase {
    /// Nothing to draw.
    Idle,
    /// A pass is queued or running.
    RenderPending,
    /// Drawing is suspended; requests are dropped.
    Halted,
}

type Job<R> = Box<dyn FnOnce(&mut R) + Send>;

enum Command<R> {
    Render,
    Exec(Job<R>),
    Shutdown,
}

#[derive(Debug)]
struct QueueState {
    phase: QueuePhase,
    backlog: Vec<Coords>,
    rendering: bool,
    last_requested: Option<Coords>,
    passes: u64,
    coalesced: u64,
    stopped: bool,
}

#[derive(Debug)]
struct Shared {
    state: Mutex<QueueState>,
    changed: Condvar,
    render_thread: OnceLock<ThreadId>,
}

impl Shared {
    fn on_render_thread(&self) -> bool {
        self.render_thread.get() == Some(&thread::current().id())
    }
}

/// Clonable handle for submitting work to a draw queue.
pub struct QueueHandle<R> {
    shared: Arc<Shared>,
    tx: Sender<Command<R>>,
}

impl<R> Clone for QueueHandle<R> {
    fn clone(&self) -> Self {
        Self {
            shared: Arc::clone(&self.shared),
            tx: self.tx.clone(),
        }
    }
}

impl<R> std::fmt::Debug for QueueHandle<R> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("QueueHandle")
            .field("state", &*lock(&self.shared.state))
            .finish_non_exhaustive()
    }
}

impl<R: Renderer> QueueHandle<R> {
    /// Requests a pass for `coords`.
    ///
    /// While halted the request is not drawn, but it is remembered as the
    /// position [`QueueHandle::resume`] redraws.
    pub fn enqueue(&self, coords: Coords) {
        let mut state = lock(&self.shared.state);
        if state.stopped {
            return;
        }
        state.last_requested = Some(coords.clone());
        if state.phase == QueuePhase::Halted {
            trace!("draw request for {coords} dropped while halted");
            return;
        }
        state.backlog.push(coords);
        if state.phase == QueuePhase::Idle {
            state.phase = QueuePhase::RenderPending;
            if self.tx.send(Command::Render).is_err() {
                warn!("render thread is gone; draw request dropped");
                state.phase = QueuePhase::Idle;
                state.backlog.clear();
            }
        }
    }

    /// Requests a pass for the most recently requested coordinates.
    pub fn redraw(&self) {
        let last = lock(&self.shared.state).last_requested.clone();
        if let Some(coords) = last {
            self.enqueue(coords);
        }
    }

    /// Runs `job` on the render thread between passes. Returns `false` if
    /// the render thread has stopped.
    pub fn exec<F>(&self, job: F) -> bool
    where
        F: FnOnce(&mut R) + Send + 'static,
    {
        self.tx.send(Command::Exec(Box::new(job))).is_ok()
    }

    /// Suspends drawing and discards the backlog.
    ///
    /// Blocks until an in-flight pass finishes, unless called from the
    /// render thread itself. Halting twice is a no-op.
    pub fn halt(&self) {
        let mut state = lock(&self.shared.state);
        if state.phase == QueuePhase::Halted {
            return;
        }
        state.phase = QueuePhase::Halted;
        let dropped = state.backlog.len();
        state.backlog.clear();
        debug!("draw queue halted, {dropped} pending requests dropped");
        self.shared.changed.notify_all();
        if self.shared.on_render_thread() {
            return;
        }
        while state.rendering {
            state = self
                .shared
                .changed
                .wait(state)
                .unwrap_or_else(std::sync::PoisonError::into_inner);
        }
    }

    /// Leaves the halted state and redraws the last requested coordinates
    /// exactly once. Does nothing unless halted.
    pub fn resume(&self) {
        let mut state = lock(&self.shared.state);
        if state.phase != QueuePhase::Halted || state.stopped {
            return;
        }
        match state.last_requested.clone() {
            Some(coords) => {
                state.backlog.push(coords);
                state.phase = QueuePhase::RenderPending;
                if self.tx.send(Command::Render).is_err() {
                    state.phase = QueuePhase::Idle;
                    state.backlog.clear();
                }
            }
            None => state.phase = QueuePhase::Idle,
        }
        debug!("draw queue resumed");
        self.shared.changed.notify_all();
    }

    /// Current phase.
    #[must_use]
    pub fn phase(&self) -> QueuePhase {
        lock(&self.shared.state).phase
    }

    /// Coordinates of the most recent request.
    #[must_use]
    pub fn last_requested(&self) -> Option<Coords> {
        lock(&self.shared.state).last_requested.clone()
    }

    /// Number of completed passes.
    #[must_use]
    pub fn passes(&self) -> u64 {
        lock(&self.shared.state).passes
    }

    /// Number of requests dropped in favor of a newer one.
    #[must_use]
    pub fn coalesced(&self) -> u64 {
        lock(&self.shared.state).coalesced
    }

    /// Waits until no pass is pending or running. Returns `false` on timeout.
    pub fn wait_idle(&self, timeout: Duration) -> bool {
        let deadline = Instant::now() + timeout;
        let mut state = lock(&self.shared.state);
        loop {
            let busy = state.rendering
                || (state.phase == QueuePhase::RenderPending && !state.stopped);
            if !busy {
                return true;
            }
            let remaining = deadline.saturating_duration_since(Instant::now());
            if remaining.is_zero() {
                return false;
            }
            state = self
                .shared
                .changed
                .wait_timeout(state, remaining)
                .unwrap_or_else(std::sync::PoisonError::into_inner)
                .0;
        }
    }
}

/// Owner of the render thread.
///
/// Dropping the queue halts it and joins the render thread.
pub struct DrawQueue<R: Renderer> {
    handle: QueueHandle<R>,
    thread: Option<JoinHandle<()>>,
}

impl<R: Renderer> std::fmt::Debug for DrawQueue<R> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DrawQueue")
            .field("handle", &self.handle)
            .field("running", &self.thread.is_some())
            .finish()
    }
}

impl<R: Renderer> DrawQueue<R> {
    /// Starts a render thread called `name`.
    ///
    /// `make_renderer` runs on the new thread and receives a handle to the
    /// queue, so the renderer can schedule its own redraws.
    ///
    /// # Errors
    /// Returns [`Error::Spawn`] if the thread cannot be started.
    pub fn spawn<F>(name: &str, make_renderer: F) -> Result<Self>
    where
        F: FnOnce(QueueHandle<R>) -> R + Send + 'static,
    {
        let shared = Arc::new(Shared {
            state: Mutex::new(QueueState {
                phase: QueuePhase::Idle,
                backlog: Vec::new(),
                rendering: false,
                last_requested: None,
                passes: 0,
                coalesced: 0,
                stopped: false,
            }),
            changed: Condvar::new(),
            render_thread: OnceLock::new(),
        });
        let (tx, rx) = channel();
        let handle = QueueHandle { shared, tx };
        let worker = handle.clone();
        let thread = thread::Builder::new()
            .name(name.to_owned())
            .spawn(move || {
                let _ = worker.shared.render_thread.set(thread::current().id());
                let mut renderer = make_renderer(worker.clone());
                run_render_loop(&worker, &rx, &mut renderer);
            })
            .map_err(|source| Error::Spawn {
                name: name.to_owned(),
                source,
            })?;
        Ok(Self {
            handle,
            thread: Some(thread),
        })
    }

    /// Clonable handle to this queue.
    #[must_use]
    pub fn handle(&self) -> &QueueHandle<R> {
        &self.handle
    }

    /// See [`QueueHandle::enqueue`].
    pub fn enqueue(&self, coords: Coords) {
        self.handle.enqueue(coords);
    }

    /// See [`QueueHandle::exec`].
    pub fn exec<F>(&self, job: F) -> bool
    where
        F: FnOnce(&mut R) + Send + 'static,
    {
        self.handle.exec(job)
    }

    /// See [`QueueHandle::halt`].
    pub fn halt(&self) {
        self.handle.halt();
    }

    /// See [`QueueHandle::resume`].
    pub fn resume(&self) {
        self.handle.resume();
    }

    /// See [`QueueHandle::phase`].
    #[must_use]
    pub fn phase(&self) -> QueuePhase {
        self.handle.phase()
    }

    /// See [`QueueHandle::wait_idle`].
    pub fn wait_idle(&self, timeout: Duration) -> bool {
        self.handle.wait_idle(timeout)
    }

    /// Halts, stops the render thread and joins it.
    pub fn shutdown(&mut self) {
        self.handle.halt();
        let _ = self.handle.tx.send(Command::Shutdown);
        if let Some(thread) = self.thread.take() {
            if thread.thread().id() == thread::current().id() {
                return;
            }
            if thread.join().is_err() {
                error!("render thread panicked during shutdown");
            }
        }
    }
}

impl<R: Renderer> Drop for DrawQueue<R> {
    fn drop(&mut self) {
        self.shutdown();
    }
}

fn run_render_loop<R: Renderer>(handle: &QueueHandle<R>, rx: &Receiver<Command<R>>, renderer: &mut R) {
    while let Ok(command) = rx.recv() {
        match command {
            Command::Render => render_pass(handle, renderer),
            Command::Exec(job) => {
                if catch_unwind(AssertUnwindSafe(|| job(renderer))).is_err() {
                    error!("job on render thread panicked");
                }
            }
            Command::Shutdown => break,
        }
    }
    let mut state = lock(&handle.shared.state);
    state.stopped = true;
    state.backlog.clear();
    handle.shared.changed.notify_all();
    debug!("render thread exiting after {} passes", state.passes);
}

fn render_pass<R: Renderer>(handle: &QueueHandle<R>, renderer: &mut R) {
    let shared = &handle.shared;
    let coords = {
        let mut state = lock(&shared.state);
        if state.phase != QueuePhase::RenderPending {
            return;
        }
        let Some(latest) = state.backlog.pop() else {
            state.phase = QueuePhase::Idle;
            shared.changed.notify_all();
            return;
        };
        let dropped = state.backlog.len();
        if dropped > 0 {
            trace!("coalesced {dropped} draw requests into {latest}");
            state.coalesced += u64::try_from(dropped).unwrap_or(u64::MAX);
        }
        state.backlog.clear();
        state.rendering = true;
        latest
    };

    match catch_unwind(AssertUnwindSafe(|| renderer.render(&coords))) {
        Ok(Ok(())) => {}
        Ok(Err(e)) => error!("render pass for {coords} failed: {e}"),
        Err(_) => error!("render pass for {coords} panicked"),
    }

    let mut state = lock(&shared.state);
    state.rendering = false;
    state.passes += 1;
    if state.phase == QueuePhase::RenderPending {
        if state.backlog.is_empty() {
            state.phase = QueuePhase::Idle;
        } else if handle.tx.send(Command::Render).is_err() {
            state.phase = QueuePhase::Idle;
        }
    }
    shared.changed.notify_all();
}
