use std::any::Any;
use std::fmt;
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use tokio::runtime::Handle;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tracing::{debug, error, trace};

/// A unit of work run against the queue's state.
pub type Task<S> = Box<dyn FnOnce(&mut S) + Send + 'static>;

enum Command<S> {
    Run(Task<S>),
    Close(Option<Task<S>>),
}

/// Cloneable handle used to submit work to an [`ExecutionQueue`].
pub struct QueueHandle<S> {
    name: Arc<str>,
    sender: mpsc::UnboundedSender<Command<S>>,
    closed: Arc<AtomicBool>,
}

impl<S> Clone for QueueHandle<S> {
    fn clone(&self) -> Self {
        Self {
            name: Arc::clone(&self.name),
            sender: self.sender.clone(),
            closed: Arc::clone(&self.closed),
        }
    }
}

impl<S> fmt::Debug for QueueHandle<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("QueueHandle")
            .field("name", &self.name)
            .field("closed", &self.closed.load(Ordering::Acquire))
            .finish()
    }
}

impl<S: Send + 'static> QueueHandle<S> {
    /// Queue name used in log events.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Whether [`close`](Self::close) has been called.
    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }

    /// Enqueue a task.
    ///
    /// Returns `false` when the queue is closed; the task is dropped
    /// without running. A post racing [`close_with`](Self::close_with) that
    /// returns `true` runs before the close hook.
    pub fn post<F>(&self, task: F) -> bool
    where
        F: FnOnce(&mut S) + Send + 'static,
    {
        if self.is_closed() {
            trace!(queue = %self.name, "Dropping task posted after close");
            return false;
        }
        self.sender.send(Command::Run(Box::new(task))).is_ok()
    }

    /// Run `f` on the queue and wait for its result.
    ///
    /// Returns `None` if the queue closed before `f` ran.
    pub async fn call<R, F>(&self, f: F) -> Option<R>
    where
        R: Send + 'static,
        F: FnOnce(&mut S) -> R + Send + 'static,
    {
        let (tx, rx) = oneshot::channel();
        if !self.post(move |state| {
            let _ = tx.send(f(state));
        }) {
            return None;
        }
        rx.await.ok()
    }

    /// Stop accepting work. Already accepted work still runs.
    pub fn close(&self) -> bool {
        self.shutdown(None)
    }

    /// Like [`close`](Self::close), running `hook` once after the backlog
    /// drains and before the worker exits.
    ///
    /// Returns `false` if the queue was already closed; `hook` is dropped.
    pub fn close_with<F>(&self, hook: F) -> bool
    where
        F: FnOnce(&mut S) + Send + 'static,
    {
        self.shutdown(Some(Box::new(hook)))
    }

    fn shutdown(&self, hook: Option<Task<S>>) -> bool {
        if self.closed.swap(true, Ordering::AcqRel) {
            return false;
        }
        debug!(queue = %self.name, "Closing execution queue");
        let _ = self.sender.send(Command::Close(hook));
        true
    }
}

/// A single-worker queue owning state `S`.
pub struct ExecutionQueue<S> {
    handle: QueueHandle<S>,
    worker: JoinHandle<()>,
}

impl<S: Send + 'static> ExecutionQueue<S> {
    /// Start a queue on the current tokio runtime.
    ///
    /// # Panics
    ///
    /// Panics when called outside a tokio runtime.
    pub fn spawn(name: &str, state: S) -> Self {
        Self::spawn_with(name, |_| state)
    }

    /// Start a queue whose state needs a handle to its own queue, e.g. to
    /// post follow-up work from timers.
    pub fn spawn_with<F>(name: &str, init: F) -> Self
    where
        F: FnOnce(QueueHandle<S>) -> S,
    {
        Self::spawn_with_on(&Handle::current(), name, init)
    }

    /// Start a queue on an explicit runtime (the execution context).
    pub fn spawn_on(runtime: &Handle, name: &str, state: S) -> Self {
        Self::spawn_with_on(runtime, name, |_| state)
    }

    /// Explicit-runtime form of [`spawn_with`](Self::spawn_with).
    pub fn spawn_with_on<F>(runtime: &Handle, name: &str, init: F) -> Self
    where
        F: FnOnce(QueueHandle<S>) -> S,
    {
        let (sender, receiver) = mpsc::unbounded_channel();
        let handle = QueueHandle {
            name: Arc::from(name),
            sender,
            closed: Arc::new(AtomicBool::new(false)),
        };
        let state = init(handle.clone());
        let worker = runtime.spawn(run_worker(Arc::clone(&handle.name), state, receiver));
        Self { handle, worker }
    }

    /// A new handle to this queue.
    pub fn handle(&self) -> QueueHandle<S> {
        self.handle.clone()
    }

    /// Detach the worker, keeping only a handle.
    pub fn into_handle(self) -> QueueHandle<S> {
        self.handle
    }

    /// Close the queue and wait until the worker has exited.
    pub async fn shutdown(self) {
        self.handle.close();
        let _ = self.worker.await;
    }
}

async fn run_worker<S>(
    name: Arc<str>,
    mut state: S,
    mut receiver: mpsc::UnboundedReceiver<Command<S>>,
) {
    let mut late = 0usize;
    while let Some(command) = receiver.recv().await {
        match command {
            Command::Run(task) => run_contained(&name, &mut state, task),
            Command::Close(hook) => {
                // Posts that passed the closed check before close() still
                // run, ahead of the hook. Nothing runs after it.
                receiver.close();
                while let Ok(command) = receiver.try_recv() {
                    if let Command::Run(task) = command {
                        late += 1;
                        run_contained(&name, &mut state, task);
                    }
                }
                if let Some(hook) = hook {
                    run_contained(&name, &mut state, hook);
                }
                break;
            }
        }
    }
    debug!(queue = %name, late, "Execution queue stopped");
}

fn run_contained<S>(name: &str, state: &mut S, task: Task<S>) {
    if let Err(payload) = panic::catch_unwind(AssertUnwindSafe(|| task(state))) {
        error!(
            queue = %name,
            panic = %panic_message(payload.as_ref()),
            "Task panicked; execution queue continues"
        );
    }
}

/// Best-effort text of a panic payload.
pub fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&'static str>() {
        (*message).to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "non-string panic payload".to_string()
    }
}
