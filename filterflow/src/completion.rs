//! Callback-style completion over future-based work.
//!
//! [`begin`] starts a future and reports completion through an
//! [`AsyncResult`] handle and an optional callback. [`from_begin_end`] goes
//! the other way, turning a begin/end pair back into a future.

use parking_lot::{Condvar, Mutex};
use std::any::Any;
use std::fmt;
use std::future::Future;
use std::sync::Arc;
use std::task::{Context, Poll};
use tokio::runtime::Handle;
use tokio::sync::oneshot;

use crate::errors::FilterflowError;

/// Called once the work behind an [`AsyncResult`] completes.
pub type Callback<T> = Box<dyn FnOnce(&AsyncResult<T>) + Send + 'static>;

/// Caller-supplied state carried alongside an operation.
pub type AsyncState = Arc<dyn Any + Send + Sync>;

enum Slot<T> {
    Pending,
    Ready(T),
    Taken,
}

struct Shared<T> {
    slot: Mutex<Slot<T>>,
    ready: Condvar,
    completed_synchronously: Mutex<bool>,
}

/// Handle to work started with [`begin`].
pub struct AsyncResult<T> {
    shared: Arc<Shared<T>>,
    state: Option<AsyncState>,
}

impl<T> Clone for AsyncResult<T> {
    fn clone(&self) -> Self {
        Self {
            shared: Arc::clone(&self.shared),
            state: self.state.clone(),
        }
    }
}

impl<T> fmt::Debug for AsyncResult<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AsyncResult")
            .field("completed", &self.is_completed())
            .field("completed_synchronously", &self.completed_synchronously())
            .finish_non_exhaustive()
    }
}

impl<T> AsyncResult<T> {
    fn pending(state: Option<AsyncState>) -> Self {
        Self {
            shared: Arc::new(Shared {
                slot: Mutex::new(Slot::Pending),
                ready: Condvar::new(),
                completed_synchronously: Mutex::new(false),
            }),
            state,
        }
    }

    fn complete(&self, value: T, synchronously: bool) {
        *self.shared.completed_synchronously.lock() = synchronously;
        *self.shared.slot.lock() = Slot::Ready(value);
        self.shared.ready.notify_all();
    }

    /// Returns true once the work finished.
    pub fn is_completed(&self) -> bool {
        !matches!(*self.shared.slot.lock(), Slot::Pending)
    }

    /// Returns true if the work finished before [`begin`] returned.
    pub fn completed_synchronously(&self) -> bool {
        *self.shared.completed_synchronously.lock()
    }

    /// Returns the caller-supplied state.
    pub fn state(&self) -> Option<&AsyncState> {
        self.state.as_ref()
    }

    /// Takes the value, blocking the current thread until it is ready.
    ///
    /// Must not be called from a runtime worker thread while the work is
    /// still pending. Fails if the value was already taken.
    pub fn end(&self) -> Result<T, FilterflowError> {
        let mut slot = self.shared.slot.lock();
        while matches!(*slot, Slot::Pending) {
            self.shared.ready.wait(&mut slot);
        }
        match std::mem::replace(&mut *slot, Slot::Taken) {
            Slot::Ready(value) => Ok(value),
            _ => Err(FilterflowError::Completion(
                "end called more than once".to_string(),
            )),
        }
    }
}

/// Starts `future` and returns a handle to its completion.
///
/// The future is polled once on the calling thread. If it finishes right
/// away the callback runs before `begin` returns and the handle reports
/// [`AsyncResult::completed_synchronously`]; otherwise the rest runs as a
/// task on `handle` and the callback runs on that task.
pub fn begin<T, F>(
    handle: &Handle,
    future: F,
    callback: Option<Callback<T>>,
    state: Option<AsyncState>,
) -> AsyncResult<T>
where
    T: Send + 'static,
    F: Future<Output = T> + Send + 'static,
{
    let result = AsyncResult::pending(state);
    let mut future = Box::pin(future);

    let waker = futures::task::noop_waker();
    let mut cx = Context::from_waker(&waker);
    let first = {
        let _guard = handle.enter();
        future.as_mut().poll(&mut cx)
    };

    match first {
        Poll::Ready(value) => {
            result.complete(value, true);
            if let Some(callback) = callback {
                callback(&result);
            }
        }
        Poll::Pending => {
            let task_result = result.clone();
            handle.spawn(async move {
                let value = future.await;
                task_result.complete(value, false);
                if let Some(callback) = callback {
                    callback(&task_result);
                }
            });
        }
    }
    result
}

/// Awaits work exposed through a begin/end pair.
///
/// `begin_fn` receives the callback to register; `end_fn` receives the
/// completed handle.
pub async fn from_begin_end<T, R, B, E>(begin_fn: B, end_fn: E) -> Result<R, FilterflowError>
where
    T: Send + 'static,
    B: FnOnce(Callback<T>) -> AsyncResult<T>,
    E: FnOnce(&AsyncResult<T>) -> Result<R, FilterflowError>,
{
    let (tx, rx) = oneshot::channel();
    let _started = begin_fn(Box::new(move |result: &AsyncResult<T>| {
        let _ = tx.send(result.clone());
    }));
    let completed = rx.await.map_err(|_| {
        FilterflowError::Completion("completion callback was dropped".to_string())
    })?;
    end_fn(&completed)
}
