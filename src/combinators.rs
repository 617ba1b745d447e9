//! Submission and the four pairwise combinators.
//!
//! Each combinator returns immediately with a pending [`AsyncTask`]; the
//! waiting happens on a worker thread, so no ordering is guaranteed between
//! the two input branches. Only the logical precondition holds: both inputs
//! terminal, or the first input terminal for the racing variant.

use std::any::Any;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::mpsc;
use std::thread;

use log::debug;

use crate::task::AsyncTask;
use crate::Error;

/// Schedules `computation` on a fresh worker thread and returns a pending
/// task for its result. The caller never blocks.
///
/// An `Err` return fails the task with that cause; a panic inside the
/// computation is captured and surfaced as [`Error::Computation`] rather
/// than being swallowed.
///
/// # Examples
///
/// ```
/// use task_combinator::submit;
///
/// let task = submit(|| Ok(1 + 1));
/// assert_eq!(*task.wait(), Ok(2));
/// ```
pub fn submit<T, F>(computation: F) -> AsyncTask<T>
where
    T: Send + Sync + 'static,
    F: FnOnce() -> Result<T, Error> + Send + 'static,
{
    let (completer, task) = AsyncTask::pending();
    thread::spawn(move || {
        let result = match catch_unwind(AssertUnwindSafe(computation)) {
            Ok(result) => result,
            Err(payload) => Err(Error::Computation(panic_message(payload.as_ref()))),
        };
        completer.complete(result);
    });
    task
}

/// Waits for both tasks and, if both succeeded, settles the returned task
/// with `transform(value_a, value_b)`.
///
/// If either input failed, the returned task fails with
/// [`Error::Upstream`] around exactly one cause (the left input is checked
/// first when both failed) and `transform` never runs. A panic inside
/// `transform` fails the returned task with [`Error::Combinator`].
///
/// # Examples
///
/// ```
/// use task_combinator::{combine_transform, submit};
///
/// let a = submit(|| Ok(2));
/// let b = submit(|| Ok(3));
/// let product = combine_transform(a, b, |x, y| x * y);
/// assert_eq!(*product.wait(), Ok(6));
/// ```
pub fn combine_transform<A, B, R, F>(a: AsyncTask<A>, b: AsyncTask<B>, transform: F) -> AsyncTask<R>
where
    A: Send + Sync + 'static,
    B: Send + Sync + 'static,
    R: Send + Sync + 'static,
    F: FnOnce(&A, &B) -> R + Send + 'static,
{
    let (completer, task) = AsyncTask::pending();
    thread::spawn(move || {
        let left = a.wait();
        let right = b.wait();
        let result = match (&*left, &*right) {
            (Ok(value_a), Ok(value_b)) => run_callback(|| transform(value_a, value_b)),
            (Err(cause), _) | (_, Err(cause)) => Err(propagate(cause)),
        };
        completer.complete(result);
    });
    task
}

/// Waits for both tasks and, if both succeeded, feeds the two values to
/// `consume`. The returned task carries no value, only completion or
/// failure. Failure semantics match [`combine_transform`].
pub fn combine_consume<A, B, F>(a: AsyncTask<A>, b: AsyncTask<B>, consume: F) -> AsyncTask<()>
where
    A: Send + Sync + 'static,
    B: Send + Sync + 'static,
    F: FnOnce(&A, &B) + Send + 'static,
{
    combine_transform(a, b, consume)
}

/// Waits for both tasks to reach a terminal state, without inspecting
/// their values, then runs `action`.
///
/// If either input failed, `action` does not run and the returned task
/// fails with the surfaced cause.
pub fn run_after_both<A, B, F>(a: AsyncTask<A>, b: AsyncTask<B>, action: F) -> AsyncTask<()>
where
    A: Send + Sync + 'static,
    B: Send + Sync + 'static,
    F: FnOnce() + Send + 'static,
{
    let (completer, task) = AsyncTask::pending();
    thread::spawn(move || {
        let left = a.wait();
        let right = b.wait();
        let result = match (&*left, &*right) {
            (Ok(_), Ok(_)) => run_callback(action),
            (Err(cause), _) | (_, Err(cause)) => Err(propagate(cause)),
        };
        completer.complete(result);
    });
    task
}

/// Consumes the value of whichever task settles first; the other task's
/// eventual outcome is ignored.
///
/// Exactly one winner is picked even when both settle at the same instant.
/// If the winner failed, `consume` does not run and the returned task fails
/// with [`Error::Upstream`] around that cause.
///
/// # Examples
///
/// ```
/// use std::sync::{Arc, Mutex};
/// use std::thread;
/// use std::time::Duration;
/// use task_combinator::{race_consume, submit};
///
/// let slow = submit(|| {
///     thread::sleep(Duration::from_millis(80));
///     Ok(String::from("hello"))
/// });
/// let fast = submit(|| Ok(String::from("world")));
///
/// let seen = Arc::new(Mutex::new(None));
/// let sink = seen.clone();
/// race_consume(slow, fast, move |s| {
///     *sink.lock().unwrap() = Some(s.clone());
/// })
/// .wait();
/// assert_eq!(*seen.lock().unwrap(), Some(String::from("world")));
/// ```
pub fn race_consume<T, F>(a: AsyncTask<T>, b: AsyncTask<T>, consume: F) -> AsyncTask<()>
where
    T: Send + Sync + 'static,
    F: FnOnce(&T) + Send + 'static,
{
    let (completer, task) = AsyncTask::pending();
    // First outcome through the channel wins; recv picks exactly one even
    // on a tie.
    let (tx, rx) = mpsc::channel();
    for contender in [a, b] {
        let tx = tx.clone();
        thread::spawn(move || {
            let _ = tx.send(contender.wait());
        });
    }
    drop(tx);
    thread::spawn(move || {
        let result = match rx.recv() {
            Ok(outcome) => match &*outcome {
                Ok(value) => run_callback(|| consume(value)),
                Err(cause) => Err(propagate(cause)),
            },
            // Both watchers gone without reporting; wait() always returns,
            // so this only covers a torn-down process.
            Err(_) => Err(Error::Abandoned),
        };
        completer.complete(result);
    });
    task
}

fn propagate(cause: &Error) -> Error {
    debug!("propagating upstream failure: {cause}");
    Error::Upstream(Box::new(cause.clone()))
}

fn run_callback<R, F>(callback: F) -> Result<R, Error>
where
    F: FnOnce() -> R,
{
    match catch_unwind(AssertUnwindSafe(callback)) {
        Ok(value) => Ok(value),
        Err(payload) => {
            let message = panic_message(payload.as_ref());
            debug!("combining callback panicked: {message}");
            Err(Error::Combinator(message))
        }
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        (*message).to_owned()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        String::from("opaque panic payload")
    }
}
