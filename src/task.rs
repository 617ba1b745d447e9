//! The one-shot task handle and its write half.
//!
//! [`AsyncTask::pending`] hands back a `(Completer, AsyncTask)` pair sharing
//! one slot. The `Completer` is consumed by value when it settles the task,
//! so a task can never settle twice. The `AsyncTask` side may be cloned
//! freely; every clone observes the same terminal outcome.

use std::future::Future;
use std::pin::Pin;
use std::sync::{Arc, Condvar, Mutex};
use std::task::{Context, Poll, Waker};

use log::{debug, trace};

use crate::{Error, Outcome};

/// Cloneable handle to a computation that eventually produces a value or
/// fails. Settles at most once; terminal state never changes afterwards.
///
/// # Examples
///
/// ```
/// use task_combinator::AsyncTask;
/// use futures::executor::block_on;
/// use std::thread;
///
/// let (completer, task) = AsyncTask::<String>::pending();
/// let waiter = thread::spawn(move || block_on(async {
///     assert_eq!(*task.await, Ok(String::from("hi")));
/// }));
/// completer.complete(Ok(String::from("hi")));
/// waiter.join().expect("The waiter thread has panicked");
/// ```
#[derive(Debug)]
pub struct AsyncTask<T> {
    shared: Arc<Shared<T>>,
}

/// The write half of a task. Settling consumes it; dropping it unsettled
/// fails the task with [`Error::Abandoned`].
#[derive(Debug)]
pub struct Completer<T> {
    shared: Arc<Shared<T>>,
}

#[derive(Debug)]
struct Shared<T> {
    state: Mutex<State<T>>,
    cond: Condvar,
}

#[derive(Debug)]
enum State<T> {
    Pending { wakers: Vec<Waker> },
    Done(Outcome<T>),
}

impl<T> AsyncTask<T> {
    /// Creates an unsettled task together with its write half.
    pub fn pending() -> (Completer<T>, Self) {
        let shared = Arc::new(Shared {
            state: Mutex::new(State::Pending { wakers: Vec::new() }),
            cond: Condvar::new(),
        });
        (
            Completer {
                shared: shared.clone(),
            },
            Self { shared },
        )
    }

    /// Blocks the calling thread until the task settles, then returns the
    /// shared outcome. Repeated calls return the same outcome; the
    /// computation is never re-run.
    pub fn wait(&self) -> Outcome<T> {
        let mut state = self.shared.state.lock().unwrap();
        loop {
            match &*state {
                State::Done(outcome) => return outcome.clone(),
                State::Pending { .. } => state = self.shared.cond.wait(state).unwrap(),
            }
        }
    }

    /// Returns the outcome if the task has already settled.
    pub fn peek(&self) -> Option<Outcome<T>> {
        match &*self.shared.state.lock().unwrap() {
            State::Done(outcome) => Some(outcome.clone()),
            State::Pending { .. } => None,
        }
    }
}

impl<T> Clone for AsyncTask<T> {
    fn clone(&self) -> Self {
        Self {
            shared: self.shared.clone(),
        }
    }
}

impl<T> Completer<T> {
    /// Settles the task. The completer is consumed, so this is the only
    /// transition the task will ever make.
    pub fn complete(self, result: Result<T, Error>) {
        self.shared.finish(result);
    }
}

impl<T> Drop for Completer<T> {
    /// An unsettled task whose completer goes away settles as abandoned.
    fn drop(&mut self) {
        self.shared.finish(Err(Error::Abandoned));
    }
}

impl<T> Shared<T> {
    fn finish(&self, result: Result<T, Error>) {
        let mut state = self.state.lock().unwrap();
        if let State::Pending { wakers } = &mut *state {
            match &result {
                Ok(_) => trace!("task settled with a value"),
                Err(err) => debug!("task settled with a failure: {err}"),
            }
            let wakers = std::mem::take(wakers);
            *state = State::Done(Arc::new(result));
            drop(state);
            self.cond.notify_all();
            for waker in wakers {
                waker.wake()
            }
        }
    }
}

impl<T> Future for AsyncTask<T> {
    type Output = Outcome<T>;

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        let mut state = self.shared.state.lock().unwrap();
        match &mut *state {
            State::Done(outcome) => Poll::Ready(outcome.clone()),
            State::Pending { wakers } => {
                // Keep every registered waker; cloned handles may be polled
                // from several executors and waking only the latest would
                // strand the rest.
                wakers.push(cx.waker().clone());
                Poll::Pending
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::AsyncTask;
    use crate::Error;
    use futures::executor::block_on;
    use std::thread;

    #[test]
    fn test_settle_wakes_blocking_waiter() {
        let (completer, task) = AsyncTask::<String>::pending();
        let waiter = thread::spawn(move || {
            assert_eq!(*task.wait(), Ok(String::from("🍓")));
        });
        let settler = thread::spawn(move || {
            completer.complete(Ok(String::from("🍓")));
        });
        waiter.join().expect("The waiter thread has panicked");
        settler.join().expect("The settler thread has panicked");
    }

    #[test]
    fn test_settle_wakes_future_waiter() {
        let (completer, task) = AsyncTask::<String>::pending();
        let waiter = thread::spawn(move || {
            block_on(async {
                assert_eq!(*task.await, Ok(String::from("hi")));
            })
        });
        let settler = thread::spawn(move || {
            completer.complete(Ok(String::from("hi")));
        });
        waiter.join().expect("The waiter thread has panicked");
        settler.join().expect("The settler thread has panicked");
    }

    #[test]
    fn test_every_clone_sees_the_same_outcome() {
        let (completer, task) = AsyncTask::<String>::pending();
        let task_b = task.clone();
        let waiter_a = thread::spawn(move || {
            assert_eq!(*task.wait(), Ok(String::from("shared")));
        });
        let waiter_b = thread::spawn(move || {
            block_on(async {
                assert_eq!(*task_b.await, Ok(String::from("shared")));
            })
        });
        completer.complete(Ok(String::from("shared")));
        waiter_a.join().expect("The waiter_a thread has panicked");
        waiter_b.join().expect("The waiter_b thread has panicked");
    }

    #[test]
    fn test_dropped_completer_settles_as_abandoned() {
        let (completer, task) = AsyncTask::<String>::pending();
        let settler = thread::spawn(move || {
            std::mem::drop(completer);
        });
        settler.join().expect("The settler thread has panicked");
        assert_eq!(*task.wait(), Err(Error::Abandoned));
    }

    #[test]
    fn test_terminal_reads_are_idempotent() {
        let (completer, task) = AsyncTask::<i32>::pending();
        completer.complete(Ok(42));
        let first = task.wait();
        let second = task.wait();
        assert_eq!(*first, Ok(42));
        assert!(std::sync::Arc::ptr_eq(&first, &second));
    }

    #[test]
    fn test_peek_is_none_until_settled() {
        let (completer, task) = AsyncTask::<i32>::pending();
        assert!(task.peek().is_none());
        completer.complete(Ok(7));
        assert_eq!(*task.peek().expect("task should be settled"), Ok(7));
    }
}
