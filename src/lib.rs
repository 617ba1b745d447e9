//! One-shot asynchronous task handles and the pairwise combinators over them.
//!
//! A computation is submitted with [`submit`] and runs on its own worker
//! thread; the caller immediately gets back an [`AsyncTask`], a cloneable
//! handle that settles exactly once into a success or a failure. Two tasks
//! can then be joined with [`combine_transform`] / [`combine_consume`],
//! synchronized with [`run_after_both`], or raced with [`race_consume`].
//!
//! # Examples
//!
//! ```
//! use task_combinator::{combine_transform, submit};
//!
//! let greeting = submit(|| Ok(String::from("hello")));
//! let subject = submit(|| Ok(String::from("world")));
//! let combined = combine_transform(greeting, subject, |s1, s2| format!("{s1} {s2}"));
//!
//! match &*combined.wait() {
//!     Ok(joined) => assert_eq!(joined, "hello world"),
//!     Err(err) => panic!("unexpected failure: {err}"),
//! }
//! ```

use std::sync::Arc;

pub mod combinators;
pub mod task;

pub use combinators::{combine_consume, combine_transform, race_consume, run_after_both, submit};
pub use task::{AsyncTask, Completer};

/// The settled outcome of a task, shared by every observer.
///
/// A terminal task holds either a value or a cause, never both; reading it
/// any number of times yields the same `Outcome`.
pub type Outcome<T> = Arc<Result<T, Error>>;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum Error {
    /// Raised inside a submitted computation.
    #[error("computation failed: {0}")]
    Computation(String),
    /// Raised inside a combining callback. Kept distinct from upstream
    /// computation failures.
    #[error("combining callback failed: {0}")]
    Combinator(String),
    /// An input task of a combinator settled as a failure; wraps exactly one
    /// cause.
    #[error("upstream task failed: {0}")]
    Upstream(#[source] Box<Error>),
    /// The write half was dropped before the task settled.
    #[error("task abandoned before completion")]
    Abandoned,
}
