//! Worker pool for dearjack's non-real-time jobs.
//!
//! Client construction and teardown talk to the audio server and may
//! block; the engine hands those jobs to a [`WorkerPool`] instead of
//! running them on the control thread.
//!
//! ```
//! use dearjack_worker::WorkerPool;
//!
//! let pool = WorkerPool::new(2).unwrap();
//! let answer = pool.submit(|| 6 * 7).unwrap();
//! assert_eq!(answer.recv().unwrap(), 42);
//! ```

pub mod error;
pub use error::{Error, Result};

pub mod pool;
pub use pool::{Task, WorkerPool};
