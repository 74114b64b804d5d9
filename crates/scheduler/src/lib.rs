//! PDF Annotator Scheduler Library
//!
//! Thread ownership for the annotation engine.
//!
//! Nothing in here knows about documents. The viewer decides which work goes
//! where:
//!
//! - [`HandleActor`] owns a single value on a dedicated thread. Every access
//!   is a message to that thread, so handles that must not be shared (a
//!   rasterizer, a text extractor) never leave it.
//! - [`WorkerPool`] runs boxed jobs FIFO on a fixed number of named threads.
//!   A pool of one is the serialized interaction worker.
//! - [`CompletionQueue`] carries results back to the UI thread, which drains
//!   it when it chooses.
//!
//! # Example
//!
//! ```
//! use pdf_annotator_scheduler::{CompletionQueue, WorkerPool};
//!
//! let queue = CompletionQueue::new();
//! let poster = queue.poster();
//! let pool = WorkerPool::new("render", 2).unwrap();
//!
//! for page in 0..4u32 {
//!     let poster = poster.clone();
//!     pool.execute(move || poster.post(page * 10)).unwrap();
//! }
//! pool.shutdown();
//!
//! let mut done = queue.drain();
//! done.sort();
//! assert_eq!(done, vec![0, 10, 20, 30]);
//! ```

mod actor;
mod completion;
mod config;
mod error;
mod pool;

pub use actor::HandleActor;
pub use completion::{CompletionPoster, CompletionQueue};
pub use config::WorkerConfig;
pub use error::{panic_message, SchedulerError, SchedulerResult};
pub use pool::WorkerPool;
