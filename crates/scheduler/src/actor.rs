//! Single-owner actor threads.
//!
//! A [`HandleActor`] moves a value onto its own thread and never gives it
//! back out. Callers send closures that run against `&mut` access to the
//! value, either waiting for the reply ([`HandleActor::call`]) or not
//! ([`HandleActor::cast`]).

use std::panic::{self, AssertUnwindSafe};
use std::sync::mpsc::{self, Sender};
use std::sync::{Mutex, PoisonError};
use std::thread::{self, JoinHandle};

use tracing::{debug, warn};

use crate::error::{panic_message, SchedulerError, SchedulerResult};

type Request<H> = Box<dyn FnOnce(&mut H) + Send + 'static>;

/// Thread that exclusively owns a `H`.
///
/// Requests run one at a time in the order they were sent. A request that
/// panics is reported to its caller as [`SchedulerError::Panicked`]; the
/// handle stays on the thread and later requests still run.
///
/// # Example
///
/// ```
/// use pdf_annotator_scheduler::HandleActor;
///
/// let actor = HandleActor::spawn("counter", 0u32).unwrap();
/// actor.cast(|n| *n += 2).unwrap();
/// assert_eq!(actor.call(|n| *n * 10).unwrap(), 20);
/// ```
pub struct HandleActor<H> {
    name: String,
    sender: Mutex<Option<Sender<Request<H>>>>,
    thread: Mutex<Option<JoinHandle<()>>>,
}

impl<H: Send + 'static> HandleActor<H> {
    /// Start the actor thread with `handle` as its state.
    pub fn spawn(name: &str, handle: H) -> SchedulerResult<Self> {
        let (sender, receiver) = mpsc::channel::<Request<H>>();
        let thread = thread::Builder::new()
            .name(name.to_string())
            .spawn(move || {
                let mut handle = handle;
                for request in receiver {
                    request(&mut handle);
                }
            })
            .map_err(|source| SchedulerError::Spawn { name: name.to_string(), source })?;
        debug!(actor = name, "actor started");

        Ok(Self {
            name: name.to_string(),
            sender: Mutex::new(Some(sender)),
            thread: Mutex::new(Some(thread)),
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    fn send(&self, request: Request<H>) -> SchedulerResult<()> {
        let sender = self.sender.lock().unwrap_or_else(PoisonError::into_inner);
        sender
            .as_ref()
            .ok_or_else(|| SchedulerError::Closed(self.name.clone()))?
            .send(request)
            .map_err(|_| SchedulerError::Closed(self.name.clone()))
    }

    /// Run `f` on the actor thread and wait for its result.
    pub fn call<R, F>(&self, f: F) -> SchedulerResult<R>
    where
        R: Send + 'static,
        F: FnOnce(&mut H) -> R + Send + 'static,
    {
        let (reply, response) = mpsc::sync_channel(1);
        self.send(Box::new(move |handle: &mut H| {
            let result = panic::catch_unwind(AssertUnwindSafe(|| f(handle)))
                .map_err(|payload| SchedulerError::Panicked(panic_message(payload.as_ref())));
            let _ = reply.send(result);
        }))?;
        response.recv().map_err(|_| SchedulerError::Closed(self.name.clone()))?
    }

    /// Queue `f` on the actor thread without waiting.
    pub fn cast<F>(&self, f: F) -> SchedulerResult<()>
    where
        F: FnOnce(&mut H) + Send + 'static,
    {
        let name = self.name.clone();
        self.send(Box::new(move |handle: &mut H| {
            if let Err(payload) = panic::catch_unwind(AssertUnwindSafe(|| f(handle))) {
                warn!(actor = %name, panic = %panic_message(payload.as_ref()), "actor request panicked");
            }
        }))
    }

    /// Finish queued requests, then drop the handle and join the thread.
    pub fn shutdown(&self) {
        let sender = self.sender.lock().unwrap_or_else(PoisonError::into_inner).take();
        drop(sender);
        let thread = self.thread.lock().unwrap_or_else(PoisonError::into_inner).take();
        if let Some(thread) = thread {
            if thread.join().is_err() {
                warn!(actor = %self.name, "actor thread exited abnormally");
            }
            debug!(actor = %self.name, "actor stopped");
        }
    }
}

impl<H> Drop for HandleActor<H> {
    fn drop(&mut self) {
        let sender = self.sender.get_mut().unwrap_or_else(PoisonError::into_inner).take();
        drop(sender);
        if let Some(thread) = self.thread.get_mut().unwrap_or_else(PoisonError::into_inner).take() {
            let _ = thread.join();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    #[test]
    fn test_call_returns_value() {
        let actor = HandleActor::spawn("values", vec![1, 2, 3]).unwrap();
        assert_eq!(actor.call(|v| v.iter().sum::<i32>()).unwrap(), 6);
        assert_eq!(actor.name(), "values");
    }

    #[test]
    fn test_requests_run_in_order() {
        let actor = HandleActor::spawn("ordered", Vec::new()).unwrap();
        for i in 0..20 {
            actor.cast(move |v: &mut Vec<i32>| v.push(i)).unwrap();
        }
        assert_eq!(actor.call(|v| v.clone()).unwrap(), (0..20).collect::<Vec<_>>());
    }

    #[test]
    fn test_handle_stays_on_actor_thread() {
        let actor = HandleActor::spawn("bound", 0u32).unwrap();
        let first = actor.call(|hits| {
            *hits += 1;
            thread::current().id()
        });
        let (id, hits) = actor
            .call(|hits| {
                *hits += 1;
                (thread::current().id(), *hits)
            })
            .unwrap();
        assert_eq!(first.unwrap(), id);
        assert_ne!(id, thread::current().id());
        assert_eq!(hits, 2);
    }

    #[test]
    fn test_panic_is_reported_and_actor_survives() {
        let actor = HandleActor::spawn("fragile", 5u8).unwrap();
        let err = actor.call(|_| -> u8 { panic!("extractor crashed") }).unwrap_err();
        assert!(matches!(err, SchedulerError::Panicked(ref m) if m == "extractor crashed"));
        assert_eq!(actor.call(|n| *n).unwrap(), 5);
    }

    #[test]
    fn test_closed_after_shutdown() {
        let actor = HandleActor::spawn("closing", ()).unwrap();
        actor.shutdown();
        assert!(matches!(actor.call(|_| ()), Err(SchedulerError::Closed(_))));
        assert!(matches!(actor.cast(|_| ()), Err(SchedulerError::Closed(_))));
    }
}
