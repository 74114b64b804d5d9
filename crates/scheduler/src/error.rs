use std::any::Any;
use std::io;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum SchedulerError {
    #[error("failed to spawn thread {name}: {source}")]
    Spawn {
        name: String,
        #[source]
        source: io::Error,
    },

    /// The worker or actor thread has stopped accepting work.
    #[error("{0} has shut down")]
    Closed(String),

    #[error("task panicked: {0}")]
    Panicked(String),
}

pub type SchedulerResult<T> = Result<T, SchedulerError>;

/// Best-effort text of a caught panic payload.
pub fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "unknown panic".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::panic;

    #[test]
    fn test_panic_message_variants() {
        let payload = panic::catch_unwind(|| panic!("static")).unwrap_err();
        assert_eq!(panic_message(payload.as_ref()), "static");

        let payload = panic::catch_unwind(|| panic!("page {}", 3)).unwrap_err();
        assert_eq!(panic_message(payload.as_ref()), "page 3");

        let payload = panic::catch_unwind(|| panic::panic_any(7u8)).unwrap_err();
        assert_eq!(panic_message(payload.as_ref()), "unknown panic");
    }
}
