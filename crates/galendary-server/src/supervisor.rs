//! Keeps the service running.
//!
//! A service run that fails or panics is logged, followed by a fixed pause and
//! a fresh run. Everything the failed run owned (pool, runtime, in-flight
//! requests) is dropped with it.

use std::panic::{self, AssertUnwindSafe};
use std::time::Duration;

use crate::config::DEFAULT_RESTART_DELAY_MS;
use crate::error::ServerError;

/// How a supervised run ended.
#[derive(Debug)]
pub enum Exit {
    /// The service returned `Ok`.
    Clean,
    /// `max_restarts` was reached; carries the last failure.
    GaveUp(ServerError),
}

#[derive(Debug, Clone)]
pub struct Supervisor {
    restart_delay: Duration,
    max_restarts: Option<u32>,
}

impl Default for Supervisor {
    fn default() -> Self {
        Self::new(Duration::from_millis(DEFAULT_RESTART_DELAY_MS))
    }
}

impl Supervisor {
    pub fn new(restart_delay: Duration) -> Self {
        Self {
            restart_delay,
            max_restarts: None,
        }
    }

    /// Give up after `max` restarts.
    pub fn max_restarts(mut self, max: u32) -> Self {
        self.max_restarts = Some(max);
        self
    }

    pub fn restart_delay(&self) -> Duration {
        self.restart_delay
    }

    /// Run `service` until it returns `Ok` or the restart budget runs out.
    pub fn run<F>(&self, mut service: F) -> Exit
    where
        F: FnMut() -> Result<(), ServerError>,
    {
        let mut restarts: u32 = 0;
        loop {
            let failure = match panic::catch_unwind(AssertUnwindSafe(&mut service)) {
                Ok(Ok(())) => {
                    tracing::info!(restarts, "Service stopped");
                    return Exit::Clean;
                }
                Ok(Err(e)) => e,
                Err(payload) => ServerError::HandlerPanicked(panic_message(payload.as_ref())),
            };

            tracing::error!(error = %failure, restarts, "Service failed");
            if self.max_restarts.is_some_and(|max| restarts >= max) {
                tracing::error!(restarts, "Restart limit reached, giving up");
                return Exit::GaveUp(failure);
            }

            std::thread::sleep(self.restart_delay);
            restarts += 1;
            tracing::warn!(
                attempt = restarts,
                delay_ms = self.restart_delay.as_millis() as u64,
                "Restarting service"
            );
        }
    }
}

pub(crate) fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_panic_message() {
        let payload: Box<dyn std::any::Any + Send> = Box::new("boom");
        assert_eq!(panic_message(payload.as_ref()), "boom");
        let payload: Box<dyn std::any::Any + Send> = Box::new(String::from("bang"));
        assert_eq!(panic_message(payload.as_ref()), "bang");
        let payload: Box<dyn std::any::Any + Send> = Box::new(7u8);
        assert_eq!(panic_message(payload.as_ref()), "unknown panic");
    }

    #[test]
    fn test_default_delay() {
        assert_eq!(
            Supervisor::default().restart_delay(),
            Duration::from_millis(1000)
        );
    }
}
