// Caller-supplied deadline propagated into store calls and aggregation loops

use crate::error::{QueryError, QueryResult};
use std::time::{Duration, Instant};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Deadline {
    at: Option<Instant>,
}

impl Deadline {
    /// No deadline; used by the CLI and tests.
    pub fn none() -> Self {
        Deadline { at: None }
    }

    pub fn after(timeout: Duration) -> Self {
        Deadline {
            at: Instant::now().checked_add(timeout),
        }
    }

    pub fn at(instant: Instant) -> Self {
        Deadline { at: Some(instant) }
    }

    pub fn instant(&self) -> Option<Instant> {
        self.at
    }

    pub fn is_expired(&self) -> bool {
        matches!(self.at, Some(at) if Instant::now() >= at)
    }

    /// `Err(Timeout)` once the deadline has passed.
    pub fn check(&self) -> QueryResult<()> {
        if self.is_expired() {
            Err(QueryError::Timeout)
        } else {
            Ok(())
        }
    }
}

impl Default for Deadline {
    fn default() -> Self {
        Self::none()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_none_never_expires() {
        assert!(!Deadline::none().is_expired());
        assert!(Deadline::none().check().is_ok());
    }

    #[test]
    fn test_past_deadline_is_expired() {
        let deadline = Deadline::at(Instant::now());
        assert!(deadline.is_expired());
        assert_eq!(deadline.check(), Err(QueryError::Timeout));
    }

    #[test]
    fn test_future_deadline_is_live() {
        let deadline = Deadline::after(Duration::from_secs(60));
        assert!(!deadline.is_expired());
    }
}
