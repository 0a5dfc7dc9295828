//! Host environment boundary.
//!
//! The host is whatever embeds the verification engine (an interpreter, a
//! test runner). The adapter only needs three entry points from it: start the
//! engine, stop it, and deliver an out-of-band event such as a premature
//! simulator shutdown.

use std::fmt;

use crate::context::Gpi;

/// Severity of an event forwarded to the host.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
pub enum EventLevel {
    /// Informational.
    Info,
    /// The current test failed; the session may continue.
    TestFail,
    /// The session cannot continue.
    Fail,
}

impl EventLevel {
    /// Numeric code used across the host boundary.
    pub fn as_raw(self) -> i32 {
        match self {
            EventLevel::Info => 0,
            EventLevel::TestFail => 1,
            EventLevel::Fail => 2,
        }
    }
}

impl fmt::Display for EventLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EventLevel::Info => write!(f, "INFO"),
            EventLevel::TestFail => write!(f, "TEST_FAIL"),
            EventLevel::Fail => write!(f, "FAIL"),
        }
    }
}

/// Failures reported by a host environment.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum HostError {
    /// The engine could not be started.
    #[error("host initialisation failed: {0}")]
    Init(String),
}

/// The embedding of the verification engine.
pub trait HostEnvironment {
    /// Starts the engine. Called once, from the startup callback.
    fn init(&self, gpi: &Gpi, args: &[String]) -> Result<(), HostError>;

    /// Stops the engine. Called once, from the shutdown callback.
    fn end(&self);

    /// Delivers an out-of-band event.
    fn event(&self, level: EventLevel, message: &str);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn level_codes() {
        assert_eq!(EventLevel::Info.as_raw(), 0);
        assert_eq!(EventLevel::TestFail.as_raw(), 1);
        assert_eq!(EventLevel::Fail.as_raw(), 2);
        assert_eq!(EventLevel::TestFail.to_string(), "TEST_FAIL");
    }

    #[test]
    fn error_display() {
        let e = HostError::Init("no interpreter".into());
        assert_eq!(e.to_string(), "host initialisation failed: no interpreter");
    }
}
