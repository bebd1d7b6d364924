// Error types for flowdev sessions and service configuration

use std::time::Duration;

use thiserror::Error;

use crate::session::SessionState;

/// Result type alias for flowdev operations
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur when working with sessions and configuration
#[derive(Debug, Error)]
pub enum Error {
	/// The calling thread holds the lock of a different session.
	///
	/// Locking a second session while one is held invites lock-order
	/// deadlocks between request threads.
	#[error("Can't access session while another session is locked by the same thread")]
	OtherSessionLocked,

	/// The session lock could not be acquired in time.
	#[error("Timed out after {0:?} waiting for the session lock")]
	LockTimeout(Duration),

	/// A queued access task did not finish in time.
	#[error("Timed out after {0:?} waiting for session access")]
	AccessTimeout(Duration),

	/// A queued access task was dropped without producing a result,
	/// either because it panicked or the session went away.
	#[error("Session access task was cancelled")]
	AccessCancelled,

	/// Session lifecycle states only move forward.
	#[error("Invalid session state change from {from:?} to {to:?}")]
	InvalidStateTransition { from: SessionState, to: SessionState },

	/// A configuration property has a value of the wrong shape.
	#[error("Invalid value '{value}' for property '{name}': {expected}")]
	InvalidProperty {
		name: String,
		value: String,
		expected: &'static str,
	},
}
