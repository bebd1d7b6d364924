//! flowdev - sessions, locking, and typed attributes
//!
//! Request handling in a flowdev service runs against a [`Session`]. Every
//! session has a reentrant lock; its state is only reachable through the
//! [`SessionGuard`] that holding the lock produces.
//!
//! # Example
//!
//! ```ignore
//! use std::sync::Arc;
//! use flowdev::{ServiceContext, SessionStore};
//!
//! let store = SessionStore::new(Arc::new(ServiceContext::new("app")));
//! let session = store.create();
//!
//! let visits = session.run_with_lock(|guard| {
//!     let counter = guard.get_attribute_or_insert_with(|| Visits::default());
//!     counter.increment()
//! })?;
//! ```
//!
//! Services share state through the [`ServiceContext`] attribute store, which
//! is also the attribute view of the [`DeploymentConfig`] derived from it.

pub mod attributes;
pub mod context;
pub mod current;
pub mod env;
pub mod error;
pub mod session;
pub mod store;

pub use attributes::{AttributeMap, AttributeStore};
pub use context::{DeploymentConfig, ServiceContext};
pub use current::{CurrentInstances, CurrentScope, current_context, current_session};
pub use error::{Error, Result};
pub use session::{AccessHandle, Session, SessionGuard, SessionState};
pub use store::SessionStore;
