//! Thread-local "current" session and service context.
//!
//! Request handling code can ask for the session and context it runs under
//! without threading them through every call. A [`CurrentScope`] installs a
//! set of instances and puts back whatever was there before when dropped,
//! including during panic unwinding.

use std::cell::RefCell;
use std::marker::PhantomData;
use std::sync::Arc;

use crate::context::ServiceContext;
use crate::session::Session;

thread_local! {
	static CURRENT: RefCell<CurrentInstances> = RefCell::new(CurrentInstances::default());
}

/// The instances current on one thread.
#[derive(Clone, Default)]
pub struct CurrentInstances {
	pub session: Option<Arc<Session>>,
	pub context: Option<Arc<ServiceContext>>,
}

impl std::fmt::Debug for CurrentInstances {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.debug_struct("CurrentInstances")
			.field("session", &self.session.as_ref().map(|s| s.id().to_string()))
			.field("context", &self.context.as_ref().map(|c| c.name().to_string()))
			.finish()
	}
}

impl CurrentInstances {
	/// The session and, if it has one, its service context.
	pub fn for_session(session: &Arc<Session>) -> Self {
		Self {
			session: Some(Arc::clone(session)),
			context: session.context().cloned(),
		}
	}

	pub fn is_empty(&self) -> bool {
		self.session.is_none() && self.context.is_none()
	}

	/// Same instances, by identity.
	pub fn same_as(&self, other: &CurrentInstances) -> bool {
		fn same<T>(a: &Option<Arc<T>>, b: &Option<Arc<T>>) -> bool {
			match (a, b) {
				(Some(a), Some(b)) => Arc::ptr_eq(a, b),
				(None, None) => true,
				_ => false,
			}
		}
		same(&self.session, &other.session) && same(&self.context, &other.context)
	}
}

/// Snapshot of the calling thread's current instances.
pub fn current() -> CurrentInstances {
	CURRENT.with(|current| current.borrow().clone())
}

pub fn current_session() -> Option<Arc<Session>> {
	CURRENT.with(|current| current.borrow().session.clone())
}

pub fn current_context() -> Option<Arc<ServiceContext>> {
	CURRENT.with(|current| current.borrow().context.clone())
}

/// Replaces the current instances until dropped.
#[must_use = "the previous instances are restored when the scope is dropped"]
pub struct CurrentScope {
	previous: Option<CurrentInstances>,
	// Restoring must happen on the thread that entered the scope.
	_not_send: PhantomData<*const ()>,
}

impl CurrentScope {
	pub fn enter(instances: CurrentInstances) -> Self {
		let previous = CURRENT.with(|current| current.replace(instances));
		Self {
			previous: Some(previous),
			_not_send: PhantomData,
		}
	}
}

impl Drop for CurrentScope {
	fn drop(&mut self) {
		if let Some(previous) = self.previous.take() {
			// The thread-local may already be gone during thread teardown.
			let _ = CURRENT.try_with(|current| current.replace(previous));
		}
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn scopes_nest_and_restore() {
		let outer = Arc::new(ServiceContext::new("outer"));
		let inner = Arc::new(ServiceContext::new("inner"));
		assert!(current().is_empty());

		{
			let _outer = CurrentScope::enter(CurrentInstances {
				session: None,
				context: Some(outer.clone()),
			});
			assert!(Arc::ptr_eq(&current_context().unwrap(), &outer));

			{
				let _inner = CurrentScope::enter(CurrentInstances {
					session: None,
					context: Some(inner.clone()),
				});
				assert!(Arc::ptr_eq(&current_context().unwrap(), &inner));
			}

			assert!(Arc::ptr_eq(&current_context().unwrap(), &outer));
		}

		assert!(current().is_empty());
	}

	#[test]
	fn scope_restores_on_panic() {
		let context = Arc::new(ServiceContext::new("panicking"));
		let result = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
			let _scope = CurrentScope::enter(CurrentInstances {
				session: None,
				context: Some(context.clone()),
			});
			panic!("boom");
		}));
		assert!(result.is_err());
		assert!(current_context().is_none());
	}

	#[test]
	fn current_is_per_thread() {
		let context = Arc::new(ServiceContext::new("main"));
		let _scope = CurrentScope::enter(CurrentInstances {
			session: None,
			context: Some(context),
		});

		let seen = std::thread::spawn(|| current_context().is_some()).join().unwrap();
		assert!(!seen);
	}
}
