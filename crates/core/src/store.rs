//! Session lookup by id.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::RwLock;
use tracing::debug;

use crate::context::ServiceContext;
use crate::session::{Session, SessionState};

/// All live sessions of one service.
#[derive(Debug)]
pub struct SessionStore {
	context: Arc<ServiceContext>,
	sessions: RwLock<HashMap<String, Arc<Session>>>,
}

impl SessionStore {
	pub fn new(context: Arc<ServiceContext>) -> Self {
		Self {
			context,
			sessions: RwLock::new(HashMap::new()),
		}
	}

	pub fn context(&self) -> &Arc<ServiceContext> {
		&self.context
	}

	/// Creates a session with a fresh random id.
	pub fn create(&self) -> Arc<Session> {
		let id = uuid::Uuid::new_v4().simple().to_string();
		let session = Arc::new(Session::with_context(id.clone(), Arc::clone(&self.context)));
		self.sessions.write().insert(id, Arc::clone(&session));
		debug!(target = "flowdev.session", session = %session.id(), "session created");
		session
	}

	pub fn get(&self, id: &str) -> Option<Arc<Session>> {
		self.sessions.read().get(id).cloned()
	}

	/// Looks up `id`, creating a new session when it is absent or unknown.
	/// The flag is true when a session was created.
	pub fn get_or_create(&self, id: Option<&str>) -> (Arc<Session>, bool) {
		match id.and_then(|id| self.get(id)) {
			Some(session) => (session, false),
			None => (self.create(), true),
		}
	}

	/// Removes the session and marks it closed.
	pub fn remove(&self, id: &str) -> Option<Arc<Session>> {
		let session = self.sessions.write().remove(id)?;
		{
			let guard = session.lock();
			guard.close();
			if guard.state() == SessionState::Closing {
				let _ = guard.set_state(SessionState::Closed);
			}
		}
		debug!(target = "flowdev.session", session = %id, "session removed");
		Some(session)
	}

	pub fn len(&self) -> usize {
		self.sessions.read().len()
	}

	pub fn is_empty(&self) -> bool {
		self.sessions.read().is_empty()
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	fn store() -> SessionStore {
		SessionStore::new(Arc::new(ServiceContext::new("store")))
	}

	#[test]
	fn created_sessions_are_found_by_id() {
		let store = store();
		let session = store.create();
		assert_eq!(session.id().len(), 32);
		assert!(Arc::ptr_eq(&store.get(session.id()).unwrap(), &session));
		assert!(Arc::ptr_eq(session.context().unwrap(), store.context()));
	}

	#[test]
	fn unknown_ids_get_a_new_session() {
		let store = store();
		let (first, created) = store.get_or_create(Some("stale"));
		assert!(created);
		assert_ne!(first.id(), "stale");

		let (again, created) = store.get_or_create(Some(first.id()));
		assert!(!created);
		assert!(Arc::ptr_eq(&first, &again));
		assert_eq!(store.len(), 1);
	}

	#[test]
	fn removed_sessions_are_closed() {
		let store = store();
		let session = store.create();
		let removed = store.remove(session.id()).unwrap();

		assert_eq!(removed.lock().state(), SessionState::Closed);
		assert!(store.get(session.id()).is_none());
		assert!(store.is_empty());
		assert!(store.remove(session.id()).is_none());
	}
}
