//! Request-style access to sessions from several threads.

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::thread;
use std::time::Duration;

use flowdev::{
	CurrentInstances, CurrentScope, DeploymentConfig, Error, ServiceContext, SessionStore, current_context,
	current_session,
};
use parking_lot::Mutex;

#[derive(Default)]
struct Cart {
	items: Mutex<Vec<String>>,
}

#[derive(Debug)]
enum RequestError {
	Session(Error),
	Validation(&'static str),
}

impl From<Error> for RequestError {
	fn from(err: Error) -> Self {
		RequestError::Session(err)
	}
}

struct SharedCache {
	built: usize,
}

#[test]
fn concurrent_requests_see_each_others_updates() {
	let store = Arc::new(SessionStore::new(Arc::new(ServiceContext::new("shop"))));
	let session = store.create();
	let inits = Arc::new(AtomicUsize::new(0));

	let requests: Vec<_> = (0..8)
		.map(|i| {
			let store = store.clone();
			let id = session.id().to_string();
			let inits = inits.clone();
			thread::spawn(move || {
				let (session, created) = store.get_or_create(Some(&id));
				assert!(!created);
				session
					.run_with_lock(|guard| {
						let cart = guard.get_attribute_or_insert_with(|| {
							inits.fetch_add(1, Ordering::SeqCst);
							Cart::default()
						});
						cart.items.lock().push(format!("item-{i}"));
					})
					.unwrap();
			})
		})
		.collect();
	for request in requests {
		request.join().unwrap();
	}

	assert_eq!(inits.load(Ordering::SeqCst), 1);
	let guard = session.lock();
	assert_eq!(guard.get_attribute::<Cart>().unwrap().items.lock().len(), 8);
}

#[test]
fn context_attribute_is_built_once_across_threads() {
	let context = Arc::new(ServiceContext::new("cache"));
	let config = Arc::new(DeploymentConfig::new(context.clone()));
	let calls = Arc::new(AtomicUsize::new(0));

	let workers: Vec<_> = (0..6)
		.map(|_| {
			let config = config.clone();
			let calls = calls.clone();
			thread::spawn(move || {
				config.attributes().get_or_insert_with(|| {
					let built = calls.fetch_add(1, Ordering::SeqCst);
					assert_eq!(built, 0, "cache built twice");
					thread::sleep(Duration::from_millis(5));
					SharedCache { built: built + 1 }
				})
			})
		})
		.collect();

	for worker in workers {
		assert_eq!(worker.join().unwrap().built, 1);
	}
	assert_eq!(context.get_attribute::<SharedCache>().unwrap().built, 1);
}

#[test]
fn failed_action_leaves_lock_free_and_context_restored() {
	let store = SessionStore::new(Arc::new(ServiceContext::new("errors")));
	let session = store.create();
	let outer = Arc::new(ServiceContext::new("outer"));
	let _scope = CurrentScope::enter(CurrentInstances {
		session: None,
		context: Some(outer.clone()),
	});

	let result: Result<(), RequestError> = session.try_run_with_lock(|guard| {
		assert!(Arc::ptr_eq(&current_context().unwrap(), store.context()));
		guard.next_ui_id();
		Err(RequestError::Validation("quantity must be positive"))
	});
	assert!(matches!(result, Err(RequestError::Validation(reason)) if reason == "quantity must be positive"));
	assert!(!session.is_locked());

	assert!(Arc::ptr_eq(&current_context().unwrap(), &outer));
	assert!(current_session().is_none());

	let other = session.clone();
	let acquired = thread::spawn(move || other.try_lock_for(Duration::from_millis(200)).map(|guard| guard.next_ui_id()))
		.join()
		.unwrap();
	assert_eq!(acquired.unwrap(), 1);
}

#[test]
fn nested_request_on_other_session_is_rejected() {
	let store = SessionStore::new(Arc::new(ServiceContext::new("nested")));
	let outer = store.create();
	let inner = store.create();

	let result: Result<(), RequestError> = outer.try_run_with_lock(|_| {
		inner.try_run_with_lock(|_| Err(RequestError::Validation("never runs")))
	});

	match result {
		Err(RequestError::Session(err)) => assert!(matches!(err, Error::OtherSessionLocked)),
		other => panic!("expected a session error, got {other:?}"),
	}
	assert!(!outer.is_locked());
	assert!(!inner.is_locked());
}
