//! Sessions and the session lock.
//!
//! Each [`Session`] owns a reentrant lock. All session state sits behind that
//! lock and is only reachable through a [`SessionGuard`], so reading or
//! writing session attributes without holding the lock does not compile.
//! Dropping the last guard of the owning thread releases the lock and runs
//! any access tasks that were queued while it was held.

use std::any::Any;
use std::cell::{Cell, RefCell};
use std::collections::VecDeque;
use std::fmt;
use std::future::Future;
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::pin::Pin;
use std::sync::Arc;
use std::sync::atomic::{AtomicU32, Ordering};
use std::task::{Context, Poll};
use std::time::{Duration, Instant};

use parking_lot::{Mutex, ReentrantMutex, ReentrantMutexGuard};
use tokio::sync::oneshot;
use tracing::{debug, error, trace, warn};

use crate::attributes::AttributeMap;
use crate::context::ServiceContext;
use crate::current::{CurrentInstances, CurrentScope, current_session};
use crate::error::{Error, Result};

/// Lifecycle of a session. States only move forward.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SessionState {
	Open,
	/// Closing was requested; the session is torn down after the current
	/// request.
	Closing,
	Closed,
}

impl SessionState {
	pub fn is_valid_change(self, to: SessionState) -> bool {
		matches!(
			(self, to),
			(SessionState::Open, SessionState::Closing) | (SessionState::Closing, SessionState::Closed)
		)
	}
}

#[derive(Debug)]
struct SessionData {
	attributes: AttributeMap,
	state: SessionState,
	next_ui_id: u32,
	last_request_timestamp: Option<Instant>,
	last_request_duration: Option<Duration>,
	cumulative_request_duration: Duration,
}

impl Default for SessionData {
	fn default() -> Self {
		Self {
			attributes: AttributeMap::new(),
			state: SessionState::Open,
			next_ui_id: 0,
			last_request_timestamp: None,
			last_request_duration: None,
			cumulative_request_duration: Duration::ZERO,
		}
	}
}

struct SessionCell {
	/// Nesting depth of the owning thread's guards.
	depth: Cell<usize>,
	data: RefCell<SessionData>,
}

type AccessTask = Box<dyn FnOnce(&SessionGuard<'_>) + Send>;

/// Server-side state for one user.
pub struct Session {
	id: String,
	context: Option<Arc<ServiceContext>>,
	lock: ReentrantMutex<SessionCell>,
	pending: Mutex<VecDeque<AccessTask>>,
	close_count: AtomicU32,
}

impl fmt::Debug for Session {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.debug_struct("Session")
			.field("id", &self.id)
			.field("locked", &self.lock.is_locked())
			.field("pending", &self.pending.lock().len())
			.finish_non_exhaustive()
	}
}

impl Session {
	/// A detached session, not bound to any service context.
	pub fn new(id: impl Into<String>) -> Self {
		Self::build(id.into(), None)
	}

	pub fn with_context(id: impl Into<String>, context: Arc<ServiceContext>) -> Self {
		Self::build(id.into(), Some(context))
	}

	fn build(id: String, context: Option<Arc<ServiceContext>>) -> Self {
		Self {
			id,
			context,
			lock: ReentrantMutex::new(SessionCell {
				depth: Cell::new(0),
				data: RefCell::new(SessionData::default()),
			}),
			pending: Mutex::new(VecDeque::new()),
			close_count: AtomicU32::new(0),
		}
	}

	pub fn id(&self) -> &str {
		&self.id
	}

	pub fn context(&self) -> Option<&Arc<ServiceContext>> {
		self.context.as_ref()
	}

	/// Acquires the session lock, blocking until it is available.
	/// Reentrant: the owning thread may lock again.
	pub fn lock(&self) -> SessionGuard<'_> {
		SessionGuard::new(self, self.lock.lock())
	}

	pub fn try_lock(&self) -> Option<SessionGuard<'_>> {
		self.lock.try_lock().map(|guard| SessionGuard::new(self, guard))
	}

	/// Acquires the lock, giving up after `timeout`.
	pub fn try_lock_for(&self, timeout: Duration) -> Result<SessionGuard<'_>> {
		self.lock
			.try_lock_for(timeout)
			.map(|guard| SessionGuard::new(self, guard))
			.ok_or(Error::LockTimeout(timeout))
	}

	/// Whether the calling thread holds the lock.
	pub fn has_lock(&self) -> bool {
		self.lock.is_owned_by_current_thread()
	}

	/// Whether any thread holds the lock.
	pub fn is_locked(&self) -> bool {
		self.lock.is_locked()
	}

	/// Number of times `close` was requested.
	pub fn close_count(&self) -> u32 {
		self.close_count.load(Ordering::SeqCst)
	}

	/// Runs `action` with this session current and locked.
	///
	/// The lock is released and the previous current instances are restored
	/// however `action` exits, including by panic.
	///
	/// # Errors
	///
	/// `Error::OtherSessionLocked` if the calling thread holds the lock of a
	/// different current session.
	pub fn run_with_lock<R>(self: &Arc<Self>, action: impl FnOnce(&SessionGuard<'_>) -> R) -> Result<R> {
		self.verify_no_other_session_locked()?;
		// Declared before the guard so the lock is released before the
		// previous instances come back.
		let _scope = CurrentScope::enter(CurrentInstances::for_session(self));
		let guard = self.lock();
		Ok(action(&guard))
	}

	/// [`run_with_lock`](Self::run_with_lock) for fallible actions.
	pub fn try_run_with_lock<R, E>(
		self: &Arc<Self>,
		action: impl FnOnce(&SessionGuard<'_>) -> std::result::Result<R, E>,
	) -> std::result::Result<R, E>
	where
		E: From<Error>,
	{
		self.run_with_lock(action)?
	}

	fn verify_no_other_session_locked(self: &Arc<Self>) -> Result<()> {
		match current_session() {
			Some(current) if !Arc::ptr_eq(&current, self) && current.has_lock() => {
				warn!(
					target = "flowdev.session",
					current = %current.id,
					requested = %self.id,
					"another session is locked by this thread"
				);
				Err(Error::OtherSessionLocked)
			}
			_ => Ok(()),
		}
	}

	/// Queues `task` to run while holding the session lock.
	///
	/// The task runs right away if the lock is free, otherwise when its
	/// current holder releases it for the last time. The returned handle
	/// resolves to the task's result.
	pub fn access<R, F>(&self, task: F) -> AccessHandle<R>
	where
		R: Send + 'static,
		F: FnOnce(&SessionGuard<'_>) -> R + Send + 'static,
	{
		let (tx, rx) = oneshot::channel();
		self.pending.lock().push_back(Box::new(move |guard| {
			let _ = tx.send(task(guard));
		}));
		trace!(target = "flowdev.session", session = %self.id, "queued access task");

		// Dropping the guard runs the queue if this was the outermost lock.
		drop(self.try_lock());

		AccessHandle { rx }
	}

	pub fn pending_access_count(&self) -> usize {
		self.pending.lock().len()
	}

	fn run_pending_access(&self) {
		loop {
			let Some(task) = self.pending.lock().pop_front() else {
				break;
			};
			let guard = self.lock();
			if catch_unwind(AssertUnwindSafe(|| task(&guard))).is_err() {
				error!(target = "flowdev.session", session = %self.id, "session access task panicked");
			}
		}
	}
}

/// Proof that the calling thread holds a session's lock.
///
/// All session state is accessed through the guard. Guards nest: the lock is
/// released when the outermost guard is dropped.
pub struct SessionGuard<'a> {
	session: &'a Session,
	guard: Option<ReentrantMutexGuard<'a, SessionCell>>,
}

impl fmt::Debug for SessionGuard<'_> {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.debug_struct("SessionGuard")
			.field("session", &self.session.id)
			.field("depth", &self.cell().depth.get())
			.finish()
	}
}

impl<'a> SessionGuard<'a> {
	fn new(session: &'a Session, guard: ReentrantMutexGuard<'a, SessionCell>) -> Self {
		guard.depth.set(guard.depth.get() + 1);
		Self {
			session,
			guard: Some(guard),
		}
	}

	fn cell(&self) -> &SessionCell {
		match &self.guard {
			Some(guard) => &**guard,
			None => unreachable!("session guard used after release"),
		}
	}

	fn with_data<R>(&self, f: impl FnOnce(&mut SessionData) -> R) -> R {
		f(&mut self.cell().data.borrow_mut())
	}

	pub fn session(&self) -> &'a Session {
		self.session
	}

	/// Releases this guard now. Same as dropping it.
	pub fn unlock(self) {}

	pub fn get_attribute<T: Any + Send + Sync>(&self) -> Option<Arc<T>> {
		self.with_data(|data| data.attributes.get::<T>())
	}

	/// Stores `value` keyed by its type, returning the value it replaced.
	pub fn set_attribute<T: Any + Send + Sync>(&self, value: T) -> Option<Arc<T>> {
		self.with_data(|data| data.attributes.insert(value))
	}

	pub fn remove_attribute<T: Any + Send + Sync>(&self) -> Option<Arc<T>> {
		self.with_data(|data| data.attributes.remove::<T>())
	}

	/// Returns the stored value, computing and storing it on first miss.
	///
	/// The supplier runs while the session lock is held but without any
	/// borrow of the session state, so it may itself use this guard. If it
	/// stores a value of the same type, that value wins.
	pub fn get_attribute_or_insert_with<T, F>(&self, supplier: F) -> Arc<T>
	where
		T: Any + Send + Sync,
		F: FnOnce() -> T,
	{
		if let Some(existing) = self.get_attribute::<T>() {
			return existing;
		}
		let value = supplier();
		self.with_data(|data| data.attributes.get_or_insert_with(|| value))
	}

	pub fn get_attribute_or_try_insert_with<T, E, F>(&self, supplier: F) -> std::result::Result<Arc<T>, E>
	where
		T: Any + Send + Sync,
		F: FnOnce() -> std::result::Result<T, E>,
	{
		if let Some(existing) = self.get_attribute::<T>() {
			return Ok(existing);
		}
		let value = supplier()?;
		Ok(self.with_data(|data| data.attributes.get_or_insert_with(|| value)))
	}

	pub fn attribute_count(&self) -> usize {
		self.with_data(|data| data.attributes.len())
	}

	pub fn state(&self) -> SessionState {
		self.with_data(|data| data.state)
	}

	/// Moves the session to `to`.
	///
	/// # Errors
	///
	/// `Error::InvalidStateTransition` unless the change is `Open -> Closing`
	/// or `Closing -> Closed`.
	pub fn set_state(&self, to: SessionState) -> Result<()> {
		self.with_data(|data| {
			let from = data.state;
			if !from.is_valid_change(to) {
				return Err(Error::InvalidStateTransition { from, to });
			}
			data.state = to;
			debug!(target = "flowdev.session", session = %self.session.id, ?from, ?to, "session state changed");
			Ok(())
		})
	}

	/// Requests closing the session. Repeated requests only bump the close
	/// counter.
	pub fn close(&self) {
		self.session.close_count.fetch_add(1, Ordering::SeqCst);
		self.with_data(|data| {
			if data.state == SessionState::Open {
				data.state = SessionState::Closing;
				debug!(target = "flowdev.session", session = %self.session.id, "session closing");
			}
		});
	}

	/// Returns the next UI id and advances the counter.
	pub fn next_ui_id(&self) -> u32 {
		self.with_data(|data| {
			let id = data.next_ui_id;
			data.next_ui_id += 1;
			id
		})
	}

	pub fn last_request_timestamp(&self) -> Option<Instant> {
		self.with_data(|data| data.last_request_timestamp)
	}

	pub fn set_last_request_timestamp(&self, at: Instant) {
		self.with_data(|data| data.last_request_timestamp = Some(at));
	}

	pub fn last_request_duration(&self) -> Option<Duration> {
		self.with_data(|data| data.last_request_duration)
	}

	/// Records how long the last request took and adds it to the total.
	pub fn set_last_request_duration(&self, duration: Duration) {
		self.with_data(|data| {
			data.last_request_duration = Some(duration);
			data.cumulative_request_duration += duration;
		});
	}

	pub fn cumulative_request_duration(&self) -> Duration {
		self.with_data(|data| data.cumulative_request_duration)
	}
}

impl Drop for SessionGuard<'_> {
	fn drop(&mut self) {
		let Some(guard) = self.guard.take() else {
			return;
		};

		let depth = guard.depth.get();
		let outermost = depth == 1;
		if outermost && self.session.pending_access_count() > 0 {
			self.session.run_pending_access();
		}
		guard.depth.set(depth - 1);
		drop(guard);

		// Tasks queued between draining and releasing would otherwise wait
		// for the next lock holder.
		if outermost && self.session.pending_access_count() > 0 {
			drop(self.session.try_lock());
		}
	}
}

/// Resolves to the result of a task queued with [`Session::access`].
#[must_use = "the access task runs regardless, but its result is only available through the handle"]
pub struct AccessHandle<R> {
	rx: oneshot::Receiver<R>,
}

impl<R> fmt::Debug for AccessHandle<R> {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.debug_struct("AccessHandle").finish_non_exhaustive()
	}
}

impl<R> AccessHandle<R> {
	/// Returns the result if the task already ran.
	pub fn try_result(&mut self) -> Option<Result<R>> {
		match self.rx.try_recv() {
			Ok(value) => Some(Ok(value)),
			Err(oneshot::error::TryRecvError::Empty) => None,
			Err(oneshot::error::TryRecvError::Closed) => Some(Err(Error::AccessCancelled)),
		}
	}

	/// Blocks the calling thread until the task ran. Must not be called from
	/// an async context.
	pub fn blocking_wait(self) -> Result<R> {
		self.rx.blocking_recv().map_err(|_| Error::AccessCancelled)
	}

	/// Waits at most `timeout` for the task to run.
	pub async fn wait_for(self, timeout: Duration) -> Result<R> {
		match tokio::time::timeout(timeout, self).await {
			Ok(result) => result,
			Err(_) => Err(Error::AccessTimeout(timeout)),
		}
	}
}

impl<R> Future for AccessHandle<R> {
	type Output = Result<R>;

	fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
		Pin::new(&mut self.rx).poll(cx).map(|result| result.map_err(|_| Error::AccessCancelled))
	}
}

#[cfg(test)]
mod tests {
	use std::sync::atomic::AtomicUsize;
	use std::sync::mpsc;
	use std::thread;

	use super::*;
	use crate::current::{current, current_context};

	#[derive(Debug, PartialEq)]
	struct Cart(Vec<&'static str>);

	#[derive(Debug, PartialEq)]
	struct Locale(&'static str);

	fn session(id: &str) -> Arc<Session> {
		Arc::new(Session::with_context(id, Arc::new(ServiceContext::new("test"))))
	}

	#[test]
	fn lock_is_reentrant() {
		let session = session("reentrant");
		let outer = session.lock();
		assert!(session.has_lock());
		{
			let inner = session.lock();
			inner.set_attribute(Locale("fi"));
		}
		assert!(session.has_lock());
		assert_eq!(*outer.get_attribute::<Locale>().unwrap(), Locale("fi"));
		drop(outer);
		assert!(!session.has_lock());
		assert!(!session.is_locked());
	}

	#[test]
	fn supplier_runs_only_on_first_miss() {
		let session = session("supplier");
		let calls = AtomicUsize::new(0);
		let guard = session.lock();

		let first = guard.get_attribute_or_insert_with(|| {
			if calls.fetch_add(1, Ordering::SeqCst) > 0 {
				panic!("supplier invoked twice");
			}
			Cart(vec!["apple"])
		});
		let second = guard.get_attribute_or_insert_with(|| -> Cart { panic!("different supplier must not run") });

		assert!(Arc::ptr_eq(&first, &second));
		assert_eq!(calls.load(Ordering::SeqCst), 1);
	}

	#[test]
	fn supplier_may_use_the_guard() {
		let session = session("nested-supplier");
		let guard = session.lock();
		let cart = guard.get_attribute_or_insert_with(|| {
			let locale = guard.get_attribute_or_insert_with(|| Locale("en"));
			Cart(vec![locale.0])
		});
		assert_eq!(*cart, Cart(vec!["en"]));
		assert_eq!(guard.attribute_count(), 2);
	}

	#[test]
	fn failed_supplier_leaves_attribute_unset() {
		let session = session("fallible");
		let guard = session.lock();
		let err = guard
			.get_attribute_or_try_insert_with::<Cart, _, _>(|| Err("no cart"))
			.unwrap_err();
		assert_eq!(err, "no cart");
		assert!(guard.get_attribute::<Cart>().is_none());
	}

	#[test]
	fn remove_attribute_clears_value() {
		let session = session("remove");
		let guard = session.lock();
		guard.set_attribute(Locale("de"));
		assert_eq!(*guard.remove_attribute::<Locale>().unwrap(), Locale("de"));
		assert!(guard.get_attribute::<Locale>().is_none());
		assert!(guard.remove_attribute::<Locale>().is_none());
	}

	#[test]
	fn run_with_lock_sets_and_restores_current_instances() {
		let session = session("current");
		let before = current();

		let seen = session
			.run_with_lock(|guard| {
				assert!(guard.session().has_lock());
				let current = current_session().unwrap();
				assert_eq!(current.id(), "current");
				current_context().unwrap().name().to_string()
			})
			.unwrap();

		assert_eq!(seen, "test");
		assert!(current().same_as(&before));
		assert!(!session.is_locked());
	}

	#[test]
	fn run_with_lock_releases_on_error() {
		let session = session("error");
		let outer = session.clone();
		let _scope = CurrentScope::enter(CurrentInstances {
			session: None,
			context: Some(Arc::new(ServiceContext::new("outer"))),
		});
		let before = current();

		let result: std::result::Result<(), Error> = session.try_run_with_lock(|guard| {
			guard.set_attribute(Locale("sv"));
			Err(Error::AccessCancelled)
		});

		assert!(matches!(result, Err(Error::AccessCancelled)));
		assert!(!outer.is_locked());
		assert!(current().same_as(&before));

		let other_thread = thread::spawn(move || outer.try_lock_for(Duration::from_millis(100)).is_ok());
		assert!(other_thread.join().unwrap());
	}

	#[test]
	fn run_with_lock_releases_on_panic() {
		let session = session("panic");
		let before = current();

		let result = catch_unwind(AssertUnwindSafe(|| -> Result<()> {
			session.run_with_lock(|guard| {
				guard.set_attribute(Locale("it"));
				panic!("action failed")
			})
		}));

		assert!(result.is_err());
		assert!(!session.is_locked());
		assert!(current().same_as(&before));
		assert!(current_session().is_none());
	}

	#[test]
	fn locking_another_session_while_holding_one_fails() {
		let first = session("first");
		let second = session("second");

		let result = first.run_with_lock(|_| second.run_with_lock(|_| ())).unwrap();
		assert!(matches!(result, Err(Error::OtherSessionLocked)));
		assert!(!second.is_locked());

		let reentered = first.run_with_lock(|_| first.run_with_lock(|_| 42)).unwrap();
		assert_eq!(reentered.unwrap(), 42);
	}

	#[test]
	fn try_lock_for_times_out_while_held_elsewhere() {
		let session = session("contended");
		let (locked_tx, locked_rx) = mpsc::channel();
		let (release_tx, release_rx) = mpsc::channel::<()>();

		let holder = {
			let session = session.clone();
			thread::spawn(move || {
				let _guard = session.lock();
				locked_tx.send(()).unwrap();
				release_rx.recv().unwrap();
			})
		};

		locked_rx.recv().unwrap();
		assert!(!session.has_lock());
		let err = session.try_lock_for(Duration::from_millis(50)).unwrap_err();
		assert!(matches!(err, Error::LockTimeout(_)));

		release_tx.send(()).unwrap();
		holder.join().unwrap();
		assert!(session.try_lock_for(Duration::from_secs(1)).is_ok());
	}

	#[test]
	fn updates_are_visible_to_later_holders() {
		let session = session("visibility");
		let writers: Vec<_> = (0..4)
			.map(|i| {
				let session = session.clone();
				thread::spawn(move || {
					for _ in 0..100 {
						session
							.run_with_lock(|guard| {
								let ui = guard.next_ui_id();
								guard.set_attribute(Locale(if i % 2 == 0 { "even" } else { "odd" }));
								ui
							})
							.unwrap();
					}
				})
			})
			.collect();
		for writer in writers {
			writer.join().unwrap();
		}

		let guard = session.lock();
		assert_eq!(guard.next_ui_id(), 400);
		assert!(guard.get_attribute::<Locale>().is_some());
	}

	#[test]
	fn access_runs_immediately_when_unlocked() {
		let session = session("access-now");
		let mut handle = session.access(|guard| {
			guard.set_attribute(Locale("nl"));
			7
		});
		assert_eq!(handle.try_result().unwrap().unwrap(), 7);
		assert_eq!(*session.lock().get_attribute::<Locale>().unwrap(), Locale("nl"));
	}

	#[test]
	fn access_waits_for_final_unlock() {
		let session = session("access-later");
		let outer = session.lock();
		let inner = session.lock();

		let mut handle = session.access(|guard| guard.get_attribute::<Locale>().map(|l| l.0));
		assert!(handle.try_result().is_none());
		assert_eq!(session.pending_access_count(), 1);

		outer.set_attribute(Locale("pl"));
		drop(inner);
		assert!(handle.try_result().is_none());

		drop(outer);
		assert_eq!(handle.try_result().unwrap().unwrap(), Some("pl"));
		assert_eq!(session.pending_access_count(), 0);
		assert!(!session.is_locked());
	}

	#[test]
	fn access_from_other_thread_runs_on_release() {
		let session = session("access-thread");
		let guard = session.lock();

		let queued = {
			let session = session.clone();
			thread::spawn(move || session.access(|guard| guard.next_ui_id())).join().unwrap()
		};
		assert_eq!(session.pending_access_count(), 1);
		assert_eq!(guard.next_ui_id(), 0);
		drop(guard);

		assert_eq!(queued.blocking_wait().unwrap(), 1);
	}

	#[test]
	fn panicking_access_task_does_not_poison_the_session() {
		let session = session("access-panic");
		let guard = session.lock();
		let failed = session.access(|_| -> u32 { panic!("task failed") });
		let ok = session.access(|guard| guard.next_ui_id());
		drop(guard);

		assert!(matches!(failed.blocking_wait(), Err(Error::AccessCancelled)));
		assert_eq!(ok.blocking_wait().unwrap(), 0);
		assert!(!session.is_locked());
	}

	#[tokio::test]
	async fn access_handle_is_awaitable() {
		let session = session("access-async");
		let value = session.access(|guard| guard.next_ui_id()).await.unwrap();
		assert_eq!(value, 0);

		let guard_session = session.clone();
		let (locked_tx, locked_rx) = mpsc::channel();
		let (release_tx, release_rx) = mpsc::channel::<()>();
		let holder = thread::spawn(move || {
			let _guard = guard_session.lock();
			locked_tx.send(()).unwrap();
			release_rx.recv().unwrap();
		});
		locked_rx.recv().unwrap();

		let handle = session.access(|guard| guard.next_ui_id());
		let err = session
			.access(|guard| guard.next_ui_id())
			.wait_for(Duration::from_millis(20))
			.await
			.unwrap_err();
		assert!(matches!(err, Error::AccessTimeout(_)));

		release_tx.send(()).unwrap();
		holder.join().unwrap();
		assert_eq!(handle.await.unwrap(), 1);
	}

	#[test]
	fn state_changes_only_move_forward() {
		let session = session("lifecycle");
		let guard = session.lock();
		assert_eq!(guard.state(), SessionState::Open);

		let err = guard.set_state(SessionState::Closed).unwrap_err();
		assert!(matches!(
			err,
			Error::InvalidStateTransition {
				from: SessionState::Open,
				to: SessionState::Closed
			}
		));

		guard.close();
		guard.close();
		assert_eq!(guard.state(), SessionState::Closing);
		assert_eq!(session.close_count(), 2);

		guard.set_state(SessionState::Closed).unwrap();
		assert!(guard.set_state(SessionState::Open).is_err());
	}

	#[test]
	fn request_timing_accumulates() {
		let session = session("timing");
		let guard = session.lock();
		let now = Instant::now();
		guard.set_last_request_timestamp(now);
		guard.set_last_request_duration(Duration::from_millis(30));
		guard.set_last_request_duration(Duration::from_millis(20));

		assert_eq!(guard.last_request_timestamp(), Some(now));
		assert_eq!(guard.last_request_duration(), Some(Duration::from_millis(20)));
		assert_eq!(guard.cumulative_request_duration(), Duration::from_millis(50));
	}
}
