//! Typed attribute storage.
//!
//! Attributes are keyed by their Rust type: each map holds at most one value
//! of a given type, shared as an `Arc`. "No value" is the absence of the key;
//! there is no way to store a null.

use std::any::{Any, TypeId};
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use parking_lot::Mutex;

type AnyValue = Arc<dyn Any + Send + Sync>;

/// Unsynchronized attribute map. Sessions keep one of these behind their lock.
#[derive(Default, Clone)]
pub struct AttributeMap {
	values: HashMap<TypeId, AnyValue>,
}

impl fmt::Debug for AttributeMap {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.debug_struct("AttributeMap").field("len", &self.values.len()).finish()
	}
}

fn downcast<T: Any + Send + Sync>(value: &AnyValue) -> Option<Arc<T>> {
	Arc::clone(value).downcast::<T>().ok()
}

impl AttributeMap {
	pub fn new() -> Self {
		Self::default()
	}

	pub fn get<T: Any + Send + Sync>(&self) -> Option<Arc<T>> {
		self.values.get(&TypeId::of::<T>()).and_then(downcast)
	}

	pub fn contains<T: Any + Send + Sync>(&self) -> bool {
		self.values.contains_key(&TypeId::of::<T>())
	}

	/// Stores `value`, returning the value it replaced.
	pub fn insert<T: Any + Send + Sync>(&mut self, value: T) -> Option<Arc<T>> {
		self.insert_arc(Arc::new(value))
	}

	pub fn insert_arc<T: Any + Send + Sync>(&mut self, value: Arc<T>) -> Option<Arc<T>> {
		self.values
			.insert(TypeId::of::<T>(), value)
			.as_ref()
			.and_then(downcast)
	}

	pub fn remove<T: Any + Send + Sync>(&mut self) -> Option<Arc<T>> {
		self.values.remove(&TypeId::of::<T>()).as_ref().and_then(downcast)
	}

	/// Returns the stored value, computing and storing it on first miss.
	pub fn get_or_insert_with<T, F>(&mut self, supplier: F) -> Arc<T>
	where
		T: Any + Send + Sync,
		F: FnOnce() -> T,
	{
		if let Some(existing) = self.get::<T>() {
			return existing;
		}
		let value = Arc::new(supplier());
		self.values.insert(TypeId::of::<T>(), value.clone());
		value
	}

	/// Like [`get_or_insert_with`](Self::get_or_insert_with); a failed
	/// supplier stores nothing.
	pub fn get_or_try_insert_with<T, E, F>(&mut self, supplier: F) -> std::result::Result<Arc<T>, E>
	where
		T: Any + Send + Sync,
		F: FnOnce() -> std::result::Result<T, E>,
	{
		if let Some(existing) = self.get::<T>() {
			return Ok(existing);
		}
		let value = Arc::new(supplier()?);
		self.values.insert(TypeId::of::<T>(), value.clone());
		Ok(value)
	}

	pub fn len(&self) -> usize {
		self.values.len()
	}

	pub fn is_empty(&self) -> bool {
		self.values.is_empty()
	}

	pub fn clear(&mut self) {
		self.values.clear();
	}
}

/// Thread-safe attribute store shared by a service context and the
/// configuration derived from it.
///
/// `get_or_insert_with` runs its supplier while holding the store lock, so a
/// supplier runs at most once per type. Suppliers must not access the same
/// store.
#[derive(Default)]
pub struct AttributeStore {
	map: Mutex<AttributeMap>,
}

impl fmt::Debug for AttributeStore {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.debug_struct("AttributeStore").field("len", &self.map.lock().len()).finish()
	}
}

impl AttributeStore {
	pub fn new() -> Self {
		Self::default()
	}

	pub fn get<T: Any + Send + Sync>(&self) -> Option<Arc<T>> {
		self.map.lock().get::<T>()
	}

	pub fn set<T: Any + Send + Sync>(&self, value: T) -> Option<Arc<T>> {
		self.map.lock().insert(value)
	}

	pub fn set_arc<T: Any + Send + Sync>(&self, value: Arc<T>) -> Option<Arc<T>> {
		self.map.lock().insert_arc(value)
	}

	pub fn remove<T: Any + Send + Sync>(&self) -> Option<Arc<T>> {
		self.map.lock().remove::<T>()
	}

	pub fn get_or_insert_with<T, F>(&self, supplier: F) -> Arc<T>
	where
		T: Any + Send + Sync,
		F: FnOnce() -> T,
	{
		self.map.lock().get_or_insert_with(supplier)
	}

	pub fn get_or_try_insert_with<T, E, F>(&self, supplier: F) -> std::result::Result<Arc<T>, E>
	where
		T: Any + Send + Sync,
		F: FnOnce() -> std::result::Result<T, E>,
	{
		self.map.lock().get_or_try_insert_with(supplier)
	}

	pub fn len(&self) -> usize {
		self.map.lock().len()
	}

	pub fn is_empty(&self) -> bool {
		self.map.lock().is_empty()
	}
}
