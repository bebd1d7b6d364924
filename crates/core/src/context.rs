//! Service context and the deployment configuration derived from it.

use std::any::Any;
use std::collections::HashMap;
use std::sync::Arc;

use tracing::debug;

use crate::attributes::AttributeStore;
use crate::env;
use crate::error::{Error, Result};

/// Application-wide context shared by all sessions of one service.
#[derive(Debug)]
pub struct ServiceContext {
	name: String,
	attributes: AttributeStore,
}

impl ServiceContext {
	pub fn new(name: impl Into<String>) -> Self {
		Self {
			name: name.into(),
			attributes: AttributeStore::new(),
		}
	}

	pub fn name(&self) -> &str {
		&self.name
	}

	pub fn attributes(&self) -> &AttributeStore {
		&self.attributes
	}

	pub fn get_attribute<T: Any + Send + Sync>(&self) -> Option<Arc<T>> {
		self.attributes.get::<T>()
	}

	/// Returns the stored value, computing it once on first miss.
	pub fn get_attribute_or_insert_with<T, F>(&self, supplier: F) -> Arc<T>
	where
		T: Any + Send + Sync,
		F: FnOnce() -> T,
	{
		self.attributes.get_or_insert_with(supplier)
	}

	pub fn set_attribute<T: Any + Send + Sync>(&self, value: T) -> Option<Arc<T>> {
		self.attributes.set(value)
	}

	pub fn remove_attribute<T: Any + Send + Sync>(&self) -> Option<Arc<T>> {
		self.attributes.remove::<T>()
	}
}

/// Property names understood by [`DeploymentConfig`].
pub mod properties {
	pub const PRODUCTION_MODE: &str = "productionMode";
	pub const ENABLE_DEV_SERVER: &str = "enableDevServer";
	pub const REUSE_DEV_SERVER: &str = "reuseDevServer";
	pub const USAGE_STATISTICS: &str = "usageStatistics";
	pub const HEARTBEAT_INTERVAL: &str = "heartbeatInterval";
}

/// String properties with typed getters, bound to a service context.
///
/// Attributes set through the configuration land in the context's store, so
/// both see the same values.
#[derive(Debug, Clone)]
pub struct DeploymentConfig {
	context: Arc<ServiceContext>,
	properties: HashMap<String, String>,
}

impl DeploymentConfig {
	pub fn new(context: Arc<ServiceContext>) -> Self {
		Self {
			context,
			properties: HashMap::new(),
		}
	}

	pub fn with_properties<I, K, V>(context: Arc<ServiceContext>, properties: I) -> Self
	where
		I: IntoIterator<Item = (K, V)>,
		K: Into<String>,
		V: Into<String>,
	{
		Self {
			context,
			properties: properties
				.into_iter()
				.map(|(k, v)| (k.into(), v.into()))
				.collect(),
		}
	}

	pub fn context(&self) -> &Arc<ServiceContext> {
		&self.context
	}

	/// The context's attribute store.
	pub fn attributes(&self) -> &AttributeStore {
		self.context.attributes()
	}

	pub fn set_property(&mut self, name: impl Into<String>, value: impl Into<String>) {
		self.properties.insert(name.into(), value.into());
	}

	pub fn get_string(&self, name: &str) -> Option<&str> {
		self.properties.get(name).map(String::as_str)
	}

	/// Reads a boolean property. An empty value means `true`.
	///
	/// # Errors
	///
	/// `Error::InvalidProperty` for anything other than `true`, `false` or
	/// empty, compared case-insensitively.
	pub fn get_bool(&self, name: &str, default: bool) -> Result<bool> {
		let Some(value) = self.get_string(name) else {
			return Ok(default);
		};
		let trimmed = value.trim();
		if trimmed.is_empty() || trimmed.eq_ignore_ascii_case("true") {
			Ok(true)
		} else if trimmed.eq_ignore_ascii_case("false") {
			Ok(false)
		} else {
			Err(Error::InvalidProperty {
				name: name.to_string(),
				value: value.to_string(),
				expected: "true or false",
			})
		}
	}

	pub fn get_u64(&self, name: &str, default: u64) -> Result<u64> {
		let Some(value) = self.get_string(name) else {
			return Ok(default);
		};
		value.trim().parse().map_err(|_| Error::InvalidProperty {
			name: name.to_string(),
			value: value.to_string(),
			expected: "a non-negative integer",
		})
	}

	pub fn is_production_mode(&self) -> Result<bool> {
		self.get_bool(properties::PRODUCTION_MODE, false)
	}

	pub fn enable_dev_server(&self) -> Result<bool> {
		self.get_bool(properties::ENABLE_DEV_SERVER, true)
	}

	pub fn reuse_dev_server(&self) -> Result<bool> {
		self.get_bool(properties::REUSE_DEV_SERVER, true)
	}

	/// Heartbeat interval in seconds.
	pub fn heartbeat_interval(&self) -> Result<u64> {
		self.get_u64(properties::HEARTBEAT_INTERVAL, 300)
	}

	/// Usage statistics are collected in development mode unless disabled by
	/// property, or by the environment when the property is unset.
	pub fn usage_statistics_enabled(&self) -> Result<bool> {
		if self.is_production_mode()? {
			return Ok(false);
		}
		let default = env::usage_statistics_default();
		let enabled = self.get_bool(properties::USAGE_STATISTICS, default)?;
		debug!(target = "flowdev.config", enabled, "usage statistics");
		Ok(enabled)
	}
}
