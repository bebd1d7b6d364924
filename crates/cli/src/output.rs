//! Command result envelope and printing.

use std::io::{self, Write};

use clap::ValueEnum;
use serde::{Deserialize, Serialize};

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
	/// Human-readable text
	#[default]
	Text,
	/// Pretty JSON
	Json,
	/// Single-line JSON
	Ndjson,
}

/// Result envelope printed by every command.
#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CommandResult<T: Serialize> {
	pub ok: bool,
	pub command: String,
	#[serde(skip_serializing_if = "Option::is_none")]
	pub data: Option<T>,
	#[serde(skip_serializing_if = "Option::is_none")]
	pub error: Option<CommandError>,
	#[serde(skip_serializing_if = "Option::is_none")]
	pub duration_ms: Option<u64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CommandError {
	pub code: ErrorCode,
	pub message: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCode {
	DevServerFailed,
	NotResponding,
	InvalidInput,
	Internal,
}

impl std::fmt::Display for ErrorCode {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		let code = match self {
			ErrorCode::DevServerFailed => "DEV_SERVER_FAILED",
			ErrorCode::NotResponding => "NOT_RESPONDING",
			ErrorCode::InvalidInput => "INVALID_INPUT",
			ErrorCode::Internal => "INTERNAL",
		};
		f.write_str(code)
	}
}

pub struct ResultBuilder<T: Serialize> {
	command: String,
	data: Option<T>,
	error: Option<CommandError>,
	duration_ms: Option<u64>,
}

impl<T: Serialize> ResultBuilder<T> {
	pub fn new(command: impl Into<String>) -> Self {
		Self {
			command: command.into(),
			data: None,
			error: None,
			duration_ms: None,
		}
	}

	pub fn data(mut self, data: T) -> Self {
		self.data = Some(data);
		self
	}

	pub fn error(mut self, code: ErrorCode, message: impl Into<String>) -> Self {
		self.error = Some(CommandError {
			code,
			message: message.into(),
		});
		self
	}

	pub fn duration(mut self, elapsed: std::time::Duration) -> Self {
		self.duration_ms = Some(elapsed.as_millis() as u64);
		self
	}

	pub fn build(self) -> CommandResult<T> {
		CommandResult {
			ok: self.error.is_none(),
			command: self.command,
			data: self.data,
			error: self.error,
			duration_ms: self.duration_ms,
		}
	}
}

pub fn print_result<T: Serialize>(result: &CommandResult<T>, format: OutputFormat) {
	match format {
		OutputFormat::Json => {
			if let Ok(json) = serde_json::to_string_pretty(result) {
				println!("{json}");
			}
		}
		OutputFormat::Ndjson => {
			if let Ok(json) = serde_json::to_string(result) {
				println!("{json}");
			}
		}
		OutputFormat::Text => print_result_text(result),
	}
}

fn print_result_text<T: Serialize>(result: &CommandResult<T>) {
	let mut stdout = io::stdout().lock();

	if let Some(error) = &result.error {
		let _ = writeln!(stdout, "Error [{}]: {}", error.code, error.message);
		return;
	}

	if let Some(serde_json::Value::Object(fields)) = result.data.as_ref().and_then(|d| serde_json::to_value(d).ok()) {
		for (key, value) in fields {
			match value {
				serde_json::Value::String(s) => {
					let _ = writeln!(stdout, "{key}: {s}");
				}
				other => {
					let _ = writeln!(stdout, "{key}: {other}");
				}
			}
		}
	}
}

pub fn print_error_stderr(error: &CommandError) {
	eprintln!("Error [{}]: {}", error.code, error.message);
}

#[cfg(test)]
mod tests {
	use serde_json::json;

	use super::*;

	#[test]
	fn successful_result_has_no_error() {
		let result = ResultBuilder::new("probe").data(json!({ "port": 3000, "alive": true })).build();
		assert!(result.ok);

		let value = serde_json::to_value(&result).unwrap();
		assert_eq!(value["command"], "probe");
		assert_eq!(value["data"]["alive"], true);
		assert!(value.get("error").is_none());
	}

	#[test]
	fn failed_result_serializes_error_code() {
		let result: CommandResult<()> = ResultBuilder::new("dev")
			.error(ErrorCode::DevServerFailed, "exited prematurely")
			.build();
		assert!(!result.ok);

		let value = serde_json::to_value(&result).unwrap();
		assert_eq!(value["error"]["code"], "DEV_SERVER_FAILED");
		assert_eq!(ErrorCode::NotResponding.to_string(), "NOT_RESPONDING");
	}
}
