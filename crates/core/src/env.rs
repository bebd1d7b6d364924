//! Settings read from the process environment.

/// Environment variable controlling the usage statistics default.
pub const USAGE_STATISTICS_ENV: &str = "FLOWDEV_USAGE_STATISTICS";

/// Usage statistics are on unless explicitly turned off.
pub const DEFAULT_USAGE_STATISTICS: bool = true;

/// Interprets a boolean flag that stays on unless set to `false`
/// (any case). Unset, empty and unrecognised values keep it on.
pub fn fail_open_flag(value: Option<&str>) -> bool {
	match value {
		Some(value) => !value.eq_ignore_ascii_case("false"),
		None => DEFAULT_USAGE_STATISTICS,
	}
}

/// Usage statistics default from `FLOWDEV_USAGE_STATISTICS`.
pub fn usage_statistics_default() -> bool {
	fail_open_flag(std::env::var(USAGE_STATISTICS_ENV).ok().as_deref())
}
