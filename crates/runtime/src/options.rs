//! Connection configuration.

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Environment variable read by [`ConnectionOptions::from_env`].
pub const SLOW_MO_ENV: &str = "CDP_MUX_SLOW_MO_MS";

/// Options for a [`Connection`](crate::Connection).
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ConnectionOptions {
	/// Fixed delay applied before each inbound message is routed.
	///
	/// Zero disables the delay.
	#[serde(with = "millis")]
	pub slow_mo: Duration,
}

impl ConnectionOptions {
	/// Creates new default options.
	pub fn new() -> Self {
		Self::default()
	}

	/// Sets the inbound delay.
	pub fn slow_mo(mut self, delay: Duration) -> Self {
		self.slow_mo = delay;
		self
	}

	/// Default options overridden by environment variables.
	///
	/// Unparseable values are ignored with a warning.
	pub fn from_env() -> Self {
		let mut options = Self::default();
		if let Ok(raw) = std::env::var(SLOW_MO_ENV) {
			match raw.trim().parse::<u64>() {
				Ok(ms) => options.slow_mo = Duration::from_millis(ms),
				Err(e) => tracing::warn!(var = SLOW_MO_ENV, value = %raw, error = %e, "Ignoring invalid value"),
			}
		}
		options
	}
}

mod millis {
	use std::time::Duration;

	use serde::ser::Error as _;
	use serde::{Deserialize, Deserializer, Serializer};

	pub fn serialize<S: Serializer>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
		let millis = u64::try_from(value.as_millis())
			.map_err(|_| S::Error::custom(format!("{value:?} does not fit in u64 milliseconds")))?;
		serializer.serialize_u64(millis)
	}

	pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
		u64::deserialize(deserializer).map(Duration::from_millis)
	}
}
