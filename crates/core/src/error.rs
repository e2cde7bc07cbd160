// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (c) 2025 ReifyDB

use crate::params::DataType;

pub type Result<T> = std::result::Result<T, Error>;

/// Gateway error taxonomy. Mapping to RPC status codes happens once, at the
/// service boundary; everything below it works in these terms.
#[derive(Debug, thiserror::Error)]
pub enum Error {
	/// No live engine session at the time of use. The background loop
	/// keeps reconnecting; the next call may succeed.
	#[error("no live engine connection available")]
	ConnectionUnavailable,

	/// Script evaluation raised a fault or returned zero rows. Carries
	/// the engine's own diagnostic text when it could be obtained.
	#[error("Rserve error: {message}")]
	EngineScript {
		message: String,
		traceback: Option<String>,
	},

	/// The engine result violates the table contract: unequal column
	/// lengths, an unsupported vector kind, or a short input row.
	#[error("schema error: {message}")]
	Schema { message: String },

	/// A function's result did not match its declared return type.
	#[error("function {function} declared {expected} but returned {actual}")]
	TypeMismatch {
		function: String,
		expected: DataType,
		actual: DataType,
	},

	/// Function id not present in the registry.
	#[error("function id {id} is not defined")]
	UnknownFunction { id: i32 },

	/// The per-call side channel could not be interpreted.
	#[error("malformed request header: {message}")]
	Header { message: String },

	/// Transport-level failure talking QAP1 to the engine.
	#[error("engine transport error: {message}")]
	Transport { message: String },

	/// Function catalog failed validation at load time.
	#[error("function catalog error: {message}")]
	Catalog { message: String },
}

impl Error {
	pub fn schema(message: impl Into<String>) -> Self {
		Error::Schema {
			message: message.into(),
		}
	}

	pub fn header(message: impl Into<String>) -> Self {
		Error::Header {
			message: message.into(),
		}
	}

	pub fn transport(message: impl Into<String>) -> Self {
		Error::Transport {
			message: message.into(),
		}
	}
}
