// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (c) 2025 ReifyDB

use std::fmt::{self, Display, Formatter};

use crate::error::Error;

/// Wire-level declared type of a parameter or result column.
///
/// `Dual` cells carry both a numeric and a string slot on the wire. R has no
/// native dual type, so Dual parameters are always materialized as numeric
/// columns before being handed to the engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DataType {
	Numeric,
	String,
	Dual,
}

impl DataType {
	/// The type a column of this declared type is materialized as on the
	/// engine side.
	pub fn materialized(self) -> DataType {
		match self {
			DataType::String => DataType::String,
			DataType::Numeric | DataType::Dual => DataType::Numeric,
		}
	}
}

impl Display for DataType {
	fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
		match self {
			DataType::Numeric => f.write_str("numeric"),
			DataType::String => f.write_str("string"),
			DataType::Dual => f.write_str("dual"),
		}
	}
}

impl TryFrom<i32> for DataType {
	type Error = Error;

	fn try_from(value: i32) -> Result<Self, Error> {
		match value {
			0 => Ok(DataType::Numeric),
			1 => Ok(DataType::String),
			2 => Ok(DataType::Dual),
			_ => Err(Error::Catalog {
				message: format!("unknown data type {value}"),
			}),
		}
	}
}

/// One declared input column: name plus wire-level type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParameterField {
	pub name: String,
	pub data_type: DataType,
}

impl ParameterField {
	pub fn new(name: impl Into<String>, data_type: DataType) -> Self {
		Self {
			name: name.into(),
			data_type,
		}
	}
}

/// Ordered schema of a call's input columns. Column order in every inbound
/// row bundle must match this order exactly.
pub type ParameterSpec = Vec<ParameterField>;

/// How the engine is reached: an already-running remote endpoint, or a local
/// child process the gateway starts and supervises itself.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Target {
	Remote { host: String },
	LocalProcess { path: String },
}

impl Target {
	/// Host the QAP1 connection is made to. Local processes are always
	/// reached over loopback.
	pub fn host(&self) -> &str {
		match self {
			Target::Remote { host } => host,
			Target::LocalProcess { .. } => "127.0.0.1",
		}
	}
}

/// Resolved description of one engine target. Identity is the full tuple:
/// two parameter sets that differ in any field address distinct pool
/// entries. Immutable after construction.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ConnectionParameters {
	pub target: Target,
	pub port: u16,
	pub user: Option<String>,
	pub password: Option<String>,
	pub init_script: Option<String>,
	pub process_args: Vec<String>,
}

impl ConnectionParameters {
	pub fn remote(host: impl Into<String>, port: u16) -> Self {
		Self {
			target: Target::Remote { host: host.into() },
			port,
			user: None,
			password: None,
			init_script: None,
			process_args: Vec::new(),
		}
	}

	pub fn local_process(path: impl Into<String>, port: u16) -> Self {
		Self {
			target: Target::LocalProcess { path: path.into() },
			port,
			user: None,
			password: None,
			init_script: None,
			process_args: Vec::new(),
		}
	}

	pub fn with_credentials(mut self, user: impl Into<String>, password: impl Into<String>) -> Self {
		self.user = Some(user.into());
		self.password = Some(password.into());
		self
	}

	pub fn with_init_script(mut self, script: impl Into<String>) -> Self {
		self.init_script = Some(script.into());
		self
	}
}

impl Display for ConnectionParameters {
	fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
		match &self.target {
			Target::Remote { host } => write!(f, "rserve://{}:{}", host, self.port),
			Target::LocalProcess { path } => write!(f, "file://{} (port {})", path, self.port),
		}
	}
}
