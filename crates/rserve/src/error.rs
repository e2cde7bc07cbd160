// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (c) 2025 ReifyDB

/// Error status names as defined by the QAP1 protocol. Anything not listed
/// here is reported by its numeric code.
fn status_name(status: u32) -> &'static str {
	match status {
		0x41 => "auth failed",
		0x42 => "connection broken",
		0x43 => "invalid command",
		0x44 => "invalid parameter",
		0x45 => "R parse error",
		0x46 => "R evaluation error",
		0x47 => "io error",
		0x48 => "read error",
		0x49 => "write error",
		0x4a => "object too big",
		0x4b => "out of memory",
		0x4c => "control command disabled",
		0x4d => "session busy",
		0x4e => "detach failed",
		0x4f => "feature disabled",
		0x50 => "unavailable",
		0x51 => "access denied",
		_ => "unknown status",
	}
}

#[derive(Debug, thiserror::Error)]
pub enum RserveError {
	#[error("io error: {0}")]
	Io(#[from] std::io::Error),

	/// The peer sent bytes this client cannot interpret as QAP1.
	#[error("protocol error: {0}")]
	Protocol(String),

	/// The server answered with an error status. Evaluation faults
	/// (parse/eval errors) arrive this way.
	#[error("command failed: {} (status 0x{status:x})", status_name(*.status))]
	CommandFailed { status: u32 },

	#[error("authentication rejected by server")]
	AuthenticationFailed,

	/// The connection is known to be dead (EOF observed or an earlier
	/// exchange failed mid-message).
	#[error("connection to Rserve is broken")]
	Disconnected,
}

impl RserveError {
	/// Whether this failure came from the R side of the wire (the script
	/// is at fault) rather than from transport plumbing.
	pub fn is_evaluation_fault(&self) -> bool {
		matches!(self, RserveError::CommandFailed { .. })
	}

	pub fn protocol(message: impl Into<String>) -> Self {
		RserveError::Protocol(message.into())
	}
}
