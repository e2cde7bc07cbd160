// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (c) 2025 ReifyDB

//! Runs one script evaluation against a pooled session.
//!
//! The session's lock is held for the whole bind + eval sequence; the
//! backend is single-threaded per session and not reentrant. Failure
//! diagnostics (`geterrmessage()`, `traceback()`) are fetched best-effort
//! under the same lock; a failing diagnostic call never masks the primary
//! error.

use rbridge_core::{DATASET_VARIABLE, EngineValue, Error, InputDataset, Result};
use rbridge_rserve::EngineSession;
use tracing::{debug, warn};

use crate::pool::PoolEntry;

/// Evaluate `script` with `dataset` bound as the well-known variable.
///
/// Fails with [`Error::ConnectionUnavailable`] when the entry has no live
/// session; the background loop keeps reconnecting, this call never does.
/// A `NULL` result or a bare vector with zero rows is a distinguished
/// failure, not a success: it usually means the script ran but produced
/// nothing useful, and the engine's last error text is the interesting
/// part.
pub async fn execute<S: EngineSession>(
	entry: &PoolEntry<S>,
	dataset: &InputDataset,
	script: &str,
) -> Result<EngineValue> {
	let handle = entry.session().ok_or(Error::ConnectionUnavailable)?;
	let mut session = handle.lock().await;

	if !dataset.is_empty() {
		if let Err(err) = session.assign(DATASET_VARIABLE, dataset).await {
			return Err(script_error(&mut *session, &err.to_string()).await);
		}
	}

	let result = match session.eval(script).await {
		Ok(result) => result,
		Err(err) => {
			return Err(script_error(&mut *session, &err.to_string()).await);
		}
	};

	match &result {
		EngineValue::Null => Err(empty_result_error(&mut *session).await),
		EngineValue::Bool(_) | EngineValue::Int(_) | EngineValue::Double(_) | EngineValue::Strings(_)
			if result.is_empty() =>
		{
			Err(empty_result_error(&mut *session).await)
		}
		_ => Ok(result),
	}
}

/// Build the error for a failed evaluation: prefer the engine's own
/// message, fall back to the transport error text.
async fn script_error<S: EngineSession>(session: &mut S, fallback: &str) -> Error {
	let (message, traceback) = engine_diagnostics(session).await;
	let message = message.unwrap_or_else(|| fallback.to_string());
	warn!("Rserve error: {message}");
	if let Some(traceback) = &traceback {
		warn!("Rserve traceback: {traceback}");
	}
	Error::EngineScript { message, traceback }
}

async fn empty_result_error<S: EngineSession>(session: &mut S) -> Error {
	let (engine_message, traceback) = engine_diagnostics(session).await;
	let mut message = "No data returned from R script execution. Possible error in script: ".to_string();
	if let Some(engine_message) = engine_message {
		message.push_str(&engine_message);
	}
	warn!("{message}");
	Error::EngineScript { message, traceback }
}

/// Fetch `geterrmessage()` and `traceback()` from the session. Either call
/// can itself fail (for instance on a broken connection); those failures
/// are logged and reported as absence.
async fn engine_diagnostics<S: EngineSession>(session: &mut S) -> (Option<String>, Option<String>) {
	let message = match session.eval("geterrmessage()").await {
		Ok(value) => value
			.as_string()
			.map(|s| s.trim_end().to_string())
			.filter(|s| !s.is_empty()),
		Err(err) => {
			debug!("could not fetch geterrmessage(): {err}");
			None
		}
	};

	// geterrmessage() succeeding does not imply traceback() will.
	let traceback = match session.eval("traceback()").await {
		Ok(value) => {
			let lines = value.as_strings();
			if lines.is_empty() {
				None
			} else {
				Some(lines.join("\n"))
			}
		}
		Err(err) => {
			debug!("could not fetch traceback(): {err}");
			None
		}
	};

	(message, traceback)
}
