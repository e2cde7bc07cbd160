// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (c) 2025 ReifyDB

use std::future::Future;

use rbridge_core::{ConnectionParameters, EngineValue, InputDataset};

use crate::error::RserveError;

/// One authenticated, stateful engine connection.
///
/// Sessions are not reentrant: the caller must serialize access (the
/// gateway does this with a per-session lock). All methods take `&mut self`
/// to make that explicit in the type.
pub trait EngineSession: Send + 'static {
	/// Evaluate a script and decode its result.
	fn eval(&mut self, script: &str) -> impl Future<Output = Result<EngineValue, RserveError>> + Send;

	/// Bind a columnar dataset to a variable in the session, as a
	/// data.frame.
	fn assign(
		&mut self,
		name: &str,
		dataset: &InputDataset,
	) -> impl Future<Output = Result<(), RserveError>> + Send;

	/// Cheap liveness probe. Must not consume protocol data and must
	/// report `false` once any exchange has failed mid-message.
	fn is_alive(&mut self) -> impl Future<Output = bool> + Send;
}

/// Connection factory the gateway's pool is generic over.
pub trait EngineConnector: Send + Sync + 'static {
	type Session: EngineSession;

	fn connect(
		&self,
		params: &ConnectionParameters,
	) -> impl Future<Output = Result<Self::Session, RserveError>> + Send;
}
