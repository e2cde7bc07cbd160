// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (c) 2025 ReifyDB

//! The single place where gateway errors become RPC status codes.

use rbridge_core::Error;
use tonic::Status;

pub(crate) fn to_status(err: Error) -> Status {
	match err {
		Error::ConnectionUnavailable => Status::unavailable(err.to_string()),
		Error::Transport { .. } => Status::unavailable(err.to_string()),
		// The script, not the service, is at fault.
		Error::EngineScript { .. } | Error::Schema { .. } | Error::TypeMismatch { .. } => {
			Status::invalid_argument(err.to_string())
		}
		Error::UnknownFunction { .. } => Status::unimplemented(err.to_string()),
		// The request cannot be safely interpreted.
		Error::Header { .. } => Status::data_loss(err.to_string()),
		Error::Catalog { .. } => Status::internal(err.to_string()),
	}
}
