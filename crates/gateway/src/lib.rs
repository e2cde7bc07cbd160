// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (c) 2025 ReifyDB

//! The rbridge gateway: exposes an Rserve backend as a streaming gRPC
//! connector service.
//!
//! An inbound call carries either a script body or a function id (resolved
//! via the [`registry`]); input rows are pivoted into a columnar dataset by
//! the [`assembler`], evaluated under the per-session lock by the
//! [`executor`] against a session obtained from the [`pool`], and the
//! decoded result is turned back into schema metadata plus bounded row
//! bundles by the [`marshal`] module.

pub mod assembler;
pub mod config;
pub mod executor;
pub mod marshal;
pub mod pool;
pub mod registry;
pub mod service;
pub mod supervisor;

mod status;

pub mod proto {
	tonic::include_proto!("qlik.sse");
}

pub use config::GatewayConfig;
pub use pool::ConnectionManager;
pub use registry::FunctionRegistry;
pub use service::ConnectorService;
