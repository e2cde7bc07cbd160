// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (c) 2025 ReifyDB

//! Async client for the Rserve QAP1 binary protocol.
//!
//! The wire codec lives in [`codec`]; [`RserveClient`] drives it over a
//! `tokio` TCP stream. The gateway never talks to this client directly;
//! it is generic over the [`EngineSession`] and [`EngineConnector`] traits
//! so tests can substitute in-memory fakes.

pub mod codec;

mod client;
mod error;
mod session;

pub use client::{RserveClient, RserveConnector};
pub use error::RserveError;
pub use session::{EngineConnector, EngineSession};
