// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (c) 2025 ReifyDB

//! In-memory engine fakes used across the integration tests.

#![allow(dead_code)]

use std::{
	collections::HashMap,
	future::Future,
	sync::{
		Arc, Mutex,
		atomic::{AtomicBool, AtomicUsize, Ordering},
	},
	time::Duration,
};

use rbridge_core::{ConnectionParameters, EngineValue, InputDataset};
use rbridge_gateway::pool::PoolTimings;
use rbridge_rserve::{EngineConnector, EngineSession, RserveError};

#[derive(Clone)]
pub enum ScriptOutcome {
	Value(EngineValue),
	Fail(u32),
}

/// Shared state behind every session a [`FakeConnector`] hands out. Tests
/// keep their own clone of the `Arc` to script responses and inspect what
/// the gateway did.
pub struct FakeShared {
	/// Remaining connect attempts that must fail before one succeeds.
	pub fail_connects: AtomicUsize,
	pub connects: AtomicUsize,
	/// Scripts evaluated, in order, across all sessions.
	pub eval_log: Mutex<Vec<String>>,
	/// Variable bindings pushed, as (name, row count).
	pub assigns: Mutex<Vec<(String, usize)>>,
	responses: Mutex<HashMap<String, ScriptOutcome>>,
	/// Set while an eval is in flight; a second eval observing it means
	/// the per-session lock was violated.
	busy: AtomicBool,
	pub overlap: AtomicBool,
	pub alive: AtomicBool,
	pub eval_delay: Duration,
}

impl Default for FakeShared {
	fn default() -> Self {
		Self {
			fail_connects: AtomicUsize::new(0),
			connects: AtomicUsize::new(0),
			eval_log: Mutex::new(Vec::new()),
			assigns: Mutex::new(Vec::new()),
			responses: Mutex::new(HashMap::new()),
			busy: AtomicBool::new(false),
			overlap: AtomicBool::new(false),
			alive: AtomicBool::new(true),
			eval_delay: Duration::from_millis(5),
		}
	}
}

impl FakeShared {
	pub fn respond(&self, script: &str, value: EngineValue) {
		self.responses.lock().unwrap().insert(script.to_string(), ScriptOutcome::Value(value));
	}

	pub fn fail(&self, script: &str, status: u32) {
		self.responses.lock().unwrap().insert(script.to_string(), ScriptOutcome::Fail(status));
	}

	pub fn evals(&self) -> Vec<String> {
		self.eval_log.lock().unwrap().clone()
	}
}

#[derive(Clone)]
pub struct FakeConnector {
	pub shared: Arc<FakeShared>,
}

impl FakeConnector {
	pub fn new() -> (Self, Arc<FakeShared>) {
		let shared = Arc::new(FakeShared::default());
		(Self { shared: Arc::clone(&shared) }, shared)
	}
}

impl EngineConnector for FakeConnector {
	type Session = FakeSession;

	fn connect(
		&self,
		_params: &ConnectionParameters,
	) -> impl Future<Output = Result<FakeSession, RserveError>> + Send {
		let shared = Arc::clone(&self.shared);
		async move {
			shared.connects.fetch_add(1, Ordering::SeqCst);
			let must_fail = shared
				.fail_connects
				.fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
				.is_ok();
			if must_fail {
				return Err(RserveError::protocol("connection refused"));
			}
			shared.alive.store(true, Ordering::SeqCst);
			Ok(FakeSession { shared })
		}
	}
}

pub struct FakeSession {
	shared: Arc<FakeShared>,
}

impl EngineSession for FakeSession {
	fn eval(&mut self, script: &str) -> impl Future<Output = Result<EngineValue, RserveError>> + Send {
		let script = script.to_string();
		let shared = Arc::clone(&self.shared);
		async move {
			if shared.busy.swap(true, Ordering::SeqCst) {
				shared.overlap.store(true, Ordering::SeqCst);
			}
			tokio::time::sleep(shared.eval_delay).await;
			shared.eval_log.lock().unwrap().push(script.clone());
			let outcome = shared.responses.lock().unwrap().get(&script).cloned();
			shared.busy.store(false, Ordering::SeqCst);
			match outcome {
				Some(ScriptOutcome::Fail(status)) => Err(RserveError::CommandFailed { status }),
				Some(ScriptOutcome::Value(value)) => Ok(value),
				None => Ok(EngineValue::Double(vec![42.0])),
			}
		}
	}

	fn assign(
		&mut self,
		name: &str,
		dataset: &InputDataset,
	) -> impl Future<Output = Result<(), RserveError>> + Send {
		let record = (name.to_string(), dataset.rows());
		let shared = Arc::clone(&self.shared);
		async move {
			shared.assigns.lock().unwrap().push(record);
			Ok(())
		}
	}

	fn is_alive(&mut self) -> impl Future<Output = bool> + Send {
		let shared = Arc::clone(&self.shared);
		async move { shared.alive.load(Ordering::SeqCst) }
	}
}

/// Timings shrunk so a whole reconnect cycle fits in milliseconds.
pub fn fast_timings() -> PoolTimings {
	PoolTimings {
		head_start: Duration::from_millis(50),
		retry_interval: Duration::from_millis(20),
		settle: Duration::from_millis(1),
	}
}

pub fn test_params() -> ConnectionParameters {
	ConnectionParameters::remote("fake-engine", 6311)
}

/// Poll until `check` passes or two seconds elapse.
pub async fn wait_for(mut check: impl FnMut() -> bool) {
	for _ in 0..200 {
		if check() {
			return;
		}
		tokio::time::sleep(Duration::from_millis(10)).await;
	}
	panic!("condition not reached within two seconds");
}
