// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (c) 2025 ReifyDB

use std::sync::atomic::Ordering;

use rbridge_gateway::ConnectionManager;

mod support;

use support::{FakeConnector, fast_timings, test_params, wait_for};

#[tokio::test]
async fn retries_until_the_engine_accepts() {
	let (connector, shared) = FakeConnector::new();
	shared.fail_connects.store(2, Ordering::SeqCst);

	let manager = ConnectionManager::with_timings(connector, fast_timings());
	let entry = manager.get_or_create(&test_params()).await;

	wait_for(|| entry.session().is_some()).await;
	assert_eq!(shared.connects.load(Ordering::SeqCst), 3);
}

#[tokio::test]
async fn equal_parameters_share_one_entry() {
	let (connector, shared) = FakeConnector::new();
	let manager = ConnectionManager::with_timings(connector, fast_timings());

	let a = manager.get_or_create(&test_params()).await;
	let b = manager.get_or_create(&test_params()).await;
	assert!(std::sync::Arc::ptr_eq(&a, &b));
	assert_eq!(manager.len(), 1);

	// A different port is a different engine.
	let other = rbridge_core::ConnectionParameters::remote("fake-engine", 6312);
	let c = manager.get_or_create(&other).await;
	assert!(!std::sync::Arc::ptr_eq(&a, &c));
	assert_eq!(manager.len(), 2);

	wait_for(|| shared.connects.load(Ordering::SeqCst) >= 2).await;
}

#[tokio::test]
async fn init_script_runs_before_the_session_is_published() {
	let (connector, shared) = FakeConnector::new();
	let manager = ConnectionManager::with_timings(connector, fast_timings());

	let params = test_params().with_init_script("library(jsonlite)");
	let entry = manager.get_or_create(&params).await;

	wait_for(|| entry.session().is_some()).await;
	assert_eq!(shared.evals(), vec!["library(jsonlite)".to_string()]);
}

#[tokio::test]
async fn dead_session_is_replaced_by_the_background_loop() {
	let (connector, shared) = FakeConnector::new();
	let manager = ConnectionManager::with_timings(connector, fast_timings());
	let entry = manager.get_or_create(&test_params()).await;

	wait_for(|| entry.session().is_some()).await;
	let connects_before = shared.connects.load(Ordering::SeqCst);

	shared.alive.store(false, Ordering::SeqCst);
	wait_for(|| shared.connects.load(Ordering::SeqCst) > connects_before).await;
	wait_for(|| entry.session().is_some()).await;
}

#[tokio::test]
async fn dispose_stops_the_reconnect_loop() {
	let (connector, shared) = FakeConnector::new();
	// Never lets a connection through, so the loop retries forever until
	// it is aborted.
	shared.fail_connects.store(usize::MAX, Ordering::SeqCst);

	let manager = ConnectionManager::with_timings(connector, fast_timings());
	let _ = manager.get_or_create(&test_params()).await;
	wait_for(|| shared.connects.load(Ordering::SeqCst) >= 1).await;

	manager.dispose();
	assert!(manager.is_empty());

	let after = shared.connects.load(Ordering::SeqCst);
	tokio::time::sleep(std::time::Duration::from_millis(100)).await;
	assert_eq!(shared.connects.load(Ordering::SeqCst), after);
}
