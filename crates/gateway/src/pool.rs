// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (c) 2025 ReifyDB

//! Connection pool: zero-or-one live engine session per distinct
//! [`ConnectionParameters`] tuple, each healed by its own background loop.
//!
//! The loop is the sole writer of an entry's session slot; callers take a
//! snapshot and may observe `None` (still connecting, or currently down);
//! that is an expected condition surfaced at use time, never at
//! acquisition time.

use std::{sync::Arc, time::Duration, time::Instant};

use dashmap::{DashMap, mapref::entry::Entry};
use parking_lot::{Mutex as PlainMutex, RwLock};
use rbridge_core::{ConnectionParameters, Target};
use rbridge_rserve::{EngineConnector, EngineSession};
use tokio::{sync::Mutex, task::JoinHandle};
use tracing::{debug, info, warn};

use crate::supervisor::{ProcessLog, spawn_supervisor};

/// Loop and caller timing knobs. Production values match the observed
/// backend behavior; tests shrink them.
#[derive(Debug, Clone)]
pub struct PoolTimings {
	/// How long `get_or_create` waits after creating a new entry, to give
	/// the first connection attempt a head start.
	pub head_start: Duration,
	/// Fixed delay between connect-loop iterations, connected or not.
	pub retry_interval: Duration,
	/// Pause between a successful connect and the init script push.
	pub settle: Duration,
}

impl Default for PoolTimings {
	fn default() -> Self {
		Self {
			head_start: Duration::from_millis(500),
			retry_interval: Duration::from_secs(5),
			settle: Duration::from_millis(150),
		}
	}
}

/// One pool entry. The session slot holds the engine session behind the
/// per-session execution lock; the slot itself is written only by the
/// entry's connect loop.
pub struct PoolEntry<S> {
	session: RwLock<Option<Arc<Mutex<S>>>>,
	last_used: RwLock<Instant>,
	tasks: PlainMutex<Vec<JoinHandle<()>>>,
	process_log: Option<Arc<ProcessLog>>,
}

impl<S> PoolEntry<S> {
	fn new(process_log: Option<Arc<ProcessLog>>) -> Self {
		Self {
			session: RwLock::new(None),
			last_used: RwLock::new(Instant::now()),
			tasks: PlainMutex::new(Vec::new()),
			process_log,
		}
	}

	/// Snapshot of the current session, if any. May be stale: the session
	/// can die between this read and first use, which the caller observes
	/// as an evaluation failure.
	pub fn session(&self) -> Option<Arc<Mutex<S>>> {
		self.session.read().clone()
	}

	pub fn last_used(&self) -> Instant {
		*self.last_used.read()
	}

	/// Recent stdout of the supervised local process, when there is one.
	pub fn process_log_tail(&self) -> Vec<String> {
		self.process_log.as_ref().map(|log| log.tail()).unwrap_or_default()
	}

	fn touch(&self) {
		*self.last_used.write() = Instant::now();
	}

	fn abort_tasks(&self) {
		for task in self.tasks.lock().drain(..) {
			task.abort();
		}
	}
}

/// Owns all pool entries and their background loops.
pub struct ConnectionManager<C: EngineConnector> {
	connector: Arc<C>,
	entries: DashMap<ConnectionParameters, Arc<PoolEntry<C::Session>>>,
	timings: PoolTimings,
}

impl<C: EngineConnector> ConnectionManager<C> {
	pub fn new(connector: C) -> Self {
		Self::with_timings(connector, PoolTimings::default())
	}

	pub fn with_timings(connector: C, timings: PoolTimings) -> Self {
		Self {
			connector: Arc::new(connector),
			entries: DashMap::new(),
			timings,
		}
	}

	/// Look up or create the entry for `params`.
	///
	/// Creation is atomic: concurrent callers with equal parameters get
	/// the same entry. A newly created entry's background loops are
	/// started immediately, and the caller is held back briefly so the
	/// first connection attempt has a chance to finish; the entry is then
	/// returned regardless of connection outcome.
	pub async fn get_or_create(&self, params: &ConnectionParameters) -> Arc<PoolEntry<C::Session>> {
		let (entry, created) = match self.entries.entry(params.clone()) {
			Entry::Occupied(occupied) => (occupied.get().clone(), false),
			Entry::Vacant(vacant) => {
				let entry = self.create_entry(params);
				vacant.insert(entry.clone());
				(entry, true)
			}
		};
		if created {
			tokio::time::sleep(self.timings.head_start).await;
		}
		entry.touch();
		entry
	}

	fn create_entry(&self, params: &ConnectionParameters) -> Arc<PoolEntry<C::Session>> {
		let process_log = match &params.target {
			Target::LocalProcess { .. } => Some(Arc::new(ProcessLog::default())),
			Target::Remote { .. } => None,
		};
		let entry = Arc::new(PoolEntry::new(process_log.clone()));
		let mut tasks = entry.tasks.lock();

		if let (Target::LocalProcess { path }, Some(log)) = (&params.target, process_log) {
			tasks.push(spawn_supervisor(path.clone(), params.process_args.clone(), log));
		}

		tasks.push(tokio::spawn(connect_loop(
			Arc::clone(&self.connector),
			params.clone(),
			Arc::clone(&entry),
			self.timings.clone(),
		)));
		drop(tasks);
		entry
	}

	/// Entries currently in the pool.
	pub fn len(&self) -> usize {
		self.entries.len()
	}

	pub fn is_empty(&self) -> bool {
		self.entries.is_empty()
	}

	/// Cancel every background loop and drop all sessions. Safe to call
	/// once; the manager must not be used afterwards.
	pub fn dispose(&self) {
		for entry in self.entries.iter() {
			entry.value().abort_tasks();
			*entry.value().session.write() = None;
		}
		self.entries.clear();
	}
}

impl<C: EngineConnector> Drop for ConnectionManager<C> {
	fn drop(&mut self) {
		self.dispose();
	}
}

/// Per-entry background loop: connect when there is no session, verify
/// liveness when there is one, and always sleep the fixed interval before
/// the next iteration. Never returns; it is aborted at disposal.
async fn connect_loop<C: EngineConnector>(
	connector: Arc<C>,
	params: ConnectionParameters,
	entry: Arc<PoolEntry<C::Session>>,
	timings: PoolTimings,
) {
	loop {
		let current = entry.session();
		match current {
			None => match connector.connect(&params).await {
				Ok(mut session) => {
					info!("connected to Rserve at {params}");
					tokio::time::sleep(timings.settle).await;
					match run_init_script(&params, &mut session).await {
						Ok(()) => {
							*entry.session.write() = Some(Arc::new(Mutex::new(session)));
						}
						Err(message) => {
							// Session is discarded; next iteration
							// reconnects from scratch.
							warn!("init script failed on {params}: {message}");
						}
					}
				}
				Err(err) => {
					warn!("connect to Rserve at {params} failed: {err}");
					let tail = entry.process_log_tail();
					if !tail.is_empty() {
						debug!("recent R process output: {}", tail.join(" | "));
					}
				}
			},
			Some(handle) => {
				// Skip the probe while an evaluation holds the lock;
				// a busy session is a live session.
				if let Ok(mut session) = handle.try_lock() {
					if !session.is_alive().await {
						warn!("Rserve session at {params} is gone, reconnecting");
						*entry.session.write() = None;
					}
				}
			}
		}
		tokio::time::sleep(timings.retry_interval).await;
	}
}

async fn run_init_script<S: EngineSession>(
	params: &ConnectionParameters,
	session: &mut S,
) -> Result<(), String> {
	let Some(script) = params.init_script.as_deref() else {
		return Ok(());
	};
	debug!("sending init script to Rserve at {params}");
	session.eval(script).await.map_err(|err| err.to_string())?;
	debug!("init script done");
	Ok(())
}
